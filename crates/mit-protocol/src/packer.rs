use crate::codec::{decode, encode};
use crate::ident::{compose, FunctionCode};
use crate::limits::MitLimits;
use can_transport::CanFrame;
use serde::{Deserialize, Serialize};

pub const MIT_PAYLOAD_LEN: usize = 8;

/// Bytes a heartbeat must carry for pos/vel/tor (indices 0..=5).
pub const HEARTBEAT_MIN_LEN: usize = 6;

const NMT_ENABLE: u8 = 0xFC;
const NMT_DISABLE: u8 = 0xFD;
const ZERO_POSITION: u8 = 0xFE;

/// One MIT-mode setpoint: target position and velocity, PD gains and
/// feed-forward torque.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MitCommand {
    pub pos: f64,
    pub vel: f64,
    pub kp: f64,
    pub kd: f64,
    pub tor: f64,
}

impl MitCommand {
    /// Hold `pos` with the given gains, zero velocity and feed-forward.
    pub fn position(pos: f64, kp: f64, kd: f64) -> Self {
        Self {
            pos,
            kp,
            kd,
            ..Self::default()
        }
    }

    /// Pack into the 8-byte wire layout, MSB first:
    /// `pos[16] | vel[12] | kp[12] | kd[12] | tor[12]`.
    pub fn encode(&self, limits: &MitLimits) -> [u8; MIT_PAYLOAD_LEN] {
        let p = encode(self.pos, limits.pos);
        let v = encode(self.vel, limits.vel);
        let kp = encode(self.kp, limits.kp);
        let kd = encode(self.kd, limits.kd);
        let t = encode(self.tor, limits.tor);

        [
            (p >> 8) as u8,
            p as u8,
            (v >> 4) as u8,
            (((v & 0x0F) << 4) | ((kp >> 8) & 0x0F)) as u8,
            kp as u8,
            (kd >> 4) as u8,
            (((kd & 0x0F) << 4) | ((t >> 8) & 0x0F)) as u8,
            t as u8,
        ]
    }

    /// Unpack a captured command payload; `None` if shorter than 8 bytes.
    pub fn decode(data: &[u8], limits: &MitLimits) -> Option<Self> {
        let d: &[u8; MIT_PAYLOAD_LEN] = data.get(..MIT_PAYLOAD_LEN)?.try_into().ok()?;
        let b = |i: usize| u32::from(d[i]);
        let p = (b(0) << 8) | b(1);
        let v = (b(2) << 4) | (b(3) >> 4);
        let kp = ((b(3) & 0x0F) << 8) | b(4);
        let kd = (b(5) << 4) | (b(6) >> 4);
        let t = ((b(6) & 0x0F) << 8) | b(7);
        Some(Self {
            pos: decode(p, limits.pos),
            vel: decode(v, limits.vel),
            kp: decode(kp, limits.kp),
            kd: decode(kd, limits.kd),
            tor: decode(t, limits.tor),
        })
    }

    /// RPDO1 frame addressed to `node_id`.
    pub fn to_frame(&self, node_id: u8, limits: &MitLimits) -> CanFrame {
        CanFrame::with_payload(compose(FunctionCode::Rpdo1, node_id), self.encode(limits))
    }
}

/// Network-management commands carried on the NMT function code.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NmtCommand {
    Enable,
    Disable,
}

impl NmtCommand {
    pub fn payload(self) -> [u8; 8] {
        let last = match self {
            NmtCommand::Enable => NMT_ENABLE,
            NmtCommand::Disable => NMT_DISABLE,
        };
        special_payload(last)
    }

    pub fn to_frame(self, node_id: u8) -> CanFrame {
        CanFrame::with_payload(compose(FunctionCode::Nmt, node_id), self.payload())
    }
}

/// Set the current shaft position as zero. Travels on RPDO1, not NMT.
pub fn zero_position_frame(node_id: u8) -> CanFrame {
    CanFrame::with_payload(
        compose(FunctionCode::Rpdo1, node_id),
        special_payload(ZERO_POSITION),
    )
}

fn special_payload(last: u8) -> [u8; 8] {
    let mut data = [0xFF; 8];
    data[7] = last;
    data
}

/// Raw codes carried by a heartbeat. Byte 0 and bytes 6..8 are not used.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HeartbeatCodes {
    pub pos: u32,
    pub vel: u32,
    pub tor: u32,
}

/// `None` when the payload is too short to hold all three fields.
pub fn unpack_heartbeat(data: &[u8]) -> Option<HeartbeatCodes> {
    if data.len() < HEARTBEAT_MIN_LEN {
        return None;
    }
    let b = |i: usize| u32::from(data[i]);
    Some(HeartbeatCodes {
        pos: (b(1) << 8) | b(2),
        vel: (b(3) << 4) | (b(4) >> 4),
        tor: ((b(4) & 0x0F) << 8) | b(5),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_command_golden_bytes() {
        let cmd = MitCommand::default();
        // pos 0.0 -> 0x7FFF (f64 rounding of 32767.4999..), vel/tor -> 0x800, gains -> 0
        assert_eq!(
            cmd.encode(&MitLimits::DEFAULT),
            [0x7F, 0xFF, 0x80, 0x00, 0x00, 0x00, 0x08, 0x00]
        );
    }

    #[test]
    fn test_mixed_command_golden_bytes() {
        let cmd = MitCommand {
            pos: -1.0,
            vel: 10.0,
            kp: 250.0,
            kd: 1.5,
            tor: 2.0,
        };
        // pos 0x573C, vel 0x9C7, kp 0x800, kd 0x4CD, tor 0x8E3
        assert_eq!(
            cmd.encode(&MitLimits::DEFAULT),
            [0x57, 0x3C, 0x9C, 0x78, 0x00, 0x4C, 0xD8, 0xE3]
        );
    }

    #[test]
    fn test_saturated_command_fills_every_field() {
        let cmd = MitCommand {
            pos: 100.0,
            vel: 100.0,
            kp: 1e6,
            kd: 1e6,
            tor: 100.0,
        };
        assert_eq!(cmd.encode(&MitLimits::DEFAULT), [0xFF; 8]);

        let low = MitCommand {
            pos: -100.0,
            vel: -100.0,
            kp: -1.0,
            kd: -1.0,
            tor: -100.0,
        };
        assert_eq!(low.encode(&MitLimits::DEFAULT), [0x00; 8]);
    }

    #[test]
    fn test_command_frame_addressing() {
        let frame = MitCommand::position(0.5, 0.5, 0.3).to_frame(1, &MitLimits::DEFAULT);
        assert_eq!(frame.id.raw(), 0x201);
        assert_eq!(frame.len, 8);
        assert!(!frame.rtr);
    }

    #[test]
    fn test_decode_recovers_command_within_one_step() {
        let limits = MitLimits::DEFAULT;
        let cmd = MitCommand {
            pos: 1.234,
            vel: -7.5,
            kp: 42.0,
            kd: 0.8,
            tor: -3.3,
        };
        let back = MitCommand::decode(&cmd.encode(&limits), &limits).unwrap();
        assert!((back.pos - cmd.pos).abs() <= limits.pos.step());
        assert!((back.vel - cmd.vel).abs() <= limits.vel.step());
        assert!((back.kp - cmd.kp).abs() <= limits.kp.step());
        assert!((back.kd - cmd.kd).abs() <= limits.kd.step());
        assert!((back.tor - cmd.tor).abs() <= limits.tor.step());
        assert!(MitCommand::decode(&[0; 7], &limits).is_none());
    }

    #[test]
    fn test_nmt_payloads() {
        let enable = NmtCommand::Enable.to_frame(1);
        assert_eq!(enable.id.raw(), 0x001);
        assert_eq!(enable.data, [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFC]);

        let disable = NmtCommand::Disable.to_frame(3);
        assert_eq!(disable.id.raw(), 0x003);
        assert_eq!(disable.data[7], 0xFD);
        assert!(disable.data[..7].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_zero_position_uses_rpdo1() {
        let frame = zero_position_frame(2);
        assert_eq!(frame.id.raw(), 0x202);
        assert_eq!(frame.data, [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE]);
    }

    #[test]
    fn test_unpack_heartbeat_fields() {
        let codes = unpack_heartbeat(&[0xAA, 0x12, 0x34, 0x56, 0x78, 0x9A, 0xFF, 0xFF]).unwrap();
        assert_eq!(codes.pos, 0x1234);
        assert_eq!(codes.vel, 0x567);
        assert_eq!(codes.tor, 0x89A);
    }

    #[test]
    fn test_unpack_heartbeat_accepts_six_bytes_only() {
        assert!(unpack_heartbeat(&[0, 0x80, 0, 0, 0, 0]).is_some());
        assert!(unpack_heartbeat(&[0, 0x80, 0, 0, 0]).is_none());
    }
}
