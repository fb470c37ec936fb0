//! CANopen-style identifier scheme: an 11-bit id is a function code in bits
//! 10..7 plus a node id in bits 6..0.

use can_transport::{CanFrame, CanId};

pub const SFF_MASK: u16 = 0x7FF;
pub const FUNCTION_MASK: u16 = 0x780;
pub const NODE_MASK: u16 = 0x07F;

/// Highest node id addressable in the 7-bit node field.
pub const MAX_NODE_ID: u8 = 0x7F;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FunctionCode {
    Nmt,
    Tpdo1,
    Rpdo1,
    Tpdo2,
    Rpdo2,
    Tpdo3,
    Rpdo3,
    Tpdo4,
    Rpdo4,
    SdoResponse,
    SdoRequest,
    Heartbeat,
}

impl FunctionCode {
    pub const ALL: [FunctionCode; 12] = [
        FunctionCode::Nmt,
        FunctionCode::Tpdo1,
        FunctionCode::Rpdo1,
        FunctionCode::Tpdo2,
        FunctionCode::Rpdo2,
        FunctionCode::Tpdo3,
        FunctionCode::Rpdo3,
        FunctionCode::Tpdo4,
        FunctionCode::Rpdo4,
        FunctionCode::SdoResponse,
        FunctionCode::SdoRequest,
        FunctionCode::Heartbeat,
    ];

    pub const fn base(self) -> u16 {
        match self {
            FunctionCode::Nmt => 0x000,
            FunctionCode::Tpdo1 => 0x180,
            FunctionCode::Rpdo1 => 0x200,
            FunctionCode::Tpdo2 => 0x280,
            FunctionCode::Rpdo2 => 0x300,
            FunctionCode::Tpdo3 => 0x380,
            FunctionCode::Rpdo3 => 0x400,
            FunctionCode::Tpdo4 => 0x480,
            FunctionCode::Rpdo4 => 0x500,
            FunctionCode::SdoResponse => 0x580,
            FunctionCode::SdoRequest => 0x600,
            FunctionCode::Heartbeat => 0x780,
        }
    }

    pub fn from_base(base: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.base() == base)
    }

    pub fn name(self) -> &'static str {
        match self {
            FunctionCode::Nmt => "nmt",
            FunctionCode::Tpdo1 => "tpdo1",
            FunctionCode::Rpdo1 => "rpdo1",
            FunctionCode::Tpdo2 => "tpdo2",
            FunctionCode::Rpdo2 => "rpdo2",
            FunctionCode::Tpdo3 => "tpdo3",
            FunctionCode::Rpdo3 => "rpdo3",
            FunctionCode::Tpdo4 => "tpdo4",
            FunctionCode::Rpdo4 => "rpdo4",
            FunctionCode::SdoResponse => "sdo_response",
            FunctionCode::SdoRequest => "sdo_request",
            FunctionCode::Heartbeat => "heartbeat",
        }
    }
}

/// `(base + node_id) & 0x7FF`, as a raw 11-bit value.
pub fn compose_raw(base: u16, node_id: u8) -> u16 {
    base.wrapping_add(u16::from(node_id)) & SFF_MASK
}

/// Outbound standard identifier for `function` addressed to `node_id`.
pub fn compose(function: FunctionCode, node_id: u8) -> CanId {
    CanId::standard_masked(compose_raw(function.base(), node_id))
}

/// Split an identifier into `(function_code, node_id)`.
pub fn classify(id: u16) -> (u16, u8) {
    (id & FUNCTION_MASK, (id & NODE_MASK) as u8)
}

/// Node id of a heartbeat frame, or `None` for anything this core does not
/// decode: other function codes, node 0, extended ids and remote frames.
pub fn heartbeat_node(frame: &CanFrame) -> Option<u8> {
    if !frame.is_standard_data() {
        return None;
    }
    let (function, node_id) = classify(frame.id.raw() as u16);
    (function == FunctionCode::Heartbeat.base() && node_id != 0).then_some(node_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_classify_round_trip() {
        for function in [FunctionCode::Nmt, FunctionCode::Rpdo1, FunctionCode::Heartbeat] {
            for node_id in 1..=MAX_NODE_ID {
                let id = compose(function, node_id);
                assert!(!id.is_extended());
                assert_eq!(
                    classify(id.raw() as u16),
                    (function.base(), node_id),
                    "function={function:?} node={node_id}"
                );
            }
        }
    }

    #[test]
    fn test_compose_known_ids() {
        assert_eq!(compose(FunctionCode::Nmt, 1).raw(), 0x001);
        assert_eq!(compose(FunctionCode::Rpdo1, 1).raw(), 0x201);
        assert_eq!(compose(FunctionCode::Heartbeat, 0x7F).raw(), 0x7FF);
        // out-of-field node ids are masked to 11 bits, never rejected
        assert_eq!(compose_raw(0x780, 0x80), 0x000);
    }

    #[test]
    fn test_from_base() {
        for f in FunctionCode::ALL {
            assert_eq!(FunctionCode::from_base(f.base()), Some(f));
        }
        assert_eq!(FunctionCode::from_base(0x700), None);
    }

    #[test]
    fn test_heartbeat_node_filters() {
        let hb = CanFrame::new(CanId::standard(0x781).unwrap(), &[0; 8]).unwrap();
        assert_eq!(heartbeat_node(&hb), Some(1));

        let node_zero = CanFrame::new(CanId::standard(0x780).unwrap(), &[0; 8]).unwrap();
        assert_eq!(heartbeat_node(&node_zero), None);

        let command = CanFrame::new(CanId::standard(0x201).unwrap(), &[0; 8]).unwrap();
        assert_eq!(heartbeat_node(&command), None);

        let extended = CanFrame::new(CanId::extended(0x781).unwrap(), &[0; 8]).unwrap();
        assert_eq!(heartbeat_node(&extended), None);

        let mut remote = hb.clone();
        remote.rtr = true;
        assert_eq!(heartbeat_node(&remote), None);
    }
}
