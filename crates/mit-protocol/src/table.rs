use crate::codec::decode;
use crate::error::{ProtocolError, Result};
use crate::ident::{heartbeat_node, MAX_NODE_ID};
use crate::limits::MitLimits;
use crate::packer::{unpack_heartbeat, HeartbeatCodes};
use can_transport::CanFrame;
use serde::Serialize;
use tracing::trace;

/// Last reported state of one actuator.
///
/// `limits` is the device's capability profile and never changes; the measured
/// fields are written only by [`DeviceTable::apply_frame`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MotorState {
    pos: f64,
    vel: f64,
    tor: f64,
    limits: MitLimits,
}

impl MotorState {
    pub fn new(limits: MitLimits) -> Self {
        Self {
            pos: 0.0,
            vel: 0.0,
            tor: 0.0,
            limits,
        }
    }

    pub fn pos(&self) -> f64 {
        self.pos
    }

    pub fn vel(&self) -> f64 {
        self.vel
    }

    pub fn tor(&self) -> f64 {
        self.tor
    }

    pub fn limits(&self) -> &MitLimits {
        &self.limits
    }

    fn update(&mut self, codes: HeartbeatCodes) {
        self.pos = decode(codes.pos, self.limits.pos);
        self.vel = decode(codes.vel, self.limits.vel);
        self.tor = decode(codes.tor, self.limits.tor);
    }
}

/// What [`DeviceTable::apply_frame`] did with a frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Disposition {
    Applied { node_id: u8 },
    /// Not a heartbeat this table decodes (other function code, node 0,
    /// extended or remote frame).
    Ignored,
    /// Heartbeat from a node past the table's capacity.
    OutOfRange { node_id: u8 },
    /// Heartbeat too short to carry pos/vel/tor.
    Short { node_id: u8, len: u8 },
}

impl Disposition {
    pub fn reason(&self) -> &'static str {
        match self {
            Disposition::Applied { .. } => "applied",
            Disposition::Ignored => "ignored",
            Disposition::OutOfRange { .. } => "out_of_range",
            Disposition::Short { .. } => "short",
        }
    }
}

/// Fixed-capacity per-device state, slot `node_id - 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceTable {
    slots: Vec<MotorState>,
}

impl DeviceTable {
    pub const DEFAULT_CAPACITY: usize = 4;

    /// Largest table: one slot per addressable node id.
    pub const MAX_CAPACITY: usize = MAX_NODE_ID as usize;

    /// Capacity must be within `1..=MAX_CAPACITY`.
    pub fn check_capacity(capacity: usize) -> Result<()> {
        if (1..=Self::MAX_CAPACITY).contains(&capacity) {
            Ok(())
        } else {
            Err(ProtocolError::InvalidCapacity {
                capacity,
                max: Self::MAX_CAPACITY,
            })
        }
    }

    /// `capacity` zeroed slots sharing one limits profile.
    pub fn new(capacity: usize, limits: MitLimits) -> Result<Self> {
        Self::check_capacity(capacity)?;
        Ok(Self {
            slots: vec![MotorState::new(limits); capacity],
        })
    }

    /// One slot per profile, in node-id order starting at 1.
    pub fn from_profiles(profiles: impl IntoIterator<Item = MitLimits>) -> Result<Self> {
        let slots: Vec<MotorState> = profiles
            .into_iter()
            .take(Self::MAX_CAPACITY + 1)
            .map(MotorState::new)
            .collect();
        Self::check_capacity(slots.len())?;
        Ok(Self { slots })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn index(&self, node_id: u8) -> Option<usize> {
        let idx = usize::from(node_id).checked_sub(1)?;
        (idx < self.slots.len()).then_some(idx)
    }

    pub fn get(&self, node_id: u8) -> Option<&MotorState> {
        self.index(node_id).map(|i| &self.slots[i])
    }

    /// `(node_id, state)` for every slot.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &MotorState)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, s)| ((i + 1) as u8, s))
    }

    /// Classify `frame` and, if it is a heartbeat for a tracked node, overwrite
    /// that node's measured position, velocity and torque.
    pub fn apply_frame(&mut self, frame: &CanFrame) -> Disposition {
        let Some(node_id) = heartbeat_node(frame) else {
            return Disposition::Ignored;
        };
        let Some(idx) = self.index(node_id) else {
            return Disposition::OutOfRange { node_id };
        };
        let Some(codes) = unpack_heartbeat(frame.payload()) else {
            return Disposition::Short {
                node_id,
                len: frame.len,
            };
        };
        self.slots[idx].update(codes);
        trace!(node_id, ?codes, "heartbeat applied");
        Disposition::Applied { node_id }
    }
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self {
            slots: vec![MotorState::new(MitLimits::DEFAULT); Self::DEFAULT_CAPACITY],
        }
    }
}
