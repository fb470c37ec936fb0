//! mit-protocol: MIT-mode joint actuator protocol over CAN
//!
//! Bit-exact packing of MIT commands and heartbeats on top of a fixed-point
//! codec, a fixed-capacity device table addressed by node id, and a polling
//! control loop that keeps the command cadence independent of inbound traffic.

mod error;
pub use error::{ProtocolError, Result};

pub mod codec;
pub use codec::QuantizationRange;

pub mod ident;
pub use ident::{classify, compose, heartbeat_node, FunctionCode};

mod limits;
pub use limits::{LimitsConfig, MitLimits};

mod packer;
pub use packer::{
    unpack_heartbeat, zero_position_frame, HeartbeatCodes, MitCommand, NmtCommand,
    HEARTBEAT_MIN_LEN, MIT_PAYLOAD_LEN,
};

mod table;
pub use table::{DeviceTable, Disposition, MotorState};

mod metrics;
pub use metrics::{LoopMetrics, MetricsHub};

mod control;
pub use control::{ControlLoop, LoopSettings, SendOutcome, TickReport};

mod loader;
pub use loader::{load_profile_file, parse_profile, DeviceOverride, Profile, ProfileFile};

mod telemetry;
pub use telemetry::TelemetryRecord;
