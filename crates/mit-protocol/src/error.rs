use can_transport::TransportError;
use thiserror::Error;

pub type Result<T, E = ProtocolError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid quantization range [{min}, {max}] over {bits} bits: {reason}")]
    InvalidRange {
        min: f64,
        max: f64,
        bits: u8,
        reason: &'static str,
    },
    #[error("invalid node id {node_id}: expected 1..={max}")]
    InvalidNode { node_id: u8, max: usize },
    #[error("invalid table capacity {capacity}: expected 1..={max}")]
    InvalidCapacity { capacity: usize, max: usize },
    #[error("invalid loop setting: {0}")]
    InvalidSetting(&'static str),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
