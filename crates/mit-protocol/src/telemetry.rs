use crate::packer::MitCommand;
use crate::table::MotorState;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Commanded vs. measured snapshot for one node, emitted as a JSON line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryRecord {
    pub node_id: u8,
    pub cmd_pos: f64,
    pub pos: f64,
    pub vel: f64,
    pub tor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl TelemetryRecord {
    pub fn capture(
        node_id: u8,
        command: &MitCommand,
        state: &MotorState,
        ts: Option<OffsetDateTime>,
    ) -> Self {
        Self {
            node_id,
            cmd_pos: command.pos,
            pos: state.pos(),
            vel: state.vel(),
            tor: state.tor(),
            ts: ts.and_then(|t| {
                t.format(&time::format_description::well_known::Rfc3339)
                    .ok()
            }),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
