use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum MeterState {
    Idle,
    Capturing,
    Stopped,
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatePayload {
    pub state: MeterState,
}

pub struct AppState {
    pub meter_state: MeterState,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            meter_state: MeterState::Idle,
        }
    }
}

pub type SharedState = Arc<Mutex<AppState>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_payload_serializes_tagged() {
        let payload = StatePayload {
            state: MeterState::Failed {
                message: "Audio read error (-1)".to_string(),
            },
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(
            json,
            r#"{"state":{"type":"Failed","message":"Audio read error (-1)"}}"#
        );

        let parsed: StatePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.state, payload.state);
    }

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(AppState::default().meter_state, MeterState::Idle);
    }
}
