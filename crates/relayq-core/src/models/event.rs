use serde::{Deserialize, Serialize};

/// One notification event as seen by plugins: the channel it was emitted on
/// (e.g. `"build_started"`) and an opaque serialized payload whose format is
/// owned by the emitting side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub channel_name: String,
    pub payload: String,
}

impl Event {
    pub fn new(channel_name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.into(),
            payload: payload.into(),
        }
    }
}
