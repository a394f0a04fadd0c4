//! Event types for hayaokid -> subscriber streaming

use chrono::{DateTime, FixedOffset};
use hayaoki_util::ParticipantId;
use serde::{Deserialize, Serialize};

use crate::{API_VERSION, Visibility};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<FixedOffset>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(timestamp: DateTime<FixedOffset>, payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp,
            payload,
        }
    }
}

/// All possible events from the service to subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Message to post to a channel
    Notice {
        channel: String,
        text: String,
        visibility: Visibility,
    },

    /// The daily report went out
    ReportSent {
        channel: String,
        day: String,
        text: String,
        succeeded: Vec<ParticipantId>,
        exempted: Vec<ParticipantId>,
        failed: Vec<ParticipantId>,
    },

    /// The ledger rolled over to a new tracking day
    TrackingDayAdvanced { day: String },

    /// Service is shutting down
    Shutdown,
}

impl EventPayload {
    /// Channel notice, always broadcast
    pub fn notice(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Notice {
            channel: channel.into(),
            text: text.into(),
            visibility: Visibility::InChannel,
        }
    }
}
