//! Shared types for the hayaoki API

use serde::{Deserialize, Serialize};

/// Usage string returned for malformed commands; front ends match on it verbatim
pub const USAGE: &str = "Usage: /hayaoki [kiken|cancel|list] [month/day[-month/day]]";

/// Who gets to see a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Only the requester sees it
    Ephemeral,
    /// Posted to the channel
    InChannel,
}

/// Reply text plus visibility class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub visibility: Visibility,
}

impl Reply {
    pub fn private(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visibility: Visibility::Ephemeral,
        }
    }

    pub fn broadcast(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visibility: Visibility::InChannel,
        }
    }

    /// Private reply for an unrecognized command
    pub fn usage() -> Self {
        Self::private(format!("Invalid format.\n{}", USAGE))
    }
}

/// A slash command after splitting its text on single spaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundCommand {
    /// Empty text: record today's check-in
    CheckIn,
    /// `kiken` with no token (today) or one date token
    Exemption { token: Option<String> },
    /// `list`: show the requester's exemptions
    List,
    /// `cancel` / `delete`: recognized but unsupported
    Cancel,
    /// Anything else
    Invalid,
}

impl InboundCommand {
    /// Parse the raw command text. No trimming is done; tokens are split on
    /// single spaces exactly as the chat front end delivers them.
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::CheckIn;
        }

        let tokens: Vec<&str> = text.split(' ').collect();
        match tokens.as_slice() {
            ["kiken"] => Self::Exemption { token: None },
            ["kiken", token] => Self::Exemption {
                token: Some((*token).to_string()),
            },
            ["list"] => Self::List,
            ["cancel", ..] | ["delete", ..] => Self::Cancel,
            _ => Self::Invalid,
        }
    }
}

/// Client role (set by the IPC layer from peer credentials)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Chat bridge relaying participant commands
    Frontend,
    /// Same user as the service: may also trigger the daily report
    Admin,
    /// Read-only observer
    Observer,
}

impl ClientRole {
    pub fn can_submit_commands(&self) -> bool {
        matches!(self, ClientRole::Frontend | ClientRole::Admin)
    }

    pub fn can_trigger_report(&self) -> bool {
        matches!(self, ClientRole::Admin)
    }
}

/// Service status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub live: bool,
    pub store_ok: bool,
    /// Tracking day as stored in the ledger (`YYYY/M/D`)
    pub tracking_day: Option<String>,
    /// Configured in-process report time, if any
    pub report_schedule: Option<String>,
    /// Last day the scheduler sent a report
    pub last_report_day: Option<String>,
}
