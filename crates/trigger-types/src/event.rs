//! Webhook event classification

use std::fmt;

/// Event types this bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Push,
    PullRequest,
    Ping,
}

impl EventType {
    pub const ALL: [EventType; 3] = [EventType::Push, EventType::PullRequest, EventType::Ping];

    /// Header spelling, e.g. `pull_request`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::PullRequest => "pull_request",
            Self::Ping => "ping",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of looking at the `X-GitHub-Event` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Supported(EventType),
    /// Header absent or empty.
    Missing,
    /// Header present but names an event we do not handle.
    Unknown(String),
}

/// Classify a raw `X-GitHub-Event` header value.
///
/// Matching is exact and case-sensitive; GitHub always sends lowercase.
pub fn classify(header: Option<&str>) -> Classification {
    let Some(value) = header.filter(|v| !v.is_empty()) else {
        return Classification::Missing;
    };

    EventType::ALL
        .into_iter()
        .find(|event| event.as_str() == value)
        .map(Classification::Supported)
        .unwrap_or_else(|| Classification::Unknown(value.to_string()))
}
