//! Fields read from webhook payloads
//!
//! Payloads are decoded as an untyped `serde_json::Value`; only the fields
//! below are looked at and nothing else about the document is validated.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload has no repository.full_name string")]
    MissingRepositoryName,
}

/// The parts of a `push` delivery that drive routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    /// `repository.full_name`, e.g. `vitasdk/newlib`.
    pub repository: String,
    /// `ref`, e.g. `refs/heads/master`. `None` when absent or not a string.
    pub git_ref: Option<String>,
}

impl PushEvent {
    pub fn from_value(payload: &Value) -> Result<Self, PayloadError> {
        let repository = repository_full_name(payload)
            .ok_or(PayloadError::MissingRepositoryName)?
            .to_string();
        let git_ref = payload
            .get("ref")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            repository,
            git_ref,
        })
    }
}

/// `repository.full_name` of any event payload.
pub fn repository_full_name(payload: &Value) -> Option<&str> {
    payload.get("repository")?.get("full_name")?.as_str()
}
