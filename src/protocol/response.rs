//! Response definitions
//!
//! One response line per query.

use crate::error::{Result, TideError};

/// Outcome class of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `[ok]`, with the value for a GET hit
    Ok,
    /// `[error] not found`
    NotFound,
    /// `[error] <message>`
    Error,
}

/// A response line, before encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,

    /// GET value for `Ok`, message for `Error`
    pub payload: Option<String>,
}

impl Response {
    pub fn ok(payload: Option<String>) -> Self {
        Self {
            status: Status::Ok,
            payload,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            payload: None,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            status: Status::Error,
            payload: Some(message.to_string()),
        }
    }

    /// Map the outcome of executing a command
    pub fn from_outcome(outcome: Result<Option<String>>) -> Self {
        match outcome {
            Ok(value) => Self::ok(value),
            Err(TideError::KeyNotFound) => Self::not_found(),
            Err(TideError::Protocol(message)) => Self::error(&message),
            Err(other) => Self::error(&other.to_string()),
        }
    }
}
