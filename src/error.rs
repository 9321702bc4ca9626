/// Error kinds surfaced by the tuner.
///
/// None of these are fatal: every one is returned as a value and handled at
/// the session/driver boundary.

use crate::session::{RequestId, Status};
use thiserror::Error;

/// A pulse sequence that violates its shape invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PulseError {
    #[error("pulse sequence is empty")]
    Empty,

    #[error("vibrations has {vibrations} entries but delays has {delays}")]
    LengthMismatch { vibrations: usize, delays: usize },

    #[error("{field}[{index}] = {value} is not a valid duration in milliseconds")]
    InvalidValue {
        field: &'static str,
        index: usize,
        value: i64,
    },
}

/// Anything that keeps a generation request from producing a usable pair.
///
/// Transport and content failures are deliberately one type: the session
/// recovers from all of them the same way.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("no API key: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("generation service returned HTTP {0}")]
    Status(u16),

    #[error("API error or empty response")]
    EmptyResponse,

    #[error("could not parse candidate data: {0}")]
    Parse(String),

    #[error("option {option} is malformed: {source}")]
    Malformed {
        option: &'static str,
        #[source]
        source: PulseError,
    },
}

impl From<serde_json::Error> for GenerationError {
    fn from(e: serde_json::Error) -> Self {
        GenerationError::Parse(e.to_string())
    }
}

/// Session operation rejected without changing any state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot {action} while {state}")]
    InvalidTransition { state: Status, action: &'static str },

    #[error("result for request {request} is stale (outstanding: {outstanding:?})")]
    StaleResult {
        request: RequestId,
        outstanding: Option<RequestId>,
    },
}
