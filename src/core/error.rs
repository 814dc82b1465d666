// Error handling for the PIMS history client

use chrono::NaiveDateTime;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PimsError>;

#[derive(Error, Debug)]
pub enum PimsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid time window: start {start} is after stop {stop}")]
    InvalidWindow {
        start: NaiveDateTime,
        stop: NaiveDateTime,
    },

    #[error("Tag name is empty")]
    EmptyTag,

    #[error("{field} {value:?} contains \"]]>\" and cannot be quoted in a query")]
    UnquotableName { field: &'static str, value: String },

    #[error("{time} is before the oldest anchor {oldest}; encoded from the oldest anchor as {clamped}")]
    EncodingAmbiguity {
        time: NaiveDateTime,
        oldest: NaiveDateTime,
        clamped: i64,
    },

    #[error("PIMS timestamp out of range: {0}")]
    TimestampOutOfRange(i64),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Credentials unavailable: {0}")]
    Credentials(String),
}

/// Failure of a single HTTP exchange with the History endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("server rejected credentials (HTTP {0})")]
    Unauthorized(u16),

    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),
}

/// Why a page was dropped. Kept cloneable so it can travel inside an outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("undecodable response: {0}")]
    Parse(String),
}
