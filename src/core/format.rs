// Data structures shared by the codec, parser and sessions

use crate::core::error::{PimsError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Millisecond count on the historian's anchor-relative timescale.
pub type PimsTimestamp = i64;

/// Calendar window requested by the caller, `start <= stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, stop: NaiveDateTime) -> Result<Self> {
        let window = Self { start, stop };
        window.validate()?;
        Ok(window)
    }

    /// Deserialized windows bypass `new`, so sessions call this again.
    pub fn validate(&self) -> Result<()> {
        if self.start > self.stop {
            return Err(PimsError::InvalidWindow {
                start: self.start,
                stop: self.stop,
            });
        }
        Ok(())
    }
}

/// Per-page window on the PIMS scale. Only the lower bound moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PimsWindow {
    pub start: PimsTimestamp,
    pub stop: PimsTimestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub pims_time: PimsTimestamp,
    pub value: Value,
}

impl Sample {
    pub fn new(pims_time: PimsTimestamp, value: Value) -> Self {
        Self { pims_time, value }
    }
}

/// Chronological, duplicate-free history of one tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagSeries {
    pub tag: String,
    /// Display name for the series; the tag itself unless the caller renamed it.
    pub name: String,
    pub timestamps: Vec<NaiveDateTime>,
    pub values: Vec<Value>,
}

impl TagSeries {
    pub fn new(tag: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            name: name.into(),
            timestamps: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn push(&mut self, timestamp: NaiveDateTime, value: Value) {
        self.timestamps.push(timestamp);
        self.values.push(value);
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied()
    }
}

/// One entry of a batch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRequest {
    pub tag: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl TagRequest {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            name: None,
        }
    }

    pub fn named(tag: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            name: Some(name.into()),
        }
    }

    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.tag,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 6, 20)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn window_rejects_reversed_bounds() {
        assert!(TimeWindow::new(at(0), at(1)).is_ok());
        assert!(TimeWindow::new(at(1), at(1)).is_ok());
        assert!(matches!(
            TimeWindow::new(at(2), at(1)),
            Err(PimsError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("operator", "s3cret");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("operator"));
        assert!(!printed.contains("s3cret"));
    }

    #[test]
    fn display_name_falls_back_to_tag() {
        assert_eq!(TagRequest::new("TI-100").display_name(), "TI-100");
        assert_eq!(
            TagRequest::named("TI-100", "reactor_temp").display_name(),
            "reactor_temp"
        );
        assert_eq!(TagRequest::named("TI-100", " ").display_name(), "TI-100");
    }
}
