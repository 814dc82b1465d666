use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::client::credentials::{DEFAULT_PASSWORD_VAR, DEFAULT_USERNAME_VAR};
use crate::client::retry::RetryPolicy;
use crate::core::codec::{Anchor, TimestampCodec};
use crate::core::constants::{RequestMethod, DEFAULT_DATA_SOURCE, DEFAULT_TIMEOUT_SECS};
use crate::core::error::{PimsError, Result};
use crate::core::format::{TagRequest, TimeWindow};
use crate::core::query::QueryBuilder;

fn default_scheme() -> String {
    "http".to_string()
}

fn default_data_source() -> String {
    DEFAULT_DATA_SOURCE.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_concurrency() -> usize {
    1
}

/// Connection settings shared by every session of a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_data_source")]
    pub data_source: String,
    #[serde(default)]
    pub method: RequestMethod,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub max_concurrent_tags: usize,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Replaces the built-in anchor table when present.
    #[serde(default)]
    pub anchors: Option<Vec<Anchor>>,
}

impl ClientConfig {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            scheme: default_scheme(),
            data_source: default_data_source(),
            method: RequestMethod::default(),
            timeout_secs: default_timeout_secs(),
            max_concurrent_tags: default_concurrency(),
            retry: RetryPolicy::default(),
            anchors: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(PimsError::Config("server is empty".to_string()));
        }
        if self.scheme != "http" && self.scheme != "https" {
            return Err(PimsError::Config(format!("unsupported scheme {}", self.scheme)));
        }
        if self.timeout_secs == 0 {
            return Err(PimsError::Config("timeout_secs must be positive".to_string()));
        }
        self.codec()?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn concurrency(&self) -> usize {
        self.max_concurrent_tags.max(1)
    }

    pub fn codec(&self) -> Result<TimestampCodec> {
        match &self.anchors {
            Some(anchors) => TimestampCodec::new(anchors.clone()),
            None => Ok(TimestampCodec::default()),
        }
    }

    pub fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::new(&self.scheme, &self.server, self.method)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialVars {
    #[serde(default = "default_username_var")]
    pub username_var: String,
    #[serde(default = "default_password_var")]
    pub password_var: String,
}

fn default_username_var() -> String {
    DEFAULT_USERNAME_VAR.to_string()
}

fn default_password_var() -> String {
    DEFAULT_PASSWORD_VAR.to_string()
}

impl Default for CredentialVars {
    fn default() -> Self {
        Self {
            username_var: default_username_var(),
            password_var: default_password_var(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// One extraction run of the `pims-sync` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub client: ClientConfig,
    pub tags: Vec<TagRequest>,
    pub window: TimeWindow,
    #[serde(default)]
    pub credentials: CredentialVars,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl JobConfig {
    pub fn validate(&self) -> Result<()> {
        self.client.validate()?;
        self.window.validate()?;
        if self.tags.iter().all(|t| t.tag.trim().is_empty()) {
            return Err(PimsError::Config("no tags requested".to_string()));
        }
        Ok(())
    }
}
