use std::env;

use crate::core::error::{PimsError, Result};
use crate::core::format::Credentials;

pub const DEFAULT_USERNAME_VAR: &str = "PIMS_USERNAME";
pub const DEFAULT_PASSWORD_VAR: &str = "PIMS_PASSWORD";

/// Source of the username/password pair used for every call of a batch.
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self) -> Result<Credentials>;
}

impl CredentialProvider for Credentials {
    fn credentials(&self) -> Result<Credentials> {
        Ok(self.clone())
    }
}

/// Reads the pair from two environment variables.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    pub username_var: String,
    pub password_var: String,
}

impl EnvCredentials {
    pub fn new(username_var: impl Into<String>, password_var: impl Into<String>) -> Self {
        Self {
            username_var: username_var.into(),
            password_var: password_var.into(),
        }
    }

    fn read(var: &str) -> Result<String> {
        match env::var(var) {
            Ok(val) if !val.is_empty() => Ok(val),
            Ok(_) => Err(PimsError::Credentials(format!("{} is empty", var))),
            Err(e) => Err(PimsError::Credentials(format!("{}: {}", var, e))),
        }
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME_VAR, DEFAULT_PASSWORD_VAR)
    }
}

impl CredentialProvider for EnvCredentials {
    fn credentials(&self) -> Result<Credentials> {
        Ok(Credentials::new(
            Self::read(&self.username_var)?,
            Self::read(&self.password_var)?,
        ))
    }
}
