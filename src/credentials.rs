//! Test account credentials taken from the environment.
//!
//! All three values are required. They are read once, embedded in the
//! generated test plan, and never logged.

use std::fmt;
use thiserror::Error;

pub const SERVER_URL_VAR: &str = "IMMICH_TEST_SERVER_URL";
pub const EMAIL_VAR: &str = "IMMICH_TEST_EMAIL";
pub const PASSWORD_VAR: &str = "IMMICH_TEST_PASSWORD";

/// Every variable the run needs, in plan order
pub const REQUIRED_VARS: [&str; 3] = [SERVER_URL_VAR, EMAIL_VAR, PASSWORD_VAR];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Set {}, {}, and {} environment variables (missing: {})", REQUIRED_VARS[0], REQUIRED_VARS[1], REQUIRED_VARS[2], .missing.join(", "))]
pub struct CredentialsError {
    /// Variables that were unset or empty
    pub missing: Vec<&'static str>,
}

/// Server URL and account used by the UI tests
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub server_url: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server_url", &self.server_url)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the process environment
    pub fn from_env() -> Result<Self, CredentialsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through `lookup`; empty values count as missing
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CredentialsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = Vec::with_capacity(REQUIRED_VARS.len());
        let mut missing = Vec::new();

        for key in REQUIRED_VARS {
            match lookup(key) {
                Some(value) if !value.is_empty() => values.push(value),
                _ => missing.push(key),
            }
        }

        if !missing.is_empty() {
            return Err(CredentialsError { missing });
        }

        let mut values = values.into_iter();
        Ok(Self {
            server_url: values.next().unwrap_or_default(),
            email: values.next().unwrap_or_default(),
            password: values.next().unwrap_or_default(),
        })
    }

    /// (variable, value) pairs in plan order
    pub fn entries(&self) -> [(&'static str, &str); 3] {
        [
            (SERVER_URL_VAR, &self.server_url),
            (EMAIL_VAR, &self.email),
            (PASSWORD_VAR, &self.password),
        ]
    }
}
