// src/credentials.rs
//
// =============================================================================
// PIPELINE RUNNER: CREDENTIALS
// =============================================================================
//
// An opaque bearer credential. Acquisition is the identity provider's job
// (e.g. `gcloud auth application-default print-access-token`); we only pick
// the result up from the environment and attach it to requests.

use std::fmt;

use crate::error::{Error, Result};

/// Environment variables consulted by `Credentials::application_default`,
/// in priority order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["PIPELINE_RUNNER_ACCESS_TOKEN", "GOOGLE_OAUTH_ACCESS_TOKEN"];

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_token: String,
}

impl Credentials {
    pub fn from_token(token: impl Into<String>) -> Result<Self> {
        let access_token = token.into().trim().to_string();
        if access_token.is_empty() {
            return Err(Error::Credential("access token is empty".into()));
        }
        Ok(Self { access_token })
    }

    /// Reads the first non-empty token from `TOKEN_ENV_VARS`.
    pub fn application_default() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `application_default` with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in TOKEN_ENV_VARS {
            if let Some(token) = lookup(key).filter(|t| !t.trim().is_empty()) {
                log::debug!("Using access token from {}", key);
                return Self::from_token(token);
            }
        }
        Err(Error::Credential(format!(
            "no access token found; set one of {}",
            TOKEN_ENV_VARS.join(", ")
        )))
    }

    pub(crate) fn bearer(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .finish()
    }
}
