// src/config.rs
//
// =============================================================================
// PIPELINE RUNNER: SERVICE CONFIGURATION
// =============================================================================
//
// Everything that is neither part of the job nor a secret: endpoints, API
// versions, timeouts, retry policy and the on-VM folder layout.
// Loaded from YAML; every field has a default so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::retry::RetryConfig;

pub const GENOMICS_VERSION: &str = "v1alpha2";
pub const STORAGE_VERSION: &str = "v1";

/// Folder layout on the VM and document-shape switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Relative folder every input file is copied into.
    pub mounted_input_folder: String,
    /// Relative folder swept back to `storage_output` after the run.
    pub mounted_output_folder: String,
    /// Reproduce the old behaviour where a non-empty zone list replaces the
    /// per-run disk size list.
    pub legacy_zone_override: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            mounted_input_folder: "input".into(),
            mounted_output_folder: "output".into(),
            legacy_zone_override: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub genomics_endpoint: String,
    pub storage_endpoint: String,
    pub discovery_endpoint: String,
    pub genomics_version: String,
    pub storage_version: String,
    pub timeout_secs: u64,
    /// Fetch both discovery documents during `Session::connect`.
    pub discover_on_connect: bool,
    pub retry: RetryConfig,
    #[serde(flatten)]
    pub layout: LayoutOptions,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            genomics_endpoint: "https://genomics.googleapis.com".into(),
            storage_endpoint: "https://storage.googleapis.com".into(),
            discovery_endpoint: "https://www.googleapis.com".into(),
            genomics_version: GENOMICS_VERSION.into(),
            storage_version: STORAGE_VERSION.into(),
            timeout_secs: 60,
            discover_on_connect: true,
            retry: RetryConfig::default(),
            layout: LayoutOptions::default(),
        }
    }
}

impl ServiceConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        // An empty document deserializes to unit, not a map.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Self = serde_yaml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be greater than zero".into()));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config("retry.backoff_multiplier must be >= 1.0".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `https://www.googleapis.com/discovery/v1/apis/{api}/{version}/rest`
    pub fn discovery_url(&self, api: &str, version: &str) -> String {
        format!(
            "{}/discovery/v1/apis/{}/{}/rest",
            self.discovery_endpoint.trim_end_matches('/'),
            api,
            version
        )
    }
}
