// src/services.rs
//
// =============================================================================
// PIPELINE RUNNER: SERVICE PORTS (v 0.2 )
// =============================================================================
//
// The Hexagonal Port.
//
// Responsibilities:
// 1. Define the `ExecutionService` and `ObjectStorage` contracts.
// 2. Hold both live handles in a `Session`, established in one explicit
//    `connect` step so the builder itself never touches the network.
// 3. Shared HTTP plumbing for the concrete adapters.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::core::{JobSpecDocument, StorageLocation};
use crate::credentials::Credentials;
use crate::error::Result;

// Concrete adapters
pub mod genomics;
pub mod storage;

// ============================================================================
// 1. THE CONTRACTS
// ============================================================================

#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Submits one job document and returns the service's acknowledgement
    /// verbatim (for Genomics, a long-running Operation record).
    ///
    /// `request_id` is stable across transport retries of the same
    /// submission so the service can drop duplicates. Failures that are
    /// still transient after the last retry come back as `Error::Submission`.
    async fn submit(&self, document: &JobSpecDocument, request_id: &str) -> Result<Value>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Whether the object exists. Missing objects are `Ok(false)`, not errors.
    /// A lookup still failing transiently after the last retry is `Error::Storage`.
    async fn exists(&self, location: &StorageLocation) -> Result<bool>;
}

// ============================================================================
// 2. THE SESSION (Live Handles)
// ============================================================================

#[derive(Clone)]
pub struct Session {
    storage: Arc<dyn ObjectStorage>,
    executor: Arc<dyn ExecutionService>,
}

impl Session {
    /// Establishes the storage and Genomics handles over HTTP.
    /// Not retried: a failure here is returned as is.
    pub async fn connect(credentials: &Credentials, cfg: &ServiceConfig) -> Result<Self> {
        let storage = storage::StorageClient::connect(credentials, cfg).await?;
        let executor = genomics::GenomicsClient::connect(credentials, cfg).await?;
        log::info!(
            "🔌 Connected to genomics {} and storage {}",
            cfg.genomics_version,
            cfg.storage_version
        );
        Ok(Self::from_parts(Arc::new(storage), Arc::new(executor)))
    }

    /// Wraps already-built handles (any backend, including test fakes).
    pub fn from_parts(storage: Arc<dyn ObjectStorage>, executor: Arc<dyn ExecutionService>) -> Self {
        Self { storage, executor }
    }

    pub fn storage(&self) -> &dyn ObjectStorage {
        self.storage.as_ref()
    }

    pub fn executor(&self) -> &dyn ExecutionService {
        self.executor.as_ref()
    }
}

// ============================================================================
// 3. HELPER: SHARED HTTP PLUMBING
// ============================================================================

pub(crate) mod http {
    use super::*;
    use crate::error::Error;
    use reqwest::{Client, Response, StatusCode};

    pub fn build_client(cfg: &ServiceConfig, service: &str) -> Result<Client> {
        Client::builder()
            .timeout(cfg.timeout())
            .user_agent(concat!("pipeline-runner/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::service_init(service, e))
    }

    /// Fetches the API discovery document, the same handshake the Google
    /// client factories perform before handing out a service object.
    pub async fn discover(
        client: &Client,
        credentials: &Credentials,
        url: &str,
        service: &str,
    ) -> Result<()> {
        log::debug!("Fetching {} discovery document from {}", service, url);
        let resp = client
            .get(url)
            .bearer_auth(credentials.bearer())
            .send()
            .await
            .map_err(|e| Error::service_init(service, e))?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Credential(format!(
                "{} rejected the access token ({})",
                service,
                resp.status()
            ))),
            s => Err(Error::service_init(
                service,
                format!("discovery returned {}", s),
            )),
        }
    }

    /// Maps a reqwest failure to our taxonomy. Connect and timeout failures
    /// never reached the service and may be retried.
    pub fn transport_error(service: &str, err: reqwest::Error, permanent: fn(String) -> Error) -> Error {
        if err.is_timeout() || err.is_connect() {
            Error::transient(service, err)
        } else {
            permanent(format!("{}: {}", service, err))
        }
    }

    /// What a call reports once its retries are spent: a leftover transient
    /// failure becomes the adapter's permanent error.
    pub fn exhausted(err: Error, permanent: fn(String) -> Error) -> Error {
        match err {
            Error::Transient { message, .. } => {
                permanent(format!("{} (retries exhausted)", message))
            }
            other => other,
        }
    }

    pub fn is_retryable_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    /// Reads a body as JSON, treating an empty body as `null`.
    pub async fn json_body(service: &str, resp: Response, permanent: fn(String) -> Error) -> Result<Value> {
        let text = resp
            .text()
            .await
            .map_err(|e| transport_error(service, e, permanent))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}
