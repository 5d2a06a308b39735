// src/services/genomics.rs
//
// =============================================================================
// PIPELINE RUNNER: GENOMICS EXECUTION ADAPTER (v 0.2 )
// =============================================================================
//
// POST {genomics_endpoint}/{version}/pipelines:run
//
// Responsibilities:
// 1. Bearer auth + client-side timeout on every request.
// 2. Retry transient failures (connect/timeout, 429, 5xx) with backoff.
// 3. Tag every attempt of one submission with the same X-Request-Id.
// 4. Return the Operation body untouched.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::ServiceConfig;
use crate::core::JobSpecDocument;
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::services::http::{self, is_retryable_status};
use crate::services::ExecutionService;

const SERVICE: &str = "genomics";

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

pub struct GenomicsClient {
    http: Client,
    credentials: Credentials,
    run_url: String,
    retry: RetryConfig,
}

impl GenomicsClient {
    pub async fn connect(credentials: &Credentials, cfg: &ServiceConfig) -> Result<Self> {
        let client = http::build_client(cfg, SERVICE)?;

        if cfg.discover_on_connect {
            let url = cfg.discovery_url(SERVICE, &cfg.genomics_version);
            http::discover(&client, credentials, &url, SERVICE).await?;
        }

        Ok(Self {
            http: client,
            credentials: credentials.clone(),
            run_url: format!(
                "{}/{}/pipelines:run",
                cfg.genomics_endpoint.trim_end_matches('/'),
                cfg.genomics_version
            ),
            retry: cfg.retry.clone(),
        })
    }

    pub fn run_url(&self) -> &str {
        &self.run_url
    }

    async fn submit_once(&self, document: &JobSpecDocument, request_id: &str) -> Result<Value> {
        let resp = self
            .http
            .post(&self.run_url)
            .bearer_auth(self.credentials.bearer())
            .header(REQUEST_ID_HEADER, request_id)
            .json(document)
            .send()
            .await
            .map_err(|e| http::transport_error(SERVICE, e, Error::Submission))?;

        let status = resp.status();
        if status.is_success() {
            return http::json_body(SERVICE, resp, Error::Submission).await;
        }

        // The body usually carries the service's own explanation.
        let body = match resp.text().await {
            Ok(body) => body.trim().to_string(),
            Err(e) => {
                log::warn!("Could not read {} error body ({}): {}", SERVICE, status, e);
                format!("<unreadable body: {}>", e)
            }
        };
        let message = format!("{} returned {}: {}", SERVICE, status, body);
        if is_retryable_status(status) {
            Err(Error::transient(SERVICE, message))
        } else {
            Err(Error::submission(message))
        }
    }
}

#[async_trait]
impl ExecutionService for GenomicsClient {
    async fn submit(&self, document: &JobSpecDocument, request_id: &str) -> Result<Value> {
        retry_with_backoff(&self.retry, "pipelines.run", || {
            self.submit_once(document, request_id)
        })
        .await
        .map_err(|e| http::exhausted(e, Error::Submission))
    }
}
