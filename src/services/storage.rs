// src/services/storage.rs
//
// Cloud Storage JSON API adapter. Only object metadata lookups are needed:
// GET {storage_endpoint}/storage/{version}/b/{bucket}/o/{object}

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::config::ServiceConfig;
use crate::core::StorageLocation;
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::services::http::{self, is_retryable_status};
use crate::services::ObjectStorage;

const SERVICE: &str = "storage";

pub struct StorageClient {
    http: Client,
    credentials: Credentials,
    base_url: String,
    retry: RetryConfig,
}

impl StorageClient {
    pub async fn connect(credentials: &Credentials, cfg: &ServiceConfig) -> Result<Self> {
        let client = http::build_client(cfg, SERVICE)?;

        if cfg.discover_on_connect {
            let url = cfg.discovery_url(SERVICE, &cfg.storage_version);
            http::discover(&client, credentials, &url, SERVICE).await?;
        }

        Ok(Self {
            http: client,
            credentials: credentials.clone(),
            base_url: format!(
                "{}/storage/{}",
                cfg.storage_endpoint.trim_end_matches('/'),
                cfg.storage_version
            ),
            retry: cfg.retry.clone(),
        })
    }

    fn object_url(&self, location: &StorageLocation) -> String {
        // Object names may contain '/', which must be escaped in the path.
        format!(
            "{}/b/{}/o/{}",
            self.base_url,
            urlencoding::encode(&location.bucket),
            urlencoding::encode(&location.object)
        )
    }

    async fn stat_once(&self, location: &StorageLocation) -> Result<bool> {
        let resp = self
            .http
            .get(self.object_url(location))
            .bearer_auth(self.credentials.bearer())
            .send()
            .await
            .map_err(|e| http::transport_error(SERVICE, e, Error::Storage))?;

        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s if is_retryable_status(s) => Err(Error::transient(
                SERVICE,
                format!("{} returned {} for {}", SERVICE, s, location),
            )),
            s => Err(Error::storage(format!(
                "{} returned {} for {}",
                SERVICE, s, location
            ))),
        }
    }
}

#[async_trait]
impl ObjectStorage for StorageClient {
    async fn exists(&self, location: &StorageLocation) -> Result<bool> {
        retry_with_backoff(&self.retry, "objects.get", || self.stat_once(location))
            .await
            .map_err(|e| http::exhausted(e, Error::Storage))
    }
}
