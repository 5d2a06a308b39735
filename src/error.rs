// src/error.rs
//
// =============================================================================
// PIPELINE RUNNER: ERROR TAXONOMY
// =============================================================================
//
// Every collaborator failure is passed straight to the caller.
// Nothing here retries or compensates; see `retry.rs` for the one place
// transient transport errors are absorbed.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No usable credential could be obtained from the environment.
    #[error("credential error: {0}")]
    Credential(String),

    /// A storage or execution service handle could not be established.
    #[error("service init error ({service}): {message}")]
    ServiceInit { service: String, message: String },

    /// An encoded command was not valid base64 / UTF-8.
    #[error("command decode error: {0}")]
    CommandDecode(String),

    /// `run()` was called before any `build()`.
    #[error("pipeline has not been built; call build() before run()")]
    NotBuilt,

    /// `run()` was called again on a document that was already accepted.
    #[error("pipeline document already submitted as {0}; call build() to submit again")]
    AlreadySubmitted(String),

    /// The execution service rejected or failed the submission.
    #[error("submission failed: {0}")]
    Submission(String),

    /// Dropped connection, timeout, throttling or 5xx reply. Worth retrying.
    /// The HTTP adapters report it as their own error once retries run out.
    #[error("transient {service} failure: {message}")]
    Transient { service: String, message: String },

    /// The object-storage service failed a lookup.
    #[error("storage error: {0}")]
    Storage(String),

    /// A storage path was not of the form `gs://bucket/object`.
    #[error("invalid storage location '{0}'")]
    InvalidLocation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn service_init(service: impl Into<String>, message: impl ToString) -> Self {
        Self::ServiceInit {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn transient(service: impl Into<String>, message: impl ToString) -> Self {
        Self::Transient {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient { .. })
    }
}
