// src/lib.rs
//
// =============================================================================
// PIPELINE RUNNER: LIBRARY ROOT
// =============================================================================
//
// This file declares the module tree and exports public types.

// 1. Declare Modules
pub mod config;
pub mod core;
pub mod credentials;
pub mod error;
pub mod pipeline;
pub mod retry;
pub mod services;

// 2. Re-exports (The Public API)

pub use crate::config::{LayoutOptions, ServiceConfig};
pub use crate::core::{JobDescriptor, JobSpecDocument, ResourceSizing, StorageLocation};
pub use crate::credentials::Credentials;
pub use crate::error::{Error, Result};
pub use crate::pipeline::{BuildState, PipelineBuilder, SubmittedOperation};
pub use crate::services::{ExecutionService, ObjectStorage, Session};
