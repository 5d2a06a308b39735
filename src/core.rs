// src/core.rs
//
// =============================================================================
// PIPELINE RUNNER: CORE SCHEMA (v 0.2 )
// =============================================================================
//
// Two halves:
// 1. The builder-side model (what the caller declares).
// 2. The wire document (what the Genomics `pipelines:run` endpoint accepts).
//
// Wire field names are camelCase and must not drift; the document types own
// that contract through serde renames.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Default VM memory in GB.
pub const DEFAULT_MEMORY_GB: f64 = 3.75;

/// Default VM core count.
pub const DEFAULT_CORES: u32 = 1;

/// Every disk yields one output parameter with this name.
pub const OUTPUT_PARAMETER: &str = "outputPath";

/// Prefix for synthesized input parameter names (`inputFile0`, `inputFile1`, ...).
pub const INPUT_PARAMETER_PREFIX: &str = "inputFile";

// ============================================================================
// 1. JOB DESCRIPTOR (Static Identity)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSizing {
    pub memory_gb: f64,
    pub cores: u32,
    /// Empty means "let Compute Engine pick".
    #[serde(default)]
    pub zones: Vec<String>,
}

impl Default for ResourceSizing {
    fn default() -> Self {
        Self {
            memory_gb: DEFAULT_MEMORY_GB,
            cores: DEFAULT_CORES,
            zones: Vec::new(),
        }
    }
}

/// Fields fixed when the job is described. Only `resources.zones` may be
/// overridden later (see `PipelineBuilder::set_zones`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Billing-enabled project id.
    pub project: String,
    /// Name of this pipeline run.
    pub name: String,
    /// Docker image, e.g. `ubuntu` or `gcr.io/{project}/{tool}:{tag}`.
    pub image: String,
    /// Bucket path the output folders are swept into.
    pub storage_output: String,
    /// Bucket path for pipeline logs.
    pub storage_logging: String,
    #[serde(default)]
    pub resources: ResourceSizing,
}

impl JobDescriptor {
    pub fn new(
        project: impl Into<String>,
        name: impl Into<String>,
        image: impl Into<String>,
        storage_output: impl Into<String>,
        storage_logging: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            image: image.into(),
            storage_output: storage_output.into(),
            storage_logging: storage_logging.into(),
            resources: ResourceSizing::default(),
        }
    }

    pub fn with_memory_gb(mut self, memory_gb: f64) -> Self {
        self.resources.memory_gb = memory_gb;
        self
    }

    pub fn with_cores(mut self, cores: u32) -> Self {
        self.resources.cores = cores;
        self
    }

    pub fn with_zones(mut self, zones: Vec<String>) -> Self {
        self.resources.zones = zones;
        self
    }
}

// ============================================================================
// 2. DECLARATIONS (Accumulated by the Builder)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DiskDeclaration {
    pub name: String,
    pub mount_point: String,
    /// `None` leaves sizing to the service default (500 GB).
    pub size_gb: Option<u32>,
    pub auto_delete: bool,
}

/// A storage object copied onto a mounted disk before the command runs.
#[derive(Debug, Clone, PartialEq)]
pub struct InputBinding {
    /// Frozen at registration: `inputFile<N>`.
    pub parameter: String,
    pub source: String,
    pub disk: String,
    pub local_path: String,
}

/// Sweep of a disk's output folder back to `storage_output`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputBinding {
    pub disk: String,
    pub local_path: String,
}

pub fn input_parameter_name(index: usize) -> String {
    format!("{INPUT_PARAMETER_PREFIX}{index}")
}

/// Last path segment of a storage location; empty when it ends in `/`.
pub fn basename(location: &str) -> &str {
    location.rsplit('/').next().unwrap_or(location)
}

// ============================================================================
// 3. STORAGE LOCATIONS
// ============================================================================

/// A parsed `gs://bucket/object` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    pub bucket: String,
    pub object: String,
}

impl StorageLocation {
    pub fn parse(location: &str) -> Result<Self> {
        let rest = location
            .strip_prefix("gs://")
            .ok_or_else(|| Error::InvalidLocation(location.to_string()))?;

        match rest.split_once('/') {
            Some((bucket, object)) if !bucket.is_empty() && !object.is_empty() => Ok(Self {
                bucket: bucket.to_string(),
                object: object.to_string(),
            }),
            _ => Err(Error::InvalidLocation(location.to_string())),
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.object)
    }
}

// ============================================================================
// 4. THE WIRE DOCUMENT (pipelines:run request body)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpecDocument {
    pub ephemeral_pipeline: EphemeralPipeline,
    pub pipeline_args: PipelineArgs,
}

/// The template half: shape of the job, independent of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EphemeralPipeline {
    pub project_id: String,
    pub name: String,
    pub description: String,
    pub resources: PipelineResources,
    pub docker: DockerSpec,
    pub input_parameters: Vec<ParameterSpec>,
    pub output_parameters: Vec<ParameterSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResources {
    pub disks: Vec<DiskSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskSpec {
    pub name: String,
    pub auto_delete: bool,
    pub mount_point: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerSpec {
    pub image_name: String,
    /// Serialized as `null` when unset; the service rejects that, not us.
    pub cmd: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
    pub local_copy: LocalCopy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalCopy {
    pub path: String,
    pub disk: String,
}

/// The per-run half: concrete sizes, sources and destinations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineArgs {
    pub project_id: String,
    pub resources: ResourceOverrides,
    pub inputs: BTreeMap<String, String>,
    pub outputs: BTreeMap<String, String>,
    pub logging: LoggingSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOverrides {
    pub minimum_ram_gb: f64,
    pub minimum_cpu_cores: u32,
    pub disks: DiskOverrides,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
}

/// `disks` normally carries per-disk sizes. In legacy zone mode the whole
/// list is replaced by zone names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiskOverrides {
    Sized(Vec<DiskResource>),
    Zones(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskResource {
    pub name: String,
    pub size_gb: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingSpec {
    pub gcs_path: String,
}
