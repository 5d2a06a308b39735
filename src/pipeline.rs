// src/pipeline.rs
//
// =============================================================================
// PIPELINE RUNNER: JOB SPECIFICATION BUILDER (v 0.2 )
// =============================================================================
//
// The Blueprint.
//
// Lifecycle:
//   new() -> set_command / add_disk / add_input (any order, any count)
//         -> build()  (pure; document retained)
//         -> run()    (one submission per build)
//
// Rules:
// 1. Input parameter names are frozen when a source is first registered.
//    Both document sections read the stored name, so they always agree.
// 2. Every disk yields exactly one `outputPath` sweep of its output folder.
// 3. No local validation of names or commands; the service is the judge.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::LayoutOptions;
use crate::core::{
    basename, input_parameter_name, DiskDeclaration, DiskOverrides, DiskResource, DiskSpec,
    DockerSpec, EphemeralPipeline, InputBinding, JobDescriptor, JobSpecDocument, LocalCopy,
    LoggingSpec, OutputBinding, ParameterSpec, PipelineArgs, PipelineResources,
    ResourceOverrides, StorageLocation, OUTPUT_PARAMETER,
};
use crate::error::{Error, Result};
use crate::services::{ExecutionService, ObjectStorage};

// ============================================================================
// 1. STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum BuildState {
    /// No document built yet (or reset).
    Configuring,
    /// A document is retained and has not been accepted by the service.
    Built,
    /// The retained document was accepted. `build()` re-arms `run()`.
    Submitted { request_id: String },
}

/// What the execution service handed back for one accepted submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedOperation {
    /// Service-assigned operation name, when the reply carries one.
    pub name: Option<String>,
    /// Client token sent with every attempt of this submission.
    pub request_id: String,
    pub submitted_at: DateTime<Utc>,
    /// The reply, verbatim.
    pub response: Value,
}

impl SubmittedOperation {
    fn from_response(request_id: String, response: Value) -> Self {
        let name = response
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            name,
            request_id,
            submitted_at: Utc::now(),
            response,
        }
    }
}

// ============================================================================
// 2. THE BUILDER
// ============================================================================

#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    descriptor: JobDescriptor,
    layout: LayoutOptions,

    command: Option<String>,
    disks: Vec<DiskDeclaration>,
    outputs: Vec<OutputBinding>,
    // Registration order; one entry per distinct source.
    inputs: Vec<InputBinding>,
    // Takes precedence over `descriptor.resources.zones` until reset.
    zone_override: Option<Vec<String>>,

    document: Option<JobSpecDocument>,
    state: BuildState,
}

impl PipelineBuilder {
    pub fn new(descriptor: JobDescriptor) -> Self {
        Self::with_layout(descriptor, LayoutOptions::default())
    }

    pub fn with_layout(descriptor: JobDescriptor, layout: LayoutOptions) -> Self {
        Self {
            descriptor,
            layout,
            command: None,
            disks: Vec::new(),
            outputs: Vec::new(),
            inputs: Vec::new(),
            zone_override: None,
            document: None,
            state: BuildState::Configuring,
        }
    }

    // --- MUTATORS ---

    /// Sets the shell command run after inputs are localized. When
    /// `is_encoded` is set the value is standard base64 (useful for commands
    /// full of quotes). Last call wins.
    pub fn set_command(&mut self, command: &str, is_encoded: bool) -> Result<&mut Self> {
        let command = if is_encoded {
            decode_command(command)?
        } else {
            command.to_string()
        };
        self.command = Some(command);
        Ok(self)
    }

    /// Attaches an auto-deleted disk of service-default size.
    pub fn add_disk(&mut self, name: &str, mount_point: &str) -> &mut Self {
        self.add_disk_with(name, mount_point, None, true)
    }

    /// Attaches a disk and registers the sweep of `<output folder>/*` on it.
    /// Disk names are not checked for uniqueness.
    pub fn add_disk_with(
        &mut self,
        name: &str,
        mount_point: &str,
        size_gb: Option<u32>,
        auto_delete: bool,
    ) -> &mut Self {
        self.disks.push(DiskDeclaration {
            name: name.to_string(),
            mount_point: mount_point.to_string(),
            size_gb,
            auto_delete,
        });
        self.outputs.push(OutputBinding {
            disk: name.to_string(),
            local_path: format!("{}/*", self.layout.mounted_output_folder),
        });
        self
    }

    /// Registers `source` for copy into `<input folder>/<basename>` on
    /// `disk_name`. A new source is named `inputFile<k>`, k being the number
    /// of sources already registered. Registering a known source again
    /// rebinds it in place and keeps its name.
    pub fn add_input(&mut self, disk_name: &str, source: &str) -> &mut Self {
        let local_path = format!("{}/{}", self.layout.mounted_input_folder, basename(source));

        if let Some(existing) = self.inputs.iter_mut().find(|b| b.source == source) {
            log::debug!("Rebinding input {} ({})", existing.parameter, source);
            existing.disk = disk_name.to_string();
            existing.local_path = local_path;
            return self;
        }

        self.inputs.push(InputBinding {
            parameter: input_parameter_name(self.inputs.len()),
            source: source.to_string(),
            disk: disk_name.to_string(),
            local_path,
        });
        self
    }

    /// Overrides the descriptor's zone list until the next `reset()`.
    /// An empty list still counts as an override.
    pub fn set_zones(&mut self, zones: Vec<String>) -> &mut Self {
        self.zone_override = Some(zones);
        self
    }

    /// Drops every declaration, the zone override and the retained document.
    /// The descriptor is kept, so its zones apply again.
    pub fn reset(&mut self) -> &mut Self {
        self.command = None;
        self.disks.clear();
        self.outputs.clear();
        self.inputs.clear();
        self.zone_override = None;
        self.document = None;
        self.state = BuildState::Configuring;
        self
    }

    // --- BUILD ---

    /// Recomputes the document from current state, retains it for `run()`
    /// and returns it.
    pub fn build(&mut self) -> &JobSpecDocument {
        let document = self.render();
        log::debug!(
            "Built pipeline '{}': {} disk(s), {} input(s)",
            self.descriptor.name,
            self.disks.len(),
            self.inputs.len()
        );
        self.state = BuildState::Built;
        self.document.insert(document)
    }

    /// The document `build()` would produce, without retaining it.
    pub fn render(&self) -> JobSpecDocument {
        let d = &self.descriptor;

        let input_description = format!("Input file for: {}", d.name);
        let output_description = format!("Output storage path file for: {}", d.name);

        let ephemeral_pipeline = EphemeralPipeline {
            project_id: d.project.clone(),
            name: d.name.clone(),
            description: format!("Run {} on one or more files via Google Genomics", d.name),
            resources: PipelineResources {
                disks: self
                    .disks
                    .iter()
                    .map(|disk| DiskSpec {
                        name: disk.name.clone(),
                        auto_delete: disk.auto_delete,
                        mount_point: disk.mount_point.clone(),
                    })
                    .collect(),
            },
            docker: DockerSpec {
                image_name: d.image.clone(),
                cmd: self.command.clone(),
            },
            input_parameters: self
                .inputs
                .iter()
                .map(|input| ParameterSpec {
                    name: input.parameter.clone(),
                    description: input_description.clone(),
                    local_copy: LocalCopy {
                        path: input.local_path.clone(),
                        disk: input.disk.clone(),
                    },
                })
                .collect(),
            output_parameters: self
                .outputs
                .iter()
                .map(|output| ParameterSpec {
                    name: OUTPUT_PARAMETER.to_string(),
                    description: output_description.clone(),
                    local_copy: LocalCopy {
                        path: output.local_path.clone(),
                        disk: output.disk.clone(),
                    },
                })
                .collect(),
        };

        let pipeline_args = PipelineArgs {
            project_id: d.project.clone(),
            resources: self.resource_overrides(),
            inputs: self
                .inputs
                .iter()
                .map(|input| (input.parameter.clone(), input.source.clone()))
                .collect(),
            outputs: [(OUTPUT_PARAMETER.to_string(), d.storage_output.clone())]
                .into_iter()
                .collect(),
            logging: LoggingSpec {
                gcs_path: d.storage_logging.clone(),
            },
        };

        JobSpecDocument {
            ephemeral_pipeline,
            pipeline_args,
        }
    }

    fn resource_overrides(&self) -> ResourceOverrides {
        let sizing = &self.descriptor.resources;
        let sized = DiskOverrides::Sized(
            self.disks
                .iter()
                .map(|disk| DiskResource {
                    name: disk.name.clone(),
                    size_gb: disk.size_gb,
                })
                .collect(),
        );

        let zones = self.zones().to_vec();
        let (disks, zones) = if self.layout.legacy_zone_override && !zones.is_empty() {
            // Old behaviour: zones take over the disk size slot.
            (DiskOverrides::Zones(zones), Vec::new())
        } else {
            (sized, zones)
        };

        ResourceOverrides {
            minimum_ram_gb: sizing.memory_gb,
            minimum_cpu_cores: sizing.cores,
            disks,
            zones,
        }
    }

    // --- REMOTE ---

    /// Submits the most recently built document. A failed attempt leaves the
    /// builder in `Built` so the caller may try again; a successful one must
    /// be followed by `build()` before the next `run()`.
    pub async fn run(&mut self, executor: &dyn ExecutionService) -> Result<SubmittedOperation> {
        let document = match (&self.state, &self.document) {
            (BuildState::Submitted { request_id }, _) => {
                return Err(Error::AlreadySubmitted(request_id.clone()))
            }
            (_, Some(document)) => document,
            (_, None) => return Err(Error::NotBuilt),
        };

        let request_id = Uuid::new_v4().to_string();
        log::info!(
            "🚀 Submitting pipeline '{}' to project {} (request {})",
            self.descriptor.name,
            self.descriptor.project,
            request_id
        );

        let response = executor.submit(document, &request_id).await?;
        let operation = SubmittedOperation::from_response(request_id.clone(), response);

        log::info!(
            "✅ Pipeline '{}' accepted: {}",
            self.descriptor.name,
            operation.name.as_deref().unwrap_or("<unnamed operation>")
        );
        self.state = BuildState::Submitted { request_id };
        Ok(operation)
    }

    /// Looks up every registered source through `storage`. Returns the
    /// sources that do not exist, in registration order.
    pub async fn verify_inputs(&self, storage: &dyn ObjectStorage) -> Result<Vec<String>> {
        let locations = self
            .inputs
            .iter()
            .map(|input| StorageLocation::parse(&input.source).map(|loc| (input, loc)))
            .collect::<Result<Vec<_>>>()?;

        let mut missing = Vec::new();
        for (input, location) in locations {
            if !storage.exists(&location).await? {
                log::warn!("Input {} not found: {}", input.parameter, input.source);
                missing.push(input.source.clone());
            }
        }
        Ok(missing)
    }

    // --- INSPECTION ---

    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    pub fn layout(&self) -> &LayoutOptions {
        &self.layout
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn disks(&self) -> &[DiskDeclaration] {
        &self.disks
    }

    pub fn inputs(&self) -> &[InputBinding] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputBinding] {
        &self.outputs
    }

    /// The document retained by the last `build()`.
    pub fn document(&self) -> Option<&JobSpecDocument> {
        self.document.as_ref()
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    /// Zones the next `build()` will use.
    pub fn zones(&self) -> &[String] {
        self.zone_override
            .as_deref()
            .unwrap_or(&self.descriptor.resources.zones)
    }
}

fn decode_command(encoded: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::CommandDecode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| Error::CommandDecode(e.to_string()))
}
