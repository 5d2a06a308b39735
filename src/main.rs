// src/main.rs
//
// =============================================================================
// PIPELINE RUNNER: COMMANDER & ENTRY POINT (v 0.2 )
// =============================================================================
//
// Modes:
// 1. SUBMIT: Describe a job from flags, print the document, submit it.
// 2. CONFIG: Print the default service configuration as YAML.
//
// Example:
//   pipeline-runner submit \
//       --project my-project --name samtools-index \
//       --docker-image gcr.io/my-project/samtools:1.3.1 \
//       --storage-output gs://out-bucket --storage-logging gs://log-bucket \
//       --disk mydisk:/mnt/data \
//       --input mydisk:gs://genomics-public-data/sample.bam \
//       --command 'ls -la /mnt/data/input'

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;

use pipeline_runner::{Credentials, JobDescriptor, PipelineBuilder, ServiceConfig, Session};

// ============================================================================
// 1. CLI DEFINITION
// ============================================================================

#[derive(Parser)]
#[command(
    name = "pipeline-runner",
    version,
    about = "Build and submit Genomics pipeline jobs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a job document and submit it.
    Submit(SubmitArgs),

    /// Print the default service configuration.
    Config,
}

#[derive(Args)]
struct SubmitArgs {
    /// Billing-enabled project id.
    #[arg(long)]
    project: String,

    /// Name of this pipeline run.
    #[arg(long)]
    name: String,

    /// Docker image (e.g. ubuntu, gcr.io/{project}/{tool}:{tag}).
    #[arg(long)]
    docker_image: String,

    /// Bucket path that output folders are copied to.
    #[arg(long)]
    storage_output: String,

    /// Bucket path for pipeline logs.
    #[arg(long)]
    storage_logging: String,

    /// Disk as NAME:MOUNT_POINT[:SIZE_GB]. Repeatable.
    #[arg(long = "disk", value_parser = parse_disk)]
    disks: Vec<DiskArg>,

    /// Input as DISK:gs://bucket/object. Repeatable.
    #[arg(long = "input", value_parser = parse_input)]
    inputs: Vec<(String, String)>,

    /// Shell command to run once inputs are copied.
    #[arg(long)]
    command: Option<String>,

    /// Treat --command as base64.
    #[arg(long, requires = "command")]
    command_base64: bool,

    /// Memory in GB.
    #[arg(long)]
    memory: Option<f64>,

    /// Number of cores.
    #[arg(long)]
    cores: Option<u32>,

    /// Compute zone. Repeatable.
    #[arg(long = "zone")]
    zones: Vec<String>,

    /// YAML service configuration.
    #[arg(long)]
    config: Option<String>,

    /// Check that every input exists before submitting.
    #[arg(long)]
    verify_inputs: bool,

    /// Print the document only.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Clone)]
struct DiskArg {
    name: String,
    mount_point: String,
    size_gb: Option<u32>,
}

fn parse_disk(raw: &str) -> std::result::Result<DiskArg, String> {
    let mut parts = raw.splitn(3, ':');
    let name = parts.next().filter(|s| !s.is_empty());
    let mount_point = parts.next().filter(|s| !s.is_empty());
    let (name, mount_point) = match (name, mount_point) {
        (Some(n), Some(m)) => (n.to_string(), m.to_string()),
        _ => return Err(format!("expected NAME:MOUNT_POINT[:SIZE_GB], got '{}'", raw)),
    };
    let size_gb = parts
        .next()
        .map(|s| s.parse::<u32>().map_err(|e| format!("bad disk size '{}': {}", s, e)))
        .transpose()?;
    Ok(DiskArg {
        name,
        mount_point,
        size_gb,
    })
}

fn parse_input(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once(':') {
        Some((disk, source)) if !disk.is_empty() && !source.is_empty() => {
            Ok((disk.to_string(), source.to_string()))
        }
        _ => Err(format!("expected DISK:gs://bucket/object, got '{}'", raw)),
    }
}

// ============================================================================
// 2. ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match cli.command {
        Commands::Submit(args) => run_submit(args).await,
        Commands::Config => {
            let yaml = serde_yaml::to_string(&ServiceConfig::default())?;
            print!("{}", yaml);
            Ok(())
        }
    }
}

// ============================================================================
// 3. SUBMIT
// ============================================================================

async fn run_submit(args: SubmitArgs) -> Result<()> {
    let cfg = match &args.config {
        Some(path) => ServiceConfig::load(path).context("Failed to load service config")?,
        None => ServiceConfig::default(),
    };

    // 1. Describe
    let mut descriptor = JobDescriptor::new(
        &args.project,
        &args.name,
        &args.docker_image,
        &args.storage_output,
        &args.storage_logging,
    )
    .with_zones(args.zones.clone());
    if let Some(memory) = args.memory {
        descriptor = descriptor.with_memory_gb(memory);
    }
    if let Some(cores) = args.cores {
        descriptor = descriptor.with_cores(cores);
    }

    let mut pipeline = PipelineBuilder::with_layout(descriptor, cfg.layout.clone());

    for disk in &args.disks {
        pipeline.add_disk_with(&disk.name, &disk.mount_point, disk.size_gb, true);
    }
    for (disk, source) in &args.inputs {
        pipeline.add_input(disk, source);
    }
    if let Some(command) = &args.command {
        pipeline
            .set_command(command, args.command_base64)
            .context("Invalid --command")?;
    }

    // 2. Build
    let document = pipeline.build();
    let mut out = std::io::stdout().lock();
    writeln!(out, "Pipeline Arguments:")?;
    writeln!(out, "{}", serde_json::to_string_pretty(document)?)?;

    if args.dry_run {
        log::info!("📐 Dry run: nothing submitted.");
        return Ok(());
    }

    // 3. Connect
    let credentials = Credentials::application_default()?;
    let session = Session::connect(&credentials, &cfg)
        .await
        .context("Failed to connect to Google services")?;

    if args.verify_inputs {
        let missing = pipeline.verify_inputs(session.storage()).await?;
        if !missing.is_empty() {
            return Err(anyhow!("Missing inputs: {}", missing.join(", ")));
        }
    }

    // 4. Submit
    let operation = pipeline.run(session.executor()).await?;
    writeln!(out, "Pipeline Response:")?;
    writeln!(out, "{}", serde_json::to_string_pretty(&operation.response)?)?;

    log::info!(
        "Polling is not implemented; track {} in the console.",
        operation.name.as_deref().unwrap_or("the operation")
    );
    Ok(())
}
