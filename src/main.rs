use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use indexflow::cluster::KubectlExecutor;
use indexflow::config::{ClusterConfig, OrchestratorConfig, PipelineSpec};
use indexflow::job::JobRecord;
use indexflow::runner::{CommandEngine, JobRunner};
use indexflow::scheduler::Scheduler;
use indexflow::shutdown::install_shutdown_handler;
use indexflow::store::{FileJobStore, JobStore};

#[derive(Parser, Debug)]
#[command(name = "indexflow")]
#[command(version)]
#[command(about = "Schedules and tracks long-running indexing jobs on a shared cluster")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the scheduler (one reconcile cycle or the periodic daemon)
    Scheduler(SchedulerArgs),

    /// Job management commands
    Job {
        #[command(flatten)]
        store: StoreArgs,

        #[command(subcommand)]
        command: JobCommands,
    },
}

// =============================================================================
// Shared Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct StoreArgs {
    /// Directory the job store persists records in
    #[arg(long, default_value = "jobs")]
    store_dir: PathBuf,
}

#[derive(Parser, Debug)]
struct ClusterArgs {
    /// Namespace indexing workloads are created in
    #[arg(long, default_value = "default")]
    namespace: String,

    /// Container image the workload runs
    #[arg(long, default_value = "indexflow:latest")]
    image: String,

    /// Service account attached to the workload pod
    #[arg(long, default_value = "default")]
    service_account: String,

    /// Path to the kubectl binary
    #[arg(long, default_value = "kubectl")]
    kubectl: String,
}

impl ClusterArgs {
    fn to_config(&self) -> ClusterConfig {
        ClusterConfig {
            namespace: self.namespace.clone(),
            image: self.image.clone(),
            service_account: self.service_account.clone(),
            kubectl_path: self.kubectl.clone(),
        }
    }
}

#[derive(Parser, Debug)]
struct SchedulerArgs {
    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    cluster: ClusterArgs,

    /// Seconds between reconcile cycles
    #[arg(long, default_value = "60")]
    interval_secs: u64,

    /// Run a single reconcile cycle and exit (for external cron triggers)
    #[arg(long)]
    once: bool,
}

// =============================================================================
// Job Commands
// =============================================================================

#[derive(clap::Subcommand, Debug)]
enum JobCommands {
    /// Create a new indexing job request in SCHEDULED state
    Create {
        /// Human-readable index name (the job id derives from it)
        index_name: String,

        /// Human-readable name of the storage holding the input documents
        #[arg(long)]
        storage_name: String,

        /// Optional prompt override files, carried through opaquely
        #[arg(long)]
        entity_extraction_prompt: Option<PathBuf>,

        #[arg(long)]
        summarize_descriptions_prompt: Option<PathBuf>,

        #[arg(long)]
        community_report_prompt: Option<PathBuf>,
    },

    /// Run one indexing job to completion (the workload entry point)
    Run {
        /// The job id
        job_id: String,

        /// Pipeline spec file (ordered stages with commands)
        #[arg(long, default_value = "pipeline.json")]
        pipeline: PathBuf,
    },

    /// Show status, progress and completion percentage of a job
    Status {
        /// The job id
        job_id: String,

        #[arg(long, short = 'o', default_value = "table")]
        output: OutputFormat,
    },

    /// List all jobs ordered by request time
    List {
        #[arg(long, short = 'o', default_value = "table")]
        output: OutputFormat,
    },

    /// Put a FAILED job back in the queue
    Reschedule {
        /// The job id
        job_id: String,

        #[command(flatten)]
        cluster: ClusterArgs,
    },
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct JobStatusOutput {
    job_id: String,
    index_name: String,
    status: String,
    percent_complete: f64,
    progress: String,
    epoch_request_time: i64,
}

#[derive(Serialize)]
struct JobListItem {
    job_id: String,
    status: String,
    percent_complete: f64,
    epoch_request_time: i64,
}

fn status_output(record: &JobRecord) -> JobStatusOutput {
    JobStatusOutput {
        job_id: record.id.clone(),
        index_name: record.human_readable_index_name.clone(),
        status: record.status.to_string(),
        percent_complete: record.percent_complete,
        progress: record.progress.clone(),
        epoch_request_time: record.epoch_request_time,
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn run_scheduler(args: SchedulerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = OrchestratorConfig {
        store_dir: args.store.store_dir,
        interval_secs: args.interval_secs,
        cluster: args.cluster.to_config(),
    };

    let store = Arc::new(FileJobStore::open(config.store_dir.clone()).await?);
    let executor = Arc::new(KubectlExecutor::new(config.cluster.clone()));
    let scheduler = Scheduler::new(store, executor);

    if args.once {
        scheduler.run_once().await?;
        return Ok(());
    }

    tracing::info!(
        interval_secs = config.interval_secs,
        store_dir = %config.store_dir.display(),
        namespace = %config.cluster.namespace,
        "Starting scheduler daemon"
    );
    let shutdown = install_shutdown_handler();
    scheduler
        .run_forever(Duration::from_secs(config.interval_secs), shutdown)
        .await;
    Ok(())
}

async fn read_prompt(path: Option<PathBuf>) -> Result<Option<String>, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(Some(tokio::fs::read_to_string(path).await?)),
        None => Ok(None),
    }
}

async fn handle_job_create(
    store: Arc<dyn JobStore>,
    index_name: String,
    storage_name: String,
    entity_extraction_prompt: Option<PathBuf>,
    summarize_descriptions_prompt: Option<PathBuf>,
    community_report_prompt: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut record = JobRecord::new(&index_name, &storage_name);
    record.entity_extraction_prompt = read_prompt(entity_extraction_prompt).await?;
    record.summarize_descriptions_prompt = read_prompt(summarize_descriptions_prompt).await?;
    record.community_report_prompt = read_prompt(community_report_prompt).await?;

    let job_id = record.id.clone();
    store.create(record).await?;
    println!("Job created: {job_id}");
    Ok(())
}

async fn handle_job_run(
    store: Arc<dyn JobStore>,
    job_id: String,
    pipeline: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec = PipelineSpec::load(&pipeline).await?;
    let engine = Arc::new(CommandEngine::new(spec));
    let runner = JobRunner::new(store, engine);

    if let Err(e) = runner.run(&job_id).await {
        eprintln!("Error: indexing job failed: {e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn handle_job_status(
    store: Arc<dyn JobStore>,
    job_id: String,
    output_format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let record = store.load(&job_id).await?;

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&status_output(&record))?);
        }
        OutputFormat::Table => {
            println!("Job ID:     {}", record.id);
            println!("Index:      {}", record.human_readable_index_name);
            println!("Status:     {}", record.status);
            println!("Complete:   {:.2}%", record.percent_complete);
            if !record.progress.is_empty() {
                println!("Progress:   {}", record.progress);
            }
            if !record.failed_workflows.is_empty() {
                println!("Failed:     {}", record.failed_workflows.join(", "));
            }
        }
    }
    Ok(())
}

async fn handle_job_list(
    store: Arc<dyn JobStore>,
    output_format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut records = store.list().await?;
    records.sort_by_key(|r| r.epoch_request_time);

    match output_format {
        OutputFormat::Json => {
            let items: Vec<JobListItem> = records
                .iter()
                .map(|r| JobListItem {
                    job_id: r.id.clone(),
                    status: r.status.to_string(),
                    percent_complete: r.percent_complete,
                    epoch_request_time: r.epoch_request_time,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Table => {
            if records.is_empty() {
                println!("No jobs found.");
            } else {
                println!("{:<40} {:<12} {:>8}  REQUESTED", "JOB ID", "STATUS", "DONE");
                println!("{}", "-".repeat(78));
                for record in &records {
                    println!(
                        "{:<40} {:<12} {:>7.2}%  {}",
                        record.id,
                        record.status.to_string(),
                        record.percent_complete,
                        record.epoch_request_time
                    );
                }
            }
        }
    }
    Ok(())
}

async fn handle_job_reschedule(
    store: Arc<dyn JobStore>,
    job_id: String,
    cluster: ClusterArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let executor = Arc::new(KubectlExecutor::new(cluster.to_config()));
    let scheduler = Scheduler::new(store, executor);
    scheduler.reschedule(&job_id).await?;
    println!("Job rescheduled: {job_id}");
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Scheduler(scheduler_args) => {
            run_scheduler(scheduler_args).await?;
        }
        Commands::Job { store, command } => {
            let store: Arc<dyn JobStore> = Arc::new(FileJobStore::open(store.store_dir).await?);

            match command {
                JobCommands::Create {
                    index_name,
                    storage_name,
                    entity_extraction_prompt,
                    summarize_descriptions_prompt,
                    community_report_prompt,
                } => {
                    handle_job_create(
                        store,
                        index_name,
                        storage_name,
                        entity_extraction_prompt,
                        summarize_descriptions_prompt,
                        community_report_prompt,
                    )
                    .await?;
                }
                JobCommands::Run { job_id, pipeline } => {
                    handle_job_run(store, job_id, pipeline).await?;
                }
                JobCommands::Status { job_id, output } => {
                    handle_job_status(store, job_id, output).await?;
                }
                JobCommands::List { output } => {
                    handle_job_list(store, output).await?;
                }
                JobCommands::Reschedule { job_id, cluster } => {
                    handle_job_reschedule(store, job_id, cluster).await?;
                }
            }
        }
    }

    Ok(())
}
