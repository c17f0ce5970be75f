//! ClipFlow command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipflow_analysis::AnalysisClient;
use clipflow_checkpoint::CheckpointStore;
use clipflow_media::{FfmpegToolkit, MediaToolkit};
use clipflow_models::Platform;
use clipflow_pipeline::agents::{
    HeuristicRouter, PlatformFormatter, RemoteAnalyzer, RenderingFormatter, SidecarAnalyzer,
    SpecFormatter, VideoAnalyzer,
};
use clipflow_pipeline::metrics::init_metrics;
use clipflow_pipeline::report::{write_report, PlatformReport};
use clipflow_pipeline::{
    default_stages, AnalyzerKind, BranchingWorkflow, LinearPipeline, PipelineConfig,
    PipelineState, RunOptions, StageContext, WorkflowDeps,
};

#[derive(Parser, Debug)]
#[command(name = "clipflow", author, version, about = "Resumable video segment pipeline", long_about = None)]
struct Cli {
    /// Directory holding checkpoint files
    #[arg(long, global = true, env = "CHECKPOINT_DIR")]
    checkpoint_dir: Option<PathBuf>,

    /// Ordinary backups kept per subject
    #[arg(long, global = true, env = "CHECKPOINT_MAX_BACKUPS")]
    max_backups: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the linear pipeline, resuming from the last checkpoint
    Run {
        video: PathBuf,

        /// Start at this stage index instead of the resume point
        #[arg(long)]
        start_stage: Option<usize>,

        /// Back up and clear the checkpoint first
        #[arg(long)]
        reset: bool,
    },
    /// Run the branching platform workflow
    Branch {
        video: PathBuf,

        /// Render clips with ffmpeg instead of only defining format specs
        #[arg(long)]
        render: bool,
    },
    /// List checkpoints, most recently updated first
    List,
    /// Trim checkpoint backups to --max-backups per subject
    Cleanup,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();

    let mut config = PipelineConfig::from_env();
    if let Some(dir) = cli.checkpoint_dir {
        config.store.root = dir;
    }
    if let Some(max) = cli.max_backups {
        config.store.max_backups = max;
    }
    info!("Pipeline config: {:?}", config);

    let metrics_handle = if config.metrics_enabled {
        match init_metrics() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Metrics disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let result = match cli.command {
        Command::Run {
            video,
            start_stage,
            reset,
        } => run_linear(&config, video, RunOptions { start_stage, reset }).await,
        Command::Branch { video, render } => run_branching(&config, video, render).await,
        Command::List => list_checkpoints(&config).await,
        Command::Cleanup => cleanup(&config).await,
    };

    if let Some(handle) = metrics_handle {
        let path = config.store.root.join("metrics.prom");
        if let Err(e) = tokio::fs::write(&path, handle.render()).await {
            warn!("Failed to write metrics snapshot {}: {}", path.display(), e);
        }
    }

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn build_analyzer(config: &PipelineConfig) -> anyhow::Result<Arc<dyn VideoAnalyzer>> {
    Ok(match config.analyzer {
        AnalyzerKind::Sidecar => Arc::new(SidecarAnalyzer),
        AnalyzerKind::Remote => Arc::new(RemoteAnalyzer::new(
            AnalysisClient::from_env().context("Failed to create analysis client")?,
        )),
    })
}

async fn run_linear(
    config: &PipelineConfig,
    video: PathBuf,
    options: RunOptions,
) -> anyhow::Result<()> {
    let media: Arc<dyn MediaToolkit> = Arc::new(FfmpegToolkit::from_env());
    let ctx = Arc::new(StageContext::new(config, media, build_analyzer(config)?));
    let pipeline = LinearPipeline::new(
        CheckpointStore::from_config(&config.store),
        default_stages(ctx),
    )?;

    let mut state = PipelineState::new(&video);
    let outcome = pipeline.run(&mut state, options).await?;

    println!("Subject:   {}", state.subject);
    println!("Completed: {}", outcome.checkpoint.completed_labels().join(", "));
    println!(
        "Executed {:?}, skipped {:?}, already satisfied {:?}",
        outcome.executed, outcome.skipped, outcome.satisfied
    );
    for selected in &state.segments {
        println!(
            "  {}-{}  {:.2}  {}",
            selected.segment.start_time_str(),
            selected.segment.end_time_str(),
            selected.engagement_prediction,
            selected.description()
        );
    }
    if let Some(report) = &state.report_path {
        println!("Report:    {}", report.display());
    }

    match state.error {
        Some(e) => anyhow::bail!("Pipeline stopped at stage {}: {}", outcome.checkpoint.current_stage, e),
        None => Ok(()),
    }
}

async fn run_branching(config: &PipelineConfig, video: PathBuf, render: bool) -> anyhow::Result<()> {
    let media: Arc<dyn MediaToolkit> = Arc::new(FfmpegToolkit::from_env());
    let formatters = Platform::ALL
        .iter()
        .map(|platform| {
            let formatter: Arc<dyn PlatformFormatter> = if render {
                Arc::new(RenderingFormatter::new(media.clone(), config.output_dir.join("clips")))
            } else {
                Arc::new(SpecFormatter)
            };
            (*platform, formatter)
        })
        .collect();

    let deps = WorkflowDeps {
        media,
        analyzer: build_analyzer(config)?,
        router: Arc::new(HeuristicRouter),
        formatters,
        staging_dir: config.staging_dir.clone(),
        frame_rate: config.frame_rate,
        analysis_context: config.analysis_context.clone(),
    };
    let workflow = BranchingWorkflow::build(deps, CheckpointStore::from_config(&config.store))?;
    let run = workflow.run(&video).await?;

    let report_path = config
        .output_dir
        .join(format!("{}_platforms.json", run.state.subject));
    write_report(&report_path, &PlatformReport::from_state(&run.state)).await?;

    println!("Path:      {}", run.path.join(" -> "));
    println!("Completed: {}", run.state.stages_completed.join(", "));
    for (platform, items) in run.state.platform_content.iter() {
        println!("  {:<10} {} item(s)", platform, items.len());
    }
    println!("Report:    {}", report_path.display());

    match run.state.error {
        Some(e) => anyhow::bail!("Workflow finished with error: {}", e),
        None => Ok(()),
    }
}

async fn list_checkpoints(config: &PipelineConfig) -> anyhow::Result<()> {
    let summaries = CheckpointStore::list_all(&config.store.root).await;
    if summaries.is_empty() {
        println!("No checkpoints in {}", config.store.root.display());
        return Ok(());
    }

    for summary in summaries {
        println!("{} ({})", summary.subject_id, summary.video_path);
        println!(
            "  next stage: {} ({}), errors: {}",
            summary.current_stage, summary.current_stage_name, summary.error_count
        );
        println!("  completed:  {}", summary.stages_completed.join(", "));
        println!("  file:       {}", summary.file.display());
    }
    Ok(())
}

async fn cleanup(config: &PipelineConfig) -> anyhow::Result<()> {
    let report =
        CheckpointStore::cleanup_backups(&config.store.root, config.store.max_backups).await;
    println!(
        "Cleaned {} subject(s): removed {} backup(s), {} remaining",
        report.subjects, report.removed, report.remaining
    );
    Ok(())
}
