//! CLI entry point for the m4b conversion engine.
//!
//! Loads configuration, verifies the transcoder is present, submits one
//! conversion per item directory given on the command line, and follows the
//! event stream until every job reaches a terminal state.

use clap::Parser;
use m4b_engine::{
    check_transcoder_available, run_status_server, Config, ConversionEngine, ConversionRequest,
    EngineEvent, EngineSettings, MemoryStore, SourceFile,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// m4b engine - audiobook conversion to chaptered m4b
#[derive(Parser, Debug)]
#[command(name = "m4b-engine")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (config.toml)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Base directory for temporary conversion artifacts (overrides config)
    #[arg(short, long)]
    temp_dir: Option<PathBuf>,

    /// Audio files to convert, in playback order; all must belong to one item
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Title for the converted audiobook (defaults to the parent directory name)
    #[arg(long)]
    title: Option<String>,
}

fn item_title(args: &Args) -> String {
    if let Some(title) = &args.title {
        return title.clone();
    }
    args.inputs[0]
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let mut config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) if !args.config.exists() => {
            warn!("config file {} not found, using defaults ({e})", args.config.display());
            Config::default()
        }
        Err(e) => {
            error!("failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(temp_dir) = &args.temp_dir {
        config.paths.temp_dir = temp_dir.clone();
    }

    if let Err(e) = check_transcoder_available(&config.conversion.ffmpeg_path).await {
        error!("startup check failed: {e}");
        return ExitCode::FAILURE;
    }

    let settings = EngineSettings::from_config(&config);
    let engine = ConversionEngine::new(settings, Arc::new(MemoryStore::new()));

    if config.server.status_port != 0 {
        let registry = engine.registry();
        let slots = engine.slots();
        let port = config.server.status_port;
        tokio::spawn(async move {
            if let Err(e) = run_status_server(registry, slots, port).await {
                warn!("status server stopped: {e}");
            }
        });
        info!(
            "status endpoint on http://127.0.0.1:{}/status",
            config.server.status_port
        );
    }

    let title = item_title(&args);
    let request = ConversionRequest {
        item_id: title.clone(),
        item_title: title,
        sources: args
            .inputs
            .iter()
            .map(|path| SourceFile {
                path: path.clone(),
                duration_secs: None,
                title: path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            })
            .collect(),
    };

    let mut events = engine.subscribe();
    let job = match engine.start_conversion(request).await {
        Ok(view) => view,
        Err(e) => {
            error!("conversion rejected: {e}");
            engine.shutdown().await;
            return ExitCode::FAILURE;
        }
    };
    info!(job_id = %job.id, title = %job.item_title, "conversion started");

    let exit = loop {
        match events.recv().await {
            Ok(EngineEvent::JobStatus { job: view }) if view.id == job.id => {
                info!(
                    status = %view.status,
                    progress = view.progress,
                    "{}",
                    view.message
                );
                if view.status.is_terminal() {
                    if view.status == m4b_engine::JobStatus::Completed {
                        break ExitCode::SUCCESS;
                    }
                    if let Some(err) = view.error {
                        error!("conversion failed: {err}");
                    }
                    break ExitCode::FAILURE;
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("event stream closed: {e}");
                break ExitCode::FAILURE;
            }
        }
    };

    engine.shutdown().await;
    exit
}
