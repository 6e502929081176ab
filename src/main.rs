//! Weft CLI - layered workflow execution engine

use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio_stream::StreamExt;

use weft::adapter::{AdapterSet, MockAdapter};
use weft::coordinator::{BackgroundCoordinator, StreamCoordinator};
use weft::error::{EngineError, FixSuggestion};
use weft::executor::NodeExecutor;
use weft::store::{MemoryRunStore, RunStatus, RunStore};
use weft::workflow::{RunConfig, Workflow};

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Weft - layered workflow execution engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file, printing one JSON event per line
    Run {
        /// Path to workflow JSON file
        file: String,

        /// Path to run configuration JSON file
        #[arg(short, long)]
        config: Option<String>,

        /// Run durably in the background and poll the run record
        #[arg(long)]
        background: bool,
    },

    /// Validate a workflow file (structure and capability table)
    Validate {
        /// Path to workflow JSON file
        file: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            file,
            config,
            background,
        } => run_workflow(&file, config.as_deref(), background).await,
        Commands::Validate { file } => validate_workflow(&file).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

async fn load_workflow(file: &str) -> Result<Workflow, EngineError> {
    let json = tokio::fs::read_to_string(file).await?;
    Workflow::from_json(&json)
}

async fn load_config(file: Option<&str>) -> Result<RunConfig, EngineError> {
    match file {
        Some(path) => {
            let json = tokio::fs::read_to_string(path).await?;
            Ok(serde_json::from_str(&json)?)
        }
        None => Ok(RunConfig::default()),
    }
}

/// The CLI backs every capability with the mock adapter; real
/// deployments wire concrete adapters through the library API.
fn executor() -> NodeExecutor {
    NodeExecutor::new(AdapterSet::uniform(Arc::new(MockAdapter::new())))
}

async fn run_workflow(
    file: &str,
    config_file: Option<&str>,
    background: bool,
) -> Result<(), EngineError> {
    let workflow = load_workflow(file).await?;
    let config = load_config(config_file).await?;

    if background {
        run_background(workflow, config).await
    } else {
        run_streaming(workflow, config).await
    }
}

async fn run_streaming(workflow: Workflow, config: RunConfig) -> Result<(), EngineError> {
    let coordinator = StreamCoordinator::new(executor());
    let mut stream = coordinator.execute(workflow, config);

    let mut failed = false;
    while let Some(event) = stream.next().await {
        println!("{}", serde_json::to_string(&event)?);
        if matches!(event, weft::StreamEvent::Error { .. }) {
            failed = true;
        }
    }

    if failed {
        return Err(EngineError::Adapter("workflow run failed".to_string()));
    }
    Ok(())
}

async fn run_background(workflow: Workflow, config: RunConfig) -> Result<(), EngineError> {
    let store = Arc::new(MemoryRunStore::new());
    let coordinator = BackgroundCoordinator::new(executor(), Arc::clone(&store) as Arc<dyn RunStore>);

    let run_id = coordinator.execute(workflow, config).await;
    let run = store
        .get(&run_id)
        .ok_or_else(|| EngineError::Adapter("run record missing".to_string()))?;

    println!("{}", serde_json::to_string_pretty(&run)?);

    match run.status {
        RunStatus::Completed => Ok(()),
        _ => Err(EngineError::Adapter(
            run.error.unwrap_or_else(|| "workflow run failed".to_string()),
        )),
    }
}

async fn validate_workflow(file: &str) -> Result<(), EngineError> {
    let workflow = load_workflow(file).await?;
    let layers = weft::coordinator::plan(&workflow)?;

    println!(
        "{} {} valid: {} nodes, {} edges, {} layers",
        "✓".green().bold(),
        workflow.workflow_id.bold(),
        workflow.nodes.len(),
        workflow.edges.len(),
        layers.len()
    );
    for layer in &layers {
        let ids: Vec<&str> = layer.nodes.iter().map(|n| n.id.as_str()).collect();
        println!("  layer {}: [{}]", layer.index, ids.join(", "));
    }
    Ok(())
}
