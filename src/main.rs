//! Runbook CLI - run and validate workflow files

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use runbook::report::RunStatus;
use runbook::runtime::{select_tasks, validate_run};
use runbook::{
    Engine, FixSuggestion, Registry, Reporter, RunRequest, RunResponse, RunbookConfig,
    RunbookError, Workflow,
};

/// Used when neither flags, environment nor config set a timing
const FALLBACK_INITIAL_DELAY: Duration = Duration::from_millis(1000);
const FALLBACK_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "runbook")]
#[command(about = "Runbook - declarative workflow and test orchestration")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow file
    Run {
        /// Path to the workflow YAML file
        file: PathBuf,

        /// Task selector: '*', a task name, or comma-separated names
        #[arg(short, long, default_value = "*")]
        tasks: String,

        /// Parameter seeded into the root scope (key=value, value parsed as YAML)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,

        /// Block until the run finishes and print the published state
        #[arg(long)]
        sync: bool,

        /// Include parameters in the published state
        #[arg(long)]
        publish_params: bool,

        /// Config file (defaults to ~/.config/runbook/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Delay before the first drain of the event stream
        #[arg(long)]
        initial_delay_ms: Option<u64>,

        /// Maximum wait between empty drains
        #[arg(long)]
        poll_interval_ms: Option<u64>,
    },

    /// Validate a workflow file against the built-in services
    Validate {
        /// Path to the workflow YAML file
        file: PathBuf,

        /// Task selector to validate
        #[arg(short, long, default_value = "*")]
        tasks: String,
    },
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let value = serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    // Log lines stay quiet by default so they don't interleave with the report
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            file,
            tasks,
            params,
            sync,
            publish_params,
            config,
            initial_delay_ms,
            poll_interval_ms,
        } => {
            let options = RunOptions {
                tasks,
                params,
                sync,
                publish_params,
                config,
                initial_delay_ms,
                poll_interval_ms,
            };
            run_workflow(&file, options).await
        }
        Commands::Validate { file, tasks } => validate_workflow(&file, &tasks).await,
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            if let Some(suggestion) = e.fix_suggestion() {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
            std::process::exit(1);
        }
    }
}

struct RunOptions {
    tasks: String,
    params: Vec<(String, Value)>,
    sync: bool,
    publish_params: bool,
    config: Option<PathBuf>,
    initial_delay_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
}

async fn load_workflow(file: &Path) -> Result<Workflow, RunbookError> {
    // Async read to not block the runtime
    let yaml = tokio::fs::read_to_string(file).await?;
    Workflow::from_yaml(&yaml)
}

/// Returns whether the run succeeded
async fn run_workflow(file: &Path, options: RunOptions) -> Result<bool, RunbookError> {
    let workflow = load_workflow(file).await?;
    let name = workflow.name.clone();

    let engine = Engine::new(Registry::with_builtins()?);
    engine.register_workflow(workflow)?;

    let mut request = RunRequest::new(name).tasks(options.tasks);
    for (key, value) in options.params {
        request = request.param(key, value);
    }
    if options.publish_params {
        request = request.publish_params();
    }

    if options.sync {
        let response = engine.run(request).await?;
        if let RunResponse::Completed { data, .. } = response {
            let json = serde_json::to_string_pretty(&data).map_err(|e| RunbookError::InvalidRequest {
                reason: format!("published state is not serializable: {}", e),
            })?;
            println!("{}", json);
        }
        return Ok(true);
    }

    let config = match &options.config {
        Some(path) => RunbookConfig::load_from(path)?,
        None => RunbookConfig::load()?,
    }
    .with_env()?;
    let mut reporter_config = config.reporter_config(FALLBACK_INITIAL_DELAY, FALLBACK_POLL_INTERVAL);
    if let Some(ms) = options.initial_delay_ms {
        reporter_config.initial_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = options.poll_interval_ms {
        reporter_config.poll_interval = Duration::from_millis(ms);
    }

    let response = engine.run(request.asynchronous()).await?;
    let mut reporter = Reporter::new(reporter_config, std::io::stdout());
    let summary = reporter.follow(&engine, response.session_id()).await?;
    Ok(summary.status == RunStatus::Success)
}

async fn validate_workflow(file: &Path, selector: &str) -> Result<bool, RunbookError> {
    let workflow = load_workflow(file).await?;
    let registry = Registry::with_builtins()?;
    let tasks = select_tasks(&workflow, selector)?;
    validate_run(&workflow, &tasks, &registry)?;

    println!("{} Workflow '{}' is valid", "✓".green(), file.display());
    println!("  Name: {}", workflow.name);
    println!("  Tasks: {}", workflow.tasks.len());
    println!("  Selected: {}", tasks.len());
    Ok(true)
}
