use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;

use debrief::banner::{BannerInfo, print_banner, print_summary};
use debrief::batch::{BatchOptions, BatchRunner, Selection};
use debrief::catalog::Catalog;
use debrief::config::{AgentConfig, Config};
use debrief::consts::{API_KEY_VAR, DEFAULT_MAX_ROUNDS, DEFAULT_OUTPUT_DIR};
use debrief::events::{Event, EventBus};
use debrief::llm::Llm;
use debrief::llm::gemini::GeminiLlm;
use debrief::llm::simulated::SimulatedLlm;
use debrief::{env, logging};

#[derive(Parser)]
#[command(
    name = "debrief",
    version,
    about = "Generate synthetic interviewer/technician debriefing conversations."
)]
struct Cli {
    /// Conversation config (JSON with two agents and an initial message)
    #[arg(short, long)]
    config: PathBuf,

    /// Directory the transcripts are written to
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    /// Use simulated replies instead of calling the API
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Only run the first N combinations
    #[arg(long)]
    limit: Option<usize>,

    /// Only run the last two combinations (overrides --limit)
    #[arg(long, default_value_t = false)]
    last_two: bool,

    /// Persona/scenario catalog (defaults to the built-in one)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Maximum technician/interviewer exchanges after the greeting
    #[arg(long, default_value_t = DEFAULT_MAX_ROUNDS)]
    max_rounds: usize,
}

fn describe_agent(agent: Option<&AgentConfig>) -> String {
    agent
        .map(|a| format!("{} ({})", a.name, a.model))
        .unwrap_or_else(|| "(none)".to_string())
}

/// Echo conversation progress into the diagnostic log.
fn spawn_event_logger(bus: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(Event::ConversationStarted { label }) => {
                    tracing::debug!(label = %label, "conversation started");
                }
                Ok(Event::TurnRecorded {
                    label,
                    turn,
                    speaker,
                    message,
                }) => {
                    tracing::debug!(label = %label, turn, speaker = %speaker, "{}", message);
                }
                Ok(Event::ConversationFinished {
                    label,
                    termination,
                    utterances,
                }) => {
                    tracing::debug!(
                        label = %label,
                        utterances,
                        termination = ?termination,
                        "conversation ended"
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_file = env::load_dotenv();
    logging::init()?;
    if let Some(path) = &env_file {
        tracing::info!(path = %path.display(), "loaded environment from .env");
    }

    let dry_run = cli.dry_run || env::dry_run_from_env();
    let timeout = env::api_timeout()?;

    let config = Config::load(&cli.config)?;
    let catalog = match &cli.catalog {
        Some(path) => Catalog::load(path)?,
        None => Catalog::builtin()?,
    };

    let llm: Arc<dyn Llm> = if dry_run {
        println!("DRY-RUN mode: no API calls will be made.");
        Arc::new(SimulatedLlm)
    } else {
        if std::env::var(API_KEY_VAR).map(|k| k.trim().is_empty()).unwrap_or(true) {
            eprintln!("warning: {} is not set; every model call will fail.", API_KEY_VAR);
        }
        Arc::new(GeminiLlm::from_env())
    };

    let options = BatchOptions {
        output_dir: cli.output.clone(),
        timeout,
        max_rounds: cli.max_rounds,
        show_progress: true,
    };

    let events = Arc::new(EventBus::default());
    let logger = spawn_event_logger(&events);

    let runner = BatchRunner::new(config.clone(), catalog, Arc::clone(&llm), options)
        .context("cannot start batch")?
        .with_events(Arc::clone(&events));

    let jobs = runner.jobs(Selection {
        limit: cli.limit,
        last_two: cli.last_two,
    });

    let backend = if dry_run {
        "simulated (dry run)".to_string()
    } else {
        llm.name().to_string()
    };
    print_banner(&BannerInfo {
        config: &cli.config,
        output: &cli.output,
        backend: &backend,
        interviewer: &describe_agent(config.interviewer()),
        technician: &describe_agent(config.technician()),
        timeout_secs: timeout.as_secs(),
        max_rounds: cli.max_rounds,
        combinations: jobs.len(),
    });

    let summary = runner.run(&jobs).await;
    print_summary(&summary);

    drop(jobs);
    drop(runner);
    drop(events);
    let _ = logger.await;

    Ok(())
}
