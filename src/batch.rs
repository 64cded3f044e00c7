//! Runs one conversation per persona × scenario combination and writes each
//! transcript to `<output>/<persona>/<scenario>.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::agent::Agent;
use crate::catalog::{Catalog, Persona, Scenario};
use crate::config::Config;
use crate::consts::{DEFAULT_MAX_ROUNDS, format_duration};
use crate::conversation::{Conversation, ConversationConfig, Termination};
use crate::events::EventBus;
use crate::llm::{Llm, TokenUsage};
use crate::spinner::Spinner;

/// One persona/scenario pairing.
#[derive(Debug, Clone, Copy)]
pub struct Job<'a> {
    pub persona: &'a Persona,
    pub scenario: &'a Scenario,
}

impl Job<'_> {
    pub fn label(&self) -> String {
        format!("{}/{}", self.persona.name, self.scenario.name)
    }

    pub fn output_path(&self, output_dir: &Path) -> PathBuf {
        output_dir
            .join(&self.persona.name)
            .join(format!("{}.json", self.scenario.name))
    }
}

/// Every persona paired with every scenario, persona-major.
pub fn combinations(catalog: &Catalog) -> Vec<Job<'_>> {
    catalog
        .personas
        .iter()
        .flat_map(|persona| {
            catalog
                .scenarios
                .iter()
                .map(move |scenario| Job { persona, scenario })
        })
        .collect()
}

/// Which slice of the combination list to run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Selection {
    pub limit: Option<usize>,
    /// Takes precedence over `limit`.
    pub last_two: bool,
}

impl Selection {
    pub fn apply<T>(&self, mut items: Vec<T>) -> Vec<T> {
        if self.last_two {
            let start = items.len().saturating_sub(2);
            return items.split_off(start);
        }
        if let Some(limit) = self.limit
            && limit > 0
            && limit < items.len()
        {
            items.truncate(limit);
        }
        items
    }
}

pub struct BatchOptions {
    pub output_dir: PathBuf,
    pub timeout: Duration,
    pub max_rounds: usize,
    /// Draw a spinner and per-job result lines.
    pub show_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(crate::consts::DEFAULT_OUTPUT_DIR),
            timeout: Duration::from_secs(crate::consts::DEFAULT_TIMEOUT_SECS),
            max_rounds: DEFAULT_MAX_ROUNDS,
            show_progress: false,
        }
    }
}

/// Outcome of a single successful job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub label: String,
    pub path: PathBuf,
    pub termination: Termination,
    pub utterances: usize,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone)]
pub struct JobFailure {
    pub label: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub completed: Vec<JobReport>,
    pub failed: Vec<JobFailure>,
    pub usage: TokenUsage,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}

/// Remaining-time estimate from the mean duration of finished jobs.
pub fn eta(elapsed: Duration, done: usize, total: usize) -> Option<Duration> {
    if done == 0 || done >= total {
        return None;
    }
    let per_job = elapsed / done as u32;
    Some(per_job * (total - done) as u32)
}

pub struct BatchRunner {
    base: Config,
    catalog: Catalog,
    llm: Arc<dyn Llm>,
    options: BatchOptions,
    events: Option<Arc<EventBus>>,
}

impl BatchRunner {
    /// Fails fast on a config without two agents or a catalog that cannot render.
    pub fn new(
        base: Config,
        catalog: Catalog,
        llm: Arc<dyn Llm>,
        options: BatchOptions,
    ) -> Result<Self> {
        base.require_pair()?;
        catalog.validate()?;
        Ok(Self {
            base,
            catalog,
            llm,
            options,
            events: None,
        })
    }

    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn jobs(&self, selection: Selection) -> Vec<Job<'_>> {
        selection.apply(combinations(&self.catalog))
    }

    /// Run `jobs` one after another. A failed job is recorded and skipped.
    pub async fn run(&self, jobs: &[Job<'_>]) -> BatchSummary {
        let started = Instant::now();
        let mut summary = BatchSummary::default();
        let total = jobs.len();

        for (i, job) in jobs.iter().enumerate() {
            let label = job.label();
            let spinner = self.options.show_progress.then(|| {
                let remaining = eta(started.elapsed(), i, total)
                    .map(|d| format!(" · ETA {}", format_duration(d)))
                    .unwrap_or_default();
                Spinner::start(format!(
                    "[{}/{}] {} × {}{}",
                    i + 1,
                    total,
                    job.persona.name,
                    job.scenario.name,
                    remaining
                ))
            });

            let result = self.run_job(job).await;

            if let Some(spinner) = spinner {
                spinner.stop().await;
            }

            match result {
                Ok(report) => {
                    if self.options.show_progress {
                        println!(
                            "✓ {} ({} utterances, {})",
                            report.label,
                            report.utterances,
                            describe(&report.termination)
                        );
                    }
                    summary.usage.add(report.usage);
                    summary.completed.push(report);
                }
                Err(e) => {
                    let error = format!("{:#}", e);
                    tracing::error!(label = %label, error = %error, "conversation failed");
                    if self.options.show_progress {
                        eprintln!("✗ {}: {}", label, error);
                    }
                    summary.failed.push(JobFailure { label, error });
                }
            }
        }

        summary.elapsed = started.elapsed();
        summary
    }

    async fn run_job(&self, job: &Job<'_>) -> Result<JobReport> {
        let label = job.label();
        tracing::info!(label = %label, "starting conversation");

        let interviewer = self.catalog.interviewer_prompt(job.scenario)?;
        let technician = self.catalog.technician_prompt(job.persona, job.scenario)?;
        let config = self.base.with_prompts(interviewer, technician)?;

        let agents = config
            .agents
            .iter()
            .cloned()
            .map(|agent| Agent::new(agent, Arc::clone(&self.llm), self.options.timeout))
            .collect();

        let mut conversation = Conversation::new(
            agents,
            config.initial_message(),
            ConversationConfig {
                max_rounds: self.options.max_rounds,
                ..ConversationConfig::default()
            },
        );
        if let Some(bus) = &self.events {
            conversation = conversation.with_events(Arc::clone(bus), label.clone());
        }

        let termination = conversation.run().await;

        let path = job.output_path(&self.options.output_dir);
        conversation.save(&path)?;

        Ok(JobReport {
            label,
            path,
            termination,
            utterances: conversation.transcript().len(),
            usage: conversation.usage(),
        })
    }
}

fn describe(termination: &Termination) -> String {
    match termination {
        Termination::StopPhrase(phrase) => format!("stopped on \"{}\"", phrase),
        Termination::TurnLimit => "turn limit".to_string(),
        Termination::NotEnoughAgents => "not enough agents".to_string(),
    }
}
