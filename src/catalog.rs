//! The experiment space: technician personas × knowledge scenarios, plus the
//! interviewer prompt and the service tickets the scenarios refer to.
//!
//! The default catalog is compiled in from `catalog/default.json`; a custom one
//! with the same shape can be loaded from disk.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::template;

const BUILTIN: &str = include_str!("../catalog/default.json");

/// The service ticket the interviewer calls about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub customer_problem: String,
}

/// A technician behaviour profile. `template` contains a `{knowledge}` slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub template: String,
}

/// What the technician actually found on site, tied to a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Key into [`Catalog::tickets`].
    pub ticket: String,
    pub knowledge: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Uses `{ticket_id}` and `{customer_problem}`.
    pub interviewer_template: String,
    pub tickets: BTreeMap<String, Ticket>,
    pub personas: Vec<Persona>,
    pub scenarios: Vec<Scenario>,
}

impl Catalog {
    pub fn builtin() -> Result<Self> {
        serde_json::from_str(BUILTIN).context("built-in catalog is malformed")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("invalid catalog {}", path.display()))
    }

    pub fn ticket(&self, scenario: &Scenario) -> Result<&Ticket> {
        self.tickets.get(&scenario.ticket).with_context(|| {
            format!(
                "scenario {} refers to unknown ticket {:?}",
                scenario.name, scenario.ticket
            )
        })
    }

    /// Interviewer system prompt for the ticket behind `scenario`.
    pub fn interviewer_prompt(&self, scenario: &Scenario) -> Result<String> {
        let ticket = self.ticket(scenario)?;
        template::render(
            &self.interviewer_template,
            &[
                ("ticket_id", ticket.ticket_id.as_str()),
                ("customer_problem", ticket.customer_problem.as_str()),
            ],
        )
        .context("failed to render interviewer prompt")
    }

    /// Technician system prompt: `persona` with `scenario`'s knowledge filled in.
    pub fn technician_prompt(&self, persona: &Persona, scenario: &Scenario) -> Result<String> {
        template::render(&persona.template, &[("knowledge", scenario.knowledge.as_str())])
            .with_context(|| format!("failed to render persona {}", persona.name))
    }

    /// Check the catalog can produce every combination before any API call is made.
    pub fn validate(&self) -> Result<()> {
        if self.personas.is_empty() {
            bail!("catalog has no personas");
        }
        if self.scenarios.is_empty() {
            bail!("catalog has no scenarios");
        }

        let mut seen = HashSet::new();
        for persona in &self.personas {
            check_name("persona", &persona.name)?;
            if !seen.insert(persona.name.as_str()) {
                bail!("duplicate persona {}", persona.name);
            }
            if !template::placeholders(&persona.template).iter().any(|p| p == "knowledge") {
                tracing::warn!(persona = %persona.name, "persona template has no {{knowledge}} slot");
            }
        }

        let mut seen = HashSet::new();
        for scenario in &self.scenarios {
            check_name("scenario", &scenario.name)?;
            if !seen.insert(scenario.name.as_str()) {
                bail!("duplicate scenario {}", scenario.name);
            }
            self.interviewer_prompt(scenario)?;
        }

        // Knowledge is inserted verbatim, so one scenario is enough to prove each persona renders.
        for persona in &self.personas {
            self.technician_prompt(persona, &self.scenarios[0])?;
        }

        Ok(())
    }
}

/// Names become directory and file names in the output tree.
fn check_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("catalog has a {} with an empty name", kind);
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        bail!("{} name {:?} cannot be used as a file name", kind, name);
    }
    Ok(())
}
