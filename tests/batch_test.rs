use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use debrief::batch::{BatchOptions, BatchRunner, Selection};
use debrief::catalog::{Catalog, Persona, Scenario, Ticket};
use debrief::config::Config;
use debrief::conversation::{Termination, TranscriptFile};
use debrief::llm::{Reply, TokenUsage};
use debrief::llm::mock::{MockLlm, Scripted};
use debrief::llm::simulated::SimulatedLlm;

const CONFIG: &str = r#"{
    "agents": [
        {"name": "Assistant", "model": "gemini-2.5-flash", "temperature": 0.7,
         "ctx_size": 512, "system_prompt": ""},
        {"name": "Marco", "model": "gemini-2.5-flash", "temperature": 0.9,
         "ctx_size": 512, "system_prompt": ""}
    ],
    "settings": {"initial_message": "Start the debriefing call."}
}"#;

fn small_catalog() -> Catalog {
    let mut tickets = BTreeMap::new();
    tickets.insert(
        "A".to_string(),
        Ticket {
            ticket_id: "ST-1".to_string(),
            customer_problem: "boiler pressure drops".to_string(),
        },
    );
    Catalog {
        interviewer_template: "Ticket {ticket_id}: {customer_problem}.".to_string(),
        tickets,
        personas: vec![
            Persona {
                name: "Terse".to_string(),
                template: "Be terse. You know: {knowledge}".to_string(),
            },
            Persona {
                name: "Chatty".to_string(),
                template: "Chat a lot. You know: {knowledge}".to_string(),
            },
        ],
        scenarios: vec![
            Scenario {
                name: "Valve".to_string(),
                ticket: "A".to_string(),
                knowledge: "replaced the expansion valve".to_string(),
            },
            Scenario {
                name: "Nothing".to_string(),
                ticket: "A".to_string(),
                knowledge: "found nothing wrong".to_string(),
            },
        ],
    }
}

fn options(dir: &std::path::Path, max_rounds: usize) -> BatchOptions {
    BatchOptions {
        output_dir: dir.to_path_buf(),
        timeout: Duration::from_secs(5),
        max_rounds,
        show_progress: false,
    }
}

#[tokio::test]
async fn dry_run_writes_one_transcript_per_combination() {
    let dir = tempfile::tempdir().unwrap();
    let runner = BatchRunner::new(
        Config::parse(CONFIG).unwrap(),
        small_catalog(),
        Arc::new(SimulatedLlm),
        options(dir.path(), 2),
    )
    .unwrap();

    let jobs = runner.jobs(Selection::default());
    assert_eq!(jobs.len(), 4);

    let summary = runner.run(&jobs).await;
    assert_eq!(summary.completed.len(), 4);
    assert!(summary.failed.is_empty());

    for persona in ["Terse", "Chatty"] {
        for scenario in ["Valve", "Nothing"] {
            let path = dir.path().join(persona).join(format!("{}.json", scenario));
            assert!(path.exists(), "missing {}", path.display());
        }
    }

    let saved = TranscriptFile::read(&dir.path().join("Chatty").join("Valve.json")).unwrap();
    assert_eq!(
        saved.agents[0].system_prompt,
        "Ticket ST-1: boiler pressure drops."
    );
    assert_eq!(
        saved.agents[1].system_prompt,
        "Chat a lot. You know: replaced the expansion valve"
    );
    // Simulated replies never say goodbye, so the turn limit decides.
    assert_eq!(saved.conversation.len(), 5);
    assert_eq!(
        saved.conversation[0].message,
        "[SIMULATED RESPONSE for Assistant]"
    );
    assert_eq!(summary.completed[0].termination, Termination::TurnLimit);
}

#[tokio::test]
async fn selection_narrows_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let runner = BatchRunner::new(
        Config::parse(CONFIG).unwrap(),
        small_catalog(),
        Arc::new(SimulatedLlm),
        options(dir.path(), 1),
    )
    .unwrap();

    let first = runner.jobs(Selection {
        limit: Some(1),
        last_two: false,
    });
    let labels: Vec<String> = first.iter().map(|j| j.label()).collect();
    assert_eq!(labels, vec!["Terse/Valve"]);

    let last = runner.jobs(Selection {
        limit: Some(1),
        last_two: true,
    });
    let labels: Vec<String> = last.iter().map(|j| j.label()).collect();
    assert_eq!(labels, vec!["Chatty/Valve", "Chatty/Nothing"]);

    let summary = runner.run(&last).await;
    assert_eq!(summary.completed.len(), 2);
    assert!(!dir.path().join("Terse").exists());
}

#[tokio::test]
async fn failed_write_is_recorded_and_batch_continues() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the output directory should be.
    let blocked = dir.path().join("blocked");
    std::fs::write(&blocked, "not a directory").unwrap();

    let runner = BatchRunner::new(
        Config::parse(CONFIG).unwrap(),
        small_catalog(),
        Arc::new(SimulatedLlm),
        options(&blocked, 1),
    )
    .unwrap();

    let jobs = runner.jobs(Selection::default());
    let summary = runner.run(&jobs).await;

    assert!(summary.completed.is_empty());
    assert_eq!(summary.failed.len(), 4);
    assert_eq!(summary.total(), 4);
    assert_eq!(summary.failed[0].label, "Terse/Valve");
}

#[tokio::test]
async fn usage_is_summed_over_the_batch() {
    let with_usage = |text: &str| {
        Scripted::Reply(Reply {
            text: Some(text.to_string()),
            feedback: None,
            usage: Some(TokenUsage {
                input_tokens: 10,
                output_tokens: 2,
            }),
        })
    };
    // One job: greeting, reply, goodbye.
    let llm = Arc::new(MockLlm::new(vec![
        with_usage("Hello"),
        with_usage("Hi"),
        with_usage("Thanks, goodbye"),
    ]));

    let dir = tempfile::tempdir().unwrap();
    let runner = BatchRunner::new(
        Config::parse(CONFIG).unwrap(),
        small_catalog(),
        llm.clone(),
        options(dir.path(), 15),
    )
    .unwrap();

    let jobs = runner.jobs(Selection {
        limit: Some(1),
        last_two: false,
    });
    let summary = runner.run(&jobs).await;

    assert_eq!(summary.completed.len(), 1);
    assert_eq!(
        summary.completed[0].termination,
        Termination::StopPhrase("goodbye".to_string())
    );
    assert_eq!(summary.usage.input_tokens, 30);
    assert_eq!(summary.usage.output_tokens, 6);
    assert_eq!(llm.calls(), 3);
}

#[test]
fn runner_rejects_single_agent_config() {
    let config = Config::parse(
        r#"{"agents": [{"name": "Solo", "model": "m", "temperature": 0.5,
            "ctx_size": 64, "system_prompt": ""}]}"#,
    )
    .unwrap();

    let err = BatchRunner::new(
        config,
        small_catalog(),
        Arc::new(SimulatedLlm),
        BatchOptions::default(),
    )
    .err()
    .unwrap();
    assert!(err.to_string().contains("1 agent(s)"));
}

#[test]
fn runner_rejects_unusable_catalog() {
    let mut catalog = small_catalog();
    catalog.scenarios[1].ticket = "Z".to_string();

    let result = BatchRunner::new(
        Config::parse(CONFIG).unwrap(),
        catalog,
        Arc::new(SimulatedLlm),
        BatchOptions::default(),
    );
    assert!(result.is_err());
}
