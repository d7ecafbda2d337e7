//! End-to-end orchestration through the library API with a scripted generator.

use scribe::events::ProgressBus;
use scribe::generation::{GenerationError, ScriptedGenerator, TextGenerator};
use scribe::orchestrator::{
    CoordinatorSettings, JsonSessionStore, PhaseCoordinator, SessionOrchestrator, SessionStore,
};
use scribe::pattern::InMemoryPatternSource;
use scribe_common::{
    Pattern, PhaseDefinition, PhaseStatus, ProgressEvent, Range, SessionConfig, SessionStatus,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn words(n: usize) -> String {
    vec!["word"; n].join(" ")
}

fn two_phase_pattern() -> Pattern {
    Pattern::new(
        "duo",
        "Duo",
        vec![
            PhaseDefinition::new("opening", "Opening", 1, Range::new(10, 20)),
            PhaseDefinition::new("ending", "Ending", 2, Range::new(10, 20)),
        ],
    )
}

struct Fixture {
    dir: TempDir,
    bus: Arc<ProgressBus>,
    generator: Arc<ScriptedGenerator>,
}

impl Fixture {
    fn new(generator: ScriptedGenerator) -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            bus: Arc::new(ProgressBus::new()),
            generator: Arc::new(generator),
        }
    }

    fn orchestrator(&self) -> SessionOrchestrator {
        let coordinator = PhaseCoordinator::new(self.generator.clone() as Arc<dyn TextGenerator>)
            .with_settings(CoordinatorSettings {
                backoff_base: Duration::from_millis(1),
                ..CoordinatorSettings::default()
            });
        SessionOrchestrator::new(
            Arc::new(InMemoryPatternSource::new().with_pattern(two_phase_pattern())),
            Arc::new(JsonSessionStore::new(self.dir.path().join("sessions"))),
            coordinator,
            self.dir.path().join("output"),
        )
        .with_bus(self.bus.clone())
    }
}

fn record_events(
    bus: &Arc<ProgressBus>,
    session_id: &str,
) -> (scribe::events::Subscription, Arc<Mutex<Vec<ProgressEvent>>>) {
    let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::default();
    let sink = events.clone();
    let sub = bus.subscribe(session_id, move |e: &ProgressEvent| {
        sink.lock().unwrap().push(e.clone());
    });
    (sub, events)
}

#[tokio::test]
async fn test_two_phase_session_end_to_end() {
    let fixture = Fixture::new(ScriptedGenerator::always(words(15)));
    let orchestrator = fixture.orchestrator();
    let (_sub, events) = record_events(&fixture.bus, "e2e");

    orchestrator
        .initialize_session(SessionConfig::new("tides"), "duo", Some("e2e"))
        .await
        .unwrap();
    let session = orchestrator
        .generate_all("e2e", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.total_word_count, 30);
    assert!(session.phases.iter().all(|p| p.validated));

    let output = fixture.dir.path().join("output").join("e2e");
    assert!(output.join("01-opening.txt").exists());
    assert!(output.join("02-ending.txt").exists());

    let events = events.lock().unwrap();
    let phase_events: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Phase(p) => Some((p.phase_id.clone(), p.status)),
            _ => None,
        })
        .collect();
    assert_eq!(
        phase_events,
        vec![
            ("opening".to_string(), PhaseStatus::InProgress),
            ("opening".to_string(), PhaseStatus::Completed),
            ("ending".to_string(), PhaseStatus::InProgress),
            ("ending".to_string(), PhaseStatus::Completed),
        ]
    );
    let completed_session_events = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::Session(s) if s.status == SessionStatus::Completed))
        .count();
    assert_eq!(completed_session_events, 2);
    assert!(events.iter().all(|e| e.session_id() == "e2e"));
}

#[tokio::test]
async fn test_persisted_session_matches_returned_session() {
    let fixture = Fixture::new(ScriptedGenerator::always(words(12)));
    let orchestrator = fixture.orchestrator();
    orchestrator
        .initialize_session(SessionConfig::new("t"), "duo", Some("p1"))
        .await
        .unwrap();
    let session = orchestrator
        .generate_all("p1", &CancellationToken::new())
        .await
        .unwrap();

    let store = JsonSessionStore::new(fixture.dir.path().join("sessions"));
    let stored = store.load("p1").await.unwrap().unwrap();
    assert_eq!(stored, session);
}

#[tokio::test]
async fn test_resume_after_interrupted_phase() {
    // first phase lands, second is left InProgress as if the process died
    let fixture = Fixture::new(ScriptedGenerator::always(words(15)));
    let orchestrator = fixture.orchestrator();
    let (mut session, context) = orchestrator
        .initialize_session(SessionConfig::new("t"), "duo", Some("crash"))
        .await
        .unwrap();

    let opening = &context.phases[0];
    let path = scribe::orchestrator::content_path(&session.output_dir, opening);
    std::fs::write(&path, "Saved opening. ".repeat(5)).unwrap();
    session
        .phase_mut("opening")
        .unwrap()
        .mark_completed(path, 10, 4, true, vec![]);
    session.phase_mut("ending").unwrap().mark_in_progress();
    session.status = SessionStatus::Running;
    orchestrator.save_session(&session).await.unwrap();

    let session = orchestrator
        .resume("crash", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fixture.generator.calls(), 1);
    assert!(
        fixture.generator.requests()[0]
            .user_prompt
            .contains("Saved opening.")
    );
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.total_word_count, 10 + 15);
}

#[tokio::test]
async fn test_resume_reruns_phase_with_missing_content_file() {
    let fixture = Fixture::new(ScriptedGenerator::always(words(15)));
    let orchestrator = fixture.orchestrator();
    orchestrator
        .initialize_session(SessionConfig::new("t"), "duo", Some("lost"))
        .await
        .unwrap();
    let session = orchestrator
        .generate_all("lost", &CancellationToken::new())
        .await
        .unwrap();
    let calls = fixture.generator.calls();

    let opening_path = session.phase("opening").unwrap().content_path.clone().unwrap();
    std::fs::remove_file(&opening_path).unwrap();

    orchestrator
        .resume("lost", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(fixture.generator.calls(), calls + 1);
    assert!(opening_path.exists());
}

#[tokio::test]
async fn test_generate_all_skips_leading_completed_phases() {
    let fixture = Fixture::new(ScriptedGenerator::always(words(15)));
    let orchestrator = fixture.orchestrator();
    let (mut session, context) = orchestrator
        .initialize_session(SessionConfig::new("t"), "duo", Some("skip"))
        .await
        .unwrap();
    let path = scribe::orchestrator::content_path(&session.output_dir, &context.phases[0]);
    std::fs::write(&path, words(15)).unwrap();
    session
        .phase_mut("opening")
        .unwrap()
        .mark_completed(path, 15, 6, true, vec![]);
    orchestrator.save_session(&session).await.unwrap();

    orchestrator
        .generate_all("skip", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fixture.generator.calls(), 1);
    // the context starts empty, so there is no previous section
    assert!(
        !fixture.generator.requests()[0]
            .user_prompt
            .contains("## Previous Section")
    );
}

#[tokio::test]
async fn test_validation_retry_then_unvalidated_completion() {
    // always too short: first attempt plus two retries, then kept as-is
    let fixture = Fixture::new(ScriptedGenerator::always(words(3)));
    let orchestrator = fixture.orchestrator();
    orchestrator
        .initialize_session(SessionConfig::new("t"), "duo", Some("short"))
        .await
        .unwrap();
    let session = orchestrator
        .generate_all("short", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fixture.generator.calls(), 6);
    assert_eq!(session.status, SessionStatus::Completed);
    let opening = session.phase("opening").unwrap();
    assert!(!opening.validated);
    assert!(!opening.warnings.is_empty());
    assert_eq!(session.total_word_count, 6);

    let retry_prompt = &fixture.generator.requests()[1].user_prompt;
    assert!(retry_prompt.starts_with("## CORRECTIONS REQUIRED"));
}

#[tokio::test]
async fn test_connection_failure_stops_session() {
    let fixture = Fixture::new(ScriptedGenerator::new(vec![Err(
        GenerationError::connection("connection refused"),
    )]));
    let orchestrator = fixture.orchestrator();
    orchestrator
        .initialize_session(SessionConfig::new("t"), "duo", Some("down"))
        .await
        .unwrap();
    let err = orchestrator
        .generate_all("down", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Phase 'Opening' failed"));

    let session = orchestrator.load_session("down").await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.phase("opening").unwrap().status, PhaseStatus::Failed);
    assert_eq!(session.phase("ending").unwrap().status, PhaseStatus::Pending);
}

#[tokio::test]
async fn test_concurrent_sessions_keep_events_apart() {
    let fixture = Fixture::new(ScriptedGenerator::always(words(15)));
    let orchestrator = Arc::new(fixture.orchestrator());
    let mut recorders = Vec::new();
    for id in ["a", "b", "c"] {
        orchestrator
            .initialize_session(SessionConfig::new(id), "duo", Some(id))
            .await
            .unwrap();
        recorders.push((id, record_events(&fixture.bus, id)));
    }

    let mut handles = Vec::new();
    for id in ["a", "b", "c"] {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator
                .generate_all(id, &CancellationToken::new())
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for (id, (_sub, events)) in &recorders {
        let events = events.lock().unwrap();
        assert!(events.iter().all(|e| e.session_id() == *id));
        let phase_events = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Phase(_)))
            .count();
        assert_eq!(phase_events, 4);
    }
}
