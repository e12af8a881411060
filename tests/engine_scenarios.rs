use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use bakeoff::{
    catalog, AgentStatus, ApiKeys, BakeoffConfig, BakeoffError, EngineSettings, EvaluationEngine,
    EventLog, InMemoryGateway, LiveCallAdapter, LiveResponse, NotificationSink, PersistenceGateway,
    ResultRecord, RunOutcome, RunStatus, RunSummary, WebhookEvent,
};
use tokio_util::sync::CancellationToken;

const GPT: &str = "OpenAI – GPT-4o";
const OPUS: &str = "Anthropic – Claude 3 Opus";

fn two_provider_config() -> BakeoffConfig {
    BakeoffConfig::default()
        .select_models("openai", ["GPT-4o"])
        .select_models("anthropic", ["Claude 3 Opus"])
        .with_tests(["reasoning"])
}

/// Records every call and fails the ones it is told to.
#[derive(Default)]
struct ScriptedGateway {
    statuses: Mutex<Vec<RunStatus>>,
    saved: Mutex<Vec<Vec<ResultRecord>>>,
    fail_statuses: Vec<RunStatus>,
    fail_save: bool,
}

impl ScriptedGateway {
    fn failing_save() -> Self {
        Self {
            fail_save: true,
            ..Self::default()
        }
    }

    fn failing_status(status: RunStatus) -> Self {
        Self {
            fail_statuses: vec![status],
            ..Self::default()
        }
    }

    fn statuses(&self) -> Vec<RunStatus> {
        self.statuses.lock().unwrap().clone()
    }

    fn save_calls(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

#[async_trait]
impl PersistenceGateway for ScriptedGateway {
    async fn set_run_status(&self, _run_id: &str, status: RunStatus) -> Result<(), BakeoffError> {
        if self.fail_statuses.contains(&status) {
            return Err(BakeoffError::StatusUpdate("status table unavailable".to_string()));
        }
        self.statuses.lock().unwrap().push(status);
        Ok(())
    }

    async fn save_results(&self, _run_id: &str, results: Vec<ResultRecord>) -> Result<(), BakeoffError> {
        self.saved.lock().unwrap().push(results);
        if self.fail_save {
            return Err(BakeoffError::Persistence("insert into bakeoff_results failed".to_string()));
        }
        Ok(())
    }
}

/// Live adapter with a canned reply; optionally trips a cancellation token when dialed.
struct StubLive {
    reply: Option<LiveResponse>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    cancel_on_call: Option<CancellationToken>,
}

impl StubLive {
    fn replying(text: &str, elapsed: Duration) -> Self {
        Self {
            reply: Some(LiveResponse::new(text, elapsed)),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            cancel_on_call: None,
        }
    }

    fn failing() -> Self {
        Self {
            reply: None,
            ..Self::replying("", Duration::ZERO)
        }
    }

    fn cancelling(token: CancellationToken) -> Self {
        Self {
            cancel_on_call: Some(token),
            ..Self::replying("ok", Duration::from_millis(700))
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiveCallAdapter for StubLive {
    async fn try_call(
        &self,
        _provider_id: &str,
        _model: &str,
        prompt: &str,
        _credential: &str,
    ) -> Option<LiveResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }
        self.reply.clone()
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<(WebhookEvent, RunSummary)>>,
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: WebhookEvent, summary: &RunSummary) {
        self.events.lock().unwrap().push((event, summary.clone()));
    }
}

fn engine(gateway: Arc<dyn PersistenceGateway>) -> EvaluationEngine {
    EvaluationEngine::new(gateway)
        .with_live_adapter(Arc::new(StubLive::failing()))
        .with_settings(EngineSettings::immediate())
        .with_seed(42)
}

fn openai_key() -> Arc<ApiKeys> {
    Arc::new(ApiKeys {
        openai: "sk-test".to_string(),
        ..ApiKeys::default()
    })
}

#[tokio::test]
async fn cancelled_before_start_touches_no_target() {
    let gateway = Arc::new(ScriptedGateway::default());
    let observer = EventLog::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = engine(gateway.clone())
        .run("run-1", &two_provider_config(), &observer, &cancel)
        .await
        .expect("valid configuration");

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(observer.status_history(GPT), vec![AgentStatus::Waiting]);
    assert_eq!(observer.status_history(OPUS), vec![AgentStatus::Waiting]);
    assert_eq!(gateway.statuses(), vec![RunStatus::Running, RunStatus::Failed]);
    assert_eq!(gateway.save_calls(), 0);
    assert!(observer.logs().contains(&"Evaluation cancelled.".to_string()));
    assert_eq!(observer.completions(), 0);
    assert!(observer.errors().is_empty());
}

#[tokio::test]
async fn demo_run_end_to_end() {
    let gateway = Arc::new(InMemoryGateway::new());
    let run = gateway.create_bakeoff(two_provider_config(), None).await;
    let sink = Arc::new(RecordingSink::default());
    let live = Arc::new(StubLive::replying("unused", Duration::from_millis(10)));
    let observer = EventLog::new();

    let outcome = engine(gateway.clone())
        .with_live_adapter(live.clone())
        .with_notifier(sink.clone())
        .run(&run.id, &two_provider_config(), &observer, &CancellationToken::new())
        .await
        .expect("valid configuration");

    let results = outcome.results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].agent_name, GPT);
    assert_eq!(results[1].agent_name, OPUS);
    for record in results {
        assert!((0.0..=100.0).contains(&record.overall_score));
        assert_eq!(record.bakeoff_id, run.id);
        assert_eq!(record.criteria_scores.len(), catalog::CRITERIA.len());
        assert!((1_000..=5_000).contains(&record.execution_time_ms));
        assert_eq!(
            record.raw_response.as_deref(),
            Some(format!("[Demo] Simulated response for {}", record.agent_name).as_str())
        );
    }

    for name in [GPT, OPUS] {
        assert_eq!(
            observer.status_history(name),
            vec![AgentStatus::Waiting, AgentStatus::Running, AgentStatus::Complete]
        );
    }
    assert_eq!(observer.percents(), vec![0, 0, 50, 50, 100, 100]);
    assert_eq!(observer.completions(), 1);
    assert!(observer.errors().is_empty());
    assert_eq!(live.calls(), 0);

    let logs = observer.logs();
    assert_eq!(logs.first().map(String::as_str), Some("Starting evaluation engine..."));
    assert!(logs.contains(&format!("  → Demo mode for {GPT} (no API key)")));
    assert_eq!(logs.last().map(String::as_str), Some("✓ All results saved successfully!"));

    assert_eq!(gateway.get_bakeoff(&run.id).await.unwrap().status, RunStatus::Completed);
    assert_eq!(gateway.get_results(&run.id).await.len(), 2);

    let events: Vec<_> = sink.events.lock().unwrap().iter().map(|(event, _)| *event).collect();
    assert_eq!(events, vec![WebhookEvent::BakeoffStarted, WebhookEvent::BakeoffCompleted]);
    let (_, summary) = sink.events.lock().unwrap()[1].clone();
    assert_eq!(summary.completed_count, 2);
    assert!(summary.winner.is_some());
}

#[tokio::test]
async fn persistence_failure_marks_run_failed() {
    let gateway = Arc::new(ScriptedGateway::failing_save());
    let observer = EventLog::new();

    let outcome = engine(gateway.clone())
        .run("run-1", &two_provider_config(), &observer, &CancellationToken::new())
        .await
        .expect("valid configuration");

    assert!(matches!(outcome, RunOutcome::Failed { ref message } if !message.is_empty()));
    assert_eq!(gateway.statuses(), vec![RunStatus::Running, RunStatus::Failed]);
    assert_eq!(gateway.save_calls(), 1);

    let errors = observer.errors();
    assert_eq!(errors.len(), 1);
    assert!(!errors[0].is_empty());
    assert_eq!(observer.completions(), 0);
    assert!(observer.logs().iter().any(|line| line.starts_with("Error saving results:")));
}

#[tokio::test]
async fn live_reply_sets_speed_and_response() {
    let gateway = Arc::new(ScriptedGateway::default());
    let live = Arc::new(StubLive::replying("ok", Duration::from_millis(500)));
    let observer = EventLog::new();

    let outcome = engine(gateway.clone())
        .with_credentials(openai_key())
        .with_live_adapter(live.clone())
        .run("run-1", &two_provider_config(), &observer, &CancellationToken::new())
        .await
        .expect("valid configuration");

    let results = outcome.results();
    let gpt = &results[0];
    let speed = gpt.criteria_scores["speed"];
    assert!((92..=98).contains(&speed), "speed {speed}");
    assert_eq!(gpt.raw_response.as_deref(), Some("ok"));
    assert_eq!(gpt.execution_time_ms, 500);

    // Anthropic has no key and stays in demo mode.
    assert!(results[1].raw_response.as_deref().unwrap().starts_with("[Demo]"));

    assert_eq!(live.calls(), 1);
    assert_eq!(
        live.prompts.lock().unwrap().as_slice(),
        [catalog::test_prompt("reasoning").unwrap().to_string()]
    );
    let logs = observer.logs();
    assert!(logs.contains(&"  → Sending live API call to OpenAI...".to_string()));
    assert!(logs.contains(&"  → Response received in 500ms".to_string()));
    assert_eq!(gateway.statuses(), vec![RunStatus::Running, RunStatus::Completed]);
}

#[tokio::test]
async fn empty_live_reply_still_sets_speed() {
    let gateway = Arc::new(ScriptedGateway::default());
    let live = Arc::new(StubLive::replying("", Duration::from_millis(500)));
    let observer = EventLog::new();

    let outcome = engine(gateway)
        .with_credentials(openai_key())
        .with_live_adapter(live.clone())
        .run("run-1", &two_provider_config(), &observer, &CancellationToken::new())
        .await
        .expect("valid configuration");

    let gpt = &outcome.results()[0];
    let speed = gpt.criteria_scores["speed"];
    assert!((92..=98).contains(&speed), "speed {speed}");
    assert_eq!(gpt.execution_time_ms, 500);
    assert_eq!(gpt.raw_response.as_deref(), Some("[Demo] Simulated response for OpenAI – GPT-4o"));
    assert_eq!(live.calls(), 1);
    assert!(observer.logs().contains(&"  → Response received in 500ms".to_string()));
}

#[tokio::test]
async fn failed_live_call_falls_back_to_simulation() {
    let gateway = Arc::new(ScriptedGateway::default());
    let live = Arc::new(StubLive::failing());
    let observer = EventLog::new();

    let outcome = engine(gateway)
        .with_credentials(openai_key())
        .with_live_adapter(live.clone())
        .run("run-1", &two_provider_config(), &observer, &CancellationToken::new())
        .await
        .expect("valid configuration");

    assert!(outcome.is_completed());
    let gpt = &outcome.results()[0];
    assert!((1_000..=5_000).contains(&gpt.execution_time_ms));
    assert_eq!(gpt.raw_response.as_deref(), Some("[Demo] Simulated response for OpenAI – GPT-4o"));
    assert_eq!(live.calls(), 1);
    assert!(observer
        .logs()
        .contains(&"  → API call failed, falling back to demo scores".to_string()));
}

#[tokio::test]
async fn no_selected_tests_means_no_live_call() {
    let live = Arc::new(StubLive::replying("ok", Duration::from_millis(100)));
    let config = two_provider_config().with_tests(Vec::<String>::new());

    let outcome = engine(Arc::new(ScriptedGateway::default()))
        .with_credentials(openai_key())
        .with_live_adapter(live.clone())
        .run("run-1", &config, &EventLog::new(), &CancellationToken::new())
        .await
        .expect("valid configuration");

    assert!(outcome.is_completed());
    assert_eq!(live.calls(), 0);
}

#[tokio::test]
async fn status_write_failure_does_not_abort_the_run() {
    let gateway = Arc::new(ScriptedGateway::failing_status(RunStatus::Running));
    let observer = EventLog::new();

    let outcome = engine(gateway.clone())
        .run("run-1", &two_provider_config(), &observer, &CancellationToken::new())
        .await
        .expect("valid configuration");

    assert!(outcome.is_completed());
    assert_eq!(gateway.statuses(), vec![RunStatus::Completed]);
    assert_eq!(observer.completions(), 1);
    assert!(observer.errors().is_empty());
    assert!(observer.logs().iter().any(|line| line.contains("could not mark run running")));
}

#[tokio::test]
async fn configuration_error_leaves_run_untouched() {
    let gateway = Arc::new(ScriptedGateway::default());
    let observer = EventLog::new();
    let config = BakeoffConfig::default().select_models("openai", ["GPT-4o"]);

    let err = engine(gateway.clone())
        .run("run-1", &config, &observer, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BakeoffError::Configuration(_)));
    assert!(gateway.statuses().is_empty());
    assert!(observer.events().is_empty());

    let mut zero = two_provider_config();
    zero.weights.values_mut().for_each(|weight| *weight = 0.0);
    let err = engine(gateway.clone())
        .run("run-1", &zero, &observer, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BakeoffError::Configuration(_)));
    assert!(gateway.statuses().is_empty());
}

#[tokio::test]
async fn cancel_mid_run_discards_partial_results() {
    let gateway = Arc::new(ScriptedGateway::default());
    let cancel = CancellationToken::new();
    let observer = EventLog::new();
    let config = two_provider_config().select_models("google", ["Gemini 2.5 Pro"]);

    let outcome = engine(gateway.clone())
        .with_credentials(openai_key())
        .with_live_adapter(Arc::new(StubLive::cancelling(cancel.clone())))
        .run("run-1", &config, &observer, &cancel)
        .await
        .expect("valid configuration");

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(
        observer.status_history(GPT),
        vec![AgentStatus::Waiting, AgentStatus::Running, AgentStatus::Complete]
    );
    assert_eq!(observer.status_history(OPUS), vec![AgentStatus::Waiting]);
    assert_eq!(gateway.save_calls(), 0);
    assert_eq!(gateway.statuses(), vec![RunStatus::Running, RunStatus::Failed]);
}

#[tokio::test]
async fn cancel_during_last_target_still_fails_the_run() {
    let gateway = Arc::new(ScriptedGateway::default());
    let cancel = CancellationToken::new();
    let observer = EventLog::new();
    let keys = Arc::new(ApiKeys {
        anthropic: "ak-test".to_string(),
        ..ApiKeys::default()
    });

    let outcome = engine(gateway.clone())
        .with_credentials(keys)
        .with_live_adapter(Arc::new(StubLive::cancelling(cancel.clone())))
        .run("run-1", &two_provider_config(), &observer, &cancel)
        .await
        .expect("valid configuration");

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(gateway.save_calls(), 0);
    assert_eq!(gateway.statuses(), vec![RunStatus::Running, RunStatus::Failed]);
    assert_eq!(observer.completions(), 0);
}

#[tokio::test(start_paused = true)]
async fn demo_targets_are_paced() {
    let started = tokio::time::Instant::now();

    let outcome = EvaluationEngine::new(Arc::new(ScriptedGateway::default()))
        .with_live_adapter(Arc::new(StubLive::failing()))
        .with_seed(7)
        .run("run-1", &two_provider_config(), &EventLog::new(), &CancellationToken::new())
        .await
        .expect("valid configuration");

    assert!(outcome.is_completed());
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(4), "{elapsed:?}");
    assert!(elapsed <= Duration::from_secs(8), "{elapsed:?}");
}

#[tokio::test]
async fn seeded_runs_are_reproducible() {
    let run = |seed| async move {
        engine(Arc::new(ScriptedGateway::default()))
            .with_seed(seed)
            .run("run-1", &two_provider_config(), &EventLog::new(), &CancellationToken::new())
            .await
            .expect("valid configuration")
            .results()
            .iter()
            .map(|record| (record.criteria_scores.clone(), record.overall_score))
            .collect::<Vec<_>>()
    };

    assert_eq!(run(11).await, run(11).await);
}
