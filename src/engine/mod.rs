//! Sequential evaluation of a bake-off roster.
//!
//! [`EvaluationEngine::run`] walks the roster one target at a time. Each target
//! gets at most one live call when its provider has a credential, falls back to
//! simulated scores otherwise, and the whole result set is saved in one batch at
//! the end. Progress and the log feed are reported through an [`EngineObserver`].

mod progress;

use std::{ops::RangeInclusive, sync::Arc, time::Duration};

use chrono::Utc;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

pub use progress::{AgentProgress, AgentStatus, EngineEvent, EngineObserver, EventLog};

use crate::{
    config::BakeoffConfig,
    credentials::{ApiKeys, CredentialSource},
    error::BakeoffError,
    live::{LiveCallAdapter, ProviderLiveAdapter},
    persistence::{PersistenceGateway, ResultRecord, RunStatus},
    roster::{self, AgentTarget},
    scoring,
    webhook::{NoopSink, NotificationSink, RunSummary, WebhookEvent},
};

/// Cosmetic execution time for targets without a measured live call.
const SYNTHETIC_EXECUTION_MS: RangeInclusive<u64> = 1_000..=5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Pause after each demo target, drawn uniformly from the range. `None` disables it.
    pub demo_delay: Option<(Duration, Duration)>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            demo_delay: Some((Duration::from_millis(2_000), Duration::from_millis(4_000))),
        }
    }
}

impl EngineSettings {
    /// No artificial pacing.
    pub fn immediate() -> Self {
        Self { demo_delay: None }
    }

    pub fn with_demo_delay(mut self, min: Duration, max: Duration) -> Self {
        self.demo_delay = Some((min.min(max), max.max(min)));
        self
    }
}

/// How a run that got past configuration ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every target was evaluated and the results were saved.
    Completed { results: Vec<ResultRecord> },
    /// The cancellation token tripped; nothing was saved.
    Cancelled,
    /// Results could not be saved.
    Failed { message: String },
}

impl RunOutcome {
    pub fn results(&self) -> &[ResultRecord] {
        match self {
            RunOutcome::Completed { results } => results,
            _ => &[],
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }
}

pub struct EvaluationEngine {
    gateway: Arc<dyn PersistenceGateway>,
    credentials: Arc<dyn CredentialSource>,
    live: Arc<dyn LiveCallAdapter>,
    notifier: Arc<dyn NotificationSink>,
    settings: EngineSettings,
    seed: Option<u64>,
}

impl EvaluationEngine {
    /// Engine with no credentials, HTTP live clients and no notifications.
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            gateway,
            credentials: Arc::new(ApiKeys::default()),
            live: Arc::new(ProviderLiveAdapter::default()),
            notifier: Arc::new(NoopSink),
            settings: EngineSettings::default(),
            seed: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_live_adapter(mut self, live: Arc<dyn LiveCallAdapter>) -> Self {
        self.live = live;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Makes jitter, synthetic timings and demo delays reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Evaluates every target of `config` for the pending run `run_id`.
    ///
    /// Returns `Err` only for configuration problems, which are detected before
    /// the run status is touched. Every other ending is a [`RunOutcome`].
    pub async fn run(
        &self,
        run_id: &str,
        config: &BakeoffConfig,
        observer: &dyn EngineObserver,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, BakeoffError> {
        config.validate()?;
        let roster = roster::build_roster(config)?;
        let total = roster.len();

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        tracing::info!(run_id, targets = total, "starting bake-off");

        let mut progress: Vec<AgentProgress> = roster.iter().map(AgentProgress::waiting).collect();
        observer.on_progress(&progress, 0);
        observer.on_log("Starting evaluation engine...");

        self.update_status(run_id, RunStatus::Running, observer).await;
        self.notifier
            .notify(WebhookEvent::BakeoffStarted, &RunSummary::started(run_id, total));

        let prompts = config.test_prompts();
        let first_prompt = prompts.first().map(|prompt| prompt.prompt.as_str());
        let keys = self.credentials.api_keys();

        let mut results: Vec<ResultRecord> = Vec::with_capacity(total);

        for (index, target) in roster.iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(run_id, observer).await);
            }

            progress[index].mark_running();
            observer.on_progress(&progress, percent(index, total));
            observer.on_log(&format!("Evaluating {}...", target.name));
            tracing::debug!(run_id, agent = %target.name, "evaluating target");

            let credential = keys.get(&target.provider_id);
            let demo = credential.is_none();
            if demo {
                observer.on_log(&format!("  → Demo mode for {} (no API key)", target.name));
            }

            let live = match (credential, first_prompt) {
                (Some(credential), Some(prompt)) => {
                    self.call_live(target, prompt, credential, observer).await
                }
                _ => None,
            };

            let mut scores = scoring::simulate_scores(&mut rng, &target.name, demo);
            if let Some(response) = &live {
                scoring::apply_live_latency(&mut rng, &mut scores, response.elapsed);
            }
            let overall_score = scoring::weighted_composite(&scores, &config.weights);

            let execution_time_ms = match &live {
                Some(response) => response.elapsed_ms(),
                None => rng.gen_range(SYNTHETIC_EXECUTION_MS),
            };
            let raw_response = live
                .map(|response| response.text)
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| simulated_response(target));

            results.push(ResultRecord {
                bakeoff_id: run_id.to_string(),
                agent_name: target.name.clone(),
                provider: target.provider_name.clone(),
                criteria_scores: scores.clone(),
                overall_score,
                execution_time_ms,
                raw_response: Some(raw_response.clone()),
                created_at: Utc::now(),
            });
            progress[index].mark_complete(scores, overall_score, execution_time_ms, raw_response);

            observer.on_progress(&progress, percent(index + 1, total));
            observer.on_log(&format!("  ✓ {} complete — Score: {}", target.name, overall_score));
            tracing::debug!(run_id, agent = %target.name, overall_score, demo, "target complete");

            if demo {
                if let Some(delay) = self.demo_delay(&mut rng) {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => {}
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            return Ok(self.cancelled(run_id, observer).await);
        }

        observer.on_log("Saving results to database...");
        match self.persist(run_id, results.clone()).await {
            Ok(()) => {
                observer.on_log("✓ All results saved successfully!");
                tracing::info!(run_id, results = results.len(), "bake-off completed");
                self.notifier.notify(
                    WebhookEvent::BakeoffCompleted,
                    &RunSummary::from_results(run_id, total, &results),
                );
                observer.on_progress(&progress, 100);
                observer.on_complete();
                Ok(RunOutcome::Completed { results })
            }
            Err(err) => {
                let message = err.to_string();
                tracing::error!(run_id, error = %message, "failed to save bake-off results");
                observer.on_log(&format!("Error saving results: {message}"));
                self.update_status(run_id, RunStatus::Failed, observer).await;
                observer.on_error(&message);
                Ok(RunOutcome::Failed { message })
            }
        }
    }

    async fn call_live(
        &self,
        target: &AgentTarget,
        prompt: &str,
        credential: &str,
        observer: &dyn EngineObserver,
    ) -> Option<crate::live::LiveResponse> {
        observer.on_log(&format!("  → Sending live API call to {}...", target.provider_name));
        let response = self
            .live
            .try_call(&target.provider_id, &target.model, prompt, credential)
            .await;

        match &response {
            Some(response) => {
                observer.on_log(&format!("  → Response received in {}ms", response.elapsed_ms()))
            }
            None => observer.on_log("  → API call failed, falling back to demo scores"),
        }
        response
    }

    /// Saving and the Completed transition succeed or fail together.
    async fn persist(&self, run_id: &str, results: Vec<ResultRecord>) -> Result<(), BakeoffError> {
        self.gateway.save_results(run_id, results).await?;
        self.gateway.set_run_status(run_id, RunStatus::Completed).await
    }

    async fn cancelled(&self, run_id: &str, observer: &dyn EngineObserver) -> RunOutcome {
        tracing::info!(run_id, "bake-off cancelled");
        observer.on_log("Evaluation cancelled.");
        self.update_status(run_id, RunStatus::Failed, observer).await;
        RunOutcome::Cancelled
    }

    /// Best-effort status write; failures are reported but never change control flow.
    async fn update_status(&self, run_id: &str, status: RunStatus, observer: &dyn EngineObserver) {
        if let Err(err) = self.gateway.set_run_status(run_id, status).await {
            tracing::warn!(run_id, status = status.as_str(), error = %err, "status update failed");
            observer.on_log(&format!("  (could not mark run {}: {err})", status.as_str()));
        }
    }

    fn demo_delay(&self, rng: &mut StdRng) -> Option<Duration> {
        let (min, max) = self.settings.demo_delay?;
        if max.is_zero() {
            return None;
        }
        if min >= max {
            return Some(min);
        }
        Some(rng.gen_range(min..=max))
    }
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.min(total) * 100 / total) as u8
}

fn simulated_response(target: &AgentTarget) -> String {
    format!("[Demo] Simulated response for {}", target.name)
}
