use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tokio_util::task::TaskTracker;

use crate::{error::LLMError, persistence::ResultRecord, report};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    BakeoffStarted,
    BakeoffCompleted,
    ResultsExported,
}

impl WebhookEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            WebhookEvent::BakeoffStarted => "bakeoff_started",
            WebhookEvent::BakeoffCompleted => "bakeoff_completed",
            WebhookEvent::ResultsExported => "results_exported",
        }
    }
}

/// Everything a notification may carry. Never holds response text or credentials.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub agent_count: usize,
    pub completed_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_score: Option<f64>,
}

impl RunSummary {
    pub fn started(run_id: impl Into<String>, agent_count: usize) -> Self {
        Self {
            run_id: run_id.into(),
            agent_count,
            completed_count: 0,
            winner: None,
            winner_score: None,
        }
    }

    pub fn from_results(run_id: impl Into<String>, agent_count: usize, results: &[ResultRecord]) -> Self {
        let winner = report::winner(results);
        Self {
            run_id: run_id.into(),
            agent_count,
            completed_count: results.len(),
            winner: winner.map(|record| record.agent_name.clone()),
            winner_score: winner.map(|record| record.overall_score),
        }
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    event: WebhookEvent,
    timestamp: DateTime<Utc>,
    data: &'a RunSummary,
}

/// Fire-and-forget notifications. Implementations must not block or fail the caller.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: WebhookEvent, summary: &RunSummary);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _event: WebhookEvent, _summary: &RunSummary) {}
}

/// Posts `{event, timestamp, data}` JSON to a webhook URL.
///
/// Clones share one set of in-flight deliveries, so [`WebhookNotifier::flush`]
/// on any clone waits for events queued through the others.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    tasks: TaskTracker,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, LLMError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            url: url.into(),
            tasks: TaskTracker::new(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends one event and waits for the response.
    pub async fn deliver(&self, event: WebhookEvent, summary: &RunSummary) -> Result<(), LLMError> {
        let payload = WebhookPayload {
            event,
            timestamp: Utc::now(),
            data: summary,
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LLMError::Provider(format!("webhook returned status {status}")));
        }
        Ok(())
    }

    /// Deliveries started by `notify` that have not finished yet.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Waits up to `timeout` for every delivery started by `notify`.
    ///
    /// Returns `false` if some were still in flight when the timeout expired.
    /// The notifier stays usable afterwards.
    pub async fn flush(&self, timeout: Duration) -> bool {
        self.tasks.close();
        let drained = tokio::time::timeout(timeout, self.tasks.wait()).await.is_ok();
        if !drained {
            tracing::warn!(pending = self.tasks.len(), "webhook deliveries still in flight, giving up");
        }
        self.tasks.reopen();
        drained
    }
}

impl NotificationSink for WebhookNotifier {
    fn notify(&self, event: WebhookEvent, summary: &RunSummary) {
        if self.url.trim().is_empty() {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(event = event.as_str(), "no runtime available, webhook skipped");
            return;
        };

        let notifier = self.clone();
        let summary = summary.clone();
        self.tasks.spawn_on(
            async move {
                if let Err(err) = notifier.deliver(event, &summary).await {
                    tracing::warn!(event = event.as_str(), error = %err, "failed to send webhook");
                }
            },
            &handle,
        );
    }
}
