use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{config::BakeoffConfig, error::BakeoffError, scoring::CriterionScores};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// pending -> running -> completed | failed. Pending may also fail directly.
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Pending, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

/// Persisted projection of one completed target. Written once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub bakeoff_id: String,
    pub agent_name: String,
    pub provider: String,
    pub criteria_scores: CriterionScores,
    pub overall_score: f64,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakeoffRecord {
    pub id: String,
    pub name: String,
    pub status: RunStatus,
    pub configuration: BakeoffConfig,
    pub created_at: DateTime<Utc>,
}

/// Storage the engine writes through. Only the engine owning a run writes its rows.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn set_run_status(&self, run_id: &str, status: RunStatus) -> Result<(), BakeoffError>;

    async fn save_results(&self, run_id: &str, results: Vec<ResultRecord>) -> Result<(), BakeoffError>;
}

#[derive(Debug, Default)]
pub struct InMemoryGateway {
    bakeoffs: RwLock<Vec<BakeoffRecord>>,
    results: RwLock<HashMap<String, Vec<ResultRecord>>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pending run. The name defaults to "Bake-off <date>".
    pub async fn create_bakeoff(&self, config: BakeoffConfig, name: Option<String>) -> BakeoffRecord {
        let created_at = Utc::now();
        let record = BakeoffRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| format!("Bake-off {}", created_at.format("%Y-%m-%d"))),
            status: RunStatus::Pending,
            configuration: config,
            created_at,
        };

        self.bakeoffs.write().await.push(record.clone());
        record
    }

    pub async fn get_bakeoff(&self, run_id: &str) -> Option<BakeoffRecord> {
        let bakeoffs = self.bakeoffs.read().await;
        bakeoffs.iter().find(|record| record.id == run_id).cloned()
    }

    /// All runs, newest first.
    pub async fn list_bakeoffs(&self) -> Vec<BakeoffRecord> {
        let mut bakeoffs = self.bakeoffs.read().await.clone();
        bakeoffs.reverse();
        bakeoffs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bakeoffs
    }

    /// Results for a run, best overall score first.
    pub async fn get_results(&self, run_id: &str) -> Vec<ResultRecord> {
        let mut results = self
            .results
            .read()
            .await
            .get(run_id)
            .cloned()
            .unwrap_or_default();
        results.sort_by(|a, b| b.overall_score.total_cmp(&a.overall_score));
        results
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn set_run_status(&self, run_id: &str, status: RunStatus) -> Result<(), BakeoffError> {
        let mut bakeoffs = self.bakeoffs.write().await;
        let record = bakeoffs
            .iter_mut()
            .find(|record| record.id == run_id)
            .ok_or_else(|| BakeoffError::StatusUpdate(format!("unknown run `{run_id}`")))?;

        if !record.status.can_transition_to(status) {
            return Err(BakeoffError::StatusUpdate(format!(
                "run `{run_id}` cannot move from {} to {}",
                record.status.as_str(),
                status.as_str()
            )));
        }

        record.status = status;
        Ok(())
    }

    async fn save_results(&self, run_id: &str, results: Vec<ResultRecord>) -> Result<(), BakeoffError> {
        if self.get_bakeoff(run_id).await.is_none() {
            return Err(BakeoffError::Persistence(format!("unknown run `{run_id}`")));
        }
        if results.iter().any(|record| record.bakeoff_id != run_id) {
            return Err(BakeoffError::Persistence(format!(
                "result rows do not all belong to run `{run_id}`"
            )));
        }

        let mut stored = self.results.write().await;
        if stored.contains_key(run_id) {
            return Err(BakeoffError::Persistence(format!(
                "results for run `{run_id}` were already recorded"
            )));
        }
        stored.insert(run_id.to_string(), results);
        Ok(())
    }
}
