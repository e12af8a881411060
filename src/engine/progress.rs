use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::{roster::AgentTarget, scoring::CriterionScores};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Waiting,
    Running,
    Complete,
    Error,
}

impl AgentStatus {
    /// waiting -> running -> complete | error
    pub fn can_transition_to(self, next: AgentStatus) -> bool {
        matches!(
            (self, next),
            (AgentStatus::Waiting, AgentStatus::Running)
                | (AgentStatus::Running, AgentStatus::Complete)
                | (AgentStatus::Running, AgentStatus::Error)
        )
    }
}

/// Per-target state shown to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentProgress {
    pub name: String,
    pub provider: String,
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<CriterionScores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl AgentProgress {
    pub fn waiting(target: &AgentTarget) -> Self {
        Self {
            name: target.name.clone(),
            provider: target.provider_name.clone(),
            status: AgentStatus::Waiting,
            scores: None,
            overall_score: None,
            execution_time_ms: None,
            raw_response: None,
        }
    }

    pub(crate) fn mark_running(&mut self) {
        debug_assert!(self.status.can_transition_to(AgentStatus::Running));
        self.status = AgentStatus::Running;
    }

    pub(crate) fn mark_complete(
        &mut self,
        scores: CriterionScores,
        overall_score: f64,
        execution_time_ms: u64,
        raw_response: String,
    ) {
        debug_assert!(self.status.can_transition_to(AgentStatus::Complete));
        self.status = AgentStatus::Complete;
        self.scores = Some(scores);
        self.overall_score = Some(overall_score);
        self.execution_time_ms = Some(execution_time_ms);
        self.raw_response = Some(raw_response);
    }
}

/// Receives run progress. Calls arrive in order, on the task driving the run.
pub trait EngineObserver: Send + Sync {
    /// Snapshot of every target and the overall percentage (0..=100).
    fn on_progress(&self, agents: &[AgentProgress], percent: u8);

    fn on_log(&self, line: &str);

    fn on_complete(&self);

    fn on_error(&self, message: &str);
}

/// Owned form of an observer call, for channels and recordings.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Progress { agents: Vec<AgentProgress>, percent: u8 },
    Log(String),
    Complete,
    Error(String),
}

impl EngineObserver for UnboundedSender<EngineEvent> {
    fn on_progress(&self, agents: &[AgentProgress], percent: u8) {
        let _ = self.send(EngineEvent::Progress {
            agents: agents.to_vec(),
            percent,
        });
    }

    fn on_log(&self, line: &str) {
        let _ = self.send(EngineEvent::Log(line.to_string()));
    }

    fn on_complete(&self) {
        let _ = self.send(EngineEvent::Complete);
    }

    fn on_error(&self, message: &str) {
        let _ = self.send(EngineEvent::Error(message.to_string()));
    }
}

/// Observer that keeps every call in memory.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<EngineEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn logs(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::Log(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    pub fn percents(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::Progress { percent, .. } => Some(percent),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, EngineEvent::Complete))
            .count()
    }

    /// Status sequence of one agent across all snapshots, with repeats collapsed.
    pub fn status_history(&self, agent_name: &str) -> Vec<AgentStatus> {
        let mut history: Vec<AgentStatus> = Vec::new();
        for event in self.events() {
            let EngineEvent::Progress { agents, .. } = event else {
                continue;
            };
            if let Some(agent) = agents.iter().find(|agent| agent.name == agent_name) {
                if history.last() != Some(&agent.status) {
                    history.push(agent.status);
                }
            }
        }
        history
    }

    fn push(&self, event: EngineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl EngineObserver for EventLog {
    fn on_progress(&self, agents: &[AgentProgress], percent: u8) {
        self.push(EngineEvent::Progress {
            agents: agents.to_vec(),
            percent,
        });
    }

    fn on_log(&self, line: &str) {
        self.push(EngineEvent::Log(line.to_string()));
    }

    fn on_complete(&self) {
        self.push(EngineEvent::Complete);
    }

    fn on_error(&self, message: &str) {
        self.push(EngineEvent::Error(message.to_string()));
    }
}
