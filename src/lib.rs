pub mod catalog;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod live;
pub mod persistence;
pub mod providers;
pub mod report;
pub mod roster;
pub mod scoring;
pub mod types;
pub mod webhook;

pub use config::{BakeoffConfig, Complexity, TestPrompt};
pub use credentials::{
    ApiKeys, CredentialSource, CredentialStore, InMemoryStore, JsonFileStore, KeyValueStore,
};
pub use engine::{
    AgentProgress, AgentStatus, EngineEvent, EngineObserver, EngineSettings, EvaluationEngine,
    EventLog, RunOutcome,
};
pub use error::{BakeoffError, LLMError};
pub use live::{LiveCallAdapter, LiveEndpoints, LiveResponse, ProviderLiveAdapter};
pub use persistence::{BakeoffRecord, InMemoryGateway, PersistenceGateway, ResultRecord, RunStatus};
pub use providers::LLMProvider;
pub use roster::{build_roster, AgentTarget};
pub use scoring::CriterionScores;
pub use types::{ChatMessage, CompletionRequest, CompletionResponse, MessageRole, TokenUsage};
pub use webhook::{NoopSink, NotificationSink, RunSummary, WebhookEvent, WebhookNotifier};
