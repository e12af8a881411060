use thiserror::Error;

#[derive(Debug, Error)]
pub enum LLMError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("provider error: {0}")]
    Provider(String),
}

#[derive(Debug, Error)]
pub enum BakeoffError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to persist results: {0}")]
    Persistence(String),

    #[error("failed to update run status: {0}")]
    StatusUpdate(String),

    #[error("key-value store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
