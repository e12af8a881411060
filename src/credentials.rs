use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

use serde::{Deserialize, Serialize};

use crate::error::BakeoffError;

pub const API_KEYS_NAMESPACE: &str = "bakeoff_api_keys";
pub const WEBHOOK_URL_NAMESPACE: &str = "bakeoff_webhook_url";
pub const DEFAULT_WEBHOOK_URL: &str = "https://primary-production-483a5.up.railway.app/webhook/bakeoff";

/// Synchronous string store scoped by namespace key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, namespace: &str) -> Result<Option<String>, BakeoffError>;

    fn set(&self, namespace: &str, value: &str) -> Result<(), BakeoffError>;

    fn clear(&self, namespace: &str) -> Result<(), BakeoffError>;
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> BakeoffError {
    BakeoffError::Store("store lock poisoned".to_string())
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, namespace: &str) -> Result<Option<String>, BakeoffError> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(namespace).cloned())
    }

    fn set(&self, namespace: &str, value: &str) -> Result<(), BakeoffError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(namespace.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, namespace: &str) -> Result<(), BakeoffError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.remove(namespace);
        Ok(())
    }
}

/// Namespaces persisted as one JSON object on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, BakeoffError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn store(&self, entries: &HashMap<String, String>) -> Result<(), BakeoffError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, namespace: &str) -> Result<Option<String>, BakeoffError> {
        let _guard = self.lock.read().map_err(poisoned)?;
        Ok(self.load()?.remove(namespace))
    }

    fn set(&self, namespace: &str, value: &str) -> Result<(), BakeoffError> {
        let _guard = self.lock.write().map_err(poisoned)?;
        let mut entries = self.load()?;
        entries.insert(namespace.to_string(), value.to_string());
        self.store(&entries)
    }

    fn clear(&self, namespace: &str) -> Result<(), BakeoffError> {
        let _guard = self.lock.write().map_err(poisoned)?;
        let mut entries = self.load()?;
        if entries.remove(namespace).is_some() {
            self.store(&entries)?;
        }
        Ok(())
    }
}

/// Per-provider credentials. Empty strings mean "not configured".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub openai: String,
    pub anthropic: String,
    pub google: String,
}

impl ApiKeys {
    pub fn from_env() -> Self {
        let read = |name: &str| env::var(name).unwrap_or_default();
        Self {
            openai: read("OPENAI_API_KEY"),
            anthropic: read("ANTHROPIC_API_KEY"),
            google: read("GOOGLE_API_KEY"),
        }
    }

    /// Credential for a provider id, if one is set.
    pub fn get(&self, provider_id: &str) -> Option<&str> {
        let key = match provider_id {
            "openai" => &self.openai,
            "anthropic" => &self.anthropic,
            "google" => &self.google,
            _ => return None,
        };
        let key = key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }

    pub fn has_any(&self) -> bool {
        ["openai", "anthropic", "google"]
            .iter()
            .any(|provider| self.get(provider).is_some())
    }
}

/// Read side used by the engine.
pub trait CredentialSource: Send + Sync {
    fn api_keys(&self) -> ApiKeys;
}

impl CredentialSource for ApiKeys {
    fn api_keys(&self) -> ApiKeys {
        self.clone()
    }
}

/// Settings persisted through a [`KeyValueStore`]: provider keys and the webhook URL.
pub struct CredentialStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> CredentialStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Stored keys; a missing or unreadable entry yields empty keys.
    pub fn load(&self) -> ApiKeys {
        match self.store.get(API_KEYS_NAMESPACE) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!(error = %err, "stored api keys are malformed, ignoring them");
                ApiKeys::default()
            }),
            Ok(None) => ApiKeys::default(),
            Err(err) => {
                tracing::warn!(error = %err, "could not read stored api keys");
                ApiKeys::default()
            }
        }
    }

    pub fn save(&self, keys: &ApiKeys) -> Result<(), BakeoffError> {
        self.store.set(API_KEYS_NAMESPACE, &serde_json::to_string(keys)?)
    }

    pub fn clear(&self) -> Result<(), BakeoffError> {
        self.store.clear(API_KEYS_NAMESPACE)
    }

    pub fn has_any_api_key(&self) -> bool {
        self.load().has_any()
    }

    pub fn webhook_url(&self) -> String {
        match self.store.get(WEBHOOK_URL_NAMESPACE) {
            Ok(Some(url)) if !url.trim().is_empty() => url,
            _ => DEFAULT_WEBHOOK_URL.to_string(),
        }
    }

    pub fn save_webhook_url(&self, url: &str) -> Result<(), BakeoffError> {
        self.store.set(WEBHOOK_URL_NAMESPACE, url)
    }
}

impl<S: KeyValueStore> CredentialSource for CredentialStore<S> {
    fn api_keys(&self) -> ApiKeys {
        self.load()
    }
}
