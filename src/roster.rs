use serde::{Deserialize, Serialize};

use crate::{
    catalog::{self, CUSTOM_AGENT_NAME, CUSTOM_PROVIDER_ID, CUSTOM_PROVIDER_NAME},
    config::{distinct, BakeoffConfig},
    error::BakeoffError,
};

/// Smallest roster that still makes a comparison.
pub const MIN_TARGETS: usize = 2;

/// One provider/model pairing (or the custom endpoint) evaluated in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTarget {
    /// Display identity, also the baseline-table key.
    pub name: String,
    pub provider_id: String,
    pub provider_name: String,
    pub model: String,
}

impl AgentTarget {
    pub fn new(provider_id: &str, model: &str) -> Self {
        let provider_name = catalog::provider_display_name(provider_id).to_string();
        Self {
            name: format!("{provider_name} – {model}"),
            provider_id: provider_id.to_string(),
            provider_name,
            model: model.to_string(),
        }
    }

    pub fn custom() -> Self {
        Self {
            name: CUSTOM_AGENT_NAME.to_string(),
            provider_id: CUSTOM_PROVIDER_ID.to_string(),
            provider_name: CUSTOM_PROVIDER_NAME.to_string(),
            model: CUSTOM_PROVIDER_ID.to_string(),
        }
    }
}

/// Expands the selection into targets without enforcing the minimum size.
pub fn expand_targets(config: &BakeoffConfig) -> Vec<AgentTarget> {
    let mut targets: Vec<AgentTarget> = config
        .selected_providers
        .iter()
        .flat_map(|(provider_id, models)| {
            distinct(models).map(move |model| AgentTarget::new(provider_id, model))
        })
        .collect();

    if config.custom_endpoint_enabled {
        targets.push(AgentTarget::custom());
    }

    targets
}

/// Ordered roster for a run. Fails when fewer than [`MIN_TARGETS`] targets result.
pub fn build_roster(config: &BakeoffConfig) -> Result<Vec<AgentTarget>, BakeoffError> {
    let targets = expand_targets(config);
    if targets.len() < MIN_TARGETS {
        return Err(BakeoffError::Configuration(format!(
            "a bake-off needs at least {MIN_TARGETS} agents, {} selected",
            targets.len()
        )));
    }
    Ok(targets)
}
