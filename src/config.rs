use std::{fs, path::Path};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    catalog::{self, CRITERIA, CUSTOM_TEST_ID},
    error::BakeoffError,
};

pub const FALLBACK_PROMPT: &str = "Hello, how are you?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Basic,
    #[default]
    Standard,
    Advanced,
}

impl Complexity {
    /// Advisory minutes per target per test.
    pub fn minutes_per_test(self) -> u32 {
        match self {
            Complexity::Basic => 1,
            Complexity::Standard => 3,
            Complexity::Advanced => 5,
        }
    }
}

/// User input for one bake-off. Field names follow the stored JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BakeoffConfig {
    /// Provider id to selected model names, in selection order.
    pub selected_providers: IndexMap<String, Vec<String>>,
    pub custom_endpoint: String,
    pub custom_endpoint_enabled: bool,
    pub weights: IndexMap<String, f64>,
    pub selected_tests: Vec<String>,
    pub complexity: Complexity,
    pub custom_prompt: String,
}

impl Default for BakeoffConfig {
    fn default() -> Self {
        let weight = (100.0 / CRITERIA.len() as f64).round();
        Self {
            selected_providers: IndexMap::new(),
            custom_endpoint: String::new(),
            custom_endpoint_enabled: false,
            weights: CRITERIA
                .iter()
                .map(|criterion| (criterion.id.to_string(), weight))
                .collect(),
            selected_tests: Vec::new(),
            complexity: Complexity::default(),
            custom_prompt: String::new(),
        }
    }
}

/// A prompt resolved from a selected test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPrompt {
    pub test_id: String,
    pub prompt: String,
}

impl BakeoffConfig {
    pub fn from_yaml_str(input: &str) -> Result<Self, BakeoffError> {
        Ok(serde_yaml::from_str(input)?)
    }

    pub fn from_json_str(input: &str) -> Result<Self, BakeoffError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Loads JSON for `.json` files and YAML for everything else.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BakeoffError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&raw),
            _ => Self::from_yaml_str(&raw),
        }
    }

    pub fn select_models<I, S>(mut self, provider_id: impl Into<String>, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_providers
            .entry(provider_id.into())
            .or_default()
            .extend(models.into_iter().map(Into::into));
        self
    }

    pub fn with_custom_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.custom_endpoint = endpoint.into();
        self.custom_endpoint_enabled = true;
        self
    }

    pub fn with_tests<I, S>(mut self, tests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_tests = tests.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.custom_prompt = prompt.into();
        self
    }

    pub fn with_weight(mut self, criterion: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(criterion.into(), weight);
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    /// Rejects weight tables that cannot produce a meaningful composite.
    pub fn validate(&self) -> Result<(), BakeoffError> {
        if self.weights.is_empty() {
            return Err(BakeoffError::Configuration(
                "at least one criterion weight is required".to_string(),
            ));
        }

        for (criterion, weight) in &self.weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(BakeoffError::Configuration(format!(
                    "weight for `{criterion}` must be a non-negative number, got {weight}"
                )));
            }
        }

        if self.weights.values().all(|weight| *weight == 0.0) {
            return Err(BakeoffError::Configuration(
                "criterion weights are all zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn custom_test_selected(&self) -> bool {
        self.selected_tests.iter().any(|test| test == CUSTOM_TEST_ID)
    }

    /// Prompts for the selected tests: built-in tests in selection order, then
    /// the custom prompt if the custom test is selected and the prompt is not blank.
    pub fn test_prompts(&self) -> Vec<TestPrompt> {
        let mut prompts: Vec<TestPrompt> = self
            .selected_tests
            .iter()
            .filter(|test| test.as_str() != CUSTOM_TEST_ID)
            .map(|test| TestPrompt {
                test_id: test.clone(),
                prompt: catalog::test_prompt(test)
                    .unwrap_or(FALLBACK_PROMPT)
                    .to_string(),
            })
            .collect();

        if self.custom_test_selected() && !self.custom_prompt.trim().is_empty() {
            prompts.push(TestPrompt {
                test_id: CUSTOM_TEST_ID.to_string(),
                prompt: self.custom_prompt.clone(),
            });
        }

        prompts
    }

    /// Number of targets the roster will contain.
    pub fn target_count(&self) -> usize {
        let models: usize = self
            .selected_providers
            .values()
            .map(|models| distinct(models).count())
            .sum();
        models + usize::from(self.custom_endpoint_enabled)
    }

    /// Rough wall-clock estimate shown before launch.
    pub fn estimated_minutes(&self) -> u32 {
        let runs = self.target_count() * self.selected_tests.len();
        runs as u32 * self.complexity.minutes_per_test()
    }
}

/// Models in first-seen order with repeats dropped.
pub(crate) fn distinct(models: &[String]) -> impl Iterator<Item = &String> {
    models
        .iter()
        .enumerate()
        .filter(move |(index, model)| !models[..*index].contains(model))
        .map(|(_, model)| model)
}
