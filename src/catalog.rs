//! Fixed reference data: providers, criteria, test types, prompts and the
//! per-agent baseline score table used by simulated scoring.

pub const CUSTOM_AGENT_NAME: &str = "Custom Agent";
pub const CUSTOM_PROVIDER_ID: &str = "custom";
pub const CUSTOM_PROVIDER_NAME: &str = "Custom";
pub const CUSTOM_TEST_ID: &str = "custom";
pub const SPEED_CRITERION: &str = "speed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub models: &'static [&'static str],
    /// Model dialed for live calls; `None` means the provider is always simulated.
    pub live_model: Option<&'static str>,
}

pub const PROVIDERS: [ProviderInfo; 5] = [
    ProviderInfo {
        id: "openai",
        name: "OpenAI",
        models: &["GPT-4o", "GPT-4-turbo", "o1", "o3-mini"],
        live_model: Some("gpt-4o"),
    },
    ProviderInfo {
        id: "anthropic",
        name: "Anthropic",
        models: &["Claude 3.5 Sonnet", "Claude 3 Opus"],
        live_model: Some("claude-3-5-sonnet-20241022"),
    },
    ProviderInfo {
        id: "google",
        name: "Google",
        models: &["Gemini 2.5 Pro", "Gemini 2.5 Flash"],
        live_model: Some("gemini-2.5-flash"),
    },
    ProviderInfo {
        id: "microsoft",
        name: "Microsoft",
        models: &["Copilot"],
        live_model: None,
    },
    ProviderInfo {
        id: "amazon",
        name: "Amazon",
        models: &["Bedrock/Nova"],
        live_model: None,
    },
];

pub fn provider(id: &str) -> Option<&'static ProviderInfo> {
    PROVIDERS.iter().find(|provider| provider.id == id)
}

/// Display name for a provider id, falling back to the raw id.
pub fn provider_display_name(id: &str) -> &str {
    provider(id).map(|provider| provider.name).unwrap_or(id)
}

pub fn live_model(provider_id: &str) -> Option<&'static str> {
    provider(provider_id).and_then(|provider| provider.live_model)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Criterion {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

pub const CRITERION_COUNT: usize = 8;

pub const CRITERIA: [Criterion; CRITERION_COUNT] = [
    Criterion { id: "accuracy", label: "Accuracy", description: "Correctness of outputs" },
    Criterion { id: "speed", label: "Speed", description: "Response latency" },
    Criterion { id: "security", label: "Security", description: "Resistance to attacks" },
    Criterion { id: "privacy", label: "Privacy", description: "Data handling practices" },
    Criterion { id: "safety", label: "Safety", description: "Content safety guardrails" },
    Criterion { id: "scalability", label: "Scalability", description: "Performance under load" },
    Criterion { id: "cost", label: "Cost Efficiency", description: "Output quality per dollar" },
    Criterion { id: "collaboration", label: "Collaborative Capability", description: "Multi-agent coordination" },
];

/// Label for a criterion id, falling back to the id itself.
pub fn criterion_label(id: &str) -> &str {
    CRITERIA
        .iter()
        .find(|criterion| criterion.id == id)
        .map(|criterion| criterion.label)
        .unwrap_or(id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestType {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    /// Sent to live agents. `None` for the custom test, whose prompt comes from the config.
    pub prompt: Option<&'static str>,
}

pub const TEST_TYPES: [TestType; 5] = [
    TestType {
        id: "reasoning",
        label: "Standardized Reasoning Benchmark",
        description: "MMLU, HellaSwag, ARC and more",
        prompt: Some("Solve this step by step: A farmer has 17 sheep. All but 9 die. How many sheep are left? Explain your reasoning."),
    },
    TestType {
        id: "codegen",
        label: "Code Generation Task",
        description: "HumanEval, MBPP style challenges",
        prompt: Some("Write a Python function that checks if a string is a valid palindrome, ignoring spaces and punctuation. Include type hints and docstring."),
    },
    TestType {
        id: "security",
        label: "Security Vulnerability Detection",
        description: "OWASP, CVE pattern recognition",
        prompt: Some("Analyze the following code snippet for security vulnerabilities:\n```python\ndef login(username, password):\n    query = f\"SELECT * FROM users WHERE username='{username}' AND password='{password}'\"\n    return db.execute(query)\n```"),
    },
    TestType {
        id: "multiagent",
        label: "Multi-Agent Collaboration Scenario",
        description: "Swarm coordination tasks",
        prompt: Some("You are Agent A in a team of 3 agents. Your task is to coordinate with Agent B (data collector) and Agent C (analyzer) to produce a report on climate change trends. Describe your coordination strategy."),
    },
    TestType {
        id: CUSTOM_TEST_ID,
        label: "Custom Prompt Test",
        description: "Define your own evaluation prompt",
        prompt: None,
    },
];

pub fn test_type(test_id: &str) -> Option<&'static TestType> {
    TEST_TYPES.iter().find(|test| test.id == test_id)
}

/// Fixed prompt for a built-in test. The custom test has no fixed prompt.
pub fn test_prompt(test_id: &str) -> Option<&'static str> {
    test_type(test_id).and_then(|test| test.prompt)
}

/// Label for a test id, falling back to the id itself.
pub fn test_label(test_id: &str) -> &str {
    test_type(test_id).map(|test| test.label).unwrap_or(test_id)
}

/// Baseline scores in `CRITERIA` order:
/// accuracy, speed, security, privacy, safety, scalability, cost, collaboration.
pub type Baseline = [u32; CRITERION_COUNT];

const CUSTOM_BASELINE: Baseline = [75; CRITERION_COUNT];

static BASELINES: [(&str, Baseline); 11] = [
    ("OpenAI – GPT-4o", [92, 85, 88, 80, 90, 88, 70, 82]),
    ("OpenAI – GPT-4-turbo", [90, 88, 87, 79, 89, 87, 75, 80]),
    ("OpenAI – o1", [95, 60, 90, 82, 92, 75, 50, 78]),
    ("OpenAI – o3-mini", [88, 92, 85, 78, 87, 90, 85, 76]),
    ("Anthropic – Claude 3.5 Sonnet", [91, 83, 92, 90, 95, 82, 72, 85]),
    ("Anthropic – Claude 3 Opus", [93, 70, 91, 89, 94, 78, 55, 84]),
    ("Google – Gemini 2.5 Pro", [91, 82, 86, 83, 88, 90, 68, 80]),
    ("Google – Gemini 2.5 Flash", [86, 95, 83, 81, 85, 93, 90, 77]),
    ("Microsoft – Copilot", [82, 88, 80, 76, 83, 85, 80, 88]),
    ("Amazon – Bedrock/Nova", [80, 86, 82, 78, 81, 92, 88, 75]),
    (CUSTOM_AGENT_NAME, CUSTOM_BASELINE),
];

/// Baseline for an agent display name; unknown names get the custom-agent row.
pub fn baseline(agent_name: &str) -> &'static Baseline {
    BASELINES
        .iter()
        .find(|(name, _)| *name == agent_name)
        .map(|(_, scores)| scores)
        .unwrap_or(&CUSTOM_BASELINE)
}

pub fn has_baseline(agent_name: &str) -> bool {
    BASELINES.iter().any(|(name, _)| *name == agent_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_model_has_a_baseline() {
        for provider in &PROVIDERS {
            for model in provider.models {
                let name = format!("{} – {}", provider.name, model);
                assert!(has_baseline(&name), "missing baseline for {name}");
            }
        }
    }

    #[test]
    fn unknown_agent_falls_back_to_flat_row() {
        assert_eq!(baseline("Acme – Rocket 1"), &[75; CRITERION_COUNT]);
        assert_eq!(baseline("OpenAI – o1")[1], 60);
    }

    #[test]
    fn lookups_fall_back_to_raw_ids() {
        assert_eq!(provider_display_name("anthropic"), "Anthropic");
        assert_eq!(provider_display_name("mistral"), "mistral");
        assert_eq!(criterion_label("cost"), "Cost Efficiency");
        assert_eq!(criterion_label("latency"), "latency");
        assert_eq!(live_model("microsoft"), None);
        assert_eq!(live_model("google"), Some("gemini-2.5-flash"));
    }

    #[test]
    fn custom_test_has_no_fixed_prompt() {
        assert!(test_prompt(CUSTOM_TEST_ID).is_none());
        assert!(test_prompt("reasoning").unwrap().contains("17 sheep"));
        assert!(test_prompt("security").unwrap().contains("SELECT * FROM users"));
        assert!(test_prompt("unknown").is_none());
        assert_eq!(test_label("codegen"), "Code Generation Task");
        assert_eq!(test_label("fuzzing"), "fuzzing");
        assert_eq!(TEST_TYPES.iter().filter(|test| test.prompt.is_some()).count(), 4);
        assert_eq!(CRITERIA[1].id, SPEED_CRITERION);
    }
}
