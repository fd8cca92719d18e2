//! Configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{PerfError, PerfResult};

/// Main run configuration loaded from YAML.
///
/// Loaded once at startup, validated, then shared read-only with every worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Node API base URLs; workers are spread across them round-robin.
    pub node_urls: Vec<String>,
    pub tests: Vec<TestInstance>,
    pub actions_per_loop: u64,
    /// Number of loops each worker runs. Defaults to one when no length is set.
    #[serde(default)]
    pub loops: Option<u64>,
    /// Wall-clock budget for the whole run.
    #[serde(default)]
    pub length_secs: Option<u64>,
    #[serde(default)]
    pub dry_run: bool,
    /// Stop a worker at its first failed iteration instead of carrying on.
    #[serde(default)]
    pub stop_on_failure: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub tag_prefix: Option<String>,
    /// Namespace for idempotency keys; defaults to the run start time.
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub log_outcomes: bool, // Write every iteration outcome to a JSONL file
    #[serde(default)]
    pub token: Option<TokenOptions>,
    #[serde(default)]
    pub contract: Option<ContractOptions>,
    /// Identity receiving private messages.
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub invoke_options: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub transaction_simulator: Option<TransactionSimulatorOptions>,
}

/// One configured test case and how many workers run it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestInstance {
    pub name: String,
    #[serde(default = "default_workers")]
    pub workers: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenOptions {
    pub pool: String,
    pub recipient_address: String,
    #[serde(default = "default_mint_amount")]
    pub amount: String,
}

/// Where a custom contract lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractOptions {
    #[serde(default)]
    pub address: Option<String>, // Ethereum
    #[serde(default)]
    pub channel: Option<String>, // Fabric
    #[serde(default)]
    pub chaincode: Option<String>, // Fabric
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSimulatorOptions {
    pub parties_count: u32,
    #[serde(default = "default_party_prefix")]
    pub party_name_prefix: String,
    #[serde(default)]
    pub min_amount: Option<u64>,
    #[serde(default)]
    pub max_amount: Option<u64>,
    #[serde(default)]
    pub dry_run: bool,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_workers() -> u32 {
    1
}

fn default_mint_amount() -> String {
    "10".to_string()
}

fn default_party_prefix() -> String {
    "party".to_string()
}

pub const DEFAULT_MIN_AMOUNT: u64 = 1;
pub const DEFAULT_MAX_AMOUNT: u64 = 100;

impl TransactionSimulatorOptions {
    /// Amount bounds with defaults applied.
    pub fn amount_range(&self) -> (u64, u64) {
        (
            self.min_amount.unwrap_or(DEFAULT_MIN_AMOUNT),
            self.max_amount.unwrap_or(DEFAULT_MAX_AMOUNT),
        )
    }
}

impl RunConfig {
    /// Load configuration from YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> PerfResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(content: &str) -> PerfResult<Self> {
        let config: RunConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Validate the run-wide settings. Per-test parameters are checked when
    /// the registry prepares each test case.
    pub fn validate(&self) -> PerfResult<()> {
        if self.node_urls.is_empty() {
            return Err(PerfError::config("at least one node URL must be specified"));
        }
        for url in &self.node_urls {
            reqwest::Url::parse(url).map_err(|e| PerfError::InvalidUrl {
                url: url.clone(),
                message: e.to_string(),
            })?;
        }
        if self.tests.is_empty() {
            return Err(PerfError::config("at least one test must be specified"));
        }
        if let Some(test) = self.tests.iter().find(|t| t.workers == 0) {
            return Err(PerfError::config(format!(
                "test '{}' must have workers > 0",
                test.name
            )));
        }
        if self.actions_per_loop == 0 {
            return Err(PerfError::config("actions_per_loop must be > 0"));
        }
        if self.loops == Some(0) {
            return Err(PerfError::config("loops must be > 0"));
        }
        if self.length_secs == Some(0) {
            return Err(PerfError::config("length_secs must be > 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(PerfError::config("request_timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// Total number of workers across all tests.
    pub fn total_workers(&self) -> u32 {
        self.tests.iter().map(|t| t.workers).sum()
    }

    /// Loop budget per worker. `None` means the run is bounded by length only.
    pub fn loop_budget(&self) -> Option<u64> {
        match (self.loops, self.length_secs) {
            (Some(loops), _) => Some(loops),
            (None, Some(_)) => None,
            (None, None) => Some(1),
        }
    }

    pub fn length(&self) -> Option<Duration> {
        self.length_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Node URL assigned to a worker.
    pub fn node_url_for(&self, worker_id: u32) -> &str {
        &self.node_urls[worker_id as usize % self.node_urls.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name: mint
node_urls: ["http://localhost:5000/api/v1/namespaces/default"]
tests:
  - name: token_mint
    workers: 2
actions_per_loop: 5
token:
  pool: P1
  recipient_address: "0xABC"
"#;

    #[test]
    fn test_parse_minimal_config() {
        let config = RunConfig::from_yaml(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.total_workers(), 2);
        assert_eq!(config.loop_budget(), Some(1));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        let token = config.token.unwrap();
        assert_eq!(token.amount, "10");
        assert!(!config.dry_run);
    }

    #[test]
    fn test_length_only_means_unbounded_loops() {
        let mut config = RunConfig::from_yaml(MINIMAL).unwrap();
        config.length_secs = Some(60);
        assert_eq!(config.loop_budget(), None);
        config.loops = Some(3);
        assert_eq!(config.loop_budget(), Some(3));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = RunConfig::from_yaml(MINIMAL).unwrap();
        config.actions_per_loop = 0;
        assert!(config.validate().is_err());

        let mut config = RunConfig::from_yaml(MINIMAL).unwrap();
        config.node_urls = vec!["not a url".to_string()];
        assert!(matches!(config.validate(), Err(PerfError::InvalidUrl { .. })));

        let mut config = RunConfig::from_yaml(MINIMAL).unwrap();
        config.tests[0].workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_node_urls_round_robin() {
        let mut config = RunConfig::from_yaml(MINIMAL).unwrap();
        config.node_urls = vec!["http://a".into(), "http://b".into()];
        assert_eq!(config.node_url_for(0), "http://a");
        assert_eq!(config.node_url_for(1), "http://b");
        assert_eq!(config.node_url_for(4), "http://a");
    }
}
