//! Connection configuration for a solution

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use workcell::retry::{RetryPolicy, MAX_ATTEMPTS_CAP};
use workcell::{Result, WorkcellError};

pub const DEFAULT_ADDRESS: &str = "http://localhost:17080";

/// Service names accepted as keys of `endpoints`.
pub const SERVICE_NAMES: &[&str] = &[
    "skill_registry",
    "resource_registry",
    "installed_assets",
    "operations",
    "solution",
    "blackboard",
    "data_logger",
];

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Address of the solution's ingress, e.g. `http://localhost:17080`.
    pub address: Option<String>,
    /// Per-service address overrides keyed by [`SERVICE_NAMES`].
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
    pub connect_timeout_secs: Option<f64>,
    pub retry: Option<RetryConfig>,
    pub operations: Option<OperationsConfig>,
    pub page_sizes: Option<PageSizeConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub multiplier: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OperationsConfig {
    pub poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PageSizeConfig {
    pub assets: Option<i64>,
    pub behavior_trees: Option<i32>,
}

impl ClientConfig {
    /// Config pointing every service at `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Default::default()
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| WorkcellError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: ClientConfig = serde_yaml::from_str(contents)
            .map_err(|e| WorkcellError::Config(format!("Invalid client config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(service) = self
            .endpoints
            .keys()
            .find(|name| !SERVICE_NAMES.contains(&name.as_str()))
        {
            return Err(WorkcellError::Config(format!(
                "Unknown service '{}' in endpoints (expected one of: {})",
                service,
                SERVICE_NAMES.join(", ")
            )));
        }
        if let Some(retry) = &self.retry {
            if matches!(retry.max_attempts, Some(n) if n == 0 || n > MAX_ATTEMPTS_CAP) {
                return Err(WorkcellError::Config(format!(
                    "retry.max_attempts must be between 1 and {}",
                    MAX_ATTEMPTS_CAP
                )));
            }
        }
        let pages = self.page_sizes.clone().unwrap_or_default();
        if matches!(pages.assets, Some(n) if !(1..=workcell::process::ASSET_PAGE_SIZE).contains(&n)) {
            return Err(WorkcellError::Config(format!(
                "page_sizes.assets must be between 1 and {}",
                workcell::process::ASSET_PAGE_SIZE
            )));
        }
        if matches!(pages.behavior_trees, Some(n) if !(1..=workcell::process::TREE_PAGE_SIZE).contains(&n)) {
            return Err(WorkcellError::Config(format!(
                "page_sizes.behavior_trees must be between 1 and {}",
                workcell::process::TREE_PAGE_SIZE
            )));
        }
        Ok(())
    }

    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or(DEFAULT_ADDRESS)
    }

    /// Address for `service`, honoring overrides.
    pub fn endpoint(&self, service: &str) -> &str {
        self.endpoints
            .get(service)
            .map(String::as_str)
            .unwrap_or_else(|| self.address())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.connect_timeout_secs.unwrap_or(5.0).max(0.0))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = self.retry.clone().unwrap_or_default();
        let defaults = RetryPolicy::default();
        RetryPolicy::new()
            .with_max_attempts(retry.max_attempts.unwrap_or(defaults.max_attempts))
            .with_initial_delay(
                retry
                    .initial_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.initial_delay),
            )
            .with_max_delay(
                retry
                    .max_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.max_delay),
            )
            .with_multiplier(retry.multiplier.unwrap_or(defaults.multiplier))
    }

    /// Server-side wait per long-running operation poll.
    pub fn poll_timeout(&self) -> Duration {
        let secs = self
            .operations
            .as_ref()
            .and_then(|o| o.poll_timeout_secs)
            .unwrap_or(10);
        Duration::from_secs(secs)
    }

    pub fn asset_page_size(&self) -> i64 {
        self.page_sizes
            .as_ref()
            .and_then(|p| p.assets)
            .unwrap_or(workcell::process::ASSET_PAGE_SIZE)
    }

    pub fn tree_page_size(&self) -> i32 {
        self.page_sizes
            .as_ref()
            .and_then(|p| p.behavior_trees)
            .unwrap_or(workcell::process::TREE_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
address: "http://cell-1:17080"
endpoints:
  data_logger: "http://cell-1:17090"
connect_timeout_secs: 2.5
retry:
  max_attempts: 4
  initial_backoff_ms: 50
operations:
  poll_timeout_secs: 3
page_sizes:
  behavior_trees: 20
"#;

    #[test]
    fn test_load_example() {
        let config = ClientConfig::from_yaml(EXAMPLE).unwrap();
        assert_eq!(config.endpoint("solution"), "http://cell-1:17080");
        assert_eq!(config.endpoint("data_logger"), "http://cell-1:17090");
        assert_eq!(config.connect_timeout(), Duration::from_millis(2500));
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.initial_delay, Duration::from_millis(50));
        assert_eq!(policy.max_delay, RetryPolicy::default().max_delay);
        assert_eq!(config.poll_timeout(), Duration::from_secs(3));
        assert_eq!(config.tree_page_size(), 20);
        assert_eq!(config.asset_page_size(), 200);
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_yaml("{}").unwrap();
        assert_eq!(config.address(), DEFAULT_ADDRESS);
        assert_eq!(config.poll_timeout(), Duration::from_secs(10));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(ClientConfig::from_yaml("retry:\n  max_attempts: 16\n").is_err());
        assert!(ClientConfig::from_yaml("page_sizes:\n  assets: 500\n").is_err());
        let err = ClientConfig::from_yaml("endpoints:\n  robots: \"http://x\"\n").unwrap_err();
        assert!(err.to_string().contains("robots"));
        assert!(ClientConfig::from_yaml("address: [").is_err());
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = ClientConfig::from_yaml(EXAMPLE).unwrap();
        let text = serde_yaml::to_string(&config).unwrap();
        assert_eq!(ClientConfig::from_yaml(&text).unwrap(), config);
    }
}
