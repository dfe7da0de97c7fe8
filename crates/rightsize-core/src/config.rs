//! rightsize.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::error::CoreError;
use crate::types::{ScalerRecord, ScalerSpec};

pub const DEFAULT_PORT: u16 = 8480;
pub const DEFAULT_DATA_DIR: &str = "/var/lib/rightsize";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RightsizeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub scalers: Vec<ScalerEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: Option<u16>,
    pub data_dir: Option<String>,
}

/// Controller timings. Every field is a duration string like "30s" or "5m".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub requeue_interval: Option<String>,
    pub cooldown: Option<String>,
    pub call_timeout: Option<String>,
    pub discovery_interval: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub functions: Vec<FunctionConfig>,
    #[serde(default)]
    pub queues: Vec<QueueConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionConfig {
    pub name: String,
    pub reserved_concurrency: Option<i32>,
    /// Event source ARNs; the trailing segment is the queue name.
    #[serde(default)]
    pub triggers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub name: String,
    #[serde(default)]
    pub datapoints: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerEntry {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
    pub spec: ScalerSpec,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl ScalerEntry {
    pub fn to_record(&self) -> ScalerRecord {
        ScalerRecord::new(&self.namespace, &self.name, self.spec.clone())
    }
}

impl ControllerConfig {
    pub fn requeue_interval(&self) -> Result<Duration, CoreError> {
        duration_or(&self.requeue_interval, Duration::from_secs(5 * 60))
    }

    pub fn cooldown(&self) -> Result<Duration, CoreError> {
        duration_or(&self.cooldown, Duration::from_secs(5 * 60))
    }

    pub fn call_timeout(&self) -> Result<Duration, CoreError> {
        duration_or(&self.call_timeout, Duration::from_secs(30))
    }

    pub fn discovery_interval(&self) -> Result<Duration, CoreError> {
        duration_or(&self.discovery_interval, Duration::from_secs(15))
    }
}

impl RightsizeConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: RightsizeConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn port(&self) -> u16 {
        self.server.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn data_dir(&self) -> &str {
        self.server.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR)
    }

    /// Check durations, scaler specs, and key uniqueness.
    ///
    /// Every interval except `cooldown` must be non-zero.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.controller.cooldown()?;
        for (field, value) in [
            ("requeue_interval", self.controller.requeue_interval()?),
            ("call_timeout", self.controller.call_timeout()?),
            ("discovery_interval", self.controller.discovery_interval()?),
        ] {
            if value.is_zero() {
                return Err(CoreError::InvalidDuration(format!(
                    "{field} must be non-zero"
                )));
            }
        }

        let mut seen = HashSet::new();
        for entry in &self.scalers {
            entry.spec.validate().map_err(|e| match e {
                CoreError::InvalidSpec(msg) => CoreError::InvalidSpec(format!(
                    "{}/{}: {msg}",
                    entry.namespace, entry.name
                )),
                other => other,
            })?;
            let key = format!("{}/{}", entry.namespace, entry.name);
            if !seen.insert(key.clone()) {
                return Err(CoreError::InvalidSpec(format!("duplicate scaler {key}")));
            }
        }
        Ok(())
    }
}

fn duration_or(value: &Option<String>, default: Duration) -> Result<Duration, CoreError> {
    match value {
        Some(s) => parse_duration(s),
        None => Ok(default),
    }
}

/// Parse a duration string like "500ms", "30s", "5m", "1h".
pub fn parse_duration(s: &str) -> Result<Duration, CoreError> {
    let s = s.trim();
    let invalid = || CoreError::InvalidDuration(s.to_string());

    let (digits, unit_ms) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3_600_000)
    } else {
        return Err(invalid());
    };

    let value: u64 = digits.trim().parse().map_err(|_| invalid())?;
    let millis = value.checked_mul(unit_ms).ok_or_else(invalid)?;
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[server]
port = 9000
data_dir = "/tmp/rightsize"

[controller]
requeue_interval = "1m"
cooldown = "2m"
call_timeout = "500ms"

[[platform.functions]]
name = "orders-worker"
reserved_concurrency = 10
triggers = ["arn:aws:sqs:eu-west-1:123456789012:orders"]

[[platform.queues]]
name = "orders"
datapoints = [40.0, 55.0]

[[scalers]]
name = "orders"
spec = { queueId = "orders", backlogThreshold = 20, functionId = "orders-worker", minConcurrency = 5, maxConcurrency = 100, stepConcurrency = 5 }
"#;

    #[test]
    fn test_parse_full() {
        let config = RightsizeConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.port(), 9000);
        assert_eq!(config.data_dir(), "/tmp/rightsize");
        assert_eq!(
            config.controller.requeue_interval().unwrap(),
            Duration::from_secs(60)
        );
        assert_eq!(
            config.controller.call_timeout().unwrap(),
            Duration::from_millis(500)
        );
        assert_eq!(config.platform.functions[0].reserved_concurrency, Some(10));
        assert_eq!(config.platform.queues[0].datapoints, vec![40.0, 55.0]);

        let record = config.scalers[0].to_record();
        assert_eq!(record.table_key(), "default/orders");
        assert_eq!(record.spec.step_concurrency, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_intervals_rejected() {
        for field in ["requeue_interval", "call_timeout", "discovery_interval"] {
            let config =
                RightsizeConfig::from_toml_str(&format!("[controller]\n{field} = \"0s\"\n"))
                    .unwrap();
            match config.validate() {
                Err(CoreError::InvalidDuration(msg)) => assert!(msg.contains(field), "{msg}"),
                other => panic!("{field}: expected InvalidDuration, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_zero_cooldown_allowed() {
        let config = RightsizeConfig::from_toml_str("[controller]\ncooldown = \"0s\"\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = RightsizeConfig::from_toml_str("").unwrap();
        assert_eq!(config.port(), DEFAULT_PORT);
        assert_eq!(config.data_dir(), DEFAULT_DATA_DIR);
        assert_eq!(
            config.controller.cooldown().unwrap(),
            Duration::from_secs(300)
        );
        assert_eq!(
            config.controller.discovery_interval().unwrap(),
            Duration::from_secs(15)
        );
        assert!(config.scalers.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_spec() {
        let toml_str = r#"
[[scalers]]
namespace = "prod"
name = "broken"
spec = { queueId = "q", backlogThreshold = 1, functionId = "f", minConcurrency = 10, maxConcurrency = 5, stepConcurrency = 1 }
"#;
        let config = RightsizeConfig::from_toml_str(toml_str).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("prod/broken"));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let entry = r#"
[[scalers]]
name = "dup"
spec = { queueId = "q", backlogThreshold = 1, functionId = "f", minConcurrency = 1, maxConcurrency = 5, stepConcurrency = 1 }
"#;
        let config = RightsizeConfig::from_toml_str(&entry.repeat(2)).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_duration() {
        let config = RightsizeConfig::from_toml_str("[controller]\ncooldown = \"soon\"\n").unwrap();
        assert_eq!(
            config.validate(),
            Err(CoreError::InvalidDuration("soon".to_string()))
        );
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = RightsizeConfig::from_toml_str(FULL).unwrap();
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("orders-worker"));
        assert!(rendered.contains("queueId"));
    }
}
