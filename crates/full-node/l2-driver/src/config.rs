use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Configuration of the [`Driver`](crate::Driver).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct DriverConfig {
    /// Pause between two successful derivation steps (in milliseconds).
    pub step_interval_ms: u64,
    /// Base of the exponential backoff applied to retryable failures (in milliseconds).
    pub retry_delay_ms: u64,
    /// Consecutive failures after which a step gives up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Whether this node sequences blocks of its own.
    #[serde(default)]
    pub sequencer_enabled: bool,
}

fn default_max_attempts() -> u32 {
    u32::MAX
}

impl DriverConfig {
    /// [`Self::step_interval_ms`] as a [`Duration`].
    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms)
    }

    /// [`Self::retry_delay_ms`] as a [`Duration`].
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Rollup node configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct RollupConfig<ExecutionConfig> {
    /// Driver configuration.
    pub driver: DriverConfig,
    /// Execution backend configuration.
    pub execution: ExecutionConfig,
}

/// Reads toml file as a specific type.
pub fn from_toml_path<P: AsRef<Path>, R: DeserializeOwned>(path: P) -> anyhow::Result<R> {
    let mut contents = String::new();
    {
        let mut file = File::open(path)?;
        file.read_to_string(&mut contents)?;
    }
    tracing::debug!(
        size_in_bytes = contents.len(),
        contents,
        "Parsing config file"
    );

    let result: R = toml::from_str(&contents)?;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use l2_execution::ExecutionConfig;
    use tempfile::NamedTempFile;

    use super::*;

    fn create_config_from(content: &str) -> NamedTempFile {
        let mut config_file = NamedTempFile::new().unwrap();
        config_file.write_all(content.as_bytes()).unwrap();
        config_file
    }

    #[test]
    fn test_correct_config() {
        let config = r#"
            [driver]
            step_interval_ms = 2000
            retry_delay_ms = 250
            max_attempts = 10
            sequencer_enabled = true
            [execution]
            chain_id = 901
            eip155_block = 4
            gas_ceil = 30000000
        "#;

        let config_file = create_config_from(config);

        let config: RollupConfig<ExecutionConfig> = from_toml_path(config_file.path()).unwrap();

        let expected = RollupConfig {
            driver: DriverConfig {
                step_interval_ms: 2000,
                retry_delay_ms: 250,
                max_attempts: 10,
                sequencer_enabled: true,
            },
            execution: ExecutionConfig {
                chain_id: 901,
                eip155_block: 4,
                gas_ceil: 30_000_000,
            },
        };
        assert_eq!(config, expected);
        assert_eq!(config.driver.step_interval(), Duration::from_secs(2));
        assert_eq!(config.driver.retry_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_defaults() {
        let config = r#"
            step_interval_ms = 100
            retry_delay_ms = 10
        "#;

        let config_file = create_config_from(config);

        let config: DriverConfig = from_toml_path(config_file.path()).unwrap();
        assert_eq!(config.max_attempts, u32::MAX);
        assert!(!config.sequencer_enabled);
    }

    #[test]
    fn test_missing_field() {
        let config_file = create_config_from("step_interval_ms = 100");

        let result: anyhow::Result<DriverConfig> = from_toml_path(config_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();

        let result: anyhow::Result<DriverConfig> = from_toml_path(dir.path().join("absent.toml"));
        assert!(result.is_err());
    }
}
