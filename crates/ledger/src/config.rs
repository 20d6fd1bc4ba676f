//! Configuration management for the AnnSuraksha ledger.
//!
//! This module handles loading configuration from:
//! - TOML files (with `${VAR}` environment expansion)
//! - Environment variables (and a `.env` file)
//! - Default values (fallbacks)
//!
//! The `[chain]` section is optional. Without it the workflows run against
//! the offline mirror.

use alloy::primitives::Address;
use annsuraksha_core::{
    ALERT_DEBOUNCE_HOURS, FRAUD_PROBABILITY_THRESHOLD, LOW_TRUST_THRESHOLD, RECENT_WINDOW_DAYS,
};
use annsuraksha_scoring::ModelParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the ledger services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Smart-contract mirror; absent means offline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainConfig>,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Alerting loop configuration
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Model training and snapshot configuration
    #[serde(default)]
    pub models: ModelsConfig,

    /// HTTP API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Chain connection and signing key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Ethereum RPC URL
    pub rpc_url: String,

    /// Chain ID
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Supply-chain contract address
    pub contract_address: Address,

    /// Hex private key of the sending account
    pub private_key: String,

    /// Expected sender; checked against the key when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_address: Option<Address>,

    /// Max wait for a transaction receipt
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
}

impl ChainConfig {
    /// Receipt timeout as a [`Duration`].
    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum pool connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum pool connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

/// Alerting loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Sleep between successful iterations
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Sleep after a failed iteration or while models are unfitted
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,

    /// Users strictly below this score are scanned
    #[serde(default = "default_low_trust_threshold")]
    pub low_trust_threshold: u8,

    /// Fraud probability above which an alert is raised
    #[serde(default = "default_fraud_threshold")]
    pub fraud_threshold: f64,

    /// Minimum hours between alerts for one user
    #[serde(default = "default_alert_debounce_hours")]
    pub alert_debounce_hours: i64,

    /// Pending deliveries scored per iteration
    #[serde(default = "default_delivery_batch")]
    pub delivery_batch: i64,
}

impl MonitorConfig {
    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Backoff as a [`Duration`].
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            backoff_secs: default_backoff_secs(),
            low_trust_threshold: default_low_trust_threshold(),
            fraud_threshold: default_fraud_threshold(),
            alert_debounce_hours: default_alert_debounce_hours(),
            delivery_batch: default_delivery_batch(),
        }
    }
}

/// Model training and snapshot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Directory holding `models.json`
    #[serde(default = "default_model_dir")]
    pub dir: PathBuf,

    /// Only users registered at least this many days ago train the models
    #[serde(default = "default_min_account_age_days")]
    pub min_account_age_days: i64,

    /// Cap on training users
    #[serde(default = "default_max_training_users")]
    pub max_training_users: i64,

    /// Deliveries a user needs to contribute a trust row
    #[serde(default = "default_min_user_deliveries")]
    pub min_user_deliveries: usize,

    /// Estimator hyperparameters
    #[serde(flatten)]
    pub params: ModelParams,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: default_model_dir(),
            min_account_age_days: default_min_account_age_days(),
            max_training_users: default_max_training_users(),
            min_user_deliveries: default_min_user_deliveries(),
            params: ModelParams::default(),
        }
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bind host
    #[serde(default = "default_api_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// HS256 signing secret for session tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    /// Token lifetime
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            jwt_secret: default_jwt_secret(),
            token_ttl_hours: default_token_ttl_hours(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_chain_id() -> u64 {
    1337
}

fn default_receipt_timeout_secs() -> u64 {
    300
}

fn default_database_url() -> String {
    "sqlite://annsuraksha.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_backoff_secs() -> u64 {
    60
}

fn default_low_trust_threshold() -> u8 {
    LOW_TRUST_THRESHOLD
}

fn default_fraud_threshold() -> f64 {
    FRAUD_PROBABILITY_THRESHOLD
}

fn default_alert_debounce_hours() -> i64 {
    ALERT_DEBOUNCE_HOURS
}

fn default_delivery_batch() -> i64 {
    500
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_min_account_age_days() -> i64 {
    RECENT_WINDOW_DAYS
}

fn default_max_training_users() -> i64 {
    1000
}

fn default_min_user_deliveries() -> usize {
    5
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    5000
}

fn default_jwt_secret() -> String {
    "annsuraksha-dev-secret".to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables can be referenced using `${VAR_NAME}` syntax.
    /// For example: `private_key = "${PRIVATE_KEY}"`
    ///
    /// # Example
    /// ```no_run
    /// # use annsuraksha_ledger::config::Config;
    /// let config = Config::from_file("annsuraksha.toml")?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let expanded = Self::expand_env_vars(&contents)?;

        let config: Config = toml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml).context("Failed to parse TOML configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Build configuration from environment variables, reading `.env` first.
    ///
    /// The chain section is enabled when `WEB3_PROVIDER_URI`,
    /// `CONTRACT_ADDRESS` and `PRIVATE_KEY` are all set.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from `path` if it exists, otherwise from the environment.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Self::from_env()
        }
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        let rpc_url = get("WEB3_PROVIDER_URI");
        let contract = get("CONTRACT_ADDRESS");
        let private_key = get("PRIVATE_KEY");
        if let (Some(rpc_url), Some(contract), Some(private_key)) = (rpc_url, contract, private_key)
        {
            let account_address = get("ACCOUNT_ADDRESS")
                .map(|a| a.parse::<Address>())
                .transpose()
                .context("Invalid ACCOUNT_ADDRESS")?;
            let chain_id = get("CHAIN_ID")
                .map(|c| c.parse::<u64>())
                .transpose()
                .context("Invalid CHAIN_ID")?;

            config.chain = Some(ChainConfig {
                rpc_url,
                chain_id: chain_id.unwrap_or_else(default_chain_id),
                contract_address: contract.parse().context("Invalid CONTRACT_ADDRESS")?,
                private_key,
                account_address,
                receipt_timeout_secs: default_receipt_timeout_secs(),
            });
        }

        if let Some(url) = get("DATABASE_URL") {
            config.database.url = url;
        }
        if let Some(dir) = get("MODEL_DIR") {
            config.models.dir = PathBuf::from(dir);
        }
        if let Some(secret) = get("JWT_SECRET") {
            config.api.jwt_secret = secret;
        }
        if let Some(port) = get("PORT") {
            config.api.port = port.parse().context("Invalid PORT")?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if let Some(chain) = &self.chain {
            if chain.rpc_url.is_empty() {
                anyhow::bail!("Chain rpc_url cannot be empty");
            }
            if chain.chain_id == 0 {
                anyhow::bail!("Chain ID must be non-zero");
            }
            if chain.contract_address.is_zero() {
                anyhow::bail!("Chain contract_address must be a non-zero address");
            }
            let key = chain.private_key.trim_start_matches("0x");
            if key.len() != 64 {
                anyhow::bail!(
                    "Chain private_key must be 64 hex characters (got {})",
                    key.len()
                );
            }
            if !key.chars().all(|c| c.is_ascii_hexdigit()) {
                anyhow::bail!("Chain private_key must be a valid hex string");
            }
            if chain.receipt_timeout_secs == 0 {
                anyhow::bail!("Chain receipt_timeout_secs must be > 0");
            }
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be > 0");
        }
        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot exceed max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.monitor.poll_interval_secs == 0 || self.monitor.backoff_secs == 0 {
            anyhow::bail!("Monitor poll_interval_secs and backoff_secs must be > 0");
        }
        if !(0.0..=1.0).contains(&self.monitor.fraud_threshold) {
            anyhow::bail!(
                "Monitor fraud_threshold must be within [0, 1] (got {})",
                self.monitor.fraud_threshold
            );
        }
        if self.monitor.low_trust_threshold > 100 {
            anyhow::bail!("Monitor low_trust_threshold must be <= 100");
        }
        if self.monitor.delivery_batch <= 0 {
            anyhow::bail!("Monitor delivery_batch must be > 0");
        }

        let params = &self.models.params;
        if !(params.contamination > 0.0 && params.contamination <= 0.5) {
            anyhow::bail!(
                "Models contamination must be within (0, 0.5] (got {})",
                params.contamination
            );
        }
        if params.n_trees == 0 || params.dbscan_min_samples == 0 {
            anyhow::bail!("Models n_trees and dbscan_min_samples must be > 0");
        }
        if params.dbscan_eps <= 0.0 {
            anyhow::bail!("Models dbscan_eps must be > 0");
        }

        if self.api.jwt_secret.is_empty() {
            anyhow::bail!("API jwt_secret cannot be empty");
        }
        if self.api.token_ttl_hours <= 0 {
            anyhow::bail!("API token_ttl_hours must be > 0");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Logging level must be one of: {} (got '{}')",
                valid_levels.join(", "),
                self.logging.level
            );
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!(
                "Logging format must be one of: {} (got '{}')",
                valid_formats.join(", "),
                self.logging.format
            );
        }

        Ok(())
    }

    /// Expand `${VAR_NAME}` placeholders.
    ///
    /// Placeholders after a `#` that is outside a quoted string are comment
    /// text and left alone. Inside `"..."` and `'...'` they are expanded.
    fn expand_env_vars(input: &str) -> Result<String> {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().enumerate().peekable();
        let mut quote: Option<char> = None;
        let mut in_comment = false;
        let mut escaped = false;

        while let Some((pos, ch)) = chars.next() {
            if escaped {
                escaped = false;
                result.push(ch);
                continue;
            }

            match ch {
                '\n' => {
                    in_comment = false;
                    result.push(ch);
                }
                _ if in_comment => result.push(ch),
                '\\' if quote == Some('"') => {
                    escaped = true;
                    result.push(ch);
                }
                '"' | '\'' => {
                    match quote {
                        None => quote = Some(ch),
                        Some(open) if open == ch => quote = None,
                        Some(_) => {}
                    }
                    result.push(ch);
                }
                '#' if quote.is_none() => {
                    in_comment = true;
                    result.push(ch);
                }
                '$' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();

                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }

                    if !closed {
                        anyhow::bail!(
                            "Unclosed environment variable placeholder at position {}",
                            pos
                        );
                    }
                    if name.is_empty() {
                        anyhow::bail!("Empty environment variable name at position {}", pos);
                    }

                    let value = std::env::var(&name).with_context(|| {
                        format!(
                            "Environment variable '{}' is not set (referenced at position {})",
                            name, pos
                        )
                    })?;
                    result.push_str(&value);
                }
                _ => result.push(ch),
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY: &str = "abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234";

    #[test]
    fn test_defaults_without_chain() {
        let config = Config::from_toml_str("").unwrap();

        assert!(config.chain.is_none());
        assert_eq!(config.database.url, "sqlite://annsuraksha.db");
        assert_eq!(config.monitor.poll_interval_secs, 300);
        assert_eq!(config.monitor.backoff_secs, 60);
        assert_eq!(config.monitor.low_trust_threshold, 30);
        assert_eq!(config.monitor.fraud_threshold, 0.85);
        assert_eq!(config.monitor.alert_debounce_hours, 24);
        assert_eq!(config.models.min_account_age_days, 30);
        assert_eq!(config.models.max_training_users, 1000);
        assert_eq!(config.models.params.dbscan_min_samples, 5);
        assert_eq!(config.api.port, 5000);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_full_config() {
        let toml = format!(
            r#"
[chain]
rpc_url = "http://127.0.0.1:8545"
chain_id = 31337
contract_address = "0x1111111111111111111111111111111111111111"
private_key = "0x{KEY}"

[database]
url = "sqlite://test.db"

[monitor]
poll_interval_secs = 10

[models]
dir = "/tmp/models"
contamination = 0.2
n_trees = 50

[logging]
format = "json"
"#
        );

        let config = Config::from_toml_str(&toml).unwrap();
        let chain = config.chain.unwrap();
        assert_eq!(chain.chain_id, 31337);
        assert_eq!(chain.receipt_timeout(), Duration::from_secs(300));
        assert_eq!(config.monitor.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.models.dir, PathBuf::from("/tmp/models"));
        assert_eq!(config.models.params.contamination, 0.2);
        assert_eq!(config.models.params.n_trees, 50);
        assert_eq!(config.models.params.dbscan_eps, 0.5);
    }

    #[test]
    fn test_validation_invalid_private_key() {
        let toml = r#"
[chain]
rpc_url = "http://127.0.0.1:8545"
contract_address = "0x1111111111111111111111111111111111111111"
private_key = "0xnothex"
"#;
        let err = Config::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("private_key"));
    }

    #[test]
    fn test_validation_zero_contract() {
        let toml = format!(
            r#"
[chain]
rpc_url = "http://127.0.0.1:8545"
contract_address = "0x0000000000000000000000000000000000000000"
private_key = "{KEY}"
"#
        );
        let err = Config::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("non-zero"));
    }

    #[test]
    fn test_validation_thresholds() {
        assert!(Config::from_toml_str("[monitor]\nfraud_threshold = 1.5").is_err());
        assert!(Config::from_toml_str("[models]\ncontamination = 0.0").is_err());
        assert!(Config::from_toml_str("[logging]\nlevel = \"loud\"").is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, String> = [
            ("WEB3_PROVIDER_URI", "http://localhost:8545".to_string()),
            (
                "CONTRACT_ADDRESS",
                "0x2222222222222222222222222222222222222222".to_string(),
            ),
            ("PRIVATE_KEY", KEY.to_string()),
            ("DATABASE_URL", "sqlite://env.db".to_string()),
            ("PORT", "8080".to_string()),
        ]
        .into_iter()
        .collect();

        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        let chain = config.chain.unwrap();
        assert_eq!(chain.rpc_url, "http://localhost:8545");
        assert_eq!(chain.chain_id, 1337);
        assert!(chain.account_address.is_none());
        assert_eq!(config.database.url, "sqlite://env.db");
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn test_from_lookup_partial_chain_is_offline() {
        let config = Config::from_lookup(|k| {
            (k == "WEB3_PROVIDER_URI").then(|| "http://localhost:8545".to_string())
        })
        .unwrap();
        assert!(config.chain.is_none());
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("ANNS_TEST_VAR", "hello");
        let result = Config::expand_env_vars("value = \"${ANNS_TEST_VAR}\"").unwrap();
        assert_eq!(result, "value = \"hello\"");
        std::env::remove_var("ANNS_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_errors() {
        let err = Config::expand_env_vars("x = ${ANNS_UNDEFINED_12345}").unwrap_err();
        assert!(err.to_string().contains("ANNS_UNDEFINED_12345"));

        let err = Config::expand_env_vars("x = ${}").unwrap_err();
        assert!(err.to_string().contains("Empty"));

        let err = Config::expand_env_vars("x = ${OPEN").unwrap_err();
        assert!(err.to_string().contains("Unclosed"));
    }

    #[test]
    fn test_expand_env_vars_skips_comments() {
        let input = "# set ${ANNS_NOT_SET_IN_COMMENT}\nkey = \"a#b\" # ${ALSO_NOT_SET}\n";
        let result = Config::expand_env_vars(input).unwrap();
        assert_eq!(result, input);
    }
}
