use std::env;
use std::str::FromStr;

use thiserror::Error;

use crate::ratelimit::ServiceRates;

/// Mode selects between fixture-backed stub adapters and real cloud connectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Stub,
    Production,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(Self::Stub),
            "production" => Ok(Self::Production),
            other => Err(ConfigError::Validation(format!(
                "invalid MODE `{other}` (expected stub|production)"
            ))),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable `{0}` is not set")]
    MissingRequired(&'static str),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub mode: Mode,
    pub fixtures_dir: String,
    pub aws_region: String,
    pub aws_profile: String,
    pub cross_account_role: String,
    pub cur_database: String,
    pub cur_table: String,
    pub cur_workgroup: String,
    pub cur_output_bucket: String,
    pub kubecost_endpoint: String,

    pub worker_queues: String,

    pub api_port: u16,
    pub cors_origins: Vec<String>,

    pub oidc_issuer: String,
    pub oidc_audience: String,

    pub log_level: String,
    pub otel_enabled: bool,

    pub awsdoc_binary_path: String,

    pub rates: ServiceRates,
}

impl Config {
    /// Loads configuration from the environment. `MODE` is required; in
    /// production mode the CUR location keys must be present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode_raw = read_env("MODE").ok_or(ConfigError::MissingRequired("MODE"))?;
        let mode: Mode = mode_raw.parse()?;

        let defaults = ServiceRates::default();
        let config = Self {
            mode,
            fixtures_dir: read_env("FIXTURES_DIR").unwrap_or_default(),
            aws_region: env_or("AWS_REGION", "us-east-1"),
            aws_profile: read_env("AWS_PROFILE").unwrap_or_default(),
            cross_account_role: read_env("CROSS_ACCOUNT_ROLE").unwrap_or_default(),
            cur_database: read_env("CUR_DATABASE").unwrap_or_default(),
            cur_table: read_env("CUR_TABLE").unwrap_or_default(),
            cur_workgroup: env_or("CUR_WORKGROUP", "primary"),
            cur_output_bucket: read_env("CUR_OUTPUT_BUCKET").unwrap_or_default(),
            kubecost_endpoint: read_env("KUBECOST_ENDPOINT").unwrap_or_default(),
            worker_queues: read_env("WORKER_QUEUES").unwrap_or_default(),
            api_port: parse_port("API_PORT", &env_or("API_PORT", "8080"))?,
            cors_origins: parse_cors_origins(&read_env("CORS_ORIGINS").unwrap_or_default()),
            oidc_issuer: read_env("OIDC_ISSUER").unwrap_or_default(),
            oidc_audience: read_env("OIDC_AUDIENCE").unwrap_or_default(),
            log_level: env_or("LOG_LEVEL", "info"),
            otel_enabled: read_env("OTEL_ENABLED").as_deref() == Some("true"),
            awsdoc_binary_path: env_or("AWSDOC_BINARY_PATH", "aws-doctor"),
            rates: ServiceRates {
                cost_explorer: env_float("RATELIMIT_CE", defaults.cost_explorer),
                athena: env_float("RATELIMIT_ATHENA", defaults.athena),
                cloudwatch: env_float("RATELIMIT_CW", defaults.cloudwatch),
                sts: env_float("RATELIMIT_STS", defaults.sts),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn oidc_enabled(&self) -> bool {
        !self.oidc_issuer.is_empty()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mode == Mode::Production {
            if self.cur_database.is_empty() {
                return Err(ConfigError::Validation(
                    "CUR_DATABASE is required in production mode".to_string(),
                ));
            }
            if self.cur_table.is_empty() {
                return Err(ConfigError::Validation(
                    "CUR_TABLE is required in production mode".to_string(),
                ));
            }
            if self.cur_output_bucket.is_empty() {
                return Err(ConfigError::Validation(
                    "CUR_OUTPUT_BUCKET is required in production mode".to_string(),
                ));
            }
        }

        let level = self.log_level.trim().to_ascii_lowercase();
        match level.as_str() {
            "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ConfigError::Validation(
                "LOG_LEVEL must be one of debug|info|warn|error".to_string(),
            )),
        }
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_or(key: &str, fallback: &str) -> String {
    read_env(key).unwrap_or_else(|| fallback.to_string())
}

fn env_float(key: &str, fallback: f64) -> f64 {
    let Some(raw) = read_env(key) else {
        return fallback;
    };
    match raw.parse::<f64>() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(key, value = %raw, fallback, "ignoring invalid rate limit override");
            fallback
        }
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Validation(format!("invalid {key} `{value}`")))
}

fn parse_cors_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect();
    if origins.is_empty() {
        return vec!["*".to_string()];
    }
    origins
}
