//! Service configuration.
//!
//! Sources, later ones winning:
//!
//! 1. YAML file (`config.yaml` unless `-f` / `PRICE_CONFIG` says otherwise)
//! 2. `APP_PORT`, kept for existing deployments
//! 3. `PRICE_`-prefixed environment variables, e.g. `PRICE_MEDIAN_WINDOW=5000`
//!    or `PRICE_REQUEST_TIMEOUT=500ms`

use clap::Parser;
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Fields settable through `PRICE_*`; other variables with that prefix are
/// left alone.
const CONFIG_KEYS: [&str; 7] = [
    "host",
    "port",
    "model_path",
    "pipeline_path",
    "endpoint",
    "median_window",
    "request_timeout",
];

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "PRICE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Load configuration and model artifacts, then exit without serving.
    #[arg(long)]
    pub validate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Serialized regression model (CatBoost JSON export)
    pub model_path: PathBuf,
    /// Fitted preprocessing transform, versioned with the model
    pub pipeline_path: PathBuf,
    /// Route serving predictions; also the `endpoint` metric label
    pub endpoint: String,
    /// Number of recent predictions the median is computed over
    pub median_window: usize,
    /// Upper bound on assembling and predicting a single request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_path: PathBuf::from("models/catboost/model.json"),
            pipeline_path: PathBuf::from("models/pipeline.json"),
            endpoint: "/api/price/".to_string(),
            median_window: 10_000,
            request_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(args).extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::raw().only(&["APP_PORT"]).map(|_| "port".into()))
            .merge(Env::prefixed("PRICE_").only(&CONFIG_KEYS))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.median_window == 0 {
            return Err(ConfigError::Invalid("median_window must be at least 1".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid("request_timeout must be positive".into()));
        }
        if !self.endpoint.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "endpoint `{}` must start with `/`",
                self.endpoint
            )));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
