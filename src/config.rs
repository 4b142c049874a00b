use std::{env::VarError, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use config::{Config, File};
use serde::Deserialize;
use url::Url;

use crate::mutation::RetryPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "settings.yml";
const API_BASE_ENV: &str = "FOOD_API_BASE";
const RETRIES_ENV: &str = "FOOD_API_RETRIES";

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base: Url,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub cache_capacity: u64,
    pub cache_ttl: Option<Duration>,
}

#[derive(Deserialize)]
#[serde(default)]
struct FileConfig {
    api_base: String,
    retries: u32,
    retry_delay_ms: u64,
    request_timeout_secs: u64,
    idempotency_keys: bool,
    cache_capacity: u64,
    cache_ttl_secs: Option<u64>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            // reverse proxy in front of the backend
            api_base: "http://localhost/api".to_string(),
            retries: 2,
            retry_delay_ms: 0,
            request_timeout_secs: 30,
            idempotency_keys: true,
            cache_capacity: 64,
            cache_ttl_secs: None,
        }
    }
}

fn load_file_config(path: &str) -> Result<FileConfig> {
    let settings = Config::builder()
        .add_source(File::with_name(path).required(false))
        .build()
        .map_err(|e| anyhow!("Failed to read config file {path}: {e}"))?;

    settings
        .try_deserialize::<FileConfig>()
        .map_err(|e| anyhow!("Failed to deserialize config file {path}: {e}"))
}

/// Reads `env_var` through `parse`. Unset gives `None`; set but unparsable is an error.
fn env_override<T, F>(env_var: &str, parse: F) -> Result<Option<T>>
where
    F: FnOnce(&str) -> Result<T>,
{
    match std::env::var(env_var) {
        Ok(raw) => parse(&raw)
            .with_context(|| format!("{env_var}=`{raw}` is not valid"))
            .map(Some),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => bail!("{env_var} is not valid unicode"),
    }
}

fn build(file: FileConfig, api_base: Option<Url>, retries: Option<u32>) -> Result<Settings> {
    let api_base = match api_base {
        Some(url) => url,
        None => Url::parse(&file.api_base)
            .with_context(|| format!("api_base `{}` is not a valid URL", file.api_base))?,
    };

    if file.request_timeout_secs == 0 {
        bail!("request_timeout_secs must be greater than zero");
    }

    Ok(Settings {
        api_base,
        retry: RetryPolicy {
            retries: retries.unwrap_or(file.retries),
            delay: Duration::from_millis(file.retry_delay_ms),
            idempotency_keys: file.idempotency_keys,
        },
        request_timeout: Duration::from_secs(file.request_timeout_secs),
        cache_capacity: file.cache_capacity,
        cache_ttl: file.cache_ttl_secs.map(Duration::from_secs),
    })
}

/// [`load_from`] the default `settings.yml`
pub fn load() -> Result<Settings> {
    load_from(DEFAULT_CONFIG_PATH)
}

/// Load configuration from `path` (optional) with `FOOD_API_*` env overrides
pub fn load_from(path: &str) -> Result<Settings> {
    let api_base = env_override(API_BASE_ENV, |raw| Ok(Url::parse(raw)?))?;
    let retries = env_override(RETRIES_ENV, |raw| Ok(raw.parse::<u32>()?))?;

    let file = load_file_config(path)?;

    if api_base.is_none() {
        tracing::debug!("{API_BASE_ENV} is not set, using value from {path}");
    }

    build(file, api_base, retries)
}
