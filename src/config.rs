use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::external::retrying_provider::{Backoff, RetryPolicy};
use crate::services::alignment_service::{AlignmentConfig, Resample};
use crate::services::beta_service::{BetaConfig, ReturnClip};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Service configuration, read once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub price_provider: String,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub alignment: AlignmentConfig,
    pub beta: BetaConfig,
    /// Key for the text-generation feature; the price engine never reads it.
    pub openai_api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            price_provider: "yahoo".to_string(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
            alignment: AlignmentConfig::default(),
            beta: BetaConfig::default(),
            openai_api_key: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_retries = parse_or(&lookup, "PROVIDER_MAX_RETRIES", defaults.retry.max_retries)?;
        let base = Duration::from_millis(parse_or(&lookup, "PROVIDER_RETRY_BASE_MS", 500u64)?);
        let max = Duration::from_millis(parse_or(&lookup, "PROVIDER_RETRY_MAX_MS", 8000u64)?);
        let backoff = match lookup("PROVIDER_RETRY_BACKOFF").as_deref().map(str::trim) {
            None | Some("") | Some("exponential") => Backoff::Exponential { base, max, jitter: true },
            Some("fixed") => Backoff::Fixed { delay: base },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "PROVIDER_RETRY_BACKOFF",
                    value: other.to_string(),
                    reason: "expected 'fixed' or 'exponential'".to_string(),
                })
            }
        };

        let resample = parse_or(&lookup, "ALIGN_RESAMPLE", Resample::Daily)?;

        Ok(Self {
            bind_addr: parse_or(&lookup, "BIND_ADDR", defaults.bind_addr)?,
            port: parse_or(&lookup, "PORT", defaults.port)?,
            price_provider: lookup("PRICE_PROVIDER")
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .unwrap_or(defaults.price_provider),
            retry: RetryPolicy { max_retries, backoff },
            request_timeout: Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30u64)?),
            alignment: AlignmentConfig {
                outlier_filter: parse_or(&lookup, "ALIGN_OUTLIER_FILTER", true)?,
                split_correction: parse_or(&lookup, "ALIGN_SPLIT_CORRECTION", true)?,
                currency_conversion: parse_or(&lookup, "ALIGN_CURRENCY_CONVERSION", true)?,
                resample,
            },
            beta: BetaConfig {
                clip: parse_or(&lookup, "BETA_RETURN_CLIP", ReturnClip::Off)?,
                ..defaults.beta
            },
            openai_api_key: lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}
