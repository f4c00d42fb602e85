use crate::classifier::DEFAULT_CLASSIFIER_TIMEOUT;
use crate::guard::GuardOptions;
use crate::network::DEFAULT_DNS_TIMEOUT;
use crate::settlement::SettlementOptions;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const ENV_CLASSIFIER_TIMEOUT_MS: &str = "VIGIL_CLASSIFIER_TIMEOUT_MS";
pub const ENV_DNS_TIMEOUT_MS: &str = "VIGIL_DNS_TIMEOUT_MS";

/// Timeouts for the two outbound calls the pipeline makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub classifier_timeout: Duration,
    pub dns_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            classifier_timeout: DEFAULT_CLASSIFIER_TIMEOUT,
            dns_timeout: DEFAULT_DNS_TIMEOUT,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Invalid or zero values are ignored with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        let classifier_ms = lookup(ENV_CLASSIFIER_TIMEOUT_MS);
        if let Some(d) = parse_millis(ENV_CLASSIFIER_TIMEOUT_MS, classifier_ms) {
            cfg.classifier_timeout = d;
        }
        if let Some(d) = parse_millis(ENV_DNS_TIMEOUT_MS, lookup(ENV_DNS_TIMEOUT_MS)) {
            cfg.dns_timeout = d;
        }
        cfg
    }

    pub fn guard_options(&self) -> GuardOptions {
        GuardOptions::default().with_timeout(self.classifier_timeout)
    }

    pub fn settlement_options(&self) -> SettlementOptions {
        SettlementOptions {
            timeout: self.classifier_timeout,
            ..SettlementOptions::default()
        }
    }
}

fn parse_millis(key: &str, raw: Option<String>) -> Option<Duration> {
    let raw = raw?;
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => {
            tracing::warn!(
                event = "config_invalid",
                reason = "W_CONFIG_IGNORED",
                key,
                value = %raw,
                "expected a positive number of milliseconds; using default"
            );
            None
        }
    }
}
