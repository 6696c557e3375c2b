//! Startup configuration.
//!
//! Settings are layered: built-in defaults, then an optional JSON file, then
//! command-line/env overrides applied by `main`. The result is validated once
//! and shared read-only for the life of the process.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::gateway::{RefreshPolicy, RetryPolicy};
use crate::severity::Thresholds;
use crate::units::Units;

pub const SUBGRAPH_ID: &str = "QmNbfA9NhEpDnYohsVDUJjgbHNNEAj9xYFYCnd4JrrhqV3";
pub const DEFAULT_EXPLORER: &str = "https://testnet.monadexplorer.com";

/// Hosted-service endpoint for a subgraph, keyed if an API key is available.
pub fn gateway_url(api_key: Option<&str>, subgraph_id: &str) -> String {
    match api_key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => format!("https://gateway.thegraph.com/api/{key}/subgraphs/id/{subgraph_id}"),
        None => format!("https://api.thegraph.com/subgraphs/id/{subgraph_id}"),
    }
}

/// Block explorer link builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explorer {
    pub base_url: String,
}

impl Default for Explorer {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EXPLORER.to_string(),
        }
    }
}

impl Explorer {
    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn transaction(&self, hash: &str) -> String {
        format!("{}/tx/{}", self.base(), hash)
    }

    pub fn address(&self, address: &str) -> String {
        format!("{}/address/{}", self.base(), address)
    }

    pub fn token(&self, address: &str) -> String {
        format!("{}/token/{}", self.base(), address)
    }
}

/// Balance bands used to classify leaderboard accounts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhaleBands {
    /// Accounts below this are not shown at all.
    pub floor: f64,
    pub medium: f64,
    pub large: f64,
    pub mega: f64,
}

impl Default for WhaleBands {
    fn default() -> Self {
        Self {
            floor: 10_000.0,
            medium: 100_000.0,
            large: 1_000_000.0,
            mega: 10_000_000.0,
        }
    }
}

/// Minimum transfer sizes (display currency) offered as alert filters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertPresets {
    pub all: f64,
    pub medium: f64,
    pub mega: f64,
}

impl Default for AlertPresets {
    fn default() -> Self {
        Self {
            all: 50_000.0,
            medium: 250_000.0,
            mega: 1_000_000.0,
        }
    }
}

/// Shape of the optional JSON config file. Every field may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub endpoint: Option<String>,
    pub decimals: Option<u32>,
    pub thresholds: Option<Thresholds>,
    pub whale_bands: Option<WhaleBands>,
    pub alert_presets: Option<AlertPresets>,
    pub poll_secs: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub page_size: Option<u32>,
    pub explorer_url: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: String,
    pub units: Units,
    pub thresholds: Thresholds,
    pub whale_bands: WhaleBands,
    pub alert_presets: AlertPresets,
    pub refresh: RefreshPolicy,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub page_size: u32,
    pub explorer: Explorer,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: gateway_url(None, SUBGRAPH_ID),
            units: Units::default(),
            thresholds: Thresholds::default(),
            whale_bands: WhaleBands::default(),
            alert_presets: AlertPresets::default(),
            refresh: RefreshPolicy::manual(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
            page_size: 20,
            explorer: Explorer::default(),
        }
    }
}

impl Settings {
    /// Overlay whatever the config file sets on top of `self`.
    pub fn merge_file(mut self, file: FileConfig) -> Self {
        if let Some(endpoint) = file.endpoint {
            self.endpoint = endpoint;
        }
        if let Some(decimals) = file.decimals {
            self.units = Units::new(decimals);
        }
        if let Some(thresholds) = file.thresholds {
            self.thresholds = thresholds;
        }
        if let Some(bands) = file.whale_bands {
            self.whale_bands = bands;
        }
        if let Some(presets) = file.alert_presets {
            self.alert_presets = presets;
        }
        if let Some(secs) = file.poll_secs {
            self.refresh = RefreshPolicy::from_secs(secs);
        }
        if let Some(attempts) = file.retry_attempts {
            self.retry.attempts = attempts;
        }
        if let Some(ms) = file.retry_backoff_ms {
            self.retry.backoff = Duration::from_millis(ms);
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(page_size) = file.page_size {
            self.page_size = page_size;
        }
        if let Some(url) = file.explorer_url {
            self.explorer = Explorer { base_url: url };
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint is empty".into()));
        }
        // 10^38 is past what f64 scaling can represent meaningfully.
        if self.units.decimals > 36 {
            return Err(ConfigError::Invalid(format!(
                "decimals must be at most 36, got {}",
                self.units.decimals
            )));
        }
        if !self.thresholds.is_monotonic() {
            return Err(ConfigError::Invalid(format!(
                "severity thresholds must increase: medium {} < large {} < high {} < mega {}",
                self.thresholds.medium,
                self.thresholds.large,
                self.thresholds.high,
                self.thresholds.mega
            )));
        }
        let b = &self.whale_bands;
        if !(b.floor >= 0.0 && b.floor <= b.medium && b.medium < b.large && b.large < b.mega) {
            return Err(ConfigError::Invalid(
                "whale bands must increase: floor <= medium < large < mega".into(),
            ));
        }
        let p = &self.alert_presets;
        if !(p.all >= 0.0 && p.all <= p.medium && p.medium <= p.mega) {
            return Err(ConfigError::Invalid(
                "alert presets must increase: all <= medium <= mega".into(),
            ));
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::Invalid("retry attempts must be at least 1".into()));
        }
        if self.page_size == 0 || self.page_size > 1000 {
            return Err(ConfigError::Invalid(format!(
                "page size must be within 1..=1000, got {}",
                self.page_size
            )));
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        info!(
            endpoint = %redact(&self.endpoint),
            decimals = self.units.decimals,
            medium = self.thresholds.medium,
            large = self.thresholds.large,
            high = self.thresholds.high,
            mega = self.thresholds.mega,
            refresh = %self.refresh,
            "settings loaded"
        );
    }
}

/// Hide the API key segment of a gateway URL for logging.
fn redact(endpoint: &str) -> String {
    match endpoint.split_once("/api/") {
        Some((head, rest)) => match rest.split_once('/') {
            Some((_, tail)) => format!("{head}/api/***/{tail}"),
            None => format!("{head}/api/***"),
        },
        None => endpoint.to_string(),
    }
}
