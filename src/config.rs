use crate::error::{BridgeError, Result};
use crate::query::stopwords::default_stop_words;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_QUERY_LIMIT: usize = 999_999;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

pub fn default_ranking_rules() -> Vec<String> {
    ["words", "typo", "proximity", "attribute", "sort", "exactness"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// How an indexing run writes documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStrategy {
    /// Empty the index, then insert every record.
    Hard,
    /// Upsert every record without clearing.
    #[default]
    Soft,
    /// Upsert only records modified inside the delta window.
    Delta,
}

impl FromStr for UpdateStrategy {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hard" => Ok(UpdateStrategy::Hard),
            "soft" => Ok(UpdateStrategy::Soft),
            "delta" => Ok(UpdateStrategy::Delta),
            other => Err(BridgeError::Config(format!(
                "Unknown update strategy '{}' (expected hard, soft or delta)",
                other
            ))),
        }
    }
}

impl fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStrategy::Hard => f.write_str("hard"),
            UpdateStrategy::Soft => f.write_str("soft"),
            UpdateStrategy::Delta => f.write_str("delta"),
        }
    }
}

/// How the query engine reaches several indexes at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FanOutMode {
    /// One multi-search request; any failing sub-query fails the search.
    #[default]
    Multi,
    /// Concurrent single-index searches; failing indexes are left out.
    PerIndex,
}

impl FromStr for FanOutMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "multi" | "multi-search" => Ok(FanOutMode::Multi),
            "per-index" | "per_index" => Ok(FanOutMode::PerIndex),
            other => Err(BridgeError::Config(format!("Unknown fan-out mode '{}'", other))),
        }
    }
}

const DELTA_UNITS: [&str; 5] = ["weeks", "days", "hours", "minutes", "seconds"];

/// Signed offset from "now" used by the delta strategy, e.g. `{"weeks": -1}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IndexMap<String, i64>", into = "IndexMap<String, i64>")]
pub struct DeltaWindow {
    units: IndexMap<String, i64>,
}

impl DeltaWindow {
    pub fn weeks(n: i64) -> Self {
        let mut units = IndexMap::new();
        units.insert("weeks".to_string(), n);
        Self { units }
    }

    pub fn days(n: i64) -> Self {
        let mut units = IndexMap::new();
        units.insert("days".to_string(), n);
        Self { units }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.units
            .iter()
            .fold(chrono::Duration::zero(), |acc, (unit, n)| {
                acc + match unit.as_str() {
                    "weeks" => chrono::Duration::weeks(*n),
                    "days" => chrono::Duration::days(*n),
                    "hours" => chrono::Duration::hours(*n),
                    "minutes" => chrono::Duration::minutes(*n),
                    _ => chrono::Duration::seconds(*n),
                }
            })
    }

    /// Parse `weeks=-1,days=2`.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut units = IndexMap::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (unit, amount) = part.split_once('=').ok_or_else(|| {
                BridgeError::Config(format!("Malformed delta '{}' (expected unit=amount)", part))
            })?;
            let amount: i64 = amount.trim().parse().map_err(|_| {
                BridgeError::Config(format!("Delta amount '{}' is not an integer", amount))
            })?;
            units.insert(unit.trim().to_string(), amount);
        }
        Self::try_from(units)
    }
}

impl TryFrom<IndexMap<String, i64>> for DeltaWindow {
    type Error = BridgeError;

    fn try_from(units: IndexMap<String, i64>) -> Result<Self> {
        if units.is_empty() {
            return Err(BridgeError::Config("Empty delta window".to_string()));
        }
        if let Some(bad) = units.keys().find(|u| !DELTA_UNITS.contains(&u.as_str())) {
            return Err(BridgeError::Config(format!("Unknown delta unit '{}'", bad)));
        }
        Ok(Self { units })
    }
}

impl From<DeltaWindow> for IndexMap<String, i64> {
    fn from(w: DeltaWindow) -> Self {
        w.units
    }
}

impl Default for DeltaWindow {
    fn default() -> Self {
        Self::weeks(-1)
    }
}

/// Backend configuration, from a JSON file or `MEILIBRIDGE_*` variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    pub master_key: Option<String>,
    pub update_strategy: UpdateStrategy,
    pub update_delta: Option<DeltaWindow>,
    pub query_limit: usize,
    pub ranking_rules: Vec<String>,
    pub stop_words: Vec<String>,
    pub skip_models: Vec<String>,
    pub timeout_secs: u64,
    pub fan_out: FanOutMode,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "http://127.0.0.1".to_string(),
            port: 7700,
            master_key: None,
            update_strategy: UpdateStrategy::Soft,
            update_delta: None,
            query_limit: DEFAULT_QUERY_LIMIT,
            ranking_rules: default_ranking_rules(),
            stop_words: default_stop_words(),
            skip_models: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            fan_out: FanOutMode::Multi,
        }
    }
}

fn env_list(var: &str) -> Option<Vec<String>> {
    std::env::var(var).ok().map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

fn env_parse<T: FromStr>(var: &str) -> Result<Option<T>> {
    match std::env::var(var) {
        Ok(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| BridgeError::Config(format!("{} has invalid value '{}'", var, v))),
        Err(_) => Ok(None),
    }
}

impl BridgeConfig {
    /// Load config from environment variables, defaulting anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let update_strategy = match std::env::var("MEILIBRIDGE_UPDATE_STRATEGY") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.update_strategy,
        };
        let update_delta = match std::env::var("MEILIBRIDGE_UPDATE_DELTA") {
            Ok(v) => Some(DeltaWindow::parse(&v)?),
            Err(_) => None,
        };
        let fan_out = match std::env::var("MEILIBRIDGE_FAN_OUT") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.fan_out,
        };

        Ok(Self {
            host: std::env::var("MEILIBRIDGE_HOST").unwrap_or(defaults.host),
            port: env_parse("MEILIBRIDGE_PORT")?.unwrap_or(defaults.port),
            master_key: std::env::var("MEILIBRIDGE_MASTER_KEY").ok(),
            update_strategy,
            update_delta,
            query_limit: env_parse("MEILIBRIDGE_QUERY_LIMIT")?.unwrap_or(defaults.query_limit),
            ranking_rules: env_list("MEILIBRIDGE_RANKING_RULES").unwrap_or(defaults.ranking_rules),
            stop_words: env_list("MEILIBRIDGE_STOP_WORDS").unwrap_or(defaults.stop_words),
            skip_models: env_list("MEILIBRIDGE_SKIP_MODELS").unwrap_or_default(),
            timeout_secs: env_parse("MEILIBRIDGE_TIMEOUT_SECS")?
                .unwrap_or(defaults.timeout_secs),
            fan_out,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            BridgeError::Config(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: BridgeConfig = serde_json::from_str(&content)
            .map_err(|e| BridgeError::Config(format!("Invalid config: {}", e)))?;
        Ok(config)
    }

    /// Load `path` when it exists, otherwise fall back to the environment.
    pub fn load_or_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            let config = Self::load(&path)?;
            tracing::info!(
                "Loaded config from {}: strategy={}, skip_models={}",
                path.as_ref().display(),
                config.update_strategy,
                config.skip_models.len()
            );
            return Ok(config);
        }
        Self::from_env()
    }

    pub fn engine_url(&self) -> String {
        format!("{}:{}", self.host.trim_end_matches('/'), self.port)
    }

    /// The recency window in effect; only set under the delta strategy.
    pub fn effective_delta(&self) -> Option<DeltaWindow> {
        match self.update_strategy {
            UpdateStrategy::Delta => Some(self.update_delta.clone().unwrap_or_default()),
            _ => None,
        }
    }

    pub fn is_skipped(&self, model_name: &str) -> bool {
        self.skip_models.iter().any(|m| m == model_name)
    }
}
