use std::path::PathBuf;

use crate::error::ConfigError;

pub const DEFAULT_ROUTING_URL: &str = "http://localhost:8080";
pub const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Base URL of the routing service (`ROUTING_URL`).
    pub routing_url: String,
    /// Directory holding the JSON store (`WALK_TRACKER_DATA`).
    pub data_dir: PathBuf,
    /// Population avoidance weight (`ROUTING_W_POP`).
    pub w_pop: f64,
    /// Unpaved surface preference weight (`ROUTING_W_PAVED`).
    pub w_paved: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            routing_url: DEFAULT_ROUTING_URL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            w_pop: shared::default_weight(),
            w_paved: shared::default_weight(),
        }
    }
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            routing_url: lookup("ROUTING_URL").unwrap_or(defaults.routing_url),
            data_dir: lookup("WALK_TRACKER_DATA")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            w_pop: parse_weight(&lookup, "ROUTING_W_POP")?.unwrap_or(defaults.w_pop),
            w_paved: parse_weight(&lookup, "ROUTING_W_PAVED")?.unwrap_or(defaults.w_paved),
        })
    }
}

fn parse_weight(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<f64>, ConfigError> {
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    match value.trim().parse::<f64>() {
        Ok(weight) if weight.is_finite() && weight >= 0.0 => Ok(Some(weight)),
        _ => Err(ConfigError::InvalidValue { key, value }),
    }
}
