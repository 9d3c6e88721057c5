//! Store configuration.
//!
//! Values come from the environment when the process-wide store is installed
//! with `init_global_from_env`:
//! - `VALPROF_NODES`: arena capacity in records, 1..=4194304 (default 8192).
//! - `VALPROF_MAX_VALUES_PER_SITE`: distinct values tracked per site, 1..=255
//!   (default 16).
//! - `VALPROF_MODE`: `on` (default) records observations, `off` drops them
//!   all. Used as a benchmarking baseline.

use crate::error::ConfigError;

/// Default arena capacity.
pub const DEFAULT_NODE_CAPACITY: usize = 8192;

/// Default per-site cap on distinct values.
pub const DEFAULT_MAX_VALUES_PER_SITE: usize = 16;

/// Hard ceiling for the per-site cap.
pub const MAX_VALUES_PER_SITE_LIMIT: usize = 255;

/// Largest arena the environment may request (about 96 MiB of records).
pub const NODE_CAPACITY_LIMIT: usize = 1 << 22;

pub const ENV_NODES: &str = "VALPROF_NODES";
pub const ENV_MAX_VALUES_PER_SITE: &str = "VALPROF_MAX_VALUES_PER_SITE";
pub const ENV_MODE: &str = "VALPROF_MODE";

/// Whether observations are recorded at all.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreMode {
    #[default]
    On,
    /// Every observation is a no-op.
    Off,
}

impl StoreMode {
    /// Parse from string (case-insensitive). Unknown input means `On`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "disabled" | "none" => Self::Off,
            _ => Self::On,
        }
    }

    #[must_use]
    pub const fn records(self) -> bool {
        matches!(self, Self::On)
    }
}

/// Sizing and mode of a `Store`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub node_capacity: usize,
    pub max_values_per_site: usize,
    pub mode: StoreMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            node_capacity: DEFAULT_NODE_CAPACITY,
            max_values_per_site: DEFAULT_MAX_VALUES_PER_SITE,
            mode: StoreMode::On,
        }
    }
}

impl StoreConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; missing keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_NODES) {
            config.node_capacity =
                parse_bounded(ENV_NODES, &raw, 1, NODE_CAPACITY_LIMIT as u64)?;
        }
        if let Some(raw) = lookup(ENV_MAX_VALUES_PER_SITE) {
            config.max_values_per_site = parse_bounded(
                ENV_MAX_VALUES_PER_SITE,
                &raw,
                1,
                MAX_VALUES_PER_SITE_LIMIT as u64,
            )?;
        }
        if let Some(raw) = lookup(ENV_MODE) {
            config.mode = StoreMode::from_str_loose(&raw);
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_node_capacity(mut self, node_capacity: usize) -> Self {
        self.node_capacity = node_capacity;
        self
    }

    /// Clamped to `1..=MAX_VALUES_PER_SITE_LIMIT`.
    #[must_use]
    pub fn with_max_values_per_site(mut self, max: usize) -> Self {
        self.max_values_per_site = max.clamp(1, MAX_VALUES_PER_SITE_LIMIT);
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: StoreMode) -> Self {
        self.mode = mode;
        self
    }
}

fn parse_bounded(key: &'static str, raw: &str, min: u64, max: u64) -> Result<usize, ConfigError> {
    let value: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            key,
            raw: raw.to_string(),
        })?;
    if !(min..=max).contains(&value) {
        return Err(ConfigError::OutOfRange {
            key,
            value,
            min,
            max,
        });
    }
    usize::try_from(value).map_err(|_| ConfigError::OutOfRange {
        key,
        value,
        min,
        max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_modes() {
        assert_eq!(StoreMode::from_str_loose("on"), StoreMode::On);
        assert_eq!(StoreMode::from_str_loose("OFF"), StoreMode::Off);
        assert_eq!(StoreMode::from_str_loose("disabled"), StoreMode::Off);
        assert_eq!(StoreMode::from_str_loose(" none "), StoreMode::Off);
        assert_eq!(StoreMode::from_str_loose("bogus"), StoreMode::On);
        assert!(StoreMode::On.records());
        assert!(!StoreMode::Off.records());
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = StoreConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.node_capacity, DEFAULT_NODE_CAPACITY);
        assert_eq!(config.max_values_per_site, DEFAULT_MAX_VALUES_PER_SITE);
    }

    #[test]
    fn overrides_are_applied() {
        let config = StoreConfig::from_lookup(lookup_from(&[
            (ENV_NODES, "128"),
            (ENV_MAX_VALUES_PER_SITE, " 4 "),
            (ENV_MODE, "off"),
        ]))
        .unwrap();
        assert_eq!(config.node_capacity, 128);
        assert_eq!(config.max_values_per_site, 4);
        assert_eq!(config.mode, StoreMode::Off);
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = StoreConfig::from_lookup(lookup_from(&[(ENV_NODES, "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { key: ENV_NODES, .. }));

        let err =
            StoreConfig::from_lookup(lookup_from(&[(ENV_MAX_VALUES_PER_SITE, "256")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::OutOfRange {
                key: ENV_MAX_VALUES_PER_SITE,
                value: 256,
                min: 1,
                max: 255,
            }
        );

        let err = StoreConfig::from_lookup(lookup_from(&[(ENV_NODES, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { value: 0, .. }));
    }

    #[test]
    fn node_capacity_has_a_realistic_ceiling() {
        let at_limit = NODE_CAPACITY_LIMIT.to_string();
        let config = StoreConfig::from_lookup(lookup_from(&[(ENV_NODES, at_limit.as_str())])).unwrap();
        assert_eq!(config.node_capacity, NODE_CAPACITY_LIMIT);

        let huge = (u32::MAX - 1).to_string();
        let err = StoreConfig::from_lookup(lookup_from(&[(ENV_NODES, huge.as_str())])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::OutOfRange {
                key: ENV_NODES,
                value: u64::from(u32::MAX - 1),
                min: 1,
                max: NODE_CAPACITY_LIMIT as u64,
            }
        );
    }

    #[test]
    fn builder_clamps_site_cap() {
        let config = StoreConfig::default().with_max_values_per_site(0);
        assert_eq!(config.max_values_per_site, 1);
        let config = StoreConfig::default().with_max_values_per_site(1000);
        assert_eq!(config.max_values_per_site, MAX_VALUES_PER_SITE_LIMIT);
    }
}
