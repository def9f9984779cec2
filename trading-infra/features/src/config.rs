use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use trading_core::Symbol;

use crate::key::Field;
use crate::table::{IntervalsTable, SharedTable, SlidingTable, share};

#[derive(Error, Debug)]
pub enum FeatureConfigError {
    #[error("Failed to read feature config: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse feature config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid feature config: {0}")]
    Invalid(String),
}

/// Which accumulator family backs the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowFamily {
    /// Ring-bucket tiers (approximate, bounded memory)
    #[default]
    Intervals,
    /// Exact count+age bounded windows
    Sliding,
}

/// One time resolution
///
/// For the intervals family this is a ring of `ring_size` slots of
/// `duration_ms` each. For the sliding family it is a window of at most
/// `max_count` observations no older than `duration_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierSpec {
    pub name: String,
    pub duration_ms: u64,
    #[serde(default = "default_ring_size")]
    pub ring_size: usize,
    #[serde(default = "default_max_count")]
    pub max_count: usize,
}

impl TierSpec {
    pub fn new(name: impl Into<String>, duration: Duration, ring_size: usize) -> Self {
        Self {
            name: name.into(),
            duration_ms: duration.as_millis() as u64,
            ring_size,
            max_count: default_max_count(),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Root feature configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub symbols: Vec<String>,
    #[serde(default = "default_fields")]
    pub fields: Vec<Field>,
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierSpec>,
    #[serde(default)]
    pub family: WindowFamily,
    /// Export period in milliseconds
    #[serde(default = "default_cadence")]
    pub cadence_ms: u64,
}

impl FeatureConfig {
    pub fn cadence(&self) -> Duration {
        Duration::from_millis(self.cadence_ms)
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.symbols.iter().map(Symbol::new).collect()
    }

    pub fn validate(&self) -> Result<(), FeatureConfigError> {
        let invalid = |msg: String| Err(FeatureConfigError::Invalid(msg));
        if self.symbols.is_empty() {
            return invalid("no symbols".into());
        }
        if self.fields.is_empty() {
            return invalid("no fields".into());
        }
        if self.tiers.is_empty() {
            return invalid("no tiers".into());
        }
        if self.cadence_ms == 0 {
            return invalid("cadence_ms must be positive".into());
        }
        let mut names = HashSet::new();
        for tier in &self.tiers {
            if !names.insert(tier.name.as_str()) {
                return invalid(format!("duplicate tier {}", tier.name));
            }
            if tier.duration_ms == 0 {
                return invalid(format!("tier {} has zero duration", tier.name));
            }
            if tier.ring_size == 0 || tier.max_count == 0 {
                return invalid(format!("tier {} has zero capacity", tier.name));
            }
        }
        Ok(())
    }

    /// Statistics table for this configuration, ready to share between the
    /// dispatcher and the assembler
    pub fn build_table(&self) -> SharedTable {
        let symbols = self.symbols();
        match self.family {
            WindowFamily::Intervals => share(IntervalsTable::new(&symbols, &self.fields, &self.tiers)),
            WindowFamily::Sliding => share(SlidingTable::new(&symbols, &self.fields, &self.tiers)),
        }
    }
}

/// Load feature configuration from a JSON file
pub fn load_feature_config<P: AsRef<Path>>(path: P) -> Result<FeatureConfig, FeatureConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_feature_config_from_str(&content)
}

pub fn load_feature_config_from_str(json: &str) -> Result<FeatureConfig, FeatureConfigError> {
    Ok(serde_json::from_str(json)?)
}

/// Load the default embedded configuration
pub fn load_default_feature_config() -> Result<FeatureConfig, FeatureConfigError> {
    load_feature_config_from_str(include_str!("feature_config.json"))
}

// Default value functions for serde
fn default_fields() -> Vec<Field> {
    Field::ALL.to_vec()
}

fn default_tiers() -> Vec<TierSpec> {
    vec![
        TierSpec::new("1_sec", Duration::from_secs(1), 15),
        TierSpec::new("15_sec", Duration::from_secs(15), 4),
        TierSpec::new("1_min", Duration::from_secs(60), 15),
        TierSpec::new("15_min", Duration::from_secs(15 * 60), 4),
        TierSpec::new("1_hour", Duration::from_secs(60 * 60), 1),
    ]
}

fn default_ring_size() -> usize {
    1
}

fn default_max_count() -> usize {
    10_000
}

fn default_cadence() -> u64 {
    1000
}
