//! Versioned, immutable bundle of strategy tunables.
//!
//! The optimizer hands out drafts (version 0). Promotion never edits a draft;
//! it builds a new set carrying the next version via [`ParameterSet::promote`].

use crate::domain::market::MarketKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Single tunable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParameterValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Int(v) => Some(*v as f64),
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Text(_) => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::Text(v.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    key: MarketKey,
    strategy: String,
    version: u64,
    created_at: DateTime<Utc>,
    values: BTreeMap<String, ParameterValue>,
}

impl ParameterSet {
    /// Creates an unversioned draft, as produced by an optimizer.
    pub fn draft(
        key: MarketKey,
        strategy: impl Into<String>,
        values: BTreeMap<String, ParameterValue>,
    ) -> Self {
        Self {
            key,
            strategy: strategy.into(),
            version: 0,
            created_at: Utc::now(),
            values,
        }
    }

    /// Returns a new set with the same tunables stamped with `version`.
    pub fn promote(&self, version: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            key: self.key.clone(),
            strategy: self.strategy.clone(),
            version,
            created_at,
            values: self.values.clone(),
        }
    }

    pub fn key(&self) -> &MarketKey {
        &self.key
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn values(&self) -> &BTreeMap<String, ParameterValue> {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// Same strategy and tunables, ignoring version and timestamps.
    pub fn same_tunables(&self, other: &ParameterSet) -> bool {
        self.strategy == other.strategy && self.values == other.values
    }

    /// Canonical `name=value` rendering used for logs and deterministic ordering.
    pub fn describe(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}
