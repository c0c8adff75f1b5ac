//! Strategy parameter sets.
//!
//! Uses `BTreeMap` for deterministic key ordering during serialization, so
//! reports and fingerprints are stable.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::strategy::StrategyError;

/// Named numeric parameters for a strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, f64>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Fetch a parameter or fail with [`StrategyError::MissingParam`].
    pub fn require(&self, name: &str) -> Result<f64, StrategyError> {
        self.get(name)
            .ok_or_else(|| StrategyError::MissingParam(name.to_string()))
    }

    /// Fetch a parameter that must be a whole number >= `min`.
    pub fn require_usize(&self, name: &str, min: usize) -> Result<usize, StrategyError> {
        let value = self.require(name)?;
        if !value.is_finite() || value.fract() != 0.0 || value < min as f64 {
            return Err(StrategyError::InvalidParam {
                name: name.to_string(),
                reason: format!("expected an integer >= {min}, got {value}"),
            });
        }
        Ok(value as usize)
    }

    /// Overlay `other` on top of `self`; keys in `other` win.
    pub fn merged(&self, other: &ParamSet) -> ParamSet {
        let mut out = self.clone();
        for (k, v) in &other.0 {
            out.0.insert(k.clone(), *v);
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

impl FromIterator<(String, f64)> for ParamSet {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
