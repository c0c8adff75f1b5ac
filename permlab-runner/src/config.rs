//! Study configuration — everything needed to reproduce one study.
//!
//! Loaded from TOML (or JSON) and validated as a whole before any trial runs,
//! so an expensive Monte Carlo run never fails midway on a misconfiguration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use permlab_core::{MeasureConfig, ParamSet, ValidationError};

use crate::monte_carlo::MonteCarloConfig;
use crate::objective::Objective;
use crate::optimizer::{OptimizerConfig, ParamRange, SearchSpace};
use crate::walk_forward::WalkForwardConfig;

/// Failures while reading a study file. Semantic problems are reported by
/// [`StudyConfig::validate`] as `ValidationError::InvalidConfiguration`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serializable configuration for a single study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    /// Registered strategy name.
    pub strategy: String,
    /// Fixed parameters layered over the strategy defaults.
    #[serde(default)]
    pub params: ParamSet,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Parameters the optimizer may vary; empty means "use `params` as is".
    #[serde(default)]
    pub search_space: BTreeMap<String, ParamRange>,
    #[serde(default)]
    pub measures: MeasureConfig,
    /// Permutation test settings; omitted means no test.
    #[serde(default)]
    pub monte_carlo: Option<MonteCarloConfig>,
    /// Walk-forward settings; omitted means no walk-forward run.
    #[serde(default)]
    pub walk_forward: Option<WalkForwardConfig>,
}

impl StudyConfig {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            params: ParamSet::new(),
            optimizer: OptimizerConfig::default(),
            search_space: BTreeMap::new(),
            measures: MeasureConfig::default(),
            monte_carlo: None,
            walk_forward: None,
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load a `.json` file as JSON and anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }

    /// Check every option without touching any data.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.strategy.trim().is_empty() {
            return Err(ValidationError::invalid("strategy must be set"));
        }
        self.measures.validate()?;
        self.optimizer.validate()?;
        self.search_space().validate()?;
        if let Some(mc) = &self.monte_carlo {
            mc.validate()?;
        }
        if let Some(wf) = &self.walk_forward {
            wf.window.validate()?;
        }
        Ok(())
    }

    /// BLAKE3 hex digest of the canonical JSON encoding.
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_vec(self)?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }

    pub fn search_space(&self) -> SearchSpace {
        SearchSpace::new(self.search_space.clone()).with_fixed(self.params.clone())
    }

    /// Objective used for fitting and walk-forward scoring.
    pub fn objective(&self) -> Objective {
        Objective::new(self.optimizer.objective, self.measures)
    }

    /// Objective the permutation test ranks on.
    pub fn monte_carlo_objective(&self, mc: &MonteCarloConfig) -> Objective {
        Objective::new(mc.objective.unwrap_or(self.optimizer.objective), self.measures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monte_carlo::{MethodKind, TestMode};
    use crate::walk_forward::{Reoptimize, SignalContext};
    use permlab_core::Measure;

    const STUDY: &str = r#"
strategy = "donchian_breakout"

[optimizer]
name = "grid"
objective = "profit_factor"

[search_space]
lookback = { start = 10, end = 40, step = 10 }

[measures]
periods_per_year = 8760

[monte_carlo]
n_permutations = 200
method = "block"
block_size = 24
mode = "deep"

[walk_forward]
window = { train_length = 500, test_length = 100, step = 100 }
reoptimize = "once"
signal_context = "with_history"
"#;

    #[test]
    fn parses_full_study() {
        let cfg = StudyConfig::from_toml_str(STUDY).unwrap();
        assert_eq!(cfg.optimizer.objective, Measure::ProfitFactor);
        assert_eq!(cfg.measures.periods_per_year, 8760);
        assert_eq!(cfg.measures.confidence_level, 0.05);
        let mc = cfg.monte_carlo.as_ref().unwrap();
        assert_eq!(mc.method, MethodKind::Block);
        assert_eq!(mc.block_size, Some(24));
        assert_eq!(mc.mode, TestMode::Deep);
        assert_eq!(mc.significance_level, 0.05);
        let wf = cfg.walk_forward.as_ref().unwrap();
        assert_eq!(wf.reoptimize, Reoptimize::Once);
        assert_eq!(wf.signal_context, SignalContext::WithHistory);
        assert!(!wf.window.anchored);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn minimal_study_uses_defaults() {
        let cfg = StudyConfig::from_toml_str("strategy = \"buy_and_hold\"").unwrap();
        assert_eq!(cfg, StudyConfig::new("buy_and_hold"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut cfg = StudyConfig::new("buy_and_hold");
        cfg.monte_carlo = Some(MonteCarloConfig {
            n_permutations: 0,
            ..Default::default()
        });
        assert!(matches!(
            cfg.validate(),
            Err(ValidationError::InvalidConfiguration(_))
        ));

        let mut cfg = StudyConfig::new("buy_and_hold");
        cfg.measures.confidence_level = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = StudyConfig::from_toml_str(STUDY).unwrap();
        let b = StudyConfig::from_toml_str(STUDY).unwrap();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        let mut c = a.clone();
        c.monte_carlo.as_mut().unwrap().seed = 7;
        assert_ne!(a.fingerprint().unwrap(), c.fingerprint().unwrap());
    }

    #[test]
    fn loads_toml_and_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("study.toml");
        std::fs::write(&toml_path, STUDY).unwrap();
        let from_toml = StudyConfig::load(&toml_path).unwrap();

        let json_path = dir.path().join("study.json");
        std::fs::write(&json_path, serde_json::to_string(&from_toml).unwrap()).unwrap();
        assert_eq!(StudyConfig::load(&json_path).unwrap(), from_toml);

        let missing = StudyConfig::load(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
