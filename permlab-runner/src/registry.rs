//! Explicit strategy and optimizer registries.
//!
//! Built once at startup and handed to the [`StudyRunner`](crate::StudyRunner);
//! there is no process-wide registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use permlab_core::strategies;
use permlab_core::{MeasureConfig, Strategy, ValidationError};

use crate::objective::Objective;
use crate::optimizer::{GridSearch, Optimizer, OptimizerConfig, RandomSearch};

/// Name → strategy instance.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the reference strategies.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for strategy in strategies::builtin() {
            registry.register(strategy);
        }
        registry
    }

    /// Add a strategy under its own name, replacing any previous entry.
    pub fn register(&mut self, strategy: Arc<dyn Strategy>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Strategy>, ValidationError> {
        self.strategies.get(name).cloned().ok_or_else(|| {
            ValidationError::invalid(format!(
                "unknown strategy '{name}' (registered: {})",
                self.names().join(", ")
            ))
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.strategies.keys()).finish()
    }
}

/// Builds an optimizer from its study-file settings.
pub type OptimizerFactory = fn(&OptimizerConfig, &MeasureConfig) -> Box<dyn Optimizer>;

/// Name → optimizer factory.
#[derive(Debug, Clone, Default)]
pub struct OptimizerRegistry {
    factories: BTreeMap<String, OptimizerFactory>,
}

fn build_grid(config: &OptimizerConfig, measures: &MeasureConfig) -> Box<dyn Optimizer> {
    Box::new(
        GridSearch::new(Objective::new(config.objective, *measures))
            .with_min_train_length(config.min_train_length),
    )
}

fn build_random(config: &OptimizerConfig, measures: &MeasureConfig) -> Box<dyn Optimizer> {
    Box::new(
        RandomSearch::new(
            Objective::new(config.objective, *measures),
            config.n_samples,
            config.seed,
        )
        .with_min_train_length(config.min_train_length),
    )
}

impl OptimizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `grid` and `random`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("grid", build_grid);
        registry.register("random", build_random);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, factory: OptimizerFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn build(
        &self,
        config: &OptimizerConfig,
        measures: &MeasureConfig,
    ) -> Result<Box<dyn Optimizer>, ValidationError> {
        let factory = self.factories.get(&config.name).ok_or_else(|| {
            ValidationError::invalid(format!(
                "unknown optimizer '{}' (registered: {})",
                config.name,
                self.names().join(", ")
            ))
        })?;
        Ok(factory(config, measures))
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}
