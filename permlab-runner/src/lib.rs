//! PermLab Runner — permutation tests, walk-forward validation and studies.
//!
//! This crate builds on `permlab-core` to provide:
//! - Objectives and optimizers (grid and random search)
//! - The Monte Carlo permutation test over any [`Pipeline`]
//! - Walk-forward validation with stitched out-of-sample returns
//! - Strategy and optimizer registries
//! - Study configuration files and the [`StudyRunner`] orchestrator
//! - Synthetic random-walk series for tests and demos

pub mod config;
pub mod monte_carlo;
pub mod objective;
pub mod optimizer;
pub mod orchestrator;
pub mod pipeline;
pub mod registry;
pub mod synthetic;
pub mod walk_forward;

pub use config::{ConfigError, StudyConfig};
pub use monte_carlo::{
    p_value, run_permutation_test, McProgress, MethodKind, MonteCarloConfig, MonteCarloVerdict,
    ProgressFn, TestMode,
};
pub use objective::{Evaluation, Objective};
pub use optimizer::{
    GridSearch, Optimized, Optimizer, OptimizerConfig, ParamRange, RandomSearch, SearchSpace,
};
pub use orchestrator::{StudyReport, StudyRunner};
pub use pipeline::{FixedParams, Pipeline, Reoptimizing};
pub use registry::{OptimizerFactory, OptimizerRegistry, StrategyRegistry};
pub use walk_forward::{
    compute_degradation_ratio, run_walk_forward, DegradationFlag, Reoptimize, SignalContext,
    WalkForwardConfig, WalkForwardPipeline, WalkForwardResult, WalkForwardWindow, WindowOutcome,
    WindowSpec,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<StudyConfig>();
        assert_sync::<StudyConfig>();
        assert_send::<MonteCarloConfig>();
        assert_sync::<MonteCarloConfig>();
        assert_send::<WalkForwardConfig>();
        assert_sync::<WalkForwardConfig>();
        assert_send::<OptimizerConfig>();
        assert_sync::<OptimizerConfig>();
    }

    #[test]
    fn result_types_are_send_sync() {
        assert_send::<MonteCarloVerdict>();
        assert_sync::<MonteCarloVerdict>();
        assert_send::<WalkForwardResult>();
        assert_sync::<WalkForwardResult>();
        assert_send::<StudyReport>();
        assert_sync::<StudyReport>();
    }

    #[test]
    fn runner_is_shareable() {
        assert_send::<StudyRunner>();
        assert_sync::<StudyRunner>();
        assert_send::<GridSearch>();
        assert_sync::<GridSearch>();
        assert_send::<RandomSearch>();
        assert_sync::<RandomSearch>();
    }
}
