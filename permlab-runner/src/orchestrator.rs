//! Study orchestrator — wires config, registries, optimizer, permutation test
//! and walk-forward validation into one reproducible run.
//!
//! Order of work:
//! 1. validate the whole configuration and every length requirement
//! 2. fit parameters on the full series (in-sample)
//! 3. permutation test of the in-sample pipeline (shallow or deep)
//! 4. walk-forward validation, optionally followed by its own permutation test

use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};
use tracing::info;

use permlab_core::{Measure, ParamSet, PerformanceReport, PriceSeries, Strategy, ValidationError};

use crate::config::StudyConfig;
use crate::monte_carlo::{
    run_permutation_test, MonteCarloConfig, MonteCarloVerdict, ProgressFn, TestMode,
};
use crate::objective::{Evaluation, Objective};
use crate::optimizer::{Optimizer, SearchSpace};
use crate::pipeline::{FixedParams, Reoptimizing};
use crate::registry::{OptimizerRegistry, StrategyRegistry};
use crate::walk_forward::{
    run_walk_forward, WalkForwardConfig, WalkForwardPipeline, WalkForwardResult,
};

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Everything one study produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub symbol: String,
    pub n_bars: usize,
    pub series_fingerprint: String,
    pub config_fingerprint: String,
    pub strategy: String,
    pub objective: Measure,
    /// Parameters fitted on the full series.
    pub params: ParamSet,
    pub in_sample_score: f64,
    pub in_sample: PerformanceReport,
    pub monte_carlo: Option<MonteCarloVerdict>,
    pub walk_forward: Option<WalkForwardResult>,
    /// Permutation test of the walk-forward pipeline.
    pub walk_forward_monte_carlo: Option<MonteCarloVerdict>,
}

/// Runs studies against a fixed set of registered strategies and optimizers.
#[derive(Debug, Default)]
pub struct StudyRunner {
    strategies: StrategyRegistry,
    optimizers: OptimizerRegistry,
}

impl StudyRunner {
    pub fn new(strategies: StrategyRegistry, optimizers: OptimizerRegistry) -> Self {
        Self {
            strategies,
            optimizers,
        }
    }

    /// Built-in strategies plus the grid and random optimizers.
    pub fn with_defaults() -> Self {
        Self::new(
            StrategyRegistry::with_builtin(),
            OptimizerRegistry::with_defaults(),
        )
    }

    pub fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    pub fn optimizers(&self) -> &OptimizerRegistry {
        &self.optimizers
    }

    pub fn run(
        &self,
        series: &PriceSeries,
        config: &StudyConfig,
        cancel: Option<&AtomicBool>,
    ) -> Result<StudyReport, ValidationError> {
        self.run_with_progress(series, config, None, cancel)
    }

    /// Like [`run`](Self::run), reporting per-trial progress of every
    /// permutation test.
    pub fn run_with_progress(
        &self,
        series: &PriceSeries,
        config: &StudyConfig,
        progress_cb: Option<ProgressFn<'_>>,
        cancel: Option<&AtomicBool>,
    ) -> Result<StudyReport, ValidationError> {
        config.validate()?;
        let strategy = self.strategies.get(&config.strategy)?;
        let optimizer = self.optimizers.build(&config.optimizer, &config.measures)?;
        let wf_mc = walk_forward_mc_config(config);
        check_lengths(series, config, wf_mc.as_ref())?;

        let config_fingerprint = config
            .fingerprint()
            .map_err(|e| ValidationError::invalid(format!("cannot fingerprint config: {e}")))?;
        let space = config.search_space();
        let objective = config.objective();

        info!(
            symbol = series.symbol(),
            n_bars = series.len(),
            strategy = strategy.name(),
            optimizer = optimizer.name(),
            objective = %objective.measure,
            "starting study"
        );

        // ─── In-sample fit ───
        let (params, fit) = fit_in_sample(
            series,
            strategy.as_ref(),
            optimizer.as_ref(),
            &space,
            &objective,
        )?;
        let in_sample = PerformanceReport::compute(&fit.returns, &fit.signals, &config.measures)?;
        info!(%params, score = fit.score, "in-sample fit");

        // ─── Permutation test ───
        let monte_carlo = match &config.monte_carlo {
            Some(mc) => {
                let mc_objective = config.monte_carlo_objective(mc);
                let verdict = match mc.mode {
                    TestMode::Shallow => {
                        let pipeline =
                            FixedParams::new(strategy.as_ref(), params.clone(), mc_objective);
                        run_permutation_test(series, &pipeline, mc, progress_cb, cancel)?
                    }
                    TestMode::Deep => {
                        let pipeline = Reoptimizing::new(
                            strategy.as_ref(),
                            optimizer.as_ref(),
                            &space,
                            mc_objective,
                        );
                        run_permutation_test(series, &pipeline, mc, progress_cb, cancel)?
                    }
                };
                Some(verdict)
            }
            None => None,
        };

        // ─── Walk-forward ───
        let (walk_forward, walk_forward_monte_carlo) = match &config.walk_forward {
            Some(wf) => {
                let result = run_walk_forward(
                    series,
                    strategy.as_ref(),
                    optimizer.as_ref(),
                    &space,
                    &objective,
                    wf,
                )?;
                info!(
                    windows = result.windows.len(),
                    skipped = result.skipped.len(),
                    mean_oos_score = result.mean_oos_score,
                    flag = ?result.degradation_flag,
                    "walk-forward finished"
                );
                let verdict = match &wf_mc {
                    Some(mc) => {
                        let pipeline = WalkForwardPipeline::new(
                            strategy.as_ref(),
                            optimizer.as_ref(),
                            &space,
                            config.monte_carlo_objective(mc),
                            wf.clone(),
                        );
                        Some(run_permutation_test(series, &pipeline, mc, progress_cb, cancel)?)
                    }
                    None => None,
                };
                (Some(result), verdict)
            }
            None => (None, None),
        };

        Ok(StudyReport {
            schema_version: SCHEMA_VERSION,
            symbol: series.symbol().to_string(),
            n_bars: series.len(),
            series_fingerprint: series.fingerprint(),
            config_fingerprint,
            strategy: strategy.name().to_string(),
            objective: objective.measure,
            params,
            in_sample_score: fit.score,
            in_sample,
            monte_carlo,
            walk_forward,
            walk_forward_monte_carlo,
        })
    }
}

/// Permutation settings for the walk-forward test, if one was requested.
///
/// Bars up to the end of the first train window are never permuted, so
/// every trial fits its first window on the same real history.
fn walk_forward_mc_config(config: &StudyConfig) -> Option<MonteCarloConfig> {
    let wf: &WalkForwardConfig = config.walk_forward.as_ref().filter(|wf| wf.permutation_test)?;
    let mut mc = config.monte_carlo.clone().unwrap_or_default();
    mc.start_index = mc.start_index.max(wf.window.train_length.saturating_sub(1));
    Some(mc)
}

/// Fail before any work starts if the series is too short for a stage.
fn check_lengths(
    series: &PriceSeries,
    config: &StudyConfig,
    wf_mc: Option<&MonteCarloConfig>,
) -> Result<(), ValidationError> {
    let n = series.len();
    if n < 2 {
        return Err(ValidationError::InsufficientData {
            available: n,
            required: 2,
        });
    }
    if let Some(mc) = &config.monte_carlo {
        mc.permuter()?.validate(n)?;
    }
    if let Some(wf) = &config.walk_forward {
        wf.window.generate_windows(n)?;
    }
    if let Some(mc) = wf_mc {
        mc.permuter()?.validate(n)?;
    }
    Ok(())
}

/// Optimize on the full series, or evaluate the fixed parameters when there
/// is nothing to search.
fn fit_in_sample(
    series: &PriceSeries,
    strategy: &dyn Strategy,
    optimizer: &dyn Optimizer,
    space: &SearchSpace,
    objective: &Objective,
) -> Result<(ParamSet, Evaluation), ValidationError> {
    let params = if space.is_empty() {
        let params = strategy.default_params().merged(space.fixed());
        strategy
            .validate_params(&params)
            .map_err(|e| ValidationError::strategy(strategy.name(), e))?;
        params
    } else {
        optimizer.optimize(series.bars(), strategy, space)?.params
    };
    let fit = objective.evaluate(strategy, series.bars(), &params)?;
    Ok((params, fit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monte_carlo::MethodKind;
    use crate::optimizer::ParamRange;
    use crate::synthetic::random_walk;
    use crate::walk_forward::WindowSpec;

    fn donchian_study() -> StudyConfig {
        let mut config = StudyConfig::new("donchian_breakout");
        config
            .search_space
            .insert("lookback".into(), ParamRange::Values(vec![10.0, 20.0]));
        config
    }

    #[test]
    fn in_sample_only_study() {
        let series = random_walk(300, 1).unwrap();
        let report = StudyRunner::with_defaults()
            .run(&series, &donchian_study(), None)
            .unwrap();
        assert_eq!(report.n_bars, 300);
        assert_eq!(report.strategy, "donchian_breakout");
        assert!(report.params.get("lookback").is_some());
        assert_eq!(report.in_sample.get(Measure::Sharpe), Some(report.in_sample_score));
        assert!(report.monte_carlo.is_none());
        assert!(report.walk_forward.is_none());
    }

    #[test]
    fn unknown_strategy_is_rejected_up_front() {
        let series = random_walk(50, 1).unwrap();
        let err = StudyRunner::with_defaults()
            .run(&series, &StudyConfig::new("nope"), None)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidConfiguration(_)));
    }

    #[test]
    fn short_series_fails_before_any_trial() {
        let series = random_walk(30, 1).unwrap();
        let mut config = donchian_study();
        config.monte_carlo = Some(MonteCarloConfig {
            method: MethodKind::Block,
            block_size: Some(50),
            ..Default::default()
        });
        let err = StudyRunner::with_defaults().run(&series, &config, None).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InsufficientData {
                available: 30,
                required: 51
            }
        ));
    }

    #[test]
    fn walk_forward_test_keeps_first_train_window_real() {
        let mut config = donchian_study();
        config.monte_carlo = Some(MonteCarloConfig {
            start_index: 5,
            ..Default::default()
        });
        let mut wf = WalkForwardConfig::new(WindowSpec {
            train_length: 100,
            test_length: 20,
            step: 20,
            anchored: false,
        });
        wf.permutation_test = true;
        config.walk_forward = Some(wf);

        let mc = walk_forward_mc_config(&config).unwrap();
        assert_eq!(mc.start_index, 99);

        config.walk_forward.as_mut().unwrap().permutation_test = false;
        assert!(walk_forward_mc_config(&config).is_none());
    }

    #[test]
    fn fixed_params_fit_uses_defaults_and_overrides() {
        let series = random_walk(200, 3).unwrap();
        let mut config = StudyConfig::new("ma_crossover");
        config.params = ParamSet::new().with("fast", 5.0);
        let report = StudyRunner::with_defaults().run(&series, &config, None).unwrap();
        assert_eq!(report.params.get("fast"), Some(5.0));
        assert_eq!(report.params.get("slow"), Some(50.0));
    }
}
