//! Monte Carlo permutation test — is the observed edge distinguishable from chance?
//!
//! The pipeline is scored once on the real series and once on each of
//! `n_permutations` permuted series. Trial `i` (1-based) permutes with
//! sub-seed `seed + i`, so the null distribution depends only on the inputs,
//! never on how rayon schedules the trials. Results are assembled in trial
//! order after all workers finish.
//!
//! p-value = (1 + #{null >= observed}) / (1 + n). A trial whose statistic is
//! NaN counts as "at least as good", which can only make the test more
//! conservative.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use permlab_core::error::ensure_unit_interval;
use permlab_core::measures::stats::{mean_f64, std_dev};
use permlab_core::rng::SeedSequence;
use permlab_core::{Measure, PermutationMethod, Permuter, PriceSeries, ValidationError};

use crate::pipeline::Pipeline;

// ─── Configuration ───────────────────────────────────────────────────

/// Which unit the permutation generator shuffles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    #[default]
    Bar,
    Block,
}

/// Shallow keeps the real-data parameters for every trial; deep re-optimizes
/// on each permuted series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMode {
    #[default]
    Shallow,
    Deep,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub n_permutations: usize,
    pub method: MethodKind,
    /// Required when `method = "block"`.
    pub block_size: Option<usize>,
    /// Bars `0..=start_index` are never permuted.
    pub start_index: usize,
    pub significance_level: f64,
    pub seed: u64,
    /// Measure to rank on; the optimizer objective when unset.
    pub objective: Option<Measure>,
    pub mode: TestMode,
    /// Return a verdict over the completed trials when cancelled.
    pub keep_partial_on_cancel: bool,
    /// Size of a private worker pool; the global rayon pool when unset.
    pub threads: Option<usize>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            n_permutations: 1000,
            method: MethodKind::Bar,
            block_size: None,
            start_index: 0,
            significance_level: 0.05,
            seed: 42,
            objective: None,
            mode: TestMode::Shallow,
            keep_partial_on_cancel: false,
            threads: None,
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.n_permutations < 1 {
            return Err(ValidationError::invalid("n_permutations must be >= 1"));
        }
        ensure_unit_interval("significance_level", self.significance_level)?;
        if self.threads == Some(0) {
            return Err(ValidationError::invalid("threads must be >= 1"));
        }
        self.permuter().map(|_| ())
    }

    pub fn permutation_method(&self) -> Result<PermutationMethod, ValidationError> {
        match (self.method, self.block_size) {
            (MethodKind::Bar, _) => Ok(PermutationMethod::Bar),
            (MethodKind::Block, Some(block_size)) if block_size >= 1 => {
                Ok(PermutationMethod::Block { block_size })
            }
            (MethodKind::Block, Some(_)) => {
                Err(ValidationError::invalid("block_size must be >= 1"))
            }
            (MethodKind::Block, None) => Err(ValidationError::invalid(
                "block_size is required when method = \"block\"",
            )),
        }
    }

    pub fn permuter(&self) -> Result<Permuter, ValidationError> {
        Ok(Permuter::new(self.permutation_method()?).with_start_index(self.start_index))
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Outcome of one permutation test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloVerdict {
    pub observed_statistic: f64,
    /// Trial statistics in trial order.
    pub null_distribution: Vec<f64>,
    pub p_value: f64,
    pub is_significant: bool,
    /// Trials that contributed to the null distribution.
    pub n_permutations: usize,
    pub requested_permutations: usize,
    pub null_mean: f64,
    pub null_std: f64,
    pub z_score: f64,
    pub measure: Measure,
    pub method: PermutationMethod,
    pub seed: u64,
    pub significance_level: f64,
    /// False only for a partial verdict kept after cancellation.
    pub complete: bool,
}

/// Progress snapshot passed to the callback after every finished trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct McProgress {
    pub completed: usize,
    pub total: usize,
}

pub type ProgressFn<'a> = &'a (dyn Fn(&McProgress) + Sync);

/// One-sided permutation p-value.
pub fn p_value(observed: f64, null: &[f64]) -> f64 {
    let at_least_as_good = null.iter().filter(|&&x| !(x < observed)).count();
    (1 + at_least_as_good) as f64 / (1 + null.len()) as f64
}

// ─── Test orchestration ──────────────────────────────────────────────

/// Run the permutation test of `pipeline` on `series`.
///
/// Configuration and series length are checked before any trial starts. The
/// first failing trial (in trial order) aborts the run and its error is
/// returned; no trial is ever dropped from the null distribution.
pub fn run_permutation_test(
    series: &PriceSeries,
    pipeline: &dyn Pipeline,
    config: &MonteCarloConfig,
    progress_cb: Option<ProgressFn<'_>>,
    cancel: Option<&AtomicBool>,
) -> Result<MonteCarloVerdict, ValidationError> {
    config.validate()?;
    let permuter = config.permuter()?;
    permuter.validate(series.len())?;

    let total = config.n_permutations;
    info!(
        pipeline = %pipeline.label(),
        n_permutations = total,
        method = %permuter.method.label(),
        seed = config.seed,
        "starting permutation test"
    );

    let observed = pipeline.statistic(series)?;
    debug!(observed, "observed statistic");

    let trials = || run_trials(series, pipeline, &permuter, config, progress_cb, cancel);
    let outcomes = match config.threads {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .thread_name(|i| format!("permlab-mc-{i}"))
            .build()
            .map_err(|e| ValidationError::invalid(format!("cannot build worker pool: {e}")))?
            .install(trials),
        None => trials(),
    };

    let mut null_distribution = Vec::with_capacity(total);
    for outcome in outcomes {
        if let Some(stat) = outcome? {
            null_distribution.push(stat);
        }
    }

    let completed = null_distribution.len();
    let complete = completed == total;
    if !complete {
        warn!(completed, total, "permutation test cancelled");
        if !config.keep_partial_on_cancel || completed == 0 {
            return Err(ValidationError::Cancelled { completed, total });
        }
    }

    let verdict = build_verdict(
        observed,
        null_distribution,
        config,
        &permuter,
        pipeline.measure(),
        complete,
    );
    info!(
        observed = verdict.observed_statistic,
        p_value = verdict.p_value,
        significant = verdict.is_significant,
        "permutation test finished"
    );
    Ok(verdict)
}

/// Per-trial outcomes in trial order; `Ok(None)` marks a trial skipped by
/// cancellation or by an earlier failure.
fn run_trials(
    series: &PriceSeries,
    pipeline: &dyn Pipeline,
    permuter: &Permuter,
    config: &MonteCarloConfig,
    progress_cb: Option<ProgressFn<'_>>,
    cancel: Option<&AtomicBool>,
) -> Vec<Result<Option<f64>, ValidationError>> {
    let seeds = SeedSequence::new(config.seed);
    let total = config.n_permutations;
    let failed = AtomicBool::new(false);
    let completed = AtomicUsize::new(0);

    (1..=total)
        .into_par_iter()
        .map(|trial| {
            if failed.load(Ordering::Relaxed) || cancel.is_some_and(|f| f.load(Ordering::Relaxed))
            {
                return Ok(None);
            }
            let outcome = permuter
                .permute(series, seeds.trial_seed(trial as u64))
                .and_then(|p| pipeline.statistic(&p.series));
            match outcome {
                Ok(stat) => {
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(cb) = progress_cb {
                        cb(&McProgress {
                            completed: done,
                            total,
                        });
                    }
                    Ok(Some(stat))
                }
                Err(e) => {
                    debug!(trial, error = %e, "trial failed");
                    failed.store(true, Ordering::Relaxed);
                    Err(e)
                }
            }
        })
        .collect()
}

fn build_verdict(
    observed: f64,
    null_distribution: Vec<f64>,
    config: &MonteCarloConfig,
    permuter: &Permuter,
    measure: Measure,
    complete: bool,
) -> MonteCarloVerdict {
    let p = p_value(observed, &null_distribution);
    let null_mean = mean_f64(&null_distribution);
    let null_std = std_dev(&null_distribution);
    let z_score = if null_std > 0.0 && null_std.is_finite() {
        (observed - null_mean) / null_std
    } else {
        0.0
    };
    MonteCarloVerdict {
        observed_statistic: observed,
        n_permutations: null_distribution.len(),
        null_distribution,
        p_value: p,
        is_significant: p <= config.significance_level,
        requested_permutations: config.n_permutations,
        null_mean,
        null_std,
        z_score,
        measure,
        method: permuter.method,
        seed: config.seed,
        significance_level: config.significance_level,
        complete,
    }
}
