//! Walk-forward validation — rolling train/test windows and stitched OOS results.
//!
//! The timeline is split into windows whose test ranges never overlap and
//! appear in chronological order. For each window the optimizer fits
//! parameters on the train slice only; the strategy then generates signals for
//! the test slice, and only test-slice positions are appended to the stitched
//! output. A window's parameters therefore never depend on a bar at or after
//! any bar they trade.
//!
//! Windows are independent given their parameters and run in parallel; the
//! stitched result is assembled in window order afterwards.
//!
//! Degradation ratio (mean OOS score / mean IS score) flags overfitting.

use std::ops::Range;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use permlab_core::measures::stats::mean_f64;
use permlab_core::measures::strategy_returns;
use permlab_core::{
    generate_checked, Bar, Measure, ParamSet, PerformanceReport, PriceSeries, SignalSeries,
    Strategy, ValidationError,
};

use crate::objective::Objective;
use crate::optimizer::{Optimizer, SearchSpace};
use crate::pipeline::Pipeline;

/// Mean in-sample gain score below which the ratio is replaced by a difference.
const LOW_IS_SCORE: f64 = 0.1;

// ─── Configuration ───────────────────────────────────────────────────

/// Window geometry in bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub train_length: usize,
    pub test_length: usize,
    /// Distance between consecutive test starts; must be >= `test_length`.
    pub step: usize,
    /// Expanding train window starting at bar 0 instead of a rolling one.
    #[serde(default)]
    pub anchored: bool,
}

/// When the optimizer runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reoptimize {
    #[default]
    EveryWindow,
    /// Fit on the first usable train slice and reuse those parameters.
    Once,
}

/// Which bars the strategy sees when generating test signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalContext {
    /// The test slice only.
    #[default]
    TestOnly,
    /// Train slice as warm-up history followed by the test slice.
    WithHistory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    pub window: WindowSpec,
    #[serde(default)]
    pub reoptimize: Reoptimize,
    #[serde(default)]
    pub signal_context: SignalContext,
    /// Also run the permutation test over the whole walk-forward pipeline.
    #[serde(default)]
    pub permutation_test: bool,
}

impl WalkForwardConfig {
    pub fn new(window: WindowSpec) -> Self {
        Self {
            window,
            reoptimize: Reoptimize::default(),
            signal_context: SignalContext::default(),
            permutation_test: false,
        }
    }
}

// ─── Windows ─────────────────────────────────────────────────────────

/// One train/test split. All bounds are inclusive bar indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkForwardWindow {
    pub index: usize,
    pub train_start: usize,
    pub train_end: usize,
    pub test_start: usize,
    pub test_end: usize,
}

impl WalkForwardWindow {
    pub fn train_range(&self) -> Range<usize> {
        self.train_start..self.train_end + 1
    }

    pub fn test_range(&self) -> Range<usize> {
        self.test_start..self.test_end + 1
    }

    pub fn train_len(&self) -> usize {
        self.train_end + 1 - self.train_start
    }

    pub fn test_len(&self) -> usize {
        self.test_end + 1 - self.test_start
    }
}

impl WindowSpec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.train_length < 1 {
            return Err(ValidationError::invalid("train_length must be >= 1"));
        }
        if self.test_length < 1 {
            return Err(ValidationError::invalid("test_length must be >= 1"));
        }
        if self.step < self.test_length {
            return Err(ValidationError::invalid(format!(
                "step ({}) must be >= test_length ({}) so test windows do not overlap",
                self.step, self.test_length
            )));
        }
        Ok(())
    }

    /// Windows covering `n_bars`, in chronological order.
    ///
    /// The first test window starts right after `train_length` bars. A final
    /// test window shorter than `test_length` is kept, truncated at the last bar.
    pub fn generate_windows(
        &self,
        n_bars: usize,
    ) -> Result<Vec<WalkForwardWindow>, ValidationError> {
        self.validate()?;
        if n_bars <= self.train_length {
            return Err(ValidationError::InsufficientData {
                available: n_bars,
                required: self.train_length + 1,
            });
        }

        let mut windows = Vec::new();
        let mut test_start = self.train_length;
        while test_start < n_bars {
            windows.push(WalkForwardWindow {
                index: windows.len(),
                train_start: if self.anchored {
                    0
                } else {
                    test_start - self.train_length
                },
                train_end: test_start - 1,
                test_start,
                test_end: test_start.saturating_add(self.test_length).min(n_bars) - 1,
            });
            match test_start.checked_add(self.step) {
                Some(next) => test_start = next,
                None => break,
            }
        }
        Ok(windows)
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Per-window outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowOutcome {
    pub window: WalkForwardWindow,
    pub params: ParamSet,
    pub in_sample_score: f64,
    /// None when the test slice is too short to produce a return.
    pub out_of_sample_score: Option<f64>,
    /// Timestamp of the last bar the parameters were fitted on.
    pub fitted_through: NaiveDateTime,
}

/// How the degradation figure was computed (or why it wasn't).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegradationFlag {
    /// Ratio OOS / IS of a gain measure with IS >= 0.1.
    Normal,
    /// Gain measure with 0 <= IS < 0.1: difference OOS - IS.
    LowIsScore,
    /// Gain measure with IS < 0: no figure.
    NegativeIsScore,
    /// Gain measure with IS >= 0.1 but OOS < 0: clamped to 0.0.
    FailedOos,
    /// Loss measure (drawdown, VaR, CVaR): difference OOS - IS, negative
    /// when out-of-sample losses are deeper.
    LossDifference,
    /// No window produced an out-of-sample score.
    InsufficientData,
}

/// Complete result of one walk-forward run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub windows: Vec<WindowOutcome>,
    /// Windows whose train slice was shorter than the optimizer minimum.
    pub skipped: Vec<WalkForwardWindow>,
    /// Stitched out-of-sample positions, one per traded test bar.
    pub signals: SignalSeries,
    /// Bar index (into the input series) of each stitched position.
    pub bar_indices: Vec<usize>,
    /// Stitched returns; zero across gaps between test windows.
    pub returns: Vec<f64>,
    pub report: PerformanceReport,
    pub mean_is_score: f64,
    pub mean_oos_score: f64,
    pub degradation_ratio: Option<f64>,
    pub degradation_flag: DegradationFlag,
}

// ─── Walk-forward orchestration ──────────────────────────────────────

/// Run walk-forward validation of `strategy` on `series`.
///
/// Windows whose train slice is shorter than `optimizer.min_train_length()`
/// are skipped and logged. If no window is usable the run fails with
/// `InsufficientData`.
pub fn run_walk_forward(
    series: &PriceSeries,
    strategy: &dyn Strategy,
    optimizer: &dyn Optimizer,
    space: &SearchSpace,
    objective: &Objective,
    config: &WalkForwardConfig,
) -> Result<WalkForwardResult, ValidationError> {
    walk_forward(series, strategy, optimizer, space, objective, config, true)
}

fn walk_forward(
    series: &PriceSeries,
    strategy: &dyn Strategy,
    optimizer: &dyn Optimizer,
    space: &SearchSpace,
    objective: &Objective,
    config: &WalkForwardConfig,
    log_skips: bool,
) -> Result<WalkForwardResult, ValidationError> {
    let bars = series.bars();
    let windows = config.window.generate_windows(bars.len())?;
    let min_train = optimizer.min_train_length();

    let (usable, skipped): (Vec<WalkForwardWindow>, Vec<WalkForwardWindow>) = windows
        .into_iter()
        .partition(|w| w.train_len() >= min_train);
    if log_skips {
        for w in &skipped {
            warn!(
                window = w.index,
                train_len = w.train_len(),
                min_train,
                "skipping walk-forward window: train slice too short"
            );
        }
    }
    let Some(first) = usable.first().copied() else {
        return Err(ValidationError::InsufficientData {
            available: skipped.iter().map(|w| w.train_len()).max().unwrap_or(0),
            required: min_train,
        });
    };

    let outcomes = match config.reoptimize {
        Reoptimize::EveryWindow => usable
            .par_iter()
            .map(|w| {
                let fitted = optimizer.optimize(&bars[w.train_range()], strategy, space)?;
                debug!(
                    window = w.index,
                    params = %fitted.params,
                    score = fitted.score,
                    "fitted"
                );
                evaluate_window(
                    bars,
                    strategy,
                    objective,
                    config,
                    w,
                    fitted.params,
                    fitted.score,
                    w.train_end,
                )
            })
            .collect::<Result<Vec<_>, _>>()?,
        Reoptimize::Once => {
            let fitted = optimizer.optimize(&bars[first.train_range()], strategy, space)?;
            debug!(window = first.index, params = %fitted.params, "fitted once");
            usable
                .par_iter()
                .map(|w| {
                    let in_sample = objective
                        .evaluate(strategy, &bars[w.train_range()], &fitted.params)?
                        .score;
                    evaluate_window(
                        bars,
                        strategy,
                        objective,
                        config,
                        w,
                        fitted.params.clone(),
                        in_sample,
                        first.train_end,
                    )
                })
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let mut signals = SignalSeries::default();
    let mut bar_indices = Vec::new();
    for (outcome, positions) in &outcomes {
        signals.extend_from_slice(positions);
        bar_indices.extend(outcome.window.test_range());
    }
    let returns = stitched_returns(bars, &signals, &bar_indices, objective);
    let report = PerformanceReport::compute(&returns, &signals, &objective.config)?;

    let windows: Vec<WindowOutcome> = outcomes.into_iter().map(|(o, _)| o).collect();
    let is_scores: Vec<f64> = windows.iter().map(|w| w.in_sample_score).collect();
    let oos_scores: Vec<f64> = windows.iter().filter_map(|w| w.out_of_sample_score).collect();
    let mean_is_score = mean_f64(&is_scores);
    let mean_oos_score = mean_f64(&oos_scores);
    let (degradation_ratio, degradation_flag) = if oos_scores.is_empty() {
        (None, DegradationFlag::InsufficientData)
    } else {
        compute_degradation_ratio(objective.measure, mean_is_score, mean_oos_score)
    };

    if log_skips {
        info!(
            windows = windows.len(),
            skipped = skipped.len(),
            stitched_bars = signals.len(),
            mean_is_score,
            mean_oos_score,
            "walk-forward finished"
        );
    }

    Ok(WalkForwardResult {
        windows,
        skipped,
        signals,
        bar_indices,
        returns,
        report,
        mean_is_score,
        mean_oos_score,
        degradation_ratio,
        degradation_flag,
    })
}

/// Generate test-slice signals for one window and score them.
#[allow(clippy::too_many_arguments)]
fn evaluate_window(
    bars: &[Bar],
    strategy: &dyn Strategy,
    objective: &Objective,
    config: &WalkForwardConfig,
    window: &WalkForwardWindow,
    params: ParamSet,
    in_sample_score: f64,
    fitted_end: usize,
) -> Result<(WindowOutcome, Vec<f64>), ValidationError> {
    let test_bars = &bars[window.test_range()];
    let context = match config.signal_context {
        SignalContext::TestOnly => test_bars,
        SignalContext::WithHistory => &bars[window.train_start..window.test_end + 1],
    };
    let all = generate_checked(strategy, context, &params)
        .map_err(|e| ValidationError::strategy(strategy.name(), e))?
        .into_inner();
    let positions = all[all.len() - window.test_len()..].to_vec();

    let test_signals = SignalSeries::from_weights(positions.clone());
    let test_returns = strategy_returns(test_bars, &test_signals, objective.config.return_kind)
        .map_err(|e| ValidationError::strategy(strategy.name(), e))?;
    let out_of_sample_score = if test_returns.is_empty() {
        None
    } else {
        Some(objective.score_returns(&test_returns)?)
    };

    Ok((
        WindowOutcome {
            window: *window,
            params,
            in_sample_score,
            out_of_sample_score,
            fitted_through: bars[fitted_end].timestamp,
        },
        positions,
    ))
}

/// Returns of the stitched positions. A position only earns the move into the
/// next stitched bar when that bar directly follows it in the series.
fn stitched_returns(
    bars: &[Bar],
    signals: &SignalSeries,
    bar_indices: &[usize],
    objective: &Objective,
) -> Vec<f64> {
    let kind = objective.config.return_kind;
    let positions = signals.positions();
    bar_indices
        .windows(2)
        .zip(positions)
        .map(|(pair, &pos)| {
            let (prev, cur) = (pair[0], pair[1]);
            if cur == prev + 1 {
                pos * kind.price_return(bars[prev].close, bars[cur].close)
            } else {
                0.0
            }
        })
        .collect()
}

/// Degradation of mean OOS against mean IS score for `measure`.
///
/// Loss measures are never positive, so a ratio of two of them says nothing
/// about direction; they always report OOS - IS (LossDifference). Gain
/// measures follow the ratio rules:
/// - IS >= 0.1: ratio = OOS / IS (Normal)
/// - 0 <= IS < 0.1: difference = OOS - IS (LowIsScore)
/// - IS < 0: no figure (NegativeIsScore)
/// - IS >= 0.1 but OOS < 0: clamped to 0.0 (FailedOos)
pub fn compute_degradation_ratio(
    measure: Measure,
    mean_is_score: f64,
    mean_oos_score: f64,
) -> (Option<f64>, DegradationFlag) {
    if measure.is_loss_measure() {
        (Some(mean_oos_score - mean_is_score), DegradationFlag::LossDifference)
    } else if mean_is_score < 0.0 {
        (None, DegradationFlag::NegativeIsScore)
    } else if mean_is_score < LOW_IS_SCORE {
        (Some(mean_oos_score - mean_is_score), DegradationFlag::LowIsScore)
    } else if mean_oos_score < 0.0 {
        // Positive IS but negative OOS: canonical overfit signature
        (Some(0.0), DegradationFlag::FailedOos)
    } else {
        (Some(mean_oos_score / mean_is_score), DegradationFlag::Normal)
    }
}

// ─── Walk-forward as a pipeline ──────────────────────────────────────

/// The whole walk-forward run scored on its stitched returns, so the
/// permutation test can validate out-of-sample significance.
pub struct WalkForwardPipeline<'a> {
    strategy: &'a dyn Strategy,
    optimizer: &'a dyn Optimizer,
    space: &'a SearchSpace,
    objective: Objective,
    config: WalkForwardConfig,
}

impl<'a> WalkForwardPipeline<'a> {
    pub fn new(
        strategy: &'a dyn Strategy,
        optimizer: &'a dyn Optimizer,
        space: &'a SearchSpace,
        objective: Objective,
        config: WalkForwardConfig,
    ) -> Self {
        Self {
            strategy,
            optimizer,
            space,
            objective,
            config,
        }
    }
}

impl Pipeline for WalkForwardPipeline<'_> {
    fn label(&self) -> String {
        let w = &self.config.window;
        format!(
            "walk-forward {} via {} ({}/{}/{})",
            self.strategy.name(),
            self.optimizer.name(),
            w.train_length,
            w.test_length,
            w.step
        )
    }

    fn measure(&self) -> Measure {
        self.objective.measure
    }

    fn statistic(&self, series: &PriceSeries) -> Result<f64, ValidationError> {
        let result = walk_forward(
            series,
            self.strategy,
            self.optimizer,
            self.space,
            &self.objective,
            &self.config,
            false,
        )?;
        self.objective.score_returns(&result.returns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(train: usize, test: usize, step: usize) -> WindowSpec {
        WindowSpec {
            train_length: train,
            test_length: test,
            step,
            anchored: false,
        }
    }

    // ─── Window generation tests ─────────────────────────────────

    #[test]
    fn hundred_bars_fifty_ten_ten() {
        let windows = spec(50, 10, 10).generate_windows(100).unwrap();
        assert_eq!(windows.len(), 5);
        assert_eq!(windows[0].train_start, 0);
        assert_eq!(windows[0].train_end, 49);
        assert_eq!(windows[0].test_start, 50);
        assert_eq!(windows[4].test_end, 99);
        let covered: usize = windows.iter().map(|w| w.test_len()).sum();
        assert_eq!(covered, 50);
    }

    #[test]
    fn windows_never_overlap_and_train_precedes_test() {
        let windows = spec(30, 7, 9).generate_windows(200).unwrap();
        for w in &windows {
            assert!(w.train_end < w.test_start);
            assert_eq!(w.train_len(), 30);
        }
        for pair in windows.windows(2) {
            assert!(pair[0].test_end < pair[1].test_start);
        }
    }

    #[test]
    fn last_window_is_truncated() {
        let windows = spec(50, 10, 10).generate_windows(95).unwrap();
        assert_eq!(windows.len(), 5);
        assert_eq!(windows[4].test_len(), 5);
        assert_eq!(windows[4].test_end, 94);
    }

    #[test]
    fn anchored_windows_expand() {
        let windows = WindowSpec {
            anchored: true,
            ..spec(40, 10, 10)
        }
        .generate_windows(100)
        .unwrap();
        for pair in windows.windows(2) {
            assert_eq!(pair[1].train_start, 0);
            assert!(pair[1].train_len() > pair[0].train_len());
        }
    }

    #[test]
    fn overlapping_step_rejected() {
        assert!(matches!(
            spec(50, 10, 5).validate(),
            Err(ValidationError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn too_short_series_is_insufficient() {
        assert!(matches!(
            spec(50, 10, 10).generate_windows(50),
            Err(ValidationError::InsufficientData {
                available: 50,
                required: 51
            })
        ));
    }

    #[test]
    fn huge_step_yields_single_window() {
        let windows = spec(50, 10, usize::MAX).generate_windows(100).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].test_start, 50);
        assert_eq!(windows[0].test_end, 59);

        let windows = spec(50, usize::MAX, usize::MAX).generate_windows(100).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].test_end, 99);
    }

    // ─── Degradation tests ───────────────────────────────────────

    fn degradation(measure: Measure, is: f64, oos: f64) -> (Option<f64>, DegradationFlag) {
        compute_degradation_ratio(measure, is, oos)
    }

    #[test]
    fn gain_measures_use_ratio_rules() {
        for measure in [Measure::Sharpe, Measure::Sortino, Measure::ProfitFactor] {
            let (ratio, flag) = degradation(measure, 2.0, 1.0);
            assert_eq!(flag, DegradationFlag::Normal, "{measure}");
            assert!((ratio.unwrap() - 0.5).abs() < 1e-10);

            assert_eq!(
                degradation(measure, 1.5, -0.3),
                (Some(0.0), DegradationFlag::FailedOos)
            );
            assert_eq!(
                degradation(measure, -0.5, 0.3),
                (None, DegradationFlag::NegativeIsScore)
            );
        }
    }

    #[test]
    fn small_in_sample_gain_falls_back_to_difference() {
        let (diff, flag) = degradation(Measure::TotalReturn, 0.05, 0.03);
        assert_eq!(flag, DegradationFlag::LowIsScore);
        assert!((diff.unwrap() + 0.02).abs() < 1e-10);
    }

    #[test]
    fn loss_measures_report_signed_difference() {
        for measure in [
            Measure::MaxDrawdown,
            Measure::ValueAtRisk,
            Measure::ConditionalValueAtRisk,
        ] {
            // Deeper out-of-sample drawdown is a negative difference.
            let (diff, flag) = degradation(measure, -0.08, -0.09);
            assert_eq!(flag, DegradationFlag::LossDifference, "{measure}");
            assert!((diff.unwrap() + 0.01).abs() < 1e-10);

            let (diff, _) = degradation(measure, -0.08, -0.05);
            assert!(diff.unwrap() > 0.0);
        }
    }

    // ─── Stitching tests ─────────────────────────────────────────

    #[test]
    fn gap_between_windows_earns_nothing() {
        let bars: Vec<Bar> = crate::synthetic::random_walk(10, 1).unwrap().bars().to_vec();
        let signals = SignalSeries::from_weights(vec![1.0, 1.0, 1.0, 1.0]);
        let indices = [2, 3, 6, 7];
        let r = stitched_returns(&bars, &signals, &indices, &Objective::default());
        assert_eq!(r.len(), 3);
        assert!((r[0] - (bars[3].close / bars[2].close).ln()).abs() < 1e-12);
        assert_eq!(r[1], 0.0);
        assert!((r[2] - (bars[7].close / bars[6].close).ln()).abs() < 1e-12);
    }
}
