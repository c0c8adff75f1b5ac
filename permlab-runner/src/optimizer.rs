//! Strategy optimizers — parameter search over a train slice.
//!
//! The engine only depends on the [`Optimizer`] trait. Two searches ship
//! with the crate:
//! - [`GridSearch`]: exhaustive cartesian product in deterministic key order.
//! - [`RandomSearch`]: `n_samples` seeded draws from the same grid.
//!
//! Both run sequentially; parallelism lives one level up (permutation trials,
//! walk-forward windows) so deep Monte Carlo runs do not oversubscribe.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use permlab_core::{Bar, Measure, ParamSet, Strategy, ValidationError};

use crate::objective::Objective;

/// Upper bound on values produced by a single range.
const MAX_RANGE_VALUES: usize = 100_000;

// ─── Search space ────────────────────────────────────────────────────

/// Candidate values for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamRange {
    /// Explicit list, e.g. `[10, 20, 30]`.
    Values(Vec<f64>),
    /// Inclusive arithmetic range, e.g. `{ start = 10, end = 50, step = 5 }`.
    Range { start: f64, end: f64, step: f64 },
}

impl ParamRange {
    pub fn values(&self) -> Result<Vec<f64>, ValidationError> {
        match self {
            ParamRange::Values(v) => {
                if v.is_empty() || v.iter().any(|x| !x.is_finite()) {
                    return Err(ValidationError::invalid(
                        "parameter value list must be non-empty and finite",
                    ));
                }
                Ok(v.clone())
            }
            &ParamRange::Range { start, end, step } => {
                if !(start.is_finite() && end.is_finite() && step.is_finite())
                    || step <= 0.0
                    || end < start
                {
                    return Err(ValidationError::invalid(format!(
                        "invalid range start={start} end={end} step={step}"
                    )));
                }
                let count = ((end - start) / step + 1e-9).floor() as usize + 1;
                if count > MAX_RANGE_VALUES {
                    return Err(ValidationError::invalid(format!(
                        "range start={start} end={end} step={step} yields {count} values"
                    )));
                }
                Ok((0..count).map(|k| start + k as f64 * step).collect())
            }
        }
    }
}

/// Fixed parameters plus the ranges an optimizer may vary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSpace {
    fixed: ParamSet,
    ranges: BTreeMap<String, ParamRange>,
}

impl SearchSpace {
    pub fn new(ranges: BTreeMap<String, ParamRange>) -> Self {
        Self {
            fixed: ParamSet::new(),
            ranges,
        }
    }

    /// Parameters held constant for every candidate (range keys win on conflict).
    pub fn with_fixed(mut self, fixed: ParamSet) -> Self {
        self.fixed = fixed;
        self
    }

    pub fn with_range(mut self, name: impl Into<String>, range: ParamRange) -> Self {
        self.ranges.insert(name.into(), range);
        self
    }

    pub fn fixed(&self) -> &ParamSet {
        &self.fixed
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.expanded().map(|_| ())
    }

    fn expanded(&self) -> Result<Vec<(&str, Vec<f64>)>, ValidationError> {
        self.ranges
            .iter()
            .map(|(name, range)| {
                range
                    .values()
                    .map(|v| (name.as_str(), v))
                    .map_err(|e| ValidationError::invalid(format!("search_space.{name}: {e}")))
            })
            .collect()
    }

    /// Every combination, in lexicographic key order, merged over `base`.
    pub fn grid(&self, base: &ParamSet) -> Result<Vec<ParamSet>, ValidationError> {
        let base = base.merged(&self.fixed);
        let mut out = vec![base];
        for (name, values) in self.expanded()? {
            out = out
                .iter()
                .flat_map(|p| values.iter().map(move |&v| p.clone().with(name, v)))
                .collect();
        }
        Ok(out)
    }

    /// One uniformly drawn value per parameter, merged over `base`.
    pub fn sample(&self, base: &ParamSet, rng: &mut StdRng) -> Result<ParamSet, ValidationError> {
        let mut params = base.merged(&self.fixed);
        for (name, values) in self.expanded()? {
            params.set(name, values[rng.gen_range(0..values.len())]);
        }
        Ok(params)
    }
}

// ─── Optimizer capability ────────────────────────────────────────────

/// Outcome of one optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Optimized {
    pub params: ParamSet,
    pub score: f64,
    /// Candidates actually scored (rejected parameter sets excluded).
    pub candidates: usize,
}

/// Parameter search over a train slice.
///
/// Must be deterministic for fixed inputs and return parameters that pass
/// the strategy's own validation.
pub trait Optimizer: Send + Sync {
    fn name(&self) -> &str;

    /// Shortest train slice this optimizer accepts.
    fn min_train_length(&self) -> usize;

    fn optimize(
        &self,
        train: &[Bar],
        strategy: &dyn Strategy,
        space: &SearchSpace,
    ) -> Result<Optimized, ValidationError>;
}

/// Optimizer settings as they appear in a study file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub name: String,
    pub objective: Measure,
    /// Draws for random search.
    pub n_samples: usize,
    pub seed: u64,
    pub min_train_length: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            name: "grid".into(),
            objective: Measure::Sharpe,
            n_samples: 100,
            seed: 42,
            min_train_length: 20,
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.n_samples == 0 {
            return Err(ValidationError::invalid("optimizer.n_samples must be >= 1"));
        }
        if self.min_train_length < 2 {
            return Err(ValidationError::invalid(
                "optimizer.min_train_length must be >= 2",
            ));
        }
        Ok(())
    }
}

fn check_train_length(train: &[Bar], min: usize) -> Result<(), ValidationError> {
    if train.len() < min {
        return Err(ValidationError::InsufficientData {
            available: train.len(),
            required: min,
        });
    }
    Ok(())
}

/// Score candidates in order and keep the first strictly-best one.
fn pick_best(
    train: &[Bar],
    strategy: &dyn Strategy,
    objective: &Objective,
    candidates: impl IntoIterator<Item = ParamSet>,
) -> Result<Optimized, ValidationError> {
    let mut best: Option<(ParamSet, f64)> = None;
    let mut scored = 0;
    for params in candidates {
        if let Err(e) = strategy.validate_params(&params) {
            debug!(strategy = strategy.name(), %params, error = %e, "skipping candidate");
            continue;
        }
        let score = objective.evaluate(strategy, train, &params)?.score;
        scored += 1;
        if !score.is_finite() {
            continue;
        }
        if best.as_ref().map_or(true, |(_, b)| score > *b) {
            best = Some((params, score));
        }
    }
    match best {
        Some((params, score)) => Ok(Optimized {
            params,
            score,
            candidates: scored,
        }),
        None => Err(ValidationError::invalid(format!(
            "no valid parameter set for strategy '{}' in the search space",
            strategy.name()
        ))),
    }
}

// ─── Grid search ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GridSearch {
    pub objective: Objective,
    pub min_train_length: usize,
}

impl GridSearch {
    pub fn new(objective: Objective) -> Self {
        Self {
            objective,
            min_train_length: OptimizerConfig::default().min_train_length,
        }
    }

    pub fn with_min_train_length(mut self, min: usize) -> Self {
        self.min_train_length = min;
        self
    }
}

impl Optimizer for GridSearch {
    fn name(&self) -> &str {
        "grid"
    }

    fn min_train_length(&self) -> usize {
        self.min_train_length
    }

    fn optimize(
        &self,
        train: &[Bar],
        strategy: &dyn Strategy,
        space: &SearchSpace,
    ) -> Result<Optimized, ValidationError> {
        check_train_length(train, self.min_train_length)?;
        let candidates = space.grid(&strategy.default_params())?;
        pick_best(train, strategy, &self.objective, candidates)
    }
}

// ─── Random search ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RandomSearch {
    pub objective: Objective,
    pub n_samples: usize,
    pub seed: u64,
    pub min_train_length: usize,
}

impl RandomSearch {
    pub fn new(objective: Objective, n_samples: usize, seed: u64) -> Self {
        Self {
            objective,
            n_samples,
            seed,
            min_train_length: OptimizerConfig::default().min_train_length,
        }
    }

    pub fn with_min_train_length(mut self, min: usize) -> Self {
        self.min_train_length = min;
        self
    }
}

impl Optimizer for RandomSearch {
    fn name(&self) -> &str {
        "random"
    }

    fn min_train_length(&self) -> usize {
        self.min_train_length
    }

    fn optimize(
        &self,
        train: &[Bar],
        strategy: &dyn Strategy,
        space: &SearchSpace,
    ) -> Result<Optimized, ValidationError> {
        check_train_length(train, self.min_train_length)?;
        let base = strategy.default_params();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let candidates = (0..self.n_samples)
            .map(|_| space.sample(&base, &mut rng))
            .collect::<Result<Vec<_>, _>>()?;
        pick_best(train, strategy, &self.objective, candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::random_walk;
    use permlab_core::strategies::{DonchianBreakout, MaCrossover};
    use permlab_core::MeasureConfig;

    fn objective() -> Objective {
        Objective::new(Measure::TotalReturn, MeasureConfig::default())
    }

    #[test]
    fn range_is_inclusive() {
        let r = ParamRange::Range {
            start: 10.0,
            end: 30.0,
            step: 5.0,
        };
        assert_eq!(r.values().unwrap(), vec![10.0, 15.0, 20.0, 25.0, 30.0]);
    }

    #[test]
    fn bad_ranges_rejected() {
        let r = ParamRange::Range {
            start: 10.0,
            end: 5.0,
            step: 1.0,
        };
        assert!(r.values().is_err());
        assert!(ParamRange::Values(vec![]).values().is_err());
    }

    #[test]
    fn grid_is_cartesian_in_key_order() {
        let space = SearchSpace::default()
            .with_range("slow", ParamRange::Values(vec![30.0, 40.0]))
            .with_range("fast", ParamRange::Values(vec![5.0, 10.0, 15.0]));
        let grid = space.grid(&ParamSet::new()).unwrap();
        assert_eq!(grid.len(), 6);
        assert_eq!(grid[0].get("fast"), Some(5.0));
        assert_eq!(grid[0].get("slow"), Some(30.0));
        assert_eq!(grid[1].get("slow"), Some(40.0));
    }

    #[test]
    fn range_values_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            a: ParamRange,
            b: ParamRange,
        }
        let w: Wrapper = toml::from_str("a = [1, 2.5]\nb = { start = 1, end = 3, step = 1 }")
            .unwrap();
        assert_eq!(w.a.values().unwrap(), vec![1.0, 2.5]);
        assert_eq!(w.b.values().unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn grid_search_returns_best_candidate() {
        let series = random_walk(300, 5).unwrap();
        let strategy = DonchianBreakout::default();
        let space = SearchSpace::default().with_range(
            "lookback",
            ParamRange::Range {
                start: 5.0,
                end: 40.0,
                step: 5.0,
            },
        );
        let grid = GridSearch::new(objective());
        let best = grid.optimize(series.bars(), &strategy, &space).unwrap();
        assert_eq!(best.candidates, 8);

        for lookback in [5.0, 10.0, 20.0, 40.0] {
            let params = ParamSet::new().with("lookback", lookback);
            let score = objective()
                .evaluate(&strategy, series.bars(), &params)
                .unwrap()
                .score;
            assert!(best.score >= score);
        }
    }

    #[test]
    fn invalid_candidates_are_skipped() {
        let series = random_walk(200, 9).unwrap();
        let space = SearchSpace::default()
            .with_range("fast", ParamRange::Values(vec![5.0, 50.0]))
            .with_range("slow", ParamRange::Values(vec![20.0]));
        let best = GridSearch::new(objective())
            .optimize(series.bars(), &MaCrossover::default(), &space)
            .unwrap();
        assert_eq!(best.candidates, 1);
        assert_eq!(best.params.get("fast"), Some(5.0));
    }

    #[test]
    fn empty_space_scores_defaults() {
        let series = random_walk(100, 2).unwrap();
        let strategy = DonchianBreakout::default();
        let best = GridSearch::new(objective())
            .optimize(series.bars(), &strategy, &SearchSpace::default())
            .unwrap();
        assert_eq!(best.params, strategy.default_params());
        assert_eq!(best.candidates, 1);
    }

    #[test]
    fn short_train_slice_is_insufficient() {
        let series = random_walk(10, 2).unwrap();
        let err = GridSearch::new(objective())
            .optimize(series.bars(), &DonchianBreakout::default(), &SearchSpace::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InsufficientData {
                available: 10,
                required: 20
            }
        ));
    }

    #[test]
    fn random_search_is_deterministic() {
        let series = random_walk(250, 4).unwrap();
        let space = SearchSpace::default().with_range(
            "lookback",
            ParamRange::Range {
                start: 5.0,
                end: 60.0,
                step: 1.0,
            },
        );
        let rs = RandomSearch::new(objective(), 10, 99);
        let a = rs
            .optimize(series.bars(), &DonchianBreakout::default(), &space)
            .unwrap();
        let b = rs
            .optimize(series.bars(), &DonchianBreakout::default(), &space)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.candidates, 10);
    }
}
