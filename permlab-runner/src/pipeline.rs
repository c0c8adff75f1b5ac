//! Pipelines — "series in, statistic out" units the permutation test ranks.
//!
//! - [`FixedParams`]: signal generation with parameters fitted once on real
//!   data (the shallow test).
//! - [`Reoptimizing`]: re-runs the optimizer on every series before scoring
//!   (the deep test).
//! - [`WalkForwardPipeline`](crate::walk_forward::WalkForwardPipeline): the
//!   whole walk-forward orchestrator scored on its stitched returns.

use permlab_core::{Measure, ParamSet, PriceSeries, Strategy, ValidationError};

use crate::objective::Objective;
use crate::optimizer::{Optimizer, SearchSpace};

/// Anything that maps a price series to one objective statistic.
///
/// Implementations are shared across trial threads and must not keep
/// per-call state.
pub trait Pipeline: Send + Sync {
    /// Human-readable description for logs and reports.
    fn label(&self) -> String;

    /// Measure the statistic is expressed in.
    fn measure(&self) -> Measure;

    fn statistic(&self, series: &PriceSeries) -> Result<f64, ValidationError>;
}

pub struct FixedParams<'a> {
    strategy: &'a dyn Strategy,
    params: ParamSet,
    objective: Objective,
}

impl<'a> FixedParams<'a> {
    pub fn new(strategy: &'a dyn Strategy, params: ParamSet, objective: Objective) -> Self {
        Self {
            strategy,
            params,
            objective,
        }
    }
}

impl Pipeline for FixedParams<'_> {
    fn label(&self) -> String {
        format!("{} {}", self.strategy.name(), self.params)
    }

    fn measure(&self) -> Measure {
        self.objective.measure
    }

    fn statistic(&self, series: &PriceSeries) -> Result<f64, ValidationError> {
        Ok(self
            .objective
            .evaluate(self.strategy, series.bars(), &self.params)?
            .score)
    }
}

pub struct Reoptimizing<'a> {
    strategy: &'a dyn Strategy,
    optimizer: &'a dyn Optimizer,
    space: &'a SearchSpace,
    objective: Objective,
}

impl<'a> Reoptimizing<'a> {
    pub fn new(
        strategy: &'a dyn Strategy,
        optimizer: &'a dyn Optimizer,
        space: &'a SearchSpace,
        objective: Objective,
    ) -> Self {
        Self {
            strategy,
            optimizer,
            space,
            objective,
        }
    }
}

impl Pipeline for Reoptimizing<'_> {
    fn label(&self) -> String {
        format!("{} via {}", self.strategy.name(), self.optimizer.name())
    }

    fn measure(&self) -> Measure {
        self.objective.measure
    }

    fn statistic(&self, series: &PriceSeries) -> Result<f64, ValidationError> {
        let fitted = self
            .optimizer
            .optimize(series.bars(), self.strategy, self.space)?;
        Ok(self
            .objective
            .evaluate(self.strategy, series.bars(), &fitted.params)?
            .score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::{GridSearch, ParamRange};
    use crate::synthetic::random_walk;
    use permlab_core::strategies::DonchianBreakout;

    #[test]
    fn reoptimizing_never_scores_below_fixed_defaults() {
        let series = random_walk(200, 12).unwrap();
        let strategy = DonchianBreakout::default();
        let objective = Objective::default();
        let space = SearchSpace::default()
            .with_range("lookback", ParamRange::Values(vec![10.0, 20.0, 30.0]));
        let grid = GridSearch::new(objective);

        let fixed = FixedParams::new(&strategy, strategy.default_params(), objective);
        let deep = Reoptimizing::new(&strategy, &grid, &space, objective);
        assert!(deep.statistic(&series).unwrap() >= fixed.statistic(&series).unwrap());
        assert_eq!(fixed.measure(), Measure::Sharpe);
    }
}
