//! Random signal — coin-flip long/short positions with no edge.
//!
//! Positions depend only on the `seed` parameter and the bar index, never on
//! prices. Run against real or permuted data it has the same expected
//! performance, which makes it the null model for significance checks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{Bar, ParamSet, SignalSeries};
use crate::error::ensure_unit_interval;
use crate::strategy::{Strategy, StrategyError};

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSignal;

impl Strategy for RandomSignal {
    fn name(&self) -> &str {
        "random_signal"
    }

    fn default_params(&self) -> ParamSet {
        ParamSet::new().with("seed", 0.0).with("p_long", 0.5)
    }

    fn validate_params(&self, params: &ParamSet) -> Result<(), StrategyError> {
        params.require_usize("seed", 0)?;
        let p_long = params.get("p_long").unwrap_or(0.5);
        ensure_unit_interval("p_long", p_long).map_err(|e| StrategyError::InvalidParam {
            name: "p_long".into(),
            reason: e.to_string(),
        })
    }

    fn generate_signals(
        &self,
        bars: &[Bar],
        params: &ParamSet,
    ) -> Result<SignalSeries, StrategyError> {
        self.validate_params(params)?;
        let seed = params.require_usize("seed", 0)? as u64;
        let p_long = params.get("p_long").unwrap_or(0.5);
        let mut rng = StdRng::seed_from_u64(seed);
        let positions = (0..bars.len())
            .map(|_| if rng.gen_bool(p_long) { 1.0 } else { -1.0 })
            .collect();
        Ok(SignalSeries::from_weights(positions))
    }
}
