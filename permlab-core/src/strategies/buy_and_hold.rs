//! Buy and hold — long from the first bar to the last.

use crate::domain::{Bar, ParamSet, SignalSeries};
use crate::strategy::{Strategy, StrategyError};

#[derive(Debug, Clone, Copy, Default)]
pub struct BuyAndHold;

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "buy_and_hold"
    }

    fn default_params(&self) -> ParamSet {
        ParamSet::new()
    }

    fn generate_signals(
        &self,
        bars: &[Bar],
        _params: &ParamSet,
    ) -> Result<SignalSeries, StrategyError> {
        Ok(SignalSeries::from_weights(vec![1.0; bars.len()]))
    }
}
