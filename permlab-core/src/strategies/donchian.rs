//! Donchian breakout — trend following on prior channel extremes.
//!
//! Goes long when the close exceeds the highest high of the previous
//! `lookback` bars and short when it falls below the lowest low. Between
//! breakouts the last position is held. Flat during warmup.

use crate::domain::{Bar, ParamSet, SignalSeries};
use crate::strategy::{Strategy, StrategyError};

use super::indicators::{prior_channel_high, prior_channel_low};

#[derive(Debug, Clone, Copy)]
pub struct DonchianBreakout {
    pub default_lookback: usize,
}

impl Default for DonchianBreakout {
    fn default() -> Self {
        Self {
            default_lookback: 20,
        }
    }
}

impl Strategy for DonchianBreakout {
    fn name(&self) -> &str {
        "donchian_breakout"
    }

    fn default_params(&self) -> ParamSet {
        ParamSet::new().with("lookback", self.default_lookback as f64)
    }

    fn validate_params(&self, params: &ParamSet) -> Result<(), StrategyError> {
        params.require_usize("lookback", 1)?;
        Ok(())
    }

    fn generate_signals(
        &self,
        bars: &[Bar],
        params: &ParamSet,
    ) -> Result<SignalSeries, StrategyError> {
        let lookback = params.require_usize("lookback", 1)?;
        let upper = prior_channel_high(bars, lookback);
        let lower = prior_channel_low(bars, lookback);

        let mut position = 0.0;
        let positions = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| {
                if bar.close > upper[i] {
                    position = 1.0;
                } else if bar.close < lower[i] {
                    position = -1.0;
                }
                position
            })
            .collect();
        Ok(SignalSeries::from_weights(positions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::bars_from_closes;

    fn run(closes: &[f64], lookback: f64) -> Vec<f64> {
        DonchianBreakout::default()
            .generate_signals(
                &bars_from_closes(closes),
                &ParamSet::new().with("lookback", lookback),
            )
            .unwrap()
            .into_inner()
    }

    #[test]
    fn flat_during_warmup() {
        let pos = run(&[100.0, 101.0, 102.0, 103.0], 3.0);
        assert_eq!(&pos[..3], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn long_on_upper_breakout_held_until_breakdown() {
        let closes = [100.0, 100.0, 100.0, 110.0, 109.0, 108.0, 90.0];
        let pos = run(&closes, 3.0);
        assert_eq!(pos[3], 1.0);
        assert_eq!(pos[4], 1.0);
        assert_eq!(pos[5], 1.0);
        assert_eq!(pos[6], -1.0);
    }

    #[test]
    fn rejects_zero_lookback() {
        let err = DonchianBreakout::default()
            .validate_params(&ParamSet::new().with("lookback", 0.0))
            .unwrap_err();
        assert!(matches!(err, StrategyError::InvalidParam { .. }));
    }

    #[test]
    fn signal_only_depends_on_past() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.4).sin() * 8.0).collect();
        let full = run(&closes, 10.0);
        let prefix = run(&closes[..40], 10.0);
        assert_eq!(&full[..40], prefix.as_slice());
    }
}
