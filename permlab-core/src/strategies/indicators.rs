//! Rolling indicators used by the reference strategies.
//!
//! Each function returns one value per bar, `NaN` until the window is full.

use crate::domain::Bar;

/// Simple moving average of closes over `period` bars (window includes bar `i`).
pub fn sma(bars: &[Bar], period: usize) -> Vec<f64> {
    let n = bars.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let mut sum: f64 = bars[..period].iter().map(|b| b.close).sum();
    result[period - 1] = sum / period as f64;

    // Roll the window forward
    for i in period..n {
        sum += bars[i].close - bars[i - period].close;
        result[i] = sum / period as f64;
    }
    result
}

/// Highest high of the `period` bars strictly before bar `i`.
pub fn prior_channel_high(bars: &[Bar], period: usize) -> Vec<f64> {
    prior_channel(bars, period, |b| b.high, f64::max)
}

/// Lowest low of the `period` bars strictly before bar `i`.
pub fn prior_channel_low(bars: &[Bar], period: usize) -> Vec<f64> {
    prior_channel(bars, period, |b| b.low, f64::min)
}

fn prior_channel(
    bars: &[Bar],
    period: usize,
    field: impl Fn(&Bar) -> f64,
    pick: impl Fn(f64, f64) -> f64,
) -> Vec<f64> {
    let n = bars.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }
    for i in period..n {
        result[i] = bars[i - period..i]
            .iter()
            .map(&field)
            .reduce(&pick)
            .unwrap_or(f64::NAN);
    }
    result
}
