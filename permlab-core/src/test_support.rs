//! Bar builders shared by unit tests.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::domain::{Bar, PriceSeries};

pub fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Bars whose open equals the previous close, with a ±1% intrabar range.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    let mut prev = closes.first().copied().unwrap_or(100.0);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = prev;
            prev = close;
            Bar::new(
                t0() + Duration::hours(i as i64),
                open,
                open.max(close) * 1.01,
                open.min(close) * 0.99,
                close,
                1_000.0 + i as f64,
            )
        })
        .collect()
}

pub fn flat_bars(n: usize, price: f64) -> Vec<Bar> {
    bars_from_closes(&vec![price; n])
}

/// Deterministic zig-zag series with drift: non-constant, strictly positive.
pub fn wavy_series(n: usize) -> PriceSeries {
    let closes: Vec<f64> = (0..n)
        .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.1)
        .collect();
    PriceSeries::new("TEST", bars_from_closes(&closes)).unwrap()
}
