//! Synthetic data — seeded random-walk price series for tests and demos.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use permlab_core::{Bar, PriceSeries, SeriesError};

/// Generate `n` daily bars of a geometric random walk starting at 100.0.
///
/// Weekends are skipped so timestamps look like a trading calendar. The
/// same `(n, seed)` always yields the same series.
pub fn random_walk(n: usize, seed: u64) -> Result<PriceSeries, SeriesError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0_f64;
    let mut current = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default();

    while bars.len() < n {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            current += Duration::days(1);
            continue;
        }

        let gap: f64 = rng.gen_range(-0.003..0.003);
        let daily_return: f64 = rng.gen_range(-0.02..0.02);
        let open = price * (1.0 + gap);
        let close = open * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000.0..5_000_000.0_f64).round();

        bars.push(Bar::new(
            current.and_hms_opt(0, 0, 0).unwrap_or_default(),
            open,
            high,
            low,
            close,
            volume,
        ));

        price = close;
        current += Duration::days(1);
    }

    PriceSeries::new(format!("SYN{seed}"), bars)
}
