//! Reference strategies.
//!
//! These are plug-ins, not part of the validation engine: callers register
//! the ones they need (see [`builtin`]) and the engine only sees
//! `dyn Strategy`.

pub mod buy_and_hold;
pub mod donchian;
pub mod indicators;
pub mod ma_crossover;
pub mod random_signal;

use std::sync::Arc;

use crate::strategy::Strategy;

pub use buy_and_hold::BuyAndHold;
pub use donchian::DonchianBreakout;
pub use ma_crossover::MaCrossover;
pub use random_signal::RandomSignal;

/// Every reference strategy with default settings.
pub fn builtin() -> Vec<Arc<dyn Strategy>> {
    vec![
        Arc::new(BuyAndHold),
        Arc::new(DonchianBreakout::default()),
        Arc::new(MaCrossover::default()),
        Arc::new(RandomSignal),
    ]
}
