//! Domain types: bars, price series, signal series, parameter sets.

pub mod bar;
pub mod params;
pub mod series;
pub mod signal;

pub use bar::Bar;
pub use params::ParamSet;
pub use series::{PriceSeries, SeriesError};
pub use signal::{Position, SignalSeries};
