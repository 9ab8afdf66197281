pub mod deriver;
pub mod stream;

pub use deriver::{DerivedSample, MetricsReading, RateDeriver};
