use std::fmt::Display;

use crate::position::PositionSample;

/// Destination for fetched samples. A sample must be durable and queryable
/// once `add_sample` returns.
pub trait SampleSink {
    type Error: Display;

    fn add_sample(&self, sample: &PositionSample) -> Result<(), Self::Error>;
}
