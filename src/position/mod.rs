mod error;
mod parsing;
mod types;

pub use error::RecordError;
pub use types::{PositionSample, Visibility};
