mod range;
mod segment;
mod types;

pub use range::{TimeRange, DEFAULT_TIME_WINDOW_SECONDS};
pub use segment::daylight_windows;
pub use types::Window;
