mod poller;
mod sink;
mod wait_time;

pub use poller::{Poller, PollerError, PollerState};
pub use sink::SampleSink;
pub use wait_time::WaitTime;
