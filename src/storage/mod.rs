pub mod store;

pub use store::{SampleSource, SampleStore, StorageError};
