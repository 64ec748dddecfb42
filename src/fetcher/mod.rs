mod error;
mod fetcher;
mod transport;

pub use error::FetchError;
pub use fetcher::Fetcher;
pub use transport::{HttpTransport, SourceTarget, Transport};

#[cfg(test)]
pub(crate) use fetcher::tests;
