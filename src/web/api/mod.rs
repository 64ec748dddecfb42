pub mod error;
pub mod iss;
