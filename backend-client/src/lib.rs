//! `reqwest` client for the perf dashboard's alerts and triage API.

mod client;
mod error;

pub use client::HttpBackend;
pub use error::ClientError;
pub use error::Result;
