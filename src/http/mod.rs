//! HTTP client module with status classification and error handling.

mod client;
mod status;

pub use client::HttpClient;
pub use status::{classify_status, from_reqwest};
