//! Utility modules: shared HTTP client, retry, timeout.

pub mod http;
pub mod retry;
pub mod timeout;
