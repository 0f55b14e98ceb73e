mod http_cache;
mod random_slowdown;
mod requests_logging;

pub use http_cache::http_cache;
pub use requests_logging::{log_requests, RequestsLoggingLevel};

#[cfg(feature = "slowdown")]
pub use random_slowdown::slowdown_request;
