pub mod http;
pub mod rate_limiter;
pub mod retry;

pub use http::{HttpClient, HttpResponse};
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;
