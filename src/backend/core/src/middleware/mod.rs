//! HTTP middleware for the health server.

pub mod rate_limit;
pub mod security_headers;

pub use rate_limit::{RateLimitConfig, RateLimitLayer, RateLimiter};
pub use security_headers::{FrameOptions, SecurityHeadersConfig, SecurityHeadersLayer};
