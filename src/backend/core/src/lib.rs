#![allow(clippy::result_large_err)]
//! # Preflight Core
//!
//! Service health aggregation and deployment readiness scoring.
//!
//! ## Architecture
//!
//! - **Health**: concurrent probes behind per-probe timeouts and fault
//!   boundaries, folded into one point-in-time snapshot
//! - **Readiness**: category validators, weighted composite score and verdict
//! - **Retry**: bounded caller-side retries for integration retests
//! - **Report**: exit codes, text reports and audit artifacts
//! - **Middleware**: security headers and rate limiting for the HTTP surface
//! - **Telemetry**: structured logging with credential redaction

pub mod app;
pub mod config;
pub mod error;
pub mod health;
pub mod middleware;
pub mod readiness;
pub mod report;
pub mod retry;
pub mod telemetry;

pub use app::Preflight;
pub use error::{ErrorCode, ErrorDetails, ErrorSeverity, PreflightError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::app::Preflight;
    pub use crate::config::Config;
    pub use crate::error::{ErrorCode, PreflightError, Result};
    pub use crate::health::{
        Criticality, HealthService, HealthSnapshot, Probe, ProbeRegistry, ProbeResult,
        ProbeStatus, SnapshotStatus,
    };
    pub use crate::readiness::{
        Category, CategoryValidator, CheckOutcome, ReadinessEvaluator, ReadinessVerdict, Verdict,
    };
    pub use crate::retry::RetryPolicy;
}
