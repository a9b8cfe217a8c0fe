//! Telemetry: structured logging and metric names.
//!
//! Metrics go through the `metrics` facade; nothing is exported unless the
//! embedding process installs a recorder.

pub mod logging;

pub use logging::{init_logging, CredentialRedactor, LogFormat, LoggingConfig, RedactionConfig};

/// Counter of probe outcomes, labelled by probe and status.
pub const PROBE_RESULTS_TOTAL: &str = "preflight_probe_results_total";

/// Histogram of probe response times in milliseconds.
pub const PROBE_DURATION_MS: &str = "preflight_probe_duration_ms";

/// Counter of aggregation runs, labelled by overall status.
pub const SNAPSHOTS_TOTAL: &str = "preflight_snapshots_total";
