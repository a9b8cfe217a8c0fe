//! Error handling for Preflight Core.
//!
//! This module provides:
//! - A single error type with stable machine-readable codes
//! - HTTP status code mapping for the health endpoints
//! - User-facing vs internal messages
//! - Error logging with tracing integration
//! - Metrics integration for error tracking
//!
//! Probe faults never surface through this type: probes convert their own
//! failures into a status. `PreflightError` covers configuration, the
//! caller-layer retest action and the aggregation machinery itself.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for Preflight operations.
pub type Result<T> = std::result::Result<T, PreflightError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
///
/// These codes are stable and can be used by clients for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Probe Errors (1000-1099)
    ProbeNotFound,
    DuplicateProbe,
    ProbeTimeout,

    // Database Errors (2000-2099)
    DatabaseNotConfigured,
    DatabaseConnectionFailed,
    DatabaseQueryFailed,

    // System Errors (2100-2199)
    IoError,
    IntrospectionUnavailable,

    // Serialization Errors (2200-2299)
    SerializationError,

    // External Service Errors (3000-3099)
    IntegrationUnreachable,
    NetworkError,

    // Configuration Errors (5000-5099)
    ConfigurationError,
    InvalidConfiguration,

    // Internal Errors (9000-9099)
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::ProbeNotFound => 1000,
            Self::DuplicateProbe => 1001,
            Self::ProbeTimeout => 1002,

            Self::DatabaseNotConfigured => 2000,
            Self::DatabaseConnectionFailed => 2001,
            Self::DatabaseQueryFailed => 2002,

            Self::IoError => 2100,
            Self::IntrospectionUnavailable => 2101,

            Self::SerializationError => 2200,

            Self::IntegrationUnreachable => 3000,
            Self::NetworkError => 3001,

            Self::ConfigurationError => 5000,
            Self::InvalidConfiguration => 5001,

            Self::InternalError => 9000,
        }
    }

    /// Get the HTTP status code for this error.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::ProbeNotFound => StatusCode::NOT_FOUND,
            Self::DuplicateProbe | Self::InvalidConfiguration => StatusCode::BAD_REQUEST,
            Self::ProbeTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::IntegrationUnreachable | Self::NetworkError => StatusCode::BAD_GATEWAY,
            Self::DatabaseNotConfigured
            | Self::DatabaseConnectionFailed
            | Self::DatabaseQueryFailed => StatusCode::SERVICE_UNAVAILABLE,
            Self::IoError
            | Self::IntrospectionUnavailable
            | Self::SerializationError
            | Self::ConfigurationError
            | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error category.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::ProbeNotFound | Self::DuplicateProbe | Self::ProbeTimeout => "probe",
            Self::DatabaseNotConfigured
            | Self::DatabaseConnectionFailed
            | Self::DatabaseQueryFailed => "database",
            Self::IoError | Self::IntrospectionUnavailable => "system",
            Self::SerializationError => "serialization",
            Self::IntegrationUnreachable | Self::NetworkError => "external",
            Self::ConfigurationError | Self::InvalidConfiguration => "configuration",
            Self::InternalError => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self));
        write!(f, "{}", s.trim_matches('"'))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity used to pick the log level for an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Determine severity from an error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::InternalError => Self::Critical,
            ErrorCode::ConfigurationError
            | ErrorCode::InvalidConfiguration
            | ErrorCode::DuplicateProbe
            | ErrorCode::IntrospectionUnavailable => Self::High,
            ErrorCode::DatabaseNotConfigured
            | ErrorCode::DatabaseConnectionFailed
            | ErrorCode::DatabaseQueryFailed
            | ErrorCode::IoError
            | ErrorCode::ProbeTimeout
            | ErrorCode::SerializationError => Self::Medium,
            ErrorCode::ProbeNotFound
            | ErrorCode::IntegrationUnreachable
            | ErrorCode::NetworkError => Self::Low,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured information attached to an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Arbitrary context values
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Actionable hint for the operator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    fn is_empty(&self) -> bool {
        self.context.is_empty() && self.suggestion.is_none()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for Preflight Core.
#[derive(Error, Debug)]
pub struct PreflightError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message (safe to expose to clients)
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// Additional structured details
    details: ErrorDetails,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for PreflightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl PreflightError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::InternalError, "An internal error occurred", message)
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::InvalidConfiguration, message)
    }

    /// No probe is registered under `name`.
    pub fn probe_not_found(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorCode::ProbeNotFound, format!("No probe registered as '{}'", name))
            .with_context("probe", &name)
    }

    /// Two probes were registered with the same name.
    pub fn duplicate_probe(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorCode::DuplicateProbe, format!("Probe '{}' is registered twice", name))
            .with_context("probe", &name)
    }

    /// An integration stayed unreachable after every retry.
    pub fn integration_unreachable(
        name: impl Into<String>,
        attempts: u32,
        last_message: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let last_message = last_message.into();
        Self::new(
            ErrorCode::IntegrationUnreachable,
            format!(
                "Integration '{}' is still unreachable after {} attempts: {}",
                name, attempts, last_message
            ),
        )
        .with_details(
            ErrorDetails::new()
                .with_context("integration", &name)
                .with_context("attempts", attempts)
                .with_suggestion(format!(
                    "Check the credentials and network access for '{}', then retest",
                    name
                )),
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add error details.
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    /// Add internal message.
    pub fn with_internal_message(mut self, message: impl Into<String>) -> Self {
        self.internal_message = Some(message.into());
        self
    }

    /// Add context to details.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.context.insert(key.into(), v);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();
        let status = self.http_status().as_u16();

        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    source = ?self.source,
                    "Preflight error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Preflight error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Preflight error"
                );
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            "preflight_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Error response body for HTTP clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always false for errors
    pub success: bool,

    /// Error information
    pub error: ErrorInfo,
}

/// Detailed error information for HTTP responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub numeric_code: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&PreflightError> for ErrorResponse {
    fn from(error: &PreflightError) -> Self {
        Self {
            success: false,
            error: ErrorInfo {
                code: error.code,
                numeric_code: error.code.numeric_code(),
                message: error.user_message.to_string(),
                details: if error.details.is_empty() {
                    None
                } else {
                    Some(error.details.clone())
                },
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

impl IntoResponse for PreflightError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.http_status();
        let response = ErrorResponse::from(&self);

        (status, Json(response)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations
// ═══════════════════════════════════════════════════════════════════════════════

impl From<sqlx::Error> for PreflightError {
    fn from(error: sqlx::Error) -> Self {
        let code = match &error {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_) => ErrorCode::DatabaseConnectionFailed,
            _ => ErrorCode::DatabaseQueryFailed,
        };
        let message = error.to_string();
        Self::with_internal(code, "Database check failed", message).with_source(error)
    }
}

impl From<std::io::Error> for PreflightError {
    fn from(error: std::io::Error) -> Self {
        let message = error.to_string();
        Self::with_internal(ErrorCode::IoError, "I/O operation failed", message).with_source(error)
    }
}

impl From<reqwest::Error> for PreflightError {
    fn from(error: reqwest::Error) -> Self {
        let code = if error.is_timeout() {
            ErrorCode::ProbeTimeout
        } else {
            ErrorCode::NetworkError
        };
        let message = error.to_string();
        Self::with_internal(code, "HTTP request failed", message).with_source(error)
    }
}

impl From<serde_json::Error> for PreflightError {
    fn from(error: serde_json::Error) -> Self {
        let message = error.to_string();
        Self::with_internal(ErrorCode::SerializationError, "Serialization failed", message)
            .with_source(error)
    }
}

impl From<config::ConfigError> for PreflightError {
    fn from(error: config::ConfigError) -> Self {
        let message = error.to_string();
        Self::new(ErrorCode::ConfigurationError, format!("Invalid configuration: {}", message))
            .with_source(error)
    }
}

impl From<tokio::time::error::Elapsed> for PreflightError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self::new(ErrorCode::ProbeTimeout, "Operation timed out").with_source(error)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
