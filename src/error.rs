//! Application error types
//!
//! Errors are grouped by concern (validation of gateway data, external
//! services, infrastructure) and wrapped in [`AppError`], which carries an
//! optional context string for logging.

use crate::database::error::DatabaseError;
use std::fmt;
use thiserror::Error;

/// Result type used across the payment layer
pub type AppResult<T> = Result<T, AppError>;

/// A single notification field that failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidParameter {
    pub name: String,
    pub received: String,
    pub expected: String,
}

impl fmt::Display for InvalidParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (received '{}', expected '{}')",
            self.name, self.received, self.expected
        )
    }
}

/// Errors raised while validating data posted by the gateway
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error(
        "PayFast: received data with missing reference ({}) or txn_id ({})",
        .reference.as_deref().unwrap_or("None"),
        .txn_id.as_deref().unwrap_or("None")
    )]
    MissingReferenceOrTransactionId {
        reference: Option<String>,
        txn_id: Option<String>,
    },

    #[error("PayFast: received data for reference {reference}; no order found")]
    ReferenceNotFound { reference: String },

    #[error("PayFast: received data for reference {reference}; multiple order found ({count})")]
    MultipleReferencesFound { reference: String, count: usize },

    #[error("PayFast: invalid signature for reference {reference}")]
    InvalidSignature { reference: String },

    #[error(
        "PayFast: invalid parameters for reference {reference}: {}",
        .parameters.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    )]
    InvalidParameters {
        reference: String,
        parameters: Vec<InvalidParameter>,
    },

    #[error("PayFast: gateway did not confirm notification for reference {reference}")]
    GatewayRejected { reference: String },
}

/// Errors returned by external services
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExternalError {
    #[error("{provider} error: {message}")]
    PaymentProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },
}

/// Errors coming from configuration or storage
#[derive(Debug, Clone, Error)]
pub enum InfrastructureError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Error)]
pub enum AppErrorKind {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    External(#[from] ExternalError),

    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub context: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.kind, AppErrorKind::Validation(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{} ({})", self.kind, context),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for AppError {}

impl From<ValidationError> for AppError {
    fn from(error: ValidationError) -> Self {
        Self::new(AppErrorKind::Validation(error))
    }
}

impl From<ExternalError> for AppError {
    fn from(error: ExternalError) -> Self {
        Self::new(AppErrorKind::External(error))
    }
}

impl From<InfrastructureError> for AppError {
    fn from(error: InfrastructureError) -> Self {
        Self::new(AppErrorKind::Infrastructure(error))
    }
}

impl From<DatabaseError> for AppError {
    fn from(error: DatabaseError) -> Self {
        Self::new(AppErrorKind::Infrastructure(InfrastructureError::Database(
            error,
        )))
    }
}
