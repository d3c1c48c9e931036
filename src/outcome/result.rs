//! Outcome Types
//!
//! The value every pipeline returns. Faults never escape a pipeline; they
//! arrive here as `InternalError`.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::ValidationState;

/// Outcome status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Invalid,
    DomainError,
    NotFound,
    Cancelled,
    InternalError,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => write!(f, "success"),
            Status::Invalid => write!(f, "invalid"),
            Status::DomainError => write!(f, "domain_error"),
            Status::NotFound => write!(f, "not_found"),
            Status::Cancelled => write!(f, "cancelled"),
            Status::InternalError => write!(f, "internal_error"),
        }
    }
}

/// Outcome of one command or query.
///
/// `Outcome<()>` is the bare success/failure shape; `Outcome<T>` carries a
/// value on success. Each variant holds exactly the data its status allows.
#[derive(Debug, Clone)]
pub enum Outcome<T = ()> {
    /// Operation completed
    Success(T),
    /// Request failed validation
    Invalid(ValidationState),
    /// Business rule rejected the request
    DomainError(String),
    /// Target of the operation does not exist
    NotFound,
    /// Operation was cancelled cooperatively
    Cancelled,
    /// Unexpected fault or integrity violation
    InternalError {
        error: String,
        fault: Option<Arc<anyhow::Error>>,
    },
}

impl Outcome {
    /// Bare success
    pub fn ok() -> Self {
        Outcome::Success(())
    }
}

impl<T> Outcome<T> {
    pub fn success(value: T) -> Self {
        Outcome::Success(value)
    }

    pub fn invalid(validation_state: ValidationState) -> Self {
        Outcome::Invalid(validation_state)
    }

    pub fn domain_error(error: impl Into<String>) -> Self {
        Outcome::DomainError(error.into())
    }

    pub fn not_found() -> Self {
        Outcome::NotFound
    }

    pub fn cancelled() -> Self {
        Outcome::Cancelled
    }

    pub fn internal_error(error: impl Into<String>) -> Self {
        Outcome::InternalError {
            error: error.into(),
            fault: None,
        }
    }

    /// Internal error captured from an unhandled fault.
    /// The fault's message becomes the outcome's error.
    pub fn from_fault(fault: anyhow::Error) -> Self {
        Outcome::InternalError {
            error: fault.to_string(),
            fault: Some(Arc::new(fault)),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Outcome::Success(_) => Status::Success,
            Outcome::Invalid(_) => Status::Invalid,
            Outcome::DomainError(_) => Status::DomainError,
            Outcome::NotFound => Status::NotFound,
            Outcome::Cancelled => Status::Cancelled,
            Outcome::InternalError { .. } => Status::InternalError,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Error message for `DomainError` and `InternalError`
    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::DomainError(error) | Outcome::InternalError { error, .. } => {
                Some(error.as_str())
            }
            _ => None,
        }
    }

    /// Captured fault, if the internal error came from one
    pub fn fault(&self) -> Option<&anyhow::Error> {
        match self {
            Outcome::InternalError { fault, .. } => fault.as_deref(),
            _ => None,
        }
    }

    pub fn validation_state(&self) -> Option<&ValidationState> {
        match self {
            Outcome::Invalid(state) => Some(state),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Transform the success value, keeping any failure as is
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Invalid(state) => Outcome::Invalid(state),
            Outcome::DomainError(error) => Outcome::DomainError(error),
            Outcome::NotFound => Outcome::NotFound,
            Outcome::Cancelled => Outcome::Cancelled,
            Outcome::InternalError { error, fault } => Outcome::InternalError { error, fault },
        }
    }
}

// Fault detail is diagnostic only and does not take part in equality.
impl<T: PartialEq> PartialEq for Outcome<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Outcome::Success(a), Outcome::Success(b)) => a == b,
            (Outcome::Invalid(a), Outcome::Invalid(b)) => a == b,
            (Outcome::DomainError(a), Outcome::DomainError(b)) => a == b,
            (Outcome::NotFound, Outcome::NotFound) => true,
            (Outcome::Cancelled, Outcome::Cancelled) => true,
            (Outcome::InternalError { error: a, .. }, Outcome::InternalError { error: b, .. }) => {
                a == b
            }
            _ => false,
        }
    }
}
