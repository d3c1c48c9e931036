//! Operation Execution
//!
//! The validate -> cancellation check -> execute -> fault translation
//! sequence shared by commands and queries.

use std::fmt;
use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::outcome::{Outcome, ValidationState};

/// Label used in log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Command,
    Query,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Command => write!(f, "Command"),
            OperationKind::Query => write!(f, "Query"),
        }
    }
}

/// Run one operation through the pipeline.
///
/// The logic is only invoked for a valid request with a live token. Its
/// cancellation and faults come back as `Cancelled` and `InternalError`.
pub async fn execute_operation<Req, T, V, L, Fut>(
    kind: OperationKind,
    name: &str,
    request: Req,
    token: &CancellationToken,
    validate: V,
    logic: L,
) -> Outcome<T>
where
    V: FnOnce(&mut ValidationState, &Req),
    L: FnOnce(Req) -> Fut,
    Fut: Future<Output = Result<Outcome<T>, HandlerError>>,
{
    let mut validation_state = ValidationState::new();

    validate(&mut validation_state, &request);

    if validation_state.has_errors() {
        tracing::error!(
            operation = name,
            "{} '{}' failed validation: {}",
            kind,
            name,
            validation_state
        );
        return Outcome::invalid(validation_state);
    }

    if token.is_cancelled() {
        tracing::info!(operation = name, "{} '{}' was cancelled before execution.", kind, name);
        return Outcome::cancelled();
    }

    match logic(request).await {
        Ok(outcome) => outcome,
        Err(HandlerError::Cancelled) => {
            tracing::info!(operation = name, "{} '{}' was cancelled during execution.", kind, name);
            Outcome::cancelled()
        }
        Err(HandlerError::Fault(fault)) => {
            tracing::error!(
                operation = name,
                severity = "critical",
                "{} '{}' failed with exception: {}",
                kind,
                name,
                fault
            );
            Outcome::from_fault(fault)
        }
    }
}
