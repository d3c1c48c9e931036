//! Command Pipeline
//!
//! Runs a mutating operation: validate, check cancellation, execute, and
//! translate faults. Unit and value-returning commands share this one
//! implementation through `CommandHandler::Output`.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::execution::{execute_operation, OperationKind};
use super::Pipeline;
use crate::error::HandlerError;
use crate::outcome::{Outcome, ValidationState};

/// Operation-specific logic for a command
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    type Request: Send + 'static;
    /// `()` for commands that only report success or failure
    type Output: Send + 'static;

    /// Name used in log events
    fn name(&self) -> &'static str;

    /// Add field errors for an invalid request. Accepts everything by default.
    fn validate(&self, _state: &mut ValidationState, _request: &Self::Request) {}

    /// Number of records a successful command must persist.
    /// `None` disables the check. Only the persisting pipelines read it.
    fn expected_changes(&self) -> Option<u64> {
        None
    }

    async fn handle(
        &self,
        request: Self::Request,
        token: &CancellationToken,
    ) -> Result<Outcome<Self::Output>, HandlerError>;
}

/// Plain command pipeline
pub struct CommandPipeline<H> {
    handler: H,
}

impl<H: CommandHandler> CommandPipeline<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

#[async_trait]
impl<H: CommandHandler> Pipeline for CommandPipeline<H> {
    type Request = H::Request;
    type Output = H::Output;

    async fn execute(
        &self,
        request: Self::Request,
        token: &CancellationToken,
    ) -> Outcome<Self::Output> {
        execute_operation(
            OperationKind::Command,
            self.handler.name(),
            request,
            token,
            |state, request| self.handler.validate(state, request),
            |request| self.handler.handle(request, token),
        )
        .await
    }
}
