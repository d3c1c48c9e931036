//! Query Pipeline
//!
//! Runs a read-only operation through the same sequence as commands.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::execution::{execute_operation, OperationKind};
use super::Pipeline;
use crate::error::HandlerError;
use crate::outcome::{Outcome, ValidationState};

/// Operation-specific logic for a query
#[async_trait]
pub trait QueryHandler: Send + Sync + 'static {
    type Request: Send + 'static;
    type Output: Send + 'static;

    fn name(&self) -> &'static str;

    fn validate(&self, _state: &mut ValidationState, _request: &Self::Request) {}

    async fn handle(
        &self,
        request: Self::Request,
        token: &CancellationToken,
    ) -> Result<Outcome<Self::Output>, HandlerError>;
}

pub struct QueryPipeline<H> {
    handler: H,
}

impl<H: QueryHandler> QueryPipeline<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

#[async_trait]
impl<H: QueryHandler> Pipeline for QueryPipeline<H> {
    type Request = H::Request;
    type Output = H::Output;

    async fn execute(
        &self,
        request: Self::Request,
        token: &CancellationToken,
    ) -> Outcome<Self::Output> {
        execute_operation(
            OperationKind::Query,
            self.handler.name(),
            request,
            token,
            |state, request| self.handler.validate(state, request),
            |request| self.handler.handle(request, token),
        )
        .await
    }
}
