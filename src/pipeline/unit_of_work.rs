//! Unit of Work Pipeline
//!
//! Persists pending changes after a successful command, outside any
//! explicit transaction, and checks the changed-record count.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::command::{CommandHandler, CommandPipeline};
use super::Pipeline;
use crate::error::PersistenceError;
use crate::outcome::Outcome;
use crate::persistence::UnitOfWork;

pub const UNEXPECTED_CHANGES: &str = "Unexpected number of changes saved.";

pub struct UnitOfWorkPipeline<H, U: ?Sized = dyn UnitOfWork> {
    inner: CommandPipeline<H>,
    unit_of_work: Arc<U>,
}

impl<H: CommandHandler, U: UnitOfWork + ?Sized> UnitOfWorkPipeline<H, U> {
    pub fn new(handler: H, unit_of_work: Arc<U>) -> Self {
        Self {
            inner: CommandPipeline::new(handler),
            unit_of_work,
        }
    }

    pub fn handler(&self) -> &H {
        self.inner.handler()
    }
}

#[async_trait]
impl<H, U> Pipeline for UnitOfWorkPipeline<H, U>
where
    H: CommandHandler,
    U: UnitOfWork + ?Sized + 'static,
{
    type Request = H::Request;
    type Output = H::Output;

    async fn execute(
        &self,
        request: Self::Request,
        token: &CancellationToken,
    ) -> Outcome<Self::Output> {
        let outcome = self.inner.execute(request, token).await;

        if !outcome.is_success() {
            return outcome;
        }

        let name = self.handler().name();

        match self.unit_of_work.save_changes(token).await {
            Ok(actual) => match self.handler().expected_changes() {
                Some(expected) if expected != actual => {
                    tracing::error!(
                        command = name,
                        expected,
                        actual,
                        "Command '{}' made an unexpected number of changes: Expected '{}', Actual '{}'.",
                        name,
                        expected,
                        actual
                    );
                    Outcome::internal_error(UNEXPECTED_CHANGES)
                }
                _ => outcome,
            },
            Err(PersistenceError::Cancelled) => {
                tracing::info!(command = name, "Command '{}' was cancelled while saving changes.", name);
                Outcome::cancelled()
            }
            Err(e) => {
                tracing::error!(
                    command = name,
                    severity = "critical",
                    "Command '{}' failed while saving changes, with exception: {}",
                    name,
                    e
                );
                Outcome::from_fault(e.into())
            }
        }
    }
}
