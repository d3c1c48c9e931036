//! Transactional Pipeline
//!
//! Runs a command and persists its changes inside one transaction. Once the
//! transaction has begun, every non-success exit rolls it back, and the
//! handle is released on every exit path when it goes out of scope.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::command::{CommandHandler, CommandPipeline};
use super::Pipeline;
use crate::error::PersistenceError;
use crate::outcome::Outcome;
use crate::persistence::{Transaction, TransactionalUnitOfWork};

pub const INTEGRITY_CHECK_FAILED: &str = "Database integrity check failed.";

pub struct TransactionPipeline<H, U: ?Sized = dyn TransactionalUnitOfWork> {
    inner: CommandPipeline<H>,
    unit_of_work: Arc<U>,
}

impl<H: CommandHandler, U: TransactionalUnitOfWork + ?Sized> TransactionPipeline<H, U> {
    pub fn new(handler: H, unit_of_work: Arc<U>) -> Self {
        Self {
            inner: CommandPipeline::new(handler),
            unit_of_work,
        }
    }

    pub fn handler(&self) -> &H {
        self.inner.handler()
    }

    async fn run_in_transaction(
        &self,
        transaction: &mut dyn Transaction,
        request: H::Request,
        token: &CancellationToken,
    ) -> Outcome<H::Output> {
        let name = self.handler().name();
        let outcome = self.inner.execute(request, token).await;

        if !outcome.is_success() {
            roll_back(name, transaction).await;
            return outcome;
        }

        let persisted = match self.unit_of_work.save_changes(token).await {
            Ok(actual) => match self.handler().expected_changes() {
                Some(expected) if expected != actual => {
                    roll_back(name, transaction).await;
                    tracing::error!(
                        command = name,
                        expected,
                        actual,
                        "Command '{}' attempted to persist an unexpected number of changes: Expected '{}', Actual '{}'.",
                        name,
                        expected,
                        actual
                    );
                    return Outcome::internal_error(INTEGRITY_CHECK_FAILED);
                }
                _ => transaction.commit(token).await,
            },
            Err(e) => Err(e),
        };

        match persisted {
            Ok(()) => outcome,
            Err(PersistenceError::Cancelled) => {
                roll_back(name, transaction).await;
                tracing::info!(
                    command = name,
                    "Command '{}' was cancelled while persisting changes.",
                    name
                );
                Outcome::cancelled()
            }
            Err(e) => {
                roll_back(name, transaction).await;
                tracing::error!(
                    command = name,
                    severity = "critical",
                    "Command '{}' experienced a transaction failure: {}",
                    name,
                    e
                );
                Outcome::from_fault(e.into())
            }
        }
    }
}

#[async_trait]
impl<H, U> Pipeline for TransactionPipeline<H, U>
where
    H: CommandHandler,
    U: TransactionalUnitOfWork + ?Sized + 'static,
{
    type Request = H::Request;
    type Output = H::Output;

    async fn execute(
        &self,
        request: Self::Request,
        token: &CancellationToken,
    ) -> Outcome<Self::Output> {
        let name = self.handler().name();

        let mut transaction = match self.unit_of_work.begin_transaction(token).await {
            Ok(transaction) => transaction,
            Err(PersistenceError::Cancelled) => {
                tracing::info!(
                    command = name,
                    "Command '{}' was cancelled before its transaction began.",
                    name
                );
                return Outcome::cancelled();
            }
            Err(e) => {
                tracing::error!(
                    command = name,
                    severity = "critical",
                    "Command '{}' could not begin a transaction: {}",
                    name,
                    e
                );
                return Outcome::from_fault(e.into());
            }
        };

        // `transaction` is dropped, and so released, when this returns
        self.run_in_transaction(transaction.as_mut(), request, token)
            .await
    }
}

/// A failed rollback is logged and the original outcome still returned;
/// releasing the handle leaves the store to discard the work.
async fn roll_back(name: &str, transaction: &mut dyn Transaction) {
    match transaction.rollback().await {
        Ok(()) => {}
        // A failed commit already ended the transaction
        Err(PersistenceError::TransactionClosed) => {
            tracing::debug!(command = name, "Command '{}' has no transaction left to roll back.", name);
        }
        Err(e) => {
            tracing::error!(
                command = name,
                "Command '{}' failed to roll back its transaction: {}",
                name,
                e
            );
        }
    }
}
