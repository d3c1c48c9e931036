//! Persistence module
//!
//! Capabilities the pipelines need from a persistence provider, and the
//! PostgreSQL provider built on sqlx.

mod postgres;

pub use postgres::{Param, PendingChange, PgTransaction, PgUnitOfWork};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::PersistenceError;

/// Persists a batch of pending changes
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Write all pending changes, returning the number of records changed
    async fn save_changes(&self, token: &CancellationToken) -> Result<u64, PersistenceError>;
}

/// Unit of work that can open an explicit transaction boundary
#[async_trait]
pub trait TransactionalUnitOfWork: UnitOfWork {
    async fn begin_transaction(
        &self,
        token: &CancellationToken,
    ) -> Result<Box<dyn Transaction>, PersistenceError>;
}

/// Transactional unit of work that collects the writes of one request
#[async_trait]
pub trait StagingUnitOfWork: TransactionalUnitOfWork {
    /// Queue a change for the next `save_changes`
    async fn stage(&self, change: PendingChange);

    async fn pending_count(&self) -> usize;
}

/// Scoped transaction handle.
///
/// Dropping the handle releases it. A handle dropped without `commit` or
/// `rollback` leaves the store to roll back.
#[async_trait]
pub trait Transaction: Send {
    async fn commit(&mut self, token: &CancellationToken) -> Result<(), PersistenceError>;

    /// Not cancellable: a cancelled request must still be able to roll back
    async fn rollback(&mut self) -> Result<(), PersistenceError>;
}
