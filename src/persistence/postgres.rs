//! PostgreSQL Unit of Work
//!
//! Stages write statements and persists them on `save_changes`, either in
//! a short transaction of its own or inside one opened by
//! `begin_transaction`. A failed save outside a transaction leaves its
//! changes staged.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{StagingUnitOfWork, Transaction, TransactionalUnitOfWork, UnitOfWork};
use crate::error::PersistenceError;

type TransactionSlot = Arc<Mutex<Option<sqlx::Transaction<'static, Postgres>>>>;

/// Bind parameter for a staged statement
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Bool(bool),
    Int(i64),
    Uuid(Uuid),
    Null,
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Bool(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

impl From<Uuid> for Param {
    fn from(value: Uuid) -> Self {
        Param::Uuid(value)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Param::Null)
    }
}

/// A write statement waiting for `save_changes`
#[derive(Debug, Clone)]
pub struct PendingChange {
    statement: String,
    params: Vec<Param>,
}

impl PendingChange {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            params: Vec::new(),
        }
    }

    /// Bind the next positional parameter
    pub fn bind(mut self, param: impl Into<Param>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    fn query(&self) -> Query<'_, Postgres, PgArguments> {
        self.params
            .iter()
            .fold(sqlx::query(&self.statement), |query, param| match param {
                Param::Text(value) => query.bind(value.as_str()),
                Param::Bool(value) => query.bind(*value),
                Param::Int(value) => query.bind(*value),
                Param::Uuid(value) => query.bind(*value),
                Param::Null => query.bind(None::<String>),
            })
    }
}

/// Unit of work over a PostgreSQL pool.
///
/// One instance per request scope; it must not be shared between
/// concurrent pipeline invocations.
pub struct PgUnitOfWork {
    pool: PgPool,
    pending: Mutex<Vec<PendingChange>>,
    transaction: TransactionSlot,
}

impl PgUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            pending: Mutex::new(Vec::new()),
            transaction: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn in_transaction(&self) -> bool {
        self.transaction.lock().await.is_some()
    }

    /// Single save outside a transaction, atomic on its own
    async fn save_atomically(
        &self,
        token: &CancellationToken,
        changes: &[PendingChange],
    ) -> Result<u64, PersistenceError> {
        let mut tx = cancellable(token, self.pool.begin()).await?;
        let affected = cancellable(token, execute_all(&mut *tx, changes)).await?;
        tx.commit().await?;
        Ok(affected)
    }

    /// Put back changes from a failed save, ahead of any staged since
    async fn restore(&self, mut changes: Vec<PendingChange>) {
        let mut pending = self.pending.lock().await;
        changes.append(&mut pending);
        *pending = changes;
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn save_changes(&self, token: &CancellationToken) -> Result<u64, PersistenceError> {
        if token.is_cancelled() {
            return Err(PersistenceError::Cancelled);
        }

        let changes = std::mem::take(&mut *self.pending.lock().await);
        if changes.is_empty() {
            return Ok(0);
        }

        let mut slot = self.transaction.lock().await;
        let affected = match slot.as_mut() {
            // The owner of the open transaction rolls back on failure
            Some(tx) => cancellable(token, execute_all(&mut **tx, &changes)).await?,
            None => {
                let saved = self.save_atomically(token, &changes).await;
                match saved {
                    Ok(affected) => affected,
                    Err(e) => {
                        self.restore(changes).await;
                        return Err(e);
                    }
                }
            }
        };

        tracing::debug!(
            statements = changes.len(),
            affected,
            "Saved {} pending change(s)",
            changes.len()
        );

        Ok(affected)
    }
}

#[async_trait]
impl StagingUnitOfWork for PgUnitOfWork {
    async fn stage(&self, change: PendingChange) {
        self.pending.lock().await.push(change);
    }

    async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[async_trait]
impl TransactionalUnitOfWork for PgUnitOfWork {
    async fn begin_transaction(
        &self,
        token: &CancellationToken,
    ) -> Result<Box<dyn Transaction>, PersistenceError> {
        let mut slot = self.transaction.lock().await;
        if slot.is_some() {
            return Err(PersistenceError::Store(
                "A transaction is already active for this unit of work".to_string(),
            ));
        }

        *slot = Some(cancellable(token, self.pool.begin()).await?);

        Ok(Box::new(PgTransaction {
            slot: Arc::clone(&self.transaction),
        }))
    }
}

/// Handle to the transaction opened by `PgUnitOfWork::begin_transaction`
pub struct PgTransaction {
    slot: TransactionSlot,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(&mut self, token: &CancellationToken) -> Result<(), PersistenceError> {
        // A commit already sent to the server is left to finish
        if token.is_cancelled() {
            return Err(PersistenceError::Cancelled);
        }

        let tx = self
            .slot
            .lock()
            .await
            .take()
            .ok_or(PersistenceError::TransactionClosed)?;

        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), PersistenceError> {
        let tx = self
            .slot
            .lock()
            .await
            .take()
            .ok_or(PersistenceError::TransactionClosed)?;

        tx.rollback().await?;
        Ok(())
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        // Dropping the sqlx transaction queues a rollback on its connection
        if let Ok(mut slot) = self.slot.try_lock() {
            if slot.take().is_some() {
                tracing::debug!("Transaction released without commit or rollback");
            }
        }
    }
}

async fn execute_all(
    conn: &mut PgConnection,
    changes: &[PendingChange],
) -> Result<u64, sqlx::Error> {
    let mut affected = 0;
    for change in changes {
        affected += change.query().execute(&mut *conn).await?.rows_affected();
    }
    Ok(affected)
}

async fn cancellable<T, F>(token: &CancellationToken, fut: F) -> Result<T, PersistenceError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(PersistenceError::Cancelled),
        result = fut => result.map_err(PersistenceError::from),
    }
}
