//! Pipeline module
//!
//! Command and query execution pipelines. The unit-of-work and
//! transactional pipelines wrap a `CommandPipeline` and add persistence.

mod command;
mod execution;
mod query;
mod transaction;
mod unit_of_work;

pub use command::{CommandHandler, CommandPipeline};
pub use execution::{execute_operation, OperationKind};
pub use query::{QueryHandler, QueryPipeline};
pub use transaction::{TransactionPipeline, INTEGRITY_CHECK_FAILED};
pub use unit_of_work::{UnitOfWorkPipeline, UNEXPECTED_CHANGES};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::outcome::Outcome;

/// Entry point shared by every pipeline shape
#[async_trait]
pub trait Pipeline: Send + Sync {
    type Request: Send + 'static;
    type Output: Send + 'static;

    /// Validate and run the request. Never fails: every fault and
    /// cancellation is reported through the returned outcome.
    async fn execute(
        &self,
        request: Self::Request,
        token: &CancellationToken,
    ) -> Outcome<Self::Output>;
}
