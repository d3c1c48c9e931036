//! identity_core Library
//!
//! Command and query execution pipelines for the identity service:
//! validation, cancellation, fault handling and persistence integrity
//! checks, plus the identity operations built on them.

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod outcome;
pub mod persistence;
pub mod pipeline;
pub mod registry;
pub mod telemetry;

pub use config::{Config, ConfigError};
pub use error::{HandlerError, PersistenceError};
pub use outcome::{Outcome, Status, ValidationState};
pub use pipeline::{
    CommandHandler, CommandPipeline, Pipeline, QueryHandler, QueryPipeline, TransactionPipeline,
    UnitOfWorkPipeline,
};
pub use registry::{HandlerRegistry, RequestScope};
