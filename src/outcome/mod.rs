//! Outcome module
//!
//! Uniform outcome model returned by every command and query pipeline.

pub mod response;
pub mod result;
pub mod validation;

pub use response::{ErrorResponse, ValidationProblem};
pub use result::{Outcome, Status};
pub use validation::ValidationState;
