//! Register New User Handler
//!
//! Creates a user account inside a transaction. A rejection from the user
//! manager, such as a taken username or a weak password, is a domain error.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::outcome::{Outcome, ValidationState};
use crate::pipeline::{CommandHandler, Pipeline, TransactionPipeline};
use crate::persistence::TransactionalUnitOfWork;
use crate::registry::{HandlerRegistry, PipelineShape, RegisterHandler};

use super::{ApplicationUser, IdentityState, RegisterNewUserRequest, UserManager};

/// Capability: register a new user
#[async_trait]
pub trait RegisterNewUser: Send + Sync {
    async fn register(
        &self,
        username: String,
        password: String,
        token: &CancellationToken,
    ) -> Outcome;
}

pub struct RegisterNewUserHandler {
    users: Arc<dyn UserManager>,
}

impl RegisterNewUserHandler {
    pub fn new(users: Arc<dyn UserManager>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl CommandHandler for RegisterNewUserHandler {
    type Request = RegisterNewUserRequest;
    type Output = ();

    fn name(&self) -> &'static str {
        "Register New User"
    }

    fn validate(&self, state: &mut ValidationState, request: &RegisterNewUserRequest) {
        state.require_not_blank("Username", &request.username);
        state.require_not_blank("Password", &request.password);
    }

    async fn handle(
        &self,
        request: RegisterNewUserRequest,
        token: &CancellationToken,
    ) -> Result<Outcome, HandlerError> {
        if token.is_cancelled() {
            return Err(HandlerError::Cancelled);
        }

        let user = ApplicationUser::new(request.username);
        let created = self.users.create(&user, &request.password).await?;

        if !created.is_success() {
            let reason = match created.validation_state() {
                Some(state) => state.to_string(),
                None => created
                    .error()
                    .unwrap_or("User could not be created.")
                    .to_string(),
            };
            return Ok(Outcome::domain_error(reason));
        }

        tracing::info!(user_id = %user.id, "Registered user '{}'", user.username);
        Ok(Outcome::ok())
    }
}

#[async_trait]
impl<U> RegisterNewUser for TransactionPipeline<RegisterNewUserHandler, U>
where
    U: TransactionalUnitOfWork + ?Sized + 'static,
{
    async fn register(
        &self,
        username: String,
        password: String,
        token: &CancellationToken,
    ) -> Outcome {
        self.execute(RegisterNewUserRequest::new(username, password), token)
            .await
    }
}

impl RegisterHandler<IdentityState> for RegisterNewUserHandler {
    fn register(registry: &mut HandlerRegistry<IdentityState>) {
        registry.register::<dyn RegisterNewUser, _>(PipelineShape::Transactional, |scope| {
            let state = scope.state();
            let pipeline: Arc<dyn RegisterNewUser> = Arc::new(TransactionPipeline::new(
                RegisterNewUserHandler::new(Arc::clone(&state.users)),
                Arc::clone(&state.unit_of_work),
            ));
            pipeline
        });
    }
}
