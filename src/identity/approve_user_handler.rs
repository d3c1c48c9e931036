//! Approve User Handler
//!
//! Confirms a user's account and grants the approved role. Changes are
//! persisted through the scope's unit of work.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::HandlerError;
use crate::outcome::Outcome;
use crate::persistence::UnitOfWork;
use crate::pipeline::{CommandHandler, Pipeline, UnitOfWorkPipeline};
use crate::registry::{HandlerRegistry, PipelineShape, RegisterHandler};

use super::{ApproveUserRequest, IdentityState, UserManager, APPROVED_USER_ROLE};

/// Capability: approve a pending user
#[async_trait]
pub trait ApproveUser: Send + Sync {
    async fn approve(&self, user_id: Uuid, token: &CancellationToken) -> Outcome;
}

pub struct ApproveUserHandler {
    users: Arc<dyn UserManager>,
}

impl ApproveUserHandler {
    pub fn new(users: Arc<dyn UserManager>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl CommandHandler for ApproveUserHandler {
    type Request = ApproveUserRequest;
    type Output = ();

    fn name(&self) -> &'static str {
        "Approve User"
    }

    async fn handle(
        &self,
        request: ApproveUserRequest,
        _token: &CancellationToken,
    ) -> Result<Outcome, HandlerError> {
        let Some(mut user) = self.users.find_by_id(request.user_id).await? else {
            return Ok(Outcome::domain_error("User not found"));
        };

        user.email_confirmed = true;

        let granted = self.users.add_to_role(&user, APPROVED_USER_ROLE).await?;
        if !granted.is_success() {
            return Ok(granted);
        }

        Ok(self.users.update(&user).await?)
    }
}

#[async_trait]
impl<U> ApproveUser for UnitOfWorkPipeline<ApproveUserHandler, U>
where
    U: UnitOfWork + ?Sized + 'static,
{
    async fn approve(&self, user_id: Uuid, token: &CancellationToken) -> Outcome {
        self.execute(ApproveUserRequest::new(user_id), token).await
    }
}

impl RegisterHandler<IdentityState> for ApproveUserHandler {
    fn register(registry: &mut HandlerRegistry<IdentityState>) {
        registry.register::<dyn ApproveUser, _>(PipelineShape::UnitOfWork, |scope| {
            let state = scope.state();
            let pipeline: Arc<dyn ApproveUser> = Arc::new(UnitOfWorkPipeline::new(
                ApproveUserHandler::new(Arc::clone(&state.users)),
                Arc::clone(&state.unit_of_work),
            ));
            pipeline
        });
    }
}
