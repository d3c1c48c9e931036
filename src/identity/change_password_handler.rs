//! Change Password Handler
//!
//! Changes the password of the user bound to the request scope and saves
//! it through the scope's unit of work.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::HandlerError;
use crate::outcome::{Outcome, ValidationState};
use crate::persistence::UnitOfWork;
use crate::pipeline::{CommandHandler, Pipeline, UnitOfWorkPipeline};
use crate::registry::{HandlerRegistry, PipelineShape, RegisterHandler};

use super::{ChangePasswordRequest, IdentityState, UserManager};

/// Capability: change the current user's password
#[async_trait]
pub trait ChangePassword: Send + Sync {
    async fn change_password(
        &self,
        old_password: String,
        new_password: String,
        token: &CancellationToken,
    ) -> Outcome;
}

pub struct ChangePasswordHandler {
    users: Arc<dyn UserManager>,
    current_user: Option<Uuid>,
}

impl ChangePasswordHandler {
    pub fn new(users: Arc<dyn UserManager>, current_user: Option<Uuid>) -> Self {
        Self {
            users,
            current_user,
        }
    }
}

#[async_trait]
impl CommandHandler for ChangePasswordHandler {
    type Request = ChangePasswordRequest;
    type Output = ();

    fn name(&self) -> &'static str {
        "Change Password"
    }

    fn validate(&self, state: &mut ValidationState, request: &ChangePasswordRequest) {
        state.require_not_blank("OldPassword", &request.old_password);
        state.require_not_blank("NewPassword", &request.new_password);
    }

    async fn handle(
        &self,
        request: ChangePasswordRequest,
        _token: &CancellationToken,
    ) -> Result<Outcome, HandlerError> {
        let Some(user_id) = self.current_user else {
            return Ok(Outcome::domain_error("User not found"));
        };

        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Ok(Outcome::domain_error("User not found"));
        };

        Ok(self
            .users
            .change_password(&user, &request.old_password, &request.new_password)
            .await?)
    }
}

#[async_trait]
impl<U> ChangePassword for UnitOfWorkPipeline<ChangePasswordHandler, U>
where
    U: UnitOfWork + ?Sized + 'static,
{
    async fn change_password(
        &self,
        old_password: String,
        new_password: String,
        token: &CancellationToken,
    ) -> Outcome {
        self.execute(ChangePasswordRequest::new(old_password, new_password), token)
            .await
    }
}

impl RegisterHandler<IdentityState> for ChangePasswordHandler {
    fn register(registry: &mut HandlerRegistry<IdentityState>) {
        registry.register::<dyn ChangePassword, _>(PipelineShape::UnitOfWork, |scope| {
            let state = scope.state();
            let pipeline: Arc<dyn ChangePassword> = Arc::new(UnitOfWorkPipeline::new(
                ChangePasswordHandler::new(Arc::clone(&state.users), state.current_user),
                Arc::clone(&state.unit_of_work),
            ));
            pipeline
        });
    }
}
