//! Get User Info Handler

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::HandlerError;
use crate::outcome::Outcome;
use crate::pipeline::{Pipeline, QueryHandler, QueryPipeline};
use crate::registry::{HandlerRegistry, PipelineShape, RegisterHandler};

use super::{GetUserInfoRequest, IdentityState, UserInfo, UserManager};

/// Capability: describe the current user
#[async_trait]
pub trait GetUserInfo: Send + Sync {
    async fn user_info(&self, token: &CancellationToken) -> Outcome<UserInfo>;
}

pub struct GetUserInfoHandler {
    users: Arc<dyn UserManager>,
    current_user: Option<Uuid>,
}

impl GetUserInfoHandler {
    pub fn new(users: Arc<dyn UserManager>, current_user: Option<Uuid>) -> Self {
        Self {
            users,
            current_user,
        }
    }
}

#[async_trait]
impl QueryHandler for GetUserInfoHandler {
    type Request = GetUserInfoRequest;
    type Output = UserInfo;

    fn name(&self) -> &'static str {
        "Get User Info"
    }

    async fn handle(
        &self,
        _request: GetUserInfoRequest,
        _token: &CancellationToken,
    ) -> Result<Outcome<UserInfo>, HandlerError> {
        let Some(user_id) = self.current_user else {
            return Ok(Outcome::not_found());
        };

        Ok(match self.users.find_by_id(user_id).await? {
            Some(user) => Outcome::success(UserInfo {
                username: user.username,
                is_account_confirmed: user.email_confirmed,
            }),
            None => Outcome::not_found(),
        })
    }
}

#[async_trait]
impl GetUserInfo for QueryPipeline<GetUserInfoHandler> {
    async fn user_info(&self, token: &CancellationToken) -> Outcome<UserInfo> {
        self.execute(GetUserInfoRequest, token).await
    }
}

impl RegisterHandler<IdentityState> for GetUserInfoHandler {
    fn register(registry: &mut HandlerRegistry<IdentityState>) {
        registry.register::<dyn GetUserInfo, _>(PipelineShape::Query, |scope| {
            let state = scope.state();
            let pipeline: Arc<dyn GetUserInfo> =
                Arc::new(QueryPipeline::new(GetUserInfoHandler::new(
                    Arc::clone(&state.users),
                    state.current_user,
                )));
            pipeline
        });
    }
}
