//! Login Handler

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::outcome::{Outcome, ValidationState};
use crate::pipeline::{CommandHandler, CommandPipeline, Pipeline};
use crate::registry::{HandlerRegistry, PipelineShape, RegisterHandler};

use super::{IdentityOptions, IdentityState, LoginRequest, SignInManager, UserManager};

/// Capability: sign in with a password
#[async_trait]
pub trait Login: Send + Sync {
    async fn login(&self, username: String, password: String, token: &CancellationToken)
        -> Outcome;
}

pub struct LoginHandler {
    users: Arc<dyn UserManager>,
    sign_in: Arc<dyn SignInManager>,
    options: IdentityOptions,
}

impl LoginHandler {
    pub fn new(
        users: Arc<dyn UserManager>,
        sign_in: Arc<dyn SignInManager>,
        options: IdentityOptions,
    ) -> Self {
        Self {
            users,
            sign_in,
            options,
        }
    }
}

#[async_trait]
impl CommandHandler for LoginHandler {
    type Request = LoginRequest;
    type Output = ();

    fn name(&self) -> &'static str {
        "Login"
    }

    fn validate(&self, state: &mut ValidationState, request: &LoginRequest) {
        state.require_not_blank("Username", &request.username);
        state.require_not_blank("Password", &request.password);
    }

    async fn handle(
        &self,
        request: LoginRequest,
        _token: &CancellationToken,
    ) -> Result<Outcome, HandlerError> {
        let Some(user) = self.users.find_by_name(&request.username).await? else {
            return Ok(Outcome::domain_error("User not found."));
        };

        if self.options.require_confirmed_account && !self.users.is_email_confirmed(&user).await? {
            return Ok(Outcome::domain_error("User not confirmed."));
        }

        Ok(self
            .sign_in
            .password_sign_in(&request.username, &request.password)
            .await?)
    }
}

#[async_trait]
impl Login for CommandPipeline<LoginHandler> {
    async fn login(
        &self,
        username: String,
        password: String,
        token: &CancellationToken,
    ) -> Outcome {
        self.execute(LoginRequest::new(username, password), token).await
    }
}

impl RegisterHandler<IdentityState> for LoginHandler {
    fn register(registry: &mut HandlerRegistry<IdentityState>) {
        registry.register::<dyn Login, _>(PipelineShape::Command, |scope| {
            let services = &scope.state().services;
            let pipeline: Arc<dyn Login> = Arc::new(CommandPipeline::new(LoginHandler::new(
                Arc::clone(&scope.state().users),
                Arc::clone(&services.sign_in),
                services.options.clone(),
            )));
            pipeline
        });
    }
}
