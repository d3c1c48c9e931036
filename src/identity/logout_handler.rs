//! Logout Handler

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::outcome::Outcome;
use crate::pipeline::{CommandHandler, CommandPipeline, Pipeline};
use crate::registry::{HandlerRegistry, PipelineShape, RegisterHandler};

use super::{IdentityState, LogoutRequest, SignInManager};

/// Capability: sign out
#[async_trait]
pub trait Logout: Send + Sync {
    async fn logout(&self, token: &CancellationToken) -> Outcome;
}

pub struct LogoutHandler {
    sign_in: Arc<dyn SignInManager>,
}

impl LogoutHandler {
    pub fn new(sign_in: Arc<dyn SignInManager>) -> Self {
        Self { sign_in }
    }
}

#[async_trait]
impl CommandHandler for LogoutHandler {
    type Request = LogoutRequest;
    type Output = ();

    fn name(&self) -> &'static str {
        "Logout"
    }

    async fn handle(
        &self,
        _request: LogoutRequest,
        _token: &CancellationToken,
    ) -> Result<Outcome, HandlerError> {
        self.sign_in.sign_out().await?;
        Ok(Outcome::ok())
    }
}

#[async_trait]
impl Logout for CommandPipeline<LogoutHandler> {
    async fn logout(&self, token: &CancellationToken) -> Outcome {
        self.execute(LogoutRequest, token).await
    }
}

impl RegisterHandler<IdentityState> for LogoutHandler {
    fn register(registry: &mut HandlerRegistry<IdentityState>) {
        registry.register::<dyn Logout, _>(PipelineShape::Command, |scope| {
            let pipeline: Arc<dyn Logout> = Arc::new(CommandPipeline::new(LogoutHandler::new(
                Arc::clone(&scope.state().services.sign_in),
            )));
            pipeline
        });
    }
}
