//! Identity module
//!
//! User registration, sign-in and account management operations, each
//! exposed as a capability trait and resolved from a request scope.

mod approve_user_handler;
mod change_password_handler;
mod login_handler;
mod logout_handler;
mod postgres;
mod provider;
mod register_handler;
mod requests;
mod user_info_handler;

pub use approve_user_handler::{ApproveUser, ApproveUserHandler};
pub use change_password_handler::{ChangePassword, ChangePasswordHandler};
pub use login_handler::{Login, LoginHandler};
pub use logout_handler::{Logout, LogoutHandler};
pub use postgres::{
    hash_password, verify_password, PgSignInManager, PgUserManager, PgUserManagerFactory,
    IDENTITY_SCHEMA, MIN_PASSWORD_LENGTH,
};
pub use provider::{
    ApplicationUser, IdentityOptions, SignInManager, UserManager, UserManagerFactory,
    APPROVED_USER_ROLE,
};
pub use register_handler::{RegisterNewUser, RegisterNewUserHandler};
pub use requests::*;
pub use user_info_handler::{GetUserInfo, GetUserInfoHandler};

use std::sync::Arc;

use uuid::Uuid;

use crate::persistence::StagingUnitOfWork;
use crate::registry::HandlerRegistry;

/// Identity provider services shared across requests
#[derive(Clone)]
pub struct IdentityServices {
    pub user_managers: Arc<dyn UserManagerFactory>,
    pub sign_in: Arc<dyn SignInManager>,
    pub options: IdentityOptions,
}

impl IdentityServices {
    pub fn new(
        user_managers: Arc<dyn UserManagerFactory>,
        sign_in: Arc<dyn SignInManager>,
        options: IdentityOptions,
    ) -> Self {
        Self {
            user_managers,
            sign_in,
            options,
        }
    }
}

/// State carried by an identity request scope
#[derive(Clone)]
pub struct IdentityState {
    pub services: IdentityServices,
    /// Unit of work for this request only
    pub unit_of_work: Arc<dyn StagingUnitOfWork>,
    /// User manager staging its writes on `unit_of_work`
    pub users: Arc<dyn UserManager>,
    /// Authenticated user, if any
    pub current_user: Option<Uuid>,
}

impl IdentityState {
    pub fn new(services: IdentityServices, unit_of_work: Arc<dyn StagingUnitOfWork>) -> Self {
        let users = services.user_managers.scoped(Arc::clone(&unit_of_work));

        Self {
            services,
            unit_of_work,
            users,
            current_user: None,
        }
    }

    pub fn with_current_user(mut self, user_id: Uuid) -> Self {
        self.current_user = Some(user_id);
        self
    }
}

/// Add every identity handler to `registry`
pub fn register_handlers(registry: &mut HandlerRegistry<IdentityState>) {
    registry
        .add::<RegisterNewUserHandler>()
        .add::<LoginHandler>()
        .add::<LogoutHandler>()
        .add::<ChangePasswordHandler>()
        .add::<ApproveUserHandler>()
        .add::<GetUserInfoHandler>();

    tracing::debug!(
        commands = registry.commands().len(),
        queries = registry.queries().len(),
        "Identity handlers registered"
    );
}

/// Registry holding every identity handler
pub fn handler_registry() -> HandlerRegistry<IdentityState> {
    let mut registry = HandlerRegistry::new();
    register_handlers(&mut registry);
    registry
}
