//! Identity Provider
//!
//! Capabilities the identity handlers need from an external identity
//! provider. Password hashing, session handling and role storage live
//! behind these traits.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outcome::Outcome;
use crate::persistence::StagingUnitOfWork;

/// Role granted to a user once approved
pub const APPROVED_USER_ROLE: &str = "User";

/// User account as seen by the handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationUser {
    pub id: Uuid,
    pub username: String,
    pub email_confirmed: bool,
}

impl ApplicationUser {
    /// New, unconfirmed user
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email_confirmed: false,
        }
    }
}

/// Sign-in policy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityOptions {
    /// Refuse to sign in users whose account is not confirmed
    pub require_confirmed_account: bool,
}

/// User account store bound to one request.
///
/// Writes are staged on the request's unit of work and reach the database
/// when the pipeline saves. `Err` is a provider fault. A rejected operation
/// (duplicate username, weak password) is reported as a non-success
/// `Outcome` instead.
#[async_trait]
pub trait UserManager: Send + Sync {
    async fn find_by_id(&self, user_id: Uuid) -> anyhow::Result<Option<ApplicationUser>>;

    async fn find_by_name(&self, username: &str) -> anyhow::Result<Option<ApplicationUser>>;

    async fn create(&self, user: &ApplicationUser, password: &str) -> anyhow::Result<Outcome>;

    async fn change_password(
        &self,
        user: &ApplicationUser,
        current_password: &str,
        new_password: &str,
    ) -> anyhow::Result<Outcome>;

    async fn add_to_role(&self, user: &ApplicationUser, role: &str) -> anyhow::Result<Outcome>;

    async fn update(&self, user: &ApplicationUser) -> anyhow::Result<Outcome>;

    async fn is_email_confirmed(&self, user: &ApplicationUser) -> anyhow::Result<bool>;
}

/// Builds the user manager for one request scope
pub trait UserManagerFactory: Send + Sync {
    fn scoped(&self, unit_of_work: Arc<dyn StagingUnitOfWork>) -> Arc<dyn UserManager>;
}

/// Session sign-in and sign-out
#[async_trait]
pub trait SignInManager: Send + Sync {
    async fn password_sign_in(&self, username: &str, password: &str) -> anyhow::Result<Outcome>;

    async fn sign_out(&self) -> anyhow::Result<()>;
}
