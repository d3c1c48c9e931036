//! Request definitions
//!
//! One immutable request per identity operation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =========================================================================
// Commands
// =========================================================================

/// Register a new user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterNewUserRequest {
    pub username: String,
    pub password: String,
}

impl RegisterNewUserRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Sign in with a username and password
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Sign out the current session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogoutRequest;

/// Change the current user's password
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

impl ChangePasswordRequest {
    pub fn new(old_password: impl Into<String>, new_password: impl Into<String>) -> Self {
        Self {
            old_password: old_password.into(),
            new_password: new_password.into(),
        }
    }
}

/// Confirm a user and grant the approved role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveUserRequest {
    pub user_id: Uuid,
}

impl ApproveUserRequest {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

// =========================================================================
// Queries
// =========================================================================

/// Look up the current user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetUserInfoRequest;

/// Result of a successful user info lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    pub is_account_confirmed: bool,
}
