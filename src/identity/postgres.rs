//! PostgreSQL Identity Provider
//!
//! Reads go straight to the pool. Writes are staged as `PendingChange`s on
//! the request's unit of work, so they commit or roll back with the
//! pipeline that runs the handler.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ApplicationUser, SignInManager, UserManager, UserManagerFactory};
use crate::outcome::{Outcome, ValidationState};
use crate::persistence::{PendingChange, StagingUnitOfWork};

/// Shortest password the provider accepts
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Tables used by the provider, one statement per entry
pub const IDENTITY_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS identity_users (
        id UUID PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        email_confirmed BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS identity_user_roles (
        user_id UUID NOT NULL REFERENCES identity_users (id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        PRIMARY KEY (user_id, role)
    )
    "#,
];

type UserRow = (Uuid, String, bool);

/// Salted SHA-256 hash, stored as `salt$digest`
pub fn hash_password(password: &str) -> String {
    let salt = hex::encode(rand::random::<[u8; 16]>());
    let digest = digest(&salt, password);
    format!("{}${}", salt, digest)
}

pub fn verify_password(stored: &str, password: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, expected)) => digest(salt, password) == expected,
        None => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn check_password_policy(password: &str) -> Option<Outcome> {
    if password.chars().count() >= MIN_PASSWORD_LENGTH {
        return None;
    }

    let mut state = ValidationState::new();
    state.add_error(
        "Password",
        format!("Passwords must be at least {} characters.", MIN_PASSWORD_LENGTH),
    );
    Some(Outcome::invalid(state))
}

fn to_user((id, username, email_confirmed): UserRow) -> ApplicationUser {
    ApplicationUser {
        id,
        username,
        email_confirmed,
    }
}

/// Builds a `PgUserManager` per request scope
#[derive(Clone)]
pub struct PgUserManagerFactory {
    pool: PgPool,
}

impl PgUserManagerFactory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UserManagerFactory for PgUserManagerFactory {
    fn scoped(&self, unit_of_work: Arc<dyn StagingUnitOfWork>) -> Arc<dyn UserManager> {
        Arc::new(PgUserManager::new(self.pool.clone(), unit_of_work))
    }
}

pub struct PgUserManager {
    pool: PgPool,
    unit_of_work: Arc<dyn StagingUnitOfWork>,
}

impl PgUserManager {
    pub fn new(pool: PgPool, unit_of_work: Arc<dyn StagingUnitOfWork>) -> Self {
        Self { pool, unit_of_work }
    }

    async fn password_hash(&self, user_id: Uuid) -> anyhow::Result<Option<String>> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM identity_users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hash)
    }
}

#[async_trait]
impl UserManager for PgUserManager {
    async fn find_by_id(&self, user_id: Uuid) -> anyhow::Result<Option<ApplicationUser>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email_confirmed FROM identity_users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(to_user))
    }

    async fn find_by_name(&self, username: &str) -> anyhow::Result<Option<ApplicationUser>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email_confirmed FROM identity_users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(to_user))
    }

    async fn create(&self, user: &ApplicationUser, password: &str) -> anyhow::Result<Outcome> {
        if let Some(rejected) = check_password_policy(password) {
            return Ok(rejected);
        }

        if self.find_by_name(&user.username).await?.is_some() {
            return Ok(Outcome::domain_error(format!(
                "Username '{}' is already taken.",
                user.username
            )));
        }

        self.unit_of_work
            .stage(
                PendingChange::new(
                    r#"
                    INSERT INTO identity_users (id, username, password_hash, email_confirmed)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(user.id)
                .bind(user.username.as_str())
                .bind(hash_password(password))
                .bind(user.email_confirmed),
            )
            .await;

        Ok(Outcome::ok())
    }

    async fn change_password(
        &self,
        user: &ApplicationUser,
        current_password: &str,
        new_password: &str,
    ) -> anyhow::Result<Outcome> {
        let Some(stored) = self.password_hash(user.id).await? else {
            return Ok(Outcome::domain_error("User not found"));
        };

        if !verify_password(&stored, current_password) {
            return Ok(Outcome::domain_error("Incorrect password."));
        }

        if let Some(rejected) = check_password_policy(new_password) {
            return Ok(rejected);
        }

        self.unit_of_work
            .stage(
                PendingChange::new("UPDATE identity_users SET password_hash = $2 WHERE id = $1")
                    .bind(user.id)
                    .bind(hash_password(new_password)),
            )
            .await;

        Ok(Outcome::ok())
    }

    async fn add_to_role(&self, user: &ApplicationUser, role: &str) -> anyhow::Result<Outcome> {
        self.unit_of_work
            .stage(
                PendingChange::new(
                    r#"
                    INSERT INTO identity_user_roles (user_id, role)
                    VALUES ($1, $2)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(user.id)
                .bind(role),
            )
            .await;

        Ok(Outcome::ok())
    }

    async fn update(&self, user: &ApplicationUser) -> anyhow::Result<Outcome> {
        self.unit_of_work
            .stage(
                PendingChange::new(
                    "UPDATE identity_users SET username = $2, email_confirmed = $3 WHERE id = $1",
                )
                .bind(user.id)
                .bind(user.username.as_str())
                .bind(user.email_confirmed),
            )
            .await;

        Ok(Outcome::ok())
    }

    async fn is_email_confirmed(&self, user: &ApplicationUser) -> anyhow::Result<bool> {
        let confirmed: Option<bool> =
            sqlx::query_scalar("SELECT email_confirmed FROM identity_users WHERE id = $1")
                .bind(user.id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(confirmed.unwrap_or(false))
    }
}

/// Password check against `identity_users`. Sessions are the caller's concern.
#[derive(Clone)]
pub struct PgSignInManager {
    pool: PgPool,
}

impl PgSignInManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SignInManager for PgSignInManager {
    async fn password_sign_in(&self, username: &str, password: &str) -> anyhow::Result<Outcome> {
        let stored: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM identity_users WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;

        match stored {
            Some(stored) if verify_password(&stored, password) => {
                tracing::info!("User '{}' signed in", username);
                Ok(Outcome::ok())
            }
            _ => Ok(Outcome::domain_error("Invalid login attempt.")),
        }
    }

    async fn sign_out(&self) -> anyhow::Result<()> {
        tracing::debug!("User signed out");
        Ok(())
    }
}
