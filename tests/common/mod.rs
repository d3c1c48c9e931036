//! Common test utilities
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use identity_core::error::{HandlerError, PersistenceError};
use identity_core::identity::{
    ApplicationUser, SignInManager, UserManager, UserManagerFactory,
};
use identity_core::outcome::{Outcome, ValidationState};
use identity_core::persistence::{
    PendingChange, StagingUnitOfWork, Transaction, TransactionalUnitOfWork, UnitOfWork,
};
use identity_core::pipeline::{CommandHandler, QueryHandler};
use identity_core::{db, telemetry, Config};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Connect the way the service does at startup, then reset the tables
pub async fn setup_test_db() -> PgPool {
    telemetry::init_tracing();

    let config = Config::from_env().expect("DATABASE_URL must be set for tests");
    let pool = db::connect(&config).await.expect("Failed to connect to DB");
    db::verify_connection(&pool)
        .await
        .expect("Database did not answer");
    db::ensure_schema(&pool)
        .await
        .expect("Failed to create identity schema");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS identity_core_test_users (
            id UUID PRIMARY KEY,
            username TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await
    .expect("Failed to create test table");

    sqlx::query("TRUNCATE TABLE identity_core_test_users, identity_user_roles, identity_users")
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    pool
}

// =========================================================================
// Persistence fakes
// =========================================================================

/// Call counts shared between a fake unit of work and its transactions
#[derive(Debug, Default)]
pub struct PersistenceCalls {
    pub staged: AtomicUsize,
    pub save: AtomicUsize,
    pub saved_changes: AtomicUsize,
    pub begin: AtomicUsize,
    pub commit: AtomicUsize,
    pub rollback: AtomicUsize,
    pub release: AtomicUsize,
}

impl PersistenceCalls {
    pub fn staged(&self) -> usize {
        self.staged.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.save.load(Ordering::SeqCst)
    }

    /// Total changes reported by successful saves
    pub fn saved_changes(&self) -> usize {
        self.saved_changes.load(Ordering::SeqCst)
    }

    pub fn begins(&self) -> usize {
        self.begin.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commit.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollback.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.release.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub enum SaveBehaviour {
    /// Report a fixed count regardless of what was staged
    Changes(u64),
    /// Report one change per staged statement
    Staged,
    Cancel,
    Fail(String),
}

#[derive(Debug, Clone)]
enum BeginBehaviour {
    Open,
    Cancel,
    Fail(String),
}

/// Unit of work that records calls instead of touching a database
pub struct FakeUnitOfWork {
    pub calls: Arc<PersistenceCalls>,
    pending: Mutex<Vec<PendingChange>>,
    save: SaveBehaviour,
    begin: BeginBehaviour,
    fail_commit: Option<String>,
    fail_rollback: Option<String>,
}

impl FakeUnitOfWork {
    pub fn saving(changes: u64) -> Self {
        Self::with(SaveBehaviour::Changes(changes))
    }

    pub fn staging() -> Self {
        Self::with(SaveBehaviour::Staged)
    }

    pub fn cancelling() -> Self {
        Self::with(SaveBehaviour::Cancel)
    }

    pub fn failing(message: &str) -> Self {
        Self::with(SaveBehaviour::Fail(message.to_string()))
    }

    pub fn with_failing_begin(mut self, message: &str) -> Self {
        self.begin = BeginBehaviour::Fail(message.to_string());
        self
    }

    pub fn with_cancelled_begin(mut self) -> Self {
        self.begin = BeginBehaviour::Cancel;
        self
    }

    pub fn with_failing_commit(mut self, message: &str) -> Self {
        self.fail_commit = Some(message.to_string());
        self
    }

    pub fn with_failing_rollback(mut self, message: &str) -> Self {
        self.fail_rollback = Some(message.to_string());
        self
    }

    pub fn pending_statements(&self) -> Vec<String> {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .map(|change| change.statement().to_string())
            .collect()
    }

    fn with(save: SaveBehaviour) -> Self {
        Self {
            calls: Arc::new(PersistenceCalls::default()),
            pending: Mutex::new(Vec::new()),
            save,
            begin: BeginBehaviour::Open,
            fail_commit: None,
            fail_rollback: None,
        }
    }
}

#[async_trait]
impl UnitOfWork for FakeUnitOfWork {
    async fn save_changes(&self, _token: &CancellationToken) -> Result<u64, PersistenceError> {
        self.calls.save.fetch_add(1, Ordering::SeqCst);

        let changes = match &self.save {
            SaveBehaviour::Changes(changes) => *changes,
            SaveBehaviour::Staged => std::mem::take(&mut *self.pending.lock().unwrap()).len() as u64,
            SaveBehaviour::Cancel => return Err(PersistenceError::Cancelled),
            SaveBehaviour::Fail(message) => return Err(PersistenceError::Store(message.clone())),
        };

        self.calls
            .saved_changes
            .fetch_add(changes as usize, Ordering::SeqCst);
        Ok(changes)
    }
}

#[async_trait]
impl TransactionalUnitOfWork for FakeUnitOfWork {
    async fn begin_transaction(
        &self,
        _token: &CancellationToken,
    ) -> Result<Box<dyn Transaction>, PersistenceError> {
        self.calls.begin.fetch_add(1, Ordering::SeqCst);

        match &self.begin {
            BeginBehaviour::Open => Ok(Box::new(FakeTransaction {
                calls: Arc::clone(&self.calls),
                fail_commit: self.fail_commit.clone(),
                fail_rollback: self.fail_rollback.clone(),
                ended: false,
            })),
            BeginBehaviour::Cancel => Err(PersistenceError::Cancelled),
            BeginBehaviour::Fail(message) => Err(PersistenceError::Store(message.clone())),
        }
    }
}

#[async_trait]
impl StagingUnitOfWork for FakeUnitOfWork {
    async fn stage(&self, change: PendingChange) {
        self.calls.staged.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().unwrap().push(change);
    }

    async fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

/// Transaction handle. Like a real one, it has ended once a commit was attempted.
pub struct FakeTransaction {
    calls: Arc<PersistenceCalls>,
    fail_commit: Option<String>,
    fail_rollback: Option<String>,
    ended: bool,
}

#[async_trait]
impl Transaction for FakeTransaction {
    async fn commit(&mut self, _token: &CancellationToken) -> Result<(), PersistenceError> {
        self.calls.commit.fetch_add(1, Ordering::SeqCst);
        self.ended = true;

        match &self.fail_commit {
            Some(message) => Err(PersistenceError::Store(message.clone())),
            None => Ok(()),
        }
    }

    async fn rollback(&mut self) -> Result<(), PersistenceError> {
        self.calls.rollback.fetch_add(1, Ordering::SeqCst);

        if self.ended {
            return Err(PersistenceError::TransactionClosed);
        }
        self.ended = true;

        match &self.fail_rollback {
            Some(message) => Err(PersistenceError::Store(message.clone())),
            None => Ok(()),
        }
    }
}

impl Drop for FakeTransaction {
    fn drop(&mut self) {
        self.calls.release.fetch_add(1, Ordering::SeqCst);
    }
}

// =========================================================================
// Handler fakes
// =========================================================================

#[derive(Debug, Clone)]
pub struct TestRequest {
    pub name: String,
}

impl TestRequest {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum HandlerBehaviour {
    Succeed,
    DomainError(String),
    Cancel,
    Fail(String),
}

/// Command handler whose result is fixed up front
pub struct TestCommandHandler<T = ()> {
    pub calls: Arc<AtomicUsize>,
    behaviour: HandlerBehaviour,
    value: T,
    expected_changes: Option<u64>,
}

impl TestCommandHandler {
    pub fn new(behaviour: HandlerBehaviour) -> Self {
        Self::with_value(behaviour, ())
    }

    pub fn succeeding() -> Self {
        Self::new(HandlerBehaviour::Succeed)
    }
}

impl<T> TestCommandHandler<T> {
    pub fn with_value(behaviour: HandlerBehaviour, value: T) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            behaviour,
            value,
            expected_changes: None,
        }
    }

    /// Succeeds with `value`
    pub fn returning(value: T) -> Self {
        Self::with_value(HandlerBehaviour::Succeed, value)
    }

    pub fn with_expected_changes(mut self, expected: u64) -> Self {
        self.expected_changes = Some(expected);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn respond<T>(behaviour: &HandlerBehaviour, value: T) -> Result<Outcome<T>, HandlerError> {
    match behaviour {
        HandlerBehaviour::Succeed => Ok(Outcome::success(value)),
        HandlerBehaviour::DomainError(message) => Ok(Outcome::domain_error(message.clone())),
        HandlerBehaviour::Cancel => Err(HandlerError::Cancelled),
        HandlerBehaviour::Fail(message) => Err(HandlerError::fault(message.clone())),
    }
}

fn require_name(state: &mut ValidationState, request: &TestRequest) {
    state.require_not_blank("Name", &request.name);
}

#[async_trait]
impl<T> CommandHandler for TestCommandHandler<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Request = TestRequest;
    type Output = T;

    fn name(&self) -> &'static str {
        "Test Command"
    }

    fn validate(&self, state: &mut ValidationState, request: &TestRequest) {
        require_name(state, request);
    }

    fn expected_changes(&self) -> Option<u64> {
        self.expected_changes
    }

    async fn handle(
        &self,
        _request: TestRequest,
        _token: &CancellationToken,
    ) -> Result<Outcome<T>, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        respond(&self.behaviour, self.value.clone())
    }
}

/// Query handler echoing the request name
pub struct TestQueryHandler {
    pub calls: Arc<AtomicUsize>,
    behaviour: HandlerBehaviour,
}

impl TestQueryHandler {
    pub fn new(behaviour: HandlerBehaviour) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            behaviour,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryHandler for TestQueryHandler {
    type Request = TestRequest;
    type Output = String;

    fn name(&self) -> &'static str {
        "Test Query"
    }

    fn validate(&self, state: &mut ValidationState, request: &TestRequest) {
        require_name(state, request);
    }

    async fn handle(
        &self,
        request: TestRequest,
        _token: &CancellationToken,
    ) -> Result<Outcome<String>, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        respond(&self.behaviour, format!("Hello, {}", request.name))
    }
}

// =========================================================================
// Identity provider fakes
// =========================================================================

#[derive(Default)]
struct StoredUsers {
    users: HashMap<Uuid, ApplicationUser>,
    passwords: HashMap<Uuid, String>,
    roles: Vec<(Uuid, String)>,
}

/// In-memory user data shared by every scope.
/// Passwords shorter than six characters are rejected.
#[derive(Default)]
pub struct FakeUserStore {
    store: Mutex<StoredUsers>,
    failing: bool,
}

impl FakeUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that reports a fault on every call
    pub fn broken() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn seed(&self, username: &str, password: &str, confirmed: bool) -> ApplicationUser {
        let mut user = ApplicationUser::new(username);
        user.email_confirmed = confirmed;

        let mut store = self.store.lock().unwrap();
        store.users.insert(user.id, user.clone());
        store.passwords.insert(user.id, password.to_string());
        user
    }

    pub fn user(&self, user_id: Uuid) -> Option<ApplicationUser> {
        self.store.lock().unwrap().users.get(&user_id).cloned()
    }

    pub fn user_named(&self, username: &str) -> Option<ApplicationUser> {
        self.store
            .lock()
            .unwrap()
            .users
            .values()
            .find(|user| user.username == username)
            .cloned()
    }

    pub fn roles_of(&self, user_id: Uuid) -> Vec<String> {
        self.store
            .lock()
            .unwrap()
            .roles
            .iter()
            .filter(|(id, _)| *id == user_id)
            .map(|(_, role)| role.clone())
            .collect()
    }

    pub fn password_matches(&self, username: &str, password: &str) -> bool {
        let store = self.store.lock().unwrap();
        store
            .users
            .values()
            .find(|user| user.username == username)
            .and_then(|user| store.passwords.get(&user.id))
            .map_or(false, |stored| stored == password)
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.failing {
            anyhow::bail!("User store unavailable");
        }
        Ok(())
    }
}

/// Hands out managers that record their writes on the scope's unit of work
pub struct FakeUserManagerFactory {
    pub store: Arc<FakeUserStore>,
}

impl UserManagerFactory for FakeUserManagerFactory {
    fn scoped(&self, unit_of_work: Arc<dyn StagingUnitOfWork>) -> Arc<dyn UserManager> {
        Arc::new(FakeUserManager {
            store: Arc::clone(&self.store),
            unit_of_work,
        })
    }
}

/// Applies writes to the shared store and stages one change per write
pub struct FakeUserManager {
    store: Arc<FakeUserStore>,
    unit_of_work: Arc<dyn StagingUnitOfWork>,
}

impl FakeUserManager {
    async fn record(&self, statement: &str, user: &ApplicationUser) {
        self.unit_of_work
            .stage(PendingChange::new(statement).bind(user.id))
            .await;
    }
}

fn weak_password() -> Outcome {
    let mut state = ValidationState::new();
    state.add_error("Password", "Passwords must be at least 6 characters.");
    Outcome::invalid(state)
}

#[async_trait]
impl UserManager for FakeUserManager {
    async fn find_by_id(&self, user_id: Uuid) -> anyhow::Result<Option<ApplicationUser>> {
        self.store.check()?;
        Ok(self.store.user(user_id))
    }

    async fn find_by_name(&self, username: &str) -> anyhow::Result<Option<ApplicationUser>> {
        self.store.check()?;
        Ok(self.store.user_named(username))
    }

    async fn create(&self, user: &ApplicationUser, password: &str) -> anyhow::Result<Outcome> {
        self.store.check()?;
        if password.len() < 6 {
            return Ok(weak_password());
        }
        if self.store.user_named(&user.username).is_some() {
            return Ok(Outcome::domain_error(format!(
                "Username '{}' is already taken.",
                user.username
            )));
        }

        {
            let mut store = self.store.store.lock().unwrap();
            store.users.insert(user.id, user.clone());
            store.passwords.insert(user.id, password.to_string());
        }
        self.record("INSERT user", user).await;
        Ok(Outcome::ok())
    }

    async fn change_password(
        &self,
        user: &ApplicationUser,
        current_password: &str,
        new_password: &str,
    ) -> anyhow::Result<Outcome> {
        self.store.check()?;
        if new_password.len() < 6 {
            return Ok(weak_password());
        }

        let changed = {
            let mut store = self.store.store.lock().unwrap();
            match store.passwords.get(&user.id) {
                Some(stored) if stored == current_password => {
                    store.passwords.insert(user.id, new_password.to_string());
                    true
                }
                _ => false,
            }
        };

        if !changed {
            return Ok(Outcome::domain_error("Incorrect password."));
        }
        self.record("UPDATE password", user).await;
        Ok(Outcome::ok())
    }

    async fn add_to_role(&self, user: &ApplicationUser, role: &str) -> anyhow::Result<Outcome> {
        self.store.check()?;
        self.store
            .store
            .lock()
            .unwrap()
            .roles
            .push((user.id, role.to_string()));
        self.record("INSERT role", user).await;
        Ok(Outcome::ok())
    }

    async fn update(&self, user: &ApplicationUser) -> anyhow::Result<Outcome> {
        self.store.check()?;
        self.store
            .store
            .lock()
            .unwrap()
            .users
            .insert(user.id, user.clone());
        self.record("UPDATE user", user).await;
        Ok(Outcome::ok())
    }

    async fn is_email_confirmed(&self, user: &ApplicationUser) -> anyhow::Result<bool> {
        self.store.check()?;
        Ok(self
            .store
            .user(user.id)
            .map_or(false, |stored| stored.email_confirmed))
    }
}

/// Sign-in manager checking passwords against a `FakeUserStore`
pub struct FakeSignInManager {
    store: Arc<FakeUserStore>,
    pub sign_ins: AtomicUsize,
    pub sign_outs: AtomicUsize,
}

impl FakeSignInManager {
    pub fn new(store: Arc<FakeUserStore>) -> Self {
        Self {
            store,
            sign_ins: AtomicUsize::new(0),
            sign_outs: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SignInManager for FakeSignInManager {
    async fn password_sign_in(&self, username: &str, password: &str) -> anyhow::Result<Outcome> {
        if !self.store.password_matches(username, password) {
            return Ok(Outcome::domain_error("Invalid login attempt."));
        }

        self.sign_ins.fetch_add(1, Ordering::SeqCst);
        Ok(Outcome::ok())
    }

    async fn sign_out(&self) -> anyhow::Result<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
