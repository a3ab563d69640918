//! The database collaborator.
//!
//! The cache service treats persistence as an opaque remote with a fixed
//! method contract; SQL schema and pooling live behind this trait. The
//! in-memory implementation backs the shipped binary and the test suites.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use inner_net::messages::user_data::{
    AuthenticationResult, UserAuthenticationRequest, UserAuthenticationResponse,
};
use inner_net::{LoginServiceSettings, ServiceKind, WorldSummary};

use crate::config::AccountSeed;

/// Service lifecycle events recorded for auditing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    ServiceStarted,
    ServiceConnected,
    ServiceDisconnected,
    ServiceStopped,
}

/// Fixed contract of the persistence collaborator. Calls block (await)
/// until the backend answers; retry and pooling are the implementation's
/// concern.
#[async_trait]
pub trait Database: Send + Sync {
    async fn service_audit(&self, service_id: u8, kind: ServiceKind, event: AuditEvent);

    /// Wholesale load of the worlds table.
    async fn worlds_cache(&self) -> Vec<WorldSummary>;

    /// Authenticates (and, when the pushed settings allow it, auto-creates)
    /// a user. Never fails the connection: every outcome is a response code.
    async fn user_auth(
        &self,
        request: &UserAuthenticationRequest,
        settings: &LoginServiceSettings,
    ) -> UserAuthenticationResponse;

    /// Creates an account and returns its user id.
    async fn user_create(&self, login: &str, password: &str, access_level: u8) -> i32;

    /// Records a logout: session span, source address, last world visited.
    async fn user_logout(&self, account_id: i32, start_time: i64, ip: &str, last_world: u8);
}

#[derive(Debug, Clone)]
struct AccountRecord {
    id: i32,
    password: String,
    access_level: u8,
    last_world: u8,
}

/// In-memory database: accounts keyed by login plus a static worlds table.
pub struct InMemoryDatabase {
    accounts: RwLock<HashMap<String, AccountRecord>>,
    next_account_id: AtomicI32,
    worlds: Vec<WorldSummary>,
}

impl InMemoryDatabase {
    pub fn new(worlds: Vec<WorldSummary>, seeds: &[AccountSeed]) -> Self {
        let mut accounts = HashMap::new();
        let mut next_id = 1;
        for seed in seeds {
            accounts.insert(
                seed.login.clone(),
                AccountRecord {
                    id: next_id,
                    password: seed.password.clone(),
                    access_level: seed.access_level,
                    last_world: 1,
                },
            );
            next_id += 1;
        }
        Self {
            accounts: RwLock::new(accounts),
            next_account_id: AtomicI32::new(next_id),
            worlds,
        }
    }
}

#[async_trait]
impl Database for InMemoryDatabase {
    async fn service_audit(&self, service_id: u8, kind: ServiceKind, event: AuditEvent) {
        debug!(service_id, %kind, ?event, "service audit");
    }

    async fn worlds_cache(&self) -> Vec<WorldSummary> {
        self.worlds.clone()
    }

    async fn user_auth(
        &self,
        request: &UserAuthenticationRequest,
        settings: &LoginServiceSettings,
    ) -> UserAuthenticationResponse {
        {
            let accounts = self.accounts.read().await;
            if let Some(account) = accounts.get(&request.login) {
                return if account.password == request.password {
                    UserAuthenticationResponse::accepted(
                        request.request_id,
                        account.id,
                        account.last_world,
                        account.access_level,
                    )
                } else {
                    UserAuthenticationResponse::rejected(
                        request.request_id,
                        AuthenticationResult::PasswordWrong,
                    )
                };
            }
        }

        if !settings.auto_create_users {
            return UserAuthenticationResponse::rejected(
                request.request_id,
                AuthenticationResult::UserOrPasswordWrong,
            );
        }

        let user_id = self
            .user_create(
                &request.login,
                &request.password,
                settings.default_access_level,
            )
            .await;
        UserAuthenticationResponse::accepted(
            request.request_id,
            user_id,
            1,
            settings.default_access_level,
        )
    }

    async fn user_create(&self, login: &str, password: &str, access_level: u8) -> i32 {
        let mut accounts = self.accounts.write().await;
        // A racing create for the same login keeps the existing row.
        if let Some(existing) = accounts.get(login) {
            return existing.id;
        }
        let id = self.next_account_id.fetch_add(1, Ordering::Relaxed);
        accounts.insert(
            login.to_string(),
            AccountRecord {
                id,
                password: password.to_string(),
                access_level,
                last_world: 1,
            },
        );
        debug!(login, id, access_level, "account created");
        id
    }

    async fn user_logout(&self, account_id: i32, start_time: i64, ip: &str, last_world: u8) {
        let mut accounts = self.accounts.write().await;
        if let Some(account) = accounts.values_mut().find(|a| a.id == account_id) {
            account.last_world = last_world;
        }
        debug!(account_id, start_time, ip, last_world, "user logout recorded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> InMemoryDatabase {
        InMemoryDatabase::new(
            Vec::new(),
            &[AccountSeed {
                login: "bob".into(),
                password: "x".into(),
                access_level: 3,
            }],
        )
    }

    fn auth_request(login: &str, password: &str) -> UserAuthenticationRequest {
        UserAuthenticationRequest {
            request_id: 1,
            login: login.into(),
            password: password.into(),
            session_id: 100,
        }
    }

    #[tokio::test]
    async fn known_account_with_matching_password_is_accepted() {
        let db = seeded();
        let response = db
            .user_auth(&auth_request("bob", "x"), &LoginServiceSettings::default())
            .await;
        assert_eq!(response.result, AuthenticationResult::UserAccepted);
        assert_eq!(response.access_level, 3);
    }

    #[tokio::test]
    async fn unknown_account_without_auto_create_is_rejected_and_not_created() {
        let db = seeded();
        let response = db
            .user_auth(
                &auth_request("alice", "pw"),
                &LoginServiceSettings::default(),
            )
            .await;
        assert_eq!(response.result, AuthenticationResult::UserOrPasswordWrong);
        assert!(!db.accounts.read().await.contains_key("alice"));
    }

    #[tokio::test]
    async fn unknown_account_with_auto_create_gets_a_fresh_user_id() {
        let db = seeded();
        let settings = LoginServiceSettings {
            service_id: 2,
            auto_create_users: true,
            default_access_level: 7,
        };
        let response = db.user_auth(&auth_request("alice", "pw"), &settings).await;
        assert_eq!(response.result, AuthenticationResult::UserAccepted);
        assert_eq!(response.access_level, 7);
        assert!(response.user_id > 0);

        // Second login authenticates against the created row.
        let again = db.user_auth(&auth_request("alice", "pw"), &settings).await;
        assert_eq!(again.user_id, response.user_id);
    }

    #[tokio::test]
    async fn wrong_password_on_existing_account_is_rejected() {
        let db = seeded();
        let response = db
            .user_auth(&auth_request("bob", "nope"), &LoginServiceSettings::default())
            .await;
        assert_eq!(response.result, AuthenticationResult::PasswordWrong);
    }
}
