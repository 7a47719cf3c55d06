//! Authentication gate and session storage.
//!
//! Two login surfaces: advisors sign in with email and password to run the
//! sales wizard; clients sign in with their document number to see their own
//! case. Sessions are opaque tokens held in a store behind the
//! [`SessionStore`] trait; the default store is an in-process cache with an
//! idle TTL, so a restart logs everyone out.

use crate::errors::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const DEMO_PASSWORD: &str = "demo123";

const ADVISOR_ACCOUNTS: [(&str, &str, &str); 2] = [
    ("asesor@konrad.com", "Carlos Mendoza", "Asesor Comercial"),
    ("supervisor@konrad.com", "Patricia Rojas", "Supervisor de Ventas"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserKind {
    Advisor,
    Client,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorProfile {
    pub email: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientProfile {
    pub document_number: String,
    /// The case the client portal shows.
    pub case_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "userType", rename_all = "lowercase")]
pub enum Profile {
    Advisor(AdvisorProfile),
    Client(ClientProfile),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    pub kind: UserKind,
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: AuthSession);
    async fn get(&self, token: &str) -> Option<AuthSession>;
    async fn remove(&self, token: &str);
}

/// In-process session store with an 8 hour idle TTL.
pub struct MokaSessionStore {
    sessions: Cache<String, AuthSession>,
}

impl MokaSessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Cache::builder()
                .time_to_idle(Duration::from_secs(8 * 3600))
                .max_capacity(100_000)
                .build(),
        }
    }
}

impl Default for MokaSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MokaSessionStore {
    async fn insert(&self, session: AuthSession) {
        self.sessions.insert(session.token.clone(), session).await;
    }

    async fn get(&self, token: &str) -> Option<AuthSession> {
        self.sessions.get(token).await
    }

    async fn remove(&self, token: &str) {
        self.sessions.invalidate(token).await;
    }
}

pub struct AuthService {
    store: Arc<dyn SessionStore>,
}

impl AuthService {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Advisor login against the demo account table. Credentials are matched
    /// case-insensitively on the email.
    pub async fn login_advisor(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AppError> {
        let email = email.trim().to_lowercase();
        let account = ADVISOR_ACCOUNTS
            .iter()
            .find(|(e, _, _)| *e == email)
            .filter(|_| password == DEMO_PASSWORD);

        let Some((account_email, name, role)) = account else {
            tracing::warn!("Rejected advisor login for {}", email);
            return Err(AppError::Unauthorized(
                "Credenciales inválidas".to_string(),
            ));
        };

        let session = AuthSession {
            token: Uuid::new_v4().to_string(),
            kind: UserKind::Advisor,
            profile: Profile::Advisor(AdvisorProfile {
                email: account_email.to_string(),
                name: name.to_string(),
                role: role.to_string(),
            }),
            created_at: Utc::now(),
        };
        self.store.insert(session.clone()).await;
        tracing::info!("Advisor {} logged in", account_email);
        Ok(session)
    }

    /// Client login: any document number of at least six digits is accepted
    /// and bound to the demo case.
    pub async fn login_client(&self, document_number: &str) -> Result<AuthSession, AppError> {
        let document = document_number.trim();
        if document.len() < 6 || !document.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::Unauthorized(
                "Número de documento inválido".to_string(),
            ));
        }

        let session = AuthSession {
            token: Uuid::new_v4().to_string(),
            kind: UserKind::Client,
            profile: Profile::Client(ClientProfile {
                document_number: document.to_string(),
                case_number: "CASO-001".to_string(),
            }),
            created_at: Utc::now(),
        };
        self.store.insert(session.clone()).await;
        tracing::info!("Client {} logged in", document);
        Ok(session)
    }

    pub async fn session(&self, token: &str) -> Option<AuthSession> {
        self.store.get(token).await
    }

    /// Requires a live session of the given kind.
    pub async fn require(&self, token: &str, kind: UserKind) -> Result<AuthSession, AppError> {
        match self.store.get(token).await {
            Some(session) if session.kind == kind => Ok(session),
            Some(_) => Err(AppError::Unauthorized(
                "Sesión sin permisos para esta operación".to_string(),
            )),
            None => Err(AppError::Unauthorized(
                "Sesión inválida o expirada".to_string(),
            )),
        }
    }

    pub async fn logout(&self, token: &str) {
        self.store.remove(token).await;
        tracing::info!("Session terminated");
    }
}
