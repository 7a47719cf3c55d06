//! Mail relay HTTP surface: a thin service that accepts fully-formed email
//! messages and forwards them to the mail provider, keeping provider
//! credentials out of the main application.
//!
//! Two endpoints: `GET /api/health` for probes and `POST /api/send-email` for
//! delivery. Delivery goes through the [`MailTransport`] seam so the demo
//! deployment can log instead of send and tests can capture messages.

use crate::config::Config;
use crate::errors::AppError;
use crate::mailer::EmailMessage;
use crate::models::email_format_regex;
use async_trait::async_trait;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Delivers the message and returns the provider's message id.
    async fn deliver(&self, message: &EmailMessage) -> Result<String, AppError>;
}

/// Demo transport: logs the message and fabricates a message id.
pub struct LoggingTransport;

#[async_trait]
impl MailTransport for LoggingTransport {
    async fn deliver(&self, message: &EmailMessage) -> Result<String, AppError> {
        tracing::info!(
            "[DEMO RELAY] Would deliver to {} ({} attachments): {}",
            message.to,
            message.attachments.len(),
            message.subject
        );
        Ok(format!("relay-demo-{}", Uuid::new_v4()))
    }
}

/// Production transport: posts the message to the configured mail provider
/// with the relay's credentials.
pub struct ProviderTransport {
    client: Client,
    config: Config,
}

impl ProviderTransport {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            config: config.clone(),
        }
    }
}

#[async_trait]
impl MailTransport for ProviderTransport {
    async fn deliver(&self, message: &EmailMessage) -> Result<String, AppError> {
        let response = self
            .client
            .post(&self.config.email.provider_url)
            .basic_auth(&self.config.email.user, Some(&self.config.email.password))
            .json(&json!({
                "from": self.config.email.from,
                "to": message.to,
                "subject": message.subject,
                "html": message.html_content,
                "attachments": message.attachments,
            }))
            .send()
            .await
            .map_err(|e| AppError::EmailError(format!("Provider request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmailError(format!(
                "Provider returned status {}: {}",
                status, body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::EmailError(format!("Failed to parse provider response: {}", e)))?;

        Ok(body
            .get("messageId")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string())
    }
}

#[derive(Clone)]
pub struct RelayState {
    pub transport: Arc<dyn MailTransport>,
}

/// Router for the relay endpoints, mountable standalone or merged into the
/// main application.
pub fn relay_router(state: RelayState) -> Router {
    Router::new()
        .route("/api/health", get(relay_health))
        .route("/api/send-email", post(send_email))
        .with_state(state)
}

async fn relay_health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "email-relay",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn send_email(
    State(state): State<RelayState>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let missing: Vec<&str> = ["to", "subject", "htmlContent"]
        .into_iter()
        .filter(|field| {
            payload
                .get(*field)
                .and_then(Value::as_str)
                .map(str::is_empty)
                .unwrap_or(true)
        })
        .collect();
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Faltan campos requeridos: {}",
            missing.join(", ")
        )));
    }

    let message: EmailMessage = serde_json::from_value(payload)
        .map_err(|e| AppError::BadRequest(format!("Cuerpo de solicitud inválido: {}", e)))?;

    if !email_format_regex().is_match(&message.to) {
        return Err(AppError::BadRequest(format!(
            "Dirección de correo inválida: {}",
            message.to
        )));
    }

    tracing::info!(
        "Relaying email to {} ({} attachments)",
        message.to,
        message.attachments.len()
    );
    let message_id = state.transport.deliver(&message).await?;

    Ok(Json(json!({
        "success": true,
        "messageId": message_id,
    })))
}
