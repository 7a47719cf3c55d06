use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Resource not found error.
    NotFound(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Error interacting with an external API.
    ExternalApiError(String),
    /// Error sending email through the relay.
    EmailError(String),
    /// Internal server error.
    InternalError(String),
    /// Unauthorized access error.
    Unauthorized(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::EmailError(msg) => write!(f, "Email error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    /// Logs errors appropriately based on their severity.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ExternalApiError(msg) => {
                tracing::error!("External API error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "External service error".to_string(),
                )
            }
            AppError::EmailError(msg) => {
                tracing::error!("Email relay error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            AppError::WithContext { source, context } => {
                // Log full context chain for debugging
                tracing::error!("Error with context: {} -> {}", context, source);
                // Delegate to underlying error's response
                return source.clone().into_response();
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApiError(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Best-effort diagnostic hint derived from an email failure message.
///
/// The relay surfaces raw provider errors; substring matching picks the most
/// plausible cause so the UI can suggest a fix. This is heuristic, not
/// structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailFailureHint {
    Network,
    Credentials,
    Permission,
    NotFound,
    Unknown,
}

impl EmailFailureHint {
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("failed to fetch")
            || lower.contains("networkerror")
            || lower.contains("connection refused")
            || lower.contains("error sending request")
        {
            EmailFailureHint::Network
        } else if lower.contains("invalid credentials")
            || lower.contains("unauthorized")
            || lower.contains("401")
        {
            EmailFailureHint::Credentials
        } else if lower.contains("forbidden") || lower.contains("403") {
            EmailFailureHint::Permission
        } else if lower.contains("not found") || lower.contains("404") {
            EmailFailureHint::NotFound
        } else {
            EmailFailureHint::Unknown
        }
    }

    /// User-facing suggestion attached to the error toast.
    pub fn suggestion(self) -> &'static str {
        match self {
            EmailFailureHint::Network => {
                "Error de conexión. Verifica que el relay de correo esté activo o usa modo DEMO."
            }
            EmailFailureHint::Credentials => {
                "Credenciales inválidas. Verifica la configuración del servicio de email."
            }
            EmailFailureHint::Permission => {
                "Permiso denegado por el proveedor de correo. Revisa los permisos de la cuenta."
            }
            EmailFailureHint::NotFound => {
                "Endpoint de correo no encontrado. Verifica la URL del relay."
            }
            EmailFailureHint::Unknown => "No se pudo enviar el correo de confirmación.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_prefixes_the_display_chain() {
        let result: Result<(), AppError> =
            Err(AppError::EmailError("relay unreachable".to_string()));
        let wrapped = result.context("Reenvío del correo").unwrap_err();
        assert_eq!(
            wrapped.to_string(),
            "Reenvío del correo: Email error: relay unreachable"
        );
    }

    #[test]
    fn with_context_is_lazy() {
        let ok: Result<u8, AppError> = Ok(7);
        let value = ok
            .with_context(|| unreachable!("not evaluated on success"))
            .unwrap();
        assert_eq!(value, 7);

        let err: Result<u8, AppError> = Err(AppError::NotFound("caso".to_string()));
        let wrapped = err.with_context(|| "Consulta de caso".to_string()).unwrap_err();
        assert!(wrapped.to_string().starts_with("Consulta de caso: "));
    }

    #[test]
    fn hint_classification_picks_the_most_plausible_cause() {
        assert_eq!(
            EmailFailureHint::from_message("TypeError: Failed to fetch"),
            EmailFailureHint::Network
        );
        assert_eq!(
            EmailFailureHint::from_message("error sending request for url"),
            EmailFailureHint::Network
        );
        assert_eq!(
            EmailFailureHint::from_message("401 Unauthorized"),
            EmailFailureHint::Credentials
        );
        assert_eq!(
            EmailFailureHint::from_message("403 Forbidden"),
            EmailFailureHint::Permission
        );
        assert_eq!(
            EmailFailureHint::from_message("Endpoint not found"),
            EmailFailureHint::NotFound
        );
        assert_eq!(
            EmailFailureHint::from_message("something odd"),
            EmailFailureHint::Unknown
        );
    }

    #[test]
    fn every_hint_has_a_spanish_suggestion() {
        for hint in [
            EmailFailureHint::Network,
            EmailFailureHint::Credentials,
            EmailFailureHint::Permission,
            EmailFailureHint::NotFound,
            EmailFailureHint::Unknown,
        ] {
            assert!(!hint.suggestion().is_empty());
        }
    }
}
