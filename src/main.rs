use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use telco_bpms_api::adapters::{CreditService, IdentityService};
use telco_bpms_api::auth::{AuthService, MokaSessionStore};
use telco_bpms_api::config::{ApiMode, Config};
use telco_bpms_api::handlers::{self, AppState};
use telco_bpms_api::portal::portal_router;
use telco_bpms_api::relay::{relay_router, LoggingTransport, MailTransport, ProviderTransport, RelayState};

/// Main entry point.
///
/// Initializes logging, loads configuration, wires the adapters and session
/// store, and starts the Axum server with the wizard API, the portal routes,
/// and the embedded mail relay.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "telco_bpms_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded (mode: {:?})", config.mode);

    // Build application state
    let app_state = Arc::new(AppState {
        identity: IdentityService::new(&config),
        credit: CreditService::new(&config),
        auth: AuthService::new(Arc::new(MokaSessionStore::new())),
        config: config.clone(),
    });

    // Mail relay transport: demo logs, production forwards to the provider
    let transport: Arc<dyn MailTransport> = if config.mode == ApiMode::Demo {
        Arc::new(LoggingTransport)
    } else {
        Arc::new(ProviderTransport::new(&config))
    };
    let relay_state = RelayState { transport };

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("valid governor configuration"),
    );

    // Protected routes: wizard validation endpoints, auth, portal, relay.
    // The 50MB body limit covers emails carrying four Base64 PDF attachments.
    let protected_routes = Router::new()
        .route("/api/validate-identity", post(handlers::validate_identity))
        .route("/api/validate-credit", post(handlers::validate_credit))
        .route("/api/auth/login", post(handlers::login_advisor))
        .route("/api/auth/login-client", post(handlers::login_client))
        .route("/api/auth/session", post(handlers::session_info))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/client/case", post(handlers::client_case_view))
        .with_state(app_state.clone())
        .merge(portal_router())
        .merge(relay_router(relay_state))
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(50 * 1024 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting so platform probes never throttle
    let app = Router::new()
        .route("/health", get(handlers::health))
        .with_state(app_state)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
