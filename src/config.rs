use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Operating mode for all external integrations.
///
/// Demo mode simulates every provider locally with deterministic data and
/// artificial latency; Production mode performs real HTTP calls against the
/// configured base URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApiMode {
    Demo,
    Production,
}

impl ApiMode {
    pub fn is_demo(self) -> bool {
        self == ApiMode::Demo
    }
}

/// Identity verification provider (document + biometric validation).
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub client_id: String,
}

/// One credit bureau endpoint. DataCredito uses basic auth + an API key,
/// TransUnion uses a bearer token; both shapes fit here.
#[derive(Debug, Clone, Deserialize)]
pub struct BureauConfig {
    pub base_url: String,
    pub api_key: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrmConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Upstream mail provider reached by the relay, plus the sender identity
/// stamped on outgoing contract emails.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Relay endpoint the `EmailService` posts to (this service's own
    /// `/api/send-email` in a typical deployment).
    pub relay_url: String,
    /// Upstream provider endpoint the relay forwards to in production mode.
    pub provider_url: String,
    pub user: String,
    pub password: String,
    pub from: String,
}

/// Artificial delays applied on the demo paths, matching the original
/// provider response times. Tests zero these out.
#[derive(Debug, Clone)]
pub struct DemoLatencies {
    pub identity: Duration,
    pub credit: Duration,
    pub crm: Duration,
    pub contract: Duration,
    pub otp_send: Duration,
    pub signing: Duration,
    pub email: Duration,
}

impl Default for DemoLatencies {
    fn default() -> Self {
        Self {
            identity: Duration::from_millis(1500),
            credit: Duration::from_millis(2000),
            crm: Duration::from_millis(500),
            contract: Duration::from_millis(1500),
            otp_send: Duration::from_millis(1000),
            signing: Duration::from_millis(2000),
            email: Duration::from_millis(1500),
        }
    }
}

impl DemoLatencies {
    /// All-zero latencies for tests.
    pub fn none() -> Self {
        Self {
            identity: Duration::ZERO,
            credit: Duration::ZERO,
            crm: Duration::ZERO,
            contract: Duration::ZERO,
            otp_send: Duration::ZERO,
            signing: Duration::ZERO,
            email: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub mode: ApiMode,
    pub identity: IdentityProviderConfig,
    pub data_credito: BureauConfig,
    pub trans_union: BureauConfig,
    pub crm: CrmConfig,
    pub email: EmailConfig,
    pub latencies: DemoLatencies,
}

fn require_url(var: &str) -> anyhow::Result<String> {
    std::env::var(var)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", var))
        .and_then(|url| {
            if url.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", var);
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", var);
            }
            Ok(url)
        })
}

fn require_nonempty(var: &str) -> anyhow::Result<String> {
    std::env::var(var)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", var))
        .and_then(|value| {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", var);
            }
            Ok(value)
        })
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mode = match std::env::var("API_MODE").as_deref() {
            Ok("PRODUCTION") | Ok("production") => ApiMode::Production,
            Err(_) | Ok("DEMO") | Ok("demo") => ApiMode::Demo,
            Ok(other) => {
                anyhow::bail!("API_MODE must be DEMO or PRODUCTION, got '{}'", other)
            }
        };

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?;

        let config = match mode {
            ApiMode::Demo => Self::demo_defaults(port),
            ApiMode::Production => Self {
                port,
                mode,
                identity: IdentityProviderConfig {
                    base_url: require_url("IDENTITY_BASE_URL")?,
                    api_key: require_nonempty("IDENTITY_API_KEY")?,
                    client_id: require_nonempty("IDENTITY_CLIENT_ID")?,
                },
                data_credito: BureauConfig {
                    base_url: require_url("DATACREDITO_BASE_URL")?,
                    api_key: require_nonempty("DATACREDITO_API_KEY")?,
                    username: Some(require_nonempty("DATACREDITO_USER")?),
                    password: Some(require_nonempty("DATACREDITO_PASS")?),
                },
                trans_union: BureauConfig {
                    base_url: require_url("TRANSUNION_BASE_URL")?,
                    api_key: require_nonempty("TRANSUNION_API_KEY")?,
                    username: None,
                    password: None,
                },
                crm: CrmConfig {
                    base_url: require_url("CRM_BASE_URL")?,
                    api_key: require_nonempty("CRM_API_KEY")?,
                },
                email: EmailConfig {
                    relay_url: require_url("EMAIL_RELAY_URL")?,
                    provider_url: require_url("EMAIL_PROVIDER_URL")?,
                    user: require_nonempty("EMAIL_USER")?,
                    password: require_nonempty("EMAIL_PASSWORD")?,
                    from: require_nonempty("EMAIL_FROM")?,
                },
                latencies: DemoLatencies::default(),
            },
        };

        tracing::info!("Configuration loaded successfully (mode: {:?})", config.mode);
        tracing::debug!("Identity base URL: {}", config.identity.base_url);
        tracing::debug!("DataCredito base URL: {}", config.data_credito.base_url);
        tracing::debug!("TransUnion base URL: {}", config.trans_union.base_url);
        tracing::debug!("CRM base URL: {}", config.crm.base_url);
        tracing::debug!("Email relay URL: {}", config.email.relay_url);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Demo configuration: placeholder endpoints, no env required.
    pub fn demo_defaults(port: u16) -> Self {
        Self {
            port,
            mode: ApiMode::Demo,
            identity: IdentityProviderConfig {
                base_url: "https://demo.registraduria.gov.co".to_string(),
                api_key: "DEMO_KEY".to_string(),
                client_id: "DEMO_CLIENT".to_string(),
            },
            data_credito: BureauConfig {
                base_url: "https://demo.datacredito.com".to_string(),
                api_key: "DEMO_KEY".to_string(),
                username: Some("demo_user".to_string()),
                password: Some("demo_pass".to_string()),
            },
            trans_union: BureauConfig {
                base_url: "https://demo.transunion.com.co".to_string(),
                api_key: "DEMO_KEY".to_string(),
                username: None,
                password: None,
            },
            crm: CrmConfig {
                base_url: "https://demo.crm.com".to_string(),
                api_key: "DEMO_KEY".to_string(),
            },
            email: EmailConfig {
                relay_url: format!("http://localhost:{}", port),
                provider_url: "https://demo.mail.example.com".to_string(),
                user: "demo@example.com".to_string(),
                password: "DEMO_KEY".to_string(),
                from: "Demo <demo@example.com>".to_string(),
            },
            latencies: DemoLatencies::default(),
        }
    }
}
