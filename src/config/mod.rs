use std::fmt;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Deployment environment the gateway credentials are chosen for.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentEnvironment {
    Test,
    Production,
}

impl DeploymentEnvironment {
    /// Fallback used when no environment is configured explicitly: a
    /// deployment URL carrying the production marker selects production.
    pub fn detect(deployment_url: &str, production_marker: &str) -> Self {
        if !production_marker.is_empty() && deployment_url.contains(production_marker) {
            DeploymentEnvironment::Production
        } else {
            DeploymentEnvironment::Test
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentEnvironment::Test => "test",
            DeploymentEnvironment::Production => "production",
        }
    }
}

impl fmt::Display for DeploymentEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CredentialPair {
    pub access_token: Option<String>,
    pub public_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Explicit environment; when unset it is detected from `deployment_url`.
    pub environment: Option<DeploymentEnvironment>,
    pub deployment_url: Option<String>,
    pub production_marker: String,
    pub api_base: String,
    pub timeout_secs: u64,
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub test: CredentialPair,
    #[serde(default)]
    pub production: CredentialPair,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: None,
            deployment_url: None,
            production_marker: String::new(),
            api_base: "https://api.mercadopago.com".to_string(),
            timeout_secs: 30,
            webhook_secret: None,
            test: CredentialPair::default(),
            production: CredentialPair::default(),
        }
    }
}

/// Credentials resolved once at startup and injected into the gateway client.
#[derive(Clone)]
pub struct GatewayCredentials {
    pub environment: DeploymentEnvironment,
    pub access_token: String,
    pub public_key: String,
}

// Hand-written so the access token never reaches a log line.
impl fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("environment", &self.environment)
            .field("access_token", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

impl GatewayConfig {
    pub fn resolve_environment(&self, base_url: &str) -> DeploymentEnvironment {
        self.environment.unwrap_or_else(|| {
            let url = self.deployment_url.as_deref().unwrap_or(base_url);
            DeploymentEnvironment::detect(url, &self.production_marker)
        })
    }

    pub fn resolve(&self, base_url: &str) -> Result<GatewayCredentials> {
        let environment = self.resolve_environment(base_url);
        let pair = match environment {
            DeploymentEnvironment::Test => &self.test,
            DeploymentEnvironment::Production => &self.production,
        };

        let access_token = non_empty(pair.access_token.as_deref()).ok_or_else(|| {
            AppError::Configuration(format!("missing {} gateway access token", environment))
        })?;
        let public_key = non_empty(pair.public_key.as_deref()).ok_or_else(|| {
            AppError::Configuration(format!("missing {} gateway public key", environment))
        })?;

        Ok(GatewayCredentials {
            environment,
            access_token: access_token.to_string(),
            public_key: public_key.to_string(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdempotencyConfig {
    pub ttl_hours: i64,
    pub cleanup_interval_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            cleanup_interval_secs: 3600,
        }
    }
}

impl Settings {
    pub fn new() -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://storefront.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("gateway.production_marker", "")?
            .set_default("gateway.api_base", "https://api.mercadopago.com")?
            .set_default("gateway.timeout_secs", 30)?
            .set_default("rate_limit.window_secs", 60)?
            .set_default("rate_limit.max_requests", 5)?
            .set_default("idempotency.ttl_hours", 24)?
            .set_default("idempotency.cleanup_interval_secs", 3600)?
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (with STOREFRONT__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("STOREFRONT").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://storefront.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            gateway: GatewayConfig::default(),
            rate_limit: RateLimitConfig::default(),
            idempotency: IdempotencyConfig::default(),
        }
    }
}
