// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets arrive as environment variables (Cloud Run secret bindings)
//! and are cached in memory for the life of the process.

use std::env;

/// Cloud Scheduler job expected on the expiry sweep endpoint.
pub const EXPIRY_SWEEP_JOB_NAME: &str = "expiry-sweep-daily";

/// Default bound on referral-code generation attempts.
pub const DEFAULT_CODE_ATTEMPTS: u32 = 10;

/// Billing webhook authentication mode.
///
/// Kept explicit so the unauthenticated fallback is a visible
/// configuration state, not a silent fallthrough.
#[derive(Debug, Clone)]
pub enum WebhookAuth {
    /// Bearer secret that inbound billing events must present.
    Configured(String),
    /// No secret configured; events are accepted unauthenticated.
    SecretMissing,
}

impl WebhookAuth {
    fn from_env_value(value: Option<String>) -> Self {
        match value.map(|v| v.trim().to_string()) {
            Some(secret) if !secret.is_empty() => WebhookAuth::Configured(secret),
            _ => WebhookAuth::SecretMissing,
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, WebhookAuth::Configured(_))
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Bound on referral-code generation attempts
    pub max_code_attempts: u32,

    // --- Secrets (from env / Secret Manager bindings) ---
    /// Identity Toolkit web API key
    pub identity_api_key: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Billing webhook shared secret, if configured
    pub webhook_auth: WebhookAuth,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            max_code_attempts: env::var("CODE_GENERATION_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CODE_ATTEMPTS),

            identity_api_key: env::var("IDENTITY_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("IDENTITY_API_KEY"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            webhook_auth: WebhookAuth::from_env_value(env::var("REVENUECAT_WEBHOOK_SECRET").ok()),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            max_code_attempts: DEFAULT_CODE_ATTEMPTS,
            identity_api_key: "test_api_key".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            webhook_auth: WebhookAuth::Configured("test_webhook_secret".to_string()),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("IDENTITY_API_KEY", "test_key");
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::remove_var("REVENUECAT_WEBHOOK_SECRET");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.identity_api_key, "test_key");
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_code_attempts, DEFAULT_CODE_ATTEMPTS);
        assert!(!config.webhook_auth.is_configured());
    }

    #[test]
    fn test_webhook_auth_modes() {
        let auth = WebhookAuth::from_env_value(Some("shh".to_string()));
        assert!(auth.is_configured());

        let auth = WebhookAuth::from_env_value(Some("   ".to_string()));
        assert!(!auth.is_configured());

        let auth = WebhookAuth::from_env_value(None);
        assert!(!auth.is_configured());
    }
}
