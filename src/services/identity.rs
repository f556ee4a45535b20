// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity Toolkit (Firebase Auth) REST client.
//!
//! Handles:
//! - Account creation at signup (email/password/display name)
//! - Account deletion, used as compensating rollback when the signup
//!   transaction fails

use crate::error::AppError;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Freshly created identity-store account.
#[derive(Debug, Clone)]
pub struct IdentityAccount {
    /// Opaque user id assigned by the identity store.
    pub uid: String,
    /// Short-lived token for the new account; needed for the
    /// compensating delete.
    pub id_token: String,
}

/// Identity Toolkit API client.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct SignUpResponse {
    #[serde(rename = "localId")]
    local_id: String,
    #[serde(rename = "idToken")]
    id_token: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl IdentityClient {
    /// Create a new client with the project's web API key.
    pub fn new(api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: Some(api_key.to_string()),
        }
    }

    /// Create a mock client for testing (offline mode).
    ///
    /// All identity operations will return an error if called.
    pub fn new_mock() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
        }
    }

    fn api_key(&self) -> Result<&str, AppError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AppError::Identity("Identity store not configured (offline mode)".to_string()))
    }

    /// Create an account and return its uid plus a deletion-capable token.
    pub async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<IdentityAccount, AppError> {
        let url = format!("{}/accounts:signUp?key={}", self.base_url, self.api_key()?);

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "displayName": display_name,
                "returnSecureToken": true,
            }))
            .send()
            .await
            .map_err(|e| AppError::Identity(format!("Account creation request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::map_api_error(response).await);
        }

        let body: SignUpResponse = response
            .json()
            .await
            .map_err(|e| AppError::Identity(format!("Invalid signUp response: {}", e)))?;

        Ok(IdentityAccount {
            uid: body.local_id,
            id_token: body.id_token,
        })
    }

    /// Delete an account using the token returned at creation.
    pub async fn delete_account(&self, id_token: &str) -> Result<(), AppError> {
        let url = format!("{}/accounts:delete?key={}", self.base_url, self.api_key()?);

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "idToken": id_token }))
            .send()
            .await
            .map_err(|e| AppError::Identity(format!("Account deletion request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::map_api_error(response).await);
        }

        Ok(())
    }

    /// Map a non-success Identity Toolkit response to an AppError.
    ///
    /// Credential problems (duplicate email, malformed email, weak
    /// password) are the caller's fault; everything else is internal.
    async fn map_api_error(response: reqwest::Response) -> AppError {
        let status = response.status();
        let message = match response.json::<ApiErrorBody>().await {
            Ok(body) => body.error.message,
            Err(_) => format!("status {}", status),
        };

        match message.as_str() {
            "EMAIL_EXISTS" => AppError::BadRequest("Email is already in use".to_string()),
            "INVALID_EMAIL" => AppError::BadRequest("Email address is invalid".to_string()),
            m if m.starts_with("WEAK_PASSWORD") => {
                AppError::BadRequest("Password is too weak".to_string())
            }
            _ => AppError::Identity(format!("Identity Toolkit error: {}", message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_is_offline() {
        let client = IdentityClient::new_mock();

        let err = client
            .create_account("a@example.com", "password1", "A")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Identity(_)));

        let err = client.delete_account("token").await.unwrap_err();
        assert!(matches!(err, AppError::Identity(_)));
    }
}
