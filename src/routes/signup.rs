// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signup entry point (account creation with optional referral).

use crate::error::{AppError, Result};
use crate::middleware::auth::create_session_token;
use crate::services::SignupService;
use crate::AppState;
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/signup", post(sign_up))
}

/// Signup request payload.
#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(email(message = "email must be a valid address"))]
    email: String,
    /// Identity-store minimum is 6 characters.
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    password: String,
    #[validate(length(min = 1, max = 100, message = "display name is required"))]
    display_name: String,
    #[serde(default)]
    referral_code: Option<String>,
}

/// Signup response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SignupResponse {
    pub success: bool,
    pub uid: String,
    pub email: String,
    pub referral_applied: bool,
    /// Session token for immediate authenticated calls.
    pub token: String,
}

/// Create an account and its profile, applying a referral if present.
async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupRequest>,
) -> Result<Json<SignupResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    tracing::info!(
        email = %payload.email,
        has_referral = payload.referral_code.is_some(),
        "Signup requested"
    );

    let service = SignupService::new(state.identity.clone(), state.db.clone());
    let outcome = service
        .sign_up(
            &payload.email,
            &payload.password,
            &payload.display_name,
            payload.referral_code.as_deref(),
        )
        .await?;

    let token = create_session_token(&outcome.uid, &state.config.jwt_signing_key)?;

    Ok(Json(SignupResponse {
        success: true,
        uid: outcome.uid,
        email: outcome.email,
        referral_applied: outcome.referral_applied,
        token,
    }))
}
