// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes: server time, subscription status, referral codes.

use crate::error::{AppError, Result};
use crate::middleware::auth::{extract_token, verify_session_token, AuthUser};
use crate::models::subscription::{evaluate_expiry, SubscriptionStatus};
use crate::services::CodeService;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes that require authentication via session token.
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/referral-code", get(get_referral_code))
}

/// API routes that are public (or handle identity themselves).
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/time", get(get_server_time))
        .route("/api/subscription/status", get(check_subscription))
}

// ─── Server Time ─────────────────────────────────────────────

/// Server time response, used by clients to calibrate against device
/// clock manipulation.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ServerTimeResponse {
    pub server_time: String,
    /// Milliseconds since the Unix epoch.
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub timestamp: i64,
}

/// Return the current server time.
async fn get_server_time() -> Json<ServerTimeResponse> {
    let now = chrono::Utc::now();
    Json(ServerTimeResponse {
        server_time: format_utc_rfc3339(now),
        timestamp: now.timestamp_millis(),
    })
}

// ─── Subscription Status ─────────────────────────────────────

#[derive(Deserialize)]
struct StatusQuery {
    /// Check a specific user instead of the caller.
    uid: Option<String>,
}

/// Subscription status response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SubscriptionStatusResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub status: SubscriptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pro: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<String>,
}

/// Check whether a subscription has lapsed, revoking access if so.
///
/// Accepts an explicit `uid` override; otherwise the caller's session
/// identity is required.
async fn check_subscription(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: axum::http::HeaderMap,
    Query(params): Query<StatusQuery>,
) -> Result<Json<SubscriptionStatusResponse>> {
    let uid = match params.uid {
        Some(uid) if !uid.trim().is_empty() => uid,
        _ => extract_token(&jar, &headers)
            .and_then(|token| verify_session_token(&token, &state.config.jwt_signing_key))
            .ok_or(AppError::Unauthorized)?,
    };

    let not_found = SubscriptionStatusResponse {
        status: SubscriptionStatus::NotFound,
        is_pro: None,
        expires_at: None,
        expired_at: None,
    };

    let Some(user) = state.db.get_user(&uid).await? else {
        return Ok(Json(not_found));
    };

    let now = chrono::Utc::now();
    let eval = evaluate_expiry(now, user.subscription_expiry.as_deref());

    let response = match eval.status {
        SubscriptionStatus::Lifetime => SubscriptionStatusResponse {
            status: SubscriptionStatus::Lifetime,
            is_pro: Some(true),
            expires_at: None,
            expired_at: None,
        },
        SubscriptionStatus::Active => SubscriptionStatusResponse {
            status: SubscriptionStatus::Active,
            is_pro: Some(true),
            expires_at: user.subscription_expiry.clone(),
            expired_at: None,
        },
        SubscriptionStatus::Expired => {
            // Revoke access now rather than waiting for the nightly sweep.
            state.db.mark_expired(&uid, now).await?;

            tracing::info!(uid = %uid, "Revoked Pro access - subscription expired");

            SubscriptionStatusResponse {
                status: SubscriptionStatus::Expired,
                is_pro: Some(false),
                expires_at: None,
                expired_at: eval.mutation.map(|m| m.expired_at),
            }
        }
        // The evaluator itself never reports NotFound.
        SubscriptionStatus::NotFound => not_found,
    };

    Ok(Json(response))
}

// ─── Referral Code ───────────────────────────────────────────

/// Referral code response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ReferralCodeResponse {
    pub code: String,
}

/// Fetch the caller's referral code, generating one on first use.
async fn get_referral_code(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ReferralCodeResponse>> {
    let service = CodeService::new(state.db.clone(), state.config.max_code_attempts);
    let code = service.get_or_generate(&user.uid).await?;

    Ok(Json(ReferralCodeResponse { code }))
}
