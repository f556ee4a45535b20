// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook route for billing-provider entitlement events.

use crate::config::WebhookAuth;
use crate::time_utils::{format_utc_rfc3339, parse_utc_rfc3339};
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook/revenuecat", post(handle_event))
}

/// Entitlement key that grants Pro access.
const PRO_ENTITLEMENT: &str = "pro";

/// Billing event payload.
#[derive(Deserialize, Debug)]
struct BillingEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    app_user_id: Option<String>,
    #[serde(default)]
    entitlements: HashMap<String, Entitlement>,
}

#[derive(Deserialize, Debug)]
struct Entitlement {
    #[serde(default)]
    expires_date: Option<String>,
}

/// Entitlement state derived from a billing event.
///
/// Pro is granted by the presence of the `pro` entitlement key; its
/// expiry (normalized to our fixed RFC3339 form) becomes the stored
/// expiry, or `None` for a non-expiring grant.
fn entitlement_update(event: &BillingEvent) -> Result<(bool, Option<String>), String> {
    let pro = event.entitlements.get(PRO_ENTITLEMENT);
    let is_pro = pro.is_some();

    let expiry = match pro.and_then(|e| e.expires_date.as_deref()) {
        Some(raw) => Some(
            parse_utc_rfc3339(raw)
                .map(format_utc_rfc3339)
                .ok_or_else(|| format!("unparseable expires_date: {}", raw))?,
        ),
        None => None,
    };

    Ok((is_pro, expiry))
}

/// Check the shared-secret bearer header in constant time.
fn authorize(auth: &WebhookAuth, headers: &HeaderMap) -> bool {
    let secret = match auth {
        WebhookAuth::Configured(secret) => secret,
        WebhookAuth::SecretMissing => {
            tracing::warn!("Webhook secret not configured; accepting unauthenticated event");
            return true;
        }
    };

    let expected = format!("Bearer {}", secret);
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|got| bool::from(got.as_bytes().ct_eq(expected.as_bytes())))
        .unwrap_or(false)
}

/// Handle an incoming billing event (POST).
///
/// Always answers with a transport-level status; nothing here is allowed
/// to escape as a crash.
async fn handle_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> (StatusCode, &'static str) {
    if !authorize(&state.config.webhook_auth, &headers) {
        tracing::warn!("Unauthorized webhook attempt");
        return (StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    let event: BillingEvent = match serde_json::from_value(payload) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse billing event");
            return (StatusCode::BAD_REQUEST, "Malformed event");
        }
    };

    let uid = match event.app_user_id.as_deref() {
        Some(uid) if !uid.trim().is_empty() => uid.to_string(),
        _ => {
            tracing::warn!(event_type = %event.event_type, "Webhook event missing app_user_id");
            return (StatusCode::BAD_REQUEST, "Missing app_user_id");
        }
    };

    let (is_pro, expiry) = match entitlement_update(&event) {
        Ok(update) => update,
        Err(reason) => {
            tracing::warn!(uid = %uid, reason = %reason, "Rejecting billing event");
            return (StatusCode::BAD_REQUEST, "Malformed event");
        }
    };

    let now = chrono::Utc::now();
    match state
        .db
        .merge_entitlement(&uid, is_pro, expiry, &event.event_type, now)
        .await
    {
        Ok(()) => {
            tracing::info!(
                uid = %uid,
                is_pro,
                event_type = %event.event_type,
                "Webhook processed"
            );
            (StatusCode::OK, "OK")
        }
        Err(e) => {
            tracing::error!(uid = %uid, error = %e, "Webhook processing error");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}
