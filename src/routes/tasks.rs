// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task handler routes for scheduled jobs.
//!
//! These endpoints are called by Cloud Scheduler, not directly by users.

use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Task handler routes (called by Cloud Scheduler).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/tasks/expiry-sweep", post(expiry_sweep))
}

/// Sweep result report.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SweepResponse {
    pub success: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub revoked_count: usize,
}

/// Revoke Pro access for all lapsed subscriptions (daily sweep).
///
/// A failed run answers 500 and is simply picked up by the next
/// scheduled tick; the query-driven design makes reruns idempotent.
async fn expiry_sweep(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> (StatusCode, Json<SweepResponse>) {
    // Security Check: Ensure request comes from Cloud Scheduler
    // Cloud Run strips this header from external requests, so its presence guarantees internal origin.
    // We also verify the job name to ensure it matches our expected job.
    let job_name_header = headers.get("x-cloudscheduler-jobname");
    let is_valid_job = job_name_header
        .and_then(|h| h.to_str().ok())
        .map(|name| name == crate::config::EXPIRY_SWEEP_JOB_NAME)
        .unwrap_or(false);

    if !is_valid_job {
        tracing::warn!(
            header = ?job_name_header,
            "Security Alert: Blocked unauthorized access to expiry_sweep"
        );
        return (
            StatusCode::FORBIDDEN,
            Json(SweepResponse {
                success: false,
                revoked_count: 0,
            }),
        );
    }

    tracing::info!("Running scheduled expiry sweep");

    match state.db.expire_lapsed_users(chrono::Utc::now()).await {
        Ok(count) => {
            if count == 0 {
                tracing::info!("No expired subscriptions found");
            } else {
                tracing::info!(count, "Revoked Pro access for expired users");
            }
            (
                StatusCode::OK,
                Json(SweepResponse {
                    success: true,
                    revoked_count: count,
                }),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Expiry sweep failed");
            // 500 lets the next scheduled run retry the whole sweep.
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SweepResponse {
                    success: false,
                    revoked_count: 0,
                }),
            )
        }
    }
}
