// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Entitlement API Server
//!
//! Backs a subscription app with referral growth: signup with referral
//! credit, server-side expiry enforcement, and billing-provider sync.

use entitlement_api::{config::Config, db::FirestoreDb, services::IdentityClient, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Entitlement API");

    if !config.webhook_auth.is_configured() {
        tracing::warn!("REVENUECAT_WEBHOOK_SECRET not configured. Webhook is not secured!");
    }

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Initialize identity-store client
    let identity = IdentityClient::new(&config.identity_api_key);
    tracing::info!("Identity Toolkit client initialized");

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        identity,
    });

    // Build router
    let app = entitlement_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("entitlement_api=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
