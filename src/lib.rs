// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Entitlement API: subscription enforcement and referral growth loop.
//!
//! This crate provides the backend for keeping paid-entitlement state
//! consistent with billing-provider truth, enforcing time-bounded access
//! against the server clock, and handling referral signups atomically.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::IdentityClient;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub identity: IdentityClient,
}
