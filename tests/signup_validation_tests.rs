// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signup input validation tests.
//!
//! Bad input must fail fast with `invalid-argument` before anything is
//! created in the identity store.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;

async fn post_signup(app: axum::Router, payload: serde_json::Value) -> axum::http::Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri("/auth/signup")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn error_tag(response: axum::http::Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    json["error"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_signup_missing_email() {
    let (app, _state) = common::create_test_app();

    let response = post_signup(
        app,
        json!({ "password": "password1", "displayName": "Ada" }),
    )
    .await;

    // Missing required field fails at deserialization.
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_signup_invalid_email() {
    let (app, _state) = common::create_test_app();

    let response = post_signup(
        app,
        json!({ "email": "not-an-email", "password": "password1", "displayName": "Ada" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_tag(response).await, "invalid-argument");
}

#[tokio::test]
async fn test_signup_short_password() {
    let (app, _state) = common::create_test_app();

    let response = post_signup(
        app,
        json!({ "email": "ada@example.com", "password": "abc", "displayName": "Ada" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_tag(response).await, "invalid-argument");
}

#[tokio::test]
async fn test_signup_empty_display_name() {
    let (app, _state) = common::create_test_app();

    let response = post_signup(
        app,
        json!({ "email": "ada@example.com", "password": "password1", "displayName": "" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_tag(response).await, "invalid-argument");
}

#[tokio::test]
async fn test_signup_valid_input_surfaces_internal_when_identity_offline() {
    let (app, _state) = common::create_test_app();

    // Input passes validation; the offline identity mock then fails and
    // the caller sees `internal`, with nothing half-created.
    let response = post_signup(
        app,
        json!({
            "email": "ada@example.com",
            "password": "password1",
            "displayName": "Ada",
            "referralCode": "ABCD1234"
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_tag(response).await, "internal");
}
