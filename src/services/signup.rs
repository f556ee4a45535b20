// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signup orchestration: identity-store account + profile document.
//!
//! The identity store is external and non-transactional with Firestore,
//! so account creation happens first and is compensated (deleted) if the
//! profile transaction fails. The profile and any referral credit commit
//! together or not at all.

use chrono::Utc;

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{referral, User};
use crate::services::identity::IdentityClient;
use crate::time_utils::format_utc_rfc3339;

/// Result of a completed signup.
#[derive(Debug, Clone)]
pub struct SignupOutcome {
    pub uid: String,
    pub email: String,
    pub referral_applied: bool,
}

/// Coordinates account creation with the atomic profile transaction.
pub struct SignupService {
    identity: IdentityClient,
    db: FirestoreDb,
}

impl SignupService {
    pub fn new(identity: IdentityClient, db: FirestoreDb) -> Self {
        Self { identity, db }
    }

    /// Create an account and its profile, applying a referral if valid.
    ///
    /// Input validation happens at the route boundary; by the time this
    /// runs the credentials are well-formed.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        referral_code: Option<&str>,
    ) -> Result<SignupOutcome, AppError> {
        // Step 1: identity-store account (outside the transaction).
        let account = self
            .identity
            .create_account(email, password, display_name)
            .await?;

        tracing::info!(uid = %account.uid, "Identity account created");

        let now = Utc::now();
        let profile = User::new_profile(&account.uid, email, display_name, &format_utc_rfc3339(now));

        let normalized = referral_code
            .map(referral::normalize_code)
            .filter(|code| !code.is_empty());

        // Step 2: one atomic transaction for profile + referral credit.
        let result = self
            .db
            .create_user_with_referral(profile, normalized.as_deref(), now)
            .await;

        match result {
            Ok(referral_applied) => {
                tracing::info!(uid = %account.uid, email, "User created successfully");
                Ok(SignupOutcome {
                    uid: account.uid,
                    email: email.to_string(),
                    referral_applied,
                })
            }
            Err(err) => {
                tracing::error!(uid = %account.uid, error = %err, "Signup transaction failed");

                // Step 3: compensate by deleting the orphaned account.
                if let Err(delete_err) = self.identity.delete_account(&account.id_token).await {
                    tracing::error!(
                        uid = %account.uid,
                        error = %delete_err,
                        "Compensating account deletion failed; leaked identity account requires manual reconciliation"
                    );
                } else {
                    tracing::info!(uid = %account.uid, "Rolled back identity account");
                }

                Err(AppError::Internal(anyhow::anyhow!(
                    "signup failed after account creation: {}",
                    err
                )))
            }
        }
    }
}
