// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - User profiles (point reads, merge writes)
//! - Referral-code lookup (unique-code point query)
//! - The atomic signup transaction (profile create + referrer credit)
//! - The expiry sweep (lapsed-user query + batched revocation)

use crate::db::collections;
use crate::error::AppError;
use crate::models::{referral, User};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use firestore::paths;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // Use ExternalJwtFunctionSource to provide a dummy token without needing async-trait
        // or a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user profile by uid.
    pub async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or replace a user profile.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.uid)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Referral Code Operations ────────────────────────────────

    /// Look up the owner of a referral code.
    ///
    /// Codes are unique by construction; the query is limited to one match.
    pub async fn find_user_by_referral_code(&self, code: &str) -> Result<Option<User>, AppError> {
        let code = code.to_string();
        let matches: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("referral_code").eq(code.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(matches.into_iter().next())
    }

    /// Persist a user's referral code without touching other fields.
    ///
    /// Field-masked merge write: creates a sparse document if the profile
    /// does not exist yet.
    pub async fn set_referral_code(&self, uid: &str, code: &str) -> Result<(), AppError> {
        let sparse = User {
            uid: uid.to_string(),
            referral_code: Some(code.to_string()),
            ..Default::default()
        };

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths!(User::{referral_code}))
            .in_col(collections::USERS)
            .document_id(uid)
            .object(&sparse)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Entitlement Sync ────────────────────────────────────────

    /// Merge billing-provider entitlement state into a user profile.
    ///
    /// Only the entitlement fields are written; referral counters and
    /// profile data are untouched. Replaying the same event converges.
    pub async fn merge_entitlement(
        &self,
        uid: &str,
        is_pro: bool,
        subscription_expiry: Option<String>,
        event_type: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let sparse = User {
            uid: uid.to_string(),
            is_pro,
            subscription_expiry,
            last_verified: Some(format_utc_rfc3339(now)),
            last_webhook_event: Some(event_type.to_string()),
            ..Default::default()
        };

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths!(User::{
                is_pro,
                subscription_expiry,
                last_verified,
                last_webhook_event
            }))
            .in_col(collections::USERS)
            .document_id(uid)
            .object(&sparse)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Expiry Operations ───────────────────────────────────────

    /// Revoke Pro access for a single lapsed user.
    pub async fn mark_expired(&self, uid: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        let sparse = User {
            uid: uid.to_string(),
            is_pro: false,
            expired_at: Some(format_utc_rfc3339(now)),
            ..Default::default()
        };

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths!(User::{is_pro, expired_at}))
            .in_col(collections::USERS)
            .document_id(uid)
            .object(&sparse)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Find all users still flagged Pro whose expiry has passed.
    ///
    /// The range filter on `subscription_expiry` only matches string
    /// values, so lifetime users (null expiry) are excluded by the store.
    pub async fn query_lapsed_users(&self, now: DateTime<Utc>) -> Result<Vec<User>, AppError> {
        let cutoff = format_utc_rfc3339(now);
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| {
                q.for_all([
                    q.field("is_pro").eq(true),
                    q.field("subscription_expiry").less_than(cutoff.clone()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Revoke Pro access for every lapsed user in one atomic batch.
    ///
    /// Matched documents flip together per transaction; result sets larger
    /// than the store's write limit are split at `BATCH_SIZE`. Rerunning
    /// the sweep only ever touches documents that still match the query.
    ///
    /// Returns the number of users revoked.
    pub async fn expire_lapsed_users(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let lapsed = self.query_lapsed_users(now).await?;

        if lapsed.is_empty() {
            return Ok(0);
        }

        let client = self.get_client()?;
        let expired_at = format_utc_rfc3339(now);

        for chunk in lapsed.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for user in chunk {
                let sparse = User {
                    uid: user.uid.clone(),
                    is_pro: false,
                    expired_at: Some(expired_at.clone()),
                    ..Default::default()
                };

                client
                    .fluent()
                    .update()
                    .fields(paths!(User::{is_pro, expired_at}))
                    .in_col(collections::USERS)
                    .document_id(&user.uid)
                    .object(&sparse)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add revocation to batch: {}", e))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit expiry batch: {}", e))
            })?;
        }

        Ok(lapsed.len())
    }

    // ─── Atomic Signup ───────────────────────────────────────────

    /// Atomically create a user profile, applying a referral if present.
    ///
    /// The profile create and the referrer's counter/expiry update are
    /// committed by one transaction: both land or neither does. A code
    /// that matches no user, or the user's own code, is skipped silently
    /// and the plain profile is created.
    ///
    /// Returns `true` if a referral was applied.
    pub async fn create_user_with_referral(
        &self,
        mut profile: User,
        referral_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        // Locate the referrer document before opening the transaction;
        // the fresh read below keeps the update conflict-checked.
        let referrer_hit = match referral_code {
            Some(code) => self.find_user_by_referral_code(code).await?,
            None => None,
        };

        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let mut applied = false;

        if let (Some(code), Some(hit)) = (referral_code, referrer_hit) {
            // Re-read the referrer so the credited counters are based on
            // current data; Firestore retries the commit on conflict.
            let referrer: Option<User> = client
                .fluent()
                .select()
                .by_id_in(collections::USERS)
                .obj()
                .one(&hit.uid)
                .await
                .map_err(|e| {
                    AppError::Database(format!("Failed to read referrer in transaction: {}", e))
                })?;

            match referrer {
                Some(referrer) if referrer.uid == profile.uid => {
                    tracing::info!(
                        uid = %profile.uid,
                        code,
                        "Self-referral skipped"
                    );
                }
                Some(referrer) => {
                    let credit = referral::credit_referral(&referrer, now);
                    let grant = referral::trial_grant(code, &referrer.uid, now);

                    profile.is_pro = true;
                    profile.subscription_expiry = Some(grant.subscription_expiry);
                    profile.applied_referral_code = Some(grant.applied_referral_code);
                    profile.referred_by = Some(grant.referred_by);
                    profile.referral_applied_at = Some(grant.referral_applied_at);

                    if credit.reward_granted {
                        tracing::info!(
                            referrer_uid = %referrer.uid,
                            reward = credit.referral_rewards,
                            "Granted referrer subscription extension"
                        );
                    } else if credit.referrals == 0 {
                        tracing::info!(referrer_uid = %referrer.uid, "Referrer hit reward cap");
                    }

                    let mut updated = referrer.clone();
                    updated.referrals = credit.referrals;
                    updated.total_referrals = credit.total_referrals;
                    updated.referral_rewards = credit.referral_rewards;
                    if let Some(expiry) = credit.extended_expiry {
                        updated.subscription_expiry = Some(expiry);
                    }

                    client
                        .fluent()
                        .update()
                        .in_col(collections::USERS)
                        .document_id(&updated.uid)
                        .object(&updated)
                        .add_to_transaction(&mut transaction)
                        .map_err(|e| {
                            AppError::Database(format!(
                                "Failed to add referrer update to transaction: {}",
                                e
                            ))
                        })?;

                    tracing::info!(
                        uid = %profile.uid,
                        code,
                        referrer_uid = %updated.uid,
                        "Applied referral"
                    );
                    applied = true;
                }
                None => {
                    tracing::warn!(code, "Referral code owner vanished before transaction");
                }
            }
        } else if let Some(code) = referral_code {
            tracing::info!(code, "Referral code not found");
        }

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&profile.uid)
            .object(&profile)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add profile to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Signup transaction commit failed: {}", e)))?;

        Ok(applied)
    }
}
