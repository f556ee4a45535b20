// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Referral code generation with bounded collision retry.

use ring::rand::SystemRandom;

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::referral;

/// Generates and persists unique referral codes.
pub struct CodeService {
    db: FirestoreDb,
    rng: SystemRandom,
    max_attempts: u32,
}

impl CodeService {
    pub fn new(db: FirestoreDb, max_attempts: u32) -> Self {
        Self {
            db,
            rng: SystemRandom::new(),
            max_attempts,
        }
    }

    /// Return the user's referral code, generating one if needed.
    ///
    /// Idempotent: an existing code is returned unchanged. Otherwise
    /// candidates are sampled and point-checked for uniqueness up to
    /// `max_attempts` times. The check-then-write is not transactional
    /// against a concurrent generation racing to the same candidate;
    /// that window is accepted and bounded by the code length.
    pub async fn get_or_generate(&self, uid: &str) -> Result<String, AppError> {
        if let Some(user) = self.db.get_user(uid).await? {
            if let Some(code) = user.referral_code {
                return Ok(code);
            }
        }

        for attempt in 1..=self.max_attempts {
            let candidate = referral::sample_code(&self.rng)
                .ok_or_else(|| AppError::Internal(anyhow::anyhow!("system RNG failure")))?;

            if self
                .db
                .find_user_by_referral_code(&candidate)
                .await?
                .is_some()
            {
                tracing::debug!(attempt, "Referral code collision, resampling");
                continue;
            }

            self.db.set_referral_code(uid, &candidate).await?;
            tracing::info!(uid, code = %candidate, "Generated referral code");
            return Ok(candidate);
        }

        Err(AppError::CodeGenerationExhausted(self.max_attempts))
    }
}
