// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile model for storage and API.

use serde::{Deserialize, Serialize};

/// User profile stored in Firestore.
///
/// Document ID is the identity-store uid. All timestamps are RFC3339
/// strings in fixed `YYYY-MM-DDTHH:MM:SSZ` form so Firestore range
/// filters order them chronologically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    /// Identity-store uid (also used as document ID)
    ///
    /// Base fields carry defaults so sparse documents created by merge
    /// writes (e.g. a billing event racing profile creation) still load.
    #[serde(default)]
    pub uid: String,
    /// Email address
    #[serde(default)]
    pub email: String,
    /// Display name chosen at signup
    #[serde(default)]
    pub display_name: String,
    /// When the account was created
    #[serde(default)]
    pub created_at: String,

    /// Cached entitlement flag
    #[serde(default)]
    pub is_pro: bool,
    /// Subscription expiry; `None` means lifetime / no-expiry,
    /// which is distinct from "not subscribed" (`is_pro == false`)
    #[serde(default)]
    pub subscription_expiry: Option<String>,
    /// Stamped when `is_pro` is revoked because the expiry passed
    #[serde(default)]
    pub expired_at: Option<String>,
    /// Last time a billing event updated this document
    #[serde(default)]
    pub last_verified: Option<String>,
    /// Type of the last billing event applied
    #[serde(default)]
    pub last_webhook_event: Option<String>,

    /// Own referral code (8 uppercase alphanumeric chars, written once)
    #[serde(default)]
    pub referral_code: Option<String>,
    /// Code redeemed at signup (write-once)
    #[serde(default)]
    pub applied_referral_code: Option<String>,
    /// Uid of the referrer (write-once, never this user's own uid)
    #[serde(default)]
    pub referred_by: Option<String>,
    /// When the referral was applied
    #[serde(default)]
    pub referral_applied_at: Option<String>,

    /// Rolling count toward the next reward, resets at the threshold
    #[serde(default)]
    pub referrals: u32,
    /// Lifetime referral count (monotonic)
    #[serde(default)]
    pub total_referrals: u32,
    /// Rewards granted so far (monotonic, capped)
    #[serde(default)]
    pub referral_rewards: u32,
}

impl User {
    /// Base profile for a freshly created account.
    pub fn new_profile(uid: &str, email: &str, display_name: &str, created_at: &str) -> Self {
        Self {
            uid: uid.to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            created_at: created_at.to_string(),
            is_pro: false,
            ..Default::default()
        }
    }
}
