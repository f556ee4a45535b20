// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Referral reward accrual logic.
//!
//! Pure state transitions over a referrer's counters, applied inside the
//! signup transaction. Every referral bumps the lifetime total; every
//! `REWARD_THRESHOLD`-th referral resets the rolling counter and, while
//! under the cap, extends the referrer's subscription.

use chrono::{DateTime, Duration, Utc};

use crate::models::User;
use crate::time_utils::{format_utc_rfc3339, parse_utc_rfc3339};

/// Rolling referrals needed for one reward.
pub const REWARD_THRESHOLD: u32 = 3;
/// Days of subscription granted per reward.
pub const REWARD_DAYS: i64 = 7;
/// Lifetime cap on rewards for a single referrer.
pub const MAX_REWARDS: u32 = 12;
/// Days of Pro trial granted to the referred user.
pub const TRIAL_DAYS: i64 = 3;

/// Referral code length in characters.
pub const CODE_LENGTH: usize = 8;
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Updated referrer counters produced by crediting one referral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralCredit {
    pub referrals: u32,
    pub total_referrals: u32,
    pub referral_rewards: u32,
    /// New expiry to persist, present only when this referral produced a
    /// reward extension. A lifetime referrer (expiry `None`) keeps `None`.
    pub extended_expiry: Option<String>,
    /// Whether this credit consumed one of the referrer's reward slots.
    pub reward_granted: bool,
}

/// Credit one incoming referral against a referrer's current counters.
///
/// Total function: every input produces a valid transition. The rolling
/// counter resets at the threshold whether or not the cap blocks the
/// reward itself.
pub fn credit_referral(referrer: &User, now: DateTime<Utc>) -> ReferralCredit {
    let rolling = referrer.referrals + 1;
    let total_referrals = referrer.total_referrals + 1;

    if rolling < REWARD_THRESHOLD {
        return ReferralCredit {
            referrals: rolling,
            total_referrals,
            referral_rewards: referrer.referral_rewards,
            extended_expiry: None,
            reward_granted: false,
        };
    }

    // Threshold reached: the rolling counter resets unconditionally.
    if referrer.referral_rewards >= MAX_REWARDS {
        return ReferralCredit {
            referrals: 0,
            total_referrals,
            referral_rewards: referrer.referral_rewards,
            extended_expiry: None,
            reward_granted: false,
        };
    }

    // A lifetime subscription (expiry None) absorbs the extension: the
    // reward slot is consumed but the expiry stays perpetual.
    let extended_expiry = referrer.subscription_expiry.as_deref().map(|current| {
        let base = parse_utc_rfc3339(current)
            .map(|expiry| expiry.max(now))
            .unwrap_or(now);
        format_utc_rfc3339(base + Duration::days(REWARD_DAYS))
    });

    ReferralCredit {
        referrals: 0,
        total_referrals,
        referral_rewards: referrer.referral_rewards + 1,
        extended_expiry,
        reward_granted: true,
    }
}

/// Entitlement overrides for a user created through a referral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialGrant {
    pub subscription_expiry: String,
    pub applied_referral_code: String,
    pub referred_by: String,
    pub referral_applied_at: String,
}

/// Trial grant for the referred user: Pro for `TRIAL_DAYS` from `now`.
pub fn trial_grant(code: &str, referrer_uid: &str, now: DateTime<Utc>) -> TrialGrant {
    TrialGrant {
        subscription_expiry: format_utc_rfc3339(now + Duration::days(TRIAL_DAYS)),
        applied_referral_code: code.to_string(),
        referred_by: referrer_uid.to_string(),
        referral_applied_at: format_utc_rfc3339(now),
    }
}

/// Normalize a user-supplied referral code for lookup.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Sample a random candidate code.
///
/// Uppercase alphanumeric, fixed length. The modulo over the charset skews
/// the distribution slightly; codes only need to be collision-checked, not
/// unpredictable.
pub fn sample_code(rng: &ring::rand::SystemRandom) -> Option<String> {
    use ring::rand::SecureRandom;

    let mut bytes = [0u8; CODE_LENGTH];
    rng.fill(&mut bytes).ok()?;

    Some(
        bytes
            .iter()
            .map(|b| CODE_CHARSET[*b as usize % CODE_CHARSET.len()] as char)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(s: &str) -> DateTime<Utc> {
        parse_utc_rfc3339(s).unwrap()
    }

    fn referrer(referrals: u32, total: u32, rewards: u32, expiry: Option<&str>) -> User {
        User {
            uid: "referrer-1".to_string(),
            email: "ref@example.com".to_string(),
            display_name: "Referrer".to_string(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
            referrals,
            total_referrals: total,
            referral_rewards: rewards,
            subscription_expiry: expiry.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_credit_below_threshold_only_counts() {
        let now = utc("2025-06-01T12:00:00Z");
        let credit = credit_referral(&referrer(0, 5, 2, Some("2025-07-01T00:00:00Z")), now);

        assert_eq!(credit.referrals, 1);
        assert_eq!(credit.total_referrals, 6);
        assert_eq!(credit.referral_rewards, 2);
        assert_eq!(credit.extended_expiry, None);
        assert!(!credit.reward_granted);
    }

    #[test]
    fn test_third_referral_grants_reward_and_resets() {
        // Expiry still in the future: extend from the expiry, not from now.
        let now = utc("2025-06-01T12:00:00Z");
        let credit = credit_referral(&referrer(2, 2, 0, Some("2025-06-10T00:00:00Z")), now);

        assert_eq!(credit.referrals, 0);
        assert_eq!(credit.total_referrals, 3);
        assert_eq!(credit.referral_rewards, 1);
        assert_eq!(
            credit.extended_expiry.as_deref(),
            Some("2025-06-17T00:00:00Z")
        );
        assert!(credit.reward_granted);
    }

    #[test]
    fn test_reward_extends_from_now_when_expiry_passed() {
        let now = utc("2025-06-01T12:00:00Z");
        let credit = credit_referral(&referrer(2, 8, 3, Some("2025-01-01T00:00:00Z")), now);

        // Never extends from a past expiry.
        assert_eq!(
            credit.extended_expiry.as_deref(),
            Some("2025-06-08T12:00:00Z")
        );
        assert_eq!(credit.referral_rewards, 4);
    }

    #[test]
    fn test_cap_blocks_reward_but_still_resets() {
        let now = utc("2025-06-01T12:00:00Z");
        let credit = credit_referral(
            &referrer(2, 40, MAX_REWARDS, Some("2025-06-10T00:00:00Z")),
            now,
        );

        assert_eq!(credit.referrals, 0, "counter resets even at the cap");
        assert_eq!(credit.total_referrals, 41);
        assert_eq!(credit.referral_rewards, MAX_REWARDS);
        assert_eq!(credit.extended_expiry, None);
    }

    #[test]
    fn test_lifetime_referrer_keeps_lifetime() {
        let now = utc("2025-06-01T12:00:00Z");
        let credit = credit_referral(&referrer(2, 2, 0, None), now);

        assert_eq!(credit.extended_expiry, None);
        assert_eq!(credit.referral_rewards, 1);
        assert_eq!(credit.referrals, 0);
    }

    #[test]
    fn test_long_sequence_totals_and_cap() {
        // Feed N referrals through the ledger one at a time.
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut user = referrer(0, 0, 0, Some("2025-06-02T00:00:00Z"));
        let n = 100;

        for _ in 0..n {
            let credit = credit_referral(&user, now);
            user.referrals = credit.referrals;
            user.total_referrals = credit.total_referrals;
            user.referral_rewards = credit.referral_rewards;
            if let Some(expiry) = credit.extended_expiry {
                user.subscription_expiry = Some(expiry);
            }
        }

        assert_eq!(user.total_referrals, n, "lifetime total is exact");
        assert_eq!(user.referral_rewards, MAX_REWARDS, "rewards never pass the cap");
        // 100 referrals = 33 threshold crossings, rolling counter left at 1.
        assert_eq!(user.referrals, 1);
    }

    #[test]
    fn test_every_third_resets_regardless_of_cap() {
        let now = utc("2025-06-01T12:00:00Z");
        let mut user = referrer(0, 0, MAX_REWARDS, Some("2025-06-10T00:00:00Z"));

        for i in 1..=9u32 {
            let credit = credit_referral(&user, now);
            if i % REWARD_THRESHOLD == 0 {
                assert_eq!(credit.referrals, 0, "referral {} should reset", i);
            } else {
                assert_eq!(credit.referrals, i % REWARD_THRESHOLD);
            }
            user.referrals = credit.referrals;
            user.total_referrals = credit.total_referrals;
            user.referral_rewards = credit.referral_rewards;
        }

        assert_eq!(user.referral_rewards, MAX_REWARDS);
        assert_eq!(user.subscription_expiry.as_deref(), Some("2025-06-10T00:00:00Z"));
    }

    #[test]
    fn test_trial_grant_fields() {
        let now = utc("2025-06-01T12:00:00Z");
        let grant = trial_grant("ABCD1234", "referrer-1", now);

        assert_eq!(grant.subscription_expiry, "2025-06-04T12:00:00Z");
        assert_eq!(grant.applied_referral_code, "ABCD1234");
        assert_eq!(grant.referred_by, "referrer-1");
        assert_eq!(grant.referral_applied_at, "2025-06-01T12:00:00Z");
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  ab12cd34 "), "AB12CD34");
        assert_eq!(normalize_code("ALREADY1"), "ALREADY1");
        assert_eq!(normalize_code(""), "");
    }

    #[test]
    fn test_sample_code_shape() {
        let rng = ring::rand::SystemRandom::new();

        for _ in 0..20 {
            let code = sample_code(&rng).expect("rng should not fail");
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }
}
