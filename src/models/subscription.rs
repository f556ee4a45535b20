// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription expiry evaluation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::time_utils::{format_utc_rfc3339, parse_utc_rfc3339};

/// Outcome of evaluating a subscription record at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// No expiry recorded: perpetual entitlement. Informational only —
    /// access still requires `is_pro`.
    Lifetime,
    Active,
    Expired,
    /// No profile document for the requested user.
    NotFound,
}

/// Mutation to persist when a subscription has lapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryMutation {
    pub expired_at: String,
}

/// Evaluation result: the status plus the revocation to apply, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub status: SubscriptionStatus,
    pub mutation: Option<ExpiryMutation>,
}

/// Map `(now, expiry)` to a subscription status.
///
/// Total over its inputs: an unparseable stored expiry is treated as
/// already lapsed rather than silently keeping access open.
pub fn evaluate_expiry(now: DateTime<Utc>, expiry: Option<&str>) -> Evaluation {
    let Some(raw) = expiry else {
        return Evaluation {
            status: SubscriptionStatus::Lifetime,
            mutation: None,
        };
    };

    let lapsed = match parse_utc_rfc3339(raw) {
        Some(expiry) => expiry < now,
        None => true,
    };

    if lapsed {
        Evaluation {
            status: SubscriptionStatus::Expired,
            mutation: Some(ExpiryMutation {
                expired_at: format_utc_rfc3339(now),
            }),
        }
    } else {
        Evaluation {
            status: SubscriptionStatus::Active,
            mutation: None,
        }
    }
}
