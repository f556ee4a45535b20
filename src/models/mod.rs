// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod referral;
pub mod subscription;
pub mod user;

pub use referral::{ReferralCredit, TrialGrant};
pub use subscription::{Evaluation, ExpiryMutation, SubscriptionStatus};
pub use user::User;
