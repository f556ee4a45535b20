// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod codes;
pub mod identity;
pub mod signup;

pub use codes::CodeService;
pub use identity::{IdentityAccount, IdentityClient};
pub use signup::{SignupOutcome, SignupService};
