// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Attribute-based access control.
//!
//! Policies select requests by action and resource-type glob patterns and
//! then test conditions against the serialized [`PolicyContext`]. A satisfied
//! deny always wins over a satisfied allow; with neither, access is denied.

mod condition;
pub mod engine;
pub mod templates;
pub mod types;

pub use engine::{PolicyDecision, PolicyEngine};
pub use templates::{ownership_policy, role_policy, time_window_policy};
pub use types::{
	Condition, CustomEvaluator, Effect, Environment, Operator, Policy, PolicyContext, Resource,
	Subject,
};
