// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Constructors for commonly used policies.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::types::{Condition, Policy, PolicyContext};

/// Allows `<resource_type>:read`, `:write` and `:delete` when the resource's
/// `ownerId` attribute equals the subject id.
pub fn ownership_policy(id: impl Into<String>, resource_type: impl Into<String>) -> Policy {
	let resource_type = resource_type.into();
	let actions = ["read", "write", "delete"].map(|verb| format!("{resource_type}:{verb}"));

	Policy::allow(id, actions, [resource_type])
		.with_description("Owners may read, write and delete their own resources")
		.with_condition(Condition::custom("resource.attributes.ownerId", is_owner))
}

fn is_owner(context: &PolicyContext) -> bool {
	match (
		context.resource.attributes.get("ownerId").and_then(Value::as_str),
		context.subject.id.as_deref(),
	) {
		(Some(owner), Some(subject)) => owner == subject,
		_ => false,
	}
}

/// Allows `actions` on `resources` for subjects holding `role`.
pub fn role_policy(
	id: impl Into<String>,
	role: impl Into<String>,
	actions: impl IntoIterator<Item = impl Into<String>>,
	resources: impl IntoIterator<Item = impl Into<String>>,
) -> Policy {
	Policy::allow(id, actions, resources)
		.with_condition(Condition::contains("subject.roles", role.into()))
}

/// Allows `actions` on `resources` while the request timestamp lies within
/// `[start, end]`.
pub fn time_window_policy(
	id: impl Into<String>,
	actions: impl IntoIterator<Item = impl Into<String>>,
	resources: impl IntoIterator<Item = impl Into<String>>,
	start: DateTime<Utc>,
	end: DateTime<Utc>,
) -> Policy {
	Policy::allow(id, actions, resources).with_condition(Condition::custom(
		"environment.timestamp",
		move |ctx| (start..=end).contains(&ctx.environment.timestamp),
	))
}
