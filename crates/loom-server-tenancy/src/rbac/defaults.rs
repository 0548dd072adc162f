// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Roles registered by every new [`super::RoleManager`].

use super::RoleDefinition;

pub const ADMIN_ROLE: &str = "admin";
pub const MEMBER_ROLE: &str = "member";
pub const VIEWER_ROLE: &str = "viewer";

/// Returns the built-in role definitions.
pub fn default_roles() -> Vec<RoleDefinition> {
	vec![
		RoleDefinition::new(ADMIN_ROLE, ["tenant:manage", "users:*", "roles:*", "data:*"])
			.with_description("Full management of the tenant, its users, roles and data"),
		RoleDefinition::new(
			MEMBER_ROLE,
			["data:read", "data:write", "profile:read", "profile:write"],
		)
		.with_description("Read and write access to own data"),
		RoleDefinition::new(VIEWER_ROLE, ["data:read", "profile:read"])
			.with_description("Read-only access"),
	]
}
