// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use std::collections::HashMap;

use loom_server_tenancy::{Policy, RoleDefinition};
use serde::Deserialize;

use crate::sections::{AuthorizationConfigLayer, LoggingConfigLayer, ResolutionConfigLayer};

/// Tenancy configuration layer - all fields are Option for merging.
///
/// List-valued fields are replaced wholesale by a later layer that sets them.
/// Hierarchy entries are merged per parent permission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenancyConfigLayer {
	#[serde(default)]
	pub authorization: Option<AuthorizationConfigLayer>,
	#[serde(default)]
	pub roles: Option<Vec<RoleDefinition>>,
	#[serde(default)]
	pub permission_hierarchy: Option<HashMap<String, Vec<String>>>,
	#[serde(default)]
	pub policies: Option<Vec<Policy>>,
	#[serde(default)]
	pub resolution: Option<ResolutionConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl TenancyConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: TenancyConfigLayer) {
		merge_option(
			&mut self.authorization,
			other.authorization,
			AuthorizationConfigLayer::merge,
		);
		if other.roles.is_some() {
			self.roles = other.roles;
		}
		merge_option(
			&mut self.permission_hierarchy,
			other.permission_hierarchy,
			|base, other| base.extend(other),
		);
		if other.policies.is_some() {
			self.policies = other.policies;
		}
		merge_option(
			&mut self.resolution,
			other.resolution,
			ResolutionConfigLayer::merge,
		);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}
