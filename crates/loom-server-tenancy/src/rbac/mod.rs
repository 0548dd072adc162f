// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role-based permission expansion.
//!
//! A [`RoleManager`] holds role definitions and a permission implication
//! hierarchy. Expanding a role yields its declared permissions plus, for each
//! declared permission that is a key of the hierarchy, the permissions it
//! implies. Expansion is a single hop: implied permissions are not themselves
//! expanded again.
//!
//! Membership checks here are exact string comparisons. Wildcard permissions
//! such as `users:*` are only interpreted by [`crate::AuthorizationManager`].
//!
//! # Concurrency
//!
//! State is copy-on-write. Readers clone an `Arc` snapshot and never block
//! writers; each mutation replaces the snapshot atomically, so a reader never
//! observes a half-applied registration.

mod defaults;

pub use defaults::{default_roles, ADMIN_ROLE, MEMBER_ROLE, VIEWER_ROLE};

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::TenancyError;

/// A named set of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
	pub name: String,
	pub permissions: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

impl RoleDefinition {
	pub fn new(
		name: impl Into<String>,
		permissions: impl IntoIterator<Item = impl Into<String>>,
	) -> Self {
		Self {
			name: name.into(),
			permissions: permissions.into_iter().map(Into::into).collect(),
			description: None,
		}
	}

	/// Builder: set the description.
	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	/// Rejects an empty name or an empty permission string.
	pub fn validate(&self) -> Result<(), TenancyError> {
		if self.name.trim().is_empty() {
			return Err(TenancyError::InvalidRole("role name is empty".to_string()));
		}
		if self.permissions.iter().any(|p| p.trim().is_empty()) {
			return Err(TenancyError::InvalidRole(format!(
				"role '{}' has an empty permission",
				self.name
			)));
		}
		Ok(())
	}
}

/// Construction options for [`RoleManager`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleManagerOptions {
	#[serde(default)]
	pub roles: Vec<RoleDefinition>,
	#[serde(default)]
	pub permission_hierarchy: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default)]
struct RoleRegistry {
	roles: HashMap<String, RoleDefinition>,
	hierarchy: HashMap<String, BTreeSet<String>>,
}

impl RoleRegistry {
	fn expand(&self, role: &str) -> Vec<String> {
		let Some(def) = self.roles.get(role) else {
			return Vec::new();
		};

		let mut seen = HashSet::new();
		let mut expanded = Vec::new();
		for permission in &def.permissions {
			if seen.insert(permission.as_str()) {
				expanded.push(permission.clone());
			}
		}
		for permission in &def.permissions {
			if let Some(implied) = self.hierarchy.get(permission) {
				for child in implied {
					if seen.insert(child.as_str()) {
						expanded.push(child.clone());
					}
				}
			}
		}
		expanded
	}
}

/// Registry of roles and permission implications.
#[derive(Debug)]
pub struct RoleManager {
	state: RwLock<Arc<RoleRegistry>>,
}

impl Default for RoleManager {
	fn default() -> Self {
		Self::new(RoleManagerOptions::default())
	}
}

impl RoleManager {
	/// Creates a manager seeded with [`default_roles`], then applies `options`.
	///
	/// Configured roles replace same-named defaults. Invalid configured roles
	/// are skipped with a warning; use [`RoleManager::try_new`] to reject them.
	pub fn new(options: RoleManagerOptions) -> Self {
		let manager = Self::empty();
		for role in default_roles() {
			manager.insert_role(role);
		}
		for role in options.roles {
			if let Err(e) = manager.register_role(role) {
				tracing::warn!(error = %e, "skipping invalid configured role");
			}
		}
		manager.set_permission_hierarchy(options.permission_hierarchy);
		manager
	}

	/// Like [`RoleManager::new`], but fails on the first invalid role.
	pub fn try_new(options: RoleManagerOptions) -> Result<Self, TenancyError> {
		let manager = Self::empty();
		for role in default_roles() {
			manager.insert_role(role);
		}
		for role in options.roles {
			manager.register_role(role)?;
		}
		manager.set_permission_hierarchy(options.permission_hierarchy);
		Ok(manager)
	}

	/// Creates a manager with no roles at all.
	pub fn empty() -> Self {
		Self {
			state: RwLock::new(Arc::new(RoleRegistry::default())),
		}
	}

	fn snapshot(&self) -> Arc<RoleRegistry> {
		Arc::clone(&self.state.read())
	}

	fn update<R>(&self, f: impl FnOnce(&mut RoleRegistry) -> R) -> R {
		let mut guard = self.state.write();
		f(Arc::make_mut(&mut guard))
	}

	fn insert_role(&self, role: RoleDefinition) {
		self.update(|registry| {
			registry.roles.insert(role.name.clone(), role);
		});
	}

	/// Inserts or fully replaces the role with the same name.
	#[instrument(level = "debug", skip(self, role), fields(role = %role.name))]
	pub fn register_role(&self, role: RoleDefinition) -> Result<(), TenancyError> {
		role.validate()?;
		debug!(permissions = role.permissions.len(), "registering role");
		self.insert_role(role);
		Ok(())
	}

	pub fn get_role(&self, name: &str) -> Option<RoleDefinition> {
		self.snapshot().roles.get(name).cloned()
	}

	/// All registered roles, sorted by name.
	pub fn roles(&self) -> Vec<RoleDefinition> {
		let snapshot = self.snapshot();
		let mut roles: Vec<_> = snapshot.roles.values().cloned().collect();
		roles.sort_by(|a, b| a.name.cmp(&b.name));
		roles
	}

	/// Removes a role. Returns false if it did not exist.
	pub fn remove_role(&self, name: &str) -> bool {
		if !self.snapshot().roles.contains_key(name) {
			return false;
		}
		self.update(|registry| registry.roles.remove(name).is_some())
	}

	/// Declared permissions of `name` plus their one-hop implications.
	///
	/// Returns an empty list for an unknown role.
	pub fn get_role_permissions(&self, name: &str) -> Vec<String> {
		self.snapshot().expand(name)
	}

	/// De-duplicated union of [`RoleManager::get_role_permissions`] over `names`.
	pub fn get_permissions_for_roles<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
		let snapshot = self.snapshot();
		let mut seen = HashSet::new();
		let mut permissions = Vec::new();
		for name in names {
			for permission in snapshot.expand(name.as_ref()) {
				if seen.insert(permission.clone()) {
					permissions.push(permission);
				}
			}
		}
		permissions
	}

	pub fn role_has_permission(&self, name: &str, permission: &str) -> bool {
		self
			.get_role_permissions(name)
			.iter()
			.any(|p| p == permission)
	}

	pub fn roles_have_permission<S: AsRef<str>>(&self, names: &[S], permission: &str) -> bool {
		self
			.get_permissions_for_roles(names)
			.iter()
			.any(|p| p == permission)
	}

	/// Adds or overwrites the given parents; parents not mentioned keep their
	/// implied sets.
	pub fn set_permission_hierarchy(&self, mapping: HashMap<String, Vec<String>>) {
		if mapping.is_empty() {
			return;
		}
		self.update(|registry| {
			for (parent, children) in mapping {
				registry
					.hierarchy
					.insert(parent, children.into_iter().collect());
			}
		});
	}

	/// Merges `children` into the implied set of `parent`.
	pub fn add_permission_implication(
		&self,
		parent: impl Into<String>,
		children: impl IntoIterator<Item = impl Into<String>>,
	) {
		let parent = parent.into();
		let children: Vec<String> = children.into_iter().map(Into::into).collect();
		self.update(|registry| {
			registry
				.hierarchy
				.entry(parent)
				.or_default()
				.extend(children);
		});
	}

	/// Snapshot of the implication hierarchy.
	pub fn permission_hierarchy(&self) -> HashMap<String, Vec<String>> {
		self
			.snapshot()
			.hierarchy
			.iter()
			.map(|(parent, children)| (parent.clone(), children.iter().cloned().collect()))
			.collect()
	}

	/// Replaces the permission list of an existing role.
	pub fn update_role_permissions(
		&self,
		name: &str,
		permissions: Vec<String>,
	) -> Result<(), TenancyError> {
		self.mutate_role(name, |role| role.permissions = permissions)
	}

	/// Appends permissions the role does not already declare.
	pub fn add_role_permissions(
		&self,
		name: &str,
		permissions: Vec<String>,
	) -> Result<(), TenancyError> {
		self.mutate_role(name, |role| {
			for permission in permissions {
				if !role.permissions.contains(&permission) {
					role.permissions.push(permission);
				}
			}
		})
	}

	/// Removes the given permissions from the role.
	pub fn remove_role_permissions(
		&self,
		name: &str,
		permissions: &[String],
	) -> Result<(), TenancyError> {
		self.mutate_role(name, |role| {
			role.permissions.retain(|p| !permissions.contains(p));
		})
	}

	fn mutate_role(
		&self,
		name: &str,
		f: impl FnOnce(&mut RoleDefinition),
	) -> Result<(), TenancyError> {
		let mut guard = self.state.write();
		let Some(current) = guard.roles.get(name) else {
			return Err(TenancyError::RoleNotFound(name.to_string()));
		};
		let mut role = current.clone();
		f(&mut role);
		role.validate()?;
		Arc::make_mut(&mut guard).roles.insert(name.to_string(), role);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn sorted(mut v: Vec<String>) -> Vec<String> {
		v.sort();
		v
	}

	fn hierarchy(entries: &[(&str, Vec<&str>)]) -> HashMap<String, Vec<String>> {
		entries
			.iter()
			.map(|(parent, children)| {
				(
					parent.to_string(),
					children.iter().map(|c| c.to_string()).collect(),
				)
			})
			.collect()
	}

	#[test]
	fn default_roles_are_seeded() {
		let manager = RoleManager::default();
		assert!(manager.get_role(ADMIN_ROLE).is_some());
		assert!(manager.get_role(MEMBER_ROLE).is_some());
		assert!(manager.get_role(VIEWER_ROLE).is_some());
		assert!(manager.role_has_permission(VIEWER_ROLE, "data:read"));
		assert!(!manager.role_has_permission(VIEWER_ROLE, "data:write"));
	}

	#[test]
	fn configured_role_overrides_default() {
		let manager = RoleManager::new(RoleManagerOptions {
			roles: vec![RoleDefinition::new(ADMIN_ROLE, ["tenant:manage"])],
			permission_hierarchy: HashMap::new(),
		});
		assert_eq!(manager.get_role_permissions(ADMIN_ROLE), vec!["tenant:manage"]);
		assert!(manager.role_has_permission(ADMIN_ROLE, "tenant:manage"));
		assert!(!manager.role_has_permission(ADMIN_ROLE, "tenant:read"));
	}

	#[test]
	fn unknown_role_expands_to_nothing() {
		let manager = RoleManager::default();
		assert!(manager.get_role_permissions("nonexistent").is_empty());
		assert!(manager.get_role("nonexistent").is_none());
		assert!(!manager.role_has_permission("nonexistent", "data:read"));
	}

	#[test]
	fn hierarchy_expands_one_level() {
		let manager = RoleManager::empty();
		manager
			.register_role(RoleDefinition::new("R", ["p"]))
			.unwrap();
		manager.set_permission_hierarchy(hierarchy(&[("p", vec!["q", "r"])]));

		assert_eq!(sorted(manager.get_role_permissions("R")), vec!["p", "q", "r"]);
	}

	#[test]
	fn hierarchy_is_not_transitive() {
		let manager = RoleManager::empty();
		manager
			.register_role(RoleDefinition::new("admin", ["admin:*"]))
			.unwrap();
		manager.set_permission_hierarchy(hierarchy(&[
			("admin:*", vec!["users:manage"]),
			("users:manage", vec!["users:read"]),
		]));

		let permissions = sorted(manager.get_role_permissions("admin"));
		assert_eq!(permissions, vec!["admin:*", "users:manage"]);
		assert!(!manager.role_has_permission("admin", "users:read"));
	}

	#[test]
	fn expansion_has_no_duplicates() {
		let manager = RoleManager::empty();
		manager
			.register_role(RoleDefinition::new("R", ["p", "q", "p"]))
			.unwrap();
		manager.set_permission_hierarchy(hierarchy(&[("p", vec!["q", "r"])]));

		assert_eq!(sorted(manager.get_role_permissions("R")), vec!["p", "q", "r"]);
	}

	#[test]
	fn set_permission_hierarchy_merges_by_parent() {
		let manager = RoleManager::empty();
		manager.set_permission_hierarchy(hierarchy(&[("a", vec!["a1"]), ("b", vec!["b1"])]));
		manager.set_permission_hierarchy(hierarchy(&[("a", vec!["a2"])]));

		let current = manager.permission_hierarchy();
		assert_eq!(current.get("a"), Some(&vec!["a2".to_string()]));
		assert_eq!(current.get("b"), Some(&vec!["b1".to_string()]));
	}

	#[test]
	fn add_permission_implication_unions_children() {
		let manager = RoleManager::empty();
		manager.add_permission_implication("a", ["a1"]);
		manager.add_permission_implication("a", ["a2", "a1"]);

		let current = manager.permission_hierarchy();
		assert_eq!(
			current.get("a"),
			Some(&vec!["a1".to_string(), "a2".to_string()])
		);
	}

	#[test]
	fn registration_replaces_instead_of_merging() {
		let manager = RoleManager::empty();
		manager
			.register_role(RoleDefinition::new("editor", ["docs:read", "docs:write"]))
			.unwrap();
		manager
			.register_role(RoleDefinition::new("editor", ["docs:publish"]))
			.unwrap();

		assert_eq!(manager.get_role_permissions("editor"), vec!["docs:publish"]);
	}

	#[test]
	fn register_rejects_empty_name_and_permission() {
		let manager = RoleManager::empty();
		assert!(matches!(
			manager.register_role(RoleDefinition::new("", ["a"])),
			Err(TenancyError::InvalidRole(_))
		));
		assert!(matches!(
			manager.register_role(RoleDefinition::new("r", [""])),
			Err(TenancyError::InvalidRole(_))
		));
	}

	#[test]
	fn try_new_rejects_invalid_configured_role() {
		let result = RoleManager::try_new(RoleManagerOptions {
			roles: vec![RoleDefinition::new(" ", ["a"])],
			permission_hierarchy: HashMap::new(),
		});
		assert!(result.is_err());
	}

	#[test]
	fn permissions_for_roles_is_deduplicated_union() {
		let manager = RoleManager::default();
		let permissions = manager.get_permissions_for_roles(&[MEMBER_ROLE, VIEWER_ROLE]);
		assert_eq!(
			sorted(permissions),
			vec!["data:read", "data:write", "profile:read", "profile:write"]
		);
		assert!(manager.roles_have_permission(&[VIEWER_ROLE, MEMBER_ROLE], "data:write"));
		assert!(!manager.roles_have_permission(&[VIEWER_ROLE], "data:write"));
	}

	#[test]
	fn exact_membership_ignores_wildcards() {
		let manager = RoleManager::default();
		assert!(manager.role_has_permission(ADMIN_ROLE, "users:*"));
		assert!(!manager.role_has_permission(ADMIN_ROLE, "users:read"));
	}

	#[test]
	fn mutators_fail_for_unknown_role() {
		let manager = RoleManager::default();
		assert!(matches!(
			manager.update_role_permissions("ghost", vec!["a".into()]),
			Err(TenancyError::RoleNotFound(name)) if name == "ghost"
		));
		assert!(matches!(
			manager.add_role_permissions("ghost", vec!["a".into()]),
			Err(TenancyError::RoleNotFound(_))
		));
		assert!(matches!(
			manager.remove_role_permissions("ghost", &["a".to_string()]),
			Err(TenancyError::RoleNotFound(_))
		));
	}

	#[test]
	fn mutators_edit_existing_role() {
		let manager = RoleManager::empty();
		manager
			.register_role(RoleDefinition::new("ops", ["deploy:read"]))
			.unwrap();

		manager
			.add_role_permissions("ops", vec!["deploy:run".into(), "deploy:read".into()])
			.unwrap();
		assert_eq!(
			manager.get_role_permissions("ops"),
			vec!["deploy:read", "deploy:run"]
		);

		manager
			.remove_role_permissions("ops", &["deploy:read".to_string()])
			.unwrap();
		assert_eq!(manager.get_role_permissions("ops"), vec!["deploy:run"]);

		manager
			.update_role_permissions("ops", vec!["deploy:*".into()])
			.unwrap();
		assert_eq!(manager.get_role_permissions("ops"), vec!["deploy:*"]);
	}

	#[test]
	fn mutators_reject_empty_permission() {
		let manager = RoleManager::empty();
		manager
			.register_role(RoleDefinition::new("ops", ["deploy:read"]))
			.unwrap();

		assert!(matches!(
			manager.add_role_permissions("ops", vec![String::new()]),
			Err(TenancyError::InvalidRole(_))
		));
		assert!(matches!(
			manager.update_role_permissions("ops", vec!["deploy:run".into(), " ".into()]),
			Err(TenancyError::InvalidRole(_))
		));
		assert_eq!(manager.get_role_permissions("ops"), vec!["deploy:read"]);
	}

	#[test]
	fn remove_role() {
		let manager = RoleManager::default();
		assert!(manager.remove_role(VIEWER_ROLE));
		assert!(!manager.remove_role(VIEWER_ROLE));
		assert!(manager.get_role_permissions(VIEWER_ROLE).is_empty());
	}

	#[test]
	fn snapshots_are_unaffected_by_later_writes() {
		let manager = RoleManager::default();
		let before = manager.snapshot();
		manager
			.register_role(RoleDefinition::new("late", ["x:y"]))
			.unwrap();
		assert!(!before.roles.contains_key("late"));
		assert!(manager.snapshot().roles.contains_key("late"));
	}

	proptest! {
		/// Expansion always contains every declared permission exactly once.
		#[test]
		fn prop_expansion_contains_declared_once(
			permissions in prop::collection::vec("[a-z]{1,6}:[a-z]{1,6}", 1..8),
		) {
			let manager = RoleManager::empty();
			manager.register_role(RoleDefinition::new("r", permissions.clone())).unwrap();
			let expanded = manager.get_role_permissions("r");
			for p in &permissions {
				prop_assert_eq!(expanded.iter().filter(|e| *e == p).count(), 1);
			}
		}

		/// The union over several roles is the same regardless of order.
		#[test]
		fn prop_union_is_order_independent(swap in any::<bool>()) {
			let manager = RoleManager::default();
			let names = if swap {
				[MEMBER_ROLE, ADMIN_ROLE]
			} else {
				[ADMIN_ROLE, MEMBER_ROLE]
			};
			let a = sorted(manager.get_permissions_for_roles(&names));
			let b = sorted(manager.get_permissions_for_roles(&[ADMIN_ROLE, MEMBER_ROLE]));
			prop_assert_eq!(a, b);
		}
	}
}
