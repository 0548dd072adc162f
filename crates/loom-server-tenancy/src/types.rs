// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for tenancy.
//!
//! - **ID newtypes**: string-backed identifiers ([`TenantId`], [`UserId`]) that
//!   cannot be mixed up with each other
//! - **Entities**: [`Tenant`], [`User`] and the [`TenantUser`] membership, all
//!   persisted through a [`crate::TenantDataStore`]
//! - **Per-operation context**: [`TenantContext`], the tuple bound by
//!   [`crate::ContextStore`] for the lifetime of one request or task

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(String);

		impl $name {
			/// Create a new ID from any string-like value.
			pub fn new(id: impl Into<String>) -> Self {
				Self(id.into())
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(uuid::Uuid::new_v4().to_string())
			}

			/// Get the ID as a string slice.
			pub fn as_str(&self) -> &str {
				&self.0
			}

			/// Get the inner string value.
			pub fn into_inner(self) -> String {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl From<&str> for $name {
			fn from(id: &str) -> Self {
				Self(id.to_string())
			}
		}

		impl From<String> for $name {
			fn from(id: String) -> Self {
				Self(id)
			}
		}

		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
	};
}

define_id_type!(TenantId, "Unique identifier for a tenant.");
define_id_type!(UserId, "Unique identifier for a user.");

// =============================================================================
// Tenant
// =============================================================================

/// Lifecycle state of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
	#[default]
	Active,
	Inactive,
	Suspended,
}

impl TenantStatus {
	pub fn is_active(&self) -> bool {
		matches!(self, TenantStatus::Active)
	}
}

impl fmt::Display for TenantStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TenantStatus::Active => write!(f, "active"),
			TenantStatus::Inactive => write!(f, "inactive"),
			TenantStatus::Suspended => write!(f, "suspended"),
		}
	}
}

/// An isolated customer or organization boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
	pub id: TenantId,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub subdomain: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub domain: Option<String>,
	#[serde(default)]
	pub metadata: Map<String, Value>,
	#[serde(default)]
	pub status: TenantStatus,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Tenant {
	/// Creates an active tenant with no routing keys or metadata.
	pub fn new(id: impl Into<TenantId>, name: impl Into<String>) -> Self {
		let now = Utc::now();
		Self {
			id: id.into(),
			name: name.into(),
			subdomain: None,
			domain: None,
			metadata: Map::new(),
			status: TenantStatus::Active,
			created_at: now,
			updated_at: now,
		}
	}

	/// Builder: set the subdomain routing key.
	pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
		self.subdomain = Some(subdomain.into());
		self
	}

	/// Builder: set the custom domain routing key.
	pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
		self.domain = Some(domain.into());
		self
	}

	/// Builder: set the status.
	pub fn with_status(mut self, status: TenantStatus) -> Self {
		self.status = status;
		self
	}

	/// Builder: insert a metadata entry.
	pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.metadata.insert(key.into(), value.into());
		self
	}
}

// =============================================================================
// User and membership
// =============================================================================

/// A user as seen by the tenancy layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
	pub id: UserId,
	pub email: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default)]
	pub metadata: Map<String, Value>,
}

impl User {
	pub fn new(id: impl Into<UserId>, email: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			email: email.into(),
			name: None,
			metadata: Map::new(),
		}
	}

	/// Builder: set the display name.
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	/// Builder: insert a metadata entry.
	pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.metadata.insert(key.into(), value.into());
		self
	}
}

/// A user's membership in one tenant.
///
/// A user may hold different roles in different tenants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantUser {
	pub user_id: UserId,
	pub tenant_id: TenantId,
	pub roles: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub permissions: Option<Vec<String>>,
	pub joined_at: DateTime<Utc>,
}

impl TenantUser {
	pub fn new(
		user_id: impl Into<UserId>,
		tenant_id: impl Into<TenantId>,
		roles: impl IntoIterator<Item = impl Into<String>>,
	) -> Self {
		Self {
			user_id: user_id.into(),
			tenant_id: tenant_id.into(),
			roles: roles.into_iter().map(Into::into).collect(),
			permissions: None,
			joined_at: Utc::now(),
		}
	}

	/// Builder: set direct permission grants.
	pub fn with_permissions(
		mut self,
		permissions: impl IntoIterator<Item = impl Into<String>>,
	) -> Self {
		self.permissions = Some(permissions.into_iter().map(Into::into).collect());
		self
	}
}

// =============================================================================
// Per-operation context
// =============================================================================

/// The tenant/user/roles/permissions tuple for one logical operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantContext {
	pub tenant: Tenant,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user: Option<User>,
	#[serde(default)]
	pub roles: Vec<String>,
	#[serde(default)]
	pub permissions: Vec<String>,
}

impl TenantContext {
	/// Creates an anonymous context for the given tenant.
	pub fn new(tenant: Tenant) -> Self {
		Self {
			tenant,
			user: None,
			roles: Vec::new(),
			permissions: Vec::new(),
		}
	}

	/// Builds the context for a user acting through a membership.
	pub fn from_membership(tenant: Tenant, user: User, membership: &TenantUser) -> Self {
		Self {
			tenant,
			user: Some(user),
			roles: membership.roles.clone(),
			permissions: membership.permissions.clone().unwrap_or_default(),
		}
	}

	/// Builder: set the user.
	pub fn with_user(mut self, user: User) -> Self {
		self.user = Some(user);
		self
	}

	/// Builder: set the role names.
	pub fn with_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.roles = roles.into_iter().map(Into::into).collect();
		self
	}

	/// Builder: set direct permission grants.
	pub fn with_permissions(
		mut self,
		permissions: impl IntoIterator<Item = impl Into<String>>,
	) -> Self {
		self.permissions = permissions.into_iter().map(Into::into).collect();
		self
	}

	pub fn tenant_id(&self) -> &TenantId {
		&self.tenant.id
	}

	pub fn user_id(&self) -> Option<&UserId> {
		self.user.as_ref().map(|u| &u.id)
	}
}
