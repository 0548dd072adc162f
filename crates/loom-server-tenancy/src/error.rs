// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenancy and authorization error types.

use thiserror::Error;

use crate::types::TenantStatus;

/// Errors that can occur in tenant resolution, role management and authorization.
#[derive(Debug, Error)]
pub enum TenancyError {
	// =========================================================================
	// Configuration Errors
	// =========================================================================
	/// A role mutator was called for a role that was never registered.
	#[error("role not found: {0}")]
	RoleNotFound(String),

	/// A role definition was rejected at registration.
	#[error("invalid role definition: {0}")]
	InvalidRole(String),

	// =========================================================================
	// Tenant Errors
	// =========================================================================
	/// The tenant does not exist in the data store.
	#[error("tenant not found: {0}")]
	TenantNotFound(String),

	/// The tenant exists but is not active.
	#[error("tenant {id} is {status}")]
	TenantInactive { id: String, status: TenantStatus },

	/// No tenant identifier could be extracted from the request.
	#[error("could not resolve tenant from request")]
	TenantNotResolved,

	/// A tenant-scoped operation ran with no bound context.
	#[error("no tenant context")]
	NoTenantContext,

	// =========================================================================
	// Authorization Errors
	// =========================================================================
	/// Access denied by `require`.
	#[error("unauthorized: {action}{} ({reasons})", on_resource(.resource))]
	Unauthorized {
		action: String,
		resource: Option<String>,
		reasons: String,
	},

	// =========================================================================
	// Data Store Errors
	// =========================================================================
	/// The backing tenant data store failed.
	#[error("tenant store error: {0}")]
	Store(String),
}

pub type Result<T> = std::result::Result<T, TenancyError>;

fn on_resource(resource: &Option<String>) -> String {
	resource
		.as_deref()
		.map(|r| format!(" on {r}"))
		.unwrap_or_default()
}

impl TenancyError {
	/// Returns true for errors that should surface as an access rejection
	/// rather than a server fault.
	pub fn is_access_denied(&self) -> bool {
		matches!(
			self,
			TenancyError::Unauthorized { .. } | TenancyError::NoTenantContext
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unauthorized_message_includes_resource() {
		let err = TenancyError::Unauthorized {
			action: "projects:update".to_string(),
			resource: Some("project:p1".to_string()),
			reasons: "no matching policy".to_string(),
		};
		assert_eq!(
			err.to_string(),
			"unauthorized: projects:update on project:p1 (no matching policy)"
		);
		assert!(err.is_access_denied());
	}

	#[test]
	fn unauthorized_message_without_resource() {
		let err = TenancyError::Unauthorized {
			action: "users:read".to_string(),
			resource: None,
			reasons: "no tenant context".to_string(),
		};
		assert_eq!(err.to_string(), "unauthorized: users:read (no tenant context)");
	}

	#[test]
	fn inactive_tenant_message() {
		let err = TenancyError::TenantInactive {
			id: "acme".to_string(),
			status: TenantStatus::Suspended,
		};
		assert_eq!(err.to_string(), "tenant acme is suspended");
		assert!(!err.is_access_denied());
	}
}
