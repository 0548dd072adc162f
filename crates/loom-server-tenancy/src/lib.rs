// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Multi-tenant context propagation and layered authorization for Loom.
//!
//! This crate isolates the tenant, user, roles and permissions of each request
//! or task and answers authorization questions against them.
//!
//! # Architecture
//!
//! - `context` - Task-scoped [`ContextStore`] binding a [`TenantContext`]
//! - `rbac` - [`RoleManager`] with role definitions and permission implication
//! - `abac` - [`PolicyEngine`] evaluating attribute conditions with deny-overrides
//! - `authz` - [`AuthorizationManager`] combining RBAC and ABAC, with optional caching
//! - `resolve` - [`TenantResolver`] mapping request headers to a tenant
//! - `store` - [`TenantDataStore`] persistence trait and an in-memory implementation
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use loom_server_tenancy::*;
//!
//! let store = ContextStore::new();
//! let authz = AuthorizationManager::new(AuthorizationOptions::new(
//! 	Arc::new(RoleManager::default()),
//! 	Arc::new(PolicyEngine::new()),
//! 	store.clone(),
//! ));
//!
//! let context = resolver.resolve_context(&headers, Some(user)).await?;
//! store
//! 	.run(context, async {
//! 		authz.require("data:write", None)?;
//! 		handle_request().await
//! 	})
//! 	.await?;
//! ```

pub mod abac;
pub mod authz;
pub mod context;
pub mod error;
pub mod pattern;
pub mod rbac;
pub mod resolve;
pub mod store;
pub mod types;

pub use abac::{Policy, PolicyContext, PolicyDecision, PolicyEngine};
pub use authz::{AuthorizationDecision, AuthorizationManager, AuthorizationOptions, CacheKey};
pub use context::ContextStore;
pub use error::{Result, TenancyError};
pub use rbac::{RoleDefinition, RoleManager, RoleManagerOptions};
pub use resolve::{ResolutionStrategy, TenantResolver};
pub use store::{InMemoryTenantStore, NewTenant, TenantDataStore, TenantUpdate};
pub use types::{Tenant, TenantContext, TenantId, TenantStatus, TenantUser, User, UserId};
