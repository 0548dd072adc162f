// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Combined RBAC and ABAC authorization.
//!
//! [`AuthorizationManager`] answers "may the current principal perform this
//! action (on this resource)?" using the context bound in its
//! [`ContextStore`]:
//!
//! 1. **RBAC**: the context's roles are expanded through the [`RoleManager`]
//!    and merged with the context's direct permissions. The action is granted
//!    on an exact match, or on a glob match of any permission containing `*`.
//! 2. **ABAC**: only when a resource is given, the [`PolicyEngine`] evaluates
//!    a [`PolicyContext`] built from the tenant context.
//! 3. The request is allowed when either layer allows it. An ABAC deny does
//!    not revoke an RBAC grant.
//!
//! Decisions may be cached per (tenant, user, roles, permissions, action,
//! resource) for a fixed TTL. Cached entries are not invalidated when roles or
//! policies change; call [`AuthorizationManager::clear_cache`] after mutating
//! either registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::abac::{Environment, PolicyContext, PolicyDecision, PolicyEngine, Resource, Subject};
use crate::context::ContextStore;
use crate::error::TenancyError;
use crate::pattern::matches_pattern;
use crate::rbac::RoleManager;
use crate::types::TenantContext;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(60_000);

const ANONYMOUS: &str = "anonymous";

/// Construction options for [`AuthorizationManager`].
#[derive(Debug, Clone)]
pub struct AuthorizationOptions {
	pub role_manager: Arc<RoleManager>,
	pub policy_engine: Arc<PolicyEngine>,
	pub context_store: ContextStore,
	/// Answer for checks made with no bound context is `!default_deny`.
	pub default_deny: bool,
	pub cache: bool,
	pub cache_ttl: Duration,
}

impl AuthorizationOptions {
	/// Default-deny, uncached options over the given components.
	pub fn new(
		role_manager: Arc<RoleManager>,
		policy_engine: Arc<PolicyEngine>,
		context_store: ContextStore,
	) -> Self {
		Self {
			role_manager,
			policy_engine,
			context_store,
			default_deny: true,
			cache: false,
			cache_ttl: DEFAULT_CACHE_TTL,
		}
	}

	pub fn with_default_deny(mut self, default_deny: bool) -> Self {
		self.default_deny = default_deny;
		self
	}

	/// Builder: enable decision caching with the given TTL.
	pub fn with_cache(mut self, ttl: Duration) -> Self {
		self.cache = true;
		self.cache_ttl = ttl;
		self
	}
}

/// Outcome of [`AuthorizationManager::authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
	pub allowed: bool,
	/// Human-readable explanation, one entry per contributing layer.
	pub reasons: Vec<String>,
}

impl AuthorizationDecision {
	fn denied(reason: impl Into<String>) -> Self {
		Self {
			allowed: false,
			reasons: vec![reason.into()],
		}
	}
}

/// Identity of one cached decision.
///
/// Roles and permissions are sorted so that equivalent contexts share entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
	pub tenant_id: String,
	pub user_id: String,
	pub roles: Vec<String>,
	pub permissions: Vec<String>,
	pub action: String,
	pub resource_type: Option<String>,
	pub resource_id: Option<String>,
}

impl CacheKey {
	pub fn new(context: &TenantContext, action: &str, resource: Option<&Resource>) -> Self {
		let mut roles = context.roles.clone();
		roles.sort();
		roles.dedup();
		let mut permissions = context.permissions.clone();
		permissions.sort();
		permissions.dedup();

		Self {
			tenant_id: context.tenant.id.to_string(),
			user_id: context
				.user_id()
				.map_or_else(|| ANONYMOUS.to_string(), ToString::to_string),
			roles,
			permissions,
			action: action.to_string(),
			resource_type: resource.map(|r| r.resource_type.clone()),
			resource_id: resource.and_then(|r| r.id.clone()),
		}
	}
}

#[derive(Debug, Clone, Copy)]
struct CachedDecision {
	allowed: bool,
	expires_at: Instant,
}

#[derive(Debug)]
struct CacheEntries {
	map: HashMap<CacheKey, CachedDecision>,
	/// Expired entries of keys never looked up again are dropped at this point.
	next_sweep: Instant,
}

#[derive(Debug)]
struct DecisionCache {
	ttl: Duration,
	entries: RwLock<CacheEntries>,
}

impl DecisionCache {
	fn new(ttl: Duration) -> Self {
		Self {
			ttl,
			entries: RwLock::new(CacheEntries {
				map: HashMap::new(),
				next_sweep: Instant::now() + ttl,
			}),
		}
	}

	fn get(&self, key: &CacheKey) -> Option<bool> {
		let now = Instant::now();
		{
			let entries = self.entries.read();
			match entries.map.get(key) {
				Some(entry) if entry.expires_at > now => return Some(entry.allowed),
				Some(_) => {}
				None => return None,
			}
		}
		let mut entries = self.entries.write();
		if entries.map.get(key).is_some_and(|e| e.expires_at <= now) {
			entries.map.remove(key);
		}
		None
	}

	fn insert(&self, key: CacheKey, allowed: bool) {
		let now = Instant::now();
		let mut entries = self.entries.write();
		if now >= entries.next_sweep {
			let before = entries.map.len();
			entries.map.retain(|_, e| e.expires_at > now);
			entries.next_sweep = now + self.ttl;
			debug!(
				evicted = before - entries.map.len(),
				"swept expired authorization decisions"
			);
		}
		entries.map.insert(
			key,
			CachedDecision {
				allowed,
				expires_at: now + self.ttl,
			},
		);
	}

	fn clear(&self) {
		self.entries.write().map.clear();
	}

	fn len(&self) -> usize {
		let now = Instant::now();
		self
			.entries
			.read()
			.map
			.values()
			.filter(|e| e.expires_at > now)
			.count()
	}

	#[cfg(test)]
	fn stored(&self) -> usize {
		self.entries.read().map.len()
	}
}

/// Authorization front door combining [`RoleManager`] and [`PolicyEngine`].
#[derive(Debug)]
pub struct AuthorizationManager {
	role_manager: Arc<RoleManager>,
	policy_engine: Arc<PolicyEngine>,
	context_store: ContextStore,
	default_deny: bool,
	cache: Option<DecisionCache>,
}

impl AuthorizationManager {
	pub fn new(options: AuthorizationOptions) -> Self {
		let cache = options.cache.then(|| DecisionCache::new(options.cache_ttl));
		Self {
			role_manager: options.role_manager,
			policy_engine: options.policy_engine,
			context_store: options.context_store,
			default_deny: options.default_deny,
			cache,
		}
	}

	pub fn role_manager(&self) -> &Arc<RoleManager> {
		&self.role_manager
	}

	pub fn policy_engine(&self) -> &Arc<PolicyEngine> {
		&self.policy_engine
	}

	pub fn context_store(&self) -> &ContextStore {
		&self.context_store
	}

	/// Checks `action` against the currently bound context.
	///
	/// With no bound context the answer is `!default_deny`.
	pub fn can(&self, action: &str, resource: Option<&Resource>) -> bool {
		match self.context_store.get() {
			Some(context) => self.can_with_context(&context, action, resource),
			None => {
				debug!(action, "no tenant context bound");
				!self.default_deny
			}
		}
	}

	/// Checks `action` against an explicit context, consulting the cache.
	#[instrument(
		level = "debug",
		skip_all,
		fields(
			tenant_id = %context.tenant.id,
			action = %action,
			resource_type = resource.map(|r| r.resource_type.as_str()),
		)
	)]
	pub fn can_with_context(
		&self,
		context: &TenantContext,
		action: &str,
		resource: Option<&Resource>,
	) -> bool {
		let key = self
			.cache
			.as_ref()
			.map(|_| CacheKey::new(context, action, resource));

		if let (Some(cache), Some(key)) = (&self.cache, &key) {
			if let Some(allowed) = cache.get(key) {
				debug!(allowed, "authorization cache hit");
				return allowed;
			}
		}

		let allowed = self.evaluate(context, action, resource).allowed;

		if let (Some(cache), Some(key)) = (&self.cache, key) {
			cache.insert(key, allowed);
		}
		allowed
	}

	/// Evaluates `action` like [`AuthorizationManager::can`] and explains the
	/// outcome. Never served from the cache.
	pub fn authorize(&self, action: &str, resource: Option<&Resource>) -> AuthorizationDecision {
		match self.context_store.get() {
			Some(context) => self.evaluate(&context, action, resource),
			None if self.default_deny => AuthorizationDecision::denied("no tenant context"),
			None => AuthorizationDecision {
				allowed: true,
				reasons: vec!["no tenant context; default allow".to_string()],
			},
		}
	}

	/// Fails with [`TenancyError::Unauthorized`] unless `action` is allowed.
	pub fn require(&self, action: &str, resource: Option<&Resource>) -> Result<(), TenancyError> {
		let decision = self.authorize(action, resource);
		if decision.allowed {
			return Ok(());
		}
		Err(TenancyError::Unauthorized {
			action: action.to_string(),
			resource: resource.map(ToString::to_string),
			reasons: decision.reasons.join("; "),
		})
	}

	/// Returns the bound context or [`TenancyError::NoTenantContext`].
	pub fn require_context(&self) -> Result<Arc<TenantContext>, TenancyError> {
		self.context_store.require()
	}

	pub fn clear_cache(&self) {
		if let Some(cache) = &self.cache {
			cache.clear();
		}
	}

	/// Number of unexpired cached decisions.
	pub fn cache_len(&self) -> usize {
		self.cache.as_ref().map_or(0, DecisionCache::len)
	}

	#[instrument(
		level = "debug",
		skip_all,
		fields(tenant_id = %context.tenant.id, action = %action)
	)]
	fn evaluate(
		&self,
		context: &TenantContext,
		action: &str,
		resource: Option<&Resource>,
	) -> AuthorizationDecision {
		let mut reasons = Vec::new();

		let rbac_allowed = match self.rbac_grant(context, action) {
			Some(reason) => {
				reasons.push(reason);
				true
			}
			None => {
				reasons.push("no matching role permission".to_string());
				false
			}
		};

		let abac_allowed = match resource {
			Some(resource) => {
				let policy_context = policy_context(context, action, resource);
				match self.policy_engine.decide(&policy_context) {
					PolicyDecision::Allowed { policy_id, .. } => {
						reasons.push(format!("allowed by policy {policy_id}"));
						true
					}
					PolicyDecision::Denied { policy_id, .. } => {
						reasons.push(format!("denied by policy {policy_id}"));
						false
					}
					PolicyDecision::NoMatch => {
						reasons.push("no matching policy".to_string());
						false
					}
				}
			}
			None => false,
		};

		let allowed = rbac_allowed || abac_allowed;
		debug!(allowed, rbac_allowed, abac_allowed, "authorization decision");
		AuthorizationDecision { allowed, reasons }
	}

	/// Returns a description of the first grant covering `action`, if any.
	fn rbac_grant(&self, context: &TenantContext, action: &str) -> Option<String> {
		for role in &context.roles {
			let permissions = self.role_manager.get_role_permissions(role);
			if let Some(permission) = permissions.iter().find(|p| grants(p, action)) {
				return Some(format!("role {role} grants {permission}"));
			}
		}
		context
			.permissions
			.iter()
			.find(|p| grants(p, action))
			.map(|permission| format!("direct permission {permission}"))
	}
}

fn grants(permission: &str, action: &str) -> bool {
	permission == action || (permission.contains('*') && matches_pattern(permission, action))
}

fn policy_context(context: &TenantContext, action: &str, resource: &Resource) -> PolicyContext {
	let mut attributes = serde_json::Map::new();
	if let Some(user) = &context.user {
		attributes.extend(user.metadata.clone());
		attributes.insert("email".to_string(), Value::String(user.email.clone()));
	}

	let subject = Subject {
		id: context.user_id().map(ToString::to_string),
		roles: context.roles.clone(),
		attributes,
	};
	let environment = Environment::new(context.tenant.id.as_str());

	PolicyContext::new(subject, action, resource.clone(), environment)
}
