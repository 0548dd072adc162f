// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for Loom tenancy and authorization.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Role, permission hierarchy and policy definitions loaded from TOML
//! - Wiring of a configured [`AuthorizationManager`] and [`TenantResolver`]
//! - Tracing subscriber installation driven by the logging section
//!
//! # Usage
//!
//! ```ignore
//! use loom_server_tenancy::ContextStore;
//! use loom_server_tenancy_config::{init_tracing, load_config};
//!
//! let config = load_config()?;
//! init_tracing(&config.logging)?;
//!
//! let contexts = ContextStore::new();
//! let authz = config.build_authorization_manager(contexts.clone())?;
//! let resolver = config.build_resolver(tenant_store);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;
pub mod telemetry;

pub use error::ConfigError;
pub use layer::TenancyConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};
pub use telemetry::{build_filter, init_tracing};

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use loom_server_tenancy::{
	AuthorizationManager, AuthorizationOptions, ContextStore, Policy, PolicyEngine, RoleDefinition,
	RoleManager, RoleManagerOptions, TenantDataStore, TenantResolver,
};
use tracing::{debug, info};

/// Fully resolved tenancy configuration.
#[derive(Debug, Clone, Default)]
pub struct TenancyConfig {
	pub authorization: AuthorizationConfig,
	/// Roles registered on top of the built-in admin, member and viewer roles.
	pub roles: Vec<RoleDefinition>,
	pub permission_hierarchy: HashMap<String, Vec<String>>,
	pub policies: Vec<Policy>,
	pub resolution: ResolutionConfig,
	pub logging: LoggingConfig,
}

impl TenancyConfig {
	/// Builds a role manager seeded with the defaults and the configured roles.
	pub fn role_manager(&self) -> Result<RoleManager, ConfigError> {
		RoleManager::try_new(RoleManagerOptions {
			roles: self.roles.clone(),
			permission_hierarchy: self.permission_hierarchy.clone(),
		})
		.map_err(|e| ConfigError::Validation(e.to_string()))
	}

	pub fn policy_engine(&self) -> PolicyEngine {
		PolicyEngine::with_policies(self.policies.iter().cloned())
	}

	/// Wires an [`AuthorizationManager`] reading contexts from `store`.
	pub fn build_authorization_manager(
		&self,
		store: ContextStore,
	) -> Result<AuthorizationManager, ConfigError> {
		let mut options = AuthorizationOptions::new(
			Arc::new(self.role_manager()?),
			Arc::new(self.policy_engine()),
			store,
		)
		.with_default_deny(self.authorization.default_deny);
		if self.authorization.cache {
			options = options.with_cache(self.authorization.cache_ttl());
		}
		Ok(AuthorizationManager::new(options))
	}

	pub fn build_resolver(&self, store: Arc<dyn TenantDataStore>) -> TenantResolver {
		TenantResolver::new(self.resolution.to_strategy(), store)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`LOOM_SERVER_TENANCY_*`)
/// 2. Config file (`/etc/loom/tenancy.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<TenancyConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	];
	load_config_from_sources(sources)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<PathBuf>,
) -> Result<TenancyConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	];
	load_config_from_sources(sources)
}

/// Merge the given sources in precedence order and finalize.
pub fn load_config_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<TenancyConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = TenancyConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: TenancyConfigLayer) -> Result<TenancyConfig, ConfigError> {
	let config = TenancyConfig {
		authorization: layer.authorization.unwrap_or_default().finalize(),
		roles: layer.roles.unwrap_or_default(),
		permission_hierarchy: layer.permission_hierarchy.unwrap_or_default(),
		policies: layer.policies.unwrap_or_default(),
		resolution: layer.resolution.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		default_deny = config.authorization.default_deny,
		cache = config.authorization.cache,
		cache_ttl_ms = config.authorization.cache_ttl_ms,
		roles = config.roles.len(),
		policies = config.policies.len(),
		strategy = %config.resolution.strategy,
		"Tenancy configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &TenancyConfig) -> Result<(), ConfigError> {
	if config.authorization.cache && config.authorization.cache_ttl_ms == 0 {
		return Err(ConfigError::Validation(
			"authorization.cache_ttl_ms must be greater than zero when the cache is enabled"
				.to_string(),
		));
	}

	for role in &config.roles {
		role
			.validate()
			.map_err(|e| ConfigError::Validation(e.to_string()))?;
	}

	let mut ids = HashSet::new();
	for policy in &config.policies {
		if policy.id.trim().is_empty() {
			return Err(ConfigError::Validation("policy id is empty".to_string()));
		}
		if !ids.insert(policy.id.as_str()) {
			return Err(ConfigError::Validation(format!(
				"duplicate policy id '{}'",
				policy.id
			)));
		}
		if policy.actions.is_empty() || policy.resources.is_empty() {
			return Err(ConfigError::Validation(format!(
				"policy '{}' must name at least one action and one resource",
				policy.id
			)));
		}
	}

	Ok(())
}
