// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::TenancyConfigLayer;
use crate::sections::{
	AuthorizationConfigLayer, LoggingConfigLayer, ResolutionConfigLayer, ResolutionStrategyKind,
};

/// Default location of the tenancy config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/loom/tenancy.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<TenancyConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<TenancyConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(TenancyConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<TenancyConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(TenancyConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: TenancyConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!(
			roles = layer.roles.as_ref().map_or(0, Vec::len),
			policies = layer.policies.as_ref().map_or(0, Vec::len),
			"parsed config layer from TOML"
		);
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `LOOM_SERVER_TENANCY_<FIELD>`. Roles, hierarchy and policies
/// are file-only.
pub struct EnvSource;

impl EnvSource {
	/// Builds the layer from an arbitrary variable lookup.
	pub fn load_with<F>(lookup: F) -> Result<TenancyConfigLayer, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let env = Env { lookup };
		Ok(TenancyConfigLayer {
			authorization: Some(AuthorizationConfigLayer {
				default_deny: env.bool("LOOM_SERVER_TENANCY_DEFAULT_DENY")?,
				cache: env.bool("LOOM_SERVER_TENANCY_CACHE")?,
				cache_ttl_ms: env.u64("LOOM_SERVER_TENANCY_CACHE_TTL_MS")?,
			}),
			resolution: Some(ResolutionConfigLayer {
				strategy: env.strategy("LOOM_SERVER_TENANCY_STRATEGY")?,
				header_name: env.var("LOOM_SERVER_TENANCY_HEADER"),
				base_domain: env.var("LOOM_SERVER_TENANCY_BASE_DOMAIN"),
			}),
			logging: Some(LoggingConfigLayer {
				level: env.var("LOOM_SERVER_TENANCY_LOG"),
				json: env.bool("LOOM_SERVER_TENANCY_LOG_JSON")?,
			}),
			..Default::default()
		})
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<TenancyConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Self::load_with(|name| std::env::var(name).ok())
	}
}

struct Env<F> {
	lookup: F,
}

impl<F> Env<F>
where
	F: Fn(&str) -> Option<String>,
{
	fn var(&self, name: &str) -> Option<String> {
		(self.lookup)(name).filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Result<Option<bool>, ConfigError> {
		match self.var(name) {
			Some(v) => match v.to_ascii_lowercase().as_str() {
				"true" | "1" | "yes" => Ok(Some(true)),
				"false" | "0" | "no" => Ok(Some(false)),
				_ => Err(ConfigError::InvalidValue {
					key: name.to_string(),
					message: format!("invalid boolean value '{v}'"),
				}),
			},
			None => Ok(None),
		}
	}

	fn u64(&self, name: &str) -> Result<Option<u64>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid u64 value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn strategy(&self, name: &str) -> Result<Option<ResolutionStrategyKind>, ConfigError> {
		match self.var(name) {
			Some(v) => v
				.parse()
				.map(Some)
				.map_err(|message| ConfigError::InvalidValue {
					key: name.to_string(),
					message,
				}),
			None => Ok(None),
		}
	}
}
