// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracing subscriber installation.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;
use crate::sections::LoggingConfig;

/// Builds the filter for `config.level`.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
	EnvFilter::try_new(&config.level).map_err(|e| ConfigError::InvalidValue {
		key: "logging.level".to_string(),
		message: e.to_string(),
	})
}

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `config.level` when set. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
	let filter = match EnvFilter::try_from_default_env() {
		Ok(filter) => filter,
		Err(_) => build_filter(config)?,
	};

	let registry = tracing_subscriber::registry().with(filter);
	let result = if config.json {
		registry.with(tracing_subscriber::fmt::layer().json()).try_init()
	} else {
		registry.with(tracing_subscriber::fmt::layer()).try_init()
	};
	result.map_err(|e| ConfigError::Tracing(e.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_level_builds_filter() {
		assert!(build_filter(&LoggingConfig::default()).is_ok());
	}

	#[test]
	fn test_directive_list_builds_filter() {
		let config = LoggingConfig {
			level: "warn,loom_server_tenancy::authz=debug".to_string(),
			json: true,
		};
		assert!(build_filter(&config).is_ok());
	}
}
