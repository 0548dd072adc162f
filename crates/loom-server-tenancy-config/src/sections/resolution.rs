// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant resolution configuration section.
//!
//! Only the header and subdomain strategies are configurable. Token and custom
//! strategies need code and are built with
//! [`loom_server_tenancy::ResolutionStrategy`] directly.

use std::fmt;
use std::str::FromStr;

use loom_server_tenancy::resolve::DEFAULT_TENANT_HEADER;
use loom_server_tenancy::ResolutionStrategy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStrategyKind {
	#[default]
	Header,
	Subdomain,
}

impl fmt::Display for ResolutionStrategyKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ResolutionStrategyKind::Header => write!(f, "header"),
			ResolutionStrategyKind::Subdomain => write!(f, "subdomain"),
		}
	}
}

impl FromStr for ResolutionStrategyKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"header" => Ok(Self::Header),
			"subdomain" => Ok(Self::Subdomain),
			other => Err(format!("unknown resolution strategy '{other}'")),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResolutionConfigLayer {
	pub strategy: Option<ResolutionStrategyKind>,
	pub header_name: Option<String>,
	pub base_domain: Option<String>,
}

impl ResolutionConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.strategy.is_some() {
			self.strategy = other.strategy;
		}
		if other.header_name.is_some() {
			self.header_name = other.header_name;
		}
		if other.base_domain.is_some() {
			self.base_domain = other.base_domain;
		}
	}

	pub fn finalize(self) -> ResolutionConfig {
		ResolutionConfig {
			strategy: self.strategy.unwrap_or_default(),
			header_name: self
				.header_name
				.unwrap_or_else(|| DEFAULT_TENANT_HEADER.to_string()),
			base_domain: self.base_domain,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolutionConfig {
	pub strategy: ResolutionStrategyKind,
	pub header_name: String,
	pub base_domain: Option<String>,
}

impl ResolutionConfig {
	pub fn to_strategy(&self) -> ResolutionStrategy {
		match self.strategy {
			ResolutionStrategyKind::Header => ResolutionStrategy::header(self.header_name.clone()),
			ResolutionStrategyKind::Subdomain => {
				ResolutionStrategy::subdomain(self.base_domain.clone())
			}
		}
	}
}

impl Default for ResolutionConfig {
	fn default() -> Self {
		ResolutionConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_to_tenant_header() {
		let config = ResolutionConfig::default();
		assert_eq!(config.strategy, ResolutionStrategyKind::Header);
		assert_eq!(config.header_name, "x-tenant-id");
		assert!(matches!(
			config.to_strategy(),
			ResolutionStrategy::Header { name } if name == "x-tenant-id"
		));
	}

	#[test]
	fn test_subdomain_strategy() {
		let layer: ResolutionConfigLayer = toml::from_str(
			r#"
strategy = "subdomain"
base_domain = "loom.example"
"#,
		)
		.unwrap();
		let config = layer.finalize();
		assert!(matches!(
			config.to_strategy(),
			ResolutionStrategy::Subdomain { base_domain: Some(d) } if d == "loom.example"
		));
	}

	#[test]
	fn test_parse_kind() {
		assert_eq!(
			"Subdomain".parse::<ResolutionStrategyKind>(),
			Ok(ResolutionStrategyKind::Subdomain)
		);
		assert_eq!(
			" header ".parse::<ResolutionStrategyKind>(),
			Ok(ResolutionStrategyKind::Header)
		);
		assert!("cookie".parse::<ResolutionStrategyKind>().is_err());
	}
}
