// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization manager configuration section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_CACHE_TTL_MS: u64 = 60_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthorizationConfigLayer {
	pub default_deny: Option<bool>,
	pub cache: Option<bool>,
	pub cache_ttl_ms: Option<u64>,
}

impl AuthorizationConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.default_deny.is_some() {
			self.default_deny = other.default_deny;
		}
		if other.cache.is_some() {
			self.cache = other.cache;
		}
		if other.cache_ttl_ms.is_some() {
			self.cache_ttl_ms = other.cache_ttl_ms;
		}
	}

	pub fn finalize(self) -> AuthorizationConfig {
		AuthorizationConfig {
			default_deny: self.default_deny.unwrap_or(true),
			cache: self.cache.unwrap_or(false),
			cache_ttl_ms: self.cache_ttl_ms.unwrap_or(DEFAULT_CACHE_TTL_MS),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorizationConfig {
	/// Deny checks made with no bound tenant context.
	pub default_deny: bool,
	pub cache: bool,
	pub cache_ttl_ms: u64,
}

impl AuthorizationConfig {
	pub fn cache_ttl(&self) -> Duration {
		Duration::from_millis(self.cache_ttl_ms)
	}
}

impl Default for AuthorizationConfig {
	fn default() -> Self {
		AuthorizationConfigLayer::default().finalize()
	}
}
