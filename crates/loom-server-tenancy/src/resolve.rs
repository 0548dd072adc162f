// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant resolution from inbound HTTP request headers.
//!
//! A [`TenantResolver`] extracts a tenant identifier according to its
//! [`ResolutionStrategy`], loads the tenant from a [`TenantDataStore`] and
//! rejects tenants that are not active. The resulting [`TenantContext`] is
//! meant to be bound with [`crate::ContextStore::run`] around the handler.
//!
//! # Security
//!
//! Bearer tokens are passed to the integrator's decoder verbatim and never
//! logged. Verifying token signatures is the decoder's responsibility.

use std::fmt;
use std::sync::Arc;

use http::header::{AUTHORIZATION, HOST};
use http::uri::Authority;
use http::HeaderMap;
use tracing::{debug, instrument};

use crate::error::{Result, TenancyError};
use crate::store::TenantDataStore;
use crate::types::{Tenant, TenantContext, TenantId, User};

/// Header read by [`ResolutionStrategy::default_header`].
pub const DEFAULT_TENANT_HEADER: &str = "x-tenant-id";

/// Maps a bearer token to a tenant id.
pub type TokenDecoder = Arc<dyn Fn(&str) -> Option<TenantId> + Send + Sync>;

/// Maps request headers to a tenant id.
pub type CustomResolver = Arc<dyn Fn(&HeaderMap) -> Option<TenantId> + Send + Sync>;

/// How the tenant identifier is extracted from a request.
#[derive(Clone)]
pub enum ResolutionStrategy {
	/// Subdomain of the `Host` header, falling back to a full-domain match.
	///
	/// With a base domain, everything before `.<base_domain>` is the
	/// subdomain. Without one, the first label is used when the host has at
	/// least three labels.
	Subdomain { base_domain: Option<String> },
	/// Tenant id carried verbatim in a request header.
	Header { name: String },
	/// Tenant id decoded from the `Authorization: Bearer` token.
	Token { decoder: TokenDecoder },
	/// Integrator-supplied extraction.
	Custom { resolver: CustomResolver },
}

impl ResolutionStrategy {
	pub fn subdomain(base_domain: Option<String>) -> Self {
		Self::Subdomain { base_domain }
	}

	pub fn header(name: impl Into<String>) -> Self {
		Self::Header { name: name.into() }
	}

	/// [`ResolutionStrategy::Header`] reading [`DEFAULT_TENANT_HEADER`].
	pub fn default_header() -> Self {
		Self::header(DEFAULT_TENANT_HEADER)
	}

	pub fn token<F>(decoder: F) -> Self
	where
		F: Fn(&str) -> Option<TenantId> + Send + Sync + 'static,
	{
		Self::Token {
			decoder: Arc::new(decoder),
		}
	}

	pub fn custom<F>(resolver: F) -> Self
	where
		F: Fn(&HeaderMap) -> Option<TenantId> + Send + Sync + 'static,
	{
		Self::Custom {
			resolver: Arc::new(resolver),
		}
	}

	fn name(&self) -> &'static str {
		match self {
			Self::Subdomain { .. } => "subdomain",
			Self::Header { .. } => "header",
			Self::Token { .. } => "token",
			Self::Custom { .. } => "custom",
		}
	}
}

impl Default for ResolutionStrategy {
	fn default() -> Self {
		Self::default_header()
	}
}

impl fmt::Debug for ResolutionStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Subdomain { base_domain } => f
				.debug_struct("Subdomain")
				.field("base_domain", base_domain)
				.finish(),
			Self::Header { name } => f.debug_struct("Header").field("name", name).finish(),
			Self::Token { .. } => f.write_str("Token { .. }"),
			Self::Custom { .. } => f.write_str("Custom { .. }"),
		}
	}
}

/// Extract a bearer token from the Authorization header.
///
/// Expects the format: `Authorization: Bearer <token>`
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
	let auth_header = headers.get(AUTHORIZATION)?;
	let auth_str = auth_header.to_str().ok()?;
	auth_str
		.strip_prefix("Bearer ")
		.map(str::trim)
		.filter(|token| !token.is_empty())
		.map(|token| token.to_string())
}

/// Lower-cased host of the `Host` header, without port.
pub fn request_host(headers: &HeaderMap) -> Option<String> {
	let raw = headers.get(HOST)?.to_str().ok()?;
	let authority: Authority = raw.trim().parse().ok()?;
	let host = authority.host().trim_end_matches('.').to_ascii_lowercase();
	(!host.is_empty()).then_some(host)
}

/// Subdomain part of `host`, if any.
fn subdomain_of(host: &str, base_domain: Option<&str>) -> Option<String> {
	match base_domain {
		Some(base) => {
			let base = base.trim_matches('.').to_ascii_lowercase();
			host
				.strip_suffix(base.as_str())
				.and_then(|prefix| prefix.strip_suffix('.'))
				.filter(|sub| !sub.is_empty())
				.map(str::to_string)
		}
		None => {
			let labels: Vec<&str> = host.split('.').collect();
			(labels.len() >= 3).then(|| labels[0].to_string())
		}
	}
}

/// Resolves the tenant of inbound requests.
#[derive(Clone)]
pub struct TenantResolver {
	strategy: ResolutionStrategy,
	store: Arc<dyn TenantDataStore>,
}

impl fmt::Debug for TenantResolver {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TenantResolver")
			.field("strategy", &self.strategy)
			.finish_non_exhaustive()
	}
}

impl TenantResolver {
	pub fn new(strategy: ResolutionStrategy, store: Arc<dyn TenantDataStore>) -> Self {
		Self { strategy, store }
	}

	pub fn strategy(&self) -> &ResolutionStrategy {
		&self.strategy
	}

	/// Resolves the active tenant addressed by `headers`.
	///
	/// # Errors
	///
	/// - [`TenancyError::TenantNotResolved`] when no identifier is present
	/// - [`TenancyError::TenantNotFound`] when the identifier is unknown
	/// - [`TenancyError::TenantInactive`] when the tenant is not active
	/// - [`TenancyError::Store`] when the store fails
	#[instrument(level = "debug", skip_all, fields(strategy = self.strategy.name()))]
	pub async fn resolve(&self, headers: &HeaderMap) -> Result<Tenant> {
		let tenant = match &self.strategy {
			ResolutionStrategy::Subdomain { base_domain } => {
				self.resolve_by_host(headers, base_domain.as_deref()).await?
			}
			ResolutionStrategy::Header { name } => {
				let id = headers
					.get(name.as_str())
					.and_then(|v| v.to_str().ok())
					.map(str::trim)
					.filter(|v| !v.is_empty())
					.map(TenantId::from);
				self.load(id).await?
			}
			ResolutionStrategy::Token { decoder } => {
				let id = extract_bearer_token(headers).and_then(|token| decoder(&token));
				self.load(id).await?
			}
			ResolutionStrategy::Custom { resolver } => self.load(resolver(headers)).await?,
		};

		if !tenant.status.is_active() {
			return Err(TenancyError::TenantInactive {
				id: tenant.id.to_string(),
				status: tenant.status,
			});
		}

		debug!(tenant_id = %tenant.id, "tenant resolved");
		Ok(tenant)
	}

	/// Resolves the tenant and builds the context for `user`.
	///
	/// The user's roles and direct permissions come from their membership in
	/// the tenant. A user without a membership gets a context with no roles.
	pub async fn resolve_context(
		&self,
		headers: &HeaderMap,
		user: Option<User>,
	) -> Result<TenantContext> {
		let tenant = self.resolve(headers).await?;
		let Some(user) = user else {
			return Ok(TenantContext::new(tenant));
		};

		match self.store.get_user_tenant(&user.id, &tenant.id).await? {
			Some(membership) => Ok(TenantContext::from_membership(tenant, user, &membership)),
			None => {
				debug!(
					user_id = %user.id,
					tenant_id = %tenant.id,
					"user has no membership in tenant"
				);
				Ok(TenantContext::new(tenant).with_user(user))
			}
		}
	}

	async fn load(&self, id: Option<TenantId>) -> Result<Tenant> {
		let id = id.ok_or(TenancyError::TenantNotResolved)?;
		self
			.store
			.get_tenant_by_id(&id)
			.await?
			.ok_or_else(|| TenancyError::TenantNotFound(id.to_string()))
	}

	async fn resolve_by_host(
		&self,
		headers: &HeaderMap,
		base_domain: Option<&str>,
	) -> Result<Tenant> {
		let host = request_host(headers).ok_or(TenancyError::TenantNotResolved)?;
		let subdomain = subdomain_of(&host, base_domain);

		if let Some(subdomain) = &subdomain {
			if let Some(tenant) = self.store.get_tenant_by_subdomain(subdomain).await? {
				return Ok(tenant);
			}
		}
		if let Some(tenant) = self.store.get_tenant_by_domain(&host).await? {
			return Ok(tenant);
		}

		match subdomain {
			Some(subdomain) => Err(TenancyError::TenantNotFound(subdomain)),
			None => Err(TenancyError::TenantNotResolved),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::InMemoryTenantStore;
	use crate::types::{TenantStatus, TenantUser};
	use http::HeaderValue;

	async fn store() -> Arc<InMemoryTenantStore> {
		let store = InMemoryTenantStore::new();
		store
			.insert_tenant(
				Tenant::new("acme", "Acme")
					.with_subdomain("acme")
					.with_domain("acme.test"),
			)
			.await;
		store
			.insert_tenant(Tenant::new("globex", "Globex").with_status(TenantStatus::Suspended))
			.await;
		store
			.insert_membership(
				TenantUser::new("u1", "acme", ["admin"]).with_permissions(["billing:read"]),
			)
			.await;
		Arc::new(store)
	}

	fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
		let mut map = HeaderMap::new();
		for (name, value) in pairs {
			map.insert(*name, HeaderValue::from_str(value).unwrap());
		}
		map
	}

	#[test]
	fn host_parsing() {
		assert_eq!(
			request_host(&headers(&[("host", "Acme.Example.com:8080")])).as_deref(),
			Some("acme.example.com")
		);
		assert_eq!(
			request_host(&headers(&[("host", "localhost")])).as_deref(),
			Some("localhost")
		);
		assert_eq!(request_host(&HeaderMap::new()), None);
	}

	#[test]
	fn subdomain_extraction() {
		assert_eq!(subdomain_of("acme.example.com", None).as_deref(), Some("acme"));
		assert_eq!(subdomain_of("example.com", None), None);
		assert_eq!(
			subdomain_of("acme.app.example.com", Some("app.example.com")).as_deref(),
			Some("acme")
		);
		assert_eq!(subdomain_of("app.example.com", Some("app.example.com")), None);
		assert_eq!(subdomain_of("acme.other.com", Some("example.com")), None);
		assert_eq!(subdomain_of("notexample.com", Some("example.com")), None);
	}

	#[test]
	fn bearer_token_extraction() {
		assert_eq!(
			extract_bearer_token(&headers(&[("authorization", "Bearer abc")])).as_deref(),
			Some("abc")
		);
		assert_eq!(extract_bearer_token(&headers(&[("authorization", "Basic abc")])), None);
		assert_eq!(extract_bearer_token(&headers(&[("authorization", "Bearer ")])), None);
	}

	#[tokio::test]
	async fn resolves_by_subdomain_then_domain() {
		let resolver = TenantResolver::new(
			ResolutionStrategy::subdomain(Some("example.com".into())),
			store().await,
		);

		let by_sub = resolver.resolve(&headers(&[("host", "acme.example.com")])).await.unwrap();
		assert_eq!(by_sub.id.as_str(), "acme");

		let by_domain = resolver.resolve(&headers(&[("host", "acme.test:443")])).await.unwrap();
		assert_eq!(by_domain.id.as_str(), "acme");

		assert!(matches!(
			resolver.resolve(&headers(&[("host", "nobody.example.com")])).await,
			Err(TenancyError::TenantNotFound(s)) if s == "nobody"
		));
		assert!(matches!(
			resolver.resolve(&HeaderMap::new()).await,
			Err(TenancyError::TenantNotResolved)
		));
	}

	#[tokio::test]
	async fn resolves_by_header() {
		let resolver = TenantResolver::new(ResolutionStrategy::default(), store().await);

		let tenant = resolver.resolve(&headers(&[("x-tenant-id", "acme")])).await.unwrap();
		assert_eq!(tenant.name, "Acme");

		assert!(matches!(
			resolver.resolve(&headers(&[("x-tenant-id", "  ")])).await,
			Err(TenancyError::TenantNotResolved)
		));
		assert!(matches!(
			resolver.resolve(&headers(&[("x-tenant-id", "initech")])).await,
			Err(TenancyError::TenantNotFound(_))
		));
	}

	#[tokio::test]
	async fn rejects_inactive_tenant() {
		let resolver = TenantResolver::new(ResolutionStrategy::default(), store().await);
		assert!(matches!(
			resolver.resolve(&headers(&[("x-tenant-id", "globex")])).await,
			Err(TenancyError::TenantInactive { status: TenantStatus::Suspended, .. })
		));
	}

	#[tokio::test]
	async fn resolves_by_token() {
		let strategy =
			ResolutionStrategy::token(|token| token.strip_prefix("tenant-").map(TenantId::from));
		let resolver = TenantResolver::new(strategy, store().await);

		let tenant = resolver
			.resolve(&headers(&[("authorization", "Bearer tenant-acme")]))
			.await
			.unwrap();
		assert_eq!(tenant.id.as_str(), "acme");

		assert!(matches!(
			resolver.resolve(&headers(&[("authorization", "Bearer garbage")])).await,
			Err(TenancyError::TenantNotResolved)
		));
	}

	#[tokio::test]
	async fn resolves_by_custom_function() {
		let strategy = ResolutionStrategy::custom(|headers| {
			headers
				.get("x-org")
				.and_then(|v| v.to_str().ok())
				.map(|org| TenantId::new(org.to_ascii_lowercase()))
		});
		let resolver = TenantResolver::new(strategy, store().await);
		let tenant = resolver.resolve(&headers(&[("x-org", "ACME")])).await.unwrap();
		assert_eq!(tenant.id.as_str(), "acme");
	}

	#[tokio::test]
	async fn resolve_context_loads_membership() {
		let resolver = TenantResolver::new(ResolutionStrategy::default(), store().await);
		let req = headers(&[("x-tenant-id", "acme")]);

		let member = resolver
			.resolve_context(&req, Some(User::new("u1", "u1@acme.test")))
			.await
			.unwrap();
		assert_eq!(member.roles, vec!["admin"]);
		assert_eq!(member.permissions, vec!["billing:read"]);

		let stranger = resolver
			.resolve_context(&req, Some(User::new("u9", "u9@elsewhere.test")))
			.await
			.unwrap();
		assert!(stranger.roles.is_empty());
		assert_eq!(stranger.user_id().map(|u| u.as_str()), Some("u9"));

		let anonymous = resolver.resolve_context(&req, None).await.unwrap();
		assert!(anonymous.user.is_none());
	}

	#[test]
	fn strategy_debug_hides_closures() {
		let strategy = ResolutionStrategy::token(|_| None);
		assert_eq!(format!("{strategy:?}"), "Token { .. }");
	}
}
