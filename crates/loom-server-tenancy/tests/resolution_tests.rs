// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request flow: resolve the tenant from headers, bind it, authorize.

use std::sync::Arc;

use http::{HeaderMap, HeaderValue};
use loom_server_tenancy::{
	AuthorizationManager, AuthorizationOptions, ContextStore, InMemoryTenantStore, NewTenant,
	PolicyEngine, ResolutionStrategy, RoleManager, TenancyError, TenantDataStore, TenantId,
	TenantResolver, TenantStatus, TenantUpdate, TenantUser, User,
};

async fn seeded_store() -> Arc<InMemoryTenantStore> {
	let store = InMemoryTenantStore::new();
	for (id, subdomain) in [("acme", "acme"), ("globex", "globex")] {
		store
			.create_tenant(NewTenant {
				id: Some(TenantId::new(id)),
				subdomain: Some(subdomain.to_string()),
				..NewTenant::new(id.to_uppercase())
			})
			.await
			.unwrap();
	}
	store
		.insert_membership(TenantUser::new("u1", "acme", ["admin"]))
		.await;
	store
		.insert_membership(TenantUser::new("u1", "globex", ["viewer"]))
		.await;
	Arc::new(store)
}

fn host(value: &str) -> HeaderMap {
	let mut headers = HeaderMap::new();
	headers.insert("host", HeaderValue::from_str(value).unwrap());
	headers
}

#[tokio::test]
async fn same_user_gets_per_tenant_roles() {
	let tenants = seeded_store().await;
	let resolver = TenantResolver::new(
		ResolutionStrategy::subdomain(Some("loom.test".to_string())),
		tenants.clone(),
	);
	let contexts = ContextStore::new();
	let authz = AuthorizationManager::new(AuthorizationOptions::new(
		Arc::new(RoleManager::default()),
		Arc::new(PolicyEngine::new()),
		contexts.clone(),
	));
	let user = User::new("u1", "u1@loom.test");

	let acme = resolver
		.resolve_context(&host("acme.loom.test"), Some(user.clone()))
		.await
		.unwrap();
	let globex = resolver
		.resolve_context(&host("globex.loom.test:8443"), Some(user))
		.await
		.unwrap();

	let (in_acme, in_globex) = tokio::join!(
		contexts.run(acme, async {
			tokio::task::yield_now().await;
			authz.can("users:invite", None)
		}),
		contexts.run(globex, async {
			tokio::task::yield_now().await;
			authz.can("users:invite", None)
		}),
	);
	assert!(in_acme);
	assert!(!in_globex);
}

#[tokio::test]
async fn suspended_tenant_is_rejected_before_binding() {
	let tenants = seeded_store().await;
	tenants
		.update_tenant(
			&TenantId::new("globex"),
			TenantUpdate {
				status: Some(TenantStatus::Suspended),
				..Default::default()
			},
		)
		.await
		.unwrap();

	let resolver = TenantResolver::new(ResolutionStrategy::subdomain(None), tenants);
	let err = resolver
		.resolve_context(&host("globex.loom.test"), None)
		.await
		.unwrap_err();
	assert!(matches!(
		err,
		TenancyError::TenantInactive {
			status: TenantStatus::Suspended,
			..
		}
	));
}

#[tokio::test]
async fn header_strategy_resolves_created_tenant() {
	let tenants = seeded_store().await;
	let resolver = TenantResolver::new(ResolutionStrategy::header("x-loom-tenant"), tenants);

	let mut headers = HeaderMap::new();
	headers.insert("x-loom-tenant", HeaderValue::from_static("acme"));
	let tenant = resolver.resolve(&headers).await.unwrap();
	assert_eq!(tenant.name, "ACME");

	assert!(matches!(
		resolver.resolve(&HeaderMap::new()).await,
		Err(TenancyError::TenantNotResolved)
	));
}
