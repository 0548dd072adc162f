// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant persistence boundary.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{Result, TenancyError};
use crate::types::{Tenant, TenantId, TenantStatus, TenantUser, UserId};

/// Fields for [`TenantDataStore::create_tenant`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTenant {
	/// Generated when absent.
	#[serde(default)]
	pub id: Option<TenantId>,
	pub name: String,
	#[serde(default)]
	pub subdomain: Option<String>,
	#[serde(default)]
	pub domain: Option<String>,
	#[serde(default)]
	pub metadata: Map<String, Value>,
	#[serde(default)]
	pub status: TenantStatus,
}

impl NewTenant {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Default::default()
		}
	}
}

/// Partial update for [`TenantDataStore::update_tenant`]. `None` leaves a
/// field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantUpdate {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub subdomain: Option<String>,
	#[serde(default)]
	pub domain: Option<String>,
	/// Replaces the whole metadata map.
	#[serde(default)]
	pub metadata: Option<Map<String, Value>>,
	#[serde(default)]
	pub status: Option<TenantStatus>,
}

/// Storage for tenants and memberships.
///
/// Implementations live outside this crate; [`InMemoryTenantStore`] serves
/// tests and single-process deployments.
#[async_trait]
pub trait TenantDataStore: Send + Sync {
	async fn get_tenant_by_id(&self, id: &TenantId) -> Result<Option<Tenant>>;
	async fn get_tenant_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>>;
	async fn get_tenant_by_domain(&self, domain: &str) -> Result<Option<Tenant>>;
	async fn create_tenant(&self, tenant: NewTenant) -> Result<Tenant>;
	async fn update_tenant(&self, id: &TenantId, update: TenantUpdate) -> Result<Tenant>;
	async fn delete_tenant(&self, id: &TenantId) -> Result<()>;
	async fn get_user_tenant(
		&self,
		user_id: &UserId,
		tenant_id: &TenantId,
	) -> Result<Option<TenantUser>>;
}

#[derive(Debug, Default)]
struct StoreState {
	tenants: HashMap<TenantId, Tenant>,
	memberships: HashMap<(UserId, TenantId), TenantUser>,
}

/// [`TenantDataStore`] backed by in-process maps.
///
/// Subdomain and domain lookups are case-insensitive.
#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
	state: RwLock<StoreState>,
}

impl InMemoryTenantStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts or replaces a tenant as-is.
	pub async fn insert_tenant(&self, tenant: Tenant) {
		self.state.write().await.tenants.insert(tenant.id.clone(), tenant);
	}

	/// Inserts or replaces a membership.
	pub async fn insert_membership(&self, membership: TenantUser) {
		let key = (membership.user_id.clone(), membership.tenant_id.clone());
		self.state.write().await.memberships.insert(key, membership);
	}

	async fn find_tenant(&self, predicate: impl Fn(&Tenant) -> bool) -> Option<Tenant> {
		self
			.state
			.read()
			.await
			.tenants
			.values()
			.find(|t| predicate(t))
			.cloned()
	}
}

fn eq_ignore_case(stored: Option<&str>, wanted: &str) -> bool {
	stored.is_some_and(|s| s.eq_ignore_ascii_case(wanted))
}

#[async_trait]
impl TenantDataStore for InMemoryTenantStore {
	async fn get_tenant_by_id(&self, id: &TenantId) -> Result<Option<Tenant>> {
		Ok(self.state.read().await.tenants.get(id).cloned())
	}

	async fn get_tenant_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>> {
		Ok(self
			.find_tenant(|t| eq_ignore_case(t.subdomain.as_deref(), subdomain))
			.await)
	}

	async fn get_tenant_by_domain(&self, domain: &str) -> Result<Option<Tenant>> {
		Ok(self
			.find_tenant(|t| eq_ignore_case(t.domain.as_deref(), domain))
			.await)
	}

	#[instrument(level = "debug", skip(self, tenant), fields(name = %tenant.name))]
	async fn create_tenant(&self, tenant: NewTenant) -> Result<Tenant> {
		let id = tenant.id.unwrap_or_else(TenantId::generate);
		let mut state = self.state.write().await;
		if state.tenants.contains_key(&id) {
			return Err(TenancyError::Store(format!("tenant {id} already exists")));
		}

		let now = Utc::now();
		let created = Tenant {
			id: id.clone(),
			name: tenant.name,
			subdomain: tenant.subdomain,
			domain: tenant.domain,
			metadata: tenant.metadata,
			status: tenant.status,
			created_at: now,
			updated_at: now,
		};
		state.tenants.insert(id, created.clone());
		debug!(tenant_id = %created.id, "tenant created");
		Ok(created)
	}

	#[instrument(level = "debug", skip(self, update), fields(tenant_id = %id))]
	async fn update_tenant(&self, id: &TenantId, update: TenantUpdate) -> Result<Tenant> {
		let mut state = self.state.write().await;
		let tenant = state
			.tenants
			.get_mut(id)
			.ok_or_else(|| TenancyError::TenantNotFound(id.to_string()))?;

		if let Some(name) = update.name {
			tenant.name = name;
		}
		if let Some(subdomain) = update.subdomain {
			tenant.subdomain = Some(subdomain);
		}
		if let Some(domain) = update.domain {
			tenant.domain = Some(domain);
		}
		if let Some(metadata) = update.metadata {
			tenant.metadata = metadata;
		}
		if let Some(status) = update.status {
			tenant.status = status;
		}
		tenant.updated_at = Utc::now();
		Ok(tenant.clone())
	}

	#[instrument(level = "debug", skip(self), fields(tenant_id = %id))]
	async fn delete_tenant(&self, id: &TenantId) -> Result<()> {
		let mut state = self.state.write().await;
		if state.tenants.remove(id).is_none() {
			return Err(TenancyError::TenantNotFound(id.to_string()));
		}
		state.memberships.retain(|(_, tenant_id), _| tenant_id != id);
		Ok(())
	}

	async fn get_user_tenant(
		&self,
		user_id: &UserId,
		tenant_id: &TenantId,
	) -> Result<Option<TenantUser>> {
		let key = (user_id.clone(), tenant_id.clone());
		Ok(self.state.read().await.memberships.get(&key).cloned())
	}
}
