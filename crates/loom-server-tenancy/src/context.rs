// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request-scoped tenant context propagation.
//!
//! [`ContextStore::run`] binds a [`TenantContext`] for the full dynamic extent
//! of a future, across every `.await` inside it. Reads through
//! [`ContextStore::get`] return the innermost binding made by the same store in
//! the current task, so concurrent operations interleaved on one worker never
//! observe each other's context.
//!
//! # Mechanism
//!
//! Bindings are frames held in a tokio task-local. Each frame records the id of
//! the store that created it and points at the frame it shadows:
//!
//! ```text
//! run(A) ─► [store 1, tenant A] ──parent──► None
//!   run(B) ─► [store 1, tenant B] ──parent──► [store 1, tenant A]
//! ```
//!
//! The task-local only holds a frame while the wrapped future is being polled,
//! so the binding is released on completion, error, panic and drop alike.
//!
//! Task-locals do not follow `tokio::spawn`; use [`ContextStore::spawn`] or
//! [`ContextStore::scope_current`] to carry the binding into another task.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::trace;

use crate::error::TenancyError;
use crate::types::{Tenant, TenantContext, TenantId, User};

tokio::task_local! {
	static ACTIVE_FRAME: Arc<Frame>;
}

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct Frame {
	store_id: u64,
	context: Arc<TenantContext>,
	parent: Option<Arc<Frame>>,
}

fn current_frame() -> Option<Arc<Frame>> {
	ACTIVE_FRAME.try_with(Arc::clone).ok()
}

/// Scoped container for the tenant context of the running operation.
///
/// Cloning a store yields a handle to the same store: bindings made through
/// one clone are visible through every other clone, but never through an
/// independently constructed store.
#[derive(Debug, Clone)]
pub struct ContextStore {
	id: u64,
}

impl Default for ContextStore {
	fn default() -> Self {
		Self::new()
	}
}

impl ContextStore {
	pub fn new() -> Self {
		Self {
			id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
		}
	}

	fn push_frame(&self, context: TenantContext) -> Arc<Frame> {
		trace!(
			store_id = self.id,
			tenant_id = %context.tenant.id,
			"binding tenant context"
		);
		Arc::new(Frame {
			store_id: self.id,
			context: Arc::new(context),
			parent: current_frame(),
		})
	}

	/// Runs `future` with `context` bound as current.
	///
	/// The previous binding (if any) is visible again once `future` settles.
	/// Errors produced by `future` are returned unchanged.
	pub async fn run<F>(&self, context: TenantContext, future: F) -> F::Output
	where
		F: Future,
	{
		let frame = self.push_frame(context);
		ACTIVE_FRAME.scope(frame, future).await
	}

	/// Runs the closure `f` with `context` bound as current.
	pub fn run_sync<F, R>(&self, context: TenantContext, f: F) -> R
	where
		F: FnOnce() -> R,
	{
		let frame = self.push_frame(context);
		ACTIVE_FRAME.sync_scope(frame, f)
	}

	/// Returns the context bound by this store in the current task, if any.
	pub fn get(&self) -> Option<Arc<TenantContext>> {
		let mut frame = current_frame();
		while let Some(f) = frame {
			if f.store_id == self.id {
				return Some(Arc::clone(&f.context));
			}
			frame = f.parent.clone();
		}
		None
	}

	/// Returns the bound context or [`TenancyError::NoTenantContext`].
	pub fn require(&self) -> Result<Arc<TenantContext>, TenancyError> {
		self.get().ok_or(TenancyError::NoTenantContext)
	}

	/// Wraps `future` so that it carries the caller's current binding,
	/// wherever it is eventually polled.
	pub fn scope_current<F>(&self, future: F) -> impl Future<Output = F::Output>
	where
		F: Future,
	{
		let frame = current_frame();
		async move {
			match frame {
				Some(frame) => ACTIVE_FRAME.scope(frame, future).await,
				None => future.await,
			}
		}
	}

	/// Spawns a tokio task that inherits the caller's current binding.
	pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
	where
		F: Future + Send + 'static,
		F::Output: Send + 'static,
	{
		tokio::spawn(self.scope_current(future))
	}

	pub fn current_tenant(&self) -> Option<Tenant> {
		self.get().map(|ctx| ctx.tenant.clone())
	}

	pub fn current_tenant_id(&self) -> Option<TenantId> {
		self.get().map(|ctx| ctx.tenant.id.clone())
	}

	pub fn current_user(&self) -> Option<User> {
		self.get().and_then(|ctx| ctx.user.clone())
	}

	/// Role names of the current context; empty when nothing is bound.
	pub fn current_roles(&self) -> Vec<String> {
		self.get().map(|ctx| ctx.roles.clone()).unwrap_or_default()
	}

	/// Direct permission grants of the current context; empty when nothing is bound.
	pub fn current_permissions(&self) -> Vec<String> {
		self
			.get()
			.map(|ctx| ctx.permissions.clone())
			.unwrap_or_default()
	}

	pub fn has_role(&self, role: &str) -> bool {
		self
			.get()
			.is_some_and(|ctx| ctx.roles.iter().any(|r| r == role))
	}

	/// False for an empty `roles` list.
	pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
		if roles.is_empty() {
			return false;
		}
		let current = self.current_roles();
		roles
			.iter()
			.any(|role| current.iter().any(|r| r == role.as_ref()))
	}

	/// True for an empty `roles` list.
	pub fn has_all_roles<S: AsRef<str>>(&self, roles: &[S]) -> bool {
		if roles.is_empty() {
			return true;
		}
		let current = self.current_roles();
		roles
			.iter()
			.all(|role| current.iter().any(|r| r == role.as_ref()))
	}

	pub fn has_permission(&self, permission: &str) -> bool {
		self
			.get()
			.is_some_and(|ctx| ctx.permissions.iter().any(|p| p == permission))
	}
}
