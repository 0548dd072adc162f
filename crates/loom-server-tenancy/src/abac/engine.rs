// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ABAC policy evaluation engine.
//!
//! [`PolicyEngine::evaluate`] decides in four steps:
//!
//! 1. **Select**: a policy applies when one of its action patterns matches the
//!    action and one of its resource patterns matches the resource type
//! 2. **Order**: priority descending, registration order breaking ties
//! 3. **Deny overrides**: any applicable deny whose conditions all hold denies
//! 4. **Allow**: otherwise any applicable allow whose conditions all hold allows
//!
//! Nothing applicable (or nothing satisfied) is a deny.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::condition::evaluate_condition;
use super::types::{Effect, Policy, PolicyContext};
use crate::pattern::matches_any;

/// The policy that decided an evaluation, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
	Allowed { policy_id: String, policy_name: String },
	Denied { policy_id: String, policy_name: String },
	NoMatch,
}

impl PolicyDecision {
	pub fn is_allowed(&self) -> bool {
		matches!(self, PolicyDecision::Allowed { .. })
	}

	fn from_policy(policy: &Policy) -> Self {
		let policy_id = policy.id.clone();
		let policy_name = policy.name.clone();
		match policy.effect {
			Effect::Allow => PolicyDecision::Allowed {
				policy_id,
				policy_name,
			},
			Effect::Deny => PolicyDecision::Denied {
				policy_id,
				policy_name,
			},
		}
	}
}

#[derive(Debug, Clone)]
struct Entry {
	seq: u64,
	policy: Policy,
}

#[derive(Debug, Clone, Default)]
struct PolicySet {
	entries: HashMap<String, Entry>,
	next_seq: u64,
}

/// Registry and evaluator of [`Policy`] rules.
///
/// Uses the same copy-on-write discipline as [`crate::RoleManager`].
#[derive(Debug, Default)]
pub struct PolicyEngine {
	state: RwLock<Arc<PolicySet>>,
}

impl PolicyEngine {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates an engine holding `policies`, in order.
	pub fn with_policies(policies: impl IntoIterator<Item = Policy>) -> Self {
		let engine = Self::new();
		engine.add_policies(policies);
		engine
	}

	fn snapshot(&self) -> Arc<PolicySet> {
		Arc::clone(&self.state.read())
	}

	/// Inserts a policy, or replaces the one with the same id in place.
	pub fn add_policy(&self, policy: Policy) {
		debug!(policy_id = %policy.id, effect = %policy.effect, "registering policy");
		let mut guard = self.state.write();
		let set = Arc::make_mut(&mut guard);
		let seq = match set.entries.get(&policy.id) {
			Some(existing) => existing.seq,
			None => {
				set.next_seq += 1;
				set.next_seq
			}
		};
		set.entries.insert(policy.id.clone(), Entry { seq, policy });
	}

	pub fn add_policies(&self, policies: impl IntoIterator<Item = Policy>) {
		for policy in policies {
			self.add_policy(policy);
		}
	}

	/// Removes a policy. Returns false if it did not exist.
	pub fn remove_policy(&self, id: &str) -> bool {
		let mut guard = self.state.write();
		if !guard.entries.contains_key(id) {
			return false;
		}
		Arc::make_mut(&mut guard).entries.remove(id).is_some()
	}

	pub fn get_policy(&self, id: &str) -> Option<Policy> {
		self.snapshot().entries.get(id).map(|e| e.policy.clone())
	}

	/// All policies in registration order.
	pub fn policies(&self) -> Vec<Policy> {
		let snapshot = self.snapshot();
		let mut entries: Vec<&Entry> = snapshot.entries.values().collect();
		entries.sort_by_key(|e| e.seq);
		entries.into_iter().map(|e| e.policy.clone()).collect()
	}

	pub fn clear(&self) {
		*self.state.write() = Arc::new(PolicySet::default());
	}

	pub fn len(&self) -> usize {
		self.snapshot().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns true if the context is allowed by the registered policies.
	pub fn evaluate(&self, context: &PolicyContext) -> bool {
		self.decide(context).is_allowed()
	}

	/// Evaluates the context and reports which policy decided.
	#[instrument(
		level = "debug",
		skip(self, context),
		fields(
			action = %context.action,
			resource_type = %context.resource.resource_type,
			tenant_id = %context.environment.tenant_id,
		)
	)]
	pub fn decide(&self, context: &PolicyContext) -> PolicyDecision {
		let snapshot = self.snapshot();
		let mut applicable: Vec<&Entry> = snapshot
			.entries
			.values()
			.filter(|e| applies(&e.policy, context))
			.collect();

		if applicable.is_empty() {
			debug!("no applicable policy");
			return PolicyDecision::NoMatch;
		}

		applicable.sort_by(|a, b| {
			b.policy
				.priority
				.cmp(&a.policy.priority)
				.then(a.seq.cmp(&b.seq))
		});

		let document = match serde_json::to_value(context) {
			Ok(document) => document,
			Err(e) => {
				warn!(
					error = %e,
					"failed to serialize policy context; attribute conditions will not match"
				);
				Value::Null
			}
		};

		let satisfied = |policy: &Policy| {
			policy
				.conditions
				.iter()
				.all(|c| evaluate_condition(c, context, &document))
		};

		let decision = applicable
			.iter()
			.find(|e| e.policy.effect == Effect::Deny && satisfied(&e.policy))
			.or_else(|| {
				applicable
					.iter()
					.find(|e| e.policy.effect == Effect::Allow && satisfied(&e.policy))
			})
			.map(|e| PolicyDecision::from_policy(&e.policy))
			.unwrap_or(PolicyDecision::NoMatch);

		debug!(?decision, "policy decision");
		decision
	}
}

fn applies(policy: &Policy, context: &PolicyContext) -> bool {
	matches_any(&policy.actions, &context.action)
		&& matches_any(&policy.resources, &context.resource.resource_type)
}
