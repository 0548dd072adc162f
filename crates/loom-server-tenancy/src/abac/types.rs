// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Type definitions for ABAC policy evaluation.
//!
//! - [`Policy`]: an allow or deny rule over action and resource-type patterns
//! - [`Condition`]: a predicate over one attribute of the [`PolicyContext`]
//! - [`PolicyContext`]: subject, action, resource and environment of one check
//!
//! Policies deserialize from configuration. Custom evaluators are code-only and
//! are skipped by serde.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Whether a satisfied policy grants or revokes access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
	Allow,
	Deny,
}

impl fmt::Display for Effect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Effect::Allow => write!(f, "allow"),
			Effect::Deny => write!(f, "deny"),
		}
	}
}

/// Comparison applied by a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
	Eq,
	Neq,
	In,
	Nin,
	Gt,
	Gte,
	Lt,
	Lte,
	Contains,
	Custom,
}

/// A pure predicate over the whole policy context.
#[derive(Clone)]
pub struct CustomEvaluator(Arc<dyn Fn(&PolicyContext) -> bool + Send + Sync>);

impl CustomEvaluator {
	pub fn new<F>(f: F) -> Self
	where
		F: Fn(&PolicyContext) -> bool + Send + Sync + 'static,
	{
		Self(Arc::new(f))
	}

	pub fn call(&self, context: &PolicyContext) -> bool {
		(self.0)(context)
	}
}

impl fmt::Debug for CustomEvaluator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("CustomEvaluator(..)")
	}
}

/// A single predicate of a policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
	/// Dot path into the serialized policy context, e.g. `resource.attributes.ownerId`.
	pub attribute: String,
	pub operator: Operator,
	#[serde(default)]
	pub value: Value,
	#[serde(skip)]
	pub custom_evaluator: Option<CustomEvaluator>,
}

impl Condition {
	pub fn new(attribute: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
		Self {
			attribute: attribute.into(),
			operator,
			value: value.into(),
			custom_evaluator: None,
		}
	}

	pub fn eq(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
		Self::new(attribute, Operator::Eq, value)
	}

	pub fn neq(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
		Self::new(attribute, Operator::Neq, value)
	}

	pub fn contains(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
		Self::new(attribute, Operator::Contains, value)
	}

	/// A condition decided entirely by `evaluator`.
	pub fn custom<F>(attribute: impl Into<String>, evaluator: F) -> Self
	where
		F: Fn(&PolicyContext) -> bool + Send + Sync + 'static,
	{
		Self {
			attribute: attribute.into(),
			operator: Operator::Custom,
			value: Value::Null,
			custom_evaluator: Some(CustomEvaluator::new(evaluator)),
		}
	}
}

/// An attribute-based access rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
	pub id: String,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	pub effect: Effect,
	pub actions: Vec<String>,
	pub resources: Vec<String>,
	#[serde(default)]
	pub conditions: Vec<Condition>,
	#[serde(default)]
	pub priority: i32,
}

impl Policy {
	/// Creates an unconditional policy with priority 0.
	pub fn new(
		id: impl Into<String>,
		effect: Effect,
		actions: impl IntoIterator<Item = impl Into<String>>,
		resources: impl IntoIterator<Item = impl Into<String>>,
	) -> Self {
		let id = id.into();
		Self {
			name: id.clone(),
			id,
			description: None,
			effect,
			actions: actions.into_iter().map(Into::into).collect(),
			resources: resources.into_iter().map(Into::into).collect(),
			conditions: Vec::new(),
			priority: 0,
		}
	}

	pub fn allow(
		id: impl Into<String>,
		actions: impl IntoIterator<Item = impl Into<String>>,
		resources: impl IntoIterator<Item = impl Into<String>>,
	) -> Self {
		Self::new(id, Effect::Allow, actions, resources)
	}

	pub fn deny(
		id: impl Into<String>,
		actions: impl IntoIterator<Item = impl Into<String>>,
		resources: impl IntoIterator<Item = impl Into<String>>,
	) -> Self {
		Self::new(id, Effect::Deny, actions, resources)
	}

	/// Builder: set the display name.
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	/// Builder: set the description.
	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	/// Builder: append a condition.
	pub fn with_condition(mut self, condition: Condition) -> Self {
		self.conditions.push(condition);
		self
	}

	/// Builder: set the priority. Higher is evaluated first.
	pub fn with_priority(mut self, priority: i32) -> Self {
		self.priority = priority;
		self
	}
}

/// Who is asking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default)]
	pub roles: Vec<String>,
	#[serde(default)]
	pub attributes: Map<String, Value>,
}

/// What is being accessed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
	#[serde(rename = "type")]
	pub resource_type: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default)]
	pub attributes: Map<String, Value>,
}

impl Resource {
	pub fn new(resource_type: impl Into<String>) -> Self {
		Self {
			resource_type: resource_type.into(),
			id: None,
			attributes: Map::new(),
		}
	}

	/// Builder: set the resource id.
	pub fn with_id(mut self, id: impl Into<String>) -> Self {
		self.id = Some(id.into());
		self
	}

	/// Builder: insert an attribute.
	pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.attributes.insert(key.into(), value.into());
		self
	}
}

impl fmt::Display for Resource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.id {
			Some(id) => write!(f, "{}:{}", self.resource_type, id),
			None => f.write_str(&self.resource_type),
		}
	}
}

/// Where and when the request happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
	pub tenant_id: String,
	#[serde(with = "chrono::serde::ts_milliseconds")]
	pub timestamp: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ip_address: Option<String>,
	#[serde(default)]
	pub attributes: Map<String, Value>,
}

impl Environment {
	pub fn new(tenant_id: impl Into<String>) -> Self {
		Self {
			tenant_id: tenant_id.into(),
			timestamp: Utc::now(),
			ip_address: None,
			attributes: Map::new(),
		}
	}

	/// Builder: set the timestamp.
	pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
		self.timestamp = timestamp;
		self
	}

	/// Builder: set the client address.
	pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
		self.ip_address = Some(ip_address.into());
		self
	}
}

/// Input of one policy evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyContext {
	pub subject: Subject,
	pub action: String,
	pub resource: Resource,
	pub environment: Environment,
}

impl PolicyContext {
	pub fn new(
		subject: Subject,
		action: impl Into<String>,
		resource: Resource,
		environment: Environment,
	) -> Self {
		Self {
			subject,
			action: action.into(),
			resource,
			environment,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn policy_deserializes_with_defaults() {
		let policy: Policy = serde_json::from_value(serde_json::json!({
			"id": "p1",
			"name": "Readers",
			"effect": "allow",
			"actions": ["docs:read"],
			"resources": ["doc"],
		}))
		.unwrap();
		assert_eq!(policy.effect, Effect::Allow);
		assert_eq!(policy.priority, 0);
		assert!(policy.conditions.is_empty());
	}

	#[test]
	fn condition_deserializes_operator_names() {
		let condition: Condition = serde_json::from_value(serde_json::json!({
			"attribute": "subject.attributes.level",
			"operator": "gte",
			"value": 3,
		}))
		.unwrap();
		assert_eq!(condition.operator, Operator::Gte);
		assert!(condition.custom_evaluator.is_none());
	}

	#[test]
	fn policy_context_serializes_paths_used_by_conditions() {
		let timestamp = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
		let ctx = PolicyContext::new(
			Subject {
				id: Some("u1".to_string()),
				roles: vec!["member".to_string()],
				attributes: Map::new(),
			},
			"docs:read",
			Resource::new("doc").with_attribute("ownerId", "u1"),
			Environment::new("acme").at(timestamp),
		);
		let value = serde_json::to_value(&ctx).unwrap();
		assert_eq!(value["subject"]["id"], "u1");
		assert_eq!(value["resource"]["type"], "doc");
		assert_eq!(value["resource"]["attributes"]["ownerId"], "u1");
		assert_eq!(value["environment"]["tenantId"], "acme");
		assert_eq!(value["environment"]["timestamp"], 1_700_000_000_000_i64);
	}

	#[test]
	fn resource_display() {
		assert_eq!(Resource::new("doc").to_string(), "doc");
		assert_eq!(Resource::new("doc").with_id("d1").to_string(), "doc:d1");
	}

	#[test]
	fn custom_evaluator_debug_is_opaque() {
		let condition = Condition::custom("subject.id", |_| true);
		assert!(format!("{condition:?}").contains("CustomEvaluator(..)"));
	}
}
