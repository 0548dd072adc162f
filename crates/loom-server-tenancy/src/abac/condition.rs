// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Condition evaluation.
//!
//! Every failure mode (malformed path, type mismatch, panicking custom
//! evaluator) yields `false` for the condition instead of an error.

use std::cmp::Ordering;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::Value;
use tracing::warn;

use super::types::{Condition, Operator, PolicyContext};

/// Why an attribute could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookup<'a> {
	Found(&'a Value),
	Missing,
	Malformed,
}

/// Walks `path` (dot separated) through `document`.
pub(crate) fn resolve_attribute<'a>(document: &'a Value, path: &str) -> Lookup<'a> {
	if path.is_empty() {
		return Lookup::Malformed;
	}

	let mut current = document;
	for segment in path.split('.') {
		if segment.is_empty() {
			return Lookup::Malformed;
		}
		let next = match current {
			Value::Object(map) => map.get(segment),
			Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
			_ => None,
		};
		match next {
			Some(value) => current = value,
			None => return Lookup::Missing,
		}
	}
	Lookup::Found(current)
}

/// Evaluates one condition against a context and its serialized form.
pub(crate) fn evaluate_condition(
	condition: &Condition,
	context: &PolicyContext,
	document: &Value,
) -> bool {
	if condition.operator == Operator::Custom {
		return evaluate_custom(condition, context);
	}

	let actual = match resolve_attribute(document, &condition.attribute) {
		Lookup::Found(value) => Some(value),
		Lookup::Missing => None,
		Lookup::Malformed => return false,
	};
	let expected = &condition.value;

	match condition.operator {
		Operator::Eq => actual.is_some_and(|a| values_equal(a, expected)),
		Operator::Neq => actual.map_or(true, |a| !values_equal(a, expected)),
		Operator::In => match (actual, expected.as_array()) {
			(Some(a), Some(list)) => list.iter().any(|v| values_equal(a, v)),
			_ => false,
		},
		Operator::Nin => match (actual, expected.as_array()) {
			(Some(a), Some(list)) => !list.iter().any(|v| values_equal(a, v)),
			(None, Some(_)) => true,
			_ => false,
		},
		Operator::Gt => compare(actual, expected).is_some_and(Ordering::is_gt),
		Operator::Gte => compare(actual, expected).is_some_and(Ordering::is_ge),
		Operator::Lt => compare(actual, expected).is_some_and(Ordering::is_lt),
		Operator::Lte => compare(actual, expected).is_some_and(Ordering::is_le),
		Operator::Contains => actual
			.and_then(Value::as_array)
			.is_some_and(|items| items.iter().any(|v| values_equal(v, expected))),
		Operator::Custom => evaluate_custom(condition, context),
	}
}

fn evaluate_custom(condition: &Condition, context: &PolicyContext) -> bool {
	let Some(evaluator) = &condition.custom_evaluator else {
		return false;
	};
	match catch_unwind(AssertUnwindSafe(|| evaluator.call(context))) {
		Ok(result) => result,
		Err(_) => {
			warn!(
				attribute = %condition.attribute,
				"custom condition evaluator panicked; treating as unsatisfied"
			);
			false
		}
	}
}

/// Strict JSON equality, except that numbers compare by value (`3 == 3.0`).
fn values_equal(a: &Value, b: &Value) -> bool {
	match (a, b) {
		(Value::Number(x), Value::Number(y)) if x.is_f64() || y.is_f64() => {
			x.as_f64() == y.as_f64()
		}
		(Value::Array(xs), Value::Array(ys)) => {
			xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
		}
		(Value::Object(xs), Value::Object(ys)) => {
			xs.len() == ys.len()
				&& xs
					.iter()
					.all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
		}
		_ => a == b,
	}
}

/// Orders two numbers or two strings; anything else is incomparable.
fn compare(actual: Option<&Value>, expected: &Value) -> Option<Ordering> {
	match (actual?, expected) {
		(Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
		(Value::String(a), Value::String(b)) => Some(a.cmp(b)),
		_ => None,
	}
}
