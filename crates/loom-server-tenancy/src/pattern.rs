// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Glob matching for permission strings, actions and resource types.
//!
//! `*` alone matches everything. Otherwise the pattern is literal text in which
//! every `*` matches any run of characters (including none), anchored at both
//! ends. No other character is special.

/// Returns true if `value` matches the glob `pattern`.
pub fn matches_pattern(pattern: &str, value: &str) -> bool {
	if pattern == "*" || pattern == value {
		return true;
	}

	if !pattern.contains('*') {
		return false;
	}

	let mut segments = pattern.split('*');
	let Some(first) = segments.next() else {
		return false;
	};
	let Some(mut rest) = value.strip_prefix(first) else {
		return false;
	};

	let middle: Vec<&str> = segments.collect();
	let Some((last, middle)) = middle.split_last() else {
		return rest.is_empty();
	};

	for segment in middle {
		match rest.find(segment) {
			Some(idx) => rest = &rest[idx + segment.len()..],
			None => return false,
		}
	}

	rest.len() >= last.len() && rest.ends_with(last)
}

/// Returns true if any of `patterns` matches `value`.
pub fn matches_any<S: AsRef<str>>(patterns: &[S], value: &str) -> bool {
	patterns.iter().any(|p| matches_pattern(p.as_ref(), value))
}
