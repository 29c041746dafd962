// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret value wrappers for Pulse.
//!
//! [`SecretString`] wraps sensitive strings (backdoor keys, OAuth client
//! secrets, access tokens) so they never appear in `Debug`/`Display` output
//! or tracing fields. The inner value is zeroed on drop and only reachable
//! through an explicit [`SecretString::expose`] call, which keeps every
//! access grep-able.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// A string whose value is redacted in all formatting output.
///
/// # Example
///
/// ```
/// use pulse_common_secret::SecretString;
///
/// let key = SecretString::new("super-secret".to_string());
/// assert_eq!(format!("{key:?}"), "SecretString(REDACTED)");
/// assert_eq!(key.expose(), "super-secret");
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
	/// Wrap a sensitive string value.
	pub fn new(value: String) -> Self {
		Self(value)
	}

	/// Access the underlying value.
	///
	/// Call sites should pass the result directly to the consumer (header,
	/// form field, verifier) rather than storing it in an intermediate.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns true if the wrapped value is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Self::new(value.to_string())
	}
}

impl std::fmt::Debug for SecretString {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("SecretString(REDACTED)")
	}
}

impl std::fmt::Display for SecretString {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("REDACTED")
	}
}

impl Drop for SecretString {
	fn drop(&mut self) {
		self.0.zeroize();
	}
}

// Equality compares the exposed values; used in tests and config merging,
// never on hot authentication paths (those go through digest comparison).
impl PartialEq for SecretString {
	fn eq(&self, other: &Self) -> bool {
		self.0 == other.0
	}
}

impl Eq for SecretString {}
