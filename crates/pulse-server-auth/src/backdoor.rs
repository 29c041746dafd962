// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Backdoor credential verification.
//!
//! Stateless verifier for the backdoor strategy: two request-supplied values
//! must exactly match the two server-configured secrets. Comparison is
//! fixed-time over SHA-256 digests so neither value length nor matching
//! prefix length leaks through timing.

use crate::gate::BackdoorConfig;
use sha2::{Digest, Sha256};

/// Fixed-time equality over the SHA-256 digests of two strings.
fn digest_eq(a: &str, b: &str) -> bool {
	let da = Sha256::digest(a.as_bytes());
	let db = Sha256::digest(b.as_bytes());
	// Digests are fixed-length; accumulate the full XOR before deciding.
	let mut diff = 0u8;
	for (x, y) in da.iter().zip(db.iter()) {
		diff |= x ^ y;
	}
	diff == 0
}

/// Verify a supplied backdoor pair against the configured secrets.
///
/// Both values must match. The supplied values are never logged.
pub fn verify_backdoor_pair(config: &BackdoorConfig, user: &str, key: &str) -> bool {
	// Evaluate both comparisons unconditionally.
	let user_ok = digest_eq(user, &config.user);
	let key_ok = digest_eq(key, config.key.expose());
	user_ok && key_ok
}

#[cfg(test)]
mod tests {
	use super::*;
	use pulse_common_secret::SecretString;

	fn make_config() -> BackdoorConfig {
		BackdoorConfig {
			user: "ops".to_string(),
			key: SecretString::from("s3cret-key"),
			admin_username: "pulse-admin".to_string(),
			admin_email: "admin@pulse.local".to_string(),
			admin_display_name: "Pulse Admin".to_string(),
		}
	}

	#[test]
	fn accepts_exact_match() {
		assert!(verify_backdoor_pair(&make_config(), "ops", "s3cret-key"));
	}

	#[test]
	fn rejects_wrong_user() {
		assert!(!verify_backdoor_pair(&make_config(), "oops", "s3cret-key"));
	}

	#[test]
	fn rejects_wrong_key() {
		assert!(!verify_backdoor_pair(&make_config(), "ops", "s3cret-kez"));
	}

	#[test]
	fn rejects_empty_values() {
		assert!(!verify_backdoor_pair(&make_config(), "", ""));
		assert!(!verify_backdoor_pair(&make_config(), "ops", ""));
		assert!(!verify_backdoor_pair(&make_config(), "", "s3cret-key"));
	}

	#[test]
	fn comparison_is_case_sensitive() {
		assert!(!verify_backdoor_pair(&make_config(), "OPS", "s3cret-key"));
		assert!(!verify_backdoor_pair(&make_config(), "ops", "S3CRET-KEY"));
	}

	#[test]
	fn digest_eq_handles_length_differences() {
		assert!(!digest_eq("short", "a-much-longer-value"));
		assert!(digest_eq("same", "same"));
	}
}
