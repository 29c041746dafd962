// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Password hashing and verification.
//!
//! Stateless credential verifier for the password strategy. Hashing uses
//! Argon2id with production-strength defaults in release builds and reduced
//! parameters under `#[cfg(test)]` so the test suite stays fast.
//!
//! Verification failures are indistinguishable to callers: a missing hash, a
//! malformed hash, and a wrong password all produce `Ok(false)` at the
//! verify layer, and the route maps that to a generic 401.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
#[cfg(test)]
use argon2::{Algorithm, Params, Version};

/// Errors from password hashing. Verification never errors; see
/// [`verify_password`].
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
	#[error("failed to hash password: {0}")]
	Hash(String),
}

#[inline]
fn argon2_instance() -> Argon2<'static> {
	#[cfg(test)]
	{
		// Fast, insecure parameters for tests ONLY.
		let params = Params::new(1024, 1, 1, None).expect("valid Argon2 params for tests");
		Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
	}

	#[cfg(not(test))]
	{
		// Argon2id, memory=19456 KiB, iterations=2, parallelism=1.
		Argon2::default()
	}
}

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
	let salt = SaltString::generate(&mut OsRng);
	argon2_instance()
		.hash_password(password.as_bytes(), &salt)
		.map(|hash| hash.to_string())
		.map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Verify a password against a stored hash.
///
/// Returns `false` for a wrong password, an unparsable hash, or an absent
/// hash (`None` means password login is disabled for the identity). Never
/// returns an error: the caller always falls through to a generic failure.
pub fn verify_password(password: &str, stored_hash: Option<&str>) -> bool {
	let Some(stored_hash) = stored_hash else {
		return false;
	};

	let Ok(parsed) = PasswordHash::new(stored_hash) else {
		tracing::warn!("stored password hash is unparsable; treating as mismatch");
		return false;
	};

	argon2_instance()
		.verify_password(password.as_bytes(), &parsed)
		.is_ok()
}
