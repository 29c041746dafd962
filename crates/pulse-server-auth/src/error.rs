// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication error taxonomy.
//!
//! Verifier-level failures never propagate past the orchestrator; they are
//! converted into a fallthrough to the next strategy. The variants here are
//! the terminal outcomes route handlers and middleware translate into HTTP
//! responses. Client-visible messages are generic; richer context goes to
//! logs with secrets redacted.

/// Terminal authentication/authorization failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
	/// No strategy succeeded and the route requires authentication (401).
	#[error("authentication required")]
	AuthenticationRequired,

	/// Password or backdoor credentials did not match (401).
	#[error("invalid credentials")]
	InvalidCredentials,

	/// Identity present but lacks the required role (403).
	#[error("insufficient role")]
	InsufficientRole,

	/// No organization could be resolved for the request (404).
	#[error("organization not found")]
	OrganizationNotFound,

	/// The resolved organization is deactivated (403).
	#[error("organization inactive")]
	OrganizationInactive,

	/// The request used a capability that was explicitly removed (400).
	/// Currently only backdoor impersonation.
	#[error("this feature has been removed")]
	FeatureRemoved,

	/// Session state failed integrity checks; the session is destroyed and
	/// the client must re-authenticate.
	#[error("session corrupted")]
	SessionCorrupted,
}

impl AuthError {
	/// The HTTP status code this error maps to.
	pub fn status_code(&self) -> u16 {
		match self {
			AuthError::AuthenticationRequired | AuthError::InvalidCredentials => 401,
			AuthError::InsufficientRole | AuthError::OrganizationInactive => 403,
			AuthError::OrganizationNotFound => 404,
			AuthError::FeatureRemoved => 400,
			// A corrupted session reads as an auth failure to the client.
			AuthError::SessionCorrupted => 401,
		}
	}
}
