// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session types.
//!
//! A session is a server-side record keyed by an opaque identifier carried in
//! the `pulse_session` cookie. The record binds the request to an
//! authenticated identity and a resolved organization, and holds short-lived
//! OAuth state. The cookie value is the only client-held piece; everything
//! else lives server-side.

use crate::types::{OrgId, UserId};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sliding session lifetime: 30 days, refreshed on read.
pub const SESSION_TTL_DAYS: i64 = 30;

/// An opaque session identifier: 32 random bytes, hex-encoded.
///
/// Not a UUID on purpose; the value carries no structure a client could
/// derive anything from, and 256 bits keeps guessing infeasible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
	/// Generate a new random session id.
	pub fn generate() -> Self {
		let mut bytes = [0u8; 32];
		rand::thread_rng().fill_bytes(&mut bytes);
		Self(hex::encode(bytes))
	}

	/// Wrap an existing identifier (from a cookie or the store).
	pub fn from_string(value: String) -> Self {
		Self(value)
	}

	/// The raw identifier string, as stored and as sent in the cookie.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// Session ids are bearer credentials; never print more than a prefix.
		write!(f, "{}…", &self.0[..self.0.len().min(8)])
	}
}

/// A server-side session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
	pub id: SessionId,
	/// Authenticated identity, set atomically on successful login.
	pub user_id: Option<UserId>,
	/// Resolved organization binding. Only the organization resolver writes
	/// this field.
	pub org_id: Option<OrgId>,
	/// Slug of the bound organization, cached for redirects.
	pub org_slug: Option<String>,
	/// Transient OAuth `state` nonce, cleared after the callback validates it.
	pub oauth_state: Option<String>,
	/// Post-login redirect target.
	pub return_to: Option<String>,
	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

impl Session {
	/// Create a fresh anonymous session with a sliding 30-day expiry.
	pub fn new() -> Self {
		let now = Utc::now();
		Self {
			id: SessionId::generate(),
			user_id: None,
			org_id: None,
			org_slug: None,
			oauth_state: None,
			return_to: None,
			created_at: now,
			expires_at: now + Duration::days(SESSION_TTL_DAYS),
		}
	}

	/// Whether the session has passed its expiry.
	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		now >= self.expires_at
	}

	/// Whether the session carries an authenticated identity.
	pub fn is_authenticated(&self) -> bool {
		self.user_id.is_some()
	}
}

impl Default for Session {
	fn default() -> Self {
		Self::new()
	}
}
