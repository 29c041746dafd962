// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request-context types and extraction helpers for the auth middleware.
//!
//! This module provides:
//! - [`CurrentUser`] - authenticated identity context attached to requests
//! - [`AuthContext`] - auth state for request processing
//! - Cookie and header extraction helpers for every transport the
//!   orchestrator consumes (session cookie, backdoor headers, dev header,
//!   dev cookie)
//!
//! # Authentication Flow
//!
//! ```text
//! Request → Organization Resolver → Orchestrator → AuthContext extension
//!                                        │
//!                                        ├── Session cookie → session lookup
//!                                        ├── Backdoor headers → pair match
//!                                        └── Dev header/cookie → dev only
//! ```
//!
//! # Security Notes
//!
//! - Session ids and backdoor keys are never logged; extraction returns raw
//!   strings that callers pass straight into verifiers.
//! - The impersonation header is extracted only so the orchestrator can
//!   reject it; nothing reads its value.

use crate::session::SessionId;
use crate::types::{OrgId, UserId};
use crate::user::SafeIdentity;
use http::header::COOKIE;
use http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Name of the session cookie.
pub const SESSION_COOKIE_NAME: &str = "pulse_session";

/// Name of the development-only auth cookie (`userId:orgId:token`).
pub const DEV_AUTH_COOKIE_NAME: &str = "pulse_dev_auth";

/// Backdoor transport headers.
pub const BACKDOOR_USER_HEADER: &str = "x-pulse-backdoor-user";
pub const BACKDOOR_KEY_HEADER: &str = "x-pulse-backdoor-key";
/// Impersonation target header. Always rejected; the capability was
/// explicitly revoked and must never be re-enabled implicitly.
pub const BACKDOOR_IMPERSONATE_HEADER: &str = "x-pulse-backdoor-impersonate";

/// Development-only header carrying a user id.
pub const DEV_USER_HEADER: &str = "x-pulse-dev-user";

/// How a request was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
	/// Session cookie (primary, production-safe path).
	Session,
	/// Backdoor credential pair.
	Backdoor,
	/// Development-only header or cookie.
	DevFallback,
}

/// The currently authenticated identity, attached to request extensions.
///
/// Carries the sanitized identity projection; raw identities (with password
/// hashes and provider ids) never leave the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
	/// The authenticated identity, sanitized of credential fields.
	pub identity: SafeIdentity,
	/// Session id, when the session strategy (or a strategy that persisted
	/// into the session) authenticated the request.
	pub session_id: Option<SessionId>,
	/// Which strategy authenticated this request.
	pub method: AuthMethod,
}

impl CurrentUser {
	/// Identity established via the session store.
	pub fn from_session(identity: SafeIdentity, session_id: SessionId) -> Self {
		Self {
			identity,
			session_id: Some(session_id),
			method: AuthMethod::Session,
		}
	}

	/// Identity established via the backdoor pair. The session id is present
	/// because the backdoor persists the identity for subsequent requests.
	pub fn from_backdoor(identity: SafeIdentity, session_id: SessionId) -> Self {
		Self {
			identity,
			session_id: Some(session_id),
			method: AuthMethod::Backdoor,
		}
	}

	/// Identity established via a development-only fallback path.
	pub fn from_dev_fallback(identity: SafeIdentity) -> Self {
		Self {
			identity,
			session_id: None,
			method: AuthMethod::DevFallback,
		}
	}

	/// The authenticated user's id.
	pub fn user_id(&self) -> UserId {
		self.identity.id
	}

	/// The organization the identity is bound to.
	pub fn org_id(&self) -> OrgId {
		self.identity.org_id
	}
}

/// Authentication state for request processing, attached as an extension.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
	/// The current user, if any strategy succeeded.
	pub current_user: Option<CurrentUser>,
}

impl AuthContext {
	/// An unauthenticated context.
	pub fn unauthenticated() -> Self {
		Self { current_user: None }
	}

	/// An authenticated context.
	pub fn authenticated(current_user: CurrentUser) -> Self {
		Self {
			current_user: Some(current_user),
		}
	}

	/// Whether any strategy succeeded.
	pub fn is_authenticated(&self) -> bool {
		self.current_user.is_some()
	}

	/// The current user, if authenticated.
	pub fn user(&self) -> Option<&CurrentUser> {
		self.current_user.as_ref()
	}
}

/// Extract a cookie value by name from the Cookie header.
pub fn extract_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
	headers
		.get(COOKIE)?
		.to_str()
		.ok()?
		.split(';')
		.find_map(|cookie| {
			let cookie = cookie.trim();
			let (name, value) = cookie.split_once('=')?;
			if name == cookie_name {
				Some(value.to_string())
			} else {
				None
			}
		})
}

/// Extract the session id from the session cookie.
pub fn extract_session_cookie(headers: &HeaderMap) -> Option<SessionId> {
	extract_cookie(headers, SESSION_COOKIE_NAME).map(SessionId::from_string)
}

/// A backdoor credential pair supplied on the request, plus whether an
/// impersonation target was present (its value is deliberately not kept).
#[derive(Debug, Clone)]
pub struct BackdoorHeaders {
	pub user: String,
	pub key: String,
	pub impersonation_requested: bool,
}

/// Extract the backdoor headers, if the pair is present.
///
/// Returns `None` unless both the user and key headers are set; a lone
/// header is not a backdoor attempt.
pub fn extract_backdoor_headers(headers: &HeaderMap) -> Option<BackdoorHeaders> {
	let user = headers.get(BACKDOOR_USER_HEADER)?.to_str().ok()?.to_string();
	let key = headers.get(BACKDOOR_KEY_HEADER)?.to_str().ok()?.to_string();
	let impersonation_requested = headers.contains_key(BACKDOOR_IMPERSONATE_HEADER);
	Some(BackdoorHeaders {
		user,
		key,
		impersonation_requested,
	})
}

/// Extract the development-only user id header.
pub fn extract_dev_user_header(headers: &HeaderMap) -> Option<UserId> {
	headers
		.get(DEV_USER_HEADER)?
		.to_str()
		.ok()?
		.parse()
		.ok()
}

/// The parsed development cookie triple.
#[derive(Debug, Clone)]
pub struct DevAuthCookie {
	pub user_id: UserId,
	pub org_id: OrgId,
	/// Opaque token; accepted unchecked in development, never logged.
	pub token: String,
}

/// Extract and parse the development cookie (`userId:orgId:token`).
pub fn extract_dev_auth_cookie(headers: &HeaderMap) -> Option<DevAuthCookie> {
	let raw = extract_cookie(headers, DEV_AUTH_COOKIE_NAME)?;
	let mut parts = raw.splitn(3, ':');
	let user_id: UserId = parts.next()?.parse().ok()?;
	let org_id: OrgId = parts.next()?.parse().ok()?;
	let token = parts.next()?.to_string();
	Some(DevAuthCookie {
		user_id,
		org_id,
		token,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::Role;
	use http::header::HeaderValue;
	use uuid::Uuid;

	fn make_safe_identity() -> SafeIdentity {
		SafeIdentity {
			id: UserId::generate(),
			email: "casey@example.com".to_string(),
			username: "casey".to_string(),
			display_name: "Casey".to_string(),
			role: Role::Member,
			is_super_admin: false,
			is_active: true,
			org_id: OrgId::generate(),
			team_id: None,
		}
	}

	mod current_user {
		use super::*;

		#[test]
		fn from_session_records_method_and_id() {
			let session_id = SessionId::generate();
			let user = CurrentUser::from_session(make_safe_identity(), session_id.clone());
			assert_eq!(user.method, AuthMethod::Session);
			assert_eq!(user.session_id, Some(session_id));
		}

		#[test]
		fn from_dev_fallback_has_no_session() {
			let user = CurrentUser::from_dev_fallback(make_safe_identity());
			assert_eq!(user.method, AuthMethod::DevFallback);
			assert!(user.session_id.is_none());
		}

		#[test]
		fn accessors_expose_ids() {
			let identity = make_safe_identity();
			let user_id = identity.id;
			let org_id = identity.org_id;
			let user = CurrentUser::from_dev_fallback(identity);
			assert_eq!(user.user_id(), user_id);
			assert_eq!(user.org_id(), org_id);
		}
	}

	mod auth_context {
		use super::*;

		#[test]
		fn unauthenticated_has_no_user() {
			let ctx = AuthContext::unauthenticated();
			assert!(!ctx.is_authenticated());
			assert!(ctx.user().is_none());
		}

		#[test]
		fn authenticated_has_user() {
			let user = CurrentUser::from_dev_fallback(make_safe_identity());
			let ctx = AuthContext::authenticated(user);
			assert!(ctx.is_authenticated());
			assert!(ctx.user().is_some());
		}
	}

	mod cookies {
		use super::*;

		#[test]
		fn extracts_session_from_multiple_cookies() {
			let mut headers = HeaderMap::new();
			headers.insert(
				COOKIE,
				HeaderValue::from_static("other=value; pulse_session=abc123; more=x"),
			);
			let id = extract_session_cookie(&headers).unwrap();
			assert_eq!(id.as_str(), "abc123");
		}

		#[test]
		fn returns_none_when_cookie_missing() {
			let headers = HeaderMap::new();
			assert!(extract_session_cookie(&headers).is_none());

			let mut headers = HeaderMap::new();
			headers.insert(COOKIE, HeaderValue::from_static("other=value"));
			assert!(extract_session_cookie(&headers).is_none());
		}

		#[test]
		fn handles_whitespace_around_cookies() {
			let mut headers = HeaderMap::new();
			headers.insert(
				COOKIE,
				HeaderValue::from_static("  pulse_session=tok123  ; other=val"),
			);
			assert_eq!(
				extract_session_cookie(&headers).unwrap().as_str(),
				"tok123"
			);
		}
	}

	mod backdoor_headers {
		use super::*;

		#[test]
		fn extracts_complete_pair() {
			let mut headers = HeaderMap::new();
			headers.insert(BACKDOOR_USER_HEADER, HeaderValue::from_static("ops"));
			headers.insert(BACKDOOR_KEY_HEADER, HeaderValue::from_static("key"));

			let bd = extract_backdoor_headers(&headers).unwrap();
			assert_eq!(bd.user, "ops");
			assert_eq!(bd.key, "key");
			assert!(!bd.impersonation_requested);
		}

		#[test]
		fn lone_header_is_not_an_attempt() {
			let mut headers = HeaderMap::new();
			headers.insert(BACKDOOR_USER_HEADER, HeaderValue::from_static("ops"));
			assert!(extract_backdoor_headers(&headers).is_none());

			let mut headers = HeaderMap::new();
			headers.insert(BACKDOOR_KEY_HEADER, HeaderValue::from_static("key"));
			assert!(extract_backdoor_headers(&headers).is_none());
		}

		#[test]
		fn flags_impersonation_without_keeping_value() {
			let mut headers = HeaderMap::new();
			headers.insert(BACKDOOR_USER_HEADER, HeaderValue::from_static("ops"));
			headers.insert(BACKDOOR_KEY_HEADER, HeaderValue::from_static("key"));
			headers.insert(
				BACKDOOR_IMPERSONATE_HEADER,
				HeaderValue::from_static("victim@example.com"),
			);

			let bd = extract_backdoor_headers(&headers).unwrap();
			assert!(bd.impersonation_requested);
		}
	}

	mod dev_transports {
		use super::*;

		#[test]
		fn dev_header_parses_uuid() {
			let user_id = UserId::generate();
			let mut headers = HeaderMap::new();
			headers.insert(
				DEV_USER_HEADER,
				HeaderValue::from_str(&user_id.to_string()).unwrap(),
			);
			assert_eq!(extract_dev_user_header(&headers), Some(user_id));
		}

		#[test]
		fn dev_header_rejects_garbage() {
			let mut headers = HeaderMap::new();
			headers.insert(DEV_USER_HEADER, HeaderValue::from_static("not-a-uuid"));
			assert!(extract_dev_user_header(&headers).is_none());
		}

		#[test]
		fn dev_cookie_parses_triple() {
			let user_id = Uuid::new_v4();
			let org_id = Uuid::new_v4();
			let raw = format!("pulse_dev_auth={user_id}:{org_id}:tok-1");
			let mut headers = HeaderMap::new();
			headers.insert(COOKIE, HeaderValue::from_str(&raw).unwrap());

			let cookie = extract_dev_auth_cookie(&headers).unwrap();
			assert_eq!(cookie.user_id.into_inner(), user_id);
			assert_eq!(cookie.org_id.into_inner(), org_id);
			assert_eq!(cookie.token, "tok-1");
		}

		#[test]
		fn dev_cookie_rejects_malformed_triple() {
			for raw in [
				"pulse_dev_auth=only-one-part",
				"pulse_dev_auth=not-uuid:also-not:tok",
				"pulse_dev_auth=",
			] {
				let mut headers = HeaderMap::new();
				headers.insert(COOKIE, HeaderValue::from_static(raw));
				assert!(extract_dev_auth_cookie(&headers).is_none(), "raw: {raw}");
			}
		}
	}
}
