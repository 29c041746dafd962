// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session cookie profiles.
//!
//! Two profiles, chosen per request: the secure profile (TLS-terminated
//! deployments, detected via `x-forwarded-proto`) adds `Secure`; both are
//! `HttpOnly` + `SameSite=Lax` with a 30-day `Max-Age` matching the session
//! record's sliding window.

use axum::http::{header::SET_COOKIE, HeaderMap, HeaderValue};
use axum::response::Response;
use pulse_server_auth::{middleware::SESSION_COOKIE_NAME, SessionId, SESSION_TTL_DAYS};

const SESSION_COOKIE_MAX_AGE_SECS: i64 = SESSION_TTL_DAYS * 24 * 60 * 60;

/// Whether the request arrived over a secured connection.
///
/// The server itself terminates plain HTTP; in production a proxy terminates
/// TLS and sets `x-forwarded-proto`.
pub fn request_is_secure(headers: &HeaderMap) -> bool {
	headers
		.get("x-forwarded-proto")
		.and_then(|v| v.to_str().ok())
		.map(|proto| proto.eq_ignore_ascii_case("https"))
		.unwrap_or(false)
}

/// Build the `Set-Cookie` value that installs a session id.
pub fn session_cookie(session_id: &SessionId, secure: bool) -> String {
	let mut cookie = format!(
		"{SESSION_COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={SESSION_COOKIE_MAX_AGE_SECS}",
		session_id.as_str()
	);
	if secure {
		cookie.push_str("; Secure");
	}
	cookie
}

/// Build the `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
	let mut cookie =
		format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
	if secure {
		cookie.push_str("; Secure");
	}
	cookie
}

/// Append a `Set-Cookie` header to a response. Invalid header values cannot
/// occur for our cookie shapes (hex session ids), but are dropped with a log
/// line rather than poisoning the response.
pub fn append_set_cookie(response: &mut Response, cookie: String) {
	match HeaderValue::from_str(&cookie) {
		Ok(value) => {
			response.headers_mut().append(SET_COOKIE, value);
		}
		Err(e) => {
			tracing::error!(error = %e, "failed to encode session cookie header");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn insecure_profile_omits_secure_attribute() {
		let id = SessionId::from_string("abc123".to_string());
		let cookie = session_cookie(&id, false);
		assert_eq!(
			cookie,
			"pulse_session=abc123; Path=/; HttpOnly; SameSite=Lax; Max-Age=2592000"
		);
	}

	#[test]
	fn secure_profile_adds_secure_attribute() {
		let id = SessionId::from_string("abc123".to_string());
		let cookie = session_cookie(&id, true);
		assert!(cookie.ends_with("; Secure"));
		assert!(cookie.contains("HttpOnly"));
		assert!(cookie.contains("SameSite=Lax"));
	}

	#[test]
	fn clear_cookie_expires_immediately() {
		let cookie = clear_session_cookie(false);
		assert!(cookie.contains("Max-Age=0"));
		assert!(cookie.starts_with("pulse_session=;"));
	}

	#[test]
	fn forwarded_proto_detection() {
		let mut headers = HeaderMap::new();
		assert!(!request_is_secure(&headers));

		headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
		assert!(request_is_secure(&headers));

		headers.insert("x-forwarded-proto", HeaderValue::from_static("HTTPS"));
		assert!(request_is_secure(&headers));

		headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
		assert!(!request_is_secure(&headers));
	}
}
