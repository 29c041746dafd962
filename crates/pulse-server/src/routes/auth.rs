// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Password login, logout, and the current-identity endpoint.

use axum::{
	extract::State,
	http::{HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	Extension, Json,
};
use pulse_server_auth::{
	middleware::extract_session_cookie, password::verify_password, AuthContext, AuthError,
	SessionId,
};
use serde::Deserialize;

use crate::{
	api::AppState,
	error::{unauthorized_response, ErrorResponse, ServerError},
	org_middleware::OrgContext,
	session_cookies::{append_set_cookie, clear_session_cookie, request_is_secure, session_cookie},
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
	/// Username or email address, resolved within the tenant.
	pub username: String,
	pub password: String,
}

/// POST /auth/login - Password login within the resolved organization.
///
/// The response installs a fresh session id (anti-fixation: the pre-login
/// session id never becomes an authenticated session).
pub async fn login(
	State(state): State<AppState>,
	Extension(org): Extension<OrgContext>,
	headers: HeaderMap,
	Json(body): Json<LoginRequest>,
) -> Result<Response, ServerError> {
	if !org.organization.local_auth_enabled {
		return Ok((
			StatusCode::FORBIDDEN,
			Json(ErrorResponse {
				error: "local_auth_disabled".to_string(),
				message: "Password login is disabled for this organization".to_string(),
			}),
		)
			.into_response());
	}

	let identity = match state
		.user_repo
		.get_user_by_username(&org.org_id, &body.username)
		.await?
	{
		Some(identity) => Some(identity),
		None => state
			.user_repo
			.get_user_by_email(&org.org_id, &body.username)
			.await?,
	};

	// One rejection shape for unknown user, wrong password, disabled
	// password login, and deactivated identity.
	let Some(identity) = identity else {
		tracing::debug!(org_id = %org.org_id, "login failed: unknown user");
		return Err(ServerError::Auth(AuthError::InvalidCredentials));
	};
	if !identity.is_active
		|| !verify_password(&body.password, identity.password_hash.as_deref())
	{
		tracing::debug!(user_id = %identity.id, "login failed: credential mismatch");
		return Err(ServerError::Auth(AuthError::InvalidCredentials));
	}

	let session_id = extract_session_cookie(&headers).unwrap_or_else(SessionId::generate);
	let session = state
		.session_repo
		.set_session_user(&session_id, &identity.id, &org.org_id, &org.organization.slug)
		.await?;

	tracing::info!(user_id = %identity.id, org_id = %org.org_id, "password login succeeded");

	let secure = request_is_secure(&headers);
	let mut response = Json(identity.sanitized()).into_response();
	append_set_cookie(&mut response, session_cookie(&session.id, secure));
	Ok(response)
}

/// POST /auth/logout - Destroy the session and clear the cookie.
pub async fn logout(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Response, ServerError> {
	if let Some(session_id) = extract_session_cookie(&headers) {
		let deleted = state.session_repo.clear_session(&session_id).await?;
		if deleted {
			tracing::debug!("session destroyed on logout");
		}
	}

	let secure = request_is_secure(&headers);
	let mut response = StatusCode::NO_CONTENT.into_response();
	append_set_cookie(&mut response, clear_session_cookie(secure));
	Ok(response)
}

/// GET /auth/me - The authenticated identity (sanitized projection).
pub async fn me(Extension(auth): Extension<AuthContext>) -> Response {
	match auth.current_user {
		Some(current_user) => Json(current_user.identity).into_response(),
		// Unreachable behind require_auth_layer; kept total anyway.
		None => unauthorized_response(),
	}
}
