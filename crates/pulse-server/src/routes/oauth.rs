// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OAuth login and callback handlers for Slack and Microsoft.
//!
//! Both providers follow the same shape: the login route stores a random
//! `state` nonce in the session and redirects to the provider; the callback
//! validates the nonce (single use), exchanges the code, fetches a minimal
//! profile, and finds or creates a tenant-scoped identity subject to the
//! organization's provider flags.

use axum::{
	extract::{Query, State},
	http::{HeaderMap, StatusCode},
	response::{IntoResponse, Redirect, Response},
	Extension, Json,
};
use chrono::Utc;
use pulse_server_auth::{
	middleware::extract_session_cookie, AuthError, Identity, OAuthProvider, Role, Session,
	SessionId, UserId,
};
use rand::RngCore;
use serde::Deserialize;

use crate::{
	api::AppState,
	error::{auth_error_response, ErrorResponse, ServerError},
	org_middleware::OrgContext,
	session_cookies::{append_set_cookie, clear_session_cookie, request_is_secure, session_cookie},
};

#[derive(Debug, Deserialize)]
pub struct OAuthLoginParams {
	/// Post-login redirect target, kept in the session across the provider
	/// round-trip.
	pub return_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
	pub code: Option<String>,
	pub state: Option<String>,
	pub error: Option<String>,
}

/// GET /auth/slack - Redirect to Slack's authorization page.
pub async fn slack_login(
	State(state): State<AppState>,
	Extension(org): Extension<OrgContext>,
	headers: HeaderMap,
	Query(params): Query<OAuthLoginParams>,
) -> Result<Response, ServerError> {
	if !org.organization.slack_auth_enabled {
		return Ok(provider_disabled_response("slack"));
	}
	let Some(client) = state.slack_oauth.clone() else {
		return Ok(provider_unconfigured_response("slack"));
	};

	let (session, nonce) = begin_oauth(&state, &headers, params.return_to).await?;

	let secure = request_is_secure(&headers);
	let mut response = Redirect::temporary(&client.authorization_url(&nonce)).into_response();
	append_set_cookie(&mut response, session_cookie(&session.id, secure));
	Ok(response)
}

/// GET /auth/slack/callback - Validate state, exchange the code, sign in.
pub async fn slack_callback(
	State(state): State<AppState>,
	Extension(org): Extension<OrgContext>,
	headers: HeaderMap,
	Query(params): Query<OAuthCallbackParams>,
) -> Result<Response, ServerError> {
	if !org.organization.slack_auth_enabled {
		return Ok(provider_disabled_response("slack"));
	}
	let Some(client) = state.slack_oauth.clone() else {
		return Ok(provider_unconfigured_response("slack"));
	};

	let (session_id, code) = match validate_callback(&state, &headers, &params).await? {
		CallbackValidation::Valid { session_id, code } => (session_id, code),
		CallbackValidation::Corrupted => return Ok(corrupted_session_response(&headers)),
	};

	let token = client.exchange_code(&code).await.map_err(|e| {
		tracing::warn!(error = %e, "Slack code exchange failed");
		ServerError::Auth(AuthError::InvalidCredentials)
	})?;
	let access_token = token
		.access_token
		.as_ref()
		.ok_or_else(|| ServerError::Internal("token response missing access token".to_string()))?;
	let profile = client.get_profile(access_token.expose()).await.map_err(|e| {
		tracing::warn!(error = %e, "Slack profile fetch failed");
		ServerError::Auth(AuthError::InvalidCredentials)
	})?;

	let Some(email) = profile.verified_email() else {
		tracing::warn!("Slack profile has no verified email");
		return Err(ServerError::Auth(AuthError::InvalidCredentials));
	};
	let display_name = profile.name.clone().unwrap_or_else(|| email.to_string());

	let identity = find_or_create_identity(
		&state,
		&org,
		OAuthProvider::Slack,
		&profile.user_id,
		email,
		&display_name,
	)
	.await?;

	finish_login(&state, &org, &headers, &session_id, &identity).await
}

/// GET /auth/microsoft - Redirect to the Microsoft authorization page.
pub async fn microsoft_login(
	State(state): State<AppState>,
	Extension(org): Extension<OrgContext>,
	headers: HeaderMap,
	Query(params): Query<OAuthLoginParams>,
) -> Result<Response, ServerError> {
	if !org.organization.microsoft_auth_enabled {
		return Ok(provider_disabled_response("microsoft"));
	}
	let Some(client) = state.microsoft_oauth.clone() else {
		return Ok(provider_unconfigured_response("microsoft"));
	};

	let (session, nonce) = begin_oauth(&state, &headers, params.return_to).await?;

	let secure = request_is_secure(&headers);
	let mut response = Redirect::temporary(&client.authorization_url(&nonce)).into_response();
	append_set_cookie(&mut response, session_cookie(&session.id, secure));
	Ok(response)
}

/// GET /auth/microsoft/callback - Validate state, exchange the code, sign in.
pub async fn microsoft_callback(
	State(state): State<AppState>,
	Extension(org): Extension<OrgContext>,
	headers: HeaderMap,
	Query(params): Query<OAuthCallbackParams>,
) -> Result<Response, ServerError> {
	if !org.organization.microsoft_auth_enabled {
		return Ok(provider_disabled_response("microsoft"));
	}
	let Some(client) = state.microsoft_oauth.clone() else {
		return Ok(provider_unconfigured_response("microsoft"));
	};

	let (session_id, code) = match validate_callback(&state, &headers, &params).await? {
		CallbackValidation::Valid { session_id, code } => (session_id, code),
		CallbackValidation::Corrupted => return Ok(corrupted_session_response(&headers)),
	};

	let token = client.exchange_code(&code).await.map_err(|e| {
		tracing::warn!(error = %e, "Microsoft code exchange failed");
		ServerError::Auth(AuthError::InvalidCredentials)
	})?;
	let profile = client
		.get_profile(token.access_token.expose())
		.await
		.map_err(|e| {
			tracing::warn!(error = %e, "Microsoft profile fetch failed");
			ServerError::Auth(AuthError::InvalidCredentials)
		})?;

	let Some(email) = profile.email().map(str::to_string) else {
		tracing::warn!("Microsoft profile has no usable email");
		return Err(ServerError::Auth(AuthError::InvalidCredentials));
	};
	let display_name = profile.display_name.clone().unwrap_or_else(|| email.clone());

	let identity = find_or_create_identity(
		&state,
		&org,
		OAuthProvider::Microsoft,
		&profile.id,
		&email,
		&display_name,
	)
	.await?;

	finish_login(&state, &org, &headers, &session_id, &identity).await
}

// =============================================================================
// Shared flow pieces
// =============================================================================

/// Random 128-bit state nonce, hex encoded.
fn generate_state_nonce() -> String {
	let mut bytes = [0u8; 16];
	rand::thread_rng().fill_bytes(&mut bytes);
	hex::encode(bytes)
}

/// Store the nonce (and optional `return_to`) in the session, creating one
/// for anonymous visitors.
async fn begin_oauth(
	state: &AppState,
	headers: &HeaderMap,
	return_to: Option<String>,
) -> Result<(Session, String), ServerError> {
	let existing = match extract_session_cookie(headers) {
		Some(id) => state.session_repo.get_session(&id).await?,
		None => None,
	};
	let mut session = match existing {
		Some(session) => session,
		None => {
			let session = Session::new();
			state.session_repo.create_session(&session).await?;
			tracing::debug!(session_id = %session.id, "created session for OAuth round-trip");
			session
		}
	};

	if let Some(return_to) = return_to {
		session.return_to = Some(return_to);
		state.session_repo.update_session(&session).await?;
	}

	let nonce = generate_state_nonce();
	state.session_repo.set_oauth_state(&session.id, &nonce).await?;
	Ok((session, nonce))
}

enum CallbackValidation {
	Valid { session_id: SessionId, code: String },
	Corrupted,
}

/// Check the callback parameters against the session-stored nonce. The
/// stored nonce is consumed regardless of the outcome (single use).
async fn validate_callback(
	state: &AppState,
	headers: &HeaderMap,
	params: &OAuthCallbackParams,
) -> Result<CallbackValidation, ServerError> {
	if let Some(error) = &params.error {
		tracing::warn!(provider_error = %error, "OAuth provider returned an error");
		return Err(ServerError::Auth(AuthError::InvalidCredentials));
	}

	let Some(session_id) = extract_session_cookie(headers) else {
		return Ok(CallbackValidation::Corrupted);
	};
	let (Some(code), Some(supplied_state)) = (&params.code, &params.state) else {
		return Ok(CallbackValidation::Corrupted);
	};

	let stored = state.session_repo.take_oauth_state(&session_id).await?;
	match stored {
		Some(stored) if stored == *supplied_state => Ok(CallbackValidation::Valid {
			session_id,
			code: code.clone(),
		}),
		_ => {
			tracing::warn!("OAuth state mismatch; destroying session");
			Ok(CallbackValidation::Corrupted)
		}
	}
}

/// Destroy the session and answer with the corrupted-session error.
fn corrupted_session_response(headers: &HeaderMap) -> Response {
	let secure = request_is_secure(headers);
	let mut response = auth_error_response(&AuthError::SessionCorrupted);
	append_set_cookie(&mut response, clear_session_cookie(secure));
	response
}

/// Find the tenant-scoped identity for an OAuth profile, linking or
/// creating as needed.
async fn find_or_create_identity(
	state: &AppState,
	org: &OrgContext,
	provider: OAuthProvider,
	provider_user_id: &str,
	email: &str,
	display_name: &str,
) -> Result<Identity, ServerError> {
	// Linked account first.
	let linked = match provider {
		OAuthProvider::Slack => state.user_repo.find_user_by_slack_id(provider_user_id).await?,
		OAuthProvider::Microsoft => {
			state
				.user_repo
				.find_user_by_microsoft_id(provider_user_id)
				.await?
		}
	};
	if let Some(identity) = linked {
		if identity.org_id == org.org_id {
			return Ok(identity);
		}
		tracing::debug!(
			user_id = %identity.id,
			"provider link belongs to another tenant; resolving by email"
		);
	}

	// Existing identity in this tenant by email: link the provider id.
	if let Some(mut identity) = state.user_repo.get_user_by_email(&org.org_id, email).await? {
		if !identity.is_active {
			tracing::warn!(user_id = %identity.id, "OAuth login for deactivated identity");
			return Err(ServerError::Auth(AuthError::InvalidCredentials));
		}
		match provider {
			OAuthProvider::Slack => identity.slack_user_id = Some(provider_user_id.to_string()),
			OAuthProvider::Microsoft => {
				identity.microsoft_user_id = Some(provider_user_id.to_string())
			}
		}
		state.user_repo.update_user(&identity).await?;
		tracing::info!(user_id = %identity.id, provider = %provider, "linked provider to existing identity");
		return Ok(identity);
	}

	// New tenant-scoped identity, OAuth-only (no password hash).
	let username = available_username(state, org, email).await?;
	let now = Utc::now();
	let identity = Identity {
		id: UserId::generate(),
		email: email.to_string(),
		username,
		display_name: display_name.to_string(),
		password_hash: None,
		role: Role::Member,
		is_super_admin: false,
		is_active: true,
		slack_user_id: match provider {
			OAuthProvider::Slack => Some(provider_user_id.to_string()),
			OAuthProvider::Microsoft => None,
		},
		microsoft_user_id: match provider {
			OAuthProvider::Microsoft => Some(provider_user_id.to_string()),
			OAuthProvider::Slack => None,
		},
		org_id: org.org_id,
		team_id: None,
		created_at: now,
		updated_at: now,
	};
	state.user_repo.create_user(&identity).await?;
	tracing::info!(user_id = %identity.id, provider = %provider, "created identity from OAuth profile");
	Ok(identity)
}

/// Derive a username from the email local part, suffixing on collision.
async fn available_username(
	state: &AppState,
	org: &OrgContext,
	email: &str,
) -> Result<String, ServerError> {
	let local = email.split('@').next().unwrap_or(email).to_lowercase();
	if state
		.user_repo
		.get_user_by_username(&org.org_id, &local)
		.await?
		.is_none()
	{
		return Ok(local);
	}

	let mut suffix = [0u8; 2];
	rand::thread_rng().fill_bytes(&mut suffix);
	Ok(format!("{local}-{}", hex::encode(suffix)))
}

/// Persist the login into the session and redirect to `return_to`.
async fn finish_login(
	state: &AppState,
	org: &OrgContext,
	headers: &HeaderMap,
	session_id: &SessionId,
	identity: &Identity,
) -> Result<Response, ServerError> {
	let session = state
		.session_repo
		.set_session_user(session_id, &identity.id, &org.org_id, &org.organization.slug)
		.await?;

	tracing::info!(user_id = %identity.id, org_id = %org.org_id, "OAuth login succeeded");

	let target = session.return_to.clone().unwrap_or_else(|| "/".to_string());
	let secure = request_is_secure(headers);
	let mut response = Redirect::to(&target).into_response();
	append_set_cookie(&mut response, session_cookie(&session.id, secure));
	Ok(response)
}

fn provider_disabled_response(provider: &str) -> Response {
	(
		StatusCode::FORBIDDEN,
		Json(ErrorResponse {
			error: format!("{provider}_auth_disabled"),
			message: "This sign-in method is disabled for the organization".to_string(),
		}),
	)
		.into_response()
}

fn provider_unconfigured_response(provider: &str) -> Response {
	(
		StatusCode::SERVICE_UNAVAILABLE,
		Json(ErrorResponse {
			error: format!("{provider}_oauth_not_configured"),
			message: "This sign-in method is not configured on the server".to_string(),
		}),
	)
		.into_response()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{seed_org, seed_user, test_state};

	#[test]
	fn state_nonces_are_unique_and_hex() {
		let a = generate_state_nonce();
		let b = generate_state_nonce();
		assert_ne!(a, b);
		assert_eq!(a.len(), 32);
		assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
	}

	#[tokio::test]
	async fn begin_oauth_creates_session_and_stores_nonce() {
		let state = test_state().await;
		let headers = HeaderMap::new();

		let (session, nonce) = begin_oauth(&state, &headers, Some("/team".to_string()))
			.await
			.unwrap();

		let stored = state
			.session_repo
			.get_session(&session.id)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(stored.return_to.as_deref(), Some("/team"));
		assert_eq!(
			state
				.session_repo
				.take_oauth_state(&session.id)
				.await
				.unwrap()
				.as_deref(),
			Some(nonce.as_str())
		);
	}

	#[tokio::test]
	async fn callback_state_is_single_use_and_must_match() {
		let state = test_state().await;
		let headers = HeaderMap::new();
		let (session, nonce) = begin_oauth(&state, &headers, None).await.unwrap();

		let mut headers = HeaderMap::new();
		headers.insert(
			http::header::COOKIE,
			format!("pulse_session={}", session.id.as_str()).parse().unwrap(),
		);

		// Mismatched state consumes the stored nonce.
		let params = OAuthCallbackParams {
			code: Some("code".to_string()),
			state: Some("not-the-nonce".to_string()),
			error: None,
		};
		assert!(matches!(
			validate_callback(&state, &headers, &params).await.unwrap(),
			CallbackValidation::Corrupted
		));

		// Replaying the correct nonce now also fails: single use.
		let params = OAuthCallbackParams {
			code: Some("code".to_string()),
			state: Some(nonce),
			error: None,
		};
		assert!(matches!(
			validate_callback(&state, &headers, &params).await.unwrap(),
			CallbackValidation::Corrupted
		));
	}

	#[tokio::test]
	async fn callback_accepts_matching_state_once() {
		let state = test_state().await;
		let (session, nonce) = begin_oauth(&state, &HeaderMap::new(), None).await.unwrap();

		let mut headers = HeaderMap::new();
		headers.insert(
			http::header::COOKIE,
			format!("pulse_session={}", session.id.as_str()).parse().unwrap(),
		);
		let params = OAuthCallbackParams {
			code: Some("code".to_string()),
			state: Some(nonce),
			error: None,
		};
		match validate_callback(&state, &headers, &params).await.unwrap() {
			CallbackValidation::Valid { session_id, code } => {
				assert_eq!(session_id, session.id);
				assert_eq!(code, "code");
			}
			CallbackValidation::Corrupted => panic!("expected valid callback"),
		}
	}

	#[tokio::test]
	async fn find_or_create_links_provider_to_existing_email() {
		let state = test_state().await;
		let org = seed_org(&state, "acme", true).await;
		let user = seed_user(&state, &org, "casey").await;
		let ctx = OrgContext {
			org_id: org.id,
			organization: org,
		};

		let identity = find_or_create_identity(
			&state,
			&ctx,
			OAuthProvider::Slack,
			"U12345",
			&user.email,
			"Casey",
		)
		.await
		.unwrap();

		assert_eq!(identity.id, user.id);
		assert_eq!(identity.slack_user_id.as_deref(), Some("U12345"));
	}

	#[tokio::test]
	async fn find_or_create_creates_oauth_only_identity() {
		let state = test_state().await;
		let org = seed_org(&state, "acme", true).await;
		let ctx = OrgContext {
			org_id: org.id,
			organization: org,
		};

		let identity = find_or_create_identity(
			&state,
			&ctx,
			OAuthProvider::Microsoft,
			"obj-1",
			"newcomer@example.com",
			"Newcomer",
		)
		.await
		.unwrap();

		assert_eq!(identity.username, "newcomer");
		assert_eq!(identity.role, Role::Member);
		assert!(identity.password_hash.is_none());
		assert_eq!(identity.microsoft_user_id.as_deref(), Some("obj-1"));

		// Second login with the same provider id resolves the same identity.
		let again = find_or_create_identity(
			&state,
			&ctx,
			OAuthProvider::Microsoft,
			"obj-1",
			"newcomer@example.com",
			"Newcomer",
		)
		.await
		.unwrap();
		assert_eq!(again.id, identity.id);
	}

	#[tokio::test]
	async fn provider_link_in_other_tenant_does_not_leak() {
		let state = test_state().await;
		let acme = seed_org(&state, "acme", true).await;
		let beta = seed_org(&state, "beta", true).await;
		let acme_ctx = OrgContext {
			org_id: acme.id,
			organization: acme,
		};
		let beta_ctx = OrgContext {
			org_id: beta.id,
			organization: beta,
		};

		let first = find_or_create_identity(
			&state,
			&acme_ctx,
			OAuthProvider::Slack,
			"U9",
			"casey@example.com",
			"Casey",
		)
		.await
		.unwrap();

		let second = find_or_create_identity(
			&state,
			&beta_ctx,
			OAuthProvider::Slack,
			"U9",
			"casey@example.com",
			"Casey",
		)
		.await
		.unwrap();

		assert_ne!(first.id, second.id);
		assert_eq!(second.org_id, beta_ctx.org_id);
	}
}
