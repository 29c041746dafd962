// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication orchestrator middleware.
//!
//! Runs after the organization resolver. Strategies are tried in a fixed
//! priority order; each one is gated by the immutable [`SecurityConfig`]
//! and either produces a [`CurrentUser`] or falls through:
//!
//! 1. Session cookie (always eligible)
//! 2. Backdoor credential pair (gated by `backdoor_auth_allowed`)
//! 3. Dev user header (gated by `development_auth_enabled`)
//! 4. Dev auth cookie (same gate)
//!
//! A request that no strategy claims proceeds unauthenticated; routes that
//! need an identity reject it with 401 via [`require_auth_layer`]. The
//! orchestrator itself errors out only for backdoor impersonation, which is
//! rejected with 400 before any credential is examined.

use async_trait::async_trait;
use axum::{
	body::Body,
	extract::State,
	http::{HeaderMap, Request},
	middleware::Next,
	response::{IntoResponse, Response},
};
use pulse_server_auth::{
	backdoor::verify_backdoor_pair,
	backdoor_auth_allowed, development_auth_enabled,
	gate::RuntimeEnvironment,
	middleware::{
		extract_backdoor_headers, extract_dev_auth_cookie, extract_dev_user_header,
		extract_session_cookie,
	},
	types::{DEFAULT_ORG_ID, DEFAULT_ORG_SLUG},
	AuthContext, AuthError, CurrentUser, OrgId, Role, SecurityConfig, SessionId,
};
use pulse_server_db::DbError;

use crate::{
	api::AppState,
	error::{auth_error_response, ServerError},
	org_middleware::OrgContext,
	session_cookies::{append_set_cookie, request_is_secure, session_cookie},
};

/// Post-auth attributes the synchronous role layers need but cannot fetch
/// themselves. Computed once per authenticated request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthzAttrs {
	/// The identity is the recorded leader of at least one team in the
	/// resolved tenant.
	pub leads_any_team: bool,
	/// The resolved tenant is attached to an active partner firm.
	pub org_has_active_partner_firm: bool,
}

/// A successful strategy outcome.
struct AuthOutcome {
	current_user: CurrentUser,
	/// Session id to install on the response, for strategies that persisted
	/// a new session (currently only the backdoor).
	install_cookie: Option<SessionId>,
}

#[async_trait]
trait AuthenticationStrategy: Send + Sync {
	fn name(&self) -> &'static str;

	fn is_eligible(&self, security: &SecurityConfig) -> bool;

	/// Attempt authentication. `Ok(None)` means "not my request, fall
	/// through"; database errors are logged by the orchestrator and also
	/// fall through.
	async fn authenticate(
		&self,
		state: &AppState,
		org: &OrgContext,
		headers: &HeaderMap,
	) -> Result<Option<AuthOutcome>, DbError>;
}

/// Middleware entry point.
pub async fn auth_layer(
	State(state): State<AppState>,
	mut req: Request<Body>,
	next: Next,
) -> Response {
	let Some(org_ctx) = req.extensions().get::<OrgContext>().cloned() else {
		tracing::error!("authentication ran without an organization context");
		return ServerError::Internal("organization resolver not wired".to_string())
			.into_response();
	};

	// Impersonation is rejected before any credential is examined, in every
	// environment, even with a correct pair. The capability was removed.
	if let Some(backdoor) = extract_backdoor_headers(req.headers()) {
		if backdoor.impersonation_requested {
			tracing::warn!(user = %backdoor.user, "backdoor impersonation attempt rejected");
			return auth_error_response(&AuthError::FeatureRemoved);
		}
	}

	let secure = request_is_secure(req.headers());
	let outcome = authenticate(&state, &org_ctx, req.headers()).await;

	let mut install_cookie = None;
	let auth_ctx = match outcome {
		Some(outcome) => {
			install_cookie = outcome.install_cookie;
			let attrs = build_authz_attrs(&state, &org_ctx, &outcome.current_user).await;
			req.extensions_mut().insert(attrs);
			AuthContext::authenticated(outcome.current_user)
		}
		None => AuthContext::unauthenticated(),
	};
	req.extensions_mut().insert(auth_ctx);

	let mut response = next.run(req).await;
	if let Some(session_id) = install_cookie {
		append_set_cookie(&mut response, session_cookie(&session_id, secure));
	}
	response
}

/// Layer for routes that require an authenticated identity.
pub async fn require_auth_layer(req: Request<Body>, next: Next) -> Response {
	let authenticated = req
		.extensions()
		.get::<AuthContext>()
		.map(AuthContext::is_authenticated)
		.unwrap_or(false);

	if !authenticated {
		return auth_error_response(&AuthError::AuthenticationRequired);
	}
	next.run(req).await
}

async fn authenticate(
	state: &AppState,
	org: &OrgContext,
	headers: &HeaderMap,
) -> Option<AuthOutcome> {
	let strategies: [&dyn AuthenticationStrategy; 4] = [
		&SessionStrategy,
		&BackdoorStrategy,
		&DevHeaderStrategy,
		&DevCookieStrategy,
	];

	for strategy in strategies {
		if !strategy.is_eligible(&state.security) {
			continue;
		}
		match strategy.authenticate(state, org, headers).await {
			Ok(Some(outcome)) => {
				tracing::debug!(
					strategy = strategy.name(),
					user_id = %outcome.current_user.user_id(),
					"authentication succeeded"
				);
				return Some(outcome);
			}
			Ok(None) => {}
			Err(e) => {
				tracing::warn!(strategy = strategy.name(), error = %e, "authentication strategy failed");
			}
		}
	}
	None
}

async fn build_authz_attrs(
	state: &AppState,
	org: &OrgContext,
	current_user: &CurrentUser,
) -> AuthzAttrs {
	let leads_any_team = match state
		.team_repo
		.leads_any_team(&org.org_id, &current_user.user_id())
		.await
	{
		Ok(leads) => leads,
		Err(e) => {
			tracing::warn!(error = %e, "team leadership lookup failed");
			false
		}
	};

	let org_has_active_partner_firm = match org.organization.partner_firm_id {
		Some(firm_id) => match state.org_repo.get_partner_firm(&firm_id).await {
			Ok(Some(firm)) => firm.is_active,
			Ok(None) => false,
			Err(e) => {
				tracing::warn!(error = %e, "partner firm lookup failed");
				false
			}
		},
		None => false,
	};

	AuthzAttrs {
		leads_any_team,
		org_has_active_partner_firm,
	}
}

// =============================================================================
// Strategies
// =============================================================================

struct SessionStrategy;

#[async_trait]
impl AuthenticationStrategy for SessionStrategy {
	fn name(&self) -> &'static str {
		"session"
	}

	fn is_eligible(&self, _security: &SecurityConfig) -> bool {
		true
	}

	async fn authenticate(
		&self,
		state: &AppState,
		org: &OrgContext,
		headers: &HeaderMap,
	) -> Result<Option<AuthOutcome>, DbError> {
		let Some(session_id) = extract_session_cookie(headers) else {
			return Ok(None);
		};
		let Some(session) = state.session_repo.get_session(&session_id).await? else {
			return Ok(None);
		};
		let Some(user_id) = session.user_id else {
			return Ok(None);
		};

		// Scoped to the resolved tenant. A session user that does not exist
		// in this org does not authenticate here.
		let Some(identity) = state.user_repo.get_user(&org.org_id, &user_id).await? else {
			tracing::debug!(session_id = %session.id, "session user not present in resolved org");
			return Ok(None);
		};
		if !identity.is_active {
			tracing::debug!(user_id = %identity.id, "session identity is deactivated");
			return Ok(None);
		}

		Ok(Some(AuthOutcome {
			current_user: CurrentUser::from_session(identity.sanitized(), session.id),
			install_cookie: None,
		}))
	}
}

struct BackdoorStrategy;

#[async_trait]
impl AuthenticationStrategy for BackdoorStrategy {
	fn name(&self) -> &'static str {
		"backdoor"
	}

	fn is_eligible(&self, security: &SecurityConfig) -> bool {
		backdoor_auth_allowed(security)
	}

	async fn authenticate(
		&self,
		state: &AppState,
		_org: &OrgContext,
		headers: &HeaderMap,
	) -> Result<Option<AuthOutcome>, DbError> {
		let Some(supplied) = extract_backdoor_headers(headers) else {
			return Ok(None);
		};
		let Some(backdoor) = &state.security.backdoor else {
			tracing::debug!("backdoor headers present but no pair is configured");
			return Ok(None);
		};

		if !verify_backdoor_pair(backdoor, &supplied.user, &supplied.key) {
			tracing::warn!(user = %supplied.user, "backdoor credential mismatch");
			return Ok(None);
		}

		let identity = match state.security.environment {
			RuntimeEnvironment::Development => {
				state
					.user_repo
					.ensure_backdoor_admin(
						&backdoor.admin_username,
						&backdoor.admin_email,
						&backdoor.admin_display_name,
					)
					.await?
			}
			// Production override: only an existing active admin identity.
			// Never auto-create outside development.
			_ => {
				let default_org = OrgId::new(DEFAULT_ORG_ID);
				let Some(identity) = state
					.user_repo
					.get_user_by_username(&default_org, &backdoor.admin_username)
					.await?
				else {
					tracing::warn!("backdoor refused: no existing admin identity");
					return Ok(None);
				};
				if !identity.is_active
					|| !(identity.is_super_admin || identity.role == Role::Admin)
				{
					tracing::warn!(user_id = %identity.id, "backdoor refused: identity is not an active admin");
					return Ok(None);
				}
				identity
			}
		};

		// Persist into a session so subsequent requests ride the primary
		// strategy. The write is awaited before the response is produced.
		let session_id =
			extract_session_cookie(headers).unwrap_or_else(SessionId::generate);
		let session = state
			.session_repo
			.set_session_user(&session_id, &identity.id, &identity.org_id, DEFAULT_ORG_SLUG)
			.await?;

		Ok(Some(AuthOutcome {
			current_user: CurrentUser::from_backdoor(identity.sanitized(), session.id.clone()),
			install_cookie: Some(session.id),
		}))
	}
}

struct DevHeaderStrategy;

#[async_trait]
impl AuthenticationStrategy for DevHeaderStrategy {
	fn name(&self) -> &'static str {
		"dev_header"
	}

	fn is_eligible(&self, security: &SecurityConfig) -> bool {
		development_auth_enabled(security)
	}

	async fn authenticate(
		&self,
		state: &AppState,
		_org: &OrgContext,
		headers: &HeaderMap,
	) -> Result<Option<AuthOutcome>, DbError> {
		let Some(user_id) = extract_dev_user_header(headers) else {
			return Ok(None);
		};
		let Some(identity) = state.user_repo.get_user_global(&user_id).await? else {
			tracing::debug!(user_id = %user_id, "dev header user not found");
			return Ok(None);
		};
		if !identity.is_active {
			return Ok(None);
		}

		Ok(Some(AuthOutcome {
			current_user: CurrentUser::from_dev_fallback(identity.sanitized()),
			install_cookie: None,
		}))
	}
}

struct DevCookieStrategy;

#[async_trait]
impl AuthenticationStrategy for DevCookieStrategy {
	fn name(&self) -> &'static str {
		"dev_cookie"
	}

	fn is_eligible(&self, security: &SecurityConfig) -> bool {
		development_auth_enabled(security)
	}

	async fn authenticate(
		&self,
		state: &AppState,
		org: &OrgContext,
		headers: &HeaderMap,
	) -> Result<Option<AuthOutcome>, DbError> {
		let Some(cookie) = extract_dev_auth_cookie(headers) else {
			return Ok(None);
		};
		if cookie.org_id != org.org_id {
			tracing::debug!("dev cookie org does not match resolved org");
			return Ok(None);
		}
		let Some(identity) = state.user_repo.get_user(&org.org_id, &cookie.user_id).await?
		else {
			return Ok(None);
		};
		if !identity.is_active {
			return Ok(None);
		}

		Ok(Some(AuthOutcome {
			current_user: CurrentUser::from_dev_fallback(identity.sanitized()),
			install_cookie: None,
		}))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{
		dev_security, production_override_security, seed_org, seed_user, test_state,
		test_state_with_security,
	};
	use axum::http::HeaderValue;
	use pulse_server_auth::middleware::{
		BACKDOOR_KEY_HEADER, BACKDOOR_USER_HEADER, DEV_USER_HEADER, SESSION_COOKIE_NAME,
	};
	use pulse_server_auth::Session;

	async fn org_ctx_for(state: &AppState) -> OrgContext {
		let org = state.org_repo.ensure_default_org().await.unwrap();
		OrgContext {
			org_id: org.id,
			organization: org,
		}
	}

	fn backdoor_headers(user: &str, key: &str) -> HeaderMap {
		let mut headers = HeaderMap::new();
		headers.insert(BACKDOOR_USER_HEADER, HeaderValue::from_str(user).unwrap());
		headers.insert(BACKDOOR_KEY_HEADER, HeaderValue::from_str(key).unwrap());
		headers
	}

	#[tokio::test]
	async fn session_strategy_authenticates_active_user_in_resolved_org() {
		let state = test_state().await;
		let org = seed_org(&state, "acme", true).await;
		let user = seed_user(&state, &org, "casey").await;

		let session = Session::new();
		state.session_repo.create_session(&session).await.unwrap();
		let session = state
			.session_repo
			.set_session_user(&session.id, &user.id, &org.id, &org.slug)
			.await
			.unwrap();

		let mut headers = HeaderMap::new();
		headers.insert(
			http::header::COOKIE,
			HeaderValue::from_str(&format!("{SESSION_COOKIE_NAME}={}", session.id.as_str()))
				.unwrap(),
		);
		let org_ctx = OrgContext {
			org_id: org.id,
			organization: org,
		};

		let outcome = authenticate(&state, &org_ctx, &headers).await.unwrap();
		assert_eq!(outcome.current_user.user_id(), user.id);
		assert_eq!(outcome.current_user.org_id(), org_ctx.org_id);
	}

	#[tokio::test]
	async fn session_strategy_rejects_user_from_other_org() {
		let state = test_state().await;
		let acme = seed_org(&state, "acme", true).await;
		let beta = seed_org(&state, "beta", true).await;
		let user = seed_user(&state, &acme, "casey").await;

		let session = Session::new();
		state.session_repo.create_session(&session).await.unwrap();
		let session = state
			.session_repo
			.set_session_user(&session.id, &user.id, &acme.id, &acme.slug)
			.await
			.unwrap();

		let mut headers = HeaderMap::new();
		headers.insert(
			http::header::COOKIE,
			HeaderValue::from_str(&format!("{SESSION_COOKIE_NAME}={}", session.id.as_str()))
				.unwrap(),
		);
		// Resolved tenant differs from the session user's tenant.
		let org_ctx = OrgContext {
			org_id: beta.id,
			organization: beta,
		};

		assert!(authenticate(&state, &org_ctx, &headers).await.is_none());
	}

	#[tokio::test]
	async fn backdoor_is_inert_when_gate_is_closed() {
		// Locked-down security: production, no override.
		let state = test_state().await;
		let org_ctx = org_ctx_for(&state).await;

		let headers = backdoor_headers("ops", "super-secret");
		assert!(authenticate(&state, &org_ctx, &headers).await.is_none());
	}

	#[tokio::test]
	async fn backdoor_mismatch_falls_through_in_development() {
		let state = test_state_with_security(dev_security("ops", "right-key")).await;
		let org_ctx = org_ctx_for(&state).await;

		let headers = backdoor_headers("ops", "wrong-key");
		assert!(authenticate(&state, &org_ctx, &headers).await.is_none());
	}

	#[tokio::test]
	async fn backdoor_provisions_admin_in_development() {
		let state = test_state_with_security(dev_security("ops", "right-key")).await;
		let org_ctx = org_ctx_for(&state).await;

		let headers = backdoor_headers("ops", "right-key");
		let outcome = authenticate(&state, &org_ctx, &headers).await.unwrap();
		assert_eq!(outcome.current_user.method, pulse_server_auth::AuthMethod::Backdoor);
		assert!(outcome.current_user.identity.is_super_admin);
		assert!(outcome.install_cookie.is_some());

		// The session persisted by the backdoor authenticates the next
		// request through the primary strategy.
		let session_id = outcome.install_cookie.unwrap();
		let mut headers = HeaderMap::new();
		headers.insert(
			http::header::COOKIE,
			HeaderValue::from_str(&format!("{SESSION_COOKIE_NAME}={}", session_id.as_str()))
				.unwrap(),
		);
		let next = authenticate(&state, &org_ctx, &headers).await.unwrap();
		assert_eq!(next.current_user.method, pulse_server_auth::AuthMethod::Session);
	}

	#[tokio::test]
	async fn production_override_never_auto_creates() {
		let state =
			test_state_with_security(production_override_security("ops", "right-key")).await;
		let org_ctx = org_ctx_for(&state).await;

		// No admin identity exists yet: refused.
		let headers = backdoor_headers("ops", "right-key");
		assert!(authenticate(&state, &org_ctx, &headers).await.is_none());
	}

	#[tokio::test]
	async fn production_override_accepts_existing_admin() {
		let state =
			test_state_with_security(production_override_security("ops", "right-key")).await;
		let org_ctx = org_ctx_for(&state).await;

		// Provision the admin out of band (as a development deploy would
		// have), then authenticate against the production override.
		state
			.user_repo
			.ensure_backdoor_admin("pulse-admin", "admin@pulse.local", "Pulse Admin")
			.await
			.unwrap();

		let headers = backdoor_headers("ops", "right-key");
		let outcome = authenticate(&state, &org_ctx, &headers).await.unwrap();
		assert_eq!(outcome.current_user.method, pulse_server_auth::AuthMethod::Backdoor);
	}

	#[tokio::test]
	async fn impersonation_header_is_rejected_even_with_valid_pair() {
		use crate::api::create_router;
		use axum::body::Body;
		use axum::http::{Request as HttpRequest, StatusCode};
		use http_body_util::BodyExt;
		use pulse_server_auth::middleware::BACKDOOR_IMPERSONATE_HEADER;
		use tower::ServiceExt;

		let state = test_state_with_security(dev_security("ops", "right-key")).await;
		let app = create_router(state);

		let response = app
			.oneshot(
				HttpRequest::builder()
					.uri("/auth/me")
					.header(BACKDOOR_USER_HEADER, "ops")
					.header(BACKDOOR_KEY_HEADER, "right-key")
					.header(BACKDOOR_IMPERSONATE_HEADER, "victim@example.com")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);

		let body = response.into_body().collect().await.unwrap().to_bytes();
		let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
		assert_eq!(json["error"], "feature_removed");
	}

	#[tokio::test]
	async fn dev_header_is_inert_outside_development() {
		let state = test_state().await;
		let org_ctx = org_ctx_for(&state).await;
		let user = seed_user(&state, &org_ctx.organization, "casey").await;

		let mut headers = HeaderMap::new();
		headers.insert(
			DEV_USER_HEADER,
			HeaderValue::from_str(&user.id.to_string()).unwrap(),
		);
		assert!(authenticate(&state, &org_ctx, &headers).await.is_none());
	}

	#[tokio::test]
	async fn dev_header_authenticates_in_development() {
		let state = test_state_with_security(dev_security("ops", "key")).await;
		let org_ctx = org_ctx_for(&state).await;
		let user = seed_user(&state, &org_ctx.organization, "casey").await;

		let mut headers = HeaderMap::new();
		headers.insert(
			DEV_USER_HEADER,
			HeaderValue::from_str(&user.id.to_string()).unwrap(),
		);
		let outcome = authenticate(&state, &org_ctx, &headers).await.unwrap();
		assert_eq!(
			outcome.current_user.method,
			pulse_server_auth::AuthMethod::DevFallback
		);
	}

	#[tokio::test]
	async fn dev_cookie_requires_matching_org() {
		let state = test_state_with_security(dev_security("ops", "key")).await;
		let org_ctx = org_ctx_for(&state).await;
		let other = seed_org(&state, "other", true).await;
		let user = seed_user(&state, &org_ctx.organization, "casey").await;

		let mut headers = HeaderMap::new();
		headers.insert(
			http::header::COOKIE,
			HeaderValue::from_str(&format!(
				"pulse_dev_auth={}:{}:tok",
				user.id, other.id
			))
			.unwrap(),
		);
		assert!(authenticate(&state, &org_ctx, &headers).await.is_none());

		let mut headers = HeaderMap::new();
		headers.insert(
			http::header::COOKIE,
			HeaderValue::from_str(&format!(
				"pulse_dev_auth={}:{}:tok",
				user.id, org_ctx.org_id
			))
			.unwrap(),
		);
		assert!(authenticate(&state, &org_ctx, &headers).await.is_some());
	}
}
