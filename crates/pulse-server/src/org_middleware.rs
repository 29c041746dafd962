// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Organization resolver middleware.
//!
//! Binds every request to exactly one active tenant before authentication
//! runs. Resolution order (short-circuit):
//!
//! 1. Session-bound org, re-validated against the identity's current
//!    memberships; stale bindings are cleared, not trusted.
//! 2. Session identity without a binding: first active membership in
//!    repository-enumerated order, persisted into the session.
//! 3. Anonymous: first host label as an org slug.
//! 4. The well-known default org, created idempotently.
//!
//! This middleware is the only writer of the session's org binding. Client
//! payloads never participate: `sanitize_for_organization` substitutes the
//! resolved org id into anything persisted downstream.

use axum::{
	body::Body,
	extract::State,
	http::{HeaderMap, Request},
	middleware::Next,
	response::{IntoResponse, Response},
};
use pulse_server_auth::{
	middleware::extract_session_cookie,
	org::is_valid_slug,
	types::{DEFAULT_ORG_ID, DEFAULT_ORG_SLUG},
	AuthError, Organization, OrgId, Session,
};

use crate::{api::AppState, error::ServerError};

/// The resolved tenant, attached to request extensions.
#[derive(Debug, Clone)]
pub struct OrgContext {
	pub org_id: OrgId,
	pub organization: Organization,
}

/// Middleware entry point. Failure here ends the request; nothing downstream
/// runs without a tenant.
pub async fn resolve_org_layer(
	State(state): State<AppState>,
	mut req: Request<Body>,
	next: Next,
) -> Response {
	match resolve_organization(&state, req.headers()).await {
		Ok(organization) => {
			tracing::debug!(org_id = %organization.id, slug = %organization.slug, "resolved organization");
			req.extensions_mut().insert(OrgContext {
				org_id: organization.id,
				organization,
			});
			next.run(req).await
		}
		Err(err) => err.into_response(),
	}
}

/// Resolve the tenant for a request. Exposed for tests.
pub async fn resolve_organization(
	state: &AppState,
	headers: &HeaderMap,
) -> Result<Organization, ServerError> {
	let session = match extract_session_cookie(headers) {
		Some(id) => state.session_repo.get_session(&id).await?,
		None => None,
	};

	if let Some(session) = &session {
		if let Some(org) = resolve_from_session(state, session).await? {
			return Ok(org);
		}
	}

	if let Some(org) = resolve_from_host(state, headers).await? {
		return Ok(org);
	}

	resolve_default(state).await
}

/// Steps 1 and 2: session-bound binding with re-validation, then first
/// active membership.
async fn resolve_from_session(
	state: &AppState,
	session: &Session,
) -> Result<Option<Organization>, ServerError> {
	let Some(user_id) = session.user_id else {
		return Ok(None);
	};
	let Some(identity) = state.user_repo.get_user_global(&user_id).await? else {
		// Session references a deleted identity. Tenant resolution falls
		// through; the orchestrator will treat the session as anonymous.
		return Ok(None);
	};

	let memberships = state.user_repo.get_user_organizations(&identity.email).await?;

	if let Some(bound) = session.org_id {
		let still_valid = memberships.iter().any(|m| m.org_id == bound && m.is_active());
		if still_valid {
			if let Some(org) = state.org_repo.get_org_by_id(&bound).await? {
				return Ok(Some(org));
			}
		}
		clear_session_org(state, session).await?;
		tracing::debug!(
			session_id = %session.id,
			org_id = %bound,
			"cleared stale session org binding"
		);
	}

	for membership in &memberships {
		if !membership.is_active() {
			continue;
		}
		if let Some(org) = state.org_repo.get_org_by_id(&membership.org_id).await? {
			persist_session_org(state, session, &org).await?;
			return Ok(Some(org));
		}
	}

	Ok(None)
}

/// Step 3: first host label as an org slug (`acme.example.com` → `acme`).
async fn resolve_from_host(
	state: &AppState,
	headers: &HeaderMap,
) -> Result<Option<Organization>, ServerError> {
	let Some(host) = headers.get(http::header::HOST).and_then(|v| v.to_str().ok()) else {
		return Ok(None);
	};
	let host = host.split(':').next().unwrap_or(host);
	let Some(label) = host.split('.').next() else {
		return Ok(None);
	};
	if label.is_empty() || label == "www" || !is_valid_slug(label) {
		return Ok(None);
	}

	Ok(state.org_repo.get_org_by_slug(label).await?)
}

/// Step 4: the well-known default org.
async fn resolve_default(state: &AppState) -> Result<Organization, ServerError> {
	let default_id = OrgId::new(DEFAULT_ORG_ID);
	match state.org_repo.get_org_by_id_any(&default_id).await? {
		Some(org) if org.is_active => Ok(org),
		Some(_) => Err(ServerError::Auth(AuthError::OrganizationInactive)),
		None => {
			let org = state.org_repo.ensure_default_org().await?;
			tracing::info!(slug = DEFAULT_ORG_SLUG, "created default organization");
			Ok(org)
		}
	}
}

async fn clear_session_org(state: &AppState, session: &Session) -> Result<(), ServerError> {
	let mut updated = session.clone();
	updated.org_id = None;
	updated.org_slug = None;
	state.session_repo.update_session(&updated).await?;
	Ok(())
}

async fn persist_session_org(
	state: &AppState,
	session: &Session,
	org: &Organization,
) -> Result<(), ServerError> {
	let mut updated = session.clone();
	updated.org_id = Some(org.id);
	updated.org_slug = Some(org.slug.clone());
	state.session_repo.update_session(&updated).await?;
	tracing::debug!(session_id = %session.id, org_id = %org.id, "bound session to organization");
	Ok(())
}
