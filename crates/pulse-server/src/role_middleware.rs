// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Route-level authorization layers.
//!
//! Synchronous Tower layers that run after the authentication orchestrator.
//! Anything that needs the database (team leadership, partner firm status)
//! was already computed into [`AuthzAttrs`] by the orchestrator, so these
//! checks stay pure.
//!
//! `is_super_admin` is a universal override: it passes every variant.
//! Rejections are side-effect free: 401 without an identity, 403 with one.

use axum::{
	body::Body,
	http::Request,
	response::Response,
};
use pin_project_lite::pin_project;
use pulse_server_auth::{middleware::CurrentUser, AuthContext, Role};
use std::{
	future::Future,
	pin::Pin,
	task::{Context, Poll},
};
use tower::{Layer, Service};

use crate::auth_middleware::AuthzAttrs;
use crate::error::{forbidden_response, unauthorized_response};

/// What a [`RequireRole`] layer checks.
#[derive(Debug, Clone)]
enum AccessCheck {
	/// Exact role-set membership.
	RoleSet(Vec<Role>),
	/// Partner administrator over a tenant with an active partner firm.
	PartnerAdmin,
	/// Team leadership: admin, manager with a team assignment, or recorded
	/// leader of any team in the tenant.
	TeamLead,
}

/// Route layer for role checks.
///
/// # Example
///
/// ```ignore
/// Router::new()
///     .route("/diagnostics", get(diagnostics))
///     .route_layer(RequireRole::of(&[Role::Admin]));
/// ```
#[derive(Debug, Clone)]
pub struct RequireRole {
	check: AccessCheck,
}

impl RequireRole {
	/// Require membership in an exact role set.
	pub fn of(roles: &[Role]) -> Self {
		Self {
			check: AccessCheck::RoleSet(roles.to_vec()),
		}
	}

	/// Require a partner administrator whose tenant has an active partner
	/// firm.
	pub fn partner_admin() -> Self {
		Self {
			check: AccessCheck::PartnerAdmin,
		}
	}

	/// Require team leadership in the resolved tenant.
	pub fn team_lead() -> Self {
		Self {
			check: AccessCheck::TeamLead,
		}
	}
}

impl<S> Layer<S> for RequireRole {
	type Service = RequireRoleService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		RequireRoleService {
			inner,
			check: self.check.clone(),
		}
	}
}

/// Service wrapper for [`RequireRole`].
#[derive(Clone)]
pub struct RequireRoleService<S> {
	inner: S,
	check: AccessCheck,
}

impl<S> Service<Request<Body>> for RequireRoleService<S>
where
	S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
	S::Future: Send,
{
	type Response = Response;
	type Error = S::Error;
	type Future = RequireRoleFuture<S::Future>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, req: Request<Body>) -> Self::Future {
		let auth_ctx = req
			.extensions()
			.get::<AuthContext>()
			.cloned()
			.unwrap_or_else(AuthContext::unauthenticated);

		let Some(current_user) = auth_ctx.current_user else {
			tracing::debug!(check = ?self.check, "role check denied: not authenticated");
			return RequireRoleFuture::Rejected {
				resp: Some(unauthorized_response()),
			};
		};

		let attrs = req
			.extensions()
			.get::<AuthzAttrs>()
			.copied()
			.unwrap_or_default();

		if !check_access(&self.check, &current_user, &attrs) {
			tracing::info!(
				user_id = %current_user.user_id(),
				role = %current_user.identity.role,
				check = ?self.check,
				"role check denied: insufficient privileges"
			);
			return RequireRoleFuture::Rejected {
				resp: Some(forbidden_response()),
			};
		}

		tracing::debug!(user_id = %current_user.user_id(), "role check passed");

		RequireRoleFuture::Inner {
			fut: self.inner.call(req),
		}
	}
}

/// Evaluate a check against the identity and its precomputed attributes.
fn check_access(check: &AccessCheck, current_user: &CurrentUser, attrs: &AuthzAttrs) -> bool {
	if current_user.identity.is_super_admin {
		return true;
	}

	let role = current_user.identity.role;
	match check {
		AccessCheck::RoleSet(roles) => roles.contains(&role),
		AccessCheck::PartnerAdmin => {
			matches!(role, Role::PartnerAdmin | Role::Admin)
				&& attrs.org_has_active_partner_firm
		}
		AccessCheck::TeamLead => {
			role == Role::Admin
				|| (role == Role::Manager && current_user.identity.team_id.is_some())
				|| attrs.leads_any_team
		}
	}
}

pin_project! {
	/// Future for [`RequireRoleService`].
	#[project = RequireRoleFutureProj]
	pub enum RequireRoleFuture<F> {
		Inner { #[pin] fut: F },
		Rejected { resp: Option<Response> },
	}
}

impl<F, E> Future for RequireRoleFuture<F>
where
	F: Future<Output = Result<Response, E>>,
{
	type Output = Result<Response, E>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match self.project() {
			RequireRoleFutureProj::Inner { fut } => fut.poll(cx),
			RequireRoleFutureProj::Rejected { resp } => {
				Poll::Ready(Ok(resp.take().expect("polled after completion")))
			}
		}
	}
}
