// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Admin diagnostics endpoint.
//!
//! Reports configuration *presence* (never values) and data-integrity
//! issues an operator should know about. Deliberately not production-safe:
//! the route sits behind an admin role layer.

use axum::{extract::State, Json};
use pulse_server_auth::gate::RuntimeEnvironment;
use serde::Serialize;

use crate::{api::AppState, error::ServerError};

#[derive(Debug, Serialize)]
pub struct DiagnosticsResponse {
	pub environment: String,
	pub dev_auth_enabled: bool,
	/// A backdoor pair is configured. Never the values.
	pub backdoor_configured: bool,
	pub slack_oauth_configured: bool,
	pub microsoft_oauth_configured: bool,
	/// Active organizations sharing a slug; subdomain routing resolves the
	/// oldest, the rest are unreachable.
	pub duplicate_active_slugs: Vec<String>,
	pub has_active_super_admin: bool,
	/// Org slugs with a provider flag enabled but no client configured.
	pub orgs_with_unconfigured_slack: Vec<String>,
	pub orgs_with_unconfigured_microsoft: Vec<String>,
}

/// GET /diagnostics - Configuration presence and integrity findings.
pub async fn diagnostics(
	State(state): State<AppState>,
) -> Result<Json<DiagnosticsResponse>, ServerError> {
	let duplicate_active_slugs = state.org_repo.duplicate_active_slugs().await?;
	let has_active_super_admin = state.user_repo.has_active_super_admin().await?;

	let mut orgs_with_unconfigured_slack = Vec::new();
	let mut orgs_with_unconfigured_microsoft = Vec::new();
	for org in state.org_repo.get_all_orgs().await? {
		if !org.is_active {
			continue;
		}
		if org.slack_auth_enabled && state.slack_oauth.is_none() {
			orgs_with_unconfigured_slack.push(org.slug.clone());
		}
		if org.microsoft_auth_enabled && state.microsoft_oauth.is_none() {
			orgs_with_unconfigured_microsoft.push(org.slug);
		}
	}

	let environment = match state.security.environment {
		RuntimeEnvironment::Development => "development",
		RuntimeEnvironment::Review => "review",
		RuntimeEnvironment::Production => "production",
	};

	Ok(Json(DiagnosticsResponse {
		environment: environment.to_string(),
		dev_auth_enabled: state.security.dev_auth_enabled,
		backdoor_configured: state.security.backdoor.is_some(),
		slack_oauth_configured: state.slack_oauth.is_some(),
		microsoft_oauth_configured: state.microsoft_oauth.is_some(),
		duplicate_active_slugs,
		has_active_super_admin,
		orgs_with_unconfigured_slack,
		orgs_with_unconfigured_microsoft,
	}))
}
