// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application state and router construction.

use std::sync::Arc;

use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use pulse_server_auth::SecurityConfig;
use pulse_server_auth_microsoft::{MicrosoftOAuthClient, MicrosoftOAuthConfig};
use pulse_server_auth_slack::{SlackOAuthClient, SlackOAuthConfig};
use pulse_server_config::ServerConfig;
use pulse_server_db::{OrgRepository, SessionRepository, TeamRepository, UserRepository};
use sqlx::SqlitePool;

use crate::{
	auth_middleware::{auth_layer, require_auth_layer},
	org_middleware::resolve_org_layer,
	role_middleware::RequireRole,
	routes,
};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
	pub user_repo: Arc<UserRepository>,
	pub session_repo: Arc<SessionRepository>,
	pub org_repo: Arc<OrgRepository>,
	pub team_repo: Arc<TeamRepository>,
	/// Immutable security posture, built once at startup.
	pub security: SecurityConfig,
	pub slack_oauth: Option<Arc<SlackOAuthClient>>,
	pub microsoft_oauth: Option<Arc<MicrosoftOAuthClient>>,
	pub base_url: String,
	pub pool: SqlitePool,
}

/// Creates the application state, initializing optional OAuth clients.
pub fn create_app_state(pool: SqlitePool, config: &ServerConfig) -> AppState {
	let user_repo = Arc::new(UserRepository::new(pool.clone()));
	let session_repo = Arc::new(SessionRepository::new(pool.clone()));
	let org_repo = Arc::new(OrgRepository::new(pool.clone()));
	let team_repo = Arc::new(TeamRepository::new(pool.clone()));

	AppState {
		user_repo,
		session_repo,
		org_repo,
		team_repo,
		security: config.security_config(),
		slack_oauth: initialize_slack_oauth(config),
		microsoft_oauth: initialize_microsoft_oauth(config),
		base_url: config.http.base_url.clone(),
		pool,
	}
}

fn initialize_slack_oauth(config: &ServerConfig) -> Option<Arc<SlackOAuthClient>> {
	match &config.oauth.slack {
		Some(settings) => {
			tracing::info!("Slack OAuth configured");
			Some(Arc::new(SlackOAuthClient::new(SlackOAuthConfig::new(
				settings.client_id.clone(),
				settings.client_secret.clone(),
				settings.redirect_uri.clone(),
			))))
		}
		None => {
			tracing::info!("Slack OAuth not configured");
			None
		}
	}
}

fn initialize_microsoft_oauth(config: &ServerConfig) -> Option<Arc<MicrosoftOAuthClient>> {
	match &config.oauth.microsoft {
		Some(settings) => {
			tracing::info!(tenant = %config.oauth.microsoft_tenant, "Microsoft OAuth configured");
			Some(Arc::new(MicrosoftOAuthClient::new(
				MicrosoftOAuthConfig::new(
					settings.client_id.clone(),
					settings.client_secret.clone(),
					settings.redirect_uri.clone(),
					config.oauth.microsoft_tenant.clone(),
				),
			)))
		}
		None => {
			tracing::info!("Microsoft OAuth not configured");
			None
		}
	}
}

/// Build the full router.
///
/// Layer order matters: the organization resolver runs first, the
/// authentication orchestrator second, so every handler (and every role
/// layer) sees both `OrgContext` and `AuthContext` extensions. `/health`
/// stays outside the tenant-bound subtree.
pub fn create_router(state: AppState) -> Router {
	let public = Router::new()
		.route("/auth/login", post(routes::auth::login))
		.route("/auth/logout", post(routes::auth::logout))
		.route("/auth/slack", get(routes::oauth::slack_login))
		.route("/auth/slack/callback", get(routes::oauth::slack_callback))
		.route("/auth/microsoft", get(routes::oauth::microsoft_login))
		.route(
			"/auth/microsoft/callback",
			get(routes::oauth::microsoft_callback),
		);

	let authed = Router::new()
		.route("/auth/me", get(routes::auth::me))
		.route_layer(from_fn(require_auth_layer));

	let admin = Router::new()
		.route("/diagnostics", get(routes::diagnostics::diagnostics))
		.route_layer(RequireRole::of(&[pulse_server_auth::Role::Admin]))
		.route_layer(from_fn(require_auth_layer));

	let tenant_routes = public
		.merge(authed)
		.merge(admin)
		.layer(axum::middleware::from_fn_with_state(
			state.clone(),
			auth_layer,
		))
		.layer(axum::middleware::from_fn_with_state(
			state.clone(),
			resolve_org_layer,
		));

	Router::new()
		.route("/health", get(routes::health::health_check))
		.merge(tenant_routes)
		.with_state(state)
}
