// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared fixtures for the server crate's tests.

use std::sync::Arc;

use chrono::Utc;
use pulse_common_secret::SecretString;
use pulse_server_auth::{
	gate::{BackdoorConfig, RuntimeEnvironment},
	password::hash_password,
	Identity, Organization, OrgId, Role, SecurityConfig, UserId,
};
use pulse_server_db::{
	testing::create_test_pool, OrgRepository, SessionRepository, TeamRepository, UserRepository,
};

use crate::api::AppState;

/// Password every seeded user authenticates with.
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// State over an in-memory database with a locked-down security posture.
pub async fn test_state() -> AppState {
	test_state_with_security(SecurityConfig::locked_down()).await
}

/// State over an in-memory database with the given security posture.
pub async fn test_state_with_security(security: SecurityConfig) -> AppState {
	let pool = create_test_pool().await;
	AppState {
		user_repo: Arc::new(UserRepository::new(pool.clone())),
		session_repo: Arc::new(SessionRepository::new(pool.clone())),
		org_repo: Arc::new(OrgRepository::new(pool.clone())),
		team_repo: Arc::new(TeamRepository::new(pool.clone())),
		security,
		slack_oauth: None,
		microsoft_oauth: None,
		base_url: "http://localhost:8080".to_string(),
		pool,
	}
}

/// Development posture with dev auth on and a backdoor pair.
pub fn dev_security(user: &str, key: &str) -> SecurityConfig {
	SecurityConfig {
		environment: RuntimeEnvironment::Development,
		dev_auth_enabled: true,
		backdoor_production_override: false,
		backdoor: Some(backdoor_config(user, key)),
	}
}

/// Production posture with the backdoor override engaged.
pub fn production_override_security(user: &str, key: &str) -> SecurityConfig {
	SecurityConfig {
		environment: RuntimeEnvironment::Production,
		dev_auth_enabled: false,
		backdoor_production_override: true,
		backdoor: Some(backdoor_config(user, key)),
	}
}

fn backdoor_config(user: &str, key: &str) -> BackdoorConfig {
	BackdoorConfig {
		user: user.to_string(),
		key: SecretString::new(key.to_string()),
		admin_username: "pulse-admin".to_string(),
		admin_email: "admin@pulse.local".to_string(),
		admin_display_name: "Pulse Admin".to_string(),
	}
}

/// Seed an organization with local auth enabled.
pub async fn seed_org(state: &AppState, slug: &str, active: bool) -> Organization {
	let now = Utc::now();
	let org = Organization {
		id: OrgId::generate(),
		slug: slug.to_string(),
		name: slug.to_string(),
		is_active: active,
		local_auth_enabled: true,
		slack_auth_enabled: false,
		microsoft_auth_enabled: false,
		plan_tier: Default::default(),
		partner_firm_id: None,
		created_at: now,
		updated_at: now,
	};
	state.org_repo.create_org(&org).await.unwrap();
	org
}

/// Seed an active member with [`TEST_PASSWORD`]. Email derives from the
/// username so the same username in two orgs models multi-tenant
/// membership.
pub async fn seed_user(state: &AppState, org: &Organization, username: &str) -> Identity {
	let now = Utc::now();
	let identity = Identity {
		id: UserId::generate(),
		email: format!("{username}@example.com"),
		username: username.to_string(),
		display_name: username.to_string(),
		password_hash: Some(hash_password(TEST_PASSWORD).unwrap()),
		role: Role::Member,
		is_super_admin: false,
		is_active: true,
		slack_user_id: None,
		microsoft_user_id: None,
		org_id: org.id,
		team_id: None,
		created_at: now,
		updated_at: now,
	};
	state.user_repo.create_user(&identity).await.unwrap();
	identity
}
