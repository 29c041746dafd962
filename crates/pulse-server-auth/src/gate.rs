// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Security gate: predicates deciding whether non-primary authentication
//! paths may execute in the current runtime.
//!
//! The predicates are pure functions over an immutable [`SecurityConfig`]
//! constructed once at startup and injected into the orchestrator. They are
//! evaluated fresh per call rather than cached at module load, so a config
//! assembled asynchronously during startup is always observed consistently.
//!
//! Invariant: no authentication strategy other than session auth may run
//! unless its gate predicate returns true for the current process.

use pulse_common_secret::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of the runtime environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeEnvironment {
	/// Local development.
	Development,
	/// Review/preview deployments (PR previews, staging).
	Review,
	/// Production.
	#[default]
	Production,
}

impl RuntimeEnvironment {
	/// Parse from the conventional environment string; unknown values
	/// classify as production, the safe default.
	pub fn parse(value: &str) -> Self {
		match value.to_ascii_lowercase().as_str() {
			"development" | "dev" | "local" => RuntimeEnvironment::Development,
			"review" | "preview" | "staging" => RuntimeEnvironment::Review,
			_ => RuntimeEnvironment::Production,
		}
	}
}

impl fmt::Display for RuntimeEnvironment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RuntimeEnvironment::Development => write!(f, "development"),
			RuntimeEnvironment::Review => write!(f, "review"),
			RuntimeEnvironment::Production => write!(f, "production"),
		}
	}
}

/// The backdoor credential pair and the admin profile it resolves to.
///
/// Sourced from trusted server configuration only, never from client input.
/// The pair authenticates as a pre-existing (or, in development,
/// auto-provisioned) administrator identity; it has no identity of its own.
#[derive(Debug, Clone)]
pub struct BackdoorConfig {
	/// Expected value of the backdoor user header.
	pub user: String,
	/// Expected value of the backdoor key header.
	pub key: SecretString,
	/// Username of the administrator identity the backdoor resolves to.
	pub admin_username: String,
	/// Email used when auto-provisioning the admin identity in development.
	pub admin_email: String,
	/// Display name used when auto-provisioning.
	pub admin_display_name: String,
}

/// Immutable security configuration, constructed once at startup.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
	/// The classified runtime environment.
	pub environment: RuntimeEnvironment,
	/// Explicit feature flag enabling development-only auth paths.
	pub dev_auth_enabled: bool,
	/// Explicit override allowing the backdoor in production.
	pub backdoor_production_override: bool,
	/// Backdoor credentials, when configured.
	pub backdoor: Option<BackdoorConfig>,
}

impl SecurityConfig {
	/// A locked-down production config with no backdoor. Useful as a test
	/// baseline and as the fallback when configuration is absent.
	pub fn locked_down() -> Self {
		Self {
			environment: RuntimeEnvironment::Production,
			dev_auth_enabled: false,
			backdoor_production_override: false,
			backdoor: None,
		}
	}
}

/// Development-only authentication paths (dev header, dev cookie) are
/// reachable only in a development environment with the flag set.
pub fn development_auth_enabled(config: &SecurityConfig) -> bool {
	config.environment == RuntimeEnvironment::Development && config.dev_auth_enabled
}

/// The backdoor strategy is reachable in enabled development, or in
/// production with the explicit override. Review environments never allow it.
pub fn backdoor_auth_allowed(config: &SecurityConfig) -> bool {
	development_auth_enabled(config)
		|| (config.environment == RuntimeEnvironment::Production
			&& config.backdoor_production_override)
}
