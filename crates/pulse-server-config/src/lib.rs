// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the Pulse server.
//!
//! Configuration is read from `PULSE_SERVER_*` environment variables with
//! conservative defaults: unknown environments are treated as production and
//! every development affordance defaults to off. Loading is a three-step
//! pipeline: read sections, cross-validate, then run the startup secrets
//! scan that decides whether a configured backdoor is acceptable for the
//! current environment.

pub mod error;
pub mod sections;

pub use error::ConfigError;
pub use sections::{
	AuthSection, DatabaseConfig, HttpConfig, LoggingConfig, OAuthConfig, OAuthProviderSettings,
};

use pulse_server_auth::gate::{RuntimeEnvironment, SecurityConfig};

/// Fully loaded and validated server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub oauth: OAuthConfig,
	pub auth: AuthSection,
}

impl ServerConfig {
	/// The immutable security posture handed to the auth orchestrator.
	/// Built once at startup; nothing mutates it afterwards.
	pub fn security_config(&self) -> SecurityConfig {
		self.auth.to_security_config()
	}
}

/// Load configuration from the environment, validate it, and run the
/// startup secrets scan. This is the only constructor the server binary
/// uses.
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		http: HttpConfig::from_env()?,
		database: DatabaseConfig::from_env(),
		logging: LoggingConfig::from_env(),
		oauth: OAuthConfig::from_env(),
		auth: AuthSection::from_env(),
	};

	validate_config(&config)?;
	validate_backdoor_posture(&config.auth)?;

	Ok(config)
}

/// Cross-field validation. Rejects combinations that are never safe,
/// regardless of what the secrets scan would say.
pub fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	// Dev auth bypasses credential verification entirely. It must never be
	// reachable in production, no override exists for this one.
	if config.auth.dev_auth_enabled
		&& config.auth.environment == RuntimeEnvironment::Production
	{
		return Err(ConfigError::Validation(
			"PULSE_SERVER_DEV_AUTH must not be enabled when PULSE_SERVER_ENV is production"
				.to_string(),
		));
	}

	if let Some(user) = &config.auth.backdoor_user {
		if user.is_empty() {
			return Err(ConfigError::InvalidValue {
				name: "PULSE_SERVER_BACKDOOR_USER".to_string(),
				message: "must not be empty when set".to_string(),
			});
		}
	}

	if !config.database.url.starts_with("sqlite:") {
		return Err(ConfigError::InvalidValue {
			name: "PULSE_SERVER_DATABASE_URL".to_string(),
			message: format!("expected a sqlite URL, got: {}", config.database.url),
		});
	}

	Ok(())
}

/// Startup scan over the backdoor configuration.
///
/// A configured backdoor pair is always logged at startup so it can never
/// be present silently. The escalation ladder:
///
/// - development: info-level notice.
/// - review: warning (the gate refuses backdoor auth in review regardless).
/// - production without the override: warning that the pair is inert.
/// - production with the override: loud warning, and a hard failure when
///   strict mode is on.
///
/// `PULSE_SERVER_AUTH_SKIP_VALIDATION` bypasses the scan entirely, which is
/// itself logged as a warning.
pub fn validate_backdoor_posture(auth: &AuthSection) -> Result<(), ConfigError> {
	if auth.skip_validation {
		tracing::warn!(
			"startup secrets validation skipped via PULSE_SERVER_AUTH_SKIP_VALIDATION; \
			 backdoor posture is unchecked"
		);
		return Ok(());
	}

	if !auth.has_backdoor_pair() {
		return Ok(());
	}

	match auth.environment {
		RuntimeEnvironment::Development => {
			tracing::info!("backdoor credential pair configured (development environment)");
		}
		RuntimeEnvironment::Review => {
			tracing::warn!(
				"backdoor credential pair configured in a review environment; \
				 backdoor authentication is refused in review and the pair is inert"
			);
		}
		RuntimeEnvironment::Production => {
			if auth.backdoor_production_override {
				if auth.strict_mode {
					return Err(ConfigError::Validation(
						"backdoor credentials with production override are configured and \
						 PULSE_SERVER_AUTH_STRICT_MODE is enabled; refusing to start"
							.to_string(),
					));
				}
				tracing::warn!(
					deployment = auth.deployment_marker,
					"backdoor credential pair is LIVE in production via \
					 PULSE_SERVER_BACKDOOR_PRODUCTION_OVERRIDE; \
					 rotate and remove these credentials as soon as possible"
				);
			} else {
				tracing::warn!(
					deployment = auth.deployment_marker,
					"backdoor credential pair configured in production without the \
					 override; the pair is inert but should be removed"
				);
			}
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use pulse_common_secret::SecretString;

	fn base_config() -> ServerConfig {
		ServerConfig {
			http: HttpConfig::default(),
			database: DatabaseConfig::default(),
			logging: LoggingConfig::default(),
			oauth: OAuthConfig::default(),
			auth: AuthSection::default(),
		}
	}

	fn with_backdoor(mut auth: AuthSection) -> AuthSection {
		auth.backdoor_user = Some("ops".to_string());
		auth.backdoor_key = Some(SecretString::from("swordfish"));
		auth
	}

	#[test]
	fn default_config_validates() {
		let config = base_config();
		assert!(validate_config(&config).is_ok());
		assert!(validate_backdoor_posture(&config.auth).is_ok());
	}

	#[test]
	fn dev_auth_in_production_is_rejected() {
		let mut config = base_config();
		config.auth.dev_auth_enabled = true;
		config.auth.environment = RuntimeEnvironment::Production;
		let err = validate_config(&config).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn dev_auth_in_development_is_allowed() {
		let mut config = base_config();
		config.auth.dev_auth_enabled = true;
		config.auth.environment = RuntimeEnvironment::Development;
		assert!(validate_config(&config).is_ok());
	}

	#[test]
	fn empty_backdoor_user_is_rejected() {
		let mut config = base_config();
		config.auth.backdoor_user = Some(String::new());
		assert!(validate_config(&config).is_err());
	}

	#[test]
	fn non_sqlite_database_url_is_rejected() {
		let mut config = base_config();
		config.database.url = "postgres://localhost/pulse".to_string();
		assert!(validate_config(&config).is_err());
	}

	#[test]
	fn backdoor_pair_without_override_passes_in_production() {
		let auth = with_backdoor(AuthSection::default());
		assert!(validate_backdoor_posture(&auth).is_ok());
	}

	#[test]
	fn strict_mode_rejects_live_production_backdoor() {
		let mut auth = with_backdoor(AuthSection::default());
		auth.backdoor_production_override = true;
		auth.strict_mode = true;
		let err = validate_backdoor_posture(&auth).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn strict_mode_without_override_still_passes() {
		let mut auth = with_backdoor(AuthSection::default());
		auth.strict_mode = true;
		assert!(validate_backdoor_posture(&auth).is_ok());
	}

	#[test]
	fn skip_validation_bypasses_strict_mode() {
		let mut auth = with_backdoor(AuthSection::default());
		auth.backdoor_production_override = true;
		auth.strict_mode = true;
		auth.skip_validation = true;
		assert!(validate_backdoor_posture(&auth).is_ok());
	}

	#[test]
	fn security_config_reflects_auth_section() {
		let mut config = base_config();
		config.auth = with_backdoor(AuthSection::default());
		config.auth.environment = RuntimeEnvironment::Development;
		config.auth.dev_auth_enabled = true;

		let security = config.security_config();
		assert_eq!(security.environment, RuntimeEnvironment::Development);
		assert!(security.dev_auth_enabled);
		assert!(security.backdoor.is_some());
	}
}
