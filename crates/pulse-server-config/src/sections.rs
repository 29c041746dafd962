// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed configuration sections.
//!
//! Each section owns its defaults and knows how to read itself from
//! `PULSE_SERVER_*` environment variables. Secrets are wrapped in
//! [`SecretString`] at the boundary so they never travel as plain strings.

use crate::error::ConfigError;
use pulse_common_secret::SecretString;
use pulse_server_auth::gate::{BackdoorConfig, RuntimeEnvironment, SecurityConfig};
use std::env;

/// Parse the conventional boolean forms used by the env variables.
pub(crate) fn env_flag(name: &str) -> bool {
	env::var(name)
		.map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
		.unwrap_or(false)
}

fn env_opt(name: &str) -> Option<String> {
	env::var(name).ok().filter(|v| !v.is_empty())
}

// =============================================================================
// HTTP
// =============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
	pub host: String,
	pub port: u16,
	/// External base URL, used for OAuth redirect URIs and absolute links.
	pub base_url: String,
}

impl Default for HttpConfig {
	fn default() -> Self {
		Self {
			host: "127.0.0.1".to_string(),
			port: 8080,
			base_url: "http://localhost:8080".to_string(),
		}
	}
}

impl HttpConfig {
	pub fn from_env() -> Result<Self, ConfigError> {
		let mut config = Self::default();
		if let Some(host) = env_opt("PULSE_SERVER_HOST") {
			config.host = host;
		}
		if let Some(port) = env_opt("PULSE_SERVER_PORT") {
			config.port = port.parse().map_err(|_| ConfigError::InvalidValue {
				name: "PULSE_SERVER_PORT".to_string(),
				message: format!("not a port number: {port}"),
			})?;
		}
		if let Some(base_url) = env_opt("PULSE_SERVER_BASE_URL") {
			config.base_url = base_url;
		}
		Ok(config)
	}

	/// The socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}
}

// =============================================================================
// Database
// =============================================================================

/// Database settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	/// SQLite URL, e.g. `sqlite://pulse.db` or `sqlite::memory:`.
	pub url: String,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			url: "sqlite://pulse.db".to_string(),
		}
	}
}

impl DatabaseConfig {
	pub fn from_env() -> Self {
		let mut config = Self::default();
		if let Some(url) = env_opt("PULSE_SERVER_DATABASE_URL") {
			config.url = url;
		}
		config
	}
}

// =============================================================================
// Logging
// =============================================================================

/// Logging settings.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
	/// Default tracing filter when `RUST_LOG` is unset.
	pub level: String,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
		}
	}
}

impl LoggingConfig {
	pub fn from_env() -> Self {
		let mut config = Self::default();
		if let Some(level) = env_opt("PULSE_SERVER_LOG_LEVEL") {
			config.level = level;
		}
		config
	}
}

// =============================================================================
// OAuth
// =============================================================================

/// Credentials for one OAuth provider. Presence of a complete set decides
/// whether the provider's login routes are mounted.
#[derive(Debug, Clone)]
pub struct OAuthProviderSettings {
	pub client_id: String,
	pub client_secret: SecretString,
	pub redirect_uri: String,
}

/// OAuth settings for both delegated identity providers.
#[derive(Debug, Clone, Default)]
pub struct OAuthConfig {
	pub slack: Option<OAuthProviderSettings>,
	pub microsoft: Option<OAuthProviderSettings>,
	/// Microsoft tenant segment of the authority URL (`common` by default).
	pub microsoft_tenant: String,
}

impl OAuthConfig {
	pub fn from_env() -> Self {
		Self {
			slack: Self::provider_from_env("SLACK"),
			microsoft: Self::provider_from_env("MICROSOFT"),
			microsoft_tenant: env_opt("PULSE_SERVER_MICROSOFT_TENANT")
				.unwrap_or_else(|| "common".to_string()),
		}
	}

	fn provider_from_env(provider: &str) -> Option<OAuthProviderSettings> {
		let client_id = env_opt(&format!("PULSE_SERVER_{provider}_CLIENT_ID"))?;
		let client_secret = env_opt(&format!("PULSE_SERVER_{provider}_CLIENT_SECRET"))?;
		let redirect_uri = env_opt(&format!("PULSE_SERVER_{provider}_REDIRECT_URI"))?;
		Some(OAuthProviderSettings {
			client_id,
			client_secret: SecretString::new(client_secret),
			redirect_uri,
		})
	}
}

// =============================================================================
// Auth / security
// =============================================================================

/// Raw auth section, before being folded into the immutable
/// [`SecurityConfig`] handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct AuthSection {
	pub environment: RuntimeEnvironment,
	pub dev_auth_enabled: bool,
	pub backdoor_production_override: bool,
	pub backdoor_user: Option<String>,
	pub backdoor_key: Option<SecretString>,
	pub backdoor_admin_username: String,
	pub backdoor_admin_email: String,
	pub backdoor_admin_display_name: String,
	/// Marker that we run inside a managed deployment (set by infra).
	pub deployment_marker: bool,
	/// Turn the strict-production warning into a hard startup failure.
	pub strict_mode: bool,
	/// Skip the startup secrets scan entirely.
	pub skip_validation: bool,
}

impl Default for AuthSection {
	fn default() -> Self {
		Self {
			environment: RuntimeEnvironment::Production,
			dev_auth_enabled: false,
			backdoor_production_override: false,
			backdoor_user: None,
			backdoor_key: None,
			backdoor_admin_username: "pulse-admin".to_string(),
			backdoor_admin_email: "admin@pulse.local".to_string(),
			backdoor_admin_display_name: "Pulse Admin".to_string(),
			deployment_marker: false,
			strict_mode: false,
			skip_validation: false,
		}
	}
}

impl AuthSection {
	pub fn from_env() -> Self {
		let mut section = Self::default();
		section.environment =
			RuntimeEnvironment::parse(&env::var("PULSE_SERVER_ENV").unwrap_or_default());
		section.dev_auth_enabled = env_flag("PULSE_SERVER_DEV_AUTH");
		section.backdoor_production_override =
			env_flag("PULSE_SERVER_BACKDOOR_PRODUCTION_OVERRIDE");
		section.backdoor_user = env_opt("PULSE_SERVER_BACKDOOR_USER");
		section.backdoor_key = env_opt("PULSE_SERVER_BACKDOOR_KEY").map(SecretString::new);
		if let Some(v) = env_opt("PULSE_SERVER_BACKDOOR_ADMIN_USERNAME") {
			section.backdoor_admin_username = v;
		}
		if let Some(v) = env_opt("PULSE_SERVER_BACKDOOR_ADMIN_EMAIL") {
			section.backdoor_admin_email = v;
		}
		if let Some(v) = env_opt("PULSE_SERVER_BACKDOOR_ADMIN_DISPLAY_NAME") {
			section.backdoor_admin_display_name = v;
		}
		section.deployment_marker = env_flag("PULSE_SERVER_DEPLOYMENT");
		section.strict_mode = env_flag("PULSE_SERVER_AUTH_STRICT_MODE");
		section.skip_validation = env_flag("PULSE_SERVER_AUTH_SKIP_VALIDATION");
		section
	}

	/// Whether a complete backdoor pair is configured.
	pub fn has_backdoor_pair(&self) -> bool {
		self.backdoor_user.is_some() && self.backdoor_key.is_some()
	}

	/// Fold into the immutable [`SecurityConfig`] used by the gate.
	pub fn to_security_config(&self) -> SecurityConfig {
		let backdoor = match (&self.backdoor_user, &self.backdoor_key) {
			(Some(user), Some(key)) => Some(BackdoorConfig {
				user: user.clone(),
				key: key.clone(),
				admin_username: self.backdoor_admin_username.clone(),
				admin_email: self.backdoor_admin_email.clone(),
				admin_display_name: self.backdoor_admin_display_name.clone(),
			}),
			_ => None,
		};

		SecurityConfig {
			environment: self.environment,
			dev_auth_enabled: self.dev_auth_enabled,
			backdoor_production_override: self.backdoor_production_override,
			backdoor,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn http_defaults() {
		let config = HttpConfig::default();
		assert_eq!(config.socket_addr(), "127.0.0.1:8080");
	}

	#[test]
	fn auth_section_defaults_are_locked_down() {
		let section = AuthSection::default();
		assert_eq!(section.environment, RuntimeEnvironment::Production);
		assert!(!section.dev_auth_enabled);
		assert!(!section.backdoor_production_override);
		assert!(!section.has_backdoor_pair());
		assert!(!section.strict_mode);
	}

	#[test]
	fn to_security_config_requires_complete_pair() {
		let mut section = AuthSection::default();
		section.backdoor_user = Some("ops".to_string());
		assert!(section.to_security_config().backdoor.is_none());

		section.backdoor_key = Some(SecretString::from("k"));
		let config = section.to_security_config();
		let backdoor = config.backdoor.expect("pair configured");
		assert_eq!(backdoor.user, "ops");
		assert_eq!(backdoor.key.expose(), "k");
		assert_eq!(backdoor.admin_username, "pulse-admin");
	}

	#[test]
	fn oauth_config_defaults_empty() {
		let config = OAuthConfig::default();
		assert!(config.slack.is_none());
		assert!(config.microsoft.is_none());
	}
}
