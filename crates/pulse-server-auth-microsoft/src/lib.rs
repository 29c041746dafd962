// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Microsoft identity platform (Entra ID) authentication for Pulse.
//!
//! Implements the OAuth 2.0 authorization code flow against the Microsoft
//! identity platform v2.0 endpoints, then fetches the signed-in user's
//! profile from Microsoft Graph.
//!
//! 1. **Authorization URL Generation**: Generate a URL with a state parameter
//!    for CSRF protection and redirect the user to the tenant's authorize
//!    endpoint.
//!
//! 2. **User Authorization**: The user signs in and is redirected back to the
//!    configured `redirect_uri` with `code` and `state` query parameters.
//!
//! 3. **Code Exchange**: Exchange the authorization code for an access token
//!    at the tenant's token endpoint.
//!
//! 4. **Profile Fetch**: Call Graph `/v1.0/me` with the access token to
//!    obtain the user's stable object ID, display name, and email.
//!
//! # Security Considerations
//!
//! - The `client_secret` and access tokens are wrapped in [`SecretString`]
//!   to prevent accidental logging.
//! - Always validate the `state` parameter in callbacks to prevent CSRF.
//! - `mail` may be null for some accounts; fall back to `userPrincipalName`
//!   only when it is a routable address.

use pulse_common_secret::SecretString;
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

const MICROSOFT_LOGIN_BASE: &str = "https://login.microsoftonline.com";
const GRAPH_ME_URL: &str = "https://graph.microsoft.com/v1.0/me";

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// A required environment variable was not set.
	#[error("missing environment variable: {0}")]
	MissingEnvVar(String),

	/// A configuration value was empty or invalid.
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),
}

/// Errors that can occur during OAuth operations.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
	/// The HTTP request to Microsoft failed (network error, timeout, etc.).
	#[error("HTTP request failed: {0}")]
	HttpRequest(#[from] reqwest::Error),

	/// The response could not be parsed as expected.
	#[error("failed to parse response: {0}")]
	ParseError(String),

	/// Microsoft returned an error response (invalid code, expired token, etc.).
	#[error("Microsoft API error: {0}")]
	MicrosoftError(String),
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Microsoft OAuth client.
///
/// `tenant` selects the authority: a directory (tenant) ID for single-tenant
/// apps, or `common` / `organizations` for multi-tenant sign-in. The
/// `client_secret` is wrapped in [`SecretString`] to prevent accidental
/// logging.
#[derive(Debug, Clone)]
pub struct MicrosoftOAuthConfig {
	/// The app registration's client ID.
	pub client_id: String,
	/// The app registration's client secret (wrapped to prevent logging).
	pub client_secret: SecretString,
	/// The callback URL where Microsoft redirects after authorization.
	pub redirect_uri: String,
	/// Tenant segment of the authority URL (`common` for multi-tenant).
	pub tenant: String,
	/// OAuth scopes to request.
	pub scopes: Vec<String>,
}

impl MicrosoftOAuthConfig {
	/// Build a configuration with the default scopes.
	pub fn new(
		client_id: String,
		client_secret: SecretString,
		redirect_uri: String,
		tenant: String,
	) -> Self {
		Self {
			client_id,
			client_secret,
			redirect_uri,
			tenant,
			scopes: Self::default_scopes(),
		}
	}

	/// Load configuration from environment variables.
	///
	/// # Required Environment Variables
	///
	/// - `PULSE_SERVER_MICROSOFT_CLIENT_ID`
	/// - `PULSE_SERVER_MICROSOFT_CLIENT_SECRET`
	/// - `PULSE_SERVER_MICROSOFT_REDIRECT_URI`
	///
	/// `PULSE_SERVER_MICROSOFT_TENANT` is optional and defaults to `common`.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::MissingEnvVar`] if any required variable is not set.
	pub fn from_env() -> Result<Self, ConfigError> {
		let client_id = env::var("PULSE_SERVER_MICROSOFT_CLIENT_ID").map_err(|_| {
			ConfigError::MissingEnvVar("PULSE_SERVER_MICROSOFT_CLIENT_ID".to_string())
		})?;

		let client_secret = env::var("PULSE_SERVER_MICROSOFT_CLIENT_SECRET").map_err(|_| {
			ConfigError::MissingEnvVar("PULSE_SERVER_MICROSOFT_CLIENT_SECRET".to_string())
		})?;

		let redirect_uri = env::var("PULSE_SERVER_MICROSOFT_REDIRECT_URI").map_err(|_| {
			ConfigError::MissingEnvVar("PULSE_SERVER_MICROSOFT_REDIRECT_URI".to_string())
		})?;

		let tenant =
			env::var("PULSE_SERVER_MICROSOFT_TENANT").unwrap_or_else(|_| "common".to_string());

		Ok(Self::new(
			client_id,
			SecretString::new(client_secret),
			redirect_uri,
			tenant,
		))
	}

	/// The scopes a Graph-backed sign-in requires.
	pub fn default_scopes() -> Vec<String> {
		vec![
			"openid".to_string(),
			"profile".to_string(),
			"email".to_string(),
			"User.Read".to_string(),
		]
	}

	/// Validate that all configuration fields are non-empty.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.client_id.is_empty() {
			return Err(ConfigError::InvalidConfig(
				"client_id cannot be empty".to_string(),
			));
		}
		if self.client_secret.expose().is_empty() {
			return Err(ConfigError::InvalidConfig(
				"client_secret cannot be empty".to_string(),
			));
		}
		if self.redirect_uri.is_empty() {
			return Err(ConfigError::InvalidConfig(
				"redirect_uri cannot be empty".to_string(),
			));
		}
		if self.tenant.is_empty() {
			return Err(ConfigError::InvalidConfig(
				"tenant cannot be empty".to_string(),
			));
		}
		Ok(())
	}

	/// Join scopes into a space-separated string for the authorization URL.
	pub fn scopes_string(&self) -> String {
		self.scopes.join(" ")
	}

	fn authorize_url(&self) -> String {
		format!(
			"{MICROSOFT_LOGIN_BASE}/{}/oauth2/v2.0/authorize",
			self.tenant
		)
	}

	fn token_url(&self) -> String {
		format!("{MICROSOFT_LOGIN_BASE}/{}/oauth2/v2.0/token", self.tenant)
	}
}

// =============================================================================
// Response types
// =============================================================================

/// Response from the Microsoft identity platform token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct MicrosoftTokenResponse {
	/// The access token for Graph requests (wrapped to prevent logging).
	#[serde(deserialize_with = "deserialize_secret_string")]
	pub access_token: SecretString,
	/// The token type (always "Bearer").
	pub token_type: String,
	/// Granted scopes (space-separated).
	#[serde(default)]
	pub scope: String,
	/// Token lifetime in seconds.
	#[serde(default)]
	pub expires_in: u64,
}

fn deserialize_secret_string<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let s = String::deserialize(deserializer)?;
	Ok(SecretString::new(s))
}

/// User profile from Microsoft Graph `/v1.0/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicrosoftProfile {
	/// The directory object ID. Stable for the lifetime of the account.
	pub id: String,
	/// The user's display name.
	pub display_name: Option<String>,
	/// The user's primary email address. May be null for some account types.
	pub mail: Option<String>,
	/// The sign-in name, usually an email-shaped address.
	pub user_principal_name: Option<String>,
}

impl MicrosoftProfile {
	/// Best-effort email: `mail` when present, otherwise the UPN if it
	/// looks like an address.
	pub fn email(&self) -> Option<&str> {
		if let Some(mail) = self.mail.as_deref() {
			return Some(mail);
		}
		self.user_principal_name
			.as_deref()
			.filter(|upn| upn.contains('@'))
	}
}

#[derive(Debug, Deserialize)]
struct MicrosoftErrorResponse {
	error: String,
	error_description: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

/// OAuth client for authenticating users via the Microsoft identity platform.
#[derive(Debug, Clone)]
pub struct MicrosoftOAuthClient {
	config: MicrosoftOAuthConfig,
	http_client: reqwest::Client,
}

impl MicrosoftOAuthClient {
	/// Create a new Microsoft OAuth client with the given configuration.
	///
	/// # Panics
	///
	/// Panics if the HTTP client cannot be built (should never happen in practice).
	#[tracing::instrument(skip_all, name = "MicrosoftOAuthClient::new")]
	pub fn new(config: MicrosoftOAuthConfig) -> Self {
		let http_client = pulse_common_http::builder()
			.build()
			.expect("failed to build HTTP client");

		Self {
			config,
			http_client,
		}
	}

	/// Generate the authorization URL for the OAuth flow.
	///
	/// `state` must be a random, unguessable value stored server-side and
	/// verified when the user is redirected back.
	#[tracing::instrument(skip(self), fields(client_id = %self.config.client_id, tenant = %self.config.tenant))]
	pub fn authorization_url(&self, state: &str) -> String {
		let mut url = Url::parse(&self.config.authorize_url()).expect("invalid authorize URL");

		url
			.query_pairs_mut()
			.append_pair("response_type", "code")
			.append_pair("response_mode", "query")
			.append_pair("client_id", &self.config.client_id)
			.append_pair("redirect_uri", &self.config.redirect_uri)
			.append_pair("scope", &self.config.scopes_string())
			.append_pair("state", state);

		url.to_string()
	}

	/// Exchange an authorization code for an access token.
	///
	/// # Errors
	///
	/// - [`OAuthError::HttpRequest`]: Network error or timeout.
	/// - [`OAuthError::MicrosoftError`]: Microsoft rejected the code.
	/// - [`OAuthError::ParseError`]: Unexpected response format.
	#[tracing::instrument(skip(self, code), name = "MicrosoftOAuthClient::exchange_code")]
	pub async fn exchange_code(&self, code: &str) -> Result<MicrosoftTokenResponse, OAuthError> {
		tracing::debug!("exchanging authorization code for access token");

		let response = self
			.http_client
			.post(self.config.token_url())
			.form(&[
				("client_id", self.config.client_id.as_str()),
				("client_secret", self.config.client_secret.expose()),
				("code", code),
				("redirect_uri", self.config.redirect_uri.as_str()),
				("grant_type", "authorization_code"),
				("scope", self.config.scopes_string().as_str()),
			])
			.send()
			.await?;

		let body = response.text().await?;

		if let Ok(error_response) = serde_json::from_str::<MicrosoftErrorResponse>(&body) {
			if !error_response.error.is_empty() {
				let message = error_response
					.error_description
					.unwrap_or(error_response.error);
				return Err(OAuthError::MicrosoftError(message));
			}
		}

		serde_json::from_str(&body)
			.map_err(|e| OAuthError::ParseError(format!("failed to parse token response: {e}")))
	}

	/// Fetch the signed-in user's profile from Microsoft Graph.
	///
	/// # Errors
	///
	/// - [`OAuthError::HttpRequest`]: Network error or timeout.
	/// - [`OAuthError::MicrosoftError`]: Token is invalid or expired.
	/// - [`OAuthError::ParseError`]: Unexpected response format.
	#[tracing::instrument(skip(self, access_token), name = "MicrosoftOAuthClient::get_profile")]
	pub async fn get_profile(&self, access_token: &str) -> Result<MicrosoftProfile, OAuthError> {
		tracing::debug!("fetching Microsoft Graph profile");

		let response = self
			.http_client
			.get(GRAPH_ME_URL)
			.header("Authorization", format!("Bearer {access_token}"))
			.send()
			.await?;

		if !response.status().is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(OAuthError::MicrosoftError(format!(
				"failed to get profile: {body}"
			)));
		}

		response
			.json()
			.await
			.map_err(|e| OAuthError::ParseError(format!("failed to parse profile response: {e}")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn test_config() -> MicrosoftOAuthConfig {
		MicrosoftOAuthConfig::new(
			"test_client_id".to_string(),
			SecretString::new("test_secret".to_string()),
			"https://example.com/auth/microsoft/callback".to_string(),
			"common".to_string(),
		)
	}

	#[test]
	fn config_default_scopes() {
		let config = test_config();
		assert_eq!(config.scopes_string(), "openid profile email User.Read");
	}

	#[test]
	fn authorization_url_uses_tenant_authority() {
		let mut config = test_config();
		config.tenant = "contoso.onmicrosoft.com".to_string();
		let client = MicrosoftOAuthClient::new(config);
		let url = client.authorization_url("state123");

		assert!(url.starts_with(
			"https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/authorize"
		));
		assert!(url.contains("response_type=code"));
		assert!(url.contains("client_id=test_client_id"));
		assert!(url.contains("state=state123"));
	}

	#[test]
	fn authorization_url_contains_required_params() {
		let client = MicrosoftOAuthClient::new(test_config());
		let url = client.authorization_url("test_state_123");

		assert!(url.starts_with("https://login.microsoftonline.com/common/oauth2/v2.0/authorize"));
		assert!(url.contains(
			"redirect_uri=https%3A%2F%2Fexample.com%2Fauth%2Fmicrosoft%2Fcallback"
		));
		assert!(url.contains("scope=openid+profile+email+User.Read"));
		assert!(url.contains("state=test_state_123"));
	}

	#[test]
	fn profile_deserializes() {
		let json = r#"{
            "id": "9f1b2c3d-0000-1111-2222-333344445555",
            "displayName": "Casey Example",
            "mail": "casey@contoso.com",
            "userPrincipalName": "casey@contoso.com"
        }"#;

		let profile: MicrosoftProfile = serde_json::from_str(json).unwrap();
		assert_eq!(profile.id, "9f1b2c3d-0000-1111-2222-333344445555");
		assert_eq!(profile.email(), Some("casey@contoso.com"));
	}

	#[test]
	fn profile_falls_back_to_upn_email() {
		let json = r#"{
            "id": "abc",
            "displayName": null,
            "mail": null,
            "userPrincipalName": "casey@contoso.com"
        }"#;

		let profile: MicrosoftProfile = serde_json::from_str(json).unwrap();
		assert_eq!(profile.email(), Some("casey@contoso.com"));
	}

	#[test]
	fn profile_ignores_non_address_upn() {
		let json = r#"{
            "id": "abc",
            "displayName": null,
            "mail": null,
            "userPrincipalName": "casey"
        }"#;

		let profile: MicrosoftProfile = serde_json::from_str(json).unwrap();
		assert_eq!(profile.email(), None);
	}

	#[test]
	fn token_response_deserializes() {
		let json = r#"{
            "access_token": "eyJ0token",
            "token_type": "Bearer",
            "scope": "openid profile email User.Read",
            "expires_in": 3599
        }"#;

		let token: MicrosoftTokenResponse = serde_json::from_str(json).unwrap();
		assert_eq!(token.access_token.expose(), "eyJ0token");
		assert_eq!(token.token_type, "Bearer");
		assert_eq!(token.expires_in, 3599);
	}

	#[test]
	fn config_validation_rejects_empty_fields() {
		let mut config = test_config();
		config.client_id = String::new();
		assert!(config.validate().is_err());

		let mut config = test_config();
		config.client_secret = SecretString::new(String::new());
		assert!(config.validate().is_err());

		let mut config = test_config();
		config.redirect_uri = String::new();
		assert!(config.validate().is_err());

		let mut config = test_config();
		config.tenant = String::new();
		assert!(config.validate().is_err());

		assert!(test_config().validate().is_ok());
	}

	#[test]
	fn access_token_is_not_logged() {
		let json = r#"{
            "access_token": "eyJ0supersecrettoken",
            "token_type": "Bearer"
        }"#;

		let token: MicrosoftTokenResponse = serde_json::from_str(json).unwrap();
		let debug_output = format!("{token:?}");

		assert!(!debug_output.contains("eyJ0supersecrettoken"));
		assert!(debug_output.contains("REDACTED"));
	}

	#[test]
	fn client_secret_is_not_logged() {
		let debug_output = format!("{:?}", test_config());
		assert!(!debug_output.contains("test_secret"));
		assert!(debug_output.contains("REDACTED"));
	}
}

#[cfg(test)]
mod proptests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		/// Authorization URLs must always contain required parameters
		/// regardless of the input values.
		#[test]
		fn authorization_url_always_has_required_params(
			client_id in "[a-zA-Z0-9-]{1,40}",
			redirect_uri in "https://[a-z]{1,20}\\.[a-z]{2,5}/[a-z]{1,20}",
			tenant in "[a-z0-9]{1,20}",
			state in "[a-zA-Z0-9]{1,64}",
		) {
			let config = MicrosoftOAuthConfig::new(
				client_id,
				SecretString::new("secret".to_string()),
				redirect_uri,
				tenant.clone(),
			);

			let client = MicrosoftOAuthClient::new(config);
			let url = client.authorization_url(&state);

			let expected_prefix =
				format!("{MICROSOFT_LOGIN_BASE}/{tenant}/oauth2/v2.0/authorize");
			prop_assert!(url.starts_with(&expected_prefix));
			prop_assert!(url.contains("client_id="));
			prop_assert!(url.contains("redirect_uri="));
			prop_assert!(url.contains("scope="));
			prop_assert!(url.contains("state="));
		}

		/// Client secret should never appear in debug output.
		#[test]
		fn client_secret_never_in_debug(
			secret in "[a-zA-Z0-9]{10,40}"
		) {
			prop_assume!(!secret.contains("REDACTED"));
			prop_assume!(!secret.contains("Secret"));

			let config = MicrosoftOAuthConfig::new(
				"id".to_string(),
				SecretString::new(secret.clone()),
				"https://example.com".to_string(),
				"common".to_string(),
			);

			let debug = format!("{config:?}");
			prop_assert!(!debug.contains(&secret));
		}
	}
}
