// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error responses for the HTTP layer.
//!
//! Client-facing messages stay generic; the interesting detail goes to the
//! logs (with secrets redacted by `SecretString` long before it gets here).

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use pulse_server_auth::AuthError;
use pulse_server_db::DbError;
use serde::Serialize;

/// JSON error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
	/// Stable machine-readable error code.
	pub error: String,
	/// Human-readable message.
	pub message: String,
}

/// Top-level handler error. Auth failures keep their taxonomy; everything
/// else collapses to a generic 500.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error(transparent)]
	Auth(#[from] AuthError),

	#[error("database error: {0}")]
	Db(#[from] DbError),

	#[error("{0}")]
	Internal(String),
}

/// Stable error code for an [`AuthError`] variant.
pub fn auth_error_code(err: &AuthError) -> &'static str {
	match err {
		AuthError::AuthenticationRequired => "authentication_required",
		AuthError::InvalidCredentials => "invalid_credentials",
		AuthError::InsufficientRole => "insufficient_role",
		AuthError::OrganizationNotFound => "organization_not_found",
		AuthError::OrganizationInactive => "organization_inactive",
		AuthError::FeatureRemoved => "feature_removed",
		AuthError::SessionCorrupted => "session_corrupted",
	}
}

/// Build the response for an [`AuthError`].
pub fn auth_error_response(err: &AuthError) -> Response {
	let status =
		StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
	(
		status,
		Json(ErrorResponse {
			error: auth_error_code(err).to_string(),
			message: err.to_string(),
		}),
	)
		.into_response()
}

/// 401 response used by layers that require an authenticated identity.
pub fn unauthorized_response() -> Response {
	auth_error_response(&AuthError::AuthenticationRequired)
}

/// 403 response used by role layers. Deliberately does not say which check
/// failed.
pub fn forbidden_response() -> Response {
	(
		StatusCode::FORBIDDEN,
		Json(ErrorResponse {
			error: "forbidden".to_string(),
			message: "Insufficient permissions".to_string(),
		}),
	)
		.into_response()
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		match self {
			ServerError::Auth(err) => auth_error_response(&err),
			ServerError::Db(err) => {
				tracing::error!(error = %err, "request failed with database error");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					Json(ErrorResponse {
						error: "internal_error".to_string(),
						message: "Internal server error".to_string(),
					}),
				)
					.into_response()
			}
			ServerError::Internal(message) => {
				tracing::error!(error = %message, "request failed with internal error");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					Json(ErrorResponse {
						error: "internal_error".to_string(),
						message: "Internal server error".to_string(),
					}),
				)
					.into_response()
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn auth_errors_map_to_expected_status() {
		let cases = [
			(AuthError::AuthenticationRequired, StatusCode::UNAUTHORIZED),
			(AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
			(AuthError::InsufficientRole, StatusCode::FORBIDDEN),
			(AuthError::OrganizationNotFound, StatusCode::NOT_FOUND),
			(AuthError::OrganizationInactive, StatusCode::FORBIDDEN),
			(AuthError::FeatureRemoved, StatusCode::BAD_REQUEST),
			(AuthError::SessionCorrupted, StatusCode::UNAUTHORIZED),
		];
		for (err, status) in cases {
			assert_eq!(auth_error_response(&err).status(), status, "{err:?}");
		}
	}

	#[test]
	fn db_errors_collapse_to_generic_500() {
		let resp = ServerError::Db(DbError::Internal("sensitive detail".to_string()))
			.into_response();
		assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[test]
	fn error_codes_are_snake_case() {
		assert_eq!(
			auth_error_code(&AuthError::OrganizationNotFound),
			"organization_not_found"
		);
		assert_eq!(auth_error_code(&AuthError::FeatureRemoved), "feature_removed");
	}
}
