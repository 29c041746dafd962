// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// A required environment variable was not set.
	#[error("missing environment variable: {0}")]
	MissingEnvVar(String),

	/// A configuration value could not be parsed.
	#[error("invalid value for {name}: {message}")]
	InvalidValue { name: String, message: String },

	/// Cross-field validation failed.
	#[error("configuration validation failed: {0}")]
	Validation(String),
}
