// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for Pulse.
//!
//! Provides a pre-configured `reqwest` builder with a consistent User-Agent
//! and timeout so outbound calls (OAuth token exchange, profile lookups) look
//! and behave the same across crates.

use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The User-Agent string sent on all outbound requests.
pub fn user_agent() -> String {
	format!("pulse-server/{}", env!("CARGO_PKG_VERSION"))
}

/// A `reqwest::ClientBuilder` with the standard User-Agent and timeout applied.
pub fn builder() -> reqwest::ClientBuilder {
	reqwest::Client::builder()
		.user_agent(user_agent())
		.timeout(DEFAULT_TIMEOUT)
}

/// Build a ready-to-use client with the standard settings.
///
/// # Panics
///
/// Panics if the TLS backend cannot be initialized, which indicates a broken
/// build rather than a runtime condition.
pub fn new_client() -> reqwest::Client {
	builder().build().expect("failed to build HTTP client")
}

/// A builder with a custom request timeout.
pub fn builder_with_timeout(timeout: Duration) -> reqwest::ClientBuilder {
	reqwest::Client::builder()
		.user_agent(user_agent())
		.timeout(timeout)
}
