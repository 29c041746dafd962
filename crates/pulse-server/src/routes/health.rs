// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health check handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::api::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: &'static str,
	pub timestamp: String,
	pub components: HealthComponents,
}

#[derive(Debug, Serialize)]
pub struct HealthComponents {
	pub database: &'static str,
	pub slack_oauth: &'static str,
	pub microsoft_oauth: &'static str,
}

/// GET /health - Liveness plus component presence.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let database_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();

	let components = HealthComponents {
		database: if database_ok { "healthy" } else { "unhealthy" },
		slack_oauth: if state.slack_oauth.is_some() {
			"configured"
		} else {
			"not_configured"
		},
		microsoft_oauth: if state.microsoft_oauth.is_some() {
			"configured"
		} else {
			"not_configured"
		},
	};

	let (http_status, status) = if database_ok {
		(StatusCode::OK, "healthy")
	} else {
		(StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
	};

	(
		http_status,
		Json(HealthResponse {
			status,
			timestamp: chrono::Utc::now().to_rfc3339(),
			components,
		}),
	)
}
