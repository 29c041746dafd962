// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pulse HTTP server.
//!
//! Request pipeline: organization resolver → authentication orchestrator →
//! role layers → handlers. The resolver binds every request to exactly one
//! active tenant; the orchestrator reconciles session, backdoor, and
//! development credentials into a single [`pulse_server_auth::AuthContext`].

pub mod api;
pub mod auth_middleware;
pub mod error;
pub mod org_middleware;
pub mod role_middleware;
pub mod routes;
pub mod session_cookies;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{create_app_state, create_router, AppState};
pub use auth_middleware::AuthzAttrs;
pub use error::{ErrorResponse, ServerError};
pub use org_middleware::OrgContext;
pub use role_middleware::RequireRole;
