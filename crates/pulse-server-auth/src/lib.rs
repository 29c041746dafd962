// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication core for Pulse.
//!
//! Identities, tenants, sessions, credential verifiers, the security gate,
//! and the request-context types consumed by the server's middleware. The
//! HTTP wiring (resolver/orchestrator/role layers) lives in `pulse-server`;
//! this crate is transport-light so the verifiers stay unit-testable.

pub mod backdoor;
pub mod error;
pub mod gate;
pub mod middleware;
pub mod org;
pub mod password;
pub mod sanitize;
pub mod session;
pub mod types;
pub mod user;

pub use error::AuthError;
pub use gate::{
	backdoor_auth_allowed, development_auth_enabled, BackdoorConfig, RuntimeEnvironment,
	SecurityConfig,
};
pub use middleware::{AuthContext, AuthMethod, CurrentUser};
pub use org::{Organization, PartnerFirm};
pub use sanitize::sanitize_for_organization;
pub use session::{Session, SessionId, SESSION_TTL_DAYS};
pub use types::{OAuthProvider, OrgId, PartnerFirmId, PlanTier, Role, TeamId, UserId};
pub use user::{Identity, OrgMembership, SafeIdentity, Team};
