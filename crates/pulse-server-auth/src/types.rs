// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for authentication and tenant resolution.
//!
//! This module defines the foundational types used throughout the auth system:
//!
//! - **ID newtypes**: Type-safe wrappers around UUIDs ([`UserId`], [`OrgId`],
//!   [`TeamId`], [`PartnerFirmId`]) preventing accidental mixing
//! - **[`Role`]**: tenant-scoped roles, plus the cross-tenant super-admin flag
//!   carried on the identity record itself
//! - **[`PlanTier`]**: the organization's billing tier
//! - **[`OAuthProvider`]**: the delegated identity providers Pulse supports
//!
//! All ID types implement transparent serde serialization (as UUID strings)
//! and provide conversion to/from [`uuid::Uuid`].

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}

		impl std::str::FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Ok(Self(Uuid::parse_str(s)?))
			}
		}
	};
}

define_id_type!(UserId, "Unique identifier for a user identity.");
define_id_type!(OrgId, "Unique identifier for an organization (tenant).");
define_id_type!(TeamId, "Unique identifier for a team.");
define_id_type!(PartnerFirmId, "Unique identifier for a partner firm.");

/// The well-known default organization, used when no tenant can be resolved
/// from the session, identity, or host name. Created on first use.
pub const DEFAULT_ORG_ID: Uuid = Uuid::from_u128(1);

/// Slug of the well-known default organization.
pub const DEFAULT_ORG_SLUG: &str = "default";

// =============================================================================
// Roles
// =============================================================================

/// Tenant-scoped roles.
///
/// The cross-tenant super-admin capability is NOT a role; it is the
/// `is_super_admin` flag on [`crate::user::Identity`], which bypasses every
/// role, partner, and team-leadership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	/// Standard member access.
	Member,
	/// Manages a team; gains team-lead access when assigned to a team.
	Manager,
	/// Full control within the organization.
	Admin,
	/// Administers the tenant on behalf of an associated partner firm.
	PartnerAdmin,
}

impl Role {
	/// Returns all available roles.
	pub fn all() -> &'static [Role] {
		&[Role::Member, Role::Manager, Role::Admin, Role::PartnerAdmin]
	}

	/// Parse a role from its snake_case wire form.
	pub fn parse(value: &str) -> Option<Role> {
		match value {
			"member" => Some(Role::Member),
			"manager" => Some(Role::Manager),
			"admin" => Some(Role::Admin),
			"partner_admin" => Some(Role::PartnerAdmin),
			_ => None,
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Role::Member => write!(f, "member"),
			Role::Manager => write!(f, "manager"),
			Role::Admin => write!(f, "admin"),
			Role::PartnerAdmin => write!(f, "partner_admin"),
		}
	}
}

// =============================================================================
// Plan Tiers
// =============================================================================

/// Billing tier of an organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
	/// Free tier.
	#[default]
	Free,
	/// Paid standard tier.
	Standard,
	/// Enterprise tier.
	Enterprise,
}

impl PlanTier {
	/// Parse a tier from its snake_case wire form.
	pub fn parse(value: &str) -> Option<PlanTier> {
		match value {
			"free" => Some(PlanTier::Free),
			"standard" => Some(PlanTier::Standard),
			"enterprise" => Some(PlanTier::Enterprise),
			_ => None,
		}
	}
}

impl fmt::Display for PlanTier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PlanTier::Free => write!(f, "free"),
			PlanTier::Standard => write!(f, "standard"),
			PlanTier::Enterprise => write!(f, "enterprise"),
		}
	}
}

// =============================================================================
// OAuth Providers
// =============================================================================

/// Supported OAuth identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthProvider {
	/// Sign in with Slack (OpenID Connect).
	Slack,
	/// Microsoft identity platform.
	Microsoft,
}

impl fmt::Display for OAuthProvider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OAuthProvider::Slack => write!(f, "slack"),
			OAuthProvider::Microsoft => write!(f, "microsoft"),
		}
	}
}
