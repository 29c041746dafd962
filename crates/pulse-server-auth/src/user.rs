// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User identity types.
//!
//! An [`Identity`] is a user record scoped to exactly one organization.
//! Multi-tenant membership is modeled as N identity rows, one per org,
//! joined by email. [`SafeIdentity`] is the client-visible projection with
//! credential material stripped; handlers must never serialize a raw
//! [`Identity`] into a response.

use crate::types::{OrgId, Role, TeamId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user identity, scoped to exactly one organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
	/// Unique identifier.
	pub id: UserId,
	/// Email address. Globally searchable across tenants for login; the same
	/// email may have one identity per organization.
	pub email: String,
	/// Username, unique within the organization.
	pub username: String,
	/// Display name shown in the product.
	pub display_name: String,
	/// Argon2 password hash. `None` means password login is disabled for
	/// this identity (OAuth-only accounts).
	pub password_hash: Option<String>,
	/// Tenant-scoped role.
	pub role: Role,
	/// Cross-tenant override flag; bypasses every role, partner, and
	/// team-leadership check.
	pub is_super_admin: bool,
	/// Inactive identities cannot authenticate and do not count as
	/// memberships during tenant resolution.
	pub is_active: bool,
	/// Linked Slack user id, if the identity was created or linked via Slack.
	pub slack_user_id: Option<String>,
	/// Linked Microsoft user id (Graph object id), if linked via Microsoft.
	pub microsoft_user_id: Option<String>,
	/// The organization this identity belongs to.
	pub org_id: OrgId,
	/// Team assignment, if any. Managers with a team assignment pass the
	/// team-lead check.
	pub team_id: Option<TeamId>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Identity {
	/// Whether password login is possible for this identity.
	pub fn has_password(&self) -> bool {
		self
			.password_hash
			.as_ref()
			.is_some_and(|h| !h.is_empty())
	}

	/// Strip credential material for exposure to route handlers and clients.
	pub fn sanitized(&self) -> SafeIdentity {
		SafeIdentity {
			id: self.id,
			email: self.email.clone(),
			username: self.username.clone(),
			display_name: self.display_name.clone(),
			role: self.role,
			is_super_admin: self.is_super_admin,
			is_active: self.is_active,
			org_id: self.org_id,
			team_id: self.team_id,
		}
	}
}

/// Client-visible projection of an [`Identity`].
///
/// Contains no password hash and no linked-provider ids; this is the only
/// identity shape that may appear in an HTTP response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeIdentity {
	pub id: UserId,
	pub email: String,
	pub username: String,
	pub display_name: String,
	pub role: Role,
	pub is_super_admin: bool,
	pub is_active: bool,
	pub org_id: OrgId,
	pub team_id: Option<TeamId>,
}

/// A team within an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
	pub id: TeamId,
	pub org_id: OrgId,
	pub name: String,
	/// The recorded team leader, if one is set. Being the leader of any team
	/// in the tenant satisfies the team-lead check.
	pub leader_user_id: Option<UserId>,
	pub created_at: DateTime<Utc>,
}

/// One entry of the cross-tenant membership index for an email address.
///
/// Returned by the persistence layer's `get_user_organizations(email)` in a
/// deterministic order (organization creation time, then org id) so the
/// resolver's "first active membership" choice is stable across calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgMembership {
	/// The identity row representing this membership.
	pub user_id: UserId,
	pub org_id: OrgId,
	/// Whether the identity row is active.
	pub user_is_active: bool,
	/// Whether the organization is active.
	pub org_is_active: bool,
}

impl OrgMembership {
	/// A membership counts for tenant binding only when both sides are active.
	pub fn is_active(&self) -> bool {
		self.user_is_active && self.org_is_active
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;

	fn make_identity() -> Identity {
		Identity {
			id: UserId::generate(),
			email: "casey@example.com".to_string(),
			username: "casey".to_string(),
			display_name: "Casey".to_string(),
			password_hash: Some("$argon2id$...".to_string()),
			role: Role::Member,
			is_super_admin: false,
			is_active: true,
			slack_user_id: Some("U12345".to_string()),
			microsoft_user_id: None,
			org_id: OrgId::generate(),
			team_id: None,
			created_at: Utc::now(),
			updated_at: Utc::now(),
		}
	}

	#[test]
	fn sanitized_drops_credential_fields() {
		let identity = make_identity();
		let safe = identity.sanitized();

		let json = serde_json::to_value(&safe).unwrap();
		assert!(json.get("password_hash").is_none());
		assert!(json.get("slack_user_id").is_none());
		assert!(json.get("microsoft_user_id").is_none());
		assert_eq!(json["email"], "casey@example.com");
		assert_eq!(json["role"], "member");
	}

	#[test]
	fn has_password_requires_non_empty_hash() {
		let mut identity = make_identity();
		assert!(identity.has_password());

		identity.password_hash = Some(String::new());
		assert!(!identity.has_password());

		identity.password_hash = None;
		assert!(!identity.has_password());
	}

	#[test]
	fn membership_active_requires_both_sides() {
		let base = OrgMembership {
			user_id: UserId::generate(),
			org_id: OrgId::generate(),
			user_is_active: true,
			org_is_active: true,
		};
		assert!(base.is_active());

		let inactive_user = OrgMembership {
			user_is_active: false,
			..base.clone()
		};
		assert!(!inactive_user.is_active());

		let inactive_org = OrgMembership {
			org_is_active: false,
			..base
		};
		assert!(!inactive_org.is_active());
	}
}
