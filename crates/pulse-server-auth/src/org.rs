// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Organization (tenant) types.

use crate::types::{OrgId, PartnerFirmId, PlanTier, DEFAULT_ORG_ID, DEFAULT_ORG_SLUG};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An organization (tenant).
///
/// All tenant-scoped data hangs off exactly one organization. The slug is
/// subdomain-routable and unique among active organizations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
	pub id: OrgId,
	/// Subdomain-routable slug, unique among active organizations.
	pub slug: String,
	pub name: String,
	/// Inactive organizations reject all tenant-scoped access.
	pub is_active: bool,
	/// Whether username/password login is enabled for this tenant.
	pub local_auth_enabled: bool,
	/// Whether Sign in with Slack is enabled for this tenant.
	pub slack_auth_enabled: bool,
	/// Whether Microsoft login is enabled for this tenant.
	pub microsoft_auth_enabled: bool,
	pub plan_tier: PlanTier,
	/// Associated partner firm, if this tenant is partner-managed.
	pub partner_firm_id: Option<PartnerFirmId>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Organization {
	/// The well-known default organization, bound when no tenant can be
	/// resolved from session, identity, or host. Idempotently created on
	/// first use by the persistence layer.
	pub fn default_org() -> Self {
		let now = Utc::now();
		Self {
			id: OrgId::new(DEFAULT_ORG_ID),
			slug: DEFAULT_ORG_SLUG.to_string(),
			name: "Default".to_string(),
			is_active: true,
			local_auth_enabled: true,
			slack_auth_enabled: false,
			microsoft_auth_enabled: false,
			plan_tier: PlanTier::Free,
			partner_firm_id: None,
			created_at: now,
			updated_at: now,
		}
	}
}

/// A partner firm administering one or more tenants.
///
/// The partner-admin authorization check requires the identity's organization
/// to carry a firm association and that firm to be active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerFirm {
	pub id: PartnerFirmId,
	pub name: String,
	pub is_active: bool,
	pub created_at: DateTime<Utc>,
}

/// Validate an organization slug: lowercase alphanumeric and dashes,
/// 1 to 63 characters (a DNS label, since slugs route subdomains).
pub fn is_valid_slug(slug: &str) -> bool {
	!slug.is_empty()
		&& slug.len() <= 63
		&& slug
			.chars()
			.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
		&& !slug.starts_with('-')
		&& !slug.ends_with('-')
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn default_org_has_fixed_id_and_slug() {
		let org = Organization::default_org();
		assert_eq!(org.id.into_inner(), DEFAULT_ORG_ID);
		assert_eq!(org.slug, DEFAULT_ORG_SLUG);
		assert!(org.is_active);
		assert!(org.local_auth_enabled);
	}

	#[test]
	fn slug_validation_basics() {
		assert!(is_valid_slug("acme"));
		assert!(is_valid_slug("acme-corp-2"));
		assert!(!is_valid_slug(""));
		assert!(!is_valid_slug("Acme"));
		assert!(!is_valid_slug("-acme"));
		assert!(!is_valid_slug("acme-"));
		assert!(!is_valid_slug("acme.corp"));
		assert!(!is_valid_slug(&"a".repeat(64)));
	}

	proptest! {
		#[test]
		fn generated_slugs_validate(slug in "[a-z0-9][a-z0-9-]{0,40}[a-z0-9]") {
			prop_assert!(is_valid_slug(&slug));
		}
	}
}
