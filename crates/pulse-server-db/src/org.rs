// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Organization repository for database operations.
//!
//! Provides tenant lookups for the organization resolver (by id and by
//! slug, active-filtered), the idempotent default-organization bootstrap,
//! and partner firm lookups for the partner-admin check.

use async_trait::async_trait;
use chrono::Utc;
use pulse_server_auth::{
	org::{Organization, PartnerFirm},
	types::{OrgId, PartnerFirmId, PlanTier},
};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::DbError;

#[async_trait]
pub trait OrgStore: Send + Sync {
	async fn create_org(&self, org: &Organization) -> Result<(), DbError>;
	async fn get_org_by_id(&self, id: &OrgId) -> Result<Option<Organization>, DbError>;
	async fn get_org_by_id_any(&self, id: &OrgId) -> Result<Option<Organization>, DbError>;
	async fn get_org_by_slug(&self, slug: &str) -> Result<Option<Organization>, DbError>;
	async fn get_all_orgs(&self) -> Result<Vec<Organization>, DbError>;
	async fn update_org(&self, org: &Organization) -> Result<(), DbError>;
	async fn ensure_default_org(&self) -> Result<Organization, DbError>;
	async fn get_partner_firm(&self, id: &PartnerFirmId) -> Result<Option<PartnerFirm>, DbError>;
	async fn create_partner_firm(&self, firm: &PartnerFirm) -> Result<(), DbError>;
	async fn duplicate_active_slugs(&self) -> Result<Vec<String>, DbError>;
}

/// Repository for organization database operations.
///
/// All IDs are UUIDs stored as strings in SQLite.
#[derive(Clone)]
pub struct OrgRepository {
	pool: SqlitePool,
}

impl OrgRepository {
	/// Create a new repository with the given pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	// =========================================================================
	// Organization CRUD
	// =========================================================================

	/// Create a new organization.
	///
	/// # Errors
	/// Returns `DbError::Sqlx` if insert fails (e.g., duplicate ID).
	#[tracing::instrument(skip(self, org), fields(org_id = %org.id, slug = %org.slug))]
	pub async fn create_org(&self, org: &Organization) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO organizations (
				id, slug, name, is_active, local_auth_enabled, slack_auth_enabled,
				microsoft_auth_enabled, plan_tier, partner_firm_id, created_at, updated_at
			)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(org.id.to_string())
		.bind(&org.slug)
		.bind(&org.name)
		.bind(org.is_active as i32)
		.bind(org.local_auth_enabled as i32)
		.bind(org.slack_auth_enabled as i32)
		.bind(org.microsoft_auth_enabled as i32)
		.bind(org.plan_tier.to_string())
		.bind(org.partner_firm_id.map(|f| f.to_string()))
		.bind(org.created_at.to_rfc3339())
		.bind(org.updated_at.to_rfc3339())
		.execute(&self.pool)
		.await?;

		tracing::debug!(org_id = %org.id, slug = %org.slug, "organization created");
		Ok(())
	}

	/// Get an active organization by ID.
	///
	/// # Returns
	/// `None` if no organization exists with this ID or if it is inactive.
	#[tracing::instrument(skip(self), fields(org_id = %id))]
	pub async fn get_org_by_id(&self, id: &OrgId) -> Result<Option<Organization>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, slug, name, is_active, local_auth_enabled, slack_auth_enabled,
			       microsoft_auth_enabled, plan_tier, partner_firm_id, created_at, updated_at
			FROM organizations
			WHERE id = ? AND is_active = 1
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| self.row_to_org(&r)).transpose()
	}

	/// Get an organization by ID, including inactive ones.
	///
	/// Used where the caller needs to distinguish "not found" from
	/// "found but deactivated".
	#[tracing::instrument(skip(self), fields(org_id = %id))]
	pub async fn get_org_by_id_any(&self, id: &OrgId) -> Result<Option<Organization>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, slug, name, is_active, local_auth_enabled, slack_auth_enabled,
			       microsoft_auth_enabled, plan_tier, partner_firm_id, created_at, updated_at
			FROM organizations
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| self.row_to_org(&r)).transpose()
	}

	/// Get an active organization by slug.
	///
	/// If multiple active organizations share the slug (a data defect the
	/// diagnostics surface), the oldest wins so resolution stays stable.
	#[tracing::instrument(skip(self), fields(slug = %slug))]
	pub async fn get_org_by_slug(&self, slug: &str) -> Result<Option<Organization>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, slug, name, is_active, local_auth_enabled, slack_auth_enabled,
			       microsoft_auth_enabled, plan_tier, partner_firm_id, created_at, updated_at
			FROM organizations
			WHERE slug = ? AND is_active = 1
			ORDER BY created_at ASC, id ASC
			LIMIT 1
			"#,
		)
		.bind(slug)
		.fetch_optional(&self.pool)
		.await?;

		let result = row.map(|r| self.row_to_org(&r)).transpose()?;
		if let Some(ref org) = result {
			tracing::debug!(org_id = %org.id, "organization found by slug");
		}
		Ok(result)
	}

	/// List all organizations, active and inactive, ordered by creation time.
	#[tracing::instrument(skip(self))]
	pub async fn get_all_orgs(&self) -> Result<Vec<Organization>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, slug, name, is_active, local_auth_enabled, slack_auth_enabled,
			       microsoft_auth_enabled, plan_tier, partner_firm_id, created_at, updated_at
			FROM organizations
			ORDER BY created_at ASC, id ASC
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		let orgs: Result<Vec<_>, _> = rows.iter().map(|r| self.row_to_org(r)).collect();
		let orgs = orgs?;
		tracing::debug!(count = orgs.len(), "listed organizations");
		Ok(orgs)
	}

	/// Update an organization.
	#[tracing::instrument(skip(self, org), fields(org_id = %org.id))]
	pub async fn update_org(&self, org: &Organization) -> Result<(), DbError> {
		let now = Utc::now().to_rfc3339();
		sqlx::query(
			r#"
			UPDATE organizations
			SET slug = ?, name = ?, is_active = ?, local_auth_enabled = ?,
			    slack_auth_enabled = ?, microsoft_auth_enabled = ?, plan_tier = ?,
			    partner_firm_id = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(&org.slug)
		.bind(&org.name)
		.bind(org.is_active as i32)
		.bind(org.local_auth_enabled as i32)
		.bind(org.slack_auth_enabled as i32)
		.bind(org.microsoft_auth_enabled as i32)
		.bind(org.plan_tier.to_string())
		.bind(org.partner_firm_id.map(|f| f.to_string()))
		.bind(now)
		.bind(org.id.to_string())
		.execute(&self.pool)
		.await?;

		tracing::debug!(org_id = %org.id, "organization updated");
		Ok(())
	}

	/// Ensure the well-known default organization exists.
	///
	/// Idempotent: returns the existing row when present, creates it with the
	/// fixed ID and slug otherwise. The resolver falls back to this tenant
	/// when session, identity, and host all fail to produce one.
	#[tracing::instrument(skip(self))]
	pub async fn ensure_default_org(&self) -> Result<Organization, DbError> {
		let default = Organization::default_org();

		if let Some(org) = self.get_org_by_id_any(&default.id).await? {
			tracing::debug!(org_id = %org.id, "default org already exists");
			return Ok(org);
		}

		self.create_org(&default).await?;
		tracing::info!(org_id = %default.id, slug = %default.slug, "created default org");
		Ok(default)
	}

	// =========================================================================
	// Partner firms
	// =========================================================================

	/// Get a partner firm by ID.
	#[tracing::instrument(skip(self), fields(firm_id = %id))]
	pub async fn get_partner_firm(
		&self,
		id: &PartnerFirmId,
	) -> Result<Option<PartnerFirm>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, is_active, created_at
			FROM partner_firms
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| self.row_to_firm(&r)).transpose()
	}

	/// Create a partner firm.
	#[tracing::instrument(skip(self, firm), fields(firm_id = %firm.id))]
	pub async fn create_partner_firm(&self, firm: &PartnerFirm) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO partner_firms (id, name, is_active, created_at)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(firm.id.to_string())
		.bind(&firm.name)
		.bind(firm.is_active as i32)
		.bind(firm.created_at.to_rfc3339())
		.execute(&self.pool)
		.await?;

		tracing::debug!(firm_id = %firm.id, "partner firm created");
		Ok(())
	}

	// =========================================================================
	// Diagnostics
	// =========================================================================

	/// Slugs shared by more than one active organization.
	///
	/// Slug uniqueness among active tenants is an application invariant, not
	/// a schema constraint; this query feeds the diagnostics endpoint.
	#[tracing::instrument(skip(self))]
	pub async fn duplicate_active_slugs(&self) -> Result<Vec<String>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT slug FROM organizations
			WHERE is_active = 1
			GROUP BY slug
			HAVING COUNT(*) > 1
			ORDER BY slug ASC
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows.iter().map(|r| r.get("slug")).collect())
	}

	// =========================================================================
	// Row mapping
	// =========================================================================

	fn row_to_org(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Organization, DbError> {
		let id_str: String = row.get("id");
		let is_active: i32 = row.get("is_active");
		let local_auth: i32 = row.get("local_auth_enabled");
		let slack_auth: i32 = row.get("slack_auth_enabled");
		let microsoft_auth: i32 = row.get("microsoft_auth_enabled");
		let plan_tier_str: String = row.get("plan_tier");
		let partner_firm_id: Option<String> = row.get("partner_firm_id");
		let created_at: String = row.get("created_at");
		let updated_at: String = row.get("updated_at");

		let id =
			Uuid::parse_str(&id_str).map_err(|e| DbError::Internal(format!("Invalid org ID: {e}")))?;
		let plan_tier = PlanTier::parse(&plan_tier_str).unwrap_or_default();

		Ok(Organization {
			id: OrgId::new(id),
			slug: row.get("slug"),
			name: row.get("name"),
			is_active: is_active != 0,
			local_auth_enabled: local_auth != 0,
			slack_auth_enabled: slack_auth != 0,
			microsoft_auth_enabled: microsoft_auth != 0,
			plan_tier,
			partner_firm_id: partner_firm_id
				.and_then(|f| Uuid::parse_str(&f).map(PartnerFirmId::new).ok()),
			created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
				.map_err(|e| DbError::Internal(format!("Invalid created_at: {e}")))?
				.with_timezone(&Utc),
			updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
				.map_err(|e| DbError::Internal(format!("Invalid updated_at: {e}")))?
				.with_timezone(&Utc),
		})
	}

	fn row_to_firm(&self, row: &sqlx::sqlite::SqliteRow) -> Result<PartnerFirm, DbError> {
		let id_str: String = row.get("id");
		let is_active: i32 = row.get("is_active");
		let created_at: String = row.get("created_at");

		let id =
			Uuid::parse_str(&id_str).map_err(|e| DbError::Internal(format!("Invalid firm ID: {e}")))?;

		Ok(PartnerFirm {
			id: PartnerFirmId::new(id),
			name: row.get("name"),
			is_active: is_active != 0,
			created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
				.map_err(|e| DbError::Internal(format!("Invalid created_at: {e}")))?
				.with_timezone(&Utc),
		})
	}
}

#[async_trait]
impl OrgStore for OrgRepository {
	async fn create_org(&self, org: &Organization) -> Result<(), DbError> {
		self.create_org(org).await
	}

	async fn get_org_by_id(&self, id: &OrgId) -> Result<Option<Organization>, DbError> {
		self.get_org_by_id(id).await
	}

	async fn get_org_by_id_any(&self, id: &OrgId) -> Result<Option<Organization>, DbError> {
		self.get_org_by_id_any(id).await
	}

	async fn get_org_by_slug(&self, slug: &str) -> Result<Option<Organization>, DbError> {
		self.get_org_by_slug(slug).await
	}

	async fn get_all_orgs(&self) -> Result<Vec<Organization>, DbError> {
		self.get_all_orgs().await
	}

	async fn update_org(&self, org: &Organization) -> Result<(), DbError> {
		self.update_org(org).await
	}

	async fn ensure_default_org(&self) -> Result<Organization, DbError> {
		self.ensure_default_org().await
	}

	async fn get_partner_firm(&self, id: &PartnerFirmId) -> Result<Option<PartnerFirm>, DbError> {
		self.get_partner_firm(id).await
	}

	async fn create_partner_firm(&self, firm: &PartnerFirm) -> Result<(), DbError> {
		self.create_partner_firm(firm).await
	}

	async fn duplicate_active_slugs(&self) -> Result<Vec<String>, DbError> {
		self.duplicate_active_slugs().await
	}
}
