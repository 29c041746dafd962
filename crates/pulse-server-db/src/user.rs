// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User identity repository for database operations.
//!
//! Identities are tenant-scoped rows: one row per (organization, email).
//! Cross-tenant questions go through the email-keyed membership index,
//! which the organization resolver consumes in a deterministic order.

use async_trait::async_trait;
use chrono::Utc;
use pulse_server_auth::{
	types::{OrgId, Role, TeamId, UserId, DEFAULT_ORG_ID},
	user::{Identity, OrgMembership},
};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::DbError;

/// Username of the seed placeholder account shipped by old installers.
/// Provisioning a real backdoor admin deactivates it.
const LEGACY_ADMIN_USERNAME: &str = "admin";

#[async_trait]
pub trait UserStore: Send + Sync {
	async fn create_user(&self, user: &Identity) -> Result<(), DbError>;
	async fn get_user(&self, org_id: &OrgId, id: &UserId) -> Result<Option<Identity>, DbError>;
	async fn get_user_global(&self, id: &UserId) -> Result<Option<Identity>, DbError>;
	async fn get_user_by_username(
		&self,
		org_id: &OrgId,
		username: &str,
	) -> Result<Option<Identity>, DbError>;
	async fn get_user_by_email(
		&self,
		org_id: &OrgId,
		email: &str,
	) -> Result<Option<Identity>, DbError>;
	async fn get_user_organizations(&self, email: &str) -> Result<Vec<OrgMembership>, DbError>;
	async fn find_user_by_slack_id(&self, slack_user_id: &str)
		-> Result<Option<Identity>, DbError>;
	async fn find_user_by_microsoft_id(
		&self,
		microsoft_user_id: &str,
	) -> Result<Option<Identity>, DbError>;
	async fn update_user(&self, user: &Identity) -> Result<(), DbError>;
	async fn deactivate_user(&self, org_id: &OrgId, id: &UserId) -> Result<bool, DbError>;
	async fn ensure_backdoor_admin(
		&self,
		username: &str,
		email: &str,
		display_name: &str,
	) -> Result<Identity, DbError>;
	async fn has_active_super_admin(&self) -> Result<bool, DbError>;
}

/// Repository for user identity database operations.
///
/// All IDs are UUIDs stored as strings in SQLite.
#[derive(Clone)]
pub struct UserRepository {
	pool: SqlitePool,
}

const IDENTITY_COLUMNS: &str = "id, org_id, team_id, email, username, display_name, \
	password_hash, role, is_super_admin, is_active, slack_user_id, microsoft_user_id, \
	created_at, updated_at";

impl UserRepository {
	/// Create a new repository with the given pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	// =========================================================================
	// Identity CRUD
	// =========================================================================

	/// Create a new identity.
	///
	/// # Database Constraints
	/// - (`org_id`, `username`) must be unique
	/// - (`org_id`, `email`) must be unique
	#[tracing::instrument(skip(self, user), fields(user_id = %user.id, org_id = %user.org_id))]
	pub async fn create_user(&self, user: &Identity) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO users (
				id, org_id, team_id, email, username, display_name, password_hash,
				role, is_super_admin, is_active, slack_user_id, microsoft_user_id,
				created_at, updated_at
			)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(user.id.to_string())
		.bind(user.org_id.to_string())
		.bind(user.team_id.map(|t| t.to_string()))
		.bind(&user.email)
		.bind(&user.username)
		.bind(&user.display_name)
		.bind(&user.password_hash)
		.bind(user.role.to_string())
		.bind(user.is_super_admin as i32)
		.bind(user.is_active as i32)
		.bind(&user.slack_user_id)
		.bind(&user.microsoft_user_id)
		.bind(user.created_at.to_rfc3339())
		.bind(user.updated_at.to_rfc3339())
		.execute(&self.pool)
		.await?;

		tracing::debug!(user_id = %user.id, org_id = %user.org_id, "identity created");
		Ok(())
	}

	/// Get an identity by ID, scoped to an organization.
	///
	/// The org scope is part of the key: a valid user ID paired with the
	/// wrong tenant returns `None`.
	#[tracing::instrument(skip(self), fields(org_id = %org_id, user_id = %id))]
	pub async fn get_user(&self, org_id: &OrgId, id: &UserId) -> Result<Option<Identity>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {IDENTITY_COLUMNS} FROM users WHERE id = ? AND org_id = ?"
		))
		.bind(id.to_string())
		.bind(org_id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| self.row_to_identity(&r)).transpose()
	}

	/// Get an identity by ID without a tenant scope.
	///
	/// Only for trust-anchored paths (session restoration, super-admin
	/// tooling); tenant-scoped handlers must use [`get_user`].
	///
	/// [`get_user`]: UserRepository::get_user
	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn get_user_global(&self, id: &UserId) -> Result<Option<Identity>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {IDENTITY_COLUMNS} FROM users WHERE id = ?"
		))
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| self.row_to_identity(&r)).transpose()
	}

	/// Get an identity by username within an organization.
	#[tracing::instrument(skip(self), fields(org_id = %org_id, username = %username))]
	pub async fn get_user_by_username(
		&self,
		org_id: &OrgId,
		username: &str,
	) -> Result<Option<Identity>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {IDENTITY_COLUMNS} FROM users WHERE org_id = ? AND username = ?"
		))
		.bind(org_id.to_string())
		.bind(username)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| self.row_to_identity(&r)).transpose()
	}

	/// Get an identity by email within an organization.
	#[tracing::instrument(skip(self), fields(org_id = %org_id))]
	pub async fn get_user_by_email(
		&self,
		org_id: &OrgId,
		email: &str,
	) -> Result<Option<Identity>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {IDENTITY_COLUMNS} FROM users WHERE org_id = ? AND email = ?"
		))
		.bind(org_id.to_string())
		.bind(email)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| self.row_to_identity(&r)).transpose()
	}

	/// Cross-tenant membership index for an email address.
	///
	/// Ordered by organization creation time, then org ID, so "first active
	/// membership" is a stable choice across calls. Includes inactive
	/// entries; the caller filters with [`OrgMembership::is_active`].
	#[tracing::instrument(skip(self))]
	pub async fn get_user_organizations(&self, email: &str) -> Result<Vec<OrgMembership>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT u.id AS user_id, u.org_id, u.is_active AS user_is_active,
			       o.is_active AS org_is_active
			FROM users u
			INNER JOIN organizations o ON u.org_id = o.id
			WHERE u.email = ?
			ORDER BY o.created_at ASC, o.id ASC
			"#,
		)
		.bind(email)
		.fetch_all(&self.pool)
		.await?;

		let mut memberships = Vec::with_capacity(rows.len());
		for row in &rows {
			let user_id_str: String = row.get("user_id");
			let org_id_str: String = row.get("org_id");
			let user_is_active: i32 = row.get("user_is_active");
			let org_is_active: i32 = row.get("org_is_active");

			let user_id = Uuid::parse_str(&user_id_str)
				.map_err(|e| DbError::Internal(format!("Invalid user ID: {e}")))?;
			let org_id = Uuid::parse_str(&org_id_str)
				.map_err(|e| DbError::Internal(format!("Invalid org ID: {e}")))?;

			memberships.push(OrgMembership {
				user_id: UserId::new(user_id),
				org_id: OrgId::new(org_id),
				user_is_active: user_is_active != 0,
				org_is_active: org_is_active != 0,
			});
		}

		tracing::debug!(count = memberships.len(), "listed memberships for email");
		Ok(memberships)
	}

	// =========================================================================
	// OAuth account linking
	// =========================================================================

	/// Find an active identity by linked Slack user ID.
	#[tracing::instrument(skip(self), fields(slack_user_id = %slack_user_id))]
	pub async fn find_user_by_slack_id(
		&self,
		slack_user_id: &str,
	) -> Result<Option<Identity>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {IDENTITY_COLUMNS} FROM users WHERE slack_user_id = ? AND is_active = 1"
		))
		.bind(slack_user_id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| self.row_to_identity(&r)).transpose()
	}

	/// Find an active identity by linked Microsoft user ID.
	#[tracing::instrument(skip(self), fields(microsoft_user_id = %microsoft_user_id))]
	pub async fn find_user_by_microsoft_id(
		&self,
		microsoft_user_id: &str,
	) -> Result<Option<Identity>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {IDENTITY_COLUMNS} FROM users WHERE microsoft_user_id = ? AND is_active = 1"
		))
		.bind(microsoft_user_id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| self.row_to_identity(&r)).transpose()
	}

	/// Update an identity.
	#[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
	pub async fn update_user(&self, user: &Identity) -> Result<(), DbError> {
		let now = Utc::now().to_rfc3339();
		sqlx::query(
			r#"
			UPDATE users
			SET team_id = ?, email = ?, username = ?, display_name = ?, password_hash = ?,
			    role = ?, is_super_admin = ?, is_active = ?, slack_user_id = ?,
			    microsoft_user_id = ?, updated_at = ?
			WHERE id = ? AND org_id = ?
			"#,
		)
		.bind(user.team_id.map(|t| t.to_string()))
		.bind(&user.email)
		.bind(&user.username)
		.bind(&user.display_name)
		.bind(&user.password_hash)
		.bind(user.role.to_string())
		.bind(user.is_super_admin as i32)
		.bind(user.is_active as i32)
		.bind(&user.slack_user_id)
		.bind(&user.microsoft_user_id)
		.bind(now)
		.bind(user.id.to_string())
		.bind(user.org_id.to_string())
		.execute(&self.pool)
		.await?;

		tracing::debug!(user_id = %user.id, "identity updated");
		Ok(())
	}

	/// Deactivate an identity. Existing sessions for it stop authenticating
	/// on their next lookup.
	///
	/// # Returns
	/// `true` if an active identity was deactivated, `false` if not found.
	#[tracing::instrument(skip(self), fields(org_id = %org_id, user_id = %id))]
	pub async fn deactivate_user(&self, org_id: &OrgId, id: &UserId) -> Result<bool, DbError> {
		let now = Utc::now().to_rfc3339();
		let result = sqlx::query(
			r#"
			UPDATE users
			SET is_active = 0, updated_at = ?
			WHERE id = ? AND org_id = ? AND is_active = 1
			"#,
		)
		.bind(now)
		.bind(id.to_string())
		.bind(org_id.to_string())
		.execute(&self.pool)
		.await?;

		let deactivated = result.rows_affected() > 0;
		if deactivated {
			tracing::info!(user_id = %id, org_id = %org_id, "identity deactivated");
		}
		Ok(deactivated)
	}

	// =========================================================================
	// Backdoor admin provisioning
	// =========================================================================

	/// Ensure the backdoor admin identity exists in the default organization.
	///
	/// Idempotent: returns the existing identity when the username is already
	/// taken in the default org, promoting it to an active super admin if
	/// needed. Also deactivates the legacy `admin` seed placeholder when the
	/// configured username differs, so the old well-known account cannot be
	/// targeted once a real admin is provisioned.
	#[tracing::instrument(skip(self, email, display_name), fields(username = %username))]
	pub async fn ensure_backdoor_admin(
		&self,
		username: &str,
		email: &str,
		display_name: &str,
	) -> Result<Identity, DbError> {
		let default_org = OrgId::new(DEFAULT_ORG_ID);

		if username != LEGACY_ADMIN_USERNAME {
			if let Some(legacy) = self
				.get_user_by_username(&default_org, LEGACY_ADMIN_USERNAME)
				.await?
			{
				if legacy.is_active && self.deactivate_user(&default_org, &legacy.id).await? {
					tracing::warn!(user_id = %legacy.id, "deactivated legacy admin placeholder");
				}
			}
		}

		if let Some(mut existing) = self.get_user_by_username(&default_org, username).await? {
			if !existing.is_active || !existing.is_super_admin || existing.role != Role::Admin {
				existing.is_active = true;
				existing.is_super_admin = true;
				existing.role = Role::Admin;
				self.update_user(&existing).await?;
				tracing::info!(user_id = %existing.id, "promoted existing identity to backdoor admin");
			}
			return Ok(existing);
		}

		let now = Utc::now();
		let admin = Identity {
			id: UserId::generate(),
			email: email.to_string(),
			username: username.to_string(),
			display_name: display_name.to_string(),
			// No password: the account is reachable only through the backdoor
			// pair or a provider link added later.
			password_hash: None,
			role: Role::Admin,
			is_super_admin: true,
			is_active: true,
			slack_user_id: None,
			microsoft_user_id: None,
			org_id: default_org,
			team_id: None,
			created_at: now,
			updated_at: now,
		};
		self.create_user(&admin).await?;

		tracing::info!(user_id = %admin.id, "provisioned backdoor admin identity");
		Ok(admin)
	}

	/// Whether any active super admin exists. Feeds the diagnostics endpoint.
	#[tracing::instrument(skip(self))]
	pub async fn has_active_super_admin(&self) -> Result<bool, DbError> {
		let row: (i64,) = sqlx::query_as(
			r#"
			SELECT COUNT(*) FROM users
			WHERE is_super_admin = 1 AND is_active = 1
			"#,
		)
		.fetch_one(&self.pool)
		.await?;

		Ok(row.0 > 0)
	}

	// =========================================================================
	// Row mapping
	// =========================================================================

	fn row_to_identity(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Identity, DbError> {
		let id_str: String = row.get("id");
		let org_id_str: String = row.get("org_id");
		let team_id_str: Option<String> = row.get("team_id");
		let role_str: String = row.get("role");
		let is_super_admin: i32 = row.get("is_super_admin");
		let is_active: i32 = row.get("is_active");
		let created_at: String = row.get("created_at");
		let updated_at: String = row.get("updated_at");

		let id =
			Uuid::parse_str(&id_str).map_err(|e| DbError::Internal(format!("Invalid user ID: {e}")))?;
		let org_id = Uuid::parse_str(&org_id_str)
			.map_err(|e| DbError::Internal(format!("Invalid org_id: {e}")))?;
		let role = Role::parse(&role_str).unwrap_or(Role::Member);

		Ok(Identity {
			id: UserId::new(id),
			email: row.get("email"),
			username: row.get("username"),
			display_name: row.get("display_name"),
			password_hash: row.get("password_hash"),
			role,
			is_super_admin: is_super_admin != 0,
			is_active: is_active != 0,
			slack_user_id: row.get("slack_user_id"),
			microsoft_user_id: row.get("microsoft_user_id"),
			org_id: OrgId::new(org_id),
			team_id: team_id_str.and_then(|t| Uuid::parse_str(&t).map(TeamId::new).ok()),
			created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
				.map_err(|e| DbError::Internal(format!("Invalid created_at: {e}")))?
				.with_timezone(&Utc),
			updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
				.map_err(|e| DbError::Internal(format!("Invalid updated_at: {e}")))?
				.with_timezone(&Utc),
		})
	}
}

#[async_trait]
impl UserStore for UserRepository {
	async fn create_user(&self, user: &Identity) -> Result<(), DbError> {
		self.create_user(user).await
	}

	async fn get_user(&self, org_id: &OrgId, id: &UserId) -> Result<Option<Identity>, DbError> {
		self.get_user(org_id, id).await
	}

	async fn get_user_global(&self, id: &UserId) -> Result<Option<Identity>, DbError> {
		self.get_user_global(id).await
	}

	async fn get_user_by_username(
		&self,
		org_id: &OrgId,
		username: &str,
	) -> Result<Option<Identity>, DbError> {
		self.get_user_by_username(org_id, username).await
	}

	async fn get_user_by_email(
		&self,
		org_id: &OrgId,
		email: &str,
	) -> Result<Option<Identity>, DbError> {
		self.get_user_by_email(org_id, email).await
	}

	async fn get_user_organizations(&self, email: &str) -> Result<Vec<OrgMembership>, DbError> {
		self.get_user_organizations(email).await
	}

	async fn find_user_by_slack_id(
		&self,
		slack_user_id: &str,
	) -> Result<Option<Identity>, DbError> {
		self.find_user_by_slack_id(slack_user_id).await
	}

	async fn find_user_by_microsoft_id(
		&self,
		microsoft_user_id: &str,
	) -> Result<Option<Identity>, DbError> {
		self.find_user_by_microsoft_id(microsoft_user_id).await
	}

	async fn update_user(&self, user: &Identity) -> Result<(), DbError> {
		self.update_user(user).await
	}

	async fn deactivate_user(&self, org_id: &OrgId, id: &UserId) -> Result<bool, DbError> {
		self.deactivate_user(org_id, id).await
	}

	async fn ensure_backdoor_admin(
		&self,
		username: &str,
		email: &str,
		display_name: &str,
	) -> Result<Identity, DbError> {
		self.ensure_backdoor_admin(username, email, display_name).await
	}

	async fn has_active_super_admin(&self) -> Result<bool, DbError> {
		self.has_active_super_admin().await
	}
}
