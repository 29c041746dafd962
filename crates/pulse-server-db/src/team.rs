// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Team repository for database operations.

use async_trait::async_trait;
use chrono::Utc;
use pulse_server_auth::{
	types::{OrgId, TeamId, UserId},
	user::Team,
};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::DbError;

#[async_trait]
pub trait TeamStore: Send + Sync {
	async fn create_team(&self, team: &Team) -> Result<(), DbError>;
	async fn get_team(&self, org_id: &OrgId, id: &TeamId) -> Result<Option<Team>, DbError>;
	async fn list_teams(&self, org_id: &OrgId) -> Result<Vec<Team>, DbError>;
	async fn set_team_leader(
		&self,
		org_id: &OrgId,
		id: &TeamId,
		leader: Option<&UserId>,
	) -> Result<(), DbError>;
	async fn leads_any_team(&self, org_id: &OrgId, user_id: &UserId) -> Result<bool, DbError>;
}

/// Repository for team database operations.
#[derive(Clone)]
pub struct TeamRepository {
	pool: SqlitePool,
}

impl TeamRepository {
	/// Create a new repository with the given pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create a team.
	#[tracing::instrument(skip(self, team), fields(team_id = %team.id, org_id = %team.org_id))]
	pub async fn create_team(&self, team: &Team) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO teams (id, org_id, name, leader_user_id, created_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(team.id.to_string())
		.bind(team.org_id.to_string())
		.bind(&team.name)
		.bind(team.leader_user_id.map(|u| u.to_string()))
		.bind(team.created_at.to_rfc3339())
		.execute(&self.pool)
		.await?;

		tracing::debug!(team_id = %team.id, "team created");
		Ok(())
	}

	/// Get a team by ID within an organization.
	#[tracing::instrument(skip(self), fields(org_id = %org_id, team_id = %id))]
	pub async fn get_team(&self, org_id: &OrgId, id: &TeamId) -> Result<Option<Team>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, org_id, name, leader_user_id, created_at
			FROM teams
			WHERE id = ? AND org_id = ?
			"#,
		)
		.bind(id.to_string())
		.bind(org_id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| self.row_to_team(&r)).transpose()
	}

	/// List an organization's teams, ordered by name.
	#[tracing::instrument(skip(self), fields(org_id = %org_id))]
	pub async fn list_teams(&self, org_id: &OrgId) -> Result<Vec<Team>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, org_id, name, leader_user_id, created_at
			FROM teams
			WHERE org_id = ?
			ORDER BY name ASC
			"#,
		)
		.bind(org_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		let teams: Result<Vec<_>, _> = rows.iter().map(|r| self.row_to_team(r)).collect();
		let teams = teams?;
		tracing::debug!(org_id = %org_id, count = teams.len(), "listed teams");
		Ok(teams)
	}

	/// Set or clear the recorded team leader.
	#[tracing::instrument(skip(self), fields(org_id = %org_id, team_id = %id))]
	pub async fn set_team_leader(
		&self,
		org_id: &OrgId,
		id: &TeamId,
		leader: Option<&UserId>,
	) -> Result<(), DbError> {
		sqlx::query(
			r#"
			UPDATE teams SET leader_user_id = ?
			WHERE id = ? AND org_id = ?
			"#,
		)
		.bind(leader.map(|u| u.to_string()))
		.bind(id.to_string())
		.bind(org_id.to_string())
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	/// Whether the user is the recorded leader of any team in the tenant.
	#[tracing::instrument(skip(self), fields(org_id = %org_id, user_id = %user_id))]
	pub async fn leads_any_team(&self, org_id: &OrgId, user_id: &UserId) -> Result<bool, DbError> {
		let row: (i64,) = sqlx::query_as(
			r#"
			SELECT COUNT(*) FROM teams
			WHERE org_id = ? AND leader_user_id = ?
			"#,
		)
		.bind(org_id.to_string())
		.bind(user_id.to_string())
		.fetch_one(&self.pool)
		.await?;

		Ok(row.0 > 0)
	}

	fn row_to_team(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Team, DbError> {
		let id_str: String = row.get("id");
		let org_id_str: String = row.get("org_id");
		let leader_str: Option<String> = row.get("leader_user_id");
		let created_at: String = row.get("created_at");

		let id =
			Uuid::parse_str(&id_str).map_err(|e| DbError::Internal(format!("Invalid team ID: {e}")))?;
		let org_id = Uuid::parse_str(&org_id_str)
			.map_err(|e| DbError::Internal(format!("Invalid org_id: {e}")))?;

		Ok(Team {
			id: TeamId::new(id),
			org_id: OrgId::new(org_id),
			name: row.get("name"),
			leader_user_id: leader_str.and_then(|u| Uuid::parse_str(&u).map(UserId::new).ok()),
			created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
				.map_err(|e| DbError::Internal(format!("Invalid created_at: {e}")))?
				.with_timezone(&Utc),
		})
	}
}

#[async_trait]
impl TeamStore for TeamRepository {
	async fn create_team(&self, team: &Team) -> Result<(), DbError> {
		self.create_team(team).await
	}

	async fn get_team(&self, org_id: &OrgId, id: &TeamId) -> Result<Option<Team>, DbError> {
		self.get_team(org_id, id).await
	}

	async fn list_teams(&self, org_id: &OrgId) -> Result<Vec<Team>, DbError> {
		self.list_teams(org_id).await
	}

	async fn set_team_leader(
		&self,
		org_id: &OrgId,
		id: &TeamId,
		leader: Option<&UserId>,
	) -> Result<(), DbError> {
		self.set_team_leader(org_id, id, leader).await
	}

	async fn leads_any_team(&self, org_id: &OrgId, user_id: &UserId) -> Result<bool, DbError> {
		self.leads_any_team(org_id, user_id).await
	}
}
