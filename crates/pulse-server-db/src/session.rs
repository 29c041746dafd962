// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session repository for database operations.
//!
//! Sessions are server-side records keyed by the opaque cookie value.
//! Reads slide the 30-day expiry forward; login swaps the session ID so a
//! pre-login cookie value can never name an authenticated session.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use pulse_server_auth::{
	session::{Session, SessionId, SESSION_TTL_DAYS},
	types::{OrgId, UserId},
};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::DbError;

#[async_trait]
pub trait SessionStore: Send + Sync {
	async fn create_session(&self, session: &Session) -> Result<(), DbError>;
	async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, DbError>;
	async fn update_session(&self, session: &Session) -> Result<(), DbError>;
	async fn set_session_user(
		&self,
		id: &SessionId,
		user_id: &UserId,
		org_id: &OrgId,
		org_slug: &str,
	) -> Result<Session, DbError>;
	async fn set_oauth_state(&self, id: &SessionId, state: &str) -> Result<(), DbError>;
	async fn take_oauth_state(&self, id: &SessionId) -> Result<Option<String>, DbError>;
	async fn clear_session(&self, id: &SessionId) -> Result<bool, DbError>;
	async fn delete_expired_sessions(&self) -> Result<u64, DbError>;
}

/// Repository for session database operations.
#[derive(Clone)]
pub struct SessionRepository {
	pool: SqlitePool,
}

impl SessionRepository {
	/// Create a new repository with the given pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a new session record.
	#[tracing::instrument(skip(self, session), fields(session_id = %session.id))]
	pub async fn create_session(&self, session: &Session) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO sessions (id, user_id, org_id, org_slug, oauth_state, return_to, created_at, expires_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(session.id.as_str())
		.bind(session.user_id.map(|u| u.to_string()))
		.bind(session.org_id.map(|o| o.to_string()))
		.bind(&session.org_slug)
		.bind(&session.oauth_state)
		.bind(&session.return_to)
		.bind(session.created_at.to_rfc3339())
		.bind(session.expires_at.to_rfc3339())
		.execute(&self.pool)
		.await?;

		tracing::debug!(session_id = %session.id, "session created");
		Ok(())
	}

	/// Look up a session, sliding its expiry forward.
	///
	/// Expired sessions are deleted on sight and reported as absent, so a
	/// stale cookie behaves exactly like no cookie.
	#[tracing::instrument(skip(self), fields(session_id = %id))]
	pub async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, user_id, org_id, org_slug, oauth_state, return_to, created_at, expires_at
			FROM sessions
			WHERE id = ?
			"#,
		)
		.bind(id.as_str())
		.fetch_optional(&self.pool)
		.await?;

		let Some(row) = row else {
			return Ok(None);
		};

		let mut session = self.row_to_session(&row)?;
		let now = Utc::now();

		if session.is_expired(now) {
			self.clear_session(id).await?;
			tracing::debug!(session_id = %id, "expired session discarded");
			return Ok(None);
		}

		// Sliding window: every read pushes expiry out to a full TTL.
		session.expires_at = now + Duration::days(SESSION_TTL_DAYS);
		sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
			.bind(session.expires_at.to_rfc3339())
			.bind(id.as_str())
			.execute(&self.pool)
			.await?;

		Ok(Some(session))
	}

	/// Persist mutable session fields (org binding, return target).
	#[tracing::instrument(skip(self, session), fields(session_id = %session.id))]
	pub async fn update_session(&self, session: &Session) -> Result<(), DbError> {
		sqlx::query(
			r#"
			UPDATE sessions
			SET user_id = ?, org_id = ?, org_slug = ?, oauth_state = ?, return_to = ?, expires_at = ?
			WHERE id = ?
			"#,
		)
		.bind(session.user_id.map(|u| u.to_string()))
		.bind(session.org_id.map(|o| o.to_string()))
		.bind(&session.org_slug)
		.bind(&session.oauth_state)
		.bind(&session.return_to)
		.bind(session.expires_at.to_rfc3339())
		.bind(session.id.as_str())
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	/// Bind an authenticated identity to a session, regenerating the ID.
	///
	/// The old record is destroyed and a fresh one created under a new
	/// random ID, defeating session fixation: a cookie value captured
	/// before login never names the authenticated session. The transient
	/// OAuth state does not survive login.
	///
	/// # Returns
	/// The new session; the caller must re-issue the cookie from it.
	#[tracing::instrument(skip(self), fields(session_id = %id, user_id = %user_id, org_id = %org_id))]
	pub async fn set_session_user(
		&self,
		id: &SessionId,
		user_id: &UserId,
		org_id: &OrgId,
		org_slug: &str,
	) -> Result<Session, DbError> {
		let old = self.get_session(id).await?;
		let return_to = old.as_ref().and_then(|s| s.return_to.clone());

		let now = Utc::now();
		let session = Session {
			id: SessionId::generate(),
			user_id: Some(*user_id),
			org_id: Some(*org_id),
			org_slug: Some(org_slug.to_string()),
			oauth_state: None,
			return_to,
			created_at: now,
			expires_at: now + Duration::days(SESSION_TTL_DAYS),
		};

		let mut tx = self.pool.begin().await?;
		sqlx::query("DELETE FROM sessions WHERE id = ?")
			.bind(id.as_str())
			.execute(&mut *tx)
			.await?;
		sqlx::query(
			r#"
			INSERT INTO sessions (id, user_id, org_id, org_slug, oauth_state, return_to, created_at, expires_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(session.id.as_str())
		.bind(session.user_id.map(|u| u.to_string()))
		.bind(session.org_id.map(|o| o.to_string()))
		.bind(&session.org_slug)
		.bind(&session.oauth_state)
		.bind(&session.return_to)
		.bind(session.created_at.to_rfc3339())
		.bind(session.expires_at.to_rfc3339())
		.execute(&mut *tx)
		.await?;
		tx.commit().await?;

		tracing::debug!(old_session_id = %id, new_session_id = %session.id, "session id regenerated on login");
		Ok(session)
	}

	/// Store an OAuth state nonce on the session.
	#[tracing::instrument(skip(self, state), fields(session_id = %id))]
	pub async fn set_oauth_state(&self, id: &SessionId, state: &str) -> Result<(), DbError> {
		sqlx::query("UPDATE sessions SET oauth_state = ? WHERE id = ?")
			.bind(state)
			.bind(id.as_str())
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	/// Read and clear the OAuth state nonce; single-use by construction.
	#[tracing::instrument(skip(self), fields(session_id = %id))]
	pub async fn take_oauth_state(&self, id: &SessionId) -> Result<Option<String>, DbError> {
		let row = sqlx::query("SELECT oauth_state FROM sessions WHERE id = ?")
			.bind(id.as_str())
			.fetch_optional(&self.pool)
			.await?;

		let state: Option<String> = match row {
			Some(row) => row.get("oauth_state"),
			None => return Ok(None),
		};

		if state.is_some() {
			sqlx::query("UPDATE sessions SET oauth_state = NULL WHERE id = ?")
				.bind(id.as_str())
				.execute(&self.pool)
				.await?;
		}

		Ok(state)
	}

	/// Destroy a session.
	///
	/// # Returns
	/// `true` if a record was deleted, `false` if not found.
	#[tracing::instrument(skip(self), fields(session_id = %id))]
	pub async fn clear_session(&self, id: &SessionId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
			.bind(id.as_str())
			.execute(&self.pool)
			.await?;

		let deleted = result.rows_affected() > 0;
		if deleted {
			tracing::debug!(session_id = %id, "session destroyed");
		}
		Ok(deleted)
	}

	/// Sweep expired sessions. Run periodically; expired records are also
	/// removed lazily on lookup.
	#[tracing::instrument(skip(self))]
	pub async fn delete_expired_sessions(&self) -> Result<u64, DbError> {
		let now = Utc::now().to_rfc3339();
		let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
			.bind(now)
			.execute(&self.pool)
			.await?;

		let swept = result.rows_affected();
		if swept > 0 {
			tracing::debug!(count = swept, "expired sessions swept");
		}
		Ok(swept)
	}

	fn row_to_session(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Session, DbError> {
		let id: String = row.get("id");
		let user_id: Option<String> = row.get("user_id");
		let org_id: Option<String> = row.get("org_id");
		let created_at: String = row.get("created_at");
		let expires_at: String = row.get("expires_at");

		Ok(Session {
			id: SessionId::from_string(id),
			user_id: user_id
				.map(|u| {
					Uuid::parse_str(&u)
						.map(UserId::new)
						.map_err(|e| DbError::Internal(format!("Invalid user_id: {e}")))
				})
				.transpose()?,
			org_id: org_id
				.map(|o| {
					Uuid::parse_str(&o)
						.map(OrgId::new)
						.map_err(|e| DbError::Internal(format!("Invalid org_id: {e}")))
				})
				.transpose()?,
			org_slug: row.get("org_slug"),
			oauth_state: row.get("oauth_state"),
			return_to: row.get("return_to"),
			created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
				.map_err(|e| DbError::Internal(format!("Invalid created_at: {e}")))?
				.with_timezone(&Utc),
			expires_at: chrono::DateTime::parse_from_rfc3339(&expires_at)
				.map_err(|e| DbError::Internal(format!("Invalid expires_at: {e}")))?
				.with_timezone(&Utc),
		})
	}
}

#[async_trait]
impl SessionStore for SessionRepository {
	async fn create_session(&self, session: &Session) -> Result<(), DbError> {
		self.create_session(session).await
	}

	async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, DbError> {
		self.get_session(id).await
	}

	async fn update_session(&self, session: &Session) -> Result<(), DbError> {
		self.update_session(session).await
	}

	async fn set_session_user(
		&self,
		id: &SessionId,
		user_id: &UserId,
		org_id: &OrgId,
		org_slug: &str,
	) -> Result<Session, DbError> {
		self.set_session_user(id, user_id, org_id, org_slug).await
	}

	async fn set_oauth_state(&self, id: &SessionId, state: &str) -> Result<(), DbError> {
		self.set_oauth_state(id, state).await
	}

	async fn take_oauth_state(&self, id: &SessionId) -> Result<Option<String>, DbError> {
		self.take_oauth_state(id).await
	}

	async fn clear_session(&self, id: &SessionId) -> Result<bool, DbError> {
		self.clear_session(id).await
	}

	async fn delete_expired_sessions(&self) -> Result<u64, DbError> {
		self.delete_expired_sessions().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::org::OrgRepository;
	use crate::testing::create_test_pool;
	use crate::user::UserRepository;
	use pulse_server_auth::org::Organization;
	use pulse_server_auth::types::Role;
	use pulse_server_auth::user::Identity;

	async fn seed_user(pool: &SqlitePool) -> (OrgId, UserId) {
		let now = Utc::now();
		let org = Organization {
			id: OrgId::generate(),
			slug: "acme".to_string(),
			name: "Acme".to_string(),
			is_active: true,
			local_auth_enabled: true,
			slack_auth_enabled: false,
			microsoft_auth_enabled: false,
			plan_tier: Default::default(),
			partner_firm_id: None,
			created_at: now,
			updated_at: now,
		};
		OrgRepository::new(pool.clone()).create_org(&org).await.unwrap();

		let user = Identity {
			id: UserId::generate(),
			email: "casey@example.com".to_string(),
			username: "casey".to_string(),
			display_name: "Casey".to_string(),
			password_hash: None,
			role: Role::Member,
			is_super_admin: false,
			is_active: true,
			slack_user_id: None,
			microsoft_user_id: None,
			org_id: org.id,
			team_id: None,
			created_at: now,
			updated_at: now,
		};
		UserRepository::new(pool.clone()).create_user(&user).await.unwrap();
		(org.id, user.id)
	}

	#[tokio::test]
	async fn create_and_get_roundtrip() {
		let repo = SessionRepository::new(create_test_pool().await);
		let session = Session::new();
		repo.create_session(&session).await.unwrap();

		let fetched = repo.get_session(&session.id).await.unwrap().unwrap();
		assert_eq!(fetched.id, session.id);
		assert!(!fetched.is_authenticated());
	}

	#[tokio::test]
	async fn unknown_session_is_absent() {
		let repo = SessionRepository::new(create_test_pool().await);
		assert!(repo
			.get_session(&SessionId::generate())
			.await
			.unwrap()
			.is_none());
	}

	#[tokio::test]
	async fn expired_session_is_deleted_on_lookup() {
		let repo = SessionRepository::new(create_test_pool().await);
		let mut session = Session::new();
		session.expires_at = Utc::now() - Duration::hours(1);
		repo.create_session(&session).await.unwrap();

		assert!(repo.get_session(&session.id).await.unwrap().is_none());
		// The record is gone, not just filtered.
		assert!(!repo.clear_session(&session.id).await.unwrap());
	}

	#[tokio::test]
	async fn lookup_slides_expiry_forward() {
		let repo = SessionRepository::new(create_test_pool().await);
		let mut session = Session::new();
		session.expires_at = Utc::now() + Duration::days(1);
		repo.create_session(&session).await.unwrap();

		let fetched = repo.get_session(&session.id).await.unwrap().unwrap();
		assert!(fetched.expires_at > Utc::now() + Duration::days(SESSION_TTL_DAYS - 1));
	}

	#[tokio::test]
	async fn login_regenerates_session_id() {
		let pool = create_test_pool().await;
		let (org_id, user_id) = seed_user(&pool).await;
		let repo = SessionRepository::new(pool);

		let anonymous = Session::new();
		repo.create_session(&anonymous).await.unwrap();

		let authed = repo
			.set_session_user(&anonymous.id, &user_id, &org_id, "acme")
			.await
			.unwrap();

		assert_ne!(authed.id, anonymous.id);
		assert_eq!(authed.user_id, Some(user_id));
		assert_eq!(authed.org_slug.as_deref(), Some("acme"));

		// The pre-login ID no longer names any session.
		assert!(repo.get_session(&anonymous.id).await.unwrap().is_none());
		assert!(repo.get_session(&authed.id).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn login_preserves_return_to_but_not_oauth_state() {
		let pool = create_test_pool().await;
		let (org_id, user_id) = seed_user(&pool).await;
		let repo = SessionRepository::new(pool);

		let mut anonymous = Session::new();
		anonymous.return_to = Some("/checkins".to_string());
		anonymous.oauth_state = Some("nonce123".to_string());
		repo.create_session(&anonymous).await.unwrap();

		let authed = repo
			.set_session_user(&anonymous.id, &user_id, &org_id, "acme")
			.await
			.unwrap();

		assert_eq!(authed.return_to.as_deref(), Some("/checkins"));
		assert!(authed.oauth_state.is_none());
	}

	#[tokio::test]
	async fn oauth_state_is_single_use() {
		let repo = SessionRepository::new(create_test_pool().await);
		let session = Session::new();
		repo.create_session(&session).await.unwrap();

		repo.set_oauth_state(&session.id, "nonce-1").await.unwrap();
		assert_eq!(
			repo.take_oauth_state(&session.id).await.unwrap().as_deref(),
			Some("nonce-1")
		);
		assert!(repo.take_oauth_state(&session.id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn clear_session_destroys_record() {
		let repo = SessionRepository::new(create_test_pool().await);
		let session = Session::new();
		repo.create_session(&session).await.unwrap();

		assert!(repo.clear_session(&session.id).await.unwrap());
		assert!(repo.get_session(&session.id).await.unwrap().is_none());
		assert!(!repo.clear_session(&session.id).await.unwrap());
	}

	#[tokio::test]
	async fn sweep_removes_only_expired() {
		let repo = SessionRepository::new(create_test_pool().await);

		let mut stale = Session::new();
		stale.expires_at = Utc::now() - Duration::days(1);
		repo.create_session(&stale).await.unwrap();

		let fresh = Session::new();
		repo.create_session(&fresh).await.unwrap();

		assert_eq!(repo.delete_expired_sessions().await.unwrap(), 1);
		assert!(repo.get_session(&fresh.id).await.unwrap().is_some());
	}
}
