// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database layer for the Pulse server.
//!
//! SQLite via sqlx, one repository per aggregate, each behind a `Store`
//! trait so the middleware can be tested against fakes. UUIDs are stored as
//! strings, timestamps as RFC 3339 text.

pub mod error;
pub mod org;
pub mod pool;
pub mod session;
pub mod team;
pub mod testing;
pub mod user;

pub use error::{DbError, Result};
pub use org::{OrgRepository, OrgStore};
pub use pool::{create_pool, run_migrations};
pub use session::{SessionRepository, SessionStore};
pub use team::{TeamRepository, TeamStore};
pub use user::{UserRepository, UserStore};
