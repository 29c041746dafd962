// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pulse server binary.

use clap::{Parser, Subcommand};
use pulse_server::{create_app_state, create_router};
use pulse_server_auth::gate::RuntimeEnvironment;
use std::time::Duration;
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pulse server - authentication and tenant resolution for Pulse.
#[derive(Parser, Debug)]
#[command(name = "pulse-server", about = "Pulse authentication server", version)]
struct Args {
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version information
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("pulse-server {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	// Load .env file if present
	dotenvy::dotenv().ok();

	// Load configuration; this also runs the backdoor posture scan.
	let config = pulse_server_config::load_config_from_env()?;

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	tracing::info!(
			host = %config.http.host,
			port = config.http.port,
			database = %config.database.url,
			"starting pulse-server"
	);

	let pool = pulse_server_db::create_pool(&config.database.url).await?;
	pulse_server_db::run_migrations(&pool).await?;

	let state = create_app_state(pool.clone(), &config);

	// The default org must exist before the first request resolves it.
	let default_org = state.org_repo.ensure_default_org().await?;
	tracing::debug!(org_id = %default_org.id, "default organization ready");

	// In development the designated backdoor admin is provisioned eagerly
	// so the first backdoor request does not race account creation. Other
	// environments never auto-create.
	if state.security.environment == RuntimeEnvironment::Development {
		if let Some(backdoor) = &state.security.backdoor {
			let admin = state
				.user_repo
				.ensure_backdoor_admin(
					&backdoor.admin_username,
					&backdoor.admin_email,
					&backdoor.admin_display_name,
				)
				.await?;
			tracing::info!(user_id = %admin.id, "backdoor admin identity ready");
		}
	}

	// Periodic sweep of expired sessions.
	let sweep_repo = state.session_repo.clone();
	tokio::spawn(async move {
		let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));
		loop {
			interval.tick().await;
			match sweep_repo.delete_expired_sessions().await {
				Ok(0) => {}
				Ok(deleted) => tracing::debug!(deleted, "swept expired sessions"),
				Err(e) => tracing::warn!(error = %e, "expired session sweep failed"),
			}
		}
	});

	let app = create_router(state)
		.layer(TraceLayer::new_for_http())
		.layer(
			CorsLayer::new()
				.allow_origin(Any)
				.allow_methods(Any)
				.allow_headers(Any),
		);

	let addr = config.http.socket_addr();
	tracing::info!("listening on {}", addr);

	let listener = tokio::net::TcpListener::bind(&addr).await?;

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	tracing::info!("Server shutdown complete");
	Ok(())
}
