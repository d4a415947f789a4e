//! Tournament portal HTTP server.
//!
//! Serves the JSON API over a PostgreSQL-backed [`tourney_portal`] library.

use std::{net::SocketAddr, time::Duration};

use anyhow::{Context, Error};
use pico_args::Arguments;
use tourney_portal::{
    auth::{AdminRole, AuthError, NewAdmin},
    db::Database,
};
use tp_server::{
    api::{self, AppState},
    config::ServerConfig,
    logging, metrics,
};

const HELP: &str = "\
Run the tournament portal API server

USAGE:
  tp_server [OPTIONS]

OPTIONS:
  --bind              IP:PORT   Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url            URL       Database connection string  [default: env DATABASE_URL]
  --bootstrap-admin   EMAIL     Create a super admin (password from BOOTSTRAP_ADMIN_PASSWORD) and continue

FLAGS:
  --migrate                     Run database migrations before serving
  -h, --help                    Print help information

ENVIRONMENT:
  SERVER_BIND                   Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL                  PostgreSQL connection string
  SESSION_SECRET                Session token signing secret (>= 32 chars)
  PASSWORD_PEPPER               Password hashing pepper (>= 16 chars)
  COOKIE_SECURE                 Set the Secure attribute on session cookies
  METRICS_BIND                  Prometheus exporter address (optional)
  (See .env.example for all configuration options)
";

/// How often stale rate limiter records are dropped
const PRUNE_INTERVAL: Duration = Duration::from_secs(300);

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    migrate: bool,
    bootstrap_admin: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        migrate: pargs.contains("--migrate"),
        bootstrap_admin: pargs.opt_value_from_str("--bootstrap-admin")?,
    };
    let remaining = pargs.finish();
    if !remaining.is_empty() {
        anyhow::bail!("Unexpected arguments: {:?}", remaining);
    }

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url)?;
    tracing::info!("Starting tournament portal server at {}", config.bind);

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(anyhow::Error::msg)?;
        tracing::info!("Prometheus metrics exported at http://{}/metrics", addr);
    }

    let db = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected successfully");

    if args.migrate {
        db.migrate().await.context("Failed to run migrations")?;
        tracing::info!("Database migrations applied");
    }

    let state = AppState::new(
        db.pool().clone(),
        config.security.password_pepper.clone(),
        config.security.session_secret.clone(),
        config.security.cookie_secure,
    )
    .with_trusted_proxies(config.security.trusted_proxies.clone());

    if let Some(email) = args.bootstrap_admin {
        bootstrap_admin(&state, email).await?;
    }

    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            let pruned = limiter.prune().await;
            if pruned > 0 {
                tracing::debug!(pruned, "Pruned rate limiter records");
            }
        }
    });

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    tracing::info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    tracing::info!("Shutting down server...");
    db.close().await;

    Ok(())
}

/// Create the first super admin; an existing account is left alone
async fn bootstrap_admin(state: &AppState, email: String) -> Result<(), Error> {
    let password = std::env::var("BOOTSTRAP_ADMIN_PASSWORD")
        .context("--bootstrap-admin requires BOOTSTRAP_ADMIN_PASSWORD")?;

    let request = NewAdmin {
        email: email.clone(),
        password,
        name: "Administrator".to_string(),
        role: AdminRole::SuperAdmin,
    };
    match state.auth_manager.create_admin(None, request).await {
        Ok(admin) => tracing::info!("Created super admin {} (ID {})", admin.email, admin.id),
        Err(AuthError::EmailTaken) => {
            tracing::info!("Admin {} already exists, skipping bootstrap", email)
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
