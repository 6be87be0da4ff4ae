//! # Passkey Relying Party Server
//!
//! Entry point: loads configuration, opens the credential database and serves
//! the WebAuthn ceremony endpoints.

use axum::http::{header, HeaderValue, Method};
use passkey_rp::{handlers, state::AppState, Config};
use time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main application entry point
///
/// 1. Sets up logging
/// 2. Loads and validates configuration from environment variables
/// 3. Initializes the credential database and the relying party
/// 4. Starts a background task to drop expired ceremony challenges
/// 5. Configures HTTP sessions, CORS and request tracing
/// 6. Starts the HTTP server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default: info level for most crates, debug level for this one.
    // Can be overridden with RUST_LOG.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,passkey_rp=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded: {:?}", config);

    let (app_state, db) = AppState::new(&config).await?;
    tracing::info!("Application state initialized");

    // Challenges are only valid for the ceremony TTL; abandoned ones are
    // swept every 10 minutes.
    let challenges = app_state.relying_party.challenges().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(600));
        loop {
            interval.tick().await;
            let purged = challenges.purge_expired().await;
            tracing::debug!(purged, "Expired challenge cleanup");
        }
    });

    // The session cookie carries the ceremony token and the credential
    // registered in this session; session data lives in SQLite.
    let session_store = SqliteStore::new(db);
    session_store.migrate().await?;
    let session_layer = SessionManagerLayer::new(session_store)
        .with_expiry(Expiry::OnInactivity(Duration::days(config.session_ttl_days)));

    // Only the relying party origin may call the API, with cookies.
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_str(&config.rp.origin)?)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let app = handlers::routes(app_state)
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let bind_addr = config.bind_address();
    tracing::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
