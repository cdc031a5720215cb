use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use storefront_server::{
    audit_middleware,
    auth::require_session,
    cli::{Cli, Commands},
    config::ServerConfig,
    handlers::{auth_action, health_check, me},
    state::ServerState,
    storage::{
        AuditStore, PostgresAuditStore, PostgresSessionStore, PostgresUserStore, SessionStore,
        UserStore,
    },
    AuditMiddlewareState,
};
use tokio::time;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = ServerConfig::from_env()?;

    // Connect to database
    let pool = PgPoolOptions::new()
        .max_connections(config.max_db_connections)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_seconds))
        .connect(&config.database_url)
        .await?;

    // Initialize storage layers
    let user_store = PostgresUserStore::new(pool.clone());
    user_store.initialize().await?;

    let session_store = PostgresSessionStore::new(pool.clone());
    session_store.initialize().await?;

    let audit_store = PostgresAuditStore::new(pool.clone());
    audit_store.initialize().await?;

    // Handle CLI commands
    match cli.command {
        Some(Commands::User(cmd)) => {
            return cmd.execute(pool).await.map_err(|e| e.into());
        }
        Some(Commands::Audit { limit, user }) => {
            let entries = if let Some(email) = user {
                let user = user_store.get_user_by_email(&email).await?;
                audit_store.for_user(user.id, limit).await?
            } else {
                audit_store.recent(limit).await?
            };

            println!(
                "{:<20} {:<30} {:<18} {:<16} {:<8}",
                "Timestamp", "User", "Action", "IP", "Success"
            );
            println!("{}", "-".repeat(94));

            for entry in entries {
                println!(
                    "{:<20} {:<30} {:<18} {:<16} {:<8}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.user_email.as_deref().unwrap_or("-"),
                    entry.action.as_str(),
                    entry.ip_address.as_deref().unwrap_or("-"),
                    if entry.success { "Yes" } else { "No" }
                );
            }

            return Ok(());
        }
        Some(Commands::Serve) | None => {
            // Continue to run server
        }
    }

    // Server mode
    info!("🚀 Starting Storefront Server v{}", VERSION);
    info!("📋 Configuration loaded:");
    info!("   Port: {}", config.port);
    info!("   Bind address: {}", config.bind_addr);
    info!("   Session TTL: {}h", config.session_ttl_hours);
    info!("   Sliding sessions: {}", config.sliding_sessions);
    info!(
        "   Login rate limit: {} failures / {}s",
        config.login_max_failures, config.login_window_seconds
    );
    info!("✅ Database connected and schema initialized");

    // Create server state
    let state = Arc::new(ServerState::new(
        config.clone(),
        Arc::new(user_store),
        Arc::new(session_store),
        pool.clone(),
    ));

    // Create audit middleware state
    let audit_middleware_state = AuditMiddlewareState {
        audit_store: Arc::new(audit_store),
    };

    // Spawn background task to sweep expired sessions
    {
        let session_store = state.session_store.clone();
        let sweep_interval = config.session_sweep_interval_seconds;
        tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(sweep_interval));
            loop {
                interval.tick().await;
                match session_store.delete_expired().await {
                    Ok(0) => {}
                    Ok(removed) => info!("Swept {} expired sessions", removed),
                    Err(e) => warn!("Expired-session sweep failed: {}", e),
                }
            }
        });
    }

    // Spawn background task to cleanup rate limiter entries
    {
        let rate_limiter = state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(120));
            loop {
                interval.tick().await;
                let cleaned = rate_limiter.cleanup();
                if cleaned > 0 {
                    info!("Cleaned up {} rate limiter entries", cleaned);
                }
            }
        });
    }

    // Build router
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/auth", post(auth_action));

    let protected_routes = Router::new()
        .route("/api/admin/me", get(me))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    // CORS configuration - configurable via CORS_ORIGINS env var
    let cors_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    info!("   CORS origins: {:?}", config.cors_origins);
    let cors = CorsLayer::new()
        .allow_origin(cors_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true);

    // SECURITY: Limit request body size to prevent DoS
    const MAX_API_BODY_SIZE: usize = 1024 * 1024; // 1MB

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(
            audit_middleware_state,
            audit_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(MAX_API_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state.clone());

    // Start server
    let addr: SocketAddr = config.bind_address().parse()?;
    info!("🎧 Listening on http://{}", addr);
    info!("🔑 Health endpoint: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
