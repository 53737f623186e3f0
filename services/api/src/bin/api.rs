//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{CdnSigner, ClerkAdapter, DbAdapter, S3Adapter},
    config::Config,
    error::ApiError,
    web::{
        middleware::require_auth,
        rest::{
            confirm_book_handler, get_book_handler, list_books_handler, me_handler,
            update_progress_handler, upload_url_handler, ApiDoc,
        },
        state::AppState,
    },
};
use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let public_key_pem = std::fs::read(&config.identity_public_key_path)?;
    let identity = Arc::new(ClerkAdapter::new(
        &public_key_pem,
        config.identity_api_url.clone(),
        config.identity_secret_key.clone(),
    )?);

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let objects = Arc::new(S3Adapter::new(
        aws_sdk_s3::Client::new(&aws_config),
        config.bucket_name.clone(),
    ));

    let signing_key = CdnSigner::load_private_key(&config.private_key_path)?;
    let read_signer = Arc::new(CdnSigner::new(
        config.cdn_origin.clone(),
        config.key_pair_id.clone(),
        signing_key,
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = AppState {
        config: config.clone(),
        identity,
        users: db_adapter.clone(),
        library: db_adapter,
        objects,
        read_signer,
    };

    // --- 5. Create the Web Router ---
    // Every route requires a verified credential; the middleware binds the
    // resolved identity and local user to the request.
    let api_router = Router::new()
        .route("/me", get(me_handler))
        .route("/upload-book", post(upload_url_handler))
        .route("/books", post(confirm_book_handler).get(list_books_handler))
        .route("/books/{book_id}", get(get_book_handler))
        .route(
            "/books/{book_id}/reading-progress",
            patch(update_progress_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // In-flight requests have drained; the pool drops here.
    info!("Server stopped.");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM, at which point axum stops accepting new
/// connections and lets in-flight requests finish.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received.");
}
