mod auth;
mod config;
mod db;
mod docs;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
mod store;
mod ws;

use axum::http::HeaderValue;
use axum::{routing::get, Router};
use std::panic;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::Config;
use db::dbdocs::DbDocs;
use docs::ApiDoc;
use routes::create_api_routes;
use state::AppState;
use store::{DocumentStore, PermissionStore};
use ws::registry::RoomRegistry;

#[tokio::main]
async fn main() {

    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Default to info level, but allow debug for our app
            "coedit_doc=debug,tower_http=debug,axum::rejection=trace,info".into()
        }))
        .init();

    info!("Starting server...");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });

    // Connect the document and permission stores
    let db_url = config.db_url.clone().unwrap_or_else(|| {
        error!("No database URL configured - set DB_URL");
        std::process::exit(1);
    });
    let db = match DbDocs::new(&db_url).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };
    info!("Database initialized successfully");

    // One room registry for the lifetime of the process, handed to the
    // connection acceptor through the shared state.
    let registry = Arc::new(RoomRegistry::new());

    let documents: Arc<dyn DocumentStore> = db.clone();
    let permissions: Arc<dyn PermissionStore> = db;
    let state = Arc::new(AppState {
        config: config.clone(),
        registry,
        documents,
        permissions,
    });

    // Create API routes
    let api_routes = create_api_routes(state.clone());

    // WebSocket endpoint for live document collaboration
    let ws_routes = Router::new()
        .route("/ws/document/:doc_id/", get(ws::handler::websocket_handler))
        .with_state(state.clone());

    // Combine all routes
    let mut app_routes = Router::new()
        // Mount API routes
        .nest("/api", api_routes)
        // Mount WebSocket routes
        .merge(ws_routes)
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add tracing layer
        .layer(TraceLayer::new_for_http());

    // Restrict CORS when origins are configured
    if let Some(origins) = &config.cors_origins {
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();
        app_routes = app_routes.layer(CorsLayer::new().allow_origin(AllowOrigin::list(origins)));
    }

    // Start the server
    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", config.server_address()));

    info!("🚀 Server running on http://{}", config.server_address());
    info!("📡 WebSocket available at ws://{}/ws/document/{{doc_id}}/", config.server_address());
    info!("📚 Swagger UI available at http://{}/swagger", config.server_address());

    axum::serve(listener, app_routes)
        .await
        .expect("Server failed to start");
}
