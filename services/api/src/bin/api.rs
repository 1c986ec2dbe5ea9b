//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{FsBlobStore, DbAdapter, OpenAiCompletionAdapter},
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, me_handler, signup_handler},
        documents::{
            analyze_document_handler, delete_document_handler, download_document_handler,
            get_blob_handler, list_ai_tasks_handler, list_documents_handler,
            update_ai_task_handler, upload_documents_handler,
        },
        realtime::ChangeHub,
        require_auth,
        rest::ApiDoc,
        state::AppState,
        tasks::{
            actions_handler, analyze_task_handler, analyze_text_handler, create_task_handler,
            delete_task_handler, list_tasks_handler, update_task_handler,
        },
        ws_handler,
    },
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use study_planner_core::analysis::TaskAnalyzer;
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
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let api_key = config.ai_api_key.as_deref().ok_or_else(|| {
        ApiError::Internal("GEMINI_API_KEY or OPENAI_API_KEY is required".to_string())
    })?;
    let completion_adapter = Arc::new(OpenAiCompletionAdapter::new(
        OpenAiCompletionAdapter::client_for(api_key, &config.ai_api_base),
        config.analysis_model.clone(),
    ));
    info!(model = %config.analysis_model, "Analysis model configured");

    let blob_store = Arc::new(FsBlobStore::new(
        config.blob_root.clone(),
        config.public_base_url.clone(),
    ));
    blob_store.ensure_root().await?;
    info!(root = %config.blob_root.display(), "Blob storage ready");

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        blobs: blob_store,
        analyzer: TaskAnalyzer::new(completion_adapter),
        config: config.clone(),
        changes: ChangeHub::default(),
    });

    // --- 5. CORS for the browser client (cookies need an explicit origin) ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/actions", post(actions_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/me", get(me_handler))
        .route("/tasks", get(list_tasks_handler).post(create_task_handler))
        .route(
            "/tasks/{id}",
            patch(update_task_handler).delete(delete_task_handler),
        )
        .route("/tasks/{id}/analysis", post(analyze_task_handler))
        .route("/analysis", post(analyze_text_handler))
        .route(
            "/documents",
            get(list_documents_handler).post(upload_documents_handler),
        )
        .route("/documents/{id}", axum::routing::delete(delete_document_handler))
        .route("/documents/{id}/content", get(download_document_handler))
        .route("/documents/{id}/analysis", post(analyze_document_handler))
        .route("/ai-tasks", get(list_ai_tasks_handler))
        .route("/ai-tasks/{id}", patch(update_ai_task_handler))
        .route("/blobs/{*key}", get(get_blob_handler))
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
