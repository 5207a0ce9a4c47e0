// src/routes.rs

use axum::{
    Router,
    http::{HeaderName, Method},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{admin, health, paths},
    state::AppState,
    utils::{
        api_key::{ADMIN_API_KEY_HEADER, admin_key_middleware},
        device_id::DEVICE_ID_HEADER,
    },
};

/// Assembles the main application router.
///
/// * Public path routes (browse, progress, completion).
/// * Admin catalog routes guarded by the API key middleware.
/// * Global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            HeaderName::from_static(DEVICE_ID_HEADER),
            HeaderName::from_static(ADMIN_API_KEY_HEADER),
        ]);

    let admin_routes = Router::new()
        .route("/paths", post(admin::create_path))
        .route(
            "/paths/{id}",
            put(admin::update_path).delete(admin::delete_path),
        )
        .route("/categories", post(admin::create_category))
        .route(
            "/categories/{id}",
            put(admin::update_category).delete(admin::delete_category),
        )
        .route("/nodes", post(admin::create_node))
        .route(
            "/nodes/{id}",
            put(admin::update_node).delete(admin::delete_node),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_key_middleware,
        ));

    let path_routes = Router::new()
        .route("/", get(paths::list_paths))
        .route("/{id}", get(paths::get_path))
        .route("/{id}/progress", get(paths::get_path_progress))
        .route("/tech/{tech_stack}", get(paths::get_path_by_tech_stack))
        .route(
            "/categories/{category_id}/nodes",
            get(paths::list_category_nodes),
        )
        .route("/nodes/{node_id}/complete", post(paths::complete_node))
        .nest("/admin", admin_routes);

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/paths", path_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
