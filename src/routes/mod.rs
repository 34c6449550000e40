use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;

pub mod auth;
mod health;
pub mod middleware_auth;
pub mod tasks;

pub use health::health;

use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    let task_router = Router::new()
        .route("/", post(tasks::routes::create).get(tasks::routes::list))
        .route(
            "/{id}",
            patch(tasks::routes::update).delete(tasks::routes::delete),
        );

    let auth_router = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::limit_credential_requests,
        ));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/auth", auth_router)
        .nest(
            "/api",
            Router::new()
                .route("/me", get(auth::me))
                .nest("/tasks", task_router)
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    middleware_auth::require_auth,
                )),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "Welcome to the TaskHub API"
}
