use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use taskhub_api::config::Config;
use taskhub_api::rate_limit::RateLimiter;
use taskhub_api::state::AppState;
use taskhub_api::token::TokenService;
use taskhub_api::{db, routes};

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let db = db::connect(&config.database_url)
        .await
        .expect("Error connecting DB");

    let state = AppState {
        db,
        tokens: Arc::new(TokenService::new(&config.jwt_secret)),
        limiter: RateLimiter::new(),
    };

    let app = routes::routes(state);

    let listener = tokio::net::TcpListener::bind(config.addr()).await.unwrap();

    info!("server is chilling at http://{}", config.addr());

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
