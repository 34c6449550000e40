use crate::rate_limit::RateLimiter;
use crate::token::TokenService;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub tokens: Arc<TokenService>,
    pub limiter: RateLimiter,
}
