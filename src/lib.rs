use std::sync::Arc;

use config::Config;
use gateway::Gateway;
use middleware::RateLimiter;

pub mod cache;
pub mod clients;
pub mod config;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod resilience;
pub mod router;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub gateway: Arc<Gateway>,
    pub rate_limiter: Arc<RateLimiter>,
}
