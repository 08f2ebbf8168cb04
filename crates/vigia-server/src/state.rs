use crate::config::ServerConfig;
use crate::rate_limit::RateLimitStore;
use crate::scheduler::AlertPipeline;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use vigia_notify::dispatch::DispatchOrchestrator;
use vigia_storage::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub pipeline: Arc<AlertPipeline>,
    pub orchestrator: Arc<DispatchOrchestrator>,
    pub rate_limiter: Arc<dyn RateLimitStore>,
    pub jwt_secret: Arc<String>,
    pub token_expire_secs: u64,
    pub trigger_token: Arc<String>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}
