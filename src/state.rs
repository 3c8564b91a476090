use crate::clock::{Clock, SharedClock};
use crate::config::AppConfig;
use crate::db::DbPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub clock: SharedClock,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pool: DbPool, clock: SharedClock, config: AppConfig) -> Self {
        AppState {
            pool,
            clock,
            config: Arc::new(config),
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

