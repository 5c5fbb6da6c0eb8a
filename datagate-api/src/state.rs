//! Shared application state for request handlers.

use std::sync::Arc;
use std::time::Instant;

use datagate_engine::StrategyEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<StrategyEngine>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: Arc<StrategyEngine>) -> Self {
        Self {
            engine,
            start_time: Instant::now(),
        }
    }
}
