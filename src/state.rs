//! Shared application state handed to every handler.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::LoanSettings, db::DbPool};

#[derive(Debug, Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub settings: Arc<LoanSettings>,
}

impl AppState {
    pub fn new(pool: DbPool, settings: LoanSettings) -> Self {
        Self {
            pool,
            settings: Arc::new(settings),
        }
    }
}

impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Arc<LoanSettings> {
    fn from_ref(state: &AppState) -> Self {
        state.settings.clone()
    }
}
