use std::sync::Arc;

use crate::{
    config::Config,
    engine::{PathEngine, policy::UnlockPolicy},
    services::PathService,
    store::{CatalogStore, ProgressLedger, SqliteStore},
};
use axum::extract::FromRef;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub paths: Arc<PathService>,
}

impl AppState {
    /// Wires the SQLite store, the unlock engine and the path service from config.
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let store = SqliteStore::new(pool.clone());
        let catalog: Arc<dyn CatalogStore> = Arc::new(store.clone());
        let ledger: Arc<dyn ProgressLedger> = Arc::new(store);

        let policy = UnlockPolicy::new(config.unlock_mode, config.unlock_min_accuracy);
        let engine = PathEngine::new(catalog.clone(), ledger, policy);
        let paths = Arc::new(PathService::new(engine, catalog, config.max_prerequisites));

        Self { pool, config, paths }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<PathService> {
    fn from_ref(state: &AppState) -> Self {
        state.paths.clone()
    }
}
