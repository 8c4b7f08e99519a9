use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn, create_orm_conn, create_pool},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn connect(config: AppConfig) -> anyhow::Result<Self> {
        let pool = create_pool(&config.database_url, config.max_connections).await?;
        let orm = create_orm_conn(&pool);
        Ok(Self {
            pool,
            orm,
            config: Arc::new(config),
        })
    }
}
