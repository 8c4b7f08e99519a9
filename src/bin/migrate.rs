use anyhow::Context;
use furniture_store_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let config = AppConfig::for_database(database_url);
    let pool = create_pool(&config.database_url, 1).await?;
    let orm = create_orm_conn(&pool);
    run_migrations(&orm).await?;
    println!("Migrations applied");
    Ok(())
}
