use anyhow::Context;
use furniture_store_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    services::auth_service::hash_password,
};
use rust_decimal::Decimal;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let config = AppConfig::for_database(database_url);

    let pool = create_pool(&config.database_url, 2).await?;
    // Ensure migrations are applied.
    run_migrations(&create_orm_conn(&pool)).await?;

    let admin_id = ensure_account(&pool, "admin", "admin@example.com", "admin12345", "admin").await?;
    let user_id = ensure_account(&pool, "anna", "anna@example.com", "anna12345", "user").await?;
    ensure_customer(&pool, user_id, "Anna Nowak", "anna@example.com", "Warsaw", "Poland").await?;
    seed_catalog(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_account(
    pool: &sqlx::PgPool,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (username) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE username = $1")
                .bind(username)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured account {username} (role={role})");
    Ok(user_id)
}

async fn ensure_customer(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    full_name: &str,
    email: &str,
    city: &str,
    country: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO customers (id, user_id, full_name, email, city, country)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(full_name)
    .bind(email)
    .bind(city)
    .bind(country)
    .execute(pool)
    .await?;
    Ok(())
}

async fn ensure_category(pool: &sqlx::PgPool, name: &str, description: &str) -> anyhow::Result<Uuid> {
    sqlx::query("INSERT INTO categories (id, name, description) VALUES ($1, $2, $3) ON CONFLICT (name) DO NOTHING")
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .execute(pool)
        .await?;

    let (id,): (Uuid,) = sqlx::query_as("SELECT id FROM categories WHERE name = $1")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let living = ensure_category(pool, "Living Room", "Sofas, armchairs and coffee tables").await?;
    let bedroom = ensure_category(pool, "Bedroom", "Beds, wardrobes and nightstands").await?;
    let dining = ensure_category(pool, "Dining", "Dining tables and chairs").await?;

    // (category, name, price in cents, stock, material, color, dimensions, featured)
    let products = [
        (living, "Oslo three-seat sofa", 129900, 8, "Linen", "Grey", "220x90x85 cm", true),
        (living, "Walnut coffee table", 34950, 15, "Walnut", "Brown", "120x60x45 cm", false),
        (living, "Rattan armchair", 21900, 0, "Rattan", "Natural", "75x80x90 cm", false),
        (bedroom, "Oak double bed", 89900, 5, "Oak", "Natural", "160x200 cm", true),
        (bedroom, "Pine nightstand", 7990, 30, "Pine", "White", "45x40x55 cm", false),
        (dining, "Extendable dining table", 64900, 6, "Ash", "Black", "180-240x90x75 cm", true),
        (dining, "Bentwood dining chair", 12900, 48, "Beech", "Black", "45x52x82 cm", false),
    ];

    for (category_id, name, cents, stock, material, color, dimensions, featured) in products {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, name, price, stock, category_id, material, color, dimensions, is_featured)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(Decimal::new(cents, 2))
        .bind(stock)
        .bind(category_id)
        .bind(material)
        .bind(color)
        .bind(dimensions)
        .bind(featured)
        .execute(pool)
        .await?;
    }

    println!("Seeded catalog");
    Ok(())
}
