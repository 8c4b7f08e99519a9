#![allow(dead_code)]

use furniture_store_api::{
    config::AppConfig,
    db::run_migrations,
    entity::{
        categories::{ActiveModel as CategoryActive, Model as CategoryModel},
        customers::{ActiveModel as CustomerActive, Model as CustomerModel},
        products::{ActiveModel as ProductActive, Model as ProductModel},
        users::ActiveModel as UserActive,
    },
    middleware::auth::AuthUser,
    state::AppState,
};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

/// Connects to the test database, or returns `None` so the caller can skip.
pub async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(None);
        }
    };

    let state = AppState::connect(AppConfig::for_database(database_url)).await?;
    run_migrations(&state.orm).await?;
    Ok(Some(state))
}

pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

pub async fn create_user(state: &AppState, role: &str) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(unique(role)),
        email: Set(format!("{}@example.com", unique(role))),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

pub async fn create_category(state: &AppState) -> anyhow::Result<CategoryModel> {
    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(unique("category")),
        description: Set(None),
        image: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(category)
}

pub async fn create_product(
    state: &AppState,
    category: &CategoryModel,
    price: Decimal,
    stock: i32,
) -> anyhow::Result<ProductModel> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(unique("product")),
        description: Set(String::new()),
        price: Set(price),
        stock: Set(stock),
        image: Set(None),
        category_id: Set(category.id),
        material: Set("Oak".into()),
        color: Set("Natural".into()),
        dimensions: Set("100x50x75 cm".into()),
        is_featured: Set(false),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product)
}

pub async fn create_customer(state: &AppState) -> anyhow::Result<CustomerModel> {
    let customer = CustomerActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(None),
        full_name: Set("Test Customer".into()),
        email: Set(format!("{}@example.com", unique("customer"))),
        phone: Set(String::new()),
        address: Set(String::new()),
        city: Set("Lisbon".into()),
        country: Set("Portugal".into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(customer)
}

/// Cents to a two-decimal amount.
pub fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}
