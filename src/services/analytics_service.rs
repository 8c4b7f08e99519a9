use std::collections::HashMap;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    config::RevenueScope,
    db::DbPool,
    dto::analytics::{AnalyticsSnapshot, TopSellingProduct},
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        products::{Column as ProductCol, Entity as Products},
    },
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Meta},
    services::{order_service, product_service},
    state::AppState,
};

#[derive(Debug, FromRow)]
struct SoldRow {
    product_id: Uuid,
    total_sold: i64,
}

/// Read-only dashboard snapshot. Admin only.
pub async fn snapshot(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AnalyticsSnapshot>> {
    ensure_admin(user)?;

    let (total_products, total_orders, total_customers): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT (SELECT COUNT(*) FROM products),
               (SELECT COUNT(*) FROM orders),
               (SELECT COUNT(*) FROM customers)
        "#,
    )
    .fetch_one(&state.pool)
    .await?;

    let include_cancelled = state.config.revenue_scope == RevenueScope::All;
    let total_revenue = total_revenue(&state.pool, include_cancelled).await?;

    let ranked = top_sold_quantities(&state.pool, state.config.top_selling_limit).await?;
    let top_selling_products = top_selling(state, ranked).await?;

    let recent = Orders::find()
        .order_by_desc(OrderCol::CreatedAt)
        .order_by_desc(OrderCol::Id)
        .limit(state.config.recent_orders_limit)
        .all(&state.orm)
        .await?;
    let recent_orders = order_service::to_orders(&state.orm, recent).await?;

    tracing::debug!(
        total_products,
        total_orders,
        total_customers,
        %total_revenue,
        "analytics snapshot computed"
    );

    Ok(ApiResponse::success(
        "Analytics",
        AnalyticsSnapshot {
            total_products,
            total_orders,
            total_customers,
            total_revenue,
            revenue_includes_cancelled: include_cancelled,
            top_selling_products,
            recent_orders,
        },
        Some(Meta::empty()),
    ))
}

async fn total_revenue(pool: &DbPool, include_cancelled: bool) -> AppResult<Decimal> {
    let (revenue,): (Decimal,) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(total_price), 0)
        FROM orders
        WHERE $1 OR status <> 'cancelled'
        "#,
    )
    .bind(include_cancelled)
    .fetch_one(pool)
    .await?;
    Ok(revenue)
}

/// Highest quantity first; equal quantities by ascending product id.
async fn top_sold_quantities(pool: &DbPool, limit: u64) -> AppResult<Vec<SoldRow>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = sqlx::query_as::<_, SoldRow>(
        r#"
        SELECT product_id, SUM(quantity)::BIGINT AS total_sold
        FROM order_items
        GROUP BY product_id
        ORDER BY total_sold DESC, product_id ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn top_selling(state: &AppState, ranked: Vec<SoldRow>) -> AppResult<Vec<TopSellingProduct>> {
    if ranked.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = ranked.iter().map(|row| row.product_id).collect();
    let models = Products::find()
        .filter(ProductCol::Id.is_in(ids))
        .all(&state.orm)
        .await?;
    let mut products: HashMap<Uuid, _> = product_service::to_products(&state.orm, models)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    Ok(ranked
        .into_iter()
        .filter_map(|row| {
            products.remove(&row.product_id).map(|product| TopSellingProduct {
                product,
                total_sold: row.total_sold,
            })
        })
        .collect())
}
