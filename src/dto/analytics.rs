use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{Order, Product};

#[derive(Debug, Serialize, ToSchema)]
pub struct TopSellingProduct {
    #[serde(flatten)]
    pub product: Product,
    pub total_sold: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyticsSnapshot {
    pub total_products: i64,
    pub total_orders: i64,
    pub total_customers: i64,
    #[schema(value_type = String, example = "12500.00")]
    pub total_revenue: Decimal,
    /// Whether cancelled orders are part of `total_revenue`.
    pub revenue_includes_cancelled: bool,
    pub top_selling_products: Vec<TopSellingProduct>,
    pub recent_orders: Vec<Order>,
}
