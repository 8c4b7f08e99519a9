use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Order;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    #[serde(alias = "product")]
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    #[serde(alias = "customer")]
    pub customer_id: Uuid,
    /// Stored as given; not cross-checked against the item subtotals.
    #[schema(value_type = String, example = "250.00")]
    pub total_price: Decimal,
    /// Defaults to `pending`.
    pub status: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    #[serde(alias = "customer")]
    pub customer_id: Option<Uuid>,
    #[schema(value_type = Option<String>)]
    pub total_price: Option<Decimal>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateOrderItemRequest {
    #[serde(alias = "product")]
    pub product_id: Option<Uuid>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<Order>)]
    pub items: Vec<Order>,
}
