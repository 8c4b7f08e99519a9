use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[schema(value_type = String, example = "499.90")]
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub image: Option<String>,
    #[serde(alias = "category")]
    pub category_id: Uuid,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub dimensions: String,
    #[serde(default)]
    pub is_featured: bool,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub image: Option<String>,
    #[serde(alias = "category")]
    pub category_id: Option<Uuid>,
    pub material: Option<String>,
    pub color: Option<String>,
    pub dimensions: Option<String>,
    pub is_featured: Option<bool>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}
