use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        analytics::{AnalyticsSnapshot, TopSellingProduct},
        auth::{
            AccessToken, RefreshRequest, RegisterCustomer, RegisterRequest, RegisterResponse,
            TokenPair, TokenRequest,
        },
        categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
        customers::{CreateCustomerRequest, CustomerList, UpdateCustomerRequest},
        orders::{
            CreateOrderRequest, OrderLineRequest, OrderList, UpdateOrderItemRequest,
            UpdateOrderRequest, UpdateOrderStatusRequest,
        },
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        reviews::{CreateReviewRequest, ReviewList, UpdateReviewRequest},
    },
    entity::orders::OrderStatus,
    error::ErrorData,
    models::{Category, Customer, Order, OrderItem, Product, ProductDetail, Review, User},
    response::{ApiResponse, Meta},
    routes::{analytics, auth, categories, customers, health, orders, params, products, reviews},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::obtain_token,
        auth::refresh_token,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        products::list_products,
        products::list_featured,
        products::get_product,
        products::list_product_reviews,
        products::create_product,
        products::update_product,
        products::delete_product,
        customers::list_customers,
        customers::get_customer,
        customers::list_customer_orders,
        customers::create_customer,
        customers::update_customer,
        customers::delete_customer,
        orders::list_orders,
        orders::get_order,
        orders::create_order,
        orders::update_order,
        orders::update_order_status,
        orders::update_order_item,
        orders::delete_order,
        reviews::list_reviews,
        reviews::get_review,
        reviews::create_review,
        reviews::update_review,
        reviews::delete_review,
        analytics::analytics
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            ProductDetail,
            Customer,
            Order,
            OrderItem,
            OrderStatus,
            Review,
            RegisterCustomer,
            RegisterRequest,
            RegisterResponse,
            TokenRequest,
            RefreshRequest,
            TokenPair,
            AccessToken,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CategoryList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CreateCustomerRequest,
            UpdateCustomerRequest,
            CustomerList,
            OrderLineRequest,
            CreateOrderRequest,
            UpdateOrderRequest,
            UpdateOrderStatusRequest,
            UpdateOrderItemRequest,
            OrderList,
            CreateReviewRequest,
            UpdateReviewRequest,
            ReviewList,
            TopSellingProduct,
            AnalyticsSnapshot,
            params::Pagination,
            params::SortOrder,
            ErrorData,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<AnalyticsSnapshot>,
            ApiResponse<ErrorData>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration and JWT tokens"),
        (name = "Categories", description = "Furniture categories"),
        (name = "Products", description = "Catalog products, filters and reviews"),
        (name = "Customers", description = "Customer records"),
        (name = "Orders", description = "Orders and their items"),
        (name = "Reviews", description = "Product reviews"),
        (name = "Analytics", description = "Admin dashboard snapshot"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_resource_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/categories/{id}",
            "/api/products/featured",
            "/api/orders/{id}/items/{item_id}",
            "/api/reviews",
            "/api/auth/token/refresh",
            "/api/analytics",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
