pub mod analytics_service;
pub mod auth_service;
pub mod category_service;
pub mod customer_service;
pub mod order_service;
pub mod product_filter;
pub mod product_service;
pub mod review_service;
