use axum::Router;

use crate::state::AppState;

pub mod analytics;
pub mod auth;
pub mod categories;
pub mod customers;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;
pub mod reviews;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/categories", categories::router())
        .nest("/products", products::router())
        .nest("/customers", customers::router())
        .nest("/orders", orders::router())
        .nest("/reviews", reviews::router())
        .nest("/auth", auth::router())
        .nest("/analytics", analytics::router())
}
