use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::analytics::AnalyticsSnapshot,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::analytics_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(analytics))
}

#[utoipa::path(
    get,
    path = "/api/analytics",
    responses(
        (status = 200, description = "Catalog and sales snapshot", body = ApiResponse<AnalyticsSnapshot>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Analytics"
)]
pub async fn analytics(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<AnalyticsSnapshot>>> {
    let resp = analytics_service::snapshot(&state, &user).await?;
    Ok(Json(resp))
}
