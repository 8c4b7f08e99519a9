use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    dto::reviews::{CreateReviewRequest, ReviewList, UpdateReviewRequest},
    entity::{
        customers::{Column as CustomerCol, Entity as Customers},
        products::{Column as ProductCol, Entity as Products},
        reviews::{ActiveModel, Column, Entity as Reviews, Model as ReviewModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Review,
    response::{ApiResponse, Meta},
    routes::params::{ReviewQuery, ReviewSortBy, SortOrder},
    services::{customer_service, product_service},
    state::AppState,
};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

pub async fn list_reviews(
    state: &AppState,
    query: ReviewQuery,
) -> AppResult<ApiResponse<ReviewList>> {
    let pagination = query.pagination();
    let (limit, offset) = pagination.limit_offset();

    let mut condition = Condition::all();
    if let Some(product) = query.product {
        condition = condition.add(Column::ProductId.eq(product));
    }
    if let Some(customer) = query.customer {
        condition = condition.add(Column::CustomerId.eq(customer));
    }
    if let Some(rating) = query.rating {
        condition = condition.add(Column::Rating.eq(rating));
    }

    let sort_col = match query.sort_by.unwrap_or(ReviewSortBy::CreatedAt) {
        ReviewSortBy::CreatedAt => Column::CreatedAt,
        ReviewSortBy::Rating => Column::Rating,
    };
    let mut finder = Reviews::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await?;
    let models = finder
        .order_by_asc(Column::Id)
        .limit(limit)
        .offset(offset)
        .all(&state.orm)
        .await?;
    let items = to_reviews(&state.orm, models).await?;

    Ok(ApiResponse::success(
        "Reviews",
        ReviewList { items },
        Some(Meta::for_page(&pagination, total)),
    ))
}

pub async fn get_review(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Review>> {
    let model = find_review(&state.orm, id).await?;
    Ok(ApiResponse::success("Review", single(&state.orm, model).await?, None))
}

/// One review per (product, customer) pair. A second attempt is a conflict and
/// leaves the existing review untouched.
pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    validate_rating(payload.rating)?;
    product_service::find_product(&state.orm, payload.product_id).await?;
    customer_service::find_customer(&state.orm, payload.customer_id).await?;

    let existing = Reviews::find()
        .filter(Column::ProductId.eq(payload.product_id))
        .filter(Column::CustomerId.eq(payload.customer_id))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(
            "customer has already reviewed this product".into(),
        ));
    }

    let review = ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(payload.product_id),
        customer_id: Set(payload.customer_id),
        rating: Set(payload.rating),
        comment: Set(payload.comment.trim().to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(
        review_id = %review.id,
        product_id = %review.product_id,
        by = %user.user_id,
        "review created"
    );

    Ok(ApiResponse::success(
        "Review created",
        single(&state.orm, review).await?,
        Some(Meta::empty()),
    ))
}

pub async fn update_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    let existing = find_review(&state.orm, id).await?;

    let mut active: ActiveModel = existing.into();
    if let Some(rating) = payload.rating {
        validate_rating(rating)?;
        active.rating = Set(rating);
    }
    if let Some(comment) = payload.comment {
        active.comment = Set(comment.trim().to_string());
    }

    let review = active.update(&state.orm).await?;
    tracing::info!(review_id = %review.id, by = %user.user_id, "review updated");

    Ok(ApiResponse::success(
        "Updated",
        single(&state.orm, review).await?,
        Some(Meta::empty()),
    ))
}

pub async fn delete_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Reviews::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Review"));
    }

    tracing::info!(review_id = %id, by = %user.user_id, "review deleted");
    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub fn validate_rating(rating: i32) -> AppResult<()> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::Validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    Ok(())
}

async fn find_review<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<ReviewModel> {
    Reviews::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Review"))
}

async fn single<C: ConnectionTrait>(conn: &C, model: ReviewModel) -> AppResult<Review> {
    to_reviews(conn, vec![model])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Review"))
}

/// Builds API reviews, resolving product and customer names in batch.
pub(crate) async fn to_reviews<C: ConnectionTrait>(
    conn: &C,
    models: Vec<ReviewModel>,
) -> AppResult<Vec<Review>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }

    let product_ids: Vec<Uuid> = models.iter().map(|r| r.product_id).collect();
    let customer_ids: Vec<Uuid> = models.iter().map(|r| r.customer_id).collect();

    let product_names: HashMap<Uuid, String> = Products::find()
        .select_only()
        .column(ProductCol::Id)
        .column(ProductCol::Name)
        .filter(ProductCol::Id.is_in(product_ids))
        .into_tuple::<(Uuid, String)>()
        .all(conn)
        .await?
        .into_iter()
        .collect();
    let customer_names: HashMap<Uuid, String> = Customers::find()
        .select_only()
        .column(CustomerCol::Id)
        .column(CustomerCol::FullName)
        .filter(CustomerCol::Id.is_in(customer_ids))
        .into_tuple::<(Uuid, String)>()
        .all(conn)
        .await?
        .into_iter()
        .collect();

    Ok(models
        .into_iter()
        .map(|model| Review {
            id: model.id,
            product_id: model.product_id,
            product_name: product_names
                .get(&model.product_id)
                .cloned()
                .unwrap_or_default(),
            customer_id: model.customer_id,
            customer_name: customer_names
                .get(&model.customer_id)
                .cloned()
                .unwrap_or_default(),
            rating: model.rating,
            comment: model.comment,
            created_at: model.created_at.with_timezone(&Utc),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratings_outside_one_to_five_are_rejected() {
        for rating in [0, 6, -1, 10] {
            assert!(matches!(
                validate_rating(rating),
                Err(AppError::Validation(_))
            ));
        }
        for rating in MIN_RATING..=MAX_RATING {
            assert!(validate_rating(rating).is_ok());
        }
    }
}
