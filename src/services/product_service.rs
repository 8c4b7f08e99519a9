use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use uuid::Uuid;

use crate::{
    dto::{
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        reviews::ReviewList,
    },
    entity::{
        categories::{Entity as Categories, Model as CategoryModel},
        products::{
            ActiveModel, Column, Entity as Products, Model as ProductModel, Relation as ProductRel,
        },
        reviews::{Column as ReviewCol, Entity as Reviews},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Product, ProductDetail},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ProductQuery, ProductSortBy, SortOrder},
    services::{category_service, product_filter::product_condition, review_service},
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let pagination = query.pagination();
    let (limit, offset) = pagination.limit_offset();
    let condition = product_condition(&query);

    let total = Products::find()
        .join(JoinType::InnerJoin, ProductRel::Categories.def())
        .filter(condition.clone())
        .count(&state.orm)
        .await?;

    let sort_col = match query.sort_by.unwrap_or(ProductSortBy::CreatedAt) {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
        ProductSortBy::Stock => Column::Stock,
    };
    let mut finder = Products::find()
        .find_also_related(Categories)
        .filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let rows = finder
        .order_by_asc(Column::Id)
        .limit(limit)
        .offset(offset)
        .all(&state.orm)
        .await?;
    let items = with_ratings(&state.orm, rows).await?;

    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(Meta::for_page(&pagination, total)),
    ))
}

pub async fn list_featured(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    let query = ProductQuery {
        page: pagination.page,
        per_page: pagination.per_page,
        is_featured: Some(true),
        ..Default::default()
    };
    let mut resp = list_products(state, query).await?;
    resp.message = "Featured products".into();
    Ok(resp)
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductDetail>> {
    let model = find_product(&state.orm, id).await?;
    let product = to_products(&state.orm, vec![model])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Product"))?;

    let reviews = Reviews::find()
        .filter(ReviewCol::ProductId.eq(id))
        .order_by_desc(ReviewCol::CreatedAt)
        .all(&state.orm)
        .await?;
    let reviews = review_service::to_reviews(&state.orm, reviews).await?;

    let detail = ProductDetail {
        product,
        reviews_count: reviews.len() as i64,
        reviews,
    };
    Ok(ApiResponse::success("Product", detail, None))
}

pub async fn list_product_reviews(
    state: &AppState,
    id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    find_product(&state.orm, id).await?;
    let (limit, offset) = pagination.limit_offset();

    let finder = Reviews::find()
        .filter(ReviewCol::ProductId.eq(id))
        .order_by_desc(ReviewCol::CreatedAt)
        .order_by_asc(ReviewCol::Id);
    let total = finder.clone().count(&state.orm).await?;
    let models = finder.limit(limit).offset(offset).all(&state.orm).await?;
    let items = review_service::to_reviews(&state.orm, models).await?;

    Ok(ApiResponse::success(
        "Reviews",
        ReviewList { items },
        Some(Meta::for_page(&pagination, total)),
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("name must not be empty".into()));
    }
    validate_price(payload.price)?;
    validate_stock(payload.stock)?;
    let category = category_service::find_category(&state.orm, payload.category_id).await?;

    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(payload.description),
        price: Set(payload.price.round_dp(2)),
        stock: Set(payload.stock),
        image: Set(payload.image),
        category_id: Set(category.id),
        material: Set(payload.material.trim().to_string()),
        color: Set(payload.color.trim().to_string()),
        dimensions: Set(payload.dimensions.trim().to_string()),
        is_featured: Set(payload.is_featured),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(product_id = %product.id, by = %user.user_id, "product created");

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product, Some(&category), 0.0),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let existing = find_product(&state.orm, id).await?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("name must not be empty".into()));
        }
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(price) = payload.price {
        validate_price(price)?;
        active.price = Set(price.round_dp(2));
    }
    if let Some(stock) = payload.stock {
        validate_stock(stock)?;
        active.stock = Set(stock);
    }
    if let Some(image) = payload.image {
        active.image = Set(Some(image));
    }
    if let Some(category_id) = payload.category_id {
        category_service::find_category(&state.orm, category_id).await?;
        active.category_id = Set(category_id);
    }
    if let Some(material) = payload.material {
        active.material = Set(material.trim().to_string());
    }
    if let Some(color) = payload.color {
        active.color = Set(color.trim().to_string());
    }
    if let Some(dimensions) = payload.dimensions {
        active.dimensions = Set(dimensions.trim().to_string());
    }
    if let Some(is_featured) = payload.is_featured {
        active.is_featured = Set(is_featured);
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;
    tracing::info!(product_id = %product.id, by = %user.user_id, "product updated");

    let product = to_products(&state.orm, vec![product])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Product"))?;
    Ok(ApiResponse::success("Updated", product, Some(Meta::empty())))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::not_found("Product"));
    }

    tracing::info!(product_id = %id, by = %user.user_id, "product deleted");
    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub fn validate_price(price: Decimal) -> AppResult<()> {
    if price < Decimal::ZERO {
        return Err(AppError::Validation("price must be >= 0".into()));
    }
    if price.round_dp(2) != price {
        return Err(AppError::Validation(
            "price must have at most 2 decimal places".into(),
        ));
    }
    Ok(())
}

pub fn validate_stock(stock: i32) -> AppResult<()> {
    if stock < 0 {
        return Err(AppError::Validation("stock must be >= 0".into()));
    }
    Ok(())
}

/// Arithmetic mean of review ratings; 0 when there are none.
pub fn average_rating(rating_sum: i64, rating_count: i64) -> f64 {
    if rating_count <= 0 {
        return 0.0;
    }
    rating_sum as f64 / rating_count as f64
}

pub(crate) async fn find_product<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<ProductModel> {
    Products::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))
}

#[derive(Debug, FromQueryResult)]
struct RatingRow {
    product_id: Uuid,
    rating_sum: i64,
    rating_count: i64,
}

async fn ratings_for<C: ConnectionTrait>(
    conn: &C,
    ids: Vec<Uuid>,
) -> AppResult<HashMap<Uuid, f64>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = Reviews::find()
        .select_only()
        .column(ReviewCol::ProductId)
        .column_as(ReviewCol::Rating.sum(), "rating_sum")
        .column_as(ReviewCol::Id.count(), "rating_count")
        .filter(ReviewCol::ProductId.is_in(ids))
        .group_by(ReviewCol::ProductId)
        .into_model::<RatingRow>()
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.product_id, average_rating(row.rating_sum, row.rating_count)))
        .collect())
}

async fn with_ratings<C: ConnectionTrait>(
    conn: &C,
    rows: Vec<(ProductModel, Option<CategoryModel>)>,
) -> AppResult<Vec<Product>> {
    let ratings = ratings_for(conn, rows.iter().map(|(p, _)| p.id).collect()).await?;
    Ok(rows
        .into_iter()
        .map(|(product, category)| {
            let rating = ratings.get(&product.id).copied().unwrap_or(0.0);
            product_from_entity(product, category.as_ref(), rating)
        })
        .collect())
}

/// Builds API products, resolving category names and average ratings in batch.
pub(crate) async fn to_products<C: ConnectionTrait>(
    conn: &C,
    models: Vec<ProductModel>,
) -> AppResult<Vec<Product>> {
    let category_ids: Vec<Uuid> = models.iter().map(|p| p.category_id).collect();
    let categories: HashMap<Uuid, CategoryModel> = if category_ids.is_empty() {
        HashMap::new()
    } else {
        Categories::find()
            .filter(crate::entity::categories::Column::Id.is_in(category_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect()
    };

    let rows = models
        .into_iter()
        .map(|p| {
            let category = categories.get(&p.category_id).cloned();
            (p, category)
        })
        .collect();
    with_ratings(conn, rows).await
}

pub(crate) fn product_from_entity(
    model: ProductModel,
    category: Option<&CategoryModel>,
    average_rating: f64,
) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        stock: model.stock,
        image: model.image,
        category_id: model.category_id,
        category_name: category.map(|c| c.name.clone()).unwrap_or_default(),
        material: model.material,
        color: model.color,
        dimensions: model.dimensions,
        is_featured: model.is_featured,
        average_rating,
        in_stock: model.stock > 0,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_rating_is_zero_without_reviews() {
        assert_eq!(average_rating(0, 0), 0.0);
        assert_eq!(average_rating(9, 2), 4.5);
        assert_eq!(average_rating(5, 1), 5.0);
    }

    #[test]
    fn negative_price_and_stock_are_rejected() {
        assert!(matches!(
            validate_price(Decimal::new(-1, 2)),
            Err(AppError::Validation(_))
        ));
        assert!(validate_price(Decimal::ZERO).is_ok());
        assert!(validate_price(Decimal::new(49990, 2)).is_ok());
        assert!(matches!(validate_stock(-1), Err(AppError::Validation(_))));
        assert!(validate_stock(0).is_ok());
    }

    #[test]
    fn sub_cent_prices_are_rejected() {
        assert!(validate_price(Decimal::new(10005, 3)).is_err());
    }

    #[test]
    fn in_stock_follows_stock_counter() {
        let now = Utc::now().into();
        let model = ProductModel {
            id: Uuid::new_v4(),
            name: "Lounge chair".into(),
            description: String::new(),
            price: Decimal::new(25000, 2),
            stock: 0,
            image: None,
            category_id: Uuid::new_v4(),
            material: "Teak".into(),
            color: "Natural".into(),
            dimensions: "70x80x90 cm".into(),
            is_featured: false,
            created_at: now,
            updated_at: now,
        };
        let product = product_from_entity(model.clone(), None, 0.0);
        assert!(!product.in_stock);
        assert_eq!(product.category_name, "");

        let restocked = product_from_entity(ProductModel { stock: 3, ..model }, None, 4.0);
        assert!(restocked.in_stock);
        assert_eq!(restocked.average_rating, 4.0);
    }
}
