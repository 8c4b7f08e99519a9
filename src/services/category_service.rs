use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, extension::postgres::PgExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    dto::categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
    entity::{
        categories::{ActiveModel, Column, Entity as Categories, Model as CategoryModel},
        products::{Column as ProductCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Category,
    response::{ApiResponse, Meta},
    routes::params::{CategoryQuery, CategorySortBy, SortOrder},
    services::product_filter::like_pattern,
    state::AppState,
};

pub async fn list_categories(
    state: &AppState,
    query: CategoryQuery,
) -> AppResult<ApiResponse<CategoryList>> {
    let pagination = query.pagination();
    let (limit, offset) = pagination.limit_offset();

    let mut condition = Condition::all();
    if let Some(q) = query.q.as_ref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(q);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    let sort_col = match query.sort_by.unwrap_or(CategorySortBy::Name) {
        CategorySortBy::Name => Column::Name,
        CategorySortBy::CreatedAt => Column::CreatedAt,
    };
    let mut finder = Categories::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Asc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await?;
    let models = finder.limit(limit).offset(offset).all(&state.orm).await?;
    let items = to_categories(&state.orm, models).await?;

    Ok(ApiResponse::success(
        "Categories",
        CategoryList { items },
        Some(Meta::for_page(&pagination, total)),
    ))
}

pub async fn get_category(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Category>> {
    let model = find_category(&state.orm, id).await?;
    let category = to_categories(&state.orm, vec![model])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Category"))?;
    Ok(ApiResponse::success("Category", category, None))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    let name = validate_name(&payload.name)?;
    ensure_name_free(&state.orm, &name, None).await?;

    let category = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(payload.description),
        image: Set(payload.image),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(category_id = %category.id, by = %user.user_id, "category created");

    Ok(ApiResponse::success(
        "Category created",
        category_from_entity(category, 0),
        Some(Meta::empty()),
    ))
}

pub async fn update_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    let existing = find_category(&state.orm, id).await?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        let name = validate_name(&name)?;
        ensure_name_free(&state.orm, &name, Some(id)).await?;
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(image) = payload.image {
        active.image = Set(Some(image));
    }

    let category = active.update(&state.orm).await?;
    tracing::info!(category_id = %category.id, by = %user.user_id, "category updated");

    let category = to_categories(&state.orm, vec![category])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Category"))?;
    Ok(ApiResponse::success("Updated", category, Some(Meta::empty())))
}

/// Deletes the category and, irreversibly, every product in it.
pub async fn delete_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let products_removed = Products::find()
        .filter(ProductCol::CategoryId.eq(id))
        .count(&state.orm)
        .await?;

    let result = Categories::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Category"));
    }

    tracing::warn!(
        category_id = %id,
        products_removed,
        by = %user.user_id,
        "category deleted with its products"
    );
    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({ "products_removed": products_removed }),
        Some(Meta::empty()),
    ))
}

pub(crate) async fn find_category<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> AppResult<CategoryModel> {
    Categories::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))
}

pub fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("category name must not be empty".into()));
    }
    if name.chars().count() > 100 {
        return Err(AppError::Validation(
            "category name must be at most 100 characters".into(),
        ));
    }
    Ok(name.to_string())
}

async fn ensure_name_free<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    except: Option<Uuid>,
) -> AppResult<()> {
    let mut condition = Condition::all().add(Column::Name.eq(name));
    if let Some(id) = except {
        condition = condition.add(Column::Id.ne(id));
    }
    if Categories::find().filter(condition).one(conn).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "category `{name}` already exists"
        )));
    }
    Ok(())
}

#[derive(Debug, FromQueryResult)]
struct ProductCountRow {
    category_id: Uuid,
    products_count: i64,
}

async fn to_categories<C: ConnectionTrait>(
    conn: &C,
    models: Vec<CategoryModel>,
) -> AppResult<Vec<Category>> {
    let ids: Vec<Uuid> = models.iter().map(|c| c.id).collect();
    let counts: HashMap<Uuid, i64> = if ids.is_empty() {
        HashMap::new()
    } else {
        Products::find()
            .select_only()
            .column(ProductCol::CategoryId)
            .column_as(ProductCol::Id.count(), "products_count")
            .filter(ProductCol::CategoryId.is_in(ids))
            .group_by(ProductCol::CategoryId)
            .into_model::<ProductCountRow>()
            .all(conn)
            .await?
            .into_iter()
            .map(|row| (row.category_id, row.products_count))
            .collect()
    };

    Ok(models
        .into_iter()
        .map(|model| {
            let products_count = counts.get(&model.id).copied().unwrap_or(0);
            category_from_entity(model, products_count)
        })
        .collect())
}

fn category_from_entity(model: CategoryModel, products_count: i64) -> Category {
    Category {
        id: model.id,
        name: model.name,
        description: model.description,
        image: model.image,
        created_at: model.created_at.with_timezone(&Utc),
        products_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_are_trimmed_and_required() {
        assert_eq!(validate_name("  Living room ").unwrap(), "Living room");
        assert!(matches!(validate_name("   "), Err(AppError::Validation(_))));
        assert!(validate_name(&"x".repeat(101)).is_err());
    }
}
