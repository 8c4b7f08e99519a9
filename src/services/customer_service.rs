use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use sea_orm::sea_query::{Expr, extension::postgres::PgExpr};
use uuid::Uuid;

use crate::{
    dto::{
        customers::{CreateCustomerRequest, CustomerList, UpdateCustomerRequest},
        orders::OrderList,
    },
    entity::{
        customers::{ActiveModel, Column, Entity as Customers, Model as CustomerModel},
        orders::{Column as OrderCol, Entity as Orders},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Customer,
    response::{ApiResponse, Meta},
    routes::params::{CustomerQuery, CustomerSortBy, Pagination, SortOrder},
    services::{order_service, product_filter::like_pattern},
    state::AppState,
};

pub async fn list_customers(
    state: &AppState,
    query: CustomerQuery,
) -> AppResult<ApiResponse<CustomerList>> {
    let pagination = query.pagination();
    let (limit, offset) = pagination.limit_offset();

    let mut condition = Condition::all();
    if let Some(q) = query.q.as_ref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(q);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::FullName).ilike(pattern.clone()))
                .add(Expr::col(Column::Email).ilike(pattern.clone()))
                .add(Expr::col(Column::Phone).ilike(pattern.clone()))
                .add(Expr::col(Column::City).ilike(pattern.clone()))
                .add(Expr::col(Column::Country).ilike(pattern)),
        );
    }

    let sort_col = match query.sort_by.unwrap_or(CustomerSortBy::CreatedAt) {
        CustomerSortBy::FullName => Column::FullName,
        CustomerSortBy::CreatedAt => Column::CreatedAt,
    };
    let mut finder = Customers::find().filter(condition);
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
    let items = to_customers(&state.orm, models).await?;

    Ok(ApiResponse::success(
        "Customers",
        CustomerList { items },
        Some(Meta::for_page(&pagination, total)),
    ))
}

pub async fn get_customer(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Customer>> {
    let model = find_customer(&state.orm, id).await?;
    let customer = to_customers(&state.orm, vec![model])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Customer"))?;
    Ok(ApiResponse::success("Customer", customer, None))
}

pub async fn create_customer(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCustomerRequest,
) -> AppResult<ApiResponse<Customer>> {
    let full_name = required(&payload.full_name, "full_name")?;
    let email = required(&payload.email, "email")?;
    ensure_email_free(&state.orm, &email, None).await?;

    let customer = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(None),
        full_name: Set(full_name),
        email: Set(email),
        phone: Set(payload.phone.trim().to_string()),
        address: Set(payload.address),
        city: Set(payload.city.trim().to_string()),
        country: Set(payload.country.trim().to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(customer_id = %customer.id, by = %user.user_id, "customer created");

    Ok(ApiResponse::success(
        "Customer created",
        customer_from_entity(customer, 0),
        Some(Meta::empty()),
    ))
}

pub async fn update_customer(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCustomerRequest,
) -> AppResult<ApiResponse<Customer>> {
    let existing = find_customer(&state.orm, id).await?;

    let mut active: ActiveModel = existing.into();
    if let Some(full_name) = payload.full_name {
        active.full_name = Set(required(&full_name, "full_name")?);
    }
    if let Some(email) = payload.email {
        let email = required(&email, "email")?;
        ensure_email_free(&state.orm, &email, Some(id)).await?;
        active.email = Set(email);
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(phone.trim().to_string());
    }
    if let Some(address) = payload.address {
        active.address = Set(address);
    }
    if let Some(city) = payload.city {
        active.city = Set(city.trim().to_string());
    }
    if let Some(country) = payload.country {
        active.country = Set(country.trim().to_string());
    }

    let customer = active.update(&state.orm).await?;
    tracing::info!(customer_id = %customer.id, by = %user.user_id, "customer updated");

    let customer = to_customers(&state.orm, vec![customer])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Customer"))?;
    Ok(ApiResponse::success("Updated", customer, Some(Meta::empty())))
}

/// Deletes the customer together with their orders and reviews.
pub async fn delete_customer(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Customers::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Customer"));
    }

    tracing::info!(customer_id = %id, by = %user.user_id, "customer deleted");
    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn list_customer_orders(
    state: &AppState,
    id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    find_customer(&state.orm, id).await?;
    let (limit, offset) = pagination.limit_offset();

    let finder = Orders::find()
        .filter(OrderCol::CustomerId.eq(id))
        .order_by_desc(OrderCol::CreatedAt)
        .order_by_desc(OrderCol::Id);
    let total = finder.clone().count(&state.orm).await?;
    let models = finder.limit(limit).offset(offset).all(&state.orm).await?;
    let items = order_service::to_orders(&state.orm, models).await?;

    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(Meta::for_page(&pagination, total)),
    ))
}

pub(crate) async fn find_customer<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> AppResult<CustomerModel> {
    Customers::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Customer"))
}

async fn ensure_email_free<C: ConnectionTrait>(
    conn: &C,
    email: &str,
    except: Option<Uuid>,
) -> AppResult<()> {
    let mut condition = Condition::all().add(Column::Email.eq(email));
    if let Some(id) = except {
        condition = condition.add(Column::Id.ne(id));
    }
    if Customers::find().filter(condition).one(conn).await?.is_some() {
        return Err(AppError::Conflict(
            "a customer with this email already exists".into(),
        ));
    }
    Ok(())
}

fn required(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(value.to_string())
}

#[derive(Debug, FromQueryResult)]
struct OrderCountRow {
    customer_id: Uuid,
    orders_count: i64,
}

pub(crate) async fn to_customers<C: ConnectionTrait>(
    conn: &C,
    models: Vec<CustomerModel>,
) -> AppResult<Vec<Customer>> {
    let ids: Vec<Uuid> = models.iter().map(|c| c.id).collect();
    let counts: HashMap<Uuid, i64> = if ids.is_empty() {
        HashMap::new()
    } else {
        Orders::find()
            .select_only()
            .column(OrderCol::CustomerId)
            .column_as(OrderCol::Id.count(), "orders_count")
            .filter(OrderCol::CustomerId.is_in(ids))
            .group_by(OrderCol::CustomerId)
            .into_model::<OrderCountRow>()
            .all(conn)
            .await?
            .into_iter()
            .map(|row| (row.customer_id, row.orders_count))
            .collect()
    };

    Ok(models
        .into_iter()
        .map(|model| {
            let orders_count = counts.get(&model.id).copied().unwrap_or(0);
            customer_from_entity(model, orders_count)
        })
        .collect())
}

pub(crate) fn customer_from_entity(model: CustomerModel, orders_count: i64) -> Customer {
    Customer {
        id: model.id,
        user_id: model.user_id,
        full_name: model.full_name,
        email: model.email,
        phone: model.phone,
        address: model.address,
        city: model.city,
        country: model.country,
        created_at: model.created_at.with_timezone(&Utc),
        orders_count,
    }
}
