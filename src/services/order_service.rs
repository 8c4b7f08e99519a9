use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::{self, NotSet};
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::orders::{
        CreateOrderRequest, OrderList, UpdateOrderItemRequest, UpdateOrderRequest,
        UpdateOrderStatusRequest,
    },
    entity::{
        customers::{Column as CustomerCol, Entity as Customers},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
            OrderStatus,
        },
        products::{Column as ProductCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, OrderSortBy, SortOrder},
    services::{customer_service, product_service},
    state::AppState,
};

pub async fn list_orders(
    state: &AppState,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let pagination = query.pagination();
    let (limit, offset) = pagination.limit_offset();

    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }
    if let Some(customer) = query.customer {
        condition = condition.add(OrderCol::CustomerId.eq(customer));
    }

    let sort_col = match query.sort_by.unwrap_or(OrderSortBy::CreatedAt) {
        OrderSortBy::CreatedAt => OrderCol::CreatedAt,
        OrderSortBy::TotalPrice => OrderCol::TotalPrice,
    };
    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await?;
    let models = finder
        .order_by_asc(OrderCol::Id)
        .limit(limit)
        .offset(offset)
        .all(&state.orm)
        .await?;
    let items = to_orders(&state.orm, models).await?;

    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(Meta::for_page(&pagination, total)),
    ))
}

pub async fn get_order(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Order>> {
    let order = find_order(&state.orm, id).await?;
    Ok(ApiResponse::success("Order", single(&state.orm, order).await?, None))
}

/// Creates the order and all of its items atomically. Nothing is visible
/// unless every line resolves to an existing product.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    if payload.items.is_empty() {
        return Err(AppError::Validation("order must contain at least one item".into()));
    }
    for line in &payload.items {
        validate_quantity(line.quantity)?;
    }
    validate_total(payload.total_price)?;
    let status = match payload.status.as_deref() {
        Some(raw) => raw.parse::<OrderStatus>()?,
        None => OrderStatus::default(),
    };

    let txn = state.orm.begin().await?;

    customer_service::find_customer(&txn, payload.customer_id).await?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        customer_id: Set(payload.customer_id),
        total_price: Set(payload.total_price),
        status: Set(status),
        notes: Set(payload.notes.filter(|n| !n.trim().is_empty())),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut saved = Vec::with_capacity(payload.items.len());
    for (position, line) in payload.items.iter().enumerate() {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            position: Set(position as i32),
            quantity: Set(line.quantity),
            subtotal: NotSet,
            created_at: NotSet,
        };
        saved.push(save_order_item(&txn, item).await?);
    }

    txn.commit().await?;

    let computed = sum_subtotals(saved.iter().map(|item| item.subtotal));
    if computed != order.total_price {
        tracing::warn!(
            order_id = %order.id,
            total_price = %order.total_price,
            computed = %computed,
            "order total differs from the sum of item subtotals"
        );
    }
    tracing::info!(
        order_id = %order.id,
        customer_id = %order.customer_id,
        items = saved.len(),
        by = %user.user_id,
        "order created"
    );

    Ok(ApiResponse::success(
        "Order created",
        single(&state.orm, order).await?,
        Some(Meta::empty()),
    ))
}

/// Replaces order header fields. Items are edited one at a time through
/// [`update_order_item`].
pub async fn update_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let status = payload
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()?;
    if let Some(total_price) = payload.total_price {
        validate_total(total_price)?;
    }

    let existing = find_order(&state.orm, id).await?;
    let mut active: OrderActive = existing.into();
    if let Some(customer_id) = payload.customer_id {
        customer_service::find_customer(&state.orm, customer_id).await?;
        active.customer_id = Set(customer_id);
    }
    if let Some(total_price) = payload.total_price {
        active.total_price = Set(total_price);
    }
    if let Some(status) = status {
        active.status = Set(status);
    }
    if let Some(notes) = payload.notes {
        active.notes = Set(Some(notes).filter(|n| !n.trim().is_empty()));
    }
    active.updated_at = Set(Utc::now().into());

    let order = active.update(&state.orm).await?;
    tracing::info!(order_id = %order.id, by = %user.user_id, "order updated");

    Ok(ApiResponse::success(
        "Updated",
        single(&state.orm, order).await?,
        Some(Meta::empty()),
    ))
}

/// Sets the status. Any enumerated status is accepted from any other; an
/// unknown value is rejected before the order is touched.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let status: OrderStatus = payload.status.parse()?;

    let existing = find_order(&state.orm, id).await?;
    let previous = existing.status;
    let mut active: OrderActive = existing.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    tracing::info!(
        order_id = %order.id,
        from = %previous,
        to = %status,
        by = %user.user_id,
        "order status changed"
    );

    Ok(ApiResponse::success(
        "Status updated",
        single(&state.orm, order).await?,
        Some(Meta::empty()),
    ))
}

/// Edits one line of an order. Saving the line recomputes its subtotal from
/// the product's price at this moment, even when only the quantity changed.
pub async fn update_order_item(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    item_id: Uuid,
    payload: UpdateOrderItemRequest,
) -> AppResult<ApiResponse<Order>> {
    if let Some(quantity) = payload.quantity {
        validate_quantity(quantity)?;
    }

    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    let item = OrderItems::find()
        .filter(OrderItemCol::Id.eq(item_id))
        .filter(OrderItemCol::OrderId.eq(order_id))
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Order item"))?;

    let mut active: OrderItemActive = item.into();
    if let Some(product_id) = payload.product_id {
        active.product_id = Set(product_id);
    }
    if let Some(quantity) = payload.quantity {
        active.quantity = Set(quantity);
    }
    let item = save_order_item(&txn, active).await?;

    let mut order: OrderActive = order.into();
    order.updated_at = Set(Utc::now().into());
    let order = order.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        item_id = %item.id,
        subtotal = %item.subtotal,
        by = %user.user_id,
        "order item saved"
    );

    Ok(ApiResponse::success(
        "Item updated",
        single(&state.orm, order).await?,
        Some(Meta::empty()),
    ))
}

/// Deletes the order; its items go with it.
pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Orders::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Order"));
    }

    tracing::info!(order_id = %id, by = %user.user_id, "order deleted");
    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub fn validate_quantity(quantity: i32) -> AppResult<()> {
    if quantity < 1 {
        return Err(AppError::Validation("quantity must be at least 1".into()));
    }
    Ok(())
}

pub fn validate_total(total_price: Decimal) -> AppResult<()> {
    if total_price < Decimal::ZERO {
        return Err(AppError::Validation("total_price must be >= 0".into()));
    }
    if total_price.round_dp(2) != total_price {
        return Err(AppError::Validation(
            "total_price must have at most 2 decimal places".into(),
        ));
    }
    Ok(())
}

/// `price × quantity`, rounded to cents.
pub fn line_subtotal(price: Decimal, quantity: i32) -> AppResult<Decimal> {
    validate_quantity(quantity)?;
    price
        .checked_mul(Decimal::from(quantity))
        .map(|subtotal| subtotal.round_dp(2))
        .ok_or_else(|| AppError::Validation("subtotal out of range".into()))
}

pub fn sum_subtotals(subtotals: impl IntoIterator<Item = Decimal>) -> Decimal {
    subtotals.into_iter().sum()
}

/// Sum of quantities across the order's items.
pub fn items_count(items: &[OrderItem]) -> i64 {
    items.iter().map(|item| i64::from(item.quantity)).sum()
}

pub(crate) async fn current_price<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> AppResult<Decimal> {
    Ok(product_service::find_product(conn, product_id).await?.price)
}

/// Inserts a new item (id `Set`) or updates a loaded one (id `Unchanged`).
/// The subtotal is always overwritten from the product's current price.
pub(crate) async fn save_order_item<C: ConnectionTrait>(
    conn: &C,
    mut item: OrderItemActive,
) -> AppResult<OrderItemModel> {
    let product_id = present(&item.product_id, "product")?;
    let quantity = present(&item.quantity, "quantity")?;

    let price = current_price(conn, product_id).await?;
    item.subtotal = Set(line_subtotal(price, quantity)?);

    if item.id.is_unchanged() {
        Ok(item.update(conn).await?)
    } else {
        Ok(item.insert(conn).await?)
    }
}

fn present<V>(value: &ActiveValue<V>, field: &str) -> AppResult<V>
where
    V: Into<sea_orm::Value> + Clone,
{
    match value {
        ActiveValue::Set(v) | ActiveValue::Unchanged(v) => Ok(v.clone()),
        ActiveValue::NotSet => Err(AppError::Validation(format!(
            "order item requires {field}"
        ))),
    }
}

async fn find_order<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<OrderModel> {
    Orders::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))
}

async fn single<C: ConnectionTrait>(conn: &C, model: OrderModel) -> AppResult<Order> {
    to_orders(conn, vec![model])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Order"))
}

/// Builds API orders with their items (in position order), product names and
/// customer names, all loaded in batch.
pub(crate) async fn to_orders<C: ConnectionTrait>(
    conn: &C,
    models: Vec<OrderModel>,
) -> AppResult<Vec<Order>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }

    let order_ids: Vec<Uuid> = models.iter().map(|o| o.id).collect();
    let customer_ids: Vec<Uuid> = models.iter().map(|o| o.customer_id).collect();

    let item_models = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(order_ids))
        .order_by_asc(OrderItemCol::OrderId)
        .order_by_asc(OrderItemCol::Position)
        .all(conn)
        .await?;

    let product_ids: Vec<Uuid> = item_models.iter().map(|i| i.product_id).collect();
    let product_names: HashMap<Uuid, String> = if product_ids.is_empty() {
        HashMap::new()
    } else {
        Products::find()
            .select_only()
            .column(ProductCol::Id)
            .column(ProductCol::Name)
            .filter(ProductCol::Id.is_in(product_ids))
            .into_tuple::<(Uuid, String)>()
            .all(conn)
            .await?
            .into_iter()
            .collect()
    };
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

    let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in item_models {
        let product_name = product_names
            .get(&item.product_id)
            .cloned()
            .unwrap_or_default();
        items_by_order
            .entry(item.order_id)
            .or_default()
            .push(order_item_from_entity(item, product_name));
    }

    Ok(models
        .into_iter()
        .map(|model| {
            let items = items_by_order.remove(&model.id).unwrap_or_default();
            let customer_name = customer_names
                .get(&model.customer_id)
                .cloned()
                .unwrap_or_default();
            order_from_entity(model, customer_name, items)
        })
        .collect())
}

fn order_from_entity(model: OrderModel, customer_name: String, items: Vec<OrderItem>) -> Order {
    Order {
        id: model.id,
        customer_id: model.customer_id,
        customer_name,
        total_price: model.total_price,
        status: model.status,
        notes: model.notes,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
        items_count: items_count(&items),
        items,
    }
}

fn order_item_from_entity(model: OrderItemModel, product_name: String) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        product_name,
        quantity: model.quantity,
        subtotal: model.subtotal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i32, subtotal: Decimal) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Side table".into(),
            quantity,
            subtotal,
        }
    }

    #[test]
    fn subtotal_is_price_times_quantity() {
        assert_eq!(
            line_subtotal(Decimal::new(10000, 2), 2).unwrap(),
            Decimal::new(20000, 2)
        );
        assert_eq!(
            line_subtotal(Decimal::new(5000, 2), 1).unwrap(),
            Decimal::new(5000, 2)
        );
        assert_eq!(
            line_subtotal(Decimal::new(1999, 2), 3).unwrap(),
            Decimal::new(5997, 2)
        );
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        assert!(matches!(validate_quantity(0), Err(AppError::Validation(_))));
        assert!(matches!(validate_quantity(-3), Err(AppError::Validation(_))));
        assert!(line_subtotal(Decimal::ONE, 0).is_err());
        assert!(validate_quantity(1).is_ok());
    }

    #[test]
    fn totals_must_be_non_negative_cents() {
        assert!(validate_total(Decimal::ZERO).is_ok());
        assert!(validate_total(Decimal::new(25000, 2)).is_ok());
        assert!(validate_total(Decimal::new(-1, 0)).is_err());
        assert!(validate_total(Decimal::new(1001, 3)).is_err());
    }

    #[test]
    fn items_count_sums_quantities() {
        let items = vec![
            item(2, Decimal::new(20000, 2)),
            item(1, Decimal::new(5000, 2)),
        ];
        assert_eq!(items_count(&items), 3);
        assert_eq!(items_count(&[]), 0);
    }

    #[test]
    fn subtotals_sum_exactly() {
        let total = sum_subtotals([Decimal::new(20000, 2), Decimal::new(5000, 2)]);
        assert_eq!(total, Decimal::new(25000, 2));
        assert_eq!(sum_subtotals(Vec::new()), Decimal::ZERO);
    }
}
