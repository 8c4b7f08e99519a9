mod common;

use std::sync::Arc;

use common::{
    create_category, create_customer, create_product, create_user, money, setup_state, unique,
};
use furniture_store_api::{
    dto::{
        auth::{RefreshRequest, RegisterCustomer, RegisterRequest, TokenRequest, TokenType},
        categories::CreateCategoryRequest,
        customers::{CreateCustomerRequest, UpdateCustomerRequest},
        orders::{CreateOrderRequest, OrderLineRequest},
        products::UpdateProductRequest,
        reviews::{CreateReviewRequest, UpdateReviewRequest},
    },
    entity::categories::ActiveModel as CategoryActive,
    error::AppError,
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    services::{
        analytics_service, auth_service, category_service, customer_service, order_service,
        product_service, review_service,
    },
    state::AppState,
};
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, Set};
use uuid::Uuid;

#[tokio::test]
async fn second_review_by_same_customer_conflicts() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let category = create_category(&state).await?;
    let chair = create_product(&state, &category, money(15000), 4).await?;
    let customer = create_customer(&state).await?;

    let first = review_service::create_review(
        &state,
        &user,
        CreateReviewRequest {
            product_id: chair.id,
            customer_id: customer.id,
            rating: 4,
            comment: "Comfortable".into(),
        },
    )
    .await?
    .into_data()
    .expect("review");

    let err = review_service::create_review(
        &state,
        &user,
        CreateReviewRequest {
            product_id: chair.id,
            customer_id: customer.id,
            rating: 1,
            comment: "Changed my mind".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let stored = review_service::get_review(&state, first.id)
        .await?
        .into_data()
        .expect("review");
    assert_eq!(stored.rating, 4);
    assert_eq!(stored.comment, "Comfortable");
    assert_eq!(stored.customer_name, "Test Customer");

    let detail = product_service::get_product(&state, chair.id)
        .await?
        .into_data()
        .expect("product");
    assert_eq!(detail.reviews_count, 1);
    assert_eq!(detail.product.average_rating, 4.0);
    Ok(())
}

#[tokio::test]
async fn ratings_outside_range_are_not_stored() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let category = create_category(&state).await?;
    let table = create_product(&state, &category, money(30000), 1).await?;
    let customer = create_customer(&state).await?;

    let err = review_service::create_review(
        &state,
        &user,
        CreateReviewRequest {
            product_id: table.id,
            customer_id: customer.id,
            rating: 6,
            comment: String::new(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let review = review_service::create_review(
        &state,
        &user,
        CreateReviewRequest {
            product_id: table.id,
            customer_id: customer.id,
            rating: 5,
            comment: String::new(),
        },
    )
    .await?
    .into_data()
    .expect("review");

    let err = review_service::update_review(
        &state,
        &user,
        review.id,
        UpdateReviewRequest {
            rating: Some(0),
            comment: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn product_filters_combine_with_and() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let category = create_category(&state).await?;
    let cheap_out_of_stock = create_product(&state, &category, money(5000), 0).await?;
    let mid_in_stock = create_product(&state, &category, money(10000), 5).await?;
    let pricey_in_stock = create_product(&state, &category, money(20000), 5).await?;

    let query = ProductQuery {
        category: Some(category.id),
        min_price: Some(money(6000)),
        max_price: Some(money(15000)),
        in_stock: Some(true),
        ..Default::default()
    };
    let first = product_service::list_products(&state, query.clone()).await?;
    assert_eq!(first.meta.as_ref().and_then(|m| m.total), Some(1));
    let ids: Vec<_> = first.into_data().expect("list").items.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![mid_in_stock.id]);

    // Same inputs, same result.
    let again = product_service::list_products(&state, query).await?;
    let again: Vec<_> = again.into_data().expect("list").items.iter().map(|p| p.id).collect();
    assert_eq!(again, ids);

    let out_of_stock = product_service::list_products(
        &state,
        ProductQuery {
            category: Some(category.id),
            in_stock: Some(false),
            ..Default::default()
        },
    )
    .await?
    .into_data()
    .expect("list");
    assert_eq!(out_of_stock.items.len(), 1);
    assert_eq!(out_of_stock.items[0].id, cheap_out_of_stock.id);
    assert!(!out_of_stock.items[0].in_stock);

    let by_category_name = product_service::list_products(
        &state,
        ProductQuery {
            category_name: Some(category.name.to_uppercase()),
            sort_by: Some(ProductSortBy::Price),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        },
    )
    .await?
    .into_data()
    .expect("list");
    let ordered: Vec<_> = by_category_name.items.iter().map(|p| p.id).collect();
    assert_eq!(
        ordered,
        vec![cheap_out_of_stock.id, mid_in_stock.id, pricey_in_stock.id]
    );
    assert!(
        by_category_name
            .items
            .iter()
            .all(|p| p.category_name == category.name)
    );
    Ok(())
}

#[tokio::test]
async fn category_names_are_unique() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let name = unique("Outdoor");

    category_service::create_category(
        &state,
        &user,
        CreateCategoryRequest {
            name: name.clone(),
            description: Some("Garden furniture".into()),
            image: None,
        },
    )
    .await?;

    let err = category_service::create_category(
        &state,
        &user,
        CreateCategoryRequest {
            name: format!("  {name} "),
            description: None,
            image: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    Ok(())
}

// A unique violation that reaches the database is reported without
// the constraint name.
#[tokio::test]
async fn database_unique_violation_is_a_plain_conflict() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let category = create_category(&state).await?;

    let err = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(category.name.clone()),
        description: Set(None),
        image: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .unwrap_err();

    let err = AppError::from(err);
    let AppError::Conflict(message) = &err else {
        panic!("expected conflict, got {err:?}");
    };
    assert!(!message.contains("categories_name_key"), "{message}");
    assert!(!message.contains(&category.name), "{message}");
    Ok(())
}

#[tokio::test]
async fn customer_emails_are_unique() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let taken = create_customer(&state).await?;

    let err = customer_service::create_customer(
        &state,
        &user,
        CreateCustomerRequest {
            full_name: "Second Buyer".into(),
            email: taken.email.clone(),
            phone: String::new(),
            address: String::new(),
            city: "Porto".into(),
            country: "Portugal".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let other = create_customer(&state).await?;
    let err = customer_service::update_customer(
        &state,
        &user,
        other.id,
        UpdateCustomerRequest {
            email: Some(taken.email.clone()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let unchanged = customer_service::get_customer(&state, other.id)
        .await?
        .into_data()
        .expect("customer");
    assert_eq!(unchanged.email, other.email);
    Ok(())
}

#[tokio::test]
async fn negative_price_or_stock_leaves_product_unchanged() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let category = create_category(&state).await?;
    let bench = create_product(&state, &category, money(24900), 6).await?;

    let negative_stock = product_service::update_product(
        &state,
        &user,
        bench.id,
        UpdateProductRequest {
            name: Some("Renamed bench".into()),
            stock: Some(-1),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(negative_stock, Err(AppError::Validation(_))));

    let negative_price = product_service::update_product(
        &state,
        &user,
        bench.id,
        UpdateProductRequest {
            price: Some(money(-100)),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(negative_price, Err(AppError::Validation(_))));

    let stored = product_service::get_product(&state, bench.id)
        .await?
        .into_data()
        .expect("product");
    assert_eq!(stored.product.name, bench.name);
    assert_eq!(stored.product.price, money(24900));
    assert_eq!(stored.product.stock, 6);
    Ok(())
}

// Removing a category takes its products (and their order lines) with it.
#[tokio::test]
async fn deleting_a_category_cascades_to_products() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let category = create_category(&state).await?;
    let wardrobe = create_product(&state, &category, money(70000), 2).await?;
    let dresser = create_product(&state, &category, money(45000), 2).await?;

    let listed = category_service::get_category(&state, category.id)
        .await?
        .into_data()
        .expect("category");
    assert_eq!(listed.products_count, 2);

    let resp = category_service::delete_category(&state, &user, category.id).await?;
    assert_eq!(
        resp.into_data().expect("body")["products_removed"],
        serde_json::json!(2)
    );

    for id in [wardrobe.id, dresser.id] {
        assert!(matches!(
            product_service::get_product(&state, id).await,
            Err(AppError::NotFound(_))
        ));
    }
    assert!(matches!(
        category_service::get_category(&state, category.id).await,
        Err(AppError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn analytics_is_admin_only_and_ranks_by_quantity() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let admin = create_user(&state, "admin").await?;

    assert!(matches!(
        analytics_service::snapshot(&state, &user).await,
        Err(AppError::Forbidden)
    ));

    let category = create_category(&state).await?;
    let customer = create_customer(&state).await?;
    let best = create_product(&state, &category, money(1), 0).await?;
    let tie_a = create_product(&state, &category, money(1), 0).await?;
    let tie_b = create_product(&state, &category, money(1), 0).await?;

    let line = |product_id, quantity| OrderLineRequest {
        product_id,
        quantity,
    };
    let lines = vec![line(tie_b.id, 4), line(best.id, 2), line(best.id, 3), line(tie_a.id, 4)];
    order_service::create_order(
        &state,
        &admin,
        CreateOrderRequest {
            customer_id: customer.id,
            total_price: money(0),
            status: None,
            notes: None,
            items: lines,
        },
    )
    .await?;

    let mut config = (*state.config).clone();
    config.top_selling_limit = 10_000;
    let state = AppState {
        config: Arc::new(config),
        ..state
    };
    let snapshot = analytics_service::snapshot(&state, &admin)
        .await?
        .into_data()
        .expect("snapshot");
    assert!(!snapshot.revenue_includes_cancelled);
    assert!(snapshot.total_products >= 3);
    assert!(snapshot.total_orders >= 1);
    assert!(!snapshot.recent_orders.is_empty());

    // The database is shared with other tests, so check the ordering rule over
    // the whole ranking and the relative placement of this test's products.
    let ranking: Vec<_> = snapshot
        .top_selling_products
        .iter()
        .map(|p| (p.product.id, p.total_sold))
        .collect();
    assert!(ranking.windows(2).all(|w| {
        let ((id_a, sold_a), (id_b, sold_b)) = (w[0], w[1]);
        sold_a > sold_b || (sold_a == sold_b && id_a < id_b)
    }));

    let position = |id| ranking.iter().position(|(p, _)| *p == id).expect("ranked");
    let (low, high) = if tie_a.id < tie_b.id {
        (tie_a.id, tie_b.id)
    } else {
        (tie_b.id, tie_a.id)
    };
    assert_eq!(ranking[position(best.id)].1, 5);
    assert_eq!(ranking[position(low)].1, 4);
    assert!(position(best.id) < position(low));
    assert!(position(low) < position(high));

    let mut config = (*state.config).clone();
    config.top_selling_limit = 1;
    let limited = AppState {
        config: Arc::new(config),
        ..state
    };
    let head = analytics_service::snapshot(&limited, &admin)
        .await?
        .into_data()
        .expect("snapshot");
    assert_eq!(head.top_selling_products.len(), 1);
    Ok(())
}

#[tokio::test]
async fn register_obtain_and_refresh_tokens() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let username = unique("buyer");
    let request = |password2: &str| RegisterRequest {
        username: username.clone(),
        email: format!("{username}@example.com"),
        password: "sturdy-oak-chair".into(),
        password2: password2.into(),
        first_name: "Ola".into(),
        last_name: "Berg".into(),
        customer: Some(RegisterCustomer {
            city: Some("Bergen".into()),
            ..Default::default()
        }),
    };

    let err = auth_service::register_user(&state, request("sturdy-oak-chairs"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let registered = auth_service::register_user(&state, request("sturdy-oak-chair"))
        .await?
        .into_data()
        .expect("registration");
    assert_eq!(registered.customer.user_id, Some(registered.user.id));
    assert_eq!(registered.customer.full_name, "Ola Berg");
    assert_eq!(registered.customer.city, "Bergen");

    let again = auth_service::register_user(&state, request("sturdy-oak-chair"))
        .await
        .unwrap_err();
    assert!(matches!(again, AppError::Conflict(_)));

    let bad_login = auth_service::obtain_token(
        &state,
        TokenRequest {
            username: username.clone(),
            password: "wrong-password".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(bad_login, AppError::Unauthorized(_)));

    let pair = auth_service::obtain_token(
        &state,
        TokenRequest {
            username: username.clone(),
            password: "sturdy-oak-chair".into(),
        },
    )
    .await?
    .into_data()
    .expect("tokens");

    let refreshed = auth_service::refresh_token(
        &state,
        RefreshRequest {
            refresh: pair.refresh.clone(),
        },
    )
    .await?
    .into_data()
    .expect("access");
    let claims =
        auth_service::decode_token(&state.config.jwt_secret, &refreshed.access, TokenType::Access)?;
    assert_eq!(claims.sub, registered.user.id.to_string());

    // An access token cannot be used as a refresh token.
    let misuse = auth_service::refresh_token(
        &state,
        RefreshRequest {
            refresh: pair.access,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(misuse, AppError::Unauthorized(_)));
    Ok(())
}
