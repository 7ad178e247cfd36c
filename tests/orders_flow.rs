mod common;

use axum::http::{Method, StatusCode};
use baby_kingdom_api::{
    dto::{
        admin::UpdateOrderStatusRequest,
        discounts::ValidateDiscountRequest,
        orders::{CancelOrderRequest, CheckoutRequest},
    },
    entity::{
        Discounts, Orders, Products,
        discounts::{ActiveModel as DiscountActive, DiscountType},
        orders::{OrderStatus, PaymentStatus},
        users::UserRole,
    },
    error::AppError,
    models::Order,
    services::{admin_service, discount_service, order_service},
    state::AppState,
};
use common::{NewProduct, auth_user, checkout_body, create_product, create_user};
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use uuid::Uuid;

fn checkout_request(lines: &[(Uuid, i32)], code: Option<&str>) -> CheckoutRequest {
    serde_json::from_value(checkout_body(lines, code)).expect("checkout request")
}

async fn stock_of(state: &AppState, id: Uuid) -> i32 {
    Products::find_by_id(id)
        .one(&state.orm)
        .await
        .expect("query")
        .expect("product")
        .stock
}

fn status_request(status: OrderStatus) -> UpdateOrderStatusRequest {
    UpdateOrderStatusRequest {
        status,
        reason: None,
        tracking_number: None,
        carrier: None,
    }
}

#[tokio::test]
async fn checkout_then_cancel_restores_stock_once() {
    let state = common::test_state().await;
    let customer = create_user(&state, UserRole::Customer, "parent@example.com").await;
    let product = create_product(&state, NewProduct::default()).await;
    let user = auth_user(&customer);

    let placed = order_service::checkout(&state, &user, checkout_request(&[(product.id, 3)], None))
        .await
        .expect("checkout")
        .data
        .expect("order");
    let order: Order = placed.order;

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.subtotal, 3000);
    assert_eq!(order.shipping_cost, 500);
    assert_eq!(order.tax, 450);
    assert_eq!(order.total, 3950);
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].price, 1000);
    assert_eq!(stock_of(&state, product.id).await, 7);

    let cancelled = order_service::cancel_order(
        &state,
        &user,
        order.id,
        CancelOrderRequest {
            reason: Some("Ordered the wrong size".into()),
        },
    )
    .await
    .expect("cancel")
    .data
    .expect("order");
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert!(cancelled.order.cancelled_at.is_some());
    assert_eq!(stock_of(&state, product.id).await, 10);

    let again = order_service::cancel_order(&state, &user, order.id, CancelOrderRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(again, AppError::BadRequest(_)));
    assert_eq!(stock_of(&state, product.id).await, 10);
}

#[tokio::test]
async fn processing_order_cannot_be_cancelled_by_customer() {
    let state = common::test_state().await;
    let customer = create_user(&state, UserRole::Customer, "parent@example.com").await;
    let admin = create_user(&state, UserRole::Admin, "admin@example.com").await;
    let product = create_product(&state, NewProduct::default()).await;
    let user = auth_user(&customer);

    let order = order_service::checkout(&state, &user, checkout_request(&[(product.id, 2)], None))
        .await
        .expect("checkout")
        .data
        .expect("order")
        .order;

    admin_service::update_order_status(
        &state,
        &auth_user(&admin),
        order.id,
        status_request(OrderStatus::Processing),
    )
    .await
    .expect("status update");

    let err = order_service::cancel_order(&state, &user, order.id, CancelOrderRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(stock_of(&state, product.id).await, 8);
}

#[tokio::test]
async fn only_the_owner_can_cancel() {
    let state = common::test_state().await;
    let owner = create_user(&state, UserRole::Customer, "owner@example.com").await;
    let other = create_user(&state, UserRole::Customer, "other@example.com").await;
    let product = create_product(&state, NewProduct::default()).await;

    let order = order_service::checkout(
        &state,
        &auth_user(&owner),
        checkout_request(&[(product.id, 1)], None),
    )
    .await
    .expect("checkout")
    .data
    .expect("order")
    .order;

    let err = order_service::cancel_order(
        &state,
        &auth_user(&other),
        order.id,
        CancelOrderRequest::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = order_service::get_order(&state, &auth_user(&other), order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

#[tokio::test]
async fn insufficient_stock_leaves_nothing_behind() {
    let state = common::test_state().await;
    let customer = create_user(&state, UserRole::Customer, "parent@example.com").await;
    let plenty = create_product(&state, NewProduct::default()).await;
    let scarce = create_product(
        &state,
        NewProduct {
            name: "Night Light",
            stock: 2,
            ..Default::default()
        },
    )
    .await;

    let err = order_service::checkout(
        &state,
        &auth_user(&customer),
        checkout_request(&[(plenty.id, 1), (scarce.id, 3)], None),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(ref msg) if msg.contains("Night Light")));
    assert_eq!(stock_of(&state, plenty.id).await, 10);
    assert_eq!(stock_of(&state, scarce.id).await, 2);
    assert_eq!(Orders::find().count(&state.orm).await.expect("count"), 0);
}

#[tokio::test]
async fn inactive_product_cannot_be_ordered() {
    let state = common::test_state().await;
    let customer = create_user(&state, UserRole::Customer, "parent@example.com").await;
    let hidden = create_product(
        &state,
        NewProduct {
            is_active: false,
            ..Default::default()
        },
    )
    .await;

    let err = order_service::checkout(
        &state,
        &auth_user(&customer),
        checkout_request(&[(hidden.id, 1)], None),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn discount_is_counted_at_checkout_but_not_on_validate() {
    let state = common::test_state().await;
    let customer = create_user(&state, UserRole::Customer, "parent@example.com").await;
    let user = auth_user(&customer);
    let stroller = create_product(
        &state,
        NewProduct {
            name: "Travel Stroller",
            category: "Strollers",
            price: 6000,
            ..Default::default()
        },
    )
    .await;
    let discount = common::create_discount(&state, "SAVE10", DiscountType::Percentage, 10).await;

    let quote = discount_service::validate(
        &state,
        &user,
        ValidateDiscountRequest {
            code: "save10".into(),
            order_value: 10_000,
        },
    )
    .await
    .expect("validate")
    .data
    .expect("quote");
    assert_eq!(quote.discount_amount, 1000);
    assert_eq!(quote.final_value, 9000);

    let used = Discounts::find_by_id(discount.id)
        .one(&state.orm)
        .await
        .expect("query")
        .expect("discount")
        .used_count;
    assert_eq!(used, 0);

    let order = order_service::checkout(
        &state,
        &user,
        checkout_request(&[(stroller.id, 1)], Some(" save10 ")),
    )
    .await
    .expect("checkout")
    .data
    .expect("order")
    .order;

    assert_eq!(order.discount_code.as_deref(), Some("SAVE10"));
    assert_eq!(order.subtotal, 6000);
    assert_eq!(order.shipping_cost, 0);
    assert_eq!(order.tax, 900);
    assert_eq!(order.discount_amount, 600);
    assert_eq!(order.total, 6000 + 900 - 600);

    let used = Discounts::find_by_id(discount.id)
        .one(&state.orm)
        .await
        .expect("query")
        .expect("discount")
        .used_count;
    assert_eq!(used, 1);
}

#[tokio::test]
async fn unknown_discount_code_rejects_checkout() {
    let state = common::test_state().await;
    let customer = create_user(&state, UserRole::Customer, "parent@example.com").await;
    let product = create_product(&state, NewProduct::default()).await;

    let err = order_service::checkout(
        &state,
        &auth_user(&customer),
        checkout_request(&[(product.id, 1)], Some("NOPE")),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(ref msg) if msg == "Invalid discount code"));
    assert_eq!(stock_of(&state, product.id).await, 10);
}

#[tokio::test]
async fn admin_cancel_restores_stock_and_is_idempotent_on_stock() {
    let state = common::test_state().await;
    let customer = create_user(&state, UserRole::Customer, "parent@example.com").await;
    let admin = auth_user(&create_user(&state, UserRole::Admin, "admin@example.com").await);
    let product = create_product(&state, NewProduct::default()).await;

    let order = order_service::checkout(
        &state,
        &auth_user(&customer),
        checkout_request(&[(product.id, 4)], None),
    )
    .await
    .expect("checkout")
    .data
    .expect("order")
    .order;
    assert_eq!(stock_of(&state, product.id).await, 6);

    admin_service::update_order_status(&state, &admin, order.id, status_request(OrderStatus::Shipped))
        .await
        .expect("ship");
    assert_eq!(stock_of(&state, product.id).await, 6);

    let cancelled = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        status_request(OrderStatus::Cancelled),
    )
    .await
    .expect("cancel")
    .data
    .expect("order");
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&state, product.id).await, 10);

    admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        status_request(OrderStatus::Cancelled),
    )
    .await
    .expect("cancel again");
    assert_eq!(stock_of(&state, product.id).await, 10);
}

#[tokio::test]
async fn reopened_order_takes_stock_again_before_second_cancel() {
    let state = common::test_state().await;
    let customer = create_user(&state, UserRole::Customer, "parent@example.com").await;
    let admin = auth_user(&create_user(&state, UserRole::Admin, "admin@example.com").await);
    let product = create_product(&state, NewProduct::default()).await;

    let order = order_service::checkout(
        &state,
        &auth_user(&customer),
        checkout_request(&[(product.id, 3)], None),
    )
    .await
    .expect("checkout")
    .data
    .expect("order")
    .order;
    assert_eq!(stock_of(&state, product.id).await, 7);

    admin_service::update_order_status(&state, &admin, order.id, status_request(OrderStatus::Cancelled))
        .await
        .expect("cancel");
    assert_eq!(stock_of(&state, product.id).await, 10);

    let reopened = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        status_request(OrderStatus::Processing),
    )
    .await
    .expect("reopen")
    .data
    .expect("order");
    assert_eq!(reopened.status, OrderStatus::Processing);
    assert!(reopened.cancelled_at.is_none());
    assert!(reopened.cancel_reason.is_none());
    assert_eq!(stock_of(&state, product.id).await, 7);

    admin_service::update_order_status(&state, &admin, order.id, status_request(OrderStatus::Cancelled))
        .await
        .expect("cancel again");
    assert_eq!(stock_of(&state, product.id).await, 10);
}

#[tokio::test]
async fn reopen_fails_when_stock_was_sold_meanwhile() {
    let state = common::test_state().await;
    let first = create_user(&state, UserRole::Customer, "first@example.com").await;
    let second = create_user(&state, UserRole::Customer, "second@example.com").await;
    let admin = auth_user(&create_user(&state, UserRole::Admin, "admin@example.com").await);
    let product = create_product(&state, NewProduct::default()).await;

    let order = order_service::checkout(
        &state,
        &auth_user(&first),
        checkout_request(&[(product.id, 3)], None),
    )
    .await
    .expect("checkout")
    .data
    .expect("order")
    .order;
    admin_service::update_order_status(&state, &admin, order.id, status_request(OrderStatus::Cancelled))
        .await
        .expect("cancel");

    order_service::checkout(
        &state,
        &auth_user(&second),
        checkout_request(&[(product.id, 9)], None),
    )
    .await
    .expect("second checkout");
    assert_eq!(stock_of(&state, product.id).await, 1);

    let err = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        status_request(OrderStatus::Processing),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref msg) if msg.contains("Insufficient stock")));
    assert_eq!(stock_of(&state, product.id).await, 1);

    let stored = Orders::find_by_id(order.id)
        .one(&state.orm)
        .await
        .expect("query")
        .expect("order");
    assert_eq!(stored.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn oversized_order_total_is_rejected() {
    let state = common::test_state().await;
    let customer = create_user(&state, UserRole::Customer, "parent@example.com").await;
    let pricey = create_product(
        &state,
        NewProduct {
            price: 1_000_000_000_000_000_000,
            ..Default::default()
        },
    )
    .await;

    let err = order_service::checkout(
        &state,
        &auth_user(&customer),
        checkout_request(&[(pricey.id, 1)], None),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(ref msg) if msg == "Order total is too large"));
    assert_eq!(stock_of(&state, pricey.id).await, 10);
    assert_eq!(Orders::find().count(&state.orm).await.expect("count"), 0);
}

#[tokio::test]
async fn discount_for_other_categories_is_rejected_and_not_counted() {
    let state = common::test_state().await;
    let customer = create_user(&state, UserRole::Customer, "parent@example.com").await;
    let toy = create_product(&state, NewProduct::default()).await;
    let discount = common::create_discount(&state, "FEED20", DiscountType::Percentage, 20).await;
    let mut active: DiscountActive = discount.clone().into();
    active.applicable_categories = Set(serde_json::json!(["Feeding"]));
    active.usage_limit = Set(Some(1));
    active.update(&state.orm).await.expect("update discount");

    let err = order_service::checkout(
        &state,
        &auth_user(&customer),
        checkout_request(&[(toy.id, 2)], Some("FEED20")),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        AppError::BadRequest(ref msg) if msg == "Discount does not apply to any item in this order"
    ));
    let used = Discounts::find_by_id(discount.id)
        .one(&state.orm)
        .await
        .expect("query")
        .expect("discount")
        .used_count;
    assert_eq!(used, 0);
    assert_eq!(stock_of(&state, toy.id).await, 10);
    assert_eq!(Orders::find().count(&state.orm).await.expect("count"), 0);
}

#[tokio::test]
async fn delivered_status_stamps_delivery_time() {
    let state = common::test_state().await;
    let customer = create_user(&state, UserRole::Customer, "parent@example.com").await;
    let admin = auth_user(&create_user(&state, UserRole::Admin, "admin@example.com").await);
    let product = create_product(&state, NewProduct::default()).await;

    let order = order_service::checkout(
        &state,
        &auth_user(&customer),
        checkout_request(&[(product.id, 1)], None),
    )
    .await
    .expect("checkout")
    .data
    .expect("order")
    .order;

    let delivered = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        status_request(OrderStatus::Delivered),
    )
    .await
    .expect("deliver")
    .data
    .expect("order");

    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert!(delivered.delivered_at.is_some());
    assert_eq!(delivered.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn checkout_and_cancel_over_http() {
    let state = common::test_state().await;
    let customer = create_user(&state, UserRole::Customer, "parent@example.com").await;
    let token = common::bearer(&state, &customer);
    let product = create_product(&state, NewProduct::default()).await;

    let (status, body) = common::send(
        &state,
        Method::POST,
        "/api/orders",
        Some(&token),
        Some(checkout_body(&[(product.id, 2), (product.id, 1)], None)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["items"][0]["quantity"], 3);
    assert_eq!(body["data"]["order"]["status"], "Pending");
    let order_id = body["data"]["order"]["id"].as_str().expect("id").to_string();
    assert_eq!(stock_of(&state, product.id).await, 7);

    let (status, body) = common::send(
        &state,
        Method::GET,
        "/api/orders/my-orders",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 1);

    let uri = format!("/api/orders/{order_id}/cancel");
    let (status, body) = common::send(
        &state,
        Method::PUT,
        &uri,
        Some(&token),
        Some(serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order"]["status"], "Cancelled");
    assert_eq!(stock_of(&state, product.id).await, 10);

    let (status, _) = common::send(
        &state,
        Method::PUT,
        &uri,
        Some(&token),
        Some(serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
