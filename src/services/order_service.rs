use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::orders::{CancelOrderRequest, CheckoutRequest, OrderLineRequest, OrderList, OrderWithItems},
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
            OrderStatus, PaymentStatus,
        },
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    extract::field_errors,
    middleware::auth::AuthUser,
    models::{Order, OrderItem},
    pricing::OrderTotals,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::discount_service,
    state::AppState,
};

/// Collapse repeated products into one line each, keeping first-seen order.
pub fn merge_lines(items: &[OrderLineRequest]) -> AppResult<Vec<(Uuid, i32)>> {
    let mut merged: Vec<(Uuid, i32)> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity < 1 {
            return Err(AppError::bad_request("Quantity must be at least 1"));
        }
        match merged.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, quantity)) => {
                *quantity = quantity
                    .checked_add(item.quantity)
                    .ok_or_else(|| AppError::bad_request("Quantity is too large"))?;
            }
            None => merged.push((item.product_id, item.quantity)),
        }
    }
    Ok(merged)
}

pub fn build_order_number(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = order_id.simple().to_string().to_uppercase();
    format!("BK-{}-{}", date, &suffix[..8])
}

pub async fn load_items<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> AppResult<Vec<OrderItemModel>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?)
}

/// Put every line's quantity back on its product. Runs on the caller's
/// transaction; the caller must already hold the order row lock.
pub async fn restore_stock<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> AppResult<Vec<OrderItemModel>> {
    let items = load_items(conn, order_id).await?;
    for item in &items {
        let result = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
            .filter(ProdCol::Id.eq(item.product_id))
            .exec(conn)
            .await?;
        if result.rows_affected == 0 {
            tracing::warn!(product_id = %item.product_id, "stock restore skipped, product missing");
        }
    }
    Ok(items)
}

/// Take every line's quantity off its product again when a cancelled order is
/// reopened. Fails without touching stock if any product is short.
pub async fn reserve_stock<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> AppResult<Vec<OrderItemModel>> {
    let items = load_items(conn, order_id).await?;
    let ids: Vec<Uuid> = items.iter().map(|item| item.product_id).collect();
    let products: HashMap<Uuid, ProductModel> = Products::find()
        .filter(ProdCol::Id.is_in(ids))
        .lock(LockType::Update)
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut needed: HashMap<Uuid, i32> = HashMap::new();
    for item in &items {
        *needed.entry(item.product_id).or_insert(0) += item.quantity;
    }
    for (product_id, quantity) in &needed {
        match products.get(product_id) {
            Some(p) if p.stock >= *quantity => {}
            Some(p) => {
                return Err(AppError::bad_request(format!(
                    "Insufficient stock for {} (available: {})",
                    p.name, p.stock
                )));
            }
            None => {
                return Err(AppError::bad_request(format!(
                    "Product {} no longer exists",
                    product_id
                )));
            }
        }
    }

    for (product_id, quantity) in needed {
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(quantity))
            .filter(ProdCol::Id.eq(product_id))
            .exec(conn)
            .await?;
    }
    Ok(items)
}

fn with_items(order: OrderModel, items: Vec<OrderItemModel>) -> OrderWithItems {
    OrderWithItems {
        order: Order::from(order),
        items: items.into_iter().map(OrderItem::from).collect(),
    }
}

pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    payload
        .shipping_address
        .validate()
        .map_err(|errors| AppError::Validation(field_errors(&errors)))?;
    let lines = merge_lines(&payload.items)?;
    if lines.is_empty() {
        return Err(AppError::bad_request("Order must contain at least one item"));
    }

    let txn = state.orm.begin().await?;

    let ids: Vec<Uuid> = lines.iter().map(|(id, _)| *id).collect();
    let products: HashMap<Uuid, ProductModel> = Products::find()
        .filter(ProdCol::Id.is_in(ids))
        .lock(LockType::Update)
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut priced: Vec<(&ProductModel, i32)> = Vec::with_capacity(lines.len());
    for (product_id, quantity) in &lines {
        let product = match products.get(product_id) {
            Some(p) if p.is_active => p,
            _ => {
                return Err(AppError::bad_request(format!(
                    "Product {} is not available",
                    product_id
                )));
            }
        };
        if product.stock < *quantity {
            return Err(AppError::bad_request(format!(
                "Insufficient stock for {} (available: {})",
                product.name, product.stock
            )));
        }
        priced.push((product, *quantity));
    }

    let totals = OrderTotals::compute(priced.iter().map(|(p, q)| (p.price, *q)))
        .ok_or_else(|| AppError::bad_request("Order total is too large"))?;

    let requested_code = payload
        .discount_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let (discount_code, totals) = match requested_code {
        Some(code) => {
            let category_lines = priced
                .iter()
                .map(|(p, q)| {
                    (p.category.as_str(), p.price.saturating_mul(i64::from(*q)))
                });
            let (discount, amount) =
                discount_service::redeem(&txn, code, user.user_id, category_lines).await?;
            (Some(discount.code), totals.with_discount(amount))
        }
        None => (None, totals),
    };

    let now = Utc::now().fixed_offset();
    let order_id = Uuid::new_v4();
    let address = payload.shipping_address;

    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        order_number: Set(build_order_number(order_id)),
        shipping_name: Set(address.name),
        shipping_phone: Set(address.phone),
        shipping_street: Set(address.street),
        shipping_city: Set(address.city),
        shipping_state: Set(address.state),
        shipping_postal_code: Set(address.postal_code),
        shipping_country: Set(address.country),
        payment_method: Set(payload.payment_method),
        payment_status: Set(PaymentStatus::Pending),
        status: Set(OrderStatus::Pending),
        subtotal: Set(totals.subtotal),
        shipping_cost: Set(totals.shipping_cost),
        tax: Set(totals.tax),
        discount_code: Set(discount_code),
        discount_amount: Set(totals.discount),
        total: Set(totals.total),
        notes: Set(payload.notes),
        tracking_number: Set(None),
        carrier: Set(None),
        delivered_at: Set(None),
        cancelled_at: Set(None),
        cancel_reason: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItemModel> = Vec::with_capacity(priced.len());
    for (product, quantity) in &priced {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            name: Set(product.name.clone()),
            price: Set(product.price),
            quantity: Set(*quantity),
            image: Set(product.first_image()),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;
        items.push(item);

        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(*quantity))
            .col_expr(ProdCol::UpdatedAt, Expr::value(now))
            .filter(ProdCol::Id.eq(product.id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total = order.total,
        "checkout"
    );
    audit::record(
        &state.orm,
        Some(user.user_id),
        "checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "total": order.total }),
    )
    .await;

    Ok(ApiResponse::ok("Order placed", with_items(order, items)))
}

pub async fn my_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let pagination = query.pagination();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await?;

    let orders = finder
        .limit(pagination.limit())
        .offset(pagination.offset())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(Meta::paged(&pagination, total)),
    ))
}

/// Owners see their own orders; admins see any.
pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = match Orders::find_by_id(id).one(&state.orm).await? {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };
    if order.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::Forbidden);
    }

    let items = load_items(&state.orm, order.id).await?;
    Ok(ApiResponse::ok("OK", with_items(order, items)))
}

/// Customer cancellation: only the owner, only while Pending. The order row is
/// locked for the whole transaction so a repeated request sees `Cancelled`
/// and stock is restored once.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: CancelOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    if order.status != OrderStatus::Pending {
        return Err(AppError::bad_request(format!(
            "Only pending orders can be cancelled (current status: {:?})",
            order.status
        )));
    }

    let items = restore_stock(&txn, order.id).await?;

    let was_paid = order.payment_status == PaymentStatus::Paid;
    let reason = payload
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    let mut active: OrderActive = order.into();
    active.apply_status(OrderStatus::Cancelled, reason, Utc::now().fixed_offset());
    if was_paid {
        active.payment_status = Set(PaymentStatus::Refunded);
    }
    let order = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(order_id = %order.id, "order_cancel");
    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_cancel",
        "orders",
        serde_json::json!({ "order_id": order.id, "reason": order.cancel_reason }),
    )
    .await;

    Ok(ApiResponse::ok("Order cancelled", with_items(order, items)))
}
