use chrono::Utc;
use sea_orm::sea_query::{Alias, Expr, Func, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        admin::{
            CreateSupplierRequest, CreateWarehouseRequest, DashboardStats, InventoryAdjustRequest,
            SupplierList, UpdateOrderStatusRequest, UpdatePaymentRequest, UpdateShippingRequest,
            UpdateSupplierRequest, UpdateUserRequest, UpdateWarehouseRequest, UserList,
            WarehouseList,
        },
        orders::{OrderList, OrderWithItems},
        products::ProductList,
    },
    entity::{
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
            OrderStatus, PaymentStatus,
        },
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
        suppliers::{self, Column as SupplierCol, Entity as Suppliers, PartnerStatus},
        users::{self, Column as UserCol, Entity as Users, UserRole},
        warehouses::{self, Column as WarehouseCol, Entity as Warehouses},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, Product, Supplier, User, Warehouse},
    response::{Ack, ApiResponse, Meta},
    routes::params::{OrderListQuery, PageQuery, PaymentListQuery, SortOrder, UserListQuery},
    services::order_service::{load_items, reserve_stock, restore_stock},
    state::AppState,
};

const RECENT_ORDERS: u64 = 5;

pub async fn dashboard(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<DashboardStats>> {
    ensure_admin(user)?;

    let total_customers = Users::find()
        .filter(UserCol::Role.eq(UserRole::Customer))
        .count(&state.orm)
        .await?;
    let total_products = Products::find()
        .filter(ProdCol::IsActive.eq(true))
        .count(&state.orm)
        .await?;
    let total_orders = Orders::find().count(&state.orm).await?;
    let pending_orders = Orders::find()
        .filter(OrderCol::Status.eq(OrderStatus::Pending))
        .count(&state.orm)
        .await?;
    let low_stock_products = Products::find()
        .filter(ProdCol::IsActive.eq(true))
        .filter(Expr::col(ProdCol::Stock).lte(Expr::col(ProdCol::MinStock)))
        .count(&state.orm)
        .await?;

    // SUM over BIGINT is NUMERIC on Postgres; cast back so both backends decode an i64.
    let revenue_sum = Func::cast_as(
        Func::coalesce([Expr::col(OrderCol::Total).sum(), Expr::val(0i64).into()]),
        Alias::new("BIGINT"),
    );
    let revenue = Orders::find()
        .select_only()
        .column_as(Expr::expr(revenue_sum), "revenue")
        .filter(OrderCol::Status.ne(OrderStatus::Cancelled))
        .into_tuple::<i64>()
        .one(&state.orm)
        .await?
        .unwrap_or(0);

    let recent_orders = Orders::find()
        .order_by_desc(OrderCol::CreatedAt)
        .limit(RECENT_ORDERS)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    Ok(ApiResponse::ok(
        "Dashboard",
        DashboardStats {
            total_customers,
            total_products,
            total_orders,
            pending_orders,
            low_stock_products,
            revenue,
            recent_orders,
        },
    ))
}

// Users

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    query: UserListQuery,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let pagination = query.pagination();

    let mut condition = Condition::all();
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        condition = condition.add(
            Condition::any()
                .add(Expr::expr(Func::lower(Expr::col(UserCol::Name))).like(pattern.clone()))
                .add(Expr::expr(Func::lower(Expr::col(UserCol::Email))).like(pattern)),
        );
    }
    if let Some(role) = query.role {
        condition = condition.add(UserCol::Role.eq(role));
    }

    let finder = Users::find()
        .filter(condition)
        .order_by_desc(UserCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await?;
    let items = finder
        .limit(pagination.limit())
        .offset(pagination.offset())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(User::from)
        .collect();

    Ok(ApiResponse::success(
        "Users",
        UserList { items },
        Some(Meta::paged(&pagination, total)),
    ))
}

async fn find_user(state: &AppState, id: Uuid) -> AppResult<users::Model> {
    match Users::find_by_id(id).one(&state.orm).await? {
        Some(u) => Ok(u),
        None => Err(AppError::NotFound),
    }
}

pub async fn get_user(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let model = find_user(state, id).await?;
    Ok(ApiResponse::ok("User", User::from(model)))
}

pub async fn update_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let model = find_user(state, id).await?;

    if model.id == user.user_id
        && (payload.is_active == Some(false) || payload.role == Some(UserRole::Customer))
    {
        return Err(AppError::bad_request(
            "You cannot deactivate or demote your own account",
        ));
    }

    let mut active: users::ActiveModel = model.into();
    if let Some(role) = payload.role {
        active.role = Set(role);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(Utc::now().fixed_offset());
    let model = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "user_update",
        "users",
        serde_json::json!({ "user_id": model.id, "role": model.role, "is_active": model.is_active }),
    )
    .await;

    Ok(ApiResponse::ok("User updated", User::from(model)))
}

/// Hard delete, refused for admins and for anyone with order history.
pub async fn delete_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Ack>> {
    ensure_admin(user)?;
    let model = find_user(state, id).await?;

    if model.is_admin() {
        return Err(AppError::bad_request("Admin accounts cannot be deleted"));
    }
    let orders = Orders::find()
        .filter(OrderCol::UserId.eq(model.id))
        .count(&state.orm)
        .await?;
    if orders > 0 {
        return Err(AppError::bad_request(
            "Users with existing orders cannot be deleted",
        ));
    }

    Users::delete_by_id(model.id).exec(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "user_delete",
        "users",
        serde_json::json!({ "user_id": id, "email": model.email }),
    )
    .await;

    Ok(ApiResponse::ok("User deleted", Ack { id: Some(id) }))
}

// Orders

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let pagination = query.pagination();

    let mut condition = Condition::all();
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

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let order = match Orders::find_by_id(id).one(&state.orm).await? {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = load_items(&state.orm, order.id).await?;
    Ok(ApiResponse::ok(
        "Order found",
        OrderWithItems {
            order: Order::from(order),
            items: items.into_iter().map(Into::into).collect(),
        },
    ))
}

/// Admin status change. Any transition is allowed; moving a live order to
/// Cancelled puts its stock back in the same transaction, and reopening a
/// cancelled order takes it out again.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    let existing = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let previous = existing.status;
    let reopened = previous == OrderStatus::Cancelled && payload.status != OrderStatus::Cancelled;
    if payload.status == OrderStatus::Cancelled && previous != OrderStatus::Cancelled {
        restore_stock(&txn, existing.id).await?;
    } else if reopened {
        reserve_stock(&txn, existing.id).await?;
    }

    let reason = payload
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    let mut active: OrderActive = existing.into();
    active.apply_status(payload.status, reason, Utc::now().fixed_offset());
    if reopened {
        active.cancelled_at = Set(None);
        active.cancel_reason = Set(None);
    }
    if payload.tracking_number.is_some() {
        active.tracking_number = Set(payload.tracking_number);
    }
    if payload.carrier.is_some() {
        active.carrier = Set(payload.carrier);
    }
    let order = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(order_id = %order.id, from = ?previous, to = ?order.status, "order status updated");
    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": previous, "to": order.status }),
    )
    .await;

    Ok(ApiResponse::ok("Order updated", Order::from(order)))
}

// Inventory

pub async fn list_inventory(
    state: &AppState,
    user: &AuthUser,
    query: PageQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let pagination = query.pagination();

    let finder = Products::find().order_by_asc(ProdCol::Name);
    let total = finder.clone().count(&state.orm).await?;
    let items = finder
        .limit(pagination.limit())
        .offset(pagination.offset())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::success(
        "Inventory",
        ProductList { items },
        Some(Meta::paged(&pagination, total)),
    ))
}

/// Active products at or below their own `min_stock`.
pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: PageQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let pagination = query.pagination();

    let finder = Products::find()
        .filter(ProdCol::IsActive.eq(true))
        .filter(Expr::col(ProdCol::Stock).lte(Expr::col(ProdCol::MinStock)))
        .order_by_asc(ProdCol::Stock)
        .order_by_desc(ProdCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await?;
    let items = finder
        .limit(pagination.limit())
        .offset(pagination.offset())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::success(
        "Low stock",
        ProductList { items },
        Some(Meta::paged(&pagination, total)),
    ))
}

pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.delta == 0 {
        return Err(AppError::bad_request("delta must not be 0"));
    }

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let new_stock = match product.stock.checked_add(payload.delta) {
        Some(stock) if stock >= 0 => stock,
        _ => return Err(AppError::bad_request("Stock cannot be negative")),
    };

    let previous = product.stock;
    let mut active: ProductActive = product.into();
    active.stock = Set(new_stock);
    active.updated_at = Set(Utc::now().fixed_offset());
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "inventory_adjust",
        "products",
        serde_json::json!({
            "product_id": updated.id,
            "from": previous,
            "to": updated.stock,
            "reason": payload.reason,
        }),
    )
    .await;

    Ok(ApiResponse::ok("Inventory updated", Product::from(updated)))
}

// Suppliers

pub async fn list_suppliers(
    state: &AppState,
    user: &AuthUser,
    query: PageQuery,
) -> AppResult<ApiResponse<SupplierList>> {
    ensure_admin(user)?;
    let pagination = query.pagination();

    let finder = Suppliers::find().order_by_asc(SupplierCol::Name);
    let total = finder.clone().count(&state.orm).await?;
    let items = finder
        .limit(pagination.limit())
        .offset(pagination.offset())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Supplier::from)
        .collect();

    Ok(ApiResponse::success(
        "Suppliers",
        SupplierList { items },
        Some(Meta::paged(&pagination, total)),
    ))
}

async fn find_supplier(state: &AppState, id: Uuid) -> AppResult<suppliers::Model> {
    match Suppliers::find_by_id(id).one(&state.orm).await? {
        Some(s) => Ok(s),
        None => Err(AppError::NotFound),
    }
}

pub async fn get_supplier(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Supplier>> {
    ensure_admin(user)?;
    let supplier = find_supplier(state, id).await?;
    Ok(ApiResponse::ok("Supplier", Supplier::from(supplier)))
}

pub async fn create_supplier(
    state: &AppState,
    user: &AuthUser,
    payload: CreateSupplierRequest,
) -> AppResult<ApiResponse<Supplier>> {
    ensure_admin(user)?;
    let now = Utc::now().fixed_offset();
    let supplier = suppliers::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        contact_person: Set(payload.contact_person),
        email: Set(payload.email),
        phone: Set(payload.phone),
        address: Set(payload.address),
        status: Set(payload.status.unwrap_or(PartnerStatus::Active)),
        notes: Set(payload.notes),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "supplier_create",
        "suppliers",
        serde_json::json!({ "supplier_id": supplier.id }),
    )
    .await;

    Ok(ApiResponse::ok("Supplier created", Supplier::from(supplier)))
}

pub async fn update_supplier(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateSupplierRequest,
) -> AppResult<ApiResponse<Supplier>> {
    ensure_admin(user)?;
    let existing = find_supplier(state, id).await?;

    let mut active: suppliers::ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if payload.contact_person.is_some() {
        active.contact_person = Set(payload.contact_person);
    }
    if payload.email.is_some() {
        active.email = Set(payload.email);
    }
    if payload.phone.is_some() {
        active.phone = Set(payload.phone);
    }
    if payload.address.is_some() {
        active.address = Set(payload.address);
    }
    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    if payload.notes.is_some() {
        active.notes = Set(payload.notes);
    }
    active.updated_at = Set(Utc::now().fixed_offset());
    let supplier = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "supplier_update",
        "suppliers",
        serde_json::json!({ "supplier_id": supplier.id }),
    )
    .await;

    Ok(ApiResponse::ok("Supplier updated", Supplier::from(supplier)))
}

pub async fn delete_supplier(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Ack>> {
    ensure_admin(user)?;
    find_supplier(state, id).await?;

    let linked = Products::find()
        .filter(ProdCol::SupplierId.eq(id))
        .count(&state.orm)
        .await?;
    if linked > 0 {
        return Err(AppError::bad_request(format!(
            "Supplier is referenced by {linked} products"
        )));
    }

    Suppliers::delete_by_id(id).exec(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "supplier_delete",
        "suppliers",
        serde_json::json!({ "supplier_id": id }),
    )
    .await;

    Ok(ApiResponse::ok("Supplier deleted", Ack { id: Some(id) }))
}

// Warehouses

pub async fn list_warehouses(
    state: &AppState,
    user: &AuthUser,
    query: PageQuery,
) -> AppResult<ApiResponse<WarehouseList>> {
    ensure_admin(user)?;
    let pagination = query.pagination();

    let finder = Warehouses::find().order_by_asc(WarehouseCol::Code);
    let total = finder.clone().count(&state.orm).await?;
    let items = finder
        .limit(pagination.limit())
        .offset(pagination.offset())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Warehouse::from)
        .collect();

    Ok(ApiResponse::success(
        "Warehouses",
        WarehouseList { items },
        Some(Meta::paged(&pagination, total)),
    ))
}

async fn find_warehouse(state: &AppState, id: Uuid) -> AppResult<warehouses::Model> {
    match Warehouses::find_by_id(id).one(&state.orm).await? {
        Some(w) => Ok(w),
        None => Err(AppError::NotFound),
    }
}

async fn ensure_warehouse_code_free(
    state: &AppState,
    code: &str,
    except: Option<Uuid>,
) -> AppResult<()> {
    let mut finder = Warehouses::find().filter(WarehouseCol::Code.eq(code));
    if let Some(id) = except {
        finder = finder.filter(WarehouseCol::Id.ne(id));
    }
    if finder.one(&state.orm).await?.is_some() {
        return Err(AppError::bad_request(format!(
            "Warehouse code {code} already exists"
        )));
    }
    Ok(())
}

pub async fn get_warehouse(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Warehouse>> {
    ensure_admin(user)?;
    let warehouse = find_warehouse(state, id).await?;
    Ok(ApiResponse::ok("Warehouse", Warehouse::from(warehouse)))
}

pub async fn create_warehouse(
    state: &AppState,
    user: &AuthUser,
    payload: CreateWarehouseRequest,
) -> AppResult<ApiResponse<Warehouse>> {
    ensure_admin(user)?;
    let code = payload.code.trim().to_uppercase();
    ensure_warehouse_code_free(state, &code, None).await?;

    let now = Utc::now().fixed_offset();
    let warehouse = warehouses::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        code: Set(code),
        address: Set(payload.address),
        capacity: Set(payload.capacity),
        manager: Set(payload.manager),
        status: Set(payload.status.unwrap_or(PartnerStatus::Active)),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "warehouse_create",
        "warehouses",
        serde_json::json!({ "warehouse_id": warehouse.id, "code": warehouse.code }),
    )
    .await;

    Ok(ApiResponse::ok("Warehouse created", Warehouse::from(warehouse)))
}

pub async fn update_warehouse(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateWarehouseRequest,
) -> AppResult<ApiResponse<Warehouse>> {
    ensure_admin(user)?;
    let existing = find_warehouse(state, id).await?;

    let code = payload.code.map(|c| c.trim().to_uppercase());
    if let Some(code) = &code {
        ensure_warehouse_code_free(state, code, Some(existing.id)).await?;
    }

    let mut active: warehouses::ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(code) = code {
        active.code = Set(code);
    }
    if payload.address.is_some() {
        active.address = Set(payload.address);
    }
    if payload.capacity.is_some() {
        active.capacity = Set(payload.capacity);
    }
    if payload.manager.is_some() {
        active.manager = Set(payload.manager);
    }
    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    active.updated_at = Set(Utc::now().fixed_offset());
    let warehouse = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "warehouse_update",
        "warehouses",
        serde_json::json!({ "warehouse_id": warehouse.id }),
    )
    .await;

    Ok(ApiResponse::ok("Warehouse updated", Warehouse::from(warehouse)))
}

pub async fn delete_warehouse(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Ack>> {
    ensure_admin(user)?;
    find_warehouse(state, id).await?;

    let linked = Products::find()
        .filter(ProdCol::WarehouseId.eq(id))
        .count(&state.orm)
        .await?;
    if linked > 0 {
        return Err(AppError::bad_request(format!(
            "Warehouse is referenced by {linked} products"
        )));
    }

    Warehouses::delete_by_id(id).exec(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "warehouse_delete",
        "warehouses",
        serde_json::json!({ "warehouse_id": id }),
    )
    .await;

    Ok(ApiResponse::ok("Warehouse deleted", Ack { id: Some(id) }))
}

// Payments

pub async fn list_payments(
    state: &AppState,
    user: &AuthUser,
    query: PaymentListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let pagination = query.pagination();

    let mut finder = Orders::find();
    if let Some(payment_status) = query.payment_status {
        finder = finder.filter(OrderCol::PaymentStatus.eq(payment_status));
    }
    let finder = finder.order_by_desc(OrderCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await?;
    let items = finder
        .limit(pagination.limit())
        .offset(pagination.offset())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    Ok(ApiResponse::success(
        "Payments",
        OrderList { items },
        Some(Meta::paged(&pagination, total)),
    ))
}

async fn find_order(state: &AppState, id: Uuid) -> AppResult<OrderModel> {
    match Orders::find_by_id(id).one(&state.orm).await? {
        Some(o) => Ok(o),
        None => Err(AppError::NotFound),
    }
}

pub async fn update_payment(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: UpdatePaymentRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let order = find_order(state, order_id).await?;

    if order.status == OrderStatus::Cancelled && payload.payment_status == PaymentStatus::Paid {
        return Err(AppError::bad_request("Cancelled orders cannot be marked as paid"));
    }

    let previous = order.payment_status;
    let mut active: OrderActive = order.into();
    active.payment_status = Set(payload.payment_status);
    active.updated_at = Set(Utc::now().fixed_offset());
    let order = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "payment_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": previous, "to": order.payment_status }),
    )
    .await;

    Ok(ApiResponse::ok("Payment updated", Order::from(order)))
}

// Shipping

pub async fn list_shipping(
    state: &AppState,
    user: &AuthUser,
    query: PageQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let pagination = query.pagination();

    let finder = Orders::find()
        .filter(OrderCol::Status.is_in([OrderStatus::Processing, OrderStatus::Shipped]))
        .order_by_asc(OrderCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await?;
    let items = finder
        .limit(pagination.limit())
        .offset(pagination.offset())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    Ok(ApiResponse::success(
        "Shipments",
        OrderList { items },
        Some(Meta::paged(&pagination, total)),
    ))
}

pub async fn update_shipping(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: UpdateShippingRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    if let Some(status) = payload.status {
        if !matches!(status, OrderStatus::Shipped | OrderStatus::Delivered) {
            return Err(AppError::bad_request(
                "Shipping status must be Shipped or Delivered",
            ));
        }
    }

    let order = find_order(state, order_id).await?;
    if order.status == OrderStatus::Cancelled {
        return Err(AppError::bad_request("Cancelled orders cannot be shipped"));
    }

    let mut active: OrderActive = order.into();
    if payload.tracking_number.is_some() {
        active.tracking_number = Set(payload.tracking_number);
    }
    if payload.carrier.is_some() {
        active.carrier = Set(payload.carrier);
    }
    let now = Utc::now().fixed_offset();
    match payload.status {
        Some(status) => active.apply_status(status, None, now),
        None => active.updated_at = Set(now),
    }
    let order = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "shipping_update",
        "orders",
        serde_json::json!({
            "order_id": order.id,
            "status": order.status,
            "tracking_number": order.tracking_number,
        }),
    )
    .await;

    Ok(ApiResponse::ok("Shipping updated", Order::from(order)))
}
