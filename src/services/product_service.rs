use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::dto::products::{CreateProductRequest, ProductList, UpdateProductRequest};
use crate::{
    audit,
    entity::{
        Suppliers, Warehouses,
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{Ack, ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub const RELATED_LIMIT: usize = 8;
pub const FEATURED_LIMIT: u64 = 8;
const DEFAULT_MIN_STOCK: i32 = 5;
const DEFAULT_MAX_STOCK: i32 = 100;
const SKU_ATTEMPTS: usize = 5;

fn lower_eq(column: Column, value: &str) -> sea_orm::sea_query::SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column))).eq(value.trim().to_lowercase())
}

fn lower_like(column: Column, pattern: &str) -> sea_orm::sea_query::SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column))).like(pattern.to_lowercase())
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let pagination = query.pagination();
    let mut condition = Condition::all().add(Column::IsActive.eq(true));

    if let Some(search) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(lower_like(Column::Name, &pattern))
                .add(lower_like(Column::Description, &pattern)),
        );
    }

    if let Some(category) = query.category.as_deref().filter(|s| !s.trim().is_empty()) {
        condition = condition.add(lower_eq(Column::Category, category));
    }

    if let Some(age_group) = query.age_group.as_deref().filter(|s| !s.trim().is_empty()) {
        condition = condition.add(lower_eq(Column::AgeGroup, age_group));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    if let Some(featured) = query.featured {
        condition = condition.add(Column::IsFeatured.eq(featured));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await?;

    let items = finder
        .limit(pagination.limit())
        .offset(pagination.offset())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::paged(&pagination, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn featured_products(state: &AppState) -> AppResult<ApiResponse<ProductList>> {
    let items = Products::find()
        .filter(Column::IsActive.eq(true))
        .filter(Column::IsFeatured.eq(true))
        .order_by_desc(Column::CreatedAt)
        .limit(FEATURED_LIMIT)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::ok("Featured products", ProductList { items }))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let result = Products::find_by_id(id)
        .filter(Column::IsActive.eq(true))
        .one(&state.orm)
        .await?
        .map(Product::from);
    let result = match result {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::ok("Product", result))
}

/// Append `batch` to `picked`, skipping the source and anything already
/// picked, until `RELATED_LIMIT` is reached.
pub fn fill_related(picked: &mut Vec<ProductModel>, source_id: Uuid, batch: Vec<ProductModel>) {
    for product in batch {
        if picked.len() >= RELATED_LIMIT {
            break;
        }
        if product.id == source_id || picked.iter().any(|p| p.id == product.id) {
            continue;
        }
        picked.push(product);
    }
}

#[derive(Debug, Clone, Copy)]
enum RelatedPass {
    Category,
    AgeGroup,
    Latest,
}

/// Up to eight active products: same category first, then same age group,
/// then the newest products. Unknown or inactive sources give an empty list.
pub async fn related_products(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductList>> {
    let source = Products::find_by_id(id)
        .filter(Column::IsActive.eq(true))
        .one(&state.orm)
        .await?;
    let source = match source {
        Some(p) => p,
        None => {
            return Ok(ApiResponse::ok(
                "Related products",
                ProductList { items: Vec::new() },
            ));
        }
    };

    let mut picked: Vec<ProductModel> = Vec::with_capacity(RELATED_LIMIT);
    for pass in [RelatedPass::Category, RelatedPass::AgeGroup, RelatedPass::Latest] {
        let remaining = RELATED_LIMIT.saturating_sub(picked.len());
        if remaining == 0 {
            break;
        }

        let mut excluded: Vec<Uuid> = picked.iter().map(|p| p.id).collect();
        excluded.push(source.id);

        let mut condition = Condition::all()
            .add(Column::IsActive.eq(true))
            .add(Column::Id.is_not_in(excluded));
        match pass {
            RelatedPass::Category => {
                condition = condition.add(lower_eq(Column::Category, &source.category));
            }
            RelatedPass::AgeGroup => match source.age_group.as_deref() {
                Some(age_group) if !age_group.trim().is_empty() => {
                    condition = condition.add(lower_eq(Column::AgeGroup, age_group));
                }
                _ => continue,
            },
            RelatedPass::Latest => {}
        }

        let batch = Products::find()
            .filter(condition)
            .order_by_desc(Column::CreatedAt)
            .limit(remaining as u64)
            .all(&state.orm)
            .await?;
        fill_related(&mut picked, source.id, batch);
    }

    let items = picked.into_iter().map(Product::from).collect();
    Ok(ApiResponse::ok("Related products", ProductList { items }))
}

/// First three alphanumerics of the category, uppercased and padded with `X`.
pub fn sku_prefix(category: &str) -> String {
    let mut prefix: String = category
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    while prefix.len() < 3 {
        prefix.push('X');
    }
    prefix
}

pub fn generate_sku(category: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("{}-{}", sku_prefix(category), suffix)
}

async fn sku_taken(state: &AppState, sku: &str, except: Option<Uuid>) -> AppResult<bool> {
    let mut finder = Products::find().filter(Column::Sku.eq(sku));
    if let Some(id) = except {
        finder = finder.filter(Column::Id.ne(id));
    }
    Ok(finder.one(&state.orm).await?.is_some())
}

async fn ensure_sku_free(state: &AppState, sku: &str, except: Option<Uuid>) -> AppResult<()> {
    if sku_taken(state, sku, except).await? {
        return Err(AppError::bad_request(format!("SKU {sku} already exists")));
    }
    Ok(())
}

/// Draw SKUs from `generate` until one is not in use.
pub async fn unused_sku<F>(state: &AppState, mut generate: F) -> AppResult<String>
where
    F: FnMut() -> String,
{
    for _ in 0..SKU_ATTEMPTS {
        let sku = generate();
        if !sku_taken(state, &sku, None).await? {
            return Ok(sku);
        }
        tracing::debug!(%sku, "generated sku already taken");
    }
    Err(AppError::Internal(anyhow::anyhow!(
        "no free sku after {SKU_ATTEMPTS} attempts"
    )))
}

async fn ensure_partners_exist(
    state: &AppState,
    supplier_id: Option<Uuid>,
    warehouse_id: Option<Uuid>,
) -> AppResult<()> {
    if let Some(id) = supplier_id {
        if Suppliers::find_by_id(id).one(&state.orm).await?.is_none() {
            return Err(AppError::bad_request("Supplier not found"));
        }
    }
    if let Some(id) = warehouse_id {
        if Warehouses::find_by_id(id).one(&state.orm).await?.is_none() {
            return Err(AppError::bad_request("Warehouse not found"));
        }
    }
    Ok(())
}

fn check_stock_bounds(min_stock: i32, max_stock: i32) -> AppResult<()> {
    if min_stock > max_stock {
        return Err(AppError::bad_request(
            "Minimum stock cannot exceed maximum stock",
        ));
    }
    Ok(())
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    let min_stock = payload.min_stock.unwrap_or(DEFAULT_MIN_STOCK);
    let max_stock = payload.max_stock.unwrap_or(DEFAULT_MAX_STOCK);
    check_stock_bounds(min_stock, max_stock)?;
    ensure_partners_exist(state, payload.supplier_id, payload.warehouse_id).await?;

    let sku = match payload.sku.map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty()) {
        Some(sku) => {
            ensure_sku_free(state, &sku, None).await?;
            sku
        }
        None => unused_sku(state, || generate_sku(&payload.category)).await?,
    };

    let now = Utc::now().fixed_offset();
    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        description: Set(payload.description),
        category: Set(payload.category.trim().to_string()),
        age_group: Set(payload.age_group),
        brand: Set(payload.brand),
        price: Set(payload.price),
        original_price: Set(payload.original_price),
        stock: Set(payload.stock),
        min_stock: Set(min_stock),
        max_stock: Set(max_stock),
        sku: Set(Some(sku)),
        images: Set(serde_json::json!(payload.images.unwrap_or_default())),
        is_active: Set(true),
        is_featured: Set(payload.is_featured.unwrap_or(false)),
        supplier_id: Set(payload.supplier_id),
        warehouse_id: Set(payload.warehouse_id),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id, "sku": product.sku }),
    )
    .await;

    Ok(ApiResponse::ok("Product created", Product::from(product)))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    check_stock_bounds(
        payload.min_stock.unwrap_or(existing.min_stock),
        payload.max_stock.unwrap_or(existing.max_stock),
    )?;
    ensure_partners_exist(state, payload.supplier_id, payload.warehouse_id).await?;

    let sku = payload.sku.map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty());
    if let Some(sku) = &sku {
        ensure_sku_free(state, sku, Some(existing.id)).await?;
    }

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if payload.description.is_some() {
        active.description = Set(payload.description);
    }
    if let Some(category) = payload.category {
        active.category = Set(category.trim().to_string());
    }
    if payload.age_group.is_some() {
        active.age_group = Set(payload.age_group);
    }
    if payload.brand.is_some() {
        active.brand = Set(payload.brand);
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if payload.original_price.is_some() {
        active.original_price = Set(payload.original_price);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(min_stock) = payload.min_stock {
        active.min_stock = Set(min_stock);
    }
    if let Some(max_stock) = payload.max_stock {
        active.max_stock = Set(max_stock);
    }
    if sku.is_some() {
        active.sku = Set(sku);
    }
    if let Some(images) = payload.images {
        active.images = Set(serde_json::json!(images));
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(is_featured) = payload.is_featured {
        active.is_featured = Set(is_featured);
    }
    if payload.supplier_id.is_some() {
        active.supplier_id = Set(payload.supplier_id);
    }
    if payload.warehouse_id.is_some() {
        active.warehouse_id = Set(payload.warehouse_id);
    }
    active.updated_at = Set(Utc::now().fixed_offset());

    let product = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::ok("Product updated", Product::from(product)))
}

/// Soft delete: the row stays so historical order lines keep their reference.
pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Ack>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let mut active: ActiveModel = existing.into();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now().fixed_offset());
    active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::ok("Product deleted", Ack { id: Some(id) }))
}
