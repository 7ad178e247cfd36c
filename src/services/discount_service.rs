use chrono::Utc;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::discounts::{
        CreateDiscountRequest, DiscountList, DiscountQuote, UpdateDiscountRequest,
        ValidateDiscountRequest,
    },
    entity::{
        Orders,
        discounts::{
            ActiveModel, Column, CustomerEligibility, CustomerType, DiscountStatus, DiscountType,
            Entity as Discounts, Model as DiscountModel,
        },
        orders::Column as OrderCol,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Discount,
    response::{Ack, ApiResponse, Meta},
    routes::params::DiscountListQuery,
    state::AppState,
};

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub async fn find_by_code<C: ConnectionTrait>(
    conn: &C,
    code: &str,
) -> AppResult<Option<DiscountModel>> {
    Ok(Discounts::find()
        .filter(Column::Code.eq(normalize_code(code)))
        .one(conn)
        .await?)
}

/// `New` until the customer has placed an order.
pub async fn customer_type_for<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<CustomerType> {
    let previous = Orders::find()
        .filter(OrderCol::UserId.eq(user_id))
        .count(conn)
        .await?;
    Ok(CustomerType::from_order_count(previous))
}

/// Part of the order a discount applies to: lines in one of its categories,
/// or everything when it is not category scoped.
pub fn discountable_value<'a, I>(discount: &DiscountModel, lines: I) -> i64
where
    I: IntoIterator<Item = (&'a str, i64)>,
{
    lines
        .into_iter()
        .filter(|(category, _)| discount.applies_to_category(category))
        .map(|(_, line_total)| line_total)
        .sum()
}

/// Bump `used_count` in place so concurrent redemptions cannot lose an update.
pub async fn increment_usage<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<()> {
    let result = Discounts::update_many()
        .col_expr(Column::UsedCount, Expr::col(Column::UsedCount).add(1))
        .col_expr(Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
        .filter(Column::Id.eq(id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Redeem `code` inside the caller's transaction: lock the discount row, check
/// eligibility, compute the amount and count the use. A code worth nothing on
/// this order is rejected and not counted.
///
/// `lines` are `(category, line total)` pairs of the order being placed.
pub async fn redeem<'a, C, I>(
    conn: &C,
    code: &str,
    user_id: Uuid,
    lines: I,
) -> AppResult<(DiscountModel, i64)>
where
    C: ConnectionTrait,
    I: IntoIterator<Item = (&'a str, i64)>,
{
    let discount = Discounts::find()
        .filter(Column::Code.eq(normalize_code(code)))
        .lock(LockType::Update)
        .one(conn)
        .await?;
    let discount = match discount {
        Some(d) => d,
        None => return Err(AppError::bad_request("Invalid discount code")),
    };

    let customer = customer_type_for(conn, user_id).await?;
    let value = discountable_value(&discount, lines);
    let now = Utc::now();

    discount
        .can_be_used(value, customer, now)
        .map_err(|reason| AppError::bad_request(reason.to_string()))?;
    let amount = discount.calculate_discount(value, customer, now);
    if amount <= 0 {
        return Err(AppError::bad_request(
            "Discount does not apply to any item in this order",
        ));
    }

    increment_usage(conn, discount.id).await?;
    tracing::info!(code = %discount.code, amount, "discount redeemed");

    Ok((discount, amount))
}

/// Quote a code against an order value without counting a use.
pub async fn validate(
    state: &AppState,
    user: &AuthUser,
    payload: ValidateDiscountRequest,
) -> AppResult<ApiResponse<DiscountQuote>> {
    let discount = match find_by_code(&state.orm, &payload.code).await? {
        Some(d) => d,
        None => return Err(AppError::bad_request("Invalid discount code")),
    };

    let customer = customer_type_for(&state.orm, user.user_id).await?;
    let now = Utc::now();
    discount
        .can_be_used(payload.order_value, customer, now)
        .map_err(|reason| AppError::bad_request(reason.to_string()))?;
    let discount_amount = discount.calculate_discount(payload.order_value, customer, now);

    Ok(ApiResponse::ok(
        "Discount is valid",
        DiscountQuote {
            code: discount.code,
            discount_type: discount.discount_type,
            order_value: payload.order_value,
            discount_amount,
            final_value: payload.order_value - discount_amount,
        },
    ))
}

fn check_rules(
    discount_type: DiscountType,
    value: i64,
    start: chrono::DateTime<Utc>,
    end: chrono::DateTime<Utc>,
) -> AppResult<()> {
    if discount_type == DiscountType::Percentage && !(1..=100).contains(&value) {
        return Err(AppError::bad_request(
            "Percentage discount must be between 1 and 100",
        ));
    }
    if end <= start {
        return Err(AppError::bad_request("End date must be after start date"));
    }
    Ok(())
}

fn clean_categories(categories: Vec<String>) -> serde_json::Value {
    let cleaned: Vec<String> = categories
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    serde_json::json!(cleaned)
}

pub async fn list_discounts(
    state: &AppState,
    user: &AuthUser,
    query: DiscountListQuery,
) -> AppResult<ApiResponse<DiscountList>> {
    ensure_admin(user)?;
    let pagination = query.pagination();

    let mut finder = Discounts::find();
    if let Some(status) = query.status {
        finder = finder.filter(Column::Status.eq(status));
    }
    let finder = finder.order_by_desc(Column::CreatedAt);

    let total = finder.clone().count(&state.orm).await?;
    let items = finder
        .limit(pagination.limit())
        .offset(pagination.offset())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Discount::from)
        .collect();

    Ok(ApiResponse::success(
        "Discounts",
        DiscountList { items },
        Some(Meta::paged(&pagination, total)),
    ))
}

pub async fn get_discount(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Discount>> {
    ensure_admin(user)?;
    match Discounts::find_by_id(id).one(&state.orm).await? {
        Some(d) => Ok(ApiResponse::ok("Discount", Discount::from(d))),
        None => Err(AppError::NotFound),
    }
}

pub async fn create_discount(
    state: &AppState,
    user: &AuthUser,
    payload: CreateDiscountRequest,
) -> AppResult<ApiResponse<Discount>> {
    ensure_admin(user)?;
    check_rules(
        payload.discount_type,
        payload.value,
        payload.start_date,
        payload.end_date,
    )?;

    let code = normalize_code(&payload.code);
    if find_by_code(&state.orm, &code).await?.is_some() {
        return Err(AppError::bad_request("Discount code already exists"));
    }

    let now = Utc::now().fixed_offset();
    let discount = ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code),
        description: Set(payload.description),
        discount_type: Set(payload.discount_type),
        value: Set(payload.value),
        usage_limit: Set(payload.usage_limit),
        used_count: Set(0),
        min_order_value: Set(payload.min_order_value.unwrap_or(0)),
        max_discount_amount: Set(payload.max_discount_amount),
        start_date: Set(payload.start_date.fixed_offset()),
        end_date: Set(payload.end_date.fixed_offset()),
        status: Set(payload.status.unwrap_or(DiscountStatus::Active)),
        applicable_categories: Set(clean_categories(
            payload.applicable_categories.unwrap_or_default(),
        )),
        customer_type: Set(payload.customer_type.unwrap_or(CustomerEligibility::All)),
        created_by: Set(Some(user.user_id)),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "discount_create",
        "discounts",
        serde_json::json!({ "discount_id": discount.id, "code": discount.code }),
    )
    .await;

    Ok(ApiResponse::ok("Discount created", Discount::from(discount)))
}

pub async fn update_discount(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateDiscountRequest,
) -> AppResult<ApiResponse<Discount>> {
    ensure_admin(user)?;
    let existing = match Discounts::find_by_id(id).one(&state.orm).await? {
        Some(d) => d,
        None => return Err(AppError::NotFound),
    };

    check_rules(
        payload.discount_type.unwrap_or(existing.discount_type),
        payload.value.unwrap_or(existing.value),
        payload
            .start_date
            .unwrap_or_else(|| existing.start_date.with_timezone(&Utc)),
        payload
            .end_date
            .unwrap_or_else(|| existing.end_date.with_timezone(&Utc)),
    )?;

    let mut active: ActiveModel = existing.into();
    if payload.description.is_some() {
        active.description = Set(payload.description);
    }
    if let Some(discount_type) = payload.discount_type {
        active.discount_type = Set(discount_type);
    }
    if let Some(value) = payload.value {
        active.value = Set(value);
    }
    if payload.usage_limit.is_some() {
        active.usage_limit = Set(payload.usage_limit);
    }
    if let Some(min_order_value) = payload.min_order_value {
        active.min_order_value = Set(min_order_value);
    }
    if payload.max_discount_amount.is_some() {
        active.max_discount_amount = Set(payload.max_discount_amount);
    }
    if let Some(start) = payload.start_date {
        active.start_date = Set(start.fixed_offset());
    }
    if let Some(end) = payload.end_date {
        active.end_date = Set(end.fixed_offset());
    }
    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    if let Some(categories) = payload.applicable_categories {
        active.applicable_categories = Set(clean_categories(categories));
    }
    if let Some(customer_type) = payload.customer_type {
        active.customer_type = Set(customer_type);
    }
    active.updated_at = Set(Utc::now().fixed_offset());
    let discount = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "discount_update",
        "discounts",
        serde_json::json!({ "discount_id": discount.id }),
    )
    .await;

    Ok(ApiResponse::ok("Discount updated", Discount::from(discount)))
}

pub async fn delete_discount(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Ack>> {
    ensure_admin(user)?;
    let result = Discounts::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "discount_delete",
        "discounts",
        serde_json::json!({ "discount_id": id }),
    )
    .await;

    Ok(ApiResponse::ok("Discount deleted", Ack { id: Some(id) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn scoped(categories: serde_json::Value) -> DiscountModel {
        let now = Utc::now();
        DiscountModel {
            id: Uuid::new_v4(),
            code: "TOYS10".into(),
            description: None,
            discount_type: DiscountType::Percentage,
            value: 10,
            usage_limit: None,
            used_count: 0,
            min_order_value: 0,
            max_discount_amount: None,
            start_date: (now - Duration::days(1)).fixed_offset(),
            end_date: (now + Duration::days(1)).fixed_offset(),
            status: DiscountStatus::Active,
            applicable_categories: categories,
            customer_type: CustomerEligibility::All,
            created_by: None,
            created_at: now.fixed_offset(),
            updated_at: now.fixed_offset(),
        }
    }

    #[test]
    fn unscoped_discount_covers_whole_order() {
        let d = scoped(serde_json::json!([]));
        let lines = [("Toys", 1000), ("Feeding", 500)];
        assert_eq!(discountable_value(&d, lines), 1500);
    }

    #[test]
    fn scoped_discount_covers_matching_lines_only() {
        let d = scoped(serde_json::json!(["toys"]));
        let lines = [("Toys", 1000), ("Feeding", 500), ("TOYS", 250)];
        assert_eq!(discountable_value(&d, lines), 1250);
    }

    #[test]
    fn rule_checks() {
        let start = Utc::now();
        let end = start + Duration::days(7);
        assert!(check_rules(DiscountType::Percentage, 20, start, end).is_ok());
        assert!(check_rules(DiscountType::Percentage, 101, start, end).is_err());
        assert!(check_rules(DiscountType::Percentage, 0, start, end).is_err());
        assert!(check_rules(DiscountType::Fixed, 5000, start, end).is_ok());
        assert!(check_rules(DiscountType::Fixed, 500, end, start).is_err());
    }

    #[test]
    fn codes_are_uppercased() {
        assert_eq!(normalize_code("  save20 "), "SAVE20");
    }
}
