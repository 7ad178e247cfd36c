use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::entity::discounts::{CustomerEligibility, DiscountStatus, DiscountType};
use crate::models::Discount;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateDiscountRequest {
    #[validate(length(min = 3, max = 30, message = "Code must be 3-30 characters"))]
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    #[validate(range(min = 1, message = "Value must be positive"))]
    pub value: i64,
    #[validate(range(min = 1))]
    pub usage_limit: Option<i32>,
    #[validate(range(min = 0))]
    pub min_order_value: Option<i64>,
    #[validate(range(min = 1))]
    pub max_discount_amount: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: Option<DiscountStatus>,
    pub applicable_categories: Option<Vec<String>>,
    pub customer_type: Option<CustomerEligibility>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateDiscountRequest {
    pub description: Option<String>,
    pub discount_type: Option<DiscountType>,
    #[validate(range(min = 1, message = "Value must be positive"))]
    pub value: Option<i64>,
    #[validate(range(min = 1))]
    pub usage_limit: Option<i32>,
    #[validate(range(min = 0))]
    pub min_order_value: Option<i64>,
    #[validate(range(min = 1))]
    pub max_discount_amount: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<DiscountStatus>,
    pub applicable_categories: Option<Vec<String>>,
    pub customer_type: Option<CustomerEligibility>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ValidateDiscountRequest {
    #[validate(length(min = 1, message = "Code is required"))]
    pub code: String,
    #[validate(range(min = 0))]
    pub order_value: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DiscountQuote {
    pub code: String,
    pub discount_type: DiscountType,
    pub order_value: i64,
    pub discount_amount: i64,
    pub final_value: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DiscountList {
    pub items: Vec<Discount>,
}
