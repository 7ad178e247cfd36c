use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    #[sea_orm(string_value = "percentage")]
    Percentage,
    #[sea_orm(string_value = "fixed")]
    Fixed,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum DiscountStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "inactive")]
    Inactive,
    #[sea_orm(string_value = "expired")]
    Expired,
}

/// Which customers a discount is restricted to.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum CustomerEligibility {
    #[sea_orm(string_value = "all")]
    All,
    #[sea_orm(string_value = "new")]
    New,
    #[sea_orm(string_value = "returning")]
    Returning,
}

/// Classification of the customer redeeming a code: `New` until their first order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    New,
    Returning,
}

impl CustomerType {
    pub fn from_order_count(previous_orders: u64) -> Self {
        if previous_orders == 0 {
            CustomerType::New
        } else {
            CustomerType::Returning
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Ineligible {
    #[error("Discount is not active")]
    NotActive,
    #[error("Discount is not valid yet")]
    NotStarted,
    #[error("Discount has expired")]
    Expired,
    #[error("Discount usage limit reached")]
    UsageLimitReached,
    #[error("Minimum order value of {0} not met")]
    BelowMinimum(i64),
    #[error("Discount is not available for this customer")]
    CustomerTypeMismatch,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "discounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Always stored uppercase.
    #[sea_orm(unique)]
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    /// Percent (1..=100) for percentage discounts, currency units for fixed ones.
    pub value: i64,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub min_order_value: i64,
    /// Only honoured for percentage discounts.
    pub max_discount_amount: Option<i64>,
    pub start_date: DateTimeWithTimeZone,
    pub end_date: DateTimeWithTimeZone,
    pub status: DiscountStatus,
    /// JSON array of category names; empty means every category.
    pub applicable_categories: Json,
    pub customer_type: CustomerEligibility,
    pub created_by: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::CreatedBy",
        to = "super::users::Column::Id"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn can_be_used(
        &self,
        order_value: i64,
        customer: CustomerType,
        now: DateTime<Utc>,
    ) -> Result<(), Ineligible> {
        if self.status != DiscountStatus::Active {
            return Err(Ineligible::NotActive);
        }
        if now < self.start_date {
            return Err(Ineligible::NotStarted);
        }
        if now > self.end_date {
            return Err(Ineligible::Expired);
        }
        if let Some(limit) = self.usage_limit {
            if self.used_count >= limit {
                return Err(Ineligible::UsageLimitReached);
            }
        }
        if order_value < self.min_order_value {
            return Err(Ineligible::BelowMinimum(self.min_order_value));
        }
        let customer_matches = match self.customer_type {
            CustomerEligibility::All => true,
            CustomerEligibility::New => customer == CustomerType::New,
            CustomerEligibility::Returning => customer == CustomerType::Returning,
        };
        if !customer_matches {
            return Err(Ineligible::CustomerTypeMismatch);
        }
        Ok(())
    }

    /// Amount taken off `order_value`; always within `[0, order_value]`.
    pub fn calculate_discount(
        &self,
        order_value: i64,
        customer: CustomerType,
        now: DateTime<Utc>,
    ) -> i64 {
        if order_value <= 0 || self.can_be_used(order_value, customer, now).is_err() {
            return 0;
        }
        let raw = match self.discount_type {
            DiscountType::Percentage => {
                let amount = order_value.saturating_mul(self.value) / 100;
                match self.max_discount_amount {
                    Some(cap) => amount.min(cap),
                    None => amount,
                }
            }
            DiscountType::Fixed => self.value,
        };
        raw.clamp(0, order_value)
    }

    pub fn categories(&self) -> Vec<String> {
        serde_json::from_value(self.applicable_categories.clone()).unwrap_or_default()
    }

    pub fn applies_to_category(&self, category: &str) -> bool {
        let categories = self.categories();
        categories.is_empty()
            || categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(category.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn discount(discount_type: DiscountType, value: i64) -> Model {
        let now = Utc::now();
        Model {
            id: Uuid::new_v4(),
            code: "TEST".into(),
            description: None,
            discount_type,
            value,
            usage_limit: None,
            used_count: 0,
            min_order_value: 0,
            max_discount_amount: None,
            start_date: (now - Duration::days(1)).fixed_offset(),
            end_date: (now + Duration::days(30)).fixed_offset(),
            status: DiscountStatus::Active,
            applicable_categories: serde_json::json!([]),
            customer_type: CustomerEligibility::All,
            created_by: None,
            created_at: now.fixed_offset(),
            updated_at: now.fixed_offset(),
        }
    }

    #[test]
    fn percentage_is_capped_at_max_discount_amount() {
        let mut save20 = discount(DiscountType::Percentage, 20);
        save20.code = "SAVE20".into();
        save20.max_discount_amount = Some(1000);

        let amount = save20.calculate_discount(10_000, CustomerType::New, Utc::now());
        assert_eq!(amount, 1000);
    }

    #[test]
    fn percentage_without_cap() {
        let d = discount(DiscountType::Percentage, 20);
        assert_eq!(d.calculate_discount(10_000, CustomerType::New, Utc::now()), 2000);
    }

    #[test]
    fn fixed_discount_never_exceeds_order_value() {
        let mut flat = discount(DiscountType::Fixed, 500);
        flat.code = "FLAT500".into();
        assert_eq!(flat.calculate_discount(300, CustomerType::New, Utc::now()), 300);
        assert_eq!(flat.calculate_discount(800, CustomerType::New, Utc::now()), 500);
    }

    #[test]
    fn max_discount_amount_ignored_for_fixed() {
        let mut flat = discount(DiscountType::Fixed, 500);
        flat.max_discount_amount = Some(100);
        assert_eq!(flat.calculate_discount(800, CustomerType::New, Utc::now()), 500);
    }

    #[test]
    fn result_always_within_order_value() {
        let now = Utc::now();
        let configs = [
            (DiscountType::Percentage, 1, None),
            (DiscountType::Percentage, 50, Some(10)),
            (DiscountType::Percentage, 100, None),
            (DiscountType::Fixed, 0, None),
            (DiscountType::Fixed, 1, None),
            (DiscountType::Fixed, 1_000_000, None),
        ];
        for (kind, value, cap) in configs {
            let mut d = discount(kind, value);
            d.max_discount_amount = cap;
            for order_value in [0, 1, 99, 100, 5000, 123_457] {
                let amount = d.calculate_discount(order_value, CustomerType::Returning, now);
                assert!(
                    (0..=order_value).contains(&amount),
                    "{kind:?} {value} on {order_value} gave {amount}"
                );
            }
        }
    }

    #[test]
    fn unusable_discount_yields_zero() {
        let mut d = discount(DiscountType::Fixed, 500);
        d.status = DiscountStatus::Inactive;
        assert_eq!(d.calculate_discount(1000, CustomerType::New, Utc::now()), 0);
    }

    #[test]
    fn inactive_status_rejected() {
        let mut d = discount(DiscountType::Fixed, 10);
        d.status = DiscountStatus::Expired;
        assert_eq!(
            d.can_be_used(100, CustomerType::New, Utc::now()),
            Err(Ineligible::NotActive)
        );
    }

    #[test]
    fn expired_discount_rejected() {
        let now = Utc::now();
        let mut d = discount(DiscountType::Fixed, 10);
        d.start_date = (now - Duration::days(10)).fixed_offset();
        d.end_date = (now - Duration::days(1)).fixed_offset();
        assert_eq!(d.can_be_used(100, CustomerType::New, now), Err(Ineligible::Expired));
    }

    #[test]
    fn future_discount_rejected() {
        let now = Utc::now();
        let mut d = discount(DiscountType::Fixed, 10);
        d.start_date = (now + Duration::days(1)).fixed_offset();
        assert_eq!(
            d.can_be_used(100, CustomerType::New, now),
            Err(Ineligible::NotStarted)
        );
    }

    #[test]
    fn usage_limit_reached_rejected() {
        let mut d = discount(DiscountType::Fixed, 10);
        d.usage_limit = Some(3);
        d.used_count = 2;
        assert!(d.can_be_used(100, CustomerType::New, Utc::now()).is_ok());
        d.used_count = 3;
        assert_eq!(
            d.can_be_used(100, CustomerType::New, Utc::now()),
            Err(Ineligible::UsageLimitReached)
        );
    }

    #[test]
    fn below_minimum_rejected() {
        let mut d = discount(DiscountType::Fixed, 10);
        d.min_order_value = 2000;
        assert_eq!(
            d.can_be_used(1999, CustomerType::New, Utc::now()),
            Err(Ineligible::BelowMinimum(2000))
        );
        assert!(d.can_be_used(2000, CustomerType::New, Utc::now()).is_ok());
    }

    #[test]
    fn customer_type_restriction() {
        let now = Utc::now();
        let mut d = discount(DiscountType::Fixed, 10);
        d.customer_type = CustomerEligibility::New;
        assert!(d.can_be_used(100, CustomerType::New, now).is_ok());
        assert_eq!(
            d.can_be_used(100, CustomerType::Returning, now),
            Err(Ineligible::CustomerTypeMismatch)
        );

        d.customer_type = CustomerEligibility::Returning;
        assert_eq!(
            d.can_be_used(100, CustomerType::New, now),
            Err(Ineligible::CustomerTypeMismatch)
        );
    }

    #[test]
    fn category_scope_is_case_insensitive() {
        let mut d = discount(DiscountType::Fixed, 10);
        assert!(d.applies_to_category("Toys"));

        d.applicable_categories = serde_json::json!(["Toys", "Feeding"]);
        assert!(d.applies_to_category("toys"));
        assert!(!d.applies_to_category("Clothing"));
    }

    #[test]
    fn customer_type_from_history() {
        assert_eq!(CustomerType::from_order_count(0), CustomerType::New);
        assert_eq!(CustomerType::from_order_count(4), CustomerType::Returning);
    }
}
