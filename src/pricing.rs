//! Order totals.
//!
//! Totals are always re-derived from line items on the server; amounts sent by
//! a client are never trusted.

use serde::Serialize;
use utoipa::ToSchema;

/// Subtotals strictly above this ship free.
pub const FREE_SHIPPING_THRESHOLD: i64 = 5000;
pub const FLAT_SHIPPING_COST: i64 = 500;
pub const TAX_RATE_PERCENT: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub tax: i64,
    pub discount: i64,
    pub total: i64,
}

impl OrderTotals {
    /// Compute totals from `(unit price, quantity)` pairs. `None` when the
    /// amounts do not fit in an `i64`.
    pub fn compute<I>(lines: I) -> Option<Self>
    where
        I: IntoIterator<Item = (i64, i32)>,
    {
        let mut subtotal: i64 = 0;
        for (price, quantity) in lines {
            subtotal = subtotal.checked_add(price.checked_mul(i64::from(quantity))?)?;
        }
        let shipping_cost = shipping_for(subtotal);
        let tax = tax_for(subtotal)?;
        let total = subtotal.checked_add(shipping_cost)?.checked_add(tax)?;
        Some(Self {
            subtotal,
            shipping_cost,
            tax,
            discount: 0,
            total,
        })
    }

    /// Take a redeemed coupon off the total. Shipping and tax stay based on the
    /// undiscounted subtotal.
    pub fn with_discount(self, discount: i64) -> Self {
        let discount = discount.clamp(0, self.subtotal.max(0));
        Self {
            discount,
            total: self.total - discount,
            ..self
        }
    }
}

pub fn shipping_for(subtotal: i64) -> i64 {
    if subtotal > FREE_SHIPPING_THRESHOLD {
        0
    } else {
        FLAT_SHIPPING_COST
    }
}

/// Tax rounded half up to the nearest whole unit.
pub fn tax_for(subtotal: i64) -> Option<i64> {
    subtotal
        .checked_mul(TAX_RATE_PERCENT)?
        .checked_add(50)
        .map(|scaled| scaled.div_euclid(100))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_order_still_pays_shipping() {
        let totals = OrderTotals::compute(Vec::<(i64, i32)>::new()).unwrap();
        assert_eq!(
            totals,
            OrderTotals {
                subtotal: 0,
                shipping_cost: 500,
                tax: 0,
                discount: 0,
                total: 500,
            }
        );
    }

    #[test]
    fn threshold_is_strict() {
        let at = OrderTotals::compute([(5000, 1)]).unwrap();
        assert_eq!(at.shipping_cost, 500);

        let above = OrderTotals::compute([(5001, 1)]).unwrap();
        assert_eq!(above.shipping_cost, 0);
    }

    #[test]
    fn sums_lines_and_taxes_subtotal() {
        let totals = OrderTotals::compute([(1200, 2), (350, 3)]).unwrap();
        assert_eq!(totals.subtotal, 3450);
        assert_eq!(totals.shipping_cost, 500);
        assert_eq!(totals.tax, 518);
        assert_eq!(totals.total, 3450 + 500 + 518);
    }

    #[test]
    fn total_invariant_holds_across_inputs() {
        for price in [0, 1, 3, 99, 1000, 4999, 5000, 5001, 12345] {
            for quantity in [1, 2, 7] {
                let t = OrderTotals::compute([(price, quantity)]).unwrap();
                assert_eq!(t.total, t.subtotal + t.shipping_cost + t.tax);
                assert_eq!(t.shipping_cost == 0, t.subtotal > FREE_SHIPPING_THRESHOLD);
                let exact = t.subtotal as f64 * 0.15;
                assert!((t.tax as f64 - exact).abs() <= 0.5, "tax {} vs {exact}", t.tax);
            }
        }
    }

    #[test]
    fn tax_rounds_half_up() {
        // 10 * 0.15 = 1.5
        assert_eq!(tax_for(10), Some(2));
        // 3 * 0.15 = 0.45
        assert_eq!(tax_for(3), Some(0));
    }

    #[test]
    fn oversized_amounts_are_rejected() {
        assert_eq!(OrderTotals::compute([(1_000_000_000_000_000_000, 1)]), None);
        assert_eq!(OrderTotals::compute([(i64::MAX / 2, 3)]), None);
        assert_eq!(OrderTotals::compute([(i64::MAX / 2, 1), (i64::MAX / 2, 1)]), None);
        assert_eq!(tax_for(i64::MAX), None);
    }

    #[test]
    fn discount_comes_off_total_only() {
        let totals = OrderTotals::compute([(10_000, 1)]).unwrap().with_discount(1000);
        assert_eq!(totals.subtotal, 10_000);
        assert_eq!(totals.shipping_cost, 0);
        assert_eq!(totals.tax, 1500);
        assert_eq!(totals.discount, 1000);
        assert_eq!(totals.total, 10_500);
    }

    #[test]
    fn discount_clamped_to_subtotal() {
        let totals = OrderTotals::compute([(300, 1)]).unwrap().with_discount(500);
        assert_eq!(totals.discount, 300);
        assert_eq!(totals.total, 500 + 45);
    }
}
