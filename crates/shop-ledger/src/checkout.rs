//! Checkout snapshot and total reconciliation.
//!
//! The displayed total must equal `subtotal - subtotal * discount% + shipping`
//! within a tolerance. Shipping is only known once the discount has been
//! applied (a discount can change shipping eligibility), so the snapshot is
//! assembled through a typestate builder that cannot take shipping before the
//! discount step.

use serde::{Deserialize, Serialize};

use crate::types::{Money, ShopError, ShopResult};

/// Default reconciliation tolerance: two minor units (€0.02).
pub const DEFAULT_TOLERANCE: Money = Money::from_minor(2);

/// Immutable checkout figures used for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSummary {
    subtotal: Money,
    discount_percentage: u8,
    shipping: Money,
    displayed_total: Money,
}

impl CheckoutSummary {
    /// Start a snapshot from the subtotal read before any discount.
    pub fn begin(subtotal: Money) -> CheckoutCapture<SubtotalRead> {
        CheckoutCapture {
            subtotal,
            state: SubtotalRead,
        }
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn discount_percentage(&self) -> u8 {
        self.discount_percentage
    }

    pub fn shipping(&self) -> Money {
        self.shipping
    }

    pub fn displayed_total(&self) -> Money {
        self.displayed_total
    }

    pub fn reconcile(&self, tolerance: Money) -> ShopResult<Reconciliation> {
        reconcile_total_within(
            self.subtotal,
            self.shipping,
            u32::from(self.discount_percentage),
            self.displayed_total,
            tolerance,
        )
    }
}

/// Partially captured checkout snapshot.
#[derive(Debug, Clone)]
pub struct CheckoutCapture<S> {
    subtotal: Money,
    state: S,
}

/// Subtotal captured; discount not yet applied.
#[derive(Debug, Clone)]
pub struct SubtotalRead;

/// Discount applied; shipping can now be read.
#[derive(Debug, Clone)]
pub struct DiscountApplied {
    percentage: u8,
}

/// Shipping read after the discount.
#[derive(Debug, Clone)]
pub struct ShippingRead {
    percentage: u8,
    shipping: Money,
}

impl CheckoutCapture<SubtotalRead> {
    pub fn apply_discount(self, percentage: u32) -> ShopResult<CheckoutCapture<DiscountApplied>> {
        let percentage = u8::try_from(percentage)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or(ShopError::InvalidDiscount(percentage))?;
        Ok(CheckoutCapture {
            subtotal: self.subtotal,
            state: DiscountApplied { percentage },
        })
    }

    pub fn without_discount(self) -> CheckoutCapture<DiscountApplied> {
        CheckoutCapture {
            subtotal: self.subtotal,
            state: DiscountApplied { percentage: 0 },
        }
    }
}

impl CheckoutCapture<DiscountApplied> {
    pub fn shipping(self, shipping: Money) -> CheckoutCapture<ShippingRead> {
        CheckoutCapture {
            subtotal: self.subtotal,
            state: ShippingRead {
                percentage: self.state.percentage,
                shipping,
            },
        }
    }
}

impl CheckoutCapture<ShippingRead> {
    pub fn displayed_total(self, displayed_total: Money) -> CheckoutSummary {
        CheckoutSummary {
            subtotal: self.subtotal,
            discount_percentage: self.state.percentage,
            shipping: self.state.shipping,
            displayed_total,
        }
    }
}

/// Outcome of a successful reconciliation. Amounts are rounded to whole
/// minor units for display; the comparison itself is exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub calculated: Money,
    pub displayed: Money,
    pub difference: Money,
}

/// Reconcile with the default tolerance.
pub fn reconcile_total(
    subtotal: Money,
    shipping: Money,
    discount_percentage: u32,
    displayed_total: Money,
) -> ShopResult<Reconciliation> {
    reconcile_total_within(
        subtotal,
        shipping,
        discount_percentage,
        displayed_total,
        DEFAULT_TOLERANCE,
    )
}

/// Check `subtotal - subtotal * pct / 100 + shipping` against the displayed
/// total. Arithmetic runs in hundredths of a minor unit, so percentages never
/// round.
pub fn reconcile_total_within(
    subtotal: Money,
    shipping: Money,
    discount_percentage: u32,
    displayed_total: Money,
    tolerance: Money,
) -> ShopResult<Reconciliation> {
    if discount_percentage > 100 {
        return Err(ShopError::InvalidDiscount(discount_percentage));
    }
    if shipping.minor() <= 0 {
        return Err(ShopError::InvalidShipping(shipping));
    }

    let sub = i128::from(subtotal.minor()) * 100;
    let discount = i128::from(subtotal.minor()) * i128::from(discount_percentage);
    let calculated = sub - discount + i128::from(shipping.minor()) * 100;
    let difference = (calculated - i128::from(displayed_total.minor()) * 100).abs();

    let result = Reconciliation {
        subtotal,
        discount: round_hundredths(discount),
        shipping,
        calculated: round_hundredths(calculated),
        displayed: displayed_total,
        difference: round_hundredths(difference),
    };

    tracing::info!(
        subtotal = %result.subtotal,
        discount = %result.discount,
        shipping = %result.shipping,
        calculated = %result.calculated,
        displayed = %result.displayed,
        "total calculation"
    );

    if difference < i128::from(tolerance.minor()) * 100 {
        Ok(result)
    } else {
        Err(ShopError::ReconciliationMismatch {
            calculated: result.calculated,
            displayed: result.displayed,
            difference: result.difference,
        })
    }
}

/// Round a hundredths-of-a-minor-unit value half away from zero.
fn round_hundredths(value: i128) -> Money {
    let rounded = if value >= 0 {
        (value + 50) / 100
    } else {
        (value - 50) / 100
    };
    Money::from_minor(i64::try_from(rounded).unwrap_or(if rounded > 0 { i64::MAX } else { i64::MIN }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(minor: i64) -> Money {
        Money::from_minor(minor)
    }

    #[test]
    fn test_mismatch_by_fifty_cents() {
        let err = reconcile_total(m(4000), m(500), 10, m(4050)).unwrap_err();
        match err {
            ShopError::ReconciliationMismatch {
                calculated,
                displayed,
                difference,
            } => {
                assert_eq!(calculated, m(4100));
                assert_eq!(displayed, m(4050));
                assert_eq!(difference, m(50));
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_exact_match() {
        let ok = reconcile_total(m(4000), m(500), 10, m(4100)).unwrap();
        assert_eq!(ok.calculated, m(4100));
        assert_eq!(ok.discount, m(400));
        assert_eq!(ok.difference, Money::ZERO);
    }

    #[test]
    fn test_zero_shipping_is_invalid_even_when_totals_match() {
        let err = reconcile_total(m(4000), Money::ZERO, 10, m(3600)).unwrap_err();
        assert!(matches!(err, ShopError::InvalidShipping(s) if s.is_zero()));
    }

    #[test]
    fn test_tolerance_is_strict() {
        // 1450 - 145 + 499 = 1804
        assert!(reconcile_total(m(1450), m(499), 10, m(1805)).is_ok());
        assert!(reconcile_total(m(1450), m(499), 10, m(1803)).is_ok());
        assert!(reconcile_total(m(1450), m(499), 10, m(1806)).is_err());
        assert!(reconcile_total(m(1450), m(499), 10, m(1802)).is_err());
    }

    #[test]
    fn test_fractional_discount_is_exact() {
        // 10% of 1455 is 145.5 minor units: calculated 1455 - 145.5 + 500 = 1809.5
        assert!(reconcile_total(m(1455), m(500), 10, m(1810)).is_ok());
        assert!(reconcile_total(m(1455), m(500), 10, m(1809)).is_ok());
        let err = reconcile_total(m(1455), m(500), 10, m(1807)).unwrap_err();
        assert!(matches!(err, ShopError::ReconciliationMismatch { .. }));
    }

    #[test]
    fn test_discount_applies_to_subtotal_only() {
        // Discount on (subtotal + shipping) would give 4050.
        let err = reconcile_total(m(4000), m(500), 10, m(4050)).unwrap_err();
        assert!(matches!(err, ShopError::ReconciliationMismatch { .. }));
    }

    #[test]
    fn test_invalid_discount() {
        let err = reconcile_total(m(4000), m(500), 101, m(4100)).unwrap_err();
        assert!(matches!(err, ShopError::InvalidDiscount(101)));
    }

    #[test]
    fn test_builder_order_and_reconcile() {
        let summary = CheckoutSummary::begin(m(4000))
            .apply_discount(10)
            .unwrap()
            .shipping(m(500))
            .displayed_total(m(4100));
        assert_eq!(summary.subtotal(), m(4000));
        assert_eq!(summary.discount_percentage(), 10);
        assert_eq!(summary.shipping(), m(500));
        assert_eq!(summary.displayed_total(), m(4100));
        assert!(summary.reconcile(DEFAULT_TOLERANCE).is_ok());
    }

    #[test]
    fn test_builder_rejects_discount_above_hundred() {
        let err = CheckoutSummary::begin(m(4000)).apply_discount(250).unwrap_err();
        assert!(matches!(err, ShopError::InvalidDiscount(250)));
    }

    #[test]
    fn test_without_discount() {
        let summary = CheckoutSummary::begin(m(1000))
            .without_discount()
            .shipping(m(450))
            .displayed_total(m(1450));
        assert_eq!(summary.discount_percentage(), 0);
        assert!(summary.reconcile(DEFAULT_TOLERANCE).is_ok());
    }

    #[test]
    fn test_round_hundredths() {
        assert_eq!(round_hundredths(14550), m(146));
        assert_eq!(round_hundredths(14549), m(145));
        assert_eq!(round_hundredths(-14550), m(-146));
    }
}
