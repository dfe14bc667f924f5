use bigdecimal::{BigDecimal, RoundingMode};

/// A product's own discount percent and the customer's negotiated offset
/// percent simply sum. The sum is not clamped at 100; catalog validation
/// keeps each input within 0-100.
pub fn effective_discount(product_discount: &BigDecimal, customer_offset: &BigDecimal) -> BigDecimal {
    product_discount + customer_offset
}

/// Price of a single unit after applying a percentage discount. Kept at
/// full precision; rounding happens at the line total.
pub fn unit_price_after_discount(price: &BigDecimal, discount_pct: &BigDecimal) -> BigDecimal {
    price * (BigDecimal::from(1) - discount_pct / BigDecimal::from(100))
}

pub fn line_total(unit_price: &BigDecimal, quantity: i32) -> BigDecimal {
    round2(&(unit_price * BigDecimal::from(quantity)))
}

/// Sum of already-discounted line totals plus the delivery charge.
pub fn order_total<'a>(
    lines: impl IntoIterator<Item = &'a BigDecimal>,
    delivery_charge: &BigDecimal,
) -> BigDecimal {
    let subtotal: BigDecimal = lines.into_iter().sum();
    round2(&(subtotal + delivery_charge))
}

pub fn round2(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(2, RoundingMode::HalfUp)
}

/// Serde helper for monetary fields: always a decimal string with exactly
/// two fractional digits on the wire, never a binary float.
pub mod money_string {
    use bigdecimal::BigDecimal;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::round2(value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigDecimal, D::Error> {
        BigDecimal::deserialize(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    #[test]
    fn single_source_discount_on_a_hundred() {
        // 100.00 with a combined 10% discount comes out at 90.00.
        let unit = unit_price_after_discount(&dec("100.00"), &dec("10"));
        assert_eq!(line_total(&unit, 1), dec("90.00"));
    }

    #[test]
    fn product_discount_and_customer_offset_stack_additively() {
        let discount = effective_discount(&dec("10"), &dec("10"));
        assert_eq!(discount, dec("20"));

        let unit = unit_price_after_discount(&dec("100.00"), &discount);
        assert_eq!(line_total(&unit, 2), dec("160.00"));
    }

    #[test]
    fn order_total_adds_delivery_charge_over_line_totals() {
        let lines = [dec("90.00"), dec("160.00")];
        assert_eq!(order_total(lines.iter(), &dec("60")), dec("310.00"));
        assert_eq!(order_total([].iter(), &dec("0")), dec("0.00"));
    }

    #[test]
    fn recomputation_is_idempotent() {
        let unit = unit_price_after_discount(&dec("33.33"), &dec("7.5"));
        let first = line_total(&unit, 3);
        let second = line_total(&unit, 3);
        assert_eq!(first, second);
        assert_eq!(order_total([&first].into_iter(), &dec("25.00")), {
            order_total([&second].into_iter(), &dec("25.00"))
        });
    }

    #[test]
    fn rounding_is_half_up_at_two_places() {
        assert_eq!(round2(&dec("10.005")), dec("10.01"));
        assert_eq!(round2(&dec("10.004")), dec("10.00"));
    }

    #[test]
    fn money_serializes_as_two_digit_decimal_strings() {
        #[derive(serde::Serialize)]
        struct Payload {
            #[serde(with = "money_string")]
            amount: BigDecimal,
        }

        let json = serde_json::to_string(&Payload { amount: dec("90") }).unwrap();
        assert_eq!(json, r#"{"amount":"90.00"}"#);
    }
}
