//! Currency text parsing.
//!
//! Storefronts render amounts as `€12,50`, `12.50 €` or `€ 1 234,56`. Parsing
//! strips whitespace and the currency symbol, treats the first comma as the
//! decimal separator, and reads the first run of digits and periods as a
//! fixed-point decimal with two fractional digits. A third fractional digit
//! rounds half-up; anything after a second period is ignored.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{Money, ShopError, ShopResult};

/// Default currency symbol of the muffin shop.
pub const DEFAULT_CURRENCY_SYMBOL: &str = "\u{20AC}";

fn numeric_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.?\d[\d.]*").expect("numeric run regex is valid"))
}

fn decimal_number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("decimal regex is valid"))
}

/// Parse displayed currency text into minor units.
///
/// Fails with [`ShopError::PriceParse`] when no digits remain.
pub fn parse_price_text(text: &str, currency_symbol: &str) -> ShopResult<Money> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let stripped = if currency_symbol.is_empty() {
        compact
    } else {
        compact.replace(currency_symbol, "")
    };
    let normalized = stripped.replacen(',', ".", 1);

    let run = numeric_run()
        .find(&normalized)
        .ok_or_else(|| ShopError::PriceParse(text.trim().to_string()))?;

    fixed_point(run.as_str()).ok_or_else(|| ShopError::PriceParse(text.trim().to_string()))
}

/// Read a run like `1234.56` (or `.5`, `12.345`, `1.2.3`) as minor units.
fn fixed_point(run: &str) -> Option<Money> {
    let mut parts = run.split('.');
    let whole = parts.next().unwrap_or("");
    let fraction = parts.next().unwrap_or("");

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };

    let digits: Vec<i64> = fraction
        .bytes()
        .take(3)
        .map(|b| i64::from(b - b'0'))
        .collect();
    let tenths = digits.first().copied().unwrap_or(0);
    let hundredths = digits.get(1).copied().unwrap_or(0);
    let round_up = digits.get(2).is_some_and(|d| *d >= 5);

    let minor = whole
        .checked_mul(100)?
        .checked_add(tenths * 10 + hundredths)?
        .checked_add(i64::from(round_up))?;
    Some(Money::from_minor(minor))
}

/// Whether the text contains a decimal number such as `12`, `12.50` or `12,50`.
pub fn contains_decimal(text: &str) -> bool {
    decimal_number().is_match(text)
}

/// Whether the text reads like a rendered price: the currency symbol and a
/// decimal number. A lone symbol never qualifies.
pub fn looks_like_price(text: &str, currency_symbol: &str) -> bool {
    text.contains(currency_symbol) && contains_decimal(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ShopResult<Money> {
        parse_price_text(text, DEFAULT_CURRENCY_SYMBOL)
    }

    #[test]
    fn test_parse_comma_decimal() {
        assert_eq!(parse("€12,50").unwrap(), Money::from_minor(1250));
    }

    #[test]
    fn test_parse_period_decimal() {
        assert_eq!(parse("12.50").unwrap(), Money::from_minor(1250));
    }

    #[test]
    fn test_parse_spaced_thousands() {
        assert_eq!(parse(" € 1 234,56 ").unwrap(), Money::from_minor(123456));
    }

    #[test]
    fn test_parse_whole_and_short_fraction() {
        assert_eq!(parse("€7").unwrap(), Money::from_minor(700));
        assert_eq!(parse("4,5 €").unwrap(), Money::from_minor(450));
        assert_eq!(parse(".5").unwrap(), Money::from_minor(50));
    }

    #[test]
    fn test_parse_extra_precision_rounds_half_up() {
        assert_eq!(parse("1.234").unwrap(), Money::from_minor(123));
        assert_eq!(parse("1.235").unwrap(), Money::from_minor(124));
    }

    #[test]
    fn test_parse_stops_at_second_period() {
        assert_eq!(parse("1.20.30").unwrap(), Money::from_minor(120));
    }

    #[test]
    fn test_parse_takes_first_number() {
        assert_eq!(parse("Total: €18,04 incl. VAT 21%").unwrap(), Money::from_minor(1804));
    }

    #[test]
    fn test_parse_rejects_text_without_digits() {
        assert!(matches!(parse("Free shipping"), Err(ShopError::PriceParse(_))));
        assert!(matches!(parse("€"), Err(ShopError::PriceParse(_))));
        assert!(matches!(parse("Free shipping."), Err(ShopError::PriceParse(_))));
        assert!(matches!(parse(""), Err(ShopError::PriceParse(_))));
    }

    #[test]
    fn test_parse_other_symbol() {
        assert_eq!(parse_price_text("$ 9.99", "$").unwrap(), Money::from_minor(999));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let first = parse("€3,20").unwrap();
        for _ in 0..10 {
            assert_eq!(parse("€3,20").unwrap(), first);
        }
    }

    #[test]
    fn test_looks_like_price() {
        assert!(looks_like_price("€3,20", "€"));
        assert!(looks_like_price("From € 12", "€"));
        assert!(!looks_like_price("€", "€"));
        assert!(!looks_like_price("12,50", "€"));
    }

    #[test]
    fn test_contains_decimal() {
        assert!(contains_decimal("12,50"));
        assert!(contains_decimal("qty 2"));
        assert!(!contains_decimal("Add to bag"));
    }
}
