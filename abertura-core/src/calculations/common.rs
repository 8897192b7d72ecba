//! Money helpers shared by the quote engine and the form store.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

/// `20.000`, `1.500.000`: dots grouping thousands, no decimal part.
static DOT_GROUPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d{1,3}(\.\d{3})+$").expect("valid regex"));

/// Rounds a decimal value to exactly two decimal places using half-up rounding.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use abertura_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(123.454)), dec!(123.45));
/// assert_eq!(round_half_up(dec!(123.455)), dec!(123.46));
/// assert_eq!(round_half_up(dec!(-123.455)), dec!(-123.46)); // Away from zero
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Parses a currency amount typed by a user.
///
/// Accepts plain decimals (`1234.56`) and Brazilian formatting with an
/// optional `R$` prefix (`R$ 1.234,56`). When a comma is present it is the
/// decimal separator and dots are thousands separators. Without a comma,
/// dots that group digits in threes (`R$ 150.000`) are thousands separators
/// too; any other single dot is a decimal point.
///
/// Returns `None` for blank or unparsable input.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use abertura_core::calculations::common::parse_money;
///
/// assert_eq!(parse_money("R$ 1.234,56"), Some(dec!(1234.56)));
/// assert_eq!(parse_money("20000"), Some(dec!(20000)));
/// assert_eq!(parse_money("R$ 150.000"), Some(dec!(150000)));
/// assert_eq!(parse_money("vinte mil"), None);
/// ```
pub fn parse_money(input: &str) -> Option<Decimal> {
    let stripped = input.trim().trim_start_matches("R$").trim();
    if stripped.is_empty() {
        return None;
    }

    let normalized = if stripped.contains(',') {
        stripped.replace('.', "").replace(',', ".")
    } else if DOT_GROUPED.is_match(stripped) {
        stripped.replace('.', "")
    } else {
        stripped.to_string()
    };

    match normalized.parse::<Decimal>() {
        Ok(value) => Some(round_half_up(value)),
        Err(e) => {
            tracing::debug!(input = %input, "not a currency amount: {}", e);
            None
        }
    }
}
