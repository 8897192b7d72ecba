use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Service plan selected by the quote engine.
///
/// `AnaliseComercial` is not a plan: it flags a lead that must be priced by
/// the sales team and cannot check out online.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Start,
    Pleno,
    Premium,
    AnaliseComercial,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Pleno => "PLENO",
            Self::Premium => "PREMIUM",
            Self::AnaliseComercial => "ANALISE_COMERCIAL",
        }
    }

    pub fn requires_manual_review(&self) -> bool {
        matches!(self, Self::AnaliseComercial)
    }
}

impl fmt::Display for Tier {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a lead was routed to manual sales review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    /// Revenue at or above the review ceiling.
    RevenueCeiling,
    /// High revenue combined with a staff larger than the online limit.
    RevenueAndStaff,
}

impl ReviewReason {
    pub fn message(&self) -> &'static str {
        match self {
            Self::RevenueCeiling => "revenue requires manual review",
            Self::RevenueAndStaff => "high revenue + staff size requires manual review",
        }
    }
}

/// Components of the monthly price.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBreakdown {
    pub base_value: Decimal,
    pub employee_surcharge: Decimal,
    pub fiscal_address_surcharge: Decimal,
}

/// Output of the quote engine, embedded in the wizard state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub tier: Tier,
    /// `None` when the tier requires manual review.
    pub monthly_value: Option<Decimal>,
    pub one_time_setup_fee: Decimal,
    pub blocks_online_checkout: bool,
    pub breakdown: QuoteBreakdown,
    /// Company registration is free (PR state or fiscal address).
    pub free_registration: bool,
    pub review_reason: Option<ReviewReason>,
}

impl Quote {
    /// Amount due at checkout: first month plus the setup fee.
    ///
    /// `None` for quotes that cannot be checked out online.
    pub fn first_charge(&self) -> Option<Decimal> {
        if self.blocks_online_checkout {
            return None;
        }
        self.monthly_value.map(|m| m + self.one_time_setup_fee)
    }
}

/// Payload recorded when a blocked lead asks the sales team for a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummary {
    pub tier: Tier,
    pub review_reason: Option<ReviewReason>,
    pub revenue: Option<Decimal>,
    pub employee_count: u32,
    pub use_fiscal_address: bool,
    pub state: String,
    pub monthly_value: Option<Decimal>,
    pub one_time_setup_fee: Decimal,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn priced_quote() -> Quote {
        Quote {
            tier: Tier::Pleno,
            monthly_value: Some(dec!(499)),
            one_time_setup_fee: dec!(800),
            blocks_online_checkout: false,
            breakdown: QuoteBreakdown {
                base_value: dec!(349),
                employee_surcharge: dec!(100),
                fiscal_address_surcharge: dec!(50),
            },
            free_registration: false,
            review_reason: None,
        }
    }

    #[test]
    fn first_charge_adds_setup_fee() {
        assert_eq!(priced_quote().first_charge(), Some(dec!(1299)));
    }

    #[test]
    fn first_charge_is_none_when_blocked() {
        let quote = Quote {
            tier: Tier::AnaliseComercial,
            monthly_value: None,
            blocks_online_checkout: true,
            ..priced_quote()
        };

        assert_eq!(quote.first_charge(), None);
    }

    #[test]
    fn tier_serializes_in_screaming_snake_case() {
        let json = serde_json::to_string(&Tier::AnaliseComercial).unwrap();

        assert_eq!(json, "\"ANALISE_COMERCIAL\"");
    }
}
