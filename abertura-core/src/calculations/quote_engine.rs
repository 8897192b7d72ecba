//! Quote engine for the CNPJ-opening plans.
//!
//! # Decision table
//!
//! Rules are evaluated in order and the first match wins:
//!
//! | # | Condition | Outcome |
//! |---|-----------|---------|
//! | 1 | revenue ≥ 300 000 | `ANALISE_COMERCIAL`, checkout blocked |
//! | 2 | revenue > 150 000 and employees > 3 | `ANALISE_COMERCIAL`, checkout blocked |
//! | 3 | revenue ≤ 20 000 | `START`, base 199 |
//! |   | revenue ≤ 100 000 | `PLENO`, base 349 |
//! |   | otherwise | `PREMIUM`, base 549 |
//!
//! The monthly value adds 50 per employee and 50 for the fiscal address.
//! Registration is free (no 800 setup fee) for companies in PR or using the
//! fiscal address.
//!
//! All thresholds and prices come from a [`PricingTable`]; the defaults
//! encode the table above.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use abertura_core::calculations::{QuoteEngine, QuoteInput};
//! use abertura_core::Tier;
//!
//! let engine = QuoteEngine::default();
//! let quote = engine
//!     .compute(&QuoteInput {
//!         revenue: Some(dec!(100000)),
//!         employee_count: 2,
//!         use_fiscal_address: true,
//!         state: "SP".to_string(),
//!     })
//!     .unwrap();
//!
//! assert_eq!(quote.tier, Tier::Pleno);
//! assert_eq!(quote.monthly_value, Some(dec!(499)));
//! assert_eq!(quote.one_time_setup_fee, dec!(0));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::calculations::common::round_half_up;
use crate::models::{Quote, QuoteBreakdown, ReviewReason, Tier};

/// Errors raised when a [`PricingTable`] is internally inconsistent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingTableError {
    #[error("pricing table has no brackets")]
    NoBrackets,

    #[error("bracket ceilings must be strictly ascending, got {0} after {1}")]
    BracketsNotAscending(Decimal, Decimal),

    #[error("only the last bracket may be open-ended")]
    OpenBracketNotLast,

    #[error("the last bracket must be open-ended")]
    LastBracketBounded,

    #[error("{0} cannot be used as a priced bracket")]
    ReviewTierInBracket(Tier),

    #[error("{field} must be non-negative, got {value}")]
    NegativeAmount { field: &'static str, value: Decimal },

    #[error("staff review revenue {staff} must be below the review ceiling {ceiling}")]
    ThresholdsOutOfOrder { staff: Decimal, ceiling: Decimal },
}

/// One priced tier and the highest revenue (inclusive) it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBracket {
    pub tier: Tier,
    /// Inclusive upper bound. `None` covers everything up to the review ceiling.
    pub max_revenue: Option<Decimal>,
    pub base_value: Decimal,
}

/// Thresholds and prices used by the [`QuoteEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingTable {
    /// Revenue at or above which every lead goes to manual review.
    pub review_revenue_ceiling: Decimal,
    /// Revenue above which a large staff sends the lead to manual review.
    pub staff_review_revenue: Decimal,
    /// Employee count above which the staff rule applies.
    pub staff_review_employees: u32,
    pub brackets: Vec<PriceBracket>,
    pub employee_surcharge: Decimal,
    pub fiscal_address_surcharge: Decimal,
    pub setup_fee: Decimal,
    /// States where registration is free regardless of the fiscal address.
    pub free_registration_states: Vec<String>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            review_revenue_ceiling: Decimal::from(300_000),
            staff_review_revenue: Decimal::from(150_000),
            staff_review_employees: 3,
            brackets: vec![
                PriceBracket {
                    tier: Tier::Start,
                    max_revenue: Some(Decimal::from(20_000)),
                    base_value: Decimal::from(199),
                },
                PriceBracket {
                    tier: Tier::Pleno,
                    max_revenue: Some(Decimal::from(100_000)),
                    base_value: Decimal::from(349),
                },
                PriceBracket {
                    tier: Tier::Premium,
                    max_revenue: None,
                    base_value: Decimal::from(549),
                },
            ],
            employee_surcharge: Decimal::from(50),
            fiscal_address_surcharge: Decimal::from(50),
            setup_fee: Decimal::from(800),
            free_registration_states: vec!["PR".to_string()],
        }
    }
}

impl PricingTable {
    /// Checks that the table can price every revenue below the review ceiling.
    ///
    /// # Errors
    ///
    /// Returns the first [`PricingTableError`] found.
    pub fn validate(&self) -> Result<(), PricingTableError> {
        let (last, rest) = self
            .brackets
            .split_last()
            .ok_or(PricingTableError::NoBrackets)?;

        if last.max_revenue.is_some() {
            return Err(PricingTableError::LastBracketBounded);
        }

        let mut previous: Option<Decimal> = None;
        for bracket in rest {
            let ceiling = bracket
                .max_revenue
                .ok_or(PricingTableError::OpenBracketNotLast)?;
            if let Some(prev) = previous {
                if ceiling <= prev {
                    return Err(PricingTableError::BracketsNotAscending(ceiling, prev));
                }
            }
            previous = Some(ceiling);
        }

        for bracket in &self.brackets {
            if bracket.tier.requires_manual_review() {
                return Err(PricingTableError::ReviewTierInBracket(bracket.tier));
            }
            non_negative("base_value", bracket.base_value)?;
        }

        non_negative("employee_surcharge", self.employee_surcharge)?;
        non_negative("fiscal_address_surcharge", self.fiscal_address_surcharge)?;
        non_negative("setup_fee", self.setup_fee)?;

        if self.staff_review_revenue >= self.review_revenue_ceiling {
            return Err(PricingTableError::ThresholdsOutOfOrder {
                staff: self.staff_review_revenue,
                ceiling: self.review_revenue_ceiling,
            });
        }

        Ok(())
    }
}

fn non_negative(
    field: &'static str,
    value: Decimal,
) -> Result<(), PricingTableError> {
    if value < Decimal::ZERO {
        Err(PricingTableError::NegativeAmount { field, value })
    } else {
        Ok(())
    }
}

/// Inputs read by the quote engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteInput {
    pub revenue: Option<Decimal>,
    pub employee_count: u32,
    pub use_fiscal_address: bool,
    /// Two-letter UF code of the company address.
    pub state: String,
}

/// Prices a lead from a [`PricingTable`].
#[derive(Debug, Clone)]
pub struct QuoteEngine {
    table: PricingTable,
}

impl Default for QuoteEngine {
    fn default() -> Self {
        Self {
            table: PricingTable::default(),
        }
    }
}

impl QuoteEngine {
    /// Creates an engine over a validated pricing table.
    ///
    /// # Errors
    ///
    /// Returns [`PricingTableError`] if the table fails [`PricingTable::validate`].
    pub fn new(table: PricingTable) -> Result<Self, PricingTableError> {
        table.validate()?;
        Ok(Self { table })
    }

    pub fn table(&self) -> &PricingTable {
        &self.table
    }

    /// Computes the quote for `input`.
    ///
    /// Returns `None` when no quote can be computed (missing or non-positive
    /// revenue). Never fails otherwise.
    pub fn compute(
        &self,
        input: &QuoteInput,
    ) -> Option<Quote> {
        let revenue = input.revenue.filter(|r| *r > Decimal::ZERO)?;

        let free_registration = self.free_registration(&input.state, input.use_fiscal_address);
        let one_time_setup_fee = self.setup_fee(free_registration);

        if let Some(reason) = self.review_reason(revenue, input.employee_count) {
            debug!(%revenue, employees = input.employee_count, ?reason, "quote routed to manual review");
            return Some(Quote {
                tier: Tier::AnaliseComercial,
                monthly_value: None,
                one_time_setup_fee,
                blocks_online_checkout: true,
                breakdown: QuoteBreakdown::default(),
                free_registration,
                review_reason: Some(reason),
            });
        }

        let bracket = self.bracket_for(revenue)?;
        let breakdown = QuoteBreakdown {
            base_value: bracket.base_value,
            employee_surcharge: self.employee_surcharge(input.employee_count),
            fiscal_address_surcharge: self.fiscal_address_surcharge(input.use_fiscal_address),
        };
        let monthly_value = round_half_up(
            breakdown.base_value + breakdown.employee_surcharge + breakdown.fiscal_address_surcharge,
        );

        Some(Quote {
            tier: bracket.tier,
            monthly_value: Some(monthly_value),
            one_time_setup_fee,
            blocks_online_checkout: false,
            breakdown,
            free_registration,
            review_reason: None,
        })
    }

    /// Rules 1 and 2 of the decision table.
    fn review_reason(
        &self,
        revenue: Decimal,
        employee_count: u32,
    ) -> Option<ReviewReason> {
        if revenue >= self.table.review_revenue_ceiling {
            Some(ReviewReason::RevenueCeiling)
        } else if revenue > self.table.staff_review_revenue
            && employee_count > self.table.staff_review_employees
        {
            Some(ReviewReason::RevenueAndStaff)
        } else {
            None
        }
    }

    /// Rule 3: the first bracket whose ceiling covers `revenue`.
    fn bracket_for(
        &self,
        revenue: Decimal,
    ) -> Option<&PriceBracket> {
        self.table
            .brackets
            .iter()
            .find(|b| b.max_revenue.is_some_and(|max| revenue <= max))
            .or_else(|| self.table.brackets.last())
    }

    fn employee_surcharge(
        &self,
        employee_count: u32,
    ) -> Decimal {
        self.table.employee_surcharge * Decimal::from(employee_count)
    }

    fn fiscal_address_surcharge(
        &self,
        use_fiscal_address: bool,
    ) -> Decimal {
        if use_fiscal_address {
            self.table.fiscal_address_surcharge
        } else {
            Decimal::ZERO
        }
    }

    fn free_registration(
        &self,
        state: &str,
        use_fiscal_address: bool,
    ) -> bool {
        let state = state.trim();
        use_fiscal_address
            || self
                .table
                .free_registration_states
                .iter()
                .any(|s| s.eq_ignore_ascii_case(state))
    }

    fn setup_fee(
        &self,
        free_registration: bool,
    ) -> Decimal {
        if free_registration {
            Decimal::ZERO
        } else {
            self.table.setup_fee
        }
    }
}

/// Computes a quote with the default pricing table.
pub fn compute_quote(
    revenue: Option<Decimal>,
    employee_count: u32,
    use_fiscal_address: bool,
    state: &str,
) -> Option<Quote> {
    QuoteEngine::default().compute(&QuoteInput {
        revenue,
        employee_count,
        use_fiscal_address,
        state: state.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn quote(
        revenue: Decimal,
        employees: u32,
        fiscal: bool,
        state: &str,
    ) -> Quote {
        compute_quote(Some(revenue), employees, fiscal, state).unwrap()
    }

    // =========================================================================
    // manual review rules
    // =========================================================================

    #[test]
    fn revenue_at_ceiling_requires_review() {
        let q = quote(dec!(300000), 0, false, "SP");

        assert_eq!(q.tier, Tier::AnaliseComercial);
        assert_eq!(q.monthly_value, None);
        assert!(q.blocks_online_checkout);
        assert_eq!(q.review_reason, Some(ReviewReason::RevenueCeiling));
    }

    #[test]
    fn revenue_above_ceiling_requires_review_regardless_of_staff() {
        for employees in [0, 1, 10] {
            let q = quote(dec!(1000000), employees, true, "PR");
            assert_eq!(q.tier, Tier::AnaliseComercial);
            assert_eq!(q.monthly_value, None);
        }
    }

    #[test]
    fn high_revenue_with_large_staff_requires_review() {
        for revenue in [dec!(150000.01), dec!(200000), dec!(299999.99)] {
            let q = quote(revenue, 4, false, "SP");
            assert_eq!(q.tier, Tier::AnaliseComercial);
            assert_eq!(q.review_reason, Some(ReviewReason::RevenueAndStaff));
        }
    }

    #[test]
    fn high_revenue_with_three_employees_is_priced() {
        let q = quote(dec!(200000), 3, false, "SP");

        assert_eq!(q.tier, Tier::Premium);
        assert_eq!(q.monthly_value, Some(dec!(699)));
    }

    #[test]
    fn staff_rule_needs_revenue_strictly_above_threshold() {
        let q = quote(dec!(150000), 5, false, "SP");

        assert_eq!(q.tier, Tier::Premium);
        assert!(!q.blocks_online_checkout);
    }

    #[test]
    fn review_quote_has_zero_breakdown_but_keeps_setup_fee() {
        let q = quote(dec!(400000), 0, false, "SP");

        assert_eq!(q.breakdown, QuoteBreakdown::default());
        assert_eq!(q.one_time_setup_fee, dec!(800));
    }

    // =========================================================================
    // tier brackets
    // =========================================================================

    #[test]
    fn start_bracket_upper_bound_is_inclusive() {
        let q = quote(dec!(20000), 0, false, "SP");

        assert_eq!(q.tier, Tier::Start);
        assert_eq!(q.monthly_value, Some(dec!(199)));
    }

    #[test]
    fn just_above_start_is_pleno() {
        let q = quote(dec!(20000.01), 0, false, "SP");

        assert_eq!(q.tier, Tier::Pleno);
        assert_eq!(q.monthly_value, Some(dec!(349)));
    }

    #[test]
    fn pleno_upper_bound_is_inclusive() {
        assert_eq!(quote(dec!(100000), 0, false, "SP").tier, Tier::Pleno);
        assert_eq!(quote(dec!(100000.01), 0, false, "SP").tier, Tier::Premium);
    }

    #[test]
    fn premium_runs_up_to_ceiling() {
        let q = quote(dec!(299999.99), 0, false, "SP");

        assert_eq!(q.tier, Tier::Premium);
        assert_eq!(q.monthly_value, Some(dec!(549)));
    }

    // =========================================================================
    // surcharges and setup fee
    // =========================================================================

    #[test]
    fn pleno_with_staff_and_fiscal_address() {
        let q = quote(dec!(100000), 2, true, "SP");

        assert_eq!(q.tier, Tier::Pleno);
        assert_eq!(q.monthly_value, Some(dec!(499)));
        assert_eq!(
            q.breakdown,
            QuoteBreakdown {
                base_value: dec!(349),
                employee_surcharge: dec!(100),
                fiscal_address_surcharge: dec!(50),
            }
        );
        assert_eq!(q.one_time_setup_fee, dec!(0));
        assert!(q.free_registration);
    }

    #[test]
    fn parana_registration_is_free_without_fiscal_address() {
        let q = quote(dec!(50000), 0, false, "PR");

        assert_eq!(q.one_time_setup_fee, dec!(0));
        assert_eq!(q.breakdown.fiscal_address_surcharge, dec!(0));
    }

    #[test]
    fn state_match_ignores_case_and_whitespace() {
        assert_eq!(quote(dec!(50000), 0, false, " pr ").one_time_setup_fee, dec!(0));
    }

    #[test]
    fn other_states_pay_setup_fee() {
        let q = quote(dec!(50000), 0, false, "SC");

        assert_eq!(q.one_time_setup_fee, dec!(800));
        assert!(!q.free_registration);
    }

    // =========================================================================
    // no quote
    // =========================================================================

    #[test]
    fn missing_revenue_yields_no_quote() {
        assert_eq!(compute_quote(None, 0, false, "SP"), None);
    }

    #[test]
    fn non_positive_revenue_yields_no_quote() {
        assert_eq!(compute_quote(Some(dec!(0)), 0, false, "SP"), None);
        assert_eq!(compute_quote(Some(dec!(-10)), 0, false, "SP"), None);
    }

    // =========================================================================
    // pricing table validation
    // =========================================================================

    #[test]
    fn default_table_is_valid() {
        assert_eq!(PricingTable::default().validate(), Ok(()));
    }

    #[test]
    fn empty_table_is_rejected() {
        let table = PricingTable {
            brackets: vec![],
            ..Default::default()
        };

        assert_eq!(QuoteEngine::new(table).unwrap_err(), PricingTableError::NoBrackets);
    }

    #[test]
    fn bounded_last_bracket_is_rejected() {
        let mut table = PricingTable::default();
        table.brackets[2].max_revenue = Some(dec!(250000));

        assert_eq!(table.validate(), Err(PricingTableError::LastBracketBounded));
    }

    #[test]
    fn descending_brackets_are_rejected() {
        let mut table = PricingTable::default();
        table.brackets[1].max_revenue = Some(dec!(10000));

        assert_eq!(
            table.validate(),
            Err(PricingTableError::BracketsNotAscending(dec!(10000), dec!(20000)))
        );
    }

    #[test]
    fn review_tier_cannot_be_priced() {
        let mut table = PricingTable::default();
        table.brackets[0].tier = Tier::AnaliseComercial;

        assert_eq!(
            table.validate(),
            Err(PricingTableError::ReviewTierInBracket(Tier::AnaliseComercial))
        );
    }

    #[test]
    fn negative_setup_fee_is_rejected() {
        let table = PricingTable {
            setup_fee: dec!(-1),
            ..Default::default()
        };

        assert_eq!(
            table.validate(),
            Err(PricingTableError::NegativeAmount {
                field: "setup_fee",
                value: dec!(-1),
            })
        );
    }

    #[test]
    fn custom_table_changes_prices() {
        let table = PricingTable {
            employee_surcharge: dec!(75),
            setup_fee: dec!(950),
            ..Default::default()
        };
        let engine = QuoteEngine::new(table).unwrap();

        let q = engine
            .compute(&QuoteInput {
                revenue: Some(dec!(10000)),
                employee_count: 2,
                use_fiscal_address: false,
                state: "RS".to_string(),
            })
            .unwrap();

        assert_eq!(q.monthly_value, Some(dec!(349)));
        assert_eq!(q.one_time_setup_fee, dec!(950));
    }

    #[test]
    fn table_overrides_load_from_toml() {
        let table: PricingTable = toml::from_str(
            r#"
            setup_fee = 900
            free_registration_states = ["PR", "SC"]
            "#,
        )
        .unwrap();

        assert_eq!(table.setup_fee, dec!(900));
        assert_eq!(table.brackets, PricingTable::default().brackets);
        assert_eq!(table.validate(), Ok(()));
    }
}
