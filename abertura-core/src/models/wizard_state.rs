use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculations::QuoteInput;
use crate::models::{Address, OperatingMode, Quote, QuoteSummary};

/// Every field collected by the CNPJ-opening wizard.
///
/// Fields are public for reading; writes should go through
/// [`crate::form::FormStore`] so the cross-field rules hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    // Personal
    pub name: String,
    /// CPF as typed; only its length is validated.
    pub tax_id: String,
    pub email: String,
    pub phone: String,
    pub birth_date: String,

    // Company
    pub trade_name: String,
    /// Declared monthly revenue. `None` when missing or not a number.
    pub revenue: Option<Decimal>,
    pub partner_count: u32,
    pub operating_mode: Option<OperatingMode>,

    // Address
    pub address: Address,
    pub use_fiscal_address: bool,

    // Activities
    pub activity_description: String,
    pub has_employees: bool,
    pub employee_count: u32,

    // Derived
    pub quote: Option<Quote>,
    pub selected_plan: Option<String>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            name: String::new(),
            tax_id: String::new(),
            email: String::new(),
            phone: String::new(),
            birth_date: String::new(),
            trade_name: String::new(),
            revenue: None,
            partner_count: 1,
            operating_mode: None,
            address: Address::default(),
            use_fiscal_address: false,
            activity_description: String::new(),
            has_employees: false,
            employee_count: 0,
            quote: None,
            selected_plan: None,
        }
    }
}

impl WizardState {
    /// The subset of the state the quote engine reads.
    pub fn quote_input(&self) -> QuoteInput {
        QuoteInput {
            revenue: self.revenue,
            employee_count: self.employee_count,
            use_fiscal_address: self.use_fiscal_address,
            state: self.address.state.clone(),
        }
    }

    /// What the sales team receives with a manual quote request.
    ///
    /// Returns `None` until a quote has been computed.
    pub fn quote_summary(&self) -> Option<QuoteSummary> {
        let quote = self.quote.as_ref()?;
        Some(QuoteSummary {
            tier: quote.tier,
            review_reason: quote.review_reason,
            revenue: self.revenue,
            employee_count: self.employee_count,
            use_fiscal_address: self.use_fiscal_address,
            state: self.address.state.clone(),
            monthly_value: quote.monthly_value,
            one_time_setup_fee: quote.one_time_setup_fee,
        })
    }
}
