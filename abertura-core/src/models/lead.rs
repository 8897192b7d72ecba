use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Address, OperatingMode, Tier, WizardState};
use crate::stepper::Step;

/// Identifier of a remote lead record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(String);

impl LeadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeadId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Partial lead payload. Absent fields are left untouched by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadFields {
    // Personal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,

    // Company
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_mode: Option<OperatingMode>,

    // Address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_fiscal_address: Option<bool>,

    // Activities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_employees: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_count: Option<u32>,

    // Quote
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_value: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_time_setup_fee: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_plan: Option<String>,
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// A field the current step owns is always sent, blank included, so clearing
/// it in the form clears it remotely.
fn owned(s: &str) -> Option<String> {
    Some(s.trim().to_string())
}

impl LeadFields {
    /// Fields needed to open a lead: name, email and phone.
    ///
    /// Returns `None` when any of them is blank.
    pub fn minimal(state: &WizardState) -> Option<Self> {
        Some(Self {
            name: Some(non_empty(&state.name)?),
            email: Some(non_empty(&state.email)?),
            phone: Some(non_empty(&state.phone)?),
            ..Default::default()
        })
    }

    /// Everything gathered up to and including `step`. Text fields of those
    /// steps are sent even when blank; later steps' fields are omitted.
    pub fn through_step(
        state: &WizardState,
        step: Step,
    ) -> Self {
        let mut fields = Self {
            name: owned(&state.name),
            tax_id: owned(&state.tax_id),
            email: owned(&state.email),
            phone: owned(&state.phone),
            birth_date: owned(&state.birth_date),
            ..Default::default()
        };

        if step >= Step::Company {
            fields.trade_name = owned(&state.trade_name);
            fields.revenue = state.revenue;
            fields.partner_count = Some(state.partner_count);
            fields.operating_mode = state.operating_mode;
        }

        if step >= Step::Address {
            fields.address = Some(state.address.clone());
            fields.use_fiscal_address = Some(state.use_fiscal_address);
        }

        if step >= Step::Activities {
            fields.activity_description = owned(&state.activity_description);
            fields.has_employees = Some(state.has_employees);
            fields.employee_count = Some(state.employee_count);
        }

        if step >= Step::Summary {
            if let Some(quote) = &state.quote {
                fields.tier = Some(quote.tier);
                fields.monthly_value = quote.monthly_value;
                fields.one_time_setup_fee = Some(quote.one_time_setup_fee);
            }
            fields.selected_plan = state.selected_plan.clone();
        }

        fields
    }

    /// Overlays every field present in `other`.
    pub fn merge(
        &mut self,
        other: LeadFields,
    ) {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        take!(
            name,
            tax_id,
            email,
            phone,
            birth_date,
            trade_name,
            revenue,
            partner_count,
            operating_mode,
            address,
            use_fiscal_address,
            activity_description,
            has_employees,
            employee_count,
            tier,
            monthly_value,
            one_time_setup_fee,
            selected_plan,
        );
    }
}

/// A lead as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: LeadId,
    #[serde(flatten)]
    pub fields: LeadFields,
}

/// Envelope returned by the create/update lead endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadResponse {
    pub success: bool,
    #[serde(default)]
    pub lead_id: Option<LeadId>,
    #[serde(default)]
    pub lead: Option<LeadFields>,
    #[serde(default)]
    pub message: Option<String>,
}
