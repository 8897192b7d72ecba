use rust_decimal::Decimal;

use crate::calculations::common::parse_money;
use crate::models::OperatingMode;

/// Input fields of the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    TaxId,
    Email,
    Phone,
    BirthDate,
    TradeName,
    Revenue,
    PartnerCount,
    OperatingMode,
    PostalCode,
    Street,
    Number,
    Complement,
    District,
    City,
    State,
    UseFiscalAddress,
    ActivityDescription,
    HasEmployees,
    EmployeeCount,
}

/// A single user edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Name(String),
    TaxId(String),
    Email(String),
    Phone(String),
    BirthDate(String),
    TradeName(String),
    Revenue(Option<Decimal>),
    PartnerCount(u32),
    OperatingMode(Option<OperatingMode>),
    PostalCode(String),
    Street(String),
    Number(String),
    Complement(String),
    District(String),
    City(String),
    State(String),
    UseFiscalAddress(bool),
    ActivityDescription(String),
    HasEmployees(bool),
    /// Signed so that negative input can be clamped rather than rejected.
    EmployeeCount(i64),
}

impl FieldUpdate {
    /// Revenue typed as text. Unparsable text clears the revenue.
    pub fn revenue_text(input: &str) -> Self {
        Self::Revenue(parse_money(input))
    }

    pub fn field(&self) -> Field {
        match self {
            Self::Name(_) => Field::Name,
            Self::TaxId(_) => Field::TaxId,
            Self::Email(_) => Field::Email,
            Self::Phone(_) => Field::Phone,
            Self::BirthDate(_) => Field::BirthDate,
            Self::TradeName(_) => Field::TradeName,
            Self::Revenue(_) => Field::Revenue,
            Self::PartnerCount(_) => Field::PartnerCount,
            Self::OperatingMode(_) => Field::OperatingMode,
            Self::PostalCode(_) => Field::PostalCode,
            Self::Street(_) => Field::Street,
            Self::Number(_) => Field::Number,
            Self::Complement(_) => Field::Complement,
            Self::District(_) => Field::District,
            Self::City(_) => Field::City,
            Self::State(_) => Field::State,
            Self::UseFiscalAddress(_) => Field::UseFiscalAddress,
            Self::ActivityDescription(_) => Field::ActivityDescription,
            Self::HasEmployees(_) => Field::HasEmployees,
            Self::EmployeeCount(_) => Field::EmployeeCount,
        }
    }
}

/// Fields computed from other fields and cached in the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedField {
    Quote,
    SelectedPlan,
}

/// Inputs that feed the quote engine, directly or through the fiscal-address rule.
pub const QUOTE_INPUTS: &[Field] = &[
    Field::Revenue,
    Field::EmployeeCount,
    Field::State,
    Field::UseFiscalAddress,
    Field::OperatingMode,
];

/// Upstream inputs of every derived field. A change to any input
/// invalidates the derived value.
pub const DERIVED_INPUTS: &[(DerivedField, &[Field])] = &[
    (DerivedField::Quote, QUOTE_INPUTS),
    // The plan is picked from the quote, so it goes stale with it.
    (DerivedField::SelectedPlan, QUOTE_INPUTS),
];

/// Derived fields invalidated by a set of changed inputs.
pub fn dependents_of(changed: &[Field]) -> Vec<DerivedField> {
    DERIVED_INPUTS
        .iter()
        .filter(|(_, inputs)| inputs.iter().any(|f| changed.contains(f)))
        .map(|(derived, _)| *derived)
        .collect()
}
