//! Per-step required-field checks gating forward navigation.
//!
//! Checks are about presence and length only; contents such as CPF check
//! digits or e-mail syntax are left to the backend.

use std::fmt;

use rust_decimal::Decimal;

use crate::form::Field;
use crate::models::WizardState;
use crate::stepper::Step;

pub const MIN_TAX_ID_LEN: usize = 11;
pub const MIN_PHONE_LEN: usize = 10;
pub const POSTAL_CODE_LEN: usize = 8;
pub const STATE_LEN: usize = 2;

/// A failed requirement on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub step: Step,
    pub field: Field,
    pub message: &'static str,
}

impl fmt::Display for ValidationIssue {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?}: {}", self.field, self.message)
    }
}

fn len(s: &str) -> usize {
    s.trim().chars().count()
}

fn present(s: &str) -> bool {
    !s.trim().is_empty()
}

/// Whether `state` satisfies every requirement of `step`.
pub fn is_step_valid(
    step: Step,
    state: &WizardState,
) -> bool {
    step_issues(step, state).is_empty()
}

/// Every requirement of `step` that `state` fails, in field order.
pub fn step_issues(
    step: Step,
    state: &WizardState,
) -> Vec<ValidationIssue> {
    let checks: Vec<(bool, Field, &'static str)> = match step {
        Step::Personal => vec![
            (present(&state.name), Field::Name, "name is required"),
            (
                len(&state.tax_id) >= MIN_TAX_ID_LEN,
                Field::TaxId,
                "CPF must have at least 11 characters",
            ),
            (state.email.contains('@'), Field::Email, "e-mail must contain '@'"),
            (
                len(&state.phone) >= MIN_PHONE_LEN,
                Field::Phone,
                "phone must have at least 10 characters",
            ),
            (present(&state.birth_date), Field::BirthDate, "birth date is required"),
        ],
        Step::Company => vec![
            (present(&state.trade_name), Field::TradeName, "trade name is required"),
            (
                state.revenue.is_some_and(|r| r > Decimal::ZERO),
                Field::Revenue,
                "revenue must be greater than zero",
            ),
            (
                state.operating_mode.is_some(),
                Field::OperatingMode,
                "operating mode is required",
            ),
            (
                state.partner_count >= 1,
                Field::PartnerCount,
                "at least one partner is required",
            ),
        ],
        Step::Address if state.use_fiscal_address => vec![],
        Step::Address => {
            let a = &state.address;
            vec![
                (
                    len(&a.postal_code) == POSTAL_CODE_LEN,
                    Field::PostalCode,
                    "CEP must have 8 digits",
                ),
                (present(&a.street), Field::Street, "street is required"),
                (present(&a.number), Field::Number, "number is required"),
                (present(&a.district), Field::District, "district is required"),
                (present(&a.city), Field::City, "city is required"),
                (len(&a.state) == STATE_LEN, Field::State, "state must be a 2-letter code"),
            ]
        }
        Step::Activities => vec![(
            present(&state.activity_description),
            Field::ActivityDescription,
            "main activity is required",
        )],
        Step::Summary | Step::Payment => vec![],
    };

    checks
        .into_iter()
        .filter(|(ok, _, _)| !ok)
        .map(|(_, field, message)| ValidationIssue {
            step,
            field,
            message,
        })
        .collect()
}
