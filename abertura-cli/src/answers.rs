//! Answers file for non-interactive wizard runs.
//!
//! A TOML document with one table per step. Every key is optional; a
//! missing answer simply leaves the field empty and the step will refuse
//! to advance.
//!
//! ```toml
//! [personal]
//! name = "Maria Souza"
//! tax_id = "123.456.789-01"
//! email = "maria@example.com"
//! phone = "(41) 99999-8888"
//! birth_date = "1990-05-01"
//!
//! [company]
//! trade_name = "Souza Consultoria"
//! revenue = "R$ 20.000,00"
//! partner_count = 1
//! operating_mode = "online"
//!
//! [address]
//! use_fiscal_address = true
//!
//! [activities]
//! description = "Consultoria em gestão"
//! has_employees = false
//!
//! [payment]
//! method = "pix"
//! ```

use std::path::Path;

use abertura_core::form::FieldUpdate;
use abertura_core::{OperatingMode, PaymentMethod};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnswersError {
    #[error("cannot read answers file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid answers file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown operating mode '{0}' (expected online, presencial or ambos)")]
    OperatingMode(String),

    #[error("unknown payment method '{0}' (expected pix, credit_card or boleto)")]
    PaymentMethod(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PersonalAnswers {
    pub name: Option<String>,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompanyAnswers {
    pub trade_name: Option<String>,
    /// Free text, parsed like the revenue input field.
    pub revenue: Option<String>,
    pub partner_count: Option<u32>,
    pub operating_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AddressAnswers {
    pub use_fiscal_address: bool,
    pub postal_code: Option<String>,
    /// Fill street, district, city and state from the postal code first.
    pub lookup: bool,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ActivitiesAnswers {
    pub description: Option<String>,
    pub has_employees: bool,
    pub employee_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentAnswers {
    pub method: String,
    #[serde(default)]
    pub installments: Option<u8>,
    #[serde(default)]
    pub card_token: Option<String>,
}

impl PaymentAnswers {
    pub fn method(&self) -> Result<PaymentMethod, AnswersError> {
        PaymentMethod::parse(&self.method)
            .ok_or_else(|| AnswersError::PaymentMethod(self.method.clone()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Answers {
    pub personal: PersonalAnswers,
    pub company: CompanyAnswers,
    pub address: AddressAnswers,
    pub activities: ActivitiesAnswers,
    /// Absent: stop at the payment step without paying.
    pub payment: Option<PaymentAnswers>,
}

fn push_text(
    updates: &mut Vec<FieldUpdate>,
    value: &Option<String>,
    make: fn(String) -> FieldUpdate,
) {
    if let Some(v) = value {
        updates.push(make(v.clone()));
    }
}

impl Answers {
    pub fn from_toml_str(input: &str) -> Result<Self, AnswersError> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, AnswersError> {
        let contents = std::fs::read_to_string(path).map_err(|source| AnswersError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn personal_updates(&self) -> Vec<FieldUpdate> {
        let p = &self.personal;
        let mut updates = Vec::new();
        push_text(&mut updates, &p.name, FieldUpdate::Name);
        push_text(&mut updates, &p.tax_id, FieldUpdate::TaxId);
        push_text(&mut updates, &p.email, FieldUpdate::Email);
        push_text(&mut updates, &p.phone, FieldUpdate::Phone);
        push_text(&mut updates, &p.birth_date, FieldUpdate::BirthDate);
        updates
    }

    pub fn company_updates(&self) -> Result<Vec<FieldUpdate>, AnswersError> {
        let c = &self.company;
        let mut updates = Vec::new();
        push_text(&mut updates, &c.trade_name, FieldUpdate::TradeName);
        if let Some(revenue) = &c.revenue {
            updates.push(FieldUpdate::revenue_text(revenue));
        }
        if let Some(n) = c.partner_count {
            updates.push(FieldUpdate::PartnerCount(n));
        }
        if let Some(mode) = &c.operating_mode {
            let parsed = OperatingMode::parse(mode)
                .ok_or_else(|| AnswersError::OperatingMode(mode.clone()))?;
            updates.push(FieldUpdate::OperatingMode(Some(parsed)));
        }
        Ok(updates)
    }

    /// Manual address fields, applied after any postal-code lookup so they
    /// win over the looked-up values.
    pub fn address_updates(&self) -> Vec<FieldUpdate> {
        let a = &self.address;
        if a.use_fiscal_address {
            return vec![FieldUpdate::UseFiscalAddress(true)];
        }

        let mut updates = vec![FieldUpdate::UseFiscalAddress(false)];
        if !a.lookup {
            push_text(&mut updates, &a.postal_code, FieldUpdate::PostalCode);
        }
        push_text(&mut updates, &a.street, FieldUpdate::Street);
        push_text(&mut updates, &a.number, FieldUpdate::Number);
        push_text(&mut updates, &a.complement, FieldUpdate::Complement);
        push_text(&mut updates, &a.district, FieldUpdate::District);
        push_text(&mut updates, &a.city, FieldUpdate::City);
        push_text(&mut updates, &a.state, FieldUpdate::State);
        updates
    }

    /// The postal code to look up before applying [`Self::address_updates`].
    pub fn postal_code_lookup(&self) -> Option<&str> {
        let a = &self.address;
        if a.use_fiscal_address || !a.lookup {
            return None;
        }
        a.postal_code.as_deref()
    }

    pub fn activities_updates(&self) -> Vec<FieldUpdate> {
        let a = &self.activities;
        let mut updates = Vec::new();
        push_text(&mut updates, &a.description, FieldUpdate::ActivityDescription);
        updates.push(FieldUpdate::HasEmployees(a.has_employees));
        if let Some(n) = a.employee_count {
            updates.push(FieldUpdate::EmployeeCount(n));
        }
        updates
    }
}
