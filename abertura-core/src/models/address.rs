use serde::{Deserialize, Serialize};

/// A Brazilian street address as collected by the address step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    /// CEP, digits only.
    pub postal_code: String,
    pub street: String,
    pub number: String,
    pub complement: String,
    pub district: String,
    pub city: String,
    /// Two-letter UF code, upper case.
    pub state: String,
}

impl Address {
    /// The provider's registered address in Curitiba/PR, offered as the
    /// company's fiscal address.
    pub fn provider_fiscal_address() -> Self {
        Self {
            postal_code: "80020310".to_string(),
            street: "Rua XV de Novembro".to_string(),
            number: "1299".to_string(),
            complement: String::new(),
            district: "Centro".to_string(),
            city: "Curitiba".to_string(),
            state: "PR".to_string(),
        }
    }
}

/// Result of a successful postal-code lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub postal_code: String,
    pub street: String,
    pub district: String,
    pub city: String,
    pub state: String,
}
