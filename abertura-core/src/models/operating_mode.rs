use serde::{Deserialize, Serialize};

/// How the company will operate once opened.
///
/// Only fully online companies may use the provider's fiscal address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    Online,
    Presencial,
    Ambos,
}

impl OperatingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Presencial => "presencial",
            Self::Ambos => "ambos",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Some(Self::Online),
            "presencial" => Some(Self::Presencial),
            "ambos" => Some(Self::Ambos),
            _ => None,
        }
    }

    /// Whether the provider's registered address may be used as the company address.
    pub fn allows_fiscal_address(&self) -> bool {
        matches!(self, Self::Online)
    }
}
