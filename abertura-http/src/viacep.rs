//! CEP lookup through ViaCEP (`GET {base}/ws/{cep}/json/`).

use std::time::Duration;

use abertura_core::{ApiError, PostalAddress, PostalCodeLookup};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::client::JsonClient;
use crate::error::HttpError;

pub const VIACEP_URL: &str = "https://viacep.com.br";

/// ViaCEP reply. Unknown codes answer `{"erro": true}` (older deployments
/// send the string `"true"`).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ViaCepResponse {
    cep: String,
    logradouro: String,
    bairro: String,
    localidade: String,
    uf: String,
    erro: Option<serde_json::Value>,
}

impl ViaCepResponse {
    fn is_error(&self) -> bool {
        match &self.erro {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s == "true",
            _ => false,
        }
    }

    fn into_address(self) -> PostalAddress {
        PostalAddress {
            postal_code: self.cep.chars().filter(char::is_ascii_digit).collect(),
            street: self.logradouro,
            district: self.bairro,
            city: self.localidade,
            state: self.uf,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViaCepClient {
    client: JsonClient,
}

impl ViaCepClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        Ok(Self::with_client(JsonClient::new(base_url, timeout)?))
    }

    pub fn with_client(client: JsonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PostalCodeLookup for ViaCepClient {
    async fn lookup(&self, postal_code: &str) -> Result<Option<PostalAddress>, ApiError> {
        let digits: String = postal_code.chars().filter(char::is_ascii_digit).collect();
        if digits.len() != 8 {
            debug!(postal_code, "malformed CEP; lookup skipped");
            return Ok(None);
        }

        let path = format!("/ws/{digits}/json/");
        match self.client.get_json::<ViaCepResponse>(&path).await {
            Ok(response) if response.is_error() => Ok(None),
            Ok(response) => Ok(Some(response.into_address())),
            Err(HttpError::Status { status: 400, .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn erro_flag_accepts_bool_and_string() {
        let as_bool: ViaCepResponse = serde_json::from_str(r#"{"erro": true}"#).unwrap();
        let as_string: ViaCepResponse = serde_json::from_str(r#"{"erro": "true"}"#).unwrap();
        let found: ViaCepResponse = serde_json::from_str(r#"{"cep": "80020-310"}"#).unwrap();

        assert!(as_bool.is_error());
        assert!(as_string.is_error());
        assert!(!found.is_error());
    }

    #[test]
    fn address_keeps_cep_digits_only() {
        let response = ViaCepResponse {
            cep: "80020-310".to_string(),
            logradouro: "Rua XV de Novembro".to_string(),
            bairro: "Centro".to_string(),
            localidade: "Curitiba".to_string(),
            uf: "PR".to_string(),
            erro: None,
        };

        assert_eq!(response.into_address().postal_code, "80020310");
    }
}
