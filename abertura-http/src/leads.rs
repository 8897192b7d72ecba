//! Lead API over HTTP.
//!
//! | operation            | request                               |
//! |----------------------|---------------------------------------|
//! | create_lead          | `POST  {base}/leads`                  |
//! | update_lead_progress | `PATCH {base}/leads/{id}`             |
//! | get_lead             | `GET   {base}/leads/{id}`             |
//! | submit_quote_request | `POST  {base}/leads/{id}/quote-request` |
//! | submit_payment       | `POST  {base}/leads/{id}/payment`     |
//!
//! Bodies are camelCase JSON. A `{"success": false}` answer becomes
//! [`ApiError::Rejected`].

use std::time::Duration;

use abertura_core::{
    ApiError, Lead, LeadFields, LeadId, LeadRepository, LeadResponse, PaymentDetails,
    PaymentResult, QuoteSummary,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::JsonClient;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressBody<'a> {
    step_name: &'a str,
    #[serde(flatten)]
    fields: &'a LeadFields,
}

/// Reply to requests that carry no data back.
#[derive(Debug, Deserialize)]
struct Ack {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

fn rejected(message: Option<String>) -> ApiError {
    ApiError::Rejected(message.unwrap_or_else(|| "no reason given".to_string()))
}

fn accepted(response: LeadResponse) -> Result<LeadResponse, ApiError> {
    if response.success {
        Ok(response)
    } else {
        Err(rejected(response.message))
    }
}

/// [`LeadRepository`] backed by the Attualize lead API.
#[derive(Debug, Clone)]
pub struct HttpLeadRepository {
    client: JsonClient,
}

impl HttpLeadRepository {
    pub fn new(
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        Ok(Self::with_client(JsonClient::new(base_url, timeout)?))
    }

    pub fn with_client(client: JsonClient) -> Self {
        Self { client }
    }

    fn lead_path(
        id: &LeadId,
        suffix: &str,
    ) -> String {
        format!("/leads/{}{}", id.as_str(), suffix)
    }
}

#[async_trait]
impl LeadRepository for HttpLeadRepository {
    async fn create_lead(&self, fields: LeadFields) -> Result<LeadResponse, ApiError> {
        let response: LeadResponse = self.client.post_json("/leads", &fields).await?;
        let response = accepted(response)?;
        info!(lead_id = ?response.lead_id, "lead created remotely");
        Ok(response)
    }

    async fn update_lead_progress(
        &self,
        id: &LeadId,
        fields: LeadFields,
        step_name: &str,
    ) -> Result<LeadResponse, ApiError> {
        let body = ProgressBody {
            step_name,
            fields: &fields,
        };
        let response: LeadResponse = self
            .client
            .patch_json(&Self::lead_path(id, ""), &body)
            .await?;
        debug!(lead_id = %id, step_name, "progress sent");
        accepted(response)
    }

    async fn get_lead(&self, id: &LeadId) -> Result<Lead, ApiError> {
        let response: LeadResponse = self.client.get_json(&Self::lead_path(id, "")).await?;
        let response = accepted(response)?;
        let fields = response
            .lead
            .ok_or_else(|| ApiError::Decode("response has no lead".to_string()))?;

        Ok(Lead {
            id: response.lead_id.unwrap_or_else(|| id.clone()),
            fields,
        })
    }

    async fn submit_quote_request(
        &self,
        id: &LeadId,
        summary: &QuoteSummary,
    ) -> Result<(), ApiError> {
        let ack: Ack = self
            .client
            .post_json(&Self::lead_path(id, "/quote-request"), summary)
            .await?;
        if !ack.success {
            return Err(rejected(ack.message));
        }
        info!(lead_id = %id, "quote request sent");
        Ok(())
    }

    async fn submit_payment(
        &self,
        id: &LeadId,
        details: &PaymentDetails,
    ) -> Result<PaymentResult, ApiError> {
        let result: PaymentResult = self
            .client
            .post_json(&Self::lead_path(id, "/payment"), details)
            .await?;
        info!(lead_id = %id, status = ?result.status, "payment sent");
        Ok(result)
    }
}
