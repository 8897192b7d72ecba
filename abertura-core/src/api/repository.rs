use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    Lead, LeadFields, LeadId, LeadResponse, PaymentDetails, PaymentResult, QuoteSummary,
};

/// Errors raised by the remote collaborators of the wizard.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    /// The backend answered `success: false`.
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LeadResponse {
    /// Extracts the lead id from a successful response.
    ///
    /// # Errors
    /// * [`ApiError::Rejected`] when `success` is false.
    /// * [`ApiError::Decode`] when a successful response carries no id.
    pub fn into_lead_id(self) -> Result<LeadId, ApiError> {
        if !self.success {
            return Err(ApiError::Rejected(
                self.message.unwrap_or_else(|| "no reason given".to_string()),
            ));
        }
        self.lead_id
            .ok_or_else(|| ApiError::Decode("response has no leadId".to_string()))
    }
}

/// The lead API consumed by the wizard.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Opens a lead from the minimal contact fields.
    async fn create_lead(&self, fields: LeadFields) -> Result<LeadResponse, ApiError>;

    /// Partially updates a lead. `step_name` records how far the user got.
    async fn update_lead_progress(
        &self,
        id: &LeadId,
        fields: LeadFields,
        step_name: &str,
    ) -> Result<LeadResponse, ApiError>;

    /// Loads a lead to resume a session.
    async fn get_lead(&self, id: &LeadId) -> Result<Lead, ApiError>;

    /// Records that a blocked lead asked the sales team for a quote.
    async fn submit_quote_request(
        &self,
        id: &LeadId,
        summary: &QuoteSummary,
    ) -> Result<(), ApiError>;

    /// Hands the checkout to the payment gateway.
    async fn submit_payment(
        &self,
        id: &LeadId,
        details: &PaymentDetails,
    ) -> Result<PaymentResult, ApiError>;
}
