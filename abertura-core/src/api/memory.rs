//! In-memory adapters for the wizard's ports. Not durable; used by the
//! `memory` backend, the CLI dry runs and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

use super::factory::{BackendConfig, LeadRepositoryFactory};
use super::lookup::PostalCodeLookup;
use super::repository::{ApiError, LeadRepository};
use super::session_store::{SessionStore, SessionStoreError};
use crate::models::{
    Lead, LeadFields, LeadId, LeadResponse, PaymentDetails, PaymentMethod, PaymentResult,
    PaymentStatus, PostalAddress, QuoteSummary,
};
use crate::session::SessionToken;

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Operations of [`LeadRepository`], as recorded by the in-memory backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateLead,
    UpdateProgress,
    GetLead,
    QuoteRequest,
    Payment,
}

/// One call received by [`InMemoryLeadRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: Operation,
    pub lead_id: Option<LeadId>,
    pub step_name: Option<String>,
    pub fields: Option<LeadFields>,
}

#[derive(Debug, Default)]
struct LeadStore {
    leads: HashMap<LeadId, LeadFields>,
    next_id: u64,
    next_tx: u64,
    calls: Vec<RecordedCall>,
    quote_requests: Vec<(LeadId, QuoteSummary)>,
    payments: Vec<(LeadId, PaymentDetails)>,
    failures: HashMap<Operation, ApiError>,
}

/// Lead API kept in a process-local map.
///
/// Failures can be injected per operation and a fixed latency can be added
/// to every call, which makes it usable to exercise the autosave timing.
#[derive(Debug, Default)]
pub struct InMemoryLeadRepository {
    store: Mutex<LeadStore>,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryLeadRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call to `operation` fail with `error`.
    pub fn fail(
        &self,
        operation: Operation,
        error: ApiError,
    ) {
        guard(&self.store).failures.insert(operation, error);
    }

    pub fn recover(
        &self,
        operation: Operation,
    ) {
        guard(&self.store).failures.remove(&operation);
    }

    pub fn set_latency(
        &self,
        latency: Option<Duration>,
    ) {
        *guard(&self.latency) = latency;
    }

    /// Seeds a lead, as if created in an earlier session.
    pub fn insert(
        &self,
        id: LeadId,
        fields: LeadFields,
    ) {
        guard(&self.store).leads.insert(id, fields);
    }

    pub fn lead(
        &self,
        id: &LeadId,
    ) -> Option<LeadFields> {
        guard(&self.store).leads.get(id).cloned()
    }

    pub fn lead_count(&self) -> usize {
        guard(&self.store).leads.len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        guard(&self.store).calls.clone()
    }

    pub fn call_count(
        &self,
        operation: Operation,
    ) -> usize {
        guard(&self.store)
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    pub fn quote_requests(&self) -> Vec<(LeadId, QuoteSummary)> {
        guard(&self.store).quote_requests.clone()
    }

    pub fn payments(&self) -> Vec<(LeadId, PaymentDetails)> {
        guard(&self.store).payments.clone()
    }

    /// Waits for the configured latency, then records the call and returns
    /// the injected failure for `operation`, if any.
    async fn enter(
        &self,
        call: RecordedCall,
    ) -> Result<(), ApiError> {
        let latency = *guard(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut store = guard(&self.store);
        let failure = store.failures.get(&call.operation).cloned();
        store.calls.push(call);
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn call(
    operation: Operation,
    lead_id: Option<&LeadId>,
) -> RecordedCall {
    RecordedCall {
        operation,
        lead_id: lead_id.cloned(),
        step_name: None,
        fields: None,
    }
}

fn not_found(id: &LeadId) -> ApiError {
    ApiError::NotFound(format!("lead {id}"))
}

#[async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn create_lead(&self, fields: LeadFields) -> Result<LeadResponse, ApiError> {
        self.enter(RecordedCall {
            fields: Some(fields.clone()),
            ..call(Operation::CreateLead, None)
        })
        .await?;

        let mut store = guard(&self.store);
        store.next_id += 1;
        let id = LeadId::new(format!("mem-lead-{}", store.next_id));
        store.leads.insert(id.clone(), fields.clone());
        debug!(lead_id = %id, "in-memory lead created");

        Ok(LeadResponse {
            success: true,
            lead_id: Some(id),
            lead: Some(fields),
            message: None,
        })
    }

    async fn update_lead_progress(
        &self,
        id: &LeadId,
        fields: LeadFields,
        step_name: &str,
    ) -> Result<LeadResponse, ApiError> {
        self.enter(RecordedCall {
            step_name: Some(step_name.to_string()),
            fields: Some(fields.clone()),
            ..call(Operation::UpdateProgress, Some(id))
        })
        .await?;

        let mut store = guard(&self.store);
        let stored = store.leads.get_mut(id).ok_or_else(|| not_found(id))?;
        stored.merge(fields);

        Ok(LeadResponse {
            success: true,
            lead_id: Some(id.clone()),
            lead: Some(stored.clone()),
            message: None,
        })
    }

    async fn get_lead(&self, id: &LeadId) -> Result<Lead, ApiError> {
        self.enter(call(Operation::GetLead, Some(id))).await?;

        let store = guard(&self.store);
        let fields = store.leads.get(id).cloned().ok_or_else(|| not_found(id))?;
        Ok(Lead {
            id: id.clone(),
            fields,
        })
    }

    async fn submit_quote_request(
        &self,
        id: &LeadId,
        summary: &QuoteSummary,
    ) -> Result<(), ApiError> {
        self.enter(call(Operation::QuoteRequest, Some(id))).await?;

        let mut store = guard(&self.store);
        if !store.leads.contains_key(id) {
            return Err(not_found(id));
        }
        store.quote_requests.push((id.clone(), summary.clone()));
        Ok(())
    }

    async fn submit_payment(
        &self,
        id: &LeadId,
        details: &PaymentDetails,
    ) -> Result<PaymentResult, ApiError> {
        self.enter(call(Operation::Payment, Some(id))).await?;

        let mut store = guard(&self.store);
        if !store.leads.contains_key(id) {
            return Err(not_found(id));
        }
        store.payments.push((id.clone(), details.clone()));

        if details.amount <= Decimal::ZERO {
            return Ok(PaymentResult {
                status: PaymentStatus::Rejected,
                transaction_id: None,
                message: Some("invalid amount".to_string()),
            });
        }
        if details.method == PaymentMethod::CreditCard && details.card_token.is_none() {
            return Ok(PaymentResult {
                status: PaymentStatus::Rejected,
                transaction_id: None,
                message: Some("missing card token".to_string()),
            });
        }

        store.next_tx += 1;
        let status = match details.method {
            PaymentMethod::Boleto => PaymentStatus::Pending,
            PaymentMethod::Pix | PaymentMethod::CreditCard => PaymentStatus::Approved,
        };
        Ok(PaymentResult {
            status,
            transaction_id: Some(format!("mem-tx-{}", store.next_tx)),
            message: None,
        })
    }
}

/// Factory for the built-in `memory` backend.
pub struct MemoryBackendFactory;

#[async_trait]
impl LeadRepositoryFactory for MemoryBackendFactory {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create(
        &self,
        _config: &BackendConfig,
    ) -> Result<Arc<dyn LeadRepository>, ApiError> {
        Ok(Arc::new(InMemoryLeadRepository::new()))
    }
}

/// Session slot held in memory.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    slot: Mutex<Option<SessionToken>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: SessionToken) -> Self {
        Self {
            slot: Mutex::new(Some(token)),
        }
    }

    pub fn current(&self) -> Option<SessionToken> {
        guard(&self.slot).clone()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self) -> Result<Option<SessionToken>, SessionStoreError> {
        Ok(self.current())
    }

    async fn save(&self, token: &SessionToken) -> Result<(), SessionStoreError> {
        *guard(&self.slot) = Some(token.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionStoreError> {
        *guard(&self.slot) = None;
        Ok(())
    }
}

/// Postal-code lookup answering from a fixed table.
#[derive(Debug, Default)]
pub struct StaticPostalCodeLookup {
    addresses: HashMap<String, PostalAddress>,
}

impl StaticPostalCodeLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(
        mut self,
        address: PostalAddress,
    ) -> Self {
        self.addresses.insert(address.postal_code.clone(), address);
        self
    }
}

#[async_trait]
impl PostalCodeLookup for StaticPostalCodeLookup {
    async fn lookup(&self, postal_code: &str) -> Result<Option<PostalAddress>, ApiError> {
        let digits: String = postal_code.chars().filter(char::is_ascii_digit).collect();
        Ok(self.addresses.get(&digits).cloned())
    }
}
