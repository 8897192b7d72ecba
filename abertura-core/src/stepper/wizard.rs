use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{Step, StepEvent, transition};
use crate::api::{
    ApiError, LeadRepository, PostalCodeLookup, SessionStore, SessionStoreError,
};
use crate::autosave::{AutosaveController, EnsuredLead, LeadSync, SaveStatus, SyncOutcome};
use crate::calculations::QuoteEngine;
use crate::config::{ConfigError, WizardConfig};
use crate::form::{FieldUpdate, FormStore};
use crate::models::{LeadId, PaymentDetails, PaymentResult, Quote, WizardState};
use crate::session::SessionToken;
use crate::validation::{ValidationIssue, is_step_valid, step_issues};

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("{step} is incomplete: {}", join_issues(.issues))]
    StepInvalid {
        step: Step,
        issues: Vec<ValidationIssue>,
    },

    #[error("cannot go {event:?} from {from}")]
    InvalidTransition { from: Step, event: StepEvent },

    #[error("this session has no lead yet")]
    MissingLead,

    #[error("{0}")]
    Unavailable(&'static str),

    #[error("request failed: {0}")]
    Submit(#[from] ApiError),

    #[error("session store failed: {0}")]
    Session(#[from] SessionStoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.message)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Non-blocking message for the host to show next to the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The lead could not be opened; autosave will try again.
    LeadNotCreated { message: String },
    PostalCodeNotFound { postal_code: String },
    PostalLookupFailed { message: String },
}

impl fmt::Display for Notice {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::LeadNotCreated { message } => {
                write!(f, "Não foi possível salvar seus dados agora ({message}).")
            }
            Self::PostalCodeNotFound { postal_code } => {
                write!(f, "CEP {postal_code} não encontrado. Preencha o endereço manualmente.")
            }
            Self::PostalLookupFailed { message } => {
                write!(f, "Consulta de CEP indisponível ({message}).")
            }
        }
    }
}

/// What the payment step shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentView {
    /// Manual review: no online checkout, only a quote request.
    Blocked { quote: Quote },
    Checkout {
        quote: Quote,
        monthly: Decimal,
        setup_fee: Decimal,
    },
}

impl PaymentView {
    fn for_quote(quote: Quote) -> Self {
        match quote.monthly_value {
            Some(monthly) if !quote.blocks_online_checkout => Self::Checkout {
                monthly,
                setup_fee: quote.one_time_setup_fee,
                quote,
            },
            _ => Self::Blocked { quote },
        }
    }
}

/// Result of a successful navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: Step,
    pub to: Step,
    pub notice: Option<Notice>,
    /// Set when `to` is [`Step::Payment`].
    pub payment: Option<PaymentView>,
}

/// Collaborators and settings needed to run a [`Wizard`].
pub struct WizardParts {
    pub repository: Arc<dyn LeadRepository>,
    pub postal_codes: Arc<dyn PostalCodeLookup>,
    pub sessions: Arc<dyn SessionStore>,
    pub config: WizardConfig,
}

/// Drives one user through the six steps.
///
/// Owns the form state and the current step. Edits are autosaved in the
/// background; moving forward also submits the current step right away.
pub struct Wizard {
    store: FormStore,
    engine: QuoteEngine,
    state: WizardState,
    step: Step,
    postal_codes: Arc<dyn PostalCodeLookup>,
    sync: Arc<LeadSync>,
    autosave: AutosaveController,
}

impl Wizard {
    /// Starts a wizard, resuming the stored session when it is still valid.
    ///
    /// An expired or unknown stored lead is cleared and the wizard starts
    /// empty. A resumed wizard opens on its first incomplete step.
    pub async fn start(parts: WizardParts) -> Result<Self, WizardError> {
        let WizardParts {
            repository,
            postal_codes,
            sessions,
            config,
        } = parts;
        config.validate()?;

        let store = FormStore::new(config.fiscal_address.clone());
        let engine = QuoteEngine::new(config.pricing.clone()).map_err(ConfigError::from)?;

        let (token, state) =
            resume_session(repository.as_ref(), sessions.as_ref(), &store, &config).await?;
        let resumed = token.is_some();

        let sync = Arc::new(LeadSync::new(repository, sessions, token));
        let autosave = AutosaveController::spawn(sync.clone(), config.debounce());

        let mut wizard = Self {
            store,
            engine,
            state,
            step: Step::Personal,
            postal_codes,
            sync,
            autosave,
        };

        if resumed {
            let step = first_incomplete_step(&wizard.state);
            wizard.step = step;
            wizard.enter(step);
            info!(step = step.wire_name(), "session resumed");
        }

        Ok(wizard)
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// Requirements of the current step that are not met yet.
    pub fn issues(&self) -> Vec<ValidationIssue> {
        step_issues(self.step, &self.state)
    }

    pub fn save_status(&self) -> SaveStatus {
        self.autosave.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.autosave.subscribe()
    }

    pub async fn session(&self) -> Option<SessionToken> {
        self.sync.session().await
    }

    /// The payment step's content, once the wizard is on it.
    pub fn payment_view(&self) -> Option<PaymentView> {
        if self.step != Step::Payment {
            return None;
        }
        self.state.quote.clone().map(PaymentView::for_quote)
    }

    /// Applies one edit and schedules an autosave when anything changed.
    pub fn update(
        &mut self,
        update: FieldUpdate,
    ) {
        let next = self.store.update(&self.state, update);
        if next == self.state {
            return;
        }
        self.state = next;
        self.autosave.schedule_sync(self.state.clone(), self.step);
    }

    pub fn update_all(
        &mut self,
        updates: impl IntoIterator<Item = FieldUpdate>,
    ) {
        let next = self.store.update_all(&self.state, updates);
        if next == self.state {
            return;
        }
        self.state = next;
        self.autosave.schedule_sync(self.state.clone(), self.step);
    }

    /// Submits the current step and moves forward.
    ///
    /// # Errors
    /// * [`WizardError::InvalidTransition`] on the last step.
    /// * [`WizardError::StepInvalid`] when the current step is incomplete.
    ///
    /// Failing to save does not block navigation: a failed lead creation is
    /// reported as a [`Notice`], a failed progress update only in the save
    /// status.
    pub async fn next(&mut self) -> Result<Transition, WizardError> {
        let from = self.step;
        let to = transition(from, StepEvent::Next).ok_or(WizardError::InvalidTransition {
            from,
            event: StepEvent::Next,
        })?;

        let issues = step_issues(from, &self.state);
        if !issues.is_empty() {
            debug!(step = from.wire_name(), count = issues.len(), "step incomplete");
            return Err(WizardError::StepInvalid { step: from, issues });
        }

        let notice = self.submit_step().await;
        self.step = to;
        let payment = self.enter(to);
        debug!(from = from.wire_name(), to = to.wire_name(), "step advanced");

        Ok(Transition {
            from,
            to,
            notice,
            payment,
        })
    }

    /// Moves one step back. Never validated and never saved.
    pub fn back(&mut self) -> Result<Transition, WizardError> {
        let from = self.step;
        let to = transition(from, StepEvent::Back).ok_or(WizardError::InvalidTransition {
            from,
            event: StepEvent::Back,
        })?;
        self.step = to;
        debug!(from = from.wire_name(), to = to.wire_name(), "step back");

        Ok(Transition {
            from,
            to,
            notice: None,
            payment: None,
        })
    }

    /// Fills the address from a CEP lookup.
    ///
    /// Returns a notice when the code is unknown or the lookup fails; manual
    /// entry stays possible either way. Does nothing while the fiscal address
    /// is in use.
    pub async fn lookup_postal_code(
        &mut self,
        postal_code: &str,
    ) -> Option<Notice> {
        if self.state.use_fiscal_address {
            debug!("fiscal address in use; CEP lookup skipped");
            return None;
        }

        self.update(FieldUpdate::PostalCode(postal_code.to_string()));
        let code = self.state.address.postal_code.clone();

        match self.postal_codes.lookup(&code).await {
            Ok(Some(found)) => {
                self.update_all([
                    FieldUpdate::Street(found.street),
                    FieldUpdate::District(found.district),
                    FieldUpdate::City(found.city),
                    FieldUpdate::State(found.state),
                ]);
                None
            }
            Ok(None) => Some(Notice::PostalCodeNotFound { postal_code: code }),
            Err(err) => {
                warn!(postal_code = %code, error = %err, "CEP lookup failed");
                Some(Notice::PostalLookupFailed {
                    message: err.to_string(),
                })
            }
        }
    }

    /// Sends the quote summary to the sales team. Only for quotes that
    /// cannot be paid online.
    pub async fn request_quote(&self) -> Result<(), WizardError> {
        let quote = self
            .state
            .quote
            .as_ref()
            .ok_or(WizardError::Unavailable("no quote has been computed"))?;
        if !quote.blocks_online_checkout {
            return Err(WizardError::Unavailable(
                "this quote can be paid online; no review needed",
            ));
        }
        let summary = self
            .state
            .quote_summary()
            .ok_or(WizardError::Unavailable("no quote has been computed"))?;

        let id = self.lead_id().await?;
        self.sync
            .repository()
            .submit_quote_request(&id, &summary)
            .await?;
        info!(lead_id = %id, tier = %summary.tier, "quote request submitted");
        Ok(())
    }

    /// Hands the checkout to the payment gateway. Not retried on failure.
    pub async fn submit_payment(
        &self,
        details: &PaymentDetails,
    ) -> Result<PaymentResult, WizardError> {
        match self.payment_view() {
            Some(PaymentView::Checkout { .. }) => {}
            Some(PaymentView::Blocked { .. }) => {
                return Err(WizardError::Unavailable(
                    "online checkout is blocked for this quote",
                ));
            }
            None => return Err(WizardError::Unavailable("payment step not reached")),
        }

        let id = self.lead_id().await?;
        let result = self.sync.repository().submit_payment(&id, details).await?;
        info!(lead_id = %id, status = ?result.status, "payment submitted");
        Ok(result)
    }

    /// Saves whatever is pending, stops autosave and hands the final state
    /// to `on_close`.
    pub async fn close<F>(
        self,
        on_close: F,
    ) where
        F: FnOnce(&WizardState),
    {
        self.autosave.flush().await;
        self.autosave.shutdown().await;
        on_close(&self.state);
    }

    /// Like [`Self::close`] for a finished wizard: also clears the stored
    /// session so it is not resumed.
    pub async fn complete(self) -> Result<WizardState, WizardError> {
        self.autosave.flush().await;
        self.autosave.shutdown().await;
        self.sync.forget().await?;
        info!("wizard completed");
        Ok(self.state)
    }

    async fn lead_id(&self) -> Result<LeadId, WizardError> {
        match self.sync.ensure_lead(&self.state).await? {
            Some(lead) => Ok(lead.id().clone()),
            None => Err(WizardError::MissingLead),
        }
    }

    /// Saves the current step: creates the lead if needed, then sends the
    /// step's fields.
    async fn submit_step(&self) -> Option<Notice> {
        let step = self.step;
        let seq = self.sync.next_seq();

        let lead = match self.sync.ensure_lead(&self.state).await {
            Ok(lead) => lead,
            Err(err) => {
                warn!(step = step.wire_name(), error = %err, "lead creation failed");
                let message = err.to_string();
                self.sync.record(seq, &Err(err));
                return Some(Notice::LeadNotCreated { message });
            }
        };

        let result = match &lead {
            None => Ok(SyncOutcome::Skipped),
            Some(EnsuredLead::Existing(id)) | Some(EnsuredLead::Created(id)) => {
                self.sync.update_progress(id, &self.state, step).await
            }
        };
        if let Err(err) = &result {
            warn!(step = step.wire_name(), error = %err, "progress update failed");
        }
        self.sync.record(seq, &result);
        None
    }

    /// Side effects of arriving on `step`.
    fn enter(
        &mut self,
        step: Step,
    ) -> Option<PaymentView> {
        if step >= Step::Summary && self.state.quote.is_none() {
            self.state.quote = self.engine.compute(&self.state.quote_input());
            self.state.selected_plan = self
                .state
                .quote
                .as_ref()
                .filter(|q| !q.tier.requires_manual_review())
                .map(|q| q.tier.as_str().to_string());
            if let Some(quote) = &self.state.quote {
                debug!(tier = %quote.tier, monthly = ?quote.monthly_value, "quote computed");
            }
        }

        if step == Step::Payment {
            self.state.quote.clone().map(PaymentView::for_quote)
        } else {
            None
        }
    }
}

/// Loads, checks and hydrates the stored session.
async fn resume_session(
    repository: &dyn LeadRepository,
    sessions: &dyn SessionStore,
    store: &FormStore,
    config: &WizardConfig,
) -> Result<(Option<SessionToken>, WizardState), WizardError> {
    let Some(stored) = sessions.load().await? else {
        return Ok((None, WizardState::default()));
    };

    let Some(token) = SessionToken::resume(stored, Utc::now(), &config.session_policy()) else {
        info!("stored session expired");
        sessions.clear().await?;
        return Ok((None, WizardState::default()));
    };

    match repository.get_lead(&token.lead_id).await {
        Ok(lead) => Ok((Some(token), store.hydrate(&lead.fields))),
        Err(ApiError::NotFound(_)) => {
            info!(lead_id = %token.lead_id, "stored lead no longer exists");
            sessions.clear().await?;
            Ok((None, WizardState::default()))
        }
        Err(err) => {
            warn!(lead_id = %token.lead_id, error = %err, "could not load stored lead");
            Ok((Some(token), WizardState::default()))
        }
    }
}

fn first_incomplete_step(state: &WizardState) -> Step {
    Step::ALL
        .into_iter()
        .take_while(|s| *s < Step::Summary)
        .find(|s| !is_step_valid(*s, state))
        .unwrap_or(Step::Summary)
}
