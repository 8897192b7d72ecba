//! Wiring between the command line and the wizard engine.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use abertura_core::api::{BackendRegistry, InMemorySessionStore};
use abertura_core::calculations::QuoteEngine;
use abertura_core::form::{FieldUpdate, FormStore};
use abertura_core::{
    PaymentDetails, PaymentResult, PaymentStatus, PaymentView, Quote, SessionOrigin, SessionStore,
    Step, Wizard, WizardConfig, WizardError, WizardParts, WizardState,
};
use abertura_http::ViaCepClient;
use abertura_session_sqlite::SqliteSessionStore;
use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::answers::Answers;
use crate::csv_loader::QuoteRequest;
use crate::report::{self, BatchLine};

/// Overrides the lead API endpoint and switches to the `http` backend.
pub const API_URL_ENV: &str = "ABERTURA_API_URL";

/// Registry with every backend this binary ships: `memory` and `http`.
pub fn build_registry() -> BackendRegistry {
    let mut registry = BackendRegistry::with_builtin();
    abertura_http::register(&mut registry);
    registry
}

/// Reads the configuration file. A missing file means defaults.
/// `api_url` (normally from [`API_URL_ENV`]) wins over the file's backend.
pub fn load_config(
    path: &Path,
    api_url: Option<String>,
) -> Result<WizardConfig> {
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        WizardConfig::from_toml_str(&contents)
            .with_context(|| format!("Invalid config file '{}'", path.display()))?
    } else {
        debug!(path = %path.display(), "no config file; using defaults");
        WizardConfig::default()
    };

    if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
        config = config.with_api_url(url);
        config.validate().context("Invalid API URL override")?;
    }

    Ok(config)
}

pub fn postal_code_client(config: &WizardConfig) -> Result<ViaCepClient> {
    let timeout = Duration::from_secs(config.postal_code.timeout_secs);
    ViaCepClient::new(&config.postal_code.base_url, timeout)
        .context("Failed to build the postal-code client")
}

/// Prices one request through the same form rules as the wizard, so the
/// employee count is clamped and the fiscal address forces its state.
pub fn quote_for(
    store: &FormStore,
    engine: &QuoteEngine,
    request: &QuoteRequest,
) -> Option<Quote> {
    let state = store.update_all(
        &WizardState::default(),
        [
            FieldUpdate::Revenue(request.revenue),
            FieldUpdate::HasEmployees(request.employee_count > 0),
            FieldUpdate::EmployeeCount(request.employee_count),
            FieldUpdate::State(request.state.clone()),
            FieldUpdate::UseFiscalAddress(request.use_fiscal_address),
        ],
    );
    engine.compute(&state.quote_input())
}

pub fn quote_batch(
    config: &WizardConfig,
    requests: &[QuoteRequest],
) -> Result<Vec<BatchLine>> {
    let store = FormStore::new(config.fiscal_address.clone());
    let engine = QuoteEngine::new(config.pricing.clone()).context("Invalid pricing table")?;

    Ok(requests
        .iter()
        .map(|r| BatchLine::from_quote(r.name.clone(), quote_for(&store, &engine, r).as_ref()))
        .collect())
}

/// Builds the wizard's collaborators from the configuration. Without
/// `session_db` the session lives in memory and is lost on exit.
pub async fn build_parts(
    config: WizardConfig,
    session_db: Option<&Path>,
) -> Result<WizardParts> {
    let repository = build_registry()
        .create(&config.backend)
        .await
        .with_context(|| format!("Failed to create '{}' backend", config.backend.backend))?;

    let sessions: Arc<dyn SessionStore> = match session_db {
        Some(path) => {
            let url = path.to_string_lossy();
            Arc::new(
                SqliteSessionStore::open(&url)
                    .await
                    .with_context(|| format!("Failed to open session database '{url}'"))?,
            )
        }
        None => Arc::new(InMemorySessionStore::new()),
    };

    let postal_codes = Arc::new(postal_code_client(&config)?);

    Ok(WizardParts {
        repository,
        postal_codes,
        sessions,
        config,
    })
}

/// How a non-interactive run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Blocked quote; the sales team was asked for a proposal.
    QuoteRequested,
    Paid(PaymentResult),
    /// Checkout reached but the answers carry no payment.
    AwaitingPayment,
}

impl RunOutcome {
    /// Whether the session is done and should not be resumed.
    fn is_final(&self) -> bool {
        match self {
            Self::QuoteRequested => true,
            Self::Paid(result) => result.status != PaymentStatus::Rejected,
            Self::AwaitingPayment => false,
        }
    }
}

/// Drives a wizard through every step from `answers`, then requests a
/// quote or pays. Progress is written to `out`.
///
/// A finished run clears the stored session; anything else keeps it so the
/// next run resumes where this one stopped.
pub async fn run_wizard(
    parts: WizardParts,
    answers: &Answers,
    out: &mut impl Write,
) -> Result<RunOutcome> {
    let mut wizard = Wizard::start(parts)
        .await
        .context("Failed to start the wizard")?;

    if let Some(token) = wizard.session().await {
        if token.origin == SessionOrigin::Resumed {
            writeln!(
                out,
                "Sessão retomada: lead {} na etapa {}",
                token.lead_id,
                wizard.step().label()
            )?;
        }
    }

    let result = drive(&mut wizard, answers, out).await;

    match &result {
        Ok(outcome) if outcome.is_final() => {
            wizard.complete().await.context("Failed to clear the session")?;
        }
        _ => {
            wizard
                .close(|state| debug!(trade_name = %state.trade_name, "wizard closed"))
                .await;
        }
    }

    result
}

async fn drive(
    wizard: &mut Wizard,
    answers: &Answers,
    out: &mut impl Write,
) -> Result<RunOutcome> {
    while wizard.step() != Step::Payment {
        let step = wizard.step();
        apply_step(wizard, answers, step, out).await?;

        match wizard.next().await {
            Ok(transition) => {
                writeln!(out, "[ok] {}", step.label())?;
                if let Some(notice) = transition.notice {
                    writeln!(out, "     {notice}")?;
                }
            }
            Err(WizardError::StepInvalid { step, issues }) => {
                let list = issues
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                bail!("step '{}' is incomplete: {}", step.label(), list);
            }
            Err(err) => return Err(err.into()),
        }
    }

    if let Some(quote) = &wizard.state().quote {
        report::write_quote(out, quote)?;
    }

    let Some(view) = wizard.payment_view() else {
        bail!("no quote available at the payment step");
    };
    report::write_payment_view(out, &view)?;

    match view {
        PaymentView::Blocked { .. } => {
            wizard
                .request_quote()
                .await
                .context("Failed to request a quote")?;
            writeln!(out, "Solicitação de proposta enviada.")?;
            Ok(RunOutcome::QuoteRequested)
        }
        PaymentView::Checkout {
            monthly, setup_fee, ..
        } => {
            let Some(payment) = &answers.payment else {
                writeln!(out, "Nenhum pagamento informado; sessão mantida.")?;
                return Ok(RunOutcome::AwaitingPayment);
            };

            let details = PaymentDetails {
                method: payment.method()?,
                payer_email: wizard.state().email.clone(),
                amount: monthly + setup_fee,
                installments: payment.installments,
                card_token: payment.card_token.clone(),
            };
            let result = wizard
                .submit_payment(&details)
                .await
                .context("Payment failed")?;
            report::write_payment_result(out, &result)?;
            info!(status = ?result.status, "run finished with payment");
            Ok(RunOutcome::Paid(result))
        }
    }
}

async fn apply_step(
    wizard: &mut Wizard,
    answers: &Answers,
    step: Step,
    out: &mut impl Write,
) -> Result<()> {
    match step {
        Step::Personal => wizard.update_all(answers.personal_updates()),
        Step::Company => wizard.update_all(answers.company_updates()?),
        Step::Address => {
            wizard.update(FieldUpdate::UseFiscalAddress(
                answers.address.use_fiscal_address,
            ));
            if let Some(code) = answers.postal_code_lookup() {
                if let Some(notice) = wizard.lookup_postal_code(code).await {
                    writeln!(out, "     {notice}")?;
                }
            }
            wizard.update_all(answers.address_updates());
        }
        Step::Activities => wizard.update_all(answers.activities_updates()),
        Step::Summary | Step::Payment => {}
    }
    Ok(())
}
