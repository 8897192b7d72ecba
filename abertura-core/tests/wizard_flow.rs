//! End-to-end wizard runs against the in-memory backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use abertura_core::api::{
    InMemoryLeadRepository, InMemorySessionStore, Operation, StaticPostalCodeLookup,
};
use abertura_core::form::FieldUpdate;
use abertura_core::{
    ApiError, LeadFields, LeadId, Notice, OperatingMode, PaymentDetails, PaymentMethod,
    PaymentStatus, PaymentView, SaveStatus, SessionOrigin, SessionStore, SessionToken, Step, Tier,
    Transition, Wizard, WizardConfig, WizardError, WizardParts,
};
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

struct Setup {
    repo: Arc<InMemoryLeadRepository>,
    sessions: Arc<InMemorySessionStore>,
}

impl Setup {
    fn new() -> Self {
        Self {
            repo: Arc::new(InMemoryLeadRepository::new()),
            sessions: Arc::new(InMemorySessionStore::new()),
        }
    }

    async fn start(&self) -> Wizard {
        Wizard::start(WizardParts {
            repository: self.repo.clone(),
            postal_codes: Arc::new(StaticPostalCodeLookup::new()),
            sessions: self.sessions.clone(),
            config: WizardConfig::default(),
        })
        .await
        .expect("wizard should start")
    }
}

fn personal() -> Vec<FieldUpdate> {
    vec![
        FieldUpdate::Name("Maria Souza".to_string()),
        FieldUpdate::TaxId("123.456.789-01".to_string()),
        FieldUpdate::Email("maria@example.com".to_string()),
        FieldUpdate::Phone("(41) 99999-8888".to_string()),
        FieldUpdate::BirthDate("1990-04-12".to_string()),
    ]
}

fn company(revenue: Decimal, mode: OperatingMode) -> Vec<FieldUpdate> {
    vec![
        FieldUpdate::TradeName("Souza Consultoria".to_string()),
        FieldUpdate::Revenue(Some(revenue)),
        FieldUpdate::OperatingMode(Some(mode)),
        FieldUpdate::PartnerCount(1),
    ]
}

fn sao_paulo_address() -> Vec<FieldUpdate> {
    vec![
        FieldUpdate::PostalCode("01310-100".to_string()),
        FieldUpdate::Street("Avenida Paulista".to_string()),
        FieldUpdate::Number("1000".to_string()),
        FieldUpdate::District("Bela Vista".to_string()),
        FieldUpdate::City("São Paulo".to_string()),
        FieldUpdate::State("sp".to_string()),
    ]
}

fn activities(employees: i64) -> Vec<FieldUpdate> {
    vec![
        FieldUpdate::ActivityDescription("Consultoria em tecnologia".to_string()),
        FieldUpdate::HasEmployees(employees > 0),
        FieldUpdate::EmployeeCount(employees),
    ]
}

async fn advance(
    wizard: &mut Wizard,
    updates: Vec<FieldUpdate>,
) -> Transition {
    wizard.update_all(updates);
    wizard.next().await.expect("step should advance")
}

// =============================================================================
// Checkout flow
// =============================================================================

#[tokio::test(start_paused = true)]
async fn online_company_with_fiscal_address_pays_online() {
    let setup = Setup::new();
    let mut wizard = setup.start().await;

    let t = advance(&mut wizard, personal()).await;
    assert_eq!((t.from, t.to, t.notice), (Step::Personal, Step::Company, None));
    assert_eq!(setup.repo.lead_count(), 1);
    assert_eq!(
        setup.sessions.current().map(|s| s.origin),
        Some(SessionOrigin::New)
    );

    advance(&mut wizard, company(dec!(100000), OperatingMode::Online)).await;
    advance(&mut wizard, vec![FieldUpdate::UseFiscalAddress(true)]).await;
    let t = advance(&mut wizard, activities(2)).await;
    assert_eq!(t.to, Step::Summary);

    let quote = wizard.state().quote.clone().expect("quote on summary");
    assert_eq!(quote.tier, Tier::Pleno);
    assert_eq!(quote.monthly_value, Some(dec!(499)));
    assert_eq!(quote.one_time_setup_fee, dec!(0));
    assert_eq!(wizard.state().selected_plan.as_deref(), Some("PLENO"));

    let t = wizard.next().await.unwrap();
    assert_eq!(
        t.payment,
        Some(PaymentView::Checkout {
            quote: quote.clone(),
            monthly: dec!(499),
            setup_fee: dec!(0),
        })
    );

    let result = wizard
        .submit_payment(&PaymentDetails {
            method: PaymentMethod::Pix,
            payer_email: "maria@example.com".to_string(),
            amount: dec!(499),
            installments: None,
            card_token: None,
        })
        .await
        .unwrap();
    assert_eq!(result.status, PaymentStatus::Approved);

    let id = LeadId::new("mem-lead-1");
    let stored = setup.repo.lead(&id).unwrap();
    assert_eq!(stored.tier, Some(Tier::Pleno));
    assert_eq!(stored.address.map(|a| a.city), Some("Curitiba".to_string()));
    assert_eq!(stored.employee_count, Some(2));

    let state = wizard.complete().await.unwrap();
    assert_eq!(state.trade_name, "Souza Consultoria");
    assert_eq!(setup.sessions.current(), None);
}

#[tokio::test(start_paused = true)]
async fn each_forward_step_sends_its_step_name() {
    let setup = Setup::new();
    let mut wizard = setup.start().await;

    advance(&mut wizard, personal()).await;
    advance(&mut wizard, company(dec!(20000), OperatingMode::Presencial)).await;
    advance(&mut wizard, sao_paulo_address()).await;
    advance(&mut wizard, activities(0)).await;

    let steps: Vec<String> = setup
        .repo
        .calls()
        .into_iter()
        .filter(|c| c.operation == Operation::UpdateProgress)
        .filter_map(|c| c.step_name)
        .collect();
    for expected in ["dados_pessoais", "dados_empresa", "endereco", "atividades"] {
        assert!(steps.iter().any(|s| s == expected), "missing {expected} in {steps:?}");
    }
    assert_eq!(setup.repo.call_count(Operation::CreateLead), 1);
}

// =============================================================================
// Manual review flow
// =============================================================================

#[tokio::test(start_paused = true)]
async fn high_revenue_blocks_checkout_and_requests_a_quote() {
    let setup = Setup::new();
    let mut wizard = setup.start().await;

    advance(&mut wizard, personal()).await;
    advance(&mut wizard, company(dec!(450000), OperatingMode::Ambos)).await;
    advance(&mut wizard, sao_paulo_address()).await;
    advance(&mut wizard, activities(10)).await;
    let t = wizard.next().await.unwrap();

    let Some(PaymentView::Blocked { quote }) = t.payment.clone() else {
        panic!("expected a blocked payment view, got {t:?}");
    };
    assert_eq!(quote.tier, Tier::AnaliseComercial);
    assert_eq!(quote.monthly_value, None);
    assert_eq!(wizard.state().selected_plan, None);

    let payment = wizard
        .submit_payment(&PaymentDetails {
            method: PaymentMethod::Pix,
            payer_email: "maria@example.com".to_string(),
            amount: dec!(1),
            installments: None,
            card_token: None,
        })
        .await;
    assert!(matches!(payment, Err(WizardError::Unavailable(_))));

    wizard.request_quote().await.unwrap();

    let requests = setup.repo.quote_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1.revenue, Some(dec!(450000)));
    assert_eq!(requests[0].1.state, "SP");
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test(start_paused = true)]
async fn failed_lead_creation_still_advances_with_a_notice() {
    let setup = Setup::new();
    setup
        .repo
        .fail(Operation::CreateLead, ApiError::Network("connection refused".to_string()));
    let mut wizard = setup.start().await;

    let t = advance(&mut wizard, personal()).await;

    assert_eq!(t.to, Step::Company);
    assert!(matches!(t.notice, Some(Notice::LeadNotCreated { .. })));
    assert!(matches!(wizard.save_status(), SaveStatus::Failed { .. }));
    assert_eq!(wizard.session().await, None);

    setup.repo.recover(Operation::CreateLead);
    let t = advance(&mut wizard, company(dec!(15000), OperatingMode::Online)).await;

    assert_eq!(t.notice, None);
    assert_eq!(setup.repo.lead_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_progress_update_is_not_a_notice() {
    let setup = Setup::new();
    let mut wizard = setup.start().await;
    advance(&mut wizard, personal()).await;

    setup.repo.fail(Operation::UpdateProgress, ApiError::Timeout);
    let t = advance(&mut wizard, company(dec!(15000), OperatingMode::Online)).await;

    assert_eq!(t.to, Step::Address);
    assert_eq!(t.notice, None);
    assert!(matches!(wizard.save_status(), SaveStatus::Failed { .. }));
}

#[tokio::test(start_paused = true)]
async fn payment_gateway_failure_is_returned() {
    let setup = Setup::new();
    let mut wizard = setup.start().await;
    advance(&mut wizard, personal()).await;
    advance(&mut wizard, company(dec!(15000), OperatingMode::Online)).await;
    advance(&mut wizard, vec![FieldUpdate::UseFiscalAddress(true)]).await;
    advance(&mut wizard, activities(0)).await;
    wizard.next().await.unwrap();

    setup.repo.fail(Operation::Payment, ApiError::Status {
        status: 502,
        message: "bad gateway".to_string(),
    });
    let err = wizard
        .submit_payment(&PaymentDetails {
            method: PaymentMethod::Pix,
            payer_email: "maria@example.com".to_string(),
            amount: dec!(249),
            installments: None,
            card_token: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, WizardError::Submit(ApiError::Status { status: 502, .. })));
    assert_eq!(setup.repo.call_count(Operation::Payment), 1);
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test(start_paused = true)]
async fn stored_session_is_resumed_on_first_incomplete_step() {
    let setup = Setup::new();
    let id = LeadId::new("lead-77");
    setup.repo.insert(
        id.clone(),
        LeadFields {
            name: Some("Maria Souza".to_string()),
            tax_id: Some("12345678901".to_string()),
            email: Some("maria@example.com".to_string()),
            phone: Some("41999998888".to_string()),
            birth_date: Some("1990-04-12".to_string()),
            trade_name: Some("Souza Consultoria".to_string()),
            ..Default::default()
        },
    );
    setup
        .sessions
        .save(&SessionToken::new(id.clone(), Utc::now() - Duration::days(2)))
        .await
        .unwrap();

    let wizard = setup.start().await;

    assert_eq!(wizard.step(), Step::Company);
    assert_eq!(wizard.state().name, "Maria Souza");
    let session = wizard.session().await.unwrap();
    assert_eq!(session.lead_id, id);
    assert_eq!(session.origin, SessionOrigin::Resumed);
}

#[tokio::test(start_paused = true)]
async fn expired_session_is_cleared() {
    let setup = Setup::new();
    let id = LeadId::new("lead-old");
    setup.repo.insert(id.clone(), LeadFields::default());
    setup
        .sessions
        .save(&SessionToken::new(id, Utc::now() - Duration::days(30)))
        .await
        .unwrap();

    let wizard = setup.start().await;

    assert_eq!(wizard.step(), Step::Personal);
    assert_eq!(wizard.session().await, None);
    assert_eq!(setup.sessions.current(), None);
    assert_eq!(setup.repo.call_count(Operation::GetLead), 0);
}

#[tokio::test(start_paused = true)]
async fn close_flushes_pending_edits_and_calls_back() {
    let setup = Setup::new();
    let mut wizard = setup.start().await;
    wizard.update_all(personal());
    assert_eq!(wizard.save_status(), SaveStatus::Pending);

    let closed = Arc::new(AtomicBool::new(false));
    let flag = closed.clone();
    wizard
        .close(move |state| {
            assert_eq!(state.name, "Maria Souza");
            flag.store(true, Ordering::SeqCst);
        })
        .await;

    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(setup.repo.lead_count(), 1);
    assert!(setup.sessions.current().is_some());
}

#[tokio::test]
async fn out_of_range_autosave_delay_refuses_to_start() {
    let setup = Setup::new();
    let mut config = WizardConfig::default();
    config.autosave.debounce_ms = u64::MAX;

    let result = Wizard::start(WizardParts {
        repository: setup.repo.clone(),
        postal_codes: Arc::new(StaticPostalCodeLookup::new()),
        sessions: setup.sessions.clone(),
        config,
    })
    .await;

    assert!(matches!(result, Err(WizardError::Config(_))));
}
