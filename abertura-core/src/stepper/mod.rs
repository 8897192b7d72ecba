//! Wizard steps and the transition table between them.

mod wizard;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use wizard::{Notice, PaymentView, Transition, Wizard, WizardError, WizardParts};

/// The six ordered steps of the CNPJ-opening wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Personal,
    Company,
    Address,
    Activities,
    Summary,
    Payment,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::Personal,
        Step::Company,
        Step::Address,
        Step::Activities,
        Step::Summary,
        Step::Payment,
    ];

    /// Zero-based position in the wizard.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Step name sent with progress updates.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Personal => "dados_pessoais",
            Self::Company => "dados_empresa",
            Self::Address => "endereco",
            Self::Activities => "atividades",
            Self::Summary => "resumo",
            Self::Payment => "pagamento",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Personal => "Dados pessoais",
            Self::Company => "Dados da empresa",
            Self::Address => "Endereço",
            Self::Activities => "Atividades",
            Self::Summary => "Resumo",
            Self::Payment => "Pagamento",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Navigation requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepEvent {
    Next,
    Back,
}

/// Every allowed `(from, event) -> to` move. Anything absent is rejected.
pub const TRANSITIONS: &[(Step, StepEvent, Step)] = &[
    (Step::Personal, StepEvent::Next, Step::Company),
    (Step::Company, StepEvent::Next, Step::Address),
    (Step::Address, StepEvent::Next, Step::Activities),
    (Step::Activities, StepEvent::Next, Step::Summary),
    (Step::Summary, StepEvent::Next, Step::Payment),
    (Step::Company, StepEvent::Back, Step::Personal),
    (Step::Address, StepEvent::Back, Step::Company),
    (Step::Activities, StepEvent::Back, Step::Address),
    (Step::Summary, StepEvent::Back, Step::Activities),
    (Step::Payment, StepEvent::Back, Step::Summary),
];

/// Looks up the destination of `event` from `from`.
pub fn transition(
    from: Step,
    event: StepEvent,
) -> Option<Step> {
    TRANSITIONS
        .iter()
        .find(|(f, e, _)| *f == from && *e == event)
        .map(|(_, _, to)| *to)
}
