mod address;
mod lead;
mod operating_mode;
mod payment;
mod quote;
mod wizard_state;

pub use address::{Address, PostalAddress};
pub use lead::{Lead, LeadFields, LeadId, LeadResponse};
pub use operating_mode::OperatingMode;
pub use payment::{PaymentDetails, PaymentMethod, PaymentResult, PaymentStatus};
pub use quote::{Quote, QuoteBreakdown, QuoteSummary, ReviewReason, Tier};
pub use wizard_state::WizardState;
