//! Pricing calculations for the CNPJ-opening wizard.
//!
//! The quote engine maps the declared revenue, staff size, fiscal-address
//! choice and state to a service tier and its price.

pub mod common;
pub mod quote_engine;

pub use quote_engine::{
    PriceBracket, PricingTable, PricingTableError, QuoteEngine, QuoteInput, compute_quote,
};
