//! Form-state store for the wizard.

pub mod fields;
pub mod store;

pub use fields::{DERIVED_INPUTS, DerivedField, Field, FieldUpdate, QUOTE_INPUTS, dependents_of};
pub use store::FormStore;
