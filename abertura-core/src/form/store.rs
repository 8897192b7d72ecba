use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::form::fields::{DerivedField, Field, FieldUpdate, dependents_of};
use crate::models::{Address, LeadFields, WizardState};

static NON_DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\D").expect("valid regex"));

fn digits_only(s: &str) -> String {
    NON_DIGIT.replace_all(s, "").into_owned()
}

fn clamp_count(n: i64) -> u32 {
    u32::try_from(n.max(0)).unwrap_or(u32::MAX)
}

/// Applies user edits to a [`WizardState`] and keeps its cross-field rules:
///
/// - `employee_count` is never negative and is 0 without employees;
/// - in-person operation (`presencial`, `ambos`) turns the fiscal address off;
/// - with the fiscal address on, the address is the provider's and cannot be edited;
/// - turning the fiscal address off clears the address;
/// - any change to an input of a derived field clears that field.
///
/// The store is pure: it never mutates its input and performs no I/O.
#[derive(Debug, Clone)]
pub struct FormStore {
    fiscal_address: Address,
}

impl Default for FormStore {
    fn default() -> Self {
        Self::new(Address::provider_fiscal_address())
    }
}

impl FormStore {
    pub fn new(fiscal_address: Address) -> Self {
        Self { fiscal_address }
    }

    pub fn fiscal_address(&self) -> &Address {
        &self.fiscal_address
    }

    /// Returns the state that results from applying `update` to `state`.
    pub fn update(
        &self,
        state: &WizardState,
        update: FieldUpdate,
    ) -> WizardState {
        let mut next = state.clone();
        self.write(&mut next, update);
        self.enforce_rules(state, &mut next);

        let changed = changed_fields(state, &next);
        for derived in dependents_of(&changed) {
            match derived {
                DerivedField::Quote => next.quote = None,
                DerivedField::SelectedPlan => next.selected_plan = None,
            }
        }

        next
    }

    /// Applies several edits in order.
    pub fn update_all(
        &self,
        state: &WizardState,
        updates: impl IntoIterator<Item = FieldUpdate>,
    ) -> WizardState {
        updates
            .into_iter()
            .fold(state.clone(), |acc, u| self.update(&acc, u))
    }

    /// Rebuilds a state from a stored lead. Derived fields are not restored.
    pub fn hydrate(
        &self,
        lead: &LeadFields,
    ) -> WizardState {
        let mut updates = Vec::new();

        let texts = [
            (&lead.name, FieldUpdate::Name as fn(String) -> FieldUpdate),
            (&lead.tax_id, FieldUpdate::TaxId),
            (&lead.email, FieldUpdate::Email),
            (&lead.phone, FieldUpdate::Phone),
            (&lead.birth_date, FieldUpdate::BirthDate),
            (&lead.trade_name, FieldUpdate::TradeName),
            (&lead.activity_description, FieldUpdate::ActivityDescription),
        ];
        for (value, make) in texts {
            if let Some(v) = value {
                updates.push(make(v.clone()));
            }
        }

        if lead.revenue.is_some() {
            updates.push(FieldUpdate::Revenue(lead.revenue));
        }
        if let Some(n) = lead.partner_count {
            updates.push(FieldUpdate::PartnerCount(n));
        }
        if lead.operating_mode.is_some() {
            updates.push(FieldUpdate::OperatingMode(lead.operating_mode));
        }
        if let Some(address) = &lead.address {
            updates.extend([
                FieldUpdate::PostalCode(address.postal_code.clone()),
                FieldUpdate::Street(address.street.clone()),
                FieldUpdate::Number(address.number.clone()),
                FieldUpdate::Complement(address.complement.clone()),
                FieldUpdate::District(address.district.clone()),
                FieldUpdate::City(address.city.clone()),
                FieldUpdate::State(address.state.clone()),
            ]);
        }
        if let Some(fiscal) = lead.use_fiscal_address {
            updates.push(FieldUpdate::UseFiscalAddress(fiscal));
        }
        if let Some(has) = lead.has_employees {
            updates.push(FieldUpdate::HasEmployees(has));
        }
        if let Some(n) = lead.employee_count {
            updates.push(FieldUpdate::EmployeeCount(i64::from(n)));
        }

        self.update_all(&WizardState::default(), updates)
    }

    fn write(
        &self,
        state: &mut WizardState,
        update: FieldUpdate,
    ) {
        let field = update.field();
        if state.use_fiscal_address && is_address_field(field) {
            debug!(?field, "address is fixed while the fiscal address is in use");
            return;
        }

        match update {
            FieldUpdate::Name(v) => state.name = v,
            FieldUpdate::TaxId(v) => state.tax_id = v,
            FieldUpdate::Email(v) => state.email = v,
            FieldUpdate::Phone(v) => state.phone = v,
            FieldUpdate::BirthDate(v) => state.birth_date = v,
            FieldUpdate::TradeName(v) => state.trade_name = v,
            FieldUpdate::Revenue(v) => state.revenue = v,
            FieldUpdate::PartnerCount(v) => state.partner_count = v,
            FieldUpdate::OperatingMode(v) => state.operating_mode = v,
            FieldUpdate::PostalCode(v) => state.address.postal_code = digits_only(&v),
            FieldUpdate::Street(v) => state.address.street = v,
            FieldUpdate::Number(v) => state.address.number = v,
            FieldUpdate::Complement(v) => state.address.complement = v,
            FieldUpdate::District(v) => state.address.district = v,
            FieldUpdate::City(v) => state.address.city = v,
            FieldUpdate::State(v) => state.address.state = v.trim().to_ascii_uppercase(),
            FieldUpdate::UseFiscalAddress(v) => state.use_fiscal_address = v,
            FieldUpdate::ActivityDescription(v) => state.activity_description = v,
            FieldUpdate::HasEmployees(v) => state.has_employees = v,
            FieldUpdate::EmployeeCount(v) => state.employee_count = clamp_count(v),
        }
    }

    fn enforce_rules(
        &self,
        before: &WizardState,
        next: &mut WizardState,
    ) {
        if next.use_fiscal_address
            && next
                .operating_mode
                .is_some_and(|mode| !mode.allows_fiscal_address())
        {
            debug!(mode = ?next.operating_mode, "fiscal address requires online operation");
            next.use_fiscal_address = false;
        }

        if next.use_fiscal_address {
            next.address = self.fiscal_address.clone();
        } else if before.use_fiscal_address {
            next.address = Address::default();
        }

        if !next.has_employees {
            next.employee_count = 0;
        }
    }
}

fn is_address_field(field: Field) -> bool {
    matches!(
        field,
        Field::PostalCode
            | Field::Street
            | Field::Number
            | Field::Complement
            | Field::District
            | Field::City
            | Field::State
    )
}

/// Inputs whose value differs between two states.
fn changed_fields(
    before: &WizardState,
    after: &WizardState,
) -> Vec<Field> {
    let (a, b) = (&before.address, &after.address);
    [
        (Field::Name, before.name != after.name),
        (Field::TaxId, before.tax_id != after.tax_id),
        (Field::Email, before.email != after.email),
        (Field::Phone, before.phone != after.phone),
        (Field::BirthDate, before.birth_date != after.birth_date),
        (Field::TradeName, before.trade_name != after.trade_name),
        (Field::Revenue, before.revenue != after.revenue),
        (Field::PartnerCount, before.partner_count != after.partner_count),
        (Field::OperatingMode, before.operating_mode != after.operating_mode),
        (Field::PostalCode, a.postal_code != b.postal_code),
        (Field::Street, a.street != b.street),
        (Field::Number, a.number != b.number),
        (Field::Complement, a.complement != b.complement),
        (Field::District, a.district != b.district),
        (Field::City, a.city != b.city),
        (Field::State, a.state != b.state),
        (Field::UseFiscalAddress, before.use_fiscal_address != after.use_fiscal_address),
        (Field::ActivityDescription, before.activity_description != after.activity_description),
        (Field::HasEmployees, before.has_employees != after.has_employees),
        (Field::EmployeeCount, before.employee_count != after.employee_count),
    ]
    .into_iter()
    .filter_map(|(field, differs)| differs.then_some(field))
    .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::calculations::compute_quote;
    use crate::form::fields::QUOTE_INPUTS;
    use crate::models::OperatingMode;

    fn quoted_state() -> WizardState {
        let store = FormStore::default();
        let mut state = store.update_all(
            &WizardState::default(),
            [
                FieldUpdate::Revenue(Some(dec!(50000))),
                FieldUpdate::OperatingMode(Some(OperatingMode::Online)),
                FieldUpdate::State("SP".to_string()),
                FieldUpdate::HasEmployees(true),
                FieldUpdate::EmployeeCount(2),
            ],
        );
        state.quote = compute_quote(state.revenue, state.employee_count, false, "SP");
        state.selected_plan = Some("PLENO".to_string());
        state
    }

    // =========================================================================
    // idempotence
    // =========================================================================

    #[test]
    fn same_value_twice_yields_identical_state() {
        let store = FormStore::default();
        let state = quoted_state();

        let once = store.update(&state, FieldUpdate::Revenue(Some(dec!(50000))));
        let twice = store.update(&once, FieldUpdate::Revenue(Some(dec!(50000))));

        assert_eq!(once, state);
        assert_eq!(twice, once);
    }

    #[test]
    fn update_does_not_mutate_input() {
        let store = FormStore::default();
        let state = quoted_state();
        let snapshot = state.clone();

        let _ = store.update(&state, FieldUpdate::Revenue(Some(dec!(1))));

        assert_eq!(state, snapshot);
    }

    // =========================================================================
    // employee count
    // =========================================================================

    #[test]
    fn negative_employee_count_is_clamped() {
        let store = FormStore::default();
        let state = store.update(&quoted_state(), FieldUpdate::EmployeeCount(-4));

        assert_eq!(state.employee_count, 0);
    }

    #[test]
    fn employee_count_is_zero_without_employees() {
        let store = FormStore::default();
        let state = store.update(&WizardState::default(), FieldUpdate::EmployeeCount(7));

        assert_eq!(state.employee_count, 0);
    }

    #[test]
    fn clearing_has_employees_resets_count() {
        let store = FormStore::default();
        let state = store.update(&quoted_state(), FieldUpdate::HasEmployees(false));

        assert_eq!(state.employee_count, 0);
        assert_eq!(state.quote, None);
    }

    // =========================================================================
    // fiscal address
    // =========================================================================

    #[test]
    fn fiscal_address_fixes_address() {
        let store = FormStore::default();
        let state = store.update_all(
            &WizardState::default(),
            [
                FieldUpdate::OperatingMode(Some(OperatingMode::Online)),
                FieldUpdate::UseFiscalAddress(true),
            ],
        );

        assert!(state.use_fiscal_address);
        assert_eq!(state.address, Address::provider_fiscal_address());
        assert_eq!(state.address.city, "Curitiba");
        assert_eq!(state.address.state, "PR");
    }

    #[test]
    fn address_edits_are_ignored_with_fiscal_address() {
        let store = FormStore::default();
        let state = store.update_all(
            &WizardState::default(),
            [
                FieldUpdate::UseFiscalAddress(true),
                FieldUpdate::City("Londrina".to_string()),
                FieldUpdate::State("SP".to_string()),
            ],
        );

        assert_eq!(state.address, Address::provider_fiscal_address());
    }

    #[test]
    fn turning_fiscal_address_off_clears_address() {
        let store = FormStore::default();
        let state = store.update_all(
            &WizardState::default(),
            [
                FieldUpdate::UseFiscalAddress(true),
                FieldUpdate::UseFiscalAddress(false),
            ],
        );

        assert_eq!(state.address, Address::default());
    }

    #[test]
    fn in_person_modes_force_fiscal_address_off() {
        let store = FormStore::default();
        for mode in [OperatingMode::Presencial, OperatingMode::Ambos] {
            let online = store.update_all(
                &WizardState::default(),
                [
                    FieldUpdate::OperatingMode(Some(OperatingMode::Online)),
                    FieldUpdate::UseFiscalAddress(true),
                ],
            );

            let state = store.update(&online, FieldUpdate::OperatingMode(Some(mode)));

            assert!(!state.use_fiscal_address);
            assert_eq!(state.address, Address::default());
        }
    }

    #[test]
    fn fiscal_address_cannot_be_enabled_for_in_person_operation() {
        let store = FormStore::default();
        let state = store.update_all(
            &WizardState::default(),
            [
                FieldUpdate::OperatingMode(Some(OperatingMode::Ambos)),
                FieldUpdate::UseFiscalAddress(true),
            ],
        );

        assert!(!state.use_fiscal_address);
    }

    #[test]
    fn custom_fiscal_address_is_used() {
        let custom = Address {
            city: "Maringá".to_string(),
            state: "PR".to_string(),
            ..Address::provider_fiscal_address()
        };
        let store = FormStore::new(custom.clone());

        let state = store.update(&WizardState::default(), FieldUpdate::UseFiscalAddress(true));

        assert_eq!(state.address, custom);
    }

    // =========================================================================
    // quote invalidation
    // =========================================================================

    #[test]
    fn quote_inputs_invalidate_quote() {
        let store = FormStore::default();
        let updates = [
            FieldUpdate::Revenue(Some(dec!(60000))),
            FieldUpdate::EmployeeCount(3),
            FieldUpdate::State("RJ".to_string()),
            FieldUpdate::UseFiscalAddress(true),
            FieldUpdate::OperatingMode(Some(OperatingMode::Presencial)),
        ];

        for update in updates {
            let state = store.update(&quoted_state(), update.clone());
            assert_eq!(state.quote, None, "{update:?} should invalidate the quote");
            assert_eq!(state.selected_plan, None);
        }
    }

    #[test]
    fn other_fields_keep_quote() {
        let store = FormStore::default();
        let updates = [
            FieldUpdate::Name("Ana".to_string()),
            FieldUpdate::TradeName("Ana ME".to_string()),
            FieldUpdate::Street("Rua A".to_string()),
            FieldUpdate::PartnerCount(2),
            FieldUpdate::ActivityDescription("Design".to_string()),
        ];

        for update in updates {
            let state = store.update(&quoted_state(), update.clone());
            assert!(state.quote.is_some(), "{update:?} should keep the quote");
        }
    }

    #[test]
    fn state_normalisation_does_not_count_as_change() {
        let store = FormStore::default();
        let state = store.update(&quoted_state(), FieldUpdate::State(" sp ".to_string()));

        assert!(state.quote.is_some());
    }

    #[test]
    fn every_field_feeding_the_engine_is_a_declared_input() {
        let store = FormStore::default();
        let base = quoted_state();
        let probes = [
            FieldUpdate::Name("x".to_string()),
            FieldUpdate::TaxId("1".to_string()),
            FieldUpdate::Email("x@y".to_string()),
            FieldUpdate::Phone("1".to_string()),
            FieldUpdate::BirthDate("2000-01-01".to_string()),
            FieldUpdate::TradeName("x".to_string()),
            FieldUpdate::Revenue(Some(dec!(1))),
            FieldUpdate::PartnerCount(9),
            FieldUpdate::PostalCode("1".to_string()),
            FieldUpdate::Street("x".to_string()),
            FieldUpdate::Number("1".to_string()),
            FieldUpdate::Complement("x".to_string()),
            FieldUpdate::District("x".to_string()),
            FieldUpdate::City("x".to_string()),
            FieldUpdate::State("RS".to_string()),
            FieldUpdate::UseFiscalAddress(true),
            FieldUpdate::ActivityDescription("x".to_string()),
            FieldUpdate::EmployeeCount(9),
        ];

        for probe in probes {
            let field = probe.field();
            let next = store.update(&base, probe);
            if next.quote_input() != base.quote_input() {
                assert!(
                    QUOTE_INPUTS.contains(&field),
                    "{field:?} changes the quote input but is not declared"
                );
            }
        }
    }

    // =========================================================================
    // normalisation
    // =========================================================================

    #[test]
    fn postal_code_keeps_digits_only() {
        let store = FormStore::default();
        let state = store.update(&WizardState::default(), FieldUpdate::PostalCode("80.020-310".to_string()));

        assert_eq!(state.address.postal_code, "80020310");
    }

    #[test]
    fn state_is_upper_cased() {
        let store = FormStore::default();
        let state = store.update(&WizardState::default(), FieldUpdate::State(" sc".to_string()));

        assert_eq!(state.address.state, "SC");
    }

    // =========================================================================
    // hydrate
    // =========================================================================

    #[test]
    fn hydrate_restores_lead_fields() {
        let store = FormStore::default();
        let lead = LeadFields {
            name: Some("Ana".to_string()),
            email: Some("ana@example.com".to_string()),
            revenue: Some(dec!(12000)),
            operating_mode: Some(OperatingMode::Online),
            use_fiscal_address: Some(true),
            has_employees: Some(true),
            employee_count: Some(2),
            ..Default::default()
        };

        let state = store.hydrate(&lead);

        assert_eq!(state.name, "Ana");
        assert_eq!(state.revenue, Some(dec!(12000)));
        assert!(state.use_fiscal_address);
        assert_eq!(state.address, Address::provider_fiscal_address());
        assert_eq!(state.employee_count, 2);
        assert_eq!(state.quote, None);
    }

    #[test]
    fn hydrate_of_empty_lead_is_default_state() {
        assert_eq!(FormStore::default().hydrate(&LeadFields::default()), WizardState::default());
    }
}
