use super::*;
use crate::currency::CurrencyState;
use pretty_assertions::assert_eq;

fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-6
}

#[test]
fn selecting_a_currency_rescales_the_display_plan_once() {
    let mut state = dashboard_state();
    let revision = state.dashboard.display_revision;

    let effects = user(&mut state, UserAction::SelectCurrency(CurrencyCode::Usd));
    let [AppEffect::PersistCurrency(saved), AppEffect::RequestFrame] = effects.as_slice() else {
        panic!("expected currency persistence, got {effects:?}");
    };
    assert_eq!(saved.selected, CurrencyCode::Usd);
    assert_eq!(state.dashboard.display_revision, revision + 1);

    let display = display_plan(&state);
    assert!(close(display.gap, -74000.0));
    assert!(close(display.target_net_worth, 1_110_000.0));
    assert_eq!(display.years_until_retirement, 30);
    assert_eq!(display.gap_percentage, -6.67);
    assert_eq!(display.retirement_tax_rate, 0.22);

    // the canonical plan is never rewritten
    assert_eq!(state.dashboard.canonical, Some(sample_plan()));
    let view = state.dashboard.view.as_ref().expect("view");
    assert_eq!(view.currency, CurrencyCode::Usd);
}

#[test]
fn switching_back_to_base_restores_canonical_values() {
    let mut state = dashboard_state();
    user(&mut state, UserAction::SelectCurrency(CurrencyCode::Gbp));
    user(&mut state, UserAction::SelectCurrency(CurrencyCode::Cad));
    assert_eq!(display_plan(&state), &sample_plan());
}

#[test]
fn cycling_walks_every_currency() {
    let mut state = dashboard_state();
    let mut seen = Vec::new();
    for _ in 0..3 {
        user(&mut state, UserAction::CycleCurrency);
        seen.push(state.currency.selected);
    }
    seen.sort();
    assert_eq!(
        seen,
        vec![CurrencyCode::Cad, CurrencyCode::Usd, CurrencyCode::Gbp]
    );
}

#[test]
fn applied_rate_is_rounded_and_used_for_display() {
    let mut state = dashboard_state();
    user(&mut state, UserAction::SelectCurrency(CurrencyCode::Usd));
    user(&mut state, UserAction::OpenRateEditor);
    let DashboardOverlay::RateEditor(editor) = &state.dashboard.overlay else {
        panic!("rate editor should be open");
    };
    assert_eq!(editor.field.text(), "0.74");

    for _ in 0..4 {
        user(&mut state, UserAction::Backspace);
    }
    type_text(&mut state, "0.456");
    let effects = user(&mut state, UserAction::ApplyRate);
    assert!(matches!(
        effects.as_slice(),
        [AppEffect::PersistCurrency(_), AppEffect::RequestFrame]
    ));
    assert_eq!(state.dashboard.overlay, DashboardOverlay::None);
    assert_eq!(state.currency.rate(CurrencyCode::Usd), 0.46);
    assert!(close(display_plan(&state).gap, -46000.0));
}

#[test]
fn unusable_rate_keeps_the_previous_one() {
    let mut state = dashboard_state();
    user(&mut state, UserAction::SelectCurrency(CurrencyCode::Gbp));
    user(&mut state, UserAction::OpenRateEditor);
    for _ in 0..4 {
        user(&mut state, UserAction::Backspace);
    }
    type_text(&mut state, "0");
    user(&mut state, UserAction::ApplyRate);
    assert_eq!(state.currency.rate(CurrencyCode::Gbp), 0.58);
}

#[test]
fn loaded_preferences_refresh_the_dashboard() {
    let mut state = dashboard_state();
    let mut loaded = CurrencyState::default();
    loaded.selected = CurrencyCode::Usd;
    loaded.rates.insert(CurrencyCode::Usd, 0.5);

    runtime(&mut state, RuntimeAction::CurrencyLoaded(loaded));
    assert_eq!(state.currency.selected, CurrencyCode::Usd);
    assert!(close(display_plan(&state).gap, -50000.0));
}

#[test]
fn loaded_preferences_repair_a_missing_selected_rate() {
    let mut state = state();
    let mut loaded = CurrencyState::default();
    loaded.selected = CurrencyCode::Gbp;
    loaded.rates.remove(&CurrencyCode::Gbp);

    runtime(&mut state, RuntimeAction::CurrencyLoaded(loaded));
    assert_eq!(state.currency.rate(CurrencyCode::Gbp), 0.58);
    assert_eq!(state.dashboard.display, None);
}

#[test]
fn open_edit_form_is_repopulated_in_the_new_currency() {
    let mut state = dashboard_state();
    user(&mut state, UserAction::OpenEditForm);
    user(&mut state, UserAction::SelectCurrency(CurrencyCode::Usd));

    let DashboardOverlay::EditForm(form) = &state.dashboard.overlay else {
        panic!("edit form should stay open");
    };
    let savings = form
        .fields
        .iter()
        .find(|entry| entry.id == QuestionId::MonthlySavings)
        .expect("savings field");
    assert_eq!(savings.label, "Monthly Savings for Retirement (USD)");
    assert_eq!(savings.field.text(), "1,110");

    let age = form
        .fields
        .iter()
        .find(|entry| entry.id == QuestionId::CurrentAge)
        .expect("age field");
    assert_eq!(age.field.text(), "35");
}
