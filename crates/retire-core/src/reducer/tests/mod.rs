use pretty_assertions::assert_eq;

pub(super) use super::reduce;
pub(super) use super::AppEffect;
pub(super) use crate::actions::AppAction;
pub(super) use crate::actions::CalculationOrigin;
pub(super) use crate::actions::ChatPurpose;
pub(super) use crate::actions::RuntimeAction;
pub(super) use crate::actions::UserAction;
pub(super) use crate::chat::ChatFailure;
pub(super) use crate::currency::CurrencyCode;
pub(super) use crate::plan::fixtures::sample_plan;
pub(super) use crate::plan::CalculationRequest;
pub(super) use crate::plan::CanonicalPlan;
pub(super) use crate::questions::QuestionId;
pub(super) use crate::state::AppState;
pub(super) use crate::state::ChatRole;
pub(super) use crate::state::DashboardOverlay;
pub(super) use crate::state::DashboardStatus;
pub(super) use crate::state::EditorTarget;
pub(super) use crate::state::OnboardingPhase;
pub(super) use crate::state::PayoutField;
pub(super) use crate::state::Screen;
pub(super) use crate::state::SubmissionStatus;
pub(super) use crate::state::SummaryPanel;
pub(super) use crate::state::QUESTION_TRANSITION_MS;
pub(super) use crate::submission::CalculationFailure;

mod currency_refresh;

const SCENARIO: [&str; 7] = ["5000", "65", "4", "35", "100000", "7", "1500"];

fn state() -> AppState {
    AppState::new()
}

fn user(state: &mut AppState, action: UserAction) -> Vec<AppEffect> {
    reduce(state, AppAction::User(action))
}

fn runtime(state: &mut AppState, action: RuntimeAction) -> Vec<AppEffect> {
    reduce(state, AppAction::Runtime(action))
}

fn type_text(state: &mut AppState, text: &str) {
    for ch in text.chars() {
        user(state, UserAction::InputChar(ch));
    }
}

fn finish_transition(state: &mut AppState) -> Vec<AppEffect> {
    let now_ms = state.clock_ms + QUESTION_TRANSITION_MS;
    runtime(state, RuntimeAction::Tick { now_ms })
}

fn onboarding_state() -> AppState {
    let mut state = state();
    runtime(&mut state, RuntimeAction::Tick { now_ms: 1_000 });
    let effects = user(&mut state, UserAction::StartOnboarding);
    assert!(matches!(effects.as_slice(), [AppEffect::RequestFrame]));
    assert_eq!(state.screen, Screen::Onboarding);
    state
}

/// Answers one numeric question and lets the exit transition finish.
fn answer(state: &mut AppState, text: &str) {
    type_text(state, text);
    user(state, UserAction::NextQuestion);
    finish_transition(state);
}

/// Walks the whole questionnaire and returns the submitted request.
fn submit_scenario(state: &mut AppState) -> CalculationRequest {
    for value in SCENARIO {
        answer(state, value);
    }
    assert_eq!(state.onboarding.current_index, 7);
    user(state, UserAction::NextQuestion);
    let effects = finish_transition(state);
    match effects.as_slice() {
        [AppEffect::SubmitCalculation {
            origin: CalculationOrigin::Onboarding,
            request,
        }, AppEffect::RequestFrame] => request.clone(),
        other => panic!("expected a calculation request, got {other:?}"),
    }
}

fn dashboard_state() -> AppState {
    let mut state = state();
    runtime(&mut state, RuntimeAction::PlanRestored(sample_plan()));
    assert_eq!(state.screen, Screen::Dashboard);
    state
}

fn display_plan(state: &AppState) -> &CanonicalPlan {
    state.dashboard.display.as_ref().expect("display plan")
}
