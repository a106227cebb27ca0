use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;

use super::actions::AppAction;
use super::actions::CalculationOrigin;
use super::actions::ChatPurpose;
use super::actions::RuntimeAction;
use super::actions::UserAction;
use super::answers::validate;
use super::chat::ChatFailure;
use super::chat::STATUS_FAILED;
use super::chat::STATUS_PLAN_UPDATED;
use super::chat::STATUS_THINKING;
use super::chat::SUMMARY_PROMPT;
use super::currency::format_rate;
use super::currency::CurrencyState;
use super::field::FieldFormat;
use super::field::TextField;
use super::plan::CalculationRequest;
use super::plan::CanonicalPlan;
use super::questions::question;
use super::questions::question_index;
use super::questions::QuestionId;
use super::questions::QuestionKind;
use super::state::edit_label;
use super::state::AppState;
use super::state::ChatRole;
use super::state::ChatState;
use super::state::DashboardOverlay;
use super::state::DashboardState;
use super::state::DashboardStatus;
use super::state::EditForm;
use super::state::EditorTarget;
use super::state::OnboardingState;
use super::state::PayoutField;
use super::state::QuestionTransition;
use super::state::RateEditor;
use super::state::Screen;
use super::state::SubmissionStatus;
use super::state::SummaryPanel;
use super::state::TransitionTarget;
use super::state::RECALCULATION_FAILED_ALERT;
use super::submission::build_request;
use super::submission::to_base_currency;
use super::submission::CalculationFailure;
use super::submission::PAYOUT_CONFLICT_MESSAGE;

#[derive(Debug, Clone, PartialEq)]
pub enum AppEffect {
    RequestFrame,
    SubmitCalculation {
        origin: CalculationOrigin,
        request: CalculationRequest,
    },
    SubmitChat {
        purpose: ChatPurpose,
        message: String,
        plan: CanonicalPlan,
    },
    PersistPlan(CanonicalPlan),
    ClearSession,
    PersistCurrency(CurrencyState),
    CopyToClipboard(String),
}

pub fn reduce(state: &mut AppState, action: AppAction) -> Vec<AppEffect> {
    match action {
        AppAction::User(user) => {
            debug!(action = user.label(), "user action");
            reduce_user(state, user)
        }
        AppAction::Runtime(runtime) => reduce_runtime(state, runtime),
    }
}

fn reduce_user(state: &mut AppState, action: UserAction) -> Vec<AppEffect> {
    match action {
        UserAction::StartOnboarding => {
            if state.screen != Screen::Welcome {
                return Vec::new();
            }
            state.onboarding = OnboardingState::default();
            state.screen = Screen::Onboarding;
            render_question(state, 0);
            vec![AppEffect::RequestFrame]
        }
        UserAction::InputChar(ch) => edit_focused(state, |field| {
            field.insert(ch);
        }),
        UserAction::InputPaste(text) => edit_focused(state, |field| field.insert_str(&text)),
        UserAction::Backspace => edit_focused(state, TextField::backspace),
        UserAction::Delete => edit_focused(state, TextField::delete),
        UserAction::CaretLeft => edit_focused(state, TextField::move_left),
        UserAction::CaretRight => edit_focused(state, TextField::move_right),
        UserAction::CaretHome => edit_focused(state, TextField::move_home),
        UserAction::CaretEnd => edit_focused(state, TextField::move_end),
        UserAction::NextQuestion => next_question(state),
        UserAction::PreviousQuestion => previous_question(state),
        UserAction::AddPayout => {
            if !on_payouts_question(state) {
                return Vec::new();
            }
            let onboarding = &mut state.onboarding;
            onboarding.answers.payouts_mut().push(Default::default());
            let row = onboarding.answers.payouts().len() - 1;
            onboarding.focus_editor(Some(EditorTarget::Payout {
                row,
                field: PayoutField::Amount,
            }));
            vec![AppEffect::RequestFrame]
        }
        UserAction::RemoveFocusedPayout => {
            if !on_payouts_question(state) {
                return Vec::new();
            }
            let onboarding = &mut state.onboarding;
            let Some(EditorTarget::Payout { row, .. }) = onboarding.focus else {
                return Vec::new();
            };
            let rows = onboarding.answers.payouts_mut();
            if row >= rows.len() {
                return Vec::new();
            }
            rows.remove(row);
            let remaining = rows.len();
            let next = if remaining == 0 {
                None
            } else {
                Some(EditorTarget::Payout {
                    row: row.min(remaining - 1),
                    field: PayoutField::Amount,
                })
            };
            onboarding.focus_editor(next);
            vec![AppEffect::RequestFrame]
        }
        UserAction::FocusNext => move_focus(state, true),
        UserAction::FocusPrev => move_focus(state, false),
        UserAction::RetrySubmission => {
            if state.screen != Screen::Onboarding
                || !matches!(state.onboarding.submission, SubmissionStatus::Failed { .. })
            {
                return Vec::new();
            }
            info!("retrying submission");
            start_submission(state)
        }
        UserAction::SelectCurrency(code) => {
            state.currency.set_selected(code);
            currency_changed(state)
        }
        UserAction::CycleCurrency => {
            state.currency.cycle();
            currency_changed(state)
        }
        UserAction::OpenRateEditor => {
            if state.screen != Screen::Dashboard
                || state.dashboard.overlay != DashboardOverlay::None
            {
                return Vec::new();
            }
            let code = state.currency.selected;
            let current = format_rate(state.currency.active_rate());
            state.dashboard.overlay = DashboardOverlay::RateEditor(RateEditor {
                code,
                field: TextField::with_value(FieldFormat::Numeric, &current),
            });
            vec![AppEffect::RequestFrame]
        }
        UserAction::ApplyRate => {
            let DashboardOverlay::RateEditor(editor) = &state.dashboard.overlay else {
                return Vec::new();
            };
            let (code, raw) = (editor.code, editor.field.value());
            state.dashboard.overlay = DashboardOverlay::None;
            let stored = state.currency.set_rate(code, &raw);
            info!(currency = code.label(), rate = stored, "exchange rate updated");
            currency_changed(state)
        }
        UserAction::OpenEditForm => {
            let dashboard = &mut state.dashboard;
            if state.screen != Screen::Dashboard
                || dashboard.status != DashboardStatus::Ready
                || dashboard.overlay != DashboardOverlay::None
            {
                return Vec::new();
            }
            let Some(display) = dashboard.display.as_ref() else {
                return Vec::new();
            };
            dashboard.overlay =
                DashboardOverlay::EditForm(EditForm::from_plan(display, state.currency.selected));
            vec![AppEffect::RequestFrame]
        }
        UserAction::SaveEdit => save_edit(state),
        UserAction::OpenChat => {
            if state.screen != Screen::Dashboard
                || state.dashboard.overlay != DashboardOverlay::None
            {
                return Vec::new();
            }
            state.dashboard.overlay = DashboardOverlay::Chat;
            vec![AppEffect::RequestFrame]
        }
        UserAction::SendChat => send_chat(state),
        UserAction::RequestSummary => {
            if state.screen != Screen::Dashboard
                || state.dashboard.summary == SummaryPanel::Loading
            {
                return Vec::new();
            }
            let Some(plan) = state.dashboard.display.clone() else {
                return Vec::new();
            };
            state.dashboard.summary = SummaryPanel::Loading;
            vec![
                AppEffect::SubmitChat {
                    purpose: ChatPurpose::Summary,
                    message: SUMMARY_PROMPT.to_string(),
                    plan,
                },
                AppEffect::RequestFrame,
            ]
        }
        UserAction::CopyLastReply => match state.chat.last_reply() {
            Some(reply) => vec![AppEffect::CopyToClipboard(reply.content.to_string())],
            None => Vec::new(),
        },
        UserAction::CloseOverlay => {
            if state.dashboard.overlay == DashboardOverlay::None {
                return Vec::new();
            }
            state.dashboard.overlay = DashboardOverlay::None;
            vec![AppEffect::RequestFrame]
        }
        UserAction::DismissAlert => {
            if state.dashboard.alert.take().is_none() {
                return Vec::new();
            }
            vec![AppEffect::RequestFrame]
        }
        UserAction::ScrollTable(delta) => {
            let rows = state
                .dashboard
                .view
                .as_ref()
                .map_or(0, |view| view.rows.len());
            let max = rows.saturating_sub(1) as i64;
            let next = (state.dashboard.table_scroll as i64 + i64::from(delta)).clamp(0, max);
            state.dashboard.table_scroll = next as usize;
            vec![AppEffect::RequestFrame]
        }
        UserAction::RequestRestart => {
            if state.screen != Screen::Dashboard
                || state.dashboard.overlay != DashboardOverlay::None
            {
                return Vec::new();
            }
            state.dashboard.overlay = DashboardOverlay::ConfirmRestart;
            vec![AppEffect::RequestFrame]
        }
        UserAction::Restart => {
            info!("restarting planner; clearing session");
            state.onboarding = OnboardingState::default();
            state.dashboard = DashboardState::default();
            state.chat = ChatState::default();
            state.screen = Screen::Welcome;
            vec![AppEffect::ClearSession, AppEffect::RequestFrame]
        }
    }
}

fn reduce_runtime(state: &mut AppState, action: RuntimeAction) -> Vec<AppEffect> {
    match action {
        RuntimeAction::Tick { now_ms } => {
            state.clock_ms = now_ms;
            let Some(transition) = state.onboarding.transition else {
                return Vec::new();
            };
            if now_ms < transition.deadline_ms() {
                return vec![AppEffect::RequestFrame];
            }
            state.onboarding.transition = None;
            match transition.target {
                TransitionTarget::Question(index) => {
                    state.onboarding.mounted = Some(index);
                    vec![AppEffect::RequestFrame]
                }
                TransitionTarget::Submit => start_submission(state),
            }
        }
        RuntimeAction::CurrencyLoaded(mut currency) => {
            let selected = currency.selected;
            currency.ensure_rate(selected);
            state.currency = currency;
            state.dashboard.refresh_display(&state.currency);
            vec![AppEffect::RequestFrame]
        }
        RuntimeAction::PlanRestored(plan) => {
            info!("restored plan from session");
            install_plan(state, plan);
            state.chat = ChatState::default();
            state.screen = Screen::Dashboard;
            vec![AppEffect::RequestFrame]
        }
        RuntimeAction::CalculationSucceeded { origin, plan } => match origin {
            CalculationOrigin::Onboarding => {
                if state.onboarding.submission != SubmissionStatus::InFlight {
                    warn!("ignoring calculation result with no submission in flight");
                    return Vec::new();
                }
                info!(gap = plan.gap, "plan calculated; opening dashboard");
                install_plan(state, plan.clone());
                state.chat = ChatState::default();
                state.onboarding = OnboardingState::default();
                state.screen = Screen::Dashboard;
                vec![AppEffect::PersistPlan(plan), AppEffect::RequestFrame]
            }
            CalculationOrigin::Recalculate => {
                if state.dashboard.status != DashboardStatus::Recalculating {
                    warn!("ignoring recalculation result with no request in flight");
                    return Vec::new();
                }
                info!(gap = plan.gap, "plan recalculated");
                install_plan(state, plan.clone());
                state.dashboard.status = DashboardStatus::Ready;
                state.chat.status = STATUS_PLAN_UPDATED.to_string();
                vec![AppEffect::PersistPlan(plan), AppEffect::RequestFrame]
            }
        },
        RuntimeAction::CalculationFailed { origin, failure } => match origin {
            CalculationOrigin::Onboarding => {
                if state.onboarding.submission != SubmissionStatus::InFlight {
                    return Vec::new();
                }
                warn!(error = failure.message(), "calculation failed");
                submission_failed(state, failure);
                vec![AppEffect::RequestFrame]
            }
            CalculationOrigin::Recalculate => {
                if state.dashboard.status != DashboardStatus::Recalculating {
                    return Vec::new();
                }
                warn!(error = failure.message(), "recalculation failed");
                state.dashboard.status = DashboardStatus::Ready;
                state.dashboard.alert = Some(RECALCULATION_FAILED_ALERT.to_string());
                vec![AppEffect::RequestFrame]
            }
        },
        RuntimeAction::ChatReplied { purpose, reply } => match purpose {
            ChatPurpose::Conversation => {
                if !state.chat.sending {
                    return Vec::new();
                }
                state.chat.push(ChatRole::Assistant, &reply, state.clock_ms);
                state.chat.sending = false;
                state.chat.status.clear();
                vec![AppEffect::RequestFrame]
            }
            ChatPurpose::Summary => {
                if state.dashboard.summary != SummaryPanel::Loading {
                    return Vec::new();
                }
                state.dashboard.summary = SummaryPanel::Ready(Arc::from(reply.as_str()));
                vec![AppEffect::RequestFrame]
            }
        },
        RuntimeAction::ChatFailed { purpose, failure } => chat_failed(state, purpose, &failure),
    }
}

fn render_question(state: &mut AppState, index: usize) {
    let now_ms = state.clock_ms;
    let onboarding = &mut state.onboarding;
    onboarding.current_index = index;
    let focus = match question(index) {
        Some(spec) if spec.kind == QuestionKind::Payouts => {
            onboarding.payout_targets().first().copied()
        }
        Some(spec) => Some(EditorTarget::Question(spec.id)),
        None => None,
    };
    onboarding.focus_editor(focus);
    match onboarding.mounted.take() {
        Some(from) if from != index => {
            onboarding.transition = Some(QuestionTransition {
                from,
                target: TransitionTarget::Question(index),
                started_ms: now_ms,
            });
        }
        _ => onboarding.mounted = Some(index),
    }
}

fn next_question(state: &mut AppState) -> Vec<AppEffect> {
    if state.screen != Screen::Onboarding || !state.onboarding.continue_enabled() {
        return Vec::new();
    }
    state.onboarding.inline_message = None;
    let index = state.onboarding.current_index;
    if state.onboarding.is_last_question() {
        info!("answers complete; leaving the last question");
        state.onboarding.mounted = None;
        state.onboarding.transition = Some(QuestionTransition {
            from: index,
            target: TransitionTarget::Submit,
            started_ms: state.clock_ms,
        });
    } else {
        render_question(state, index + 1);
    }
    vec![AppEffect::RequestFrame]
}

fn previous_question(state: &mut AppState) -> Vec<AppEffect> {
    if state.screen != Screen::Onboarding {
        return Vec::new();
    }
    let onboarding = &mut state.onboarding;
    if matches!(onboarding.submission, SubmissionStatus::Failed { .. }) {
        onboarding.submission = SubmissionStatus::Idle;
        let index = onboarding.current_index;
        onboarding.mounted = None;
        render_question(state, index);
        return vec![AppEffect::RequestFrame];
    }
    if onboarding.transition.is_some()
        || onboarding.submission != SubmissionStatus::Idle
        || onboarding.current_index == 0
    {
        return Vec::new();
    }
    onboarding.inline_message = None;
    let index = onboarding.current_index - 1;
    render_question(state, index);
    vec![AppEffect::RequestFrame]
}

fn start_submission(state: &mut AppState) -> Vec<AppEffect> {
    match build_request(&state.onboarding.answers) {
        Ok(request) => {
            let request = to_base_currency(request, state.currency.active_rate());
            state.onboarding.submission = SubmissionStatus::InFlight;
            info!(
                payouts = request.payouts.len(),
                currency = state.currency.selected.label(),
                "submitting answers"
            );
            vec![
                AppEffect::SubmitCalculation {
                    origin: CalculationOrigin::Onboarding,
                    request,
                },
                AppEffect::RequestFrame,
            ]
        }
        Err(err) => {
            warn!(error = %err, "answers could not be submitted");
            state.onboarding.submission = SubmissionStatus::Failed {
                message: err.to_string(),
            };
            vec![AppEffect::RequestFrame]
        }
    }
}

fn submission_failed(state: &mut AppState, failure: CalculationFailure) {
    let onboarding = &mut state.onboarding;
    if failure.is_payout_conflict() {
        onboarding.submission = SubmissionStatus::Idle;
        onboarding.mounted = None;
        onboarding.inline_message = Some(PAYOUT_CONFLICT_MESSAGE.to_string());
        render_question(state, question_index(QuestionId::Payouts));
        return;
    }
    onboarding.submission = SubmissionStatus::Failed {
        message: failure.message().to_string(),
    };
}

fn install_plan(state: &mut AppState, plan: CanonicalPlan) {
    let dashboard = &mut state.dashboard;
    dashboard.canonical = Some(plan);
    dashboard.summary = SummaryPanel::Idle;
    dashboard.alert = None;
    dashboard.table_scroll = 0;
    dashboard.refresh_display(&state.currency);
}

fn currency_changed(state: &mut AppState) -> Vec<AppEffect> {
    state.dashboard.refresh_display(&state.currency);
    vec![
        AppEffect::PersistCurrency(state.currency.clone()),
        AppEffect::RequestFrame,
    ]
}

fn on_payouts_question(state: &AppState) -> bool {
    state.screen == Screen::Onboarding
        && state.onboarding.accepts_input()
        && state.question_kind() == Some(QuestionKind::Payouts)
}

fn edit_focused(state: &mut AppState, edit: impl FnOnce(&mut TextField)) -> Vec<AppEffect> {
    match state.screen {
        Screen::Welcome => Vec::new(),
        Screen::Onboarding => {
            let onboarding = &mut state.onboarding;
            if !onboarding.accepts_input() || onboarding.focus.is_none() {
                return Vec::new();
            }
            edit(&mut onboarding.editor);
            onboarding.store_editor();
            vec![AppEffect::RequestFrame]
        }
        Screen::Dashboard => {
            match &mut state.dashboard.overlay {
                DashboardOverlay::None | DashboardOverlay::ConfirmRestart => return Vec::new(),
                DashboardOverlay::EditForm(form) => {
                    form.error = None;
                    let Some(field) = form.focused_mut() else {
                        return Vec::new();
                    };
                    edit(field);
                }
                DashboardOverlay::RateEditor(editor) => edit(&mut editor.field),
                DashboardOverlay::Chat => edit(&mut state.chat.input),
            }
            vec![AppEffect::RequestFrame]
        }
    }
}

fn move_focus(state: &mut AppState, forward: bool) -> Vec<AppEffect> {
    if state.screen == Screen::Dashboard {
        let DashboardOverlay::EditForm(form) = &mut state.dashboard.overlay else {
            return Vec::new();
        };
        if forward {
            form.focus_next();
        } else {
            form.focus_prev();
        }
        return vec![AppEffect::RequestFrame];
    }
    if !on_payouts_question(state) {
        return Vec::new();
    }
    let onboarding = &mut state.onboarding;
    let targets = onboarding.payout_targets();
    if targets.is_empty() {
        return Vec::new();
    }
    let len = targets.len();
    let position = onboarding
        .focus
        .and_then(|focus| targets.iter().position(|target| *target == focus));
    let next = match (position, forward) {
        (None, _) => 0,
        (Some(pos), true) => (pos + 1) % len,
        (Some(pos), false) => (pos + len - 1) % len,
    };
    onboarding.focus_editor(Some(targets[next]));
    vec![AppEffect::RequestFrame]
}

fn save_edit(state: &mut AppState) -> Vec<AppEffect> {
    if state.dashboard.status != DashboardStatus::Ready {
        return Vec::new();
    }
    let currency = state.currency.selected;
    let rate = state.currency.active_rate();
    let DashboardOverlay::EditForm(form) = &mut state.dashboard.overlay else {
        return Vec::new();
    };
    let answers = form.answers();
    let invalid = form
        .fields
        .iter()
        .find_map(|entry| validate(entry.id, &answers).err().map(|err| (entry.id, err)));
    if let Some((id, err)) = invalid {
        form.error = Some(format!("{}: {}", edit_label(id, currency), err.message()));
        return vec![AppEffect::RequestFrame];
    }
    let request = match build_request(&answers) {
        Ok(request) => to_base_currency(request, rate),
        Err(err) => {
            form.error = Some(err.to_string());
            return vec![AppEffect::RequestFrame];
        }
    };
    info!(currency = currency.label(), "recalculating plan");
    state.dashboard.overlay = DashboardOverlay::None;
    state.dashboard.status = DashboardStatus::Recalculating;
    state.dashboard.alert = None;
    vec![
        AppEffect::SubmitCalculation {
            origin: CalculationOrigin::Recalculate,
            request,
        },
        AppEffect::RequestFrame,
    ]
}

fn send_chat(state: &mut AppState) -> Vec<AppEffect> {
    if state.screen != Screen::Dashboard || state.chat.sending {
        return Vec::new();
    }
    let message = state.chat.input.value().trim().to_string();
    if message.is_empty() {
        return Vec::new();
    }
    let Some(plan) = state.dashboard.display.clone() else {
        return Vec::new();
    };
    state.chat.push(ChatRole::User, &message, state.clock_ms);
    state.chat.input.clear();
    state.chat.status = STATUS_THINKING.to_string();
    state.chat.sending = true;
    vec![
        AppEffect::SubmitChat {
            purpose: ChatPurpose::Conversation,
            message,
            plan,
        },
        AppEffect::RequestFrame,
    ]
}

fn chat_failed(state: &mut AppState, purpose: ChatPurpose, failure: &ChatFailure) -> Vec<AppEffect> {
    match purpose {
        ChatPurpose::Conversation => {
            if !state.chat.sending {
                return Vec::new();
            }
            warn!(error = failure.reply_text(), "chat request failed");
            state
                .chat
                .push(ChatRole::Error, failure.reply_text(), state.clock_ms);
            state.chat.sending = false;
            state.chat.status = STATUS_FAILED.to_string();
        }
        ChatPurpose::Summary => {
            if state.dashboard.summary != SummaryPanel::Loading {
                return Vec::new();
            }
            warn!(error = failure.reply_text(), "summary request failed");
            state.dashboard.summary = SummaryPanel::Failed(Arc::from(failure.reply_text()));
        }
    }
    vec![AppEffect::RequestFrame]
}

#[cfg(test)]
mod tests;
