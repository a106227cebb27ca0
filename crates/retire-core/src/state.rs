use std::sync::Arc;

use super::answers::field_errors;
use super::answers::validate;
use super::answers::Answers;
use super::answers::FieldError;
use super::answers::PayoutDraft;
use super::chat::CHAT_INTRO;
use super::convert::convert;
use super::currency::CurrencyCode;
use super::currency::CurrencyState;
use super::dashboard::build_dashboard;
use super::dashboard::DashboardView;
use super::field::FieldFormat;
use super::field::TextField;
use super::numeric::format_number_for_input;
use super::plan::CanonicalPlan;
use super::plan::PlanPayout;
use super::questions::question;
use super::questions::question_spec;
use super::questions::QuestionId;
use super::questions::QuestionKind;
use super::questions::QuestionSpec;

/// Exit animation length for a question panel.
pub const QUESTION_TRANSITION_MS: i64 = 600;

pub const RECALCULATION_FAILED_ALERT: &str = "Error recalculating. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Welcome,
    Onboarding,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutField {
    Amount,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorTarget {
    Question(QuestionId),
    Payout { row: usize, field: PayoutField },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionTarget {
    Question(usize),
    Submit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionTransition {
    pub from: usize,
    pub target: TransitionTarget,
    pub started_ms: i64,
}

impl QuestionTransition {
    pub fn deadline_ms(&self) -> i64 {
        self.started_ms + QUESTION_TRANSITION_MS
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    Idle,
    InFlight,
    Failed { message: String },
}

/// What the onboarding screen shows right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingPhase {
    Question(usize),
    Exiting(usize),
    Submitting,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnboardingState {
    pub current_index: usize,
    pub answers: Answers,
    pub mounted: Option<usize>,
    pub transition: Option<QuestionTransition>,
    pub editor: TextField,
    pub focus: Option<EditorTarget>,
    pub submission: SubmissionStatus,
    pub inline_message: Option<String>,
}

impl Default for OnboardingState {
    fn default() -> Self {
        Self {
            current_index: 0,
            answers: Answers::new(),
            mounted: None,
            transition: None,
            editor: TextField::new(FieldFormat::Grouped),
            focus: None,
            submission: SubmissionStatus::Idle,
            inline_message: None,
        }
    }
}

impl OnboardingState {
    pub fn current_spec(&self) -> Option<&'static QuestionSpec> {
        question(self.current_index)
    }

    pub fn phase(&self) -> OnboardingPhase {
        match (&self.submission, self.transition, self.mounted) {
            (SubmissionStatus::InFlight, _, _) => OnboardingPhase::Submitting,
            (SubmissionStatus::Failed { .. }, _, _) => OnboardingPhase::Failed,
            (SubmissionStatus::Idle, Some(transition), _) => OnboardingPhase::Exiting(transition.from),
            (SubmissionStatus::Idle, None, Some(index)) => OnboardingPhase::Question(index),
            (SubmissionStatus::Idle, None, None) => OnboardingPhase::Question(self.current_index),
        }
    }

    pub fn accepts_input(&self) -> bool {
        self.transition.is_none()
            && self.submission == SubmissionStatus::Idle
            && self.mounted == Some(self.current_index)
    }

    pub fn current_error(&self) -> Option<FieldError> {
        self.current_spec()
            .and_then(|spec| validate(spec.id, &self.answers).err())
    }

    /// Error to show under the current question; blank fields stay quiet.
    pub fn visible_error(&self) -> Option<FieldError> {
        let spec = self.current_spec()?;
        if !self.answers.is_answered(spec.id) {
            return None;
        }
        field_errors(&self.answers).get(&spec.id).copied()
    }

    pub fn continue_enabled(&self) -> bool {
        self.accepts_input() && self.current_error().is_none()
    }

    pub fn is_last_question(&self) -> bool {
        question(self.current_index + 1).is_none()
    }

    /// Focus ring over the payout rows: amount then age, row by row.
    pub fn payout_targets(&self) -> Vec<EditorTarget> {
        (0..self.answers.payouts().len())
            .flat_map(|row| {
                [PayoutField::Amount, PayoutField::Year]
                    .into_iter()
                    .map(move |field| EditorTarget::Payout { row, field })
            })
            .collect()
    }

    /// Binds the editor to `target`, loading the stored answer.
    pub fn focus_editor(&mut self, target: Option<EditorTarget>) {
        self.focus = target;
        self.editor = match target {
            Some(EditorTarget::Question(id)) => {
                let format = editor_format(question_spec(id));
                TextField::with_value(format, self.answers.text(id))
            }
            Some(EditorTarget::Payout { row, field }) => {
                let draft = self.answers.payouts().get(row).cloned().unwrap_or_default();
                match field {
                    PayoutField::Amount => TextField::with_value(FieldFormat::Grouped, &draft.amount),
                    PayoutField::Year => TextField::with_value(FieldFormat::Numeric, &draft.year),
                }
            }
            None => TextField::new(FieldFormat::Numeric),
        };
    }

    /// Writes the editor's sanitized value back into the answer set.
    pub fn store_editor(&mut self) {
        let value = self.editor.value();
        match self.focus {
            Some(EditorTarget::Question(id)) => self.answers.set_text(id, value),
            Some(EditorTarget::Payout { row, field }) => {
                if let Some(draft) = self.answers.payouts_mut().get_mut(row) {
                    match field {
                        PayoutField::Amount => draft.amount = value,
                        PayoutField::Year => draft.year = value,
                    }
                }
            }
            None => {}
        }
    }

    pub fn payout_rows(&self) -> &[PayoutDraft] {
        self.answers.payouts()
    }
}

pub fn editor_format(spec: &QuestionSpec) -> FieldFormat {
    if spec.formats_with_commas() {
        FieldFormat::Grouped
    } else {
        FieldFormat::Numeric
    }
}

pub const EDIT_FORM_FIELDS: [QuestionId; 7] = [
    QuestionId::IdealRetirementIncome,
    QuestionId::IdealRetirementAge,
    QuestionId::WithdrawalRate,
    QuestionId::CurrentAge,
    QuestionId::CurrentAssetValues,
    QuestionId::Cagr,
    QuestionId::MonthlySavings,
];

pub fn edit_label(id: QuestionId, currency: CurrencyCode) -> String {
    match id {
        QuestionId::IdealRetirementIncome => {
            format!("Ideal Monthly Retirement Income ({})", currency.label())
        }
        QuestionId::IdealRetirementAge => "Ideal Retirement Age".to_string(),
        QuestionId::WithdrawalRate => "Withdrawal Rate (%)".to_string(),
        QuestionId::CurrentAge => "Current Age".to_string(),
        QuestionId::CurrentAssetValues => format!("Current Asset Values ({})", currency.label()),
        QuestionId::Cagr => "Expected Annual Growth Rate (CAGR %)".to_string(),
        QuestionId::MonthlySavings => {
            format!("Monthly Savings for Retirement ({})", currency.label())
        }
        QuestionId::Payouts => "Payouts".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditField {
    pub id: QuestionId,
    pub label: String,
    pub field: TextField,
}

/// Edit-and-recalculate form, holding display-currency values.
#[derive(Debug, Clone, PartialEq)]
pub struct EditForm {
    pub fields: Vec<EditField>,
    pub focus: usize,
    /// Payout echo carried through unchanged, in display currency.
    pub payouts: Vec<PlanPayout>,
    pub error: Option<String>,
}

impl EditForm {
    pub fn from_plan(display: &CanonicalPlan, currency: CurrencyCode) -> Self {
        let inputs = &display.inputs;
        let fields = EDIT_FORM_FIELDS
            .iter()
            .map(|id| {
                let field = match id {
                    QuestionId::IdealRetirementIncome => {
                        grouped_field(inputs.ideal_retirement_income)
                    }
                    QuestionId::CurrentAssetValues => grouped_field(inputs.current_asset_values),
                    QuestionId::MonthlySavings => grouped_field(inputs.monthly_savings),
                    QuestionId::IdealRetirementAge => plain_number(inputs.ideal_retirement_age),
                    QuestionId::WithdrawalRate => plain_number(inputs.withdrawal_rate),
                    QuestionId::CurrentAge => plain_number(inputs.current_age),
                    QuestionId::Cagr | QuestionId::Payouts => plain_number(inputs.cagr),
                };
                EditField {
                    id: *id,
                    label: edit_label(*id, currency),
                    field,
                }
            })
            .collect();
        Self {
            fields,
            focus: 0,
            payouts: inputs.payouts.clone(),
            error: None,
        }
    }

    pub fn answers(&self) -> Answers {
        let mut answers = Answers::new();
        for entry in &self.fields {
            answers.set_text(entry.id, entry.field.value());
        }
        answers.payouts_mut().extend(self.payouts.iter().map(|payout| PayoutDraft {
            amount: format!("{}", payout.amount),
            year: format!("{}", payout.year.trunc()),
        }));
        answers
    }

    pub fn focused_mut(&mut self) -> Option<&mut TextField> {
        self.fields.get_mut(self.focus).map(|entry| &mut entry.field)
    }

    pub fn focus_next(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + 1) % self.fields.len();
        }
    }

    pub fn focus_prev(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
        }
    }
}

fn grouped_field(value: f64) -> TextField {
    TextField::with_value(FieldFormat::Grouped, &format_number_for_input(value))
}

fn plain_number(value: f64) -> TextField {
    let raw = if value.is_finite() {
        format!("{value}")
    } else {
        String::new()
    };
    TextField::with_value(FieldFormat::Numeric, &raw)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateEditor {
    pub code: CurrencyCode,
    pub field: TextField,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardOverlay {
    None,
    EditForm(EditForm),
    RateEditor(RateEditor),
    Chat,
    ConfirmRestart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardStatus {
    Ready,
    Recalculating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryPanel {
    Idle,
    Loading,
    Ready(Arc<str>),
    Failed(Arc<str>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub canonical: Option<CanonicalPlan>,
    pub display: Option<CanonicalPlan>,
    pub view: Option<DashboardView>,
    pub status: DashboardStatus,
    pub alert: Option<String>,
    pub overlay: DashboardOverlay,
    pub table_scroll: usize,
    pub summary: SummaryPanel,
    /// Bumped on every display-plan recomputation.
    pub display_revision: u64,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            canonical: None,
            display: None,
            view: None,
            status: DashboardStatus::Ready,
            alert: None,
            overlay: DashboardOverlay::None,
            table_scroll: 0,
            summary: SummaryPanel::Idle,
            display_revision: 0,
        }
    }
}

impl DashboardState {
    /// Recomputes the display plan and the view from the canonical plan.
    pub fn refresh_display(&mut self, currency: &CurrencyState) {
        let Some(canonical) = self.canonical.as_ref() else {
            self.display = None;
            self.view = None;
            return;
        };
        let display = convert(canonical, currency.active_rate());
        self.view = Some(build_dashboard(&display, currency.selected));
        self.display = Some(display);
        self.display_revision = self.display_revision.saturating_add(1);

        if let DashboardOverlay::EditForm(form) = &mut self.overlay {
            if let Some(display) = self.display.as_ref() {
                *form = EditForm::from_plan(display, currency.selected);
            }
        }
        let rows = self.view.as_ref().map_or(0, |view| view.rows.len());
        self.table_scroll = self.table_scroll.min(rows.saturating_sub(1));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
    Error,
}

impl ChatRole {
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Assistant => "Copilot",
            Self::Error => "Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: Arc<str>,
    pub ts_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatState {
    pub history: Vec<ChatMessage>,
    pub sending: bool,
    pub status: String,
    pub input: TextField,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            history: Vec::new(),
            sending: false,
            status: String::new(),
            input: TextField::new(FieldFormat::Plain),
        }
    }
}

impl ChatState {
    /// Messages to render; the intro stands in while the history is empty.
    pub fn visible_messages(&self) -> Vec<ChatMessage> {
        if self.history.is_empty() {
            return vec![ChatMessage {
                role: ChatRole::Assistant,
                content: Arc::from(CHAT_INTRO),
                ts_ms: 0,
            }];
        }
        self.history.clone()
    }

    pub fn last_reply(&self) -> Option<&ChatMessage> {
        self.history
            .iter()
            .rev()
            .find(|message| message.role == ChatRole::Assistant)
    }

    pub fn push(&mut self, role: ChatRole, content: &str, ts_ms: i64) {
        self.history.push(ChatMessage {
            role,
            content: Arc::from(content),
            ts_ms,
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub screen: Screen,
    pub clock_ms: i64,
    pub currency: CurrencyState,
    pub onboarding: OnboardingState,
    pub dashboard: DashboardState,
    pub chat: ChatState,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            screen: Screen::Welcome,
            clock_ms: 0,
            currency: CurrencyState::default(),
            onboarding: OnboardingState::default(),
            dashboard: DashboardState::default(),
            chat: ChatState::default(),
        }
    }

    pub fn has_plan(&self) -> bool {
        self.dashboard.canonical.is_some()
    }

    pub fn question_kind(&self) -> Option<QuestionKind> {
        self.onboarding.current_spec().map(|spec| spec.kind)
    }
}
