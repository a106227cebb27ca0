use super::chat::ChatFailure;
use super::currency::CurrencyCode;
use super::currency::CurrencyState;
use super::plan::CanonicalPlan;
use super::submission::CalculationFailure;

#[derive(Debug, Clone)]
pub enum AppAction {
    User(UserAction),
    Runtime(RuntimeAction),
}

/// Which flow a calculation request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculationOrigin {
    Onboarding,
    Recalculate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPurpose {
    Conversation,
    Summary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    StartOnboarding,
    /// Text input goes to whichever editor currently has focus.
    InputChar(char),
    InputPaste(String),
    Backspace,
    Delete,
    CaretLeft,
    CaretRight,
    CaretHome,
    CaretEnd,
    NextQuestion,
    PreviousQuestion,
    AddPayout,
    RemoveFocusedPayout,
    FocusNext,
    FocusPrev,
    RetrySubmission,
    SelectCurrency(CurrencyCode),
    CycleCurrency,
    OpenRateEditor,
    ApplyRate,
    OpenEditForm,
    SaveEdit,
    OpenChat,
    SendChat,
    RequestSummary,
    CopyLastReply,
    CloseOverlay,
    DismissAlert,
    ScrollTable(i32),
    RequestRestart,
    Restart,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeAction {
    Tick { now_ms: i64 },
    CurrencyLoaded(CurrencyState),
    PlanRestored(CanonicalPlan),
    CalculationSucceeded {
        origin: CalculationOrigin,
        plan: CanonicalPlan,
    },
    CalculationFailed {
        origin: CalculationOrigin,
        failure: CalculationFailure,
    },
    ChatReplied {
        purpose: ChatPurpose,
        reply: String,
    },
    ChatFailed {
        purpose: ChatPurpose,
        failure: ChatFailure,
    },
}

impl UserAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::StartOnboarding => "start_onboarding",
            Self::InputChar(_) | Self::InputPaste(_) => "input",
            Self::Backspace | Self::Delete => "delete",
            Self::CaretLeft | Self::CaretRight | Self::CaretHome | Self::CaretEnd => "caret",
            Self::NextQuestion => "next_question",
            Self::PreviousQuestion => "previous_question",
            Self::AddPayout => "add_payout",
            Self::RemoveFocusedPayout => "remove_payout",
            Self::FocusNext | Self::FocusPrev => "focus",
            Self::RetrySubmission => "retry_submission",
            Self::SelectCurrency(_) | Self::CycleCurrency => "select_currency",
            Self::OpenRateEditor => "open_rate_editor",
            Self::ApplyRate => "apply_rate",
            Self::OpenEditForm => "open_edit_form",
            Self::SaveEdit => "save_edit",
            Self::OpenChat => "open_chat",
            Self::SendChat => "send_chat",
            Self::RequestSummary => "request_summary",
            Self::CopyLastReply => "copy_last_reply",
            Self::CloseOverlay => "close_overlay",
            Self::DismissAlert => "dismiss_alert",
            Self::ScrollTable(_) => "scroll_table",
            Self::RequestRestart => "request_restart",
            Self::Restart => "restart",
        }
    }
}
