use std::io;
use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{
    self, DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    Event, KeyCode, KeyEventKind, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Axis, Block, Borders, Cell, Chart, Clear, Dataset, Gauge, GraphType, Paragraph, Row, Table,
    Wrap,
};
use ratatui::Terminal;
use tracing::info;

use retire_core::actions::{AppAction, RuntimeAction, UserAction};
use retire_core::chat::{parse_blocks, Block as ChatBlock, Inline};
use retire_core::currency::{format_currency_short, format_rate, CurrencyCode};
use retire_core::dashboard::{DashboardView, Tone, PROJECTION_COLUMNS};
use retire_core::field::TextField;
use retire_core::numeric::format_with_commas;
use retire_core::questions::{
    question, question_index, Affix, QuestionKind, QuestionSpec, QUESTIONS,
};
use retire_core::reducer::{reduce, AppEffect};
use retire_core::state::{
    AppState, ChatRole, DashboardOverlay, DashboardStatus, EditForm, EditorTarget,
    OnboardingPhase, PayoutField, RateEditor, Screen, SubmissionStatus, SummaryPanel,
};
use retire_core::submission::SUBMISSION_FAILED_HEADLINE;

use crate::effects::EffectRunner;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const PAGE_ROWS: i32 = 10;

struct TuiGuard;

impl Drop for TuiGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            io::stdout(),
            LeaveAlternateScreen,
            DisableMouseCapture,
            DisableBracketedPaste,
            crossterm::cursor::Show
        );
    }
}

pub fn run(
    mut state: AppState,
    runner: EffectRunner,
    rx: mpsc::Receiver<RuntimeAction>,
) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste,
        crossterm::cursor::Hide
    )?;
    let _guard = TuiGuard; // restores the terminal on exit or panic

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    run_app(&mut terminal, &mut state, &runner, &rx).map_err(|e| e.into())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    state: &mut AppState,
    runner: &EffectRunner,
    rx: &mpsc::Receiver<RuntimeAction>,
) -> io::Result<()> {
    loop {
        // Results from background requests
        while let Ok(action) = rx.try_recv() {
            runner.run_all(reduce(state, AppAction::Runtime(action)));
        }

        let now_ms = chrono::Utc::now().timestamp_millis();
        runner.run_all(reduce(state, AppAction::Runtime(RuntimeAction::Tick { now_ms })));

        terminal.draw(|f| ui(f, state))?;

        if event::poll(Duration::from_millis(16))? {
            let mut effects = Vec::new();
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    match handle_key_event(key, state) {
                        KeyHandlerResult::Continue(e) => effects.extend(e),
                        KeyHandlerResult::Exit => {
                            info!("leaving planner");
                            return Ok(());
                        }
                    }
                }
                Event::Paste(text) => {
                    effects.extend(reduce(state, AppAction::User(UserAction::InputPaste(text))));
                }
                _ => {}
            }
            runner.run_all(effects);
        }
    }
}

enum KeyHandlerResult {
    Continue(Vec<AppEffect>),
    Exit,
}

fn handle_key_event(key: event::KeyEvent, state: &mut AppState) -> KeyHandlerResult {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyHandlerResult::Exit;
    }

    match state.screen {
        Screen::Welcome => handle_welcome_keys(key, state),
        Screen::Onboarding => handle_onboarding_keys(key, state),
        Screen::Dashboard => match state.dashboard.overlay {
            DashboardOverlay::None => handle_dashboard_keys(key, state),
            DashboardOverlay::EditForm(_) => handle_edit_form_keys(key, state),
            DashboardOverlay::RateEditor(_) => handle_rate_editor_keys(key, state),
            DashboardOverlay::Chat => handle_chat_keys(key, state),
            DashboardOverlay::ConfirmRestart => handle_confirm_restart_keys(key, state),
        },
    }
}

fn user(state: &mut AppState, action: UserAction) -> Vec<AppEffect> {
    reduce(state, AppAction::User(action))
}

/// Caret and character keys shared by every text editor.
fn text_edit_action(key: event::KeyEvent) -> Option<UserAction> {
    match key.code {
        KeyCode::Char(c) => Some(UserAction::InputChar(c)),
        KeyCode::Backspace => Some(UserAction::Backspace),
        KeyCode::Delete => Some(UserAction::Delete),
        KeyCode::Left => Some(UserAction::CaretLeft),
        KeyCode::Right => Some(UserAction::CaretRight),
        KeyCode::Home => Some(UserAction::CaretHome),
        KeyCode::End => Some(UserAction::CaretEnd),
        _ => None,
    }
}

fn handle_welcome_keys(key: event::KeyEvent, state: &mut AppState) -> KeyHandlerResult {
    let effects = match key.code {
        KeyCode::Enter | KeyCode::Char(' ') => user(state, UserAction::StartOnboarding),
        KeyCode::Char('q') | KeyCode::Esc => return KeyHandlerResult::Exit,
        _ => Vec::new(),
    };
    KeyHandlerResult::Continue(effects)
}

fn handle_onboarding_keys(key: event::KeyEvent, state: &mut AppState) -> KeyHandlerResult {
    if state.onboarding.phase() == OnboardingPhase::Failed {
        let effects = match key.code {
            KeyCode::Char('r') | KeyCode::Enter => user(state, UserAction::RetrySubmission),
            KeyCode::Esc => user(state, UserAction::PreviousQuestion),
            _ => Vec::new(),
        };
        return KeyHandlerResult::Continue(effects);
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        let effects = match key.code {
            KeyCode::Char('a') => user(state, UserAction::AddPayout),
            KeyCode::Char('d') => user(state, UserAction::RemoveFocusedPayout),
            _ => Vec::new(),
        };
        return KeyHandlerResult::Continue(effects);
    }

    let effects = match key.code {
        KeyCode::Enter => user(state, UserAction::NextQuestion),
        KeyCode::Esc => user(state, UserAction::PreviousQuestion),
        KeyCode::Tab | KeyCode::Down => user(state, UserAction::FocusNext),
        KeyCode::BackTab | KeyCode::Up => user(state, UserAction::FocusPrev),
        _ => match text_edit_action(key) {
            Some(action) => user(state, action),
            None => Vec::new(),
        },
    };
    KeyHandlerResult::Continue(effects)
}

fn handle_dashboard_keys(key: event::KeyEvent, state: &mut AppState) -> KeyHandlerResult {
    let effects = match key.code {
        KeyCode::Char('q') => return KeyHandlerResult::Exit,
        KeyCode::Char('c') => user(state, UserAction::CycleCurrency),
        KeyCode::Char('1') => user(state, UserAction::SelectCurrency(CurrencyCode::Cad)),
        KeyCode::Char('2') => user(state, UserAction::SelectCurrency(CurrencyCode::Usd)),
        KeyCode::Char('3') => user(state, UserAction::SelectCurrency(CurrencyCode::Gbp)),
        KeyCode::Char('r') => user(state, UserAction::OpenRateEditor),
        KeyCode::Char('e') => user(state, UserAction::OpenEditForm),
        KeyCode::Char('a') | KeyCode::Char('/') => user(state, UserAction::OpenChat),
        KeyCode::Char('s') => user(state, UserAction::RequestSummary),
        KeyCode::Char('y') => user(state, UserAction::CopyLastReply),
        KeyCode::Char('n') => user(state, UserAction::RequestRestart),
        KeyCode::Up => user(state, UserAction::ScrollTable(-1)),
        KeyCode::Down => user(state, UserAction::ScrollTable(1)),
        KeyCode::PageUp => user(state, UserAction::ScrollTable(-PAGE_ROWS)),
        KeyCode::PageDown => user(state, UserAction::ScrollTable(PAGE_ROWS)),
        KeyCode::Esc => user(state, UserAction::DismissAlert),
        _ => Vec::new(),
    };
    KeyHandlerResult::Continue(effects)
}

fn handle_edit_form_keys(key: event::KeyEvent, state: &mut AppState) -> KeyHandlerResult {
    let effects = match key.code {
        KeyCode::Enter => user(state, UserAction::SaveEdit),
        KeyCode::Esc => user(state, UserAction::CloseOverlay),
        KeyCode::Tab | KeyCode::Down => user(state, UserAction::FocusNext),
        KeyCode::BackTab | KeyCode::Up => user(state, UserAction::FocusPrev),
        _ => match text_edit_action(key) {
            Some(action) => user(state, action),
            None => Vec::new(),
        },
    };
    KeyHandlerResult::Continue(effects)
}

fn handle_rate_editor_keys(key: event::KeyEvent, state: &mut AppState) -> KeyHandlerResult {
    let effects = match key.code {
        KeyCode::Enter => user(state, UserAction::ApplyRate),
        KeyCode::Esc => user(state, UserAction::CloseOverlay),
        _ => match text_edit_action(key) {
            Some(action) => user(state, action),
            None => Vec::new(),
        },
    };
    KeyHandlerResult::Continue(effects)
}

fn handle_chat_keys(key: event::KeyEvent, state: &mut AppState) -> KeyHandlerResult {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('y') {
        return KeyHandlerResult::Continue(user(state, UserAction::CopyLastReply));
    }
    let effects = match key.code {
        KeyCode::Enter => user(state, UserAction::SendChat),
        KeyCode::Esc => user(state, UserAction::CloseOverlay),
        _ => match text_edit_action(key) {
            Some(action) => user(state, action),
            None => Vec::new(),
        },
    };
    KeyHandlerResult::Continue(effects)
}

fn handle_confirm_restart_keys(key: event::KeyEvent, state: &mut AppState) -> KeyHandlerResult {
    let effects = match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
            user(state, UserAction::Restart)
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            user(state, UserAction::CloseOverlay)
        }
        _ => Vec::new(),
    };
    KeyHandlerResult::Continue(effects)
}

#[derive(Clone, Copy)]
struct UiPalette {
    accent: Color,
    accent_alt: Color,
    success: Color,
    warning: Color,
    danger: Color,
    muted: Color,
    border: Color,
    panel_bg: Color,
    selected_bg: Color,
}

fn palette() -> UiPalette {
    UiPalette {
        accent: Color::Cyan,
        accent_alt: Color::Blue,
        success: Color::Green,
        warning: Color::Yellow,
        danger: Color::Red,
        muted: Color::DarkGray,
        border: Color::Gray,
        panel_bg: Color::Black,
        selected_bg: Color::DarkGray,
    }
}

fn spinner(now_ms: i64) -> &'static str {
    SPINNER_FRAMES[(now_ms / 100).rem_euclid(SPINNER_FRAMES.len() as i64) as usize]
}

fn tone_color(tone: Tone, palette: UiPalette) -> Color {
    match tone {
        Tone::Neutral => Color::White,
        Tone::Positive => palette.success,
        Tone::Negative => palette.danger,
    }
}

fn panel(title: impl Into<String>, palette: UiPalette) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border))
        .title(title.into())
}

fn ui(f: &mut ratatui::Frame, state: &AppState) {
    let palette = palette();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Footer
        ])
        .split(f.area());

    render_header(f, chunks[0], state, palette);
    match state.screen {
        Screen::Welcome => render_welcome(f, chunks[1], palette),
        Screen::Onboarding => render_onboarding(f, chunks[1], state, palette),
        Screen::Dashboard => render_dashboard(f, chunks[1], state, palette),
    }
    let footer = Paragraph::new(footer_text(state)).style(Style::default().fg(palette.muted));
    f.render_widget(footer, chunks[2]);

    if state.screen != Screen::Dashboard {
        return;
    }
    match &state.dashboard.overlay {
        DashboardOverlay::None => {}
        DashboardOverlay::EditForm(form) => render_edit_form(f, form, palette),
        DashboardOverlay::RateEditor(editor) => render_rate_editor(f, editor, palette),
        DashboardOverlay::Chat => render_chat(f, state, palette),
        DashboardOverlay::ConfirmRestart => render_confirm_restart(f, palette),
    }
    if let Some(alert) = &state.dashboard.alert {
        let area = centered_rect(50, 20, f.area());
        f.render_widget(Clear, area);
        let block = Block::default()
            .title("Recalculation")
            .borders(Borders::ALL)
            .style(Style::default().bg(palette.panel_bg).fg(Color::White))
            .border_style(Style::default().fg(palette.danger));
        let text = Paragraph::new(format!("{alert}\n\n[Esc] Dismiss"))
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(text, area);
    }
}

fn render_header(f: &mut ratatui::Frame, area: Rect, state: &AppState, palette: UiPalette) {
    let currency = state.currency.selected;
    let mut spans = vec![Span::styled(
        "Retirement Planner",
        Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::BOLD),
    )];
    if state.screen != Screen::Welcome {
        spans.push(Span::raw(" | "));
        for code in CurrencyCode::ALL {
            let style = if code == currency {
                Style::default()
                    .fg(palette.accent_alt)
                    .bg(palette.selected_bg)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette.muted)
            };
            spans.push(Span::styled(format!(" {} ", code.label()), style));
        }
        spans.push(Span::styled(
            format!(
                " 1 {} = {} {}",
                CurrencyCode::Cad.label(),
                format_rate(state.currency.active_rate()),
                currency.label()
            ),
            Style::default().fg(palette.muted),
        ));
    }
    if state.dashboard.status == DashboardStatus::Recalculating {
        spans.push(Span::styled(
            format!(" | {} recalculating", spinner(state.clock_ms)),
            Style::default().fg(palette.warning),
        ));
    }
    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.border)),
    );
    f.render_widget(header, area);
}

fn footer_text(state: &AppState) -> &'static str {
    match state.screen {
        Screen::Welcome => "Enter start | q quit",
        Screen::Onboarding => match state.onboarding.phase() {
            OnboardingPhase::Failed => "r retry | Esc back | Ctrl-C quit",
            OnboardingPhase::Submitting | OnboardingPhase::Exiting(_) => "Ctrl-C quit",
            OnboardingPhase::Question(_) => {
                if state.question_kind() == Some(QuestionKind::Payouts) {
                    "Ctrl-A add payout | Ctrl-D remove | Tab next field | Enter continue | Esc back"
                } else {
                    "Enter continue | Esc back | Ctrl-C quit"
                }
            }
        },
        Screen::Dashboard => match state.dashboard.overlay {
            DashboardOverlay::None => {
                "c/1/2/3 currency | r rate | e edit | a ask | s summary | y copy | arrows scroll | n restart | q quit"
            }
            DashboardOverlay::EditForm(_) => "Tab next field | Enter recalculate | Esc cancel",
            DashboardOverlay::RateEditor(_) => "Enter apply | Esc cancel",
            DashboardOverlay::Chat => "Enter send | Ctrl-Y copy reply | Esc close",
            DashboardOverlay::ConfirmRestart => "y confirm | n cancel",
        },
    }
}

fn render_welcome(f: &mut ratatui::Frame, area: Rect, palette: UiPalette) {
    let area = centered_rect(60, 50, area);
    let lines = vec![
        Line::from(Span::styled(
            "Plan the retirement you want",
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!(
            "Answer {} short questions and we'll project your net worth year by year.",
            QUESTIONS.len()
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Press Enter to begin",
            Style::default().fg(palette.success),
        )),
    ];
    let p = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(panel("Welcome", palette));
    f.render_widget(p, area);
}

fn render_onboarding(f: &mut ratatui::Frame, area: Rect, state: &AppState, palette: UiPalette) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let onboarding = &state.onboarding;
    let total = QUESTIONS.len();
    let step = (onboarding.current_index + 1).min(total);
    let gauge = Gauge::default()
        .block(panel("Progress", palette))
        .gauge_style(Style::default().fg(palette.accent))
        .ratio(step as f64 / total as f64)
        .label(format!("Question {step} of {total}"));
    f.render_widget(gauge, chunks[0]);

    let body = centered_rect(80, 90, chunks[1]);
    match onboarding.phase() {
        OnboardingPhase::Question(index) => {
            if let Some(spec) = question(index) {
                render_question(f, body, state, spec, false, palette);
            }
        }
        OnboardingPhase::Exiting(index) => {
            if let Some(spec) = question(index) {
                render_question(f, body, state, spec, true, palette);
            }
        }
        OnboardingPhase::Submitting => {
            let p = Paragraph::new(vec![
                Line::from(""),
                Line::from(Span::styled(
                    format!("{} Building your dashboard...", spinner(state.clock_ms)),
                    Style::default().fg(palette.accent),
                )),
            ])
            .alignment(Alignment::Center)
            .block(panel("Calculating", palette));
            f.render_widget(p, body);
        }
        OnboardingPhase::Failed => {
            let message = match &onboarding.submission {
                SubmissionStatus::Failed { message } => message.as_str(),
                _ => "",
            };
            let p = Paragraph::new(vec![
                Line::from(Span::styled(
                    SUBMISSION_FAILED_HEADLINE,
                    Style::default()
                        .fg(palette.danger)
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(message.to_string()),
                Line::from(""),
                Line::from(Span::styled(
                    "[r] Retry   [Esc] Back to the last question",
                    Style::default().fg(palette.warning),
                )),
            ])
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(
                panel("Something went wrong", palette)
                    .border_style(Style::default().fg(palette.danger)),
            );
            f.render_widget(p, body);
        }
    }
}

/// Draws a question panel; `exiting` dims it while the exit transition runs.
fn render_question(
    f: &mut ratatui::Frame,
    area: Rect,
    state: &AppState,
    spec: &QuestionSpec,
    exiting: bool,
    palette: UiPalette,
) {
    let onboarding = &state.onboarding;
    let base = if exiting {
        Style::default().fg(palette.muted)
    } else {
        Style::default().fg(Color::White)
    };
    let mut lines = vec![
        Line::from(Span::styled(spec.title, base.add_modifier(Modifier::BOLD))),
        Line::from(Span::styled(spec.description, base)),
        Line::from(""),
    ];

    match spec.kind {
        QuestionKind::Number => {
            let focused = !exiting && onboarding.focus == Some(EditorTarget::Question(spec.id));
            let mut spans = Vec::new();
            if spec.affix == Affix::CurrencyPrefix {
                spans.push(Span::styled(
                    format!("{} ", state.currency.selected.symbol()),
                    Style::default().fg(palette.accent),
                ));
            }
            if focused {
                spans.extend(field_spans(&onboarding.editor, true));
            } else {
                spans.push(Span::styled(display_answer(spec, onboarding.answers.text(spec.id)), base));
            }
            if spec.affix == Affix::PercentSuffix {
                spans.push(Span::styled(" %", Style::default().fg(palette.accent)));
            }
            lines.push(Line::from(spans));
        }
        QuestionKind::Payouts => {
            let rows = onboarding.payout_rows();
            if rows.is_empty() {
                lines.push(Line::from(Span::styled(
                    "No payouts yet. Press Ctrl-A to add one, or Enter to skip.",
                    Style::default().fg(palette.muted),
                )));
            }
            for (row, draft) in rows.iter().enumerate() {
                let mut spans = vec![Span::styled(format!("{:>2}. ", row + 1), base)];
                spans.push(Span::styled(
                    format!("{} ", state.currency.selected.symbol()),
                    Style::default().fg(palette.accent),
                ));
                let amount_target = EditorTarget::Payout {
                    row,
                    field: PayoutField::Amount,
                };
                if !exiting && onboarding.focus == Some(amount_target) {
                    spans.extend(field_spans(&onboarding.editor, true));
                } else {
                    spans.push(Span::styled(placeholder(&format_with_commas(&draft.amount)), base));
                }
                spans.push(Span::styled("  at age ", Style::default().fg(palette.muted)));
                let year_target = EditorTarget::Payout {
                    row,
                    field: PayoutField::Year,
                };
                if !exiting && onboarding.focus == Some(year_target) {
                    spans.extend(field_spans(&onboarding.editor, true));
                } else {
                    spans.push(Span::styled(placeholder(&draft.year), base));
                }
                lines.push(Line::from(spans));
            }
        }
    }

    if !exiting {
        lines.push(Line::from(""));
        if let Some(error) = onboarding.visible_error() {
            lines.push(Line::from(Span::styled(
                error.message(),
                Style::default().fg(palette.danger),
            )));
        }
        if let Some(message) = &onboarding.inline_message {
            lines.push(Line::from(Span::styled(
                message.clone(),
                Style::default().fg(palette.warning),
            )));
        }
        let hint = if onboarding.continue_enabled() {
            Span::styled(
                if onboarding.is_last_question() {
                    "[Enter] Build my plan"
                } else {
                    "[Enter] Continue"
                },
                Style::default().fg(palette.success),
            )
        } else {
            Span::styled("[Enter] Continue", Style::default().fg(palette.muted))
        };
        lines.push(Line::from(hint));
    }

    let border = if exiting { palette.muted } else { palette.accent };
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            panel(format!("Step {}", question_index(spec.id) + 1), palette)
                .border_style(Style::default().fg(border)),
        );
    f.render_widget(p, area);
}

fn display_answer(spec: &QuestionSpec, raw: &str) -> String {
    if spec.formats_with_commas() {
        placeholder(&format_with_commas(raw))
    } else {
        placeholder(raw)
    }
}

fn placeholder(text: &str) -> String {
    if text.is_empty() {
        "___".to_string()
    } else {
        text.to_string()
    }
}

/// Field text with the caret drawn as a reversed cell.
fn field_spans(field: &TextField, focused: bool) -> Vec<Span<'static>> {
    let text = field.text();
    if !focused {
        return vec![Span::raw(text.to_string())];
    }
    let caret = field.caret();
    let before: String = text.chars().take(caret).collect();
    let at: String = text.chars().skip(caret).take(1).collect();
    let after: String = text.chars().skip(caret + 1).collect();
    let caret_style = Style::default().add_modifier(Modifier::REVERSED);
    let text_style = Style::default()
        .fg(Color::White)
        .add_modifier(Modifier::UNDERLINED);
    let mut spans = vec![Span::styled(before, text_style)];
    spans.push(Span::styled(if at.is_empty() { " ".to_string() } else { at }, caret_style));
    if !after.is_empty() {
        spans.push(Span::styled(after, text_style));
    }
    spans
}

fn render_dashboard(f: &mut ratatui::Frame, area: Rect, state: &AppState, palette: UiPalette) {
    let Some(view) = state.dashboard.view.as_ref() else {
        let p = Paragraph::new("No plan loaded.")
            .alignment(Alignment::Center)
            .block(panel("Dashboard", palette));
        f.render_widget(p, area);
        return;
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),      // Cards
            Constraint::Percentage(40), // Charts
            Constraint::Min(0),         // Table and commentary
        ])
        .split(area);

    render_cards(f, rows[0], view, palette);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(50),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(rows[1]);
    render_projection_chart(f, middle[0], view, palette);
    render_gap_chart(f, middle[1], view, palette);
    render_breakdown(f, middle[2], view, palette);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[2]);
    render_table(f, bottom[0], view, state.dashboard.table_scroll, palette);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(bottom[1]);
    render_commentary(f, side[0], view, palette);
    render_summary(f, side[1], state, palette);
}

fn render_cards(f: &mut ratatui::Frame, area: Rect, view: &DashboardView, palette: UiPalette) {
    let count = view.cards.len().max(1) as u32;
    let constraints: Vec<Constraint> = (0..count).map(|_| Constraint::Ratio(1, count)).collect();
    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);
    for (card, cell) in view.cards.iter().zip(cells.iter()) {
        let lines = vec![
            Line::from(Span::styled(
                card.value.clone(),
                Style::default()
                    .fg(tone_color(card.tone, palette))
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                card.subtitle.clone(),
                Style::default().fg(palette.muted),
            )),
        ];
        let p = Paragraph::new(lines).block(panel(card.title, palette));
        f.render_widget(p, *cell);
    }
}

fn axis_labels(bounds: (f64, f64), currency: CurrencyCode) -> Vec<String> {
    let mid = (bounds.0 + bounds.1) / 2.0;
    [bounds.0, mid, bounds.1]
        .iter()
        .map(|value| format_currency_short(*value, currency))
        .collect()
}

fn render_projection_chart(
    f: &mut ratatui::Frame,
    area: Rect,
    view: &DashboardView,
    palette: UiPalette,
) {
    let ages = view.age_bounds();
    let values = view.value_bounds();
    let datasets = vec![
        Dataset::default()
            .name("Projected")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(palette.accent))
            .data(&view.projected_series),
        Dataset::default()
            .name("Target")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(palette.warning))
            .data(&view.target_series),
    ];
    let chart = Chart::new(datasets)
        .block(panel("Net Worth vs Target", palette))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(palette.muted))
                .bounds([ages.0, ages.1])
                .labels(vec![format!("{}", ages.0), format!("{}", ages.1)]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(palette.muted))
                .bounds([values.0, values.1])
                .labels(axis_labels(values, view.currency)),
        );
    f.render_widget(chart, area);
}

fn render_gap_chart(f: &mut ratatui::Frame, area: Rect, view: &DashboardView, palette: UiPalette) {
    let ages = view.age_bounds();
    let gaps = view.gap_bounds();
    let color = view
        .gap_series
        .last()
        .map_or(Color::White, |(_, gap)| tone_color(Tone::for_amount(*gap), palette));
    let datasets = vec![Dataset::default()
        .name("Gap")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(&view.gap_series)];
    let chart = Chart::new(datasets)
        .block(panel("Gap", palette))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(palette.muted))
                .bounds([ages.0, ages.1]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(palette.muted))
                .bounds([gaps.0, gaps.1])
                .labels(axis_labels(gaps, view.currency)),
        );
    f.render_widget(chart, area);
}

fn render_breakdown(f: &mut ratatui::Frame, area: Rect, view: &DashboardView, palette: UiPalette) {
    let width = area.width.saturating_sub(4) as f64;
    let colors = [palette.accent, palette.success, palette.warning];
    let mut lines = Vec::new();
    for (i, slice) in view.breakdown.iter().enumerate() {
        let color = colors[i % colors.len()];
        lines.push(Line::from(vec![
            Span::styled(slice.label, Style::default().fg(color)),
            Span::raw(format!(" {} ({:.0}%)", slice.formatted, slice.share * 100.0)),
        ]));
        let filled = (slice.share.clamp(0.0, 1.0) * width).round() as usize;
        lines.push(Line::from(Span::styled(
            "█".repeat(filled),
            Style::default().fg(color),
        )));
    }
    let p = Paragraph::new(lines).block(panel("Retirement Breakdown", palette));
    f.render_widget(p, area);
}

fn render_table(
    f: &mut ratatui::Frame,
    area: Rect,
    view: &DashboardView,
    scroll: usize,
    palette: UiPalette,
) {
    let header = Row::new(
        PROJECTION_COLUMNS
            .iter()
            .map(|title| Cell::from(*title).style(Style::default().fg(palette.accent))),
    )
    .style(Style::default().add_modifier(Modifier::BOLD));
    let rows = view.rows.iter().skip(scroll).map(|row| {
        let last = row.cells.len().saturating_sub(1);
        Row::new(row.cells.iter().enumerate().map(|(i, cell)| {
            let style = if i == last {
                Style::default().fg(tone_color(row.gap_tone, palette))
            } else {
                Style::default()
            };
            Cell::from(cell.clone()).style(style)
        }))
    });
    let widths = [
        Constraint::Length(5),
        Constraint::Ratio(1, 6),
        Constraint::Ratio(1, 6),
        Constraint::Ratio(1, 6),
        Constraint::Ratio(1, 6),
        Constraint::Ratio(1, 6),
        Constraint::Ratio(1, 6),
    ];
    let title = format!(
        "Projection ({}/{})",
        (scroll + 1).min(view.rows.len()),
        view.rows.len()
    );
    let table = Table::new(rows, widths)
        .header(header)
        .block(panel(title, palette));
    f.render_widget(table, area);
}

fn render_commentary(f: &mut ratatui::Frame, area: Rect, view: &DashboardView, palette: UiPalette) {
    let mut lines = Vec::new();
    for section in &view.commentary {
        lines.push(Line::from(Span::styled(
            section.title,
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(section.intro.clone()));
        for bullet in &section.bullets {
            lines.push(Line::from(format!("  • {bullet}")));
        }
        if let Some(note) = &section.note {
            lines.push(Line::from(Span::styled(
                note.clone(),
                Style::default().fg(palette.muted),
            )));
        }
        lines.push(Line::from(""));
    }
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(panel("Insights", palette));
    f.render_widget(p, area);
}

fn render_summary(f: &mut ratatui::Frame, area: Rect, state: &AppState, palette: UiPalette) {
    let lines = match &state.dashboard.summary {
        SummaryPanel::Idle => vec![Line::from(Span::styled(
            "Press s for an assistant summary of this plan.",
            Style::default().fg(palette.muted),
        ))],
        SummaryPanel::Loading => vec![Line::from(Span::styled(
            format!("{} Summarizing your plan...", spinner(state.clock_ms)),
            Style::default().fg(palette.accent),
        ))],
        SummaryPanel::Ready(text) => markdown_lines(text, Style::default(), palette),
        SummaryPanel::Failed(text) => vec![Line::from(Span::styled(
            text.to_string(),
            Style::default().fg(palette.danger),
        ))],
    };
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(panel("Plan Summary", palette));
    f.render_widget(p, area);
}

fn render_edit_form(f: &mut ratatui::Frame, form: &EditForm, palette: UiPalette) {
    let area = centered_rect(60, 60, f.area());
    f.render_widget(Clear, area);
    let mut lines = Vec::new();
    for (i, entry) in form.fields.iter().enumerate() {
        let focused = i == form.focus;
        let label_style = if focused {
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.muted)
        };
        lines.push(Line::from(Span::styled(entry.label.clone(), label_style)));
        let mut spans = vec![Span::raw("  ")];
        spans.extend(field_spans(&entry.field, focused));
        lines.push(Line::from(spans));
    }
    if !form.payouts.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("{} payout(s) kept from your answers", form.payouts.len()),
            Style::default().fg(palette.muted),
        )));
    }
    if let Some(error) = &form.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(palette.danger),
        )));
    }
    let block = Block::default()
        .title("Edit Plan")
        .borders(Borders::ALL)
        .style(Style::default().bg(palette.panel_bg).fg(Color::White))
        .border_style(Style::default().fg(palette.accent));
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(block);
    f.render_widget(p, area);
}

fn render_rate_editor(f: &mut ratatui::Frame, editor: &RateEditor, palette: UiPalette) {
    let area = centered_rect(40, 20, f.area());
    f.render_widget(Clear, area);
    let mut value = vec![Span::raw(format!("1 {} = ", CurrencyCode::Cad.label()))];
    value.extend(field_spans(&editor.field, true));
    value.push(Span::raw(format!(" {}", editor.code.label())));
    let lines = vec![
        Line::from(""),
        Line::from(value),
        Line::from(""),
        Line::from(Span::styled(
            "Rates are rounded to two decimals; zero keeps the current rate.",
            Style::default().fg(palette.muted),
        )),
    ];
    let block = Block::default()
        .title(format!("Exchange Rate ({})", editor.code.label()))
        .borders(Borders::ALL)
        .style(Style::default().bg(palette.panel_bg).fg(Color::White))
        .border_style(Style::default().fg(palette.warning));
    let p = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(block);
    f.render_widget(p, area);
}

fn render_confirm_restart(f: &mut ratatui::Frame, palette: UiPalette) {
    let area = centered_rect(60, 20, f.area());
    f.render_widget(Clear, area);
    let lines = vec![
        Line::from(""),
        Line::from("Start over? Your plan, answers and chat history will be cleared."),
        Line::from(""),
        Line::from(Span::styled(
            "[Y] Confirm  [N] Cancel",
            Style::default()
                .fg(palette.warning)
                .add_modifier(Modifier::BOLD),
        )),
    ];
    let block = Block::default()
        .title("Restart Planner")
        .borders(Borders::ALL)
        .style(Style::default().bg(palette.panel_bg).fg(Color::White))
        .border_style(Style::default().fg(palette.warning));
    let p = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(block);
    f.render_widget(p, area);
}

fn role_style(role: ChatRole, palette: UiPalette) -> Style {
    match role {
        ChatRole::User => Style::default()
            .fg(palette.accent_alt)
            .add_modifier(Modifier::BOLD),
        ChatRole::Assistant => Style::default()
            .fg(palette.success)
            .add_modifier(Modifier::BOLD),
        ChatRole::Error => Style::default()
            .fg(palette.danger)
            .add_modifier(Modifier::BOLD),
    }
}

fn build_chat_lines(state: &AppState, palette: UiPalette) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for message in state.chat.visible_messages() {
        lines.push(Line::from(Span::styled(
            format!("[{}]", message.role.label()),
            role_style(message.role, palette),
        )));
        match message.role {
            ChatRole::Assistant => {
                lines.extend(markdown_lines(&message.content, Style::default(), palette));
            }
            ChatRole::User => lines.push(Line::from(message.content.to_string())),
            ChatRole::Error => lines.push(Line::from(Span::styled(
                message.content.to_string(),
                Style::default().fg(palette.danger),
            ))),
        }
        lines.push(Line::from(""));
    }
    if state.chat.sending {
        lines.push(Line::from(Span::styled(
            format!("[Copilot {}]", spinner(state.clock_ms)),
            Style::default().fg(palette.muted),
        )));
    }
    lines
}

fn render_chat(f: &mut ratatui::Frame, state: &AppState, palette: UiPalette) {
    let area = centered_rect(70, 80, f.area());
    f.render_widget(Clear, area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // History
            Constraint::Length(3), // Input
            Constraint::Length(1), // Status
        ])
        .split(area);

    let lines = build_chat_lines(state, palette);
    let visible = chunks[0].height.saturating_sub(2) as usize;
    let history = Paragraph::new(lines).wrap(Wrap { trim: false });
    // Wrapped rows, measured before the block adds its border.
    let rows = history.line_count(chunks[0].width.saturating_sub(2));
    let scroll = rows.saturating_sub(visible).min(u16::MAX as usize) as u16;
    let history = history
        .scroll((scroll, 0))
        .block(
            Block::default()
                .title("Plan Copilot")
                .borders(Borders::ALL)
                .style(Style::default().bg(palette.panel_bg).fg(Color::White))
                .border_style(Style::default().fg(palette.accent)),
        );
    f.render_widget(history, chunks[0]);

    let title = if state.chat.sending {
        format!("Message {} (Thinking...)", spinner(state.clock_ms))
    } else {
        "Message".to_string()
    };
    let input = Paragraph::new(Line::from(field_spans(&state.chat.input, true))).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .style(Style::default().bg(palette.panel_bg))
            .border_style(Style::default().fg(palette.border)),
    );
    f.render_widget(input, chunks[1]);

    let status = Paragraph::new(state.chat.status.clone()).style(
        Style::default()
            .fg(palette.muted)
            .bg(palette.panel_bg),
    );
    f.render_widget(status, chunks[2]);
}

/// Renders assistant markdown (headings, lists, emphasis) as styled lines.
fn markdown_lines(content: &str, base: Style, palette: UiPalette) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for block in parse_blocks(content) {
        match block {
            ChatBlock::Heading { inlines, .. } => {
                let style = base.fg(palette.accent).add_modifier(Modifier::BOLD);
                lines.push(Line::from(inline_spans(&inlines, style)));
            }
            ChatBlock::List(items) => {
                for item in items {
                    let mut spans = vec![Span::styled("  • ", base.fg(palette.accent))];
                    spans.extend(inline_spans(&item, base));
                    lines.push(Line::from(spans));
                }
            }
            ChatBlock::Paragraph(inlines) => lines.push(Line::from(inline_spans(&inlines, base))),
        }
    }
    lines
}

fn inline_spans(inlines: &[Inline], style: Style) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    for inline in inlines {
        match inline {
            Inline::Text(text) => spans.push(Span::styled(text.clone(), style)),
            Inline::Emphasis(text) => {
                spans.push(Span::styled(text.clone(), style.add_modifier(Modifier::ITALIC)));
            }
            Inline::Strong(children) => {
                spans.extend(inline_spans(children, style.add_modifier(Modifier::BOLD)));
            }
        }
    }
    spans
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::backend::TestBackend;
    use ratatui::layout::Rect;
    use ratatui::style::Modifier;
    use ratatui::Terminal;

    use retire_core::actions::{AppAction, RuntimeAction};
    use retire_core::field::{FieldFormat, TextField};
    use retire_core::plan::CanonicalPlan;
    use retire_core::reducer::reduce;
    use retire_core::state::{AppState, ChatRole, DashboardOverlay, Screen};

    use super::{
        centered_rect, field_spans, handle_key_event, markdown_lines, palette, ui,
        KeyHandlerResult,
    };
    use pretty_assertions::assert_eq;

    fn press(state: &mut AppState, code: KeyCode) -> bool {
        press_with(state, code, KeyModifiers::NONE)
    }

    fn press_with(state: &mut AppState, code: KeyCode, modifiers: KeyModifiers) -> bool {
        matches!(
            handle_key_event(KeyEvent::new(code, modifiers), state),
            KeyHandlerResult::Continue(_)
        )
    }

    fn screen_text(state: &AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 48)).expect("terminal");
        terminal.draw(|f| ui(f, state)).expect("draw");
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    fn dashboard_state() -> AppState {
        let mut state = AppState::new();
        let plan = CanonicalPlan {
            target_net_worth: 1_500_000.0,
            total_projected_net_worth: 1_200_000.0,
            gap: -300_000.0,
            ..CanonicalPlan::default()
        };
        reduce(&mut state, AppAction::Runtime(RuntimeAction::PlanRestored(plan)));
        state
    }

    #[test]
    fn welcome_enter_starts_onboarding_and_q_quits() {
        let mut state = AppState::new();
        assert!(screen_text(&state).contains("Press Enter to begin"));

        assert!(press(&mut state, KeyCode::Enter));
        assert_eq!(state.screen, Screen::Onboarding);

        let mut fresh = AppState::new();
        assert!(!press(&mut fresh, KeyCode::Char('q')));
    }

    #[test]
    fn ctrl_c_exits_from_any_screen() {
        let mut state = dashboard_state();
        assert!(!press_with(&mut state, KeyCode::Char('c'), KeyModifiers::CONTROL));
    }

    #[test]
    fn typed_digits_reach_the_first_question() {
        let mut state = AppState::new();
        press(&mut state, KeyCode::Enter);
        for ch in "5000".chars() {
            press(&mut state, KeyCode::Char(ch));
        }
        assert_eq!(state.onboarding.editor.text(), "5,000");
        assert!(screen_text(&state).contains("Question 1 of 8"));
    }

    #[test]
    fn dashboard_keys_open_overlays_and_route_typing() {
        let mut state = dashboard_state();
        assert_eq!(state.screen, Screen::Dashboard);

        press(&mut state, KeyCode::Char('a'));
        assert_eq!(state.dashboard.overlay, DashboardOverlay::Chat);
        press(&mut state, KeyCode::Char('q'));
        assert_eq!(state.chat.input.text(), "q");

        press(&mut state, KeyCode::Esc);
        assert_eq!(state.dashboard.overlay, DashboardOverlay::None);

        press(&mut state, KeyCode::Char('e'));
        assert!(matches!(state.dashboard.overlay, DashboardOverlay::EditForm(_)));
        assert!(screen_text(&state).contains("Edit Plan"));
    }

    #[test]
    fn chat_history_follows_wrapped_replies() {
        let mut state = dashboard_state();
        press(&mut state, KeyCode::Char('a'));
        let reply = "Keep saving steadily and revisit the plan each year. ".repeat(12);
        for _ in 0..10 {
            state.chat.push(ChatRole::Assistant, &reply, 0);
        }
        state.chat.push(ChatRole::User, "latest question marker", 0);
        assert!(screen_text(&state).contains("latest question marker"));
    }

    #[test]
    fn restart_waits_for_confirmation() {
        let mut state = dashboard_state();
        press(&mut state, KeyCode::Char('n'));
        assert_eq!(state.dashboard.overlay, DashboardOverlay::ConfirmRestart);
        assert!(screen_text(&state).contains("[Y] Confirm  [N] Cancel"));

        press(&mut state, KeyCode::Char('n'));
        assert_eq!(state.dashboard.overlay, DashboardOverlay::None);
        assert_eq!(state.screen, Screen::Dashboard);
        assert!(state.has_plan());

        press(&mut state, KeyCode::Char('n'));
        press(&mut state, KeyCode::Char('y'));
        assert_eq!(state.screen, Screen::Welcome);
        assert!(!state.has_plan());
    }

    #[test]
    fn dashboard_currency_keys_switch_display_currency() {
        let mut state = dashboard_state();
        press(&mut state, KeyCode::Char('2'));
        assert_eq!(state.currency.selected.label(), "USD");
        press(&mut state, KeyCode::Char('c'));
        assert_eq!(state.currency.selected.label(), "GBP");
    }

    #[test]
    fn caret_is_drawn_reversed() {
        let field = TextField::with_value(FieldFormat::Plain, "ab");
        let spans = field_spans(&field, true);
        assert_eq!(spans[0].content, "ab");
        assert_eq!(spans[1].content, " ");
        assert!(spans[1].style.add_modifier.contains(Modifier::REVERSED));
    }

    #[test]
    fn markdown_becomes_styled_lines() {
        let lines = markdown_lines(
            "## Next steps\n- Save **more** each month\n- Review *yearly*",
            ratatui::style::Style::default(),
            palette(),
        );
        assert_eq!(lines.len(), 3);
        let bold = lines[1]
            .spans
            .iter()
            .find(|span| span.content == "more")
            .expect("strong span");
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
        let italic = lines[2]
            .spans
            .iter()
            .find(|span| span.content == "yearly")
            .expect("emphasis span");
        assert!(italic.style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn centered_rect_stays_inside_parent() {
        let parent = Rect::new(0, 0, 100, 40);
        let popup = centered_rect(60, 50, parent);
        assert!(popup.x >= parent.x && popup.right() <= parent.right());
        assert!(popup.y >= parent.y && popup.bottom() <= parent.bottom());
        assert_eq!(popup.width, 60);
    }
}
