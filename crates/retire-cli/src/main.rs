mod effects;
mod ui;

use std::env;
use std::fs;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::sync::Mutex;

use tracing::info;
use tracing_subscriber::EnvFilter;

use retire_client::HttpBackend;
use retire_client::PlanningBackend;
use retire_core::actions::AppAction;
use retire_core::actions::RuntimeAction;
use retire_core::answers::Answers;
use retire_core::chat::format_chat_html;
use retire_core::chat::format_chat_plain;
use retire_core::config::Config;
use retire_core::convert::convert;
use retire_core::currency::format_rate;
use retire_core::currency::CurrencyCode;
use retire_core::dashboard::build_dashboard;
use retire_core::dashboard::DashboardView;
use retire_core::persistence::PreferenceStore;
use retire_core::persistence::SessionStore;
use retire_core::reducer::reduce;
use retire_core::state::AppState;
use retire_core::submission::build_request;
use retire_core::submission::to_base_currency;
use retire_core::submission::CalculationFailure;

use crate::effects::EffectRunner;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Ui,
    Calculate { answers: PathBuf },
    Ask { message: String, html: bool },
    Currency {
        code: Option<CurrencyCode>,
        rate: Option<String>,
    },
    Reset,
    Help,
    Version,
}

#[derive(Debug, Clone, PartialEq)]
struct Invocation {
    config: Option<PathBuf>,
    command: Command,
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let invocation = match parse_args(env::args().skip(1).collect()) {
        Ok(invocation) => invocation,
        Err(err) => {
            print_help();
            return Err(err.into());
        }
    };
    match invocation.command {
        Command::Help => {
            print_help();
            return Ok(());
        }
        Command::Version => {
            println!("retire {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(invocation.config.as_deref())?;
    let data_dir = resolve_data_dir(&config);
    let ui_mode = invocation.command == Command::Ui;
    init_logging(&config, &data_dir, ui_mode);
    info!(data_dir = %data_dir.display(), api = %config.api.base_url, "starting retire");

    match invocation.command {
        Command::Ui => run_ui(&config, &data_dir),
        Command::Calculate { answers } => calculate(&config, &data_dir, &answers),
        Command::Ask { message, html } => ask(&config, &data_dir, &message, html),
        Command::Currency { code, rate } => currency(&data_dir, code, rate.as_deref()),
        Command::Reset => {
            SessionStore::open(&data_dir).clear()?;
            println!("session plan cleared");
            Ok(())
        }
        Command::Help | Command::Version => Ok(()),
    }
}

fn parse_args(args: Vec<String>) -> Result<Invocation, String> {
    let mut config = None;
    let mut rest = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--config" {
            let Some(value) = args.get(i + 1) else {
                return Err("--config requires a path".to_string());
            };
            config = Some(PathBuf::from(value));
            i += 2;
        } else {
            rest.push(args[i].clone());
            i += 1;
        }
    }

    let mut rest = rest.into_iter();
    let command = match rest.next().as_deref() {
        None | Some("ui") => Command::Ui,
        Some("--help" | "-h" | "help") => Command::Help,
        Some("--version" | "-V" | "version") => Command::Version,
        Some("calculate") => {
            let args: Vec<String> = rest.by_ref().collect();
            match args.as_slice() {
                [flag, path] if flag == "--answers" => Command::Calculate {
                    answers: PathBuf::from(path),
                },
                _ => return Err("calculate requires --answers FILE".to_string()),
            }
        }
        Some("ask") => {
            let mut html = false;
            let mut words = Vec::new();
            for arg in rest.by_ref() {
                if arg == "--html" {
                    html = true;
                } else {
                    words.push(arg);
                }
            }
            let message = words.join(" ");
            if message.trim().is_empty() {
                return Err("ask requires a message".to_string());
            }
            Command::Ask { message, html }
        }
        Some("currency") => {
            let mut code = None;
            let mut rate = None;
            while let Some(arg) = rest.next() {
                if arg == "--rate" {
                    let Some(value) = rest.next() else {
                        return Err("--rate requires a value".to_string());
                    };
                    rate = Some(value);
                } else if code.is_none() {
                    code = Some(CurrencyCode::parse(&arg).ok_or_else(|| {
                        format!("unknown currency: {arg} (expected CAD, USD or GBP)")
                    })?);
                } else {
                    return Err(format!("unsupported argument: {arg}"));
                }
            }
            Command::Currency { code, rate }
        }
        Some("reset") => Command::Reset,
        Some(other) => return Err(format!("unknown command: {other}")),
    };
    if let Some(extra) = rest.next() {
        return Err(format!("unsupported argument: {extra}"));
    }
    Ok(Invocation { config, command })
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("retire").join("config.toml"))
}

fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = path.map(Path::to_path_buf).or_else(default_config_path);
    let mut config = Config::load(path.as_deref())?;
    config.apply_env();
    Ok(config)
}

fn resolve_data_dir(config: &Config) -> PathBuf {
    config
        .storage
        .data_dir
        .clone()
        .or_else(|| dirs::data_dir().map(|dir| dir.join("retire")))
        .unwrap_or_else(|| PathBuf::from(".retire"))
}

/// UI mode logs to a file so output never lands on the alternate screen.
fn init_logging(config: &Config, data_dir: &Path, ui_mode: bool) {
    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    if !ui_mode {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
        return;
    }
    let path = config
        .logging
        .file
        .clone()
        .unwrap_or_else(|| data_dir.join("retire.log"));
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        Err(err) => eprintln!("warning: logging disabled, cannot open {}: {err}", path.display()),
    }
}

fn backend(config: &Config) -> Result<Arc<dyn PlanningBackend>, Box<dyn std::error::Error>> {
    Ok(Arc::new(HttpBackend::new(&config.api.base_url)?))
}

fn run_ui(config: &Config, data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let sessions = SessionStore::open(data_dir);
    let preferences = PreferenceStore::open(data_dir);
    let mut state = AppState::new();

    reduce(
        &mut state,
        AppAction::Runtime(RuntimeAction::CurrencyLoaded(preferences.load())),
    );
    if let Some(plan) = sessions.load_plan() {
        reduce(&mut state, AppAction::Runtime(RuntimeAction::PlanRestored(plan)));
    }

    let (tx, rx) = mpsc::channel();
    let runner = EffectRunner::new(backend(config)?, sessions, preferences, tx);
    ui::run(state, runner, rx)
}

fn calculate(config: &Config, data_dir: &Path, answers_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let raw = fs::read_to_string(answers_path)
        .map_err(|err| format!("failed to read {}: {err}", answers_path.display()))?;
    let answers: Answers = serde_json::from_str(&raw)
        .map_err(|err| format!("invalid answers in {}: {err}", answers_path.display()))?;
    let currency = PreferenceStore::open(data_dir).load();
    let request = to_base_currency(build_request(&answers)?, currency.active_rate());
    info!(payouts = request.payouts.len(), "submitting answers");

    let plan = backend(config)?
        .calculate(&request)
        .map_err(|err| match CalculationFailure::from(err) {
            CalculationFailure::PayoutAfterRetirement { message } => {
                format!("{message}; payouts must happen before the retirement age")
            }
            other => other.message().to_string(),
        })?;
    SessionStore::open(data_dir).save_plan(&plan)?;

    let display = convert(&plan, currency.active_rate());
    print_dashboard(&build_dashboard(&display, currency.selected));
    Ok(())
}

fn ask(config: &Config, data_dir: &Path, message: &str, html: bool) -> Result<(), Box<dyn std::error::Error>> {
    let Some(plan) = SessionStore::open(data_dir).load_plan() else {
        return Err("no saved plan; run `retire calculate` or complete onboarding first".into());
    };
    let currency = PreferenceStore::open(data_dir).load();
    let display = convert(&plan, currency.active_rate());
    let reply = backend(config)?.chat(message, &display)?;
    if html {
        println!("{}", format_chat_html(&reply));
    } else {
        println!("{}", format_chat_plain(&reply));
    }
    Ok(())
}

fn currency(data_dir: &Path, code: Option<CurrencyCode>, rate: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let store = PreferenceStore::open(data_dir);
    let mut state = store.load();
    if let Some(code) = code {
        state.set_selected(code);
    }
    if let Some(raw) = rate {
        let stored = state.set_rate(state.selected, raw);
        info!(currency = state.selected.label(), rate = stored, "exchange rate updated");
    }
    if code.is_some() || rate.is_some() {
        store.save(&state)?;
    }
    for code in CurrencyCode::ALL {
        let marker = if code == state.selected { "*" } else { " " };
        println!("{marker} {} {}", code.label(), format_rate(state.rate(code)));
    }
    Ok(())
}

fn print_dashboard(view: &DashboardView) {
    for card in &view.cards {
        println!("{:<24} {:>16}  {}", card.title, card.value, card.subtitle);
    }
    println!();
    for slice in &view.breakdown {
        println!(
            "{:<16} {:>16}  {:>5.1}%",
            slice.label,
            slice.formatted,
            slice.share * 100.0
        );
    }
    for section in &view.commentary {
        println!();
        println!("{}", section.title);
        println!("  {}", section.intro);
        for bullet in &section.bullets {
            println!("  • {bullet}");
        }
        if let Some(note) = &section.note {
            println!("  {note}");
        }
    }
}

fn print_help() {
    println!("retire - retirement planner");
    println!();
    println!("Usage:");
    println!("  retire [ui]                          open the terminal planner");
    println!("  retire calculate --answers FILE      submit answers (JSON keyed by question id)");
    println!("  retire ask MESSAGE [--html]          ask the plan assistant about the saved plan");
    println!("  retire currency [CODE] [--rate R]    show or change the display currency");
    println!("  retire reset                         clear the saved plan");
    println!();
    println!("Options:");
    println!("  --config PATH    config file (default: <config dir>/retire/config.toml)");
    println!("  -h, --help       show this help");
    println!("  -V, --version    show the version");
    println!();
    println!("Environment: RETIRE_API_BASE_URL, RETIRE_DATA_DIR, RETIRE_LOG");
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use retire_core::currency::CurrencyCode;

    use super::parse_args;
    use super::Command;
    use super::Invocation;
    use pretty_assertions::assert_eq;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn no_arguments_opens_the_ui() {
        assert_eq!(
            parse_args(Vec::new()),
            Ok(Invocation {
                config: None,
                command: Command::Ui,
            })
        );
    }

    #[test]
    fn config_flag_is_accepted_anywhere() {
        let parsed = parse_args(args(&["calculate", "--config", "/tmp/retire.toml", "--answers", "a.json"]))
            .expect("parse");
        assert_eq!(parsed.config, Some(PathBuf::from("/tmp/retire.toml")));
        assert_eq!(
            parsed.command,
            Command::Calculate {
                answers: PathBuf::from("a.json")
            }
        );
    }

    #[test]
    fn ask_joins_words_and_reads_html_flag() {
        let parsed = parse_args(args(&["ask", "can", "I", "retire", "--html", "early?"])).expect("parse");
        assert_eq!(
            parsed.command,
            Command::Ask {
                message: "can I retire early?".to_string(),
                html: true,
            }
        );
        assert!(parse_args(args(&["ask", "--html"])).is_err());
    }

    #[test]
    fn currency_accepts_code_and_rate() {
        let parsed = parse_args(args(&["currency", "usd", "--rate", "0.75"])).expect("parse");
        assert_eq!(
            parsed.command,
            Command::Currency {
                code: Some(CurrencyCode::Usd),
                rate: Some("0.75".to_string()),
            }
        );
        assert!(parse_args(args(&["currency", "EUR"])).is_err());
        assert!(parse_args(args(&["currency", "--rate"])).is_err());
    }

    #[test]
    fn unknown_commands_and_stray_arguments_fail() {
        assert!(parse_args(args(&["launch"])).is_err());
        assert!(parse_args(args(&["reset", "now"])).is_err());
        assert!(parse_args(args(&["calculate"])).is_err());
    }
}
