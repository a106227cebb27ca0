use std::sync::mpsc;
use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;

use retire_client::PlanningBackend;
use retire_core::actions::ChatPurpose;
use retire_core::actions::RuntimeAction;
use retire_core::persistence::PreferenceStore;
use retire_core::persistence::SessionStore;
use retire_core::reducer::AppEffect;

/// Executes reducer effects. Network calls run on their own thread and
/// report back through `tx` as runtime actions.
pub struct EffectRunner {
    backend: Arc<dyn PlanningBackend>,
    sessions: SessionStore,
    preferences: PreferenceStore,
    tx: mpsc::Sender<RuntimeAction>,
}

impl EffectRunner {
    pub fn new(
        backend: Arc<dyn PlanningBackend>,
        sessions: SessionStore,
        preferences: PreferenceStore,
        tx: mpsc::Sender<RuntimeAction>,
    ) -> Self {
        Self {
            backend,
            sessions,
            preferences,
            tx,
        }
    }

    pub fn run_all(&self, effects: Vec<AppEffect>) {
        for effect in effects {
            self.run(effect);
        }
    }

    pub fn run(&self, effect: AppEffect) {
        debug!(effect = effect_label(&effect), "running effect");
        match effect {
            AppEffect::RequestFrame => {}
            AppEffect::SubmitCalculation { origin, request } => {
                let backend = Arc::clone(&self.backend);
                let tx = self.tx.clone();
                std::thread::spawn(move || {
                    let action = match backend.calculate(&request) {
                        Ok(plan) => RuntimeAction::CalculationSucceeded { origin, plan },
                        Err(err) => {
                            warn!(error = %err, "calculation request failed");
                            RuntimeAction::CalculationFailed {
                                origin,
                                failure: err.into(),
                            }
                        }
                    };
                    let _ = tx.send(action);
                });
            }
            AppEffect::SubmitChat {
                purpose,
                message,
                plan,
            } => {
                let backend = Arc::clone(&self.backend);
                let tx = self.tx.clone();
                std::thread::spawn(move || {
                    let action = match backend.chat(&message, &plan) {
                        Ok(reply) => RuntimeAction::ChatReplied { purpose, reply },
                        Err(err) => {
                            warn!(error = %err, summary = purpose == ChatPurpose::Summary, "chat request failed");
                            RuntimeAction::ChatFailed {
                                purpose,
                                failure: err.into(),
                            }
                        }
                    };
                    let _ = tx.send(action);
                });
            }
            AppEffect::PersistPlan(plan) => {
                if let Err(err) = self.sessions.save_plan(&plan) {
                    warn!(error = %err, "failed to persist session plan");
                }
            }
            AppEffect::ClearSession => match self.sessions.clear() {
                Ok(()) => info!("session plan cleared"),
                Err(err) => warn!(error = %err, "failed to clear session plan"),
            },
            AppEffect::PersistCurrency(currency) => {
                if let Err(err) = self.preferences.save(&currency) {
                    warn!(error = %err, "failed to persist currency state");
                }
            }
            AppEffect::CopyToClipboard(text) => match arboard::Clipboard::new() {
                Ok(mut clipboard) => {
                    if let Err(err) = clipboard.set_text(text) {
                        warn!(error = %err, "clipboard write failed");
                    }
                }
                Err(err) => warn!(error = %err, "clipboard unavailable"),
            },
        }
    }
}

fn effect_label(effect: &AppEffect) -> &'static str {
    match effect {
        AppEffect::RequestFrame => "request_frame",
        AppEffect::SubmitCalculation { .. } => "submit_calculation",
        AppEffect::SubmitChat { .. } => "submit_chat",
        AppEffect::PersistPlan(_) => "persist_plan",
        AppEffect::ClearSession => "clear_session",
        AppEffect::PersistCurrency(_) => "persist_currency",
        AppEffect::CopyToClipboard(_) => "copy_to_clipboard",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    use retire_client::BackendError;
    use retire_client::PlanningBackend;
    use retire_core::actions::CalculationOrigin;
    use retire_core::actions::ChatPurpose;
    use retire_core::actions::RuntimeAction;
    use retire_core::chat::ChatFailure;
    use retire_core::currency::CurrencyCode;
    use retire_core::currency::CurrencyState;
    use retire_core::persistence::PreferenceStore;
    use retire_core::persistence::SessionStore;
    use retire_core::plan::CalculationRequest;
    use retire_core::plan::CanonicalPlan;
    use retire_core::reducer::AppEffect;
    use tempfile::tempdir;

    use super::EffectRunner;
    use pretty_assertions::assert_eq;

    struct FakeBackend {
        plan: CanonicalPlan,
    }

    impl PlanningBackend for FakeBackend {
        fn calculate(&self, request: &CalculationRequest) -> Result<CanonicalPlan, BackendError> {
            if request.payouts.iter().any(|payout| payout.year >= request.ideal_retirement_age) {
                return Err(BackendError::Rejected {
                    status: 400,
                    code: Some("payout_after_retirement".to_string()),
                    message: "Payout after retirement".to_string(),
                });
            }
            Ok(self.plan.clone())
        }

        fn chat(&self, message: &str, _plan: &CanonicalPlan) -> Result<String, BackendError> {
            if message.is_empty() {
                return Err(BackendError::Network {
                    endpoint: "api/chat".to_string(),
                    message: "offline".to_string(),
                });
            }
            Ok(format!("echo: {message}"))
        }
    }

    fn plan() -> CanonicalPlan {
        CanonicalPlan {
            gap: -5000.0,
            ..CanonicalPlan::default()
        }
    }

    fn request(payout_year: Option<i64>) -> CalculationRequest {
        CalculationRequest {
            ideal_retirement_income: 5000.0,
            ideal_retirement_age: 65,
            withdrawal_rate: 4.0,
            current_age: 35,
            current_asset_values: 100000.0,
            cagr: 7.0,
            monthly_savings: 1500.0,
            payouts: payout_year
                .map(|year| retire_core::plan::Payout {
                    amount: 1000.0,
                    year,
                })
                .into_iter()
                .collect(),
        }
    }

    fn runner(dir: &std::path::Path) -> (EffectRunner, mpsc::Receiver<RuntimeAction>) {
        let (tx, rx) = mpsc::channel();
        let runner = EffectRunner::new(
            Arc::new(FakeBackend { plan: plan() }),
            SessionStore::open(dir),
            PreferenceStore::open(dir),
            tx,
        );
        (runner, rx)
    }

    fn next(rx: &mpsc::Receiver<RuntimeAction>) -> RuntimeAction {
        rx.recv_timeout(Duration::from_secs(5)).expect("runtime action")
    }

    #[test]
    fn calculation_results_come_back_as_runtime_actions() {
        let dir = tempdir().expect("tmpdir");
        let (runner, rx) = runner(dir.path());

        runner.run(AppEffect::SubmitCalculation {
            origin: CalculationOrigin::Onboarding,
            request: request(None),
        });
        assert_eq!(
            next(&rx),
            RuntimeAction::CalculationSucceeded {
                origin: CalculationOrigin::Onboarding,
                plan: plan(),
            }
        );

        runner.run(AppEffect::SubmitCalculation {
            origin: CalculationOrigin::Recalculate,
            request: request(Some(70)),
        });
        let RuntimeAction::CalculationFailed { origin, failure } = next(&rx) else {
            panic!("expected a failure");
        };
        assert_eq!(origin, CalculationOrigin::Recalculate);
        assert!(failure.is_payout_conflict());
    }

    #[test]
    fn chat_results_keep_their_purpose() {
        let dir = tempdir().expect("tmpdir");
        let (runner, rx) = runner(dir.path());

        runner.run(AppEffect::SubmitChat {
            purpose: ChatPurpose::Summary,
            message: "summarize".to_string(),
            plan: plan(),
        });
        assert_eq!(
            next(&rx),
            RuntimeAction::ChatReplied {
                purpose: ChatPurpose::Summary,
                reply: "echo: summarize".to_string(),
            }
        );

        runner.run(AppEffect::SubmitChat {
            purpose: ChatPurpose::Conversation,
            message: String::new(),
            plan: plan(),
        });
        assert_eq!(
            next(&rx),
            RuntimeAction::ChatFailed {
                purpose: ChatPurpose::Conversation,
                failure: ChatFailure::Network,
            }
        );
    }

    #[test]
    fn storage_effects_write_through_the_stores() {
        let dir = tempdir().expect("tmpdir");
        let (runner, _rx) = runner(dir.path());
        let sessions = SessionStore::open(dir.path());
        let preferences = PreferenceStore::open(dir.path());

        runner.run_all(vec![
            AppEffect::PersistPlan(plan()),
            AppEffect::RequestFrame,
        ]);
        assert_eq!(sessions.load_plan(), Some(plan()));

        runner.run(AppEffect::ClearSession);
        assert_eq!(sessions.load_plan(), None);

        let mut currency = CurrencyState::default();
        currency.set_selected(CurrencyCode::Usd);
        runner.run(AppEffect::PersistCurrency(currency.clone()));
        assert_eq!(preferences.load(), currency);
    }
}
