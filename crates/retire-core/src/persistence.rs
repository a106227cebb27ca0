use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use super::currency::CurrencyState;
use super::plan::CanonicalPlan;

pub const SESSION_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub version: u8,
    pub saved_at_ms: i64,
    pub plan: CanonicalPlan,
}

/// Last calculated plan, kept under `<data dir>/session/plan.json`.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join("session").join("plan.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing, unreadable or outdated sessions all read as "no plan".
    pub fn load_plan(&self) -> Option<CanonicalPlan> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read session plan");
                return None;
            }
        };
        match serde_json::from_slice::<PersistedSession>(&bytes) {
            Ok(session) if session.version == SESSION_VERSION => Some(session.plan),
            Ok(session) => {
                warn!(version = session.version, "ignoring session plan from another version");
                None
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "session plan is corrupt");
                None
            }
        }
    }

    pub fn save_plan(&self, plan: &CanonicalPlan) -> std::io::Result<()> {
        let session = PersistedSession {
            version: SESSION_VERSION,
            saved_at_ms: chrono::Utc::now().timestamp_millis(),
            plan: plan.clone(),
        };
        let encoded = serde_json::to_vec_pretty(&session)
            .map_err(|err| std::io::Error::other(format!("serialize session: {err}")))?;
        write_private(&self.path, &encoded)?;
        debug!(path = %self.path.display(), "session plan saved");
        Ok(())
    }

    pub fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Durable currency selection and rates, `<data dir>/currency.json`.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join("currency.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: anything unusable in storage falls back to defaults.
    pub fn load(&self) -> CurrencyState {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %err, "failed to read currency state");
                }
                return CurrencyState::default();
            }
        };
        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(value) => CurrencyState::from_value(&value),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "currency state is corrupt");
                CurrencyState::default()
            }
        }
    }

    pub fn save(&self, state: &CurrencyState) -> std::io::Result<()> {
        let encoded = serde_json::to_vec_pretty(state)
            .map_err(|err| std::io::Error::other(format!("serialize currency: {err}")))?;
        write_private(&self.path, &encoded)
    }
}

fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut opts = OpenOptions::new();
    opts.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut file = opts.open(path)?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(())
}
