use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5001/";
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const ENV_API_BASE_URL: &str = "RETIRE_API_BASE_URL";
pub const ENV_DATA_DIR: &str = "RETIRE_DATA_DIR";
pub const ENV_LOG: &str = "RETIRE_LOG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// `None` means the platform data directory, resolved by the binary.
    pub data_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: None }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `retire_core=debug`.
    pub level: String,
    /// Log file for the terminal UI; defaults to `<data dir>/retire.log`.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl Config {
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads `path` if it exists; a missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw, path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `RETIRE_*` overrides; blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(base_url) = value(ENV_API_BASE_URL) {
            self.api.base_url = base_url;
        }
        if let Some(dir) = value(ENV_DATA_DIR) {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(level) = value(ENV_LOG) {
            self.logging.level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::path::PathBuf;

    use tempfile::tempdir;

    use super::Config;
    use super::ConfigError;
    use super::DEFAULT_API_BASE_URL;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = Config::from_toml_str(
            "[api]\nbase_url = \"https://plans.example.net/\"\n",
            Path::new("config.toml"),
        )
        .expect("parse");
        assert_eq!(config.api.base_url, "https://plans.example.net/");
        assert_eq!(config.storage.data_dir, None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempdir().expect("tmpdir");
        let config = Config::load(Some(&dir.path().join("absent.toml"))).expect("load");
        assert_eq!(config, Config::default());
        assert_eq!(config.api.base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn malformed_file_is_reported_with_its_path() {
        let dir = tempdir().expect("tmpdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api\nbase_url = 3").expect("write");
        let err = Config::load(Some(&path)).expect_err("should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = Config::from_toml_str(
            "[storage]\ndata_dir = \"/var/lib/retire\"\n[logging]\nlevel = \"warn\"\n",
            Path::new("config.toml"),
        )
        .expect("parse");
        let env: HashMap<&str, &str> = HashMap::from([
            ("RETIRE_API_BASE_URL", "http://10.0.0.2:5001/"),
            ("RETIRE_LOG", "retire_core=debug"),
            ("RETIRE_DATA_DIR", "  "),
        ]);
        config.apply_overrides(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.api.base_url, "http://10.0.0.2:5001/");
        assert_eq!(config.logging.level, "retire_core=debug");
        assert_eq!(
            config.storage.data_dir,
            Some(PathBuf::from("/var/lib/retire"))
        );
    }
}
