//! Extension configuration.
//!
//! ```toml
//! [main]
//! threads = 0            # 0 = auto-detect
//! allow_reset = false
//! definitions_dir = "sql_custom"
//!
//! [databases.Database]
//! database = "/var/lib/extdb/game.db"
//!
//! [definitions.inline_example]
//! source = """
//! [getUser]
//! SQL1_1 = "SELECT name FROM users WHERE id = ?"
//! SQL1_INPUTS = "1"
//! """
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::backend::LoginParams;
use crate::error::ExtDbError;

/// What the core needs from the configuration: login parameters and definition text.
pub trait ConfigSource: Send + Sync {
    /// Login parameters for the database section `name`.
    fn database(&self, name: &str) -> Option<LoginParams>;

    /// The call-definition document registered as `name`.
    ///
    /// # Errors
    /// Returns `ExtDbError::ConfigError` when no such definition set exists or it cannot be
    /// read.
    fn call_definitions(&self, name: &str) -> Result<String, ExtDbError>;

    /// Whether the `RESET` administrative command is permitted.
    fn allow_reset(&self) -> bool {
        false
    }

    /// Configured worker thread count; `<= 0` auto-detects.
    fn worker_threads(&self) -> i64 {
        0
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MainSection {
    pub threads: i64,
    pub allow_reset: bool,
    /// Directory searched for `<name>.toml` definition sets not given inline.
    pub definitions_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InlineDefinitions {
    pub source: String,
}

/// The `extdb.toml` document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtensionConfig {
    pub main: MainSection,
    pub databases: HashMap<String, LoginParams>,
    pub definitions: HashMap<String, InlineDefinitions>,
}

impl ExtensionConfig {
    /// Parse a configuration document.
    ///
    /// # Errors
    /// Returns `ExtDbError::ConfigError` when the document is not valid TOML or has wrongly
    /// typed fields.
    pub fn from_toml_str(text: &str) -> Result<Self, ExtDbError> {
        toml::from_str(text).map_err(|err| ExtDbError::ConfigError(err.to_string()))
    }

    /// Read and parse a configuration file. A relative `definitions_dir` is resolved against
    /// the file's directory.
    ///
    /// # Errors
    /// Returns `ExtDbError::ConfigError` when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ExtDbError> {
        let text = fs::read_to_string(path).map_err(|err| {
            ExtDbError::ConfigError(format!("failed to read {}: {err}", path.display()))
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let (Some(dir), Some(parent)) = (&config.main.definitions_dir, path.parent()) {
            if dir.is_relative() {
                config.main.definitions_dir = Some(parent.join(dir));
            }
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_database(mut self, name: impl Into<String>, login: LoginParams) -> Self {
        self.databases.insert(name.into(), login);
        self
    }

    #[must_use]
    pub fn with_definitions(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.definitions.insert(
            name.into(),
            InlineDefinitions {
                source: source.into(),
            },
        );
        self
    }

    #[must_use]
    pub fn with_allow_reset(mut self, allow_reset: bool) -> Self {
        self.main.allow_reset = allow_reset;
        self
    }

    #[must_use]
    pub fn with_threads(mut self, threads: i64) -> Self {
        self.main.threads = threads;
        self
    }
}

impl ConfigSource for ExtensionConfig {
    fn database(&self, name: &str) -> Option<LoginParams> {
        self.databases.get(name).cloned()
    }

    fn call_definitions(&self, name: &str) -> Result<String, ExtDbError> {
        if let Some(inline) = self.definitions.get(name) {
            return Ok(inline.source.clone());
        }
        let Some(dir) = &self.main.definitions_dir else {
            return Err(ExtDbError::ConfigError(format!(
                "no definition set named {name}"
            )));
        };
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(ExtDbError::ConfigError(format!(
                "invalid definition set name {name}"
            )));
        }
        let path = dir.join(format!("{name}.toml"));
        fs::read_to_string(&path).map_err(|err| {
            ExtDbError::ConfigError(format!("failed to read {}: {err}", path.display()))
        })
    }

    fn allow_reset(&self) -> bool {
        self.main.allow_reset
    }

    fn worker_threads(&self) -> i64 {
        self.main.threads
    }
}
