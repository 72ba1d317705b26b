use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use toml::Value;
use tracing::warn;

use super::options::{Direction, FieldOption, StripMode, StripPolicy, parse_field_options};

static STATEMENT_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SQL(\d+)_(\d+)$").expect("valid statement part pattern"));
static STATEMENT_INPUTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SQL(\d+)_INPUTS$").expect("valid statement inputs pattern"));

const DEFAULT_SECTION: &str = "Default";

/// One SQL statement of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTemplate {
    pub sql: String,
    pub inputs: Vec<FieldOption>,
}

/// Call-level settings, defaulted from the `[Default]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSettings {
    pub prepared: bool,
    pub return_insert_id: bool,
    pub return_insert_id_string: bool,
    pub retries: u32,
    pub strip: StripPolicy,
    pub literal_parser: bool,
}

impl Default for CallSettings {
    fn default() -> Self {
        Self {
            prepared: true,
            return_insert_id: false,
            return_insert_id_string: false,
            retries: 1,
            strip: StripPolicy::default(),
            literal_parser: false,
        }
    }
}

/// A named, immutable query template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDefinition {
    pub name: String,
    pub statements: Vec<StatementTemplate>,
    pub outputs: Vec<FieldOption>,
    pub settings: CallSettings,
    /// Number of argument tokens a call must supply (the highest input slot referenced).
    pub arity: usize,
}

/// Outcome of loading a definition set. `ok` is false when any diagnostic was raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub ok: bool,
    pub diagnostics: Vec<String>,
}

/// Every call loaded from one definition document.
#[derive(Debug, Clone, Default)]
pub struct CallDefinitions {
    calls: HashMap<String, CallDefinition>,
    version: Option<i64>,
}

impl CallDefinitions {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CallDefinition> {
        self.calls.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// The `Version` declared in `[Default]`, if any.
    #[must_use]
    pub fn version(&self) -> Option<i64> {
        self.version
    }
}

struct Loader {
    diagnostics: Vec<String>,
}

impl Loader {
    fn warn(&mut self, message: String) {
        warn!(diagnostic = %message, "call definition problem");
        self.diagnostics.push(message);
    }

    fn string<'a>(&mut self, section: &str, key: &str, value: &'a Value) -> Option<&'a str> {
        let s = value.as_str();
        if s.is_none() {
            self.warn(format!("[{section}] {key}: expected a string"));
        }
        s
    }

    fn boolean(&mut self, section: &str, key: &str, value: &Value) -> Option<bool> {
        let b = value.as_bool();
        if b.is_none() {
            self.warn(format!("[{section}] {key}: expected true or false"));
        }
        b
    }

    fn integer(&mut self, section: &str, key: &str, value: &Value) -> Option<i64> {
        let i = value.as_integer();
        if i.is_none() {
            self.warn(format!("[{section}] {key}: expected an integer"));
        }
        i
    }

    fn strip_mode(&mut self, section: &str, value: &Value) -> Option<StripMode> {
        let code = self.integer(section, "Strip Chars Mode", value)?;
        let mode = StripMode::from_code(code);
        if mode.is_none() {
            self.warn(format!("[{section}] Strip Chars Mode: {code} is not 0, 1 or 2"));
        }
        mode
    }

    /// Apply a setting shared by `[Default]` and call sections. Returns false for unknown keys.
    fn apply_setting(
        &mut self,
        section: &str,
        key: &str,
        value: &Value,
        settings: &mut CallSettings,
    ) -> bool {
        match key {
            "Strip Chars" => {
                if let Some(chars) = self.string(section, key, value) {
                    settings.strip.chars = chars.to_string();
                }
            }
            "Strip Chars Mode" => {
                if let Some(mode) = self.strip_mode(section, value) {
                    settings.strip.mode = mode;
                }
            }
            "Number of Retrys" | "Number of Retries" => {
                if let Some(retries) = self.integer(section, key, value) {
                    settings.retries = u32::try_from(retries.max(0)).unwrap_or(u32::MAX);
                }
            }
            "Input SQF Parser" => {
                if let Some(enabled) = self.boolean(section, key, value) {
                    settings.literal_parser = enabled;
                }
            }
            _ => return false,
        }
        true
    }

    fn load_call(
        &mut self,
        name: &str,
        table: &toml::Table,
        defaults: &CallSettings,
    ) -> Option<CallDefinition> {
        let mut settings = defaults.clone();
        let mut parts: BTreeMap<usize, BTreeMap<usize, String>> = BTreeMap::new();
        let mut inputs: BTreeMap<usize, String> = BTreeMap::new();
        let mut output = String::new();

        for (key, value) in table {
            if let Some(caps) = STATEMENT_PART.captures(key) {
                let (Ok(statement), Ok(part)) = (caps[1].parse::<usize>(), caps[2].parse::<usize>()) else {
                    self.warn(format!("[{name}] {key}: statement number out of range"));
                    continue;
                };
                if let Some(sql) = self.string(name, key, value) {
                    parts
                        .entry(statement)
                        .or_default()
                        .insert(part, sql.to_string());
                }
                continue;
            }
            if let Some(caps) = STATEMENT_INPUTS.captures(key) {
                let Ok(statement) = caps[1].parse::<usize>() else {
                    self.warn(format!("[{name}] {key}: statement number out of range"));
                    continue;
                };
                if let Some(flags) = self.string(name, key, value) {
                    inputs.insert(statement, flags.to_string());
                }
                continue;
            }
            if self.apply_setting(name, key, value, &mut settings) {
                continue;
            }
            match key.as_str() {
                "OUTPUT" => {
                    if let Some(flags) = self.string(name, key, value) {
                        output = flags.to_string();
                    }
                }
                "Prepared Statement" => {
                    if let Some(b) = self.boolean(name, key, value) {
                        settings.prepared = b;
                    }
                }
                "Return InsertID" => {
                    if let Some(b) = self.boolean(name, key, value) {
                        settings.return_insert_id = b;
                    }
                }
                "Return InsertID String" => {
                    if let Some(b) = self.boolean(name, key, value) {
                        settings.return_insert_id_string = b;
                    }
                }
                _ => self.warn(format!("[{name}] unknown setting {key}")),
            }
        }

        let mut statements = Vec::new();
        let mut arity = 0;
        let mut number = 1;
        while let Some(statement_parts) = parts.remove(&number) {
            let mut sql = Vec::new();
            let mut part = 1;
            while let Some(text) = statement_parts.get(&part) {
                sql.push(text.as_str());
                part += 1;
            }
            if sql.len() != statement_parts.len() {
                self.warn(format!(
                    "[{name}] SQL{number}: parts are not numbered consecutively from 1"
                ));
            }
            let (options, problems) = inputs
                .remove(&number)
                .map(|flags| parse_field_options(&flags, Direction::Input))
                .unwrap_or_default();
            for problem in problems {
                self.warn(format!("[{name}] SQL{number}_INPUTS: {problem}"));
            }
            arity = options
                .iter()
                .map(|o| o.value_number)
                .fold(arity, usize::max);
            statements.push(StatementTemplate {
                sql: sql.join(" "),
                inputs: options,
            });
            number += 1;
        }
        for leftover in parts.keys() {
            self.warn(format!(
                "[{name}] SQL{leftover}: statements are not numbered consecutively from 1"
            ));
        }
        for leftover in inputs.keys() {
            self.warn(format!("[{name}] SQL{leftover}_INPUTS: no matching statement"));
        }
        if statements.is_empty() {
            self.warn(format!("[{name}] defines no SQL statements"));
            return None;
        }

        let (outputs, problems) = parse_field_options(&output, Direction::Output);
        for problem in problems {
            self.warn(format!("[{name}] OUTPUT: {problem}"));
        }

        Some(CallDefinition {
            name: name.to_string(),
            statements,
            outputs,
            settings,
            arity,
        })
    }
}

/// Parse a TOML call definition document.
///
/// Problems are collected rather than fatal: every well-formed call is loaded and the report
/// lists what was skipped or ignored. A document that is not valid TOML loads no calls.
///
/// ```rust
/// use extdb::template::load_definitions;
///
/// let (calls, report) = load_definitions(r#"
/// [getName]
/// SQL1_1 = "SELECT name FROM users"
/// SQL1_2 = "WHERE id = ?"
/// SQL1_INPUTS = "1"
/// OUTPUT = "1-string"
/// "#);
/// assert!(report.ok);
/// assert_eq!(calls.get("getName").unwrap().arity, 1);
/// ```
#[must_use]
pub fn load_definitions(source: &str) -> (CallDefinitions, LoadReport) {
    let mut loader = Loader {
        diagnostics: Vec::new(),
    };
    let document: toml::Table = match toml::from_str(source) {
        Ok(document) => document,
        Err(err) => {
            loader.warn(format!("malformed call definitions: {err}"));
            return (
                CallDefinitions::default(),
                LoadReport {
                    ok: false,
                    diagnostics: loader.diagnostics,
                },
            );
        }
    };

    let mut defaults = CallSettings::default();
    let mut version = None;
    if let Some(section) = document.get(DEFAULT_SECTION) {
        match section.as_table() {
            Some(table) => {
                for (key, value) in table {
                    if loader.apply_setting(DEFAULT_SECTION, key, value, &mut defaults) {
                        continue;
                    }
                    if key == "Version" {
                        version = loader.integer(DEFAULT_SECTION, key, value);
                    } else {
                        loader.warn(format!("[{DEFAULT_SECTION}] unknown setting {key}"));
                    }
                }
            }
            None => loader.warn(format!("{DEFAULT_SECTION} must be a table")),
        }
    }

    let mut calls = HashMap::new();
    for (name, section) in &document {
        if name == DEFAULT_SECTION {
            continue;
        }
        let Some(table) = section.as_table() else {
            loader.warn(format!("{name}: expected a call section"));
            continue;
        };
        if let Some(call) = loader.load_call(name, table, &defaults) {
            calls.insert(name.clone(), call);
        }
    }

    let report = LoadReport {
        ok: loader.diagnostics.is_empty(),
        diagnostics: loader.diagnostics,
    };
    (CallDefinitions { calls, version }, report)
}
