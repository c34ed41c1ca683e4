//! Purpose: Process-wide settings tree plus the registered-argument table.
//! Exports: `Settings`, `ArgSpec`.
//! Role: Command-line assignments, config-file merge, and help rendering for hosts.
//! Invariants: Command-line values win over config-file values.
//! Invariants: The global instance is safe for concurrent get/set across threads.

use std::path::{Path, PathBuf};
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::core::value::Value;
use crate::json;

#[derive(Clone, Debug)]
pub struct ArgSpec {
    pub name: String,
    pub default: Value,
    pub help: String,
}

pub struct Settings {
    root: Value,
    args: RwLock<Vec<ArgSpec>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    pub fn new() -> Self {
        Self {
            root: Value::object(),
            args: RwLock::new(Vec::new()),
        }
    }

    pub fn global() -> &'static Settings {
        static GLOBAL: OnceLock<Settings> = OnceLock::new();
        GLOBAL.get_or_init(Settings::new)
    }

    pub fn root(&self) -> Value {
        self.root.clone()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.root.get_path(name)
    }

    pub fn get_or(&self, name: &str, default: impl Into<Value>) -> Value {
        let mut root = self.root.clone();
        root.get_or(name, default)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let mut root = self.root.clone();
        // The root is always an object, so a path set cannot fail.
        let _ = root.set_path(name, value);
    }

    pub fn exists(&self, name: &str) -> bool {
        self.root.exists(name)
    }

    /// Registers an argument and returns its current value, installing the
    /// default when absent.
    pub fn arg(&self, name: &str, default: impl Into<Value>, help: &str) -> Value {
        let default = default.into();
        {
            let mut args = self.args.write().unwrap_or_else(PoisonError::into_inner);
            if !args.iter().any(|spec| spec.name == name) {
                args.push(ArgSpec {
                    name: name.to_string(),
                    default: default.clone(),
                    help: help.to_string(),
                });
            }
        }
        self.get_or(name, default)
    }

    /// Consumes `argv` (program path first): `-name value`, `--name value`,
    /// bare `-flag` (true), and `name=value` assignments. Values parse as
    /// JSON literals first and fall back to plain strings. Returns the
    /// tokens that matched nothing, then merges the default config file.
    pub fn parse_args(&self, argv: &[String]) -> Vec<String> {
        let program = argv.first().cloned().unwrap_or_default();
        if !program.is_empty() {
            self.set("__name__", file_name(&program));
        }

        let mut unparsed = Vec::new();
        let mut index = 1;
        while index < argv.len() {
            let token = &argv[index];
            let stripped = token
                .strip_prefix("--")
                .or_else(|| token.strip_prefix('-'));
            match stripped {
                None => {
                    if !self.try_assignment(token) {
                        unparsed.push(token.clone());
                    }
                }
                Some(name) => {
                    if self.try_assignment(name) {
                        index += 1;
                        continue;
                    }
                    match argv.get(index + 1) {
                        Some(next) if !next.starts_with('-') => {
                            self.set_coerced(name, next);
                            index += 1;
                        }
                        _ => self.set(name, true),
                    }
                }
            }
            index += 1;
        }

        self.merge_config_file(&program);
        unparsed
    }

    fn try_assignment(&self, token: &str) -> bool {
        let Some((name, value)) = token.split_once('=') else {
            return false;
        };
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.set_coerced(name, value.trim());
        true
    }

    fn set_coerced(&self, name: &str, raw: &str) {
        match json::parse_str(raw) {
            Ok(value) => self.set(name, value),
            Err(_) => self.set(name, raw),
        }
    }

    fn merge_config_file(&self, program: &str) {
        let explicit = self
            .get("conf")
            .and_then(|v| v.as_str().map(PathBuf::from));
        let candidate = match explicit {
            Some(path) => Some(path),
            None => default_config_candidates(program)
                .into_iter()
                .find(|path| path.exists()),
        };
        let Some(path) = candidate else {
            return;
        };
        match json::load_file(&path) {
            Ok(file_value) => {
                merge_defaults(&self.root, &file_value);
                tracing::debug!(path = %path.display(), "merged config file");
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "skipping config file");
            }
        }
    }

    pub fn arg_specs(&self) -> Vec<ArgSpec> {
        self.args
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Usage line plus a three-column table: name, default and current
    /// value, description. Fixed 80-column layout.
    pub fn help_text(&self) -> String {
        self.arg("conf", "Default.json", "The config file to parse.");
        self.arg("help", false, "Show the help information.");

        let name = self
            .get("__name__")
            .map(|v| v.cast_str())
            .unwrap_or_else(|| "exe".to_string());
        let mut out = format!(
            "Usage:\n{name} [--help] [-conf config_file] [-arg_name arg_value]...\n\n"
        );
        out.push_str(&format_row("Argument", "Type(default->current)", "Description"));
        out.push_str(&format_row("--------", "----------------------", "-----------"));
        for spec in self.arg_specs() {
            let current = self
                .get(&spec.name)
                .unwrap_or_else(|| spec.default.clone());
            let status = format!(
                "{}({}->{})",
                spec.default.kind_name(),
                spec.default,
                current
            );
            out.push_str(&format_row(&format!("-{}", spec.name), &status, &spec.help));
        }
        out
    }
}

const NAME_WIDTH: usize = 15;
const STATUS_WIDTH: usize = 31;
const HELP_WIDTH: usize = 32;

fn format_row(name: &str, status: &str, help: &str) -> String {
    let mut columns = [
        wrap(name, NAME_WIDTH),
        wrap(status, STATUS_WIDTH),
        wrap(help, HELP_WIDTH),
    ];
    let rows = columns.iter().map(Vec::len).max().unwrap_or(1);
    for column in &mut columns {
        while column.len() < rows {
            column.push(String::new());
        }
    }
    let mut out = String::new();
    for row in 0..rows {
        out.push_str(&format!(
            "{:<name$} {:<status$} {}\n",
            columns[0][row],
            columns[1][row],
            columns[2][row],
            name = NAME_WIDTH,
            status = STATUS_WIDTH,
        ));
    }
    out
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    if text.len() <= width {
        return vec![text.to_string()];
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn default_config_candidates(program: &str) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if !program.is_empty() {
        candidates.push(PathBuf::from(format!("{program}.json")));
        candidates.push(PathBuf::from(format!("{program}.cbor")));
    }
    candidates.push(PathBuf::from("Default.json"));
    candidates.push(PathBuf::from("Default.cbor"));
    candidates
}

/// Installs values from `file_value` that the target does not define yet;
/// nested objects merge key by key.
fn merge_defaults(target: &Value, file_value: &Value) {
    for (key, incoming) in file_value.entries() {
        match target.get_item(&key) {
            None => {
                let _ = target.set_item(&key, incoming);
            }
            Some(existing) if existing.is_object() && incoming.is_object() => {
                merge_defaults(&existing, &incoming);
            }
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Settings;
    use crate::core::value::Value;

    fn argv(tokens: &[&str]) -> Vec<String> {
        std::iter::once("svar-test")
            .chain(tokens.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn registered_args_return_defaults() {
        let settings = Settings::new();
        assert_eq!(
            settings.arg("argInt", 100, "sample int"),
            Value::Int(100)
        );
        assert_eq!(
            settings.arg("argDouble", 100.0, "sample double"),
            Value::Float(100.0)
        );
        assert_eq!(
            settings.arg("child.bool", true, "child bool"),
            Value::Bool(true)
        );
    }

    #[test]
    fn flag_pair_and_assignment_forms() {
        let settings = Settings::new();
        let unparsed = settings.parse_args(&argv(&[
            "-argInt", "7", "--argString", "hello", "rate=1.5", "extra", "-verbose",
        ]));
        assert_eq!(settings.get("argInt"), Some(Value::Int(7)));
        assert_eq!(settings.get("argString"), Some(Value::from("hello")));
        assert_eq!(settings.get("rate"), Some(Value::Float(1.5)));
        assert_eq!(settings.get("verbose"), Some(Value::Bool(true)));
        assert_eq!(unparsed, vec!["extra".to_string()]);
    }

    // A dash flag greedily takes the next non-dash token as its value,
    // even when that token is itself a `name=value` assignment.
    #[test]
    fn flag_consumes_following_assignment_token() {
        let settings = Settings::new();
        settings.parse_args(&argv(&["-verbose", "rate=1.5"]));
        assert_eq!(settings.get("verbose"), Some(Value::from("rate=1.5")));
        assert_eq!(settings.get("rate"), None);
    }

    #[test]
    fn json_literals_coerce_and_strings_fall_back() {
        let settings = Settings::new();
        settings.parse_args(&argv(&["-list", "[1,2,3]", "-word", "plain"]));
        assert!(settings.get("list").unwrap().is_array());
        assert_eq!(settings.get("word"), Some(Value::from("plain")));
    }

    #[test]
    fn cli_values_win_over_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("run.json");
        std::fs::write(&conf, r#"{"a": 1, "nested": {"x": 2, "y": 3}}"#).unwrap();

        let settings = Settings::new();
        settings.parse_args(&argv(&[
            "-a",
            "9",
            "-nested.x",
            "8",
            "-conf",
            conf.to_str().unwrap(),
        ]));
        assert_eq!(settings.get("a"), Some(Value::Int(9)));
        assert_eq!(settings.get("nested.x"), Some(Value::Int(8)));
        assert_eq!(settings.get("nested.y"), Some(Value::Int(3)));
    }

    #[test]
    fn help_text_lists_registered_args() {
        let settings = Settings::new();
        settings.arg("argInt", 100, "this is a sample int argument");
        let help = settings.help_text();
        assert!(help.starts_with("Usage:"));
        assert!(help.contains("-argInt"));
        assert!(help.contains("int(100->100)"));
        assert!(help.contains("-conf"));
    }

    #[test]
    fn repeated_help_does_not_duplicate_rows() {
        let settings = Settings::new();
        settings.arg("argInt", 100, "sample int");
        let first = settings.help_text();
        let second = settings.help_text();
        assert_eq!(first, second);
        let conf_rows = settings
            .arg_specs()
            .iter()
            .filter(|spec| spec.name == "conf")
            .count();
        assert_eq!(conf_rows, 1);
    }

    #[test]
    fn global_settings_survive_concurrent_access() {
        let settings = Settings::global();
        settings.set("thread.double", 100.0);
        let readers = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    for _ in 0..500 {
                        let _ = Settings::global().get_or("thread.double", 100.0);
                    }
                })
            })
            .collect::<Vec<_>>();
        let writers = (0..4)
            .map(|i| {
                std::thread::spawn(move || {
                    for step in 0..500 {
                        // Alternate types to exercise replacement, not just update.
                        if step % 2 == 0 {
                            Settings::global().set("thread.double", 10);
                        } else {
                            Settings::global().set("thread.double", i as f64);
                        }
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in readers.into_iter().chain(writers) {
            handle.join().unwrap();
        }
        assert!(Settings::global().get("thread.double").is_some());
    }
}
