// mongo-bridge-core/src/config.rs
//! Bridge configuration
//!
//! Layered with the `config` crate, lowest precedence first:
//! 1. built-in defaults
//! 2. a Java-style properties file (`10gen.properties`)
//! 3. environment (`ED_HOME`, `MONGO_BRIDGE_LOG`)
//! 4. explicit overrides from the command line (applied by the binaries)
//!
//! Property keys are case-folded, so `BASE` in the file is `base` here.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::path::{Path, PathBuf};

use ::config::{Config, ConfigError, Environment, File, FileStoredFormat, Format, Map, Value};

use crate::error::{BridgeError, Result};
use crate::logging::{LogLevel, LOG_ENV_VAR};
use crate::memory::DEFAULT_NAMESPACE;

pub const PROPERTIES_FILE: &str = "10gen.properties";
pub const APPSERVER_HOME_VAR: &str = "ED_HOME";
pub const DEFAULT_DISPLAY_NAME: &str = "Mongo";

const BASE_KEY: &str = "base";
const DB_NAME_KEY: &str = "db_name";
const NAMESPACE_KEY: &str = "namespace";
const LOG_LEVEL_KEY: &str = "log_level";
const APPSERVER_HOME_KEY: &str = "appserver_home";

/// Entries of a `.properties` file
///
/// Follows the Java rules: `key=value`, `key: value` or `key value`;
/// `#` and `!` start comment lines; a trailing odd backslash continues the
/// entry on the next line; `\t`, `\n`, `\r`, `\f` and `\uXXXX` escapes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();
        let mut lines = text.lines().enumerate();

        while let Some((index, raw)) = lines.next() {
            let first = raw.trim_start();
            if first.is_empty() || first.starts_with('#') || first.starts_with('!') {
                continue;
            }
            let lineno = index + 1;

            let mut logical = first.to_string();
            while ends_with_continuation(&logical) {
                logical.pop();
                match lines.next() {
                    Some((_, next)) => logical.push_str(next.trim_start()),
                    None => break,
                }
            }

            let (key, value) = split_entry(&logical);
            let key = unescape(key, lineno)?;
            if key.is_empty() {
                return Err(BridgeError::Configuration(format!(
                    "line {}: empty key",
                    lineno
                )));
            }
            entries.insert(key, unescape(value, lineno)?);
        }
        Ok(Properties { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.entries.iter()
    }
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

/// Split at the first unescaped `=`, `:` or whitespace
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..i], line[i + 1..].trim_start()),
            c if c.is_whitespace() => {
                let rest = line[i..].trim_start();
                let rest = rest.strip_prefix(&['=', ':'][..]).unwrap_or(rest);
                return (&line[..i], rest.trim_start());
            }
            _ => {}
        }
    }
    (line, "")
}

fn unescape(raw: &str, lineno: usize) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{000c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| {
                        BridgeError::Configuration(format!(
                            "line {}: bad unicode escape '\\u{}'",
                            lineno, hex
                        ))
                    })?;
                out.push(decoded);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

/// `.properties` as a `config` file format
#[derive(Debug, Clone, Copy, Default)]
pub struct JavaProperties;

impl Format for JavaProperties {
    fn parse(
        &self,
        uri: Option<&String>,
        text: &str,
    ) -> std::result::Result<Map<String, Value>, Box<dyn StdError + Send + Sync>> {
        let props = Properties::parse(text)?;
        let mut map = Map::new();
        for (key, value) in props.iter() {
            map.insert(key.to_ascii_lowercase(), Value::new(uri, value.clone()));
        }
        Ok(map)
    }
}

impl FileStoredFormat for JavaProperties {
    fn file_extensions(&self) -> &'static [&'static str] {
        &["properties"]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Display name of the database facade
    pub display_name: String,
    /// Prefix of the `_ns` field written by the in-process client
    pub namespace: String,
    /// `BASE` from the properties file
    pub base: Option<PathBuf>,
    /// Appserver root, `ED_HOME`
    pub appserver_home: Option<PathBuf>,
    pub log_level: LogLevel,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            base: None,
            appserver_home: None,
            log_level: LogLevel::Warn,
        }
    }
}

impl BridgeConfig {
    /// Defaults, then `properties` (or `./10gen.properties` if present),
    /// then the process environment.
    ///
    /// An explicitly named properties file must exist; the implicit one is
    /// optional.
    pub fn load(properties: Option<&Path>) -> Result<Self> {
        Self::load_with_env(properties, |var| std::env::var(var).ok())
    }

    /// Same as [`BridgeConfig::load`] with environment variables read
    /// through `lookup`
    pub fn load_with_env<F>(properties: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match properties {
            Some(path) => File::new(&path.to_string_lossy(), JavaProperties).required(true),
            None => File::new(PROPERTIES_FILE, JavaProperties).required(false),
        };

        let settings = Config::builder()
            .set_default(DB_NAME_KEY, DEFAULT_DISPLAY_NAME)?
            .set_default(NAMESPACE_KEY, DEFAULT_NAMESPACE)?
            .set_default(LOG_LEVEL_KEY, LogLevel::Warn.as_str())?
            .add_source(file)
            .add_source(Environment::default().source(Some(env_overrides(lookup))))
            .build()?;

        Self::from_settings(&settings)
    }

    fn from_settings(settings: &Config) -> Result<Self> {
        Ok(BridgeConfig {
            display_name: settings.get_string(DB_NAME_KEY)?,
            namespace: settings.get_string(NAMESPACE_KEY)?,
            base: optional_string(settings, BASE_KEY)?.map(PathBuf::from),
            appserver_home: optional_string(settings, APPSERVER_HOME_KEY)?.map(PathBuf::from),
            log_level: settings.get_string(LOG_LEVEL_KEY)?.parse()?,
        })
    }
}

/// Only the bridge's own variables, renamed to their config keys
fn env_overrides<F>(lookup: F) -> Map<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut vars = Map::new();
    for (var, key) in [
        (APPSERVER_HOME_VAR, APPSERVER_HOME_KEY),
        (LOG_ENV_VAR, LOG_LEVEL_KEY),
    ] {
        if let Some(value) = lookup(var) {
            vars.insert(key.to_string(), value);
        }
    }
    vars
}

fn optional_string(settings: &Config, key: &str) -> Result<Option<String>> {
    match settings.get_string(key) {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn properties_file(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_properties() {
        let props = Properties::parse(
            "# appserver\n\
             BASE=/opt/10gen\n\
             ! legacy comment\n\
             \n\
             DB_NAME : Scripting\n",
        )
        .unwrap();
        assert_eq!(props.get("BASE"), Some("/opt/10gen"));
        assert_eq!(props.get("DB_NAME"), Some("Scripting"));
        assert_eq!(props.get("missing"), None);
    }

    #[test]
    fn test_parse_whitespace_separator() {
        let props = Properties::parse("BASE /opt/10gen\nNAMESPACE\t app\nFLAG\n").unwrap();
        assert_eq!(props.get("BASE"), Some("/opt/10gen"));
        assert_eq!(props.get("NAMESPACE"), Some("app"));
        assert_eq!(props.get("FLAG"), Some(""));
    }

    #[test]
    fn test_parse_continuations_and_escapes() {
        let props = Properties::parse(
            "BASE = /opt/\\\n    10gen\n\
             path\\ with\\ spaces = a\\tb\n\
             DB_NAME=Caf\\u00e9\n\
             trailing = ends in \\\\\n\
             NAMESPACE=app\n",
        )
        .unwrap();
        assert_eq!(props.get("BASE"), Some("/opt/10gen"));
        assert_eq!(props.get("path with spaces"), Some("a\tb"));
        assert_eq!(props.get("DB_NAME"), Some("Café"));
        assert_eq!(props.get("trailing"), Some("ends in \\"));
        assert_eq!(props.get("NAMESPACE"), Some("app"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Properties::parse("=value"),
            Err(BridgeError::Configuration(_))
        ));
        assert!(matches!(
            Properties::parse("DB_NAME=\\u12"),
            Err(BridgeError::Configuration(_))
        ));
    }

    #[test]
    fn test_empty_sources_give_defaults() {
        let file = properties_file("# nothing set\n");
        let config = BridgeConfig::load_with_env(Some(file.path()), no_env).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_layering() {
        let file = properties_file("BASE /srv\nNAMESPACE=app\nLOG_LEVEL=info\n");
        let config = BridgeConfig::load_with_env(Some(file.path()), no_env).unwrap();
        assert_eq!(config.base, Some(PathBuf::from("/srv")));
        assert_eq!(config.namespace, "app");
        assert_eq!(config.log_level, LogLevel::Info);

        let env: HashMap<&str, &str> =
            HashMap::from([(APPSERVER_HOME_VAR, "/home/ed"), (LOG_ENV_VAR, "debug")]);
        let config = BridgeConfig::load_with_env(Some(file.path()), |var| {
            env.get(var).map(|v| v.to_string())
        })
        .unwrap();
        assert_eq!(config.appserver_home, Some(PathBuf::from("/home/ed")));
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.namespace, "app");
        assert_eq!(config.display_name, DEFAULT_DISPLAY_NAME);
    }

    #[test]
    fn test_bad_log_level_in_env() {
        let file = properties_file("");
        let result = BridgeConfig::load_with_env(Some(file.path()), |var| {
            (var == LOG_ENV_VAR).then(|| "chatty".to_string())
        });
        assert!(matches!(result, Err(BridgeError::Configuration(msg)) if msg.contains("chatty")));
    }

    #[test]
    fn test_load_explicit_file() {
        let file = properties_file("BASE=/data/appserver\nDB_NAME=Hosted\n");
        let config = BridgeConfig::load_with_env(Some(file.path()), no_env).unwrap();
        assert_eq!(config.display_name, "Hosted");
        assert_eq!(config.base, Some(PathBuf::from("/data/appserver")));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join(PROPERTIES_FILE);
        assert!(matches!(
            BridgeConfig::load_with_env(Some(&missing), no_env),
            Err(BridgeError::Configuration(_))
        ));
    }

    #[test]
    fn test_malformed_file_is_configuration_error() {
        let file = properties_file("DB_NAME=\\uZZZZ\n");
        assert!(matches!(
            BridgeConfig::load_with_env(Some(file.path()), no_env),
            Err(BridgeError::Configuration(_))
        ));
    }
}
