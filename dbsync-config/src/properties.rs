use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::config_error;
use crate::error::{ConfigResult, ErrorKind};

/// Separator between the segments of a dotted property key.
pub const KEY_SEPARATOR: char = '.';

/// Separator for nested key segments in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Flat, string-keyed configuration lookup.
///
/// Keys are dotted paths such as `merge.batch.size`. Sub-views over a dotted prefix are
/// obtained with [`PropertySource::subset`].
pub trait PropertySource {
    /// Returns the raw value stored under `key`.
    fn get(&self, key: &str) -> Option<&str>;

    /// Returns the fully qualified form of `key` as seen from the root source.
    ///
    /// Sub-views prepend their prefix so that errors name the key the user actually wrote.
    fn qualified_key(&self, key: &str) -> String {
        key.to_owned()
    }

    /// Returns an owned copy of the value stored under `key`.
    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_owned)
    }

    /// Parses the value stored under `key`, returning `None` when the key is absent.
    fn get_parsed<T>(&self, key: &str) -> ConfigResult<Option<T>>
    where
        Self: Sized,
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };

        raw.trim().parse::<T>().map(Some).map_err(|err| {
            config_error!(
                ErrorKind::InvalidValue,
                "Failed to parse configuration value",
                detail = err.to_string(),
                source: err
            )
            .with_key(self.qualified_key(key))
            .with_value(raw)
        })
    }

    /// Parses the value stored under `key`, falling back to `default` when the key is absent.
    fn get_or<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        Self: Sized,
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        Ok(self.get_parsed(key)?.unwrap_or(default))
    }

    /// Returns a view in which `prefix.key` is visible as `key`.
    fn subset<'a>(&'a self, prefix: &str) -> Subset<'a>
    where
        Self: Sized,
    {
        Subset::new(self, prefix)
    }
}

/// Dotted-prefix sub-view over another [`PropertySource`].
pub struct Subset<'a> {
    parent: &'a dyn PropertySource,
    prefix: String,
}

impl<'a> Subset<'a> {
    pub fn new(parent: &'a dyn PropertySource, prefix: &str) -> Self {
        Self {
            parent,
            prefix: prefix.to_owned(),
        }
    }

    /// Returns the prefix this view strips from the parent's keys.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn parent_key(&self, key: &str) -> String {
        format!("{}{KEY_SEPARATOR}{key}", self.prefix)
    }
}

impl PropertySource for Subset<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.parent.get(&self.parent_key(key))
    }

    fn qualified_key(&self, key: &str) -> String {
        self.parent.qualified_key(&self.parent_key(key))
    }
}

/// In-memory property set, usually read from a Java-style `.properties` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a `.properties` file.
    ///
    /// The file handle is released before this function returns.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();

        let file = File::open(path).map_err(|err| {
            config_error!(
                ErrorKind::SourceLoadFailed,
                "Failed to open properties file",
                detail = format!("`{}`: {err}", path.display()),
                source: err
            )
        })?;

        let entries = java_properties::read(BufReader::new(file)).map_err(|err| {
            config_error!(
                ErrorKind::SourceLoadFailed,
                "Failed to parse properties file",
                detail = format!("`{}`: {err}", path.display()),
                source: err
            )
        })?;

        Ok(entries.into_iter().collect())
    }

    /// Collects overrides from the process environment.
    ///
    /// See [`Properties::from_vars`] for the naming scheme.
    pub fn from_env(prefix: &str) -> Self {
        Self::from_vars(prefix, std::env::vars_os())
    }

    /// Collects overrides from `NAME=value` pairs whose name starts with `prefix`.
    ///
    /// The prefix is stripped, the rest is lowercased and `__` becomes `.`, so
    /// `DBSYNC_MERGE__BATCH__SIZE` overrides `merge.batch.size`. Pairs that are not valid
    /// Unicode are skipped.
    pub fn from_vars<I, K, V>(prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        vars.into_iter()
            .filter_map(|(name, value)| {
                let name: OsString = name.into();
                let value: OsString = value.into();
                let (Some(name), Some(value)) = (name.to_str(), value.to_str()) else {
                    debug!(
                        name = %name.to_string_lossy(),
                        "skipped environment variable that is not valid unicode"
                    );
                    return None;
                };

                let stripped = name.strip_prefix(prefix)?;
                if stripped.is_empty() {
                    return None;
                }

                let key = stripped
                    .to_lowercase()
                    .replace(ENV_SEPARATOR, &KEY_SEPARATOR.to_string());
                Some((key, value.to_owned()))
            })
            .collect()
    }

    /// Layers `overrides` on top of this set; keys present in both take the override's value.
    pub fn with_overrides(mut self, overrides: Properties) -> Self {
        self.entries.extend(overrides.entries);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Properties
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl PropertySource for Properties {
    fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}
