use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::config_error;
use crate::error::{ConfigResult, ErrorKind};
use crate::properties::{KEY_SEPARATOR, Properties};

/// Extension of the per-source table mapping files.
const TABLE_MAP_FILE_EXTENSION: &str = "properties";

/// Mapping from a source-qualified table (`source.schema.table`) to the target table
/// (`schema.table`) it is synchronized into.
///
/// Keys are unique; several keys may map to the same target table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TableMap(BTreeMap<String, String>);

impl TableMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source_table: String, target_table: String) -> Option<String> {
        self.0.insert(source_table, target_table)
    }

    pub fn get(&self, source_table: &str) -> Option<&str> {
        self.0.get(source_table).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(source, target)| (source.as_str(), target.as_str()))
    }

    /// Returns the target tables, each once.
    pub fn target_tables(&self) -> HashSet<&str> {
        self.0.values().map(String::as_str).collect()
    }
}

/// Supplies the raw table mapping entries of a data source.
pub trait TableMapSource {
    /// Loads the `schema.table = schema.table` entries declared for `source_name`.
    fn load(&self, source_name: &str) -> ConfigResult<Properties>;
}

/// Reads table mappings from `<base_dir>/<source_name>.properties`.
#[derive(Clone, Debug)]
pub struct DirectoryTableMapSource {
    base_dir: PathBuf,
}

impl DirectoryTableMapSource {
    /// Directory searched when none is configured.
    pub const DEFAULT_DIR: &'static str = "etc";

    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the file holding the mappings of `source_name`.
    pub fn path_for(&self, source_name: &str) -> PathBuf {
        self.base_dir.join(format!("{source_name}.{TABLE_MAP_FILE_EXTENSION}"))
    }
}

impl Default for DirectoryTableMapSource {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIR)
    }
}

impl TableMapSource for DirectoryTableMapSource {
    fn load(&self, source_name: &str) -> ConfigResult<Properties> {
        Properties::load(self.path_for(source_name))
    }
}

/// Result of aggregating the table mappings of every data source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregatedTableMap {
    /// Union of all per-source mappings.
    pub table_map: TableMap,
    /// Number of loaders needed for the target tables.
    pub loader_count: usize,
}

/// Merges per-source table mappings into a global mapping and counts target tables.
///
/// Sources must be added in data source list order. The loader count grows, for each source,
/// by the number of its mapped entries whose target table was not already claimed by an
/// earlier source. Entries of the same source are not compared with each other, so the count
/// depends on the order in which sources are added.
#[derive(Debug, Default)]
pub struct TableMapAggregator {
    global: TableMap,
    seen_targets: HashSet<String>,
    loader_count: usize,
}

impl TableMapAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the mapping file of `source_name` from `source` and adds it.
    pub fn load_source<S>(&mut self, source: &S, source_name: &str) -> ConfigResult<TableMap>
    where
        S: TableMapSource + ?Sized,
    {
        let entries = source
            .load(source_name)
            .map_err(|err| err.with_data_source(source_name))?;

        self.add_source(source_name, &entries)
    }

    /// Validates the entries of one source and merges them into the global mapping.
    ///
    /// Returns the source's own mapping. Nothing is merged when any entry is malformed.
    pub fn add_source(
        &mut self,
        source_name: &str,
        entries: &Properties,
    ) -> ConfigResult<TableMap> {
        let mut local = TableMap::new();
        for (origin_table, mapped_table) in entries.iter() {
            let origin_table = origin_table.trim();
            let mapped_table = mapped_table.trim();

            if !is_qualified_table(origin_table) || !is_qualified_table(mapped_table) {
                return Err(config_error!(
                    ErrorKind::InvalidTableMapping,
                    "Table mapping entries must have the form `schema.table = schema.table`"
                )
                .with_data_source(source_name)
                .with_key(origin_table)
                .with_value(mapped_table));
            }

            local.insert(
                format!("{source_name}{KEY_SEPARATOR}{origin_table}"),
                mapped_table.to_owned(),
            );
        }

        let new_targets = local
            .0
            .values()
            .filter(|target| !self.seen_targets.contains(*target))
            .count();
        self.loader_count += new_targets;

        for (source_table, target_table) in local.iter() {
            self.seen_targets.insert(target_table.to_owned());
            self.global.insert(source_table.to_owned(), target_table.to_owned());
        }

        debug!(
            data_source = source_name,
            tables = local.len(),
            new_targets,
            loader_count = self.loader_count,
            "merged table mappings"
        );

        Ok(local)
    }

    pub fn loader_count(&self) -> usize {
        self.loader_count
    }

    pub fn finish(self) -> AggregatedTableMap {
        AggregatedTableMap {
            table_map: self.global,
            loader_count: self.loader_count,
        }
    }
}

/// Returns whether `name` has exactly two non-empty dot-separated components.
fn is_qualified_table(name: &str) -> bool {
    let mut parts = name.split(KEY_SEPARATOR);
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(schema), Some(table), None) if !schema.is_empty() && !table.is_empty()
    )
}
