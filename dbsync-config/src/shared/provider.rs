use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::config_error;
use crate::error::{ConfigResult, ErrorKind};
use crate::properties::{PropertySource, Subset};
use crate::shared::table_map::TableMap;

/// Key, relative to a data source, holding its provider type tag.
const PROVIDER_TYPE: &str = "type";

/// Provider type tag of Maxwell change streams read from Kafka.
pub const MAXWELL: &str = "maxwell";

const KAFKA: &str = "kafka";
const KAFKA_SERVER: &str = "server";
const KAFKA_TOPIC: &str = "topic";

/// Settings of a data source whose changes are published by Maxwell to a Kafka topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MaxwellConfig {
    /// Name of the data source.
    pub name: String,
    /// Kafka bootstrap servers.
    pub server: String,
    /// Topic Maxwell publishes the change events to.
    pub topic: String,
    /// Table mappings contributed by this data source.
    pub table_map: TableMap,
}

impl MaxwellConfig {
    /// Reads `kafka.server` and `kafka.topic` from the data source's sub-view.
    ///
    /// Both keys are required.
    pub fn resolve(name: &str, properties: &Subset<'_>) -> ConfigResult<ProviderConfig> {
        let kafka = properties.subset(KAFKA);
        let required = |key: &str| {
            kafka.get_string(key).ok_or_else(|| {
                config_error!(
                    ErrorKind::MissingRequiredField,
                    "Missing Kafka setting for Maxwell data source"
                )
                .with_data_source(name)
                .with_key(kafka.qualified_key(key))
            })
        };

        let server = required(KAFKA_SERVER)?;
        let topic = required(KAFKA_TOPIC)?;

        Ok(ProviderConfig::Maxwell(MaxwellConfig {
            name: name.to_owned(),
            server,
            topic,
            table_map: TableMap::new(),
        }))
    }
}

/// Provider specific settings of one data source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    Maxwell(MaxwellConfig),
}

impl ProviderConfig {
    /// Returns the name of the data source.
    pub fn name(&self) -> &str {
        match self {
            ProviderConfig::Maxwell(config) => &config.name,
        }
    }

    /// Returns the type tag this provider is registered under.
    pub fn provider_type(&self) -> &'static str {
        match self {
            ProviderConfig::Maxwell(_) => MAXWELL,
        }
    }

    /// Returns the table mappings contributed by this data source.
    pub fn table_map(&self) -> &TableMap {
        match self {
            ProviderConfig::Maxwell(config) => &config.table_map,
        }
    }

    /// Replaces the table mappings of this data source.
    pub fn with_table_map(self, table_map: TableMap) -> Self {
        match self {
            ProviderConfig::Maxwell(config) => {
                ProviderConfig::Maxwell(MaxwellConfig { table_map, ..config })
            }
        }
    }
}

/// Builds a provider configuration from a data source name and its sub-view.
pub type ProviderParser = fn(&str, &Subset<'_>) -> ConfigResult<ProviderConfig>;

/// Maps provider type tags to the parser building their configuration.
///
/// Supporting a new provider means registering its parser; existing parsers are untouched.
#[derive(Clone)]
pub struct ProviderRegistry {
    parsers: BTreeMap<String, ProviderParser>,
}

impl ProviderRegistry {
    /// Creates a registry without any provider.
    pub fn empty() -> Self {
        Self {
            parsers: BTreeMap::new(),
        }
    }

    /// Registers `parser` for `tag`, returning the parser it replaces, if any.
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        parser: ProviderParser,
    ) -> Option<ProviderParser> {
        self.parsers.insert(tag.into(), parser)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.parsers.contains_key(tag)
    }

    /// Returns the registered tags in sorted order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.parsers.keys().map(String::as_str)
    }

    /// Reads `<name>.type` and builds the configuration with the matching parser.
    ///
    /// Returns the type tag together with the configuration.
    pub fn resolve<P>(&self, properties: &P, name: &str) -> ConfigResult<(String, ProviderConfig)>
    where
        P: PropertySource,
    {
        let source = properties.subset(name);

        let Some(tag) = source.get_string(PROVIDER_TYPE) else {
            return Err(config_error!(
                ErrorKind::MissingRequiredField,
                "Missing provider type for data source"
            )
            .with_data_source(name)
            .with_key(source.qualified_key(PROVIDER_TYPE)));
        };

        let Some(parser) = self.parsers.get(&tag) else {
            let known = self.tags().collect::<Vec<_>>().join(", ");
            return Err(config_error!(
                ErrorKind::UnrecognizedProviderType,
                "Unrecognized provider type for data source",
                detail = format!("supported types are: {known}")
            )
            .with_data_source(name)
            .with_key(source.qualified_key(PROVIDER_TYPE))
            .with_value(tag));
        };

        let config = parser(name, &source)?;
        debug!(data_source = name, provider_type = %tag, "resolved provider configuration");

        Ok((tag, config))
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("tags", &self.tags().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(MAXWELL, MaxwellConfig::resolve);
        registry
    }
}
