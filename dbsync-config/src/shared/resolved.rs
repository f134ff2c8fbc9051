use serde::Serialize;
use tracing::{debug, info};

use crate::config_error;
use crate::error::{ConfigResult, ErrorKind};
use crate::properties::PropertySource;
use crate::shared::basic::BasicConfig;
use crate::shared::connection::{
    ConnectionConfig, ConnectionConfigWithoutSecrets, ConnectionsConfig,
};
use crate::shared::data_source::resolve_data_sources;
use crate::shared::provider::{ProviderConfig, ProviderRegistry};
use crate::shared::table_map::{TableMap, TableMapAggregator, TableMapSource};

/// Complete configuration of the synchronization service.
///
/// Built once at startup by [`ConfigResolver`] and never modified afterwards. No partially
/// resolved value is ever handed out: either every step succeeds or resolution fails.
///
/// This intentionally does not implement [`Serialize`] to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedConfig {
    pub reporter: String,
    pub report_interval: u64,
    pub transform_pool_size: usize,
    pub changeset_queue_size: usize,
    pub trans_result_queue_size: usize,
    pub merge_pool_size: usize,
    pub merge_interval: u64,
    pub batch_size: usize,
    pub row_cache_size: usize,
    /// Connections available to the loaders, never greater than [`Self::loader_count`].
    pub loader_conn_size: usize,
    pub loader_task_queue_size: usize,
    pub bookkeeping_interval: u64,
    pub bookkeeping_table: String,
    pub target: ConnectionConfig,
    /// Bookkeeping store connection, equal to [`Self::target`] unless configured.
    pub bookkeeping: ConnectionConfig,
    /// Data source names in configuration order.
    pub data_source: Vec<String>,
    /// Provider type of each data source, aligned by index with [`Self::data_source`].
    pub data_source_type: Vec<String>,
    /// Provider configuration of each data source, aligned by index with [`Self::data_source`].
    pub providers: Vec<ProviderConfig>,
    /// Table mappings of all data sources.
    pub table_map: TableMap,
    /// Number of loaders needed for the distinct target tables.
    pub loader_count: usize,
}

impl ResolvedConfig {
    /// Resolves the configuration with the default provider registry.
    pub fn resolve<P, S>(properties: &P, table_maps: &S) -> ConfigResult<Self>
    where
        P: PropertySource,
        S: TableMapSource + ?Sized,
    {
        ConfigResolver::new().resolve(properties, table_maps)
    }

    /// Checks the structural invariants of a resolved configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_source.len() != self.data_source_type.len()
            || self.data_source.len() != self.providers.len()
        {
            return Err(config_error!(
                ErrorKind::InvalidState,
                "Data source names, types and providers are not aligned",
                detail = format!(
                    "{} names, {} types, {} providers",
                    self.data_source.len(),
                    self.data_source_type.len(),
                    self.providers.len()
                )
            ));
        }

        for ((name, tag), provider) in self
            .data_source
            .iter()
            .zip(&self.data_source_type)
            .zip(&self.providers)
        {
            if provider.name() != name || provider.provider_type() != tag {
                return Err(config_error!(
                    ErrorKind::InvalidState,
                    "Provider configuration does not match its data source"
                )
                .with_data_source(name.as_str())
                .with_value(provider.name()));
            }

            for (source_table, target_table) in provider.table_map().iter() {
                if self.table_map.get(source_table) != Some(target_table) {
                    return Err(config_error!(
                        ErrorKind::InvalidState,
                        "Table mapping is missing from the global table map"
                    )
                    .with_data_source(name.as_str())
                    .with_key(source_table)
                    .with_value(target_table));
                }
            }
        }

        if self.loader_conn_size > self.loader_count {
            return Err(config_error!(
                ErrorKind::InvalidState,
                "Loader connection pool exceeds the loader count",
                detail = format!("{} > {}", self.loader_conn_size, self.loader_count)
            ));
        }

        Ok(())
    }

    /// Logs the resolved tunables and the configured data sources.
    pub fn log_config(&self) {
        info!(
            changeset_queue_size = self.changeset_queue_size,
            transform_pool_size = self.transform_pool_size,
            trans_result_queue_size = self.trans_result_queue_size,
            row_cache_size = self.row_cache_size,
            merge_pool_size = self.merge_pool_size,
            merge_interval = self.merge_interval,
            batch_size = self.batch_size,
            loader_conn_size = self.loader_conn_size,
            loader_task_queue_size = self.loader_task_queue_size,
            bookkeeping_interval = self.bookkeeping_interval,
            bookkeeping_table = %self.bookkeeping_table,
            report_interval = self.report_interval,
            "resolved configuration"
        );

        for (name, tag) in self.data_source.iter().zip(&self.data_source_type) {
            info!(data_source = %name, provider_type = %tag, "configured data source");
        }
    }
}

/// Same as [`ResolvedConfig`] but without secrets. This type
/// implements [`Serialize`] because it does not contain secrets
/// so is safe to serialize.
#[derive(Clone, Debug, Serialize)]
pub struct ResolvedConfigWithoutSecrets {
    pub basic: BasicConfig,
    pub target: ConnectionConfigWithoutSecrets,
    pub bookkeeping: ConnectionConfigWithoutSecrets,
    pub data_source: Vec<String>,
    pub data_source_type: Vec<String>,
    pub providers: Vec<ProviderConfig>,
    pub table_map: TableMap,
    pub loader_count: usize,
}

impl From<ResolvedConfig> for ResolvedConfigWithoutSecrets {
    fn from(value: ResolvedConfig) -> Self {
        ResolvedConfigWithoutSecrets {
            basic: BasicConfig {
                reporter: value.reporter,
                report_interval: value.report_interval,
                transform_pool_size: value.transform_pool_size,
                changeset_queue_size: value.changeset_queue_size,
                trans_result_queue_size: value.trans_result_queue_size,
                merge_pool_size: value.merge_pool_size,
                merge_interval: value.merge_interval,
                batch_size: value.batch_size,
                row_cache_size: value.row_cache_size,
                loader_conn_size: value.loader_conn_size,
                loader_task_queue_size: value.loader_task_queue_size,
                bookkeeping_interval: value.bookkeeping_interval,
                bookkeeping_table: value.bookkeeping_table,
            },
            target: value.target.into(),
            bookkeeping: value.bookkeeping.into(),
            data_source: value.data_source,
            data_source_type: value.data_source_type,
            providers: value.providers,
            table_map: value.table_map,
            loader_count: value.loader_count,
        }
    }
}

/// Runs the resolution steps in order and assembles a [`ResolvedConfig`].
///
/// Basic tunables, connections and the data source list are read first. Each data source is
/// then resolved in list order: its provider configuration, then its table mappings. The
/// loader connection pool is finally clamped to the loader count.
#[derive(Clone, Debug, Default)]
pub struct ConfigResolver {
    registry: ProviderRegistry,
}

impl ConfigResolver {
    /// Creates a resolver using the default provider registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver using `registry` to build provider configurations.
    pub fn with_registry(registry: ProviderRegistry) -> Self {
        Self { registry }
    }

    pub fn resolve<P, S>(&self, properties: &P, table_maps: &S) -> ConfigResult<ResolvedConfig>
    where
        P: PropertySource,
        S: TableMapSource + ?Sized,
    {
        let basic = BasicConfig::resolve(properties)?;
        let connections = ConnectionsConfig::resolve(properties)?;
        let data_source = resolve_data_sources(properties)?;

        let mut data_source_type = Vec::with_capacity(data_source.len());
        let mut providers = Vec::with_capacity(data_source.len());
        let mut aggregator = TableMapAggregator::new();

        for name in &data_source {
            let (tag, provider) = self.registry.resolve(properties, name)?;
            let local = aggregator.load_source(table_maps, name)?;

            data_source_type.push(tag);
            providers.push(provider.with_table_map(local));
        }

        let aggregated = aggregator.finish();
        let loader_conn_size = basic.loader_conn_size.min(aggregated.loader_count);
        if loader_conn_size < basic.loader_conn_size {
            debug!(
                configured = basic.loader_conn_size,
                loader_count = aggregated.loader_count,
                "clamped loader connection pool size to the loader count"
            );
        }

        let config = ResolvedConfig {
            reporter: basic.reporter,
            report_interval: basic.report_interval,
            transform_pool_size: basic.transform_pool_size,
            changeset_queue_size: basic.changeset_queue_size,
            trans_result_queue_size: basic.trans_result_queue_size,
            merge_pool_size: basic.merge_pool_size,
            merge_interval: basic.merge_interval,
            batch_size: basic.batch_size,
            row_cache_size: basic.row_cache_size,
            loader_conn_size,
            loader_task_queue_size: basic.loader_task_queue_size,
            bookkeeping_interval: basic.bookkeeping_interval,
            bookkeeping_table: basic.bookkeeping_table,
            target: connections.target,
            bookkeeping: connections.bookkeeping,
            data_source,
            data_source_type,
            providers,
            table_map: aggregated.table_map,
            loader_count: aggregated.loader_count,
        };
        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::properties::{Properties, Subset};
    use crate::shared::provider::MaxwellConfig;

    #[derive(Default)]
    struct InMemoryTableMapSource(HashMap<String, Properties>);

    impl InMemoryTableMapSource {
        fn with(mut self, source: &str, entries: &[(&str, &str)]) -> Self {
            self.0.insert(
                source.to_owned(),
                Properties::from_iter(entries.iter().copied()),
            );
            self
        }
    }

    impl TableMapSource for InMemoryTableMapSource {
        fn load(&self, source_name: &str) -> ConfigResult<Properties> {
            self.0.get(source_name).cloned().ok_or_else(|| {
                config_error!(ErrorKind::SourceLoadFailed, "Failed to open properties file")
            })
        }
    }

    fn minimal_properties() -> Properties {
        Properties::from_iter([
            ("target.url", "jdbc:postgresql://target/db"),
            ("target.user", "gpadmin"),
            ("target.passwd", "secret"),
            ("data_source", "mysql1"),
            ("mysql1.type", "maxwell"),
            ("mysql1.kafka.server", "localhost:9092"),
            ("mysql1.kafka.topic", "maxwell"),
        ])
    }

    fn two_source_properties() -> Properties {
        minimal_properties().with_overrides(Properties::from_iter([
            ("data_source", "mysql1,mysql2"),
            ("mysql2.type", "maxwell"),
            ("mysql2.kafka.server", "localhost:9093"),
            ("mysql2.kafka.topic", "maxwell2"),
            ("loader.conn_pool.size", "10"),
        ]))
    }

    #[test]
    fn test_minimal_configuration() {
        let table_maps = InMemoryTableMapSource::default()
            .with("mysql1", &[("shop.orders", "public.orders"), ("shop.users", "public.users")]);

        let config = ResolvedConfig::resolve(&minimal_properties(), &table_maps).unwrap();

        assert_eq!(config.changeset_queue_size, 2 * config.transform_pool_size);
        assert_eq!(config.trans_result_queue_size, 2 * config.transform_pool_size);
        assert_eq!(config.row_cache_size, 2 * config.batch_size);
        assert_eq!(config.data_source, vec!["mysql1"]);
        assert_eq!(config.data_source_type, vec!["maxwell"]);
        assert_eq!(config.loader_count, 2);
        assert_eq!(config.loader_conn_size, 2);
        assert_eq!(config.bookkeeping, config.target);
        assert_eq!(
            config.table_map.get("mysql1.shop.orders"),
            Some("public.orders")
        );
        assert_eq!(config.providers[0].table_map(), &config.table_map);
    }

    #[test]
    fn test_loader_conn_size_is_never_raised() {
        let props = two_source_properties()
            .with_overrides(Properties::from_iter([("loader.conn_pool.size", "1")]));
        let table_maps = InMemoryTableMapSource::default()
            .with("mysql1", &[("shop.orders", "public.orders")])
            .with("mysql2", &[("crm.users", "public.users")]);

        let config = ResolvedConfig::resolve(&props, &table_maps).unwrap();
        assert_eq!(config.loader_count, 2);
        assert_eq!(config.loader_conn_size, 1);
    }

    #[test]
    fn test_shared_target_table_counts_once() {
        let table_maps = InMemoryTableMapSource::default()
            .with("mysql1", &[("shop.orders", "s.t")])
            .with("mysql2", &[("crm.orders", "s.t")]);

        let config = ResolvedConfig::resolve(&two_source_properties(), &table_maps).unwrap();
        assert_eq!(config.loader_count, 1);
        assert_eq!(config.loader_conn_size, 1);
        assert_eq!(config.table_map.len(), 2);
        assert_eq!(config.providers[1].table_map().get("mysql2.crm.orders"), Some("s.t"));
    }

    #[test]
    fn test_missing_table_map_file_fails() {
        let table_maps = InMemoryTableMapSource::default();

        let err = ResolvedConfig::resolve(&minimal_properties(), &table_maps).unwrap_err();
        assert!(err.kind().is_source_error());
        assert_eq!(err.context().data_source.as_deref(), Some("mysql1"));
    }

    #[test]
    fn test_provider_error_comes_before_table_map_error() {
        let props = minimal_properties()
            .with_overrides(Properties::from_iter([("mysql1.type", "canal")]));

        let err = ResolvedConfig::resolve(&props, &InMemoryTableMapSource::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnrecognizedProviderType);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let table_maps = InMemoryTableMapSource::default()
            .with("mysql1", &[("shop.orders", "public.orders")])
            .with("mysql2", &[("crm.orders", "public.orders"), ("crm.users", "public.users")]);
        let props = two_source_properties();

        let first = ResolvedConfig::resolve(&props, &table_maps).unwrap();
        let second = ResolvedConfig::resolve(&props, &table_maps).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_registry() {
        fn fixed(name: &str, _: &Subset<'_>) -> ConfigResult<ProviderConfig> {
            Ok(ProviderConfig::Maxwell(MaxwellConfig {
                name: name.to_owned(),
                server: "fixed:9092".to_owned(),
                topic: "fixed".to_owned(),
                table_map: TableMap::new(),
            }))
        }

        let mut registry = ProviderRegistry::empty();
        registry.register("maxwell", fixed);
        let table_maps = InMemoryTableMapSource::default().with("mysql1", &[]);

        let config = ConfigResolver::with_registry(registry)
            .resolve(&minimal_properties(), &table_maps)
            .unwrap();
        let ProviderConfig::Maxwell(maxwell) = &config.providers[0];
        assert_eq!(maxwell.server, "fixed:9092");
        assert_eq!(config.loader_count, 0);
        assert_eq!(config.loader_conn_size, 0);
    }

    #[test]
    fn test_validate_rejects_misaligned_sources() {
        let table_maps = InMemoryTableMapSource::default().with("mysql1", &[("a.b", "c.d")]);
        let mut config = ResolvedConfig::resolve(&minimal_properties(), &table_maps).unwrap();

        config.data_source_type.push("maxwell".to_owned());
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_validate_rejects_unclamped_pool() {
        let table_maps = InMemoryTableMapSource::default().with("mysql1", &[("a.b", "c.d")]);
        let mut config = ResolvedConfig::resolve(&minimal_properties(), &table_maps).unwrap();

        config.loader_conn_size = config.loader_count + 1;
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_without_secrets_hides_passwords() {
        let table_maps = InMemoryTableMapSource::default().with("mysql1", &[("a.b", "c.d")]);
        let config = ResolvedConfig::resolve(&minimal_properties(), &table_maps).unwrap();

        let json = serde_json::to_value(ResolvedConfigWithoutSecrets::from(config)).unwrap();
        assert!(!json.to_string().contains("secret"));
        assert_eq!(json["providers"][0]["type"], "maxwell");
        assert_eq!(json["providers"][0]["table_map"]["mysql1.a.b"], "c.d");
        assert_eq!(json["basic"]["loader_conn_size"], 1);
    }
}
