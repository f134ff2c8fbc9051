use std::fs;
use std::path::PathBuf;

use dbsync_config::shared::{BasicConfig, ProviderConfig};
use dbsync_config::{ErrorKind, ResolvedConfigWithoutSecrets, load_config_with};
use dbsync_telemetry::init_test_tracing;
use secrecy::ExposeSecret;
use tempfile::TempDir;

const ROOT_PROPERTIES: &str = "\
target.url = jdbc:postgresql://greenplum:5432/warehouse
target.user = gpadmin
target.passwd = changeme
data_source = mysql1
mysql1.type = maxwell
mysql1.kafka.server = kafka:9092
mysql1.kafka.topic = maxwell
";

struct ConfigDir {
    dir: TempDir,
}

impl ConfigDir {
    fn new(root: &str) -> Self {
        init_test_tracing();

        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("etc")).unwrap();
        fs::write(dir.path().join("dbsync.properties"), root).unwrap();

        Self { dir }
    }

    fn with_table_map(self, source: &str, content: &str) -> Self {
        fs::write(
            self.table_map_dir().join(format!("{source}.properties")),
            content,
        )
        .unwrap();
        self
    }

    fn root(&self) -> PathBuf {
        self.dir.path().join("dbsync.properties")
    }

    fn table_map_dir(&self) -> PathBuf {
        self.dir.path().join("etc")
    }
}

fn two_sources(extra: &str) -> String {
    format!(
        "{ROOT_PROPERTIES}\
data_source = mysql1, mysql2
mysql2.type = maxwell
mysql2.kafka.server = kafka:9093
mysql2.kafka.topic = maxwell2
{extra}"
    )
}

#[test]
fn minimal_configuration_uses_defaults() {
    let dir = ConfigDir::new(ROOT_PROPERTIES)
        .with_table_map("mysql1", "shop.orders = public.orders\nshop.users = public.users\n");

    let config = load_config_with(dir.root(), dir.table_map_dir()).unwrap();

    assert_eq!(config.reporter, BasicConfig::DEFAULT_REPORTER);
    assert_eq!(config.transform_pool_size, BasicConfig::DEFAULT_TRANSFORM_POOL_SIZE);
    assert_eq!(config.changeset_queue_size, 2 * BasicConfig::DEFAULT_TRANSFORM_POOL_SIZE);
    assert_eq!(config.trans_result_queue_size, 2 * BasicConfig::DEFAULT_TRANSFORM_POOL_SIZE);
    assert_eq!(config.batch_size, BasicConfig::DEFAULT_BATCH_SIZE);
    assert_eq!(config.row_cache_size, 2 * BasicConfig::DEFAULT_BATCH_SIZE);
    assert_eq!(config.bookkeeping_table, BasicConfig::DEFAULT_BOOKKEEPING_TABLE);

    assert_eq!(config.loader_count, 2);
    assert_eq!(config.loader_conn_size, 2);
    assert_eq!(config.data_source, vec!["mysql1"]);
    assert_eq!(config.data_source_type, vec!["maxwell"]);
    assert_eq!(
        config.table_map.get("mysql1.shop.users"),
        Some("public.users")
    );

    assert_eq!(config.bookkeeping, config.target);
    assert_eq!(
        config.target.passwd.as_ref().map(|p| p.expose_secret().as_str()),
        Some("changeme")
    );

    let ProviderConfig::Maxwell(maxwell) = &config.providers[0];
    assert_eq!(maxwell.server, "kafka:9092");
    assert_eq!(maxwell.topic, "maxwell");
}

#[test]
fn derived_sizes_follow_configured_values() {
    let root = format!(
        "{ROOT_PROPERTIES}transform.thread_pool.size = 4\nmerge.batch.size = 1000\n"
    );
    let dir = ConfigDir::new(&root).with_table_map("mysql1", "a.b = c.d\n");

    let config = load_config_with(dir.root(), dir.table_map_dir()).unwrap();
    assert_eq!(config.changeset_queue_size, 8);
    assert_eq!(config.trans_result_queue_size, 8);
    assert_eq!(config.row_cache_size, 2000);
}

#[test]
fn loader_conn_size_is_clamped_to_loader_count() {
    let dir = ConfigDir::new(&two_sources("loader.conn_pool.size = 64\n"))
        .with_table_map("mysql1", "shop.orders = public.orders\n")
        .with_table_map("mysql2", "crm.users = public.users\n");

    let config = load_config_with(dir.root(), dir.table_map_dir()).unwrap();
    assert_eq!(config.loader_count, 2);
    assert_eq!(config.loader_conn_size, 2);
}

#[test]
fn target_shared_by_two_sources_needs_one_loader() {
    let dir = ConfigDir::new(&two_sources(""))
        .with_table_map("mysql1", "shop.orders = s.t\n")
        .with_table_map("mysql2", "crm.orders = s.t\n");

    let config = load_config_with(dir.root(), dir.table_map_dir()).unwrap();
    assert_eq!(config.loader_count, 1);
    assert_eq!(config.loader_conn_size, 1);
    assert_eq!(config.table_map.len(), 2);
}

#[test]
fn missing_target_url_fails() {
    let root = ROOT_PROPERTIES.replace("target.url", "target.uri");
    let dir = ConfigDir::new(&root).with_table_map("mysql1", "a.b = c.d\n");

    let err = load_config_with(dir.root(), dir.table_map_dir()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingRequiredField);
    assert_eq!(err.context().key.as_deref(), Some("target.url"));
}

#[test]
fn explicit_bookkeeping_connection_is_kept() {
    let root = format!("{ROOT_PROPERTIES}bookkeeping.url = jdbc:postgresql://meta:5432/meta\n");
    let dir = ConfigDir::new(&root).with_table_map("mysql1", "a.b = c.d\n");

    let config = load_config_with(dir.root(), dir.table_map_dir()).unwrap();
    assert_eq!(
        config.bookkeeping.jdbc_url.as_deref(),
        Some("jdbc:postgresql://meta:5432/meta")
    );
    assert!(config.bookkeeping.user.is_none());
    assert!(config.bookkeeping.passwd.is_none());
}

#[test]
fn malformed_table_mapping_fails() {
    let dir = ConfigDir::new(ROOT_PROPERTIES).with_table_map("mysql1", "a.b.c = x.y\n");

    let err = load_config_with(dir.root(), dir.table_map_dir()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTableMapping);
    assert_eq!(err.context().data_source.as_deref(), Some("mysql1"));
    assert_eq!(err.context().key.as_deref(), Some("a.b.c"));
}

#[test]
fn missing_table_map_file_fails() {
    let dir = ConfigDir::new(ROOT_PROPERTIES);

    let err = load_config_with(dir.root(), dir.table_map_dir()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceLoadFailed);
    assert_eq!(err.context().data_source.as_deref(), Some("mysql1"));
}

#[test]
fn missing_root_file_fails() {
    let dir = ConfigDir::new(ROOT_PROPERTIES);

    let err = load_config_with(dir.dir.path().join("absent.properties"), dir.table_map_dir())
        .unwrap_err();
    assert!(err.kind().is_source_error());
    assert!(err.to_string().contains("absent.properties"));
}

#[test]
fn unrecognized_provider_type_names_the_source() {
    let root = ROOT_PROPERTIES.replace("mysql1.type = maxwell", "mysql1.type = canal");
    let dir = ConfigDir::new(&root).with_table_map("mysql1", "a.b = c.d\n");

    let err = load_config_with(dir.root(), dir.table_map_dir()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnrecognizedProviderType);
    assert_eq!(err.context().data_source.as_deref(), Some("mysql1"));
    assert!(err.to_string().contains("canal"));
}

#[test]
fn non_numeric_size_fails() {
    let root = format!("{ROOT_PROPERTIES}merge.batch.size = lots\n");
    let dir = ConfigDir::new(&root).with_table_map("mysql1", "a.b = c.d\n");

    let err = load_config_with(dir.root(), dir.table_map_dir()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
    assert_eq!(err.context().key.as_deref(), Some("merge.batch.size"));
    assert_eq!(err.context().value.as_deref(), Some("lots"));
}

#[test]
fn resolution_is_deterministic() {
    let dir = ConfigDir::new(&two_sources("merge.interval = 500\n"))
        .with_table_map("mysql1", "shop.orders = public.orders\nshop.items = public.items\n")
        .with_table_map("mysql2", "crm.orders = public.orders\n");

    let first = load_config_with(dir.root(), dir.table_map_dir()).unwrap();
    let second = load_config_with(dir.root(), dir.table_map_dir()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.merge_interval, 500);
}

#[test]
fn serialized_config_omits_passwords() {
    let dir = ConfigDir::new(ROOT_PROPERTIES).with_table_map("mysql1", "a.b = c.d\n");
    let config = load_config_with(dir.root(), dir.table_map_dir()).unwrap();

    let json = serde_json::to_string(&ResolvedConfigWithoutSecrets::from(config)).unwrap();
    assert!(!json.contains("changeme"));
    assert!(json.contains("gpadmin"));
}
