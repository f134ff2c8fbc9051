use std::path::Path;

use tracing::{error, info};

use crate::error::ConfigResult;
use crate::properties::Properties;
use crate::shared::{DirectoryTableMapSource, ResolvedConfig};

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "DBSYNC_";

/// Keys under [`ENV_PREFIX`] owned by other components, never treated as overrides.
///
/// `DBSYNC_ENVIRONMENT` selects the logging mode in `dbsync-telemetry`.
const RESERVED_ENV_KEYS: &[&str] = &["environment"];

/// Loads the root properties file at `path` and resolves the full configuration.
///
/// Table mappings are read from the `etc` directory relative to the working directory.
/// Values from `DBSYNC_`-prefixed environment variables take precedence over the file;
/// nested keys use double underscores (`DBSYNC_MERGE__BATCH__SIZE`). `DBSYNC_ENVIRONMENT` is
/// not an override.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<ResolvedConfig> {
    load_config_with(path, DirectoryTableMapSource::DEFAULT_DIR)
}

/// Same as [`load_config`] but reads the table mapping files from `table_map_dir`.
///
/// Failures are logged before being returned; the caller decides whether to terminate.
pub fn load_config_with(
    path: impl AsRef<Path>,
    table_map_dir: impl AsRef<Path>,
) -> ConfigResult<ResolvedConfig> {
    let path = path.as_ref();
    let table_maps = DirectoryTableMapSource::new(table_map_dir.as_ref());

    let result = Properties::load(path)
        .map(|properties| {
            properties.with_overrides(env_overrides(Properties::from_env(ENV_PREFIX)))
        })
        .and_then(|properties| ResolvedConfig::resolve(&properties, &table_maps));

    match result {
        Ok(config) => {
            info!(path = %path.display(), "loaded configuration");
            config.log_config();

            Ok(config)
        }
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to load configuration");

            Err(err)
        }
    }
}

fn env_overrides(mut overrides: Properties) -> Properties {
    for key in RESERVED_ENV_KEYS {
        overrides.remove(key);
    }

    overrides
}
