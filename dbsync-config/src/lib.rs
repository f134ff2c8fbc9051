//! Startup configuration of the dbsync change data capture service.
//!
//! A root `.properties` file declares the global tunables, the target and bookkeeping database
//! connections and the list of data sources. Each data source names its provider type and has
//! a table mapping file of its own. [`load_config`] reads all of them and produces an immutable
//! [`ResolvedConfig`], or a [`ConfigError`] describing the first problem found.

mod macros;

pub mod error;
mod load;
mod properties;
pub mod shared;

pub use error::{ConfigError, ConfigResult, ErrorContext, ErrorKind};
pub use load::{load_config, load_config_with};
pub use properties::{KEY_SEPARATOR, Properties, PropertySource, Subset};
pub use shared::{ConfigResolver, ResolvedConfig, ResolvedConfigWithoutSecrets};
