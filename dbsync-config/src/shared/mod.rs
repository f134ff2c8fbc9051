//! Shared configuration types of the dbsync service.

mod basic;
mod connection;
mod data_source;
mod provider;
mod resolved;
mod table_map;

pub use basic::BasicConfig;
pub use connection::{
    BOOKKEEPING_PREFIX, ConnectionConfig, ConnectionConfigWithoutSecrets, ConnectionsConfig,
    TARGET_PREFIX,
};
pub use data_source::{DATA_SOURCE, resolve_data_sources};
pub use provider::{MAXWELL, MaxwellConfig, ProviderConfig, ProviderParser, ProviderRegistry};
pub use resolved::{ConfigResolver, ResolvedConfig, ResolvedConfigWithoutSecrets};
pub use table_map::{
    AggregatedTableMap, DirectoryTableMapSource, TableMap, TableMapAggregator, TableMapSource,
};
