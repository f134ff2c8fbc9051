use serde::Serialize;

use crate::error::ConfigResult;
use crate::properties::PropertySource;

const METRICS_REPORTER: &str = "metrics.reporter";
const METRICS_REPORT_INTERVAL: &str = "metrics.reporter.console.interval";
const TRANSFORM_POOL_SIZE: &str = "transform.thread_pool.size";
const MERGE_POOL_SIZE: &str = "merge.thread_pool.size";
const MERGE_INTERVAL: &str = "merge.interval";
const MERGE_BATCH_SIZE: &str = "merge.batch.size";
const LOADER_CONN_POOL_SIZE: &str = "loader.conn_pool.size";
const LOADER_TASK_QUEUE_SIZE: &str = "loader.task_queue.size";
const BOOKKEEPING_INTERVAL: &str = "bookkeeping.interval";
const BOOKKEEPING_TABLE_NAME: &str = "bookkeeping.table_name";

/// Global tunables of the synchronization service.
///
/// Every field has a default; the queue and cache sizes are derived from the pool and batch
/// sizes and cannot be configured directly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BasicConfig {
    /// Kind of metrics reporter, `console` unless configured.
    pub reporter: String,
    /// Seconds between two metric reports.
    pub report_interval: u64,
    /// Number of transform workers.
    pub transform_pool_size: usize,
    /// Capacity of the queue feeding the transform workers.
    pub changeset_queue_size: usize,
    /// Capacity of the queue holding transform results.
    pub trans_result_queue_size: usize,
    /// Number of merge workers.
    pub merge_pool_size: usize,
    /// Milliseconds between two merges.
    pub merge_interval: u64,
    /// Maximum number of rows merged into one batch.
    pub batch_size: usize,
    /// Capacity of the row cache.
    pub row_cache_size: usize,
    /// Connections available to the loaders.
    pub loader_conn_size: usize,
    /// Capacity of each loader's task queue.
    pub loader_task_queue_size: usize,
    /// Milliseconds between two bookkeeping flushes.
    pub bookkeeping_interval: u64,
    /// Table holding the bookkeeping records.
    pub bookkeeping_table: String,
}

impl BasicConfig {
    pub const DEFAULT_REPORTER: &'static str = "console";
    pub const DEFAULT_REPORT_INTERVAL: u64 = 15;
    pub const DEFAULT_TRANSFORM_POOL_SIZE: usize = 10;
    pub const DEFAULT_MERGE_POOL_SIZE: usize = 10;
    pub const DEFAULT_MERGE_INTERVAL: u64 = 10_000;
    pub const DEFAULT_BATCH_SIZE: usize = 50_000;
    pub const DEFAULT_LOADER_CONN_SIZE: usize = 10;
    pub const DEFAULT_LOADER_TASK_QUEUE_SIZE: usize = 2;
    pub const DEFAULT_BOOKKEEPING_INTERVAL: u64 = 10_000;
    pub const DEFAULT_BOOKKEEPING_TABLE: &'static str = "bookkeeping";

    /// Reads the global tunables from the root property source.
    ///
    /// Absent keys take their default. A value that is present but not a valid number fails
    /// with [`crate::error::ErrorKind::InvalidValue`].
    pub fn resolve<P>(properties: &P) -> ConfigResult<Self>
    where
        P: PropertySource,
    {
        let transform_pool_size =
            properties.get_or(TRANSFORM_POOL_SIZE, Self::DEFAULT_TRANSFORM_POOL_SIZE)?;
        let batch_size = properties.get_or(MERGE_BATCH_SIZE, Self::DEFAULT_BATCH_SIZE)?;

        Ok(Self {
            reporter: properties
                .get_string(METRICS_REPORTER)
                .unwrap_or_else(|| Self::DEFAULT_REPORTER.to_owned()),
            report_interval: properties
                .get_or(METRICS_REPORT_INTERVAL, Self::DEFAULT_REPORT_INTERVAL)?,
            transform_pool_size,
            changeset_queue_size: transform_pool_size.saturating_mul(2),
            trans_result_queue_size: transform_pool_size.saturating_mul(2),
            merge_pool_size: properties.get_or(MERGE_POOL_SIZE, Self::DEFAULT_MERGE_POOL_SIZE)?,
            merge_interval: properties.get_or(MERGE_INTERVAL, Self::DEFAULT_MERGE_INTERVAL)?,
            batch_size,
            row_cache_size: batch_size.saturating_mul(2),
            loader_conn_size: properties
                .get_or(LOADER_CONN_POOL_SIZE, Self::DEFAULT_LOADER_CONN_SIZE)?,
            loader_task_queue_size: properties
                .get_or(LOADER_TASK_QUEUE_SIZE, Self::DEFAULT_LOADER_TASK_QUEUE_SIZE)?,
            bookkeeping_interval: properties
                .get_or(BOOKKEEPING_INTERVAL, Self::DEFAULT_BOOKKEEPING_INTERVAL)?,
            bookkeeping_table: properties
                .get_string(BOOKKEEPING_TABLE_NAME)
                .unwrap_or_else(|| Self::DEFAULT_BOOKKEEPING_TABLE.to_owned()),
        })
    }
}
