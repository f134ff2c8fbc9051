//! Logging setup shared by the dbsync binaries and tests.

mod environment;
mod tracing;

pub use environment::Environment;
pub use self::tracing::{
    DEFAULT_LOG_DIR, LogFlusher, TracingError, init_test_tracing, init_tracing, init_tracing_in,
};
