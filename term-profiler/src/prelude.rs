//! Prelude for commonly used types and traits in term-profiler.

pub use crate::config::{FailurePolicy, ProfilerConfig};
pub use crate::error::{ColumnError, ColumnErrorKind, ProfileError, Result};
pub use crate::executor::{DataFusionExecutor, ProfileExecutor};
pub use crate::logging::LogConfig;
pub use crate::profiler::{CancellationHandle, ProfilerProgress, TableProfiler};
pub use crate::report::{ColumnStatistics, Diagnostic, ProfileReport};
pub use crate::schema::TableIdentifier;
