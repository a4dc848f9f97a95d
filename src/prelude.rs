//! Convenient re-exports for common types and traits

pub use crate::core::{BoxedJob, ClosureJob, Job, JobMessage, Result, ThreadError};
pub use crate::pool::{PoolReport, WavePool, WavePoolConfig, WorkerStats};
