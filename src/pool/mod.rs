//! Scheduler, workers and the wave pool that drives them

pub mod scheduler;
pub mod stats;
pub mod wave_pool;
pub mod worker;

pub use scheduler::Scheduler;
pub use stats::{PoolReport, StatsHistory, WaveRecord, WorkerWaitSummary};
pub use wave_pool::{WavePool, WavePoolConfig};
pub use worker::{WaitSample, Worker, WorkerStats};
