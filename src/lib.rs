//! # Rust Wave Pool
//!
//! A batching worker pool: submitted jobs accumulate in a buffer and are
//! released to a fixed set of workers in timed waves, instead of being
//! dispatched one by one as they arrive. Bursty producers are smoothed into
//! periodic batches of predictable size.
//!
//! ## Features
//!
//! - **Wave Scheduling**: A timing thread flushes the buffer every interval,
//!   compensating for the time each wave takes
//! - **Pause / Resume**: Hold waves back without rejecting submissions
//! - **Wait Statistics**: Per-worker average wait and per-wave execution time
//! - **Blocking Queue**: Generic FIFO transport with blocking receive
//! - **Graceful Shutdown**: In-flight waves drain, each worker gets exactly
//!   one stop message, double `join` is harmless
//! - **Fault Tolerance**: Failing or panicking jobs are logged and counted
//!   without taking workers out of the pool
//!
//! ## Quick Start
//!
//! ```rust
//! use rust_wave_pool::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! // Four workers, one wave every 10ms
//! let pool = WavePool::new(4, Duration::from_millis(10))?;
//!
//! for i in 0..10 {
//!     pool.execute(move || {
//!         println!("Job {} executing", i);
//!         Ok(())
//!     })?;
//! }
//!
//! // Drains the buffer, stops the workers and returns the statistics
//! let report = pool.join()?;
//! assert_eq!(report.total_samples, 10);
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use rust_wave_pool::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let config = WavePoolConfig::new(8, Duration::from_millis(50))
//!     .with_thread_name_prefix("ingest")
//!     .with_warmup(false);
//!
//! let pool = WavePool::with_config(config)?;
//! # pool.join()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Flow Control
//!
//! ```rust
//! use rust_wave_pool::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let pool = WavePool::new(1, Duration::from_millis(10))?;
//! pool.pause();
//! pool.execute(|| Ok(()))?;
//!
//! std::thread::sleep(Duration::from_millis(30));
//! assert_eq!(pool.buffer_size(), 1);
//! assert_eq!(pool.queue_size(), 0);
//!
//! pool.unpause();
//! # pool.join()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Jobs
//!
//! ```rust
//! use rust_wave_pool::prelude::*;
//! use std::time::Duration;
//!
//! struct MyJob {
//!     data: String,
//! }
//!
//! impl Job for MyJob {
//!     fn execute(&mut self) -> Result<()> {
//!         println!("Processing: {}", self.data);
//!         Ok(())
//!     }
//!
//!     fn job_type(&self) -> &str {
//!         "MyJob"
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! # let pool = WavePool::new(2, Duration::from_millis(10))?;
//! pool.submit(MyJob {
//!     data: "test".to_string(),
//! })?;
//! # pool.join()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod pool;
pub mod prelude;
pub mod queue;
#[cfg(feature = "tracing")]
pub mod tracing;

pub use crate::core::{BoxedJob, ClosureJob, Job, JobMessage, Result, ThreadError};
pub use crate::pool::{PoolReport, Scheduler, WavePool, WavePoolConfig, WorkerStats};
pub use crate::queue::BlockingQueue;
