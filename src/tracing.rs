//! Tracing integration for observability.
//!
//! When the `tracing` feature is enabled, workers run inside a `worker`
//! span and the pool emits the metric events below. They can be consumed by
//! metrics collection systems through any tracing subscriber.
//!
//! # Example
//!
//! ```rust,ignore
//! use rust_wave_pool::prelude::*;
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env()
//!         .add_directive("rust_wave_pool=trace".parse().unwrap()))
//!     .init();
//!
//! let pool = WavePool::new(4, std::time::Duration::from_secs(1))?;
//! ```

/// Metrics recording functions for observability.
pub mod metrics {
    use std::time::Duration;

    /// Records a job entering the scheduler buffer.
    #[inline]
    pub fn record_submission(buffer_depth: usize) {
        tracing::trace!(
            counter.jobs_submitted = 1,
            gauge.buffer_depth = buffer_depth as i64,
            "job buffered"
        );
    }

    /// Records a finished wave.
    #[inline]
    pub fn record_wave(jobs: u64, execution_time: Duration) {
        tracing::debug!(
            counter.waves = 1,
            wave_jobs = jobs,
            histogram.wave_duration_ms = execution_time.as_millis() as u64,
            "wave completed"
        );
    }

    /// Records how long a worker waited for its job.
    #[inline]
    pub fn record_wait(worker_id: usize, wait: Duration) {
        tracing::trace!(
            histogram.worker_wait_ms = wait.as_millis() as u64,
            worker_id = worker_id,
            "worker wait"
        );
    }

    /// Records job completion with timing.
    #[inline]
    pub fn record_completion(duration: Duration, success: bool) {
        let duration_ms = duration.as_millis() as u64;
        if success {
            tracing::trace!(
                counter.jobs_completed = 1,
                histogram.job_duration_ms = duration_ms,
                "job completed successfully"
            );
        } else {
            tracing::trace!(
                counter.jobs_failed = 1,
                histogram.job_duration_ms = duration_ms,
                "job failed"
            );
        }
    }

    /// Records a job panic event.
    #[inline]
    pub fn record_panic(duration: Duration) {
        tracing::trace!(
            counter.jobs_panicked = 1,
            histogram.job_duration_ms = duration.as_millis() as u64,
            "job panicked"
        );
    }

    /// Records worker becoming busy.
    #[inline]
    pub fn record_worker_busy(worker_id: usize) {
        tracing::trace!(gauge.workers_busy = 1, worker_id = worker_id, "worker busy");
    }

    /// Records worker becoming idle.
    #[inline]
    pub fn record_worker_idle(worker_id: usize) {
        tracing::trace!(
            gauge.workers_busy = -1i64,
            worker_id = worker_id,
            "worker idle"
        );
    }

    /// Records pool startup.
    #[inline]
    pub fn record_pool_start(num_workers: usize, interval: Duration) {
        tracing::info!(
            workers = num_workers,
            interval_ms = interval.as_millis() as u64,
            "wave pool started"
        );
    }

    /// Records pool shutdown.
    #[inline]
    pub fn record_pool_shutdown(jobs_executed: usize, waves: usize) {
        tracing::info!(
            jobs_executed = jobs_executed,
            waves = waves,
            "wave pool shutdown complete"
        );
    }
}
