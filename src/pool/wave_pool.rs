//! Wave pool implementation

use crate::core::{ClosureJob, Job, JobMessage, Result, ThreadError};
use crate::pool::scheduler::Scheduler;
use crate::pool::stats::{PoolReport, StatsHistory, WaveRecord};
use crate::pool::worker::{WaitSample, Worker, WorkerStats};
use crate::queue::BlockingQueue;
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Configuration for a wave pool
#[derive(Clone, Debug)]
pub struct WavePoolConfig {
    /// Number of worker threads, must be positive
    pub num_workers: usize,
    /// Target time between the starts of two consecutive waves, must be non-zero
    pub interval: Duration,
    /// Thread name prefix
    pub thread_name_prefix: String,
    /// Sleep a full interval before the first wave.
    /// Default: true
    ///
    /// With warm-up disabled the first wave runs as soon as the pool starts
    /// and drift-compensated sleeping begins after it.
    pub warmup: bool,
}

impl Default for WavePoolConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get(),
            interval: Duration::from_secs(1),
            thread_name_prefix: "wave-worker".to_string(),
            warmup: true,
        }
    }
}

impl WavePoolConfig {
    /// Create a new configuration with the given worker count and wave interval
    #[must_use]
    pub fn new(num_workers: usize, interval: Duration) -> Self {
        Self {
            num_workers,
            interval,
            ..Default::default()
        }
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Enable or disable the quiet period before the first wave
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_warmup(mut self, warmup: bool) -> Self {
        self.warmup = warmup;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(ThreadError::invalid_config(
                "num_workers",
                "Number of workers must be greater than 0",
            ));
        }
        if self.interval.is_zero() {
            return Err(ThreadError::invalid_config(
                "interval",
                "Wave interval must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Time left to sleep after a wave that took `elapsed`, if any
pub(crate) fn remaining_sleep(interval: Duration, elapsed: Duration) -> Option<Duration> {
    interval
        .checked_sub(elapsed)
        .filter(|remaining| !remaining.is_zero())
}

/// Pushes one stop message per worker when dropped.
///
/// Owned by the timing thread so workers are released exactly once,
/// after the last wave, even if the timing loop unwinds.
struct ReleaseWorkers {
    jobs: Arc<BlockingQueue<JobMessage>>,
    count: usize,
}

impl Drop for ReleaseWorkers {
    fn drop(&mut self) {
        log::debug!("sending {} stop messages", self.count);
        self.jobs.send_all((0..self.count).map(|_| JobMessage::Stop));
    }
}

/// State moved into the timing thread
struct Coordinator {
    scheduler: Arc<Scheduler>,
    jobs: Arc<BlockingQueue<JobMessage>>,
    samples: Arc<BlockingQueue<WaitSample>>,
    history: Arc<Mutex<StatsHistory>>,
    stop: Arc<AtomicBool>,
    wake: Receiver<()>,
    interval: Duration,
    warmup: bool,
    num_workers: usize,
}

impl Coordinator {
    fn run(self) {
        let _release = ReleaseWorkers {
            jobs: Arc::clone(&self.jobs),
            count: self.num_workers,
        };

        if self.warmup {
            self.sleep(self.interval);
        }

        loop {
            let start = Instant::now();
            self.run_wave(start);

            match remaining_sleep(self.interval, start.elapsed()) {
                Some(remaining) => self.sleep(remaining),
                None => thread::yield_now(),
            }

            if self.stop.load(Ordering::Acquire) {
                break;
            }
        }

        // Jobs accepted before the stop request still get their wave
        if self.scheduler.is_ready() && !self.scheduler.is_empty() {
            log::debug!("final wave for {} buffered jobs", self.scheduler.len());
            self.run_wave(Instant::now());
        }
        log::debug!("scheduler is stopping");
    }

    /// Releases one wave and blocks until every job in it has reported back
    fn run_wave(&self, start: Instant) -> u64 {
        let started_at = Utc::now();
        let tasks = self.scheduler.run();

        for _ in 0..tasks {
            let sample = self.samples.receive();
            self.history.lock().record_wait(sample);
        }

        let execution_time = start.elapsed();
        let mut history = self.history.lock();
        let wave = history.record_wave(tasks, execution_time, started_at);
        log::debug!(
            "wave {}: {} jobs processed in {:?}",
            wave.index,
            wave.jobs,
            wave.execution_time
        );
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_wave(wave.jobs, wave.execution_time);

        tasks
    }

    /// Sleeps for `duration` unless a stop request arrives first
    fn sleep(&self, duration: Duration) {
        if self.stop.load(Ordering::Acquire) {
            return;
        }
        // Timeout and wake-up both end the nap; disconnection only happens
        // once the pool is gone and the stop flag is already set.
        let _ = self.wake.recv_timeout(duration);
    }
}

enum Lifecycle {
    Running {
        coordinator: thread::JoinHandle<()>,
        workers: Vec<Worker>,
    },
    Stopped(PoolReport),
}

/// A worker pool that releases submitted jobs in timed waves
///
/// Submitted jobs wait in a [`Scheduler`] buffer. A dedicated timing thread
/// wakes every `interval`, moves the whole buffer onto the job queue, waits
/// until each released job has reported back, records the wave, and sleeps
/// for whatever is left of the interval so wave starts stay on cadence.
///
/// # Shutdown Mechanism
///
/// [`join`](Self::join) raises the stop flag and wakes the timing thread.
/// The timing thread finishes its current wave, runs one last wave for any
/// job accepted before the stop request, then sends exactly one
/// [`JobMessage::Stop`] per worker. Once every worker has exited the
/// statistics are final. Jobs held by a paused scheduler are not released;
/// they are counted in [`PoolReport::abandoned_jobs`].
///
/// # Job faults
///
/// Panicking or failing jobs are caught by the worker, logged and counted;
/// they never take a worker out of the pool.
///
/// # Example
///
/// ```rust
/// use rust_wave_pool::prelude::*;
/// use std::time::Duration;
///
/// # fn main() -> Result<()> {
/// let pool = WavePool::new(2, Duration::from_millis(20))?;
/// for i in 0..3 {
///     pool.execute(move || {
///         println!("job {} running", i);
///         Ok(())
///     })?;
/// }
///
/// let report = pool.join()?;
/// assert_eq!(report.total_samples, 3);
/// # Ok(())
/// # }
/// ```
pub struct WavePool {
    config: WavePoolConfig,
    scheduler: Arc<Scheduler>,
    jobs: Arc<BlockingQueue<JobMessage>>,
    history: Arc<Mutex<StatsHistory>>,
    worker_stats: Vec<Arc<WorkerStats>>,
    stop: Arc<AtomicBool>,
    wake: Sender<()>,
    lifecycle: Mutex<Lifecycle>,
}

impl std::fmt::Debug for WavePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavePool")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .field("queue_size", &self.jobs.len())
            .field("running", &self.is_running())
            .finish()
    }
}

impl WavePool {
    /// Create and start a pool with the given worker count and wave interval
    pub fn new(num_workers: usize, interval: Duration) -> Result<Self> {
        Self::with_config(WavePoolConfig::new(num_workers, interval))
    }

    /// Create and start a pool with custom configuration
    pub fn with_config(config: WavePoolConfig) -> Result<Self> {
        config.validate()?;

        let jobs = Arc::new(BlockingQueue::new());
        let samples = Arc::new(BlockingQueue::new());
        let workers = Self::spawn_workers(&config, &jobs, &samples)?;
        let worker_stats: Vec<_> = workers.iter().map(Worker::stats).collect();

        let scheduler = Arc::new(Scheduler::new(Arc::clone(&jobs)));
        let history = Arc::new(Mutex::new(StatsHistory::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let (wake, wake_rx) = crossbeam_channel::bounded(1);

        let coordinator = Coordinator {
            scheduler: Arc::clone(&scheduler),
            jobs: Arc::clone(&jobs),
            samples,
            history: Arc::clone(&history),
            stop: Arc::clone(&stop),
            wake: wake_rx,
            interval: config.interval,
            warmup: config.warmup,
            num_workers: config.num_workers,
        };

        let spawned = thread::Builder::new()
            .name(format!("{}-scheduler", config.thread_name_prefix))
            .spawn(move || coordinator.run());
        let coordinator = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                Self::release_workers(&jobs, workers);
                return Err(ThreadError::spawn_with_source(
                    config.num_workers,
                    "Cannot create scheduler thread",
                    e,
                ));
            }
        };

        log::info!(
            "wave pool '{}' started with {} workers, interval {:?}",
            config.thread_name_prefix,
            config.num_workers,
            config.interval
        );
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_pool_start(config.num_workers, config.interval);

        Ok(Self {
            config,
            scheduler,
            jobs,
            history,
            worker_stats,
            stop,
            wake,
            lifecycle: Mutex::new(Lifecycle::Running {
                coordinator,
                workers,
            }),
        })
    }

    fn spawn_workers(
        config: &WavePoolConfig,
        jobs: &Arc<BlockingQueue<JobMessage>>,
        samples: &Arc<BlockingQueue<WaitSample>>,
    ) -> Result<Vec<Worker>> {
        let mut workers = Vec::with_capacity(config.num_workers);
        for id in 0..config.num_workers {
            match Worker::new(
                id,
                &config.thread_name_prefix,
                Arc::clone(jobs),
                Arc::clone(samples),
            ) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    Self::release_workers(jobs, workers);
                    return Err(e);
                }
            }
        }
        Ok(workers)
    }

    /// Stops and joins workers that were started before a failed construction
    fn release_workers(jobs: &BlockingQueue<JobMessage>, workers: Vec<Worker>) {
        jobs.send_all(workers.iter().map(|_| JobMessage::Stop));
        for worker in workers {
            let id = worker.id();
            if let Err(e) = worker.join() {
                log::error!("failed to join worker {} after aborted start: {}", id, e);
            }
        }
    }

    /// Submit a job for the next wave
    ///
    /// Never blocks. While the pool runs the job is always accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadError::ShuttingDown`] once `join` or `detach` was called.
    pub fn submit<J: Job + 'static>(&self, job: J) -> Result<()> {
        self.scheduler.schedule(Box::new(job))?;

        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_submission(self.scheduler.len());
        Ok(())
    }

    /// Submit a closure as a job
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.submit(ClosureJob::new(f))
    }

    /// Submit a closure that has no failure path
    pub fn spawn<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute(move || {
            f();
            Ok(())
        })
    }

    /// Hold future waves back; submissions are still accepted
    pub fn pause(&self) {
        self.scheduler.pause();
    }

    /// Resume releasing waves
    pub fn unpause(&self) {
        self.scheduler.unpause();
    }

    /// Whether wave releases are currently held back
    pub fn is_paused(&self) -> bool {
        !self.scheduler.is_ready()
    }

    /// Whether no released job is waiting for a worker
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Released jobs waiting for a worker
    pub fn queue_size(&self) -> usize {
        self.jobs.len()
    }

    /// Whether no job is waiting for the next wave
    pub fn is_buffer_empty(&self) -> bool {
        self.scheduler.is_empty()
    }

    /// Jobs waiting for the next wave
    pub fn buffer_size(&self) -> usize {
        self.scheduler.len()
    }

    /// Number of worker threads
    pub fn num_workers(&self) -> usize {
        self.config.num_workers
    }

    /// Configured wave interval
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// Whether no stop has been requested yet
    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Acquire)
    }

    /// Get total jobs submitted
    pub fn total_jobs_submitted(&self) -> u64 {
        self.scheduler.accepted()
    }

    /// Get per-worker statistics, indexed by worker id
    pub fn worker_stats(&self) -> Vec<Arc<WorkerStats>> {
        self.worker_stats.clone()
    }

    /// Get total jobs executed across all workers, whatever their outcome
    pub fn total_jobs_executed(&self) -> u64 {
        self.worker_stats.iter().map(|s| s.get_jobs_executed()).sum()
    }

    /// Waves recorded so far
    pub fn waves(&self) -> Vec<WaveRecord> {
        self.history.lock().waves().to_vec()
    }

    /// Current statistics
    ///
    /// After shutdown this is the final report; before it, a live snapshot
    /// with `complete == false`.
    pub fn stats(&self) -> PoolReport {
        if let Some(lifecycle) = self.lifecycle.try_lock() {
            if let Lifecycle::Stopped(report) = &*lifecycle {
                return report.clone();
            }
        }
        self.build_report(false)
    }

    /// Shutdown the pool and wait for every thread to finish
    ///
    /// Returns the final statistics. Calling it again, from any thread,
    /// returns the same report without signalling anything a second time.
    pub fn join(&self) -> Result<PoolReport> {
        let mut lifecycle = self.lifecycle.lock();
        let (coordinator, workers) = match std::mem::replace(
            &mut *lifecycle,
            Lifecycle::Stopped(PoolReport::default()),
        ) {
            Lifecycle::Running {
                coordinator,
                workers,
            } => (coordinator, workers),
            Lifecycle::Stopped(report) => {
                *lifecycle = Lifecycle::Stopped(report.clone());
                return Ok(report);
            }
        };

        self.request_stop();

        let mut first_error = None;
        if coordinator.join().is_err() {
            log::error!("scheduler thread panicked");
            first_error = Some(ThreadError::join(
                self.config.num_workers,
                "Scheduler thread panicked",
            ));
        }
        for worker in workers {
            if let Err(e) = worker.join() {
                log::error!("{}", e);
                first_error.get_or_insert(e);
            }
        }

        let report = self.build_report(true);
        *lifecycle = Lifecycle::Stopped(report.clone());
        self.log_shutdown(&report);

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Shutdown the pool without waiting for its threads
    ///
    /// The threads still drain the in-flight wave and stop on their own.
    /// The returned report is whatever had been collected at the time of
    /// the call and is marked incomplete.
    pub fn detach(&self) -> Result<PoolReport> {
        let mut lifecycle = self.lifecycle.lock();
        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped(PoolReport::default())) {
            Lifecycle::Running {
                coordinator,
                workers,
            } => {
                self.request_stop();
                drop(coordinator);
                for worker in workers {
                    worker.detach();
                }
                let report = self.build_report(false);
                *lifecycle = Lifecycle::Stopped(report.clone());
                self.log_shutdown(&report);
                Ok(report)
            }
            Lifecycle::Stopped(report) => {
                *lifecycle = Lifecycle::Stopped(report.clone());
                Ok(report)
            }
        }
    }

    /// Sets the stop flag once and wakes the timing thread
    ///
    /// The scheduler is closed first: once the timing thread sees the flag,
    /// no job can enter the buffer behind its final flush.
    fn request_stop(&self) {
        self.scheduler.close();
        if !self.stop.swap(true, Ordering::AcqRel) {
            let _ = self.wake.try_send(());
            log::debug!("stop requested for '{}'", self.config.thread_name_prefix);
        }
    }

    fn build_report(&self, complete: bool) -> PoolReport {
        self.history.lock().report(
            self.total_jobs_submitted(),
            self.abandoned_jobs(complete),
            complete,
        )
    }

    /// Jobs that will never reach a worker
    ///
    /// While the timing thread may still run, a ready scheduler gets its
    /// final flush, so only a stopped pool with a paused scheduler has
    /// abandoned anything.
    fn abandoned_jobs(&self, complete: bool) -> usize {
        if complete || (!self.is_running() && !self.scheduler.is_ready()) {
            self.scheduler.len()
        } else {
            0
        }
    }

    fn log_shutdown(&self, report: &PoolReport) {
        if report.abandoned_jobs > 0 {
            log::warn!(
                "{} jobs left in the paused buffer of '{}'",
                report.abandoned_jobs,
                self.config.thread_name_prefix
            );
        }
        log::info!(
            "wave pool '{}' stopped after {} waves, {} jobs executed",
            self.config.thread_name_prefix,
            report.waves,
            report.total_samples
        );
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_pool_shutdown(report.total_samples, report.waves);
    }
}

impl Drop for WavePool {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(e) = self.join() {
                log::error!(
                    "failed to shutdown wave pool '{}' during drop: {}",
                    self.config.thread_name_prefix,
                    e
                );
            }
        }
    }
}
