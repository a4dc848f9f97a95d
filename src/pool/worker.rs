//! Worker thread implementation

use crate::core::{BoxedJob, JobMessage, Result, ThreadError};
use crate::queue::BlockingQueue;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use tracing::{span, Level};

/// How long a worker sat blocked before a job reached it.
///
/// Sent by the worker to the stats queue right after the job ran, one
/// sample per executed job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct WaitSample {
    /// Worker that waited
    pub worker_id: usize,
    /// Time spent inside the blocking receive
    pub wait: Duration,
}

/// Statistics for a worker thread
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Total number of jobs that completed successfully
    pub jobs_processed: AtomicU64,
    /// Total number of jobs that returned an error
    pub jobs_failed: AtomicU64,
    /// Total number of jobs that panicked
    pub jobs_panicked: AtomicU64,
    /// Total time spent processing jobs (microseconds)
    pub total_processing_time_us: AtomicU64,
    /// Total time spent blocked waiting for jobs (microseconds)
    pub total_wait_time_us: AtomicU64,
}

impl WorkerStats {
    /// Create new worker statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment jobs processed counter
    pub fn increment_processed(&self) {
        self.jobs_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment jobs failed counter
    pub fn increment_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment jobs panicked counter
    pub fn increment_panicked(&self) {
        self.jobs_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Add processing time
    pub fn add_processing_time(&self, microseconds: u64) {
        self.total_processing_time_us
            .fetch_add(microseconds, Ordering::Relaxed);
    }

    /// Add wait time
    pub fn add_wait_time(&self, microseconds: u64) {
        self.total_wait_time_us
            .fetch_add(microseconds, Ordering::Relaxed);
    }

    /// Get total jobs processed
    pub fn get_jobs_processed(&self) -> u64 {
        self.jobs_processed.load(Ordering::Relaxed)
    }

    /// Get total jobs failed
    pub fn get_jobs_failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::Relaxed)
    }

    /// Get total jobs panicked
    pub fn get_jobs_panicked(&self) -> u64 {
        self.jobs_panicked.load(Ordering::Relaxed)
    }

    /// Jobs executed regardless of outcome
    pub fn get_jobs_executed(&self) -> u64 {
        self.get_jobs_processed() + self.get_jobs_failed() + self.get_jobs_panicked()
    }

    /// Get average processing time per executed job in microseconds
    pub fn get_average_processing_time_us(&self) -> f64 {
        let total = self.total_processing_time_us.load(Ordering::Relaxed);
        let count = self.get_jobs_executed();
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Get average wait per executed job in microseconds
    pub fn get_average_wait_time_us(&self) -> f64 {
        let total = self.total_wait_time_us.load(Ordering::Relaxed);
        let count = self.get_jobs_executed();
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }
}

/// A worker thread that executes jobs released by the scheduler
///
/// The loop blocks on the job queue, runs each job it receives, and
/// reports a [`WaitSample`] for it. It leaves the loop after consuming
/// exactly one [`JobMessage::Stop`].
///
/// # Job faults
///
/// A job returning `Err` is logged and counted as failed. A panicking
/// job is caught, logged and counted as panicked. Either way the worker
/// keeps running and still reports its wait sample, so one bad job can
/// neither shrink the pool nor stall the wave that released it.
#[derive(Debug)]
pub struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Create and start a new worker
    ///
    /// # Arguments
    ///
    /// * `id` - Identifier used to key wait samples
    /// * `name_prefix` - Thread name prefix; the thread is named `{prefix}-{id}`
    /// * `jobs` - Queue the worker takes jobs from
    /// * `samples` - Queue the worker reports wait samples to
    pub fn new(
        id: usize,
        name_prefix: &str,
        jobs: Arc<BlockingQueue<JobMessage>>,
        samples: Arc<BlockingQueue<WaitSample>>,
    ) -> Result<Self> {
        let stats = Arc::new(WorkerStats::new());
        let stats_clone = Arc::clone(&stats);

        let thread = thread::Builder::new()
            .name(format!("{}-{}", name_prefix, id))
            .spawn(move || {
                Self::run(id, jobs, samples, stats_clone);
            })
            .map_err(|e| ThreadError::spawn_with_source(id, "Cannot create worker thread", e))?;

        Ok(Self {
            id,
            thread: Some(thread),
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get worker statistics
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Whether the worker thread has left its loop
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Join the worker thread
    ///
    /// Blocks until the worker has consumed a stop message.
    pub fn join(mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| ThreadError::join(self.id, "Worker panicked"))?;
        }
        Ok(())
    }

    /// Let the worker thread run on without waiting for it
    pub fn detach(mut self) {
        // Dropping the handle detaches the thread
        self.thread.take();
    }

    /// Main worker loop
    fn run(
        id: usize,
        jobs: Arc<BlockingQueue<JobMessage>>,
        samples: Arc<BlockingQueue<WaitSample>>,
        stats: Arc<WorkerStats>,
    ) {
        #[cfg(feature = "tracing")]
        let worker_span = span!(Level::DEBUG, "worker", id = id);
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        log::debug!("worker {} started", id);

        loop {
            let waiting_since = Instant::now();
            let message = jobs.receive();
            let wait = waiting_since.elapsed();

            match message {
                JobMessage::Stop => {
                    log::debug!(
                        "worker {} was told to stop ({} jobs executed)",
                        id,
                        stats.get_jobs_executed()
                    );
                    break;
                }
                JobMessage::Work(mut job) => {
                    #[cfg(feature = "tracing")]
                    crate::tracing::metrics::record_worker_busy(id);

                    Self::execute_job(id, &mut job, &stats);
                    stats.add_wait_time(wait.as_micros() as u64);

                    #[cfg(feature = "tracing")]
                    {
                        crate::tracing::metrics::record_worker_idle(id);
                        crate::tracing::metrics::record_wait(id, wait);
                    }

                    samples.send(WaitSample {
                        worker_id: id,
                        wait,
                    });
                }
            }
        }
    }

    /// Execute a single job with panic protection
    fn execute_job(id: usize, job: &mut BoxedJob, stats: &WorkerStats) {
        log::debug!("worker {} got a job ({}); executing", id, job.job_type());

        let start = Instant::now();
        let panic_result = catch_unwind(AssertUnwindSafe(|| job.execute()));
        let elapsed = start.elapsed();

        match panic_result {
            Ok(Ok(())) => {
                stats.increment_processed();
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_completion(elapsed, true);
            }
            Ok(Err(e)) => {
                log::warn!("worker {}: job {} failed: {}", id, job.job_type(), e);
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_completion(elapsed, false);
                stats.increment_failed();
            }
            Err(panic_info) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                log::error!(
                    "worker {}: job {} panicked: {}",
                    id,
                    job.job_type(),
                    panic_msg
                );
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_panic(elapsed);
                stats.increment_panicked();
            }
        }

        stats.add_processing_time(elapsed.as_micros() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ClosureJob;

    type Queues = (
        Arc<BlockingQueue<JobMessage>>,
        Arc<BlockingQueue<WaitSample>>,
    );

    fn queues() -> Queues {
        (Arc::new(BlockingQueue::new()), Arc::new(BlockingQueue::new()))
    }

    fn work<F>(f: F) -> JobMessage
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        JobMessage::Work(Box::new(ClosureJob::new(f)))
    }

    #[test]
    fn test_worker_creation() {
        let (jobs, samples) = queues();
        let worker = Worker::new(3, "worker", Arc::clone(&jobs), samples)
            .expect("Failed to create worker");
        assert_eq!(worker.id(), 3);

        assert!(!worker.is_finished());
        jobs.send(JobMessage::Stop);
        let deadline = Instant::now() + Duration::from_secs(2);
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(worker.is_finished(), "stop message should end the loop");
        worker.join().expect("Failed to join worker");
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_worker_reports_one_sample_per_job() {
        let (jobs, samples) = queues();
        let worker = Worker::new(0, "worker", Arc::clone(&jobs), Arc::clone(&samples))
            .expect("Failed to create worker");
        let stats = worker.stats();

        for _ in 0..3 {
            jobs.send(work(|| Ok(())));
        }
        for _ in 0..3 {
            let sample = samples.receive();
            assert_eq!(sample.worker_id, 0);
        }
        assert_eq!(stats.get_jobs_processed(), 3);
        assert_eq!(stats.get_jobs_failed(), 0);

        jobs.send(JobMessage::Stop);
        worker.join().expect("Failed to join worker");
        assert!(samples.is_empty());
    }

    #[test]
    fn test_wait_covers_blocked_time() {
        let (jobs, samples) = queues();
        let worker = Worker::new(0, "worker", Arc::clone(&jobs), Arc::clone(&samples))
            .expect("Failed to create worker");

        thread::sleep(Duration::from_millis(60));
        jobs.send(work(|| Ok(())));

        let sample = samples.receive();
        assert!(
            sample.wait >= Duration::from_millis(50),
            "wait {:?} should include the time spent blocked",
            sample.wait
        );

        jobs.send(JobMessage::Stop);
        worker.join().expect("Failed to join worker");
    }

    #[test]
    fn test_worker_failure_handling() {
        let (jobs, samples) = queues();
        let worker = Worker::new(0, "worker", Arc::clone(&jobs), Arc::clone(&samples))
            .expect("Failed to create worker");
        let stats = worker.stats();

        jobs.send(work(|| Err(ThreadError::other("Intentional failure"))));
        samples.receive();

        assert_eq!(stats.get_jobs_failed(), 1);
        assert_eq!(stats.get_jobs_processed(), 0);

        jobs.send(JobMessage::Stop);
        worker.join().expect("Failed to join worker");
    }

    #[test]
    fn test_worker_panic_handling() {
        let (jobs, samples) = queues();
        let worker = Worker::new(0, "worker", Arc::clone(&jobs), Arc::clone(&samples))
            .expect("Failed to create worker");
        let stats = worker.stats();

        jobs.send(work(|| panic!("Intentional panic for testing")));
        // The panicking job still produces its sample
        samples.receive();

        assert_eq!(stats.get_jobs_panicked(), 1);
        assert_eq!(stats.get_jobs_processed(), 0);
        assert_eq!(stats.get_jobs_failed(), 0);

        // Verify the worker is still alive
        jobs.send(work(|| Ok(())));
        samples.receive();
        assert_eq!(stats.get_jobs_processed(), 1);
        assert_eq!(stats.get_jobs_executed(), 2);

        jobs.send(JobMessage::Stop);
        worker.join().expect("Failed to join worker");
    }

    #[test]
    fn test_each_worker_consumes_one_stop() {
        let (jobs, samples) = queues();
        let workers: Vec<_> = (0..3)
            .map(|id| {
                Worker::new(id, "worker", Arc::clone(&jobs), Arc::clone(&samples))
                    .expect("Failed to create worker")
            })
            .collect();

        jobs.send_all((0..3).map(|_| JobMessage::Stop));
        for worker in workers {
            worker.join().expect("Failed to join worker");
        }
        assert!(jobs.is_empty(), "every worker should take exactly one stop");
    }

    #[test]
    fn test_worker_stats_averages() {
        let stats = WorkerStats::new();
        assert_eq!(stats.get_average_wait_time_us(), 0.0);
        assert_eq!(stats.get_average_processing_time_us(), 0.0);

        stats.increment_processed();
        stats.increment_failed();
        stats.add_wait_time(100);
        stats.add_wait_time(300);
        stats.add_processing_time(50);

        assert_eq!(stats.get_jobs_executed(), 2);
        assert_eq!(stats.get_average_wait_time_us(), 200.0);
        assert_eq!(stats.get_average_processing_time_us(), 25.0);
    }
}
