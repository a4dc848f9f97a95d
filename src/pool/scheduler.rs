//! Buffering scheduler that releases jobs in waves

use crate::core::{BoxedJob, JobMessage, Result, ThreadError};
use crate::queue::BlockingQueue;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

struct SchedulerState {
    buffer: VecDeque<BoxedJob>,
    ready: bool,
    closed: bool,
    accepted: u64,
}

/// Holds submitted jobs until the next wave releases them to the workers.
///
/// Submissions are always accepted and never block. [`run`](Self::run)
/// moves the whole buffer, in submission order, onto the job queue, but
/// only while the scheduler is ready. Pausing gates releases, not intake.
///
/// # Example
///
/// ```rust
/// use rust_wave_pool::core::{ClosureJob, JobMessage};
/// use rust_wave_pool::pool::Scheduler;
/// use rust_wave_pool::queue::BlockingQueue;
/// use std::sync::Arc;
///
/// # fn main() -> rust_wave_pool::Result<()> {
/// let jobs = Arc::new(BlockingQueue::<JobMessage>::new());
/// let scheduler = Scheduler::new(Arc::clone(&jobs));
///
/// scheduler.pause();
/// scheduler.schedule(Box::new(ClosureJob::new(|| Ok(()))))?;
/// assert_eq!(scheduler.run(), 0);
///
/// scheduler.unpause();
/// assert_eq!(scheduler.run(), 1);
/// assert_eq!(jobs.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct Scheduler {
    state: Mutex<SchedulerState>,
    jobs: Arc<BlockingQueue<JobMessage>>,
}

impl Scheduler {
    /// Creates a ready scheduler feeding the given job queue.
    pub fn new(jobs: Arc<BlockingQueue<JobMessage>>) -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                buffer: VecDeque::new(),
                ready: true,
                closed: false,
                accepted: 0,
            }),
            jobs,
        }
    }

    /// Buffers a job for the next wave.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadError::ShuttingDown`] once [`close`](Self::close)
    /// has been called.
    pub fn schedule(&self, job: BoxedJob) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ThreadError::shutting_down(state.buffer.len()));
        }
        state.buffer.push_back(job);
        state.accepted += 1;
        Ok(())
    }

    /// Releases the buffered jobs to the job queue.
    ///
    /// Returns the number of jobs moved, or 0 without touching the buffer
    /// when paused. The buffer is detached and pushed under one lock, so
    /// a concurrently scheduled job lands either in this wave or in the
    /// next one, never in both and never in neither.
    pub fn run(&self) -> u64 {
        let mut state = self.state.lock();
        if !state.ready {
            return 0;
        }
        let wave = std::mem::take(&mut state.buffer);
        self.jobs.send_all(wave.into_iter().map(JobMessage::Work)) as u64
    }

    /// Stops releasing waves until [`unpause`](Self::unpause).
    pub fn pause(&self) {
        self.state.lock().ready = false;
    }

    /// Resumes wave releases.
    pub fn unpause(&self) {
        self.state.lock().ready = true;
    }

    /// Whether the next [`run`](Self::run) would release jobs.
    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    /// Rejects every later submission. Already buffered jobs stay put.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Jobs accepted by [`schedule`](Self::schedule) so far.
    ///
    /// Counted under the buffer lock, so a job that reaches a wave is
    /// always included.
    pub fn accepted(&self) -> u64 {
        self.state.lock().accepted
    }

    /// Jobs waiting for the next wave.
    pub fn len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Whether no job is waiting for the next wave.
    pub fn is_empty(&self) -> bool {
        self.state.lock().buffer.is_empty()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Scheduler")
            .field("buffered", &state.buffer.len())
            .field("ready", &state.ready)
            .field("closed", &state.closed)
            .field("accepted", &state.accepted)
            .finish()
    }
}
