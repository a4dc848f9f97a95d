//! Job trait and related types

use crate::core::error::Result;
use std::fmt;

/// A trait representing a unit of work to be executed by the wave pool
///
/// Jobs produce no value for the submitter. The returned `Result` is a
/// status only: failures are logged and counted in the worker statistics.
pub trait Job: Send {
    /// Execute the job
    ///
    /// # Errors
    ///
    /// Returns an error if the job execution fails
    fn execute(&mut self) -> Result<()>;

    /// Get the job's type name for debugging and statistics
    fn job_type(&self) -> &str {
        "Job"
    }
}

impl fmt::Debug for dyn Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job({})", self.job_type())
    }
}

/// A boxed job that can be sent across threads
pub type BoxedJob = Box<dyn Job>;

/// A message travelling through the job queue.
///
/// The stop signal is its own variant so that no job payload, however
/// trivial, is ever mistaken for a request to shut a worker down.
#[derive(Debug)]
pub enum JobMessage {
    /// A job to execute
    Work(BoxedJob),
    /// Tells exactly one worker to leave its loop
    Stop,
}

impl JobMessage {
    /// Returns true for the stop sentinel
    pub fn is_stop(&self) -> bool {
        matches!(self, JobMessage::Stop)
    }
}

impl From<BoxedJob> for JobMessage {
    fn from(job: BoxedJob) -> Self {
        JobMessage::Work(job)
    }
}

/// Helper to create a job from a closure
pub struct ClosureJob<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    closure: Option<F>,
    name: String,
}

impl<F> ClosureJob<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    /// Create a new closure job
    pub fn new(closure: F) -> Self {
        Self {
            closure: Some(closure),
            name: "ClosureJob".to_string(),
        }
    }

    /// Create a new closure job with a custom name
    pub fn with_name<S: Into<String>>(closure: F, name: S) -> Self {
        Self {
            closure: Some(closure),
            name: name.into(),
        }
    }
}

impl<F> Job for ClosureJob<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    fn execute(&mut self) -> Result<()> {
        if let Some(closure) = self.closure.take() {
            closure()
        } else {
            Err(crate::core::ThreadError::execution(
                self.name.clone(),
                "closure already executed - cannot execute twice",
            ))
        }
    }

    fn job_type(&self) -> &str {
        &self.name
    }
}
