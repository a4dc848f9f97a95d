//! Queue primitives shared by the scheduler, the workers and the timing thread.
//!
//! [`BlockingQueue`] is the only transport in the pool. It is used twice:
//!
//! - the job queue (producer: [`Scheduler`], consumers: workers)
//! - the stats queue (producers: workers, consumer: the timing thread)
//!
//! [`Scheduler`]: crate::pool::Scheduler

mod blocking;

pub use blocking::BlockingQueue;
