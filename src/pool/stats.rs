//! Wait and wave statistics collected by the timing thread.
//!
//! [`StatsHistory`] is the raw record: every wait sample keyed by worker id
//! and every wave. [`PoolReport`] is the aggregated view handed back to
//! callers; rendering it is left to them ([`Display`](std::fmt::Display)
//! and [`PoolReport::to_json`] are provided as conveniences).

use crate::core::Result;
use crate::pool::worker::WaitSample;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// One flush cycle of the scheduler.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WaveRecord {
    /// Position of the wave, starting at 0
    pub index: u64,
    /// Jobs released by this wave
    pub jobs: u64,
    /// Time from the release until the last job of the wave reported back
    pub execution_time: Duration,
    /// Wall-clock time the wave started
    pub started_at: DateTime<Utc>,
}

/// Raw statistics history.
///
/// Only the timing thread appends to it; other threads read snapshots.
#[derive(Clone, Debug, Default)]
pub struct StatsHistory {
    waits: BTreeMap<usize, Vec<Duration>>,
    waves: Vec<WaveRecord>,
}

impl StatsHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a wait sample under its worker id.
    pub fn record_wait(&mut self, sample: WaitSample) {
        self.waits.entry(sample.worker_id).or_default().push(sample.wait);
    }

    /// Appends a wave and returns its record.
    pub fn record_wave(
        &mut self,
        jobs: u64,
        execution_time: Duration,
        started_at: DateTime<Utc>,
    ) -> &WaveRecord {
        let index = self.waves.len() as u64;
        self.waves.push(WaveRecord {
            index,
            jobs,
            execution_time,
            started_at,
        });
        &self.waves[self.waves.len() - 1]
    }

    /// Wait samples recorded for one worker.
    pub fn waits_for(&self, worker_id: usize) -> &[Duration] {
        self.waits.get(&worker_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every wave recorded so far.
    pub fn waves(&self) -> &[WaveRecord] {
        &self.waves
    }

    /// Total wait samples across all workers.
    pub fn total_samples(&self) -> usize {
        self.waits.values().map(Vec::len).sum()
    }

    /// Aggregates the history into a report.
    pub fn report(&self, jobs_submitted: u64, abandoned_jobs: usize, complete: bool) -> PoolReport {
        let workers = self
            .waits
            .iter()
            .filter_map(|(&worker_id, waits)| {
                mean(waits).map(|average_wait| WorkerWaitSummary {
                    worker_id,
                    samples: waits.len(),
                    average_wait,
                })
            })
            .collect();
        let wave_times: Vec<Duration> = self.waves.iter().map(|w| w.execution_time).collect();

        PoolReport {
            workers,
            waves: self.waves.len(),
            average_wave_time: mean(&wave_times),
            total_samples: self.total_samples(),
            jobs_submitted,
            abandoned_jobs,
            complete,
        }
    }
}

/// Arithmetic mean, or `None` without samples.
pub fn mean(samples: &[Duration]) -> Option<Duration> {
    if samples.is_empty() {
        return None;
    }
    let total: u128 = samples.iter().map(Duration::as_nanos).sum();
    let average = total / samples.len() as u128;
    Some(Duration::from_nanos(u64::try_from(average).unwrap_or(u64::MAX)))
}

/// Average wait of one worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkerWaitSummary {
    /// Worker id
    pub worker_id: usize,
    /// Number of wait samples behind the average
    pub samples: usize,
    /// Mean wait over those samples
    pub average_wait: Duration,
}

/// Aggregated statistics of a pool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PoolReport {
    /// Per-worker average waits, sorted by worker id. Workers that never
    /// executed a job have no entry.
    pub workers: Vec<WorkerWaitSummary>,
    /// Number of recorded waves
    pub waves: usize,
    /// Mean wave execution time, `None` when no wave was recorded
    pub average_wave_time: Option<Duration>,
    /// Wait samples received from workers
    pub total_samples: usize,
    /// Jobs accepted by the pool
    pub jobs_submitted: u64,
    /// Jobs left in a paused scheduler at shutdown
    pub abandoned_jobs: usize,
    /// False when the report was taken without waiting for the pool
    /// threads, e.g. by `detach` or a live snapshot
    pub complete: bool,
}

impl PoolReport {
    /// Summary for a given worker, if it executed anything.
    pub fn worker(&self, worker_id: usize) -> Option<&WorkerWaitSummary> {
        self.workers.iter().find(|w| w.worker_id == worker_id)
    }

    /// Renders the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for PoolReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Worker waiting times:")?;
        for worker in &self.workers {
            writeln!(
                f,
                "  Worker {} average waiting time {:.3}s over {} jobs",
                worker.worker_id,
                worker.average_wait.as_secs_f64(),
                worker.samples
            )?;
        }
        if let Some(average) = self.average_wave_time {
            writeln!(
                f,
                "Average wave execution time: {:.3}s over {} waves",
                average.as_secs_f64(),
                self.waves
            )?;
        }
        if self.abandoned_jobs > 0 {
            writeln!(f, "Jobs left in paused buffer: {}", self.abandoned_jobs)?;
        }
        Ok(())
    }
}
