//! Bursty producers smoothed into waves
//!
//! Several producer threads submit jobs of random duration in irregular
//! bursts. The pool releases them in periodic waves and prints the wait and
//! wave statistics at shutdown. Set `RUST_LOG=debug` to watch each wave.
//!
//! Run with: cargo run --example submission_bursts

use rand::Rng;
use rust_wave_pool::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();

    println!("=== Rust Wave Pool - Submission Bursts Example ===\n");

    let config = WavePoolConfig::new(4, Duration::from_millis(100))
        .with_thread_name_prefix("burst-worker");
    let pool = Arc::new(WavePool::with_config(config)?);
    println!(
        "1. Started {} workers, one wave every {:?}",
        pool.num_workers(),
        pool.interval()
    );

    println!("\n2. Producers submitting in bursts:");
    let producers: Vec<_> = (0..3)
        .map(|producer| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || -> Result<()> {
                let mut rng = rand::thread_rng();
                for burst in 0..4 {
                    let size = rng.gen_range(2..8);
                    for _ in 0..size {
                        let work = Duration::from_millis(rng.gen_range(1..20));
                        pool.spawn(move || thread::sleep(work))?;
                    }
                    println!("   Producer {} burst {}: {} jobs", producer, burst, size);
                    thread::sleep(Duration::from_millis(rng.gen_range(20..150)));
                }
                Ok(())
            })
        })
        .collect();

    for producer in producers {
        producer
            .join()
            .map_err(|_| ThreadError::other("producer thread panicked"))??;
    }

    println!("\n3. Pausing for a while; submissions keep buffering");
    pool.pause();
    for _ in 0..5 {
        pool.execute(|| Ok(()))?;
    }
    thread::sleep(Duration::from_millis(250));
    println!("   Buffered while paused: {}", pool.buffer_size());
    pool.unpause();

    println!("\n4. Shutting down\n");
    let report = pool.join()?;
    println!("{}", report);
    println!("Jobs submitted: {}", report.jobs_submitted);

    Ok(())
}
