//! isokv Workload Driver
//!
//! Runs concurrent read-write and read-only transactions against an
//! in-memory store and reports commit and conflict counts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use clap::Parser;
use isokv::{Config, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// isokv Workload Driver
#[derive(Parser, Debug)]
#[command(name = "isokv-workload")]
#[command(about = "Concurrent transaction workload against an in-memory isokv store")]
#[command(version)]
struct Args {
    /// Maximum skip list level
    #[arg(short = 'l', long, default_value = "10")]
    max_level: u8,

    /// Number of writer threads
    #[arg(short, long, default_value = "4")]
    writers: usize,

    /// Number of reader threads
    #[arg(short, long, default_value = "4")]
    readers: usize,

    /// Transactions per writer thread
    #[arg(short, long, default_value = "1000")]
    transactions: usize,

    /// Size of the shared key space (smaller means more conflicts)
    #[arg(short, long, default_value = "64")]
    keys: usize,

    /// Batches allowed to queue in front of the executor
    #[arg(short = 'q', long, default_value = "0")]
    apply_queue: usize,
}

#[derive(Default)]
struct Stats {
    commits: AtomicU64,
    conflicts: AtomicU64,
    reads: AtomicU64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,isokv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("isokv workload v{}", isokv::VERSION);
    tracing::info!(
        "{} writers x {} transactions, {} readers, {} keys",
        args.writers,
        args.transactions,
        args.readers,
        args.keys
    );

    let config = Config::builder()
        .max_level(args.max_level)
        .apply_queue_capacity(args.apply_queue)
        .build();

    let store = match Store::open(config) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let stats = Arc::new(Stats::default());
    let started = Instant::now();

    let writers: Vec<_> = (0..args.writers)
        .map(|id| {
            let store = Arc::clone(&store);
            let stats = Arc::clone(&stats);
            let (transactions, keys) = (args.transactions, args.keys.max(1));
            thread::spawn(move || run_writer(id, &store, &stats, transactions, keys))
        })
        .collect();

    let readers: Vec<_> = (0..args.readers)
        .map(|_| {
            let store = Arc::clone(&store);
            let stats = Arc::clone(&stats);
            let keys = args.keys.max(1);
            thread::spawn(move || run_reader(&store, &stats, keys))
        })
        .collect();

    let mut failed = false;
    for writer in writers {
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("Writer failed: {}", e);
                failed = true;
            }
            Err(_) => {
                tracing::error!("Writer thread panicked");
                failed = true;
            }
        }
    }
    store.stop();
    for reader in readers {
        let _ = reader.join();
    }

    let elapsed = started.elapsed();
    let commits = stats.commits.load(Ordering::Relaxed);
    tracing::info!(
        "{} commits, {} conflicts, {} snapshot reads in {:.2?} ({:.0} commits/s)",
        commits,
        stats.conflicts.load(Ordering::Relaxed),
        stats.reads.load(Ordering::Relaxed),
        elapsed,
        commits as f64 / elapsed.as_secs_f64()
    );

    if failed {
        std::process::exit(1);
    }
}

/// Increment a counter key, retrying on conflict with a fresh snapshot
fn run_writer(
    id: usize,
    store: &Store,
    stats: &Stats,
    transactions: usize,
    keys: usize,
) -> isokv::Result<()> {
    for i in 0..transactions {
        let key = format!("counter:{}", (id * 31 + i) % keys);
        loop {
            let outcome = store.put_or_update(|txn| {
                let current = txn
                    .get(&key)
                    .and_then(|v| std::str::from_utf8(&v).ok()?.parse::<u64>().ok())
                    .unwrap_or(0);
                txn.put(&key, (current + 1).to_string())
            });
            match outcome {
                Ok(handle) => {
                    handle.wait()?;
                    stats.commits.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                Err(e) if e.is_retryable() => {
                    stats.conflicts.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(())
}

fn run_reader(store: &Store, stats: &Stats, keys: usize) {
    let mut round = 0usize;
    while let Ok(found) = store.get(|txn| txn.get(format!("counter:{}", round % keys)).is_some()) {
        if found {
            stats.reads.fetch_add(1, Ordering::Relaxed);
        }
        round += 1;
    }
}
