//! Concurrent-insert benchmark driver.
//!
//! Generates a pseudo-random key array, partitions it across worker
//! threads, times the fully concurrent insertion phase against one shared
//! tree, and prints one CSV line per configuration.
//!
//! Run with:
//! ```bash
//! cargo run --release -- [records] [threads]
//! # defaults: 100_000_000 records, 1 thread
//! cargo run --release -- 10000000 8
//! ```

use std::env;
use std::process;
use std::thread;
use std::time::Instant;

use btree_olc::BTree;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Records inserted when no argument is given.
const DEFAULT_RECORDS: usize = 100_000_000;

/// Workers spawned when no argument is given.
const DEFAULT_THREADS: usize = 1;

/// Fixed seed so repeated runs insert the same key set.
const KEY_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

fn main() {
    let (records, threads) = parse_args();

    println!("> Generating data, hold on ...");
    let keys = generate_keys(records);
    println!("> Data generation completed");

    println!("Number of Records,Number of Threads,Time");
    if let Some(millis) = experiment(threads, &keys) {
        println!("{records},{threads},{millis}");
    }
}

// =============================================================================
// Argument Parsing
// =============================================================================

/// Read the two optional positional arguments: record count, thread count.
fn parse_args() -> (usize, usize) {
    let mut args = env::args().skip(1);

    let records = args
        .next()
        .map_or(DEFAULT_RECORDS, |raw| parse_or_die(&raw, "record count"));
    let threads = args
        .next()
        .map_or(DEFAULT_THREADS, |raw| parse_or_die(&raw, "thread count"));

    if threads == 0 {
        eprintln!("fatal: thread count must be positive");
        process::exit(1);
    }
    (records, threads)
}

fn parse_or_die(raw: &str, what: &str) -> usize {
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            eprintln!("fatal: invalid {what}: {raw:?}");
            process::exit(1);
        }
    }
}

// =============================================================================
// Key Generation
// =============================================================================

/// Pre-sized array of pseudo-random keys, consumed read-only by workers.
fn generate_keys(n: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(KEY_SEED);
    let mut keys = Vec::with_capacity(n);
    for _ in 0..n {
        keys.push(rng.gen());
    }
    keys
}

// =============================================================================
// Experiment
// =============================================================================

/// Time the concurrent insertion of `keys` across `threads` workers.
///
/// The key array is partitioned into contiguous equal chunks (remainder
/// dropped); every worker inserts `(key, key)` into one shared tree. The
/// clock covers spawn-to-join of the insertion phase only.
///
/// Returns `None` when a worker failed to spawn: the configuration is
/// abandoned (already-running workers are joined) without crashing.
fn experiment(threads: usize, keys: &[u64]) -> Option<u128> {
    let chunk = keys.len() / threads;
    let tree: BTree<u64, u64> = BTree::new();

    let start = Instant::now();
    let spawned_all = thread::scope(|s| {
        for worker in 0..threads {
            let slice = &keys[worker * chunk..(worker + 1) * chunk];
            let tree = &tree;
            let spawned = thread::Builder::new()
                .name(format!("insert-worker-{worker}"))
                .spawn_scoped(s, move || {
                    for &key in slice {
                        tree.insert(key, key);
                    }
                });
            if spawned.is_err() {
                // Scope exit joins whatever already started.
                return false;
            }
        }
        true
    });
    let millis = start.elapsed().as_millis();

    spawned_all.then_some(millis)
}
