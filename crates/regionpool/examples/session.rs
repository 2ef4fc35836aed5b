//! A call-scoped session served from one pool.
//!
//! Demonstrates:
//!   1. Creating a small pool and routing small and oversized requests
//!   2. Handing external resources (a heap string, an open file) to
//!      cleanup entries so teardown releases them
//!   3. Destroying the pool and reading the teardown report
//!
//! Run with:
//!   RUST_LOG=regionpool=trace cargo run --example session

use std::error::Error;
use std::fs::File;
use std::io::Write;

use regionpool::{CleanupContext, Pool};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut pool = Pool::with_size(512)?;
    info!(threshold = pool.threshold(), "pool ready");

    let header = pool.allocate(128)?;
    pool.bytes_mut(&header)?[..5].copy_from_slice(b"hello");

    // Too big for a 512-byte block: served as an oversized region.
    let record = pool.allocate(512)?;
    info!(oversized = record.is_oversized(), "allocated record");

    let greeting = String::from("hello world");
    let path = std::env::temp_dir().join("regionpool-session.txt");
    let mut file = File::create(&path)?;
    writeln!(file, "{greeting}")?;

    let release_string = pool.register_cleanup(0)?;
    pool.set_cleanup_context(release_string, CleanupContext::External(Box::new(greeting)))?;
    pool.set_cleanup_handler(release_string, |data| {
        if let Some(text) = data.into_external::<String>() {
            info!(len = text.len(), "released string");
        }
    })?;

    let close_file = pool.register_cleanup(0)?;
    pool.set_cleanup_context(close_file, CleanupContext::External(Box::new(file)))?;
    pool.set_cleanup_handler(close_file, |data| {
        if let Some(mut file) = data.into_external::<File>() {
            let _ = file.flush();
            info!("closed file");
        }
    })?;

    let stats = pool.stats();
    info!(?stats, "before teardown");

    let report = pool.destroy();
    info!(?report, "pool destroyed");
    println!(
        "ran {} cleanup handlers, released {} oversized regions and {} blocks",
        report.handlers_run, report.oversized_released, report.blocks_released
    );
    Ok(())
}
