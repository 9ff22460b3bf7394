//! spin-client: ping the server with fresh values and wait for each echo.
//!
//! Creates the segment by default, so start it before the server.

use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use spin_primitives::round_trip;
use spin_server::{PingValues, init_tracing};
use spin_shm::{DEFAULT_SHM_NAME, MappedSlots, ShmConfig, try_pin_current_thread};

#[derive(Parser, Debug)]
#[command(name = "spin-client")]
#[command(about = "Ping a spin-server over shared memory")]
struct Args {
    /// CPU to pin the client thread to
    cpu: usize,

    /// POSIX shared memory name
    #[arg(long, default_value = DEFAULT_SHM_NAME)]
    shm_name: String,

    /// Stop after this many pings (default: run forever)
    #[arg(long)]
    count: Option<u64>,

    /// Open an existing segment instead of creating it
    #[arg(long)]
    open: bool,
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    if let Err(error) = try_pin_current_thread(args.cpu) {
        tracing::error!(%error, "setup failed");
        return ExitCode::FAILURE;
    }

    let config = ShmConfig {
        name: args.shm_name,
        create: !args.open,
        ..ShmConfig::default()
    };
    let slots = match MappedSlots::with_config(&config) {
        Ok(slots) => slots,
        Err(error) => {
            tracing::error!(%error, "setup failed");
            return ExitCode::FAILURE;
        }
    };

    let out = slots.client_slot();
    let back = slots.server_slot();
    tracing::info!(cpu = args.cpu, shm = slots.name(), count = ?args.count, "starting client");

    let pings = PingValues::new().take(args.count.map_or(usize::MAX, |n| n as usize));
    let mut sent = 0u64;
    let started = Instant::now();
    for value in pings {
        let ping = Instant::now();
        round_trip(&out, &back, value);
        sent += 1;
        tracing::debug!(value, rtt_ns = ping.elapsed().as_nanos() as u64, "echoed");
    }

    let elapsed = started.elapsed();
    tracing::info!(
        sent,
        elapsed_ms = elapsed.as_millis() as u64,
        mean_rtt_ns = elapsed.as_nanos().checked_div(sent as u128).unwrap_or(0) as u64,
        "client done"
    );

    if config.create {
        if let Err(error) = slots.unlink() {
            tracing::warn!(%error, "failed to unlink shared memory");
        }
    }
    ExitCode::SUCCESS
}
