//! spin-server: echo every value the client writes, from a pinned spinning
//! thread.
//!
//! # Usage
//!
//! ```bash
//! spin-client 2 &
//! spin-server 3 --mode resume
//! ```

use std::process::ExitCode;

use clap::Parser;
use spin_server::{Mode, init_tracing, serve_forever};
use spin_shm::{DEFAULT_SHM_NAME, MappedSlots, ShmConfig, try_pin_current_thread};

#[derive(Parser, Debug)]
#[command(name = "spin-server")]
#[command(about = "Spin on a shared-memory slot and echo every change")]
struct Args {
    /// CPU to pin the polling thread to
    cpu: usize,

    /// Event loop that answers the client
    #[arg(long, value_enum, default_value_t = Mode::Direct)]
    mode: Mode,

    /// POSIX shared memory name
    #[arg(long, default_value = DEFAULT_SHM_NAME)]
    shm_name: String,

    /// Create the segment instead of opening the client's
    #[arg(long)]
    create: bool,
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
        create: args.create,
        ..ShmConfig::default()
    };
    let slots = match MappedSlots::with_config(&config) {
        Ok(slots) => slots,
        Err(error) => {
            tracing::error!(%error, "setup failed");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        cpu = args.cpu,
        mode = ?args.mode,
        shm = slots.name(),
        "starting server"
    );
    serve_forever(&slots, args.mode)
}
