// src/bin/emu-devnet.rs

use std::time::Duration;

use clap::Parser;
use emuharness::devnet::{serve, DevnetOptions};
use emuharness::logging;
use emuharness::signal::shutdown_signal;

/// Stand-in emulator service used by the harness tests.
#[derive(Debug, Parser)]
#[command(name = "emu-devnet", version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// 0 picks a free port; the chosen address is printed on startup.
    #[arg(long, default_value_t = 3570)]
    port: u16,

    /// Wait this long before listening.
    #[arg(long, value_name = "MS", default_value_t = 0)]
    startup_delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_logging(None)?;

    let opts = DevnetOptions {
        host: args.host,
        port: args.port,
        startup_delay: Duration::from_millis(args.startup_delay_ms),
    };
    serve(opts, shutdown_signal()).await
}
