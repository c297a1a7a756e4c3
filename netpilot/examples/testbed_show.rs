//! Example: list the testbed and run a `show` command on one device
//!
//! Settings come from the environment (or a `.env` file). At minimum
//! `NETPILOT_TESTBED_PATH` must point at a testbed YAML.
//!
//! # Usage
//!
//! ```bash
//! NETPILOT_TESTBED_PATH=lab/testbed.yaml cargo run --example testbed_show -- R1 "show version"
//! ```
//!
//! With no arguments only the inventory is printed.

use std::env;
use std::process::ExitCode;

use netpilot::{Netpilot, Settings};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let netpilot = match Netpilot::from_settings(&settings) {
        Ok(netpilot) => netpilot,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = netpilot.check_testbed().await {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let inventory = netpilot.list_devices().await.to_json();
    println!("{}", serde_json::to_string_pretty(&inventory).unwrap_or_default());

    let mut args = env::args().skip(1);
    if let (Some(device), Some(command)) = (args.next(), args.next()) {
        let outcome = netpilot.show(&device, &command).await;
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome.to_json()).unwrap_or_default()
        );
        netpilot.shutdown().await;
        if !outcome.is_completed() {
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
