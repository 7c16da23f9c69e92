//! PlugHub — Smart Plug Discovery & Control CLI
//!
//! Thin front end over the service layer: every command maps onto one
//! service operation and prints its JSON response.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

use plughub::api;
use plughub::app::AppState;
use plughub::monitor::BackgroundDiscovery;
use plughub::network::detect_default_range;

mod cli;
use cli::{parse_cli_args, usage_text, version_text, CliCommand};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize response")?
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = plughub::logging::init_logging() {
        eprintln!("[WARN] Failed to initialize structured logging: {}", e);
    }

    match run(std::env::args()).await {
        Ok(()) => {}
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let command = match parse_cli_args(args)? {
        CliCommand::Help => {
            println!("{}", usage_text());
            return Ok(());
        }
        CliCommand::Version => {
            println!("{}", version_text());
            return Ok(());
        }
        CliCommand::Validate { range } => {
            return print_json(&api::validate_network(&range)?);
        }
        CliCommand::Detect => {
            let range = detect_default_range().await;
            return print_json(&serde_json::json!({ "detected_range": range }));
        }
        command => command,
    };

    let state = AppState::from_env();

    match command {
        CliCommand::Devices => {
            // A one-shot process has no registry yet; discover first.
            api::run_discovery(&state, false, None, None).await?;
            print_json(&api::list_devices(&state))
        }
        CliCommand::Discover {
            network_scan,
            network,
        } => print_json(&api::run_discovery(&state, network_scan, network.as_deref(), None).await?),
        CliCommand::DiscoverIp { addresses } => {
            print_json(&api::discover_by_ip(&state, &addresses).await?)
        }
        CliCommand::Status => {
            api::run_discovery(&state, false, None, None).await?;
            print_json(&api::devices_status(&state).await)
        }
        CliCommand::Control { device, action } => {
            api::run_discovery(&state, false, None, None).await?;
            print_json(&api::invoke_action(&state, &device, &action).await?)
        }
        CliCommand::Rename { device, name } => {
            api::run_discovery(&state, false, None, None).await?;
            print_json(&api::set_friendly_name(&state, &device, name.as_deref())?)
        }
        CliCommand::Forget { device, all } => {
            api::run_discovery(&state, false, None, None).await?;
            if all {
                print_json(&api::forget_all_devices(&state))
            } else {
                let udn = device.expect("parser guarantees a device when not --all");
                print_json(&api::forget_device(&state, &udn)?)
            }
        }
        CliCommand::Monitor => {
            let monitor = BackgroundDiscovery::new();
            monitor.start(Arc::clone(&state));
            tracing::info!("Monitoring for devices. Press Ctrl-C to stop.");

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;

            monitor.stop();
            print_json(&api::discovery_status(&state))
        }
        CliCommand::Help
        | CliCommand::Version
        | CliCommand::Validate { .. }
        | CliCommand::Detect => unreachable!(),
    }
}
