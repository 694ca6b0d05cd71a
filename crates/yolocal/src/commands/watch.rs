//! Live state follower.
//!
//! Starts one coordinator per profile in a `HubRegistry`, prints each
//! device state change as it is applied, and shuts every hub down on
//! Ctrl-C.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tokio::task::JoinSet;
use tokio::time::Interval;
use tracing::{info, warn};
use yolocal_core::{Coordinator, DeviceMap, HubConfig, HubRegistry, StateMap, StateSnapshot};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

/// Prints the devices whose state differs from the last snapshot seen.
struct UpdatePrinter {
    hub: String,
    devices: Arc<DeviceMap>,
    previous: Mutex<StateSnapshot>,
    format: OutputFormat,
    quiet: bool,
}

impl UpdatePrinter {
    fn print(&self, next: &StateSnapshot) {
        let mut previous = self.previous.lock().unwrap_or_else(PoisonError::into_inner);
        for (device_id, state) in next.iter() {
            if previous.get(device_id) == Some(state) {
                continue;
            }
            output::print_output(&self.line(device_id, state), self.quiet);
        }
        *previous = Arc::clone(next);
    }

    fn line(&self, device_id: &str, state: &serde_json::Value) -> String {
        let at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let device = self.devices.get(device_id);
        let name = device.map_or(device_id, |d| d.name.as_str());

        match self.format {
            OutputFormat::Json | OutputFormat::JsonCompact => output::render_json_compact(&json!({
                "at": at,
                "hub": self.hub,
                "device_id": device_id,
                "name": name,
                "state": state,
            })),
            OutputFormat::Table | OutputFormat::Plain => {
                let readings = device
                    .map(|d| util::readings(&d.device_type, Some(state)))
                    .unwrap_or_default();
                let summary = if readings.is_empty() {
                    output::render_json_compact(state)
                } else {
                    readings.join(" ")
                };
                format!("{at} {}/{name}: {summary}", self.hub)
            }
        }
    }
}

fn targets(args: &WatchArgs, global: &GlobalOpts) -> Result<Vec<(String, HubConfig)>, CliError> {
    let cfg = config::load_config()?;
    if args.hubs.is_empty() {
        return Ok(vec![config::hub_config(global, &cfg)?]);
    }
    args.hubs
        .iter()
        .map(|name| Ok((name.clone(), config::hub_config_for(name, global, &cfg)?)))
        .collect()
}

async fn start(
    registry: &HubRegistry,
    name: String,
    hub: HubConfig,
    global: &GlobalOpts,
) -> Result<Coordinator, CliError> {
    let coordinator = Coordinator::new(hub);
    coordinator
        .setup()
        .await
        .map_err(|e| CliError::from(e).with_profile(&name))?;

    let printer = UpdatePrinter {
        hub: name.clone(),
        devices: coordinator.devices(),
        previous: Mutex::new(Arc::new(StateMap::new())),
        format: global.output.clone(),
        quiet: global.quiet,
    };
    printer.print(&coordinator.states());
    coordinator.subscribe(move |snapshot| printer.print(snapshot));

    info!(hub = %name, devices = coordinator.devices().len(), "watching hub");
    registry.insert(name, coordinator.clone()).await;
    Ok(coordinator)
}

/// Log stream connectivity changes until the stream's owner goes away.
async fn follow_stream(name: String, coordinator: Coordinator) {
    let mut rx = coordinator.stream_state();
    drop(coordinator);
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        info!(hub = %name, ?state, "event stream state changed");
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

pub async fn handle(args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let registry = HubRegistry::new();
    let mut followers = JoinSet::new();

    for (name, mut hub) in targets(args, global)? {
        if args.poll.is_some() {
            hub.stream_enabled = false;
        }
        match start(&registry, name.clone(), hub, global).await {
            Ok(coordinator) => {
                followers.spawn(follow_stream(name, coordinator));
            }
            Err(e) => {
                followers.abort_all();
                registry.shutdown_all().await;
                return Err(e);
            }
        }
    }

    let mut interval = args
        .poll
        .map(|secs| tokio::time::interval(Duration::from_secs(secs.max(1))));
    // The first tick completes immediately; states were just polled.
    if let Some(interval) = interval.as_mut() {
        interval.tick().await;
    }

    loop {
        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }

            () = tick(&mut interval) => {
                for id in registry.ids() {
                    let Some(coordinator) = registry.get(&id) else {
                        continue;
                    };
                    if let Err(e) = coordinator.refresh().await {
                        warn!(hub = %id, error = %e, "refresh failed");
                    }
                }
            }
        }
    }

    followers.abort_all();
    registry.shutdown_all().await;
    Ok(())
}
