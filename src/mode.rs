use std::fmt;

use log::{debug, info, warn};

use crate::config::SwitchoverConfig;
use crate::error::Result;
use crate::netconf::{Kind, Topology};
use crate::wait::{CancelToken, poll_until};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchMode {
    Unknown,
    /// Physical fabric only, the standard switch stays in charge.
    StandardOnly,
    /// Physical and virtual fabric, the accelerated switch takes over.
    Accelerated,
}

impl fmt::Display for SwitchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwitchMode::Unknown => "unknown",
            SwitchMode::StandardOnly => "standard-only",
            SwitchMode::Accelerated => "accelerated",
        };
        f.write_str(s)
    }
}

/// Work out which switch this host is meant to run.
///
/// Returns `Unknown` at once when the network config is absent. Otherwise
/// waits for the hiera directory, which only fails with `Timeout` or
/// `Cancelled`.
pub fn detect_mode(config: &SwitchoverConfig, cancel: &CancelToken) -> Result<SwitchMode> {
    if !config.net_config_path.is_file() {
        debug!("{:?} does not exist", config.net_config_path);
        return Ok(SwitchMode::Unknown);
    }

    let hiera_dir = &config.hiera_dir;
    poll_until(
        &format!("directory {:?}", hiera_dir),
        config.wait_policy(),
        cancel,
        || hiera_dir.is_dir().then_some(()),
    )?;

    if !config.compute_role_path().is_file() {
        info!("no compute role file, host is standalone");
        return Ok(SwitchMode::StandardOnly);
    }

    let topology = match Topology::load(&config.net_config_path) {
        Ok(t) => t,
        Err(e) => {
            warn!("{}", e);
            return Ok(SwitchMode::Unknown);
        }
    };
    Ok(mode_from_topology(
        &topology,
        &config.accelerated_bridge,
    ))
}

// The first OVS bridge decides; a config without the network_config key is
// as good as unparseable.
fn mode_from_topology(topology: &Topology, accelerated_bridge: &str) -> SwitchMode {
    if topology.network_config.is_none() {
        warn!("network config has no network_config key");
        return SwitchMode::Unknown;
    }
    match topology.first_of_kind(Kind::OvsBridge) {
        Some(bridge) if bridge.name().to_lowercase() == accelerated_bridge.to_lowercase() => {
            SwitchMode::Accelerated
        }
        Some(_) => SwitchMode::StandardOnly,
        None => SwitchMode::Unknown,
    }
}
