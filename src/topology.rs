use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::SwitchoverConfig;
use crate::error::Result;
use crate::ifaddrs::MacAddr;
use crate::netconf::{Kind, Topology};
use crate::nics::NicSource;
use crate::wait::{CancelToken, poll_until};

static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("Invalid regex pattern"));

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UplinkSet {
    pub uplinks: Vec<String>,
    pub chassis_id: MacAddr,
}

/// Find the accelerated switch's uplinks and the chassis id.
///
/// Waits for the network config to exist and parse, since another process
/// may still be writing it. Bond members named e.g. nic3 map to the third
/// active NIC. The chassis id is the MAC of the first active NIC.
pub fn scan_uplinks_and_chassis(
    config: &SwitchoverConfig,
    nics: &dyn NicSource,
    cancel: &CancelToken,
) -> Result<UplinkSet> {
    let path = &config.net_config_path;
    let topology = poll_until(
        &format!("parseable {:?}", path),
        config.wait_policy(),
        cancel,
        || match Topology::load(path) {
            Ok(t) => Some(t),
            Err(e) => {
                debug!("{}", e);
                None
            }
        },
    )?;

    let indexes = bond_member_indexes(&topology);
    let active = nics.active_nics().unwrap_or_else(|e| {
        warn!("unable to list active nics: {}", e);
        Vec::new()
    });

    let chassis_id = match active.first() {
        Some(first) => nics.mac_address(first)?,
        None => MacAddr::ZERO,
    };
    let uplinks: Vec<String> = indexes
        .into_iter()
        .filter_map(|i| active.get(i).cloned())
        .collect();
    info!(
        "uplinks: {}, chassis id: {}",
        uplinks.join(","),
        chassis_id
    );
    Ok(UplinkSet {
        uplinks,
        chassis_id,
    })
}

// Only the first OVS bridge and its first bond are considered.
fn bond_member_indexes(topology: &Topology) -> Vec<usize> {
    let Some(bridge) = topology.first_of_kind(Kind::OvsBridge) else {
        return Vec::new();
    };
    let Some(bond) = bridge.members_of_kind(Kind::OvsBond).next() else {
        return Vec::new();
    };
    bond.members_of_kind(Kind::Interface)
        .filter_map(|nic| nic_index(nic.name()))
        .collect()
}

// "nic3" is index 2. Names without exactly one number, or numbered 0, have no index.
fn nic_index(name: &str) -> Option<usize> {
    let mut runs = DIGITS_RE.find_iter(name);
    let number = runs.next()?;
    if runs.next().is_some() {
        return None;
    }
    number.as_str().parse::<usize>().ok()?.checked_sub(1)
}
