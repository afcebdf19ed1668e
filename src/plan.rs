//! Sorting of generated ifcfg files into the sets the cutover writes at
//! different points, and the rewrite of OVS internal ports for IVS.

use std::collections::BTreeMap;
use std::path::PathBuf;

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::SwitchoverConfig;
use crate::ifcfg::RenderedConfig;

static BOND_IFACES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"BOND_IFACES="(.+?)""#).expect("Invalid regex pattern"));

const BOND_MARKER: &str = "bond";
const VLAN_MARKER: &str = "vlan";
const INTERNAL_PORT_MARKER: &str = "TYPE=OVSIntPort";
const OVS_OPTION_PREFIX: &str = "OVS_";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Plan {
    /// Route files for interfaces that are neither VLANs nor the IVS bridge.
    pub routes: BTreeMap<PathBuf, String>,
    /// Internal port ifcfg files, already rewritten for IVS.
    pub internal_port_configs: BTreeMap<PathBuf, String>,
    /// Everything else that is not a bond.
    pub phy_link_configs: BTreeMap<PathBuf, String>,
    /// Bond members, taken from the bond's BOND_IFACES line.
    pub uplinks: Vec<String>,
    pub internal_ports: Vec<String>,
}

/// Classify every generated interface config.
///
/// Bonds are not written at all, IVS has no use for them; their member list
/// becomes the uplink list. An interface may produce both a route entry and
/// an ifcfg entry.
pub fn build_plan(rendered: &RenderedConfig, config: &SwitchoverConfig) -> Plan {
    let mut plan = Plan::default();
    let accelerated = config.accelerated_bridge.as_str();

    for (name, data) in &rendered.interface_data {
        if name.contains(BOND_MARKER) {
            if let Some(uplinks) = bond_ifaces(data) {
                debug!("uplinks from {}: {:?}", name, uplinks);
                plan.uplinks = uplinks;
            }
            continue;
        }

        if !name.contains(VLAN_MARKER) && !name.contains(accelerated) {
            let route = rendered.route_data.get(name).cloned().unwrap_or_default();
            plan.routes.insert(config.route_path(name), route);
        }

        let path = config.ifcfg_path(name);
        if data.contains(INTERNAL_PORT_MARKER) {
            plan.internal_port_configs
                .insert(path, rewrite_internal_port(data));
            plan.internal_ports.push(name.clone());
        } else {
            plan.phy_link_configs.insert(path, data.clone());
        }
    }

    info!("IVS uplinks: {}", plan.uplinks.join(","));
    info!("IVS internal_ports: {}", plan.internal_ports.join(","));
    plan
}

fn bond_ifaces(data: &str) -> Option<Vec<String>> {
    BOND_IFACES_RE
        .captures(data)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().split_whitespace().map(String::from).collect())
}

/// Drop the OVS_ option lines and rename ovs to ivs throughout.
pub fn rewrite_internal_port(data: &str) -> String {
    let kept: String = data
        .split_inclusive('\n')
        .filter(|line| !line.starts_with(OVS_OPTION_PREFIX))
        .collect();
    kept.replace("ovs", "ivs").replace("OVS", "IVS")
}
