//! The os-net-config document describing the host's declared topology.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::error::{Result, SwitchoverError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Interface,
    Vlan,
    OvsBridge,
    OvsBond,
    LinuxBond,
    Other(String),
}

impl From<&str> for Kind {
    fn from(s: &str) -> Self {
        match s {
            "interface" => Kind::Interface,
            "vlan" => Kind::Vlan,
            "ovs_bridge" => Kind::OvsBridge,
            "ovs_bond" => Kind::OvsBond,
            "linux_bond" => Kind::LinuxBond,
            other => Kind::Other(other.into()),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct NetworkConfig {
    pub network_config: Option<Vec<InterfaceDescriptor>>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct InterfaceDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: Option<String>,
    pub members: Vec<InterfaceDescriptor>,
    pub use_dhcp: bool,
    pub use_dhcpv6: bool,
    pub addresses: Vec<Address>,
    pub routes: Vec<Route>,
    pub mtu: Option<u32>,
    pub vlan_id: Option<u16>,
    pub device: Option<String>,
    pub ovs_options: Option<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub ovs_extra: Vec<String>,
    pub bonding_options: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

// os-net-config takes a lone string wherever it takes a list of ovs_extra commands.
fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => vec![s],
        StringOrList::Many(v) => v,
    })
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Address {
    pub ip_netmask: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Route {
    pub ip_netmask: Option<String>,
    pub next_hop: Option<String>,
    pub default: bool,
}

impl InterfaceDescriptor {
    pub fn kind(&self) -> Kind {
        Kind::from(self.kind.as_str())
    }

    // VLANs without an explicit name are called vlan<id>.
    pub fn name(&self) -> String {
        match (&self.name, self.kind(), self.vlan_id) {
            (Some(name), _, _) => name.clone(),
            (None, Kind::Vlan, Some(id)) => format!("vlan{}", id),
            _ => String::new(),
        }
    }

    pub fn members_of_kind(&self, kind: Kind) -> impl Iterator<Item = &InterfaceDescriptor> {
        self.members.iter().filter(move |m| m.kind() == kind)
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            SwitchoverError::ArtifactNotFound {
                path: path.to_path_buf(),
            }
        } else {
            SwitchoverError::io("read", path, e)
        }
    })?;
    parse_document(path, &data)
}

fn parse_document<T: DeserializeOwned>(path: &Path, data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| SwitchoverError::ArtifactParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

impl NetworkConfig {
    pub fn parse<P: AsRef<Path>>(path: P, data: &str) -> Result<Self> {
        parse_document(path.as_ref(), data)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_document(path.as_ref())
    }

    pub fn interfaces(&self) -> &[InterfaceDescriptor] {
        self.network_config.as_deref().unwrap_or_default()
    }

    pub fn first_of_kind(&self, kind: Kind) -> Option<&InterfaceDescriptor> {
        self.interfaces().iter().find(|d| d.kind() == kind)
    }
}

/// The bridge and bond skeleton of the same document.
///
/// Only `type`, `name` and `members` are read, so settings the renderer
/// would reject do not stop mode detection or the uplink scan.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Topology {
    pub network_config: Option<Vec<TopologyNode>>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TopologyNode {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub members: Option<Vec<TopologyNode>>,
}

impl TopologyNode {
    pub fn kind(&self) -> Kind {
        Kind::from(self.kind.as_deref().unwrap_or_default())
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn members_of_kind(&self, kind: Kind) -> impl Iterator<Item = &TopologyNode> {
        self.members
            .iter()
            .flatten()
            .filter(move |m| m.kind() == kind)
    }
}

impl Topology {
    pub fn parse<P: AsRef<Path>>(path: P, data: &str) -> Result<Self> {
        parse_document(path.as_ref(), data)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_document(path.as_ref())
    }

    pub fn first_of_kind(&self, kind: Kind) -> Option<&TopologyNode> {
        self.network_config
            .iter()
            .flatten()
            .find(|n| n.kind() == kind)
    }
}
