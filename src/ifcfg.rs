//! Rendering of network-scripts ifcfg and route files from the declared
//! topology. Only the descriptor types found on these deployments are
//! supported; anything else is skipped.

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::{Result, SwitchoverError};
use crate::netconf::{InterfaceDescriptor, Kind};

const HEADER: &str = "# This file is autogenerated by bsn-switchover\n";

/// Generated file content keyed by interface name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderedConfig {
    pub interface_data: BTreeMap<String, String>,
    pub route_data: BTreeMap<String, String>,
}

pub fn ifcfg_config_path<P: AsRef<Path>>(dir: P, name: &str) -> PathBuf {
    dir.as_ref().join(format!("ifcfg-{}", name))
}

pub fn route_config_path<P: AsRef<Path>>(dir: P, name: &str) -> PathBuf {
    dir.as_ref().join(format!("route-{}", name))
}

/// Map nicN aliases onto the ordered active NICs, nic1 being the first.
pub fn nic_mapping(active_nics: &[String]) -> HashMap<String, String> {
    active_nics
        .iter()
        .enumerate()
        .map(|(i, nic)| (format!("nic{}", i + 1), nic.clone()))
        .collect()
}

pub fn render(
    descriptors: &[InterfaceDescriptor],
    mapping: &HashMap<String, String>,
) -> Result<RenderedConfig> {
    let mut renderer = Renderer {
        mapping,
        out: RenderedConfig::default(),
    };
    for d in descriptors {
        renderer.add(d, &Parent::None)?;
    }
    Ok(renderer.out)
}

enum Parent {
    None,
    OvsBridge(String),
    OvsBond { bridge: Option<String> },
    LinuxBond(String),
}

struct Renderer<'a> {
    mapping: &'a HashMap<String, String>,
    out: RenderedConfig,
}

impl Renderer<'_> {
    fn map_name(&self, name: &str) -> String {
        self.mapping
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn add(&mut self, d: &InterfaceDescriptor, parent: &Parent) -> Result<()> {
        let name = self.map_name(&d.name());
        if name.is_empty() {
            return Err(invalid(&d.kind, "missing name"));
        }
        let mut data = format!(
            "{}DEVICE={}\nONBOOT=yes\nHOTPLUG=no\nNM_CONTROLLED=no\nPEERDNS=no\n",
            HEADER, name
        );
        let member_parent = match d.kind() {
            Kind::Interface => {
                match parent {
                    Parent::OvsBridge(bridge) => {
                        write_ovs_type(&mut data, "OVSPort", Some(bridge));
                        write_addressing(&mut data, &name, d)?;
                    }
                    Parent::LinuxBond(bond) => {
                        data.push_str(&format!("MASTER={}\nSLAVE=yes\nBOOTPROTO=none\n", bond));
                    }
                    Parent::OvsBond { .. } => data.push_str("BOOTPROTO=none\n"),
                    Parent::None => write_addressing(&mut data, &name, d)?,
                }
                None
            }
            Kind::Vlan => {
                let vlan_id = d.vlan_id.ok_or_else(|| invalid(&name, "vlan without vlan_id"))?;
                match parent {
                    Parent::OvsBridge(bridge) => {
                        write_ovs_type(&mut data, "OVSIntPort", Some(bridge));
                        data.push_str(&format!("OVS_OPTIONS=\"tag={}\"\n", vlan_id));
                    }
                    _ => {
                        data.push_str("VLAN=yes\n");
                        if let Some(device) = &d.device {
                            data.push_str(&format!("PHYSDEV={}\n", self.map_name(device)));
                        }
                    }
                }
                write_addressing(&mut data, &name, d)?;
                None
            }
            Kind::OvsBridge => {
                write_ovs_type(&mut data, "OVSBridge", None);
                write_addressing(&mut data, &name, d)?;
                if !d.ovs_extra.is_empty() {
                    data.push_str(&format!("OVS_EXTRA=\"{}\"\n", d.ovs_extra.join(" -- ")));
                }
                Some(Parent::OvsBridge(name.clone()))
            }
            Kind::OvsBond => {
                let bridge = match parent {
                    Parent::OvsBridge(bridge) => Some(bridge.clone()),
                    _ => None,
                };
                write_ovs_type(&mut data, "OVSBond", bridge.as_deref());
                let ifaces: Vec<String> = d
                    .members_of_kind(Kind::Interface)
                    .map(|m| self.map_name(&m.name()))
                    .collect();
                data.push_str(&format!("BOND_IFACES=\"{}\"\n", ifaces.join(" ")));
                if let Some(options) = &d.ovs_options {
                    data.push_str(&format!("OVS_OPTIONS=\"{}\"\n", options));
                }
                write_addressing(&mut data, &name, d)?;
                Some(Parent::OvsBond { bridge })
            }
            Kind::LinuxBond => {
                data.push_str("TYPE=Bond\nBONDING_MASTER=yes\n");
                if let Some(options) = &d.bonding_options {
                    data.push_str(&format!("BONDING_OPTS=\"{}\"\n", options));
                }
                write_addressing(&mut data, &name, d)?;
                Some(Parent::LinuxBond(name.clone()))
            }
            Kind::Other(kind) => {
                warn!("skipping {} of unsupported type {}", name, kind);
                return Ok(());
            }
        };

        if let Some(mtu) = d.mtu {
            data.push_str(&format!("MTU={}\n", mtu));
        }
        let routes = render_routes(&name, d)?;
        if !routes.is_empty() {
            self.out.route_data.insert(name.clone(), routes);
        }
        self.out.interface_data.insert(name, data);

        if let Some(member_parent) = member_parent {
            for member in &d.members {
                self.add(member, &member_parent)?;
            }
        }
        Ok(())
    }
}

fn invalid(name: &str, message: &str) -> SwitchoverError {
    SwitchoverError::InvalidDescriptor {
        name: name.into(),
        message: message.into(),
    }
}

fn write_ovs_type(data: &mut String, ovs_type: &str, bridge: Option<&str>) {
    data.push_str(&format!("DEVICETYPE=ovs\nTYPE={}\n", ovs_type));
    if let Some(bridge) = bridge {
        data.push_str(&format!("OVS_BRIDGE={}\n", bridge));
    }
}

fn parse_ip_netmask(name: &str, ip_netmask: &str) -> Result<(IpAddr, u8)> {
    let bad = || invalid(name, &format!("bad address {}", ip_netmask));
    let (ip, prefix) = ip_netmask.split_once('/').ok_or_else(bad)?;
    let ip: IpAddr = ip.parse().map_err(|_| bad())?;
    let prefix: u8 = prefix.parse().map_err(|_| bad())?;
    let max = if ip.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(bad());
    }
    Ok((ip, prefix))
}

fn netmask_v4(prefix: u8) -> Ipv4Addr {
    Ipv4Addr::from(u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0))
}

fn write_addressing(data: &mut String, name: &str, d: &InterfaceDescriptor) -> Result<()> {
    let bootproto = if d.use_dhcp {
        "dhcp"
    } else if d.addresses.is_empty() {
        "none"
    } else {
        "static"
    };
    data.push_str(&format!("BOOTPROTO={}\n", bootproto));

    let mut v4_count = 0;
    let mut v6 = Vec::new();
    for address in &d.addresses {
        match parse_ip_netmask(name, &address.ip_netmask)? {
            (IpAddr::V4(ip), prefix) => {
                let suffix = if v4_count == 0 {
                    String::new()
                } else {
                    v4_count.to_string()
                };
                data.push_str(&format!("IPADDR{}={}\n", suffix, ip));
                data.push_str(&format!("NETMASK{}={}\n", suffix, netmask_v4(prefix)));
                v4_count += 1;
            }
            (IpAddr::V6(ip), prefix) => v6.push(format!("{}/{}", ip, prefix)),
        }
    }
    if !v6.is_empty() || d.use_dhcpv6 {
        data.push_str("IPV6INIT=yes\n");
    }
    if d.use_dhcpv6 {
        data.push_str("DHCPV6C=yes\n");
    }
    if let Some((first, rest)) = v6.split_first() {
        data.push_str(&format!("IPV6ADDR={}\n", first));
        if !rest.is_empty() {
            data.push_str(&format!("IPV6ADDR_SECONDARIES=\"{}\"\n", rest.join(" ")));
        }
    }
    Ok(())
}

fn render_routes(name: &str, d: &InterfaceDescriptor) -> Result<String> {
    let mut data = String::new();
    for route in &d.routes {
        let next_hop = route
            .next_hop
            .as_deref()
            .ok_or_else(|| invalid(name, "route without next_hop"))?;
        let is_default = route.default || route.ip_netmask.as_deref() == Some("0.0.0.0/0");
        if is_default {
            data.push_str(&format!("default via {} dev {}\n", next_hop, name));
        } else {
            let dest = route
                .ip_netmask
                .as_deref()
                .ok_or_else(|| invalid(name, "route without ip_netmask"))?;
            data.push_str(&format!("{} via {} dev {}\n", dest, next_hop, name));
        }
    }
    Ok(data)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::netconf::NetworkConfig;

    const TOPOLOGY: &str = r#"{
        "network_config": [
            {
                "type": "interface",
                "name": "nic1",
                "use_dhcp": false,
                "addresses": [{"ip_netmask": "192.0.2.10/24"}],
                "routes": [
                    {"default": true, "next_hop": "192.0.2.1"},
                    {"ip_netmask": "169.254.169.254/32", "next_hop": "192.0.2.2"}
                ]
            },
            {
                "type": "ovs_bridge",
                "name": "ivs",
                "members": [
                    {
                        "type": "ovs_bond",
                        "name": "bond1",
                        "ovs_options": "bond_mode=balance-tcp lacp=active",
                        "members": [
                            {"type": "interface", "name": "nic2"},
                            {"type": "interface", "name": "nic3"}
                        ]
                    },
                    {
                        "type": "vlan",
                        "vlan_id": 201,
                        "addresses": [{"ip_netmask": "172.16.2.5/24"}],
                        "mtu": 9000
                    }
                ]
            }
        ]
    }"#;

    fn mapping() -> HashMap<String, String> {
        nic_mapping(&["em1".to_string(), "p1p1".to_string(), "p1p2".to_string()])
    }

    fn rendered() -> RenderedConfig {
        let nc = NetworkConfig::parse("/config.json", TOPOLOGY).unwrap();
        render(nc.interfaces(), &mapping()).unwrap()
    }

    #[test]
    fn test_paths() {
        assert_eq!(
            ifcfg_config_path("/etc/sysconfig/network-scripts", "em1"),
            PathBuf::from("/etc/sysconfig/network-scripts/ifcfg-em1")
        );
        assert_eq!(
            route_config_path("/etc/sysconfig/network-scripts", "em1"),
            PathBuf::from("/etc/sysconfig/network-scripts/route-em1")
        );
    }

    #[test]
    fn test_render_names() {
        let out = rendered();
        let names: Vec<&str> = out.interface_data.keys().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["bond1", "em1", "ivs", "p1p1", "p1p2", "vlan201"]);
        let routes: Vec<&str> = out.route_data.keys().map(|s| s.as_str()).collect();
        assert_eq!(routes, vec!["em1"]);
    }

    #[test]
    fn test_render_static_interface_with_routes() {
        let out = rendered();
        assert_eq!(
            out.interface_data["em1"],
            "# This file is autogenerated by bsn-switchover
DEVICE=em1
ONBOOT=yes
HOTPLUG=no
NM_CONTROLLED=no
PEERDNS=no
BOOTPROTO=static
IPADDR=192.0.2.10
NETMASK=255.255.255.0
"
        );
        assert_eq!(
            out.route_data["em1"],
            "default via 192.0.2.1 dev em1\n169.254.169.254/32 via 192.0.2.2 dev em1\n"
        );
    }

    #[test]
    fn test_render_ovs_bond() {
        let out = rendered();
        assert_eq!(
            out.interface_data["bond1"],
            "# This file is autogenerated by bsn-switchover
DEVICE=bond1
ONBOOT=yes
HOTPLUG=no
NM_CONTROLLED=no
PEERDNS=no
DEVICETYPE=ovs
TYPE=OVSBond
OVS_BRIDGE=ivs
BOND_IFACES=\"p1p1 p1p2\"
OVS_OPTIONS=\"bond_mode=balance-tcp lacp=active\"
BOOTPROTO=none
"
        );
        assert!(out.interface_data["p1p1"].ends_with("PEERDNS=no\nBOOTPROTO=none\n"));
    }

    #[test]
    fn test_render_internal_port() {
        let out = rendered();
        assert_eq!(
            out.interface_data["vlan201"],
            "# This file is autogenerated by bsn-switchover
DEVICE=vlan201
ONBOOT=yes
HOTPLUG=no
NM_CONTROLLED=no
PEERDNS=no
DEVICETYPE=ovs
TYPE=OVSIntPort
OVS_BRIDGE=ivs
OVS_OPTIONS=\"tag=201\"
BOOTPROTO=static
IPADDR=172.16.2.5
NETMASK=255.255.255.0
MTU=9000
"
        );
    }

    #[test]
    fn test_render_standalone_vlan_and_v6() {
        let d = InterfaceDescriptor {
            kind: "vlan".into(),
            vlan_id: Some(30),
            device: Some("nic1".into()),
            addresses: vec![
                crate::netconf::Address {
                    ip_netmask: "2001:db8::5/64".into(),
                },
                crate::netconf::Address {
                    ip_netmask: "10.0.0.5/8".into(),
                },
                crate::netconf::Address {
                    ip_netmask: "10.1.0.5/16".into(),
                },
            ],
            ..Default::default()
        };
        let out = render(&[d], &mapping()).unwrap();
        let data = &out.interface_data["vlan30"];
        assert!(data.contains("VLAN=yes\nPHYSDEV=em1\n"));
        assert!(data.contains("IPADDR=10.0.0.5\nNETMASK=255.0.0.0\n"));
        assert!(data.contains("IPADDR1=10.1.0.5\nNETMASK1=255.255.0.0\n"));
        assert!(data.contains("IPV6INIT=yes\nIPV6ADDR=2001:db8::5/64\n"));
    }

    #[test]
    fn test_render_linux_bond() {
        let nc = NetworkConfig::parse(
            "/config.json",
            r#"{"network_config": [{
                "type": "linux_bond",
                "name": "bond0",
                "use_dhcp": true,
                "bonding_options": "mode=802.3ad",
                "members": [{"type": "interface", "name": "nic2"}]
            }]}"#,
        )
        .unwrap();
        let out = render(nc.interfaces(), &mapping()).unwrap();
        assert!(
            out.interface_data["bond0"]
                .contains("TYPE=Bond\nBONDING_MASTER=yes\nBONDING_OPTS=\"mode=802.3ad\"\nBOOTPROTO=dhcp\n")
        );
        assert!(
            out.interface_data["p1p1"].contains("MASTER=bond0\nSLAVE=yes\nBOOTPROTO=none\n")
        );
    }

    #[test]
    fn test_render_skips_unknown_and_rejects_bad_input() {
        let unknown = InterfaceDescriptor {
            kind: "team".into(),
            name: Some("team0".into()),
            ..Default::default()
        };
        assert_eq!(render(&[unknown], &mapping()).unwrap(), RenderedConfig::default());

        let bad = InterfaceDescriptor {
            kind: "interface".into(),
            name: Some("eth0".into()),
            addresses: vec![crate::netconf::Address {
                ip_netmask: "10.0.0.5/33".into(),
            }],
            ..Default::default()
        };
        let err = render(&[bad], &mapping()).unwrap_err();
        assert!(matches!(err, SwitchoverError::InvalidDescriptor { .. }));

        let nameless = InterfaceDescriptor {
            kind: "interface".into(),
            ..Default::default()
        };
        assert!(render(&[nameless], &mapping()).is_err());
    }

    #[test]
    fn test_netmask_v4() {
        assert_eq!(netmask_v4(0), Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(netmask_v4(20), Ipv4Addr::new(255, 255, 240, 0));
        assert_eq!(netmask_v4(32), Ipv4Addr::new(255, 255, 255, 255));
    }
}
