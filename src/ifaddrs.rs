//! Hardware address discovery straight from getifaddrs(3).
//!
//! This works before any network tooling is configured on the host. The
//! list returned by the kernel is owned by nix's iterator, which calls
//! freeifaddrs(3) when dropped, so returning early from a scan releases it.

use std::fmt;

use log::debug;
use nix::ifaddrs::{InterfaceAddress, getifaddrs};
use nix::net::if_::InterfaceFlags;
use nix::sys::socket::{AddressFamily, SockaddrLike};

use crate::error::{Result, SwitchoverError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const ZERO: MacAddr = MacAddr([0; 6]);
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// One entry of the interface list, reduced to what the MAC scan looks at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkEntry {
    pub name: String,
    pub loopback: bool,
    pub packet_family: bool,
    pub hwaddr: Option<MacAddr>,
}

impl From<InterfaceAddress> for LinkEntry {
    fn from(ifa: InterfaceAddress) -> Self {
        let packet_family = ifa
            .address
            .as_ref()
            .and_then(|a| a.family())
            .is_some_and(|f| f == AddressFamily::Packet);
        let hwaddr = ifa
            .address
            .as_ref()
            .and_then(|a| a.as_link_addr())
            .and_then(|l| l.addr())
            .map(MacAddr);
        LinkEntry {
            name: ifa.interface_name,
            loopback: ifa.flags.contains(InterfaceFlags::IFF_LOOPBACK),
            packet_family,
            hwaddr,
        }
    }
}

/// First non-loopback link-layer entry with a hardware address.
pub fn select_chassis_mac<I>(entries: I) -> MacAddr
where
    I: IntoIterator<Item = LinkEntry>,
{
    for entry in entries {
        if entry.loopback || !entry.packet_family {
            continue;
        }
        if let Some(mac) = entry.hwaddr {
            debug!("chassis mac {} from {}", mac, entry.name);
            return mac;
        }
    }
    MacAddr::ZERO
}

fn link_entries() -> Result<impl Iterator<Item = LinkEntry>> {
    let addrs = getifaddrs().map_err(|source| SwitchoverError::Syscall {
        call: "getifaddrs",
        source,
    })?;
    Ok(addrs.map(LinkEntry::from))
}

/// MAC of the first non-loopback interface, or all zeros if there is none.
pub fn get_chassis_mac() -> Result<MacAddr> {
    Ok(select_chassis_mac(link_entries()?))
}

/// Same scan as `get_chassis_mac`, limited to the named interface.
pub fn interface_mac(name: &str) -> Result<MacAddr> {
    Ok(select_chassis_mac(
        link_entries()?.filter(|entry| entry.name == name),
    ))
}
