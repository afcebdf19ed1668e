use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Result, SwitchoverError};
use crate::ifaddrs::{MacAddr, interface_mac};

const EMBEDDED_PREFIXES: [&str; 3] = ["em", "eth", "eno"];

/// Source of the host's physical NICs.
pub trait NicSource {
    /// Active NICs, embedded ones first, each group sorted by name.
    fn active_nics(&self) -> Result<Vec<String>>;

    fn mac_address(&self, name: &str) -> Result<MacAddr>;
}

pub struct SysfsNics {
    sys_class_net: PathBuf,
}

impl SysfsNics {
    pub fn new<P: AsRef<Path>>(sys_class_net: P) -> Self {
        Self {
            sys_class_net: sys_class_net.as_ref().to_path_buf(),
        }
    }

    fn read_attr(&self, name: &str, attr: &str) -> Option<String> {
        fs::read_to_string(self.sys_class_net.join(name).join(attr))
            .ok()
            .map(|s| s.trim_end().to_string())
    }

    fn is_active(&self, name: &str) -> bool {
        if name == "lo" {
            return false;
        }
        let has_device = self.sys_class_net.join(name).join("device").is_dir();
        let operstate = self.read_attr(name, "operstate").map(|s| s.to_lowercase());
        let address = self.read_attr(name, "address");
        has_device
            && operstate.as_deref() == Some("up")
            && address.is_some_and(|a| !a.is_empty())
    }
}

impl NicSource for SysfsNics {
    fn active_nics(&self) -> Result<Vec<String>> {
        let dir = &self.sys_class_net;
        let entries =
            fs::read_dir(dir).map_err(|e| SwitchoverError::io("read directory", dir, e))?;
        let mut embedded = Vec::new();
        let mut others = Vec::new();
        for entry_res in entries {
            let entry = entry_res.map_err(|e| SwitchoverError::io("read directory", dir, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !self.is_active(&name) {
                continue;
            }
            if EMBEDDED_PREFIXES.iter().any(|p| name.starts_with(p)) {
                embedded.push(name);
            } else {
                others.push(name);
            }
        }
        embedded.sort();
        others.sort();
        embedded.extend(others);
        debug!("active nics: {:?}", embedded);
        Ok(embedded)
    }

    fn mac_address(&self, name: &str) -> Result<MacAddr> {
        interface_mac(name)
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    /// Fixed NIC list for tests elsewhere in the crate.
    pub(crate) struct FixedNics {
        pub(crate) nics: Vec<String>,
        pub(crate) macs: HashMap<String, MacAddr>,
    }

    impl FixedNics {
        pub(crate) fn new(nics: &[&str]) -> Self {
            Self {
                nics: nics.iter().map(|s| s.to_string()).collect(),
                macs: HashMap::new(),
            }
        }
    }

    impl NicSource for FixedNics {
        fn active_nics(&self) -> Result<Vec<String>> {
            Ok(self.nics.clone())
        }

        fn mac_address(&self, name: &str) -> Result<MacAddr> {
            Ok(self.macs.get(name).copied().unwrap_or(MacAddr::ZERO))
        }
    }

    fn add_nic(root: &Path, name: &str, device: bool, operstate: &str, address: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        if device {
            fs::create_dir(dir.join("device")).unwrap();
        }
        fs::write(dir.join("operstate"), format!("{}\n", operstate)).unwrap();
        fs::write(dir.join("address"), format!("{}\n", address)).unwrap();
    }

    #[test]
    fn test_active_nics_ordering() {
        let root = TempDir::new().unwrap();
        add_nic(root.path(), "p1p1", true, "up", "52:54:00:00:00:01");
        add_nic(root.path(), "eth1", true, "up", "52:54:00:00:00:02");
        add_nic(root.path(), "em2", true, "UP", "52:54:00:00:00:03");
        add_nic(root.path(), "eth0", true, "up", "52:54:00:00:00:04");

        let nics = SysfsNics::new(root.path()).active_nics().unwrap();
        assert_eq!(nics, vec!["em2", "eth0", "eth1", "p1p1"]);
    }

    #[test]
    fn test_active_nics_filters_inactive() {
        let root = TempDir::new().unwrap();
        add_nic(root.path(), "lo", true, "unknown", "00:00:00:00:00:00");
        add_nic(root.path(), "eth0", true, "up", "52:54:00:00:00:01");
        add_nic(root.path(), "eth1", true, "down", "52:54:00:00:00:02");
        add_nic(root.path(), "br-ex", false, "up", "52:54:00:00:00:03");
        add_nic(root.path(), "eth2", true, "up", "");
        // No attribute files at all.
        fs::create_dir_all(root.path().join("eth3/device")).unwrap();

        let nics = SysfsNics::new(root.path()).active_nics().unwrap();
        assert_eq!(nics, vec!["eth0"]);
    }

    #[test]
    fn test_active_nics_missing_dir() {
        let root = TempDir::new().unwrap();
        let err = SysfsNics::new(root.path().join("nope"))
            .active_nics()
            .unwrap_err();
        assert!(matches!(err, SwitchoverError::Io { .. }));
    }
}
