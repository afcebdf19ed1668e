use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Config, ConfigError, File, FileFormat, Source};
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::constants;
use crate::error::SwitchoverError;
use crate::ifcfg::{ifcfg_config_path, route_config_path};
use crate::wait::WaitPolicy;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct SwitchoverConfig {
    pub net_config_path: PathBuf,
    pub hiera_dir: PathBuf,
    pub compute_role_file: String,
    pub ivs_config_path: PathBuf,
    pub ovs_agent_config_path: PathBuf,
    pub network_scripts_dir: PathBuf,
    pub sys_class_net: PathBuf,
    pub accelerated_bridge: String,
    pub standard_agent_service: String,
    pub accelerated_agent_service: String,
    pub accelerated_daemon_service: String,
    pub wait_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub noop: bool,
}

impl Default for SwitchoverConfig {
    fn default() -> Self {
        Self {
            net_config_path: constants::FILE_NET_CONFIG.into(),
            hiera_dir: constants::DIR_HIERA.into(),
            compute_role_file: constants::FILE_COMPUTE_ROLE.into(),
            ivs_config_path: constants::FILE_IVS_CONFIG.into(),
            ovs_agent_config_path: constants::FILE_OVS_AGENT_CONFIG.into(),
            network_scripts_dir: constants::DIR_NETWORK_SCRIPTS.into(),
            sys_class_net: constants::DIR_SYS_CLASS_NET.into(),
            accelerated_bridge: constants::BRIDGE_NAME_IVS.into(),
            standard_agent_service: constants::SERVICE_OVS_AGENT.into(),
            accelerated_agent_service: constants::SERVICE_BSN_AGENT.into(),
            accelerated_daemon_service: constants::SERVICE_IVS.into(),
            wait_timeout_secs: constants::DEFAULT_WAIT_TIMEOUT_SECS,
            poll_interval_ms: constants::DEFAULT_POLL_INTERVAL_MS,
            noop: false,
        }
    }
}

impl SwitchoverConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let data = fs::read_to_string(p).context(format!("unable to read {:?}", p))?;
        serde_json::from_str(&data).map_err(|e| anyhow!("unable to parse {:?}: {}", p, e))
    }

    pub fn compute_role_path(&self) -> PathBuf {
        self.hiera_dir.join(&self.compute_role_file)
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            timeout: Duration::from_secs(self.wait_timeout_secs),
            interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn ifcfg_path(&self, name: &str) -> PathBuf {
        ifcfg_config_path(&self.network_scripts_dir, name)
    }

    pub fn route_path(&self, name: &str) -> PathBuf {
        route_config_path(&self.network_scripts_dir, name)
    }
}

const KEY_INTEGRATION_BRIDGE: &str = "ovs.integration_bridge";
const KEY_BRIDGE_MAPPINGS: &str = "ovs.bridge_mappings";
const DEFAULT_INTEGRATION_BRIDGE: &str = "br-int";
const DEFAULT_BRIDGE_MAPPINGS: &str = "datacentre:br-ex";

/// The parts of the openvswitch agent's ini file needed to tear down its bridges.
#[derive(Clone, Debug, PartialEq)]
pub struct OvsAgentConfig {
    pub integration_bridge: String,
    pub bridge_mappings: String,
}

impl Default for OvsAgentConfig {
    fn default() -> Self {
        Self {
            integration_bridge: DEFAULT_INTEGRATION_BRIDGE.into(),
            bridge_mappings: DEFAULT_BRIDGE_MAPPINGS.into(),
        }
    }
}

impl OvsAgentConfig {
    /// Read the `[ovs]` section of the agent's INI file. A missing file or
    /// key keeps the default.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::error::Result<Self> {
        let p = path.as_ref();
        let file = File::new(&p.to_string_lossy(), FileFormat::Ini).required(false);
        Self::build(file).map_err(|source| SwitchoverError::AgentConfig {
            path: p.to_path_buf(),
            source,
        })
    }

    pub fn parse(data: &str) -> std::result::Result<Self, ConfigError> {
        Self::build(File::from_str(data, FileFormat::Ini))
    }

    fn build<S>(source: S) -> std::result::Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let cfg = Config::builder()
            .set_default(KEY_INTEGRATION_BRIDGE, DEFAULT_INTEGRATION_BRIDGE)?
            .set_default(KEY_BRIDGE_MAPPINGS, DEFAULT_BRIDGE_MAPPINGS)?
            .add_source(source)
            .build()?;
        Ok(Self {
            integration_bridge: cfg.get_string(KEY_INTEGRATION_BRIDGE)?,
            bridge_mappings: cfg.get_string(KEY_BRIDGE_MAPPINGS)?,
        })
    }

    // "physnet1:br-ex,physnet2:br-vlan" yields ["br-ex", "br-vlan"].
    pub fn mapped_bridges(&self) -> Vec<String> {
        self.bridge_mappings
            .split(',')
            .filter_map(|m| m.split_once(':'))
            .map(|(_, br)| br.trim().to_string())
            .filter(|br| !br.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_config_defaults_from_partial_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("switchover.json");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(br#"{"hiera-dir": "/tmp/hiera", "poll-interval-ms": 5, "noop": true}"#)
            .unwrap();

        let config = SwitchoverConfig::from_file(&path).unwrap();
        assert_eq!(config.hiera_dir, PathBuf::from("/tmp/hiera"));
        assert_eq!(config.compute_role_path(), PathBuf::from("/tmp/hiera/compute.yaml"));
        assert_eq!(config.poll_interval_ms, 5);
        assert!(config.noop);
        assert_eq!(config.net_config_path, PathBuf::from(constants::FILE_NET_CONFIG));
        assert_eq!(
            config.ifcfg_path("vlan201"),
            PathBuf::from("/etc/sysconfig/network-scripts/ifcfg-vlan201")
        );
        assert_eq!(
            config.route_path("em1"),
            PathBuf::from("/etc/sysconfig/network-scripts/route-em1")
        );
    }

    #[test]
    fn test_config_rejects_bad_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("switchover.json");
        fs::write(&path, "{not json").unwrap();
        assert!(SwitchoverConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_ovs_agent_config_parse() {
        let data = "\
[DEFAULT]
integration_bridge = not-this-one

[ovs]
# comment
integration_bridge = br-int2
bridge_mappings = datacentre:br-ex,tenant:br-tenant, bogus ,storage:

[agent]
bridge_mappings = other:br-other
";
        let config = OvsAgentConfig::parse(data).unwrap();
        assert_eq!(config.integration_bridge, "br-int2");
        assert_eq!(
            config.mapped_bridges(),
            vec!["br-ex".to_string(), "br-tenant".to_string()]
        );
    }

    #[test]
    fn test_ovs_agent_config_defaults() {
        let config = OvsAgentConfig::parse("[agent]\ntunnel_types = vxlan\n").unwrap();
        assert_eq!(config, OvsAgentConfig::default());
        assert_eq!(config.mapped_bridges(), vec!["br-ex".to_string()]);

        let dir = TempDir::new().unwrap();
        let missing = OvsAgentConfig::load(dir.path().join("missing.ini")).unwrap();
        assert_eq!(missing, OvsAgentConfig::default());
    }

    #[test]
    fn test_ovs_agent_config_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("openvswitch_agent.ini");
        fs::write(
            &path,
            "[ovs]\nintegration_bridge = br-int\nbridge_mappings = datacentre:br-ex,tenant:br-vlan\n",
        )
        .unwrap();
        let config = OvsAgentConfig::load(&path).unwrap();
        assert_eq!(config.integration_bridge, "br-int");
        assert_eq!(config.mapped_bridges(), vec!["br-ex", "br-vlan"]);

        fs::write(&path, "[ovs\nintegration_bridge = br-int\n").unwrap();
        let err = OvsAgentConfig::load(&path).unwrap_err();
        assert!(matches!(err, SwitchoverError::AgentConfig { .. }));
    }
}
