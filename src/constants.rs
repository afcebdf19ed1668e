pub const DIR_HIERA: &str = "/etc/puppet/hieradata";
pub const DIR_NETWORK_SCRIPTS: &str = "/etc/sysconfig/network-scripts";
pub const DIR_SYS_CLASS_NET: &str = "/sys/class/net";

pub const FILE_COMPUTE_ROLE: &str = "compute.yaml";
pub const FILE_IVS_CONFIG: &str = "/etc/sysconfig/ivs";
pub const FILE_NET_CONFIG: &str = "/etc/os-net-config/config.json";
pub const FILE_OVS_AGENT_CONFIG: &str = "/etc/neutron/plugins/ml2/openvswitch_agent.ini";

pub const BRIDGE_NAME_IVS: &str = "ivs";

pub const SERVICE_BSN_AGENT: &str = "neutron-bsn-agent";
pub const SERVICE_IVS: &str = "ivs";
pub const SERVICE_OVS_AGENT: &str = "neutron-openvswitch-agent";

pub const CMD_IFDOWN: &str = "/sbin/ifdown";
pub const CMD_IFUP: &str = "/sbin/ifup";
pub const CMD_OVS_VSCTL: &str = "/usr/bin/ovs-vsctl";
pub const CMD_SYSTEMCTL: &str = "/usr/bin/systemctl";

pub const LOG_DOMAIN: &str = "neutron-bsn-lldp";

pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
