use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::command::CommandRunner;
use crate::config::{OvsAgentConfig, SwitchoverConfig};
use crate::constants::{CMD_IFDOWN, CMD_IFUP, CMD_OVS_VSCTL, CMD_SYSTEMCTL};
use crate::error::{Result, SwitchoverError};
use crate::fs::{remove_if_exists, write_config};
use crate::ifcfg::{nic_mapping, render};
use crate::netconf::NetworkConfig;
use crate::nics::NicSource;
use crate::plan::{Plan, build_plan};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CutoverStep {
    WriteRoute(PathBuf),
    WriteInternalPort(PathBuf),
    LinkDown(String),
    WritePhysicalLink(PathBuf),
    LinkUp(String),
    ReadDaemonArgs,
    WriteDaemonArgs,
    DisableService(String),
    StopService(String),
    RestartService(String),
    LoadAgentConfig,
    DeleteBridge(String),
    RemoveConfig(PathBuf),
    InternalPortUp(String),
}

impl fmt::Display for CutoverStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CutoverStep::WriteRoute(p) => write!(f, "write route {}", p.display()),
            CutoverStep::WriteInternalPort(p) => write!(f, "write internal port {}", p.display()),
            CutoverStep::LinkDown(n) => write!(f, "link down {}", n),
            CutoverStep::WritePhysicalLink(p) => write!(f, "write physical link {}", p.display()),
            CutoverStep::LinkUp(n) => write!(f, "link up {}", n),
            CutoverStep::ReadDaemonArgs => f.write_str("read ivs daemon args"),
            CutoverStep::WriteDaemonArgs => f.write_str("write ivs daemon args"),
            CutoverStep::DisableService(s) => write!(f, "disable {}", s),
            CutoverStep::StopService(s) => write!(f, "stop {}", s),
            CutoverStep::RestartService(s) => write!(f, "restart {}", s),
            CutoverStep::LoadAgentConfig => f.write_str("load ovs agent config"),
            CutoverStep::DeleteBridge(b) => write!(f, "delete bridge {}", b),
            CutoverStep::RemoveConfig(p) => write!(f, "remove {}", p.display()),
            CutoverStep::InternalPortUp(n) => write!(f, "internal port up {}", n),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CutoverOutcome {
    /// IVS was already configured this way, nothing past the link bounce ran.
    Unchanged,
    Applied,
}

#[derive(Debug)]
pub struct StepFailure {
    pub step: CutoverStep,
    pub error: SwitchoverError,
}

#[derive(Debug)]
pub struct CutoverReport {
    pub outcome: CutoverOutcome,
    pub uplinks: Vec<String>,
    pub internal_ports: Vec<String>,
    pub failures: Vec<StepFailure>,
}

impl CutoverReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The DAEMON_ARGS line for /etc/sysconfig/ivs.
///
/// The template's slots are named the other way round from what they hold:
/// the uplink_interfaces slot receives the internal ports and the
/// internal_ports slot the uplinks. Existing hosts carry this exact string,
/// so it must not change.
pub fn ivs_daemon_args(uplinks: &[String], internal_ports: &[String]) -> String {
    let uplink_str: String = uplinks.iter().map(|u| format!(" -u {}", u)).collect();
    let internal_port_str: String = internal_ports
        .iter()
        .map(|p| format!(" --internal-port={}", p))
        .collect();
    format_daemon_args(&internal_port_str, &uplink_str)
}

fn format_daemon_args(uplink_interfaces: &str, internal_ports: &str) -> String {
    format!(
        "DAEMON_ARGS=\"--hitless --inband-vlan 4092{}{}\"",
        uplink_interfaces, internal_ports
    )
}

/// Move the host from the OVS agent to IVS. See [`Cutover::execute`].
pub fn execute_cutover(
    config: &SwitchoverConfig,
    runner: &dyn CommandRunner,
    nics: &dyn NicSource,
) -> Result<CutoverReport> {
    Cutover::new(config, runner, nics).execute()
}

pub struct Cutover<'a> {
    config: &'a SwitchoverConfig,
    runner: &'a dyn CommandRunner,
    nics: &'a dyn NicSource,
}

impl<'a> Cutover<'a> {
    pub fn new(
        config: &'a SwitchoverConfig,
        runner: &'a dyn CommandRunner,
        nics: &'a dyn NicSource,
    ) -> Self {
        Self {
            config,
            runner,
            nics,
        }
    }

    /// Render and classify the host's interface configs.
    pub fn plan(&self) -> Result<Plan> {
        let network_config = NetworkConfig::load(&self.config.net_config_path)?;
        let active = self.nics.active_nics().unwrap_or_else(|e| {
            warn!("unable to list active nics, nicN names stay unmapped: {}", e);
            Vec::new()
        });
        let rendered = render(network_config.interfaces(), &nic_mapping(&active))?;
        Ok(build_plan(&rendered, self.config))
    }

    /// Run the whole switchover.
    ///
    /// Only loading or rendering the network config aborts, and that happens
    /// before the host is touched. After that every step is attempted and
    /// failures are collected in the report.
    pub fn execute(&self) -> Result<CutoverReport> {
        let plan = self.plan()?;
        let mut failures = Vec::new();

        for (path, data) in &plan.routes {
            self.attempt(&mut failures, CutoverStep::WriteRoute(path.clone()), || {
                self.write(path, data)
            });
        }
        for (path, data) in &plan.internal_port_configs {
            self.attempt(&mut failures, CutoverStep::WriteInternalPort(path.clone()), || {
                self.write(path, data)
            });
        }
        for uplink in &plan.uplinks {
            self.attempt(&mut failures, CutoverStep::LinkDown(uplink.clone()), || {
                self.run(CMD_IFDOWN, &[uplink.as_str()])
            });
        }
        for (path, data) in &plan.phy_link_configs {
            self.attempt(&mut failures, CutoverStep::WritePhysicalLink(path.clone()), || {
                self.write(path, data)
            });
        }
        for uplink in &plan.uplinks {
            self.attempt(&mut failures, CutoverStep::LinkUp(uplink.clone()), || {
                self.run(CMD_IFUP, &[uplink.as_str()])
            });
        }

        let daemon_args = ivs_daemon_args(&plan.uplinks, &plan.internal_ports);
        let existing = self.read_daemon_args().unwrap_or_else(|error| {
            warn!("{}: {}", CutoverStep::ReadDaemonArgs, error);
            failures.push(StepFailure {
                step: CutoverStep::ReadDaemonArgs,
                error,
            });
            String::new()
        });

        let outcome = if existing == daemon_args {
            info!("ivs config unchanged");
            CutoverOutcome::Unchanged
        } else {
            self.switch_agents(&plan, &daemon_args, &mut failures);
            CutoverOutcome::Applied
        };

        Ok(CutoverReport {
            outcome,
            uplinks: plan.uplinks,
            internal_ports: plan.internal_ports,
            failures,
        })
    }

    fn switch_agents(&self, plan: &Plan, daemon_args: &str, failures: &mut Vec<StepFailure>) {
        let config = self.config;
        info!("switching to {}", daemon_args);

        self.attempt(failures, CutoverStep::WriteDaemonArgs, || {
            self.write(&config.ivs_config_path, daemon_args)
        });

        let ovs_agent = config.standard_agent_service.as_str();
        self.attempt(failures, CutoverStep::DisableService(ovs_agent.into()), || {
            self.run(CMD_SYSTEMCTL, &["disable", ovs_agent])
        });
        self.attempt(failures, CutoverStep::StopService(ovs_agent.into()), || {
            self.run(CMD_SYSTEMCTL, &["stop", ovs_agent])
        });
        let bsn_agent = config.accelerated_agent_service.as_str();
        self.attempt(failures, CutoverStep::RestartService(bsn_agent.into()), || {
            self.run(CMD_SYSTEMCTL, &["restart", bsn_agent])
        });

        let agent_config = OvsAgentConfig::load(&config.ovs_agent_config_path).unwrap_or_else(|error| {
            warn!("{}: {}", CutoverStep::LoadAgentConfig, error);
            failures.push(StepFailure {
                step: CutoverStep::LoadAgentConfig,
                error,
            });
            OvsAgentConfig::default()
        });
        let mut bridges = vec![agent_config.integration_bridge.clone()];
        bridges.extend(agent_config.mapped_bridges());
        for bridge in &bridges {
            self.delete_bridge(bridge, failures);
        }

        let ivs_ifcfg = config.ifcfg_path(&config.accelerated_bridge);
        self.attempt(failures, CutoverStep::RemoveConfig(ivs_ifcfg.clone()), || {
            self.remove(&ivs_ifcfg)
        });
        self.delete_bridge(&config.accelerated_bridge, failures);

        let ivs = config.accelerated_daemon_service.as_str();
        self.attempt(failures, CutoverStep::RestartService(ivs.into()), || {
            self.run(CMD_SYSTEMCTL, &["restart", ivs])
        });
        for port in &plan.internal_ports {
            self.attempt(failures, CutoverStep::InternalPortUp(port.clone()), || {
                self.run(CMD_IFUP, &[port.as_str()])
            });
        }
    }

    fn delete_bridge(&self, bridge: &str, failures: &mut Vec<StepFailure>) {
        self.attempt(failures, CutoverStep::DeleteBridge(bridge.into()), || {
            self.run(CMD_OVS_VSCTL, &["--if-exists", "del-br", bridge])
        });
    }

    fn attempt(
        &self,
        failures: &mut Vec<StepFailure>,
        step: CutoverStep,
        action: impl FnOnce() -> Result<()>,
    ) {
        debug!("{}", step);
        if let Err(error) = action() {
            warn!("{} failed: {}", step, error);
            failures.push(StepFailure { step, error });
        }
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<()> {
        self.runner.run(program, args).map(|_| ())
    }

    fn write(&self, path: &Path, data: &str) -> Result<()> {
        if self.config.noop {
            info!("noop: write {:?}", path);
            return Ok(());
        }
        write_config(path, data)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        if self.config.noop {
            info!("noop: remove {:?}", path);
            return Ok(());
        }
        remove_if_exists(path)
    }

    // A missing file reads as empty so the switch goes ahead.
    fn read_daemon_args(&self) -> Result<String> {
        let path = &self.config.ivs_config_path;
        match fs::read_to_string(path) {
            Ok(s) => Ok(s),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(SwitchoverError::io("read", path, e)),
        }
    }
}
