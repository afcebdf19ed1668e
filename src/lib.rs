pub(crate) mod backoff;
pub mod command;
pub mod config;
pub mod constants;
pub mod cutover;
pub mod error;
pub mod fs;
pub mod ifaddrs;
pub mod ifcfg;
pub mod logger;
pub mod mode;
pub mod netconf;
pub mod nics;
pub mod plan;
pub mod topology;
pub mod wait;
