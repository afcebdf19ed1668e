use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use log::{Level, error, info, warn};
use rustix::process::geteuid;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use bsn_switchover::command::{CommandRunner, NoopRunner, SystemRunner};
use bsn_switchover::config::SwitchoverConfig;
use bsn_switchover::cutover::{CutoverOutcome, execute_cutover};
use bsn_switchover::logger::init_logger;
use bsn_switchover::mode::{SwitchMode, detect_mode};
use bsn_switchover::nics::SysfsNics;
use bsn_switchover::topology::scan_uplinks_and_chassis;
use bsn_switchover::wait::{CancelToken, cancel_pair};

#[derive(Parser)]
#[command(author, version, about = "Switch a compute host from OVS to IVS", long_about = None)]
struct Args {
    /// JSON file overriding the default paths and service names.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    debug: bool,

    /// Log file writes and commands without performing them.
    #[arg(long)]
    noop: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Print the switch mode this host should run.
    Detect,
    /// Print the uplinks and chassis id.
    Uplinks,
    /// Move the host to IVS without checking the mode first.
    Cutover,
    /// Detect, scan, and cut over if the host is accelerated.
    Run,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.debug { Level::Debug } else { Level::Info };
    if let Err(e) = init_logger(level) {
        // Use eprintln! here since the logger did not initialize.
        eprintln!("Failed to initialize logger: {}", e);
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SwitchoverConfig::from_file(path)?,
        None => SwitchoverConfig::default(),
    };
    config.noop |= args.noop;

    if !geteuid().is_root() {
        warn!("not running as root, host changes will likely fail");
    }

    let (canceller, cancel) = cancel_pair();
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            info!("received signal {}, cancelling", signal);
            canceller.cancel();
        }
    });

    let runner: Box<dyn CommandRunner> = if config.noop {
        Box::new(NoopRunner)
    } else {
        Box::new(SystemRunner)
    };
    let nics = SysfsNics::new(&config.sys_class_net);

    match args.command.unwrap_or(Commands::Run) {
        Commands::Detect => {
            println!("{}", detect_mode(&config, &cancel)?);
            Ok(())
        }
        Commands::Uplinks => {
            let set = scan_uplinks_and_chassis(&config, &nics, &cancel)?;
            println!("uplinks: {}", set.uplinks.join(","));
            println!("chassis id: {}", set.chassis_id);
            Ok(())
        }
        Commands::Cutover => cutover(&config, runner.as_ref(), &nics),
        Commands::Run => {
            let mode = detect_mode(&config, &cancel)?;
            info!("switch mode: {}", mode);
            if mode != SwitchMode::Accelerated {
                return Ok(());
            }
            scan(&config, &nics, &cancel)?;
            cutover(&config, runner.as_ref(), &nics)
        }
    }
}

fn scan(config: &SwitchoverConfig, nics: &SysfsNics, cancel: &CancelToken) -> Result<()> {
    let set = scan_uplinks_and_chassis(config, nics, cancel)?;
    info!(
        "uplinks {} on chassis {}",
        set.uplinks.join(","),
        set.chassis_id
    );
    Ok(())
}

fn cutover(config: &SwitchoverConfig, runner: &dyn CommandRunner, nics: &SysfsNics) -> Result<()> {
    let report = execute_cutover(config, runner, nics)?;
    match report.outcome {
        CutoverOutcome::Unchanged => info!("ivs already configured"),
        CutoverOutcome::Applied => info!("switched to ivs"),
    }
    if report.is_clean() {
        return Ok(());
    }
    for failure in &report.failures {
        error!("{}: {}", failure.step, failure.error);
    }
    Err(anyhow!("{} cutover steps failed", report.failures.len()))
}
