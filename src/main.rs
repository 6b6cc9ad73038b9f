use anyhow::Result;
use benchlaunch::{
    cancel::{self, CancellationToken},
    config::{resolve_launcher_config, LauncherOverrides, MergeableConfiguration},
    orchestrator::Orchestrator,
    output::StdoutSink,
    path_utils,
};

use clap::Parser;
use env_logger::Env;
use log::debug;
use std::{path::PathBuf, process};

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Check the benchmark environment, run the benchmark and stream its output"
)]
struct Cli {
    /// Directory containing the dependency manifest and benchmark entry point
    #[arg(short = 'C', long, default_value = ".", env = "BENCHLAUNCH_WORKING_DIR")]
    working_dir: PathBuf,

    /// Launcher config (defaults to launcher.yml in the working directory, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip the start countdown and the closing delay
    #[arg(long, env = "BENCHLAUNCH_NO_DELAYS")]
    no_delays: bool,

    /// Runtime used to execute the entry point
    #[arg(long)]
    runtime: Option<String>,

    /// Benchmark entry point file
    #[arg(long)]
    entry_point: Option<String>,

    /// Stop the benchmark if it runs longer than this
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let working_dir = path_utils::resolve_working_dir(&cli.working_dir)?;
    let config = resolve_launcher_config(cli.config.as_deref(), &working_dir)?;
    let config = config.merge_with(&LauncherOverrides {
        runtime: cli.runtime,
        entry_point: cli.entry_point,
        timeout_secs: cli.timeout_secs,
        no_delays: cli.no_delays,
    })?;
    debug!("Effective configuration: {:?}", config);

    cancel::install_interrupt_handler();
    let mut orchestrator = Orchestrator::new(
        config,
        &working_dir,
        StdoutSink::new(),
        CancellationToken::with_signals(),
    );

    let report = orchestrator.run();
    process::exit(report.exit_code());
}
