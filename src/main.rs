use std::{fs::File, sync::Arc};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use daemonize::Daemonize;
use hidapi::HidApi;
use log::{LevelFilter, info};
use syslog::{BasicLogger, Facility, Formatter3164};

use rgb_fand::cli::Cli;
use rgb_fand::config::ConfigManager;
use rgb_fand::device_manager::DeviceManager;
use rgb_fand::drivers::riing::RiingController;
use rgb_fand::engine::Engine;
use rgb_fand::monitors::{LmHardwareMonitor, init_lm_sensors};

fn init_log(verbose: bool) -> Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    syslog::unix(Formatter3164 {
        facility: Facility::LOG_DAEMON,
        hostname: None,
        process: "rgb_fand".into(),
        pid: 0,
    })
    .map_err(|e| anyhow!("{e}"))
    .and_then(|logger| {
        log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
            .map(|_| log::set_max_level(level))
            .map_err(|e| anyhow!("{e}"))
    })
}

fn into_daemon() -> Result<()> {
    File::create("/var/tmp/rgb_fand.log")
        .and_then(|out| Ok((out.try_clone()?, out)))
        .map_err(|e| anyhow!("{e}"))
        .and_then(|(stderr, stdout)| {
            Daemonize::new()
                .stdout(stdout)
                .stderr(stderr)
                .start()
                .map_err(|e| anyhow!("{e}"))
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_log(cli.verbose)?;
    if cli.daemonize {
        into_daemon()?;
    }

    let config_manager = ConfigManager::load(cli.config).await?;
    let config = config_manager.clone_config().await;

    let api = HidApi::new().context("hidapi init")?;
    let controllers = RiingController::probe(&api);
    if controllers.is_empty() {
        anyhow::bail!("No supported controllers found on the bus");
    }
    let devices = Arc::new(DeviceManager::new(controllers));

    let lmsensors = init_lm_sensors()?;
    let monitor = Arc::new(LmHardwareMonitor::discover(lmsensors)?);

    let mut engine = Engine::new(config, devices, monitor)?;
    engine.initialize().await?;
    engine.start();
    info!(
        "rgb_fand started with config {}",
        config_manager.path().display()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to install signal handler")?;
    info!("Shutdown signal received");

    engine.dispose().await
}
