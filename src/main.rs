use std::fs::File;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use daemonize::Daemonize;
use log::{LevelFilter, Log, Metadata, Record, info};
use syslog::{BasicLogger, Facility, Formatter3164};

use razerd::{application::Application, cli::Cli, config::ConfigManager};

const DAEMON_LOG: &str = "/var/tmp/razerd.log";

/// Used when syslog is unreachable.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

fn init_log(verbose: bool) -> Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let logger: Box<dyn Log> = match syslog::unix(Formatter3164 {
        facility: Facility::LOG_USER,
        hostname: None,
        process: "razerd".into(),
        pid: 0,
    }) {
        Ok(writer) => Box::new(BasicLogger::new(writer)),
        Err(e) => {
            eprintln!("syslog unavailable ({e}), logging to stderr");
            Box::new(StderrLogger)
        }
    };

    log::set_boxed_logger(logger)
        .map(|()| log::set_max_level(level))
        .map_err(|e| anyhow!("{e}"))
}

fn into_daemon() -> Result<()> {
    File::create(DAEMON_LOG)
        .and_then(|out| Ok((out.try_clone()?, out)))
        .with_context(|| format!("Failed to create {DAEMON_LOG}"))
        .and_then(|(stderr, stdout)| {
            Daemonize::new()
                .stdout(stdout)
                .stderr(stderr)
                .start()
                .map_err(|e| anyhow!("{e}"))
        })
}

async fn run(cli: Cli) -> Result<()> {
    let config_manager = ConfigManager::load(cli.config).await?;
    config_manager
        .validate()
        .await
        .context("Invalid configuration")?;

    info!("razerd {} starting", env!("CARGO_PKG_VERSION"));
    Application::builder()
        .with_config_manager(config_manager)
        .build()
        .await?
        .run()
        .await
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_log(cli.verbose)?;

    // Forking must happen before the runtime spawns its threads.
    if cli.daemonize {
        into_daemon()?;
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build the tokio runtime")?
        .block_on(run(cli))
}
