// Svcguard - systemd service health monitoring and recovery
// Main entry point

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use svcguard::config::Config;
use svcguard::error::SvcguardError;
use svcguard::notify::NotifierSet;
use svcguard::report::{Mode, OutputFormat, RunReport};
use svcguard::runner::Monitor;
use svcguard::systemd::{ServiceList, SystemdClient};
use svcguard::version::build_info;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "svcguard")]
#[command(author, about, long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// What to do with the monitored services
    #[arg(short, long, value_enum, default_value_t = Mode::Check)]
    mode: Mode,

    /// Service to target instead of the configured list (repeatable)
    #[arg(short, long = "service", value_name = "NAME")]
    services: Vec<String>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override a config value, e.g. services.max_restart_attempts=5 (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Repeat the run every SECS seconds until interrupted
    #[arg(short, long, value_name = "SECS")]
    watch: Option<u64>,

    /// Do not send notifications
    #[arg(long)]
    no_notify: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Show version information
    #[arg(short = 'V', long)]
    version: bool,

    /// Show detailed build information
    #[arg(long)]
    build_info: bool,

    /// Write a config file with every default filled in, then exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("{}", build_info().format_display());
        return Ok(());
    }

    if cli.build_info {
        println!("{}", build_info().format_display());
        println!("\n{}", build_info().format_build_info());
        return Ok(());
    }

    init_logging(cli.debug, cli.log_file.as_ref())?;

    if let Some(path) = &cli.write_default_config {
        Config::default().save(path.clone())?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let code = run(cli).await?;
    std::process::exit(code);
}

fn init_logging(debug: bool, log_file: Option<&PathBuf>) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false) // Disable ANSI colors in log file
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<i32> {
    let config = Config::load_with_overrides(cli.config.clone(), &cli.overrides)?;

    let services = if cli.services.is_empty() {
        config.service_list()
    } else {
        let (list, rejected) = ServiceList::parse(cli.services.iter().map(String::as_str));
        for reason in rejected {
            tracing::warn!("Ignoring --service argument: {}", reason);
        }
        list
    };

    // Nothing to monitor is a healthy run; systemd is never contacted
    if services.is_empty() {
        tracing::warn!("No services configured; set services.monitored or pass --service");
        print!("{}", RunReport::empty(cli.mode).render(cli.format)?);
        return Ok(0);
    }

    let client = match SystemdClient::connect(config.connection_manager(), config.services.diagnostic_lines).await {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("svcguard: {}", e);
            return Ok(clamp_exit(services.len()));
        }
    };

    let notifier = if cli.no_notify {
        None
    } else {
        Some(NotifierSet::from_config(&config.notifications)?)
    };
    let mut monitor = Monitor::new(Arc::new(client), config);
    if let Some(notifier) = notifier {
        monitor = monitor.with_notifier(notifier);
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight restarts");
            interrupt.cancel();
        }
    });

    let Some(secs) = cli.watch else {
        return run_once(&monitor, cli.mode, &services, cli.format, &cancel).await;
    };

    tracing::info!("Watching {} service(s) every {}s", services.len(), secs.max(1));
    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
    let mut code = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => break,
        }
        code = run_once(&monitor, cli.mode, &services, cli.format, &cancel).await?;
        if cancel.is_cancelled() {
            break;
        }
    }
    Ok(code)
}

async fn run_once(
    monitor: &Monitor,
    mode: Mode,
    services: &ServiceList,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<i32> {
    match monitor.run(mode, services, cancel).await {
        Ok(report) => {
            print!("{}", report.render(format)?);
            Ok(report.exit_code())
        }
        Err(e) => match e.downcast_ref::<SvcguardError>() {
            Some(SvcguardError::ControlPlaneDown { services }) => {
                tracing::error!("{}", e);
                eprintln!("svcguard: {}", e);
                Ok(clamp_exit(*services))
            }
            _ => Err(e),
        },
    }
}

fn clamp_exit(unresolved: usize) -> i32 {
    unresolved.min(255) as i32
}
