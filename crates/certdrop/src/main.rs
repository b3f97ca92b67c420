//! Certdrop - Main entry point
//!
//! Renews, packages and mails TLS certificate material for a single domain.

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, error, info, warn};

use certdrop::archive::{latest_archive, ArchiveBuilder};
use certdrop::config::{DEFAULT_API_URL, DEFAULT_RENEWAL_COMMAND, DEFAULT_THRESHOLD_DAYS};
use certdrop::deliver::{DeliveryCoordinator, ResendNotifier};
use certdrop::logging::{self, LogFormat, LogSettings};
use certdrop::{
    evaluate, parse_interval, run_daemon, signals, CommandExecutor, ConfigError, DeliveryPolicy,
    Pipeline, RawSettings, RenewalCoordinator, RenewalPolicy,
};

/// Exit code for a run interrupted by the user
const EXIT_INTERRUPTED: u8 = 130;

/// Certdrop - keep a TLS certificate renewed and delivered
#[derive(Parser, Debug)]
#[command(name = "certdrop")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    /// Keep running and repeat the pipeline on a schedule
    #[arg(long, env = "DAEMON_MODE", global = true, value_parser = FalseyValueParser::new())]
    daemon: bool,

    /// Daemon interval: <n>[d|h|m|s], bare numbers are days
    #[arg(long, env = "SCHEDULE_INTERVAL", default_value = "1d", global = true)]
    interval: String,

    /// Log level or filter directive
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Console log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Also append logs to a dated file in this directory
    #[arg(long, env = "LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug)]
struct SettingsArgs {
    /// Domain whose certificate is managed
    #[arg(long, env = "CERT_DOMAIN", global = true)]
    domain: Option<String>,

    /// Directory holding privkey.pem and fullchain.pem
    #[arg(long, env = "CERT_PATH", global = true)]
    cert_path: Option<PathBuf>,

    /// Renew when this many days or fewer remain
    #[arg(
        long,
        env = "CERT_AGE_THRESHOLD",
        default_value_t = DEFAULT_THRESHOLD_DAYS,
        global = true
    )]
    threshold_days: i64,

    /// Notification API key
    #[arg(long, env = "RESEND_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Notification API base URL
    #[arg(long, env = "RESEND_API_URL", default_value = DEFAULT_API_URL, global = true)]
    api_url: String,

    /// Sender address
    #[arg(long = "from", env = "FROM_EMAIL", global = true)]
    from_email: Option<String>,

    /// Recipient address, or a comma separated list
    #[arg(long = "to", env = "TO_EMAIL", global = true)]
    to_email: Option<String>,

    /// Sender display name
    #[arg(long, env = "SENDER_NAME", global = true)]
    sender_name: Option<String>,

    /// Delete the archive after it has been delivered
    #[arg(long, env = "CLEANUP_ZIP", global = true, value_parser = FalseyValueParser::new())]
    cleanup: bool,

    /// Log the notification instead of sending it
    #[arg(long, env = "TEST_MODE", global = true, value_parser = FalseyValueParser::new())]
    dry_run: bool,

    /// Directory for generated archives
    #[arg(long, env = "TMP_PATH", global = true)]
    output_dir: Option<PathBuf>,

    /// Renewal executable
    #[arg(long, env = "RENEWAL_COMMAND", default_value = DEFAULT_RENEWAL_COMMAND, global = true)]
    renewal_command: String,
}

impl SettingsArgs {
    fn into_raw(self) -> RawSettings {
        RawSettings {
            domain: self.domain,
            cert_path: self.cert_path,
            threshold_days: self.threshold_days,
            api_key: self.api_key,
            api_url: self.api_url,
            from_email: self.from_email,
            to_email: self.to_email,
            sender_name: self.sender_name,
            cleanup_archive: self.cleanup,
            dry_run: self.dry_run,
            output_dir: self.output_dir,
            renewal_command: self.renewal_command,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check, renew if needed, package and deliver (default)
    Run,
    /// Report certificate status; exits 1 when renewal is needed
    Check,
    /// Force a renewal and wait for the new files
    Renew,
    /// Package the certificate files into a verified archive
    Pack {
        /// Archive path instead of the generated name
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Deliver an archive; defaults to the newest generated one
    Send {
        archive: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    // Loaded before parsing so the env fallbacks below can see it
    let env_file = dotenv::dotenv();
    let cli = Cli::parse();

    let log_settings = LogSettings {
        level: cli.log_level.clone(),
        format: cli.log_format,
        dir: cli.log_dir.clone(),
    };
    if let Err(e) = logging::init(&log_settings) {
        eprintln!("certdrop: {:#}", e);
        return ExitCode::FAILURE;
    }

    match env_file {
        Ok(path) => debug!(path = %path.display(), "Loaded environment file"),
        Err(ref e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Failed to load environment file"),
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    ExitCode::from(runtime.block_on(dispatch(cli)))
}

async fn dispatch(cli: Cli) -> u8 {
    let raw = cli.settings.into_raw();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run if cli.daemon => match daemon(raw, &cli.interval).await {
            Ok(()) => 0,
            Err(e) => {
                error!(error = %format!("{:#}", e), "Daemon failed");
                1
            }
        },
        Commands::Run => one_shot(run_once(raw)).await,
        Commands::Check => one_shot(check(raw)).await,
        Commands::Renew => one_shot(renew(raw)).await,
        Commands::Pack { output } => one_shot(pack(raw, output)).await,
        Commands::Send { archive } => one_shot(send(raw, archive)).await,
    }
}

/// Run a command to completion, or stop with 130 on Ctrl-C
async fn one_shot<F>(command: F) -> u8
where
    F: Future<Output = Result<u8>>,
{
    tokio::select! {
        result = command => match result {
            Ok(code) => code,
            Err(e) => {
                error!(error = %format!("{:#}", e), "Command failed");
                println!("certdrop: failed: {:#}", e);
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted by user");
            EXIT_INTERRUPTED
        }
    }
}

async fn run_once(raw: RawSettings) -> Result<u8> {
    let config = raw.into_config()?;
    let pipeline = Pipeline::from_config(config).context("Failed to set up notifier")?;

    match pipeline.run_once().await {
        Ok(report) => {
            println!(
                "certdrop: {} delivered ({}{})",
                report.archive.file_name(),
                if report.renewed { "renewed" } else { "renewal skipped" },
                if report.delivery.dry_run { ", dry run" } else { "" }
            );
            Ok(0)
        }
        Err(e) => {
            println!("certdrop: failed while {}: {}", e.stage(), e);
            Ok(1)
        }
    }
}

async fn daemon(raw: RawSettings, interval: &str) -> Result<()> {
    let every = parse_interval(interval)?;
    let config = raw.into_config()?;
    let pipeline = Arc::new(Pipeline::from_config(config).context("Failed to set up notifier")?);

    info!(interval = %every, "Daemon mode enabled");
    let shutdown = signals::shutdown_token();

    let job = move || {
        let pipeline = pipeline.clone();
        async move {
            pipeline.run_once().await?;
            Ok::<(), anyhow::Error>(())
        }
    };

    run_daemon(job, every, shutdown).await;
    info!("Daemon stopped");
    Ok(())
}

async fn check(raw: RawSettings) -> Result<u8> {
    let settings = raw.certificate_settings()?;
    let status = evaluate(&settings.cert_dir, settings.threshold_days);

    if let Some(ref e) = status.parse_error {
        error!(error = %e, "Failed to parse certificate");
    }

    println!("certificate status for {}:", settings.domain);
    println!("  exists:        {}", status.exists);
    println!("  fresh:         {}", status.is_fresh);
    match status.days_until_expiry {
        Some(days) => println!("  expires in:    {} day(s)", days),
        None => println!("  expires in:    unknown"),
    }
    println!("  needs renewal: {}", status.needs_refresh);
    println!("  files:         {}", status.file_paths.len());

    Ok(if status.needs_refresh { 1 } else { 0 })
}

async fn renew(raw: RawSettings) -> Result<u8> {
    let settings = raw.certificate_settings()?;
    let coordinator = RenewalCoordinator::new(
        Arc::new(CommandExecutor::new(&settings.renewal_command)),
        RenewalPolicy::default(),
    );

    let report = coordinator
        .renew_and_wait(&settings.domain, &settings.cert_dir)
        .await?;
    println!(
        "certdrop: renewed {} after {} attempt(s)",
        settings.domain,
        report.attempt_count()
    );
    Ok(0)
}

async fn pack(raw: RawSettings, output: Option<PathBuf>) -> Result<u8> {
    let settings = raw.certificate_settings()?;
    let archive = ArchiveBuilder::new(settings.output_dir.clone()).build_and_verify(
        &settings.cert_dir,
        output.as_deref(),
        Some(&settings.domain),
    )?;

    println!("{}", archive.path.display());
    Ok(0)
}

async fn send(raw: RawSettings, archive: Option<PathBuf>) -> Result<u8> {
    let mail = raw.mail_settings()?;
    let domain = raw
        .domain
        .clone()
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| ConfigError::Missing(vec!["CERT_DOMAIN"]))?;

    let archive = match archive {
        Some(path) => path,
        None => {
            let dir = raw.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
            let found = latest_archive(&dir)?
                .with_context(|| format!("No certificate archive found in {}", dir.display()))?;
            info!(archive = %found.display(), "Using newest certificate archive");
            found
        }
    };

    let notifier = Arc::new(ResendNotifier::new(&mail.api_url, mail.api_key.clone())?);
    let coordinator = DeliveryCoordinator::new(notifier, mail, DeliveryPolicy::default());
    coordinator.send_with_retry(&archive, &domain).await?;

    println!("certdrop: {} sent", archive.display());
    Ok(0)
}
