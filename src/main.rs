// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, debug, error, info, warn};
use std::io::Write;
use std::path::Path;

use qbsession::app_config::{Config, LogLevel};
use qbsession::errors::AppError;
use qbsession::signer::RequestSigner;
use qbsession::SessionManager;
use qbsession::session::PersistedSession;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

fn level_filter(level: &LogLevel) -> LevelFilter {
    match level {
        LogLevel::Error => LevelFilter::Error,
        LogLevel::Warn => LevelFilter::Warn,
        LogLevel::Info => LevelFilter::Info,
        LogLevel::Debug => LevelFilter::Debug,
        LogLevel::Trace => LevelFilter::Trace,
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an application session and print its token
    Create {
        /// Print the whole session as JSON instead of the token
        #[arg(long)]
        json: bool,

        /// Print the saved session snapshot instead of the token
        #[arg(long, conflicts_with = "json")]
        snapshot: bool,
    },

    /// Print signed session request parameters without sending them
    Sign {
        /// Use this nonce instead of drawing one
        #[arg(long)]
        nonce: Option<u64>,

        /// Use this unix timestamp instead of the current time
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// Generate shell completions for qbsession
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// qbsession - QuickBlox application session tool
///
/// Signs and creates application sessions against the QuickBlox REST API.
#[derive(Parser, Debug)]
#[command(name = "qbsession")]
#[command(version)]
#[command(about = "Create and sign QuickBlox application sessions")]
#[command(long_about = "qbsession signs session requests with the application secret and creates
application sessions against the QuickBlox REST API.

EXAMPLES:
    qbsession create                              # Create a session using conf.json
    qbsession create --json                       # Print the full session
    qbsession sign --nonce 42 --timestamp 1000    # Print reproducible signed parameters
    qbsession -e https://api.example.com create   # Use another API endpoint
    qbsession completions bash > qbsession.bash   # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one is created. Credentials may also come from the QB_APP_ID,
    QB_AUTH_KEY and QB_AUTH_SECRET environment variables. With
    session_management.enable set, created sessions are saved to
    session_management.snapshot_path and reused until they are
    expired_time_hours old.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    /// API endpoint override
    #[arg(short, long, global = true)]
    endpoint: Option<String>,

    /// Application id override
    #[arg(long, env = "QB_APP_ID", global = true)]
    app_id: Option<String>,

    /// Authorization key override
    #[arg(long, env = "QB_AUTH_KEY", global = true)]
    auth_key: Option<String>,

    /// Authorization secret override
    #[arg(long, env = "QB_AUTH_SECRET", hide_env_values = true, global = true)]
    auth_secret: Option<String>,
}

// @struct: Logger writing coloured lines to stderr
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour code and tag for a level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("1;31", "ERROR"),
            Level::Warn => ("1;33", "WARN "),
            Level::Info => ("1;32", "INFO "),
            Level::Debug => ("1;36", "DEBUG"),
            Level::Trace => ("1;35", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (colour, tag) = Self::style_for_level(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {} {}\x1B[0m",
                colour,
                now,
                tag,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Accept everything here; the effective level is set once options are known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "qbsession", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Create { json, snapshot } => run_create(&config, json, snapshot).await,
        Commands::Sign { nonce, timestamp } => run_sign(&config, nonce, timestamp),
        Commands::Completions { .. } => Ok(()),
    }
}

/// Load or create the configuration and apply command line overrides
fn load_config(options: &CommandLineOptions) -> Result<Config> {
    let config_path = &options.config_path;

    let mut config = if Path::new(config_path).exists() {
        Config::from_file(config_path)?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        config.save(config_path)?;
        config
    };

    if let Some(endpoint) = &options.endpoint {
        config.api.endpoint = endpoint.clone();
    }
    if let Some(app_id) = &options.app_id {
        config.credentials.application_id = app_id.clone();
    }
    if let Some(auth_key) = &options.auth_key {
        config.credentials.auth_key = auth_key.clone();
    }
    if let Some(auth_secret) = &options.auth_secret {
        config.credentials.auth_secret = auth_secret.clone();
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    log::set_max_level(level_filter(&config.log_level));
    debug!("Using session endpoint {}", config.api.endpoint);

    Ok(config)
}

async fn run_create(config: &Config, json: bool, snapshot: bool) -> Result<()> {
    let management = &config.session_management;

    // A reused session only carries the saved token, so --json always creates
    if management.enable && !json {
        if let Some(saved) = load_snapshot(&management.snapshot_path)? {
            if management.is_reusable(&saved, &config.credentials) {
                info!("Reusing saved session {}", saved.token.chars().take(8).collect::<String>());
                if snapshot {
                    println!("{}", serde_json::to_string_pretty(&saved)?);
                } else {
                    println!("{}", saved.token);
                }
                return Ok(());
            }
            debug!("Saved session in {} is not reusable", management.snapshot_path);
        }
    }

    let manager = SessionManager::from_config(config)?;

    let token = match manager.create_session().await {
        Ok(token) => token,
        Err(e) => {
            error!("Could not create a session: {}", e);
            return Err(AppError::Session(e).into());
        }
    };

    let saved = manager.snapshot().context("Session missing after creation")?;
    if management.enable {
        save_snapshot(&management.snapshot_path, &saved)?;
    }

    if json {
        let session = manager.session().context("Session missing after creation")?;
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else if snapshot {
        println!("{}", serde_json::to_string_pretty(&saved)?);
    } else {
        println!("{}", token);
    }

    Ok(())
}

/// Read a saved session; a missing or unreadable file counts as none
fn load_snapshot(path: &str) -> Result<Option<PersistedSession>> {
    if !Path::new(path).exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read session snapshot: {}", path))?;

    match serde_json::from_str(&content) {
        Ok(saved) => Ok(Some(saved)),
        Err(e) => {
            warn!("Ignoring unreadable session snapshot {}: {}", path, e);
            Ok(None)
        }
    }
}

fn save_snapshot(path: &str, saved: &PersistedSession) -> Result<()> {
    let json = serde_json::to_string_pretty(saved).context("Failed to serialize session snapshot")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write session snapshot: {}", path))?;
    debug!("Saved session snapshot to {}", path);
    Ok(())
}

fn run_sign(config: &Config, nonce: Option<u64>, timestamp: Option<i64>) -> Result<()> {
    let strategy = config.signing.nonce_strategy;
    let signer = RequestSigner::new(strategy);

    let nonce = nonce.unwrap_or_else(|| strategy.draw());
    let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());

    let signed = signer
        .sign_at(&config.credentials, nonce, timestamp)
        .map_err(AppError::Session)?;

    println!("{}", serde_json::to_string_pretty(&signed)?);
    Ok(())
}
