use aadds::azure::client::format_arm_error;
use aadds::azure::AzureClient;
use aadds::config::Config;
use aadds::resource::registry::{effective_schema, AAD_DIAGNOSTIC_SETTING};
use aadds::resource::validate::decode_config;
use aadds::resource::{AadDiagnosticSettingResource, DiagnosticSettingState, ResourceError};
use aadds::VERSION;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Manage Azure Active Directory diagnostic settings
#[derive(Parser, Debug)]
#[command(name = "aadds", version, about, long_about = None)]
struct Args {
    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Resource Manager endpoint (overrides config and environment)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Use the 4.0 resource shape (no `log` block)
    #[arg(long = "features-4-0", global = true)]
    features_4_0: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the effective resource schema as JSON
    Schema,

    /// Validate a YAML or JSON resource document
    Validate {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Create or update the setting described by a resource document
    Apply {
        #[arg(short, long)]
        file: PathBuf,
        /// State file read before and written after the change
        #[arg(long, default_value = "aadds.state.json")]
        state: PathBuf,
    },

    /// Read a setting and print its state
    Show { name: String },

    /// Delete a setting and wait until it is gone
    Delete {
        name: String,
        /// State file to remove once the setting is gone
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Import an existing setting into a state file
    Import {
        id: String,
        #[arg(long, default_value = "aadds.state.json")]
        state: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> Option<&'static str> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some("error"),
            LogLevel::Warn => Some("warn"),
            LogLevel::Info => Some("info"),
            LogLevel::Debug => Some("debug"),
            LogLevel::Trace => Some("trace"),
        }
    }
}

/// Local record of a managed setting
#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    resource_type: String,
    updated_at: DateTime<Utc>,
    state: DiagnosticSettingState,
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(filter) = level.as_filter() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    // HTTP stack internals stay at warn unless asked for explicitly
    let filter = EnvFilter::try_from_env("AADDS_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,aadds={}", filter)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("aadds {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("aadds").join("aadds.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".aadds").join("aadds.log");
    }
    PathBuf::from("aadds.log")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _log_guard = match setup_logging(args.log_level) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Warning: logging disabled: {err:#}");
            None
        }
    };

    if let Err(err) = run(args).await {
        eprintln!("Error: {err:#}");
        if let Some(api) = err
            .downcast_ref::<ResourceError>()
            .and_then(|e| e.api_error())
        {
            eprintln!("{}", format_arm_error(api));
        }
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load();
    if let Some(endpoint) = &args.endpoint {
        config.management_endpoint = Some(endpoint.clone());
    }
    if args.features_4_0 {
        config.features.four_point_oh_beta = true;
    }
    let features = config.features;

    match args.command {
        Command::Schema => {
            let schema = effective_schema(AAD_DIAGNOSTIC_SETTING, features)
                .context("No schema registered")?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Command::Validate { file } => {
            let document = read_document(&file)?;
            let schema = effective_schema(AAD_DIAGNOSTIC_SETTING, features)
                .context("No schema registered")?;
            let validated = decode_config(&schema, &document)?;
            print_warnings(&validated.warnings);
            println!("{}: valid", file.display());
        }
        Command::Apply { file, state } => {
            let resource = build_resource(&config)?;
            let document = read_document(&file)?;
            let validated = resource.decode(&document)?;
            print_warnings(&validated.warnings);
            let desired = validated.value;

            let current = match load_state(&state)? {
                Some(prior) => resource.read(&prior.state.id).await?,
                None => None,
            };

            let new_state = match current {
                None => resource.create(&desired).await?,
                Some(current) => {
                    let replace = resource.replacement_fields(&current, &desired);
                    if replace.is_empty() {
                        resource.update(&current.id, &current, &desired).await?
                    } else {
                        tracing::info!("replacing {}: {} changed", current.id, replace.join(", "));
                        eprintln!("{} must be replaced ({} changed)", current.id, replace.join(", "));
                        resource.delete(&current.id).await?;
                        resource.create(&desired).await?
                    }
                }
            };

            save_state(&state, &new_state)?;
            println!("{}", serde_json::to_string_pretty(&new_state)?);
        }
        Command::Show { name } => {
            let resource = build_resource(&config)?;
            let id = aadds::azure::ids::AadDiagnosticSettingId::new(&name).id();
            match resource.read(&id).await? {
                Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
                None => anyhow::bail!("{} does not exist", id),
            }
        }
        Command::Delete { name, state } => {
            let resource = build_resource(&config)?;
            let id = aadds::azure::ids::AadDiagnosticSettingId::new(&name).id();
            resource.delete(&id).await?;
            if let Some(path) = state.filter(|p| p.exists()) {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {:?}", path))?;
            }
            println!("{} deleted", id);
        }
        Command::Import { id, state } => {
            let resource = build_resource(&config)?;
            if load_state(&state)?.is_some() {
                anyhow::bail!("{:?} already tracks a setting", state);
            }
            let imported = resource.import(&id).await?;
            save_state(&state, &imported)?;
            println!("{}", serde_json::to_string_pretty(&imported)?);
        }
    }

    Ok(())
}

fn build_resource(config: &Config) -> Result<AadDiagnosticSettingResource<AzureClient>> {
    let client = AzureClient::new(
        &config.credential_source(),
        &config.effective_management_endpoint(),
        &config.effective_login_endpoint(),
    )?;
    let resource = AadDiagnosticSettingResource::new(client, config.features);
    let defaults = resource.timeouts();
    Ok(resource.with_timeouts(config.timeouts(defaults)))
}

/// YAML is a superset of JSON, so one parser reads both
fn read_document(path: &Path) -> Result<Value> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
}

fn print_warnings(warnings: &[aadds::resource::validate::Diagnostic]) {
    for warning in warnings {
        eprintln!("{}", warning);
    }
}

fn load_state(path: &Path) -> Result<Option<StateFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let state: StateFile = serde_json::from_str(&content)
        .with_context(|| format!("Malformed state file {:?}", path))?;
    Ok(Some(state))
}

fn save_state(path: &Path, state: &DiagnosticSettingState) -> Result<()> {
    let file = StateFile {
        resource_type: AAD_DIAGNOSTIC_SETTING.to_string(),
        updated_at: Utc::now(),
        state: state.clone(),
    };
    let content = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;
    tracing::debug!("state written to {:?}", path);
    Ok(())
}

