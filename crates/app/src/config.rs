use clap::{Parser, ValueEnum};
use serde::Deserialize;

use crate::{
    commands::Command,
    error::{AppError, Result},
};

const DEFAULT_CONFIG_PATH: &str = "config/gestio.toml";
const ENV_PREFIX: &str = "GESTIO";
/// The password is only ever taken from here.
pub const PASSWORD_ENV: &str = "GESTIO_PASSWORD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Hosted database gateway.
    Rest,
    /// In-process store; nothing survives the process.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: Backend,
    pub base_url: String,
    pub api_key: String,
    pub email: String,
    pub timezone: String,
    pub settings_path: String,
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Rest,
            base_url: "http://127.0.0.1:54321".to_string(),
            api_key: String::new(),
            email: String::new(),
            timezone: "UTC".to_string(),
            settings_path: engine::DEFAULT_SETTINGS_PATH.to_string(),
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse()
            .map_err(|_| AppError::Timezone(self.timezone.clone()))
    }
}

#[derive(Debug, Parser)]
#[command(name = "gestio", about = "Budgets, cash flow and logistics from the terminal")]
pub struct Args {
    /// Optional config file path (TOML).
    #[arg(long, global = true)]
    config: Option<String>,
    /// Override the store backend.
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,
    /// Override base URL of the database gateway.
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Override the project API key.
    #[arg(long, global = true)]
    api_key: Option<String>,
    /// Override the sign-in email (password is never read from CLI).
    #[arg(long, global = true)]
    email: Option<String>,
    /// Override timezone (IANA name) used for day buckets.
    #[arg(long, global = true)]
    timezone: Option<String>,
    /// Override the user settings file.
    #[arg(long, global = true)]
    settings_path: Option<String>,
    /// Override the log level.
    #[arg(long, global = true)]
    level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

pub fn load() -> Result<(AppConfig, Command)> {
    let args = Args::parse();

    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));
    let mut settings: AppConfig = builder.build()?.try_deserialize()?;

    if let Some(backend) = args.backend {
        settings.backend = backend;
    }
    if let Some(base_url) = args.base_url {
        settings.base_url = base_url;
    }
    if let Some(api_key) = args.api_key {
        settings.api_key = api_key;
    }
    if let Some(email) = args.email {
        settings.email = email;
    }
    if let Some(timezone) = args.timezone {
        settings.timezone = timezone;
    }
    if let Some(settings_path) = args.settings_path {
        settings.settings_path = settings_path;
    }
    if let Some(level) = args.level {
        settings.level = level;
    }

    Ok((settings, args.command))
}

pub fn password() -> Option<String> {
    std::env::var(PASSWORD_ENV)
        .ok()
        .filter(|password| !password.is_empty())
}
