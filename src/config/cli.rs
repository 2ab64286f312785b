use crate::config::toml_config::NotifierConfig;
use crate::utils::error::{NotifierError, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "birthday-notifier")]
#[command(about = "Daily customer birthday alerts delivered to a Telegram chat")]
pub struct CliConfig {
    #[arg(long, global = true, help = "TOML config file; environment variables are used when omitted")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit JSON log lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Match today's and upcoming birthdays and send notifications
    Run {
        #[arg(long, help = "Format and log messages without sending them")]
        dry_run: bool,

        #[arg(long, help = "Pin the current instant (RFC 3339), e.g. 2025-03-10T06:00:00Z")]
        now: Option<String>,
    },
    /// Verify record source access and Telegram credentials
    Check {
        #[arg(long, help = "Also send a test message to the configured chat")]
        send_test: bool,
    },
}

impl CliConfig {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run {
            dry_run: false,
            now: None,
        })
    }

    pub fn load_config(&self) -> Result<NotifierConfig> {
        match &self.config {
            Some(path) => NotifierConfig::from_file(path),
            None => NotifierConfig::from_env(),
        }
    }
}

pub fn parse_now(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| NotifierError::InvalidConfigValueError {
            field: "--now".to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}
