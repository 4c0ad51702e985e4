use std::path::PathBuf;

use clap::{Args, ValueEnum};

use crate::error::{Error, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:////app/data/db.sqlite3";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Runtime settings. Every field can come from a flag or its environment variable.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Storage connection string (sqlite:////abs/path, sqlite:///rel/path or a plain path)
    #[arg(long, global = true, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Address the webhook listener binds to
    #[arg(long, global = true, env = "WEBHOOK_HOST", default_value = "0.0.0.0")]
    pub webhook_host: String,

    /// Port the webhook listener binds to
    #[arg(long, global = true, env = "WEBHOOK_PORT", default_value_t = 8080)]
    pub webhook_port: u16,

    /// Shared secret payment providers must present (empty disables the check)
    #[arg(long, global = true, env = "WEBHOOK_TOKEN", hide_env_values = true)]
    pub webhook_token: Option<String>,

    /// Telegram bot token (without it only the webhook listener runs)
    #[arg(long, global = true, env = "BOT_TOKEN", hide_env_values = true)]
    pub bot_token: Option<String>,

    /// Comma-separated Telegram user ids with admin rights
    #[arg(long, global = true, env = "ADMIN_IDS")]
    pub admin_ids: Option<String>,

    /// Contact shown to users asking for support
    #[arg(long, global = true, env = "SUPPORT_CONTACT")]
    pub support_contact: Option<String>,

    /// Base URL of the Telegram Bot API
    #[arg(long, global = true, env = "TELEGRAM_API_URL", default_value = DEFAULT_TELEGRAM_API_URL)]
    pub telegram_api_url: String,

    /// Log output format
    #[arg(long, global = true, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

impl Config {
    pub fn database_location(&self) -> Result<DatabaseLocation> {
        parse_database_url(&self.database_url)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.webhook_host, self.webhook_port)
    }

    pub fn webhook_token(&self) -> Option<&str> {
        non_empty(self.webhook_token.as_deref())
    }

    pub fn bot_token(&self) -> Option<&str> {
        non_empty(self.bot_token.as_deref())
    }

    pub fn support_contact(&self) -> Option<&str> {
        non_empty(self.support_contact.as_deref())
    }

    pub fn admin_ids(&self) -> Result<Vec<i64>> {
        parse_admin_ids(self.admin_ids.as_deref().unwrap_or(""))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Resolve a SQLAlchemy-style `sqlite://` URL (or a bare path) to a location.
pub fn parse_database_url(url: &str) -> Result<DatabaseLocation> {
    let url = url.trim();
    let url = url.split_once('?').map_or(url, |(head, _)| head);

    let rest = match url.split_once("://") {
        Some((scheme, rest)) => {
            if !scheme.eq_ignore_ascii_case("sqlite") && !scheme.to_ascii_lowercase().starts_with("sqlite+") {
                return Err(Error::Config(format!(
                    "unsupported database scheme '{scheme}', only sqlite is supported"
                )));
            }
            rest
        }
        None if url.is_empty() => {
            return Err(Error::Config("DATABASE_URL is empty".to_string()));
        }
        None => return Ok(DatabaseLocation::File(PathBuf::from(url))),
    };

    // sqlite:// has an empty authority; everything after the next slash is the path.
    let path = match rest.strip_prefix('/') {
        Some(path) => path,
        None if rest.is_empty() => return Ok(DatabaseLocation::Memory),
        None => {
            return Err(Error::Config(format!(
                "sqlite URL must not have a host part: {url}"
            )));
        }
    };

    if path.is_empty() || path == ":memory:" {
        return Ok(DatabaseLocation::Memory);
    }
    Ok(DatabaseLocation::File(PathBuf::from(path)))
}

/// Parse `ADMIN_IDS`; blank entries and zero are skipped.
pub fn parse_admin_ids(raw: &str) -> Result<Vec<i64>> {
    let mut ids = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let id: i64 = part
            .parse()
            .map_err(|_| Error::Config(format!("invalid admin id in ADMIN_IDS: {part}")))?;
        if id != 0 {
            ids.push(id);
        }
    }
    Ok(ids)
}
