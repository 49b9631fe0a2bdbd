use crate::error::ConfigError;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub recipient: String,
}

impl MailConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &'static str| lookup(key).ok_or(ConfigError::Incomplete(key));

        Ok(MailConfig {
            smtp_host: lookup("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            smtp_user: get("EMAIL_USER")?,
            smtp_pass: get("EMAIL_PASSWORD")?,
            recipient: get("EMAIL_TO")?,
        })
    }
}

/// Process settings, taken from the environment with `.env` as a fallback.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: Option<PathBuf>,
    pub port: u16,
    pub out_dir: PathBuf,
    pub mail: Option<MailConfig>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let file = fs::read_to_string(".env")
            .map(|content| parse_env_file(&content))
            .unwrap_or_default();

        Self::from_lookup(|key| {
            env::var(key)
                .ok()
                .filter(|v| !v.is_empty())
                .or_else(|| file.get(key).cloned())
        })
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => DEFAULT_PORT,
        };

        let mail = match MailConfig::from_lookup(&lookup) {
            Ok(mail) => Some(mail),
            Err(e) => {
                log::warn!("report delivery disabled: {e}");
                None
            }
        };

        Ok(Config {
            root: lookup("USER_DIR").map(PathBuf::from),
            port,
            out_dir: lookup("REPORT_DIR").map_or_else(|| PathBuf::from("."), PathBuf::from),
            mail,
        })
    }
}

/// Parses `KEY=value` lines. Blank lines and `#` comments are skipped, quotes trimmed.
#[must_use]
pub fn parse_env_file(content: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        if let Some((k, v)) = line.split_once('=') {
            let key = k.trim();
            let val = v.trim().trim_matches('"').trim_matches('\'');
            if !val.is_empty() {
                map.insert(key.to_string(), val.to_string());
            }
        }
    }

    map
}
