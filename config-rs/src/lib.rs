//! config-rs/lib.rs
//! Environment-driven configuration for the portal gateway
//! Provides bind address helpers and the typed `PortalConfig`

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub mod framing;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STATIC_DIR: &str = "dist";
pub const DEFAULT_LEAVE_SHEET_URL: &str = "https://docs.google.com/spreadsheets/d/1u7d5pvO67tyaVbysQ6bh9pJ1kx54GIOP8OCtvBbVwoM/export?format=csv&gid=490918540";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Configuration rejected: {0}")]
    Rejected(String),
}

/// Parse an optional raw value, reporting the key on failure
pub fn parse_value<T: FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>, ConfigError> {
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
    }
}

/// Parse a boolean flag accepting the usual spellings
pub fn parse_flag(key: &str, raw: Option<String>) -> Result<Option<bool>, ConfigError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => match v.as_str() {
            "true" | "yes" | "1" | "on" => Ok(Some(true)),
            "false" | "no" | "0" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: v,
            }),
        },
    }
}

fn value_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T
where
    T: std::fmt::Display + Copy,
{
    parse_value::<T>(key, raw)
        .unwrap_or_else(|err| {
            log::warn!("{}, using default {}", err, default);
            None
        })
        .unwrap_or(default)
}

/// Load a `.env` file into the process environment when one is present
///
/// Variables already set in the environment win over the file.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenv::dotenv().ok()
}

/// `BIND_ADDR` may hold a bare IP (`127.0.0.1`) or a full `host:port` pair;
/// a bare IP is combined with `PORT`.
fn resolve_bind_address(bind: Option<String>, port: Option<String>, default_port: u16) -> SocketAddr {
    let port = value_or("PORT", port, default_port);

    if let Some(addr_str) = bind.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        if let Ok(addr) = addr_str.parse::<SocketAddr>() {
            return addr;
        }
        if let Ok(ip) = addr_str.parse::<IpAddr>() {
            return SocketAddr::new(ip, port);
        }
        log::warn!("Invalid address format in BIND_ADDR ('{}'), using default", addr_str);
    }

    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)
}

/// Upstream generative-model settings
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_GEMINI_API_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }
}

/// Published spreadsheet used for leave balance lookups
#[derive(Debug, Clone)]
pub struct LeaveSheetConfig {
    pub sheet_url: String,
    /// Rows without a credential cell match on name alone.
    pub allow_missing_credential: bool,
}

impl Default for LeaveSheetConfig {
    fn default() -> Self {
        Self {
            sheet_url: DEFAULT_LEAVE_SHEET_URL.to_string(),
            allow_missing_credential: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub bind_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub upstream: UpstreamConfig,
    pub leave: LeaveSheetConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            upstream: UpstreamConfig::default(),
            leave: LeaveSheetConfig::default(),
        }
    }
}

impl PortalConfig {
    /// Build the configuration from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    ///
    /// Invalid values are logged and replaced by their defaults; an absent
    /// `GEMINI_API_KEY` is not an error here, relay calls fail at request time.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = resolve_bind_address(lookup("BIND_ADDR"), lookup("PORT"), DEFAULT_PORT);

        let timeout_secs = value_or(
            "UPSTREAM_TIMEOUT_SECS",
            lookup("UPSTREAM_TIMEOUT_SECS"),
            DEFAULT_UPSTREAM_TIMEOUT_SECS,
        );

        let allow_missing_credential = parse_flag(
            "LEAVE_ALLOW_MISSING_CREDENTIAL",
            lookup("LEAVE_ALLOW_MISSING_CREDENTIAL"),
        )
        .unwrap_or_else(|err| {
            log::warn!("{}, keeping the permissive default", err);
            None
        })
        .unwrap_or(true);

        let api_key = non_empty("GEMINI_API_KEY");
        if api_key.is_none() {
            log::warn!("GEMINI_API_KEY is not set; AI relay calls will answer with fallbacks");
        }

        Self {
            bind_addr,
            static_dir: non_empty("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
            upstream: UpstreamConfig {
                api_key,
                api_url: non_empty("GEMINI_API_URL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_API_URL.to_string()),
                model: non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                timeout: Duration::from_secs(timeout_secs),
            },
            leave: LeaveSheetConfig {
                sheet_url: non_empty("LEAVE_SHEET_URL")
                    .unwrap_or_else(|| DEFAULT_LEAVE_SHEET_URL.to_string()),
                allow_missing_credential,
            },
        }
    }

    /// Reject combinations the gateway cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.timeout.is_zero() {
            return Err(ConfigError::Rejected(
                "UPSTREAM_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        if !self.leave.sheet_url.starts_with("http://") && !self.leave.sheet_url.starts_with("https://") {
            return Err(ConfigError::Rejected(format!(
                "LEAVE_SHEET_URL must be an http(s) URL, got '{}'",
                self.leave.sheet_url
            )));
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.upstream.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = PortalConfig::from_lookup(|_| None);
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert!(config.bind_addr.ip().is_unspecified());
        assert_eq!(config.upstream.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.upstream.timeout, Duration::from_secs(30));
        assert!(config.upstream.api_key.is_none());
        assert!(config.leave.allow_missing_credential);
        assert_eq!(config.static_dir, PathBuf::from("dist"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_values_from_lookup() {
        let config = PortalConfig::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("BIND_ADDR", "127.0.0.1"),
            ("GEMINI_API_KEY", "  secret  "),
            ("GEMINI_MODEL", "gemini-1.5-flash"),
            ("UPSTREAM_TIMEOUT_SECS", "5"),
            ("LEAVE_ALLOW_MISSING_CREDENTIAL", "off"),
            ("STATIC_DIR", "/srv/portal"),
        ]));

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.upstream.api_key.as_deref(), Some("secret"));
        assert_eq!(config.upstream.model, "gemini-1.5-flash");
        assert_eq!(config.upstream.timeout, Duration::from_secs(5));
        assert!(!config.leave.allow_missing_credential);
        assert_eq!(config.static_dir, PathBuf::from("/srv/portal"));
        assert!(config.has_api_key());
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = PortalConfig::from_lookup(lookup_from(&[
            ("PORT", "not-a-port"),
            ("UPSTREAM_TIMEOUT_SECS", "soon"),
            ("LEAVE_ALLOW_MISSING_CREDENTIAL", "maybe"),
            ("BIND_ADDR", "nowhere"),
            ("GEMINI_API_KEY", "   "),
        ]));

        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.upstream.timeout, Duration::from_secs(30));
        assert!(config.leave.allow_missing_credential);
        assert!(config.upstream.api_key.is_none());
    }

    #[test]
    fn test_full_bind_address_override() {
        let addr = resolve_bind_address(Some("10.0.0.2:7000".to_string()), Some("9000".to_string()), 8080);
        assert_eq!(addr, "10.0.0.2:7000".parse().unwrap());
    }

    #[test]
    fn test_parse_flag_spellings() {
        assert_eq!(parse_flag("X", Some("Yes".to_string())), Ok(Some(true)));
        assert_eq!(parse_flag("X", Some("0".to_string())), Ok(Some(false)));
        assert_eq!(parse_flag("X", None), Ok(None));
        assert!(parse_flag("X", Some("perhaps".to_string())).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout_and_bad_sheet_url() {
        let mut config = PortalConfig::default();
        config.upstream.timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = PortalConfig::default();
        config.leave.sheet_url = "ftp://sheet".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Rejected(_))));
    }
}
