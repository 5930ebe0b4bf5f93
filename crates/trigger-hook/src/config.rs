use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use trigger_types::{RoutesError, RoutingTables};

use crate::env::ReadEnv;

const DEFAULT_PORT: u16 = 5019;
const DEFAULT_PATH: &str = "/";
const DEFAULT_TRIGGER_BIN: &str = "./trigger";
const DEFAULT_TRIGGER_TIMEOUT_SECS: u64 = 600;
const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024; // GitHub caps payloads at 25 MB

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GH_SECRET is not set (set HOOK_ALLOW_UNSIGNED=true to run without signature checks)")]
    MissingSecret,

    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read routes file {path}: {source}")]
    ReadRoutes {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid routes file {path}: {source}")]
    Routes {
        path: PathBuf,
        #[source]
        source: RoutesError,
    },
}

/// Settings the HTTP endpoint needs. Immutable once the server starts.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// The only path requests are accepted on.
    pub path: String,
    /// Shared HMAC secret. `None` disables signature verification.
    pub secret: Option<String>,
    pub ignore_tags: bool,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
            secret: None,
            ignore_tags: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// How the external trigger executable is run.
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    pub bin: PathBuf,
    pub timeout: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            bin: PathBuf::from(DEFAULT_TRIGGER_BIN),
            timeout: Duration::from_secs(DEFAULT_TRIGGER_TIMEOUT_SECS),
        }
    }
}

/// Configuration for the webhook bridge.
///
/// Resolved from environment variables:
/// - `GH_SECRET`: HMAC-SHA1 secret configured on the GitHub webhook
/// - `HOOK_ALLOW_UNSIGNED`: start without `GH_SECRET` (default: false)
/// - `HOOK_PORT`: HTTP listening port (default: 5019)
/// - `HOOK_PATH`: accepted request path (default: `/`)
/// - `HOOK_IGNORE_TAGS`: skip tag pushes (default: true)
/// - `HOOK_TRIGGER_BIN`: trigger executable (default: `./trigger`)
/// - `HOOK_TRIGGER_TIMEOUT_SECS`: per-trigger timeout (default: 600)
/// - `HOOK_MAX_BODY_BYTES`: request body limit (default: 25 MiB)
/// - `HOOK_ROUTES_FILE`: JSON routing tables (default: built-in vitasdk tables)
#[derive(Debug, Clone)]
pub struct HookConfig {
    pub server: ServerConfig,
    pub trigger: TriggerConfig,
    pub routes_file: Option<PathBuf>,
}

impl HookConfig {
    pub fn from_env<E: ReadEnv>(env: &E) -> Result<Self, ConfigError> {
        let secret = env
            .var("GH_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let allow_unsigned = parse_bool(env, "HOOK_ALLOW_UNSIGNED")?.unwrap_or(false);
        if secret.is_none() && !allow_unsigned {
            return Err(ConfigError::MissingSecret);
        }

        let path = env
            .var("HOOK_PATH")
            .unwrap_or_else(|_| DEFAULT_PATH.to_string());
        if !path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                var: "HOOK_PATH",
                value: path,
                reason: "must start with '/'".into(),
            });
        }

        let timeout_secs =
            parse_num::<u64, _>(env, "HOOK_TRIGGER_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TRIGGER_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                var: "HOOK_TRIGGER_TIMEOUT_SECS",
                value: timeout_secs.to_string(),
                reason: "must be >= 1".into(),
            });
        }

        Ok(Self {
            server: ServerConfig {
                port: parse_num(env, "HOOK_PORT")?.unwrap_or(DEFAULT_PORT),
                path,
                secret,
                ignore_tags: parse_bool(env, "HOOK_IGNORE_TAGS")?.unwrap_or(true),
                max_body_bytes: parse_num(env, "HOOK_MAX_BODY_BYTES")?
                    .unwrap_or(DEFAULT_MAX_BODY_BYTES),
            },
            trigger: TriggerConfig {
                bin: env
                    .var("HOOK_TRIGGER_BIN")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_TRIGGER_BIN)),
                timeout: Duration::from_secs(timeout_secs),
            },
            routes_file: env.var("HOOK_ROUTES_FILE").ok().map(PathBuf::from),
        })
    }

    /// Routing tables from `routes_file`, or the built-in vitasdk tables.
    pub fn load_routing(&self) -> Result<RoutingTables, ConfigError> {
        let Some(path) = &self.routes_file else {
            return Ok(RoutingTables::vitasdk());
        };

        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadRoutes {
            path: path.clone(),
            source,
        })?;
        RoutingTables::from_json(&json).map_err(|source| ConfigError::Routes {
            path: path.clone(),
            source,
        })
    }
}

fn parse_num<T, E>(env: &E, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    E: ReadEnv,
{
    let Ok(raw) = env.var(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        })
}

fn parse_bool<E: ReadEnv>(env: &E, var: &'static str) -> Result<Option<bool>, ConfigError> {
    let Ok(raw) = env.var(var) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: raw,
            reason: "expected true or false".into(),
        }),
    }
}
