/*
 * Responsibility
 * - 環境変数 (.env) からの設定読み込み (AUTH_*, DIRECTORY_*, CATALOG_PATH など)
 * - 設定値のバリデーション (不足・矛盾があれば起動失敗)
 * - AuthConfig / DirectoryConfig は起動後 immutable。グローバルには置かず、明示的に渡す
 */
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
    Malformed { key: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
            ConfigError::Malformed { key, reason } => {
                write!(f, "invalid configuration: {}: {}", key, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// `auth.jwtToken.*`
#[derive(Clone, Default)]
pub struct JwtTokenConfig {
    pub encrypt_key: Option<String>,
    pub check_service_name: bool,
}

impl fmt::Debug for JwtTokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("JwtTokenConfig")
            .field("encrypt_key", &self.encrypt_key.as_ref().map(|_| "<redacted>"))
            .field("check_service_name", &self.check_service_name)
            .finish()
    }
}

/// `auth.basic.*`
#[derive(Clone, Default)]
pub struct BasicAuthConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for BasicAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Authentication settings consumed by the auth engine.
#[derive(Clone)]
pub struct AuthConfig {
    pub enabled: bool,
    pub permanent_server_tokens: Vec<String>,
    pub jwt: JwtTokenConfig,
    pub basic: BasicAuthConfig,
    // Expected `service` claim when `jwt.check_service_name` is on.
    pub service_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            permanent_server_tokens: Vec::new(),
            jwt: JwtTokenConfig::default(),
            basic: BasicAuthConfig::default(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("enabled", &self.enabled)
            .field(
                "permanent_server_tokens",
                &format_args!("[{} redacted]", self.permanent_server_tokens.len()),
            )
            .field("jwt", &self.jwt)
            .field("basic", &self.basic)
            .field("service_name", &self.service_name)
            .finish()
    }
}

/// One entry of `directory.domains`.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryDomainConfig {
    pub controllers: Vec<String>,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub base_dn: Option<String>,
    #[serde(default)]
    pub default: bool,
}

impl fmt::Debug for DirectoryDomainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryDomainConfig")
            .field("controllers", &self.controllers)
            .field("username", &self.username)
            .field("base_dn", &self.base_dn)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub domains: BTreeMap<String, DirectoryDomainConfig>,
    pub group_cache_ttl: Duration,
    pub dn_cache_ttl: Duration,
    pub timeout: Duration,
    // Shared Valkey cache instead of the in-process one.
    pub cache_url: Option<String>,
}

impl DirectoryConfig {
    /// Multiple domains need exactly one `default`; every domain needs a controller.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domains.is_empty() {
            return Err(ConfigError::Malformed {
                key: "DIRECTORY_DOMAINS",
                reason: "no domains configured".to_string(),
            });
        }

        for (name, domain) in &self.domains {
            if domain.controllers.iter().all(|c| c.trim().is_empty()) {
                return Err(ConfigError::Malformed {
                    key: "DIRECTORY_DOMAINS",
                    reason: format!("domain '{}' has no controllers", name),
                });
            }
        }

        if self.domains.len() > 1 {
            let defaults = self.domains.values().filter(|d| d.default).count();
            if defaults != 1 {
                return Err(ConfigError::Malformed {
                    key: "DIRECTORY_DOMAINS",
                    reason: format!(
                        "exactly one domain must be marked default, found {}",
                        defaults
                    ),
                });
            }
        }

        Ok(())
    }
}

pub const DEFAULT_SERVICE_NAME: &str = "mcp-server";

pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    pub auth: AuthConfig,
    pub directory: Option<DirectoryConfig>,
    pub catalog_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (env in production, a map in tests).
    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = var("PORT").and_then(|s| s.parse().ok()).unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(var("APP_ENV"));

        let cors_allowed_origins = split_list(var("CORS_ALLOWED_ORIGINS"));

        let auth = AuthConfig {
            enabled: parse_bool(var("AUTH_ENABLED"), "AUTH_ENABLED")?.unwrap_or(true),
            permanent_server_tokens: split_list(var("AUTH_PERMANENT_SERVER_TOKENS")),
            jwt: JwtTokenConfig {
                encrypt_key: non_empty(var("AUTH_JWT_ENCRYPT_KEY")),
                check_service_name: parse_bool(
                    var("AUTH_JWT_CHECK_SERVICE_NAME"),
                    "AUTH_JWT_CHECK_SERVICE_NAME",
                )?
                .unwrap_or(false),
            },
            basic: BasicAuthConfig {
                username: non_empty(var("AUTH_BASIC_USERNAME")),
                password: non_empty(var("AUTH_BASIC_PASSWORD")),
            },
            service_name: non_empty(var("SERVICE_NAME"))
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
        };

        let directory = match non_empty(var("DIRECTORY_DOMAINS")) {
            Some(raw) => {
                let domains: BTreeMap<String, DirectoryDomainConfig> =
                    serde_json::from_str(&raw).map_err(|e| ConfigError::Malformed {
                        key: "DIRECTORY_DOMAINS",
                        reason: e.to_string(),
                    })?;

                let directory = DirectoryConfig {
                    domains,
                    group_cache_ttl: parse_millis(
                        var("DIRECTORY_GROUP_CACHE_TTL_MS"),
                        "DIRECTORY_GROUP_CACHE_TTL_MS",
                        600_000, // 10 min
                    )?,
                    dn_cache_ttl: parse_millis(
                        var("DIRECTORY_DN_CACHE_TTL_MS"),
                        "DIRECTORY_DN_CACHE_TTL_MS",
                        86_400_000, // 24 h
                    )?,
                    timeout: parse_millis(
                        var("DIRECTORY_TIMEOUT_MS"),
                        "DIRECTORY_TIMEOUT_MS",
                        5_000,
                    )?,
                    cache_url: non_empty(var("DIRECTORY_CACHE_URL")),
                };
                directory.validate()?;
                Some(directory)
            }
            None => None,
        };

        let catalog_path = non_empty(var("CATALOG_PATH")).map(PathBuf::from);

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            auth,
            directory,
            catalog_path,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(value: Option<String>, key: &'static str) -> Result<Option<bool>, ConfigError> {
    match non_empty(value) {
        None => Ok(None),
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid(key)),
        },
    }
}

fn parse_millis(
    value: Option<String>,
    key: &'static str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    match non_empty(value) {
        None => Ok(Duration::from_millis(default_ms)),
        Some(v) => v
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::Invalid(key)),
    }
}
