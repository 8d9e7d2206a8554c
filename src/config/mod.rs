//! Configuration management
//!
//! Configuration is loaded once at startup and handed to the application
//! state. Sources, in order of precedence (later wins):
//! - built-in defaults
//! - `config.yml`
//! - a `.env` file (only when `APPENV=local`)
//! - process environment variables
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration
    #[serde(default)]
    pub app: AppConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// CORS configuration
    #[serde(default)]
    pub cors: CorsConfig,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Display name used in the welcome message
    #[serde(default = "default_app_name")]
    pub name: String,
    /// Deployment environment
    #[serde(default)]
    pub env: AppEnv,
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            env: AppEnv::default(),
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_app_name() -> String {
    "Omnitags".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    /// Developer machine; loads `.env`
    #[default]
    Local,
    Development,
    Production,
}

impl AppEnv {
    /// Default `tracing` filter for this environment.
    ///
    /// Production keeps SQL statement logging off.
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            AppEnv::Production => "omnitags=info,tower_http=info,sqlx=warn",
            AppEnv::Local | AppEnv::Development => "omnitags=debug,tower_http=debug,sqlx=info",
        }
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppEnv::Local => write!(f, "local"),
            AppEnv::Development => write!(f, "development"),
            AppEnv::Production => write!(f, "production"),
        }
    }
}

impl FromStr for AppEnv {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(AppEnv::Local),
            "development" | "dev" => Ok(AppEnv::Development),
            "production" | "prod" => Ok(AppEnv::Production),
            other => Err(ConfigError::ValidationError(format!(
                "unknown app environment '{}'",
                other
            ))),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Full connection URL; when unset it is built from the parts below
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_name")]
    pub name: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Connections kept open while idle
    #[serde(default = "default_max_idle")]
    pub max_idle_connections: u32,
    /// Upper bound on open connections
    #[serde(default = "default_max_open")]
    pub max_open_connections: u32,
    /// Connections are recycled after this many seconds
    #[serde(default = "default_lifetime_secs")]
    pub connection_lifetime_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: None,
            host: default_db_host(),
            port: default_db_port(),
            name: default_db_name(),
            user: String::new(),
            password: String::new(),
            max_idle_connections: default_max_idle(),
            max_open_connections: default_max_open(),
            connection_lifetime_secs: default_lifetime_secs(),
        }
    }
}

fn default_db_host() -> String {
    "127.0.0.1".to_string()
}

fn default_db_port() -> u16 {
    3306
}

fn default_db_name() -> String {
    "omnitags".to_string()
}

fn default_max_idle() -> u32 {
    10
}

fn default_max_open() -> u32 {
    100
}

fn default_lifetime_secs() -> u64 {
    300
}

impl DatabaseConfig {
    /// Resolve the connection URL for the configured driver.
    pub fn connection_url(&self) -> String {
        if let Some(url) = self.url.as_deref().filter(|u| !u.trim().is_empty()) {
            return url.to_string();
        }

        match self.driver {
            DatabaseDriver::Sqlite => "data/omnitags.db".to_string(),
            DatabaseDriver::Mysql => {
                let credentials = if self.password.is_empty() {
                    self.user.clone()
                } else {
                    format!("{}:{}", self.user, self.password)
                };
                let auth = if credentials.is_empty() {
                    String::new()
                } else {
                    format!("{}@", credentials)
                };
                format!("mysql://{}{}:{}/{}", auth, self.host, self.port, self.name)
            }
        }
    }

    pub fn connection_lifetime(&self) -> Duration {
        Duration::from_secs(self.connection_lifetime_secs)
    }
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Longest accepted session lifetime, one year in minutes
pub const MAX_SESSION_TTL_MINUTES: i64 = 366 * 24 * 60;

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Key for session token signatures and the password pepper
    #[serde(default)]
    pub jwt_secret: String,
    /// Session lifetime in minutes
    #[serde(default = "default_session_ttl")]
    pub session_ttl_minutes: i64,
    /// Static API token required on every request when set
    #[serde(default)]
    pub api_token: Option<String>,
    /// Interval of the expired session purge, in seconds
    #[serde(default = "default_cleanup_interval")]
    pub session_cleanup_interval_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            session_ttl_minutes: default_session_ttl(),
            api_token: None,
            session_cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

fn default_session_ttl() -> i64 {
    60
}

fn default_cleanup_interval() -> u64 {
    300
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allow_origin")]
    pub allow_origin: String,
    /// Comma separated list of methods
    #[serde(default = "default_allow_methods")]
    pub allow_methods: String,
    /// Comma separated list of headers
    #[serde(default = "default_allow_headers")]
    pub allow_headers: String,
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
    #[serde(default = "default_allow_credentials")]
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: default_allow_origin(),
            allow_methods: default_allow_methods(),
            allow_headers: default_allow_headers(),
            max_age_secs: default_max_age(),
            allow_credentials: default_allow_credentials(),
        }
    }
}

fn default_allow_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_allow_methods() -> String {
    "POST, PUT, GET, OPTIONS, DELETE, PATCH".to_string()
}

fn default_allow_headers() -> String {
    "X-Requested-With, Content-Type, Authorization, session-token".to_string()
}

fn default_max_age() -> u64 {
    86400
}

fn default_allow_credentials() -> bool {
    true
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist or is empty, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file, then apply environment overrides.
    ///
    /// When `APPENV` is `local`, variables from a `.env` file in the working
    /// directory are loaded first. Existing process variables are never
    /// overwritten by the file. The `.env` outcome is returned so it can be
    /// logged once tracing is up; it is `None` outside the local environment.
    pub fn load_with_env(
        path: &std::path::Path,
    ) -> anyhow::Result<(Self, Option<dotenvy::Result<std::path::PathBuf>>)> {
        let local = std::env::var("APPENV")
            .ok()
            .and_then(|v| v.parse::<AppEnv>().ok())
            .map_or(false, |env| env == AppEnv::Local);
        let dotenv = local.then(dotenvy::dotenv);

        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok((config, dotenv))
    }

    /// Reject configurations the server must not start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() && self.app.env != AppEnv::Local {
            return Err(ConfigError::ValidationError(
                "JWTSECRET must be set outside the local environment".to_string(),
            ));
        }
        if self.auth.session_ttl_minutes <= 0 {
            return Err(ConfigError::ValidationError(
                "session TTL must be positive".to_string(),
            ));
        }
        if self.auth.session_ttl_minutes > MAX_SESSION_TTL_MINUTES {
            return Err(ConfigError::ValidationError(format!(
                "session TTL must not exceed {} minutes",
                MAX_SESSION_TTL_MINUTES
            )));
        }
        if self.database.max_open_connections == 0 {
            return Err(ConfigError::ValidationError(
                "max open connections must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        if let Some(name) = var("APPNAME") {
            self.app.name = name;
        }
        if let Some(env) = var("APPENV").and_then(|v| v.parse().ok()) {
            self.app.env = env;
        }
        if let Some(host) = var("APPHOST") {
            self.app.host = host;
        }
        if let Some(port) = var("APPPORT").and_then(|v| v.parse().ok()) {
            self.app.port = port;
        }

        if let Some(driver) = var("DBDRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Some(url) = var("DBURL") {
            self.database.url = Some(url);
        }
        if let Some(host) = var("DBHOST") {
            self.database.host = host;
        }
        if let Some(port) = var("DBPORT").and_then(|v| v.parse().ok()) {
            self.database.port = port;
        }
        if let Some(name) = var("DBNAME") {
            self.database.name = name;
        }
        if let Some(user) = var("DBUSER") {
            self.database.user = user;
        }
        if let Some(password) = var("DBPASS") {
            self.database.password = password;
        }
        if let Some(n) = var("DBMAXIDLE").and_then(|v| v.parse().ok()) {
            self.database.max_idle_connections = n;
        }
        if let Some(n) = var("DBMAXOPEN").and_then(|v| v.parse().ok()) {
            self.database.max_open_connections = n;
        }
        if let Some(secs) = var("DBMAXLIFETIME").and_then(|v| v.parse().ok()) {
            self.database.connection_lifetime_secs = secs;
        }

        if let Some(secret) = var("JWTSECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(ttl) = var("SESSIONTTL").and_then(|v| v.parse().ok()) {
            self.auth.session_ttl_minutes = ttl;
        }
        if let Some(token) = var("APITOKEN") {
            self.auth.api_token = Some(token);
        }

        if let Some(origin) = var("CORSALLOWORIGIN") {
            self.cors.allow_origin = origin;
        }
        if let Some(methods) = var("CORSALLOWMETHODS") {
            self.cors.allow_methods = methods;
        }
        if let Some(headers) = var("CORSALLOWHEADERS") {
            self.cors.allow_headers = headers;
        }
        if let Some(max_age) = var("CORSMAXAGE").and_then(|v| v.parse().ok()) {
            self.cors.max_age_secs = max_age;
        }
        if let Some(credentials) = var("CORSALLOWCREDENTIALS").and_then(|v| v.parse().ok()) {
            self.cors.allow_credentials = credentials;
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Tests that touch process environment share this lock.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn config_yaml_roundtrip(port in 1u16..=u16::MAX, ttl in 1i64..10_000, origin in "http://[a-z]{3,10}\\.test") {
            let mut config = Config::default();
            config.app.port = port;
            config.auth.session_ttl_minutes = ttl;
            config.cors.allow_origin = origin.clone();

            let yaml = serde_yaml::to_string(&config).unwrap();
            let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

            prop_assert_eq!(parsed.app.port, port);
            prop_assert_eq!(parsed.auth.session_ttl_minutes, ttl);
            prop_assert_eq!(parsed.cors.allow_origin, origin);
        }

        #[test]
        fn app_env_parse_is_case_insensitive(env in prop_oneof![Just("local"), Just("development"), Just("production")]) {
            let upper = env.to_uppercase();
            prop_assert_eq!(upper.parse::<AppEnv>().unwrap().to_string(), env);
        }
    }
}
