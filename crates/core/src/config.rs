use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "leadbridge.toml";
pub const NESTED_CONFIG_FILE: &str = "config/leadbridge.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub odoo: OdooConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub planner: PlannerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct OdooConfig {
    pub url: String,
    pub database: String,
    pub username: String,
    pub password: SecretString,
    pub timeout_secs: u64,
    /// Serve seeded demo records from memory instead of a live backend.
    pub mock: bool,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct PlannerConfig {
    pub default_max_records: u32,
    pub max_records_ceiling: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub odoo_url: Option<String>,
    pub odoo_database: Option<String>,
    pub odoo_mock: Option<bool>,
    pub llm_model: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Environment keys per config path, highest priority first. The bare
/// `ODOO_*` / `ANTHROPIC_API_KEY` / `HOST` / `PORT` / `LOG_LEVEL` names are
/// accepted for deployments that predate the `LEADBRIDGE_` prefix.
pub const ENV_BINDINGS: &[(&str, &[&str])] = &[
    ("odoo.url", &["LEADBRIDGE_ODOO_URL", "ODOO_URL"]),
    ("odoo.database", &["LEADBRIDGE_ODOO_DATABASE", "ODOO_DB"]),
    ("odoo.username", &["LEADBRIDGE_ODOO_USERNAME", "ODOO_USERNAME"]),
    ("odoo.password", &["LEADBRIDGE_ODOO_PASSWORD", "ODOO_PASSWORD"]),
    ("odoo.timeout_secs", &["LEADBRIDGE_ODOO_TIMEOUT_SECS"]),
    ("odoo.mock", &["LEADBRIDGE_ODOO_MOCK"]),
    ("llm.api_key", &["LEADBRIDGE_LLM_API_KEY", "ANTHROPIC_API_KEY"]),
    ("llm.base_url", &["LEADBRIDGE_LLM_BASE_URL"]),
    ("llm.model", &["LEADBRIDGE_LLM_MODEL"]),
    ("llm.timeout_secs", &["LEADBRIDGE_LLM_TIMEOUT_SECS"]),
    ("server.bind_address", &["LEADBRIDGE_SERVER_BIND_ADDRESS", "HOST"]),
    ("server.port", &["LEADBRIDGE_SERVER_PORT", "PORT"]),
    ("planner.default_max_records", &["LEADBRIDGE_PLANNER_DEFAULT_MAX_RECORDS"]),
    ("planner.max_records_ceiling", &["LEADBRIDGE_PLANNER_MAX_RECORDS_CEILING"]),
    ("logging.level", &["LEADBRIDGE_LOGGING_LEVEL", "LEADBRIDGE_LOG_LEVEL", "LOG_LEVEL"]),
    ("logging.format", &["LEADBRIDGE_LOGGING_FORMAT", "LEADBRIDGE_LOG_FORMAT"]),
];

pub fn env_keys(key_path: &str) -> &'static [&'static str] {
    ENV_BINDINGS
        .iter()
        .find(|(path, _)| *path == key_path)
        .map(|(_, keys)| *keys)
        .unwrap_or(&[])
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            odoo: OdooConfig {
                url: String::new(),
                database: String::new(),
                username: String::new(),
                password: String::new().into(),
                timeout_secs: 30,
                mock: false,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.anthropic.com".to_string(),
                model: "claude-3-5-sonnet-20241022".to_string(),
                timeout_secs: 60,
            },
            server: ServerConfig { bind_address: "0.0.0.0".to_string(), port: 8000 },
            planner: PlannerConfig { default_max_records: 10, max_records_ceiling: 100 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn llm_available(&self) -> bool {
        self.llm.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty())
    }

    /// Every effective value by key path, secrets masked.
    pub fn redacted_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("odoo.url", self.odoo.url.clone()),
            ("odoo.database", self.odoo.database.clone()),
            ("odoo.username", self.odoo.username.clone()),
            ("odoo.password", redact(Some(&self.odoo.password))),
            ("odoo.timeout_secs", self.odoo.timeout_secs.to_string()),
            ("odoo.mock", self.odoo.mock.to_string()),
            ("llm.api_key", redact(self.llm.api_key.as_ref())),
            ("llm.base_url", self.llm.base_url.clone()),
            ("llm.model", self.llm.model.clone()),
            ("llm.timeout_secs", self.llm.timeout_secs.to_string()),
            ("server.bind_address", self.server.bind_address.clone()),
            ("server.port", self.server.port.to_string()),
            ("planner.default_max_records", self.planner.default_max_records.to_string()),
            ("planner.max_records_ceiling", self.planner.max_records_ceiling.to_string()),
            ("logging.level", self.logging.level.clone()),
            ("logging.format", self.logging.format.as_str().to_string()),
        ]
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(odoo) = patch.odoo {
            if let Some(url) = odoo.url {
                self.odoo.url = url;
            }
            if let Some(database) = odoo.database {
                self.odoo.database = database;
            }
            if let Some(username) = odoo.username {
                self.odoo.username = username;
            }
            if let Some(odoo_password_value) = odoo.password {
                self.odoo.password = secret_value(odoo_password_value);
            }
            if let Some(timeout_secs) = odoo.timeout_secs {
                self.odoo.timeout_secs = timeout_secs;
            }
            if let Some(mock) = odoo.mock {
                self.odoo.mock = mock;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(planner) = patch.planner {
            if let Some(default_max_records) = planner.default_max_records {
                self.planner.default_max_records = default_max_records;
            }
            if let Some(max_records_ceiling) = planner.max_records_ceiling {
                self.planner.max_records_ceiling = max_records_ceiling;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some((_, value)) = read_bound_env("odoo.url") {
            self.odoo.url = value;
        }
        if let Some((_, value)) = read_bound_env("odoo.database") {
            self.odoo.database = value;
        }
        if let Some((_, value)) = read_bound_env("odoo.username") {
            self.odoo.username = value;
        }
        if let Some((_, value)) = read_bound_env("odoo.password") {
            self.odoo.password = secret_value(value);
        }
        if let Some((key, value)) = read_bound_env("odoo.timeout_secs") {
            self.odoo.timeout_secs = parse_u64(key, &value)?;
        }
        if let Some((key, value)) = read_bound_env("odoo.mock") {
            self.odoo.mock = parse_bool(key, &value)?;
        }

        if let Some((_, value)) = read_bound_env("llm.api_key") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some((_, value)) = read_bound_env("llm.base_url") {
            self.llm.base_url = value;
        }
        if let Some((_, value)) = read_bound_env("llm.model") {
            self.llm.model = value;
        }
        if let Some((key, value)) = read_bound_env("llm.timeout_secs") {
            self.llm.timeout_secs = parse_u64(key, &value)?;
        }

        if let Some((_, value)) = read_bound_env("server.bind_address") {
            self.server.bind_address = value;
        }
        if let Some((key, value)) = read_bound_env("server.port") {
            self.server.port = parse_u16(key, &value)?;
        }

        if let Some((key, value)) = read_bound_env("planner.default_max_records") {
            self.planner.default_max_records = parse_u32(key, &value)?;
        }
        if let Some((key, value)) = read_bound_env("planner.max_records_ceiling") {
            self.planner.max_records_ceiling = parse_u32(key, &value)?;
        }

        if let Some((_, value)) = read_bound_env("logging.level") {
            self.logging.level = value;
        }
        if let Some((_, value)) = read_bound_env("logging.format") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.odoo_url {
            self.odoo.url = url;
        }
        if let Some(database) = overrides.odoo_database {
            self.odoo.database = database;
        }
        if let Some(mock) = overrides.odoo_mock {
            self.odoo.mock = mock;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_odoo(&self.odoo)?;
        validate_llm(&self.llm, self.odoo.mock)?;
        validate_server(&self.server)?;
        validate_planner(&self.planner)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn redact(secret: Option<&SecretString>) -> String {
    match secret {
        Some(secret) if !secret.expose_secret().is_empty() => "<redacted>".to_string(),
        _ => "<unset>".to_string(),
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_odoo(odoo: &OdooConfig) -> Result<(), ConfigError> {
    if odoo.timeout_secs == 0 || odoo.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "odoo.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if odoo.mock {
        return Ok(());
    }

    let url = odoo.url.trim();
    if url.is_empty() {
        return Err(ConfigError::Validation(
            "odoo.url is required (set LEADBRIDGE_ODOO_URL or ODOO_URL, or enable odoo.mock)"
                .to_string(),
        ));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "odoo.url must start with http:// or https://".to_string(),
        ));
    }
    if odoo.database.trim().is_empty() {
        return Err(ConfigError::Validation(
            "odoo.database is required (set LEADBRIDGE_ODOO_DATABASE or ODOO_DB)".to_string(),
        ));
    }
    if odoo.username.trim().is_empty() {
        return Err(ConfigError::Validation(
            "odoo.username is required (set LEADBRIDGE_ODOO_USERNAME or ODOO_USERNAME)"
                .to_string(),
        ));
    }
    if odoo.password.expose_secret().is_empty() {
        return Err(ConfigError::Validation(
            "odoo.password is required (set LEADBRIDGE_ODOO_PASSWORD or ODOO_PASSWORD)"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig, mock_backend: bool) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    let base_url = llm.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    let missing_key =
        llm.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
    if missing_key && !mock_backend {
        return Err(ConfigError::Validation(
            "llm.api_key is required (set LEADBRIDGE_LLM_API_KEY or ANTHROPIC_API_KEY)"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    Ok(())
}

fn validate_planner(planner: &PlannerConfig) -> Result<(), ConfigError> {
    if planner.max_records_ceiling == 0 {
        return Err(ConfigError::Validation(
            "planner.max_records_ceiling must be greater than zero".to_string(),
        ));
    }

    if planner.default_max_records == 0
        || planner.default_max_records > planner.max_records_ceiling
    {
        return Err(ConfigError::Validation(
            "planner.default_max_records must be in range 1..=planner.max_records_ceiling"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// First non-empty value among the keys bound to `key_path`.
fn read_bound_env(key_path: &str) -> Option<(&'static str, String)> {
    env_keys(key_path).iter().find_map(|key| read_env(key).map(|value| (*key, value)))
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    odoo: Option<OdooPatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    planner: Option<PlannerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct OdooPatch {
    url: Option<String>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    timeout_secs: Option<u64>,
    mock: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct PlannerPatch {
    default_max_records: Option<u32>,
    max_records_ceiling: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, ENV_BINDINGS};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_bound_vars() {
        for (_, keys) in ENV_BINDINGS {
            for key in *keys {
                env::remove_var(key);
            }
        }
    }

    fn set_live_credentials() {
        env::set_var("LEADBRIDGE_ODOO_URL", "https://crm.example.test");
        env::set_var("LEADBRIDGE_ODOO_DATABASE", "crm-prod");
        env::set_var("LEADBRIDGE_ODOO_USERNAME", "bot@example.test");
        env::set_var("LEADBRIDGE_ODOO_PASSWORD", "odoo-secret-value");
        env::set_var("LEADBRIDGE_LLM_API_KEY", "sk-ant-secret-value");
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_bound_vars();
        env::set_var("TEST_ODOO_PASSWORD", "from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("leadbridge.toml");
            fs::write(
                &path,
                r#"
[odoo]
url = "https://crm.example.test"
database = "crm"
username = "bot"
password = "${TEST_ODOO_PASSWORD}"

[llm]
api_key = "sk-file"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.odoo.password.expose_secret() == "from-env",
                "password should be interpolated from environment",
            )?;
            ensure(config.llm_available(), "api key from file should enable the llm")?;
            Ok(())
        })();

        env::remove_var("TEST_ODOO_PASSWORD");
        result
    }

    #[test]
    fn legacy_env_names_are_accepted() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_bound_vars();
        env::set_var("ODOO_URL", "http://odoo.local:8069");
        env::set_var("ODOO_DB", "legacy");
        env::set_var("ODOO_USERNAME", "admin");
        env::set_var("ODOO_PASSWORD", "admin");
        env::set_var("ANTHROPIC_API_KEY", "sk-legacy");
        env::set_var("PORT", "9001");
        env::set_var("LOG_LEVEL", "warn");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.odoo.database == "legacy", "ODOO_DB should set odoo.database")?;
            ensure(config.server.port == 9001, "PORT should set server.port")?;
            ensure(config.logging.level == "warn", "LOG_LEVEL should set logging.level")?;
            ensure(config.llm_available(), "ANTHROPIC_API_KEY should set llm.api_key")?;
            Ok(())
        })();

        clear_bound_vars();
        result
    }

    #[test]
    fn prefixed_env_wins_over_legacy_alias() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_bound_vars();
        set_live_credentials();
        env::set_var("ODOO_DB", "legacy");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.odoo.database == "crm-prod", "prefixed key should win")
        })();

        clear_bound_vars();
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_bound_vars();
        set_live_credentials();
        env::set_var("LEADBRIDGE_SERVER_PORT", "7000");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("leadbridge.toml");
            fs::write(
                &path,
                r#"
[server]
port = 6000
bind_address = "127.0.0.1"

[planner]
default_max_records = 25

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.server.port == 7000, "env port should win over file")?;
            ensure(config.server.bind_address == "127.0.0.1", "file bind address should apply")?;
            ensure(config.planner.default_max_records == 25, "file planner default should apply")?;
            ensure(config.logging.level == "debug", "override log level should win")?;
            Ok(())
        })();

        clear_bound_vars();
        result
    }

    #[test]
    fn missing_backend_credentials_fail_fast() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_bound_vars();
        env::set_var("LEADBRIDGE_LLM_API_KEY", "sk-test");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::Validation(ref message) if message.contains("odoo.url")),
                "validation failure should mention odoo.url",
            )
        })();

        clear_bound_vars();
        result
    }

    #[test]
    fn mock_mode_needs_no_credentials() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_bound_vars();
        env::set_var("LEADBRIDGE_ODOO_MOCK", "true");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.odoo.mock, "mock flag should be set")?;
            ensure(!config.llm_available(), "no api key means the llm is unavailable")?;
            Ok(())
        })();

        clear_bound_vars();
        result
    }

    #[test]
    fn invalid_numeric_env_is_reported_with_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_bound_vars();
        set_live_credentials();
        env::set_var("PORT", "eighty");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env parse failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "PORT"),
                "error should name the offending key",
            )
        })();

        clear_bound_vars();
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_bound_vars();
        set_live_credentials();

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("odoo-secret-value"), "debug output should hide password")?;
            ensure(!debug.contains("sk-ant-secret-value"), "debug output should hide api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_bound_vars();
        result
    }

    #[test]
    fn redacted_entries_mask_secrets_and_cover_every_binding() {
        let mut config = AppConfig::default();
        config.odoo.password = "odoo-secret-value".to_string().into();

        let entries = config.redacted_entries();

        assert!(entries.iter().all(|(_, value)| value != "odoo-secret-value"));
        assert!(entries.contains(&("odoo.password", "<redacted>".to_string())));
        assert!(entries.contains(&("llm.api_key", "<unset>".to_string())));
        assert!(entries.contains(&("logging.format", "compact".to_string())));
        for (path, _) in ENV_BINDINGS {
            assert!(entries.iter().any(|(key, _)| key == path), "{path} is listed");
        }
    }
}
