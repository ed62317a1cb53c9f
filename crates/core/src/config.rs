use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub airtable: AirtableConfig,
    pub session: SessionConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub app_token: SecretString,
    pub bot_token: SecretString,
}

#[derive(Clone, Debug)]
pub struct AirtableConfig {
    pub api_key: SecretString,
    pub base_id: String,
    pub endpoint_url: String,
    pub table: String,
    pub create_form_url: String,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub redis_url: String,
    pub ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
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
    pub slack_app_token: Option<String>,
    pub slack_bot_token: Option<String>,
    pub airtable_api_key: Option<String>,
    pub airtable_base_id: Option<String>,
    pub redis_url: Option<String>,
    pub log_level: Option<String>,
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

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig { app_token: String::new().into(), bot_token: String::new().into() },
            airtable: AirtableConfig {
                api_key: String::new().into(),
                base_id: String::new(),
                endpoint_url: "https://api.airtable.com".to_string(),
                table: "Volunteer Opportunities".to_string(),
                create_form_url: "https://airtable.com/shrJnANZdsM7WBF49".to_string(),
            },
            session: SessionConfig {
                redis_url: "redis://127.0.0.1:6379".to_string(),
                ttl_secs: 86_400,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("oppy.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(app_token_value) = slack.app_token {
                self.slack.app_token = secret_value(app_token_value);
            }
            if let Some(bot_token_value) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token_value);
            }
        }

        if let Some(airtable) = patch.airtable {
            if let Some(api_key_value) = airtable.api_key {
                self.airtable.api_key = secret_value(api_key_value);
            }
            if let Some(base_id) = airtable.base_id {
                self.airtable.base_id = base_id;
            }
            if let Some(endpoint_url) = airtable.endpoint_url {
                self.airtable.endpoint_url = endpoint_url;
            }
            if let Some(table) = airtable.table {
                self.airtable.table = table;
            }
            if let Some(create_form_url) = airtable.create_form_url {
                self.airtable.create_form_url = create_form_url;
            }
        }

        if let Some(session) = patch.session {
            if let Some(redis_url) = session.redis_url {
                self.session.redis_url = redis_url;
            }
            if let Some(ttl_secs) = session.ttl_secs {
                self.session.ttl_secs = ttl_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
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
        if let Some(value) = read_env("OPPY_SLACK_APP_TOKEN") {
            self.slack.app_token = secret_value(value);
        }
        if let Some(value) = read_env("OPPY_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }

        if let Some(value) = read_env("OPPY_AIRTABLE_API_KEY") {
            self.airtable.api_key = secret_value(value);
        }
        if let Some(value) = read_env("OPPY_AIRTABLE_BASE_ID") {
            self.airtable.base_id = value;
        }
        if let Some(value) = read_env("OPPY_AIRTABLE_ENDPOINT_URL") {
            self.airtable.endpoint_url = value;
        }
        if let Some(value) = read_env("OPPY_AIRTABLE_TABLE") {
            self.airtable.table = value;
        }
        if let Some(value) = read_env("OPPY_AIRTABLE_CREATE_FORM_URL") {
            self.airtable.create_form_url = value;
        }

        if let Some(value) = read_env("OPPY_SESSION_REDIS_URL") {
            self.session.redis_url = value;
        }
        if let Some(value) = read_env("OPPY_SESSION_TTL_SECS") {
            self.session.ttl_secs = parse_u64("OPPY_SESSION_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("OPPY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("OPPY_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("OPPY_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level = read_env("OPPY_LOGGING_LEVEL").or_else(|| read_env("OPPY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("OPPY_LOGGING_FORMAT").or_else(|| read_env("OPPY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(slack_app_token) = overrides.slack_app_token {
            self.slack.app_token = secret_value(slack_app_token);
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(slack_bot_token);
        }
        if let Some(airtable_api_key) = overrides.airtable_api_key {
            self.airtable.api_key = secret_value(airtable_api_key);
        }
        if let Some(airtable_base_id) = overrides.airtable_base_id {
            self.airtable.base_id = airtable_base_id;
        }
        if let Some(redis_url) = overrides.redis_url {
            self.session.redis_url = redis_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_airtable(&self.airtable)?;
        validate_session(&self.session)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("oppy.toml"), PathBuf::from("config/oppy.toml")]
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

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let app_token = slack.app_token.expose_secret();
    if app_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.app_token is required. Get it from https://api.slack.com/apps > Your App > Basic Information > App-Level Tokens".to_string()
        ));
    }
    if !app_token.starts_with("xapp-") {
        let hint = if app_token.starts_with("xoxb-") {
            " (hint: you may have used the bot token instead of the app token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.app_token must start with `xapp-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    Ok(())
}

fn validate_airtable(airtable: &AirtableConfig) -> Result<(), ConfigError> {
    if airtable.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation("airtable.api_key is required".to_string()));
    }

    if airtable.base_id.trim().is_empty() {
        return Err(ConfigError::Validation("airtable.base_id is required".to_string()));
    }

    let endpoint = airtable.endpoint_url.trim();
    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        return Err(ConfigError::Validation(
            "airtable.endpoint_url must start with http:// or https://".to_string(),
        ));
    }

    if airtable.table.trim().is_empty() {
        return Err(ConfigError::Validation("airtable.table must not be empty".to_string()));
    }

    let form_url = airtable.create_form_url.trim();
    if !form_url.starts_with("http://") && !form_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "airtable.create_form_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    let url = session.redis_url.trim();
    if !url.starts_with("redis://") && !url.starts_with("rediss://") {
        return Err(ConfigError::Validation(
            "session.redis_url must be a redis URL (`redis://...` or `rediss://...`)".to_string(),
        ));
    }

    if session.ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "session.ttl_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
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

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
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

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    airtable: Option<AirtablePatch>,
    session: Option<SessionPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    app_token: Option<String>,
    bot_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AirtablePatch {
    api_key: Option<String>,
    base_id: Option<String>,
    endpoint_url: Option<String>,
    table: Option<String>,
    create_form_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    redis_url: Option<String>,
    ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
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

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_required_vars() {
        env::set_var("OPPY_SLACK_APP_TOKEN", "xapp-test");
        env::set_var("OPPY_SLACK_BOT_TOKEN", "xoxb-test");
        env::set_var("OPPY_AIRTABLE_API_KEY", "key-test");
        env::set_var("OPPY_AIRTABLE_BASE_ID", "appTest123");
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    const REQUIRED_VARS: [&str; 4] = [
        "OPPY_SLACK_APP_TOKEN",
        "OPPY_SLACK_BOT_TOKEN",
        "OPPY_AIRTABLE_API_KEY",
        "OPPY_AIRTABLE_BASE_ID",
    ];

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_cover_endpoint_table_and_session_ttl() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        set_required_vars();

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.airtable.endpoint_url == "https://api.airtable.com",
                "default endpoint url should point at the hosted api",
            )?;
            ensure(
                config.airtable.table == "Volunteer Opportunities",
                "default table should be the volunteer opportunities table",
            )?;
            ensure(config.session.ttl_secs == 86_400, "default session ttl should be one day")?;
            Ok(())
        })();

        clear_vars(&REQUIRED_VARS);
        result
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("TEST_AIRTABLE_KEY", "key-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("oppy.toml");
            fs::write(
                &path,
                r#"
[airtable]
api_key = "${TEST_AIRTABLE_KEY}"
base_id = "appFromFile"
"#,
            )
            .map_err(|err| err.to_string())?;

            env::remove_var("OPPY_AIRTABLE_API_KEY");
            env::remove_var("OPPY_AIRTABLE_BASE_ID");

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.airtable.api_key.expose_secret() == "key-from-env",
                "api key should be interpolated from environment",
            )?;
            ensure(
                config.airtable.base_id == "appFromFile",
                "base id should be loaded from the file",
            )?;
            Ok(())
        })();

        clear_vars(&REQUIRED_VARS);
        clear_vars(&["TEST_AIRTABLE_KEY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("OPPY_LOG_LEVEL", "warn");
        env::set_var("OPPY_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warn log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&REQUIRED_VARS);
        clear_vars(&["OPPY_LOG_LEVEL", "OPPY_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("OPPY_SESSION_REDIS_URL", "redis://from-env:6379");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("oppy.toml");
            fs::write(
                &path,
                r#"
[session]
redis_url = "redis://from-file:6379"

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

            ensure(
                config.session.redis_url == "redis://from-env:6379",
                "env redis url should win over the file",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            Ok(())
        })();

        clear_vars(&REQUIRED_VARS);
        clear_vars(&["OPPY_SESSION_REDIS_URL"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("OPPY_SLACK_APP_TOKEN", "bad");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("slack.app_token")
            );
            ensure(has_message, "validation failure should mention slack.app_token")
        })();

        clear_vars(&REQUIRED_VARS);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("OPPY_AIRTABLE_API_KEY", "key-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("key-secret-value"),
                "debug output should not contain the table api key",
            )?;
            ensure(!debug.contains("xapp-test"), "debug output should not contain the app token")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&REQUIRED_VARS);
        result
    }
}
