// Settings loader - KEY=VALUE environment file plus DOMAINJOIN_* overrides
use config::{Config, Environment, File, FileStoredFormat, Format, Map, Value, ValueKind};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use domainjoin_core::domain::DomainSettings;
use domainjoin_core::AppError;

use crate::constants::{DEFAULT_ARTIFACT_DIR, DEFAULT_ENV_FILE, ENV_PREFIX};

/// Settings loading errors (always fatal)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment file not found: {0}")]
    NotFound(PathBuf),

    #[error("cannot load {origin}: {source}")]
    Source {
        origin: String,
        #[source]
        source: config::ConfigError,
    },

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("cannot read password file {path}: {source}")]
    PasswordFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Malformed line in the environment file
#[derive(Error, Debug)]
#[error("line {line}: {reason}")]
pub struct EnvLineError {
    line: usize,
    reason: &'static str,
}

/// `KEY=VALUE` environment file read by the `config` crate
///
/// Whole-line `#` and `;` comments, an optional `export ` prefix, and single
/// or double quotes. Values are literal: a backslash is kept as written,
/// except `\"` and `\\` inside double quotes. Unquoted values lose trailing
/// whitespace and a ` #` comment; quote a value to keep either.
#[derive(Debug, Clone, Copy)]
pub struct EnvFileFormat;

impl Format for EnvFileFormat {
    fn parse(
        &self,
        uri: Option<&String>,
        text: &str,
    ) -> Result<Map<String, Value>, Box<dyn std::error::Error + Send + Sync>> {
        let mut map = Map::new();
        for (idx, line) in text.lines().enumerate() {
            let entry = parse_line(line).map_err(|reason| EnvLineError {
                line: idx + 1,
                reason,
            })?;
            if let Some((key, value)) = entry {
                map.insert(key, Value::new(uri, ValueKind::String(value)));
            }
        }
        Ok(map)
    }
}

impl FileStoredFormat for EnvFileFormat {
    fn file_extensions(&self) -> &'static [&'static str] {
        &["env"]
    }
}

fn parse_line(line: &str) -> Result<Option<(String, String)>, &'static str> {
    let line = line.trim_start();
    if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
        return Ok(None);
    }
    let line = line.strip_prefix("export ").map_or(line, str::trim_start);

    let (key, raw) = line.split_once('=').ok_or("expected KEY=VALUE")?;
    let key = key.trim_end();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("invalid key");
    }
    Ok(Some((key.to_string(), parse_value(raw)?)))
}

fn parse_value(raw: &str) -> Result<String, &'static str> {
    let raw = raw.trim_start();
    let mut chars = raw.chars();
    match chars.next() {
        Some('"') => {
            let mut value = String::new();
            while let Some(c) = chars.next() {
                match c {
                    '"' => return after_quote(chars.as_str()).map(|()| value),
                    '\\' => match chars.next() {
                        Some(escaped @ ('"' | '\\')) => value.push(escaped),
                        Some(other) => {
                            value.push('\\');
                            value.push(other);
                        }
                        None => value.push('\\'),
                    },
                    _ => value.push(c),
                }
            }
            Err("unterminated double quote")
        }
        Some('\'') => {
            let rest = chars.as_str();
            let end = rest.find('\'').ok_or("unterminated single quote")?;
            after_quote(&rest[end + 1..])?;
            Ok(rest[..end].to_string())
        }
        _ => Ok(strip_comment(raw).trim_end().to_string()),
    }
}

fn after_quote(rest: &str) -> Result<(), &'static str> {
    let rest = rest.trim_start();
    if rest.is_empty() || rest.starts_with('#') {
        Ok(())
    } else {
        Err("unexpected text after closing quote")
    }
}

/// Cut an unquoted value at a `#` preceded by whitespace
fn strip_comment(raw: &str) -> &str {
    raw.char_indices()
        .find(|&(i, c)| c == '#' && raw[..i].ends_with([' ', '\t']))
        .map_or(raw, |(i, _)| &raw[..i])
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Resolve the environment file path (`~` expanded)
///
/// # Arguments
/// * `explicit` - Path given on the command line or via `DOMAINJOIN_ENV_FILE`
pub fn resolve_env_file(explicit: Option<&Path>) -> PathBuf {
    let raw = explicit
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_ENV_FILE.to_string());
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

/// Load settings from `path`, with `DOMAINJOIN_<KEY>` environment overrides
///
/// # Errors
/// - ConfigError::NotFound if the file does not exist
/// - ConfigError::Source if the file cannot be parsed
/// - ConfigError::InvalidValue for a malformed boolean
/// - ConfigError::PasswordFile if `ADMIN_PASSWORD_FILE` cannot be read
pub fn load_settings(path: &Path) -> Result<DomainSettings, ConfigError> {
    load_settings_with(path, Environment::with_prefix(ENV_PREFIX))
}

/// Load settings with an explicit environment source (for tests)
pub fn load_settings_with(path: &Path, env: Environment) -> Result<DomainSettings, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let origin = path.display().to_string();
    let mut values = collect(
        Config::builder().add_source(File::new(&origin, EnvFileFormat).required(true)),
        &origin,
    )?;
    // Key case differs between sources, so each is normalised before merging
    let overrides = collect(Config::builder().add_source(env), "environment")?;
    if !overrides.is_empty() {
        debug!(keys = ?overrides.keys().collect::<Vec<_>>(), "Environment overrides applied");
    }
    values.extend(overrides);

    let settings = settings_from_values(values)?;
    info!(path = %origin, domain = ?settings.domain_name, "Settings loaded");
    Ok(settings)
}

/// Directory holding the primary agent's installer packages
pub fn artifact_dir(settings: &DomainSettings) -> PathBuf {
    let raw = settings
        .primary_artifact_dir
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_ARTIFACT_DIR);
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

fn collect(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    origin: &str,
) -> Result<HashMap<String, String>, ConfigError> {
    let to_error = |source| ConfigError::Source {
        origin: origin.to_string(),
        source,
    };
    let raw: HashMap<String, String> = builder
        .build()
        .map_err(to_error)?
        .try_deserialize()
        .map_err(to_error)?;

    Ok(raw
        .into_iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect())
}

fn settings_from_values(mut values: HashMap<String, String>) -> Result<DomainSettings, ConfigError> {
    let mut take = |key: &str| values.remove(key).filter(|v| !v.trim().is_empty());

    let mut settings = DomainSettings {
        domain_name: take("domain_name"),
        domain_realm: take("domain_realm"),
        domain_netbios: take("domain_netbios"),
        dc_ip: take("dc_ip"),
        dc_fqdn: take("dc_fqdn"),
        host_ip: take("host_ip"),
        host_fqdn: take("host_fqdn"),
        host_name: take("host_name"),
        admin_user: take("admin_user"),
        admin_password: take("admin_password"),
        admin_password_file: take("admin_password_file"),
        computer_ou: take("computer_ou"),
        test_user: take("test_user"),
        admin_group: take("admin_group"),
        builtin_group: take("builtin_group"),
        ssh_allow_groups: take("ssh_allow_groups"),
        sudo_groups: take("sudo_groups"),
        sudo_users: take("sudo_users"),
        enable_gssapi: None,
        primary_artifact_dir: take("primary_artifact_dir"),
    };

    if let Some(raw) = take("enable_gssapi") {
        settings.enable_gssapi = Some(parse_bool("ENABLE_GSSAPI", &raw)?);
    }

    if settings.admin_password.is_none() {
        if let Some(file) = &settings.admin_password_file {
            let path = PathBuf::from(shellexpand::tilde(file).into_owned());
            let contents = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::PasswordFile {
                    path: path.clone(),
                    source,
                })?;
            let password = contents.trim_end_matches(['\n', '\r']).to_string();
            settings.admin_password = Some(password).filter(|p| !p.is_empty());
        }
    }

    Ok(settings)
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}
