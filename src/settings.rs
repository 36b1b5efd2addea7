use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_VERSION: &str = "4.0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_ENV_PREFIX: &str = "LOOKERSDK";
pub const DEFAULT_CONFIG_FILE: &str = "looker.ini";
pub const AGENT_PREFIX: &str = "RS-SDK";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file {0:?} was not found")]
    FileNotFound(PathBuf),
    #[error("Failed to read configuration file {path:?}: {reason}")]
    Read { path: PathBuf, reason: String },
    #[error("Configuration contains no sections")]
    NoSections,
    #[error("No section named \"{0}\" was found")]
    SectionNotFound(String),
    #[error("Malformed configuration at line {line}: {content}")]
    Syntax { line: usize, content: String },
    #[error("Missing required configuration value: {0}")]
    MissingField(&'static str),
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("Failed to read environment overrides: {0}")]
    Environment(String),
}

/// Connection parameters for one client instance.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub api_version: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout: Duration,
    pub verify_ssl: bool,
    pub agent_tag: String,
}

impl Settings {
    /// Builds settings from explicit values, applying the same validation
    /// as [`SettingsResolver::resolve`].
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Self {
            base_url: base_url.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            verify_ssl: true,
            agent_tag: default_agent_tag(),
        }
        .validated()
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path prefix every endpoint path is joined to, e.g. `/api/4.0`.
    pub fn api_path(&self) -> String {
        if self.api_version.is_empty() {
            String::new()
        } else {
            format!("/api/{}", self.api_version)
        }
    }

    fn validated(mut self) -> Result<Self, ConfigError> {
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if self.base_url.is_empty() {
            return Err(ConfigError::MissingField("base_url"));
        }
        let parsed = url::Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidValue {
            field: "base_url",
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field: "base_url",
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::MissingField("client_id"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(ConfigError::MissingField("client_secret"));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(self)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("verify_ssl", &self.verify_ssl)
            .field("agent_tag", &self.agent_tag)
            .finish()
    }
}

fn default_agent_tag() -> String {
    format!("{} {}", AGENT_PREFIX, env!("CARGO_PKG_VERSION"))
}

/// Where settings come from.
#[derive(Debug, Clone)]
pub enum SettingsSource {
    IniFile {
        path: PathBuf,
        section: Option<String>,
    },
    Ini {
        contents: String,
        section: Option<String>,
    },
    Values(HashMap<String, String>),
    Explicit(Settings),
}

impl SettingsSource {
    pub fn ini_file(path: impl Into<PathBuf>, section: Option<&str>) -> Self {
        Self::IniFile {
            path: path.into(),
            section: section.map(str::to_string),
        }
    }

    pub fn ini(contents: impl Into<String>, section: Option<&str>) -> Self {
        Self::Ini {
            contents: contents.into(),
            section: section.map(str::to_string),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    base_url: Option<String>,
    api_version: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    timeout: Option<String>,
    verify_ssl: Option<String>,
}

impl EnvOverrides {
    fn apply(self, values: &mut HashMap<String, String>) {
        let pairs = [
            ("base_url", self.base_url),
            ("api_version", self.api_version),
            ("client_id", self.client_id),
            ("client_secret", self.client_secret),
            ("timeout", self.timeout),
            ("verify_ssl", self.verify_ssl),
        ];
        for (key, value) in pairs {
            if let Some(value) = value {
                values.insert(key.to_string(), unquote(&value).to_string());
            }
        }
    }

    /// Overrides only the fields that are set, leaving the rest of an
    /// already built value untouched.
    fn apply_to(self, settings: &mut Settings) -> Result<(), ConfigError> {
        let set = |value: Option<String>| value.map(|v| unquote(v.trim()).to_string());

        if let Some(base_url) = set(self.base_url) {
            settings.base_url = base_url;
        }
        if let Some(api_version) = set(self.api_version) {
            settings.api_version = api_version;
        }
        if let Some(client_id) = set(self.client_id) {
            settings.client_id = client_id;
        }
        if let Some(client_secret) = set(self.client_secret) {
            settings.client_secret = client_secret;
        }
        if let Some(timeout) = set(self.timeout) {
            settings.timeout = parse_timeout(timeout.trim())?;
        }
        if let Some(verify_ssl) = set(self.verify_ssl) {
            settings.verify_ssl = bool_default(verify_ssl.trim(), settings.verify_ssl);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SettingsResolver {
    env_prefix: Option<String>,
}

impl SettingsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment variables `<PREFIX>_BASE_URL`, `<PREFIX>_CLIENT_ID`, ...
    /// override whatever the source provides.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.env_prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    pub fn resolve(&self, source: &SettingsSource) -> Result<Settings, ConfigError> {
        let mut values = match source {
            SettingsSource::IniFile { path, section } => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path.clone()));
                }
                let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
                tracing::debug!("Read configuration from {:?}", path);
                ini_section(&contents, section.as_deref())?
            }
            SettingsSource::Ini { contents, section } => {
                ini_section(contents, section.as_deref())?
            }
            SettingsSource::Values(values) => values
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), unquote(v).to_string()))
                .collect(),
            SettingsSource::Explicit(settings) => {
                let mut settings = settings.clone();
                if let Some(overrides) = self.env_overrides()? {
                    overrides.apply_to(&mut settings)?;
                }
                return settings.validated();
            }
        };

        if let Some(overrides) = self.env_overrides()? {
            overrides.apply(&mut values);
        }

        settings_from_values(&values)
    }

    fn env_overrides(&self) -> Result<Option<EnvOverrides>, ConfigError> {
        let Some(prefix) = &self.env_prefix else {
            return Ok(None);
        };
        envy::prefixed(format!("{}_", prefix))
            .from_env::<EnvOverrides>()
            .map(Some)
            .map_err(|e| ConfigError::Environment(e.to_string()))
    }
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ConfigError::InvalidValue {
            field: "timeout",
            reason: format!("{:?}: {}", raw, e),
        })
}

fn settings_from_values(values: &HashMap<String, String>) -> Result<Settings, ConfigError> {
    let get = |key: &str| values.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    let timeout = match get("timeout") {
        Some(raw) => parse_timeout(raw)?,
        None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
    };

    Settings {
        base_url: get("base_url")
            .ok_or(ConfigError::MissingField("base_url"))?
            .to_string(),
        api_version: values
            .get("api_version")
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        client_id: get("client_id")
            .ok_or(ConfigError::MissingField("client_id"))?
            .to_string(),
        client_secret: get("client_secret")
            .ok_or(ConfigError::MissingField("client_secret"))?
            .to_string(),
        timeout,
        verify_ssl: bool_default(get("verify_ssl").unwrap_or(""), true),
        agent_tag: get("agent_tag")
            .map(str::to_string)
            .unwrap_or_else(default_agent_tag),
    }
    .validated()
}

/// Parses INI text and returns the named section, or the first one when no
/// name is given.
pub fn ini_section(
    contents: &str,
    section: Option<&str>,
) -> Result<HashMap<String, String>, ConfigError> {
    let mut sections: Vec<(String, HashMap<String, String>)> = Vec::new();

    for (index, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            sections.push((name.trim().to_string(), HashMap::new()));
            continue;
        }
        // Whichever separator comes first splits the line
        let Some(at) = line.find(['=', ':']) else {
            return Err(ConfigError::Syntax {
                line: index + 1,
                content: line.to_string(),
            });
        };
        let (key, value) = (&line[..at], &line[at + 1..]);
        let Some((_, entries)) = sections.last_mut() else {
            return Err(ConfigError::Syntax {
                line: index + 1,
                content: line.to_string(),
            });
        };
        entries.insert(
            key.trim().to_ascii_lowercase(),
            unquote(value.trim()).to_string(),
        );
    }

    match section {
        Some(name) => sections
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, entries)| entries)
            .ok_or_else(|| ConfigError::SectionNotFound(name.to_string())),
        None => sections
            .into_iter()
            .next()
            .map(|(_, entries)| entries)
            .ok_or(ConfigError::NoSections),
    }
}

/// Strips surrounding quotes when the value starts and ends with the same
/// quote character.
pub fn unquote(value: &str) -> &str {
    for quote in ['"', '\'', '`'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

pub fn is_true(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "t" | "yes" | "y" | "1"
    )
}

pub fn is_false(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "false" | "f" | "no" | "n" | "0"
    )
}

pub fn bool_default(value: &str, default: bool) -> bool {
    if is_true(value) {
        true
    } else if is_false(value) {
        false
    } else {
        default
    }
}
