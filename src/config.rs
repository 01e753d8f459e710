//! Configuration management
//!
//! The backing document is YAML with three sections: `server` (identity,
//! network address, log level, SSL passthrough, agent-card metadata),
//! `users` (user id → pre-hashed access keys + backend subscriptions), and
//! `backends` (slug → upstream URL + bearer credential).
//!
//! Parsing is layered through figment so `A2A_GATEWAY_`-prefixed environment
//! variables override file values. All post-parse defaulting lives in one
//! declarative table ([`DEFAULTS`]) so it can be audited in one place.

use std::{collections::HashMap, fs, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Authorization policy consulted by the gateway dispatch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorizationPolicy {
    /// Every method requires a resolved caller identity (`users_only`).
    #[default]
    RequireAuthEverywhere,
    /// Only marked methods require identity (`marked_methods`).
    RequireAuthForMarkedMethods,
    /// No method requires identity (`none`).
    NoAuthRequired,
}

impl AuthorizationPolicy {
    /// Parse the wire string. Unknown values silently fall back to
    /// [`AuthorizationPolicy::RequireAuthEverywhere`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "marked_methods" => Self::RequireAuthForMarkedMethods,
            "none" => Self::NoAuthRequired,
            _ => Self::RequireAuthEverywhere,
        }
    }

    /// The wire string for this policy.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequireAuthEverywhere => "users_only",
            Self::RequireAuthForMarkedMethods => "marked_methods",
            Self::NoAuthRequired => "none",
        }
    }
}

impl<'de> Deserialize<'de> for AuthorizationPolicy {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

impl Serialize for AuthorizationPolicy {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Users section: user id → credentials + subscriptions
    pub users: HashMap<String, UserConfig>,
    /// Backends section: slug → connection descriptor
    pub backends: HashMap<String, BackendConfig>,
}

/// Server identity and network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (`host:port`)
    pub address: String,
    /// Server name
    pub name: String,
    /// Server version
    pub version: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Discovery handler path (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_handler: Option<String>,
    /// Authorization policy: `users_only`, `marked_methods`, or `none`
    pub authorization: AuthorizationPolicy,
    /// Minimum interval between applied config reloads (watcher debounce)
    #[serde(with = "humantime_serde")]
    pub reload_min_interval: Duration,
    /// SSL passthrough for the external TLS/ACME terminator
    pub ssl: SslConfig,
    /// Agent-card metadata served at `/.well-known/agent.json`
    pub a2a: A2aConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:4000".to_string(),
            name: "a2a-gateway".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            info_handler: None,
            authorization: AuthorizationPolicy::default(),
            reload_min_interval: Duration::from_secs(1),
            ssl: SslConfig::default(),
            a2a: A2aConfig::default(),
        }
    }
}

/// SSL configuration, consumed verbatim by the external TLS/ACME provider.
///
/// The gateway itself terminates plain TCP; these fields are carried so the
/// fronting layer can be driven from the same document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SslConfig {
    /// Whether TLS fronting is expected
    pub enabled: bool,
    /// `manual` (cert/key files) or `acme`; anything else normalizes to `manual`
    pub mode: String,
    /// Certificate file path (manual mode)
    pub cert_file: String,
    /// Private key file path (manual mode)
    pub key_file: String,
    /// Domains for ACME issuance
    pub acme_domains: Vec<String>,
    /// Contact email for ACME
    pub acme_email: String,
    /// ACME certificate cache directory
    pub acme_cache_dir: String,
}

/// Agent-card metadata (A2A section of the document).
///
/// Optional string fields stay `None` when absent; absence is distinct from
/// an empty string on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct A2aConfig {
    /// Agent display name
    pub agent_name: String,
    /// Agent description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_description: Option<String>,
    /// Agent version
    pub agent_version: String,
    /// Documentation URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_documentation_url: Option<String>,
    /// Provider organization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_provider_organization: Option<String>,
    /// Provider URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_provider_url: Option<String>,
    /// Default accepted input modes
    pub default_input_modes: Vec<String>,
    /// Default produced output modes
    pub default_output_modes: Vec<String>,
}

/// Per-user credentials and backend subscriptions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Access-key hashes (pre-hashed in the document; never hashed here)
    pub keys: Vec<String>,
    /// Backend slugs this user may call
    pub subscribes: Vec<String>,
}

/// Backend connection descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Upstream A2A endpoint URL
    pub url: String,
    /// Bearer credential presented to the upstream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer: Option<String>,
}

/// One post-parse default: a field path for the log line and the closure
/// that applies it. Returns `true` when the default was actually applied.
type DefaultRule = (&'static str, fn(&mut Config) -> bool);

/// Declarative defaulting table, applied once after parsing.
const DEFAULTS: &[DefaultRule] = &[
    ("server.ssl.mode", |c| {
        let normalized = if c.server.ssl.mode.eq_ignore_ascii_case("acme") {
            "acme"
        } else {
            "manual"
        };
        let changed = c.server.ssl.mode != normalized;
        c.server.ssl.mode = normalized.to_string();
        changed
    }),
    ("server.ssl.acme_cache_dir", |c| {
        if c.server.ssl.acme_cache_dir.is_empty() {
            c.server.ssl.acme_cache_dir = "./.autocert-cache".to_string();
            return true;
        }
        false
    }),
    ("server.a2a.agent_name", |c| {
        if c.server.a2a.agent_name.is_empty() {
            c.server.a2a.agent_name = "A2A Gateway Agent".to_string();
            return true;
        }
        false
    }),
    ("server.a2a.agent_version", |c| {
        if c.server.a2a.agent_version.is_empty() {
            c.server.a2a.agent_version = "1.0.0".to_string();
            return true;
        }
        false
    }),
    ("server.a2a.default_input_modes", |c| {
        if c.server.a2a.default_input_modes.is_empty() {
            c.server.a2a.default_input_modes = vec!["text".to_string()];
            return true;
        }
        false
    }),
    ("server.a2a.default_output_modes", |c| {
        if c.server.a2a.default_output_modes.is_empty() {
            c.server.a2a.default_output_modes = vec!["text".to_string()];
            return true;
        }
        false
    }),
];

impl Config {
    /// Load configuration from a file, overlaid with `A2A_GATEWAY_` env vars.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigRead`] if the file is unreadable and
    /// [`Error::ConfigParse`] if the document is malformed or invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .map_err(|e| Error::ConfigRead(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&data)
    }

    /// Parse configuration from a YAML string (env overlay included).
    pub fn from_yaml(data: &str) -> Result<Self> {
        let mut config: Self = Figment::new()
            .merge(Yaml::string(data))
            .merge(Env::prefixed("A2A_GATEWAY_").split("__"))
            .extract()
            .map_err(|e| Error::ConfigParse(e.to_string()))?;

        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Walk the [`DEFAULTS`] table once, logging each applied entry.
    fn apply_defaults(&mut self) {
        for (field, rule) in DEFAULTS {
            if rule(self) {
                tracing::debug!(field = %field, "Applied config default");
            }
        }
    }

    /// Structural validation beyond what serde enforces.
    fn validate(&self) -> Result<()> {
        for (slug, backend) in &self.backends {
            if backend.url.is_empty() {
                return Err(Error::ConfigParse(format!(
                    "backend '{slug}' has no url"
                )));
            }
            Url::parse(&backend.url).map_err(|e| {
                Error::ConfigParse(format!("backend '{slug}' url '{}': {e}", backend.url))
            })?;
        }
        Ok(())
    }
}
