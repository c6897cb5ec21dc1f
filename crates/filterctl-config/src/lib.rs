//! Shared configuration for filterctl.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to a runtime [`RouterConfig`]. The CLI layers its
//! `GlobalOpts` flag overrides on top of these helpers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use filterctl_api::{GatewayClient, TlsMode, TransportConfig};
use filterctl_core::ControllerOptions;

/// Keyring service name under which router passwords are stored.
pub const KEYRING_SERVICE: &str = "filterctl";

/// Environment variable consulted for the router password.
pub const PASSWORD_ENV: &str = "FILTERCTL_PASSWORD";

/// Environment variable consulted for the router username.
pub const USERNAME_ENV: &str = "FILTERCTL_USERNAME";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named router profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Persist the router configuration after every mutating apply.
    #[serde(default)]
    pub save_after_write: bool,

    /// Refuse to claim numbers already present on the router.
    #[serde(default = "default_true")]
    pub preflight_collisions: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: false,
            timeout: default_timeout(),
            save_after_write: false,
            preflight_collisions: true,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

/// A named router profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Command gateway base URL (e.g., "https://192.168.1.1").
    pub router: String,

    /// Gateway username.
    pub username: Option<String>,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Override `defaults.save_after_write`.
    pub save_after_write: Option<bool>,

    /// Override `defaults.preflight_collisions`.
    pub preflight_collisions: Option<bool>,

    /// State file for groups managed through this profile.
    pub state_file: Option<PathBuf>,
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "filterctl", "filterctl")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of the managed-group state file.
pub fn default_state_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".local/share").join("state.json"),
        |dirs| dirs.data_dir().join("state.json"),
    )
}

fn dirs_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("filterctl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load Config from `path`, then `FILTERCTL_*` variables.
///
/// Nested keys use a double underscore: `FILTERCTL_DEFAULTS__TIMEOUT=60`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FILTERCTL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
}

/// Resolve the gateway username: profile, then `FILTERCTL_USERNAME`.
pub fn resolve_username(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    profile
        .username
        .clone()
        .or_else(|| std::env::var(USERNAME_ENV).ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Resolve the gateway password from the credential chain.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env, then FILTERCTL_PASSWORD
    let env_names = profile.password_env.as_deref().into_iter().chain([PASSWORD_ENV]);
    for name in env_names {
        if let Ok(pw) = std::env::var(name) {
            return Ok(SecretString::from(pw));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password)?;
    Ok(())
}

// ── Runtime router config ───────────────────────────────────────────

/// Everything needed to reach one router and drive its filter tables.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub url: Url,
    pub username: String,
    pub password: SecretString,
    pub tls: TlsMode,
    pub timeout: Duration,
    pub save_after_write: bool,
    pub preflight_collisions: bool,
}

impl RouterConfig {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            preflight_collisions: self.preflight_collisions,
        }
    }

    /// Build a gateway client for this router.
    pub fn connect(&self) -> Result<GatewayClient, filterctl_api::Error> {
        GatewayClient::new(
            self.url.clone(),
            self.username.clone(),
            self.password.clone(),
            &self.transport(),
        )
    }
}

/// Parse a router URL, accepting only http and https.
pub fn parse_router_url(input: &str) -> Result<Url, ConfigError> {
    let url: Url = input.parse().map_err(|e| ConfigError::Validation {
        field: "router".into(),
        reason: format!("invalid URL '{input}': {e}"),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Validation {
            field: "router".into(),
            reason: format!("unsupported scheme '{other}', expected http or https"),
        }),
    }
}

/// TLS mode from the insecure switch and an optional CA bundle.
pub fn tls_mode(insecure: bool, ca_cert: Option<&Path>) -> TlsMode {
    if insecure {
        TlsMode::DangerAcceptInvalid
    } else if let Some(path) = ca_cert {
        TlsMode::CustomCa(path.to_path_buf())
    } else {
        TlsMode::System
    }
}

/// Build a `RouterConfig` from a profile and the global defaults.
pub fn profile_to_router_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<RouterConfig, ConfigError> {
    let url = parse_router_url(&profile.router)?;
    let username = resolve_username(profile, profile_name)?;
    let password = resolve_password(profile, profile_name)?;

    Ok(RouterConfig {
        url,
        username,
        password,
        tls: tls_mode(
            profile.insecure.unwrap_or(defaults.insecure),
            profile.ca_cert.as_deref(),
        ),
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        save_after_write: profile.save_after_write.unwrap_or(defaults.save_after_write),
        preflight_collisions: profile
            .preflight_collisions
            .unwrap_or(defaults.preflight_collisions),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    const SAMPLE: &str = r#"
default_profile = "edge"

[defaults]
timeout = 45
save_after_write = true

[profiles.edge]
router = "https://10.0.0.1"
username = "ops"
password_env = "EDGE_ROUTER_PW"
insecure = true
preflight_collisions = false
"#;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.timeout, 30);
        assert!(cfg.defaults.preflight_collisions);
        assert!(!cfg.defaults.save_after_write);
    }

    #[test]
    fn file_and_env_are_layered() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            jail.set_env("FILTERCTL_DEFAULTS__TIMEOUT", "90");

            let cfg = load_config_from(Path::new("config.toml")).unwrap();
            assert_eq!(cfg.default_profile.as_deref(), Some("edge"));
            assert_eq!(cfg.defaults.timeout, 90);
            assert!(cfg.defaults.save_after_write);
            assert!(cfg.defaults.preflight_collisions);

            let edge = &cfg.profiles["edge"];
            assert_eq!(edge.router, "https://10.0.0.1");
            assert_eq!(edge.preflight_collisions, Some(false));
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_| {
            let cfg = load_config_from(Path::new("absent.toml")).unwrap();
            assert!(cfg.profiles.is_empty());
            assert_eq!(cfg.defaults.output, "table");
            Ok(())
        });
    }

    #[test]
    fn profile_resolves_to_router_config() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            jail.set_env("EDGE_ROUTER_PW", "hunter2");

            let cfg = load_config_from(Path::new("config.toml")).unwrap();
            let router =
                profile_to_router_config(&cfg.profiles["edge"], "edge", &cfg.defaults).unwrap();

            assert_eq!(router.url.as_str(), "https://10.0.0.1/");
            assert_eq!(router.username, "ops");
            assert_eq!(router.password.expose_secret(), "hunter2");
            assert!(matches!(router.tls, TlsMode::DangerAcceptInvalid));
            assert_eq!(router.timeout, Duration::from_secs(45));
            assert!(router.save_after_write);
            assert!(!router.controller_options().preflight_collisions);
            Ok(())
        });
    }

    #[test]
    fn username_falls_back_to_env() {
        Jail::expect_with(|jail| {
            jail.set_env(USERNAME_ENV, "admin");
            let profile = Profile {
                router: "http://r1".into(),
                ..Profile::default()
            };
            assert_eq!(resolve_username(&profile, "r1").unwrap(), "admin");
            Ok(())
        });
    }

    #[test]
    fn missing_username_is_reported_per_profile() {
        Jail::expect_with(|_| {
            let profile = Profile::default();
            let err = resolve_username(&profile, "lab").unwrap_err();
            assert!(matches!(err, ConfigError::NoCredentials { ref profile } if profile == "lab"));
            Ok(())
        });
    }

    #[test]
    fn router_url_must_be_http() {
        assert!(parse_router_url("https://192.168.1.1").is_ok());
        assert!(parse_router_url("http://router.lan:8080").is_ok());
        assert!(matches!(
            parse_router_url("ssh://192.168.1.1"),
            Err(ConfigError::Validation { .. })
        ));
        assert!(parse_router_url("not a url").is_err());
    }

    #[test]
    fn insecure_wins_over_ca_cert() {
        let ca = Path::new("/etc/ssl/router.pem");
        assert!(matches!(tls_mode(true, Some(ca)), TlsMode::DangerAcceptInvalid));
        assert!(matches!(tls_mode(false, Some(ca)), TlsMode::CustomCa(ref p) if p == ca));
        assert!(matches!(tls_mode(false, None), TlsMode::System));
    }

    #[test]
    fn saved_config_loads_back() {
        Jail::expect_with(|jail| {
            let mut cfg = Config::default();
            cfg.profiles.insert(
                "lab".into(),
                Profile {
                    router: "https://lab".into(),
                    username: Some("ops".into()),
                    ..Profile::default()
                },
            );
            let path = jail.directory().join("nested/config.toml");
            save_config_to(&cfg, &path).unwrap();

            let loaded = load_config_from(&path).unwrap();
            assert_eq!(loaded.profiles["lab"].username.as_deref(), Some("ops"));
            Ok(())
        });
    }
}
