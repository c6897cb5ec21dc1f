//! CLI configuration: thin wrapper around `filterctl_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides (--router,
//! --username, --insecure, --timeout, --state).

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use filterctl_config::{
    Config, PASSWORD_ENV, Profile, RouterConfig, config_path, default_state_path,
    parse_router_url, resolve_password, resolve_username, tls_mode,
};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// State file path: flag > profile > platform default.
pub fn state_path(global: &GlobalOpts, config: &Config) -> PathBuf {
    if let Some(path) = &global.state {
        return path.clone();
    }
    config
        .profiles
        .get(&active_profile_name(global, config))
        .and_then(|p| p.state_file.clone())
        .unwrap_or_else(default_state_path)
}

/// Translate a `Profile` + global flags into a `RouterConfig`.
///
/// CLI flag overrides take priority over profile values.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    config: &Config,
    global: &GlobalOpts,
) -> Result<RouterConfig, CliError> {
    let url = parse_router_url(global.router.as_deref().unwrap_or(&profile.router))?;
    let username = match &global.username {
        Some(user) => user.clone(),
        None => resolve_username(profile, profile_name)?,
    };
    let password = resolve_password(profile, profile_name)?;
    let defaults = &config.defaults;

    Ok(RouterConfig {
        url,
        username,
        password,
        tls: tls_mode(
            global.insecure || profile.insecure.unwrap_or(defaults.insecure),
            profile.ca_cert.as_deref(),
        ),
        timeout: Duration::from_secs(
            global
                .timeout
                .or(profile.timeout)
                .unwrap_or(defaults.timeout),
        ),
        save_after_write: profile.save_after_write.unwrap_or(defaults.save_after_write),
        preflight_collisions: profile
            .preflight_collisions
            .unwrap_or(defaults.preflight_collisions),
    })
}

/// Build a `RouterConfig` from the config file, profile, and CLI overrides.
pub fn build_router_config(global: &GlobalOpts, config: &Config) -> Result<RouterConfig, CliError> {
    let profile_name = active_profile_name(global, config);

    if let Some(profile) = config.profiles.get(&profile_name) {
        return resolve_profile(profile, &profile_name, config, global);
    }
    if global.profile.is_some() {
        let mut available: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
        available.sort_unstable();
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        });
    }

    // No profile: build from flags and environment alone
    let router = global.router.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let no_credentials = || CliError::NoCredentials {
        profile: profile_name.clone(),
    };
    let username = global
        .username
        .clone()
        .ok_or_else(no_credentials)?;
    let password = std::env::var(PASSWORD_ENV)
        .map(SecretString::from)
        .map_err(|_| no_credentials())?;
    let defaults = &config.defaults;

    Ok(RouterConfig {
        url: parse_router_url(router)?,
        username,
        password,
        tls: tls_mode(global.insecure || defaults.insecure, None),
        timeout: Duration::from_secs(global.timeout.unwrap_or(defaults.timeout)),
        save_after_write: defaults.save_after_write,
        preflight_collisions: defaults.preflight_collisions,
    })
}
