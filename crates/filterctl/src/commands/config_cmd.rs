//! Config subcommand handlers.

use dialoguer::{Confirm, Input, Select};

use filterctl_config::{
    Config, Profile, config_path, load_config_or_default, save_config, store_password,
};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn profile_not_found(name: String, cfg: &Config) -> CliError {
    let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
    available.sort_unstable();
    CliError::ProfileNotFound {
        name,
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}

/// Config as JSON with plaintext passwords masked and unset keys dropped.
fn redacted(cfg: &Config) -> Result<serde_json::Value, CliError> {
    let mut value = serde_json::to_value(cfg)?;
    if let Some(top) = value.as_object_mut() {
        top.retain(|_, v| !v.is_null());
    }
    if let Some(profiles) = value
        .get_mut("profiles")
        .and_then(serde_json::Value::as_object_mut)
    {
        for profile in profiles.values_mut().filter_map(serde_json::Value::as_object_mut) {
            profile.retain(|_, v| !v.is_null());
            if let Some(pw) = profile.get_mut("password") {
                *pw = serde_json::Value::String("********".into());
            }
        }
    }
    Ok(value)
}

fn read_password(prompt: &str) -> Result<String, CliError> {
    let password = rpassword::prompt_password(prompt).map_err(prompt_err)?;
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(password)
}

// ── Init ────────────────────────────────────────────────────────────

fn init() -> Result<(), CliError> {
    let path = config_path();
    eprintln!("filterctl configuration wizard");
    eprintln!("   Config path: {}\n", path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let router: String = Input::new()
        .with_prompt("Router command gateway URL")
        .default("https://192.168.100.1".into())
        .interact_text()
        .map_err(prompt_err)?;

    let username: String = Input::new()
        .with_prompt("Username")
        .interact_text()
        .map_err(prompt_err)?;
    let pass = read_password("Password: ")?;

    let store_choices = &[
        "Store password in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let store_selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(store_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;
    let password = if store_selection == 0 {
        store_password(&profile_name, &pass)?;
        eprintln!("   Password stored in system keyring");
        None
    } else {
        Some(pass)
    };

    let insecure = Confirm::new()
        .with_prompt("Skip TLS certificate verification (self-signed router certificate)?")
        .default(false)
        .interact()
        .map_err(prompt_err)?;

    let mut cfg = load_config_or_default();
    cfg.profiles.insert(
        profile_name.clone(),
        Profile {
            router,
            username: Some(username),
            password,
            insecure: insecure.then_some(true),
            ..Profile::default()
        },
    );
    cfg.default_profile = Some(profile_name.clone());
    save_config(&cfg)?;

    eprintln!("\nConfiguration written to {}", path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: filterctl read");
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match &args.command {
        ConfigCommand::Init => init(),

        ConfigCommand::Show => {
            let cfg = load_config_or_default();
            let value = redacted(&cfg)?;
            let out = output::render_single(
                &global.output,
                &value,
                |v| toml::to_string_pretty(v).unwrap_or_else(|_| v.to_string()),
                |_| config_path().display().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = load_config_or_default();
            let default = config::active_profile_name(global, &cfg);
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: filterctl config init");
            } else {
                let mut names: Vec<&String> = cfg.profiles.keys().collect();
                names.sort_unstable();
                for name in names {
                    let marker = if *name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = load_config_or_default();
            if !cfg.profiles.contains_key(name) {
                return Err(profile_not_found(name.clone(), &cfg));
            }
            cfg.default_profile = Some(name.clone());
            save_config(&cfg)?;
            eprintln!("Default profile set to '{name}'");
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(profile_not_found(profile_name, &cfg));
            }
            let password = read_password("Password: ")?;
            store_password(&profile_name, &password)?;
            eprintln!("Password stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}
