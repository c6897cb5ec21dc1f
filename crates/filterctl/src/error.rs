//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError`, `ConfigError`, and gateway errors into user-facing
//! errors with actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use filterctl_config::ConfigError;
use filterctl_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const PARTIAL: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the router command gateway")]
    #[diagnostic(
        code(filterctl::connection_failed),
        help(
            "Check that the gateway is running and reachable.\n\
             Try: filterctl read --insecure"
        )
    )]
    ConnectionFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("TLS setup failed: {reason}")]
    #[diagnostic(
        code(filterctl::tls_error),
        help(
            "Routers usually ship a self-signed certificate.\n\
             Use --insecure (-k) to accept it, or configure ca_cert in your profile."
        )
    )]
    TlsError { reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(filterctl::timeout),
        help("Increase timeout with --timeout or check router responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(filterctl::auth_failed),
        help("Verify the username and password, then run: filterctl config set-password")
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(filterctl::no_credentials),
        help(
            "Configure credentials with: filterctl config init\n\
             Or set FILTERCTL_USERNAME and FILTERCTL_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(filterctl::not_found),
        help("Run: filterctl {list_command}")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{message}")]
    #[diagnostic(
        code(filterctl::conflict),
        help("Pick numbers that no other group or unmanaged filter uses, or import the existing filters first.")
    )]
    Conflict { message: String },

    #[error("Group {group} cannot switch numbering from {from} to {to} in place")]
    #[diagnostic(
        code(filterctl::mode_change),
        help("Re-run with --replace to delete and re-create the group.")
    )]
    ModeChange {
        group: String,
        from: String,
        to: String,
    },

    // ── Router ───────────────────────────────────────────────────────
    #[error("Router rejected `{command}`: {output}")]
    #[diagnostic(code(filterctl::rejected))]
    Rejected { command: String, output: String },

    #[error("Router operation failed: {message}")]
    #[diagnostic(code(filterctl::router))]
    Router { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(filterctl::partial),
        help("Filters were written and the state file was updated. Re-run the command to retry the failed bindings.")
    )]
    Partial { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(filterctl::validation))]
    Validation { field: String, reason: String },

    #[error("Invalid manifest {path}: {reason}")]
    #[diagnostic(
        code(filterctl::manifest),
        help("Manifests are TOML or YAML with [[group]] and [[apply]] tables.")
    )]
    Manifest { path: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(filterctl::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: filterctl config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No router configured")]
    #[diagnostic(
        code(filterctl::no_config),
        help(
            "Create a profile with: filterctl config init\n\
             Expected at: {path}\n\
             Or pass --router with FILTERCTL_USERNAME and FILTERCTL_PASSWORD."
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(filterctl::config))]
    Config(ConfigError),

    #[error("State file {path} is unreadable: {reason}")]
    #[diagnostic(
        code(filterctl::state),
        help("Fix or move the file aside; `filterctl import` can rebuild entries from the router.")
    )]
    StateFile { path: String, reason: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(filterctl::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(filterctl::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::TlsError { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } | Self::ModeChange { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Partial { .. } => exit_code::PARTIAL,
            Self::Validation { .. }
            | Self::Manifest { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Gateway error → CliError mapping ─────────────────────────────────

impl From<filterctl_api::Error> for CliError {
    fn from(err: filterctl_api::Error) -> Self {
        use filterctl_api::Error as Api;
        match err {
            Api::Authentication { message } => Self::AuthFailed { message },
            Api::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            Api::Tls(reason) => Self::TlsError { reason },
            Api::CommandRejected { command, output } => Self::Rejected { command, output },
            Api::Transport(e) if e.is_connect() || e.is_request() => Self::ConnectionFailed {
                source: Box::new(e),
            },
            Api::InvalidUrl(e) => Self::Validation {
                field: "router".into(),
                reason: e.to_string(),
            },
            other => Self::Router {
                message: other.to_string(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SequenceCollision { .. } | CoreError::BindingConflict { .. } => {
                Self::Conflict {
                    message: err.to_string(),
                }
            }

            CoreError::ModeChange { group, from, to } => Self::ModeChange { group, from, to },

            CoreError::GroupAbsent { group } => Self::NotFound {
                resource_type: "group".into(),
                identifier: group,
                list_command: "state list".into(),
            },

            CoreError::ImportEmpty { group, probed } => Self::NotFound {
                resource_type: "filters".into(),
                identifier: format!("{group} {probed:?}"),
                list_command: "import <table/name:n1,n2,...> with numbers present on the router"
                    .into(),
            },

            CoreError::Device { source, operation } => match source {
                filterctl_core::DeviceError::Transport(api) => api.into(),
                other => Self::Router {
                    message: format!("{operation}: {other}"),
                },
            },

            CoreError::BindingsFailed { .. } => Self::Partial {
                message: err.to_string(),
            },

            other => Self::Validation {
                field: "group".into(),
                reason: other.to_string(),
            },
        }
    }
}
