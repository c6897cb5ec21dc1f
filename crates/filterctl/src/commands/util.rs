//! Shared helpers for command handlers.

use std::io::IsTerminal;

use tabled::Tabled;

use filterctl_api::GatewayClient;
use filterctl_config::{Config, RouterConfig};
use filterctl_core::{GroupId, binding};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::family::AnyGroupState;
use crate::state::{StateFile, StateStore};

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal to ask on, the action needs `--yes`.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Open the state file selected by flags and profile.
pub fn open_state(global: &GlobalOpts, cfg: &Config) -> Result<(StateStore, StateFile), CliError> {
    let store = StateStore::new(config::state_path(global, cfg));
    let state = store.load()?;
    tracing::debug!(path = %store.path().display(), groups = state.groups.len(), "state loaded");
    Ok((store, state))
}

/// Resolve router settings and build a gateway client.
pub fn connect(global: &GlobalOpts, cfg: &Config) -> Result<(RouterConfig, GatewayClient), CliError> {
    let router = config::build_router_config(global, cfg)?;
    tracing::debug!(router = %router.url, user = %router.username, "connecting to command gateway");
    let client = router.connect()?;
    Ok((router, client))
}

pub fn parse_group_id(input: &str) -> Result<GroupId, CliError> {
    input.parse().map_err(|e: filterctl_core::CoreError| CliError::Validation {
        field: "group".into(),
        reason: e.to_string(),
    })
}

pub fn not_managed(id: &GroupId) -> CliError {
    CliError::NotFound {
        resource_type: "group".into(),
        identifier: id.to_string(),
        list_command: "state list".into(),
    }
}

pub fn join_numbers(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Group rendering ─────────────────────────────────────────────────

#[derive(Tabled)]
pub struct GroupRow {
    #[tabled(rename = "Group")]
    pub id: String,
    #[tabled(rename = "Mode")]
    pub mode: String,
    #[tabled(rename = "Filters")]
    pub numbers: String,
    #[tabled(rename = "Bindings")]
    pub bindings: String,
}

impl GroupRow {
    pub fn from_state(state: &AnyGroupState) -> Self {
        let bindings = binding::resolve_all(state.bindings(), &state.numbers())
            .keys()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            id: state.id().to_string(),
            mode: state.mode().to_string(),
            numbers: join_numbers(&state.numbers()),
            bindings,
        }
    }
}

/// Multi-line detail view of one group.
pub fn group_detail(state: &AnyGroupState) -> String {
    let mut lines = vec![
        format!("Group:    {}", state.id()),
        format!("Mode:     {}", state.mode()),
        "Entries:".to_owned(),
    ];
    lines.extend(
        state
            .rendered_entries()
            .into_iter()
            .map(|(number, args)| format!("  {number:>6}  {args}")),
    );
    let resolved = binding::resolve_all(state.bindings(), &state.numbers());
    if !resolved.is_empty() {
        lines.push("Bindings:".to_owned());
        lines.extend(
            resolved
                .iter()
                .map(|(slot, numbers)| format!("  {slot} -> {}", join_numbers(numbers))),
        );
    }
    lines.join("\n")
}
