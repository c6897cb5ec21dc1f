//! `apply`: converge the router onto a manifest and record the result.

use serde::Serialize;
use tabled::Tabled;
use tracing::{info, warn};

use filterctl_config::Config;
use filterctl_core::{CoreError, StandaloneBinding};

use crate::cli::{ApplyArgs, GlobalOpts};
use crate::error::CliError;
use crate::family::{AnyGroupDecl, AnyGroupState, recovery_state};
use crate::manifest::{Manifest, Validated};
use crate::output;
use crate::router::RouterSession;
use crate::state::StateFile;

use super::plan::{self, Action};
use super::util;

/// Result of one target in an apply run.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct Outcome {
    #[tabled(rename = "Target")]
    pub target: String,
    #[tabled(rename = "Action")]
    pub action: &'static str,
    #[tabled(rename = "Result")]
    pub result: String,
}

impl Outcome {
    fn ok(target: impl Into<String>, action: Action) -> Self {
        Self {
            target: target.into(),
            action: action.as_str(),
            result: "ok".into(),
        }
    }

    fn partial(target: impl Into<String>, action: Action, message: String) -> Self {
        Self {
            target: target.into(),
            action: action.as_str(),
            result: format!("partial: {message}"),
        }
    }

    fn is_partial(&self) -> bool {
        self.result.starts_with("partial")
    }
}

/// Refuse numbering-mode changes unless `--replace` was given.
fn check_mode_changes(validated: &Validated, state: &StateFile) -> Result<(), CliError> {
    for (decl, desired) in &validated.groups {
        let Some(prior) = state.group(&decl.id()) else {
            continue;
        };
        if plan::classify(Some(prior), desired, false) == Action::Blocked {
            return Err(CliError::ModeChange {
                group: decl.id().to_string(),
                from: prior.state.mode().to_string(),
                to: desired.mode().to_string(),
            });
        }
    }
    Ok(())
}

async fn apply_group(
    session: &RouterSession<'_>,
    state: &mut StateFile,
    decl: &AnyGroupDecl,
    desired: &AnyGroupState,
    action: Action,
) -> Result<Outcome, CliError> {
    let id = decl.id();
    let mut prior = state.group(&id).map(|g| g.state.clone());

    if action == Action::Replace {
        if let Some(old) = prior.take() {
            session.delete(&old).await?;
            state.remove_group(&id);
            info!(group = %id, from = %old.mode(), to = %desired.mode(), "removed group for numbering mode change");
        }
    }

    let result = match &prior {
        Some(p) => session.update(p, decl).await,
        None => session.create(decl).await,
    };
    match result {
        Ok(next) => {
            state.put_group(next);
            Ok(Outcome::ok(id.to_string(), action))
        }
        Err(err) => {
            if let Some(recovered) = recovery_state(prior.as_ref(), desired, &err) {
                state.put_pending_group(recovered);
            }
            if let CoreError::BindingsFailed { .. } = err {
                warn!(group = %id, error = %err, "group applied with binding failures");
                Ok(Outcome::partial(id.to_string(), action, err.to_string()))
            } else {
                Err(err.into())
            }
        }
    }
}

async fn apply_standalone(
    session: &RouterSession<'_>,
    state: &mut StateFile,
    desired: &StandaloneBinding,
) -> Result<Option<Outcome>, CliError> {
    let key = desired.id();
    let prior = state.binding(&key).cloned();
    if prior.as_ref() == Some(desired) {
        return Ok(None);
    }
    let action = if prior.is_some() {
        Action::Update
    } else {
        Action::Create
    };
    match session.apply_binding(prior.as_ref(), desired).await {
        Ok(()) => {
            state.put_binding(desired.clone());
            Ok(Some(Outcome::ok(key, action)))
        }
        Err(err @ CoreError::BindingsFailed { .. }) => {
            warn!(binding = %key, error = %err, "standalone binding failed");
            Ok(Some(Outcome::partial(key, action, err.to_string())))
        }
        Err(err) => Err(err.into()),
    }
}

/// Removals first, so numbers and slots freed by vanished targets are
/// available to the groups that replace them.
async fn execute(
    session: &RouterSession<'_>,
    validated: &Validated,
    state: &mut StateFile,
    outcomes: &mut Vec<Outcome>,
) -> Result<(), CliError> {
    let keys = validated.binding_keys();
    let stale: Vec<StandaloneBinding> = state
        .bindings
        .iter()
        .filter(|(key, _)| !keys.contains(*key))
        .map(|(_, stored)| stored.binding.clone())
        .collect();
    for binding in stale {
        session.remove_binding(&binding).await?;
        state.remove_binding(&binding.id());
        outcomes.push(Outcome::ok(binding.id(), Action::Delete));
    }

    let ids = validated.group_ids();
    let vanished: Vec<AnyGroupState> = state
        .group_states()
        .filter(|s| !ids.contains(&s.id()))
        .cloned()
        .collect();
    for prior in vanished {
        let id = prior.id();
        session.delete(&prior).await?;
        state.remove_group(&id);
        info!(group = %id, "deleted group missing from manifest");
        outcomes.push(Outcome::ok(id.to_string(), Action::Delete));
    }

    for (decl, desired) in &validated.groups {
        let action = plan::classify(state.group(&decl.id()), desired, true);
        if action == Action::Unchanged {
            continue;
        }
        outcomes.push(apply_group(session, state, decl, desired, action).await?);
    }

    for binding in &validated.bindings {
        if let Some(outcome) = apply_standalone(session, state, binding).await? {
            outcomes.push(outcome);
        }
    }
    Ok(())
}

pub async fn handle(args: &ApplyArgs, global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    let validated = Manifest::load(&args.manifest.file)?.validate()?;
    let (store, mut state) = util::open_state(global, cfg)?;

    if !args.replace {
        check_mode_changes(&validated, &state)?;
    }
    let planned = plan::build(&validated, &state, args.replace);
    if !planned.has_changes() {
        if !global.quiet {
            eprintln!("No changes. The router matches the manifest.");
        }
        return Ok(());
    }

    let destructive = planned.count(Action::Delete) + planned.count(Action::Replace);
    if destructive > 0
        && !util::confirm(
            &format!("Apply will delete or replace {destructive} managed target(s). Continue?"),
            "apply",
            global.yes,
        )?
    {
        return Ok(());
    }

    let (router, client) = util::connect(global, cfg)?;
    let session = RouterSession::new(&client, router.controller_options());

    let mut outcomes = Vec::new();
    let result = execute(&session, &validated, &mut state, &mut outcomes).await;
    let saved = store.save(&mut state);
    result?;
    saved?;

    if router.save_after_write && !outcomes.is_empty() {
        session.save().await?;
    }

    let out = output::render_list(
        &global.output,
        &outcomes,
        Outcome::clone,
        |o| o.target.clone(),
    )?;
    output::print_output(&out, global.quiet);

    let partial: Vec<&Outcome> = outcomes.iter().filter(|o| o.is_partial()).collect();
    if partial.is_empty() {
        Ok(())
    } else {
        Err(CliError::Partial {
            message: partial
                .iter()
                .map(|o| format!("{}: {}", o.target, o.result))
                .collect::<Vec<_>>()
                .join("; "),
        })
    }
}
