//! `plan`: show what `apply` would do, without contacting the router.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use filterctl_config::Config;
use filterctl_core::controller::bindings_differ;
use filterctl_core::device::{bind_command, define_command, delete_command, unbind_command};
use filterctl_core::{BindingSlot, FilterTable, StandaloneBinding, binding, diff};

use crate::cli::{GlobalOpts, ManifestArgs};
use crate::error::CliError;
use crate::family::AnyGroupState;
use crate::manifest::{Manifest, Validated};
use crate::output::{self, Change, change_line};
use crate::state::{StateFile, StoredGroup};

use super::util;

/// What apply does with one group or standalone binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    /// Numbering mode changed; delete then create.
    Replace,
    Delete,
    Unchanged,
    /// Numbering mode changed and `--replace` was not given.
    Blocked,
}

impl Action {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::Unchanged => "unchanged",
            Self::Blocked => "blocked",
        }
    }

    pub const fn writes(self) -> bool {
        !matches!(self, Self::Unchanged | Self::Blocked)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanLine {
    pub change: Change,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanItem {
    pub target: String,
    pub action: Action,
    /// The last apply of this group stopped part-way.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<PlanLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub items: Vec<PlanItem>,
}

impl Plan {
    pub fn has_changes(&self) -> bool {
        self.items.iter().any(|i| i.action.writes())
    }

    pub fn count(&self, action: Action) -> usize {
        self.items.iter().filter(|i| i.action == action).count()
    }
}

/// Decide what apply does for a declared group.
///
/// A group recorded by an interrupted apply is never unchanged: its stored
/// state says what may be on the router, not what is.
pub fn classify(prior: Option<&StoredGroup>, desired: &AnyGroupState, replace: bool) -> Action {
    match prior {
        None => Action::Create,
        Some(prior) if !prior.state.mode().same_variant(&desired.mode()) => {
            if replace {
                Action::Replace
            } else {
                Action::Blocked
            }
        }
        Some(prior) if prior.state == *desired && !prior.pending => Action::Unchanged,
        Some(_) => Action::Update,
    }
}

// ── Line rendering ──────────────────────────────────────────────────

fn line(change: Change, command: String) -> PlanLine {
    PlanLine { change, command }
}

fn bind_lines(
    table: FilterTable,
    slots: &BTreeMap<BindingSlot, Vec<u32>>,
    prior: &BTreeSet<BindingSlot>,
) -> Vec<PlanLine> {
    slots
        .iter()
        .map(|(slot, numbers)| {
            if numbers.is_empty() {
                line(
                    Change::Remove,
                    unbind_command(table, &slot.interface, slot.direction),
                )
            } else {
                let change = if prior.contains(slot) {
                    Change::Modify
                } else {
                    Change::Add
                };
                line(
                    change,
                    bind_command(table, &slot.interface, slot.direction, numbers),
                )
            }
        })
        .collect()
}

fn teardown_lines(state: &AnyGroupState) -> Vec<PlanLine> {
    let table = state.table();
    let mut lines: Vec<PlanLine> = binding::resolve_all(state.bindings(), &state.numbers())
        .keys()
        .map(|slot| {
            line(
                Change::Remove,
                unbind_command(table, &slot.interface, slot.direction),
            )
        })
        .collect();
    lines.extend(
        state
            .number_set()
            .into_iter()
            .map(|n| line(Change::Remove, delete_command(table, n))),
    );
    lines
}

fn create_lines(state: &AnyGroupState) -> Vec<PlanLine> {
    let table = state.table();
    let mut lines: Vec<PlanLine> = state
        .rendered_entries()
        .into_iter()
        .map(|(n, args)| line(Change::Add, define_command(table, n, &args)))
        .collect();
    let slots = binding::resolve_all(state.bindings(), &state.numbers());
    lines.extend(bind_lines(table, &slots, &BTreeSet::new()));
    lines
}

fn update_lines(prior: &AnyGroupState, desired: &AnyGroupState) -> Vec<PlanLine> {
    let table = desired.table();
    let before: BTreeMap<u32, String> = prior.rendered_entries().into_iter().collect();
    let plan = diff::diff(&prior.number_set(), &desired.numbers());

    let mut lines: Vec<PlanLine> = plan
        .to_delete
        .iter()
        .map(|&n| line(Change::Remove, delete_command(table, n)))
        .collect();
    lines.extend(desired.rendered_entries().into_iter().map(|(n, args)| {
        let change = match before.get(&n) {
            None => Change::Add,
            Some(old) if *old == args => Change::Keep,
            Some(_) => Change::Modify,
        };
        line(change, define_command(table, n, &args))
    }));

    let (old_fallback, new_fallback) = (prior.numbers(), desired.numbers());
    if bindings_differ(
        prior.bindings(),
        &old_fallback,
        desired.bindings(),
        &new_fallback,
    ) {
        let old_slots: BTreeSet<BindingSlot> = binding::resolve_all(prior.bindings(), &old_fallback)
            .into_keys()
            .collect();
        let new_slots = binding::resolve_all(desired.bindings(), &new_fallback);
        lines.extend(
            old_slots
                .iter()
                .filter(|slot| !new_slots.contains_key(*slot))
                .map(|slot| {
                    line(
                        Change::Remove,
                        unbind_command(table, &slot.interface, slot.direction),
                    )
                }),
        );
        lines.extend(bind_lines(table, &new_slots, &old_slots));
    }
    lines
}

fn binding_item(prior: Option<&StandaloneBinding>, desired: &StandaloneBinding) -> PlanItem {
    let action = match prior {
        None => Action::Create,
        Some(p) if p == desired => Action::Unchanged,
        Some(_) => Action::Update,
    };
    let change = if action == Action::Create {
        Change::Add
    } else {
        Change::Modify
    };
    let changes = if action == Action::Unchanged {
        Vec::new()
    } else {
        vec![line(
            change,
            bind_command(
                desired.table,
                &desired.interface,
                desired.direction,
                &desired.filter_ids,
            ),
        )]
    };
    PlanItem {
        target: desired.id(),
        action,
        pending: false,
        changes,
    }
}

// ── Plan assembly ───────────────────────────────────────────────────

/// Compare a validated manifest with recorded state.
pub fn build(validated: &Validated, state: &StateFile, replace: bool) -> Plan {
    let mut items = Vec::new();

    for (decl, desired) in &validated.groups {
        let stored = state.group(&decl.id());
        let action = classify(stored, desired, replace);
        let prior = stored.map(|g| &g.state);
        let changes = match (action, prior) {
            (Action::Create, _) => create_lines(desired),
            (Action::Update, Some(prior)) => update_lines(prior, desired),
            (Action::Replace, Some(prior)) => {
                let mut lines = teardown_lines(prior);
                lines.extend(create_lines(desired));
                lines
            }
            _ => Vec::new(),
        };
        items.push(PlanItem {
            target: decl.id().to_string(),
            action,
            pending: stored.is_some_and(|g| g.pending),
            changes,
        });
    }

    for standalone in &validated.bindings {
        items.push(binding_item(state.binding(&standalone.id()), standalone));
    }

    let keys = validated.binding_keys();
    for (key, stored) in &state.bindings {
        if !keys.contains(key) {
            let b = &stored.binding;
            items.push(PlanItem {
                target: key.clone(),
                action: Action::Delete,
                pending: false,
                changes: vec![line(
                    Change::Remove,
                    unbind_command(b.table, &b.interface, b.direction),
                )],
            });
        }
    }

    let ids = validated.group_ids();
    for stored in state.groups.values() {
        let prior = &stored.state;
        if !ids.contains(&prior.id()) {
            items.push(PlanItem {
                target: prior.id().to_string(),
                action: Action::Delete,
                pending: stored.pending,
                changes: teardown_lines(prior),
            });
        }
    }

    Plan { items }
}

/// Text rendering of a plan, one block per target.
pub fn render_text(plan: &Plan, color: bool) -> String {
    if !plan.has_changes() {
        return "No changes. The router matches the manifest.".to_owned();
    }
    let mut out = Vec::new();
    for item in plan.items.iter().filter(|i| i.action != Action::Unchanged) {
        out.push(format!("{} ({})", item.target, item.action.as_str()));
        if item.action == Action::Blocked {
            out.push("  numbering mode changed; re-run with --replace".to_owned());
        }
        if item.pending && item.action == Action::Update {
            out.push("  previous apply stopped part-way; every entry is re-sent".to_owned());
        }
        out.extend(
            item.changes
                .iter()
                .map(|l| format!("  {}", change_line(l.change, &l.command, color))),
        );
    }
    out.push(format!(
        "Plan: {} to create, {} to update, {} to replace, {} to delete.",
        plan.count(Action::Create),
        plan.count(Action::Update),
        plan.count(Action::Replace),
        plan.count(Action::Delete)
    ));
    out.join("\n")
}

pub fn handle(args: &ManifestArgs, global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    let validated = Manifest::load(&args.file)?.validate()?;
    let (_, state) = util::open_state(global, cfg)?;
    let plan = build(&validated, &state, false);

    let color = output::should_color(&global.color);
    let rendered = output::render_single(
        &global.output,
        &plan,
        |p| render_text(p, color),
        |p| {
            p.items
                .iter()
                .filter(|i| i.action.writes())
                .map(|i| format!("{} {}", i.action.as_str(), i.target))
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
