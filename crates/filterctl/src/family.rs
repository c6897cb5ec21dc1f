//! Rule-family wrappers.
//!
//! The engine is generic over the rule payload. A manifest or state file
//! mixes IP groups (IPv4 and IPv6 tables) with Ethernet groups, so the CLI
//! carries them behind one enum per shape.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use filterctl_core::{
    ApplyBinding, BindingFailure, BindingSlot, CoreError, FilterTable, GroupDecl, GroupId,
    GroupState, IpRule, MacRule, RulePayload, SequencingMode, binding, realize,
};

/// Payload family served by a filter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Ip,
    Ethernet,
}

impl Family {
    pub const fn of(table: FilterTable) -> Self {
        match table {
            FilterTable::Ip | FilterTable::Ipv6 => Self::Ip,
            FilterTable::Ethernet => Self::Ethernet,
        }
    }
}

// ── Declarations ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyGroupDecl {
    Ip(GroupDecl<IpRule>),
    Ethernet(GroupDecl<MacRule>),
}

impl AnyGroupDecl {
    pub fn id(&self) -> GroupId {
        match self {
            Self::Ip(d) => d.id(),
            Self::Ethernet(d) => d.id(),
        }
    }

    /// Validate and compute the state this declaration describes.
    pub fn realize(&self) -> Result<AnyGroupState, CoreError> {
        match self {
            Self::Ip(d) => realize(d).map(AnyGroupState::Ip),
            Self::Ethernet(d) => realize(d).map(AnyGroupState::Ethernet),
        }
    }
}

// ── Stored state ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", content = "group", rename_all = "lowercase")]
pub enum AnyGroupState {
    Ip(GroupState<IpRule>),
    Ethernet(GroupState<MacRule>),
}

impl AnyGroupState {
    pub fn id(&self) -> GroupId {
        match self {
            Self::Ip(s) => s.id(),
            Self::Ethernet(s) => s.id(),
        }
    }

    pub fn table(&self) -> FilterTable {
        match self {
            Self::Ip(s) => s.table,
            Self::Ethernet(s) => s.table,
        }
    }

    pub fn mode(&self) -> SequencingMode {
        match self {
            Self::Ip(s) => s.mode,
            Self::Ethernet(s) => s.mode,
        }
    }

    pub fn numbers(&self) -> Vec<u32> {
        match self {
            Self::Ip(s) => s.numbers(),
            Self::Ethernet(s) => s.numbers(),
        }
    }

    pub fn number_set(&self) -> BTreeSet<u32> {
        match self {
            Self::Ip(s) => s.number_set(),
            Self::Ethernet(s) => s.number_set(),
        }
    }

    pub fn bindings(&self) -> &[ApplyBinding] {
        match self {
            Self::Ip(s) => &s.bindings,
            Self::Ethernet(s) => &s.bindings,
        }
    }

    /// `(number, rendered device arguments)` per entry, in entry order.
    pub fn rendered_entries(&self) -> Vec<(u32, String)> {
        fn render<P: RulePayload>(state: &GroupState<P>) -> Vec<(u32, String)> {
            state
                .entries
                .iter()
                .map(|e| (e.number, e.rule.to_device_args()))
                .collect()
        }
        match self {
            Self::Ip(s) => render(s),
            Self::Ethernet(s) => render(s),
        }
    }
}

// ── Recovery after an interrupted pass ──────────────────────────────

/// State to record after a create or update failed part-way.
///
/// Returns `None` for failures raised before any device write. Otherwise the
/// result claims every number the interrupted pass may have written, and
/// only the bindings known to be in place, so the next run converges
/// without tripping its own collision check. Bindings carried over from
/// `prior` are pinned to the lists the router actually holds.
pub fn recovery_state(
    prior: Option<&AnyGroupState>,
    desired: &AnyGroupState,
    err: &CoreError,
) -> Option<AnyGroupState> {
    if err.is_validation() {
        return None;
    }
    match (prior, desired) {
        (None, AnyGroupState::Ip(d)) => recover(None, d, err).map(AnyGroupState::Ip),
        (Some(AnyGroupState::Ip(p)), AnyGroupState::Ip(d)) => {
            recover(Some(p), d, err).map(AnyGroupState::Ip)
        }
        (None, AnyGroupState::Ethernet(d)) => recover(None, d, err).map(AnyGroupState::Ethernet),
        (Some(AnyGroupState::Ethernet(p)), AnyGroupState::Ethernet(d)) => {
            recover(Some(p), d, err).map(AnyGroupState::Ethernet)
        }
        _ => None,
    }
}

fn pinned<'a>(
    bindings: &'a [ApplyBinding],
    numbers: &'a [u32],
) -> impl Iterator<Item = ApplyBinding> + 'a {
    bindings
        .iter()
        .map(move |b| b.clone().with_filter_ids(binding::resolve(b, numbers)))
}

fn recover<P: Clone>(
    prior: Option<&GroupState<P>>,
    desired: &GroupState<P>,
    err: &CoreError,
) -> Option<GroupState<P>> {
    let prior_bindings = prior.map_or(&[][..], |p| p.bindings.as_slice());
    let prior_numbers = prior.map(GroupState::numbers).unwrap_or_default();
    match err {
        // Entries are fully synced; only some slots are out of date.
        CoreError::BindingsFailed { failures } => {
            let failed: BTreeSet<&BindingSlot> = failures.iter().map(|f: &BindingFailure| &f.slot).collect();
            let mut bindings: Vec<ApplyBinding> = desired
                .bindings
                .iter()
                .filter(|b| !failed.contains(&b.slot()))
                .cloned()
                .collect();
            bindings.extend(
                pinned(prior_bindings, &prior_numbers).filter(|b| failed.contains(&b.slot())),
            );
            Some(GroupState {
                bindings,
                ..desired.clone()
            })
        }
        // The entry pass stopped somewhere; bindings were never touched.
        CoreError::Device { .. } => {
            let mut state = desired.clone();
            let claimed = state.number_set();
            if let Some(prior) = prior {
                state.entries.extend(
                    prior
                        .entries
                        .iter()
                        .filter(|e| !claimed.contains(&e.number))
                        .cloned(),
                );
            }
            state.bindings = pinned(prior_bindings, &prior_numbers).collect();
            Some(state)
        }
        _ => None,
    }
}
