//! Manifest parsing and whole-manifest validation.
//!
//! ```toml
//! [[group]]
//! name = "web"
//! table = "ip"
//! sequence_start = 100
//!
//! [[group.entry]]
//! action = "pass"
//! protocol = "tcp"
//! destination_port = "443"
//!
//! [[group.binding]]
//! interface = "lan1"
//! direction = "in"
//!
//! [[apply]]
//! table = "ip"
//! interface = "lan2"
//! direction = "out"
//! filter_ids = [100]
//! ```
//!
//! YAML manifests use the same keys with `group:` and `apply:` lists.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use filterctl_core::{
    ApplyBinding, CoreError, DeclaredSequencing, Entry, FilterTable, GroupDecl, GroupId,
    StandaloneBinding, binding, conflict, sequence,
};

use crate::error::CliError;
use crate::family::{AnyGroupDecl, AnyGroupState, Family};

// ── Raw document ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default)]
    group: Vec<RawGroup>,
    #[serde(default)]
    apply: Vec<StandaloneBinding>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGroup {
    name: String,
    #[serde(default = "default_table")]
    table: FilterTable,
    sequence_start: Option<u32>,
    sequence_step: Option<u32>,
    #[serde(default)]
    entry: Vec<serde_json::Value>,
    #[serde(default)]
    binding: Vec<ApplyBinding>,
}

fn default_table() -> FilterTable {
    FilterTable::Ip
}

/// Manifest syntax, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Toml,
    Yaml,
}

impl Syntax {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Toml,
        }
    }
}

// ── Parsed manifest ─────────────────────────────────────────────────

/// Every group and standalone binding a manifest declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub groups: Vec<AnyGroupDecl>,
    pub bindings: Vec<StandaloneBinding>,
}

/// A manifest that passed validation, with each group's computed state.
#[derive(Debug, Clone)]
pub struct Validated {
    pub groups: Vec<(AnyGroupDecl, AnyGroupState)>,
    pub bindings: Vec<StandaloneBinding>,
}

impl Validated {
    pub fn group_ids(&self) -> BTreeSet<GroupId> {
        self.groups.iter().map(|(decl, _)| decl.id()).collect()
    }

    pub fn binding_keys(&self) -> BTreeSet<String> {
        self.bindings.iter().map(StandaloneBinding::id).collect()
    }
}

fn entries<P: DeserializeOwned>(
    group: &str,
    raw: Vec<serde_json::Value>,
) -> Result<Vec<Entry<P>>, String> {
    raw.into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value(value).map_err(|e| format!("group {group} entry {index}: {e}"))
        })
        .collect()
}

fn to_decl(raw: RawGroup) -> Result<AnyGroupDecl, String> {
    let declared = DeclaredSequencing {
        sequence_start: raw.sequence_start,
        sequence_step: raw.sequence_step,
    };
    match Family::of(raw.table) {
        Family::Ip => {
            let entries = entries(&raw.name, raw.entry)?;
            let mode = sequence::from_declared(&declared, &entries).map_err(|e| e.to_string())?;
            Ok(AnyGroupDecl::Ip(GroupDecl {
                name: raw.name,
                table: raw.table,
                mode,
                entries,
                bindings: raw.binding,
            }))
        }
        Family::Ethernet => {
            let entries = entries(&raw.name, raw.entry)?;
            let mode = sequence::from_declared(&declared, &entries).map_err(|e| e.to_string())?;
            Ok(AnyGroupDecl::Ethernet(GroupDecl {
                name: raw.name,
                table: raw.table,
                mode,
                entries,
                bindings: raw.binding,
            }))
        }
    }
}

impl Manifest {
    /// Parse manifest text.
    pub fn parse(text: &str, syntax: Syntax) -> Result<Self, String> {
        let raw: RawManifest = match syntax {
            Syntax::Toml => toml::from_str(text).map_err(|e| e.to_string())?,
            Syntax::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string())?,
        };
        let groups = raw
            .group
            .into_iter()
            .map(to_decl)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            groups,
            bindings: raw.apply,
        })
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, Syntax::from_path(path)).map_err(|reason| CliError::Manifest {
            path: path.display().to_string(),
            reason,
        })
    }

    /// Check every group and the manifest as a whole, without device calls.
    ///
    /// Per group: the full declaration check. Across the manifest: unique
    /// group ids, no number claimed by two groups of one table, no interface
    /// slot bound twice, and valid standalone bindings.
    pub fn validate(&self) -> Result<Validated, CoreError> {
        let mut seen = BTreeSet::new();
        let mut groups = Vec::with_capacity(self.groups.len());
        for decl in &self.groups {
            let id = decl.id();
            if !seen.insert(id.clone()) {
                return Err(CoreError::InvalidIdentity {
                    input: id.to_string(),
                    reason: "group is declared more than once".into(),
                });
            }
            let state = decl.realize()?;
            groups.push((decl.clone(), state));
        }

        let numbered: Vec<(GroupId, Vec<u32>)> = groups
            .iter()
            .map(|(_, state)| (state.id(), state.numbers()))
            .collect();
        conflict::check_across_groups(numbered.iter().map(|(id, n)| (id, n.as_slice())))?;

        for standalone in &self.bindings {
            if standalone.filter_ids.is_empty() {
                return Err(CoreError::InvalidIdentity {
                    input: standalone.id(),
                    reason: "standalone bindings need a non-empty filter_ids list".into(),
                });
            }
        }
        self.check_slots(&groups)?;

        Ok(Validated {
            groups,
            bindings: self.bindings.clone(),
        })
    }

    fn check_slots(&self, groups: &[(AnyGroupDecl, AnyGroupState)]) -> Result<(), CoreError> {
        let mut by_table: BTreeMap<FilterTable, Vec<(String, ApplyBinding)>> = BTreeMap::new();
        for (_, state) in groups {
            let owner = state.id().to_string();
            for b in state.bindings() {
                by_table
                    .entry(state.table())
                    .or_default()
                    .push((owner.clone(), b.clone()));
            }
        }
        for standalone in &self.bindings {
            by_table
                .entry(standalone.table)
                .or_default()
                .push((standalone.id(), standalone.as_binding()));
        }
        for (table, bindings) in &by_table {
            let own: Vec<ApplyBinding> = bindings.iter().map(|(_, b)| b.clone()).collect();
            binding::validate_filter_ids(*table, &own)?;
            binding::check_conflicts(*table, bindings.iter().map(|(o, b)| (o.as_str(), b)))?;
        }
        Ok(())
    }
}
