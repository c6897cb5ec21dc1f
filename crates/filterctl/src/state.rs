//! Local state file: what filterctl manages on the router.
//!
//! A JSON document keyed by canonical group id (`ip/web`). Files written
//! before tables were part of the id used the bare name for IPv4 groups;
//! those keys are still found on lookup and are re-keyed on save.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use filterctl_core::{GroupId, LegacyIdentityResolver, StandaloneBinding};

use crate::error::CliError;
use crate::family::AnyGroupState;

const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredGroup {
    pub updated_at: DateTime<Utc>,
    pub state: AnyGroupState,
    /// Recorded after an interrupted pass; the router may not match `state`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBinding {
    pub updated_at: DateTime<Utc>,
    pub binding: StandaloneBinding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub version: u32,

    #[serde(default)]
    pub groups: BTreeMap<String, StoredGroup>,

    /// Standalone bindings keyed by `table/interface:direction`.
    #[serde(default)]
    pub bindings: BTreeMap<String, StoredBinding>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            groups: BTreeMap::new(),
            bindings: BTreeMap::new(),
        }
    }
}

impl StateFile {
    /// Look up a group by id, accepting its legacy key.
    pub fn group(&self, id: &GroupId) -> Option<&StoredGroup> {
        LegacyIdentityResolver
            .resolve(&self.groups, id)
            .map(|resolved| resolved.value)
    }

    /// Record `state` under its canonical id, dropping any legacy key.
    pub fn put_group(&mut self, state: AnyGroupState) {
        self.insert_group(state, false);
    }

    /// Record what an interrupted pass may have left on the router. The
    /// next apply re-runs the group even if `state` matches the manifest.
    pub fn put_pending_group(&mut self, state: AnyGroupState) {
        self.insert_group(state, true);
    }

    fn insert_group(&mut self, state: AnyGroupState, pending: bool) {
        let id = state.id();
        if let Some(legacy) = id.legacy_key() {
            self.groups.remove(legacy);
        }
        self.groups.insert(
            id.to_string(),
            StoredGroup {
                updated_at: Utc::now(),
                state,
                pending,
            },
        );
    }

    pub fn remove_group(&mut self, id: &GroupId) -> Option<StoredGroup> {
        let canonical = self.groups.remove(&id.to_string());
        let legacy = id.legacy_key().and_then(|key| self.groups.remove(key));
        canonical.or(legacy)
    }

    pub fn binding(&self, key: &str) -> Option<&StandaloneBinding> {
        self.bindings.get(key).map(|b| &b.binding)
    }

    pub fn put_binding(&mut self, binding: StandaloneBinding) {
        self.bindings.insert(
            binding.id(),
            StoredBinding {
                updated_at: Utc::now(),
                binding,
            },
        );
    }

    pub fn remove_binding(&mut self, key: &str) -> Option<StandaloneBinding> {
        self.bindings.remove(key).map(|b| b.binding)
    }

    /// Every stored group, in canonical id order.
    pub fn group_states(&self) -> impl Iterator<Item = &AnyGroupState> {
        self.groups.values().map(|g| &g.state)
    }
}

/// Reads and writes the state file at one path.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corrupt(&self, reason: impl std::fmt::Display) -> CliError {
        CliError::StateFile {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Load the state file; a missing file is an empty state.
    pub fn load(&self) -> Result<StateFile, CliError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file yet");
                return Ok(StateFile::default());
            }
            Err(err) => return Err(err.into()),
        };
        let state: StateFile = serde_json::from_str(&text).map_err(|e| self.corrupt(e))?;
        if state.version > STATE_VERSION {
            return Err(self.corrupt(format!(
                "written by a newer filterctl (version {})",
                state.version
            )));
        }
        Ok(state)
    }

    /// Migrate legacy keys and write the file atomically.
    pub fn save(&self, state: &mut StateFile) -> Result<(), CliError> {
        let migrated = LegacyIdentityResolver.migrate(&mut state.groups);
        if !migrated.is_empty() {
            info!(count = migrated.len(), "migrated legacy group keys");
        }
        state.version = STATE_VERSION;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), groups = state.groups.len(), "state saved");
        Ok(())
    }
}
