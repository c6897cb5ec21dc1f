//! Sequence reconciliation engine for numbered router filter tables.
//!
//! Operators declare named, ordered groups of rules. The router only knows a
//! flat, globally numbered table per family plus interface bindings that
//! reference those numbers. This crate bridges the two:
//!
//! - **[`sequence`]**: assigns numbers, automatic (`start + i * step`) or
//!   manual, and validates them against the table's range.
//! - **[`diff`]** / **[`sync`]**: compute and apply the minimal set of
//!   deletes plus ordered re-definitions between two assignments.
//! - **[`binding`]**: reconciles `(interface, direction)` filter lists, with
//!   per-slot failure aggregation.
//! - **[`GroupController`]**: create / read / update / delete / import of one
//!   group, taking the previous [`GroupState`] and returning the next.
//! - **[`FilterDevice`]**: the only seam to the router, implemented for the
//!   router CLI by [`CliFilterDevice`].

pub mod binding;
pub mod conflict;
pub mod controller;
pub mod device;
pub mod diff;
pub mod error;
pub mod identity;
pub mod model;
pub mod sequence;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use controller::{ControllerOptions, GroupController, ImportRequest, realize};
pub use device::{CliFilterDevice, DeviceError, FilterDevice};
pub use diff::SequenceDiff;
pub use error::{BindingFailure, CoreError};
pub use identity::{GroupId, LegacyIdentityResolver};
pub use model::{
    ApplyBinding, BindingSlot, DeclaredSequencing, Direction, Entry, FilterAction, FilterTable,
    GroupDecl, GroupState, IpRule, MacRule, RealizedEntry, RulePayload, SequencingMode,
    StandaloneBinding,
};
pub use sync::SyncReport;
