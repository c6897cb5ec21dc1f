// ── Domain model ──
//
// Everything the engine reads or produces: filter tables, rule payloads,
// declared groups, and the realized group state.

mod group;
mod rule;
mod table;

pub use group::{
    ApplyBinding, DEFAULT_SEQUENCE_STEP, DeclaredSequencing, Entry, GroupDecl, GroupState,
    RealizedEntry, SequencingMode, StandaloneBinding,
};
pub use rule::{FilterAction, IpRule, MacRule, RuleParseError, RulePayload};
pub use table::{BindingSlot, Direction, FilterTable};
