//! `state`: inspect recorded state without contacting the router.

use serde::Serialize;
use tabled::Tabled;

use filterctl_config::Config;

use crate::cli::{GlobalOpts, StateArgs, StateCommand};
use crate::error::CliError;
use crate::output;
use crate::state::StateFile;

use super::util;

/// One managed target, group or standalone binding.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct StateRow {
    #[tabled(rename = "Target")]
    pub target: String,
    #[tabled(rename = "Kind")]
    pub kind: &'static str,
    #[tabled(rename = "Filters")]
    pub filters: String,
    #[tabled(rename = "Updated")]
    pub updated: String,
}

fn rows(state: &StateFile) -> Vec<StateRow> {
    let groups = state.groups.values().map(|g| StateRow {
        target: g.state.id().to_string(),
        kind: if g.pending { "group (pending)" } else { "group" },
        filters: util::join_numbers(&g.state.numbers()),
        updated: g.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    });
    let bindings = state.bindings.values().map(|b| StateRow {
        target: b.binding.id(),
        kind: "binding",
        filters: util::join_numbers(&b.binding.filter_ids),
        updated: b.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    });
    groups.chain(bindings).collect()
}

pub fn handle(args: &StateArgs, global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    let (_, state) = util::open_state(global, cfg)?;
    let out = match &args.command {
        StateCommand::List => {
            let data = rows(&state);
            output::render_list(
                &global.output,
                &data,
                StateRow::clone,
                |r| r.target.clone(),
            )?
        }
        StateCommand::Show { group } => {
            let id = util::parse_group_id(group)?;
            let stored = state.group(&id).ok_or_else(|| util::not_managed(&id))?;
            output::render_single(
                &global.output,
                &stored.state,
                util::group_detail,
                |s| s.id().to_string(),
            )?
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use filterctl_core::{Direction, FilterTable, StandaloneBinding};

    #[test]
    fn rows_cover_groups_and_bindings() {
        let mut state = StateFile::default();
        state.put_binding(StandaloneBinding {
            table: FilterTable::Ip,
            interface: "lan2".into(),
            direction: Direction::Out,
            filter_ids: vec![100, 200],
        });
        let rows = rows(&state);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].target, "ip/lan2:out");
        assert_eq!(rows[0].kind, "binding");
        assert_eq!(rows[0].filters, "100 200");
    }
}
