//! `read`: refresh recorded state from the router.

use tracing::warn;

use filterctl_config::Config;
use filterctl_core::StandaloneBinding;

use crate::cli::{GlobalOpts, ReadArgs};
use crate::error::CliError;
use crate::family::AnyGroupState;
use crate::output;
use crate::router::RouterSession;

use super::util::{self, GroupRow};

pub async fn handle(args: &ReadArgs, global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    let (store, mut state) = util::open_state(global, cfg)?;

    let targets: Vec<AnyGroupState> = match &args.group {
        Some(raw) => {
            let id = util::parse_group_id(raw)?;
            let stored = state.group(&id).ok_or_else(|| util::not_managed(&id))?;
            vec![stored.state.clone()]
        }
        None => state.group_states().cloned().collect(),
    };

    let (router, client) = util::connect(global, cfg)?;
    let session = RouterSession::new(&client, router.controller_options());

    let mut refreshed = Vec::with_capacity(targets.len());
    for prior in &targets {
        match session.read(prior).await? {
            Some(current) => {
                state.put_group(current.clone());
                refreshed.push(current);
            }
            None => {
                warn!(group = %prior.id(), "group no longer on the router, dropping it from state");
                state.remove_group(&prior.id());
            }
        }
    }

    // Standalone bindings are refreshed only on a full read.
    if args.group.is_none() {
        let recorded: Vec<StandaloneBinding> =
            state.bindings.values().map(|b| b.binding.clone()).collect();
        for binding in recorded {
            match session.read_binding(&binding).await? {
                Some(current) => state.put_binding(current),
                None => {
                    warn!(binding = %binding.id(), "slot is empty on the router, dropping it from state");
                    state.remove_binding(&binding.id());
                }
            }
        }
    }

    store.save(&mut state)?;

    let out = output::render_list(
        &global.output,
        &refreshed,
        GroupRow::from_state,
        |s| s.id().to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
