//! `delete`: remove one managed group from the router.

use filterctl_config::Config;

use crate::cli::{DeleteArgs, GlobalOpts};
use crate::error::CliError;
use crate::router::RouterSession;

use super::util;

pub async fn handle(args: &DeleteArgs, global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    let id = util::parse_group_id(&args.group)?;
    let (store, mut state) = util::open_state(global, cfg)?;
    let prior = state
        .group(&id)
        .ok_or_else(|| util::not_managed(&id))?
        .state
        .clone();

    let prompt = format!(
        "Delete group {id} and its filters {} from the router?",
        util::join_numbers(&prior.numbers())
    );
    if !util::confirm(&prompt, "delete", global.yes)? {
        return Ok(());
    }

    let (router, client) = util::connect(global, cfg)?;
    let session = RouterSession::new(&client, router.controller_options());
    session.delete(&prior).await?;

    state.remove_group(&id);
    store.save(&mut state)?;
    if router.save_after_write {
        session.save().await?;
    }

    if !global.quiet {
        eprintln!("Group {id} deleted");
    }
    Ok(())
}
