//! `import`: adopt existing router filters as a managed group.

use filterctl_config::Config;
use filterctl_core::{ImportRequest, identity};

use crate::cli::{GlobalOpts, ImportArgs};
use crate::error::CliError;
use crate::output;
use crate::router::RouterSession;

use super::util;

pub async fn handle(args: &ImportArgs, global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    let (id, numbers) = identity::parse_import_id(&args.id)?;
    let (store, mut state) = util::open_state(global, cfg)?;
    if state.group(&id).is_some() {
        return Err(CliError::Conflict {
            message: format!("group {id} is already managed; delete it from state before importing"),
        });
    }

    let (router, client) = util::connect(global, cfg)?;
    let session = RouterSession::new(&client, router.controller_options());
    let imported = session
        .import(&ImportRequest {
            id,
            numbers,
            start: args.start,
            step: args.step,
        })
        .await?;

    state.put_group(imported.clone());
    store.save(&mut state)?;

    let out = output::render_single(
        &global.output,
        &imported,
        util::group_detail,
        |s| s.id().to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
