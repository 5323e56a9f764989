//! resolve command - print the distribution version for a tag

use anyhow::Result;

use crate::cli::Context;
use crate::engine::PipelineError;
use crate::ui::output;

/// Print the distribution version `tag` resolves to.
///
/// Works outside a repository, using the defaults or a config file in the
/// working directory.
pub fn resolve(ctx: &Context, tag: &str) -> Result<()> {
    let dir = match ctx.open_repo() {
        Ok(git) => git.command_dir().to_path_buf(),
        Err(_) => ctx.cwd()?,
    };
    let config = ctx.load_config(&dir)?;
    let version = config
        .resolver()
        .resolve(tag)
        .map_err(PipelineError::InvalidTagFormat)?;
    output::print(version, ctx.verbosity);
    Ok(())
}
