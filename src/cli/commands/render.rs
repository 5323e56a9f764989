//! render command - print the index documents as they should be committed

use anyhow::Result;

use super::index_store;
use crate::cli::Context;
use crate::engine::PipelineError;
use crate::ui::output;

/// Print the canonical rendering of the committed index.
///
/// Reads only; useful to check what a repair would write.
pub fn render(ctx: &Context, package_only: bool, root_only: bool) -> Result<()> {
    let git = ctx.open_repo()?;
    let repo_dir = git.command_dir().to_path_buf();
    let config = ctx.load_config(&repo_dir)?;
    let store = index_store(&repo_dir, &config, config.package()?);

    let snapshot = store.load().map_err(PipelineError::from)?;
    if snapshot.drifted {
        tracing::warn!("committed documents differ from this rendering");
    }
    let rendered = store
        .builder()
        .render(&snapshot.state)
        .map_err(PipelineError::EncodingError)?;

    for doc in rendered.documents() {
        let is_root = doc.path == rendered.root.path;
        if (package_only && is_root) || (root_only && !is_root) {
            continue;
        }
        if !package_only && !root_only {
            output::print(format!("==> {} <==", doc.path), ctx.verbosity);
        }
        print!("{}", doc.body);
    }
    Ok(())
}
