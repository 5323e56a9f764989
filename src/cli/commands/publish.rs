//! publish command - run the release pipeline for a tag

use anyhow::Result;

use super::{github_host, index_store};
use crate::build::DistDirSource;
use crate::cli::Context;
use crate::engine::{PipelineError, ReleasePipeline, RetryPolicy, Trigger};
use crate::ui::output::{self, format_report};

/// Publish the artifacts for `tag` (or the CI tag) and update the index.
pub fn publish(ctx: &Context, tag: Option<String>, dry_run: bool) -> Result<()> {
    let trigger = Trigger::detect(tag);
    if let Trigger::Other { event } = trigger {
        return Err(PipelineError::UntriggeredByTag { event }.into());
    }

    let git = ctx.open_repo()?;
    let repo_dir = git.command_dir().to_path_buf();
    let config = ctx.load_config(&repo_dir).map_err(PipelineError::Config)?;
    let package = config.package().map_err(PipelineError::Config)?;
    let host = github_host(&git, &config)?;
    let build = DistDirSource::new(
        repo_dir.join(config.dist_dir()),
        config.extensions(),
        config.platforms(),
    );
    let store = index_store(&repo_dir, &config, package.clone());
    let retry = RetryPolicy::new(
        config.retry_max_attempts(),
        config.retry_base_delay(),
        config.retry_max_delay(),
    );

    let mut pipeline = ReleasePipeline::new(
        package,
        config.resolver(),
        config.platforms(),
        Box::new(build),
        Box::new(host),
        store,
    )
    .with_retry(retry)
    .dry_run(dry_run);

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(pipeline.run(trigger))?;
    output::print(format_report(&report), ctx.verbosity);
    Ok(())
}
