//! engine::pipeline
//!
//! The release pipeline state machine.
//!
//! ```text
//! Idle --tag--> Resolving --> Collecting --> Publishing --> Done
//!                  ^                             |
//!                  +--- ConcurrentModification --+   (bounded, with backoff)
//!
//! any other error --> Failed(kind)
//! ```
//!
//! A run is sequential: no two steps overlap. A lost compare-and-swap race
//! restarts the whole resolve-collect-publish cycle, since the build
//! outputs and the index may both have changed in the meantime. Every other
//! error ends the run.
//!
//! Uploads happen inside `Publishing`, before the index write, so the index
//! never links to an artifact that is not yet downloadable.

use std::env;

use tracing::{error, info, warn};

use super::error::{ErrorKind, PipelineError};
use super::retry::RetryPolicy;
use crate::build::BuildSource;
use crate::core::artifact::ArtifactSet;
use crate::core::platform::PlatformSet;
use crate::core::types::PackageName;
use crate::core::version::{DistributionVersion, VersionResolver};
use crate::host::ReleaseHost;
use crate::store::{IndexStore, PublishResult};

/// States of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Resolving,
    Collecting,
    Publishing,
    Done,
    Failed(ErrorKind),
}

/// What started the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Tag(String),
    /// Anything that is not a tag push; carries a description for the error.
    Other { event: String },
}

impl Trigger {
    /// Determine the trigger from an explicit tag or the CI environment.
    ///
    /// Order: `explicit`, then `GITHUB_REF` when it names a tag, then
    /// `GITHUB_REF_NAME` when `GITHUB_REF_TYPE` is `tag`.
    pub fn detect(explicit: Option<String>) -> Self {
        Self::detect_with(explicit, |key| env::var(key).ok())
    }

    /// [`Trigger::detect`] with an injectable environment.
    pub fn detect_with(explicit: Option<String>, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(tag) = explicit {
            return Trigger::Tag(tag);
        }
        let github_ref = var("GITHUB_REF");
        if let Some(tag) = github_ref.as_deref().and_then(|r| r.strip_prefix("refs/tags/")) {
            return Trigger::Tag(tag.to_string());
        }
        if var("GITHUB_REF_TYPE").as_deref() == Some("tag") {
            if let Some(name) = var("GITHUB_REF_NAME").filter(|n| !n.is_empty()) {
                return Trigger::Tag(name);
            }
        }
        let event = github_ref
            .or_else(|| var("GITHUB_EVENT_NAME"))
            .unwrap_or_else(|| "no tag given".to_string());
        Trigger::Other { event }
    }
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Artifacts uploaded and the index updated (or already current).
    Published(PublishResult),
    /// Dry run: nothing uploaded or written.
    Planned {
        files: Vec<String>,
        already_published: bool,
    },
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub tag: String,
    pub version: DistributionVersion,
    pub outcome: PipelineOutcome,
    pub attempts: u32,
}

/// Orchestrates one release from tag to committed index.
pub struct ReleasePipeline {
    package: PackageName,
    resolver: VersionResolver,
    platforms: PlatformSet,
    build: Box<dyn BuildSource>,
    host: Box<dyn ReleaseHost>,
    store: IndexStore,
    retry: RetryPolicy,
    dry_run: bool,
    history: Vec<PipelineState>,
}

impl ReleasePipeline {
    pub fn new(
        package: PackageName,
        resolver: VersionResolver,
        platforms: PlatformSet,
        build: Box<dyn BuildSource>,
        host: Box<dyn ReleaseHost>,
        store: IndexStore,
    ) -> Self {
        Self {
            package,
            resolver,
            platforms,
            build,
            host,
            store,
            retry: RetryPolicy::default(),
            dry_run: false,
            history: Vec::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve and collect only; report instead of uploading and writing.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Current state.
    pub fn state(&self) -> &PipelineState {
        self.history.last().unwrap_or(&PipelineState::Idle)
    }

    /// Every state entered during the last run, in order.
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Run the pipeline for `trigger`.
    ///
    /// # Errors
    ///
    /// Any [`PipelineError`]; `ConcurrentModification` only once the retry
    /// budget is spent.
    pub async fn run(&mut self, trigger: Trigger) -> Result<PipelineReport, PipelineError> {
        self.history.clear();
        self.enter(PipelineState::Idle);

        let tag = match trigger {
            Trigger::Tag(tag) => tag,
            Trigger::Other { event } => {
                return Err(self.fail(PipelineError::UntriggeredByTag { event }));
            }
        };

        let mut attempt = 1;
        loop {
            match self.attempt(&tag, attempt).await {
                Ok(report) => {
                    self.enter(PipelineState::Done);
                    info!(tag = %tag, version = %report.version, attempt, "pipeline done");
                    return Ok(report);
                }
                Err(err) if err.is_retryable() && self.retry.allows_retry_after(attempt) => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        tag = %tag,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "index changed concurrently, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_retryable() => {
                    return Err(self.fail(PipelineError::ConcurrentModification { attempts: attempt }));
                }
                Err(err) => return Err(self.fail(err)),
            }
        }
    }

    async fn attempt(&mut self, tag: &str, attempt: u32) -> Result<PipelineReport, PipelineError> {
        self.enter(PipelineState::Resolving);
        let version = self
            .resolver
            .resolve(tag)
            .map_err(PipelineError::InvalidTagFormat)?;
        info!(tag, version = %version, attempt, "resolved version");

        self.enter(PipelineState::Collecting);
        let outputs = self.build.outputs(&version)?;
        let set = ArtifactSet::collect(&self.package, &version, outputs, &self.platforms)?;
        info!(tag, version = %version, attempt, artifacts = set.outputs().len(), "collected artifacts");

        self.enter(PipelineState::Publishing);
        let outcome = if self.dry_run {
            let already_published = self.store.load()?.state.find(&version).is_some();
            PipelineOutcome::Planned {
                files: set.outputs().iter().map(|o| o.filename.clone()).collect(),
                already_published,
            }
        } else {
            let uploaded = self.host.upload(&set).await?;
            info!(tag, host = self.host.name(), count = uploaded.len(), "artifacts uploaded");
            let release = set.into_release(uploaded)?;
            PipelineOutcome::Published(self.store.publish(release)?)
        };

        Ok(PipelineReport {
            tag: tag.to_string(),
            version,
            outcome,
            attempts: attempt,
        })
    }

    fn enter(&mut self, state: PipelineState) {
        info!(state = ?state, "pipeline state");
        self.history.push(state);
    }

    fn fail(&mut self, err: PipelineError) -> PipelineError {
        error!(kind = %err.kind(), "{err}");
        self.enter(PipelineState::Failed(err.kind()));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    mod trigger {
        use super::*;

        #[test]
        fn explicit_tag_wins() {
            let trigger = Trigger::detect_with(Some("v1.0.0".into()), env(&[("GITHUB_REF", "refs/tags/v2.0.0")]));
            assert_eq!(trigger, Trigger::Tag("v1.0.0".into()));
        }

        #[test]
        fn tag_from_github_ref() {
            let trigger = Trigger::detect_with(None, env(&[("GITHUB_REF", "refs/tags/v0.24.0")]));
            assert_eq!(trigger, Trigger::Tag("v0.24.0".into()));
        }

        #[test]
        fn tag_from_ref_name_and_type() {
            let trigger = Trigger::detect_with(
                None,
                env(&[("GITHUB_REF_TYPE", "tag"), ("GITHUB_REF_NAME", "v0.24.0")]),
            );
            assert_eq!(trigger, Trigger::Tag("v0.24.0".into()));
        }

        #[test]
        fn branch_push_is_not_a_tag() {
            let trigger = Trigger::detect_with(
                None,
                env(&[
                    ("GITHUB_REF", "refs/heads/main"),
                    ("GITHUB_REF_TYPE", "branch"),
                    ("GITHUB_REF_NAME", "main"),
                ]),
            );
            assert_eq!(
                trigger,
                Trigger::Other {
                    event: "refs/heads/main".into()
                }
            );
        }

        #[test]
        fn empty_environment() {
            assert!(matches!(Trigger::detect_with(None, env(&[])), Trigger::Other { .. }));
        }
    }
}
