//! store::git_backend
//!
//! The index documents as files on a Git branch.
//!
//! # Revisions
//!
//! The revision is the branch tip commit. A write builds one commit holding
//! every changed document on top of the expected tip, then moves the branch
//! with compare-and-swap, so readers see either the old tree or the new one.
//!
//! # Local and remote mode
//!
//! Without a remote, `refs/heads/<branch>` in the local repository is the
//! store and moves via a locked ref update.
//!
//! With a remote, each read fetches the remote branch into
//! `refs/simplepub/<remote>/<branch>` and reads from there; each write pushes
//! with `--force-with-lease` on the fetched tip. The local branch is not
//! touched in remote mode.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use super::backend::{BackendError, IndexBackend, Revision, Snapshot};
use crate::core::types::{BranchName, Oid, RefName};
use crate::git::{Git, Transport, TreeFile};
use crate::index::Document;

/// Git branch storage for the index.
#[derive(Debug, Clone)]
pub struct GitBackend {
    repo_path: PathBuf,
    branch: BranchName,
    remote: Option<String>,
    committer: Option<(String, String)>,
    timeout: Duration,
}

impl GitBackend {
    /// Local-only backend on `branch` of the repository containing `repo_path`.
    pub fn new(repo_path: impl Into<PathBuf>, branch: BranchName) -> Self {
        Self {
            repo_path: repo_path.into(),
            branch,
            remote: None,
            committer: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Synchronize with `remote` on every read and write.
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    /// Commit as this identity instead of the repository's.
    pub fn with_committer(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.committer = Some((name.into(), email.into()));
        self
    }

    /// Bound for each fetch and push.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    fn open(&self) -> Result<Git, BackendError> {
        Git::open(&self.repo_path).map_err(BackendError::from)
    }

    fn tracking_ref(&self, remote: &str) -> Result<RefName, BackendError> {
        RefName::for_remote_tracking(remote, &self.branch).map_err(|e| BackendError::Internal {
            message: e.to_string(),
        })
    }

    /// Ref holding the tip this backend reads from.
    fn source_ref(&self) -> Result<RefName, BackendError> {
        match &self.remote {
            Some(remote) => self.tracking_ref(remote),
            None => Ok(RefName::for_branch(&self.branch)),
        }
    }

    fn committer(&self) -> Option<(&str, &str)> {
        self.committer
            .as_ref()
            .map(|(name, email)| (name.as_str(), email.as_str()))
    }
}

impl IndexBackend for GitBackend {
    fn name(&self) -> &'static str {
        if self.remote.is_some() {
            "git-remote"
        } else {
            "git"
        }
    }

    fn read(&self, paths: &[String]) -> Result<Snapshot, BackendError> {
        let git = self.open()?;
        let source = self.source_ref()?;

        if let Some(remote) = &self.remote {
            let transport = Transport::new(git.command_dir(), self.timeout);
            let exists = transport.fetch_branch(remote, &self.branch, &source)?;
            if !exists {
                git.set_ref(source.as_str(), None, "simplepub: remote branch absent")?;
            }
        }

        let Some(tip) = git.try_resolve_ref(source.as_str())? else {
            debug!(source = %source, "index branch does not exist yet");
            return Ok(Snapshot::default());
        };

        let files = git.read_files(&tip, paths)?;
        Ok(Snapshot {
            revision: Some(Revision::new(tip.as_str())),
            files,
        })
    }

    fn write(
        &self,
        expected: Option<&Revision>,
        files: &[Document],
        message: &str,
    ) -> Result<Revision, BackendError> {
        let git = self.open()?;
        let parent = expected
            .map(|r| Oid::new(r.as_str()))
            .transpose()
            .map_err(|e| BackendError::Internal {
                message: format!("revision is not a commit id: {e}"),
            })?;

        let tree_files: Vec<TreeFile> = files
            .iter()
            .map(|doc| TreeFile {
                path: doc.path.clone(),
                contents: doc.body.clone(),
            })
            .collect();
        let commit = git.commit_files(parent.as_ref(), &tree_files, message, self.committer())?;

        match &self.remote {
            Some(remote) => {
                let transport = Transport::new(git.command_dir(), self.timeout);
                transport.push_with_lease(remote, &self.branch, &commit, parent.as_ref())?;
                let tracking = self.tracking_ref(remote)?;
                git.set_ref(tracking.as_str(), Some(&commit), "simplepub: pushed")?;
            }
            None => {
                let branch_ref = RefName::for_branch(&self.branch);
                git.update_ref_cas(
                    branch_ref.as_str(),
                    &commit,
                    parent.as_ref(),
                    &format!("simplepub: {message}"),
                )?;
            }
        }

        debug!(commit = %commit.short(12), branch = %self.branch, "index committed");
        Ok(Revision::new(commit.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bare_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        git2::Repository::init_bare(dir.path()).unwrap();
        dir
    }

    fn doc(path: &str, body: &str) -> Document {
        Document {
            path: path.into(),
            body: body.into(),
        }
    }

    fn backend(dir: &TempDir) -> GitBackend {
        GitBackend::new(dir.path(), BranchName::new("gh-pages").unwrap())
            .with_committer("Bot", "bot@example.com")
    }

    #[test]
    fn missing_branch_reads_empty() {
        let dir = bare_repo();
        let snapshot = backend(&dir).read(&["simple/index.html".into()]).unwrap();
        assert_eq!(snapshot, Snapshot::default());
    }

    #[test]
    fn write_then_read_back() {
        let dir = bare_repo();
        let store = backend(&dir);
        let rev = store
            .write(None, &[doc("simple/deptry/index.html", "pkg"), doc("simple/index.html", "root")], "publish")
            .unwrap();

        let snapshot = store
            .read(&["simple/index.html".into(), "simple/deptry/index.html".into()])
            .unwrap();
        assert_eq!(snapshot.revision, Some(rev));
        assert_eq!(snapshot.files["simple/index.html"], "root");
        assert_eq!(snapshot.files["simple/deptry/index.html"], "pkg");
    }

    #[test]
    fn stale_revision_is_conflict() {
        let dir = bare_repo();
        let store = backend(&dir);
        let first = store.write(None, &[doc("a.html", "1")], "one").unwrap();
        store.write(Some(&first), &[doc("a.html", "2")], "two").unwrap();

        let err = store.write(Some(&first), &[doc("a.html", "3")], "three").unwrap_err();
        assert!(matches!(err, BackendError::Conflict { .. }));
        let err = store.write(None, &[doc("a.html", "4")], "four").unwrap_err();
        assert!(matches!(err, BackendError::Conflict { .. }));

        let snapshot = store.read(&["a.html".into()]).unwrap();
        assert_eq!(snapshot.files["a.html"], "2");
    }

    #[test]
    fn not_a_repository_is_internal_error() {
        let dir = TempDir::new().unwrap();
        let store = GitBackend::new(dir.path().join("missing"), BranchName::default());
        assert!(matches!(store.read(&[]), Err(BackendError::Internal { .. })));
    }
}
