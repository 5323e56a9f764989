//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to repository objects and refs.
//! The index store never touches `.git` internals or `git2` directly; it asks
//! this interface for file contents at a commit, builds a new commit from a
//! parent plus replaced files, and moves a ref with compare-and-swap
//! semantics.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::CasFailed`]: Compare-and-swap precondition failed
//! - [`GitError::Timeout`]: A transport subprocess exceeded its bound
//! - [`GitError::CommandFailed`]: A transport subprocess exited non-zero
//!
//! # Example
//!
//! ```ignore
//! use simplepub::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! if let Some(tip) = git.try_resolve_ref("refs/heads/gh-pages")? {
//!     let files = git.read_files(&tip, &["simple/index.html".to_string()])?;
//!     println!("{} files", files.len());
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{Oid, TypeError};

/// Default identity for index commits when neither config nor the
/// repository provides one.
const FALLBACK_NAME: &str = "simplepub";
const FALLBACK_EMAIL: &str = "simplepub@localhost";

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Compare-and-swap precondition failed.
    ///
    /// The ref moved between reading it and writing it.
    #[error("CAS failed for {refname}: expected {expected}, found {actual}")]
    CasFailed {
        /// The ref being updated
        refname: String,
        /// The expected old value
        expected: String,
        /// The actual current value
        actual: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// File content is not valid UTF-8.
    #[error("{path} is not valid UTF-8")]
    InvalidUtf8 {
        /// Path of the file inside the tree
        path: String,
    },

    /// A path inside the tree is unusable.
    #[error("invalid tree path '{path}': {message}")]
    InvalidPath {
        /// The offending path
        path: String,
        /// Description of the problem
        message: String,
    },

    /// A git subprocess did not finish in time.
    #[error("git {operation} timed out after {secs} seconds")]
    Timeout {
        /// The operation that timed out
        operation: &'static str,
        /// The bound that was exceeded
        secs: u64,
    },

    /// A git subprocess failed.
    #[error("git {operation} failed: {message}")]
    CommandFailed {
        /// The operation that failed
        operation: &'static str,
        /// Git's reason, from porcelain output or stderr
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            other => GitError::InvalidRefName {
                message: other.to_string(),
            },
        }
    }
}

/// One file to place into a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFile {
    /// Slash-separated path relative to the tree root
    pub path: String,
    /// File contents
    pub contents: String,
}

/// The main Git interface.
///
/// Wraps a git2 repository. Bare repositories are supported, since the index
/// branch is never checked out.
///
/// # Example
///
/// ```ignore
/// let git = Git::open(Path::new("."))?;
/// let tip = git.try_resolve_ref("refs/heads/gh-pages")?;
/// let commit = git.commit_files(tip.as_ref(), &files, "publish 1.0.0+doppel", None)?;
/// git.update_ref_cas("refs/heads/gh-pages", &commit, tip.as_ref(), "simplepub: publish")?;
/// ```
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover` to find the repository root,
    /// so `path` can be any directory within the repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        Ok(Self { repo })
    }

    /// Directory git subprocesses should run in.
    ///
    /// The working directory for normal repositories, the git directory for
    /// bare ones.
    pub fn command_dir(&self) -> &Path {
        self.repo.workdir().unwrap_or_else(|| self.repo.path())
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Resolve a ref to the commit it points at.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the ref doesn't exist
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let reference = self
            .repo
            .find_reference(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;

        let oid = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname))?
            .id();

        Oid::new(oid.to_string()).map_err(|e| e.into())
    }

    /// Resolve a ref, returning None if it doesn't exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.resolve_ref(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(GitError::RefNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // CAS Ref Operations
    // =========================================================================

    /// Update a ref with compare-and-swap semantics.
    ///
    /// The update only succeeds if the ref's current value matches
    /// `expected_old`. If `expected_old` is `None`, the ref must not exist.
    /// The comparison and the write happen under the ref lock, so two
    /// processes racing on the same ref cannot both succeed.
    ///
    /// # Errors
    ///
    /// - [`GitError::CasFailed`] if the current value doesn't match expected
    pub fn update_ref_cas(
        &self,
        refname: &str,
        new_oid: &Oid,
        expected_old: Option<&Oid>,
        message: &str,
    ) -> Result<(), GitError> {
        let new = Self::to_git2(new_oid)?;

        let result = match expected_old {
            Some(expected) => {
                let current = Self::to_git2(expected)?;
                self.repo
                    .reference_matching(refname, new, true, current, message)
            }
            None => self.repo.reference(refname, new, false, message),
        };

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if matches!(
                    e.code(),
                    git2::ErrorCode::Modified | git2::ErrorCode::Exists | git2::ErrorCode::NotFound
                ) =>
            {
                let actual = self.try_resolve_ref_raw(refname)?;
                Err(GitError::CasFailed {
                    refname: refname.to_string(),
                    expected: expected_old
                        .map(Oid::to_string)
                        .unwrap_or_else(|| "<none>".to_string()),
                    actual: actual.unwrap_or_else(|| "<none>".to_string()),
                })
            }
            Err(e) => Err(GitError::from_git2(e, refname)),
        }
    }

    /// Point a ref at `oid` unconditionally, or delete it when `oid` is `None`.
    ///
    /// Only for refs this crate owns outright (remote-tracking mirrors).
    pub fn set_ref(&self, refname: &str, oid: Option<&Oid>, message: &str) -> Result<(), GitError> {
        match oid {
            Some(oid) => {
                self.repo
                    .reference(refname, Self::to_git2(oid)?, true, message)
                    .map_err(|e| GitError::from_git2(e, refname))?;
            }
            None => match self.repo.find_reference(refname) {
                Ok(mut reference) => reference
                    .delete()
                    .map_err(|e| GitError::from_git2(e, refname))?,
                Err(e) if e.code() == git2::ErrorCode::NotFound => {}
                Err(e) => return Err(GitError::from_git2(e, refname)),
            },
        }
        Ok(())
    }

    /// Try to resolve a ref to its raw OID string (without validation).
    fn try_resolve_ref_raw(&self, refname: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_reference(refname) {
            Ok(reference) => {
                let resolved = reference.resolve().unwrap_or(reference);
                let oid = resolved.target().ok_or_else(|| GitError::Internal {
                    message: format!("ref {} has no target", refname),
                })?;
                Ok(Some(oid.to_string()))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, refname)),
        }
    }

    // =========================================================================
    // Tree Reads
    // =========================================================================

    /// Read files from the tree of `commit`.
    ///
    /// Paths missing from the tree are absent from the result.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the commit doesn't exist
    /// - [`GitError::InvalidUtf8`] if a file is not valid UTF-8
    pub fn read_files(
        &self,
        commit: &Oid,
        paths: &[String],
    ) -> Result<BTreeMap<String, String>, GitError> {
        let tree = self
            .repo
            .find_commit(Self::to_git2(commit)?)
            .and_then(|c| c.tree())
            .map_err(|e| GitError::from_git2(e, commit.as_str()))?;

        let mut files = BTreeMap::new();
        for path in paths {
            let entry = match tree.get_path(Path::new(path)) {
                Ok(entry) => entry,
                Err(e) if e.code() == git2::ErrorCode::NotFound => continue,
                Err(e) => return Err(GitError::from_git2(e, path)),
            };
            if entry.kind() != Some(git2::ObjectType::Blob) {
                continue;
            }
            let blob = self
                .repo
                .find_blob(entry.id())
                .map_err(|e| GitError::from_git2(e, path))?;
            let contents = String::from_utf8(blob.content().to_vec())
                .map_err(|_| GitError::InvalidUtf8 { path: path.clone() })?;
            files.insert(path.clone(), contents);
        }
        Ok(files)
    }

    // =========================================================================
    // Commit Creation
    // =========================================================================

    /// Create a commit whose tree is `parent`'s tree with `files` replaced.
    ///
    /// Every other entry of the parent tree is kept. No ref is moved; pair
    /// this with [`Git::update_ref_cas`] to publish the commit.
    ///
    /// `committer` overrides the identity; otherwise the repository's
    /// configured identity is used, falling back to a fixed bot identity.
    pub fn commit_files(
        &self,
        parent: Option<&Oid>,
        files: &[TreeFile],
        message: &str,
        committer: Option<(&str, &str)>,
    ) -> Result<Oid, GitError> {
        let parent_commit = parent
            .map(|oid| {
                self.repo
                    .find_commit(Self::to_git2(oid)?)
                    .map_err(|e| GitError::from_git2(e, oid.as_str()))
            })
            .transpose()?;

        let mut root = match &parent_commit {
            Some(commit) => Some(commit.tree().map_err(|e| GitError::from_git2(e, "tree"))?),
            None => None,
        };

        for file in files {
            let components = Self::split_path(&file.path)?;
            let blob = self
                .repo
                .blob(file.contents.as_bytes())
                .map_err(|e| GitError::from_git2(e, &file.path))?;
            let tree_oid = self.upsert(root.as_ref(), &components, blob)?;
            root = Some(
                self.repo
                    .find_tree(tree_oid)
                    .map_err(|e| GitError::from_git2(e, "tree"))?,
            );
        }

        let tree = match root {
            Some(tree) => tree,
            None => {
                let empty = self
                    .repo
                    .treebuilder(None)
                    .and_then(|b| b.write())
                    .map_err(|e| GitError::from_git2(e, "tree"))?;
                self.repo
                    .find_tree(empty)
                    .map_err(|e| GitError::from_git2(e, "tree"))?
            }
        };

        let signature = self.signature(committer)?;
        let parents: Vec<&git2::Commit<'_>> = parent_commit.iter().collect();
        let oid = self
            .repo
            .commit(None, &signature, &signature, message, &tree, &parents)
            .map_err(|e| GitError::from_git2(e, "commit"))?;

        Oid::new(oid.to_string()).map_err(|e| e.into())
    }

    /// Insert `blob` at `components` below `base`, returning the new tree id.
    fn upsert(
        &self,
        base: Option<&git2::Tree<'_>>,
        components: &[&str],
        blob: git2::Oid,
    ) -> Result<git2::Oid, GitError> {
        let internal = |e: git2::Error| GitError::from_git2(e, "tree");
        let mut builder = self.repo.treebuilder(base).map_err(internal)?;

        match components {
            [] => {
                return Err(GitError::InvalidPath {
                    path: String::new(),
                    message: "path is empty".into(),
                })
            }
            [name] => {
                builder.insert(*name, blob, 0o100644).map_err(internal)?;
            }
            [name, rest @ ..] => {
                let subtree = match base.and_then(|tree| tree.get_name(name)) {
                    Some(entry) if entry.kind() == Some(git2::ObjectType::Tree) => {
                        Some(self.repo.find_tree(entry.id()).map_err(internal)?)
                    }
                    _ => None,
                };
                let sub_oid = self.upsert(subtree.as_ref(), rest, blob)?;
                builder.insert(*name, sub_oid, 0o040000).map_err(internal)?;
            }
        }

        builder.write().map_err(internal)
    }

    fn split_path(path: &str) -> Result<Vec<&str>, GitError> {
        let components: Vec<&str> = path.split('/').collect();
        if components
            .iter()
            .any(|c| c.is_empty() || *c == "." || *c == ".." || *c == ".git")
        {
            return Err(GitError::InvalidPath {
                path: path.to_string(),
                message: "components must be non-empty and not '.', '..' or '.git'".into(),
            });
        }
        Ok(components)
    }

    fn signature(&self, committer: Option<(&str, &str)>) -> Result<git2::Signature<'static>, GitError> {
        let signature = match committer {
            Some((name, email)) => git2::Signature::now(name, email),
            None => self
                .repo
                .signature()
                .or_else(|_| git2::Signature::now(FALLBACK_NAME, FALLBACK_EMAIL)),
        };
        signature.map_err(|e| GitError::from_git2(e, "signature"))
    }

    fn to_git2(oid: &Oid) -> Result<git2::Oid, GitError> {
        git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
    }

    // =========================================================================
    // Remote Operations
    // =========================================================================

    /// Get the URL for a remote.
    ///
    /// Returns `None` if the remote doesn't exist.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::Internal {
                message: e.message().to_string(),
            }),
        }
    }

    /// Parse a remote URL into owner/repo for GitHub.
    ///
    /// Handles both HTTPS and SSH URLs:
    /// - `https://github.com/owner/repo.git` -> `Some(("owner", "repo"))`
    /// - `git@github.com:owner/repo.git` -> `Some(("owner", "repo"))`
    ///
    /// Returns `None` for non-GitHub URLs.
    ///
    /// # Example
    ///
    /// ```
    /// use simplepub::git::Git;
    ///
    /// assert_eq!(
    ///     Git::parse_github_remote("https://github.com/owner/repo.git"),
    ///     Some(("owner".to_string(), "repo".to_string()))
    /// );
    /// assert_eq!(
    ///     Git::parse_github_remote("ssh://git@github.com/owner/repo"),
    ///     Some(("owner".to_string(), "repo".to_string()))
    /// );
    /// assert_eq!(Git::parse_github_remote("https://gitlab.com/owner/repo.git"), None);
    /// ```
    pub fn parse_github_remote(url: &str) -> Option<(String, String)> {
        let rest = ["https://github.com/", "git@github.com:", "ssh://git@github.com/"]
            .iter()
            .find_map(|prefix| url.strip_prefix(prefix))?;
        let path = rest.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let (owner, repo) = path.split_once('/')?;

        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }

        Some((owner.to_string(), repo.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init_bare() -> (TempDir, Git) {
        let dir = TempDir::new().unwrap();
        git2::Repository::init_bare(dir.path()).unwrap();
        let git = Git::open(dir.path()).unwrap();
        (dir, git)
    }

    fn file(path: &str, contents: &str) -> TreeFile {
        TreeFile {
            path: path.to_string(),
            contents: contents.to_string(),
        }
    }

    mod commits {
        use super::*;

        #[test]
        fn commit_and_read_back_nested_files() {
            let (_dir, git) = init_bare();
            let commit = git
                .commit_files(
                    None,
                    &[file("simple/index.html", "root"), file("simple/pkg/index.html", "pkg")],
                    "first",
                    Some(("Bot", "bot@example.com")),
                )
                .unwrap();

            let files = git
                .read_files(
                    &commit,
                    &[
                        "simple/index.html".to_string(),
                        "simple/pkg/index.html".to_string(),
                        "simple/missing.html".to_string(),
                    ],
                )
                .unwrap();
            assert_eq!(files.len(), 2);
            assert_eq!(files["simple/pkg/index.html"], "pkg");
        }

        #[test]
        fn child_commit_keeps_unrelated_files() {
            let (_dir, git) = init_bare();
            let first = git
                .commit_files(None, &[file("README.md", "hi"), file("simple/index.html", "v1")], "one", None)
                .unwrap();
            let second = git
                .commit_files(Some(&first), &[file("simple/index.html", "v2")], "two", None)
                .unwrap();

            let files = git
                .read_files(&second, &["README.md".to_string(), "simple/index.html".to_string()])
                .unwrap();
            assert_eq!(files["README.md"], "hi");
            assert_eq!(files["simple/index.html"], "v2");
        }

        #[test]
        fn rejects_traversal_paths() {
            let (_dir, git) = init_bare();
            for bad in ["../x", "a//b", "", ".git/config"] {
                assert!(matches!(
                    git.commit_files(None, &[file(bad, "x")], "bad", None),
                    Err(GitError::InvalidPath { .. })
                ));
            }
        }
    }

    mod cas {
        use super::*;

        #[test]
        fn create_requires_absence() {
            let (_dir, git) = init_bare();
            let a = git.commit_files(None, &[file("a", "1")], "a", None).unwrap();
            git.update_ref_cas("refs/heads/gh-pages", &a, None, "create").unwrap();

            let err = git
                .update_ref_cas("refs/heads/gh-pages", &a, None, "create again")
                .unwrap_err();
            assert!(matches!(err, GitError::CasFailed { .. }));
        }

        #[test]
        fn update_requires_expected_value() {
            let (_dir, git) = init_bare();
            let a = git.commit_files(None, &[file("a", "1")], "a", None).unwrap();
            let b = git.commit_files(Some(&a), &[file("a", "2")], "b", None).unwrap();
            let c = git.commit_files(Some(&a), &[file("a", "3")], "c", None).unwrap();
            git.update_ref_cas("refs/heads/gh-pages", &a, None, "create").unwrap();
            git.update_ref_cas("refs/heads/gh-pages", &b, Some(&a), "b").unwrap();

            match git.update_ref_cas("refs/heads/gh-pages", &c, Some(&a), "c") {
                Err(GitError::CasFailed { actual, .. }) => assert_eq!(actual, b.as_str()),
                other => panic!("expected CasFailed, got {other:?}"),
            }
            assert_eq!(git.resolve_ref("refs/heads/gh-pages").unwrap(), b);
        }

        #[test]
        fn set_ref_creates_and_deletes() {
            let (_dir, git) = init_bare();
            let a = git.commit_files(None, &[file("a", "1")], "a", None).unwrap();
            git.set_ref("refs/simplepub/origin/gh-pages", Some(&a), "mirror").unwrap();
            assert_eq!(git.try_resolve_ref("refs/simplepub/origin/gh-pages").unwrap(), Some(a));
            git.set_ref("refs/simplepub/origin/gh-pages", None, "mirror").unwrap();
            assert_eq!(git.try_resolve_ref("refs/simplepub/origin/gh-pages").unwrap(), None);
            git.set_ref("refs/simplepub/origin/gh-pages", None, "mirror").unwrap();
        }
    }

    mod remote_parsing {
        use super::*;

        #[test]
        fn parses_github_urls() {
            assert_eq!(
                Git::parse_github_remote("git@github.com:octo/deptry.git"),
                Some(("octo".into(), "deptry".into()))
            );
            assert_eq!(
                Git::parse_github_remote("https://github.com/octo/deptry/"),
                Some(("octo".into(), "deptry".into()))
            );
            assert_eq!(Git::parse_github_remote("https://github.com/octo"), None);
            assert_eq!(Git::parse_github_remote("https://github.com/a/b/c"), None);
        }
    }
}
