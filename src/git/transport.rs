//! git::transport
//!
//! Fetch and push of the index branch through the system `git` binary.
//!
//! `git2` is built without network support, so remote synchronization runs
//! `git fetch` / `git push` as subprocesses. Every subprocess is bounded by
//! the configured network timeout and killed when it exceeds it.
//!
//! # Lease semantics
//!
//! Pushes use `--force-with-lease=<ref>:<expected>`, so the remote branch
//! only moves if it still points at the commit the new one was built on. A
//! rejected lease is reported as [`GitError::CasFailed`], the same error a
//! local ref race produces. Refusals by the remote itself (hooks, branch
//! protection, permissions) are [`GitError::CommandFailed`] carrying git's
//! reason.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;
use wait_timeout::ChildExt;

use super::GitError;
use crate::core::types::{BranchName, Oid, RefName};

/// Runs git network operations for one repository.
#[derive(Debug, Clone)]
pub struct Transport {
    dir: PathBuf,
    timeout: Duration,
}

impl Transport {
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
        }
    }

    /// Fetch `refs/heads/<branch>` from `remote` into `tracking`.
    ///
    /// Returns `false` when the remote has no such branch (the index has never
    /// been published).
    ///
    /// # Errors
    ///
    /// - [`GitError::Timeout`] if the fetch exceeds the bound
    /// - [`GitError::CommandFailed`] for any other failure
    pub fn fetch_branch(
        &self,
        remote: &str,
        branch: &BranchName,
        tracking: &RefName,
    ) -> Result<bool, GitError> {
        let refspec = format!("+{}:{}", RefName::for_branch(branch), tracking);
        let output = self.run(
            &["fetch", "--quiet", "--no-tags", "--no-write-fetch-head", remote, &refspec],
            "fetch",
        )?;

        if output.status.success() {
            return Ok(true);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("couldn't find remote ref") {
            debug!(remote, branch = %branch, "remote index branch does not exist yet");
            return Ok(false);
        }
        Err(GitError::CommandFailed {
            operation: "fetch",
            message: stderr.trim().to_string(),
        })
    }

    /// Push `commit` to `refs/heads/<branch>` on `remote`, leased on `expected`.
    ///
    /// `expected = None` requires the remote branch to be absent.
    ///
    /// # Errors
    ///
    /// - [`GitError::CasFailed`] if the remote branch moved
    /// - [`GitError::Timeout`] if the push exceeds the bound
    /// - [`GitError::CommandFailed`] for any other failure
    pub fn push_with_lease(
        &self,
        remote: &str,
        branch: &BranchName,
        commit: &Oid,
        expected: Option<&Oid>,
    ) -> Result<(), GitError> {
        let target = RefName::for_branch(branch);
        let lease = format!(
            "--force-with-lease={}:{}",
            target,
            expected.map(Oid::as_str).unwrap_or("")
        );
        let refspec = format!("{}:{}", commit, target);
        let output = self.run(&["push", "--porcelain", &lease, remote, &refspec], "push")?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.success() {
            return Ok(());
        }

        match classify_rejection(&stdout, &stderr) {
            PushRejection::Lease => Err(GitError::CasFailed {
                refname: format!("{remote}/{target}"),
                expected: expected
                    .map(Oid::to_string)
                    .unwrap_or_else(|| "<none>".to_string()),
                actual: "<moved>".to_string(),
            }),
            PushRejection::Refused(message) => Err(GitError::CommandFailed {
                operation: "push",
                message,
            }),
        }
    }

    /// Run git with a timeout.
    ///
    /// Returns the output whether or not the command succeeded; only spawn
    /// failures and timeouts are errors here. Both pipes are drained on
    /// their own threads while waiting, so a chatty hook cannot fill a pipe
    /// and stall git until the timeout.
    fn run(&self, args: &[&str], operation: &'static str) -> Result<Output, GitError> {
        let mut cmd = git_command(&self.dir);
        cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
        debug!(?args, "running git");

        let io_failed = |e: std::io::Error| GitError::CommandFailed {
            operation,
            message: e.to_string(),
        };
        let mut child = cmd.spawn().map_err(io_failed)?;
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        match child.wait_timeout(self.timeout).map_err(io_failed)? {
            Some(status) => Ok(Output {
                status,
                stdout: collect(stdout, operation)?,
                stderr: collect(stderr, operation)?,
            }),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Err(GitError::Timeout {
                    operation,
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

/// Read a pipe to the end on a separate thread.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn collect(
    reader: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    operation: &'static str,
) -> Result<Vec<u8>, GitError> {
    let Some(reader) = reader else {
        return Ok(Vec::new());
    };
    reader
        .join()
        .map_err(|_| GitError::CommandFailed {
            operation,
            message: "output reader panicked".into(),
        })?
        .map_err(|e| GitError::CommandFailed {
            operation,
            message: e.to_string(),
        })
}

/// A `git` command rooted at `dir` that never prompts and reports in English.
fn git_command(dir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(dir);
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd.env("LC_ALL", "C");
    cmd
}

/// Rejection reasons that mean the remote branch is not where the lease
/// expected it.
const LEASE_REASONS: [&str; 3] = ["(stale info)", "(fetch first)", "(non-fast-forward)"];

/// Why git refused a push.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PushRejection {
    /// The remote branch moved.
    Lease,
    /// The remote or the transport refused for another reason.
    Refused(String),
}

/// Classify a failed push from its porcelain output, falling back to the
/// human-readable summary on stderr.
fn classify_rejection(stdout: &str, stderr: &str) -> PushRejection {
    let mut summaries: Vec<&str> = stdout
        .lines()
        .filter(|line| line.starts_with('!'))
        .filter_map(|line| line.splitn(3, '\t').nth(2))
        .map(str::trim)
        .collect();
    if summaries.is_empty() {
        summaries = stderr
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("! ["))
            .collect();
    }

    let is_lease = |summary: &&str| {
        summary.contains("[rejected]") && LEASE_REASONS.iter().any(|r| summary.contains(r))
    };
    if !summaries.is_empty() && summaries.iter().all(is_lease) {
        return PushRejection::Lease;
    }

    let stderr = stderr.trim();
    let message = match (summaries.join("; "), stderr.is_empty()) {
        (reason, true) => reason,
        (reason, false) if reason.is_empty() => stderr.to_string(),
        (reason, false) => format!("{reason}\n{stderr}"),
    };
    PushRejection::Refused(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_lease_rejections() {
        for reason in ["stale info", "fetch first", "non-fast-forward"] {
            let stdout = format!(
                "To ../remote\n!\tabc:refs/heads/gh-pages\t[rejected] ({reason})\nDone\n"
            );
            assert_eq!(classify_rejection(&stdout, ""), PushRejection::Lease, "{reason}");
        }
        assert_eq!(
            classify_rejection("", " ! [rejected]        gh-pages (stale info)"),
            PushRejection::Lease
        );
    }

    #[test]
    fn remote_refusal_is_not_a_lease_failure() {
        let stdout = "To ../remote\n!\tabc:refs/heads/gh-pages\t[remote rejected] (pre-receive hook declined)\nDone\n";
        let stderr = "remote: branch is protected\nerror: failed to push some refs to '../remote'\n";
        match classify_rejection(stdout, stderr) {
            PushRejection::Refused(message) => {
                assert!(message.starts_with("[remote rejected] (pre-receive hook declined)"));
                assert!(message.contains("branch is protected"));
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn transport_failure_keeps_stderr() {
        assert_eq!(
            classify_rejection("", "fatal: unable to access 'https://x/'\n"),
            PushRejection::Refused("fatal: unable to access 'https://x/'".into())
        );
    }

    #[test]
    fn missing_git_dir_is_command_failure() {
        let transport = Transport::new("/nonexistent/simplepub-test", Duration::from_secs(5));
        let branch = BranchName::new("gh-pages").unwrap();
        let tracking = RefName::for_remote_tracking("origin", &branch).unwrap();
        let err = transport.fetch_branch("origin", &branch, &tracking).unwrap_err();
        assert!(matches!(err, GitError::CommandFailed { operation: "fetch", .. }));
    }
}
