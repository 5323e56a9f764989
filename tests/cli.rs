//! End-to-end tests for the simplepub binary.
//!
//! Each test runs the compiled binary against a throwaway repository with
//! the CI environment variables cleared, so only explicit flags decide the
//! trigger.

use std::path::Path;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

const CONFIG: &str = r#"
package = "deptry"

[release]
repository = "o/deptry"
token_env = "SIMPLEPUB_TEST_TOKEN"

[index]
branch = "gh-pages"
committer_name = "Publisher"
committer_email = "publisher@example.com"
"#;

fn run_git(dir: &Path, args: &[&str]) {
    let status = StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("run git")
        .status;
    assert!(status.success(), "git {args:?} failed");
}

/// Create a temporary Git repository for testing.
struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        run_git(dir.path(), &["init", "-b", "main"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test User"]);
        std::fs::write(dir.path().join("README.md"), "# Test\n").expect("write readme");
        run_git(dir.path(), &["add", "."]);
        run_git(dir.path(), &["commit", "-m", "Initial commit"]);
        Self { dir }
    }

    /// A repository with a config file and built wheels for `version`.
    fn configured(version: &str) -> Self {
        let repo = Self::new();
        std::fs::write(repo.path().join("simplepub.toml"), CONFIG).expect("write config");
        let dist = repo.path().join("dist");
        std::fs::create_dir(&dist).expect("create dist");
        for wheel_tag in [
            "manylinux_2_17_x86_64",
            "macosx_10_12_x86_64",
            "macosx_11_0_arm64",
        ] {
            let filename = format!("deptry-{version}+doppel-cp39-abi3-{wheel_tag}.whl");
            std::fs::write(dist.join(filename), b"wheel").expect("write wheel");
        }
        repo
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

fn simplepub(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("simplepub").expect("binary exists");
    cmd.arg("--cwd")
        .arg(cwd)
        .env_remove("GITHUB_REF")
        .env_remove("GITHUB_REF_TYPE")
        .env_remove("GITHUB_REF_NAME")
        .env_remove("GITHUB_EVENT_NAME")
        .env_remove("SIMPLEPUB_CONFIG")
        .env_remove("SIMPLEPUB_TEST_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

// =============================================================================
// resolve
// =============================================================================

#[test]
fn resolve_prints_distribution_version() {
    let dir = TempDir::new().unwrap();
    simplepub(dir.path())
        .args(["resolve", "v0.24.0"])
        .assert()
        .success()
        .stdout("0.24.0+doppel\n");
}

#[test]
fn resolve_uses_configured_suffix() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("simplepub.toml"), "local_suffix = \"fork\"\n").unwrap();
    simplepub(dir.path())
        .args(["resolve", "v1.2.3-rc.1"])
        .assert()
        .success()
        .stdout("1.2.3-rc.1+fork\n");
}

#[test]
fn resolve_rejects_malformed_tag() {
    let dir = TempDir::new().unwrap();
    simplepub(dir.path())
        .args(["resolve", "0.24.0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid tag format '0.24.0'"));
}

// =============================================================================
// publish
// =============================================================================

#[test]
fn publish_without_tag_fails() {
    let repo = TestRepo::configured("0.24.0");
    simplepub(repo.path())
        .arg("publish")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not triggered by a tag"));
}

#[test]
fn branch_push_is_not_a_release() {
    let repo = TestRepo::configured("0.24.0");
    simplepub(repo.path())
        .arg("publish")
        .env("GITHUB_REF", "refs/heads/main")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("refs/heads/main"));
}

#[test]
fn publish_without_package_is_config_error() {
    let repo = TestRepo::new();
    simplepub(repo.path())
        .args(["publish", "--tag", "v0.24.0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("package"));
}

#[test]
fn invalid_config_is_config_error() {
    let repo = TestRepo::new();
    std::fs::write(repo.path().join("simplepub.toml"), "package = [").unwrap();
    simplepub(repo.path())
        .args(["publish", "--tag", "v0.24.0"])
        .assert()
        .code(2);
}

#[test]
fn dry_run_lists_artifacts() {
    let repo = TestRepo::configured("0.24.0");
    simplepub(repo.path())
        .args(["publish", "--dry-run"])
        .env("GITHUB_REF", "refs/tags/v0.24.0")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Would publish 0.24.0+doppel (v0.24.0), not yet in the index",
        ))
        .stdout(predicate::str::contains(
            "deptry-0.24.0+doppel-cp39-abi3-macosx_11_0_arm64.whl",
        ));
}

#[test]
fn dry_run_reports_missing_platform() {
    let repo = TestRepo::configured("0.24.0");
    std::fs::remove_file(
        repo.path()
            .join("dist/deptry-0.24.0+doppel-cp39-abi3-macosx_11_0_arm64.whl"),
    )
    .unwrap();
    simplepub(repo.path())
        .args(["publish", "--dry-run", "--tag", "v0.24.0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("macos-arm64"));
}

#[test]
fn publish_without_token_fails_before_writing() {
    let repo = TestRepo::configured("0.24.0");
    simplepub(repo.path())
        .args(["publish", "--tag", "v0.24.0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("SIMPLEPUB_TEST_TOKEN"));

    let branch = StdCommand::new("git")
        .args(["rev-parse", "--verify", "--quiet", "refs/heads/gh-pages"])
        .current_dir(repo.path())
        .output()
        .unwrap();
    assert!(!branch.status.success());
}

// =============================================================================
// render
// =============================================================================

#[test]
fn render_empty_index() {
    let repo = TestRepo::configured("0.24.0");
    simplepub(repo.path())
        .args(["render", "--root"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"<a href="deptry/">deptry</a>"#))
        .stdout(predicate::str::contains("==>").not());
}

#[test]
fn render_both_documents_with_headers() {
    let repo = TestRepo::configured("0.24.0");
    simplepub(repo.path())
        .arg("render")
        .assert()
        .success()
        .stdout(predicate::str::contains("==> simple/index.html <=="))
        .stdout(predicate::str::contains("==> simple/deptry/index.html <=="))
        .stdout(predicate::str::contains("Links for deptry"));
}

#[test]
fn missing_subcommand_is_usage_error() {
    let dir = TempDir::new().unwrap();
    simplepub(dir.path()).assert().code(2);
}
