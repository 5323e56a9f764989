//! Integration tests for the GitHub release host.
//!
//! A wiremock server stands in for the GitHub REST API, so these tests
//! cover the real request flow: release lookup and creation, asset upload,
//! reuse of assets from an earlier run, and error mapping.

use serde_json::json;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use simplepub::core::artifact::{ArtifactSet, BuildOutput};
use simplepub::core::platform::PlatformSet;
use simplepub::core::types::{PackageName, Platform};
use simplepub::core::version::VersionResolver;
use simplepub::host::{GitHubReleaseHost, HostError, ReleaseHost};

// =============================================================================
// Test Helpers
// =============================================================================

const TOKEN: &str = "test-token";
const RELEASE_PATH: &str = "/repos/o/deptry/releases/tags/v0.24.0";
const UPLOAD_PATH: &str = "/uploads/repos/o/deptry/releases/7/assets";

const WHEELS: [(&str, &str); 3] = [
    ("linux-x86_64", "deptry-0.24.0+doppel-cp39-abi3-manylinux_2_17_x86_64.whl"),
    ("macos-x86_64", "deptry-0.24.0+doppel-cp39-abi3-macosx_10_12_x86_64.whl"),
    ("macos-arm64", "deptry-0.24.0+doppel-cp39-abi3-macosx_11_0_arm64.whl"),
];

/// Wheel files on disk plus the validated set built from them.
struct Dist {
    dir: TempDir,
    set: ArtifactSet,
}

impl Dist {
    fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let outputs = WHEELS
            .iter()
            .map(|(platform, filename)| {
                let path = dir.path().join(filename);
                std::fs::write(&path, contents(filename)).expect("write wheel");
                BuildOutput {
                    platform: Platform::new(*platform).unwrap(),
                    filename: filename.to_string(),
                    path,
                }
            })
            .collect();
        let version = VersionResolver::default().resolve("v0.24.0").unwrap();
        let set = ArtifactSet::collect(
            &PackageName::new("deptry").unwrap(),
            &version,
            outputs,
            &PlatformSet::default(),
        )
        .unwrap();
        Self { dir, set }
    }
}

fn contents(filename: &str) -> Vec<u8> {
    format!("wheel bytes of {filename}").into_bytes()
}

fn digest(filename: &str) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(contents(filename))))
}

fn download_url(filename: &str) -> String {
    format!("https://github.com/o/deptry/releases/download/v0.24.0/{filename}")
}

fn host(server: &MockServer) -> GitHubReleaseHost {
    GitHubReleaseHost::new("o", "deptry")
        .with_token(Some(TOKEN.into()))
        .with_api_base(server.uri())
}

fn release_json(server: &MockServer, assets: serde_json::Value) -> serde_json::Value {
    json!({
        "id": 7,
        "upload_url": format!("{}{UPLOAD_PATH}{{?name,label}}", server.uri()),
        "assets": assets,
    })
}

fn asset_json(filename: &str, digest: Option<String>) -> serde_json::Value {
    json!({
        "name": filename,
        "label": filename,
        "size": contents(filename).len(),
        "digest": digest,
        "browser_download_url": download_url(filename),
    })
}

async fn mount_uploads(server: &MockServer, expected: u64) {
    for (_, filename) in WHEELS {
        Mock::given(method("POST"))
            .and(path(UPLOAD_PATH))
            .and(query_param("name", filename))
            .and(header("content-type", "application/octet-stream"))
            .respond_with(ResponseTemplate::new(201).set_body_json(asset_json(filename, None)))
            .expect(expected)
            .mount(server)
            .await;
    }
}

// =============================================================================
// Upload flow
// =============================================================================

#[tokio::test]
async fn creates_release_and_uploads_assets() {
    let server = MockServer::start().await;
    let dist = Dist::new();

    Mock::given(method("GET"))
        .and(path(RELEASE_PATH))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/o/deptry/releases"))
        .and(body_json(json!({"tag_name": "v0.24.0", "name": "v0.24.0"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(release_json(&server, json!([]))))
        .expect(1)
        .mount(&server)
        .await;
    mount_uploads(&server, 1).await;

    let artifacts = host(&server).upload(&dist.set).await.unwrap();
    assert_eq!(artifacts.len(), 3);
    for artifact in &artifacts {
        assert_eq!(artifact.url, download_url(&artifact.filename));
    }
    let platforms: Vec<&str> = artifacts.iter().map(|a| a.platform.as_str()).collect();
    assert_eq!(platforms, ["linux-x86_64", "macos-arm64", "macos-x86_64"]);
}

#[tokio::test]
async fn identical_assets_are_reused() {
    let server = MockServer::start().await;
    let dist = Dist::new();

    let assets: Vec<_> = WHEELS
        .iter()
        .map(|(_, filename)| asset_json(filename, Some(digest(filename))))
        .collect();
    Mock::given(method("GET"))
        .and(path(RELEASE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_json(&server, json!(assets))))
        .mount(&server)
        .await;
    mount_uploads(&server, 0).await;

    let artifacts = host(&server).upload(&dist.set).await.unwrap();
    assert_eq!(artifacts.len(), 3);
    assert!(artifacts.iter().all(|a| a.url == download_url(&a.filename)));
}

#[tokio::test]
async fn partially_uploaded_release_is_completed() {
    let server = MockServer::start().await;
    let dist = Dist::new();
    let (_, first) = WHEELS[0];

    Mock::given(method("GET"))
        .and(path(RELEASE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(release_json(&server, json!([asset_json(first, None)]))),
        )
        .mount(&server)
        .await;
    for (index, (_, filename)) in WHEELS.iter().enumerate() {
        Mock::given(method("POST"))
            .and(path(UPLOAD_PATH))
            .and(query_param("name", *filename))
            .respond_with(ResponseTemplate::new(201).set_body_json(asset_json(filename, None)))
            .expect(if index == 0 { 0 } else { 1 })
            .mount(&server)
            .await;
    }

    let artifacts = host(&server).upload(&dist.set).await.unwrap();
    assert_eq!(artifacts.len(), 3);
}

#[tokio::test]
async fn different_existing_asset_is_a_conflict() {
    let server = MockServer::start().await;
    let dist = Dist::new();
    let (_, first) = WHEELS[0];

    let stale = asset_json(first, Some(format!("sha256:{}", "0".repeat(64))));
    Mock::given(method("GET"))
        .and(path(RELEASE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_json(&server, json!([stale]))))
        .mount(&server)
        .await;
    mount_uploads(&server, 0).await;

    let err = host(&server).upload(&dist.set).await.unwrap_err();
    assert_eq!(
        err,
        HostError::AssetConflict {
            name: first.to_string()
        }
    );
}

#[tokio::test]
async fn concurrently_created_release_is_looked_up_again() {
    let server = MockServer::start().await;
    let dist = Dist::new();

    Mock::given(method("GET"))
        .and(path(RELEASE_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(RELEASE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_json(&server, json!([]))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/o/deptry/releases"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "Validation Failed"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_uploads(&server, 1).await;

    let artifacts = host(&server).upload(&dist.set).await.unwrap();
    assert_eq!(artifacts.len(), 3);
}

// =============================================================================
// Error mapping
// =============================================================================

#[tokio::test]
async fn rejected_token_is_auth_failure() {
    let server = MockServer::start().await;
    let dist = Dist::new();

    Mock::given(method("GET"))
        .and(path(RELEASE_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})))
        .mount(&server)
        .await;

    let err = host(&server).upload(&dist.set).await.unwrap_err();
    assert!(matches!(err, HostError::AuthFailed(_)), "got {err:?}");
}

#[tokio::test]
async fn rate_limit_is_reported() {
    let server = MockServer::start().await;
    let dist = Dist::new();

    Mock::given(method("GET"))
        .and(path(RELEASE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({"message": "slow down"})))
        .mount(&server)
        .await;

    let err = host(&server).upload(&dist.set).await.unwrap_err();
    assert_eq!(err, HostError::RateLimited);
}

#[tokio::test]
async fn missing_token_sends_nothing() {
    let server = MockServer::start().await;
    let dist = Dist::new();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let host = GitHubReleaseHost::new("o", "deptry")
        .with_token(None)
        .with_token_env("RELEASE_TOKEN")
        .with_api_base(server.uri());
    let err = host.upload(&dist.set).await.unwrap_err();
    assert_eq!(
        err,
        HostError::AuthRequired {
            env: "RELEASE_TOKEN".into()
        }
    );
}

#[tokio::test]
async fn missing_file_is_io_error() {
    let server = MockServer::start().await;
    let dist = Dist::new();
    for (_, filename) in WHEELS {
        std::fs::remove_file(dist.dir.path().join(filename)).unwrap();
    }

    Mock::given(method("GET"))
        .and(path(RELEASE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_json(&server, json!([]))))
        .mount(&server)
        .await;
    mount_uploads(&server, 0).await;

    let err = host(&server).upload(&dist.set).await.unwrap_err();
    assert!(matches!(err, HostError::Io { .. }), "got {err:?}");
}
