//! host::github
//!
//! GitHub Releases as the artifact host.
//!
//! # Flow
//!
//! 1. `GET /repos/{owner}/{repo}/releases/tags/{tag}`; on 404 create the
//!    release with `POST /repos/{owner}/{repo}/releases`. A 422 from the
//!    create means another run created it first, so the lookup is repeated.
//! 2. For each output, look for an existing asset with the same name (or
//!    label, since GitHub rewrites some characters in asset names). A
//!    match whose digest (or size, when the API reports no digest) equals
//!    the local file is reused; any other match is an
//!    [`HostError::AssetConflict`].
//! 3. Upload the rest to the release's `upload_url`.
//!
//! Every request is bounded by the configured timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::traits::{HostError, ReleaseHost};
use crate::core::artifact::{Artifact, ArtifactSet, BuildOutput};

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "simplepub";

/// GitHub release host.
pub struct GitHubReleaseHost {
    client: Client,
    token: Option<String>,
    /// Where the token was expected, for error messages
    token_env: String,
    owner: String,
    repo: String,
    api_base: String,
    timeout: Duration,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubReleaseHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubReleaseHost")
            .field("has_token", &self.token.is_some())
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    id: u64,
    upload_url: String,
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Clone, Deserialize)]
struct GitHubAsset {
    name: String,
    #[serde(default)]
    label: Option<String>,
    size: u64,
    /// `sha256:<hex>` on newer API versions
    #[serde(default)]
    digest: Option<String>,
    browser_download_url: String,
}

#[derive(Debug, Serialize)]
struct CreateReleaseBody<'a> {
    tag_name: &'a str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

impl GitHubReleaseHost {
    /// Host for `owner/repo` on github.com, without a token.
    ///
    /// Requests fail with `HostError::AuthRequired` until a token is set.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: None,
            token_env: "GITHUB_TOKEN".to_string(),
            owner: owner.into(),
            repo: repo.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Name of the variable the token is read from, for error messages.
    pub fn with_token_env(mut self, name: impl Into<String>) -> Self {
        self.token_env = name.into();
        self
    }

    /// Use a different API base (GitHub Enterprise, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn bearer_token(&self) -> Result<&str, HostError> {
        self.token.as_deref().ok_or_else(|| HostError::AuthRequired {
            env: self.token_env.clone(),
        })
    }

    fn headers(&self) -> Result<HeaderMap, HostError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.bearer_token()?))
            .map_err(|_| HostError::AuthFailed("token contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, HostError> {
        request
            .headers(self.headers()?)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    HostError::Timeout {
                        secs: self.timeout.as_secs(),
                    }
                } else {
                    HostError::NetworkError(e.to_string())
                }
            })
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, HostError> {
        let status = response.status();
        if status.is_success() {
            response.json().await.map_err(|e| HostError::ApiError {
                status: status.as_u16(),
                message: format!("Failed to parse response: {}", e),
            })
        } else {
            Err(Self::error_for(response, status).await)
        }
    }

    async fn error_for(response: Response, status: StatusCode) -> HostError {
        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "Unknown error".to_string(),
        };

        match status {
            StatusCode::UNAUTHORIZED => HostError::AuthFailed("Invalid or expired token".into()),
            StatusCode::FORBIDDEN => HostError::AuthFailed(format!("Permission denied: {message}")),
            StatusCode::NOT_FOUND => HostError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => HostError::RateLimited,
            _ if status.is_server_error() => HostError::ApiError {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ => HostError::ApiError {
                status: status.as_u16(),
                message,
            },
        }
    }

    async fn find_release(&self, tag: &str) -> Result<Option<GitHubRelease>, HostError> {
        let url = self.repo_url(&format!("releases/tags/{tag}"));
        let response = self.send(self.client.get(&url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.handle_response(response).await.map(Some)
    }

    async fn find_or_create_release(&self, tag: &str) -> Result<GitHubRelease, HostError> {
        if let Some(release) = self.find_release(tag).await? {
            debug!(tag, release = release.id, "release exists");
            return Ok(release);
        }

        let url = self.repo_url("releases");
        let body = CreateReleaseBody {
            tag_name: tag,
            name: tag,
        };
        let response = self.send(self.client.post(&url).json(&body)).await?;
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            debug!(tag, "release created concurrently, looking it up again");
            return self
                .find_release(tag)
                .await?
                .ok_or_else(|| HostError::NotFound(format!("release for tag {tag}")));
        }
        let release: GitHubRelease = self.handle_response(response).await?;
        info!(tag, release = release.id, "created release");
        Ok(release)
    }

    async fn upload_asset(
        &self,
        upload_url: &str,
        output: &BuildOutput,
        bytes: Vec<u8>,
    ) -> Result<GitHubAsset, HostError> {
        let request = self
            .client
            .post(upload_url)
            .query(&[
                ("name", output.filename.as_str()),
                ("label", output.filename.as_str()),
            ])
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(bytes);
        let response = self.send(request).await?;
        self.handle_response(response).await
    }
}

/// `upload_url` is a URI template such as `.../assets{?name,label}`.
fn strip_uri_template(upload_url: &str) -> &str {
    upload_url
        .split_once('{')
        .map_or(upload_url, |(base, _)| base)
}

fn sha256_digest(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// Whether an existing asset holds the same content as `bytes`.
fn same_content(asset: &GitHubAsset, bytes: &[u8]) -> bool {
    match &asset.digest {
        Some(digest) => digest.eq_ignore_ascii_case(&sha256_digest(bytes)),
        None => asset.size == bytes.len() as u64,
    }
}

#[async_trait]
impl ReleaseHost for GitHubReleaseHost {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn upload(&self, set: &ArtifactSet) -> Result<Vec<Artifact>, HostError> {
        let tag = set.version().tag();
        let release = self.find_or_create_release(&tag).await?;
        let upload_url = strip_uri_template(&release.upload_url).to_string();

        let mut artifacts = Vec::with_capacity(set.outputs().len());
        for output in set.outputs() {
            let bytes = tokio::fs::read(&output.path)
                .await
                .map_err(|e| HostError::Io {
                    path: output.path.clone(),
                    message: e.to_string(),
                })?;

            let existing = release.assets.iter().find(|asset| {
                asset.name == output.filename || asset.label.as_deref() == Some(&output.filename)
            });
            let url = match existing {
                Some(asset) if same_content(asset, &bytes) => {
                    debug!(file = %output.filename, "asset already uploaded");
                    asset.browser_download_url.clone()
                }
                Some(_) => {
                    return Err(HostError::AssetConflict {
                        name: output.filename.clone(),
                    })
                }
                None => {
                    let asset = self.upload_asset(&upload_url, output, bytes).await?;
                    info!(file = %output.filename, "uploaded asset");
                    asset.browser_download_url
                }
            };

            artifacts.push(Artifact {
                platform: output.platform.clone(),
                filename: output.filename.clone(),
                url,
            });
        }
        Ok(artifacts)
    }
}
