//! GitHub contents API adapter

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{
    EntryKind, RemoteCredentials, RemoteEntry, RemoteError, RemoteFile, RemoteProvider,
    RemoteResult, RemoteStore, RemoteUser,
};
use crate::config::SyncConfig;
use crate::sync::paths::README_PATH;
use crate::util::compact_text;

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("gitnote/", env!("CARGO_PKG_VERSION"));
const README_MESSAGE: &str = "🎉 Initial commit - AI Note Assistant";
const README_CONTENT: &str = "# AI Note Assistant sync repository

This repository mirrors notes and configuration from AI Note Assistant.

## Layout

```
├── notes/           # Notes (Markdown)
│   └── {notebook}/  # One directory per notebook
├── config/          # Configuration
│   └── data.json    # Notebooks, folders, tags and settings
└── README.md
```

## Notes

- This repository is managed automatically
- Do not edit config/data.json by hand
- Note files may be edited by hand; keep the front matter intact
";

/// Creates authenticated [`GitHubStore`]s
#[derive(Clone)]
pub struct GitHubProvider {
    client: Client,
    api_base_url: String,
    settle_delay: Duration,
    settle_attempts: u32,
}

impl GitHubProvider {
    pub fn new(config: &SyncConfig) -> RemoteResult<Self> {
        Ok(Self {
            client: Client::builder().user_agent(USER_AGENT).build()?,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            settle_delay: config.settle_delay,
            settle_attempts: config.settle_attempts.max(1),
        })
    }
}

#[async_trait]
impl RemoteProvider for GitHubProvider {
    async fn authenticate(&self, token: &str) -> RemoteResult<RemoteUser> {
        let token = token.trim();
        if token.is_empty() {
            return Err(RemoteError::Unauthorized(
                "access token must not be empty".to_string(),
            ));
        }

        let request = self.client.get(format!("{}/user", self.api_base_url));
        let response = send(authorize(request, token), "user").await?;
        Ok(response.json::<RemoteUser>().await?)
    }

    fn open(&self, credentials: &RemoteCredentials) -> RemoteResult<Arc<dyn RemoteStore>> {
        Ok(Arc::new(GitHubStore {
            client: self.client.clone(),
            api_base_url: self.api_base_url.clone(),
            credentials: credentials.clone(),
            settle_delay: self.settle_delay,
            settle_attempts: self.settle_attempts,
        }))
    }
}

/// One GitHub repository accessed through the contents API
pub struct GitHubStore {
    client: Client,
    api_base_url: String,
    credentials: RemoteCredentials,
    settle_delay: Duration,
    settle_attempts: u32,
}

impl GitHubStore {
    fn repo_url(&self) -> String {
        format!(
            "{}/repos/{}/{}",
            self.api_base_url,
            urlencoding::encode(&self.credentials.owner),
            urlencoding::encode(&self.credentials.repo)
        )
    }

    fn contents_url(&self, path: &str) -> String {
        format!("{}/contents/{}", self.repo_url(), encode_path(path))
    }

    fn request(&self, request: RequestBuilder) -> RequestBuilder {
        authorize(request, &self.credentials.token)
    }

    async fn repository_exists(&self) -> RemoteResult<bool> {
        let request = self.request(self.client.get(self.repo_url()));
        match send(request, &self.credentials.repo).await {
            Ok(_) => Ok(true),
            Err(RemoteError::NotFound(_)) => Ok(false),
            Err(error) => Err(error),
        }
    }

    async fn create_repository(&self) -> RemoteResult<()> {
        let body = CreateRepoRequest {
            name: &self.credentials.repo,
            description: "AI Note Assistant - synchronized notes",
            private: true,
            auto_init: true,
        };
        let request = self
            .request(self.client.post(format!("{}/user/repos", self.api_base_url)))
            .json(&body);
        send(request, &self.credentials.repo).await?;
        tracing::info!(
            "Created remote repository {}/{}",
            self.credentials.owner,
            self.credentials.repo
        );
        Ok(())
    }

    /// Replace the auto-generated welcome file, retrying while a fresh repository settles
    async fn ensure_readme(&self) -> RemoteResult<()> {
        let mut attempt = 1;
        loop {
            let result = match self.get(README_PATH).await {
                Ok(file) if file.content == README_CONTENT => return Ok(()),
                Ok(file) => self
                    .put(README_PATH, README_CONTENT, Some(&file.hash), README_MESSAGE)
                    .await
                    .map(|_| ()),
                Err(RemoteError::NotFound(_)) => self
                    .put(README_PATH, README_CONTENT, None, README_MESSAGE)
                    .await
                    .map(|_| ()),
                Err(error) => Err(error),
            };

            match result {
                Ok(()) => return Ok(()),
                Err(error) if attempt < self.settle_attempts => {
                    tracing::debug!("README write attempt {attempt} failed: {error}");
                    attempt += 1;
                    tokio::time::sleep(self.settle_delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[async_trait]
impl RemoteStore for GitHubStore {
    async fn get(&self, path: &str) -> RemoteResult<RemoteFile> {
        tracing::debug!("GET {path}");
        let request = self.request(self.client.get(self.contents_url(path)));
        let response = send(request, path).await?;
        let payload = response.json::<ContentsPayload>().await?;
        let ContentsPayload::File(file) = payload else {
            return Err(RemoteError::Decode(format!("{path} is a directory")));
        };
        Ok(RemoteFile {
            content: decode_content(&file.content.unwrap_or_default())?,
            hash: file.sha,
        })
    }

    async fn put(
        &self,
        path: &str,
        content: &str,
        expected_hash: Option<&str>,
        message: &str,
    ) -> RemoteResult<String> {
        tracing::debug!("PUT {path}");
        let body = PutRequest {
            message,
            content: general_purpose::STANDARD.encode(content.as_bytes()),
            sha: expected_hash,
        };
        let request = self
            .request(self.client.put(self.contents_url(path)))
            .json(&body);
        let response = send(request, path).await?;
        let payload = response.json::<PutResponse>().await?;
        Ok(payload.content.sha)
    }

    async fn delete(&self, path: &str, hash: &str, message: &str) -> RemoteResult<()> {
        tracing::debug!("DELETE {path}");
        let body = DeleteRequest { message, sha: hash };
        let request = self
            .request(self.client.delete(self.contents_url(path)))
            .json(&body);
        send(request, path).await?;
        Ok(())
    }

    async fn list(&self, path: &str) -> RemoteResult<Vec<RemoteEntry>> {
        tracing::debug!("LIST {path}");
        let request = self.request(self.client.get(self.contents_url(path)));
        let response = send(request, path).await?;
        let ContentsPayload::Dir(items) = response.json::<ContentsPayload>().await? else {
            return Err(RemoteError::Decode(format!("{path} is not a directory")));
        };

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let kind = match item.kind.as_str() {
                    "file" => EntryKind::File,
                    "dir" => EntryKind::Dir,
                    _ => return None,
                };
                Some(RemoteEntry {
                    name: item.name,
                    path: item.path,
                    hash: item.sha,
                    kind,
                })
            })
            .collect())
    }

    async fn ensure_container_exists(&self) -> RemoteResult<()> {
        if self.repository_exists().await? {
            return Ok(());
        }

        self.create_repository().await?;
        tokio::time::sleep(self.settle_delay).await;
        if let Err(error) = self.ensure_readme().await {
            tracing::warn!("Failed to create README: {error}");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Private
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    description: &'a str,
    private: bool,
    auto_init: bool,
}

#[derive(Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    message: &'a str,
    sha: &'a str,
}

#[derive(Deserialize)]
struct PutResponse {
    content: ShaOnly,
}

#[derive(Deserialize)]
struct ShaOnly {
    sha: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContentsPayload {
    Dir(Vec<ContentItem>),
    File(FilePayload),
}

#[derive(Deserialize)]
struct FilePayload {
    sha: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: Option<String>,
}

fn authorize(request: RequestBuilder, token: &str) -> RequestBuilder {
    request
        .bearer_auth(token)
        .header(reqwest::header::ACCEPT, ACCEPT)
        .header("X-GitHub-Api-Version", API_VERSION)
}

async fn send(request: RequestBuilder, resource: &str) -> RemoteResult<Response> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(map_status(status, &body, resource))
}

fn map_status(status: StatusCode, body: &str, resource: &str) -> RemoteError {
    let message = parse_api_error(body);
    match status.as_u16() {
        401 | 403 => RemoteError::Unauthorized(message),
        404 => RemoteError::NotFound(resource.to_string()),
        409 | 422 => RemoteError::Conflict(format!("{resource}: {message}")),
        code => RemoteError::Api {
            status: code,
            message,
        },
    }
}

fn parse_api_error(body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<GitHubErrorResponse>(body) {
        if let Some(message) = payload.message {
            return compact_text(&message);
        }
    }
    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed
    }
}

fn encode_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn decode_content(encoded: &str) -> RemoteResult<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(compact)
        .map_err(|error| RemoteError::Decode(format!("invalid base64 content: {error}")))?;
    String::from_utf8(bytes)
        .map_err(|error| RemoteError::Decode(format!("content is not UTF-8: {error}")))
}
