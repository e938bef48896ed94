use crate::config::Privacy;
use crate::error::ShortsError;
use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::header::LOCATION;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

pub const UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub privacy_status: Privacy,
    pub self_declared_made_for_kids: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoResource {
    pub snippet: Snippet,
    pub status: Status,
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: String,
}

async fn rejected(resp: reqwest::Response) -> anyhow::Error {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ShortsError::UploadRejected {
        status,
        body: body.chars().take(800).collect(),
    }
    .into()
}

/// Resumable `videos.insert`: one request for the metadata session, one
/// `PUT` with the file. Returns the new video id.
pub async fn upload_video(
    client: &Client,
    endpoint: &str,
    access_token: &str,
    video: &Path,
    resource: &VideoResource,
) -> Result<String> {
    let bytes = fs::read(video)
        .await
        .with_context(|| format!("Failed to read {}", video.display()))?;

    let resp = client
        .post(endpoint)
        .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
        .bearer_auth(access_token)
        .header("X-Upload-Content-Type", "video/mp4")
        .header("X-Upload-Content-Length", bytes.len().to_string())
        .json(resource)
        .timeout(std::time::Duration::from_secs(60))
        .send()
        .await
        .context("Upload session request failed")?;

    if !resp.status().is_success() {
        return Err(rejected(resp).await);
    }

    let session = resp
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Upload session response had no Location header"))?;

    let resp = client
        .put(&session)
        .bearer_auth(access_token)
        .header("Content-Type", "video/mp4")
        .body(bytes)
        .timeout(std::time::Duration::from_secs(3_600))
        .send()
        .await
        .context("Upload request failed")?;

    if !resp.status().is_success() {
        return Err(rejected(resp).await);
    }

    let inserted: InsertResponse = resp.json().await.context("Failed to parse upload response")?;
    Ok(inserted.id)
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://youtu.be/{}", video_id)
}
