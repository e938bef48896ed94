use crate::api::{google_oauth, youtube};
use crate::config::{Privacy, UploadConfig};
use crate::credentials::{CredentialAction, CredentialState, CredentialStore};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::path::{Path, PathBuf};

const MAX_TITLE_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct UploadMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: Privacy,
    pub made_for_kids: bool,
}

impl UploadMetadata {
    pub fn from_config(cfg: &UploadConfig, quote: &str, date: &str) -> Self {
        Self {
            title: render_title(&cfg.title, quote, date),
            description: cfg.description.replace("{quote}", quote).replace("{date}", date),
            tags: cfg.tags.clone(),
            category_id: cfg.category_id.clone(),
            privacy: cfg.privacy,
            made_for_kids: cfg.made_for_kids,
        }
    }

    fn to_resource(&self) -> youtube::VideoResource {
        youtube::VideoResource {
            snippet: youtube::Snippet {
                title: self.title.clone(),
                description: self.description.clone(),
                tags: self.tags.clone(),
                category_id: self.category_id.clone(),
            },
            status: youtube::Status {
                privacy_status: self.privacy,
                self_declared_made_for_kids: self.made_for_kids,
            },
        }
    }
}

/// Expands `{quote}`/`{date}` and cuts to the platform's title limit.
pub fn render_title(template: &str, quote: &str, date: &str) -> String {
    let title = template.replace("{quote}", quote).replace("{date}", date);
    let title = title.trim();
    if title.chars().count() <= MAX_TITLE_CHARS {
        return title.to_string();
    }
    let mut cut: String = title.chars().take(MAX_TITLE_CHARS - 1).collect();
    cut = cut.trim_end().to_string();
    cut.push('…');
    cut
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Uploaded { video_id: String },
    Skipped { reason: String },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, video: &Path, meta: &UploadMetadata) -> Result<PublishOutcome>;
}

pub struct YoutubePublisher {
    client: Client,
    store: CredentialStore,
    client_secrets: PathBuf,
    interactive: bool,
    upload_url: String,
}

impl YoutubePublisher {
    pub fn new(client: Client, cfg: &UploadConfig) -> Self {
        Self {
            client,
            store: CredentialStore::new(cfg.token_file.clone()),
            client_secrets: cfg.client_secrets.clone(),
            interactive: cfg.interactive_auth,
            upload_url: youtube::UPLOAD_URL.to_string(),
        }
    }

    /// Resolves a usable access token, persisting any refreshed or newly
    /// granted credential. `None` means the upload should be skipped.
    async fn access_token(&self) -> Result<Option<String>> {
        let state = self.store.state(Utc::now()).await?;
        let allow_interactive = self.interactive && self.client_secrets.exists();

        let user = match (state.action(allow_interactive), state) {
            (CredentialAction::Skip, CredentialState::Absent) => {
                logw(format!("{} not found; skipping upload.", self.store.path().display()));
                return Ok(None);
            }
            (CredentialAction::Skip, _) => {
                logw("Stored credential expired and cannot be refreshed; skipping upload.".to_string());
                return Ok(None);
            }
            (CredentialAction::Use, CredentialState::Valid(user)) => user,
            (CredentialAction::Refresh, CredentialState::ExpiredRefreshable(user)) => {
                logi("Refreshing upload credential...".to_string());
                let user = google_oauth::refresh(&self.client, &user).await?;
                self.store.save(&user).await?;
                logok("Credential refreshed.".to_string());
                user
            }
            (CredentialAction::Authorize, _) => {
                let app = google_oauth::load_client_secrets(&self.client_secrets).await?;
                let user = google_oauth::authorize_interactive(&self.client, &app).await?;
                self.store.save(&user).await?;
                logok(format!("Credential saved to {}", self.store.path().display()));
                user
            }
            (action, _) => anyhow::bail!("inconsistent credential transition {:?}", action),
        };

        Ok(user.token)
    }
}

#[async_trait]
impl Publisher for YoutubePublisher {
    async fn publish(&self, video: &Path, meta: &UploadMetadata) -> Result<PublishOutcome> {
        let token = match self.access_token().await? {
            Some(token) => token,
            None => {
                return Ok(PublishOutcome::Skipped {
                    reason: "no usable credential".to_string(),
                });
            }
        };

        logi(format!("Uploading {} as \"{}\"", video.display(), meta.title));
        let video_id = youtube::upload_video(&self.client, &self.upload_url, &token, video, &meta.to_resource())
            .await
            .context("YouTube upload failed")?;
        logok(format!("Uploaded: {}", youtube::watch_url(&video_id)));
        Ok(PublishOutcome::Uploaded { video_id })
    }
}
