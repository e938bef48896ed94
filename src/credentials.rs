//! On-disk OAuth credential for the upload API and the decision of what to
//! do with it before an upload.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Google's `authorized_user` token file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl AuthorizedUser {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expiry) {
            (None, _) => true,
            (Some(token), _) if token.is_empty() => true,
            (Some(_), None) => false,
            (Some(_), Some(expiry)) => expiry - Duration::seconds(EXPIRY_SKEW_SECS) <= now,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
            && !self.client_id.is_empty()
            && !self.client_secret.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CredentialState {
    Absent,
    Valid(AuthorizedUser),
    ExpiredRefreshable(AuthorizedUser),
    ExpiredUnrefreshable(AuthorizedUser),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialAction {
    /// Upload is skipped; rendering is unaffected.
    Skip,
    Use,
    Refresh,
    /// Run the interactive consent flow.
    Authorize,
}

impl CredentialState {
    pub fn classify(user: Option<AuthorizedUser>, now: DateTime<Utc>) -> Self {
        match user {
            None => CredentialState::Absent,
            Some(user) if !user.is_expired(now) => CredentialState::Valid(user),
            Some(user) if user.can_refresh() => CredentialState::ExpiredRefreshable(user),
            Some(user) => CredentialState::ExpiredUnrefreshable(user),
        }
    }

    pub fn action(&self, allow_interactive: bool) -> CredentialAction {
        match self {
            CredentialState::Valid(_) => CredentialAction::Use,
            CredentialState::ExpiredRefreshable(_) => CredentialAction::Refresh,
            CredentialState::Absent | CredentialState::ExpiredUnrefreshable(_) => {
                if allow_interactive {
                    CredentialAction::Authorize
                } else {
                    CredentialAction::Skip
                }
            }
        }
    }
}

pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Option<AuthorizedUser>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };
        let user = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse credential file {}", self.path.display()))?;
        Ok(Some(user))
    }

    pub async fn state(&self, now: DateTime<Utc>) -> Result<CredentialState> {
        Ok(CredentialState::classify(self.load().await?, now))
    }

    pub async fn save(&self, user: &AuthorizedUser) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(user)?;
        fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user(token: Option<&str>, refresh: Option<&str>, expiry: Option<DateTime<Utc>>) -> AuthorizedUser {
        AuthorizedUser {
            token: token.map(str::to_string),
            refresh_token: refresh.map(str::to_string),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            client_id: "id.apps.googleusercontent.com".to_string(),
            client_secret: "secret".to_string(),
            scopes: vec![UPLOAD_SCOPE.to_string()],
            expiry,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_classify_states() {
        let later = now() + Duration::hours(1);
        let earlier = now() - Duration::hours(1);

        assert_eq!(CredentialState::classify(None, now()), CredentialState::Absent);
        assert!(matches!(
            CredentialState::classify(Some(user(Some("a"), Some("r"), Some(later))), now()),
            CredentialState::Valid(_)
        ));
        assert!(matches!(
            CredentialState::classify(Some(user(Some("a"), Some("r"), Some(earlier))), now()),
            CredentialState::ExpiredRefreshable(_)
        ));
        assert!(matches!(
            CredentialState::classify(Some(user(Some("a"), None, Some(earlier))), now()),
            CredentialState::ExpiredUnrefreshable(_)
        ));
        assert!(matches!(
            CredentialState::classify(Some(user(None, Some("r"), None)), now()),
            CredentialState::ExpiredRefreshable(_)
        ));
    }

    #[test]
    fn test_expiry_skew() {
        let almost = now() + Duration::seconds(30);
        assert!(user(Some("a"), None, Some(almost)).is_expired(now()));
    }

    #[test]
    fn test_actions() {
        let u = user(Some("a"), Some("r"), None);
        assert_eq!(CredentialState::Absent.action(false), CredentialAction::Skip);
        assert_eq!(CredentialState::Absent.action(true), CredentialAction::Authorize);
        assert_eq!(CredentialState::Valid(u.clone()).action(false), CredentialAction::Use);
        assert_eq!(CredentialState::ExpiredRefreshable(u.clone()).action(false), CredentialAction::Refresh);
        assert_eq!(CredentialState::ExpiredUnrefreshable(u.clone()).action(false), CredentialAction::Skip);
        assert_eq!(CredentialState::ExpiredUnrefreshable(u).action(true), CredentialAction::Authorize);
    }

    #[test]
    fn test_parses_python_written_token() {
        let json = r#"{"token": "ya29.a0", "refresh_token": "1//0g", "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "x.apps.googleusercontent.com", "client_secret": "s",
            "scopes": ["https://www.googleapis.com/auth/youtube.upload"], "universe_domain": "googleapis.com",
            "account": "", "expiry": "2026-03-01T12:30:00.123456Z"}"#;
        let u: AuthorizedUser = serde_json::from_str(json).unwrap();
        assert_eq!(u.refresh_token.as_deref(), Some("1//0g"));
        assert!(!u.is_expired(now()));
    }

    #[tokio::test]
    async fn test_store_roundtrip_and_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("token.json"));
        assert_eq!(store.state(now()).await.unwrap(), CredentialState::Absent);

        let u = user(Some("a"), Some("r"), Some(now() + Duration::hours(1)));
        store.save(&u).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(u));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(CredentialStore::new(path).load().await.is_err());
    }
}
