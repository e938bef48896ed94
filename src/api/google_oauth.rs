use crate::credentials::{AuthorizedUser, DEFAULT_TOKEN_URI, UPLOAD_SCOPE};
use crate::error::ShortsError;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

#[derive(Debug, Clone, Deserialize)]
pub struct InstalledApp {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<InstalledApp>,
    web: Option<InstalledApp>,
}

pub async fn load_client_secrets(path: &Path) -> Result<InstalledApp> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read client secrets: {}", path.display()))?;
    let file: ClientSecretsFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse client secrets: {}", path.display()))?;
    file.installed
        .or(file.web)
        .ok_or_else(|| anyhow::anyhow!("{}: no 'installed' client section", path.display()))
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Folds a token endpoint answer into the stored credential.
    pub fn apply(self, user: &mut AuthorizedUser, now: DateTime<Utc>) {
        user.token = Some(self.access_token);
        user.expiry = self.expires_in.map(|secs| now + Duration::seconds(secs));
        if let Some(refresh) = self.refresh_token {
            user.refresh_token = Some(refresh);
        }
        if let Some(scope) = self.scope {
            user.scopes = scope.split_whitespace().map(str::to_string).collect();
        }
    }
}

async fn post_token(client: &Client, token_uri: &str, form: &[(&str, &str)]) -> Result<TokenResponse> {
    let resp = client
        .post(token_uri)
        .form(form)
        .timeout(std::time::Duration::from_secs(60))
        .send()
        .await
        .context("Token request failed")?;

    let status = resp.status();
    let raw = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        let snippet = raw.chars().take(400).collect::<String>();
        return Err(ShortsError::AuthFailed(format!("token endpoint HTTP {}: {}", status.as_u16(), snippet)).into());
    }
    serde_json::from_str(&raw).context("Failed to parse token response")
}

pub async fn refresh(client: &Client, user: &AuthorizedUser) -> Result<AuthorizedUser> {
    let refresh_token = user
        .refresh_token
        .as_deref()
        .ok_or_else(|| ShortsError::AuthFailed("credential has no refresh token".to_string()))?;

    let resp = post_token(
        client,
        &user.token_uri,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", user.client_id.as_str()),
            ("client_secret", user.client_secret.as_str()),
        ],
    )
    .await?;

    let mut updated = user.clone();
    resp.apply(&mut updated, Utc::now());
    Ok(updated)
}

pub fn consent_url(app: &InstalledApp, redirect_uri: &str, state: &str) -> Result<Url> {
    let url = Url::parse_with_params(
        &app.auth_uri,
        &[
            ("response_type", "code"),
            ("client_id", app.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", UPLOAD_SCOPE),
            ("state", state),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .with_context(|| format!("Invalid auth_uri: {}", app.auth_uri))?;
    Ok(url)
}

/// Query string Google appends to the loopback redirect.
#[derive(Debug, Default, Deserialize)]
pub struct RedirectQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl RedirectQuery {
    /// Favicon fetches and browser pre-connects carry none of the fields.
    fn is_callback(&self) -> bool {
        self.code.is_some() || self.state.is_some() || self.error.is_some()
    }
}

pub fn check_redirect(query: RedirectQuery, expected_state: &str) -> Result<String, ShortsError> {
    if let Some(error) = query.error {
        return Err(ShortsError::AuthFailed(format!("consent denied: {}", error)));
    }
    if query.state.as_deref() != Some(expected_state) {
        return Err(ShortsError::AuthFailed("state mismatch in redirect".to_string()));
    }
    query
        .code
        .ok_or_else(|| ShortsError::AuthFailed("redirect carried no code".to_string()))
}

type CodeSender = oneshot::Sender<Result<String, ShortsError>>;

struct RedirectReceiver {
    expected_state: String,
    tx: Mutex<Option<CodeSender>>,
}

async fn redirect_callback(
    State(receiver): State<Arc<RedirectReceiver>>,
    Query(query): Query<RedirectQuery>,
) -> (StatusCode, &'static str) {
    if !query.is_callback() {
        return (StatusCode::NOT_FOUND, "Waiting for the authorization redirect.");
    }

    let result = check_redirect(query, &receiver.expected_state);
    let body = match &result {
        Ok(_) => "Authorization complete. You can close this tab.",
        Err(_) => "Authorization failed. Check the terminal.",
    };
    let sender = receiver.tx.lock().ok().and_then(|mut slot| slot.take());
    match sender {
        Some(tx) => {
            let _ = tx.send(result);
            (StatusCode::OK, body)
        }
        None => (StatusCode::GONE, "Authorization already handled."),
    }
}

/// Serves the loopback redirect until the first callback arrives, then
/// shuts the server down and returns the authorization code.
pub async fn receive_redirect(listener: TcpListener, expected_state: String) -> Result<String> {
    let (code_tx, code_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let receiver = Arc::new(RedirectReceiver {
        expected_state,
        tx: Mutex::new(Some(code_tx)),
    });
    let app = Router::new()
        .route("/", get(redirect_callback))
        .with_state(receiver);

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    let outcome = code_rx.await;
    let _ = stop_tx.send(());
    if tokio::time::timeout(std::time::Duration::from_secs(5), server).await.is_err() {
        logw("Loopback server did not stop in time.".to_string());
    }

    let code = outcome.map_err(|_| ShortsError::AuthFailed("redirect receiver stopped".to_string()))??;
    Ok(code)
}

/// Installed-app loopback flow: waits for the browser redirect on
/// 127.0.0.1 and exchanges the code for tokens.
pub async fn authorize_interactive(client: &Client, app: &InstalledApp) -> Result<AuthorizedUser> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("Failed to bind loopback listener")?;
    let port = listener.local_addr()?.port();
    let redirect_uri = format!("http://127.0.0.1:{}/", port);

    let state: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    let url = consent_url(app, &redirect_uri, &state)?;
    logi(format!("Open this URL to authorize uploads:\n{}", url));

    let code = receive_redirect(listener, state).await?;

    let resp = post_token(
        client,
        &app.token_uri,
        &[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("client_id", app.client_id.as_str()),
            ("client_secret", app.client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
        ],
    )
    .await?;

    let mut user = AuthorizedUser {
        token: None,
        refresh_token: None,
        token_uri: app.token_uri.clone(),
        client_id: app.client_id.clone(),
        client_secret: app.client_secret.clone(),
        scopes: vec![UPLOAD_SCOPE.to_string()],
        expiry: None,
    };
    resp.apply(&mut user, Utc::now());
    logok("Authorization granted.".to_string());
    Ok(user)
}
