use crate::config::Config;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;
use tokio::fs;

pub async fn ensure_directories(cfg: &Config) -> Result<()> {
    for dir in [&cfg.paths.work_dir, &cfg.paths.output_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            logi(format!("Created directory: {}", dir.display()));
        }
    }
    Ok(())
}

pub async fn check_ffmpeg(ffmpeg: &str) -> bool {
    match tokio::process::Command::new(ffmpeg)
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

/// Writes the credential file from a base64 blob when the variable is set.
/// A bad blob only costs the upload, so it is logged rather than returned.
pub async fn restore_token_from_env(value: Option<String>, token_path: &Path) -> bool {
    let Some(encoded) = value.filter(|v| !v.trim().is_empty()) else {
        logw("Credential environment variable not set; upload needs an existing token file.".to_string());
        return false;
    };

    match write_token_blob(&encoded, token_path).await {
        Ok(()) => {
            logok(format!("{} written from environment.", token_path.display()));
            true
        }
        Err(err) => {
            logw(format!("{:#}; continuing without it.", err));
            false
        }
    }
}

async fn write_token_blob(encoded: &str, token_path: &Path) -> Result<()> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let decoded = STANDARD
        .decode(cleaned.as_bytes())
        .context("Credential environment variable is not valid base64")?;

    if let Some(parent) = token_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(token_path, decoded)
        .await
        .with_context(|| format!("Failed to write {}", token_path.display()))
}
