use crate::error::ShortsError;
use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use tokio::fs;

const API_BASE: &str = "https://api.elevenlabs.io";

pub fn tts_url(base: &str, voice_id: &str) -> String {
    format!(
        "{}/v1/text-to-speech/{}?output_format=mp3_44100_128",
        base.trim_end_matches('/'),
        voice_id
    )
}

pub async fn elevenlabs_tts_to_mp3(
    client: &Client,
    api_key: &str,
    model_id: &str,
    voice_id: &str,
    text: &str,
    out_mp3_path: &Path,
) -> Result<()> {
    let body = serde_json::json!({
        "text": text,
        "model_id": model_id,
    });

    let resp = client
        .post(tts_url(API_BASE, voice_id))
        .header("Content-Type", "application/json")
        .header("xi-api-key", api_key)
        .json(&body)
        .timeout(std::time::Duration::from_secs(300))
        .send()
        .await
        .context("ElevenLabs request failed")?;

    let status = resp.status();
    if !status.is_success() {
        let raw = resp.text().await.unwrap_or_default();
        let snippet = raw.chars().take(400).collect::<String>();
        return Err(ShortsError::SynthesisFailed(format!(
            "ElevenLabs HTTP {}: {}",
            status.as_u16(),
            snippet
        ))
        .into());
    }

    let bytes = resp.bytes().await.context("ElevenLabs response read failed")?;
    if let Some(parent) = out_mp3_path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create dir {}", parent.display()))?;
    }
    fs::write(out_mp3_path, &bytes).await?;
    Ok(())
}
