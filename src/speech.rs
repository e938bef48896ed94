//! Narration backends.

use crate::api::elevenlabs;
use crate::config::{SpeechBackend, SpeechConfig};
use crate::error::ShortsError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use tokio::fs;
use tokio::process::Command;

/// Produces an audio file for `text` at `out_path`, or fails.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str, out_path: &Path) -> Result<()>;
}

/// Drives the `edge-tts` command-line client.
pub struct EdgeTts {
    program: String,
}

impl EdgeTts {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn args(voice: &str, text: &str, out_path: &Path) -> Vec<String> {
        vec![
            "--voice".to_string(),
            voice.to_string(),
            "--text".to_string(),
            text.to_string(),
            "--write-media".to_string(),
            out_path.display().to_string(),
        ]
    }
}

#[async_trait]
impl Synthesizer for EdgeTts {
    async fn synthesize(&self, text: &str, voice: &str, out_path: &Path) -> Result<()> {
        let output = Command::new(&self.program)
            .args(Self::args(voice, text, out_path))
            .output()
            .await
            .with_context(|| format!("Failed to launch {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ShortsError::SynthesisFailed(format!(
                "{} exited with {}: {}",
                self.program, output.status, stderr
            ))
            .into());
        }
        ensure_audio_written(out_path).await
    }
}

pub struct ElevenLabs {
    client: Client,
    api_key: String,
    model_id: String,
}

impl ElevenLabs {
    pub fn new(client: Client, api_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model_id: model_id.into(),
        }
    }
}

#[async_trait]
impl Synthesizer for ElevenLabs {
    async fn synthesize(&self, text: &str, voice: &str, out_path: &Path) -> Result<()> {
        elevenlabs::elevenlabs_tts_to_mp3(&self.client, &self.api_key, &self.model_id, voice, text, out_path)
            .await?;
        ensure_audio_written(out_path).await
    }
}

async fn ensure_audio_written(path: &Path) -> Result<()> {
    let len = fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
    if len == 0 {
        return Err(ShortsError::SynthesisFailed(format!("no audio written to {}", path.display())).into());
    }
    Ok(())
}

pub fn create_synthesizer(cfg: &SpeechConfig, client: Client) -> Box<dyn Synthesizer> {
    match cfg.backend {
        SpeechBackend::Edge => Box::new(EdgeTts::new(cfg.edge_tts_bin.clone())),
        SpeechBackend::ElevenLabs => Box::new(ElevenLabs::new(
            client,
            cfg.elevenlabs_key.clone(),
            cfg.eleven_model_id.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_edge_args() {
        let args = EdgeTts::args("tr-TR-EmelNeural", "Merhaba", Path::new("work/voice.mp3"));
        assert_eq!(
            args,
            vec!["--voice", "tr-TR-EmelNeural", "--text", "Merhaba", "--write-media", "work/voice.mp3"]
        );
    }

    #[tokio::test]
    async fn test_edge_failure_is_synthesis_error() {
        let dir = tempfile::tempdir().unwrap();
        let tts = EdgeTts::new("false");
        let err = tts
            .synthesize("hi", "en-US-AriaNeural", &dir.path().join("v.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<ShortsError>(), Some(ShortsError::SynthesisFailed(_))));
    }

    #[tokio::test]
    async fn test_success_without_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tts = EdgeTts::new("true");
        let err = tts
            .synthesize("hi", "en-US-AriaNeural", &dir.path().join("v.mp3"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no audio written"));
    }

    #[tokio::test]
    async fn test_mock_synthesizer_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("voice.mp3");

        let mut mock = MockSynthesizer::new();
        mock.expect_synthesize()
            .withf(|text, voice, _| text == "Hello" && voice == "en-GB-SoniaNeural")
            .times(1)
            .returning(|_, _, path| {
                std::fs::write(path, b"ID3").unwrap();
                Ok(())
            });

        mock.synthesize("Hello", "en-GB-SoniaNeural", &out).await.unwrap();
        assert_eq!(std::fs::read(PathBuf::from(&out)).unwrap(), b"ID3");
    }
}
