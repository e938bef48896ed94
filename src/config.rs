use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub quotes: QuoteConfig,
    pub speech: SpeechConfig,
    pub assets: AssetConfig,
    pub video: VideoConfig,
    pub paths: PathConfig,
    pub tools: ToolConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteConfig {
    pub file: PathBuf,
    pub selection: QuoteSelection,
    /// Fixed text that bypasses the quote file entirely.
    pub text: Option<String>,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("quotes.txt"),
            selection: QuoteSelection::Random,
            text: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSelection {
    Random,
    /// Zero-based index into the non-blank lines.
    Line(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechBackend {
    Edge,
    ElevenLabs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub backend: SpeechBackend,
    pub voice: String,
    pub edge_tts_bin: String,
    #[serde(rename = "elevenlabs_api_key")]
    pub elevenlabs_key: String,
    #[serde(rename = "eleven_model_id")]
    pub eleven_model_id: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            backend: SpeechBackend::Edge,
            voice: "tr-TR-EmelNeural".to_string(),
            edge_tts_bin: "edge-tts".to_string(),
            elevenlabs_key: String::new(),
            eleven_model_id: "eleven_multilingual_v2".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub backgrounds_dir: PathBuf,
    /// Pin a single image instead of picking from `backgrounds_dir`.
    pub background_image: Option<PathBuf>,
    /// No music is mixed when unset.
    pub music_dir: Option<PathBuf>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            backgrounds_dir: PathBuf::from("backgrounds"),
            background_image: None,
            music_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipLength {
    Fixed(f64),
    Narration,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomConfig {
    pub max_zoom: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub font_file: PathBuf,
    pub font_size: u32,
    pub font_color: String,
    pub caption_x: String,
    pub caption_y: String,
    pub caption_wrap: usize,
    pub fade_in: f64,
    pub clip_length: ClipLength,
    pub zoom: Option<ZoomConfig>,
    pub duration_floor: f64,
    pub tail_padding: f64,
    pub narration_volume: f64,
    pub music_volume: f64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 25,
            font_file: PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"),
            font_size: 64,
            font_color: "white".to_string(),
            caption_x: "(w-text_w)/2".to_string(),
            caption_y: "(h-text_h)/2".to_string(),
            caption_wrap: 24,
            fade_in: 1.0,
            clip_length: ClipLength::Fixed(8.0),
            zoom: None,
            duration_floor: 10.0,
            tail_padding: 0.5,
            narration_volume: 1.0,
            music_volume: 0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub work_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("work"),
            output_dir: PathBuf::from("output_videos"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Public,
    Unlisted,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub enabled: bool,
    pub token_file: PathBuf,
    pub token_env: String,
    pub client_secrets: PathBuf,
    pub interactive_auth: bool,
    /// May contain `{quote}` and `{date}`.
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: Privacy,
    pub made_for_kids: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token_file: PathBuf::from("token.json"),
            token_env: "TOKEN_JSON_BASE64".to_string(),
            client_secrets: PathBuf::from("client_secret.json"),
            interactive_auth: false,
            title: "{quote}".to_string(),
            description: "Created with edge-tts.".to_string(),
            tags: Vec::new(),
            category_id: "27".to_string(),
            privacy: Privacy::Unlisted,
            made_for_kids: false,
        }
    }
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let v = &self.video;
        if v.width == 0 || v.height == 0 {
            anyhow::bail!("config.json: video width/height must be positive");
        }
        if v.fps == 0 {
            anyhow::bail!("config.json: video fps must be positive");
        }
        if v.duration_floor < 0.0 || v.tail_padding < 0.0 || v.fade_in < 0.0 {
            anyhow::bail!("config.json: durations must not be negative");
        }
        if let ClipLength::Fixed(secs) = v.clip_length {
            if secs <= 0.0 {
                anyhow::bail!("config.json: fixed clip length must be positive");
            }
        }
        for (name, vol) in [("narration_volume", v.narration_volume), ("music_volume", v.music_volume)] {
            if !(0.0..=4.0).contains(&vol) {
                anyhow::bail!("config.json: {} must be within 0..4", name);
            }
        }
        if let Some(zoom) = v.zoom {
            if zoom.max_zoom < 1.0 {
                anyhow::bail!("config.json: zoom.max_zoom must be at least 1.0");
            }
        }
        if self.speech.backend == SpeechBackend::ElevenLabs && self.speech.elevenlabs_key.is_empty() {
            anyhow::bail!("config.json: elevenlabs_api_key missing");
        }
        if self.speech.voice.is_empty() {
            anyhow::bail!("config.json: speech voice missing");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"speech": {"voice": "en-US-AriaNeural"}}"#).unwrap();
        assert_eq!(cfg.speech.voice, "en-US-AriaNeural");
        assert_eq!(cfg.speech.backend, SpeechBackend::Edge);
        assert_eq!(cfg.video.width, 1080);
        assert_eq!(cfg.upload.category_id, "27");
        assert_eq!(cfg.upload.privacy, Privacy::Unlisted);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_variant_fields_parse() {
        let cfg: Config = serde_json::from_str(
            r#"{
                "quotes": {"selection": {"line": 2}},
                "video": {"clip_length": "narration", "zoom": {"max_zoom": 1.2}},
                "upload": {"privacy": "private", "tags": ["shorts", "motivation"]}
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.quotes.selection, QuoteSelection::Line(2));
        assert_eq!(cfg.video.clip_length, ClipLength::Narration);
        assert_eq!(cfg.video.zoom, Some(ZoomConfig { max_zoom: 1.2 }));
        assert_eq!(cfg.upload.privacy, Privacy::Private);
        assert_eq!(cfg.upload.tags.len(), 2);
    }

    #[test]
    fn test_fixed_clip_length_parses() {
        let cfg: Config = serde_json::from_str(r#"{"video": {"clip_length": {"fixed": 8.0}}}"#).unwrap();
        assert_eq!(cfg.video.clip_length, ClipLength::Fixed(8.0));
    }

    #[test]
    fn test_elevenlabs_requires_key() {
        let mut cfg = Config::default();
        cfg.speech.backend = SpeechBackend::ElevenLabs;
        assert!(cfg.validate().is_err());
        cfg.speech.elevenlabs_key = "sk-test".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_volume() {
        let mut cfg = Config::default();
        cfg.video.music_volume = 7.0;
        assert!(cfg.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"paths": {"output_dir": "out"}}"#).unwrap();
        let cfg = Config::load(&path).await.unwrap();
        assert_eq!(cfg.paths.output_dir, PathBuf::from("out"));
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(dir.path().join("nope.json")).await.is_err());
    }
}
