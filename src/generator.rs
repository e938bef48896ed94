use crate::assets;
use crate::compositor::Compositor;
use crate::config::Config;
use crate::error::AssetKind;
use crate::ffmpeg::{FfmpegRenderer, Renderer};
use crate::init;
use crate::job::RenderJob;
use crate::publisher::{PublishOutcome, Publisher, UploadMetadata, YoutubePublisher};
use crate::quotes;
use crate::speech::{self, Synthesizer};
use crate::{loge, logi, logok, logw};
use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;

const DEFAULT_CONFIG: &str = "config.json";

fn now_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Disabled,
    Skipped { reason: String },
    Uploaded { video_id: String },
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub quote: String,
    pub output: PathBuf,
    pub upload: UploadOutcome,
}

/// One quote in, one video out.
pub struct Pipeline<'a> {
    cfg: &'a Config,
    synth: &'a dyn Synthesizer,
    renderer: &'a dyn Renderer,
    publisher: Option<&'a dyn Publisher>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        cfg: &'a Config,
        synth: &'a dyn Synthesizer,
        renderer: &'a dyn Renderer,
        publisher: Option<&'a dyn Publisher>,
    ) -> Self {
        Self {
            cfg,
            synth,
            renderer,
            publisher,
        }
    }

    pub async fn run<R: Rng + ?Sized>(&self, stamp: &str, date: &str, rng: &mut R) -> Result<RunReport> {
        let cfg = self.cfg;

        let quote = quotes::pick_quote(&cfg.quotes, rng).await?;
        logok(format!("Quote: {}", quote));

        let image = match &cfg.assets.background_image {
            Some(path) => path.clone(),
            None => assets::pick_asset(&cfg.assets.backgrounds_dir, AssetKind::Image, rng)?.path,
        };
        logi(format!("Background: {}", image.display()));

        let music = match &cfg.assets.music_dir {
            Some(dir) => Some(assets::pick_asset(dir, AssetKind::Music, rng)?.path),
            None => None,
        };
        if let Some(music) = &music {
            logi(format!("Music: {}", music.display()));
        }

        fs::create_dir_all(&cfg.paths.work_dir)
            .await
            .with_context(|| format!("Failed to create {}", cfg.paths.work_dir.display()))?;
        fs::create_dir_all(&cfg.paths.output_dir)
            .await
            .with_context(|| format!("Failed to create {}", cfg.paths.output_dir.display()))?;

        let mut job = RenderJob::new(quote.clone(), &cfg.paths.work_dir, stamp);
        if let Err(err) = self.render(&mut job, &image, music.as_deref(), rng).await {
            let removed = job.cleanup().await;
            logw(format!("Render aborted; removed {} temp file(s).", removed));
            return Err(err);
        }

        let output = cfg.paths.output_dir.join(job.output_file_name());
        move_file(&job.staged_output, &output).await?;
        logok(format!("Video saved: {}", output.display()));

        let removed = job.cleanup().await;
        logi(format!("Removed {} temp file(s).", removed));

        let upload = self.publish(&output, &quote, date).await;
        Ok(RunReport { quote, output, upload })
    }

    async fn render<R: Rng + ?Sized>(
        &self,
        job: &mut RenderJob,
        image: &Path,
        music: Option<&Path>,
        rng: &mut R,
    ) -> Result<()> {
        logi(format!("Synthesizing narration: {}", job.text));
        self.synth
            .synthesize(&job.text, &self.cfg.speech.voice, &job.audio_path)
            .await?;
        logok(format!("Narration saved: {}", job.audio_path.display()));

        Compositor::new(self.renderer, &self.cfg.video, &self.cfg.tools.ffmpeg)
            .compose(job, image, music, rng)
            .await
    }

    async fn publish(&self, output: &Path, quote: &str, date: &str) -> UploadOutcome {
        let publisher = match self.publisher {
            Some(p) if self.cfg.upload.enabled => p,
            _ => {
                logi("Upload disabled.".to_string());
                return UploadOutcome::Disabled;
            }
        };

        let meta = UploadMetadata::from_config(&self.cfg.upload, quote, date);
        match publisher.publish(output, &meta).await {
            Ok(PublishOutcome::Uploaded { video_id }) => UploadOutcome::Uploaded { video_id },
            Ok(PublishOutcome::Skipped { reason }) => {
                logw(format!("Upload skipped: {}", reason));
                UploadOutcome::Skipped { reason }
            }
            Err(err) => {
                loge(format!("Upload error: {:#}", err));
                UploadOutcome::Failed {
                    error: format!("{:#}", err),
                }
            }
        }
    }
}

async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    // rename fails across filesystems
    fs::copy(from, to)
        .await
        .with_context(|| format!("Failed to move {} -> {}", from.display(), to.display()))?;
    fs::remove_file(from).await.ok();
    Ok(())
}

async fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path).await,
        None if Path::new(DEFAULT_CONFIG).exists() => Config::load(DEFAULT_CONFIG).await,
        None => {
            logw(format!("{} not found; using built-in defaults.", DEFAULT_CONFIG));
            Ok(Config::default())
        }
    }
}

pub async fn run_generation(config_path: Option<&Path>) -> Result<()> {
    let cfg = load_config(config_path).await?;
    let client = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .context("Failed to build HTTP client")?;

    if cfg.upload.enabled {
        init::restore_token_from_env(std::env::var(&cfg.upload.token_env).ok(), &cfg.upload.token_file).await;
    }
    init::ensure_directories(&cfg).await?;
    if !init::check_ffmpeg(&cfg.tools.ffmpeg).await {
        logw(format!("{} not found in PATH. Please install FFmpeg.", cfg.tools.ffmpeg));
    }

    let synth = speech::create_synthesizer(&cfg.speech, client.clone());
    let renderer = FfmpegRenderer::new(cfg.tools.ffprobe.clone());
    let youtube = YoutubePublisher::new(client, &cfg.upload);
    let publisher: Option<&dyn Publisher> = if cfg.upload.enabled { Some(&youtube) } else { None };

    let now = chrono::Local::now();
    let stamp = now.format("%Y%m%d_%H%M%S").to_string();
    let date = now.format("%Y-%m-%d").to_string();
    logi(format!("Creating video: {}", now.format("%Y-%m-%d %H:%M:%S")));

    let mut rng = rand::rngs::StdRng::seed_from_u64(now_seed());
    let report = Pipeline::new(&cfg, synth.as_ref(), &renderer, publisher)
        .run(&stamp, &date, &mut rng)
        .await?;

    logok(format!("DONE: {} ({:?})", report.output.display(), report.upload));
    Ok(())
}
