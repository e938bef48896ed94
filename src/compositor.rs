//! Turns a still image, a caption and a narration track into the final clip.
//!
//! Every media operation is an ffmpeg invocation whose arguments come from
//! [`crate::ffmpeg`]; this module only decides durations and ordering.

use crate::config::{ClipLength, VideoConfig};
use crate::ffmpeg::{self, Renderer, VideoFit};
use crate::job::{Durations, RenderJob};
use crate::{logi, logok};
use anyhow::{Context, Result};
use rand::Rng;
use std::path::Path;
use tokio::fs;

const FIT_TOLERANCE: f64 = 0.05;

pub fn final_duration(floor: f64, narration: f64, tail_padding: f64) -> f64 {
    (narration + tail_padding).max(narration).max(floor)
}

pub fn rendered_duration(clip_length: ClipLength, final_dur: f64) -> f64 {
    match clip_length {
        ClipLength::Fixed(secs) => secs,
        ClipLength::Narration => final_dur,
    }
}

pub fn plan_fit(rendered: f64, final_dur: f64) -> VideoFit {
    let delta = final_dur - rendered;
    if delta.abs() <= FIT_TOLERANCE {
        VideoFit::Exact
    } else if delta < 0.0 {
        VideoFit::Trim { to: final_dur }
    } else {
        VideoFit::Extend { by: delta }
    }
}

/// Start offset into the music so that `final_dur` seconds fit without looping.
pub fn music_offset<R: Rng + ?Sized>(music_dur: f64, final_dur: f64, rng: &mut R) -> f64 {
    let slack = music_dur - final_dur;
    if slack <= 0.0 {
        return 0.0;
    }
    rng.gen_range(0.0..=slack)
}

/// Greedy word wrap; words longer than `width` stay on their own line.
pub fn wrap_caption(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

pub struct Compositor<'a> {
    renderer: &'a dyn Renderer,
    video: &'a VideoConfig,
    ffmpeg: &'a str,
}

impl<'a> Compositor<'a> {
    pub fn new(renderer: &'a dyn Renderer, video: &'a VideoConfig, ffmpeg: &'a str) -> Self {
        Self {
            renderer,
            video,
            ffmpeg,
        }
    }

    /// Expects `job.audio_path` to hold the narration; writes `job.staged_output`.
    pub async fn compose<R: Rng + ?Sized>(
        &self,
        job: &mut RenderJob,
        image: &Path,
        music: Option<&Path>,
        rng: &mut R,
    ) -> Result<()> {
        let v = self.video;

        let narration = self
            .renderer
            .probe_duration(&job.audio_path)
            .await
            .context("Failed to measure narration")?;
        let final_dur = final_duration(v.duration_floor, narration, v.tail_padding);
        let rendered = rendered_duration(v.clip_length, final_dur);
        job.durations = Durations {
            narration,
            rendered,
            final_dur,
        };
        logi(format!(
            "Narration {:.2}s -> clip {:.2}s, final {:.2}s",
            narration, rendered, final_dur
        ));

        fs::write(&job.caption_path, wrap_caption(&job.text, v.caption_wrap))
            .await
            .with_context(|| format!("Failed to write caption {}", job.caption_path.display()))?;

        logi(format!("Rendering still clip from {}", image.display()));
        let still = ffmpeg::still_clip_args(self.ffmpeg, v, image, &job.caption_path, rendered, &job.video_path);
        self.renderer.run(&still).await?;
        logok(format!("Still clip ready: {}", job.video_path.display()));

        let audio = match music {
            Some(music) => {
                let music_dur = self
                    .renderer
                    .probe_duration(music)
                    .await
                    .with_context(|| format!("Failed to measure music {}", music.display()))?;
                let offset = music_offset(music_dur, final_dur, rng);
                logi(format!(
                    "Mixing music {} from {:.2}s ({:.2}s long)",
                    music.display(),
                    offset,
                    music_dur
                ));
                let mix = ffmpeg::mix_audio_args(
                    self.ffmpeg,
                    &job.audio_path,
                    music,
                    offset,
                    final_dur,
                    v.narration_volume,
                    v.music_volume,
                    &job.mixed_audio_path,
                );
                self.renderer.run(&mix).await?;
                job.mixed_audio_path.clone()
            }
            None => job.audio_path.clone(),
        };

        let fit = plan_fit(rendered, final_dur);
        logi(format!(
            "Muxing ({:?}, video {}) -> {}",
            fit,
            if fit.reencodes() { "re-encoded" } else { "copied" },
            job.staged_output.display()
        ));
        let mux = ffmpeg::mux_args(self.ffmpeg, &job.video_path, &audio, fit, final_dur, &job.staged_output);
        self.renderer.run(&mux).await?;

        if fs::metadata(&job.staged_output).await.is_err() {
            anyhow::bail!("Mux produced no output at {}", job.staged_output.display());
        }
        Ok(())
    }
}
