use crate::logw;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Durations {
    pub narration: f64,
    pub rendered: f64,
    pub final_dur: f64,
}

/// Per-run bookkeeping: the paths the pipeline writes and which of them are
/// scratch files.
#[derive(Debug)]
pub struct RenderJob {
    pub text: String,
    pub audio_path: PathBuf,
    pub caption_path: PathBuf,
    pub video_path: PathBuf,
    pub mixed_audio_path: PathBuf,
    pub staged_output: PathBuf,
    pub durations: Durations,
    temp_files: Vec<PathBuf>,
}

impl RenderJob {
    /// `stamp` keeps leftovers of different runs apart.
    pub fn new(text: impl Into<String>, work_dir: &Path, stamp: &str) -> Self {
        let audio_path = work_dir.join(format!("voice_{}.mp3", stamp));
        let caption_path = work_dir.join(format!("caption_{}.txt", stamp));
        let video_path = work_dir.join(format!("temp_video_{}.mp4", stamp));
        let mixed_audio_path = work_dir.join(format!("mixed_{}.m4a", stamp));
        let staged_output = work_dir.join(format!("video_{}.mp4", stamp));

        let temp_files = vec![
            audio_path.clone(),
            caption_path.clone(),
            video_path.clone(),
            mixed_audio_path.clone(),
            staged_output.clone(),
        ];

        Self {
            text: text.into(),
            audio_path,
            caption_path,
            video_path,
            mixed_audio_path,
            staged_output,
            durations: Durations::default(),
            temp_files,
        }
    }

    pub fn temp_files(&self) -> &[PathBuf] {
        &self.temp_files
    }

    pub fn output_file_name(&self) -> String {
        self.staged_output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string())
    }

    /// Best-effort removal of every scratch file; returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let mut removed = 0;
        for path in &self.temp_files {
            match tokio::fs::remove_file(path).await {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => logw(format!("Could not remove temp file {}: {}", path.display(), err)),
            }
        }
        removed
    }
}
