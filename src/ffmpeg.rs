use crate::config::VideoConfig;
use crate::error::ShortsError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

const STDERR_TAIL: usize = 800;

/// Runs argument lists built by this module. Swappable so the compositor
/// can be exercised without the real tools.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Renderer: Send + Sync {
    /// `args[0]` is the program.
    async fn run(&self, args: &[String]) -> Result<()>;

    async fn probe_duration(&self, path: &Path) -> Result<f64>;
}

pub struct FfmpegRenderer {
    ffprobe: String,
}

impl FfmpegRenderer {
    pub fn new(ffprobe: impl Into<String>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
        }
    }
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn run(&self, args: &[String]) -> Result<()> {
        run_cmd(args).await
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        ffprobe_duration_seconds(&self.ffprobe, path).await
    }
}

fn stderr_tail(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    let skip = text.chars().count().saturating_sub(STDERR_TAIL);
    text.chars().skip(skip).collect()
}

async fn run_cmd(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Ok(());
    }

    let mut cmd = Command::new(&args[0]);
    if args.len() > 1 {
        cmd.args(&args[1..]);
    }

    let output = cmd
        .output()
        .await
        .with_context(|| format!("Command execution failed: {}", args[0]))?;
    if !output.status.success() {
        return Err(ShortsError::ToolFailed {
            tool: args[0].clone(),
            status: output.status.to_string(),
            stderr: stderr_tail(&output.stderr),
        }
        .into());
    }

    Ok(())
}

pub async fn ffprobe_duration_seconds(ffprobe: &str, path: &Path) -> Result<f64> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe duration failed")?;

    if !output.status.success() {
        return Err(ShortsError::ToolFailed {
            tool: ffprobe.to_string(),
            status: output.status.to_string(),
            stderr: stderr_tail(&output.stderr),
        }
        .into());
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    parse_duration(&text).with_context(|| format!("Invalid duration for {}", path.display()))
}

fn parse_duration(text: &str) -> Result<f64> {
    let duration = text.parse::<f64>().unwrap_or(-1.0);
    if !duration.is_finite() || duration <= 0.0 {
        return Err(anyhow::anyhow!("ffprobe reported {:?}", text));
    }
    Ok(duration)
}

fn backslash_escape(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if special.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Escapes a filter option value that sits inside a `-vf` graph: once for
/// the option parser, then again for the graph parser.
pub fn escape_filter_value(value: &str) -> String {
    let option = backslash_escape(value, &['\\', '\'', ':']);
    backslash_escape(&option, &['\\', '\'', '[', ']', ',', ';'])
}

fn secs(v: f64) -> String {
    format!("{:.3}", v)
}

fn common_prefix(ffmpeg: &str) -> Vec<String> {
    vec![
        ffmpeg.to_string(),
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ]
}

fn x264_args() -> Vec<String> {
    vec![
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-preset".to_string(),
        "veryfast".to_string(),
        "-crf".to_string(),
        "22".to_string(),
    ]
}

fn aac_args() -> Vec<String> {
    vec![
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
    ]
}

/// Filter chain for the still clip: cover-scale, optional slow zoom, caption.
pub fn still_clip_filter(v: &VideoConfig, caption_file: &Path, duration: f64) -> String {
    let mut chain = vec![format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}",
        w = v.width,
        h = v.height
    )];

    if let Some(zoom) = v.zoom {
        let frames = (duration * v.fps as f64).ceil().max(1.0);
        let step = (zoom.max_zoom - 1.0) / frames;
        chain.push(format!(
            "zoompan=z='min(1+{:.6}*on,{:.3})':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d=1:s={}x{}:fps={}",
            step, zoom.max_zoom, v.width, v.height, v.fps
        ));
    }

    let mut drawtext = format!(
        "drawtext=fontfile={}:textfile={}:expansion=none:fontcolor={}:fontsize={}:line_spacing=12:x={}:y={}",
        escape_filter_value(&v.font_file.to_string_lossy()),
        escape_filter_value(&caption_file.to_string_lossy()),
        v.font_color,
        v.font_size,
        v.caption_x,
        v.caption_y
    );
    if v.fade_in > 0.0 {
        drawtext.push_str(&format!(
            ":alpha='if(lt(t,{f:.3}),t/{f:.3},1)'",
            f = v.fade_in
        ));
    }
    chain.push(drawtext);

    chain.join(",")
}

pub fn still_clip_args(
    ffmpeg: &str,
    v: &VideoConfig,
    image: &Path,
    caption_file: &Path,
    duration: f64,
    out_mp4: &Path,
) -> Vec<String> {
    let mut args = common_prefix(ffmpeg);
    args.extend([
        "-loop".to_string(),
        "1".to_string(),
        "-framerate".to_string(),
        v.fps.to_string(),
        "-i".to_string(),
        image.display().to_string(),
        "-vf".to_string(),
        still_clip_filter(v, caption_file, duration),
        "-t".to_string(),
        secs(duration),
        "-r".to_string(),
        v.fps.to_string(),
    ]);
    args.extend(x264_args());
    args.extend(["-an".to_string(), out_mp4.display().to_string()]);
    args
}

#[allow(clippy::too_many_arguments)]
pub fn mix_audio_args(
    ffmpeg: &str,
    narration: &Path,
    music: &Path,
    music_offset: f64,
    final_dur: f64,
    narration_volume: f64,
    music_volume: f64,
    out_m4a: &Path,
) -> Vec<String> {
    let mut args = common_prefix(ffmpeg);
    args.extend([
        "-i".to_string(),
        narration.display().to_string(),
        "-ss".to_string(),
        secs(music_offset),
        "-t".to_string(),
        secs(final_dur),
        "-i".to_string(),
        music.display().to_string(),
        "-filter_complex".to_string(),
        format!(
            "[0:a]volume={:.3}[a0];[1:a]volume={:.3}[a1];[a0][a1]amix=inputs=2:duration=longest:dropout_transition=0[a]",
            narration_volume, music_volume
        ),
        "-map".to_string(),
        "[a]".to_string(),
        "-t".to_string(),
        secs(final_dur),
    ]);
    args.extend(aac_args());
    args.push(out_m4a.display().to_string());
    args
}

/// How the rendered clip relates to the final duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VideoFit {
    Exact,
    Trim { to: f64 },
    Extend { by: f64 },
}

impl VideoFit {
    pub fn reencodes(&self) -> bool {
        !matches!(self, VideoFit::Exact)
    }
}

pub fn mux_args(
    ffmpeg: &str,
    video: &Path,
    audio: &Path,
    fit: VideoFit,
    final_dur: f64,
    out_mp4: &Path,
) -> Vec<String> {
    let mut args = common_prefix(ffmpeg);
    args.extend([
        "-i".to_string(),
        video.display().to_string(),
        "-i".to_string(),
        audio.display().to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
    ]);

    match fit {
        VideoFit::Exact => args.extend(["-c:v".to_string(), "copy".to_string()]),
        VideoFit::Trim { .. } => args.extend(x264_args()),
        VideoFit::Extend { by } => {
            args.extend([
                "-vf".to_string(),
                format!("tpad=stop_mode=clone:stop_duration={}", secs(by)),
            ]);
            args.extend(x264_args());
        }
    }

    args.extend(aac_args());
    args.extend([
        "-t".to_string(),
        secs(final_dur),
        "-movflags".to_string(),
        "+faststart".to_string(),
        out_mp4.display().to_string(),
    ]);
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZoomConfig;
    use std::path::PathBuf;

    fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("3.250000").unwrap(), 3.25);
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("0.0").is_err());
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("C:\\fonts\\a.ttf"), "C\\\\:\\\\\\\\fonts\\\\\\\\a.ttf");
        assert_eq!(escape_filter_value("it's:a"), "it\\\\\\'s\\\\:a");
        assert_eq!(escape_filter_value("clip[1],x"), "clip\\[1\\]\\,x");
        assert_eq!(escape_filter_value("/tmp/plain.txt"), "/tmp/plain.txt");
    }

    #[test]
    fn test_still_clip_without_zoom() {
        let v = VideoConfig::default();
        let args = still_clip_args("ffmpeg", &v, Path::new("bg.jpg"), Path::new("work/caption.txt"), 8.0, Path::new("work/clip.mp4"));
        assert_eq!(args[0], "ffmpeg");
        assert_eq!(flag_value(&args, "-i"), Some("bg.jpg"));
        assert_eq!(flag_value(&args, "-t"), Some("8.000"));
        assert_eq!(flag_value(&args, "-r"), Some("25"));
        assert_eq!(args.last().map(String::as_str), Some("work/clip.mp4"));
        assert!(args.contains(&"-an".to_string()));

        let vf = flag_value(&args, "-vf").unwrap();
        assert!(vf.starts_with("scale=1080:1920"));
        assert!(!vf.contains("zoompan"));
        assert!(vf.contains("textfile=work/caption.txt"));
        assert!(vf.contains("expansion=none"));
        assert!(vf.contains("fontsize=64"));
        assert!(vf.contains("alpha='if(lt(t,1.000),t/1.000,1)'"));
    }

    #[test]
    fn test_still_clip_with_zoom() {
        let mut v = VideoConfig::default();
        v.zoom = Some(ZoomConfig { max_zoom: 1.25 });
        v.fade_in = 0.0;
        let vf = still_clip_filter(&v, Path::new("c.txt"), 10.0);
        let zoom_at = vf.find("zoompan").unwrap();
        let text_at = vf.find("drawtext").unwrap();
        assert!(zoom_at < text_at);
        // 250 frames to reach 1.25
        assert!(vf.contains("min(1+0.001000*on,1.250)"));
        assert!(!vf.contains("alpha"));
    }

    #[test]
    fn test_mix_audio_args() {
        let args = mix_audio_args(
            "ffmpeg",
            Path::new("voice.mp3"),
            Path::new("song.mp3"),
            12.5,
            10.0,
            1.0,
            0.15,
            Path::new("mixed.m4a"),
        );
        let music_idx = args.iter().position(|a| a == "song.mp3").unwrap();
        let ss_idx = args.iter().position(|a| a == "-ss").unwrap();
        assert!(ss_idx < music_idx, "offset must apply to the music input");
        assert_eq!(args[ss_idx + 1], "12.500");
        let fc = flag_value(&args, "-filter_complex").unwrap();
        assert!(fc.contains("[0:a]volume=1.000"));
        assert!(fc.contains("[1:a]volume=0.150"));
        assert!(fc.contains("amix=inputs=2"));
    }

    #[test]
    fn test_mux_copies_video_when_exact() {
        let out = PathBuf::from("final.mp4");
        let args = mux_args("ffmpeg", Path::new("clip.mp4"), Path::new("voice.mp3"), VideoFit::Exact, 10.0, &out);
        assert_eq!(flag_value(&args, "-c:v"), Some("copy"));
        assert_eq!(flag_value(&args, "-c:a"), Some("aac"));
        assert_eq!(flag_value(&args, "-t"), Some("10.000"));
        assert!(!args.contains(&"-vf".to_string()));
    }

    #[test]
    fn test_mux_reencodes_when_trimmed() {
        let args = mux_args("ffmpeg", Path::new("clip.mp4"), Path::new("a.m4a"), VideoFit::Trim { to: 9.0 }, 9.0, Path::new("o.mp4"));
        assert_eq!(flag_value(&args, "-c:v"), Some("libx264"));
        assert_eq!(flag_value(&args, "-t"), Some("9.000"));
    }

    #[test]
    fn test_mux_pads_when_extended() {
        let args = mux_args("ffmpeg", Path::new("clip.mp4"), Path::new("a.m4a"), VideoFit::Extend { by: 2.0 }, 10.0, Path::new("o.mp4"));
        assert_eq!(flag_value(&args, "-vf"), Some("tpad=stop_mode=clone:stop_duration=2.000"));
        assert_eq!(flag_value(&args, "-c:v"), Some("libx264"));
    }

    #[tokio::test]
    async fn test_run_cmd_surfaces_failure() {
        let args = vec!["sh".to_string(), "-c".to_string(), "echo boom >&2; exit 3".to_string()];
        let err = run_cmd(&args).await.unwrap_err();
        match err.downcast_ref::<ShortsError>() {
            Some(ShortsError::ToolFailed { tool, stderr, .. }) => {
                assert_eq!(tool, "sh");
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
