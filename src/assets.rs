use crate::error::{AssetKind, ShortsError};
use anyhow::{Context, Result};
use rand::Rng;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png"];
const MUSIC_EXTS: &[&str] = &["mp3"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub path: PathBuf,
    pub kind: AssetKind,
}

fn extensions(kind: AssetKind) -> &'static [&'static str] {
    match kind {
        AssetKind::Image => IMAGE_EXTS,
        AssetKind::Music => MUSIC_EXTS,
    }
}

fn has_ext(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| exts.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Flat listing of `dir`, sorted so a seeded pick is reproducible.
pub fn list_assets(dir: &Path, kind: AssetKind) -> Result<Vec<MediaAsset>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let exts = extensions(kind);
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if entry.file_type().is_file() && has_ext(entry.path(), exts) {
            out.push(MediaAsset {
                path: entry.into_path(),
                kind,
            });
        }
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

pub fn pick_asset<R: Rng + ?Sized>(dir: &Path, kind: AssetKind, rng: &mut R) -> Result<MediaAsset> {
    let assets = list_assets(dir, kind)?;
    if assets.is_empty() {
        return Err(ShortsError::MissingAsset {
            kind,
            dir: dir.to_path_buf(),
        }
        .into());
    }
    let idx = rng.gen_range(0..assets.len());
    Ok(assets[idx].clone())
}
