use crate::config::{QuoteConfig, QuoteSelection};
use crate::error::ShortsError;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::path::Path;
use tokio::fs;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapses runs of whitespace so captions and narration see one clean line.
pub fn normalize_quote(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text.trim(), " ").into_owned()
}

/// Non-blank lines of a quote list, normalised.
pub fn parse_quote_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(normalize_quote)
        .filter(|line| !line.is_empty())
        .collect()
}

pub fn select_quote<R: Rng + ?Sized>(
    quotes: &[String],
    selection: &QuoteSelection,
    source: &Path,
    rng: &mut R,
) -> Result<String, ShortsError> {
    if quotes.is_empty() {
        return Err(ShortsError::EmptyQuoteFile(source.to_path_buf()));
    }

    let idx = match selection {
        QuoteSelection::Random => rng.gen_range(0..quotes.len()),
        QuoteSelection::Line(line) => {
            if *line >= quotes.len() {
                return Err(ShortsError::QuoteOutOfRange {
                    path: source.to_path_buf(),
                    line: *line,
                    available: quotes.len(),
                });
            }
            *line
        }
    };

    Ok(quotes[idx].clone())
}

pub async fn pick_quote<R: Rng + ?Sized>(cfg: &QuoteConfig, rng: &mut R) -> Result<String> {
    if let Some(text) = cfg.text.as_deref() {
        let text = normalize_quote(text);
        if !text.is_empty() {
            return Ok(text);
        }
    }

    let content = fs::read_to_string(&cfg.file)
        .await
        .with_context(|| format!("Failed to read quote file: {}", cfg.file.display()))?;
    let quotes = parse_quote_lines(&content);
    Ok(select_quote(&quotes, &cfg.selection, &cfg.file, rng)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::path::PathBuf;

    #[test]
    fn test_blank_lines_ignored() {
        let lines = parse_quote_lines("first\n\n   \nsecond  line\r\n\t\n");
        assert_eq!(lines, vec!["first".to_string(), "second line".to_string()]);
    }

    #[test]
    fn test_random_selection_is_always_a_listed_line() {
        let quotes = parse_quote_lines("a\n\nb\n  \nc\n");
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let q = select_quote(&quotes, &QuoteSelection::Random, Path::new("q.txt"), &mut rng).unwrap();
            assert!(!q.trim().is_empty());
            assert!(quotes.contains(&q));
        }
    }

    #[test]
    fn test_line_selection() {
        let quotes = parse_quote_lines("zero\none\ntwo\n");
        let mut rng = StdRng::seed_from_u64(1);
        let q = select_quote(&quotes, &QuoteSelection::Line(1), Path::new("q.txt"), &mut rng).unwrap();
        assert_eq!(q, "one");

        let err = select_quote(&quotes, &QuoteSelection::Line(9), Path::new("q.txt"), &mut rng).unwrap_err();
        assert!(matches!(err, ShortsError::QuoteOutOfRange { available: 3, .. }));
    }

    #[test]
    fn test_empty_list_is_an_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = select_quote(&[], &QuoteSelection::Random, Path::new("q.txt"), &mut rng).unwrap_err();
        assert!(matches!(err, ShortsError::EmptyQuoteFile(_)));
    }

    #[tokio::test]
    async fn test_pick_quote_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("quotes.txt");
        std::fs::write(&file, "\nDrive slowly on snowy roads.\n\n").unwrap();
        let cfg = QuoteConfig {
            file,
            selection: QuoteSelection::Random,
            text: None,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let q = pick_quote(&cfg, &mut rng).await.unwrap();
        assert_eq!(q, "Drive slowly on snowy roads.");
    }

    #[tokio::test]
    async fn test_fixed_text_bypasses_file() {
        let cfg = QuoteConfig {
            file: PathBuf::from("/does/not/exist.txt"),
            selection: QuoteSelection::Random,
            text: Some("  Keep   your distance. ".to_string()),
        };
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(pick_quote(&cfg, &mut rng).await.unwrap(), "Keep your distance.");
    }

    #[tokio::test]
    async fn test_whitespace_only_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("quotes.txt");
        std::fs::write(&file, " \n\t\n").unwrap();
        let cfg = QuoteConfig {
            file,
            selection: QuoteSelection::Random,
            text: None,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let err = pick_quote(&cfg, &mut rng).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ShortsError>(), Some(ShortsError::EmptyQuoteFile(_))));
    }
}
