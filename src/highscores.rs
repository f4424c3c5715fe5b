//! Persist high scores to disk (XDG config or ~/.config/gravitris), one score per line.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

const FILENAME: &str = "highscores";

#[derive(Debug, Error)]
pub enum HighScoreError {
    #[error("cannot write high scores to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Default path of the high scores file (config dir / gravitris / highscores).
pub fn default_path() -> PathBuf {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from(".")),
    };
    base.join("gravitris").join(FILENAME)
}

/// Parses the file content; lines that are not a finite float are skipped.
pub fn parse_scores(content: &str) -> Vec<f32> {
    let mut scores: Vec<f32> = content
        .lines()
        .filter_map(|l| l.trim().parse::<f32>().ok())
        .filter(|s| s.is_finite())
        .collect();
    sort_descending(&mut scores);
    scores
}

fn sort_descending(scores: &mut [f32]) {
    scores.sort_by(|a, b| b.total_cmp(a));
}

/// In-memory leaderboard backed by an optional append-only file.
#[derive(Debug, Clone, Default)]
pub struct HighScores {
    path: Option<PathBuf>,
    scores: Vec<f32>,
}

impl HighScores {
    /// Memory-only leaderboard.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads from `path`. A missing or unreadable file means no history.
    pub fn load(path: &Path) -> Self {
        let scores = match fs::read_to_string(path) {
            Ok(content) => parse_scores(&content),
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("ignoring unreadable high scores {}: {}", path.display(), err);
                }
                Vec::new()
            }
        };
        log::info!("loaded {} high scores from {}", scores.len(), path.display());
        Self {
            path: Some(path.to_path_buf()),
            scores,
        }
    }

    /// Sorted descending.
    #[cfg(test)]
    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    pub fn top(&self, n: usize) -> &[f32] {
        &self.scores[..n.min(self.scores.len())]
    }

    pub fn best(&self) -> Option<f32> {
        self.scores.first().copied()
    }

    /// Adds `score` to the list (kept sorted) and appends it to the file.
    /// The in-memory list is updated even if the write fails.
    pub fn record(&mut self, score: f32) -> Result<(), HighScoreError> {
        let pos = self.scores.partition_point(|s| *s >= score);
        self.scores.insert(pos, score);
        match &self.path {
            Some(path) => append_score(path, score),
            None => Ok(()),
        }
    }
}

/// Appends one line to the score file, creating its directory if needed.
pub fn append_score(path: &Path, score: f32) -> Result<(), HighScoreError> {
    let io_err = |source| HighScoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let mut f = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    writeln!(f, "{}", score).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "gravitris_scores_test_{}_{}_{}",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn test_record_keeps_descending_order() {
        let mut hs = HighScores::in_memory();
        for s in [50.0, 200.0, 10.0] {
            hs.record(s).unwrap();
        }
        assert_eq!(hs.scores(), &[200.0, 50.0, 10.0]);
        assert_eq!(hs.best(), Some(200.0));
        assert_eq!(hs.top(2), &[200.0, 50.0]);
        assert_eq!(hs.top(10).len(), 3);
    }

    #[test]
    fn test_parse_skips_bad_lines() {
        let scores = parse_scores("12.5\nnot a number\n\n300\n  7 \ninf\n");
        assert_eq!(scores, vec![300.0, 12.5, 7.0]);
    }

    #[test]
    fn test_missing_file_is_empty_history() {
        let path = temp_file_path("missing");
        let hs = HighScores::load(&path);
        assert!(hs.scores().is_empty());
    }

    #[test]
    fn test_record_appends_and_reloads() {
        let dir = temp_file_path("dir");
        let path = dir.join("nested").join("highscores");
        let mut hs = HighScores::load(&path);
        hs.record(50.0).unwrap();
        hs.record(200.0).unwrap();
        hs.record(10.0).unwrap();

        let raw = fs::read_to_string(&path).expect("scores written");
        assert_eq!(raw.lines().collect::<Vec<_>>(), vec!["50", "200", "10"]);

        let reloaded = HighScores::load(&path);
        assert_eq!(reloaded.scores(), &[200.0, 50.0, 10.0]);
        let _ = fs::remove_dir_all(dir);
    }
}
