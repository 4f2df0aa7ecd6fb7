use anyhow::{Context, Result, anyhow};
use rand::Rng;
use rand::rngs::StdRng;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::config::CorpusMode;

/// Supplies the label text for a sample.
pub trait CorpusProvider: Send + Sync {
    /// `None` once the corpus has nothing left for `index`.
    fn next_text(&self, index: u64, rng: &mut StdRng) -> Option<String>;

    fn is_empty(&self) -> bool;
}

/// Text lines read from one or more files.
#[derive(Debug, Clone)]
pub struct LineCorpus {
    lines: Vec<String>,
    mode: CorpusMode,
    max_chars: usize,
}

impl LineCorpus {
    pub fn new(lines: Vec<String>, mode: CorpusMode, max_chars: usize) -> Self {
        let lines = lines
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Self {
            lines,
            mode,
            max_chars: max_chars.max(1),
        }
    }

    pub fn load(paths: &[PathBuf], mode: CorpusMode, max_chars: usize) -> Result<Self> {
        let mut lines = Vec::new();
        for path in paths {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read corpus: {}", path.display()))?;
            lines.extend(content.lines().map(str::to_string));
        }
        let corpus = Self::new(lines, mode, max_chars);
        if corpus.lines.is_empty() {
            return Err(anyhow!("corpus files contain no text"));
        }
        info!("loaded {} corpus lines from {} files", corpus.lines.len(), paths.len());
        Ok(corpus)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Removes characters the glyph backend cannot draw. Whitespace is kept;
    /// lines left without any drawable character are dropped.
    pub fn filter_available(&mut self, available: impl Fn(char) -> bool) {
        let before = self.lines.len();
        self.lines = self
            .lines
            .iter()
            .map(|line| {
                line.chars()
                    .filter(|ch| ch.is_whitespace() || available(*ch))
                    .collect::<String>()
            })
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        info!("{} of {} corpus lines remain after filtering", self.lines.len(), before);
    }

    fn window(&self, line: &str, rng: &mut StdRng) -> String {
        let chars: Vec<char> = line.chars().collect();
        if chars.len() <= self.max_chars {
            return line.to_string();
        }
        let start = rng.random_range(0..=chars.len() - self.max_chars);
        chars[start..start + self.max_chars]
            .iter()
            .collect::<String>()
            .trim()
            .to_string()
    }
}

impl CorpusProvider for LineCorpus {
    fn next_text(&self, index: u64, rng: &mut StdRng) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }
        let line = match self.mode {
            CorpusMode::Sampled => &self.lines[rng.random_range(0..self.lines.len())],
            CorpusMode::Ordered => self.lines.get(usize::try_from(index).ok()?)?,
        };
        let text = self.window(line, rng);
        if text.is_empty() { None } else { Some(text) }
    }

    fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
