use sociogram_core::config::AnalysisConfig;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

const UNIT_SEPARATOR: char = '\u{1f}';

/// Reduces a raw name to a comparison key: NFKC width folding, lowercase,
/// single spaces, no surrounding punctuation and no honorific noise.
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    honorifics: HashSet<String>,
    suffixes: Vec<String>,
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl NameNormalizer {
    pub fn new<H, S>(honorifics: H, suffixes: S) -> Self
    where
        H: IntoIterator,
        H::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let honorifics = honorifics
            .into_iter()
            .map(|h| fold(h.as_ref()))
            .map(|h| trim_punctuation(&h).to_string())
            .filter(|h| !h.is_empty())
            .collect();
        let suffixes = suffixes
            .into_iter()
            .map(|s| fold(s.as_ref()).trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            honorifics,
            suffixes,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(&config.honorifics, &config.honorific_suffixes)
    }

    /// Returns `None` when nothing name-like survives.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let folded = fold(raw);
        let mut tokens: Vec<&str> = folded
            .split_whitespace()
            .map(trim_punctuation)
            .filter(|t| !t.is_empty() && !self.honorifics.contains(*t))
            .collect();

        if let Some(last) = tokens.last_mut() {
            for suffix in &self.suffixes {
                if let Some(stem) = last.strip_suffix(suffix.as_str()) {
                    if stem.chars().count() >= 2 {
                        *last = stem;
                        break;
                    }
                }
            }
        }

        if tokens.is_empty() {
            None
        } else {
            Some(tokens.join(" "))
        }
    }
}

fn fold(raw: &str) -> String {
    raw.nfkc().collect::<String>().to_lowercase()
}

fn trim_punctuation(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Splits a multi-name answer cell on the configured delimiters.
#[derive(Debug, Clone)]
pub struct NameSplitter {
    delimiters: Vec<String>,
}

impl Default for NameSplitter {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl NameSplitter {
    pub fn new<D>(delimiters: D) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        Self {
            delimiters: delimiters
                .into_iter()
                .map(|d| d.as_ref().to_string())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(&config.delimiters)
    }

    /// Trimmed, non-empty pieces in cell order.
    pub fn split(&self, cell: &str) -> Vec<String> {
        let mut unified = cell.to_string();
        for delimiter in &self.delimiters {
            if unified.contains(delimiter.as_str()) {
                unified = unified.replace(delimiter.as_str(), &UNIT_SEPARATOR.to_string());
            }
        }
        unified
            .split(UNIT_SEPARATOR)
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect()
    }
}

pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

fn edit_ratio(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Similarity of two normalized keys in [0, 1]. Word order is ignored by
/// also comparing the token-sorted forms.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let direct = edit_ratio(a, b);
    let sorted = edit_ratio(&token_sorted(a), &token_sorted(b));
    direct.max(sorted)
}

fn token_sorted(key: &str) -> String {
    let mut tokens: Vec<&str> = key.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}
