use crate::util::open_with_backoff;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Output encoding for the joined dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Jsonl,
    Zst,
}

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct FeatureOptions {
    pub data_dir: PathBuf,              // holds comment_frame/, user_frame/, posts.jsonl
    pub output_dir: PathBuf,            // joined datasets land here
    pub exclusion_wordlist: PathBuf,    // newline-separated spellings never counted as mistakes
    pub categories_path: PathBuf,       // JSON: category -> [venue, ...]
    pub named_venues: Vec<String>,      // single-venue totals, lowercase
    pub parallelism: Option<usize>,     // Some(N) to set rayon threads, None to use default
    pub progress: bool,

    // IO tuning
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,

    // output formatting
    pub output_format: OutputFormat,
    pub human_readable_timestamps: bool, // convert unix timestamps to RFC3339 strings
}

impl Default for FeatureOptions {
    fn default() -> Self {
        let base = PathBuf::from("./data");
        Self {
            output_dir: base.join("dataset"),
            exclusion_wordlist: base.join("known_spellings.txt"),
            categories_path: base.join("partisan_resource.json"),
            data_dir: base,
            named_venues: vec!["politics".to_string(), "news".to_string()],
            parallelism: None,
            progress: true,
            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 256 * 1024,
            output_format: OutputFormat::Jsonl,
            human_readable_timestamps: false,
        }
    }
}

impl FeatureOptions {
    /// Re-roots every path under `data_dir`; call before the other path setters.
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let base = dir.as_ref().to_path_buf();
        self.output_dir = base.join("dataset");
        self.exclusion_wordlist = base.join("known_spellings.txt");
        self.categories_path = base.join("partisan_resource.json");
        self.data_dir = base;
        self
    }
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_exclusion_wordlist(mut self, path: impl AsRef<Path>) -> Self {
        self.exclusion_wordlist = path.as_ref().to_path_buf();
        self
    }
    pub fn with_categories(mut self, path: impl AsRef<Path>) -> Self {
        self.categories_path = path.as_ref().to_path_buf();
        self
    }
    pub fn with_named_venues<I, S>(mut self, venues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.named_venues = venues.into_iter().map(|v| normalize_venue(v.as_ref())).collect();
        self
    }
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads);
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self {
        self.read_buffer_bytes = read_bytes.max(8 * 1024);
        self.write_buffer_bytes = write_bytes.max(8 * 1024);
        self
    }
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }
    pub fn with_human_timestamps(mut self, yes: bool) -> Self {
        self.human_readable_timestamps = yes;
        self
    }

    /// Apply environment overrides:
    /// - FEATURES_DATA_DIR: re-roots all paths
    /// - FEATURES_EXCLUSION_WORDLIST: path to the excluded-spellings file
    /// - FEATURES_CATEGORIES: path to the venue category table
    pub fn merge_env(mut self) -> Self {
        if let Some(dir) = env_path("FEATURES_DATA_DIR") {
            self = self.with_data_dir(dir);
        }
        if let Some(p) = env_path("FEATURES_EXCLUSION_WORDLIST") {
            self = self.with_exclusion_wordlist(p);
        }
        if let Some(p) = env_path("FEATURES_CATEGORIES") {
            self = self.with_categories(p);
        }
        self
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty()).map(PathBuf::from)
}

#[inline]
pub fn normalize_venue(s: &str) -> String {
    let s = s.trim().to_lowercase();
    if let Some(rest) = s.strip_prefix("r/") { rest.to_string() } else { s }
}

/// Terms the spelling feature never reports. A candidate is excluded when it
/// *contains* any listed term, so "mueller" also covers "muellers".
#[derive(Clone, Debug, Default)]
pub struct ExclusionWordlist {
    terms: Vec<String>,
}

impl ExclusionWordlist {
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut terms: Vec<String> = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        terms.sort();
        terms.dedup();
        Self { terms }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let f = open_with_backoff(path, 16, 50)
            .with_context(|| format!("open exclusion wordlist {}", path.display()))?;
        let lines = BufReader::new(f)
            .lines()
            .collect::<std::io::Result<Vec<String>>>()
            .with_context(|| format!("read exclusion wordlist {}", path.display()))?;
        Ok(Self::from_terms(lines))
    }

    pub fn excludes(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        self.terms.iter().any(|t| word.contains(t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Category name -> member venues (lowercase), e.g. `left_leaning`, `right_leaning`, `centrist`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VenueCategories(BTreeMap<String, Vec<String>>);

impl VenueCategories {
    pub fn new<I, K, V, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = BTreeMap::new();
        for (name, venues) in categories {
            let mut v: Vec<String> = venues.into_iter().map(|s| normalize_venue(s.as_ref())).collect();
            v.sort();
            v.dedup();
            map.insert(name.into(), v);
        }
        Self(map)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let f = open_with_backoff(path, 16, 50)
            .with_context(|| format!("open venue categories {}", path.display()))?;
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse venue categories {}", path.display()))?;
        Ok(Self::new(raw))
    }

    pub fn venues(&self, category: &str) -> &[String] {
        self.0.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
