//! Collaborator contracts the engine calls but does not own: sentiment, spell checking,
//! profanity classification and post metadata. Calls are synchronous; retries and
//! timeouts are the implementor's business.
//!
//! Small offline implementations are provided so the binary can run without remote
//! services.

use crate::ndjson::NdjsonReader;
use ahash::{AHashMap, AHashSet};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sentiment {
    /// In [-1, 1].
    pub polarity: f64,
    /// In [0, 1].
    pub subjectivity: f64,
}

pub trait SentimentAnalyzer: Send + Sync {
    fn sentiment_of(&self, text: &str) -> Result<Sentiment>;
}

pub trait SpellChecker: Send + Sync {
    /// The subset of `words` the checker does not recognize.
    fn unknown_words(&self, words: &[&str]) -> Result<AHashSet<String>>;
}

pub trait ProfanityClassifier: Send + Sync {
    fn is_profane(&self, text: &str) -> Result<bool>;
}

pub trait PostSource: Send + Sync {
    /// Creation time of the post, epoch seconds.
    fn fetch_post_creation_time(&self, post_id: &str) -> Result<i64>;
}

/// The three text services, shared across worker threads.
#[derive(Clone)]
pub struct TextServices {
    pub sentiment: Arc<dyn SentimentAnalyzer>,
    pub spelling: Arc<dyn SpellChecker>,
    pub profanity: Arc<dyn ProfanityClassifier>,
}

impl TextServices {
    pub fn new(
        sentiment: impl SentimentAnalyzer + 'static,
        spelling: impl SpellChecker + 'static,
        profanity: impl ProfanityClassifier + 'static,
    ) -> Self {
        Self { sentiment: Arc::new(sentiment), spelling: Arc::new(spelling), profanity: Arc::new(profanity) }
    }
}

fn load_terms(path: &Path) -> Result<AHashSet<String>> {
    let f = crate::util::open_with_backoff(path, 16, 50).with_context(|| format!("open {}", path.display()))?;
    let mut set = AHashSet::new();
    for line in BufReader::new(f).lines() {
        let w = line.with_context(|| format!("read {}", path.display()))?.trim().to_lowercase();
        if !w.is_empty() {
            set.insert(w);
        }
    }
    Ok(set)
}

fn normalize_token(token: &str) -> String {
    token.trim_matches(|c: char| !c.is_alphabetic()).to_lowercase()
}

// ----------------------------- Sentiment ---------------------------------

/// Word weights; positive in (0, 1], negative in [-1, 0).
const LEXICON: &[(&str, f64)] = &[
    ("good", 0.7),
    ("great", 0.8),
    ("excellent", 1.0),
    ("best", 1.0),
    ("love", 0.5),
    ("agree", 0.4),
    ("right", 0.3),
    ("true", 0.35),
    ("fair", 0.7),
    ("happy", 0.8),
    ("interesting", 0.5),
    ("thanks", 0.2),
    ("bad", -0.7),
    ("worse", -0.4),
    ("worst", -1.0),
    ("terrible", -1.0),
    ("awful", -1.0),
    ("wrong", -0.5),
    ("hate", -0.8),
    ("stupid", -0.8),
    ("corrupt", -0.5),
    ("lie", -0.5),
    ("lies", -0.5),
    ("sad", -0.5),
];

/// Lexicon sentiment: polarity is the mean weight of matched words, subjectivity the
/// share of words that matched. Unknown or empty text scores (0, 0).
#[derive(Clone, Debug)]
pub struct LexiconSentiment {
    weights: AHashMap<&'static str, f64>,
}

impl Default for LexiconSentiment {
    fn default() -> Self {
        Self { weights: LEXICON.iter().copied().collect() }
    }
}

impl SentimentAnalyzer for LexiconSentiment {
    fn sentiment_of(&self, text: &str) -> Result<Sentiment> {
        let (mut total, mut hits, mut words) = (0.0f64, 0usize, 0usize);
        for token in text.split_whitespace() {
            let w = normalize_token(token);
            if w.is_empty() {
                continue;
            }
            words += 1;
            if let Some(weight) = self.weights.get(w.as_str()) {
                total += weight;
                hits += 1;
            }
        }
        if hits == 0 {
            return Ok(Sentiment::default());
        }
        Ok(Sentiment {
            polarity: (total / hits as f64).clamp(-1.0, 1.0),
            subjectivity: (hits as f64 / words as f64).clamp(0.0, 1.0),
        })
    }
}

// ----------------------------- Spelling ----------------------------------

/// Recognizes exactly the words of a dictionary file (one word per line).
#[derive(Clone, Debug, Default)]
pub struct DictionarySpellChecker {
    known: AHashSet<String>,
}

impl DictionarySpellChecker {
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { known: words.into_iter().map(|w| w.as_ref().trim().to_lowercase()).filter(|w| !w.is_empty()).collect() }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self { known: load_terms(path)? })
    }
}

impl SpellChecker for DictionarySpellChecker {
    fn unknown_words(&self, words: &[&str]) -> Result<AHashSet<String>> {
        if self.known.is_empty() {
            return Err(anyhow!("spell checker has an empty dictionary"));
        }
        Ok(words
            .iter()
            .filter(|w| !self.known.contains(&w.to_lowercase()))
            .map(|w| w.to_string())
            .collect())
    }
}

// ----------------------------- Profanity ---------------------------------

/// Flags text containing any listed term as a whole word.
#[derive(Clone, Debug, Default)]
pub struct WordlistProfanity {
    terms: AHashSet<String>,
}

impl WordlistProfanity {
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { terms: terms.into_iter().map(|t| t.as_ref().trim().to_lowercase()).filter(|t| !t.is_empty()).collect() }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self { terms: load_terms(path)? })
    }
}

impl ProfanityClassifier for WordlistProfanity {
    fn is_profane(&self, text: &str) -> Result<bool> {
        Ok(text.split_whitespace().any(|t| self.terms.contains(&normalize_token(t))))
    }
}

// ----------------------------- Post metadata -----------------------------

#[derive(Deserialize)]
struct PostRow {
    id: String,
    #[serde(deserialize_with = "crate::records::epoch_seconds")]
    created_utc: i64,
}

/// Post creation times read from an NDJSON file of `{"id", "created_utc", ...}` submission rows.
#[derive(Clone, Debug, Default)]
pub struct JsonlPostSource {
    created: AHashMap<String, i64>,
}

impl JsonlPostSource {
    pub fn load(path: &Path, read_buf: usize) -> Result<Self> {
        let mut rdr = NdjsonReader::open(path, read_buf).with_context(|| format!("open {}", path.display()))?;
        let mut created = AHashMap::new();
        let mut buf = String::with_capacity(16 * 1024);
        while rdr.read_line(&mut buf)? > 0 {
            if buf.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PostRow>(&buf) {
                Ok(row) => {
                    created.insert(crate::thread::bare_id(&row.id).to_string(), row.created_utc);
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unparsable post row"),
            }
        }
        Ok(Self { created })
    }

    pub fn from_pairs<I: IntoIterator<Item = (String, i64)>>(pairs: I) -> Self {
        Self { created: pairs.into_iter().collect() }
    }
}

impl PostSource for JsonlPostSource {
    fn fetch_post_creation_time(&self, post_id: &str) -> Result<i64> {
        self.created
            .get(crate::thread::bare_id(post_id))
            .copied()
            .ok_or_else(|| anyhow!("no creation time known for post {post_id}"))
    }
}
