//! Lexical and semantic signals from a single reply body.

use crate::config::ExclusionWordlist;
use crate::services::{Sentiment, TextServices};
use crate::table::FeatureRecord;
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::OnceLock;

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `$-_` is a range: it spans most ASCII punctuation, digits and upper-case letters.
    RE.get_or_init(|| {
        Regex::new(r"https?://(?:[a-zA-Z]|[0-9]|[$-_@.&+ ]|[!*(), ]|%[0-9a-fA-F]{2})+")
            .expect("static url pattern")
    })
}

/// True when `word` contains an http(s) URL.
pub fn is_url_shaped(word: &str) -> bool {
    url_re().is_match(word)
}

/// Number of whitespace-separated tokens in `body` that contain a URL.
pub fn url_count(body: &str) -> usize {
    body.split_whitespace().filter(|w| is_url_shaped(w)).count()
}

/// Lower-case `text` and drop every whitespace-separated token that contains a URL.
/// Tokens are re-joined with single spaces, so line breaks do not survive.
pub fn remove_urls(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .filter(|w| !is_url_shaped(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Words handed to the spell checker, in scan order: URLs removed, every non-letter
/// turned into a space.
pub fn spelling_candidates(body: &str) -> Vec<String> {
    let text = remove_urls(body.trim());
    let letters: String = text.chars().map(|c| if c.is_alphabetic() { c } else { ' ' }).collect();
    letters.split_whitespace().map(str::to_string).collect()
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpellingFeatures {
    pub error_count: usize,
    pub errors: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextFeatures {
    pub sentiment: Sentiment,
    pub spelling: SpellingFeatures,
    pub url_count: usize,
    pub profane: bool,
    pub has_citation: bool,
    pub has_user_ref: bool,
    pub char_count: usize,
}

impl TextFeatures {
    pub fn push_features(&self, rec: &mut FeatureRecord) {
        rec.push("comment_text_polarity", self.sentiment.polarity);
        rec.push("comment_text_subjectivity", self.sentiment.subjectivity);
        rec.push("comment_spelling_error_count", self.spelling.error_count);
        rec.push("meta_comment_spelling_errors", self.spelling.errors.clone());
        rec.push("comment_url_refer_count", self.url_count);
        rec.push("comment_text_profanity", self.profane);
        rec.push("comment_has_citation", self.has_citation);
        rec.push("comment_has_user_ref", self.has_user_ref);
        rec.push("comment_char_count", self.char_count);
    }
}

pub struct TextFeatureExtractor {
    services: TextServices,
    excluded: ExclusionWordlist,
}

impl TextFeatureExtractor {
    pub fn new(services: TextServices, excluded: ExclusionWordlist) -> Self {
        Self { services, excluded }
    }

    /// All text features for `body`. Any service failure fails the whole record.
    pub fn extract(&self, body: &str) -> Result<TextFeatures> {
        let sentiment = self.services.sentiment.sentiment_of(body).context("sentiment service")?;
        let spelling = self.spelling(body)?;
        let profane = self.services.profanity.is_profane(body).context("profanity classifier")?;
        Ok(TextFeatures {
            sentiment,
            spelling,
            url_count: url_count(body),
            profane,
            has_citation: body.contains('>'),
            has_user_ref: body.contains(" u/"),
            char_count: body.chars().count(),
        })
    }

    /// A candidate is a mistake unless the checker knows it or it contains an excluded term.
    pub fn spelling(&self, body: &str) -> Result<SpellingFeatures> {
        let candidates = spelling_candidates(body);
        if candidates.is_empty() {
            return Ok(SpellingFeatures::default());
        }
        let words: Vec<&str> = candidates.iter().map(String::as_str).collect();
        let unknown = self.services.spelling.unknown_words(&words).context("spell checker")?;
        let errors: Vec<String> = candidates
            .into_iter()
            .filter(|w| unknown.contains(w) && !self.excluded.excludes(w))
            .collect();
        Ok(SpellingFeatures { error_count: errors.len(), errors })
    }
}
