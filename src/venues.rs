//! Per-venue (subreddit) counters and their aggregation into category totals.
//!
//! Venue names are matched case-insensitively: keys are lower-cased on every insert
//! and every lookup, and a missing venue counts as zero.

use crate::config::VenueCategories;
use crate::table::FeatureRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Venue name -> count (or karma sum), keyed case-insensitively.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, i64>", into = "BTreeMap<String, i64>")]
pub struct VenueCounts(BTreeMap<String, i64>);

impl VenueCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value for `venue`, replacing any value stored under another casing.
    pub fn insert(&mut self, venue: &str, value: i64) {
        self.0.insert(venue.to_lowercase(), value);
    }

    pub fn get(&self, venue: &str) -> i64 {
        self.0.get(&venue.to_lowercase()).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn to_value(&self) -> Value {
        Value::Object(self.0.iter().map(|(k, v)| (k.clone(), Value::from(*v))).collect())
    }
}

impl From<HashMap<String, i64>> for VenueCounts {
    fn from(raw: HashMap<String, i64>) -> Self {
        raw.into_iter().collect()
    }
}

impl From<VenueCounts> for BTreeMap<String, i64> {
    fn from(c: VenueCounts) -> Self {
        c.0
    }
}

impl<S: AsRef<str>> FromIterator<(S, i64)> for VenueCounts {
    fn from_iter<I: IntoIterator<Item = (S, i64)>>(iter: I) -> Self {
        let mut out = VenueCounts::new();
        for (k, v) in iter {
            out.insert(k.as_ref(), v);
        }
        out
    }
}

/// The four per-venue mappings kept for every user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueCounters {
    #[serde(default, rename = "subreddit_post_count")]
    pub post_count: VenueCounts,
    #[serde(default, rename = "subreddit_post_karma")]
    pub post_karma: VenueCounts,
    #[serde(default, rename = "subreddit_comment_count")]
    pub comment_count: VenueCounts,
    #[serde(default, rename = "subreddit_comment_karma")]
    pub comment_karma: VenueCounts,
}

impl VenueCounters {
    /// Sum all four counters over `venues`.
    pub fn aggregate<S: AsRef<str>>(&self, venues: &[S]) -> VenueTotals {
        venues.iter().fold(VenueTotals::default(), |mut t, venue| {
            let venue = venue.as_ref();
            t.post_count += self.post_count.get(venue);
            t.post_karma += self.post_karma.get(venue);
            t.comment_count += self.comment_count.get(venue);
            t.comment_karma += self.comment_karma.get(venue);
            t
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VenueTotals {
    pub post_count: i64,
    pub post_karma: i64,
    pub comment_count: i64,
    pub comment_karma: i64,
}

impl VenueTotals {
    /// Emit `{label}_subreddit_{post|comment}_{count|karma}`. Downstream models depend on these names.
    pub fn push_features(&self, label: &str, rec: &mut FeatureRecord) {
        rec.push(format!("{label}_subreddit_post_count"), self.post_count);
        rec.push(format!("{label}_subreddit_post_karma"), self.post_karma);
        rec.push(format!("{label}_subreddit_comment_count"), self.comment_count);
        rec.push(format!("{label}_subreddit_comment_karma"), self.comment_karma);
    }
}

/// Short feature label for a category key of the membership table.
pub fn category_label(category: &str) -> &str {
    match category {
        "left_leaning" => "left",
        "right_leaning" => "right",
        "centrist" => "center",
        other => other,
    }
}

/// Turns a user's venue counters into category and named-venue totals.
#[derive(Clone, Debug)]
pub struct SubredditAggregator {
    categories: VenueCategories,
    named_venues: Vec<String>,
}

impl SubredditAggregator {
    pub fn new(categories: VenueCategories, named_venues: Vec<String>) -> Self {
        let named_venues = named_venues.into_iter().map(|v| v.trim().to_lowercase()).collect();
        Self { categories, named_venues }
    }

    pub fn aggregate<S: AsRef<str>>(&self, counters: &VenueCounters, venues: &[S]) -> VenueTotals {
        counters.aggregate(venues)
    }

    /// Totals for every configured category, then for every named venue.
    pub fn features(&self, counters: &VenueCounters) -> FeatureRecord {
        let mut rec = FeatureRecord::new();
        for (category, venues) in self.categories.iter() {
            counters.aggregate(venues).push_features(category_label(category), &mut rec);
        }
        for venue in &self.named_venues {
            counters.aggregate(&[venue]).push_features(venue, &mut rec);
        }
        rec
    }
}
