//! Input records produced by the acquisition pipeline: one row per reply, one row per participant.

use crate::table::FeatureRecord;
use crate::venues::VenueCounters;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Score value the acquisition frames use for "hidden by platform".
pub const SCORE_HIDDEN: f64 = -0.9;

/// Comment score; the platform hides scores on young comments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Score {
    Visible(i64),
    #[default]
    Hidden,
}

impl Score {
    pub fn visible(self) -> Option<i64> {
        match self {
            Score::Visible(n) => Some(n),
            Score::Hidden => None,
        }
    }

    fn to_value(self) -> Value {
        match self {
            Score::Visible(n) => Value::from(n),
            Score::Hidden => Value::from(SCORE_HIDDEN),
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Score::Visible(n) => s.serialize_i64(*n),
            Score::Hidden => s.serialize_f64(SCORE_HIDDEN),
        }
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        // Integers arrive as whole floats; the sentinel (and null) never is one.
        let raw = Option::<f64>::deserialize(d)?;
        Ok(match raw {
            Some(v) if v.fract() == 0.0 && v.is_finite() => Score::Visible(v as i64),
            _ => Score::Hidden,
        })
    }
}

/// Epoch seconds stored either as an integer or as a whole float (`1553212345.0`).
pub(crate) fn epoch_seconds<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
    }
    match Raw::deserialize(d)? {
        Raw::Int(n) => Ok(n),
        Raw::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15 => Ok(v as i64),
        Raw::Float(v) => Err(serde::de::Error::custom(format!("expected whole epoch seconds, got {v}"))),
    }
}

/// One reply in a thread.
///
/// `author`: `None` means the author deleted the reply, `Some("")` means a moderator removed it.
/// `parent_id` is either the post id or another comment id, optionally carrying the
/// platform kind prefix (`t3_` / `t1_`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub comment_id: String,
    pub parent_id: String,
    pub post_id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub score: Score,
    #[serde(rename = "comment_created_utc", deserialize_with = "epoch_seconds")]
    pub created_utc: i64,
    #[serde(default)]
    pub is_submitter: bool,
    #[serde(default, rename = "golds")]
    pub gilded_count: i64,
    #[serde(default)]
    pub edited: bool,
}

impl CommentRecord {
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }

    /// Body replaced by the platform after a moderator removal.
    pub fn removed_by_mods(&self) -> bool {
        self.body_text().to_lowercase().contains("removed")
    }

    /// Body replaced by the platform after the author deleted it.
    pub fn deleted(&self) -> bool {
        self.body_text().to_lowercase().contains("deleted")
    }

    /// Source columns carried into the joined dataset.
    pub fn to_feature_record(&self) -> FeatureRecord {
        let mut rec = FeatureRecord::new();
        rec.push("comment_id", self.comment_id.as_str());
        rec.push("parent_id", self.parent_id.as_str());
        rec.push("post_id", self.post_id.as_str());
        rec.push("author", self.author.clone());
        rec.push("body", self.body.clone());
        rec.push("score", self.score.to_value());
        rec.push("comment_created_utc", self.created_utc);
        rec.push("is_submitter", self.is_submitter);
        rec.push("golds", self.gilded_count);
        rec.push("edited", self.edited);
        rec.push("comment_removed_by_mods", self.removed_by_mods());
        rec.push("comment_deleted", self.deleted());
        rec
    }
}

/// One participant's platform history as of acquisition time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub author: String,
    #[serde(rename = "user_account_creation_utc", deserialize_with = "epoch_seconds")]
    pub account_created_utc: i64,
    #[serde(default, rename = "user_total_post_karma")]
    pub total_post_karma: i64,
    #[serde(default, rename = "user_total_comment_karma")]
    pub total_comment_karma: i64,
    #[serde(default, rename = "user_email_verified")]
    pub email_verified: bool,
    #[serde(default, rename = "user_total_post_count")]
    pub total_post_count: Option<i64>,
    #[serde(default, rename = "user_total_comment_count")]
    pub total_comment_count: Option<i64>,
    #[serde(flatten)]
    pub venues: VenueCounters,
}

impl UserRecord {
    pub fn to_feature_record(&self) -> FeatureRecord {
        let mut rec = FeatureRecord::new();
        rec.push("author", self.author.as_str());
        rec.push("user_account_creation_utc", self.account_created_utc);
        rec.push("user_total_post_karma", self.total_post_karma);
        rec.push("user_total_comment_karma", self.total_comment_karma);
        rec.push("user_email_verified", self.email_verified);
        rec.push("user_total_post_count", self.total_post_count);
        rec.push("user_total_comment_count", self.total_comment_count);
        rec.push("subreddit_post_count", self.venues.post_count.to_value());
        rec.push("subreddit_post_karma", self.venues.post_karma.to_value());
        rec.push("subreddit_comment_count", self.venues.comment_count.to_value());
        rec.push("subreddit_comment_karma", self.venues.comment_karma.to_value());
        rec
    }
}
