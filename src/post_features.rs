use crate::error::RowFailure;
use crate::network::NetworkFeatureBuilder;
use crate::records::CommentRecord;
use crate::services::PostSource;
use crate::table::FeatureRecord;
use crate::text::TextFeatureExtractor;
use crate::thread::ThreadIndex;
use anyhow::{Context, Result};

/// Per-top-level-reply features: network + text + time since the post went up.
pub struct PostFeatureBuilder<'a> {
    network: NetworkFeatureBuilder<'a>,
    text: &'a TextFeatureExtractor,
    post_created_utc: i64,
}

impl<'a> PostFeatureBuilder<'a> {
    /// Fetches the post's creation time once; it is reused for every row.
    pub fn new(index: &'a ThreadIndex, text: &'a TextFeatureExtractor, posts: &dyn PostSource) -> Result<Self> {
        let post_created_utc = posts
            .fetch_post_creation_time(index.post_id())
            .with_context(|| format!("creation time of post {}", index.post_id()))?;
        Ok(Self { network: NetworkFeatureBuilder::new(index), text, post_created_utc })
    }

    pub fn post_created_utc(&self) -> i64 {
        self.post_created_utc
    }

    /// Build the row for one top-level reply. A text-feature failure is logged and
    /// returned as a `RowFailure`; the caller drops the row.
    pub fn build_for(&self, reply: &CommentRecord) -> Result<FeatureRecord, RowFailure> {
        let text = self.text.extract(reply.body_text()).map_err(|e| {
            tracing::warn!(comment_id = %reply.comment_id, error = %format!("{e:#}"), "text features failed; dropping row");
            RowFailure::new(reply.comment_id.as_str(), &e)
        })?;

        let mut rec = FeatureRecord::new();
        self.network.features_for(reply).push_features(&mut rec);
        text.push_features(&mut rec);
        rec.push("comment_id", reply.comment_id.as_str());
        rec.push("post_comment_timedelta_seconds", reply.created_utc - self.post_created_utc);
        Ok(rec)
    }
}
