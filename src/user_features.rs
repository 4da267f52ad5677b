use crate::records::UserRecord;
use crate::table::FeatureRecord;
use crate::venues::SubredditAggregator;

/// Per-user features relative to one post's creation time.
pub struct UserFeatureBuilder<'a> {
    aggregator: &'a SubredditAggregator,
    post_created_utc: i64,
}

impl<'a> UserFeatureBuilder<'a> {
    pub fn new(aggregator: &'a SubredditAggregator, post_created_utc: i64) -> Self {
        Self { aggregator, post_created_utc }
    }

    /// Venue totals, account age at post time (negative when the account is newer than
    /// the post) and the `author` key.
    pub fn build_for(&self, user: &UserRecord) -> FeatureRecord {
        let mut rec = self.aggregator.features(&user.venues);
        rec.push("user_account_age_seconds", self.post_created_utc - user.account_created_utc);
        rec.push("author", user.author.as_str());
        rec
    }
}
