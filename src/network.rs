//! Structural features of a reply thread and of one author's participation in the post.

use crate::records::CommentRecord;
use crate::table::FeatureRecord;
use crate::thread::ThreadIndex;

/// Authors compare equal only when both are present; an author-deleted reply
/// (`None`) matches nothing, itself included.
#[inline]
fn same_author(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetworkFeatures {
    /// Top-level replies in the whole post written by this reply's author.
    ///
    /// The name suggests a per-thread count but the value is post-wide; kept as-is for
    /// compatibility with models trained on it until the product owner rules on it.
    pub thread_top_level_count: usize,
    /// Same post-wide count under the column name earlier datasets used for it.
    pub user_top_level_count: usize,
    /// Direct replies to this top-level reply.
    pub thread_direct_reply_count: usize,
    pub thread_max_depth: usize,
    pub thread_size: usize,
    /// Replies by this author anywhere below this top-level reply.
    pub user_thread_comment_count: usize,
    /// Replies by this author anywhere in the post.
    pub user_total_comment_count: usize,
}

impl NetworkFeatures {
    pub fn push_features(&self, rec: &mut FeatureRecord) {
        rec.push("network_comment_thread_top_level_count", self.thread_top_level_count);
        rec.push("network_user_top_level_comment_count", self.user_top_level_count);
        rec.push("network_comment_thread_direct_reply_count", self.thread_direct_reply_count);
        rec.push("network_comment_thread_max_depth", self.thread_max_depth);
        rec.push("network_comment_thread_size", self.thread_size);
        rec.push("network_user_thread_comment_count", self.user_thread_comment_count);
        rec.push("network_user_total_comment_count", self.user_total_comment_count);
    }
}

pub struct NetworkFeatureBuilder<'a> {
    index: &'a ThreadIndex,
}

impl<'a> NetworkFeatureBuilder<'a> {
    pub fn new(index: &'a ThreadIndex) -> Self {
        Self { index }
    }

    pub fn top_level_count_by(&self, author: Option<&str>) -> usize {
        self.index.top_level_replies().into_iter().filter(|r| same_author(r.author(), author)).count()
    }

    pub fn thread_max_depth(&self, comment_id: &str) -> usize {
        self.index.max_depth_under(comment_id)
    }

    pub fn thread_size(&self, comment_id: &str) -> usize {
        self.index.descendants_of(comment_id).len()
    }

    pub fn user_thread_count(&self, author: Option<&str>, comment_id: &str) -> usize {
        self.index.descendants_of(comment_id).into_iter().filter(|r| same_author(r.author(), author)).count()
    }

    pub fn user_total_count(&self, author: Option<&str>) -> usize {
        self.index.records().iter().filter(|r| same_author(r.author(), author)).count()
    }

    pub fn features_for(&self, reply: &CommentRecord) -> NetworkFeatures {
        let author = reply.author();
        let id = reply.comment_id.as_str();
        let descendants = self.index.descendants_of(id);
        let top_level = self.top_level_count_by(author);
        NetworkFeatures {
            thread_top_level_count: top_level,
            user_top_level_count: top_level,
            thread_direct_reply_count: self.index.replies_to(id).len(),
            thread_max_depth: self.thread_max_depth(id),
            thread_size: descendants.len(),
            user_thread_comment_count: descendants.iter().filter(|r| same_author(r.author(), author)).count(),
            user_total_comment_count: self.user_total_count(author),
        }
    }
}
