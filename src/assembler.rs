//! Orchestration for one post: load frames, compute user and post features, merge
//! them back onto their source rows, propagate user features onto replies, validate
//! and persist.
//!
//! Every merge is followed by `check_merge`; a violation aborts the run. Row-level
//! text failures and authors without a user record are reported and their rows left
//! out.

use crate::config::{ExclusionWordlist, FeatureOptions, VenueCategories};
use crate::error::{MergeInvariantViolation, MissingUsers, RowFailure, StructuralAnomaly};
use crate::post_features::PostFeatureBuilder;
use crate::progress::maybe_count_progress;
use crate::records::UserRecord;
use crate::services::{PostSource, TextServices};
use crate::store::{JsonlStore, TableStore};
use crate::table::{check_merge, key_string, FeatureRecord, Table};
use crate::text::TextFeatureExtractor;
use crate::thread::ThreadIndex;
use crate::user_features::UserFeatureBuilder;
use crate::util::{init_tracing_once, rfc3339_from_epoch};
use crate::venues::SubredditAggregator;
use ahash::AHashSet;
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Run stages, strictly in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    LoadUser,
    LoadComment,
    ComputeUserFeatures,
    ComputePostFeatures,
    MergeUser,
    MergePost,
    PropagateUserOntoPost,
    Validate,
    Persist,
    Done,
}

impl Stage {
    pub fn next(self) -> Option<Stage> {
        use Stage::*;
        Some(match self {
            LoadUser => LoadComment,
            LoadComment => ComputeUserFeatures,
            ComputeUserFeatures => ComputePostFeatures,
            ComputePostFeatures => MergeUser,
            MergeUser => MergePost,
            MergePost => PropagateUserOntoPost,
            PropagateUserOntoPost => Validate,
            Validate => Persist,
            Persist => Done,
            Done => return None,
        })
    }
}

/// Outcome of one successful run.
#[derive(Clone, Debug)]
pub struct AssemblyReport {
    pub post_id: String,
    pub rows: usize,
    pub columns: usize,
    pub missing_users: MissingUsers,
    pub failed_rows: Vec<RowFailure>,
    pub anomalies: Vec<StructuralAnomaly>,
    /// Comment records dropped on load because their body was null.
    pub dropped_without_body: usize,
    /// Rows removed by the final `comment_id` dedup.
    pub duplicates_removed: usize,
    pub output: PathBuf,
}

struct Progress<'a> {
    post_id: &'a str,
    stage: Stage,
}

impl Progress<'_> {
    fn advance(&mut self, to: Stage) {
        debug_assert_eq!(self.stage.next(), Some(to), "stage order");
        self.stage = to;
        tracing::debug!(post_id = self.post_id, stage = ?to, "stage");
    }
}

const TIMESTAMP_COLUMNS: &[&str] = &["comment_created_utc", "user_account_creation_utc"];

pub struct DatasetAssembler<S: TableStore = JsonlStore> {
    opts: FeatureOptions,
    store: S,
    text: TextFeatureExtractor,
    aggregator: SubredditAggregator,
    posts: Arc<dyn PostSource>,
}

impl DatasetAssembler<JsonlStore> {
    /// Load the exclusion wordlist and venue categories named by `opts` and store frames
    /// under its data directory.
    pub fn from_options(opts: FeatureOptions, services: TextServices, posts: Arc<dyn PostSource>) -> Result<Self> {
        let excluded = ExclusionWordlist::load(&opts.exclusion_wordlist)?;
        let categories = VenueCategories::load(&opts.categories_path)?;
        tracing::info!(
            excluded = excluded.len(),
            categories = categories.len(),
            "loaded feature configuration"
        );
        let aggregator = SubredditAggregator::new(categories, opts.named_venues.clone());
        let store = JsonlStore::new(&opts);
        Ok(Self::new(opts, store, TextFeatureExtractor::new(services, excluded), aggregator, posts))
    }
}

impl<S: TableStore> DatasetAssembler<S> {
    pub fn new(
        opts: FeatureOptions,
        store: S,
        text: TextFeatureExtractor,
        aggregator: SubredditAggregator,
        posts: Arc<dyn PostSource>,
    ) -> Self {
        Self { opts, store, text, aggregator, posts }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Build and persist the joined feature dataset for `post_id`.
    pub fn run(&self, post_id: &str) -> Result<AssemblyReport> {
        init_tracing_once();
        if let Some(n) = self.opts.parallelism.filter(|n| *n > 0) {
            // Only the first call configures the global pool; later ones are ignored.
            rayon::ThreadPoolBuilder::new().num_threads(n).build_global().ok();
        }

        let mut progress = Progress { post_id, stage: Stage::LoadUser };

        let users = self.store.load_users(post_id).with_context(|| format!("load users for {post_id}"))?;

        progress.advance(Stage::LoadComment);
        let mut comments = self.store.load_comments(post_id).with_context(|| format!("load comments for {post_id}"))?;
        let before = comments.len();
        comments.retain(|c| c.body.is_some());
        let dropped_without_body = before - comments.len();
        tracing::info!(post_id, users = users.len(), comments = comments.len(), dropped_without_body, "frames loaded");

        let index = ThreadIndex::new(post_id, comments);
        let post_builder = PostFeatureBuilder::new(&index, &self.text, self.posts.as_ref())?;
        let user_builder = UserFeatureBuilder::new(&self.aggregator, post_builder.post_created_utc());

        progress.advance(Stage::ComputeUserFeatures);
        let pb = maybe_count_progress(self.opts.progress, users.len(), "User features");
        let user_features: Vec<FeatureRecord> = users
            .par_iter()
            .map(|u| {
                let rec = user_builder.build_for(u);
                if let Some(pb) = &pb { pb.inc(1); }
                rec
            })
            .collect();
        if let Some(pb) = pb { pb.finish_with_message("User features done"); }

        progress.advance(Stage::ComputePostFeatures);
        let top_level = index.top_level_replies();
        let pb = maybe_count_progress(self.opts.progress, top_level.len(), "Post features");
        let outcomes: Vec<Result<FeatureRecord, RowFailure>> = top_level
            .par_iter()
            .map(|reply| {
                let out = post_builder.build_for(reply);
                if let Some(pb) = &pb { pb.inc(1); }
                out
            })
            .collect();
        if let Some(pb) = pb { pb.finish_with_message("Post features done"); }

        let mut top_rows = Vec::with_capacity(top_level.len());
        let mut post_features = Vec::with_capacity(top_level.len());
        let mut failed_rows = Vec::new();
        for (reply, outcome) in top_level.iter().zip(outcomes) {
            match outcome {
                Ok(rec) => {
                    top_rows.push(reply.to_feature_record());
                    post_features.push(rec);
                }
                Err(f) => failed_rows.push(f),
            }
        }
        if !failed_rows.is_empty() {
            tracing::warn!(post_id, failed = failed_rows.len(), "top-level replies dropped after text feature failures");
        }

        progress.advance(Stage::MergeUser);
        let mut user_table = Table::from_records(users.iter().map(UserRecord::to_feature_record));
        user_table.ensure_column("author");
        user_table.ensure_unique_key("MergeUser", "author")?;
        let mut user_feature_table = Table::from_records(user_features);
        user_feature_table.ensure_column("author");
        let user_merged = user_table.merge(&user_feature_table, "author")?;
        check_merge("MergeUser", &user_table, &user_merged)?;

        progress.advance(Stage::MergePost);
        let mut top_table = Table::from_records(top_rows);
        top_table.ensure_column("comment_id");
        let mut post_feature_table = Table::from_records(post_features);
        post_feature_table.ensure_column("comment_id");
        let mut post_merged = top_table.merge(&post_feature_table, "comment_id")?;
        check_merge("MergePost", &top_table, &post_merged)?;

        progress.advance(Stage::PropagateUserOntoPost);
        post_merged.ensure_column("author");
        let missing_users = exclude_missing_users(&mut post_merged, &user_merged)?;
        if missing_users.count() > 0 {
            tracing::info!(
                post_id,
                missing = missing_users.count(),
                rows_excluded = missing_users.rows_excluded,
                "authors not found in user frame (deleted or suspended accounts); their replies are excluded"
            );
        }
        let mut joined = post_merged.merge(&user_merged, "author")?;
        check_merge("PropagateUserOntoPost", &post_merged, &joined)?;

        progress.advance(Stage::Validate);
        let duplicates_removed = joined.dedup_by("comment_id")?;
        if duplicates_removed > 0 {
            tracing::warn!(post_id, duplicates_removed, "duplicate comment_id rows removed from joined dataset");
        }
        if let Some(column) = joined.duplicate_column() {
            return Err(MergeInvariantViolation::DuplicateColumn {
                stage: "Validate",
                column: column.to_string(),
                rows: joined.len(),
            }
            .into());
        }

        progress.advance(Stage::Persist);
        if self.opts.human_readable_timestamps {
            for col in TIMESTAMP_COLUMNS {
                joined.map_column(col, |v| v.as_i64().and_then(rfc3339_from_epoch).map(Value::String));
            }
        }
        let output = self.store.store_dataset(post_id, &joined).with_context(|| format!("persist dataset for {post_id}"))?;

        progress.advance(Stage::Done);
        tracing::info!(post_id, rows = joined.len(), columns = joined.columns().len(), path = %output.display(), "dataset written");

        Ok(AssemblyReport {
            post_id: post_id.to_string(),
            rows: joined.len(),
            columns: joined.columns().len(),
            missing_users,
            failed_rows,
            anomalies: index.anomalies().to_vec(),
            dropped_without_body,
            duplicates_removed,
            output,
        })
    }
}

/// Drop reply rows whose author has no user row. Returns the distinct missing authors.
fn exclude_missing_users(posts: &mut Table, users: &Table) -> Result<MissingUsers> {
    let known: AHashSet<String> = users.column_values("author")?.filter_map(key_string).collect();
    let is_known = |v: &Value| key_string(v).is_some_and(|k| known.contains(&k));

    let authors: BTreeSet<Option<String>> =
        posts.column_values("author")?.filter(|v| !is_known(*v)).map(key_string).collect();
    let rows_excluded = posts.retain_by("author", is_known)?;
    Ok(MissingUsers { authors: authors.into_iter().collect(), rows_excluded })
}
