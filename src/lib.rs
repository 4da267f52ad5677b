mod config;
mod error;
mod records;
mod table;
mod util;
mod ndjson;
mod progress;

mod thread;
mod text;
mod services;
mod venues;
mod network;
mod user_features;
mod post_features;

mod store;
mod assembler;

pub use crate::config::{ExclusionWordlist, FeatureOptions, OutputFormat, VenueCategories};
pub use crate::error::{MergeInvariantViolation, MissingUsers, RowFailure, StructuralAnomaly};
pub use crate::records::{CommentRecord, Score, UserRecord, SCORE_HIDDEN};
pub use crate::table::{check_merge, FeatureRecord, Table};

// Tree reconstruction and per-row feature builders.
pub use crate::thread::{bare_id, ThreadIndex};
pub use crate::text::{is_url_shaped, remove_urls, spelling_candidates, url_count, SpellingFeatures, TextFeatureExtractor, TextFeatures};
pub use crate::venues::{category_label, SubredditAggregator, VenueCounters, VenueCounts, VenueTotals};
pub use crate::network::{NetworkFeatureBuilder, NetworkFeatures};
pub use crate::user_features::UserFeatureBuilder;
pub use crate::post_features::PostFeatureBuilder;

// Collaborator contracts plus the offline implementations used by the binary.
pub use crate::services::{
    DictionarySpellChecker, JsonlPostSource, LexiconSentiment, PostSource, ProfanityClassifier, Sentiment,
    SentimentAnalyzer, SpellChecker, TextServices, WordlistProfanity,
};

// Frame storage and orchestration.
pub use crate::store::{discover_post_ids, JsonlStore, TableStore};
pub use crate::assembler::{AssemblyReport, DatasetAssembler, Stage};

pub use crate::util::init_tracing_once;
