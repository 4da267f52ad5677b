#![allow(dead_code)]

use anyhow::{bail, Result};
use serde_json::{json, Value};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use threadfeat::{
    DatasetAssembler, DictionarySpellChecker, FeatureOptions, JsonlPostSource, LexiconSentiment, Sentiment,
    SentimentAnalyzer, TextServices, WordlistProfanity,
};

pub const POST_ID: &str = "p1";
pub const POST_CREATED: i64 = 1_000;

/// Body marker that makes `FlakySentiment` fail.
pub const FAIL_MARKER: &str = "FAILME";

/// Lexicon sentiment that errors on any body containing `FAIL_MARKER`, standing in for a
/// remote service timing out on one row.
pub struct FlakySentiment(pub LexiconSentiment);

impl SentimentAnalyzer for FlakySentiment {
    fn sentiment_of(&self, text: &str) -> Result<Sentiment> {
        if text.contains(FAIL_MARKER) {
            bail!("sentiment service timed out");
        }
        self.0.sentiment_of(text)
    }
}

pub const DICTIONARY: &[&str] = &[
    "i", "love", "this", "great", "post", "about", "ok", "hello", "gone", "agree", "see", "reply", "deeper",
    "failme", "fine",
];

pub fn test_services() -> TextServices {
    TextServices::new(
        FlakySentiment(LexiconSentiment::default()),
        DictionarySpellChecker::from_words(DICTIONARY),
        WordlistProfanity::from_terms(["darn"]),
    )
}

pub fn write_jsonl(path: &Path, rows: &[Value]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut f = File::create(path).unwrap();
    for r in rows {
        writeln!(&mut f, "{}", r).unwrap();
    }
}

/// Read a JSONL file into a vector of `serde_json::Value` (skips empty lines).
pub fn read_jsonl_values(path: &Path) -> Vec<Value> {
    let f = File::open(path).unwrap();
    BufReader::new(f)
        .lines()
        .map(|l| l.unwrap())
        .filter(|s| !s.is_empty())
        .map(|s| serde_json::from_str(&s).unwrap())
        .collect()
}

/// Decompress a `.zst` file and parse every line.
pub fn read_zst_values(path: &Path) -> Vec<Value> {
    let f = File::open(path).unwrap();
    let dec = zstd::stream::read::Decoder::new(f).unwrap();
    BufReader::new(dec)
        .lines()
        .map(|l| l.unwrap())
        .filter(|s| !s.is_empty())
        .map(|s| serde_json::from_str(&s).unwrap())
        .collect()
}

pub fn comment(id: &str, parent: &str, author: Option<&str>, body: Option<&str>, created: i64) -> Value {
    json!({
        "comment_id": id, "parent_id": parent, "post_id": POST_ID,
        "author": author, "body": body, "score": 1,
        "comment_created_utc": created, "is_submitter": false, "golds": 0, "edited": false
    })
}

/// A small thread for post `p1` (created at t=1000):
/// - c1 alice (top level) -> c2 bob -> c3 alice
/// - c4 bob (top level, hidden score)
/// - c5 ghost (top level, no user record)
/// - c6 author deleted (top level)
/// - c7 carol (top level, body trips the sentiment service)
/// - c8 alice (top level, null body: dropped on load)
///
/// Users: alice (created t=500), bob (created t=2000, after the post), carol.
pub fn comment_rows() -> Vec<Value> {
    let mut c4 = comment("c4", "t3_p1", Some("bob"), Some("ok fine"), 1_400);
    c4["score"] = json!(-0.9);
    vec![
        comment("c1", "t3_p1", Some("alice"), Some("I love this graet post about muellers http://example.com/a"), 1_100),
        comment("c2", "t1_c1", Some("bob"), Some("> I love this\nagree"), 1_200),
        comment("c3", "t1_c2", Some("alice"), Some("see reply deeper"), 1_300),
        c4,
        comment("c5", "t3_p1", Some("ghost"), Some("hello"), 1_500),
        comment("c6", "t3_p1", None, Some("gone"), 1_600),
        comment("c7", "t3_p1", Some("carol"), Some("FAILME"), 1_700),
        comment("c8", "t3_p1", Some("alice"), None, 1_800),
    ]
}

pub fn user_rows() -> Vec<Value> {
    vec![
        json!({
            "author": "alice", "user_account_creation_utc": 500,
            "user_total_post_karma": 10, "user_total_comment_karma": 20, "user_email_verified": true,
            "user_total_post_count": 5, "user_total_comment_count": null,
            "subreddit_post_count": {"Democrats": 2, "politics": 3},
            "subreddit_post_karma": {"democrats": 7},
            "subreddit_comment_count": {"Conservative": 1, "News": 4},
            "subreddit_comment_karma": {}
        }),
        json!({
            "author": "bob", "user_account_creation_utc": 2_000,
            "subreddit_post_count": {}, "subreddit_post_karma": {},
            "subreddit_comment_count": {"NeutralPolitics": 6}, "subreddit_comment_karma": {"neutralpolitics": -2}
        }),
        json!({
            "author": "carol", "user_account_creation_utc": 900,
            "subreddit_post_count": {}, "subreddit_post_karma": {},
            "subreddit_comment_count": {}, "subreddit_comment_karma": {}
        }),
    ]
}

/// Lay out frames, exclusion wordlist and category table for `p1` under a fresh temp dir.
pub fn make_data_dir(comments: &[Value], users: &[Value]) -> PathBuf {
    let base = tempfile::tempdir().unwrap().into_path();
    write_jsonl(&base.join("comment_frame").join(format!("{POST_ID}_comment_frame.jsonl")), comments);
    write_jsonl(&base.join("user_frame").join(format!("{POST_ID}_user_frame.jsonl")), users);
    fs::write(base.join("known_spellings.txt"), "mueller\ntrump\n\n").unwrap();
    fs::write(
        base.join("partisan_resource.json"),
        json!({
            "left_leaning": ["democrats"],
            "right_leaning": ["Conservative"],
            "centrist": ["neutralpolitics"]
        })
        .to_string(),
    )
    .unwrap();
    base
}

pub fn make_data_dir_basic() -> PathBuf {
    make_data_dir(&comment_rows(), &user_rows())
}

pub fn test_options(base: &Path) -> FeatureOptions {
    FeatureOptions::default().with_data_dir(base).with_progress(false)
}

pub fn post_source() -> Arc<JsonlPostSource> {
    Arc::new(JsonlPostSource::from_pairs([(POST_ID.to_string(), POST_CREATED)]))
}

pub fn assembler(opts: FeatureOptions) -> DatasetAssembler {
    DatasetAssembler::from_options(opts, test_services(), post_source()).unwrap()
}

/// Row of `rows` whose `comment_id` is `id`.
pub fn row<'a>(rows: &'a [Value], id: &str) -> &'a Value {
    rows.iter()
        .find(|r| r["comment_id"] == id)
        .unwrap_or_else(|| panic!("no row for {id}"))
}
