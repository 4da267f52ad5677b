#[path = "common/mod.rs"]
mod common;

use common::*;
use serde_json::json;
use threadfeat::{discover_post_ids, MergeInvariantViolation, OutputFormat, Stage, StructuralAnomaly};

/// Full run over the basic fixture:
/// 1) c8 has no body and is dropped on load.
/// 2) c7 trips the sentiment service; its row is reported and left out.
/// 3) ghost has no user record and c6 has a deleted author; both rows are excluded.
/// 4) c1 and c4 survive with network, text, post and user features joined on.
#[test]
fn run_joins_features_onto_surviving_replies() {
    let base = make_data_dir_basic();
    let asm = assembler(test_options(&base));
    let report = asm.run(POST_ID).unwrap();

    assert_eq!(report.rows, 2);
    assert_eq!(report.dropped_without_body, 1);
    assert_eq!(report.duplicates_removed, 0);
    assert!(report.anomalies.is_empty());

    assert_eq!(report.failed_rows.len(), 1);
    assert_eq!(report.failed_rows[0].key, "c7");
    assert!(report.failed_rows[0].reason.contains("timed out"));

    assert_eq!(report.missing_users.count(), 2);
    assert_eq!(report.missing_users.authors, vec![None, Some("ghost".to_string())]);
    assert_eq!(report.missing_users.rows_excluded, 2);

    assert_eq!(report.output, base.join("dataset").join("p1_dataset.jsonl"));
    let rows = read_jsonl_values(&report.output);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["comment_id"], "c1");
    assert_eq!(rows[1]["comment_id"], "c4");
    assert_eq!(rows[0].as_object().unwrap().len(), report.columns);

    let c1 = row(&rows, "c1");
    assert_eq!(c1["network_comment_thread_size"], 2);
    assert_eq!(c1["network_comment_thread_max_depth"], 2);
    assert_eq!(c1["network_comment_thread_direct_reply_count"], 1);
    assert_eq!(c1["network_comment_thread_top_level_count"], 1);
    assert_eq!(c1["network_user_top_level_comment_count"], 1);
    assert_eq!(c1["network_user_thread_comment_count"], 1);
    assert_eq!(c1["network_user_total_comment_count"], 2);
    assert_eq!(c1["comment_spelling_error_count"], 1);
    assert_eq!(c1["meta_comment_spelling_errors"], json!(["graet"]));
    assert_eq!(c1["comment_url_refer_count"], 1);
    assert_eq!(c1["comment_text_profanity"], false);
    assert_eq!(c1["post_comment_timedelta_seconds"], 100);
    assert_eq!(c1["user_account_age_seconds"], 500);
    assert_eq!(c1["left_subreddit_post_count"], 2);
    assert_eq!(c1["politics_subreddit_post_count"], 3);
    assert_eq!(c1["comment_created_utc"], 1_100);
    assert_eq!(c1["score"], 1);

    let c4 = row(&rows, "c4");
    assert_eq!(c4["network_comment_thread_size"], 0);
    assert_eq!(c4["network_comment_thread_max_depth"], 0);
    assert_eq!(c4["network_user_total_comment_count"], 2);
    assert_eq!(c4["user_account_age_seconds"], -1_000);
    assert_eq!(c4["center_subreddit_comment_karma"], -2);
    assert_eq!(c4["score"], json!(-0.9));
    assert_eq!(c4["author"], "bob");
}

/// One top-level reply with two direct children, one reply by an author with no user
/// record.
#[test]
fn two_children_and_one_missing_author() {
    let comments = vec![
        comment("t", "t3_p1", Some("alice"), Some("great post"), 1_010),
        comment("k1", "t1_t", Some("bob"), Some("agree"), 1_020),
        comment("k2", "t1_t", Some("carol"), Some("fine"), 1_030),
        comment("g", "t3_p1", Some("ghost"), Some("hello"), 1_040),
    ];
    let base = make_data_dir(&comments, &user_rows());
    let report = assembler(test_options(&base)).run(POST_ID).unwrap();

    assert_eq!(report.missing_users.count(), 1);
    assert_eq!(report.missing_users.authors, vec![Some("ghost".to_string())]);
    assert_eq!(report.rows, 1);

    let rows = read_jsonl_values(&report.output);
    assert_eq!(rows.len(), 1);
    assert!(rows.iter().all(|r| r["author"] != "ghost"));
    let t = row(&rows, "t");
    assert_eq!(t["network_comment_thread_size"], 2);
    assert_eq!(t["network_comment_thread_max_depth"], 1);
    assert_eq!(t["network_comment_thread_direct_reply_count"], 2);
    assert_eq!(t["network_comment_thread_top_level_count"], 1);
}

#[test]
fn compressed_output_with_readable_timestamps() {
    let base = make_data_dir_basic();
    let opts = test_options(&base).with_output_format(OutputFormat::Zst).with_human_timestamps(true);
    let report = assembler(opts).run(POST_ID).unwrap();

    assert_eq!(report.output, base.join("dataset").join("p1_dataset.jsonl.zst"));
    let rows = read_zst_values(&report.output);
    assert_eq!(rows.len(), 2);
    let c1 = row(&rows, "c1");
    assert_eq!(c1["comment_created_utc"], "1970-01-01T00:18:20Z");
    assert_eq!(c1["user_account_creation_utc"], "1970-01-01T00:08:20Z");
    // Only the raw timestamps are rewritten.
    assert_eq!(c1["post_comment_timedelta_seconds"], 100);
}

/// Two user records for the same author would fan out the user join; the run stops
/// before anything is written.
#[test]
fn duplicate_user_records_abort_the_run() {
    let mut users = user_rows();
    users.push(users[0].clone());
    let base = make_data_dir(&comment_rows(), &users);
    let err = assembler(test_options(&base)).run(POST_ID).unwrap_err();

    let violation = err.downcast_ref::<MergeInvariantViolation>().unwrap();
    assert!(matches!(violation, MergeInvariantViolation::DuplicateKey { key, matches: 2, .. } if key == "alice"));
    assert!(!base.join("dataset").join("p1_dataset.jsonl").exists());
}

/// A category sharing its label with a named venue would shadow one total with the
/// other; the user merge rejects it.
#[test]
fn colliding_feature_labels_abort_the_run() {
    let base = make_data_dir_basic();
    std::fs::write(
        base.join("partisan_resource.json"),
        json!({"left_leaning": ["democrats"], "politics": ["politics", "news"]}).to_string(),
    )
    .unwrap();
    let err = assembler(test_options(&base)).run(POST_ID).unwrap_err();

    let violation = err.downcast_ref::<MergeInvariantViolation>().unwrap();
    assert!(matches!(
        violation,
        MergeInvariantViolation::DuplicateColumn { stage: "MergeUser", column, .. } if column == "politics_subreddit_post_count"
    ));
    assert!(!base.join("dataset").join("p1_dataset.jsonl").exists());
}

#[test]
fn malformed_threads_still_produce_a_dataset() {
    let mut comments = comment_rows();
    comments.push(comment("c1", "t3_p1", Some("bob"), Some("duplicate id"), 2_000));
    comments.push(comment("o1", "t1_nowhere", Some("alice"), Some("orphan"), 2_100));
    let base = make_data_dir(&comments, &user_rows());
    let report = assembler(test_options(&base)).run(POST_ID).unwrap();

    assert_eq!(report.rows, 2);
    assert!(report.anomalies.contains(&StructuralAnomaly::DuplicateId { comment_id: "c1".into() }));
    assert!(report.anomalies.contains(&StructuralAnomaly::DanglingParent {
        comment_id: "o1".into(),
        parent_id: "nowhere".into()
    }));
    // The orphan counts toward alice's post-wide total only.
    let rows = read_jsonl_values(&report.output);
    assert_eq!(row(&rows, "c1")["network_user_total_comment_count"], 3);
    assert_eq!(row(&rows, "c1")["network_comment_thread_size"], 2);
}

#[test]
fn thread_without_replies_writes_an_empty_dataset() {
    let base = make_data_dir(&[], &user_rows());
    let report = assembler(test_options(&base)).run(POST_ID).unwrap();
    assert_eq!(report.rows, 0);
    assert!(report.output.exists());
    assert!(read_jsonl_values(&report.output).is_empty());
}

#[test]
fn unknown_post_fails_before_features() {
    let base = make_data_dir_basic();
    let other = base.join("comment_frame").join("p2_comment_frame.jsonl");
    std::fs::copy(base.join("comment_frame").join("p1_comment_frame.jsonl"), other).unwrap();
    std::fs::copy(
        base.join("user_frame").join("p1_user_frame.jsonl"),
        base.join("user_frame").join("p2_user_frame.jsonl"),
    )
    .unwrap();

    assert_eq!(discover_post_ids(&base), vec!["p1", "p2"]);
    let err = assembler(test_options(&base)).run("p2").unwrap_err();
    assert!(format!("{err:#}").contains("no creation time known for post p2"));
}

#[test]
fn stages_run_in_fixed_order() {
    let mut order = vec![Stage::LoadUser];
    while let Some(next) = order.last().and_then(|s| s.next()) {
        order.push(next);
    }
    assert_eq!(
        order,
        vec![
            Stage::LoadUser,
            Stage::LoadComment,
            Stage::ComputeUserFeatures,
            Stage::ComputePostFeatures,
            Stage::MergeUser,
            Stage::MergePost,
            Stage::PropagateUserOntoPost,
            Stage::Validate,
            Stage::Persist,
            Stage::Done,
        ]
    );
}
