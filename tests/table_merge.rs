use serde_json::{json, Value};
use threadfeat::{check_merge, FeatureRecord, MergeInvariantViolation, Table};

fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> Table {
    let mut t = Table::new(columns.iter().map(|c| c.to_string()).collect());
    for r in rows {
        t.push_row(r).unwrap();
    }
    t
}

#[test]
fn keyed_merge_appends_right_columns() {
    let left = table(&["id", "a"], vec![vec![json!("x"), json!(1)], vec![json!("y"), json!(2)]]);
    let right = table(&["b", "id"], vec![vec![json!(20), json!("y")], vec![json!(10), json!("x")]]);

    let merged = left.merge(&right, "id").unwrap();
    check_merge("test", &left, &merged).unwrap();
    assert_eq!(merged.columns(), &["id", "a", "b"]);
    assert_eq!(merged.value(0, "b"), Some(&json!(10)));
    assert_eq!(merged.value(1, "b"), Some(&json!(20)));
}

#[test]
fn unmatched_and_null_keys_drop_rows() {
    let left = table(&["id"], vec![vec![json!("x")], vec![Value::Null], vec![json!("z")]]);
    let right = table(&["id", "b"], vec![vec![json!("x"), json!(1)], vec![Value::Null, json!(2)]]);
    let merged = left.merge(&right, "id").unwrap();
    assert_eq!(merged.len(), 1);

    let err = check_merge("MergePost", &left, &merged).unwrap_err();
    assert_eq!(err, MergeInvariantViolation::RowCount { stage: "MergePost", before: 3, after: 1 });
}

#[test]
fn duplicate_right_keys_fan_out_and_are_caught() {
    let left = table(&["author"], vec![vec![json!("alice")]]);
    let right = table(&["author", "k"], vec![vec![json!("alice"), json!(1)], vec![json!("alice"), json!(2)]]);

    let merged = left.merge(&right, "author").unwrap();
    assert!(matches!(
        check_merge("MergeUser", &left, &merged),
        Err(MergeInvariantViolation::RowCount { before: 1, after: 2, .. })
    ));

    let err = right.ensure_unique_key("MergeUser", "author").unwrap_err();
    let violation = err.downcast_ref::<MergeInvariantViolation>().unwrap();
    assert_eq!(
        violation,
        &MergeInvariantViolation::DuplicateKey { stage: "MergeUser", key: "alice".into(), matches: 2 }
    );
}

#[test]
fn shadowed_columns_are_caught() {
    let left = table(&["id", "score"], vec![vec![json!(1), json!(5)]]);
    let right = table(&["id", "score"], vec![vec![json!(1), json!(7)]]);
    let merged = left.merge(&right, "id").unwrap();
    assert_eq!(merged.duplicate_column(), Some("score"));

    let err = check_merge("PropagateUserOntoPost", &left, &merged).unwrap_err();
    assert!(matches!(err, MergeInvariantViolation::DuplicateColumn { ref column, rows: 1, .. } if column == "score"));
    assert!(err.to_string().contains("PropagateUserOntoPost"));
}

#[test]
fn records_fill_missing_fields_with_null() {
    let mut a = FeatureRecord::new();
    a.push("id", "a");
    a.push("x", 1);
    let mut b = FeatureRecord::new();
    b.push("id", "b");
    b.push("y", true);

    let t = Table::from_records([a, b]);
    assert_eq!(t.columns(), &["id", "x", "y"]);
    assert_eq!(t.value(0, "y"), Some(&Value::Null));
    assert_eq!(t.value(1, "x"), Some(&Value::Null));

    let objects: Vec<_> = t.to_objects().collect();
    assert_eq!(Value::Object(objects[1].clone()), json!({"id": "b", "x": null, "y": true}));
}

/// A name emitted twice by one record keeps both values, each in its own column.
#[test]
fn repeated_field_in_one_record_stays_visible() {
    let mut a = FeatureRecord::new();
    a.push("author", "alice");
    a.push("politics_total", 4);
    a.push("politics_total", 0);
    let mut b = FeatureRecord::new();
    b.push("author", "bob");
    b.push("politics_total", 1);

    let t = Table::from_records([a, b]);
    assert_eq!(t.columns(), &["author", "politics_total", "politics_total"]);
    assert_eq!(t.duplicate_column(), Some("politics_total"));
    assert_eq!(t.rows()[0], vec![json!("alice"), json!(4), json!(0)]);
    assert_eq!(t.rows()[1], vec![json!("bob"), json!(1), Value::Null]);

    let users = table(&["author"], vec![vec![json!("alice")], vec![json!("bob")]]);
    let merged = users.merge(&t, "author").unwrap();
    assert!(matches!(
        check_merge("MergeUser", &users, &merged),
        Err(MergeInvariantViolation::DuplicateColumn { ref column, .. }) if column == "politics_total"
    ));
}

#[test]
fn dedup_keeps_first_row_per_key() {
    let mut t = table(&["id", "v"], vec![vec![json!("a"), json!(1)], vec![json!("a"), json!(2)], vec![json!("b"), json!(3)]]);
    assert_eq!(t.dedup_by("id").unwrap(), 1);
    assert_eq!(t.len(), 2);
    assert_eq!(t.value(0, "v"), Some(&json!(1)));
}

#[test]
fn empty_tables_merge_once_keys_exist() {
    let mut left = Table::from_records(Vec::<FeatureRecord>::new());
    let mut right = Table::from_records(Vec::<FeatureRecord>::new());
    assert!(left.merge(&right, "id").is_err());

    left.ensure_column("id");
    right.ensure_column("id");
    let merged = left.merge(&right, "id").unwrap();
    check_merge("MergePost", &left, &merged).unwrap();
    assert!(merged.is_empty());
    assert!(left.push_row(vec![json!(1), json!(2)]).is_err());
}
