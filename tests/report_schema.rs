use std::path::PathBuf;

use pixbench::corpus::SourceFile;
use pixbench::record::FileRecord;
use pixbench::report::Report;

mod helper;
use helper::TestRig;

fn source() -> SourceFile {
    SourceFile {
        path: PathBuf::from("corpus/cat.jpg"),
        name: "cat.jpg".to_owned(),
        size: 1234,
        hash: "ab".repeat(32),
    }
}

/// Downstream consumers diff reports across runs, so a record that
/// failed early must still carry every key, null-valued.
#[test]
fn partial_records_serialize_with_null_values_not_missing_keys() {
    let rig = TestRig::new();
    let variants = vec!["0.4".to_owned(), "0.5".to_owned()];
    let mut record = FileRecord::new(&source(), &variants);
    record.error = Some("conversion failed".to_owned());

    let mut report = Report::new("test-run".to_owned(), variants, 1_700_000_000);
    report.records.push(record);
    let path = rig.tmp.path().join("report.json");
    report.write(&path).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let record = &doc["records"][0];

    for key in [
        "filename",
        "original-size",
        "original-hash",
        "normalized-path",
        "normalized-size",
        "normalized-hash",
        "variants",
        "ratios",
        "deltas",
        "is-identical",
        "error",
    ] {
        assert!(
            record.get(key).is_some(),
            "key `{}` missing from serialized record",
            key
        );
    }
    assert!(record["normalized-size"].is_null());
    assert!(record["is-identical"].is_null());
    // Every configured variant is present, null-valued.
    assert!(record["variants"]["0.4"].is_null());
    assert!(record["variants"]["0.5"].is_null());
    assert!(record["deltas"]["0.5"].is_null());
    assert_eq!(record["error"], "conversion failed");
}

#[test]
fn reports_round_trip_through_load() {
    let rig = TestRig::new();
    let variants = vec!["0.4".to_owned(), "0.5".to_owned()];
    let mut report = Report::new("test-run".to_owned(), variants.clone(), 1_700_000_000);
    report.records.push(FileRecord::new(&source(), &variants));
    let path = rig.tmp.path().join("report.json");
    report.write(&path).unwrap();

    let loaded = Report::load(&path).unwrap();
    assert_eq!(loaded.runid, "test-run");
    assert_eq!(loaded.variants, variants);
    assert_eq!(loaded.records.len(), 1);
    assert_eq!(loaded.records[0].filename, "cat.jpg");
    // A record without results is not complete, so it must not be
    // treated as resumable.
    assert!(loaded.completed_keys(&variants).is_empty());
}

/// Rewriting in place goes through a temp file and a rename, so a
/// previous valid report can never be half-overwritten.
#[test]
fn rewriting_a_report_replaces_it_atomically() {
    let rig = TestRig::new();
    let variants = vec!["0.4".to_owned()];
    let mut report = Report::new("test-run".to_owned(), variants.clone(), 1_700_000_000);
    let path = rig.tmp.path().join("report.json");
    report.write(&path).unwrap();

    report.records.push(FileRecord::new(&source(), &variants));
    report.finished_utc = Some(1_700_000_100);
    report.write(&path).unwrap();

    let loaded = Report::load(&path).unwrap();
    assert_eq!(loaded.records.len(), 1);
    assert_eq!(loaded.finished_utc, Some(1_700_000_100));
    assert!(!path.with_extension("json.tmp").exists());
}
