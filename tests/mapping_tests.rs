//! Column mapping behavior exercised through full comparison runs

mod common;

use common::TestFixture;
use tabcompare::engine::{run_comparison, ComparisonRequest};
use tabcompare::mapping::MappingOrigin;

fn request(fixture: &TestFixture, join_key: &str) -> ComparisonRequest {
    let source = fixture.handle("source.csv", 1000).unwrap();
    let target = fixture.handle("target.csv", 1000).unwrap();
    ComparisonRequest::new(source, target, vec![join_key.to_string()])
}

#[test]
fn test_manual_override_maps_renamed_column() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_csv_raw("source.csv", "id,amt\n1,10\n2,20\n")
        .unwrap();
    fixture
        .create_csv_raw("target.csv", "id,total_amount\n1,10\n2,21\n")
        .unwrap();

    // Without the override the amounts are unmapped and ignored.
    let report = run_comparison(&request(&fixture, "id")).unwrap();
    assert_eq!(report.summary.mismatched_count, 0);
    assert_eq!(report.mapping.unmatched_source, vec!["amt".to_string()]);

    // With the override the differing amount shows up.
    let mut with_override = request(&fixture, "id");
    with_override.column_overrides = vec![("amt".to_string(), "total_amount".to_string())];
    let report = run_comparison(&with_override).unwrap();
    assert_eq!(report.summary.mismatched_count, 1);

    let entry = report
        .mapping
        .entries
        .iter()
        .find(|e| e.source == "amt")
        .unwrap();
    assert_eq!(entry.origin, MappingOrigin::Override);
    assert_eq!(entry.target, "total_amount");
}

#[test]
fn test_fuzzy_suggestion_needs_acceptance() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_csv_raw("source.csv", "id,customer_name\n1,Ann\n")
        .unwrap();
    fixture
        .create_csv_raw("target.csv", "id,customer_nam\n1,Bea\n")
        .unwrap();

    // Suggestion not confirmed: the pair drops out of the comparison.
    let report = run_comparison(&request(&fixture, "id")).unwrap();
    assert_eq!(report.summary.mismatched_count, 0);

    // Confirmed: the differing names are compared.
    let mut accepting = request(&fixture, "id");
    accepting.accept_suggestions = true;
    let report = run_comparison(&accepting).unwrap();
    assert_eq!(report.summary.mismatched_count, 1);

    let entry = report
        .mapping
        .entries
        .iter()
        .find(|e| e.source == "customer_name")
        .unwrap();
    assert!(matches!(entry.origin, MappingOrigin::Fuzzy { .. }));
}

#[test]
fn test_coercible_key_types_join() {
    let fixture = TestFixture::new().unwrap();
    // Source ids parse as integers, target ids as decimals.
    fixture
        .create_csv_raw("source.csv", "id,val\n1,10\n2,20\n")
        .unwrap();
    fixture
        .create_csv_raw("target.csv", "id,val\n1.0,10\n2.0,20\n")
        .unwrap();

    let report = run_comparison(&request(&fixture, "id")).unwrap();
    // 1 and 1.0 are the same key under canonical encoding.
    assert_eq!(report.summary.matched_count, 2);
    assert_eq!(report.summary.source_only_count, 0);
    assert_eq!(report.summary.target_only_count, 0);
}

#[test]
fn test_compound_join_key() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_csv_raw(
            "source.csv",
            "region,day,total\neast,1,100\neast,2,200\nwest,1,300\n",
        )
        .unwrap();
    fixture
        .create_csv_raw(
            "target.csv",
            "region,day,total\neast,1,100\neast,2,250\nnorth,1,300\n",
        )
        .unwrap();

    let source = fixture.handle("source.csv", 1000).unwrap();
    let target = fixture.handle("target.csv", 1000).unwrap();
    let request = ComparisonRequest::new(
        source,
        target,
        vec!["region".to_string(), "day".to_string()],
    );

    let report = run_comparison(&request).unwrap();
    assert_eq!(report.summary.matched_count, 1);
    assert_eq!(report.summary.mismatched_count, 1);
    assert_eq!(report.summary.source_only_count, 1);
    assert_eq!(report.summary.target_only_count, 1);
    assert_eq!(report.source_only_rows[0].key, "west|1");
    assert_eq!(report.target_only_rows[0].key, "north|1");
}
