mod common;

use covgate::model::{CoverageKind, LineStatus};
use covgate::parsers::lcov;

#[test]
fn decode_fixture() {
    let coverage = lcov::decode(include_bytes!("fixtures/sample.lcov")).unwrap();
    common::assert_consistent(&coverage);

    assert_eq!(coverage.kind, CoverageKind::Loc);
    assert_eq!(coverage.files.len(), 2);
    assert_eq!((coverage.total, coverage.covered), (7, 5));

    let lib = coverage.find("/src/lib.rs").unwrap();
    assert_eq!((lib.total, lib.covered), (5, 4));
    assert_eq!(lib.line_status(1), LineStatus::Covered(5));
    assert_eq!(lib.line_status(3), LineStatus::Missed);
    assert_eq!(lib.line_status(6), LineStatus::NotInstrumented);
}

#[test]
fn relative_lookup_finds_absolute_path() {
    let coverage = lcov::decode(include_bytes!("fixtures/sample.lcov")).unwrap();
    let util = coverage.find("src/util.rs").unwrap();
    assert_eq!(util.file, "/src/util.rs");
    assert_eq!(util.percent(), Some(50.0));
}

#[test]
fn repeated_sections_are_merged() {
    let input = b"SF:a.rs\nDA:1,1\nDA:2,0\nend_of_record\nSF:a.rs\nDA:2,3\nDA:3,0\nend_of_record\n";
    let coverage = lcov::decode(input).unwrap();
    common::assert_consistent(&coverage);

    assert_eq!(coverage.files.len(), 1);
    let a = &coverage.files[0];
    assert_eq!(a.total, 3);
    assert_eq!(a.covered, 2);
    assert_eq!(a.line_status(2), LineStatus::Covered(3));
}
