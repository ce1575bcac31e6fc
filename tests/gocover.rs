mod common;

use covgate::model::{CoverageKind, LineStatus};
use covgate::parsers::gocover;

#[test]
fn decode_fixture() {
    let coverage = gocover::decode(include_bytes!("fixtures/sample.gocov")).unwrap();
    common::assert_consistent(&coverage);

    assert_eq!(coverage.kind, CoverageKind::Statement);
    assert_eq!((coverage.total, coverage.covered), (7, 5));

    let main = coverage.find("github.com/user/project/main.go").unwrap();
    assert_eq!(main.blocks.len(), 2);
    assert_eq!(main.blocks[0].start_line, 10);
    assert_eq!(main.blocks[0].start_column, 13);
    assert_eq!(main.blocks[0].end_line, 12);
    assert_eq!(main.blocks[0].end_column, 2);
    assert_eq!((main.total, main.covered), (5, 3));
    assert_eq!(main.line_status(11), LineStatus::Covered(5));
    assert_eq!(main.line_status(13), LineStatus::NotInstrumented);
    assert_eq!(main.line_status(15), LineStatus::Missed);
}

#[test]
fn module_path_matches_project_path() {
    let coverage = gocover::decode(include_bytes!("fixtures/sample.gocov")).unwrap();
    let util = coverage.find("project/util.go").unwrap();
    assert_eq!(util.percent(), Some(100.0));
}

#[test]
fn eight_of_ten_statements() {
    let input = b"mode: set\nexample.com/app/main.go:1.1,5.2 8 1\nexample.com/app/main.go:6.1,8.2 2 0\n";
    let coverage = gocover::decode(input).unwrap();
    assert_eq!(coverage.percent(), Some(80.0));
}
