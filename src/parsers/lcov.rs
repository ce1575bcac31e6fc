/// Decoder for the LCOV `.info` format.
///
/// Reference: https://ltp.sourceforge.net/coverage/lcov/geninfo.1.php
///
/// Key records:
///   TN:<test name>
///   SF:<path to source file>
///   FN:<line>,<function name>
///   FNDA:<execution count>,<function name>
///   DA:<line number>,<execution count>[,<checksum>]
///   BRDA:<line>,<block>,<branch>,<taken>
///   LF:<lines found>
///   LH:<lines hit>
///   end_of_record
///
/// Only `SF` and `DA` feed the model. Function, branch and summary records
/// are validated for shape (`TAG:value`) and otherwise ignored; totals are
/// always derived from the `DA` records.
use crate::builder::CoverageBuilder;
use crate::error::{CovgateError, Result};
use crate::model::{Coverage, CoverageKind};

use super::Format;

const KNOWN_TAGS: &[&str] = &[
    "TN", "SF", "FN", "FNDA", "FNF", "FNH", "FNL", "FNA", "DA", "BRDA", "BRF", "BRH", "LF", "LH",
    "VER",
];

/// Decode LCOV data from raw bytes.
pub fn decode(input: &[u8]) -> Result<Coverage> {
    let text = String::from_utf8_lossy(input);
    let mut builder = CoverageBuilder::new(CoverageKind::Loc);
    let mut current_file: Option<String> = None;
    let mut seen_signature = false;

    for (idx, raw_line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if !seen_signature {
            if !looks_like_lcov_line(line) {
                return Err(CovgateError::mismatch(
                    Format::Lcov,
                    "first record is not an LCOV tag",
                ));
            }
            seen_signature = true;
        }

        if line == "end_of_record" {
            current_file = None;
            continue;
        }

        let Some((tag, value)) = line.split_once(':') else {
            return Err(CovgateError::malformed(
                Format::Lcov,
                lineno,
                format!("expected TAG:value, got '{line}'"),
            ));
        };
        if tag.is_empty() || !tag.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(CovgateError::malformed(
                Format::Lcov,
                lineno,
                format!("invalid tag '{tag}'"),
            ));
        }

        match tag {
            "SF" => {
                let path = value.trim();
                if path.is_empty() {
                    return Err(CovgateError::malformed(Format::Lcov, lineno, "empty SF path"));
                }
                builder.file(path);
                current_file = Some(path.to_string());
            }
            "DA" => {
                let Some(path) = current_file.as_deref() else {
                    return Err(CovgateError::malformed(
                        Format::Lcov,
                        lineno,
                        "DA record before any SF record",
                    ));
                };
                // Some instrumenters use negative counts (e.g. -1) to mark
                // non-instrumentable lines; those are skipped entirely.
                if let Some((number, count)) = parse_da(value) {
                    if count >= 0 {
                        builder.line(path, number, count as u64);
                    }
                } else {
                    return Err(CovgateError::malformed(
                        Format::Lcov,
                        lineno,
                        format!("invalid DA record '{value}'"),
                    ));
                }
            }
            "BRDA" | "FN" | "FNDA" | "FNL" | "FNA" => {
                if current_file.is_none() {
                    return Err(CovgateError::malformed(
                        Format::Lcov,
                        lineno,
                        format!("{tag} record before any SF record"),
                    ));
                }
            }
            // TN, LF, LH, FNF, FNH, BRF, BRH, VER and tool-specific tags.
            _ => {}
        }
    }

    if !seen_signature {
        return Err(CovgateError::mismatch(Format::Lcov, "empty input"));
    }
    Ok(builder.build())
}

/// `DA:<line>,<count>[,<checksum>]` → (line, count).
fn parse_da(value: &str) -> Option<(u32, i64)> {
    let mut parts = value.splitn(3, ',');
    let number = parts.next()?.trim().parse::<u32>().ok()?;
    let count = parts.next()?.trim().parse::<i64>().ok()?;
    Some((number, count))
}

fn looks_like_lcov_line(line: &str) -> bool {
    if line == "end_of_record" {
        return true;
    }
    line.split_once(':')
        .is_some_and(|(tag, _)| KNOWN_TAGS.contains(&tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_lcov() {
        let input = include_bytes!("../../tests/fixtures/sample.lcov");
        let data = decode(input).unwrap();

        assert_eq!(data.kind, CoverageKind::Loc);
        assert_eq!(data.files.len(), 2);

        let lib = &data.files[0];
        assert_eq!(lib.file, "/src/lib.rs");
        assert_eq!(lib.lines.len(), 5);
        assert_eq!(lib.lines[0].number, 1);
        assert_eq!(lib.lines[0].hits, 5);
        assert_eq!(lib.lines[2].number, 3);
        assert_eq!(lib.lines[2].hits, 0);
        assert_eq!(lib.total, 5);
        assert_eq!(lib.covered, 4);

        let util = &data.files[1];
        assert_eq!(util.file, "/src/util.rs");
        assert_eq!(util.lines.len(), 2);

        assert_eq!(data.total, 7);
        assert_eq!(data.covered, 5);
    }

    #[test]
    fn test_decode_lcov_no_end_of_record() {
        let input = b"SF:/src/lib.rs\nDA:1,1\nDA:2,0\n";
        let data = decode(input).unwrap();
        assert_eq!(data.files.len(), 1);
        assert_eq!(data.files[0].lines.len(), 2);
    }

    #[test]
    fn test_decode_lcov_negative_counts() {
        let input = b"SF:/src/lib.rs\nDA:1,5\nDA:2,-1\nDA:3,0\nDA:4,3\nend_of_record\n";
        let data = decode(input).unwrap();

        let file = &data.files[0];
        assert_eq!(file.lines.len(), 3);
        assert_eq!(file.lines[1].number, 3);
        assert_eq!(file.lines[1].hits, 0);
        assert_eq!(file.lines[2].number, 4);
    }

    #[test]
    fn test_decode_lcov_file_without_lines_is_kept() {
        let input = b"TN:\nSF:/src/empty.rs\nend_of_record\nSF:/src/lib.rs\nDA:1,1\nend_of_record\n";
        let data = decode(input).unwrap();
        assert_eq!(data.files.len(), 2);
        assert_eq!(data.files[0].file, "/src/empty.rs");
        assert_eq!(data.files[0].total, 0);
        assert_eq!(data.files[0].percent(), None);
    }

    #[test]
    fn test_decode_lcov_only_test_name() {
        let data = decode(b"TN:unit\n").unwrap();
        assert!(data.files.is_empty());
        assert_eq!(data.percent(), None);
    }

    #[test]
    fn test_decode_lcov_repeated_sections_are_merged() {
        let input = b"TN:a\nSF:/src/lib.rs\nDA:1,0\nDA:2,1\nend_of_record\n\
                      TN:b\nSF:/src/lib.rs\nDA:1,2\nend_of_record\n";
        let data = decode(input).unwrap();
        assert_eq!(data.files.len(), 1);
        assert_eq!(data.files[0].lines[0].hits, 2);
        assert_eq!(data.covered, 2);
    }

    #[test]
    fn test_da_before_sf_is_malformed() {
        let err = decode(b"TN:x\nDA:1,1\n").unwrap_err();
        assert!(matches!(
            err,
            CovgateError::MalformedRecord { format: Format::Lcov, line: 2, .. }
        ));
    }

    #[test]
    fn test_da_after_end_of_record_is_malformed() {
        let err = decode(b"SF:a.rs\nDA:1,1\nend_of_record\nDA:2,1\n").unwrap_err();
        assert!(matches!(err, CovgateError::MalformedRecord { line: 4, .. }));
    }

    #[test]
    fn test_garbage_after_signature_is_malformed() {
        let err = decode(b"SF:a.rs\nDA:1,1\nthis is not lcov\n").unwrap_err();
        assert!(matches!(err, CovgateError::MalformedRecord { line: 3, .. }));

        let err = decode(b"SF:a.rs\nDA:one,1\n").unwrap_err();
        assert!(matches!(err, CovgateError::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn test_foreign_input_is_a_mismatch() {
        assert!(matches!(
            decode(b"mode: set\na.go:1.1,2.2 1 1\n"),
            Err(CovgateError::FormatMismatch { .. })
        ));
        assert!(matches!(
            decode(b"<?xml version=\"1.0\"?><coverage/>"),
            Err(CovgateError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn test_branch_records_are_ignored() {
        let input = b"SF:a.rs\nDA:1,1\nBRDA:1,0,0,-\nBRDA:1,0,1,1\nBRF:2\nBRH:1\nend_of_record\n";
        let data = decode(input).unwrap();
        assert_eq!(data.total, 1);
        assert_eq!(data.covered, 1);
    }
}
