/// Decoder for Go's `-coverprofile` format.
///
/// Reference: https://go.dev/blog/cover
///
/// Format:
///   mode: set|count|atomic
///   <file>:<startLine>.<startCol>,<endLine>.<endCol> <numStatements> <count>
///
/// Each record describes a basic block with the number of statements in it
/// and how many times it ran. Blocks are kept as-is: overlapping ranges
/// for the same file stay distinct and are summed by the model.
use std::sync::LazyLock;

use regex::Regex;

use crate::builder::CoverageBuilder;
use crate::error::{CovgateError, Result};
use crate::model::{Block, Coverage, CoverageKind};

use super::Format;

/// The path is greedy so that it may itself contain colons
/// (e.g. `C:\src\main.go`); the range part never does.
static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+):(\d+)\.(\d+),(\d+)\.(\d+) (\d+) (\d+)$").unwrap()
});

/// Decode a Go coverage profile from raw bytes.
pub fn decode(input: &[u8]) -> Result<Coverage> {
    let text = String::from_utf8_lossy(input);
    let mut builder = CoverageBuilder::new(CoverageKind::Statement);
    let mut seen_signature = false;

    for (idx, raw_line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        // Merged profiles may repeat the header.
        if let Some(mode) = line.strip_prefix("mode:") {
            if mode.trim().is_empty() {
                return Err(CovgateError::malformed(Format::Gocover, lineno, "empty mode"));
            }
            seen_signature = true;
            continue;
        }

        match parse_block_line(line) {
            Some((file, block)) => {
                seen_signature = true;
                builder.block(file, block);
            }
            None if !seen_signature => {
                return Err(CovgateError::mismatch(
                    Format::Gocover,
                    "no mode header or block record",
                ));
            }
            None => {
                return Err(CovgateError::malformed(
                    Format::Gocover,
                    lineno,
                    format!("invalid block record '{line}'"),
                ));
            }
        }
    }

    if !seen_signature {
        return Err(CovgateError::mismatch(Format::Gocover, "empty input"));
    }
    Ok(builder.build())
}

/// Parse a single block line, returning (file_path, Block).
fn parse_block_line(line: &str) -> Option<(&str, Block)> {
    let caps = BLOCK_RE.captures(line)?;
    let num = |i: usize| caps.get(i).map(|m| m.as_str());

    let file = num(1)?;
    let block = Block {
        start_line: num(2)?.parse().ok()?,
        start_column: num(3)?.parse().ok()?,
        end_line: num(4)?.parse().ok()?,
        end_column: num(5)?.parse().ok()?,
        statements: num(6)?.parse().ok()?,
        hits: num(7)?.parse().ok()?,
    };
    if block.end_line < block.start_line {
        return None;
    }
    Some((file, block))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_gocover() {
        let input = include_bytes!("../../tests/fixtures/sample.gocov");
        let data = decode(input).unwrap();

        assert_eq!(data.kind, CoverageKind::Statement);
        assert_eq!(data.files.len(), 2);

        let main = &data.files[0];
        assert_eq!(main.file, "github.com/user/project/main.go");
        assert_eq!(main.blocks.len(), 2);
        assert_eq!(main.blocks[0].start_line, 10);
        assert_eq!(main.blocks[0].end_line, 12);
        assert_eq!(main.blocks[0].statements, 3);
        assert_eq!(main.blocks[0].hits, 5);
        assert_eq!(main.total, 5);
        assert_eq!(main.covered, 3);

        let util = &data.files[1];
        assert_eq!(util.file, "github.com/user/project/util.go");
        assert_eq!(util.total, 2);
        assert_eq!(util.covered, 2);

        assert_eq!(data.total, 7);
        assert_eq!(data.covered, 5);
    }

    #[test]
    fn test_overlapping_blocks_are_not_merged() {
        let input = b"mode: count\n\
            example.com/pkg/f.go:5.1,10.10 3 2\n\
            example.com/pkg/f.go:8.1,12.10 2 0\n";
        let data = decode(input).unwrap();

        let file = &data.files[0];
        assert_eq!(file.blocks.len(), 2);
        assert_eq!(file.total, 5);
        assert_eq!(file.covered, 3);
    }

    #[test]
    fn test_zero_statement_block_contributes_nothing() {
        let input = b"mode: set\na.go:1.1,2.2 0 1\na.go:3.1,4.2 2 0\n";
        let data = decode(input).unwrap();
        assert_eq!(data.total, 2);
        assert_eq!(data.covered, 0);
    }

    #[test]
    fn test_decode_gocover_header_only() {
        let data = decode(b"mode: atomic\n").unwrap();
        assert!(data.files.is_empty());
    }

    #[test]
    fn test_decode_gocover_no_mode_header() {
        let input = b"example.com/pkg/f.go:1.1,5.10 2 3\n";
        let data = decode(input).unwrap();
        assert_eq!(data.files.len(), 1);
        assert_eq!(data.covered, 2);
    }

    #[test]
    fn test_windows_path_with_colon() {
        let input = b"mode: set\nC:\\src\\main.go:1.1,3.10 2 1\n";
        let data = decode(input).unwrap();
        assert_eq!(data.files[0].file, "C:\\src\\main.go");
    }

    #[test]
    fn test_malformed_record_after_header() {
        let err = decode(b"mode: set\na.go:1.1,2.2 1 1\na.go:oops\n").unwrap_err();
        assert!(matches!(
            err,
            CovgateError::MalformedRecord { format: Format::Gocover, line: 3, .. }
        ));
    }

    #[test]
    fn test_foreign_input_is_a_mismatch() {
        assert!(matches!(
            decode(b"SF:/src/lib.rs\nDA:1,1\n"),
            Err(CovgateError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_block_line() {
        let (file, block) =
            parse_block_line("github.com/user/repo/file.go:10.1,20.5 3 1").unwrap();
        assert_eq!(file, "github.com/user/repo/file.go");
        assert_eq!(block.start_line, 10);
        assert_eq!(block.start_column, 1);
        assert_eq!(block.end_line, 20);
        assert_eq!(block.end_column, 5);
        assert_eq!(block.statements, 3);
        assert_eq!(block.hits, 1);
        assert!(parse_block_line("mode: count").is_none());
        assert!(parse_block_line("a.go:9.1,3.1 1 1").is_none());
    }
}
