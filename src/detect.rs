/// Format sniffing.
///
/// Strategy:
///   1. If the caller names a format, decode with it directly
///   2. Otherwise try every decoder in `REGISTRY` order; a decoder that
///      does not recognize its signature answers `FormatMismatch` and the
///      next one is tried
///   3. A decoder that recognized its signature and then failed is fatal:
///      the input is a broken report, not a different format
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{CovgateError, Result};
use crate::model::Coverage;
use crate::parsers::{Format, REGISTRY};

/// Detect the format of `input` and decode it.
pub fn sniff(input: &[u8]) -> Result<(Format, Coverage)> {
    for format in REGISTRY {
        match format.decode(input) {
            Ok(coverage) => {
                debug!(%format, files = coverage.files.len(), "format detected");
                return Ok((format, coverage));
            }
            Err(CovgateError::FormatMismatch { reason, .. }) => {
                debug!(%format, %reason, "decoder rejected input");
            }
            Err(e) => return Err(e),
        }
    }
    Err(CovgateError::UnrecognizedFormat)
}

/// Decode `input` with a known format.
///
/// A mismatch is reported as-is so the caller sees why the override did
/// not apply.
pub fn decode(format: Format, input: &[u8]) -> Result<Coverage> {
    format.decode(input)
}

/// Read and decode a report file.
///
/// When `path` is a directory it is treated as a project root and each
/// format's default report location below it is tried in registry order
/// (only the overridden format's locations if `format` is given).
pub fn sniff_path(path: &Path, format: Option<Format>) -> Result<(Format, Coverage)> {
    let file = if path.is_dir() {
        find_default_report(path, format).ok_or(CovgateError::UnrecognizedFormat)?
    } else {
        path.to_path_buf()
    };

    let content = std::fs::read(&file)?;
    debug!(path = %file.display(), bytes = content.len(), "read coverage report");
    match format {
        Some(format) => Ok((format, decode(format, &content)?)),
        None => sniff(&content),
    }
}

fn find_default_report(root: &Path, format: Option<Format>) -> Option<PathBuf> {
    let formats: Vec<Format> = match format {
        Some(f) => vec![f],
        None => REGISTRY.to_vec(),
    };
    formats
        .iter()
        .flat_map(|f| f.default_paths().iter())
        .map(|rel| root.join(rel))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_lcov() {
        let content = b"TN:test\nSF:/src/lib.rs\nDA:1,5\nend_of_record\n";
        let (format, coverage) = sniff(content).unwrap();
        assert_eq!(format, Format::Lcov);
        assert_eq!(coverage.total, 1);
    }

    #[test]
    fn test_sniff_gocover() {
        let (format, _) = sniff(b"mode: set\na.go:1.1,2.2 1 1\n").unwrap();
        assert_eq!(format, Format::Gocover);
    }

    #[test]
    fn test_sniff_xml_formats() {
        let (format, _) =
            sniff(b"<?xml version=\"1.0\"?>\n<coverage version=\"1.0\"><packages/></coverage>")
                .unwrap();
        assert_eq!(format, Format::Cobertura);

        let (format, _) =
            sniff(br#"<coverage generated="1" clover="4.4.1"><project/></coverage>"#).unwrap();
        assert_eq!(format, Format::Clover);

        let (format, _) = sniff(br#"<report name="x"></report>"#).unwrap();
        assert_eq!(format, Format::Jacoco);
    }

    #[test]
    fn test_sniff_simplecov() {
        let (format, _) = sniff(br#"{"a.rb": [1, null]}"#).unwrap();
        assert_eq!(format, Format::Simplecov);
    }

    #[test]
    fn test_sniff_unknown() {
        assert!(matches!(
            sniff(b"hello world"),
            Err(CovgateError::UnrecognizedFormat)
        ));
        assert!(matches!(sniff(b""), Err(CovgateError::UnrecognizedFormat)));
        assert!(matches!(
            sniff(br#"{"a.js": {"statementMap": {}}}"#),
            Err(CovgateError::UnrecognizedFormat)
        ));
    }

    #[test]
    fn test_sniff_stops_at_malformed_record() {
        let err = sniff(b"mode: set\na.go:1.1,2.2 1 1\nbroken\n").unwrap_err();
        assert!(matches!(
            err,
            CovgateError::MalformedRecord { format: Format::Gocover, line: 3, .. }
        ));
    }

    #[test]
    fn test_decode_with_wrong_override_is_a_mismatch() {
        assert!(matches!(
            decode(Format::Cobertura, b"SF:a\nDA:1,1\n"),
            Err(CovgateError::FormatMismatch { format: Format::Cobertura, .. })
        ));
    }
}
