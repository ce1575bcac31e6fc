/// Decoder for SimpleCov JSON coverage maps.
///
/// Reference: https://github.com/simplecov-ruby/simplecov
///
/// Three shapes are accepted, all keyed by source file path:
///
///   1. legacy map:   `{ "/app/a.rb": [1, 0, null, 3] }`
///   2. lines object: `{ "/app/a.rb": { "lines": [1, 0, null, 3], "branches": {...} } }`
///   3. resultset:    `{ "RSpec": { "coverage": { <shape 1 or 2> }, "timestamp": 1 } }`
///
/// Array index `i` holds the hit count for line `i + 1`. `null` (and the
/// SimpleCov `"ignored"` marker) means the line is not instrumented; `0`
/// means instrumented but never executed.
use serde_json::{Map, Value};

use crate::builder::CoverageBuilder;
use crate::error::{CovgateError, Result};
use crate::model::{Coverage, CoverageKind};

use super::Format;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    LegacyMap,
    LinesObject,
    Resultset,
}

/// Decode SimpleCov JSON from raw bytes.
pub fn decode(input: &[u8]) -> Result<Coverage> {
    if super::first_significant_byte(input) != Some(b'{') {
        return Err(CovgateError::mismatch(Format::Simplecov, "not a JSON object"));
    }
    let root: Value = serde_json::from_slice(input)
        .map_err(|e| CovgateError::mismatch(Format::Simplecov, format!("invalid JSON: {e}")))?;
    let Some(root) = root.as_object() else {
        return Err(CovgateError::mismatch(Format::Simplecov, "not a JSON object"));
    };

    let mut builder = CoverageBuilder::new(CoverageKind::Loc);
    let Some((_, first)) = root.iter().next() else {
        return Ok(builder.build());
    };

    match classify(first) {
        Some(Shape::Resultset) => {
            for (command, run) in root {
                let coverage = run
                    .get("coverage")
                    .and_then(Value::as_object)
                    .ok_or_else(|| malformed(format!("run '{command}' has no coverage object")))?;
                let shape = coverage.values().next().and_then(classify);
                match shape {
                    None if coverage.is_empty() => {}
                    Some(Shape::LegacyMap) | Some(Shape::LinesObject) => {
                        decode_files(coverage, &mut builder)?;
                    }
                    _ => {
                        return Err(malformed(format!(
                            "run '{command}' has an unrecognized coverage layout"
                        )))
                    }
                }
            }
        }
        Some(Shape::LegacyMap) | Some(Shape::LinesObject) => decode_files(root, &mut builder)?,
        None => {
            return Err(CovgateError::mismatch(
                Format::Simplecov,
                "values are not per-line hit arrays",
            ))
        }
    }

    Ok(builder.build())
}

fn classify(value: &Value) -> Option<Shape> {
    match value {
        Value::Array(_) => Some(Shape::LegacyMap),
        Value::Object(obj) if obj.get("lines").is_some_and(Value::is_array) => {
            Some(Shape::LinesObject)
        }
        Value::Object(obj) if obj.get("coverage").is_some_and(Value::is_object) => {
            Some(Shape::Resultset)
        }
        _ => None,
    }
}

fn decode_files(files: &Map<String, Value>, builder: &mut CoverageBuilder) -> Result<()> {
    for (path, entry) in files {
        let hits = match entry {
            Value::Array(arr) => arr,
            Value::Object(obj) => obj
                .get("lines")
                .and_then(Value::as_array)
                .ok_or_else(|| malformed(format!("'{path}' has no lines array")))?,
            _ => return Err(malformed(format!("'{path}' is neither an array nor an object"))),
        };

        builder.file(path);
        for (idx, hit) in hits.iter().enumerate() {
            let number = u32::try_from(idx + 1)
                .map_err(|_| malformed(format!("'{path}' has too many lines")))?;
            match hit {
                Value::Null => {}
                Value::String(s) if s == "ignored" => {}
                Value::Number(n) => {
                    let count = n.as_u64().ok_or_else(|| {
                        malformed(format!("'{path}' line {number}: invalid hit count {n}"))
                    })?;
                    builder.line(path, number, count);
                }
                other => {
                    return Err(malformed(format!(
                        "'{path}' line {number}: unexpected value {other}"
                    )))
                }
            }
        }
    }
    Ok(())
}

/// JSON has no meaningful record lines once parsed; line 1 anchors the
/// document.
fn malformed(reason: String) -> CovgateError {
    CovgateError::malformed(Format::Simplecov, 1, reason)
}
