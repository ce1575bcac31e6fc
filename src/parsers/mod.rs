pub mod clover;
pub mod cobertura;
pub mod gocover;
pub mod jacoco;
pub mod lcov;
pub mod simplecov;

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{CovgateError, Result};
use crate::model::Coverage;

/// Supported coverage formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Lcov,
    Gocover,
    Simplecov,
    Cobertura,
    Clover,
    Jacoco,
}

/// Sniffing order. Structurally strict formats come first so that a
/// lenient decoder (LCOV) never claims another format's input.
pub const REGISTRY: [Format; 6] = [
    Format::Clover,
    Format::Cobertura,
    Format::Jacoco,
    Format::Simplecov,
    Format::Gocover,
    Format::Lcov,
];

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Lcov => "lcov",
            Format::Gocover => "gocover",
            Format::Simplecov => "simplecov",
            Format::Cobertura => "cobertura",
            Format::Clover => "clover",
            Format::Jacoco => "jacoco",
        }
    }

    /// Decode `input` with this format's decoder.
    pub fn decode(&self, input: &[u8]) -> Result<Coverage> {
        match self {
            Format::Lcov => lcov::decode(input),
            Format::Gocover => gocover::decode(input),
            Format::Simplecov => simplecov::decode(input),
            Format::Cobertura => cobertura::decode(input),
            Format::Clover => clover::decode(input),
            Format::Jacoco => jacoco::decode(input),
        }
    }

    /// Where the producing tool writes its report by default, relative to
    /// the project root.
    pub fn default_paths(&self) -> &'static [&'static str] {
        match self {
            Format::Lcov => &["coverage/lcov.info", "lcov.info"],
            Format::Gocover => &["coverage.out"],
            Format::Simplecov => &["coverage/.resultset.json"],
            Format::Cobertura => &["coverage.xml", "coverage/cobertura-coverage.xml"],
            Format::Clover => &["coverage/clover.xml"],
            Format::Jacoco => &["build/reports/jacoco/test/jacocoTestReport.xml"],
        }
    }
}

impl std::str::FromStr for Format {
    type Err = CovgateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lcov" => Ok(Format::Lcov),
            "gocover" | "go" => Ok(Format::Gocover),
            "simplecov" => Ok(Format::Simplecov),
            "cobertura" => Ok(Format::Cobertura),
            "clover" => Ok(Format::Clover),
            "jacoco" => Ok(Format::Jacoco),
            _ => Err(CovgateError::UnknownFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First byte that is neither whitespace nor part of a UTF-8 BOM.
pub(crate) fn first_significant_byte(content: &[u8]) -> Option<u8> {
    let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);
    content.iter().copied().find(|b| !b.is_ascii_whitespace())
}

pub(crate) fn xml_reader(input: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);
    reader
}

pub(crate) fn xml_err(source: quick_xml::Error, reader: &Reader<&[u8]>) -> CovgateError {
    CovgateError::Xml {
        source,
        position: reader.buffer_position(),
    }
}

/// Unescaped value of the attribute named `key`, if present.
pub(crate) fn get_attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Root element of an XML document plus the name of its first child.
#[derive(Debug)]
pub(crate) struct XmlRoot {
    pub name: String,
    pub attrs: HashMap<String, String>,
    pub first_child: Option<String>,
}

/// Peek at the root element without parsing the whole document.
///
/// Returns `None` when the input is not XML at all, so XML decoders can
/// reject foreign input before doing any real work.
pub(crate) fn xml_root(input: &[u8]) -> Option<XmlRoot> {
    if first_significant_byte(input) != Some(b'<') {
        return None;
    }

    let mut reader = xml_reader(input);
    let mut buf = Vec::new();
    let mut root: Option<XmlRoot> = None;

    loop {
        let event = reader.read_event_into(&mut buf);
        let is_empty = matches!(&event, Ok(Event::Empty(_)));
        match event {
            Err(_) => return None,
            Ok(Event::Eof) | Ok(Event::End(_)) => return root,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match root.as_mut() {
                    Some(r) => {
                        r.first_child = Some(name);
                        return root;
                    }
                    None => {
                        let attrs = e
                            .attributes()
                            .flatten()
                            .filter_map(|a| {
                                let key =
                                    String::from_utf8_lossy(a.key.local_name().as_ref()).into_owned();
                                let value = a.unescape_value().ok()?.into_owned();
                                Some((key, value))
                            })
                            .collect();
                        root = Some(XmlRoot {
                            name,
                            attrs,
                            first_child: None,
                        });
                        if is_empty {
                            return root;
                        }
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Parse a numeric attribute, turning absence or garbage into a
/// `MalformedRecord` anchored at the reader's current line.
pub(crate) fn required_num<T: std::str::FromStr>(
    e: &BytesStart,
    key: &[u8],
    format: Format,
    input: &[u8],
    reader: &Reader<&[u8]>,
) -> Result<T> {
    let name = String::from_utf8_lossy(key);
    let line = line_at(input, reader.buffer_position());
    let value = get_attr(e, key)
        .ok_or_else(|| CovgateError::malformed(format, line, format!("missing '{name}'")))?;
    value
        .trim()
        .parse::<T>()
        .map_err(|_| CovgateError::malformed(format, line, format!("invalid '{name}': {value}")))
}

/// 1-based line number of a byte offset.
pub(crate) fn line_at(input: &[u8], position: usize) -> usize {
    let end = position.min(input.len());
    input[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_round_trips_through_str() {
        for format in REGISTRY {
            assert_eq!(format.as_str().parse::<Format>().unwrap(), format);
        }
        assert!("nope".parse::<Format>().is_err());
    }

    #[test]
    fn test_xml_root() {
        let root = xml_root(b"<?xml version=\"1.0\"?>\n<coverage clover=\"4\"><project/></coverage>")
            .unwrap();
        assert_eq!(root.name, "coverage");
        assert_eq!(root.attrs.get("clover").map(String::as_str), Some("4"));
        assert_eq!(root.first_child.as_deref(), Some("project"));
    }

    #[test]
    fn test_xml_root_rejects_non_xml() {
        assert!(xml_root(b"SF:/src/lib.rs\n").is_none());
        assert!(xml_root(b"{\"a\": [1]}").is_none());
        assert!(xml_root(b"").is_none());
    }

    #[test]
    fn test_first_significant_byte_skips_bom() {
        assert_eq!(first_significant_byte(b"\xEF\xBB\xBF  <x/>"), Some(b'<'));
        assert_eq!(first_significant_byte(b" \n "), None);
    }

    #[test]
    fn test_line_at() {
        assert_eq!(line_at(b"a\nb\nc", 0), 1);
        assert_eq!(line_at(b"a\nb\nc", 3), 2);
        assert_eq!(line_at(b"a\nb\nc", 100), 3);
    }
}
