/// Decoder for Clover XML coverage reports.
///
/// Clover XML structure (as produced by OpenClover, Atlassian Clover, and
/// various plugins like `jest --coverageReporters=clover`, PHPUnit, etc.):
///
///   <coverage generated="..." clover="4.x.x">
///     <project timestamp="..." name="...">
///       <metrics .../>
///       <package name="...">
///         <file name="Foo.py" path="/absolute/path/to/Foo.py">
///           <class name="Foo"><metrics .../></class>
///           <line num="1" count="5" type="stmt"/>
///           <line num="3" count="2" type="method" signature="do_stuff()"/>
///           <line num="5" count="1" type="cond" truecount="1" falsecount="1"/>
///         </file>
///       </package>
///     </project>
///   </coverage>
///
/// Key differences from Cobertura:
///   - Root `<coverage>` carries a `clover` attribute, or its first child is
///     `<project>` (PHPUnit omits the attribute).
///   - Files live inside `<package>` → `<file>`, or directly in `<project>`.
///   - `<file>` has a `path` attribute with the full path and a `name`
///     attribute with just the filename. We prefer `path` when available.
///
/// `stmt` and `cond` lines count as statements. `method` lines mark a
/// declaration and are not counted. `<metrics>` summaries are ignored.
use quick_xml::events::Event;

use crate::builder::CoverageBuilder;
use crate::error::{CovgateError, Result};
use crate::model::{Coverage, CoverageKind};

use super::{get_attr, required_num, Format};

/// Decode Clover XML from raw bytes.
pub fn decode(input: &[u8]) -> Result<Coverage> {
    let root =
        super::xml_root(input).ok_or_else(|| CovgateError::mismatch(Format::Clover, "not XML"))?;
    let is_clover = root.name == "coverage"
        && (root.attrs.contains_key("clover") || root.first_child.as_deref() == Some("project"));
    if !is_clover {
        return Err(CovgateError::mismatch(
            Format::Clover,
            format!("<{}> is not a Clover root", root.name),
        ));
    }

    let mut reader = super::xml_reader(input);
    let mut buf = Vec::new();
    let mut builder = CoverageBuilder::new(CoverageKind::Loc);
    let mut current_file: Option<String> = None;

    loop {
        let event = reader.read_event_into(&mut buf);
        match event {
            Err(e) => return Err(super::xml_err(e, &reader)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"file" => {
                    let path = get_attr(e, b"path")
                        .filter(|p| !p.is_empty())
                        .or_else(|| get_attr(e, b"name"))
                        .ok_or_else(|| {
                            CovgateError::malformed(
                                Format::Clover,
                                super::line_at(input, reader.buffer_position()),
                                "file without path or name",
                            )
                        })?;
                    builder.file(&path);
                    current_file = Some(path);
                }
                b"line" => {
                    if let Some(path) = current_file.as_deref() {
                        let num: u32 = required_num(e, b"num", Format::Clover, input, &reader)?;
                        let count: u64 = required_num(e, b"count", Format::Clover, input, &reader)?;
                        let line_type = get_attr(e, b"type").unwrap_or_else(|| "stmt".to_string());
                        if line_type != "method" {
                            builder.line(path, num, count);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"file" {
                    current_file = None;
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(builder.build())
}
