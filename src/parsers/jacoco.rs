/// Decoder for JaCoCo XML coverage reports.
///
/// JaCoCo XML structure:
///   <report name="...">
///     <sessioninfo .../>
///     <package name="com/example">
///       <class name="com/example/Foo" sourcefilename="Foo.java">
///         <method name="..." desc="..." line="...">
///           <counter type="INSTRUCTION" missed="..." covered="..."/>
///         </method>
///       </class>
///       <sourcefile name="Foo.java">
///         <line nr="3" mi="0" ci="3" mb="0" cb="0"/>
///         <counter type="LINE" missed="..." covered="..."/>
///       </sourcefile>
///     </package>
///   </report>
///
/// Only `<sourcefile>` / `<line>` feed the model. The path is
/// `package/name` (just `name` for the default package) and the hit count
/// of a line is its number of covered instructions (`ci`).
use quick_xml::events::Event;

use crate::builder::CoverageBuilder;
use crate::error::{CovgateError, Result};
use crate::model::{Coverage, CoverageKind};

use super::{get_attr, required_num, Format};

/// Decode JaCoCo XML from raw bytes.
pub fn decode(input: &[u8]) -> Result<Coverage> {
    let root =
        super::xml_root(input).ok_or_else(|| CovgateError::mismatch(Format::Jacoco, "not XML"))?;
    if root.name != "report" {
        return Err(CovgateError::mismatch(
            Format::Jacoco,
            format!("<{}> is not a JaCoCo root", root.name),
        ));
    }

    let mut reader = super::xml_reader(input);
    let mut buf = Vec::new();
    let mut builder = CoverageBuilder::new(CoverageKind::Loc);

    let mut current_package = String::new();
    let mut current_file: Option<String> = None;

    loop {
        let event = reader.read_event_into(&mut buf);
        match event {
            Err(e) => return Err(super::xml_err(e, &reader)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"package" => {
                    current_package = get_attr(e, b"name").unwrap_or_default();
                }
                b"sourcefile" => {
                    let name = get_attr(e, b"name").ok_or_else(|| {
                        CovgateError::malformed(
                            Format::Jacoco,
                            super::line_at(input, reader.buffer_position()),
                            "sourcefile without name",
                        )
                    })?;
                    let path = if current_package.is_empty() {
                        name
                    } else {
                        format!("{current_package}/{name}")
                    };
                    builder.file(&path);
                    current_file = Some(path);
                }
                b"line" => {
                    if let Some(path) = current_file.as_deref() {
                        let nr: u32 = required_num(e, b"nr", Format::Jacoco, input, &reader)?;
                        let ci: u64 = required_num(e, b"ci", Format::Jacoco, input, &reader)?;
                        builder.line(path, nr, ci);
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"sourcefile" => current_file = None,
                b"package" => current_package.clear(),
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    Ok(builder.build())
}
