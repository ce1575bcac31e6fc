/// Decoder for Cobertura XML coverage reports.
///
/// Cobertura XML structure:
///   <coverage line-rate="..." branch-rate="...">
///     <sources><source>...</source></sources>
///     <packages>
///       <package name="..." line-rate="...">
///         <classes>
///           <class name="..." filename="..." line-rate="...">
///             <methods>
///               <method name="...">
///                 <lines><line number="..." hits="..."/></lines>
///               </method>
///             </methods>
///             <lines>
///               <line number="..." hits="..." branch="true|false"
///                     condition-coverage="50% (1/2)" />
///             </lines>
///           </class>
///         </classes>
///       </package>
///     </packages>
///   </coverage>
///
/// The `line-rate` / `branch-rate` summaries are never read: producers
/// round them differently, so totals are recomputed from `<line>` data.
/// `filename` is stored verbatim; resolving it against `<source>` is left
/// to the path reconciler.
use std::collections::HashMap;

use quick_xml::events::Event;

use crate::builder::CoverageBuilder;
use crate::error::{CovgateError, Result};
use crate::model::{Coverage, CoverageKind, FileCoverage, Line};

use super::{get_attr, required_num, Format};

/// Decode Cobertura XML from raw bytes.
pub fn decode(input: &[u8]) -> Result<Coverage> {
    let root = super::xml_root(input)
        .ok_or_else(|| CovgateError::mismatch(Format::Cobertura, "not XML"))?;
    if root.name != "coverage"
        || root.attrs.contains_key("clover")
        || root.first_child.as_deref() == Some("project")
    {
        return Err(CovgateError::mismatch(
            Format::Cobertura,
            format!("unexpected root element <{}>", root.name),
        ));
    }

    let mut reader = super::xml_reader(input);
    let mut buf = Vec::new();
    let mut builder = CoverageBuilder::new(CoverageKind::Loc);

    let mut current_file: Option<FileCoverage> = None;
    // Lines may appear both under <method><lines> and <class><lines>, or
    // only in one of them depending on the generator. Deduplicate within a
    // class by keeping the max hit count for each line number.
    let mut line_index_map: HashMap<u32, usize> = HashMap::new();

    loop {
        let event = reader.read_event_into(&mut buf);
        match event {
            Err(e) => return Err(super::xml_err(e, &reader)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"class" => {
                    let filename = get_attr(e, b"filename").ok_or_else(|| {
                        CovgateError::malformed(
                            Format::Cobertura,
                            super::line_at(input, reader.buffer_position()),
                            "class without filename",
                        )
                    })?;
                    if let Some(file) = current_file.take() {
                        builder.merge(file);
                    }
                    current_file = Some(FileCoverage::new(filename));
                    line_index_map.clear();
                }
                b"line" => {
                    if let Some(file) = current_file.as_mut() {
                        let number: u32 =
                            required_num(e, b"number", Format::Cobertura, input, &reader)?;
                        let hits: u64 = required_num(e, b"hits", Format::Cobertura, input, &reader)?;

                        if let Some(&idx) = line_index_map.get(&number) {
                            let line: &mut Line = &mut file.lines[idx];
                            line.hits = line.hits.max(hits);
                        } else {
                            line_index_map.insert(number, file.lines.len());
                            file.lines.push(Line { number, hits });
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"class" {
                    if let Some(file) = current_file.take() {
                        builder.merge(file);
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }

    // Handle unclosed class
    if let Some(file) = current_file.take() {
        builder.merge(file);
    }

    Ok(builder.build())
}
