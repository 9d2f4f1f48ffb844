//! Package index: the two artifacts recovered on the first pass.
//!
//! A SpreadsheetML package stores cell text in a workbook-wide shared
//! string pool and names its worksheets indirectly, through the
//! relationships part. Both must be in hand before any worksheet XML is
//! interpreted, so one full pass over the archive collects them:
//!
//! * `xl/sharedStrings.xml` -> [`SharedStrings`] (optional; absent means
//!   an empty table)
//! * `xl/workbook.xml` joined with `xl/_rels/workbook.xml.rels` ->
//!   [`WorksheetDirectory`]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};

use quick_xml::events::Event;

use crate::error::{Error, Result, Warning};
use crate::unzip::ZipStream;

/// Workbook part listing the sheets in user-visible order.
pub const WORKBOOK_PART: &str = "xl/workbook.xml";
/// Relationships part mapping relationship ids to member paths.
pub const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
/// Shared string pool part.
pub const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

const WORKSHEET_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";

/// Shared strings table.
///
/// An ordered pool of strings referenced positionally by worksheet
/// cells. Built once per pass, immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct SharedStrings {
    strings: Vec<String>,
}

impl SharedStrings {
    /// Stream-parse `xl/sharedStrings.xml`.
    ///
    /// Each `<si>` entry contributes the concatenation of its descendant
    /// `<t>` text nodes in document order, so plain and rich-text
    /// entries come out the same. Whitespace is never stripped; the
    /// `xml:space="preserve"` hint needs no special casing because text
    /// nodes are treated as opaque.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut xml = quick_xml::Reader::from_reader(reader);
        let mut strings = Vec::new();

        let mut buf = Vec::new();
        let mut in_si = false;
        let mut in_t = false;
        let mut current = String::new();

        loop {
            match xml.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"si" => {
                        in_si = true;
                        current.clear();
                    }
                    b"t" if in_si => in_t = true,
                    _ => {}
                },
                Ok(Event::Text(e)) => {
                    if in_t {
                        let text = e.unescape().map_err(Error::from_xml)?;
                        current.push_str(&text);
                    }
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"si" => {
                        strings.push(std::mem::take(&mut current));
                        in_si = false;
                    }
                    b"t" => in_t = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::from_xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(Self { strings })
    }

    /// Get a string by index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(|s| s.as_str())
    }

    /// Number of strings in the table.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// Mapping from user-visible sheet name to worksheet member path, in
/// workbook document order.
#[derive(Debug, Clone, Default)]
pub struct WorksheetDirectory {
    sheets: Vec<(String, String)>,
}

impl WorksheetDirectory {
    /// Member path for a sheet name.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.sheets
            .iter()
            .find(|(sheet, _)| sheet == name)
            .map(|(_, path)| path.as_str())
    }

    /// The first sheet in workbook order.
    pub fn first(&self) -> Option<(&str, &str)> {
        self.sheets
            .first()
            .map(|(name, path)| (name.as_str(), path.as_str()))
    }

    /// Sheet names in workbook order.
    pub fn names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Check if the workbook declares no worksheets.
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Number of worksheets.
    pub fn len(&self) -> usize {
        self.sheets.len()
    }
}

/// Everything pass 1 recovers from the archive.
#[derive(Debug, Default)]
pub struct PackageIndex {
    /// The workbook's shared string pool; empty when the part is absent.
    pub shared_strings: SharedStrings,
    /// Sheet name to member path mapping.
    pub directory: WorksheetDirectory,
}

/// Sheet declaration from `xl/workbook.xml`: name plus relationship id.
#[derive(Debug)]
struct SheetDecl {
    name: String,
    rel_id: String,
}

impl PackageIndex {
    /// Build the index from a member stream.
    ///
    /// Consumes the archive to the end: members after the last target
    /// still pass through the unzipper so their checksums are
    /// finalized, they are just never parsed.
    pub fn from_zip<R: Read>(
        zip: &mut ZipStream<R>,
        warn: &mut dyn FnMut(Warning),
    ) -> Result<Self> {
        let mut shared_strings = None;
        let mut sheet_decls = None;
        let mut relationships = None;

        loop {
            let mut member = match zip.next_member() {
                Ok(Some(member)) => member,
                Ok(None) => break,
                // Once the index parts are in hand, damage further into
                // the archive is the second pass's problem; it will hit
                // the same bytes with the right member in focus.
                Err(e) if sheet_decls.is_some() && relationships.is_some() => {
                    log::debug!("ignoring archive tail after index parts: {e}");
                    break;
                }
                Err(e) => return Err(e),
            };
            let name = member.name().to_string();
            match name.as_str() {
                SHARED_STRINGS_PART => {
                    shared_strings =
                        Some(SharedStrings::from_reader(BufReader::new(&mut member))?);
                }
                WORKBOOK_PART => {
                    sheet_decls = Some(parse_workbook(BufReader::new(&mut member))?);
                }
                WORKBOOK_RELS_PART => {
                    relationships = Some(parse_relationships(BufReader::new(&mut member))?);
                }
                _ => {}
            }
        }

        let sheet_decls = sheet_decls.ok_or(Error::MissingWorkbookPart)?;
        let relationships = relationships.ok_or(Error::MissingRelationshipsPart)?;
        let shared_strings = shared_strings.unwrap_or_default();

        let mut sheets = Vec::with_capacity(sheet_decls.len());
        for decl in sheet_decls {
            // Sheets whose relationship is missing or of a non-worksheet
            // type (chartsheets, macros) are skipped.
            let Some((rel_type, target)) = relationships.get(&decl.rel_id) else {
                continue;
            };
            if rel_type != WORKSHEET_REL_TYPE {
                continue;
            }
            if sheets.iter().any(|(name, _)| *name == decl.name) {
                warn(Warning::DuplicateSheetName(decl.name));
                continue;
            }
            sheets.push((decl.name, resolve_target(target)));
        }

        log::debug!(
            "package indexed: {} shared strings, {} worksheets",
            shared_strings.len(),
            sheets.len()
        );

        Ok(Self {
            shared_strings,
            directory: WorksheetDirectory { sheets },
        })
    }
}

/// Enumerate `<sheet>` declarations under `<sheets>` in document order.
fn parse_workbook<R: BufRead>(reader: R) -> Result<Vec<SheetDecl>> {
    let mut xml = quick_xml::Reader::from_reader(reader);
    let mut sheets = Vec::new();
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"sheet" {
                    let mut name = String::new();
                    let mut rel_id = String::new();
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"name" => {
                                name = attr
                                    .unescape_value()
                                    .map_err(Error::from_xml)?
                                    .into_owned();
                            }
                            b"r:id" => {
                                rel_id = attr
                                    .unescape_value()
                                    .map_err(Error::from_xml)?
                                    .into_owned();
                            }
                            _ => {}
                        }
                    }
                    if !name.is_empty() && !rel_id.is_empty() {
                        sheets.push(SheetDecl { name, rel_id });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::from_xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// Enumerate `<Relationship>` entries: id -> (type, target).
fn parse_relationships<R: BufRead>(reader: R) -> Result<HashMap<String, (String, String)>> {
    let mut xml = quick_xml::Reader::from_reader(reader);
    let mut rels = HashMap::new();
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = String::new();
                let mut rel_type = String::new();
                let mut target = String::new();
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => {
                            id = attr.unescape_value().map_err(Error::from_xml)?.into_owned()
                        }
                        b"Type" => {
                            rel_type =
                                attr.unescape_value().map_err(Error::from_xml)?.into_owned()
                        }
                        b"Target" => {
                            target =
                                attr.unescape_value().map_err(Error::from_xml)?.into_owned()
                        }
                        _ => {}
                    }
                }
                if !id.is_empty() {
                    rels.insert(id, (rel_type, target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::from_xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Resolve a relationship target to a package member path.
///
/// Targets are relative to `xl/` unless package-absolute (leading `/`).
fn resolve_target(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = vec!["xl"];
    for component in target.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            normal => parts.push(normal),
        }
    }
    parts.join("/")
}
