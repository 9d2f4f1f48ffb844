//! Incremental worksheet parsing.
//!
//! A [`RowStream`] walks one worksheet member's XML as an event stream
//! and yields dense rows. Nothing outside `<sheetData>` is retained; the
//! live state at any instant is the parser's element path plus the one
//! row under construction, so memory stays flat no matter how many rows
//! the sheet holds.

use std::io::{BufReader, Read};

use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::package::SharedStrings;

/// Column cap of the spreadsheet format.
pub(crate) const MAX_COLUMNS: u32 = 1 << 20;

/// Rows between progress log lines.
const PROGRESS_EVERY: u64 = 10_000;

/// Decode the alphabetic prefix of a cell address ("AA10") into a
/// zero-based column index.
///
/// The prefix is a bijective base-26 numeral: `A=1 .. Z=26, AA=27`.
pub fn column_index(address: &str) -> Result<u32> {
    let mut col: u64 = 0;
    let mut letters = 0usize;
    for b in address.bytes() {
        if !b.is_ascii_alphabetic() {
            break;
        }
        col = col * 26 + u64::from(b.to_ascii_uppercase() - b'A' + 1);
        letters += 1;
        if letters > 5 {
            return Err(Error::BadCellAddress(address.to_string()));
        }
    }
    if letters == 0 || col - 1 >= u64::from(MAX_COLUMNS) {
        return Err(Error::BadCellAddress(address.to_string()));
    }
    Ok((col - 1) as u32)
}

/// Cell value kind, from the `t` attribute (absent means numeric).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellType {
    Numeric,
    SharedString,
    InlineString,
    FormulaString,
    Boolean,
    ErrorValue,
}

impl CellType {
    fn from_attr(t: &[u8]) -> Self {
        match t {
            b"s" => CellType::SharedString,
            b"inlineStr" => CellType::InlineString,
            b"str" => CellType::FormulaString,
            b"b" => CellType::Boolean,
            b"e" => CellType::ErrorValue,
            _ => CellType::Numeric,
        }
    }
}

/// What one XML event means for row assembly. Decoded first, while the
/// event still borrows the read buffer, then acted on.
enum Step {
    Nothing,
    EnterSheetData,
    ExitSheetData,
    OpenRow(Option<u64>),
    EmptyRow,
    OpenCell(Option<u32>, CellType),
    EmptyCell(Option<u32>, CellType),
    BeginCapture,
    EndCapture,
    EnterInline,
    ExitInline,
    Text(String),
    CloseCell,
    CloseRow,
    Eof,
}

fn parse_row_number(e: &BytesStart<'_>) -> Result<Option<u64>> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"r" {
            let raw = attr.unescape_value().map_err(Error::from_xml)?;
            return Ok(raw.trim().parse::<u64>().ok().map(|n| n.saturating_sub(1)));
        }
    }
    Ok(None)
}

fn parse_cell_attrs(e: &BytesStart<'_>) -> Result<(Option<u32>, CellType)> {
    let mut col = None;
    let mut cell_type = CellType::Numeric;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"r" => {
                let raw = attr.unescape_value().map_err(Error::from_xml)?;
                col = Some(column_index(&raw)?);
            }
            b"t" => cell_type = CellType::from_attr(&attr.value),
            _ => {}
        }
    }
    Ok((col, cell_type))
}

/// Lazy stream of dense rows out of one worksheet member.
///
/// Rows come out in document order, exactly one per `<row>` element;
/// gaps in declared row numbers are not synthesized. Dropping the
/// stream releases the underlying transport and decompressor.
pub struct RowStream<R: Read> {
    xml: quick_xml::Reader<BufReader<R>>,
    shared: SharedStrings,
    buf: Vec<u8>,

    in_sheet_data: bool,
    in_row: bool,
    in_cell: bool,
    in_inline: bool,
    capturing: bool,

    cell_type: CellType,
    cell_col: Option<u32>,
    next_col: u32,
    value: String,
    cells: Vec<(u32, String)>,
    max_col: Option<u32>,

    rows_emitted: u64,
    finished: bool,
}

impl<R: Read> RowStream<R> {
    /// Wrap a worksheet member byte stream, resolving shared string
    /// references against `shared`.
    pub fn new(member: R, shared: SharedStrings, buffer_capacity: usize) -> Self {
        let xml = quick_xml::Reader::from_reader(BufReader::with_capacity(
            buffer_capacity.max(512),
            member,
        ));
        Self {
            xml,
            shared,
            buf: Vec::new(),
            in_sheet_data: false,
            in_row: false,
            in_cell: false,
            in_inline: false,
            capturing: false,
            cell_type: CellType::Numeric,
            cell_col: None,
            next_col: 0,
            value: String::new(),
            cells: Vec::new(),
            max_col: None,
            rows_emitted: 0,
            finished: false,
        }
    }

    /// Rows emitted so far.
    pub fn rows_emitted(&self) -> u64 {
        self.rows_emitted
    }

    fn advance(&mut self) -> Result<Option<Vec<String>>> {
        loop {
            self.buf.clear();
            let step = match self.xml.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"sheetData" => Step::EnterSheetData,
                    b"row" if self.in_sheet_data => Step::OpenRow(parse_row_number(&e)?),
                    b"c" if self.in_row => {
                        let (col, cell_type) = parse_cell_attrs(&e)?;
                        Step::OpenCell(col, cell_type)
                    }
                    b"v" if self.in_cell => Step::BeginCapture,
                    b"is" if self.in_cell => Step::EnterInline,
                    b"t" if self.in_inline => Step::BeginCapture,
                    _ => Step::Nothing,
                },
                Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    // A self-closing row is present in the XML and must
                    // be emitted, as the empty sequence.
                    b"row" if self.in_sheet_data => Step::EmptyRow,
                    // A self-closing cell occupies its column with the
                    // empty string.
                    b"c" if self.in_row => {
                        let (col, cell_type) = parse_cell_attrs(&e)?;
                        Step::EmptyCell(col, cell_type)
                    }
                    _ => Step::Nothing,
                },
                Ok(Event::Text(e)) if self.capturing => {
                    Step::Text(e.unescape().map_err(Error::from_xml)?.into_owned())
                }
                Ok(Event::CData(e)) if self.capturing => {
                    Step::Text(String::from_utf8_lossy(&e).into_owned())
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"v" => Step::EndCapture,
                    b"t" if self.in_inline => Step::EndCapture,
                    b"is" => Step::ExitInline,
                    b"c" if self.in_cell => Step::CloseCell,
                    b"row" if self.in_row => Step::CloseRow,
                    b"sheetData" => Step::ExitSheetData,
                    _ => Step::Nothing,
                },
                Ok(Event::Eof) => Step::Eof,
                Err(e) => return Err(Error::from_xml(e)),
                _ => Step::Nothing,
            };

            match step {
                Step::Nothing => {}
                Step::EnterSheetData => self.in_sheet_data = true,
                Step::ExitSheetData | Step::Eof => return Ok(None),
                Step::OpenRow(declared) => {
                    log::trace!("row {declared:?} opened");
                    self.in_row = true;
                    self.cells.clear();
                    self.max_col = None;
                    self.next_col = 0;
                }
                Step::EmptyRow => {
                    self.in_row = true;
                    self.cells.clear();
                    self.max_col = None;
                    return Ok(Some(self.emit_row()));
                }
                Step::OpenCell(col, cell_type) => {
                    self.in_cell = true;
                    self.cell_col = col;
                    self.cell_type = cell_type;
                    self.value.clear();
                }
                Step::EmptyCell(col, cell_type) => {
                    self.in_cell = true;
                    self.cell_col = col;
                    self.cell_type = cell_type;
                    self.value.clear();
                    self.close_cell()?;
                }
                Step::BeginCapture => self.capturing = true,
                Step::EndCapture => self.capturing = false,
                Step::EnterInline => self.in_inline = true,
                Step::ExitInline => self.in_inline = false,
                Step::Text(text) => self.value.push_str(&text),
                Step::CloseCell => self.close_cell()?,
                Step::CloseRow => return Ok(Some(self.emit_row())),
            }
        }
    }

    /// Finalize the current cell into the sparse row.
    fn close_cell(&mut self) -> Result<()> {
        self.in_cell = false;
        self.in_inline = false;
        self.capturing = false;

        // Cells without an address take the next column after the
        // previous cell in the same row.
        let col = self.cell_col.take().unwrap_or(self.next_col);
        if col >= MAX_COLUMNS {
            return Err(Error::BadCellAddress(format!("column {col}")));
        }

        let value = match self.cell_type {
            CellType::SharedString => {
                let raw = self.value.trim();
                let index: usize = raw.parse().map_err(|_| {
                    Error::MalformedXml(format!("invalid shared string reference {raw:?}"))
                })?;
                self.shared
                    .get(index)
                    .ok_or(Error::SharedStringIndex(index))?
                    .to_string()
            }
            CellType::Boolean => match self.value.trim() {
                "0" => "false".to_string(),
                "1" => "true".to_string(),
                other => other.to_string(),
            },
            // Numeric and error literals, formula string results, and
            // inline text all pass through verbatim.
            _ => std::mem::take(&mut self.value),
        };

        self.next_col = col + 1;
        self.max_col = Some(self.max_col.map_or(col, |m| m.max(col)));
        self.cells.push((col, value));
        Ok(())
    }

    /// Convert the sparse row into its dense form and reset row state.
    fn emit_row(&mut self) -> Vec<String> {
        self.in_row = false;
        self.rows_emitted += 1;
        if self.rows_emitted % PROGRESS_EVERY == 0 {
            log::debug!("streamed {} rows", self.rows_emitted);
        }

        let Some(max) = self.max_col.take() else {
            self.cells.clear();
            return Vec::new();
        };
        let mut dense = vec![String::new(); (max + 1) as usize];
        for (col, value) in self.cells.drain(..) {
            dense[col as usize] = value;
        }
        dense
    }
}

impl<R: Read> Iterator for RowStream<R> {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.advance() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.finished = true;
                log::debug!("worksheet complete after {} rows", self.rows_emitted);
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
