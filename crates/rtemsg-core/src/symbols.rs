// crates/rtemsg-core/src/symbols.rs
//
// Named scopes of the format compiler: filters, memos, input files,
// output files and inline `{a|b|...}` text tables. Filters occupy the
// fixed index range 0..32; all other names share one dense index space
// starting at 32. Index 0 therefore doubles as "unset" in descriptors.

use std::fs::File;
use std::io::BufWriter;

use crate::codes::ErrorCode;
use crate::config::{MAX_ENUMS, NUMBER_OF_FILTER_BITS};
use crate::vcd::VcdFileData;

pub type EnumIdx = u16;

/// Length-prefixed sequence of short strings, addressable by ordinal.
/// Each record is `len_byte (1..=255) || bytes`; a zero length byte
/// terminates the blob. Lookups walk the records without allocating.
#[derive(Debug, Clone, Default)]
pub struct IndexedText {
    blob: Vec<u8>,
}

impl IndexedText {
    /// Build the blob from a list of options. Each option must be
    /// 1..=255 bytes long and at least two options are required.
    pub fn from_options(options: &[&str]) -> Result<Self, ErrorCode> {
        if options.len() < 2 {
            return Err(ErrorCode::ParseIndexedTextAtLeast2Options);
        }

        let mut blob = Vec::new();

        for opt in options {
            let bytes = opt.as_bytes();
            if bytes.is_empty() || bytes.len() > 255 {
                return Err(ErrorCode::ParseBadIndexedTextLength);
            }
            blob.push(bytes.len() as u8);
            blob.extend_from_slice(bytes);
        }

        blob.push(0);
        Ok(IndexedText { blob })
    }

    /// Build the blob from the raw contents of an IN_FILE source: one
    /// record per line, line length 1..=255 bytes without the newline.
    pub fn from_file_text(text: &str) -> Result<Self, ErrorCode> {
        let mut lines = Vec::new();

        for line in text.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            lines.push(line);
        }

        // Drop a trailing empty line produced by a final newline
        if lines.last() == Some(&"") {
            lines.pop();
        }

        for line in &lines {
            if line.is_empty() || line.len() > 255 {
                return Err(ErrorCode::ParseInFileSelectInvalidOptions);
            }
        }

        IndexedText::from_options(&lines).map_err(|e| match e {
            ErrorCode::ParseIndexedTextAtLeast2Options => ErrorCode::ParseInFileSelectMinTwoLines,
            other => other,
        })
    }

    /// Look up the record with the given zero-based ordinal. An index past
    /// the last record clamps to the last record.
    pub fn lookup(&self, index: u64) -> &str {
        let mut pos = 0usize;
        let mut remaining = index;
        let mut last = "";

        loop {
            let len = match self.blob.get(pos) {
                None | Some(0) => return last,
                Some(&len) => len as usize,
            };

            let record = &self.blob[pos + 1..pos + 1 + len];
            last = std::str::from_utf8(record).unwrap_or("");

            if remaining == 0 {
                return last;
            }

            remaining -= 1;
            pos += 1 + len;
        }
    }

    /// Raw on-disk shape of the blob (tests diff this byte-exactly).
    pub fn as_bytes(&self) -> &[u8] {
        &self.blob
    }
}

#[derive(Debug, Default)]
pub struct Filter {
    pub name: String,
    pub description: Option<String>,
}

/// Per-sink state of an OUT_FILE. A `.vcd` path switches the sink into
/// VCD mode: decoded values are assembled into variable records instead
/// of being written as text.
pub struct OutFile {
    pub path: String,
    pub mode: String,
    pub writer: Option<BufWriter<File>>,
    pub vcd: Option<Box<VcdFileData>>,
}

pub enum SymbolData {
    Memo { value: f64 },
    InFile { path: String, text: IndexedText },
    OutFile(OutFile),
    InlineText { text: IndexedText },
}

pub struct SymbolEntry {
    pub name: String,
    pub data: SymbolData,
}

#[derive(Default)]
pub struct SymbolTable {
    filters: Vec<Option<Filter>>,
    entries: Vec<SymbolEntry>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable { filters: (0..NUMBER_OF_FILTER_BITS).map(|_| None).collect(), entries: Vec::new() }
    }

    pub fn filter_count(&self) -> usize {
        self.filters.iter().filter(|f| f.is_some()).count()
    }

    pub fn filters(&self) -> impl Iterator<Item = (usize, &Filter)> {
        self.filters.iter().enumerate().filter_map(|(i, f)| f.as_ref().map(|f| (i, f)))
    }

    /// Total number of occupied indexes (filters range included).
    pub fn len(&self) -> usize {
        NUMBER_OF_FILTER_BITS + self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.filter_count() == 0
    }

    fn name_in_use(&self, name: &str) -> bool {
        self.filters.iter().flatten().any(|f| f.name == name)
            || self.entries.iter().any(|e| e.name == name && e.name != "#Y_TEXT")
    }

    /// Register a filter. Filters must carry the `F_` prefix and fit into
    /// the 32 filter bits.
    pub fn add_filter(
        &mut self,
        name: &str,
        description: Option<String>,
    ) -> Result<EnumIdx, ErrorCode> {
        if !name.starts_with("F_") {
            return Err(ErrorCode::ParseBadPrefix);
        }

        if self.name_in_use(name) {
            return Err(ErrorCode::ParseDuplicateName);
        }

        let slot = self
            .filters
            .iter()
            .position(|f| f.is_none())
            .ok_or(ErrorCode::ParseFilterMaxEnums)?;

        self.filters[slot] = Some(Filter { name: name.to_owned(), description });
        Ok(slot as EnumIdx)
    }

    fn push_entry(&mut self, entry: SymbolEntry) -> Result<EnumIdx, ErrorCode> {
        if self.len() >= MAX_ENUMS {
            return Err(ErrorCode::ParseMaxEnums);
        }

        let idx = (NUMBER_OF_FILTER_BITS + self.entries.len()) as EnumIdx;
        self.entries.push(entry);
        Ok(idx)
    }

    /// Register a memo. Memos must carry the `M_` prefix.
    pub fn add_memo(&mut self, name: &str, initial: f64) -> Result<EnumIdx, ErrorCode> {
        if !name.starts_with("M_") {
            return Err(ErrorCode::ParseBadPrefix);
        }

        if self.name_in_use(name) {
            return Err(ErrorCode::ParseDuplicateName);
        }

        self.push_entry(SymbolEntry {
            name: name.to_owned(),
            data: SymbolData::Memo { value: initial },
        })
    }

    pub fn add_in_file(
        &mut self,
        name: &str,
        path: &str,
        text: IndexedText,
    ) -> Result<EnumIdx, ErrorCode> {
        if self.name_in_use(name) {
            return Err(ErrorCode::ParseDuplicateName);
        }

        self.push_entry(SymbolEntry {
            name: name.to_owned(),
            data: SymbolData::InFile { path: path.to_owned(), text },
        })
    }

    pub fn add_out_file(&mut self, name: &str, out: OutFile) -> Result<EnumIdx, ErrorCode> {
        if self.name_in_use(name) {
            return Err(ErrorCode::ParseDuplicateName);
        }

        self.push_entry(SymbolEntry { name: name.to_owned(), data: SymbolData::OutFile(out) })
    }

    /// Register an anonymous `{a|b|...}` text table.
    pub fn add_inline_text(&mut self, text: IndexedText) -> Result<EnumIdx, ErrorCode> {
        self.push_entry(SymbolEntry {
            name: "#Y_TEXT".to_owned(),
            data: SymbolData::InlineText { text },
        })
    }

    pub fn get(&self, idx: EnumIdx) -> Option<&SymbolEntry> {
        let idx = idx as usize;
        if idx < NUMBER_OF_FILTER_BITS {
            return None;
        }
        self.entries.get(idx - NUMBER_OF_FILTER_BITS)
    }

    pub fn get_mut(&mut self, idx: EnumIdx) -> Option<&mut SymbolEntry> {
        let idx = idx as usize;
        if idx < NUMBER_OF_FILTER_BITS {
            return None;
        }
        self.entries.get_mut(idx - NUMBER_OF_FILTER_BITS)
    }

    pub fn name_of(&self, idx: EnumIdx) -> &str {
        match self.get(idx) {
            Some(e) => &e.name,
            None => "",
        }
    }

    /// Find a named entry of the given shape.
    pub fn find_memo(&self, name: &str) -> Option<EnumIdx> {
        self.find(name, |d| matches!(d, SymbolData::Memo { .. }))
    }

    pub fn find_in_file(&self, name: &str) -> Option<EnumIdx> {
        self.find(name, |d| matches!(d, SymbolData::InFile { .. }))
    }

    pub fn find_out_file(&self, name: &str) -> Option<EnumIdx> {
        self.find(name, |d| matches!(d, SymbolData::OutFile(_)))
    }

    fn find(&self, name: &str, pred: impl Fn(&SymbolData) -> bool) -> Option<EnumIdx> {
        self.entries
            .iter()
            .position(|e| e.name == name && pred(&e.data))
            .map(|p| (p + NUMBER_OF_FILTER_BITS) as EnumIdx)
    }

    /// Check if a file path is already bound to an IN_FILE / OUT_FILE.
    pub fn file_path_in_use(&self, path: &str, out: bool) -> bool {
        self.entries.iter().any(|e| match &e.data {
            SymbolData::InFile { path: p, .. } if !out => p == path,
            SymbolData::OutFile(f) if out => f.path == path,
            _ => false,
        })
    }

    pub fn memo_value(&self, idx: EnumIdx) -> Option<f64> {
        match self.get(idx)?.data {
            SymbolData::Memo { value } => Some(value),
            _ => None,
        }
    }

    pub fn set_memo_value(&mut self, idx: EnumIdx, value: f64) -> bool {
        match self.get_mut(idx) {
            Some(SymbolEntry { data: SymbolData::Memo { value: slot }, .. }) => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    /// Indexed text of an IN_FILE or inline-text entry.
    pub fn indexed_text(&self, idx: EnumIdx) -> Option<&IndexedText> {
        match &self.get(idx)?.data {
            SymbolData::InFile { text, .. } => Some(text),
            SymbolData::InlineText { text } => Some(text),
            _ => None,
        }
    }

    pub fn out_file(&self, idx: EnumIdx) -> Option<&OutFile> {
        match &self.get(idx)?.data {
            SymbolData::OutFile(f) => Some(f),
            _ => None,
        }
    }

    pub fn out_file_mut(&mut self, idx: EnumIdx) -> Option<&mut OutFile> {
        match &mut self.get_mut(idx)?.data {
            SymbolData::OutFile(f) => Some(f),
            _ => None,
        }
    }

    /// Indexes of all OUT_FILE entries.
    pub fn out_file_indexes(&self) -> Vec<EnumIdx> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e.data, SymbolData::OutFile(_)))
            .map(|(p, _)| (p + NUMBER_OF_FILTER_BITS) as EnumIdx)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_shape_is_length_prefixed() {
        let t = IndexedText::from_options(&["on", "off"]).unwrap();
        assert_eq!(t.as_bytes(), b"\x02on\x03off\x00");
    }

    #[test]
    fn lookup_clamps_to_last() {
        let t = IndexedText::from_options(&["a", "bb", "ccc"]).unwrap();
        assert_eq!(t.lookup(0), "a");
        assert_eq!(t.lookup(2), "ccc");
        assert_eq!(t.lookup(100), "ccc");
    }

    #[test]
    fn at_least_two_records_required() {
        assert!(IndexedText::from_options(&["only"]).is_err());
    }

    #[test]
    fn prefixes_are_enforced() {
        let mut sym = SymbolTable::new();
        assert_eq!(sym.add_filter("X_BAD", None), Err(ErrorCode::ParseBadPrefix));
        assert_eq!(sym.add_memo("BAD", 0.0), Err(ErrorCode::ParseBadPrefix));
        assert!(sym.add_filter("F_OK", None).is_ok());
        assert!(sym.add_memo("M_OK", 1.5).is_ok());
    }

    #[test]
    fn names_are_unique_across_namespaces() {
        let mut sym = SymbolTable::new();
        sym.add_memo("M_X", 0.0).unwrap();
        let text = IndexedText::from_options(&["a", "b"]).unwrap();
        assert_eq!(sym.add_in_file("M_X", "f.txt", text), Err(ErrorCode::ParseDuplicateName));
    }

    #[test]
    fn memo_read_write() {
        let mut sym = SymbolTable::new();
        let idx = sym.add_memo("M_V", 2.0).unwrap();
        assert_eq!(sym.memo_value(idx), Some(2.0));
        assert!(sym.set_memo_value(idx, -1.0));
        assert_eq!(sym.memo_value(idx), Some(-1.0));
        assert!(!sym.set_memo_value(0, 1.0));
    }
}
