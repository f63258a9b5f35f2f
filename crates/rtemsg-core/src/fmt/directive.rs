// crates/rtemsg-core/src/fmt/directive.rs
//
// Dispatch and parsing of the non-message directives. A directive must
// be the only thing on its line (apart from the leading `//`); only the
// MSG directives, the </>/>>, selections and a formatting string chain.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};

use crate::codes::ErrorCode;
use crate::config::MAX_IN_FILE_SIZE;
use crate::descriptor::SpecialFmt;
use crate::symbols::{IndexedText, OutFile};
use crate::vcd;

use super::report::PResult;
use super::{escape, Compiler, Cursor, FileCtx};

impl<'a> Compiler<'a> {
    pub(super) fn parse_directive(&mut self, f: &mut FileCtx, cur: &mut Cursor) -> PResult<()> {
        let rest = cur.rest();

        if rest.starts_with('"') {
            self.parse_fmt_text(f, cur)
        } else if rest.starts_with("MEMO") {
            self.parse_memo(f, cur)
        } else if rest.starts_with('>') {
            self.parse_select_out_file(f, cur)
        } else if rest.starts_with('<') {
            self.parse_select_in_file(f, cur)
        } else if rest.starts_with('M') || rest.starts_with('E') {
            self.parse_msg_directives(f, cur)
        } else if rest.starts_with("FILTER") {
            self.parse_filter(f, cur)
        } else if rest.starts_with("INCLUDE") {
            self.parse_include(f, cur)
        } else if rest.starts_with("OUT_FILE") {
            self.parse_out_file(f, cur)
        } else if rest.starts_with("IN_FILE") {
            self.parse_in_file(f, cur)
        } else if rest.starts_with("FMT_ALIGN") {
            self.parse_fmt_align(f, cur)
        } else if rest.starts_with("FMT_START") {
            self.parse_fmt_start(f, cur)
        } else {
            self.abort(f, ErrorCode::ParseUnrecognizedDirective, rest)
        }
    }

    /// Quoted formatting string: split into per-value field descriptors.
    fn parse_fmt_text(&mut self, f: &mut FileCtx, cur: &mut Cursor) -> PResult<()> {
        let Some(raw) = cur.take_quoted() else {
            return self.abort(f, ErrorCode::ParseInvalidText, cur.rest());
        };

        let text = escape::process_escape_sequences(&raw);

        let fields_before = self.cur_msg.map(|h| self.table.by_handle(h).fields.len());
        self.parse_fields(f, &text)?;

        // A string bound to a VCD sink becomes one variable record: all of
        // its fields feed the sink's assembly, the last one finalizes it.
        let is_vcd = self
            .symbols
            .out_file(self.cur_out_file)
            .is_some_and(|o| o.vcd.is_some());

        if is_vcd {
            if let Err(code) = vcd::check_variable_format(&text) {
                return self.abort(f, code, &text);
            }

            if let (Some(handle), Some(before)) = (self.cur_msg, fields_before) {
                let fields = &mut self.table.by_handle_mut(handle).fields;
                let last = fields.len().saturating_sub(1);
                for (i, field) in fields.iter_mut().enumerate().skip(before) {
                    field.special_fmt =
                        if i == last { SpecialFmt::VcdFinalize } else { SpecialFmt::VcdWork };
                }
            }
        }

        self.cur_in_file = 0;
        self.cur_out_file = 0;
        self.to_main_log = false;

        cur.skip_ws();
        if !cur.at_end() {
            return self.abort(f, ErrorCode::ParseSurplusText, cur.rest());
        }

        Ok(())
    }

    fn parse_memo(&mut self, f: &mut FileCtx, cur: &mut Cursor) -> PResult<()> {
        self.reset_for_keyword(f);
        cur.eat_keyword("MEMO");
        self.check_opening_bracket(f, cur)?;

        let name = self.parse_name(f, cur)?;
        let mut initial = 0.0;

        cur.skip_ws();
        if cur.eat(',') {
            cur.skip_ws();
            match cur.take_f64() {
                Some(v) => initial = v,
                None => return self.abort(f, ErrorCode::ParseMemoInitVal, cur.rest()),
            }
        }

        self.check_closing_bracket(f, cur)?;

        if let Err(code) = self.symbols.add_memo(&name, initial) {
            if code == ErrorCode::ParseMaxEnums {
                self.reporter.stop_parsing();
            }
            return self.abort(f, code, &name);
        }

        Ok(())
    }

    fn parse_filter(&mut self, f: &mut FileCtx, cur: &mut Cursor) -> PResult<()> {
        self.reset_for_keyword(f);
        cur.eat_keyword("FILTER");
        self.check_opening_bracket(f, cur)?;

        let name = self.parse_name(f, cur)?;
        let mut description = None;

        cur.skip_ws();
        if cur.eat(',') {
            let Some(desc) = cur.take_quoted() else {
                return self.abort(f, ErrorCode::ParseFilterDesc, cur.rest());
            };
            if desc.is_empty() {
                return self.abort(f, ErrorCode::ParseFilterDesc, cur.rest());
            }
            description = Some(escape::process_escape_sequences(&desc));
        }

        self.check_closing_bracket(f, cur)?;

        match self.symbols.add_filter(&name, description) {
            Ok(idx) => {
                self.write_define(f, &name, idx as u32);
                Ok(())
            }
            Err(code) => self.abort(f, code, &name),
        }
    }

    fn parse_include(&mut self, f: &mut FileCtx, cur: &mut Cursor) -> PResult<()> {
        self.reset_for_keyword(f);
        cur.eat_keyword("INCLUDE");
        self.check_opening_bracket(f, cur)?;

        let Some(path) = cur.take_quoted() else {
            return self.abort(f, ErrorCode::ParseFilePath, cur.rest());
        };

        self.check_closing_bracket(f, cur)?;
        self.parse_file(&path);
        Ok(())
    }

    fn parse_in_file(&mut self, f: &mut FileCtx, cur: &mut Cursor) -> PResult<()> {
        self.reset_for_keyword(f);
        cur.eat_keyword("IN_FILE");
        self.check_opening_bracket(f, cur)?;

        let name = self.parse_name(f, cur)?;

        cur.skip_ws();
        if !cur.eat(',') {
            return self.abort(f, ErrorCode::ParseExpectingComma, cur.rest());
        }

        let Some(path) = cur.take_quoted() else {
            return self.abort(f, ErrorCode::ParseFilePath, cur.rest());
        };

        self.check_closing_bracket(f, cur)?;

        if self.symbols.file_path_in_use(&path, false) {
            return self.abort(f, ErrorCode::ParseDuplicateName, &path);
        }

        let text = if self.params.check_syntax_and_compile {
            IndexedText::default()
        } else {
            self.read_in_file(f, &path)?
        };

        if let Err(code) = self.symbols.add_in_file(&name, &path, text) {
            if code == ErrorCode::ParseMaxEnums {
                self.reporter.stop_parsing();
            }
            return self.abort(f, code, &name);
        }

        Ok(())
    }

    fn read_in_file(&mut self, f: &FileCtx, path: &str) -> PResult<IndexedText> {
        let full = self.params.fmt_folder.join(path);

        match std::fs::metadata(&full) {
            Ok(meta) if meta.len() > MAX_IN_FILE_SIZE => {
                return self.abort(f, ErrorCode::ParseInFileTooLong, path);
            }
            Ok(_) => {}
            Err(_) => return self.abort(f, ErrorCode::ParseInFileSelectError, path),
        }

        let content = match std::fs::read_to_string(&full) {
            Ok(c) => c,
            Err(_) => return self.abort(f, ErrorCode::ParseInFileSelectError, path),
        };

        match IndexedText::from_file_text(&content) {
            Ok(text) => Ok(text),
            Err(code) => self.abort(f, code, path),
        }
    }

    fn parse_out_file(&mut self, f: &mut FileCtx, cur: &mut Cursor) -> PResult<()> {
        self.reset_for_keyword(f);
        cur.eat_keyword("OUT_FILE");
        self.check_opening_bracket(f, cur)?;

        let name = self.parse_name(f, cur)?;

        cur.skip_ws();
        if !cur.eat(',') {
            return self.abort(f, ErrorCode::ParseExpectingComma, cur.rest());
        }
        let Some(path) = cur.take_quoted() else {
            return self.abort(f, ErrorCode::ParseFilePath, cur.rest());
        };

        cur.skip_ws();
        if !cur.eat(',') {
            return self.abort(f, ErrorCode::ParseExpectingComma, cur.rest());
        }
        let Some(mode) = cur.take_quoted() else {
            return self.abort(f, ErrorCode::ParseFileMode, cur.rest());
        };
        self.check_file_mode(f, &mode)?;

        let mut init_text = String::new();
        cur.skip_ws();
        if cur.eat(',') {
            match cur.take_quoted() {
                Some(text) => init_text = text,
                None => return self.abort(f, ErrorCode::ParseOutFileInitText, cur.rest()),
            }
        }

        self.check_closing_bracket(f, cur)?;

        if self.symbols.file_path_in_use(&path, true) {
            return self.abort(f, ErrorCode::ParseDuplicateName, &path);
        }

        let writer = if self.params.check_syntax_and_compile {
            None
        } else {
            let full = self.params.working_folder.join(&path);
            let mut opts = OpenOptions::new();
            opts.write(true);
            if mode.contains('x') {
                opts.create_new(true);
            } else if mode.contains('a') {
                opts.create(true).append(true);
            } else {
                opts.create(true).truncate(true);
            }

            match opts.open(&full) {
                Ok(mut file) => {
                    if !init_text.is_empty() && file.write_all(init_text.as_bytes()).is_err() {
                        return self.abort(f, ErrorCode::ParseOutNotCreated, &path);
                    }
                    Some(BufWriter::new(file))
                }
                Err(_) => return self.abort(f, ErrorCode::ParseOutNotCreated, &path),
            }
        };

        let vcd_data = if vcd::is_a_vcd_file(&path) {
            Some(Box::default())
        } else {
            None
        };

        let out = OutFile { path, mode, writer, vcd: vcd_data };
        if let Err(code) = self.symbols.add_out_file(&name, out) {
            if code == ErrorCode::ParseMaxEnums {
                self.reporter.stop_parsing();
            }
            return self.abort(f, code, &name);
        }

        Ok(())
    }

    /// Only the fopen-like mode characters are accepted.
    fn check_file_mode(&mut self, f: &FileCtx, mode: &str) -> PResult<()> {
        if mode.is_empty() {
            return self.abort(f, ErrorCode::ParseFileModeEmpty, "");
        }

        for c in mode.chars() {
            if !matches!(c, 'w' | 'a' | 'b' | 'x' | 't' | '+') {
                return self.abort(f, ErrorCode::ParseErrorInFileMode, mode);
            }
        }

        Ok(())
    }

    fn parse_fmt_align(&mut self, f: &mut FileCtx, cur: &mut Cursor) -> PResult<()> {
        self.reset_for_keyword(f);
        cur.eat_keyword("FMT_ALIGN");
        self.check_opening_bracket(f, cur)?;

        let value = self.parse_unsigned(f, cur)?;

        if value > self.table.topmost_fmt_id {
            self.reporter.stop_parsing();
            return self.abort(f, ErrorCode::ParseFmtAlignOverMax, cur.rest());
        }

        if !value.is_power_of_two() {
            return self.abort(f, ErrorCode::ParseFmtAlignPwrOf2, cur.rest());
        }

        self.table.align_to(value);
        self.check_closing_bracket(f, cur)
    }

    fn parse_fmt_start(&mut self, f: &mut FileCtx, cur: &mut Cursor) -> PResult<()> {
        self.reset_for_keyword(f);
        cur.eat_keyword("FMT_START");
        self.check_opening_bracket(f, cur)?;

        let value = self.parse_unsigned(f, cur)?;

        if value >= self.table.topmost_fmt_id {
            self.reporter.stop_parsing();
            return self.abort(f, ErrorCode::ParseFmtAlignOverMax, cur.rest());
        }

        if self.table.fmt_ids_defined > value {
            return self.abort(f, ErrorCode::ParseFmtStartAlignment, cur.rest());
        }

        self.table.set_start(value);
        self.check_closing_bracket(f, cur)
    }

    /// `<NAME`: bind the input file for the next formatting string.
    fn parse_select_in_file(&mut self, f: &mut FileCtx, cur: &mut Cursor) -> PResult<()> {
        if f.line.in_file_select {
            return self.abort(f, ErrorCode::ParseSelectInFileMultipleInLine, cur.rest());
        }
        f.line.in_file_select = true;

        cur.eat('<');
        let name = self.parse_name(f, cur)?;

        if self.cur_msg.is_none() {
            return self.abort(f, ErrorCode::ParseInOutSelectNoMsg, cur.rest());
        }

        match self.symbols.find_in_file(&name) {
            Some(idx) => {
                self.cur_in_file = idx;
                Ok(())
            }
            None => self.abort(f, ErrorCode::ParseInSelectUndefined, &name),
        }
    }

    /// `>NAME` or `>>NAME`: bind the output sink for the next formatting
    /// string; the double arrow duplicates the output to Main.log.
    fn parse_select_out_file(&mut self, f: &mut FileCtx, cur: &mut Cursor) -> PResult<()> {
        if f.line.out_file_select {
            return self.abort(f, ErrorCode::ParseSelectOutFileMultipleInLine, cur.rest());
        }
        f.line.out_file_select = true;

        cur.eat('>');
        let duplicate = cur.eat('>');
        let name = self.parse_name(f, cur)?;

        if self.cur_msg.is_none() {
            return self.abort(f, ErrorCode::ParseInOutSelectNoMsg, cur.rest());
        }

        match self.symbols.find_out_file(&name) {
            Some(idx) => {
                self.cur_out_file = idx;
                self.to_main_log = duplicate;
                Ok(())
            }
            None => self.abort(f, ErrorCode::ParseOutSelectUndefined, &name),
        }
    }
}
