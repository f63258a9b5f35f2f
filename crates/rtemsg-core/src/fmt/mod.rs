// crates/rtemsg-core/src/fmt/mod.rs
//
// Compiler for the format definition files. Directives live inside `//`
// line comments so the same files double as C headers for the embedded
// firmware; the `-c` mode regenerates them with `#define NAME id` lines.
//
// Error discipline: every parse routine returns PResult. An Err(LineAbort)
// means the error was already reported; the per-file loop resets the
// in-progress message to a safe default and continues with the next line.

pub mod escape;
pub mod report;

mod directive;
mod fmt_string;
mod msg;
mod workfile;

use std::path::{Path, PathBuf};

use crate::codes::ErrorCode;
use crate::config::{MAX_INCLUDE_DEPTH, MAX_INPUT_LINE_LENGTH, RTE_MAIN_FMT_FILE};
use crate::descriptor::{DescHandle, DescriptorTable, FieldDescriptor, PrintType};
use crate::params::Params;
use crate::stats::StatsPool;
use crate::symbols::{EnumIdx, SymbolTable};

use report::{LineAbort, PResult, ParseReporter};
use workfile::WorkFile;

/// Character cursor over one input line.
pub(crate) struct Cursor<'a> {
    s: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(s: &'a str) -> Self {
        Cursor { s, pos: 0 }
    }

    pub fn rest(&self) -> &'a str {
        &self.s[self.pos..]
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.s.len()
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    pub fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    pub fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.rest().starts_with(kw) {
            self.pos += kw.len();
            true
        } else {
            false
        }
    }

    /// Longest run of alphanumerics and '_' at the cursor.
    pub fn take_name(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        &self.s[start..self.pos]
    }

    /// Decimal unsigned integer; None if no digit at the cursor.
    pub fn take_unsigned(&mut self) -> Option<u32> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        self.s[start..self.pos].parse().ok()
    }

    /// Longest prefix parseable as a float (strtod-like); None if none.
    pub fn take_f64(&mut self) -> Option<f64> {
        let rest = self.rest().as_bytes();
        let mut len = 0usize;

        if len < rest.len() && (rest[len] == b'+' || rest[len] == b'-') {
            len += 1;
        }
        while len < rest.len() && rest[len].is_ascii_digit() {
            len += 1;
        }
        if len < rest.len() && rest[len] == b'.' {
            len += 1;
            while len < rest.len() && rest[len].is_ascii_digit() {
                len += 1;
            }
        }
        let mantissa_end = len;
        if len < rest.len() && (rest[len] == b'e' || rest[len] == b'E') {
            let mut e = len + 1;
            if e < rest.len() && (rest[e] == b'+' || rest[e] == b'-') {
                e += 1;
            }
            let digits = e;
            while e < rest.len() && rest[e].is_ascii_digit() {
                e += 1;
            }
            if e > digits {
                len = e;
            }
        }

        let text = &self.rest()[..len];
        match text.parse::<f64>() {
            Ok(v) => {
                self.pos += len;
                Some(v)
            }
            Err(_) => {
                let text = &self.rest()[..mantissa_end];
                let v = text.parse::<f64>().ok()?;
                self.pos += mantissa_end;
                Some(v)
            }
        }
    }

    /// Text up to (and consuming) the stop character; None when the stop
    /// character is missing.
    pub fn take_until(&mut self, stop: char) -> Option<&'a str> {
        let rest = self.rest();
        let pos = rest.find(stop)?;
        let out = &rest[..pos];
        self.pos += pos + stop.len_utf8();
        Some(out)
    }

    /// Quoted string argument; handles `\"` and `\\` inside. The cursor
    /// ends up past the closing quote. None when there is no quoted
    /// string at the cursor.
    pub fn take_quoted(&mut self) -> Option<String> {
        self.skip_ws();
        if !self.eat('"') {
            return None;
        }

        let mut out = String::new();
        loop {
            let c = self.bump()?;
            match c {
                '"' => return Some(out),
                '\\' => match self.peek() {
                    Some(q @ ('"' | '\\')) => {
                        self.bump();
                        out.push('\\');
                        out.push(q);
                    }
                    _ => out.push('\\'),
                },
                other => out.push(other),
            }
        }
    }
}

/// Flags collected while parsing one input line.
#[derive(Default)]
struct LineState {
    new_message: Option<DescHandle>,
    in_file_select: bool,
    out_file_select: bool,
}

/// Per-file parsing context.
struct FileCtx {
    /// File name as written in INCLUDE (for error reports).
    name: String,
    /// A `.fmt` source regenerates a header; C directives inside it are
    /// an error, in any other source they are leftovers to drop.
    is_fmt_source: bool,
    line_no: u32,
    line: LineState,
    work: Option<WorkFile>,
}

pub struct Compiler<'a> {
    pub params: &'a Params,
    pub table: &'a mut DescriptorTable,
    pub symbols: &'a mut SymbolTable,
    pub stats: &'a mut StatsPool,
    pub reporter: &'a mut ParseReporter,

    include_stack: Vec<PathBuf>,

    // Message state shared by the directives of one file.
    cur_msg: Option<DescHandle>,
    prev_msg: Option<DescHandle>,
    bit_cursor: u32,
    cur_in_file: EnumIdx,
    cur_out_file: EnumIdx,
    prev_out_file: EnumIdx,
    to_main_log: bool,
}

impl<'a> Compiler<'a> {
    pub fn new(
        params: &'a Params,
        table: &'a mut DescriptorTable,
        symbols: &'a mut SymbolTable,
        stats: &'a mut StatsPool,
        reporter: &'a mut ParseReporter,
    ) -> Self {
        Compiler {
            params,
            table,
            symbols,
            stats,
            reporter,
            include_stack: Vec::new(),
            cur_msg: None,
            prev_msg: None,
            bit_cursor: 0,
            cur_in_file: 0,
            cur_out_file: 0,
            prev_out_file: 0,
            to_main_log: false,
        }
    }

    /// Compile the main format file and everything it includes.
    /// Returns true when no errors were reported.
    pub fn compile(&mut self) -> bool {
        self.parse_file(RTE_MAIN_FMT_FILE);
        self.reporter.total_errors == 0
    }

    fn fmt_path(&self, name: &str) -> PathBuf {
        let p = Path::new(name);
        if p.is_absolute() {
            p.to_owned()
        } else {
            self.params.fmt_folder.join(p)
        }
    }

    pub(crate) fn parse_file(&mut self, name: &str) {
        let path = self.fmt_path(name);
        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());

        if self.include_stack.len() >= MAX_INCLUDE_DEPTH {
            self.reporter.report(
                name,
                0,
                ErrorCode::ParseIncludeDepth,
                &MAX_INCLUDE_DEPTH.to_string(),
            );
            return;
        }

        if self.include_stack.contains(&canonical) {
            self.reporter.report(name, 0, ErrorCode::ParseIncludeCycle, name);
            return;
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => {
                self.reporter.report(name, 0, ErrorCode::ParseCannotOpenFmtFile, name);
                return;
            }
        };

        self.include_stack.push(canonical);

        let mut ctx = FileCtx {
            name: name.to_owned(),
            is_fmt_source: path.extension().is_some_and(|e| e == "fmt"),
            line_no: 0,
            line: LineState::default(),
            work: if self.params.check_syntax_and_compile {
                Some(WorkFile::new(&path))
            } else {
                None
            },
        };

        // The include file gets a fresh message scope; the parent scope
        // is restored once the include completes.
        let saved = (
            self.cur_msg,
            self.prev_msg,
            self.bit_cursor,
            self.cur_in_file,
            self.cur_out_file,
            self.prev_out_file,
            self.to_main_log,
        );
        self.cur_msg = None;
        self.prev_msg = None;
        self.bit_cursor = 0;
        self.cur_in_file = 0;
        self.cur_out_file = 0;
        self.prev_out_file = 0;
        self.to_main_log = false;

        for raw_line in content.lines() {
            if self.reporter.limit_reached() {
                break;
            }

            ctx.line_no += 1;
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

            if let Err(LineAbort) = self.parse_input_line(&mut ctx, line) {
                self.set_default_fmt();
                ctx.line = LineState::default();
            }
        }

        self.check_last_msg_empty(&ctx);

        if let Some(work) = ctx.work.take() {
            let failed = self.reporter.total_errors > 0;
            if let Err(code) = work.finish(failed, self.params.create_backup) {
                self.reporter.report(&ctx.name, ctx.line_no, code, &ctx.name);
            }
        }

        self.include_stack.pop();

        (
            self.cur_msg,
            self.prev_msg,
            self.bit_cursor,
            self.cur_in_file,
            self.cur_out_file,
            self.prev_out_file,
            self.to_main_log,
        ) = saved;
    }

    fn parse_input_line(&mut self, f: &mut FileCtx, line: &str) -> PResult<()> {
        if line.len() >= MAX_INPUT_LINE_LENGTH - 4 {
            return self.abort(f, ErrorCode::ParseLineTooLong, "");
        }

        let trimmed = line.trim_start();

        if trimmed.starts_with('#') {
            // `#define` and friends from a previous -c run are dropped and
            // regenerated. Inside a `.fmt` source they are an error.
            if f.is_fmt_source {
                return self.abort(f, ErrorCode::ParseCDirectivesNotAllowed, trimmed);
            }
            return Ok(());
        }

        if let Some(work) = &mut f.work {
            work.echo_line(line);
        }

        if trimmed.is_empty() {
            return Ok(());
        }

        if self.is_commented_out(f, trimmed)? {
            return Ok(());
        }

        let Some(rest) = trimmed.strip_prefix("//") else {
            return self.abort(f, ErrorCode::ParseUnrecognizedDirective, line);
        };

        let mut cur = Cursor::new(rest);
        loop {
            cur.skip_ws();
            if cur.at_end() {
                break;
            }
            self.parse_directive(f, &mut cur)?;
        }

        f.line = LineState::default();
        Ok(())
    }

    /// Full-line C comments are skipped; the comment must close on the
    /// same line.
    fn is_commented_out(&mut self, f: &mut FileCtx, trimmed: &str) -> PResult<bool> {
        if !trimmed.starts_with("/*") {
            return Ok(false);
        }

        if !trimmed.trim_end().ends_with("*/") {
            return self.abort(f, ErrorCode::ParseUnfinishedComment, trimmed);
        }

        Ok(true)
    }

    // --- shared helpers used by the directive parsers ---

    pub(crate) fn abort<T>(&mut self, f: &FileCtx, code: ErrorCode, context: &str) -> PResult<T> {
        self.reporter.abort(&f.name, f.line_no, code, context)
    }

    pub(crate) fn report(&mut self, f: &FileCtx, code: ErrorCode, context: &str) {
        self.reporter.report(&f.name, f.line_no, code, context);
    }

    /// Report (without aborting) a message that never received a
    /// formatting string, and give it an empty default so the report is
    /// not repeated.
    fn check_last_msg_empty(&mut self, f: &FileCtx) {
        if let Some(handle) = self.cur_msg {
            if self.table.by_handle(handle).fields.is_empty() {
                let name = self.table.by_handle(handle).name.clone();
                self.report(f, ErrorCode::ParseMsgEmpty, &name);
                self.set_default_fmt();
            }
        }
    }

    /// Error recovery: make sure a half-built message prints as nothing
    /// instead of cascading more errors.
    fn set_default_fmt(&mut self) {
        if let Some(handle) = self.cur_msg {
            let desc = self.table.by_handle_mut(handle);
            if desc.fields.is_empty() {
                desc.fields.push(FieldDescriptor {
                    print_type: PrintType::PlainText,
                    ..Default::default()
                });
            }
        }
    }

    /// Common prologue of every non-message directive.
    fn reset_for_keyword(&mut self, f: &mut FileCtx) {
        self.check_last_msg_empty(f);
        f.line.new_message = None;
        f.line.in_file_select = false;
        f.line.out_file_select = false;
        self.cur_msg = None;
    }

    fn check_opening_bracket(&mut self, f: &FileCtx, cur: &mut Cursor) -> PResult<()> {
        cur.skip_ws();
        if !cur.eat('(') {
            return self.abort(f, ErrorCode::ParseNoOpeningBracket, cur.rest());
        }
        cur.skip_ws();
        Ok(())
    }

    fn check_closing_bracket(&mut self, f: &FileCtx, cur: &mut Cursor) -> PResult<()> {
        cur.skip_ws();
        if !cur.eat(')') {
            return self.abort(f, ErrorCode::ParseNoClosingBracket, cur.rest());
        }
        cur.skip_ws();
        if !cur.at_end() {
            return self.abort(f, ErrorCode::ParseSurplusText, cur.rest());
        }
        Ok(())
    }

    fn parse_name(&mut self, f: &FileCtx, cur: &mut Cursor) -> PResult<String> {
        cur.skip_ws();
        let name = cur.take_name();
        if name.is_empty() {
            return self.abort(f, ErrorCode::ParseInvalidName, cur.rest());
        }
        Ok(name.to_owned())
    }

    fn parse_unsigned(&mut self, f: &FileCtx, cur: &mut Cursor) -> PResult<u32> {
        cur.skip_ws();
        match cur.take_unsigned() {
            Some(v) => Ok(v),
            None => self.abort(f, ErrorCode::ParseValueInvalidChar, cur.rest()),
        }
    }

    fn write_define(&mut self, f: &mut FileCtx, name: &str, value: u32) {
        if self.params.purge_defines {
            return;
        }
        if let Some(work) = &mut f.work {
            work.add_define(name, value);
        }
    }
}
