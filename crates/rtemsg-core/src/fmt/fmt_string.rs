// crates/rtemsg-core/src/fmt/fmt_string.rs
//
// Splitting of a formatting string into per-value field descriptors.
// Each `%` directive (with its RTEdbg extensions) becomes one field; the
// rendering later processes exactly one value per field. The extensions
// directly follow the `%`:
//
//   [nn:mmF] [mmF] [±nn:mmF]   bit address/size, F in {u,i,f,s}
//   [N] [t] [T] [t-MSG] [M_X]  message number, timestamps, memo recall
//   (±off*mult)                affine scaling
//   {a|b|...}                  inline indexed text for %Y
//   <M_X>                      memo store
//   |name|                     min/max/avg statistics

use crate::codes::ErrorCode;
use crate::descriptor::{DataType, FieldDescriptor, MsgKind, PrintType};
use crate::symbols::{IndexedText, SymbolData};

use super::report::PResult;
use super::{Compiler, Cursor, FileCtx};

/// Conversion characters accepted after the flags/width part.
const TYPE_CHARS: &str = "dicouxXeEfFgGaAtTNWHYBsDM";
/// Types that take no trailing literal text in the same field.
const SPECIAL_TYPES: &str = "tTNWHYBsDM";
/// Characters allowed between '%' and the conversion character.
const FLAG_CHARS: &str = "-+#hl. ";

impl<'a> Compiler<'a> {
    pub(super) fn parse_fields(&mut self, f: &mut FileCtx, text: &str) -> PResult<()> {
        if text.is_empty() {
            return self.abort(f, ErrorCode::ParseEmptyString, "");
        }

        let mut rest = text;
        loop {
            rest = self.parse_one_field(f, rest)?;
            if rest.is_empty() {
                return Ok(());
            }
        }
    }

    /// Parse one field from the front of `text`; returns the remainder.
    fn parse_one_field<'t>(&mut self, f: &mut FileCtx, text: &'t str) -> PResult<&'t str> {
        let Some(msg) = self.cur_msg else {
            return self.abort(f, ErrorCode::ParseNoPriorMsg, text);
        };

        // The bit cursor restarts with a new message and whenever the
        // output binding changes.
        if self.prev_msg != Some(msg) {
            self.prev_msg = Some(msg);
            self.bit_cursor = 0;
        }
        if self.prev_out_file != self.cur_out_file {
            self.bit_cursor = 0;
        }
        self.prev_out_file = self.cur_out_file;

        let mut field = FieldDescriptor {
            out_file: self.cur_out_file,
            in_file: self.cur_in_file,
            also_to_main_log: self.to_main_log,
            ..Default::default()
        };
        let mut value_spec = false;
        let mut indexed_text = false;

        let mut cur = Cursor::new(text);
        let mut buf = String::new();

        loop {
            let Some(c) = cur.bump() else {
                // No directive: the whole piece is plain text.
                field.fmt_string = buf;
                field.print_type = PrintType::PlainText;
                field.bit_size = 0;
                field.bit_address = self.bit_cursor;
                self.table.by_handle_mut(msg).fields.push(field);
                return Ok("");
            };

            if c != '%' {
                buf.push(c);
                continue;
            }

            buf.push('%');
            if cur.eat('%') {
                buf.push('%');
                continue;
            }

            self.parse_extensions(f, &mut cur, &mut field, &mut value_spec, &mut indexed_text)?;

            if !value_spec {
                // No [..] definition: a 32-bit auto value at the cursor.
                field.bit_size = 32;
            }
            field.bit_address = self.bit_cursor;

            while let Some(c2) = cur.peek() {
                if c2.is_ascii_digit() || FLAG_CHARS.contains(c2) {
                    buf.push(c2);
                    cur.bump();
                } else {
                    break;
                }
            }

            let Some(conv) = cur.bump() else {
                return self.abort(f, ErrorCode::ParseUnfinished, text);
            };
            if !TYPE_CHARS.contains(conv) {
                return self.abort(f, ErrorCode::ParseTypeUnrecognized, text);
            }
            buf.push(conv);

            if !SPECIAL_TYPES.contains(conv) {
                // Trailing literal text up to the next directive stays in
                // the same field.
                while let Some(c2) = cur.peek() {
                    if c2 == '%' {
                        break;
                    }
                    buf.push(c2);
                    cur.bump();
                }
            }

            self.finalize_field(f, &mut field, &mut buf, conv, value_spec, indexed_text)?;

            field.fmt_string = buf;
            let bit_size = field.bit_size;
            self.table.by_handle_mut(msg).fields.push(field);
            self.bit_cursor += bit_size;
            return Ok(cur.rest());
        }
    }

    /// Map the conversion character to the print routine and validate the
    /// combination with the value definition.
    fn finalize_field(
        &mut self,
        f: &FileCtx,
        field: &mut FieldDescriptor,
        buf: &mut String,
        conv: char,
        value_spec: bool,
        indexed_text: bool,
    ) -> PResult<()> {
        match conv {
            'd' | 'i' => field.print_type = PrintType::Int,
            'e' | 'E' | 'f' | 'F' | 'g' | 'G' | 'a' | 'A' => field.print_type = PrintType::Double,
            't' => {
                field.print_type = PrintType::Timestamp;
                field.bit_size = 0;
                self.eliminate_percent(f, buf, true, value_spec)?;
            }
            'T' => {
                field.print_type = PrintType::DeltaTimestamp;
                field.bit_size = 0;
                self.eliminate_percent(f, buf, true, value_spec)?;
            }
            'N' => {
                field.print_type = PrintType::MsgNo;
                field.bit_size = 0;
                self.eliminate_percent(f, buf, true, value_spec)?;
            }
            'D' => {
                field.print_type = PrintType::Date;
                field.bit_size = 0;
                self.eliminate_percent(f, buf, true, value_spec)?;
                self.check_no_memo_and_stats(f, field, buf)?;
            }
            'M' => {
                field.print_type = PrintType::MsgName;
                field.bit_size = 0;
                self.eliminate_percent(f, buf, true, value_spec)?;
                self.check_no_memo_and_stats(f, field, buf)?;
            }
            'W' => {
                field.print_type = PrintType::BinToFile;
                self.eliminate_percent(f, buf, false, value_spec)?;
                self.check_byte_aligned_value(f, field, buf)?;
                self.check_no_memo_and_stats(f, field, buf)?;
            }
            'H' => {
                self.parse_hex_dump_type(f, field, buf)?;
                self.check_no_memo_and_stats(f, field, buf)?;
            }
            'Y' => {
                field.print_type = PrintType::SelectedText;
                if field.in_file == 0 {
                    return self.abort(f, ErrorCode::ParseYTextUndefined, buf);
                }
                self.eliminate_percent(f, buf, false, value_spec)?;
            }
            'B' => {
                field.print_type = PrintType::BinaryDigits;
                self.eliminate_percent(f, buf, false, value_spec)?;
            }
            's' => {
                field.print_type = PrintType::Str;
                self.check_byte_aligned_value(f, field, buf)?;
            }
            _ => field.print_type = PrintType::Uint, // c, o, u, x, X
        }

        // An unused inline-text definition bound to this field.
        if conv != 'Y' && field.in_file != 0 {
            if let Some(entry) = self.symbols.get(field.in_file) {
                if matches!(entry.data, SymbolData::InlineText { .. }) {
                    return self.abort(f, ErrorCode::ParseYTextNotUsed, buf);
                }
            }
        }

        if field.bit_size != 0 {
            let desc = self.table.by_handle(self.cur_msg.unwrap());
            let last_bit = field.bit_address + field.bit_size;

            if (desc.msg_len > 0 && last_bit > desc.msg_len * 8)
                || (desc.msg_len == 0 && desc.kind == MsgKind::Fixed)
            {
                return self.abort(f, ErrorCode::ParseTypeMsgSize, buf);
            }

            if field.data_type == DataType::Auto && field.bit_address % 32 != 0 {
                return self.abort(f, ErrorCode::ParseTypeNotDiv32, buf);
            }
        }

        // {...} and %Y can only appear as a pair (an IN_FILE binding
        // stands in for the inline definition).
        if indexed_text != (field.print_type == PrintType::SelectedText)
            && field.in_file == 0
            && !self.params.check_syntax_and_compile
        {
            return self.abort(f, ErrorCode::ParseIndexedTextIncomplete, buf);
        }

        Ok(())
    }

    /// The extended types print no value through printf, so the trailing
    /// "%X" is cut from the format string. A field/width part between the
    /// '%' and the type character is not allowed for them.
    fn eliminate_percent(
        &mut self,
        f: &FileCtx,
        buf: &mut String,
        no_value_def: bool,
        value_spec: bool,
    ) -> PResult<()> {
        let len = buf.len();
        if len < 2 || buf.as_bytes()[len - 2] != b'%' {
            return self.abort(f, ErrorCode::ParseTypeAdditionalFormatting, buf);
        }

        buf.truncate(len - 2);

        if no_value_def && value_spec {
            return self.abort(f, ErrorCode::ParseValDefNotForSpecialFmt, buf);
        }

        Ok(())
    }

    fn parse_hex_dump_type(
        &mut self,
        f: &FileCtx,
        field: &mut FieldDescriptor,
        buf: &mut String,
    ) -> PResult<()> {
        let len = buf.len();
        if len < 3 {
            return self.abort(f, ErrorCode::ParseTypeHex, buf);
        }

        field.bit_size = 0;
        field.print_type = match buf.as_bytes()[len - 2] {
            b'1' => PrintType::HexDump1,
            b'2' => PrintType::HexDump2,
            b'4' => PrintType::HexDump4,
            _ => return self.abort(f, ErrorCode::ParseTypeHex, buf),
        };

        if buf.as_bytes()[len - 3] != b'%' {
            return self.abort(f, ErrorCode::ParseTypeAdditionalFormatting, buf);
        }
        buf.truncate(len - 3);

        if field.data_type != DataType::Auto {
            return self.abort(f, ErrorCode::ParseHexPrintValueNotAllowed, buf);
        }

        Ok(())
    }

    /// %s and %W data must sit on byte boundaries; an auto-typed value
    /// means "the whole message".
    fn check_byte_aligned_value(
        &mut self,
        f: &FileCtx,
        field: &mut FieldDescriptor,
        context: &str,
    ) -> PResult<()> {
        if field.data_type == DataType::Auto {
            field.bit_size = 0;
        } else if field.bit_size % 8 != 0 {
            return self.abort(f, ErrorCode::ParseSwSizeNotDivisibleBy8, context);
        }

        if field.bit_address % 8 != 0 {
            return self.abort(f, ErrorCode::ParseSwAddrNotDivisibleBy8, context);
        }

        Ok(())
    }

    fn check_no_memo_and_stats(
        &mut self,
        f: &FileCtx,
        field: &FieldDescriptor,
        context: &str,
    ) -> PResult<()> {
        if field.get_memo != 0 || field.put_memo != 0 {
            return self.abort(f, ErrorCode::ParseMemoNotAllowed, context);
        }

        if field.value_stat.is_some() {
            return self.abort(f, ErrorCode::ParseStatisticsNotAllowed, context);
        }

        Ok(())
    }

    // --- the extensions between '%' and the conversion character ---

    fn parse_extensions(
        &mut self,
        f: &mut FileCtx,
        cur: &mut Cursor,
        field: &mut FieldDescriptor,
        value_spec: &mut bool,
        indexed_text: &mut bool,
    ) -> PResult<()> {
        loop {
            match cur.peek() {
                Some('(') => self.parse_scaling(f, cur, field, *value_spec)?,
                Some('[') => {
                    if *value_spec {
                        return self.abort(
                            f,
                            ErrorCode::ParseOverdefinitionSquareBrackets,
                            cur.rest(),
                        );
                    }
                    self.parse_square_brackets(f, cur, field)?;
                    *value_spec = true;
                }
                Some('{') => self.parse_inline_text(f, cur, field, indexed_text)?,
                Some('<') => self.parse_memo_store(f, cur, field)?,
                Some('|') => self.parse_statistics_spec(f, cur, field)?,
                _ => return Ok(()),
            }
        }
    }

    fn parse_scaling(
        &mut self,
        f: &FileCtx,
        cur: &mut Cursor,
        field: &mut FieldDescriptor,
        value_spec: bool,
    ) -> PResult<()> {
        let context = cur.rest().to_owned();
        cur.eat('(');
        cur.skip_ws();

        let mut offset = 0.0;
        let mut mult = 1.0;

        match cur.peek() {
            Some('+') | Some('-') => {
                offset = match cur.take_f64() {
                    Some(v) => v,
                    None => return self.abort(f, ErrorCode::ParseScalingInvalidFormat, &context),
                };
                if cur.eat('*') {
                    mult = match cur.take_f64() {
                        Some(v) => v,
                        None => {
                            return self.abort(f, ErrorCode::ParseScalingInvalidFormat, &context)
                        }
                    };
                }
            }
            Some('*') => {
                cur.eat('*');
                mult = match cur.take_f64() {
                    Some(v) => v,
                    None => return self.abort(f, ErrorCode::ParseScalingInvalidFormat, &context),
                };
            }
            _ => return self.abort(f, ErrorCode::ParseScalingInvalidFormat, &context),
        }

        if !cur.eat(')') {
            return self.abort(f, ErrorCode::ParseScalingInvalidFormat, &context);
        }

        if field.mult != 0.0 {
            return self.abort(f, ErrorCode::ParseOverdefinitionParentheses, &context);
        }

        if mult == 0.0 {
            return self.abort(f, ErrorCode::ParseScalingZeroMultiplier, &context);
        }

        if !value_spec {
            return self.abort(f, ErrorCode::ParseMustHaveValueDef, &context);
        }

        field.mult = mult;
        field.offset = offset;
        Ok(())
    }

    fn parse_square_brackets(
        &mut self,
        f: &FileCtx,
        cur: &mut Cursor,
        field: &mut FieldDescriptor,
    ) -> PResult<()> {
        let rest = cur.rest();

        if rest.starts_with("[N") {
            self.parse_special_spec(f, cur, field, DataType::MsgNo)
        } else if rest.starts_with("[t-") {
            self.parse_relative_timestamp(f, cur, field)
        } else if rest.starts_with("[t") {
            self.parse_special_spec(f, cur, field, DataType::Timestamp)
        } else if rest.starts_with("[T") {
            self.parse_special_spec(f, cur, field, DataType::DeltaTimestamp)
        } else if rest.starts_with("[M_") {
            self.parse_memo_recall(f, cur, field)
        } else {
            self.parse_value_data(f, cur, field)
        }
    }

    fn parse_special_spec(
        &mut self,
        f: &FileCtx,
        cur: &mut Cursor,
        field: &mut FieldDescriptor,
        data_type: DataType,
    ) -> PResult<()> {
        cur.eat('[');
        cur.bump(); // the type letter, validated by the caller

        if !cur.eat(']') {
            return self.abort(f, ErrorCode::ParseExpectingSquareBracket, cur.rest());
        }

        field.data_type = data_type;
        field.bit_size = 0;
        Ok(())
    }

    fn parse_relative_timestamp(
        &mut self,
        f: &FileCtx,
        cur: &mut Cursor,
        field: &mut FieldDescriptor,
    ) -> PResult<()> {
        let context = cur.rest().to_owned();
        cur.eat('[');
        cur.bump(); // 't'
        cur.bump(); // '-'

        let Some(name) = cur.take_until(']') else {
            return self.abort(f, ErrorCode::ParseTimestampDefinition, &context);
        };

        let Some(fmt_id) = self.table.find_by_name(name) else {
            return self.abort(f, ErrorCode::ParseTimestampMsgNotFound, &context);
        };

        field.fmt_id_timer = fmt_id;
        field.data_type = DataType::TimeDiff;
        field.bit_size = 0;
        Ok(())
    }

    fn parse_memo_recall(
        &mut self,
        f: &FileCtx,
        cur: &mut Cursor,
        field: &mut FieldDescriptor,
    ) -> PResult<()> {
        let context = cur.rest().to_owned();
        cur.eat('[');
        cur.skip_ws();

        let Some(name) = cur.take_until(']') else {
            return self.abort(f, ErrorCode::ParseRecallDefinition, &context);
        };

        let Some(idx) = self.symbols.find_memo(name) else {
            return self.abort(f, ErrorCode::ParseInvalidName, name);
        };

        field.get_memo = idx;
        field.data_type = DataType::Memo;
        field.bit_size = 0;
        Ok(())
    }

    fn parse_value_data(
        &mut self,
        f: &FileCtx,
        cur: &mut Cursor,
        field: &mut FieldDescriptor,
    ) -> PResult<()> {
        let context = cur.rest().to_owned();
        cur.eat('[');

        let mut sign = None;
        if matches!(cur.peek(), Some('+') | Some('-')) {
            sign = cur.bump();
        }

        let Some(first) = cur.take_unsigned() else {
            return self.abort(f, ErrorCode::ParseValueInvalidChar, &context);
        };

        let mut size = first;
        let mut address = 0;
        let mut two_values = false;

        if cur.eat(':') {
            address = first;
            size = match cur.take_unsigned() {
                Some(v) => v,
                None => return self.abort(f, ErrorCode::ParseValueInvalidChar, &context),
            };
            two_values = true;
        }

        let mut value_type = 'u';
        if let Some(c) = cur.peek() {
            if "fuis".contains(c) {
                value_type = c;
                cur.bump();
            }
        }

        if !cur.eat(']') {
            return self.abort(f, ErrorCode::ParseValueUnfinished, &context);
        }

        if !(1..=64).contains(&size) {
            return self.abort(f, ErrorCode::ParseValueInvalidSize, &context);
        }
        field.bit_size = size;

        if two_values {
            match sign {
                Some('+') => self.bit_cursor += address,
                Some('-') => {
                    if self.bit_cursor < address {
                        return self.abort(f, ErrorCode::ParseValueNegativeAddr, &context);
                    }
                    self.bit_cursor -= address;
                }
                _ => self.bit_cursor = address,
            }
        } else if sign.is_some() {
            return self.abort(f, ErrorCode::ParseValueSign, &context);
        }

        field.bit_address = self.bit_cursor;

        match value_type {
            's' => {
                field.data_type = DataType::Str;
                if field.bit_address % 8 != 0 {
                    return self.abort(f, ErrorCode::ParseSwAddrNotDivisibleBy8, &context);
                }
            }
            'i' => field.data_type = DataType::I64,
            'f' => {
                field.data_type = DataType::F64;
                if field.bit_address % 8 != 0 {
                    return self.abort(f, ErrorCode::ParseSwAddrNotDivisibleBy8, &context);
                }
                if !matches!(field.bit_size, 16 | 32 | 64) {
                    return self.abort(f, ErrorCode::ParseValueDoubleLength, &context);
                }
            }
            _ => field.data_type = DataType::U64,
        }

        Ok(())
    }

    fn parse_inline_text(
        &mut self,
        f: &FileCtx,
        cur: &mut Cursor,
        field: &mut FieldDescriptor,
        indexed_text: &mut bool,
    ) -> PResult<()> {
        let context = cur.rest().to_owned();
        cur.eat('{');

        let mut options: Vec<String> = Vec::new();
        let mut current = String::new();

        loop {
            match cur.bump() {
                None => return self.abort(f, ErrorCode::ParseIndexedTextUnfinished, &context),
                Some('|') => options.push(std::mem::take(&mut current)),
                Some('}') => {
                    options.push(current);
                    break;
                }
                Some(c) => current.push(c),
            }
        }

        if field.in_file != 0 {
            return self.abort(f, ErrorCode::ParseYTextOverdefined, &context);
        }

        let refs: Vec<&str> = options.iter().map(String::as_str).collect();
        match IndexedText::from_options(&refs) {
            Ok(text) => match self.symbols.add_inline_text(text) {
                Ok(idx) => {
                    field.in_file = idx;
                    *indexed_text = true;
                    Ok(())
                }
                Err(code) => {
                    self.reporter.stop_parsing();
                    self.abort(f, code, &context)
                }
            },
            Err(code) => self.abort(f, code, &context),
        }
    }

    fn parse_memo_store(
        &mut self,
        f: &FileCtx,
        cur: &mut Cursor,
        field: &mut FieldDescriptor,
    ) -> PResult<()> {
        let context = cur.rest().to_owned();
        cur.eat('<');
        cur.skip_ws();

        let Some(name) = cur.take_until('>') else {
            return self.abort(f, ErrorCode::ParseRememberMemoNotFound, &context);
        };

        if name.is_empty() {
            return self.abort(f, ErrorCode::ParseRememberMemoNotFound, &context);
        }

        let Some(idx) = self.symbols.find_memo(name) else {
            return self.abort(f, ErrorCode::ParseRememberMemoNotFound, name);
        };

        if field.put_memo != 0 {
            return self.abort(f, ErrorCode::ParseOverdefinitionAngleBrackets, &context);
        }

        field.put_memo = idx;
        Ok(())
    }

    fn parse_statistics_spec(
        &mut self,
        f: &FileCtx,
        cur: &mut Cursor,
        field: &mut FieldDescriptor,
    ) -> PResult<()> {
        let context = cur.rest().to_owned();
        cur.eat('|');

        let Some(name) = cur.take_until('|') else {
            return self.abort(f, ErrorCode::ParseBadStatisticsName, &context);
        };

        if name.is_empty() {
            return self.abort(f, ErrorCode::ParseEmptyStatistics, &context);
        }

        if field.value_stat.is_some() {
            return self.abort(f, ErrorCode::ParseOverdefinitionPipeBrackets, &context);
        }

        field.value_stat = Some(self.stats.add(name));
        Ok(())
    }
}
