// crates/rtemsg-core/src/printer.rs
//
// Rendering of one decoded message. The descriptor's fields are walked
// head to tail; each field extracts its value, renders through its
// printf format and is routed to the right sink (Main.log, a named
// OUT_FILE, or a VCD assembly). Errors found along the way are queued
// and flushed after the message so the formatted output stays intact.

use crate::codes::ErrorCode;
use crate::config::{MAX_ENUMS, NUMBER_OF_FILTER_BITS};
use crate::decoder::Decoder;
use crate::descriptor::{
    DataType, DescHandle, DescriptorTable, FieldDescriptor, PrintType, SpecialFmt,
};
use crate::extract::{self, Value};
use crate::params::Params;
use crate::printf::{self, Arg};
use crate::reassemble::CurrentMessage;
use crate::report::{self, internal, print_decoding_errors, report_problem, ErrorState};
use crate::sinks::Sinks;
use crate::stats::StatsPool;
use crate::symbols::{EnumIdx, SymbolData, SymbolTable};
use crate::timestamp::TimestampEngine;
use crate::vcd;

/// Immutable per-message context.
struct Ctx<'a> {
    params: &'a Params,
    table: &'a DescriptorTable,
    cur: &'a CurrentMessage,
    msg_bytes: &'a [u8],
    handle: DescHandle,
    message_cnt: u32,
    date_string: &'a str,
}

/// The mutable halves of the decoder a field renderer touches.
struct Out<'a> {
    symbols: &'a mut SymbolTable,
    sinks: &'a mut Sinks,
    errors: &'a mut ErrorState,
    stats: &'a mut StatsPool,
    ts: &'a mut TimestampEngine,
    value: Value,
}

struct RenderedField {
    text: String,
    /// Replacement text for the Main.log duplicate; None = same text.
    main_text: Option<String>,
    /// Raw payload appended after the text (%W).
    bytes: Option<Vec<u8>>,
    /// A string value rendered empty (VCD name guard).
    empty_string: bool,
}

impl RenderedField {
    fn text(text: String) -> Self {
        RenderedField { text, main_text: None, bytes: None, empty_string: false }
    }
}

/// Render and emit one decoded message.
pub(crate) fn print_message(d: &mut Decoder) {
    d.errors.error_value_no = 0;
    d.errors.queue.clear();
    d.errors.overflowed = 0;

    let fmt_id = d.cur.fmt_id;
    let handle = match d.table.handle_at(fmt_id) {
        Some(h) if !d.table.by_handle(h).fields.is_empty() => h,
        _ => {
            report_problem(
                &mut d.errors,
                &mut d.sinks,
                d.message_cnt,
                None,
                ErrorCode::MessageMustContainOneFmtDefinition,
                &[],
            );
            return;
        }
    };

    // The mandatory message header in Main.log.
    let mut head = String::from("\n");
    if d.ts.mark_problematic {
        head.push('#');
        d.ts.mark_problematic = false;
        d.ts.suspicious_count += 1;
    }
    head.push_str(&d.sinks.message_number(d.message_cnt));
    head.push(' ');
    head.push_str(&d.sinks.timestamp(d.ts.seconds));
    head.push_str(&format!(" {}: ", d.table.by_handle(handle).name));
    d.sinks.main(&head);

    if d.messages_after_restart > 0 {
        d.sinks.timestamp_csv(d.message_cnt, d.ts.seconds, d.previous_csv_time);
    }
    d.previous_csv_time = d.ts.seconds;
    d.messages_after_restart += 1;

    let msg_bytes = d.cur.bytes();
    let ctx = Ctx {
        params: &d.params,
        table: &d.table,
        cur: &d.cur,
        msg_bytes: &msg_bytes,
        handle,
        message_cnt: d.message_cnt,
        date_string: &d.date_string,
    };
    let mut out = Out {
        symbols: &mut d.symbols,
        sinks: &mut d.sinks,
        errors: &mut d.errors,
        stats: &mut d.stats,
        ts: &mut d.ts,
        value: Value::default(),
    };

    let n_fields = ctx.table.by_handle(handle).fields.len();
    for i in 0..n_fields {
        let field = &ctx.table.by_handle(handle).fields[i];
        process_field(&ctx, &mut out, field);
    }

    if print_decoding_errors(&mut d.errors, &mut d.sinks, d.message_cnt) {
        // Restart the anchor search after a disturbed message.
        d.ts.no_previous = true;
    }

    let counters = &mut d.table.counters[handle as usize];
    counters.count_since_reset += 1;

    // Buffer words consumed, the FMT word of every subpacket included.
    let words = d.cur.asm_words() as u32;
    let remainder = words & 3;
    let mut total = words / 4 * 5;
    if remainder != 0 {
        total += remainder + 1;
    }
    if total == 0 {
        total = 1;
    }
    counters.words_total += total;
    counters.last_timestamp_s = d.ts.seconds;
}

fn process_field(ctx: &Ctx, out: &mut Out, field: &FieldDescriptor) {
    out.value = Value::default();

    if field.print_type != PrintType::PlainText {
        out.errors.error_value_no += 1;
    }

    let vcd_routed = field.special_fmt != SpecialFmt::None
        && out.symbols.out_file(field.out_file).is_some_and(|o| o.vcd.is_some());

    let rendered = render_field(ctx, out, field, vcd_routed);

    if vcd_routed {
        if let Some(outfile) = out.symbols.out_file_mut(field.out_file) {
            if let Some(data) = outfile.vcd.as_deref_mut() {
                vcd::append_to_assembly(data, &rendered.text, rendered.empty_string);
            }

            if field.special_fmt == SpecialFmt::VcdFinalize {
                vcd::finalize_variable(outfile, out.errors, out.ts, ctx.message_cnt);
            }
        }

        if field.also_to_main_log {
            out.sinks.main(rendered.main_text.as_deref().unwrap_or(&rendered.text));
        }
    } else if field.out_file == 0 {
        out.sinks.main(&rendered.text);
        if let Some(bytes) = &rendered.bytes {
            out.sinks.main_bytes(bytes);
        }
    } else {
        write_to_out_file(out, field.out_file, &rendered);

        if field.also_to_main_log {
            out.sinks.main(rendered.main_text.as_deref().unwrap_or(&rendered.text));
            if let Some(bytes) = &rendered.bytes {
                out.sinks.main_bytes(bytes);
            }
        }
    }

    process_statistics(ctx, out, field);
}

fn write_to_out_file(out: &mut Out, sink: EnumIdx, rendered: &RenderedField) {
    match out.symbols.get_mut(sink) {
        Some(entry) => match &mut entry.data {
            SymbolData::OutFile(f) => match f.writer.as_mut() {
                Some(w) => {
                    use std::io::Write;
                    let _ = w.write_all(rendered.text.as_bytes());
                    if let Some(bytes) = &rendered.bytes {
                        let _ = w.write_all(bytes);
                    }
                }
                None => out.errors.save_internal_error(internal::OUT_FILE_PTR_NULL, 0),
            },
            _ => out.errors.save_internal_error(internal::BAD_OUT_FILE_TYPE, sink as u32),
        },
        None => out.errors.save_internal_error(internal::OUT_FILE_INDEX_OUT_OF_RANGE, sink as u32),
    }
}

fn render_field(
    ctx: &Ctx,
    out: &mut Out,
    field: &FieldDescriptor,
    vcd_routed: bool,
) -> RenderedField {
    match field.print_type {
        PrintType::PlainText => RenderedField::text(printf::format_one(&field.fmt_string, None)),

        PrintType::Uint => {
            prepare_value(ctx, out, field, false);
            RenderedField::text(printf::format_one(&field.fmt_string, Some(Arg::U(out.value.u))))
        }

        PrintType::Int => {
            prepare_value(ctx, out, field, false);
            RenderedField::text(printf::format_one(&field.fmt_string, Some(Arg::I(out.value.i))))
        }

        PrintType::Double => {
            prepare_value(ctx, out, field, false);
            let mut v = out.value.f;
            if vcd_routed && !v.is_normal() && v != 0.0 {
                // Waveform viewers misrender NaN/Inf; substitute a large
                // normal value so the trace stays readable.
                v = 9.99e99;
            }
            RenderedField::text(printf::format_one(&field.fmt_string, Some(Arg::F(v))))
        }

        PrintType::Str => {
            let s = if field.bit_size == 0 {
                extract::message_string(ctx.msg_bytes, 0, ctx.cur.asm_size)
            } else {
                prepare_value(ctx, out, field, true);
                let bytes = out.value.u.to_le_bytes();
                let len = bytes.iter().position(|&b| b == 0).unwrap_or(8);
                String::from_utf8_lossy(&bytes[..len]).into_owned()
            };

            let empty = s.is_empty();
            let mut rendered =
                RenderedField::text(printf::format_one(&field.fmt_string, Some(Arg::S(&s))));
            rendered.empty_string = empty;
            rendered
        }

        PrintType::SelectedText => {
            prepare_value(ctx, out, field, false);
            let prefix = printf::format_one(&field.fmt_string, None);
            let text = selected_text(out, field.in_file, out.value.u);
            let empty = text.is_empty();
            let mut rendered = RenderedField::text(format!("{prefix}{text}"));
            rendered.empty_string = empty;
            rendered
        }

        PrintType::BinaryDigits => {
            prepare_value(ctx, out, field, false);
            out.value.f = out.value.u as f64;

            if field.data_type != DataType::U64 {
                out.errors.save_decoding_error(
                    ErrorCode::PrintBinValueType,
                    field.data_type as u32,
                    0,
                    &field.fmt_string,
                );
                return RenderedField::text(String::new());
            }

            let prefix = printf::format_one(&field.fmt_string, None);
            RenderedField::text(format!(
                "{prefix}{}",
                extract::binary_digits(out.value.u, field.bit_size)
            ))
        }

        PrintType::Timestamp => {
            let prefix = printf::format_one(&field.fmt_string, None);
            out.value.f = out.ts.seconds;
            let text = format!("{prefix}{}", out.sinks.timestamp(out.ts.seconds));
            save_to_memo(out, field.put_memo);
            RenderedField { main_text: Some(prefix), ..RenderedField::text(text) }
        }

        PrintType::DeltaTimestamp => {
            let counters = ctx.table.counters[ctx.handle as usize];
            let delta = if counters.count_since_reset > 0 {
                out.ts.seconds - counters.last_timestamp_s
            } else {
                0.0
            };

            let prefix = printf::format_one(&field.fmt_string, None);
            out.value.f = delta;
            let text = format!("{prefix}{}", out.sinks.timestamp(delta));
            save_to_memo(out, field.put_memo);
            RenderedField { main_text: Some(prefix), ..RenderedField::text(text) }
        }

        PrintType::MsgNo => {
            let prefix = printf::format_one(&field.fmt_string, None);
            out.value.u = ctx.message_cnt as u64;
            out.value.i = ctx.message_cnt as i64;
            out.value.f = ctx.message_cnt as f64;
            let text = format!("{prefix}{}", out.sinks.message_number(ctx.message_cnt));
            save_to_memo(out, field.put_memo);
            RenderedField { main_text: Some(prefix), ..RenderedField::text(text) }
        }

        PrintType::MsgName => {
            let prefix = printf::format_one(&field.fmt_string, None);
            let text = format!("{prefix}{}", ctx.table.by_handle(ctx.handle).name);
            RenderedField { main_text: Some(prefix), ..RenderedField::text(text) }
        }

        PrintType::Date => {
            let prefix = printf::format_one(&field.fmt_string, None);
            RenderedField::text(format!("{prefix}{}", ctx.date_string))
        }

        PrintType::HexDump1 | PrintType::HexDump2 | PrintType::HexDump4 => {
            let unit = match field.print_type {
                PrintType::HexDump2 => 2,
                PrintType::HexDump4 => 4,
                _ => 1,
            };

            let skip = ((field.bit_address + 7) / 8) as usize;
            if ctx.cur.asm_size < skip {
                return RenderedField::text(String::new());
            }

            let prefix = printf::format_one(&field.fmt_string, None);
            let dump = extract::hex_dump(&ctx.msg_bytes[skip..ctx.cur.asm_size], unit);
            RenderedField::text(format!("{prefix}{dump}"))
        }

        PrintType::BinToFile => {
            let prefix = printf::format_one(&field.fmt_string, None);

            if field.bit_size == 0 {
                let bytes = ctx.msg_bytes[..ctx.cur.asm_size].to_vec();
                return RenderedField {
                    bytes: Some(bytes),
                    ..RenderedField::text(prefix)
                };
            }

            if field.bit_size % 8 != 0 {
                out.errors.save_decoding_error(
                    ErrorCode::DataSizeNotDivisibleBy8,
                    field.bit_size,
                    8,
                    &field.fmt_string,
                );
                return RenderedField::text(String::new());
            }

            prepare_value(ctx, out, field, true);
            let bytes = out.value.u.to_le_bytes()[..(field.bit_size / 8) as usize].to_vec();
            RenderedField { bytes: Some(bytes), ..RenderedField::text(prefix) }
        }
    }
}

/// Indexed-text lookup for %Y with the type checks of the symbol table.
fn selected_text(out: &mut Out, in_file: EnumIdx, index: u64) -> String {
    match out.symbols.get(in_file) {
        Some(entry) => match &entry.data {
            SymbolData::InFile { text, .. } | SymbolData::InlineText { text } => {
                text.lookup(index).to_owned()
            }
            _ => {
                out.errors.save_internal_error(internal::DECODE_Y_TYPE_STRING, in_file as u32);
                String::new()
            }
        },
        None => {
            out.errors.save_internal_error(internal::DECODE_Y_TYPE_STRING_NULL, 0);
            String::new()
        }
    }
}

fn save_to_memo(out: &mut Out, memo: EnumIdx) {
    if memo == 0 {
        return;
    }

    if (memo as usize) < NUMBER_OF_FILTER_BITS || (memo as usize) >= MAX_ENUMS {
        out.errors.save_internal_error(internal::SET_MEMO_OUT_OF_RANGE, memo as u32);
        return;
    }

    if !out.symbols.set_memo_value(memo, out.value.f) {
        out.errors.save_internal_error(internal::SET_MEMO_TYPE_IS_NOT_MEMO, memo as u32);
    }
}

/// Apply the affine scaling; the integer views round like the original.
fn scale(out: &mut Out, field: &FieldDescriptor, raw: f64) {
    out.value.f = raw;

    if field.mult != 0.0 {
        out.value.f = (raw + field.offset) * field.mult;
        out.value.i = (out.value.f + 0.5) as i64;
        out.value.u = (out.value.f + 0.5) as u64;
    }
}

fn extract_into_value(ctx: &Ctx, out: &mut Out, field: &FieldDescriptor) -> bool {
    match extract::extract_value(ctx.msg_bytes, ctx.cur.asm_size, field.bit_address, field.bit_size)
    {
        Ok(e) => {
            out.value.u = e.u;
            out.value.i = e.i;
            true
        }
        Err((code, d1, d2)) => {
            out.errors.save_decoding_error(code, d1, d2, &field.fmt_string);
            false
        }
    }
}

/// Prepare the value of the field in all three shapes. Zero stays in
/// place when the value cannot be read; the error is queued.
fn prepare_value(ctx: &Ctx, out: &mut Out, field: &FieldDescriptor, byte_aligned: bool) {
    if byte_aligned {
        if field.bit_size % 8 != 0 {
            out.errors.save_decoding_error(
                ErrorCode::DataSizeNotDivisibleBy8,
                field.bit_size,
                8,
                &field.fmt_string,
            );
            return;
        }
        if field.bit_address % 8 != 0 {
            out.errors.save_decoding_error(
                ErrorCode::AddressNotDivisibleBy8,
                field.bit_address,
                8,
                &field.fmt_string,
            );
            return;
        }
    }

    match field.data_type {
        DataType::Auto => prepare_auto_value(ctx, out, field),

        DataType::I64 => {
            if field.bit_size < 2 {
                out.errors.save_decoding_error(
                    ErrorCode::TooSmallIntDataSize,
                    field.bit_size,
                    1,
                    &field.fmt_string,
                );
                return;
            }
            if extract_into_value(ctx, out, field) {
                scale(out, field, out.value.i as f64);
            }
        }

        DataType::U64 => {
            if field.bit_size < 1 {
                out.errors.save_decoding_error(
                    ErrorCode::TooSmallUintDataSize,
                    field.bit_size,
                    0,
                    &field.fmt_string,
                );
                return;
            }
            if extract_into_value(ctx, out, field) {
                scale(out, field, out.value.u as f64);
            }
        }

        DataType::F64 => prepare_double_value(ctx, out, field),

        DataType::Str => {
            // The renderer reads the bytes; nothing to coerce here.
            if field.bit_size != 0 {
                extract_into_value(ctx, out, field);
            }
        }

        DataType::Timestamp => {
            scale(out, field, out.ts.seconds);
        }

        DataType::DeltaTimestamp => {
            let counters = ctx.table.counters[ctx.handle as usize];
            if counters.count_since_reset > 0 {
                scale(out, field, out.ts.seconds - counters.last_timestamp_s);
            }
        }

        DataType::Memo => prepare_memo_value(out, field),

        DataType::MsgNo => {
            out.value.u = ctx.message_cnt as u64;
            out.value.i = ctx.message_cnt as i64;
            out.value.f = ctx.message_cnt as f64;
        }

        DataType::TimeDiff => prepare_time_difference(ctx, out, field),
    }

    save_to_memo(out, field.put_memo);
}

/// A 32-bit value whose shape follows the conversion character.
fn prepare_auto_value(ctx: &Ctx, out: &mut Out, field: &FieldDescriptor) {
    if field.bit_address % 32 != 0 {
        out.errors.save_decoding_error(
            ErrorCode::AutoValueAddressNotDivisibleBy32,
            field.bit_address,
            32,
            &field.fmt_string,
        );
        return;
    }

    if field.bit_size != 32 {
        out.errors.save_decoding_error(
            ErrorCode::AutoValueSizeNot32,
            field.bit_size,
            32,
            &field.fmt_string,
        );
        return;
    }

    if field.mult != 0.0 {
        out.errors.save_decoding_error(
            ErrorCode::AutoValueAndScaling,
            0,
            0,
            &field.fmt_string,
        );
        return;
    }

    if !extract_into_value(ctx, out, field) {
        return;
    }

    match field.print_type {
        PrintType::Double => {
            out.value.f = f32::from_bits(out.value.u as u32) as f64;
        }
        PrintType::Int => out.value.f = out.value.i as f64,
        PrintType::Uint | PrintType::BinaryDigits => out.value.f = out.value.u as f64,
        PrintType::Str | PrintType::BinToFile | PrintType::SelectedText => {}
        PrintType::HexDump1 | PrintType::HexDump2 | PrintType::HexDump4 => {}
        _ => out
            .errors
            .save_internal_error(internal::INCORRECT_AUTO_VALUE_TYPE, field.print_type as u32),
    }
}

fn prepare_double_value(ctx: &Ctx, out: &mut Out, field: &FieldDescriptor) {
    let raw = match field.bit_size {
        16 => {
            if !extract_into_value(ctx, out, field) {
                return;
            }
            extract::half_to_f32(out.value.u as u16) as f64
        }
        32 => {
            if !extract_into_value(ctx, out, field) {
                return;
            }
            f32::from_bits(out.value.u as u32) as f64
        }
        64 => {
            if !extract_into_value(ctx, out, field) {
                return;
            }
            f64::from_bits(out.value.u)
        }
        other => {
            out.errors.save_decoding_error(
                ErrorCode::FloatSizeMustBe16_32Or64,
                other,
                0,
                &field.fmt_string,
            );
            return;
        }
    };

    scale(out, field, raw);
}

fn prepare_memo_value(out: &mut Out, field: &FieldDescriptor) {
    if (field.get_memo as usize) < NUMBER_OF_FILTER_BITS || (field.get_memo as usize) > MAX_ENUMS {
        out.errors.save_internal_error(internal::GET_MEMO_OUT_OF_RANGE, field.get_memo as u32);
        return;
    }

    match out.symbols.memo_value(field.get_memo) {
        Some(v) => {
            out.value.i = v as i64;
            out.value.u = v as u64;
            scale(out, field, v);
        }
        None => out.errors.save_internal_error(internal::GET_MEMO_TYPE_IS_NOT_MEMO, 0),
    }
}

/// Time since the last occurrence of the message named in [t-NAME].
fn prepare_time_difference(ctx: &Ctx, out: &mut Out, field: &FieldDescriptor) {
    let Some(handle) = ctx.table.handle_at(field.fmt_id_timer) else { return };
    let counters = ctx.table.counters[handle as usize];

    if counters.count_since_reset > 0 {
        let diff = out.ts.seconds - counters.last_timestamp_s;
        out.value.u = diff as u64;
        out.value.i = diff as i64;
        scale(out, field, diff);
    }
}

/// Feed the scaled value into the field's statistics accumulator.
fn process_statistics(ctx: &Ctx, out: &mut Out, field: &FieldDescriptor) {
    let Some(stat_idx) = field.value_stat else { return };

    if !ctx.params.value_statistics_enabled {
        return;
    }

    // Timers need a previous message to diff against.
    match field.data_type {
        DataType::DeltaTimestamp => {
            if ctx.table.counters[ctx.handle as usize].count_since_reset == 0 {
                return;
            }
        }
        DataType::TimeDiff => {
            if let Some(h) = ctx.table.handle_at(field.fmt_id_timer) {
                if ctx.table.counters[h as usize].count_since_reset == 0 {
                    return;
                }
            }
        }
        _ => {}
    }

    let applicable = matches!(
        field.print_type,
        PrintType::Uint
            | PrintType::Int
            | PrintType::Double
            | PrintType::BinaryDigits
            | PrintType::Timestamp
            | PrintType::DeltaTimestamp
    );

    if applicable {
        if let Some(stat) = out.stats.get_mut(stat_idx) {
            stat.add(out.value.f, ctx.message_cnt);
        }
    }
}

/// Extra data for a message kind that has none.
pub(crate) fn check_extended_data(d: &mut Decoder) {
    use crate::descriptor::MsgKind;

    let Some(desc) = d.table.descriptor(d.cur.fmt_id) else { return };

    if matches!(desc.kind, MsgKind::Variable | MsgKind::SelfSized) && d.cur.additional_data != 0 {
        report_problem(
            &mut d.errors,
            &mut d.sinks,
            d.message_cnt,
            None,
            ErrorCode::UnwantedExtendedData,
            &[format!("{:X}", d.cur.additional_data)],
        );
        d.cur.additional_data = 0;
    }
}

/// Hex dump of the current (possibly broken) message to Main.log.
pub(crate) fn hex_dump_current_message(d: &mut Decoder, as_words: bool) {
    if d.cur.asm_words() == 0 {
        return;
    }

    let mut text = String::from("\n  >>>");
    text.push_str(&format!(" fmt ID: {}", d.cur.fmt_id));

    if let Some(desc) = d.table.descriptor(d.cur.fmt_id) {
        if !desc.name.is_empty() {
            text.push_str(&format!(", {}", desc.name));
        }
    }

    text.push_str(", hex:");

    if as_words {
        for w in &d.cur.data {
            text.push_str(&format!(" {w:08X}"));
        }
    } else {
        for w in &d.cur.data {
            for b in w.to_le_bytes() {
                text.push_str(&format!(" {b:02X}"));
            }
        }
    }

    d.sinks.main(&text);
}

/// Dump the Filter_names.txt companion (syntax-check runs).
pub(crate) fn dump_filter_names(symbols: &SymbolTable) -> String {
    let mut out = String::new();

    for i in 0..32usize {
        let line = symbols
            .filters()
            .find(|(idx, _)| *idx == i)
            .map(|(_, f)| f.description.clone().unwrap_or_else(|| f.name.clone()))
            .unwrap_or_default();
        out.push_str(&line);
        out.push('\n');
    }

    out
}

/// Format.csv: the compiled descriptor tables for -debug runs.
pub(crate) fn format_csv(table: &DescriptorTable, symbols: &SymbolTable, stats: &StatsPool) -> String {
    let mut out = String::from(
        "FMT\tName\tType\tLength\tString\tOutput\tData type\tFmt type\tAddr\tSize\t\
         Get.memo\tPut.memo\tIn.file\tOffset\tMult\tTimer\tStatistics\n",
    );

    for (fmt_id, handle) in table.unique() {
        let desc = table.by_handle(handle);
        out.push_str(&format!(
            "{}\t{}\t{:?}\t{}",
            fmt_id, desc.name, desc.kind, desc.msg_len
        ));

        for (n, field) in desc.fields.iter().enumerate() {
            if n > 0 {
                out.push_str("\t\t\t");
            }

            let out_name = if field.out_file == 0 {
                "Main.log".to_owned()
            } else {
                let dup = if field.also_to_main_log { ">>" } else { "" };
                format!("{}{}", dup, symbols.name_of(field.out_file))
            };

            let stat_name = field
                .value_stat
                .and_then(|i| stats.get(i))
                .map(|s| s.name.as_str())
                .unwrap_or("");

            let timer_name = if field.fmt_id_timer != 0 {
                table
                    .descriptor(field.fmt_id_timer)
                    .map(|t| t.name.as_str())
                    .unwrap_or("")
            } else {
                ""
            };

            out.push_str(&format!(
                "\t{}\t{}\t{:?}\t{:?}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
                report::shorten_for_csv(&field.fmt_string),
                out_name,
                field.data_type,
                field.print_type,
                field.bit_address,
                field.bit_size,
                symbols.name_of(field.get_memo),
                symbols.name_of(field.put_memo),
                symbols.name_of(field.in_file),
                field.offset,
                field.mult,
                timer_name,
                stat_name,
            ));
        }

        if desc.fields.is_empty() {
            out.push('\n');
        }
    }

    out
}
