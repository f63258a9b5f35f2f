// crates/rtemsg-core/src/vcd.rs
//
// Value Change Dump output. An OUT_FILE with a `.vcd` path collects
// variable transitions while decoding; the proper VCD header (with the
// variable declarations, which are only known at the end) is assembled at
// shutdown by renaming the body to a `.tmp` sibling and streaming it back
// behind the generated header. A `.gtkw` viewer configuration is written
// next to each file.
//
// A formatted string directed at a VCD sink must render to
// `T NAME = VALUE` with T in {B,F,S,A}. Single-character bit values have
// special meanings: 0/1 literal, T toggle, R reset, P pulse (automatic
// zero transition 1 ns later).

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::codes::ErrorCode;
use crate::config::{
    RTEMSG_VERSION, VCD_MAX_ASSEMBLED_STRING_LEN, VCD_MAX_CONSECUTIVE_TIMESTAMP_ERRORS,
    VCD_MAX_VARIABLES_PER_FILE, VCD_STRING_VALUE_MAX_LEN,
};
use crate::report::{report_problem, ErrorState};
use crate::sinks::Sinks;
use crate::symbols::{OutFile, SymbolTable};
use crate::timestamp::TimestampEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcdType {
    Bit,
    Float,
    Str,
    Analog,
}

impl VcdType {
    /// $var declaration data: (value prefix, kind name, size in bits).
    fn declaration(self) -> (&'static str, &'static str, usize) {
        match self {
            VcdType::Bit => ("", "wire", 1),
            VcdType::Float => ("r", "real", 64),
            VcdType::Str => ("s", "string", VCD_STRING_VALUE_MAX_LEN * 8),
            VcdType::Analog => ("r", "real", 64),
        }
    }
}

pub struct VcdVar {
    pub name: String,
    pub id: String,
    pub var_type: VcdType,
}

/// Per-file VCD state attached to an OUT_FILE symbol entry.
#[derive(Default)]
pub struct VcdFileData {
    pub writing_disabled: bool,
    pub discard_excessive_variables: bool,
    pub data_written: bool,
    pub timestamp_error_found: bool,
    pub last_timestamp_error_value: u8,
    pub consecutive_timestamp_errors: u32,

    pub last_timestamp_ns: u64,
    pub msg_no_of_last_timestamp: u32,

    pub vars: Vec<VcdVar>,
    /// Previous value byte per variable (toggle/reset/pulse state);
    /// 0 = never assigned.
    pub previous_bit_value: Vec<u8>,
    /// Identifier of a pending pulse variable (empty = none).
    pub pulse_variable_id: String,

    /// Per-message variable record being assembled from the field texts.
    pub assembly: String,
    pub assembly_done: bool,
    /// A %s rendered empty inside the name part; drop the record.
    pub empty_string_in_name: bool,
}

/// Identifier string: base-94 encoding of the insertion index over the
/// printable ASCII range '!'..'~', least significant digit first.
pub fn id_string(mut id: usize) -> String {
    const FIRST: u8 = b'!';
    const COUNT: usize = (b'~' - b'!') as usize + 1;

    let mut out = String::new();
    loop {
        out.push((FIRST + (id % COUNT) as u8) as char);
        id /= COUNT;
        if id == 0 {
            return out;
        }
    }
}

pub fn is_a_vcd_file(path: &str) -> bool {
    path.len() >= 4 && path[path.len() - 4..].eq_ignore_ascii_case(".vcd")
}

/// Parse-time validation of a formatted string bound to a VCD sink.
pub fn check_variable_format(text: &str) -> Result<(), ErrorCode> {
    let mut chars = text.chars();

    let type_char = chars.next().map(|c| c.to_ascii_uppercase());
    let vcd_type = match type_char {
        Some('B') => VcdType::Bit,
        Some('F') => VcdType::Float,
        Some('S') => VcdType::Str,
        Some('A') => VcdType::Analog,
        _ => return Err(ErrorCode::ParseVcdVarTypeNotOk),
    };

    if chars.next() != Some(' ') {
        return Err(ErrorCode::ParseMandatorySpaceAfterVarType);
    }

    let mut equal_signs = 0;
    let mut name_len = 0;
    let mut value_len = 0;
    let mut value_start = None;

    for c in chars.clone() {
        if c == '=' {
            equal_signs += 1;
        } else if c != ' ' {
            if equal_signs > 0 {
                value_len += 1;
                value_start.get_or_insert(c);
            } else {
                name_len += 1;
            }
        }

        if c < ' ' {
            return Err(ErrorCode::ParseVcdVarTypeNotOk);
        }
    }

    if equal_signs != 1 {
        return Err(ErrorCode::ParseVcdEqualSignProblem);
    }

    if name_len < 1 || value_len < 1 {
        return Err(ErrorCode::ParseVcdVarDefinitionTooShort);
    }

    if value_len == 1 {
        let special = value_start.unwrap().to_ascii_uppercase();
        match vcd_type {
            VcdType::Bit => {
                if !matches!(special, 'T' | 'P' | 'R' | 'X' | 'Z' | '0' | '1' | '%') {
                    return Err(ErrorCode::ParseWrongSpecialCharacter);
                }
            }
            VcdType::Float | VcdType::Analog => {
                if special != 'R' && special != '%' && !special.is_ascii_digit() {
                    return Err(ErrorCode::ParseWrongSpecialCharacter);
                }
            }
            VcdType::Str => {}
        }
    }

    Ok(())
}

/// Append rendered field text to the sink's variable assembly. The
/// assembly restarts after every finalized record.
pub fn append_to_assembly(data: &mut VcdFileData, text: &str, empty_string_field: bool) {
    if data.assembly_done {
        data.assembly.clear();
        data.assembly_done = false;
        data.empty_string_in_name = false;
    }

    if empty_string_field && !data.assembly.contains('=') {
        data.empty_string_in_name = true;
    }

    if data.assembly.len() + text.len() <= VCD_MAX_ASSEMBLED_STRING_LEN {
        data.assembly.push_str(text);
    }
}

/// Split the assembled `T NAME = VALUE` record. Non-alphanumeric name
/// characters are rewritten to '_'; for string values, non-printable
/// characters are rewritten as well.
fn split_assembly(
    assembly: &str,
    errors: &mut ErrorState,
) -> Option<(VcdType, String, String)> {
    let vcd_type = match assembly.chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('B') => VcdType::Bit,
        Some('F') => VcdType::Float,
        Some('S') => VcdType::Str,
        Some('A') => VcdType::Analog,
        _ => {
            errors.save_decoding_error(ErrorCode::VcdValueTypeCharNotFound, 0, 0, assembly);
            return None;
        }
    };

    if assembly.len() < 4 {
        errors.save_decoding_error(ErrorCode::VcdNameTooShort, 0, 0, assembly);
        return None;
    }

    let rest = &assembly[1..];
    let Some(eq) = rest.find('=') else {
        errors.save_decoding_error(ErrorCode::VcdEqualSignNotFound, 0, 0, assembly);
        return None;
    };

    let raw_name = rest[..eq].trim();
    let raw_value = rest[eq + 1..].trim();

    if raw_name.is_empty() || !raw_name.chars().any(|c| c.is_alphabetic()) {
        errors.save_decoding_error(ErrorCode::VcdNameTooShort, 0, 0, assembly);
        return None;
    }

    if raw_value.is_empty() {
        errors.save_decoding_error(ErrorCode::VcdVariableTooShort, 0, 0, assembly);
        return None;
    }

    let name: String = raw_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let value: String = if vcd_type == VcdType::Str {
        raw_value.chars().map(|c| if c <= ' ' { '_' } else { c }).collect()
    } else {
        raw_value.to_owned()
    };

    Some((vcd_type, name, value))
}

/// Lazily emit the `#<ns>` line for the current message, enforcing the
/// monotonicity guard.
fn add_timestamp(
    writer: &mut BufWriter<File>,
    data: &mut VcdFileData,
    errors: &mut ErrorState,
    ts: &mut TimestampEngine,
    message_cnt: u32,
) {
    if data.writing_disabled || message_cnt == data.msg_no_of_last_timestamp {
        return;
    }

    let timestamp_ns = ts.nanoseconds();

    if !ts.first_processed {
        ts.first_processed = true;
        ts.first_ns = timestamp_ns;
    }

    if timestamp_ns <= data.last_timestamp_ns {
        data.timestamp_error_found = true;
        data.consecutive_timestamp_errors += 1;

        if data.consecutive_timestamp_errors >= VCD_MAX_CONSECUTIVE_TIMESTAMP_ERRORS {
            data.writing_disabled = true;
            errors.save_decoding_error(
                ErrorCode::VcdTooManyConsecutiveTimestampErrors,
                data.consecutive_timestamp_errors,
                0,
                &data.assembly,
            );
        }

        data.last_timestamp_ns += 1;
    } else {
        data.last_timestamp_ns = timestamp_ns;
        data.timestamp_error_found = false;
        data.consecutive_timestamp_errors = 0;
    }

    ts.last_ns = timestamp_ns;

    let _ = writeln!(writer, "#{}", data.last_timestamp_ns);
    data.msg_no_of_last_timestamp = message_cnt;
}

/// Handle the single-character special values. Returns false when the
/// transition must not be written.
fn process_special_values(
    data: &mut VcdFileData,
    errors: &mut ErrorState,
    vcd_type: VcdType,
    value: &mut String,
    id: &str,
    var_index: usize,
) -> bool {
    if var_index >= data.previous_bit_value.len() {
        return false;
    }

    if value.len() != 1 || !matches!(vcd_type, VcdType::Bit | VcdType::Float) {
        data.previous_bit_value[var_index] = 1;
        return true;
    }

    let c = value.as_bytes()[0].to_ascii_uppercase();
    match c {
        b'0' | b'1' => data.previous_bit_value[var_index] = value.as_bytes()[0],

        b'R' => {
            let previous = data.previous_bit_value[var_index];
            if previous == 0 {
                return false; // nothing assigned yet, nothing to reset
            }
            if previous == b'0' {
                return false; // already at zero
            }
            *value = "0".to_owned();
            data.previous_bit_value[var_index] = b'0';
        }

        b'T' => {
            if vcd_type == VcdType::Bit {
                let next = if data.previous_bit_value[var_index] != b'1' { b'1' } else { b'0' };
                *value = (next as char).to_string();
                data.previous_bit_value[var_index] = next;
            }
        }

        b'P' => {
            if !data.pulse_variable_id.is_empty() {
                errors.save_decoding_error(ErrorCode::VcdPulseVariableAlreadyDefined, 0, 0, " ");
                return false;
            }

            data.pulse_variable_id = id.to_owned();
            *value = "1".to_owned();
            // Returns to zero one nanosecond after the message.
            data.previous_bit_value[var_index] = b'0';
        }

        _ => data.previous_bit_value[var_index] = 1,
    }

    true
}

/// Write one variable value, registering the variable on first use.
pub fn save_variable(
    out: &mut OutFile,
    errors: &mut ErrorState,
    ts: &mut TimestampEngine,
    message_cnt: u32,
    vcd_type: VcdType,
    name: &str,
    mut value: String,
) {
    if value.is_empty() {
        return;
    }

    let (Some(writer), Some(data)) = (out.writer.as_mut(), out.vcd.as_deref_mut()) else {
        return;
    };

    if data.writing_disabled {
        return;
    }

    let var_index = match data.vars.iter().position(|v| v.name == name) {
        Some(idx) => {
            if data.vars[idx].var_type != vcd_type {
                errors.save_decoding_error(
                    ErrorCode::VariableDefinedWithDifferentTypeBefore,
                    0,
                    0,
                    name,
                );
                return;
            }
            idx
        }
        None => {
            if data.discard_excessive_variables {
                return;
            }

            if data.vars.len() >= VCD_MAX_VARIABLES_PER_FILE {
                errors.save_decoding_error(
                    ErrorCode::TooManyVariablesPerVcdFile,
                    VCD_MAX_VARIABLES_PER_FILE as u32,
                    0,
                    name,
                );
                data.discard_excessive_variables = true;
                return;
            }

            let id = id_string(data.vars.len());
            data.vars.push(VcdVar { name: name.to_owned(), id, var_type: vcd_type });
            data.previous_bit_value.push(0);
            data.vars.len() - 1
        }
    };

    let id = data.vars[var_index].id.clone();

    if !process_special_values(data, errors, vcd_type, &mut value, &id, var_index) {
        return;
    }

    add_timestamp(writer, data, errors, ts, message_cnt);

    let (prefix, _, _) = vcd_type.declaration();
    if vcd_type == VcdType::Bit {
        let _ = writeln!(writer, "{value}{id}");
    } else {
        let _ = writeln!(writer, "{prefix}{value} {id}");
    }

    data.data_written = true;
}

/// Finalize the assembled variable record of one formatted string.
pub fn finalize_variable(
    out: &mut OutFile,
    errors: &mut ErrorState,
    ts: &mut TimestampEngine,
    message_cnt: u32,
) {
    let Some(data) = out.vcd.as_deref_mut() else { return };

    data.assembly_done = true;

    if data.empty_string_in_name {
        return;
    }

    let assembly = data.assembly.clone();
    let Some((vcd_type, name, value)) = split_assembly(&assembly, errors) else {
        return;
    };

    save_variable(out, errors, ts, message_cnt, vcd_type, &name, value);
}

/// After every message: write the auto-variables N (message number) and
/// TsJumpBack (only on a change) to every VCD file that got data.
pub fn message_post_processing(
    symbols: &mut SymbolTable,
    errors: &mut ErrorState,
    ts: &mut TimestampEngine,
    message_cnt: u32,
) {
    for idx in symbols.out_file_indexes() {
        let Some(out) = symbols.out_file_mut(idx) else { continue };
        let Some(data) = out.vcd.as_deref() else { continue };

        if !data.data_written {
            continue;
        }

        save_variable(
            out,
            errors,
            ts,
            message_cnt,
            VcdType::Float,
            "N",
            message_cnt.to_string(),
        );

        let Some(data) = out.vcd.as_deref_mut() else { continue };
        let jump_back = if data.timestamp_error_found {
            data.timestamp_error_found = false;
            b'1'
        } else {
            b'0'
        };

        if data.last_timestamp_error_value == jump_back {
            data.data_written = false;
            continue;
        }

        save_variable(
            out,
            errors,
            ts,
            message_cnt,
            VcdType::Bit,
            "TsJumpBack",
            (jump_back as char).to_string(),
        );

        let Some(data) = out.vcd.as_deref_mut() else { continue };
        data.last_timestamp_error_value = jump_back;
        data.data_written = false;
    }
}

/// After every message: emit the deferred zero transition of a pending
/// pulse, one nanosecond after the message's transitions.
pub fn write_pulse_var_data(symbols: &mut SymbolTable) {
    for idx in symbols.out_file_indexes() {
        let Some(out) = symbols.out_file_mut(idx) else { continue };
        let OutFile { writer: Some(writer), vcd: Some(data), .. } = &mut *out else { continue };

        if data.pulse_variable_id.is_empty() {
            continue;
        }

        data.last_timestamp_ns += 1;
        let _ = writeln!(writer, "#{}", data.last_timestamp_ns);
        let _ = writeln!(writer, "0{}", data.pulse_variable_id);
        data.pulse_variable_id.clear();
    }
}

fn format_wall_clock() -> String {
    format_system_time(SystemTime::now())
}

/// "YYYY-MM-DD hh:mm:ss" from a system time (UTC).
pub(crate) fn format_system_time(t: SystemTime) -> String {
    let secs = t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);

    // Civil date from the day count (Howard Hinnant's algorithm).
    let days = (secs / 86400) as i64;
    let rem = secs % 86400;
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let year = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { year + 1 } else { year };

    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year,
        month,
        day,
        rem / 3600,
        (rem / 60) % 60,
        rem % 60
    )
}

fn vcd_header(bin_file_comment: &str) -> String {
    format!(
        "$date\n   {}\n$end\n$version\n   RTEmsg v{}\n$end\n$comment\n   {}\n$end\n\
         $timescale\n   1ns\n$end\n\n$scope module RTEdbg $end\n",
        format_wall_clock(),
        RTEMSG_VERSION,
        bin_file_comment,
    )
}

/// $var declarations in alphabetic order; variables that never received a
/// value are omitted. Also fills the .gtkw signal list when present.
fn write_var_names(
    writer: &mut BufWriter<File>,
    data: &VcdFileData,
    mut gtkw: Option<&mut BufWriter<File>>,
) {
    let mut order: Vec<usize> = (0..data.vars.len()).collect();
    order.sort_by(|&a, &b| data.vars[a].name.cmp(&data.vars[b].name));

    let mut default_prefix_pending = true;

    for idx in order {
        if data.previous_bit_value[idx] == 0 {
            continue; // never assigned
        }

        let var = &data.vars[idx];
        let (_, kind, bits) = var.var_type.declaration();
        let _ = writeln!(writer, "$var {} {} {} {} $end", kind, bits, var.id, var.name);

        if let Some(gtkw) = gtkw.as_deref_mut() {
            if var.var_type == VcdType::Analog {
                let _ = writeln!(gtkw, "@88028");
                let _ = writeln!(gtkw, "RTEdbg.{}", var.name);
                let _ = writeln!(gtkw, "@20000\n-");
                default_prefix_pending = true;
            } else {
                if default_prefix_pending {
                    let _ = writeln!(gtkw, "@28");
                    default_prefix_pending = false;
                }
                let _ = writeln!(gtkw, "RTEdbg.{}", var.name);
            }
        }
    }

    let _ = write!(writer, "$upscope $end\n$enddefinitions $end\n\n");
}

fn create_gtkw_file(
    vcd_path: &Path,
    data: &VcdFileData,
    first_ns: u64,
    last_ns: u64,
) -> Option<BufWriter<File>> {
    let name = vcd_path.to_string_lossy();
    if name.len() < 5 {
        return None;
    }

    let gtkw_path = PathBuf::from(format!("{}.gtkw", &name[..name.len() - 4]));
    let mut gtkw = BufWriter::new(File::create(gtkw_path).ok()?);

    let max_name_len = data.vars.iter().map(|v| v.name.len()).max().unwrap_or(0);
    let screen_width = 1920u32;
    let screen_height = 1080u32 - 27;
    let signals_width = ((max_name_len as u32 + 1) * 10 + 114) as f64;

    let time_diff = (last_ns.saturating_sub(first_ns) as f64).max(1.0);
    let scaling =
        (((screen_width as f64 - signals_width) / (1920.0 - signals_width) * 8.2) / time_diff)
            .log2();

    let _ = writeln!(gtkw, "[*] GTKWave configuration file generated by RTEmsg\n[*]");
    let _ = writeln!(gtkw, "[dumpfile] \"{name}\"");
    let _ = writeln!(gtkw, "[timestart] {first_ns}");
    let _ = writeln!(gtkw, "[size] {screen_width} {screen_height}");
    let _ = writeln!(gtkw, "[pos] -1 -1");
    let _ = writeln!(
        gtkw,
        "*{scaling:.6} {first_ns} -1 -1 -1 -1 -1 -1 -1 -1 -1 -1 -1 -1 -1 -1 -1 -1 -1 -1 -1 -1 -1 -1 -1 -1 -1 -1"
    );
    let _ = writeln!(gtkw, "[sst_width] 1");
    let _ = writeln!(gtkw, "[signals_width] 1");
    let _ = writeln!(gtkw, "[sst_expanded] 0");
    let _ = writeln!(gtkw, "[sst_vpaned_height] 1");

    Some(gtkw)
}

/// Finalize every VCD sink: move the body aside, write the final file as
/// header + declarations + body. On a copy failure the partial final file
/// is removed and the `.tmp` body preserved.
pub fn finalize_files(
    symbols: &mut SymbolTable,
    errors: &mut ErrorState,
    sinks: &mut Sinks,
    working_folder: &Path,
    bin_file_comment: &str,
    first_ns: u64,
    last_ns: u64,
    write_gtkw: bool,
) {
    for idx in symbols.out_file_indexes() {
        let Some(out) = symbols.out_file_mut(idx) else { continue };
        if out.vcd.is_none() {
            continue;
        }

        // Close the body file.
        if let Some(mut writer) = out.writer.take() {
            let _ = writer.flush();
        }

        let vcd_path = working_folder.join(&out.path);
        let tmp_path = PathBuf::from(format!("{}.tmp", vcd_path.to_string_lossy()));

        let _ = fs::remove_file(&tmp_path);
        if fs::rename(&vcd_path, &tmp_path).is_err() {
            report_problem(
                errors,
                sinks,
                0,
                None,
                ErrorCode::CannotRenameVcdFileToTemp,
                &[out.path.clone()],
            );
            continue;
        }

        let Ok(final_file) = File::create(&vcd_path) else {
            report_problem(
                errors,
                sinks,
                0,
                None,
                ErrorCode::CannotCreateVcdFile,
                &[out.path.clone()],
            );
            continue;
        };
        let mut final_writer = BufWriter::new(final_file);

        let Some(data) = out.vcd.as_deref() else { continue };
        let mut gtkw = if write_gtkw {
            create_gtkw_file(&vcd_path, data, first_ns, last_ns)
        } else {
            None
        };

        let _ = final_writer.write_all(vcd_header(bin_file_comment).as_bytes());
        write_var_names(&mut final_writer, data, gtkw.as_mut());
        drop(gtkw);

        // Stream the recorded transitions behind the header.
        let copied = (|| -> std::io::Result<()> {
            let mut body = BufReader::new(File::open(&tmp_path)?);
            let mut buffer = [0u8; 4096];
            loop {
                let n = body.read(&mut buffer)?;
                if n == 0 {
                    break;
                }
                final_writer.write_all(&buffer[..n])?;
            }
            final_writer.flush()
        })();

        if copied.is_err() {
            // Keep the .tmp body for manual recovery.
            let _ = fs::remove_file(&vcd_path);
            report_problem(
                errors,
                sinks,
                0,
                None,
                ErrorCode::VcdCopyFailed,
                &[out.path.clone()],
            );
            continue;
        }

        let _ = fs::remove_file(&tmp_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_strings_are_base_94() {
        assert_eq!(id_string(0), "!");
        assert_eq!(id_string(1), "\"");
        assert_eq!(id_string(93), "~");
        assert_eq!(id_string(94), "!\"");
        assert_eq!(id_string(94 * 94), "!!\"");
    }

    #[test]
    fn vcd_extension_check_ignores_case() {
        assert!(is_a_vcd_file("trace.vcd"));
        assert!(is_a_vcd_file("TRACE.VCD"));
        assert!(!is_a_vcd_file("trace.csv"));
        assert!(!is_a_vcd_file("vcd"));
    }

    #[test]
    fn variable_format_validation() {
        assert!(check_variable_format("B clk = T").is_ok());
        assert!(check_variable_format("F level = %[0:32u]u").is_ok());
        assert!(check_variable_format("S state=%Y").is_ok());
        assert_eq!(
            check_variable_format("Q x = 1"),
            Err(ErrorCode::ParseVcdVarTypeNotOk)
        );
        assert_eq!(
            check_variable_format("Bclk = 1"),
            Err(ErrorCode::ParseMandatorySpaceAfterVarType)
        );
        assert_eq!(
            check_variable_format("B clk 1"),
            Err(ErrorCode::ParseVcdEqualSignProblem)
        );
        assert_eq!(
            check_variable_format("B  = 1"),
            Err(ErrorCode::ParseVcdVarDefinitionTooShort)
        );
        assert_eq!(
            check_variable_format("B clk = Q"),
            Err(ErrorCode::ParseWrongSpecialCharacter)
        );
    }

    #[test]
    fn assembly_splits_and_sanitizes() {
        let mut errors = ErrorState::new();
        let (t, name, value) = split_assembly("B clk-a = 1", &mut errors).unwrap();
        assert_eq!(t, VcdType::Bit);
        assert_eq!(name, "clk_a");
        assert_eq!(value, "1");

        let (t, _, value) = split_assembly("S state = a b", &mut errors).unwrap();
        assert_eq!(t, VcdType::Str);
        assert_eq!(value, "a_b");

        assert!(split_assembly("B noequal 1", &mut errors).is_none());
    }
}
