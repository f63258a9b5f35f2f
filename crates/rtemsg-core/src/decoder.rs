// crates/rtemsg-core/src/decoder.rs
//
// The owned decoder context and the two top-level phases: format file
// compilation and binary data decoding. Nothing is global; every
// component hangs off this struct and is threaded by reference.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::codes::ErrorCode;
use crate::config::{
    MAX_NEGATIVE_TSTAMP_DIFF, MAX_POSITIVE_TSTAMP_DIFF, MIN_TIMESTAMP_DIFF,
    NORMALIZED_TSTAMP_PERIOD, RTEMSG_VERSION, RTE_FILTER_FILE, RTE_FORMAT_DBG_FILE,
    RTE_MAIN_LOG_FILE, RTE_STAT_MAIN_FILE, RTE_STAT_MISSING_MSGS_FILE, RTE_STAT_MSG_COUNTERS_FILE,
    RTE_STAT_VALUES_FILE,
};
use crate::descriptor::{DescriptorTable, MsgKind};
use crate::error::{Result, RteError};
use crate::fmt::report::ParseReporter;
use crate::fmt::Compiler;
use crate::header::{HeaderInfo, LoggingMode, RtedbgHeader, HEADER_SIZE};
use crate::loader::{self, LoadProblems, WordStream, SENTINEL};
use crate::params::Params;
use crate::printer;
use crate::reassemble::{self, CurrentMessage, Outcome};
use crate::report::{self, report_problem, ErrorState};
use crate::sinks::Sinks;
use crate::stats::{self, StatsPool};
use crate::symbols::SymbolTable;
use crate::sysmsg;
use crate::timestamp::TimestampEngine;
use crate::vcd;

/// Overall result of a run, mapped to the process exit code by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    /// Errors during format definition processing.
    FmtErrors,
    /// Errors detected and the binary decoding did not finish.
    FatalDecodeErrors,
    /// Errors detected but the whole input was decoded.
    NonFatalDecodeErrors,
}

pub struct Decoder {
    pub params: Params,
    pub header: RtedbgHeader,
    pub hdr: HeaderInfo,
    pub table: DescriptorTable,
    pub symbols: SymbolTable,
    pub stats: StatsPool,
    pub sinks: Sinks,
    pub errors: ErrorState,
    pub stream: WordStream,
    pub ts: TimestampEngine,
    pub cur: CurrentMessage,

    /// Counter of all messages found, broken ones included.
    pub message_cnt: u32,
    pub messages_after_restart: u32,
    /// Number of separate snapshots seen in the data file.
    pub multiple_logging: u32,
    /// Message number after which a first-message warning is shown.
    pub error_warning_in_msg: u32,
    pub previous_csv_time: f64,
    /// Date/time string of the binary file (the %D format type).
    pub date_string: String,
    pub vcd_files_present: bool,
    pub decoding_finished: bool,
}

/// Compile the format definitions and decode the binary file.
pub fn run(mut params: Params) -> Result<RunOutcome> {
    params.finish();

    let topmost_fmt_id = (1u32 << params.fmt_id_bits) - 2;

    let mut table = DescriptorTable::new(topmost_fmt_id);
    sysmsg::install_system_descriptors(&mut table, topmost_fmt_id);
    table.set_start(4);

    let mut symbols = SymbolTable::new();
    let mut stats = StatsPool::new();
    let mut reporter = ParseReporter::new(
        &params.report_error,
        &params.fmt_folder.to_string_lossy(),
        true,
    );

    {
        let mut compiler =
            Compiler::new(&params, &mut table, &mut symbols, &mut stats, &mut reporter);
        compiler.compile();
    }

    let mut sinks = if params.check_syntax_and_compile {
        Sinks::disabled(&params)
    } else {
        Sinks::create(&params)?
    };

    for line in &reporter.rendered {
        sinks.error(line);
    }

    let mut errors = ErrorState::new();
    errors.merge_parse_counters(&reporter.counters, reporter.total_errors);

    if errors.total_errors > 0 {
        // Leftovers of a failed run would be mistaken for decoded output.
        sinks.flush();
        remove_stale_outputs(&params.working_folder);
        return Ok(RunOutcome::FmtErrors);
    }

    if params.debug {
        let content = printer::format_csv(&table, &symbols, &stats);
        write_text_file(&params.working_folder, RTE_FORMAT_DBG_FILE, &content);
    }

    if params.check_syntax_and_compile {
        let content = printer::dump_filter_names(&symbols);
        write_text_file(&params.working_folder, RTE_FILTER_FILE, &content);
        return Ok(RunOutcome::Success);
    }

    let mut decoder = Decoder::open_binary(params, table, symbols, stats, sinks, errors)?;
    decoder.decode()
}

fn write_text_file(folder: &Path, name: &str, content: &str) {
    if let Ok(mut f) = File::create(folder.join(name)) {
        let _ = f.write_all(content.as_bytes());
    }
}

fn remove_stale_outputs(folder: &Path) {
    for name in [
        RTE_MAIN_LOG_FILE,
        RTE_STAT_MAIN_FILE,
        RTE_STAT_MSG_COUNTERS_FILE,
        RTE_STAT_MISSING_MSGS_FILE,
    ] {
        let _ = std::fs::remove_file(folder.join(name));
    }
}

impl Decoder {
    /// Load and validate the binary file header, then linearize the data.
    fn open_binary(
        params: Params,
        table: DescriptorTable,
        symbols: SymbolTable,
        stats: StatsPool,
        mut sinks: Sinks,
        errors: ErrorState,
    ) -> Result<Decoder> {
        let Some(path) = params.data_file_name.clone() else {
            return Err(RteError::fatal(ErrorCode::FatalNoBinFile, ""));
        };

        let file = File::open(&path).map_err(|_| {
            RteError::fatal(ErrorCode::FatalOpenBinDataFile, path.to_string_lossy())
        })?;

        let metadata = file.metadata()?;
        let file_size = metadata.len();

        if file_size <= HEADER_SIZE as u64 {
            return Err(RteError::fatal(
                ErrorCode::FatalFileMustContainMinDataSize,
                format!("{} ({} bytes)", path.to_string_lossy(), file_size),
            ));
        }

        let date_string = metadata
            .modified()
            .map(vcd::format_system_time)
            .unwrap_or_default();

        let mut header_bytes = [0u8; HEADER_SIZE];
        {
            use std::io::Read;
            let mut f = &file;
            f.read_exact(&mut header_bytes).map_err(|_| {
                RteError::fatal(ErrorCode::FatalReadBinDataFile, path.to_string_lossy())
            })?;
        }

        let mut header = RtedbgHeader::parse(&header_bytes)?;
        let hdr = header.unpack(params.fmt_id_bits)?;

        let mut load_problems: LoadProblems = Vec::new();

        if header.timestamp_frequency == 0 {
            load_problems.push((ErrorCode::InitialTimestampFrequencyZero, vec![]));
            header.timestamp_frequency = 1;
        }

        if hdr.single_shot_active && !hdr.single_shot_enabled {
            load_problems.push((ErrorCode::SingleShotActiveButNotEnabledInFw, vec![]));
        }

        let mut params = params;
        check_timestamp_diff_values(&mut params, &header, &hdr)?;

        let stream = loader::load_binary(Box::new(file), file_size, &header, &hdr, &mut load_problems)?;

        let ts = TimestampEngine::new(&hdr, header.timestamp_frequency);
        let vcd_files_present = symbols
            .out_file_indexes()
            .iter()
            .any(|&i| symbols.out_file(i).is_some_and(|o| o.vcd.is_some()));

        let mut d = Decoder {
            params,
            header,
            hdr,
            table,
            symbols,
            stats,
            sinks,
            errors,
            stream,
            ts,
            cur: CurrentMessage::default(),
            message_cnt: 0,
            messages_after_restart: 0,
            multiple_logging: 0,
            error_warning_in_msg: 0,
            previous_csv_time: 0.0,
            date_string,
            vcd_files_present,
            decoding_finished: false,
        };

        d.print_preamble(&path.to_string_lossy());

        for (code, args) in load_problems {
            report_problem(&mut d.errors, &mut d.sinks, 0, None, code, &args);
        }

        Ok(d)
    }

    fn print_preamble(&mut self, data_file: &str) {
        let mut text = format!("RTEmsg v{RTEMSG_VERSION}\n");
        text.push_str(&format!("Binary data file: \"{}\" {}\n", data_file, self.date_string));

        if !self.params.raw_args.is_empty() {
            text.push_str("Command line: ");
            for arg in &self.params.raw_args {
                text.push_str(&format!("\"{arg}\" "));
            }
            text.push('\n');
        }

        if self.header.buffer_size != SENTINEL {
            text.push_str(&format!(
                "Buffer size: {} words, last index: {}\n",
                self.header.buffer_size, self.header.last_index
            ));
        }

        let frequency = self.header.timestamp_frequency as f64
            / (1u64 << self.hdr.timestamp_shift) as f64;
        let period_ms = 1000.0 / frequency * (1u64 << (32 - 1 - self.hdr.fmt_id_bits)) as f64;
        text.push_str(&format!(
            "Timestamp: {:.6} MHz / {} => {:.6} MHz (period: {:.4} ms)\n",
            self.header.timestamp_frequency as f64 / 1e6,
            1u32 << self.hdr.timestamp_shift,
            frequency / 1e6,
            period_ms
        ));

        text.push_str(match self.header.logging_mode() {
            LoggingMode::PostMortem => "Post-mortem data logging\n",
            LoggingMode::SingleShot => "Single shot data logging\n",
            LoggingMode::Streaming => "Streaming mode data logging\n",
            LoggingMode::MultipleCapture => "Multiple data capture\n",
            LoggingMode::Unknown => "Unknown data logging mode\n",
        });

        if !self.hdr.filtering_enabled {
            text.push_str("Message filtering disabled\n");
        } else {
            text.push_str(&format!(
                "Message filter: 0x{:08X} (copy: 0x{:08X})\n",
                self.header.filter, self.header.filter_copy
            ));

            for (i, f) in self.symbols.filters() {
                let enabled = (self.header.filter << i) & 0x8000_0000 != 0;
                let copy_enabled = (self.header.filter_copy << i) & 0x8000_0000 != 0;
                let name = f.description.as_deref().unwrap_or(&f.name);
                text.push_str(&format!(
                    "{:3} = {}({}) \"{}\"\n",
                    i, enabled as u32, copy_enabled as u32, name
                ));
            }
        }

        let unit = match self.params.time_unit {
            'm' => "[ms]",
            'u' => "[us]",
            _ => "[s] ",
        };
        text.push_str(&format!("Message number, timestamp {unit} and data\n"));
        text.push_str("- - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -\n");

        self.sinks.main(&text);
    }

    /// Main decode loop: pull one message at a time from the reassembler
    /// and fan it out; finalize the sinks at the end.
    pub fn decode(&mut self) -> Result<RunOutcome> {
        self.reset_statistics();

        if !self.data_in_the_buffer() {
            return Err(RteError::fatal(
                ErrorCode::FatalNoDataInBinaryInputFile,
                self.params
                    .data_file_name
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ));
        }

        if self.errors.total_errors > 0 {
            self.sinks.main("\n");
        }

        loop {
            let last_index = self.stream.index;
            let outcome =
                reassemble::assemble_message(&mut self.stream, &self.table, &self.hdr, &mut self.cur);
            let errors_before = self.errors.total_errors;

            match outcome {
                Outcome::EndOfBuffer => {
                    self.decoding_finished = true;
                    break;
                }
                Outcome::DataFound => self.process_message(last_index),
                Outcome::BadBlock => self.report_bad_block(last_index),
                Outcome::UnfinishedBlock => self.report_unfinished_block(),
                Outcome::MessageTooLong => self.report_too_long_message(),
            }

            self.errors.total_bad_packet_words += self.cur.bad_packet_words;
            self.errors.total_unfinished_words += self.cur.unfinished_words;
            self.cur.bad_packet_words = 0;
            self.cur.unfinished_words = 0;

            if self.message_cnt == self.error_warning_in_msg
                && self.errors.total_errors != errors_before
            {
                self.sinks.main(
                    "\nWarning: errors in the first message of a snapshot usually mean the \
                     message was only partially captured.",
                );
            }

            if self.params.debug || self.params.additional_newline {
                self.sinks.main("\n");
            }

            self.load_additional_data();
        }

        self.finalize();

        if self.errors.total_errors > 0 {
            if self.decoding_finished {
                Ok(RunOutcome::NonFatalDecodeErrors)
            } else {
                Ok(RunOutcome::FatalDecodeErrors)
            }
        } else {
            Ok(RunOutcome::Success)
        }
    }

    /// Skip leading erased words; false when the buffer holds no data.
    fn data_in_the_buffer(&mut self) -> bool {
        while self.stream.index < self.stream.in_size {
            if self.stream.word(self.stream.index) != SENTINEL {
                return true;
            }
            self.errors.total_unfinished_words += 1;
            self.stream.index += 1;
        }

        false
    }

    fn load_additional_data(&mut self) {
        if self.stream.complete_file_loaded {
            return;
        }

        let threshold = 2 * self.hdr.max_msg_blocks as usize * 5 * 4;
        if self.stream.remaining() <= threshold {
            let mut problems: LoadProblems = Vec::new();
            self.stream.refill(&mut problems);

            // The anchor search progress is measured in buffer indexes and
            // the refill moved the buffer; restart it conservatively.
            self.ts.searched_to_index = 0;

            for (code, args) in problems {
                report_problem(&mut self.errors, &mut self.sinks, self.message_cnt, None, code, &args);
            }
        }
    }

    /// Decode one assembled message.
    fn process_message(&mut self, last_index: usize) {
        let fmt_id = self.cur.fmt_id;
        self.message_cnt += 1;

        let Some(handle) = self.table.handle_at(fmt_id) else {
            self.report_no_definition(fmt_id, last_index);
            return;
        };

        if self.params.debug {
            self.debug_print_message(last_index);
        }

        let message_ok = self.prepare_msg_and_check();

        // The assembled size must match a fixed-length definition.
        let desc = self.table.by_handle(handle);
        let (msg_len, name) = (desc.msg_len, desc.name.clone());

        if msg_len != 0 && self.cur.asm_size != msg_len as usize {
            report_problem(
                &mut self.errors,
                &mut self.sinks,
                self.message_cnt,
                Some(&name),
                ErrorCode::MsgSizeDoesNotMatchDefinition,
                &[self.cur.asm_size.to_string(), msg_len.to_string()],
            );
            printer::hex_dump_current_message(self, true);
            return;
        }

        if fmt_id < 4 {
            self.process_system_messages();
        }

        if fmt_id == sysmsg::streaming_mark(&self.hdr) {
            self.process_streaming_mode_messages();
        } else {
            self.ts.low = self.cur.timestamp_low;
            self.ts.prepare(
                &self.stream,
                &self.table,
                &self.hdr,
                &self.params,
                fmt_id,
                self.message_cnt,
            );

            if message_ok {
                printer::check_extended_data(self);
                printer::print_message(self);
            }
        }

        if self.vcd_files_present {
            vcd::message_post_processing(
                &mut self.symbols,
                &mut self.errors,
                &mut self.ts,
                self.message_cnt,
            );
            vcd::write_pulse_var_data(&mut self.symbols);
        }
    }

    /// Fix up the assembled message according to its kind: append the
    /// extended-data word, or verify the self-describing MSGX length.
    fn prepare_msg_and_check(&mut self) -> bool {
        self.cur.asm_size = self.cur.asm_words() * 4;

        let Some(desc) = self.table.descriptor(self.cur.fmt_id) else {
            return true;
        };

        match desc.kind {
            MsgKind::Extended => {
                let mask = desc.ext_data_mask as u32;
                self.cur.data.push(self.cur.additional_data & mask);
                self.cur.asm_size += 4;
                self.cur.fmt_id &= !mask;
                self.cur.additional_data = 0;
                true
            }
            MsgKind::SelfSized => self.prepare_message_msgx(),
            _ => true,
        }
    }

    /// The last byte of a MSGX message carries its length; the unused
    /// tail bytes of the last DATA word must be zero.
    fn prepare_message_msgx(&mut self) -> bool {
        if self.cur.asm_size == 0 {
            report_problem(
                &mut self.errors,
                &mut self.sinks,
                self.message_cnt,
                None,
                ErrorCode::MsgxSizeEmpty,
                &[],
            );
            return false;
        }

        let last_word = self.cur.data[self.cur.asm_words() - 1];
        let size = ((last_word >> 24) & 0xFF) as usize;

        if size > self.cur.asm_size - 1 {
            report_problem(
                &mut self.errors,
                &mut self.sinks,
                self.message_cnt,
                None,
                ErrorCode::MsgxSizeTooLarge,
                &[size.to_string(), (self.cur.asm_size - 1).to_string()],
            );
            printer::hex_dump_current_message(self, false);
            return false;
        }

        if self.cur.asm_size >= 4 && size < self.cur.asm_size - 4 {
            report_problem(
                &mut self.errors,
                &mut self.sinks,
                self.message_cnt,
                None,
                ErrorCode::MsgxSizeTooSmall,
                &[size.to_string(), (self.cur.asm_size - 4).to_string()],
            );
            printer::hex_dump_current_message(self, false);
            return false;
        }

        let tail = last_word & 0x00FF_FFFF;
        if (tail >> ((size & 3) * 8)) != 0 {
            report_problem(
                &mut self.errors,
                &mut self.sinks,
                self.message_cnt,
                None,
                ErrorCode::MsgxCorrupted,
                &[],
            );
            printer::hex_dump_current_message(self, false);
            return false;
        }

        self.cur.asm_size = size;
        true
    }

    /// LONG_TIMESTAMP and TSTAMP_FREQUENCY carry one data word each.
    fn process_system_messages(&mut self) {
        if self.cur.asm_size != 4 {
            report_problem(
                &mut self.errors,
                &mut self.sinks,
                self.message_cnt,
                None,
                ErrorCode::BadSystemMessage,
                &[self.cur.asm_size.to_string()],
            );
            return;
        }

        let payload = self.cur.data[0];

        match self.cur.fmt_id & !1 {
            sysmsg::LONG_TIMESTAMP => {
                if payload == 0 && self.ts.hi != 0 {
                    // The embedded system was restarted.
                    self.reset_statistics();
                }

                if payload == SENTINEL {
                    // Logged by a timing restart: time begins at zero.
                    self.reset_statistics();
                    self.ts.hi = 0;
                    self.ts.low = 0;
                    self.ts.seconds = 0.0;
                } else {
                    self.ts.hi = payload;
                }
            }

            sysmsg::TSTAMP_FREQUENCY => {
                if payload == 0 {
                    report_problem(
                        &mut self.errors,
                        &mut self.sinks,
                        self.message_cnt,
                        None,
                        ErrorCode::TimestampFrequencyZero,
                        &[],
                    );
                } else {
                    self.ts.set_frequency(&self.hdr, payload);
                }
            }

            _ => self.errors.save_internal_error(report::internal::DECODING_SYS_MESSAGE, 0),
        }
    }

    /// Host-inserted markers in the streaming modes carry a packed
    /// date/time and reset the per-snapshot statistics.
    fn process_streaming_mode_messages(&mut self) {
        self.message_cnt -= 1; // internal messages are not counted

        let special = self.cur.timestamp_low >> (self.hdr.fmt_id_bits as u32 + 1 + 11);
        self.prepare_date_and_time_string();

        match special {
            sysmsg::SYS_HOST_DATE_TIME_INFO => {
                let line = format!("\nData sampled at: {}", self.date_string);
                self.sinks.main(&line);
            }
            sysmsg::SYS_DATA_OVERRUN_DETECTED => {
                let line = format!("\nData overrun detected at: {}", self.date_string);
                self.sinks.main(&line);
                self.reset_statistics();
            }
            sysmsg::SYS_MULTIPLE_LOGGING => {
                let line = format!("\nSnapshot logged at: {}", self.date_string);
                self.sinks.main(&line);
                self.multiple_logging += 1;
                self.reset_statistics();
            }
            other => report_problem(
                &mut self.errors,
                &mut self.sinks,
                self.message_cnt,
                None,
                ErrorCode::UnknownSysCode,
                &[other.to_string()],
            ),
        }
    }

    /// Unpack the 43-bit host date/time: the data word holds the low 32
    /// bits, the timestamp field the top 11.
    fn prepare_date_and_time_string(&mut self) {
        if self.cur.data.is_empty() {
            return;
        }

        let high = (self.cur.timestamp_low >> (self.hdr.fmt_id_bits as u32 + 1)) as u64 & 0x7FF;
        let date_time = self.cur.data[0] as u64 | (high << 32);

        self.date_string = format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
            ((date_time >> 36) & 0x7F) + 2023,
            ((date_time >> 32) & 0x0F) + 1,
            (date_time >> 27) & 0x1F,
            (date_time >> 22) & 0x1F,
            (date_time >> 16) & 0x3F,
            (date_time >> 10) & 0x3F,
            date_time & 0x3FF,
        );
    }

    fn report_no_definition(&mut self, fmt_id: u32, last_index: usize) {
        self.debug_print_message_info(last_index);
        report_problem(
            &mut self.errors,
            &mut self.sinks,
            self.message_cnt,
            None,
            ErrorCode::NoFormattingDefinitionForCode,
            &[fmt_id.to_string()],
        );
        printer::hex_dump_current_message(self, true);
    }

    fn report_bad_block(&mut self, last_index: usize) {
        self.message_cnt += 1;
        self.debug_print_message_info(last_index);

        let mut asm_words = self.cur.asm_words() as u32;
        if asm_words != 0 {
            asm_words += (asm_words + 3) / 4; // include the FMT words
        }

        report_problem(
            &mut self.errors,
            &mut self.sinks,
            self.message_cnt,
            None,
            ErrorCode::BadBlockFound,
            &[(self.cur.bad_packet_words + asm_words).to_string()],
        );
        self.debug_print_message(last_index);
    }

    fn report_unfinished_block(&mut self) {
        self.message_cnt += 1;
        report_problem(
            &mut self.errors,
            &mut self.sinks,
            self.message_cnt,
            None,
            ErrorCode::UnfinishedBlock,
            &[self.cur.unfinished_words.to_string()],
        );
    }

    fn report_too_long_message(&mut self) {
        self.message_cnt += 1;
        let name = self.table.descriptor(self.cur.fmt_id).map(|d| d.name.clone());
        report_problem(
            &mut self.errors,
            &mut self.sinks,
            self.message_cnt,
            name.as_deref(),
            ErrorCode::MessageTooLong,
            &[],
        );
        printer::hex_dump_current_message(self, true);
    }

    fn debug_print_message_info(&mut self, last_index: usize) {
        if self.params.debug {
            let pos = self.stream.stream_position(last_index);
            let number = self.sinks.message_number(self.message_cnt);
            self.sinks.main(&format!("\n  >>>{number}, index: {pos}"));
        }
    }

    fn debug_print_message(&mut self, last_index: usize) {
        if !self.params.debug {
            return;
        }

        self.debug_print_message_info(last_index);
        printer::hex_dump_current_message(self, true);

        if self.cur.bad_packet_words > 0 && !self.cur.raw.is_empty() {
            let mut text = String::from(" :: raw:");
            for w in &self.cur.raw {
                text.push_str(&format!(" 0x{w:08X}"));
            }
            self.sinks.main(&text);
        }
    }

    /// Fold the per-snapshot counters and restart the timestamp search.
    /// Called at start, on snapshot markers and on logging restarts.
    fn reset_statistics(&mut self) {
        stats::fold_counters(&mut self.table);
        self.error_warning_in_msg = self.message_cnt + 1;
        self.ts.reset();
        self.messages_after_restart = 0;
    }

    /// End-of-run processing: statistics files, VCD finalization and the
    /// error summary.
    fn finalize(&mut self) {
        self.reset_statistics();

        let common = stats::common_statistics(
            &self.table,
            self.message_cnt,
            self.errors.total_bad_packet_words,
            self.errors.total_unfinished_words,
            self.multiple_logging,
        );
        if !common.is_empty() {
            write_text_file(&self.params.working_folder, RTE_STAT_MAIN_FILE, &common);
        }

        if self.params.message_statistics_enabled {
            let (found, missing) = stats::message_frequency_files(&self.table);
            write_text_file(&self.params.working_folder, RTE_STAT_MSG_COUNTERS_FILE, &found);
            write_text_file(&self.params.working_folder, RTE_STAT_MISSING_MSGS_FILE, &missing);
        }

        if self.params.value_statistics_enabled && self.message_cnt > 0 {
            let msg_fmt = |n: u32| self.sinks.message_number(n);
            let csv = stats::value_statistics_csv(&self.table, &self.stats, msg_fmt);
            write_text_file(&self.params.working_folder, RTE_STAT_VALUES_FILE, &csv);
        }

        if self.vcd_files_present {
            let comment = format!(
                "{} {}",
                self.params
                    .data_file_name
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                self.date_string
            );
            vcd::finalize_files(
                &mut self.symbols,
                &mut self.errors,
                &mut self.sinks,
                &self.params.working_folder.clone(),
                &comment,
                self.ts.first_ns,
                self.ts.last_ns,
                !self.params.no_gtkw_file,
            );
        }

        report::report_decode_error_summary(&self.errors, &mut self.sinks);
        self.print_notes_and_warnings();
        self.sinks.flush();

        // Flush the user sinks as well.
        for idx in self.symbols.out_file_indexes() {
            if let Some(out) = self.symbols.out_file_mut(idx) {
                if let Some(w) = out.writer.as_mut() {
                    let _ = w.flush();
                }
            }
        }
    }

    fn print_notes_and_warnings(&mut self) {
        let long_ts_warning = !self.ts.long_timestamp_found && self.hdr.long_timestamp_used;

        if !long_ts_warning && self.ts.suspicious_count == 0 {
            return;
        }

        let mut text = String::from("\nNote:");

        if long_ts_warning {
            text.push_str(
                "\n  No long timestamp message was found although the firmware logs them; \
                 absolute times may be off by whole timestamp periods.",
            );
        }

        if self.ts.suspicious_count > 0 {
            text.push_str(&format!(
                "\n  {} message(s) had a suspicious timestamp (marked with '#').",
                self.ts.suspicious_count
            ));
        }

        text.push('\n');
        self.sinks.main(&text);
    }
}

/// Convert and validate the -ts= bounds once the timestamp period is
/// known from the header.
fn check_timestamp_diff_values(
    params: &mut Params,
    header: &RtedbgHeader,
    hdr: &HeaderInfo,
) -> Result<()> {
    if params.ts_arg_negative_ms == 0.0 {
        return Ok(());
    }

    let frequency = header.timestamp_frequency as f64 / (1u64 << hdr.timestamp_shift) as f64;
    let period_ms = 1000.0 / frequency * (1u64 << (32 - 1 - hdr.fmt_id_bits)) as f64;

    let negative = params.ts_arg_negative_ms / period_ms;
    let positive = params.ts_arg_positive_ms / period_ms;

    if negative < -MAX_NEGATIVE_TSTAMP_DIFF
        || negative > -MIN_TIMESTAMP_DIFF
        || positive > MAX_POSITIVE_TSTAMP_DIFF
        || positive < MIN_TIMESTAMP_DIFF
    {
        return Err(RteError::BadParameters(format!(
            "-ts={};{} is outside the accepted fraction of the timestamp period",
            params.ts_arg_negative_ms, params.ts_arg_positive_ms
        )));
    }

    params.max_negative_tstamp_diff = (negative * NORMALIZED_TSTAMP_PERIOD as f64) as i64;
    params.max_positive_tstamp_diff = (positive * NORMALIZED_TSTAMP_PERIOD as f64) as i64;
    Ok(())
}
