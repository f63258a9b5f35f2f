// crates/rtemsg-core/src/report.rs
//
// Decode-time error accounting. Immediate problems are written to both
// logs right away; problems found while a message is being rendered are
// queued and flushed after the message so they cannot interleave with
// formatted output.

use crate::codes::{self, ErrorCode, TOTAL_ERRORS};
use crate::config::{MAX_ERRORS_IN_SINGLE_MESSAGE, MAX_SHORTENED_STRING};
use crate::sinks::Sinks;

/// One deferred error of the message currently being rendered.
pub struct DeferredError {
    pub code: ErrorCode,
    /// Which value of the message was being processed (1 = first).
    pub value_no: u32,
    pub data1: u32,
    pub data2: u32,
    pub fmt_text: String,
}

#[derive(Default)]
pub struct ErrorState {
    pub counters: Vec<u32>,
    pub total_errors: u32,
    pub total_bad_packet_words: u32,
    pub total_unfinished_words: u32,

    /// Deferred errors of the current message (bounded).
    pub queue: Vec<DeferredError>,
    /// Errors beyond the queue bound, counted but not shown.
    pub overflowed: u32,
    /// Counter of processed values within the current message.
    pub error_value_no: u32,
}

impl ErrorState {
    pub fn new() -> Self {
        ErrorState { counters: vec![0; TOTAL_ERRORS as usize], ..Default::default() }
    }

    fn count(&mut self, code: ErrorCode) {
        self.total_errors += 1;
        self.counters[code.number() as usize] += 1;
    }

    /// Queue an error found while rendering a value; zero is substituted
    /// for the value itself.
    pub fn save_decoding_error(&mut self, code: ErrorCode, data1: u32, data2: u32, fmt_text: &str) {
        self.count(code);

        if self.queue.len() >= MAX_ERRORS_IN_SINGLE_MESSAGE {
            self.overflowed += 1;
            return;
        }

        self.queue.push(DeferredError {
            code,
            value_no: self.error_value_no,
            data1,
            data2,
            fmt_text: fmt_text.to_owned(),
        });
    }

    /// Internal invariants that should not fire during normal execution.
    pub fn save_internal_error(&mut self, sub_code: u32, data: u32) {
        self.save_decoding_error(ErrorCode::InternalError, sub_code, data, "");
    }

    /// Merge the counters accumulated by the format compiler.
    pub fn merge_parse_counters(&mut self, counters: &[u32], total: u32) {
        for (mine, theirs) in self.counters.iter_mut().zip(counters) {
            *mine += theirs;
        }
        self.total_errors += total;
    }
}

/// Replace control characters and truncate a format string for reports.
fn shorten(text: &str) -> String {
    let mut out = String::new();
    for c in text.chars().take(MAX_SHORTENED_STRING) {
        out.push(if c < ' ' { '~' } else { c });
    }
    if text.chars().count() > MAX_SHORTENED_STRING {
        out.push_str("...");
    }
    out
}

/// Printable, quote-safe rendition of a format string for Format.csv.
pub fn shorten_for_csv(text: &str) -> String {
    let mut out = String::new();
    for c in text.chars().take(MAX_SHORTENED_STRING) {
        out.push(match c {
            c if c < ' ' => '~',
            '"' => '\'',
            c => c,
        });
    }
    out
}

/// Report a problem attributed to the current input position. Written to
/// Main.log and Errors.log, prefixed with the current message number.
pub fn report_problem(
    errors: &mut ErrorState,
    sinks: &mut Sinks,
    message_cnt: u32,
    fmt_name: Option<&str>,
    code: ErrorCode,
    args: &[String],
) {
    errors.count(code);

    let mut line = String::from("\n");
    if message_cnt > 0 {
        line.push_str(&sinks.message_number(message_cnt));
        line.push(' ');
    }
    if let Some(name) = fmt_name {
        line.push_str(&format!("'{name}', "));
    }
    line.push_str(&format!("ERR_{:03}: ", code.number()));
    line.push_str(&codes::render(code.text(), args));

    sinks.both(&line);
}

/// Flush the deferred errors of the current message. Returns true when
/// any were printed (the caller rearms the long-timestamp search).
pub fn print_decoding_errors(errors: &mut ErrorState, sinks: &mut Sinks, message_cnt: u32) -> bool {
    if errors.queue.is_empty() {
        errors.overflowed = 0;
        return false;
    }

    let mut out = String::from("\n");
    out.push_str(&sinks.message_number(message_cnt));
    out.push_str(" - decoding error(s) found:");

    if errors.overflowed > 0 {
        out.push_str(&format!(
            " too many errors, only the first {MAX_ERRORS_IN_SINGLE_MESSAGE} shown"
        ));
    }

    for e in &errors.queue {
        if e.fmt_text.is_empty() {
            out.push_str(&format!(
                "\n-->#{} ERR_{:03}: 0x{:X} 0x{:X}",
                e.value_no,
                e.code.number(),
                e.data1,
                e.data2
            ));
            continue;
        }

        out.push_str(&format!(
            "\n-->#{} - \"{}\"\n ERR_{:03}: {}",
            e.value_no,
            shorten(&e.fmt_text),
            e.code.number(),
            codes::render(e.code.text(), &[e.data1.to_string(), e.data2.to_string()])
        ));
    }

    sinks.both(&out);
    errors.queue.clear();
    errors.overflowed = 0;
    true
}

/// Error totals and the per-code breakdown written at the end of a run.
pub fn report_decode_error_summary(errors: &ErrorState, sinks: &mut Sinks) {
    sinks.main("\n\n");

    if errors.total_errors == 0 {
        sinks.main("No errors detected.\n");
        sinks.error("No errors detected.\n");
        return;
    }

    sinks.main(&format!("Total errors detected: {}\n", errors.total_errors));

    sinks.error("\n\n--- Error summary ---");
    for (number, &count) in errors.counters.iter().enumerate() {
        if count == 0 {
            continue;
        }

        let text = all_codes()
            .find(|c| c.number() == number as u32)
            .map(|c| c.text())
            .unwrap_or("");
        sinks.error(&format!("\n{count:6} x ERR_{number:03}: {text}"));
    }

    sinks.error(&format!("\n\nTotal errors detected: {}\n", errors.total_errors));
}

/// All codes, for the summary breakdown.
fn all_codes() -> impl Iterator<Item = ErrorCode> {
    // Safety of the transmute-free approach: probe every number against
    // the closed enumeration via a lookup table built once.
    (0..TOTAL_ERRORS).filter_map(ErrorCode::from_number)
}

impl ErrorCode {
    pub fn from_number(number: u32) -> Option<ErrorCode> {
        use ErrorCode::*;
        const ALL: &[ErrorCode] = &[
            FatalNoDataInBinaryInputFile, FatalNoBinFile, FatalOpenBinDataFile,
            FatalReadBinDataFile, FatalFileMustContainMinDataSize, FatalBadHeaderSize,
            FatalHdrReservedBitsNonZero, FatalFmtIdBitsTooLarge, FatalFmtIdBitsDoesNotMatch,
            FatalUnknownLoggingMode, FatalBufferSizeInHeaderIsZero, FatalSingleShotAndIndexIsZero,
            FatalNoBinData, FatalCantCreateFile, FatalInternalError,
            NoFormattingDefinitionForCode, BadBlockFound, UnfinishedBlock, MessageTooLong,
            MsgSizeDoesNotMatchDefinition, MsgxSizeEmpty, MsgxSizeTooLarge, MsgxSizeTooSmall,
            MsgxCorrupted, BadSystemMessage, TimestampFrequencyZero,
            InitialTimestampFrequencyZero, UnknownSysCode, UnwantedExtendedData,
            ValueSizeTooLarge, ValueNotInMessage, AutoValueAddressNotDivisibleBy32,
            AutoValueSizeNot32, AutoValueAndScaling, FloatSizeMustBe16_32Or64,
            DataSizeNotDivisibleBy8, AddressNotDivisibleBy8, TooSmallIntDataSize,
            TooSmallUintDataSize, PrintBinValueType, InternalError,
            MessageMustContainOneFmtDefinition, ReadBinFileProblem, BinFileSizeNotDivisibleBy4,
            BinFileContainsTooMuchData, NotEnoughDataInBinFile, MessageFileSizeTruncated,
            IndexInCircularBufferOutOfRange, IndexShouldBeZero, SingleShotActiveButNotEnabledInFw,
            UnknownLoggingMode, DecodeUnknownError, VcdValueTypeCharNotFound, VcdNameTooShort,
            VcdVariableTooShort, VcdEqualSignNotFound, TooManyVariablesPerVcdFile,
            VariableDefinedWithDifferentTypeBefore, VcdTooManyConsecutiveTimestampErrors,
            VcdPulseVariableAlreadyDefined, CannotRenameVcdFileToTemp, CannotCreateVcdFile,
            CannotOpenTempVcdFile, VcdCopyFailed, CannotCreateGtkwFile, CantCreateDebugFile,
            AssembleMsgInternalProblem,
            ParseUnknown, ParseUnrecognizedDirective, ParseEmptyString, ParseLineTooLong,
            ParseNoPriorMsg, ParseMsgEmpty, ParseMsgMultipleInLine,
            ParseMsgInLineAfterInOutSelect, ParseMsgDefinition, ParseMsgNameExists,
            ParseMsgSize0To4, ParseExtMsgSize, ParseExtMsgNoBits, ParseExpectingUnderscore,
            ParseMsgDefinitionTooBig, ParseMsg0NotAllowed, ParseFmtIdNotAssigned,
            ParseFmtAlignOverMax, ParseFmtAlignPwrOf2, ParseFmtStartAlignment,
            ParseNoOpeningBracket, ParseNoClosingBracket, ParseSurplusText, ParseExpectingComma,
            ParseInvalidName, ParseBadPrefix, ParseDuplicateName, ParseMaxEnums,
            ParseFilterMaxEnums, ParseFilterDesc, ParseMemoInitVal, ParseFileMode,
            ParseFileModeEmpty, ParseErrorInFileMode, ParseOutFileInitText, ParseOutNotCreated,
            ParseInFileSelectError, ParseInFileTooLong, ParseInFileSelectInvalidOptions,
            ParseInFileSelectMinTwoLines, ParseInSelectUndefined, ParseOutSelectUndefined,
            ParseInOutSelectNoMsg, ParseSelectInFileMultipleInLine,
            ParseSelectOutFileMultipleInLine, ParseInvalidText, ParseUnfinished,
            ParseTypeUnrecognized, ParseTypeAdditionalFormatting, ParseTypeHex,
            ParseHexPrintValueNotAllowed, ParseMemoNotAllowed, ParseStatisticsNotAllowed,
            ParseTypeMsgSize, ParseTypeNotDiv32, ParseSwSizeNotDivisibleBy8,
            ParseSwAddrNotDivisibleBy8, ParseValueInvalidSize, ParseValueNegativeAddr,
            ParseValueSign, ParseValueInvalidChar, ParseValueUnfinished, ParseValueDoubleLength,
            ParseExpectingSquareBracket, ParseRecallDefinition, ParseTimestampDefinition,
            ParseTimestampMsgNotFound, ParseRememberMemoNotFound,
            ParseOverdefinitionAngleBrackets, ParseBadStatisticsName, ParseEmptyStatistics,
            ParseOverdefinitionPipeBrackets, ParseOverdefinitionParentheses,
            ParseOverdefinitionSquareBrackets, ParseScalingInvalidFormat,
            ParseScalingZeroMultiplier, ParseMustHaveValueDef, ParseIndexedTextUnfinished,
            ParseBadIndexedTextLength, ParseIndexedTextAtLeast2Options, ParseYTextUndefined,
            ParseYTextNotUsed, ParseYTextOverdefined, ParseIndexedTextIncomplete,
            ParseUnfinishedComment, ParseCDirectivesNotAllowed, ParseIncludeDepth,
            ParseIncludeCycle, ParseCannotOpenFmtFile, ParseReadFromFmtFile,
            ParseCannotCreateWorkFile, ParseWorkCannotRename, ParseVcdVarTypeNotOk,
            ParseVcdEqualSignProblem, ParseVcdVarDefinitionTooShort, ParseWrongSpecialCharacter,
            ParseMandatorySpaceAfterVarType, ParseFilePath, ParseValDefNotForSpecialFmt,
        ];

        ALL.iter().copied().find(|c| c.number() == number)
    }
}

/// Internal error sub-codes (data1 of ERR_125 reports).
pub mod internal {
    pub const SET_MEMO_OUT_OF_RANGE: u32 = 1;
    pub const GET_MEMO_OUT_OF_RANGE: u32 = 2;
    pub const SET_MEMO_TYPE_IS_NOT_MEMO: u32 = 3;
    pub const GET_MEMO_TYPE_IS_NOT_MEMO: u32 = 4;
    pub const DECODING_SYS_MESSAGE: u32 = 5;
    pub const INCORRECT_AUTO_VALUE_TYPE: u32 = 6;
    pub const FMT_ID_OUT_OF_RANGE: u32 = 7;
    pub const FMT_STRING_NULL: u32 = 8;
    pub const BAD_DATA_TYPE: u32 = 9;
    pub const DECODE_INTERNAL_UNKNOWN_TYPE: u32 = 10;
    pub const OUT_FILE_INDEX_OUT_OF_RANGE: u32 = 11;
    pub const BAD_OUT_FILE_TYPE: u32 = 12;
    pub const OUT_FILE_PTR_NULL: u32 = 13;
    pub const DECODE_Y_TYPE_STRING: u32 = 14;
    pub const DECODE_Y_TYPE_STRING_NULL: u32 = 15;
}
