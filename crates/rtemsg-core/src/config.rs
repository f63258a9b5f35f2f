// crates/rtemsg-core/src/config.rs
//
// Compile-time limits of the decoder. The values mirror the embedded
// logging library configuration they were tuned against.

/// Max. number of format ID bits (2^N message types, N in 9..=16).
pub const MAX_FMT_ID_BITS: u8 = 16;
/// Size of the descriptor slot table (covers the largest N).
pub const MAX_FMT_IDS: usize = 1 << MAX_FMT_ID_BITS;

/// Number of message filter bits; fixed by the logging library.
pub const NUMBER_OF_FILTER_BITS: usize = 32;
/// Max. number of named entries (filters + memos + in/out files + inline texts).
pub const MAX_ENUMS: usize = 2000;

/// Max. number of errors reported during format file parsing.
pub const MAX_ERRORS_REPORTED: u32 = 20;
/// Max. number of deferred errors shown for a single decoded message.
pub const MAX_ERRORS_IN_SINGLE_MESSAGE: usize = 10;

/// Number of min/max values kept per statistics accumulator.
pub const MIN_MAX_VALUES: usize = 10;
/// Number of entries in the top-frequency / top-buffer-usage tables.
pub const TOP_MESSAGES: usize = 10;

/// Max. number of consecutive DATA words accepted without a FMT word.
pub const MAX_RAW_DATA_SIZE: usize = 256;
/// Max. logged message length in bytes (256 data words).
pub const MAX_MSG_LENGTH: u32 = 256 * 4;

/// Words loaded at once in the streaming / multiple-capture modes.
pub const STREAM_CHUNK_WORDS: usize = 0x20000;
/// Max. number of words loaded for post-mortem / single-shot decoding.
pub const MAX_BUFFER_WORDS: u32 = 0x800_0005;

/// Max. size of an IN_FILE source in bytes.
pub const MAX_IN_FILE_SIZE: u64 = 10_000_000;
/// Max. length of a line in a format definition file.
pub const MAX_INPUT_LINE_LENGTH: usize = 2004;
/// Max. reported string length during decoding error reporting.
pub const MAX_SHORTENED_STRING: usize = 80;
/// Bound on recursive INCLUDE() nesting.
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// Normalized timestamp period: `timestamp_low` is scaled left so that one
/// full cycle of the low counter is 2^32 units.
pub const NORMALIZED_TSTAMP_PERIOD: i64 = 0x1_0000_0000;
/// Bounds for the -ts command line argument (fraction of the period).
pub const MAX_NEGATIVE_TSTAMP_DIFF: f64 = 0.33;
pub const MAX_POSITIVE_TSTAMP_DIFF: f64 = 0.33;
pub const MIN_TIMESTAMP_DIFF: f64 = 0.01;
pub const DEFAULT_POSITIVE_TIMESTAMP_DIFF: i64 =
    (MAX_POSITIVE_TSTAMP_DIFF * NORMALIZED_TSTAMP_PERIOD as f64) as i64;
pub const DEFAULT_NEGATIVE_TIMESTAMP_DIFF: i64 =
    (-0.10 * NORMALIZED_TSTAMP_PERIOD as f64) as i64;

/// VCD sink limits.
pub const VCD_MAX_VARIABLES_PER_FILE: usize = 500;
pub const VCD_MAX_CONSECUTIVE_TIMESTAMP_ERRORS: u32 = 100;
pub const VCD_MAX_ASSEMBLED_STRING_LEN: usize = 4096;
pub const VCD_STRING_VALUE_MAX_LEN: usize = 64;

// Default input files.
pub const RTE_MAIN_FMT_FILE: &str = "rte_main_fmt.h";

// Names of the utility output files (created in the working folder).
pub const RTE_MAIN_LOG_FILE: &str = "Main.log";
pub const RTE_ERR_FILE: &str = "Errors.log";
pub const RTE_FILTER_FILE: &str = "Filter_names.txt";
pub const RTE_STAT_MAIN_FILE: &str = "Stat_main.log";
pub const RTE_STAT_VALUES_FILE: &str = "Statistics.csv";
pub const RTE_STAT_MSG_COUNTERS_FILE: &str = "Stat_msgs_found.txt";
pub const RTE_STAT_MISSING_MSGS_FILE: &str = "Stat_msgs_missing.txt";
pub const RTE_MSG_TIMESTAMPS_FILE: &str = "Timestamps.csv";
pub const RTE_FORMAT_DBG_FILE: &str = "Format.csv";

pub const DEFAULT_ERROR_REPORT: &str = "%F:%L: error: ERR_%E %D => \"%A\"\n";

pub const RTEMSG_VERSION: &str = env!("CARGO_PKG_VERSION");
