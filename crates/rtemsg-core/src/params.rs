// crates/rtemsg-core/src/params.rs

use std::path::PathBuf;

use crate::config::{DEFAULT_ERROR_REPORT, DEFAULT_NEGATIVE_TIMESTAMP_DIFF,
    DEFAULT_POSITIVE_TIMESTAMP_DIFF};

/// Decoder parameters assembled from the command line (or a parameter
/// file) by the CLI layer. The core never reads the process arguments.
#[derive(Debug, Clone)]
pub struct Params {
    /// Folder in which all output files are created.
    pub working_folder: PathBuf,
    /// Folder containing the format definition files.
    pub fmt_folder: PathBuf,
    /// Binary data file name.
    pub data_file_name: Option<PathBuf>,
    /// The raw command line, echoed into Main.log.
    pub raw_args: Vec<String>,

    pub check_syntax_and_compile: bool,
    pub create_backup: bool,
    pub value_statistics_enabled: bool,
    pub message_statistics_enabled: bool,
    pub debug: bool,
    pub create_timestamp_file: bool,
    pub purge_defines: bool,
    pub additional_newline: bool,
    pub no_gtkw_file: bool,

    /// Time unit for printed timestamps: 's', 'm' or 'u'.
    pub time_unit: char,
    pub time_multiplier: f64,

    /// Number of format ID bits (the -N= argument, 9..=16).
    pub fmt_id_bits: u8,

    /// printf format for timestamps (-T=).
    pub timestamp_print: String,
    /// printf format for message numbers (-nr=).
    pub msg_number_print: String,
    /// Parse error report template (-e=).
    pub report_error: String,

    /// Timestamp difference bounds in normalized units.
    pub max_positive_tstamp_diff: i64,
    pub max_negative_tstamp_diff: i64,
    /// The raw -ts= values in milliseconds (0 = argument not given).
    pub ts_arg_negative_ms: f64,
    pub ts_arg_positive_ms: f64,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            working_folder: PathBuf::from("."),
            fmt_folder: PathBuf::from("."),
            data_file_name: None,
            raw_args: Vec::new(),
            check_syntax_and_compile: false,
            create_backup: false,
            value_statistics_enabled: false,
            message_statistics_enabled: false,
            debug: false,
            create_timestamp_file: false,
            purge_defines: false,
            additional_newline: false,
            no_gtkw_file: false,
            time_unit: 's',
            time_multiplier: 1.0,
            fmt_id_bits: 0,
            timestamp_print: String::new(),
            msg_number_print: "N%05u".to_owned(),
            report_error: DEFAULT_ERROR_REPORT.to_owned(),
            max_positive_tstamp_diff: DEFAULT_POSITIVE_TIMESTAMP_DIFF,
            max_negative_tstamp_diff: DEFAULT_NEGATIVE_TIMESTAMP_DIFF,
            ts_arg_negative_ms: 0.0,
            ts_arg_positive_ms: 0.0,
        }
    }
}

impl Params {
    /// Fill in the defaults that depend on other parameters.
    pub fn finish(&mut self) {
        if self.timestamp_print.is_empty() {
            self.timestamp_print = match self.time_unit {
                'u' => "%8.2f",
                'm' => "%8.3f",
                _ => "%8.6f",
            }
            .to_owned();
        }
    }
}
