// crates/rtemsg-core/src/sinks.rs
//
// The decoder's own output files. User-declared OUT_FILE sinks live in
// the symbol table; these are the fixed ones created in the working
// folder. Write failures on log output are deliberately swallowed - a
// full disk should not turn every following message into an error storm.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::codes::ErrorCode;
use crate::config::{RTE_ERR_FILE, RTE_MAIN_LOG_FILE, RTE_MSG_TIMESTAMPS_FILE};
use crate::error::{Result, RteError};
use crate::params::Params;
use crate::printf::{self, Arg};

pub struct Sinks {
    pub main_log: Option<BufWriter<File>>,
    pub error_log: Option<BufWriter<File>>,
    pub timestamps: Option<BufWriter<File>>,

    msg_number_fmt: String,
    timestamp_fmt: String,
    time_multiplier: f64,
}

impl Sinks {
    /// Sinks writing to real files in the working folder.
    pub fn create(params: &Params) -> Result<Self> {
        let working = &params.working_folder;

        let error_log = create_file(working, RTE_ERR_FILE)?;
        let main_log = create_file(working, RTE_MAIN_LOG_FILE)?;

        let timestamps = if params.create_timestamp_file {
            let mut file = create_file(working, RTE_MSG_TIMESTAMPS_FILE)?;
            let unit = match params.time_unit {
                'm' => "[ms]",
                'u' => "[us]",
                _ => "[s]",
            };
            let _ = writeln!(file, "msg;timestamp{unit};difference{unit}");
            Some(file)
        } else {
            None
        };

        Ok(Sinks {
            main_log: Some(main_log),
            error_log: Some(error_log),
            timestamps,
            msg_number_fmt: params.msg_number_print.clone(),
            timestamp_fmt: params.timestamp_print.clone(),
            time_multiplier: params.time_multiplier,
        })
    }

    /// In-memory-less sinks for compile-only runs and unit tests.
    pub fn disabled(params: &Params) -> Self {
        Sinks {
            main_log: None,
            error_log: None,
            timestamps: None,
            msg_number_fmt: params.msg_number_print.clone(),
            timestamp_fmt: params.timestamp_print.clone(),
            time_multiplier: params.time_multiplier,
        }
    }

    pub fn main(&mut self, text: &str) {
        if let Some(w) = &mut self.main_log {
            let _ = w.write_all(text.as_bytes());
        }
    }

    pub fn main_bytes(&mut self, bytes: &[u8]) {
        if let Some(w) = &mut self.main_log {
            let _ = w.write_all(bytes);
        }
    }

    pub fn error(&mut self, text: &str) {
        if let Some(w) = &mut self.error_log {
            let _ = w.write_all(text.as_bytes());
        }
    }

    pub fn both(&mut self, text: &str) {
        self.main(text);
        self.error(text);
    }

    /// Message number with the -nr= format (default N%05u).
    pub fn message_number(&self, msg_no: u32) -> String {
        printf::format_one(&self.msg_number_fmt, Some(Arg::U(msg_no as u64)))
    }

    /// Timestamp with the -T= format, scaled to the selected time unit.
    pub fn timestamp(&self, seconds: f64) -> String {
        printf::format_one(&self.timestamp_fmt, Some(Arg::F(seconds * self.time_multiplier)))
    }

    /// One Timestamps.csv record: number, absolute time, delta.
    pub fn timestamp_csv(&mut self, msg_no: u32, seconds: f64, previous: f64) {
        let number = self.message_number(msg_no);
        let mult = self.time_multiplier;
        if let Some(w) = &mut self.timestamps {
            let _ = write!(
                w,
                "{};{:.6};{}\n",
                number,
                seconds * mult,
                (seconds - previous) * mult
            );
        }
    }

    pub fn flush(&mut self) {
        for w in [&mut self.main_log, &mut self.error_log, &mut self.timestamps]
            .into_iter()
            .flatten()
        {
            let _ = w.flush();
        }
    }
}

pub fn create_file(folder: &Path, name: &str) -> Result<BufWriter<File>> {
    let path = folder.join(name);
    match File::create(&path) {
        Ok(f) => Ok(BufWriter::new(f)),
        Err(_) => Err(RteError::fatal(ErrorCode::FatalCantCreateFile, name)),
    }
}
