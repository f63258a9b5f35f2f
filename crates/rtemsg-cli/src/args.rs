// crates/rtemsg-cli/src/args.rs
//
// Command line handling. The decoder keeps the legacy single-dash
// argument spelling (-stat=all, -N=12, -T=9.3f, @parameter_file); a
// normalization pass rewrites those tokens into clap's long-option form
// before parsing, so clap stays the single source of truth for the
// argument definitions.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;

use rtemsg_core::fmt::escape::process_escape_sequences;
use rtemsg_core::Params;

#[derive(Parser)]
#[command(name = "rtemsg")]
#[command(about = "RTEdbg binary data file decoder", long_about = None)]
struct Cli {
    /// Folder in which the output files are created
    working_folder: PathBuf,

    /// Folder containing the format definition files
    fmt_folder: PathBuf,

    /// Binary data file
    data_file: Option<PathBuf>,

    /// Check the format file syntax and generate the definition headers
    #[arg(long)]
    compile: bool,

    /// Use UTF-8 console output (always on in this implementation)
    #[arg(long)]
    utf8: bool,

    /// Keep a .bak copy of regenerated format files
    #[arg(long)]
    backup: bool,

    /// printf format for message numbers (without the leading %)
    #[arg(long)]
    nr: Option<String>,

    /// Statistics selection: all, msg or value
    #[arg(long)]
    stat: Option<String>,

    /// Additional debugging output (hex dumps, Format.csv)
    #[arg(long)]
    debug: bool,

    /// Generate Timestamps.csv
    #[arg(long)]
    timestamps: bool,

    /// Parse error report template with %F %L %E %P %D %A placeholders
    #[arg(long = "error-format")]
    error_format: Option<String>,

    /// Time unit for printed timestamps: s, m/ms or u/us
    #[arg(long)]
    time: Option<String>,

    /// Locale name (accepted for compatibility; output is always UTF-8)
    #[arg(long)]
    locale: Option<String>,

    /// Print an additional newline after every message
    #[arg(long)]
    newline: bool,

    /// Number of format ID bits (9..=16); must match the firmware
    #[arg(long = "fmt-id-bits")]
    fmt_id_bits: Option<u8>,

    /// Drop the #define lines when regenerating format files
    #[arg(long)]
    purge: bool,

    /// printf format for timestamps (without the leading %)
    #[arg(long = "timestamp-format")]
    timestamp_format: Option<String>,

    /// Timestamp difference bounds in ms: "<negative>;<positive>"
    #[arg(long)]
    ts: Option<String>,

    /// Do not generate the .gtkw files next to .vcd outputs
    #[arg(long = "no-gtkw")]
    no_gtkw: bool,
}

/// Rewrite a legacy argument into clap's long-option form.
fn normalize(arg: &str) -> String {
    const RENAMES: &[(&str, &str)] = &[
        ("-c", "--compile"),
        ("-utf8", "--utf8"),
        ("-back", "--backup"),
        ("-debug", "--debug"),
        ("-timestamps", "--timestamps"),
        ("-newline", "--newline"),
        ("-purge", "--purge"),
        ("-no-gtkw", "--no-gtkw"),
    ];

    const PREFIX_RENAMES: &[(&str, &str)] = &[
        ("-nr=", "--nr="),
        ("-stat=", "--stat="),
        ("-e=", "--error-format="),
        ("-time=", "--time="),
        ("-locale=", "--locale="),
        ("-N=", "--fmt-id-bits="),
        ("-T=", "--timestamp-format="),
        ("-ts=", "--ts="),
    ];

    for (old, new) in RENAMES {
        if arg == *old {
            return (*new).to_owned();
        }
    }

    for (old, new) in PREFIX_RENAMES {
        if let Some(rest) = arg.strip_prefix(old) {
            return format!("{new}{rest}");
        }
    }

    arg.to_owned()
}

/// Read a @parameter_file: line 1 = working folder, line 2 = fmt folder,
/// every further non-empty line one argument.
fn expand_parameter_file(name: &str) -> anyhow::Result<Vec<String>> {
    let content = fs::read_to_string(name)
        .with_context(|| format!("cannot open the parameter file \"{name}\""))?;

    let mut lines = content.lines().map(str::trim);

    let working = lines
        .next()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| anyhow!("the parameter file is missing the output folder line"))?;
    let fmt = lines
        .next()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| anyhow!("the parameter file is missing the fmt folder line"))?;

    let mut args = vec![working.to_owned(), fmt.to_owned()];
    args.extend(lines.filter(|l| !l.is_empty()).map(str::to_owned));
    Ok(args)
}

/// Assemble the decoder parameters from the raw process arguments.
pub fn build_params(raw: &[String]) -> anyhow::Result<Params> {
    let raw: Vec<String> = if raw.len() == 1 && raw[0].starts_with('@') {
        expand_parameter_file(&raw[0][1..])?
    } else {
        raw.to_vec()
    };

    let mut argv = vec!["rtemsg".to_owned()];
    argv.extend(raw.iter().map(|a| normalize(a)));

    let cli = Cli::try_parse_from(&argv).map_err(|e| anyhow!("{e}"))?;

    let mut params = Params {
        working_folder: cli.working_folder,
        fmt_folder: cli.fmt_folder,
        data_file_name: cli.data_file,
        raw_args: raw,
        check_syntax_and_compile: cli.compile,
        create_backup: cli.backup,
        debug: cli.debug,
        create_timestamp_file: cli.timestamps,
        purge_defines: cli.purge,
        additional_newline: cli.newline,
        no_gtkw_file: cli.no_gtkw,
        ..Params::default()
    };

    // -utf8 and -locale are accepted for compatibility with existing
    // parameter files; the output encoding is UTF-8 regardless.
    let _ = (cli.utf8, cli.locale);

    match cli.stat.as_deref() {
        None => {}
        Some("all") => {
            params.value_statistics_enabled = true;
            params.message_statistics_enabled = true;
        }
        Some("msg") => params.message_statistics_enabled = true,
        Some("value") => params.value_statistics_enabled = true,
        Some(other) => return Err(anyhow!("unknown -stat= selection \"{other}\"")),
    }

    match cli.time.as_deref() {
        None => {}
        Some("s") => {
            params.time_unit = 's';
            params.time_multiplier = 1.0;
        }
        Some("m") | Some("ms") => {
            params.time_unit = 'm';
            params.time_multiplier = 1e3;
        }
        Some("u") | Some("us") => {
            params.time_unit = 'u';
            params.time_multiplier = 1e6;
        }
        Some(other) => return Err(anyhow!("unknown -time= unit \"{other}\"")),
    }

    match cli.fmt_id_bits {
        Some(n) if (9..=16).contains(&n) => params.fmt_id_bits = n,
        Some(n) => return Err(anyhow!("-N={n} is out of range (9..=16)")),
        None => return Err(anyhow!("the -N= argument (number of format ID bits) is required")),
    }

    if let Some(nr) = cli.nr {
        params.msg_number_print = format!("%{nr}");
    }

    if let Some(t) = cli.timestamp_format {
        params.timestamp_print = format!("%{t}");
    }

    if let Some(e) = cli.error_format {
        let trimmed = e.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(&e);
        params.report_error = process_escape_sequences(trimmed);
    }

    if let Some(ts) = cli.ts {
        let (neg, pos) = ts
            .split_once(';')
            .ok_or_else(|| anyhow!("-ts= expects \"<negative>;<positive>\" in ms"))?;
        let neg: f64 = neg.parse().map_err(|_| anyhow!("bad -ts= negative bound"))?;
        let pos: f64 = pos.parse().map_err(|_| anyhow!("bad -ts= positive bound"))?;

        if neg >= 0.0 || pos <= 0.0 {
            return Err(anyhow!("-ts= bounds must be <negative>;<positive>"));
        }

        params.ts_arg_negative_ms = neg;
        params.ts_arg_positive_ms = pos;
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn legacy_flags_are_normalized() {
        let params = build_params(&args(&[
            "out", "fmt", "data.bin", "-N=12", "-stat=all", "-debug", "-time=ms",
        ]))
        .unwrap();

        assert_eq!(params.fmt_id_bits, 12);
        assert!(params.value_statistics_enabled);
        assert!(params.message_statistics_enabled);
        assert!(params.debug);
        assert_eq!(params.time_unit, 'm');
        assert_eq!(params.time_multiplier, 1e3);
        assert_eq!(params.data_file_name.as_deref().unwrap().to_str(), Some("data.bin"));
    }

    #[test]
    fn n_argument_is_mandatory_and_bounded() {
        assert!(build_params(&args(&["out", "fmt", "x.bin"])).is_err());
        assert!(build_params(&args(&["out", "fmt", "x.bin", "-N=8"])).is_err());
        assert!(build_params(&args(&["out", "fmt", "x.bin", "-N=17"])).is_err());
        assert!(build_params(&args(&["out", "fmt", "x.bin", "-N=9"])).is_ok());
    }

    #[test]
    fn printf_arguments_get_their_percent() {
        let params =
            build_params(&args(&["out", "fmt", "x.bin", "-N=9", "-T=9.3f", "-nr=06u"])).unwrap();
        assert_eq!(params.timestamp_print, "%9.3f");
        assert_eq!(params.msg_number_print, "%06u");
    }

    #[test]
    fn ts_bounds_are_signed() {
        let ok = build_params(&args(&["out", "fmt", "x.bin", "-N=9", "-ts=-5;10"])).unwrap();
        assert_eq!(ok.ts_arg_negative_ms, -5.0);
        assert_eq!(ok.ts_arg_positive_ms, 10.0);

        assert!(build_params(&args(&["out", "fmt", "x.bin", "-N=9", "-ts=5;10"])).is_err());
    }
}
