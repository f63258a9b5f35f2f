// crates/rtemsg-cli/src/main.rs

use std::process::ExitCode;

mod args;

// Exit codes of the decoder process.
const EXIT_FMT_PARSING_ERRORS: u8 = 1;
const EXIT_FATAL_DECODING_ERRORS: u8 = 2;
const EXIT_NON_FATAL_DECODING_ERRORS: u8 = 3;
const EXIT_BAD_PARAMETERS: u8 = 16;

fn main() -> ExitCode {
    let raw: Vec<String> = std::env::args().skip(1).collect();

    let params = match args::build_params(&raw) {
        Ok(p) => p,
        Err(message) => {
            eprintln!("{message}");
            eprintln!();
            eprintln!(
                "Syntax: rtemsg output_folder fmt_folder [options] input_file\n\
                 \x20    or rtemsg @parameter_file\n\
                 See the RTEdbg manual for a description of the command line arguments."
            );
            return ExitCode::from(EXIT_BAD_PARAMETERS);
        }
    };

    match rtemsg_core::run(params) {
        Ok(rtemsg_core::RunOutcome::Success) => ExitCode::SUCCESS,
        Ok(rtemsg_core::RunOutcome::FmtErrors) => ExitCode::from(EXIT_FMT_PARSING_ERRORS),
        Ok(rtemsg_core::RunOutcome::FatalDecodeErrors) => {
            ExitCode::from(EXIT_FATAL_DECODING_ERRORS)
        }
        Ok(rtemsg_core::RunOutcome::NonFatalDecodeErrors) => {
            ExitCode::from(EXIT_NON_FATAL_DECODING_ERRORS)
        }
        Err(rtemsg_core::RteError::BadParameters(message)) => {
            eprintln!("rtemsg: {message}");
            ExitCode::from(EXIT_BAD_PARAMETERS)
        }
        Err(err) => {
            eprintln!("rtemsg: {err}");
            ExitCode::from(EXIT_FATAL_DECODING_ERRORS)
        }
    }
}
