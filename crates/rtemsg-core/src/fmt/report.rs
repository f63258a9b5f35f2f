// crates/rtemsg-core/src/fmt/report.rs
//
// Error reporting for the format definition compiler. The report layout
// is configurable with the -e= command line template; placeholders:
//   %F  file name            %L  line number
//   %E  error number         %P  file name with the fmt folder prefix
//   %D  error description    %A  offending text (shortened)

use crate::codes::{ErrorCode, TOTAL_ERRORS};
use crate::config::{MAX_ERRORS_REPORTED, MAX_SHORTENED_STRING};

pub struct ParseReporter {
    /// Report template from -e= (or the built-in default).
    pub template: String,
    /// Prefix for the %P placeholder (the fmt folder).
    pub fmt_folder: String,
    /// Echo rendered reports to stderr while parsing.
    pub echo: bool,
    /// Rendered reports, flushed into Errors.log by the caller.
    pub rendered: Vec<String>,
    pub total_errors: u32,
    pub counters: Vec<u32>,
}

/// Marker for an aborted directive; the error has been reported already
/// and the line loop continues with the next input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAbort;

pub type PResult<T> = std::result::Result<T, LineAbort>;

impl ParseReporter {
    pub fn new(template: &str, fmt_folder: &str, echo: bool) -> Self {
        ParseReporter {
            template: template.to_owned(),
            fmt_folder: fmt_folder.to_owned(),
            echo,
            rendered: Vec::new(),
            total_errors: 0,
            counters: vec![0; TOTAL_ERRORS as usize],
        }
    }

    pub fn limit_reached(&self) -> bool {
        self.total_errors >= MAX_ERRORS_REPORTED
    }

    /// Force the error counter to the cap so that parsing stops after the
    /// current line (unrecoverable situations such as an exhausted format
    /// ID space).
    pub fn stop_parsing(&mut self) {
        if self.total_errors < MAX_ERRORS_REPORTED - 1 {
            self.total_errors = MAX_ERRORS_REPORTED - 1;
        }
    }

    /// Report an error and continue (the caller keeps parsing the line).
    pub fn report(&mut self, file: &str, line: u32, code: ErrorCode, context: &str) {
        if self.total_errors < MAX_ERRORS_REPORTED {
            let text = self.render(file, line, code, context);
            if self.echo {
                eprint!("{text}");
            }
            self.rendered.push(text);
        }

        self.total_errors += 1;
        self.counters[code.number() as usize] += 1;
    }

    /// Report an error and abort the current directive.
    pub fn abort<T>(&mut self, file: &str, line: u32, code: ErrorCode, context: &str) -> PResult<T> {
        self.report(file, line, code, context);
        Err(LineAbort)
    }

    fn render(&self, file: &str, line: u32, code: ErrorCode, context: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + 64);
        let mut chars = self.template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }

            match chars.next() {
                Some('L') => out.push_str(&line.to_string()),
                Some('E') => out.push_str(&code.number().to_string()),
                Some('F') => out.push_str(file),
                Some('P') => {
                    if self.fmt_folder.is_empty() {
                        out.push_str(file);
                    } else {
                        out.push_str(&format!("{}/{}", self.fmt_folder, file));
                    }
                }
                Some('D') => out.push_str(code.text()),
                Some('A') => out.push_str(&shorten(context)),
                _ => out.push_str("???"),
            }
        }

        out
    }
}

/// Replace control characters and truncate the context for reporting.
fn shorten(text: &str) -> String {
    let mut out = String::new();

    for c in text.chars().take(MAX_SHORTENED_STRING) {
        out.push(if c < ' ' { ' ' } else { c });
    }

    if text.chars().count() > MAX_SHORTENED_STRING {
        out.push_str("...");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ERROR_REPORT;

    #[test]
    fn default_template_renders_all_parts() {
        let mut r = ParseReporter::new(DEFAULT_ERROR_REPORT, "fmt", false);
        r.report("test.fmt", 7, ErrorCode::ParseNoClosingBracket, "FILTER(F_X");

        assert_eq!(r.total_errors, 1);
        let line = &r.rendered[0];
        assert!(line.contains("test.fmt:7:"));
        assert!(line.contains("ERR_221"));
        assert!(line.contains("Expecting ')'"));
        assert!(line.contains("FILTER(F_X"));
    }

    #[test]
    fn reporting_stops_at_the_cap() {
        let mut r = ParseReporter::new("%E\n", "", false);
        for _ in 0..MAX_ERRORS_REPORTED + 5 {
            r.report("f", 1, ErrorCode::ParseUnknown, "");
        }
        assert_eq!(r.rendered.len(), MAX_ERRORS_REPORTED as usize);
        assert_eq!(r.total_errors, MAX_ERRORS_REPORTED + 5);
        assert!(r.limit_reached());
    }
}
