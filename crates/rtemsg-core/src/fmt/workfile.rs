// crates/rtemsg-core/src/fmt/workfile.rs
//
// Compile output of the -c mode. Every parsed source is mirrored into a
// work buffer with `#define NAME id` lines inserted after the directives
// that assign IDs. A `.fmt` source regenerates its `.fmt.h` companion;
// any other source (typically a header from a previous run) is replaced
// in place. The target file is only touched when the contents differ.

use std::fs;
use std::path::{Path, PathBuf};

use crate::codes::ErrorCode;

pub struct WorkFile {
    target: PathBuf,
    content: String,
}

impl WorkFile {
    pub fn new(source: &Path) -> Self {
        let source_is_fmt = source.extension().is_some_and(|e| e == "fmt");

        let target = if source_is_fmt {
            let mut name = source.as_os_str().to_owned();
            name.push(".h");
            PathBuf::from(name)
        } else {
            source.to_owned()
        };

        let guard = head_guard(&target);
        let content = format!("#ifndef {guard}\n#define {guard}\n");

        WorkFile { target, content }
    }

    pub fn echo_line(&mut self, line: &str) {
        self.content.push_str(line);
        self.content.push('\n');
    }

    pub fn add_define(&mut self, name: &str, value: u32) {
        self.content.push_str(&format!("#define {name} {value}U\n"));
    }

    /// Close the work buffer and replace the target if it changed.
    /// Nothing is written when parsing failed.
    pub fn finish(mut self, parsing_failed: bool, backup: bool) -> Result<(), ErrorCode> {
        if parsing_failed {
            return Ok(());
        }

        self.content.push_str("#endif\n");

        if let Ok(existing) = fs::read_to_string(&self.target) {
            if existing == self.content {
                return Ok(());
            }
        }

        if backup && self.target.exists() {
            let mut bak = self.target.as_os_str().to_owned();
            bak.push(".bak");
            let bak = PathBuf::from(bak);
            let _ = fs::remove_file(&bak);
            fs::rename(&self.target, &bak).map_err(|_| ErrorCode::ParseWorkCannotRename)?;
        }

        // Write to a sibling work file first so the target is replaced in
        // one rename and never left half-written.
        let mut work_path = self.target.as_os_str().to_owned();
        work_path.push(".work");
        let work_path = PathBuf::from(work_path);

        fs::write(&work_path, &self.content).map_err(|_| ErrorCode::ParseCannotCreateWorkFile)?;
        fs::rename(&work_path, &self.target).map_err(|_| {
            let _ = fs::remove_file(&work_path);
            ErrorCode::ParseWorkCannotRename
        })?;

        Ok(())
    }
}

fn head_guard(target: &Path) -> String {
    let name = target.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let mut guard = String::with_capacity(name.len());

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            guard.push(c.to_ascii_uppercase());
        } else {
            guard.push('_');
        }
    }

    guard
}
