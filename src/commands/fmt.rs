//! `fmt`: rewrite CUE files in canonical form.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use cueplan::{format_file, parse_file, write_atomic, ErrorList, PlanError};
use similar::TextDiff;
use tracing::debug;

/// What to do with files whose formatting differs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FmtOptions {
    pub check: bool,
    pub diff: bool,
    pub indent: usize,
}

pub fn cmd_fmt(paths: &[PathBuf], opts: FmtOptions) -> Result<ExitCode> {
    let files = collect_files(paths)?;
    let mut errs = ErrorList::default();
    let mut unformatted = 0usize;
    let mut stdout = std::io::stdout().lock();

    for path in &files {
        let shown = path.to_string_lossy();
        let src = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(source) => {
                errs.push(PlanError::Read {
                    path: path.clone(),
                    source,
                });
                continue;
            }
        };
        let formatted = match parse_file(&shown, &src) {
            Ok(file) => format_file(&file, opts.indent),
            Err(err) => {
                errs.push(err);
                continue;
            }
        };
        if formatted == src {
            continue;
        }
        unformatted += 1;
        debug!(file = %shown, "needs formatting");

        if opts.diff {
            write!(stdout, "{}", unified_diff(&shown, &src, &formatted))?;
        } else if opts.check {
            writeln!(stdout, "{}", shown)?;
        } else {
            write_atomic(path, formatted.as_bytes())?;
        }
    }
    stdout.flush()?;
    errs.into_result()?;

    if opts.check && unformatted > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// The `.cue` files named by `paths`; directories contribute their own
/// `.cue` files in name order. No paths means the current directory.
fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let default = [PathBuf::from(".")];
    let paths = if paths.is_empty() { &default[..] } else { paths };
    let mut files = Vec::new();
    for p in paths {
        if p.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(p)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|f| f.is_file() && is_cue(f))
                .collect();
            found.sort();
            files.extend(found.into_iter().map(|f| tidy(p, f)));
        } else {
            files.push(p.clone());
        }
    }
    Ok(files)
}

fn is_cue(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "cue")
}

/// `./a.cue` is shown as `a.cue`.
fn tidy(dir: &Path, file: PathBuf) -> PathBuf {
    if dir == Path::new(".") {
        if let Ok(rel) = file.strip_prefix(".") {
            return rel.to_path_buf();
        }
    }
    file
}

fn unified_diff(path: &str, old: &str, new: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .header(&format!("a/{}", path), &format!("b/{}", path))
        .to_string()
}
