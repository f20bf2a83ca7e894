//! Turning command-line arguments into build units.
//!
//! File arguments are gathered into a single user unit. Directory arguments
//! each become a package unit holding the directory's `.cue` files and, when
//! loading data files, the data files in it.

use std::io::Read as _;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use super::{find_module_root, BuildUnit};
use crate::encoding::filetypes::parse_args;
use crate::encoding::{Encoding, FileSpec};
use crate::error::{PlanError, PlanResult};
use crate::syntax::parse_file;

/// How arguments are loaded.
#[derive(Debug, Clone, Default)]
pub struct LoadConfig {
    /// Directory relative arguments are resolved against; empty for the
    /// working directory.
    pub dir: PathBuf,
    /// Include data files found in package directories.
    pub data_files: bool,
    /// Selects the data files of a package directory. Without a filter,
    /// files of every known encoding are picked up.
    pub file_filter: Option<Regex>,
    /// Content used for `-` instead of reading standard input.
    pub stdin: Option<Vec<u8>>,
}

impl LoadConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.dir.join(p)
        }
    }
}

/// Load the units named by `args`. No arguments means the current directory.
///
/// Load failures such as syntax errors are recorded on the unit; only
/// malformed arguments fail the call.
pub fn load_units(args: &[String], cfg: &LoadConfig) -> PlanResult<Vec<BuildUnit>> {
    let specs = if args.is_empty() {
        vec![FileSpec::new(".")]
    } else {
        parse_args(args)?
    };

    let mut units = Vec::new();
    let mut files: Option<BuildUnit> = None;
    for spec in specs {
        let abs = cfg.resolve(&spec.path);
        if !spec.is_stdio() && abs.is_dir() {
            units.push(load_dir(&spec.path, &abs, cfg));
            continue;
        }
        let unit = files.get_or_insert_with(|| {
            let mut unit = BuildUnit::new(true, cfg.dir.clone(), "command-line-arguments");
            unit.module_root = find_module_root(&cfg.dir);
            unit
        });
        add_file(unit, spec, cfg);
    }
    if let Some(unit) = files {
        debug!(
            syntax = unit.syntax.len(),
            orphaned = unit.orphaned.len(),
            "loaded file arguments"
        );
        units.push(unit);
    }
    Ok(units)
}

fn add_file(unit: &mut BuildUnit, mut spec: FileSpec, cfg: &LoadConfig) {
    if spec.is_stdio() && spec.source.is_none() {
        spec.source = cfg.stdin.clone();
    }
    if spec.encoding != Encoding::Cue || spec.form.is_some() || spec.interpretation.is_some() {
        if !spec.is_stdio() {
            spec.path = cfg.resolve(&spec.path).to_string_lossy().into_owned();
        }
        unit.orphaned.push(spec);
        return;
    }
    match read_cue(&spec, cfg).and_then(|src| parse_file(&spec.path, &src)) {
        Ok(file) => unit.add_syntax(file),
        Err(err) => unit.fail(err),
    }
}

fn read_cue(spec: &FileSpec, cfg: &LoadConfig) -> PlanResult<String> {
    let bytes = match (&spec.source, spec.is_stdio(), &cfg.stdin) {
        (Some(src), _, _) => src.clone(),
        (None, true, Some(stdin)) => stdin.clone(),
        (None, true, None) => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
        (None, false, _) => {
            let path = cfg.resolve(&spec.path);
            std::fs::read(&path).map_err(|source| PlanError::Read { path, source })?
        }
    };
    String::from_utf8(bytes).map_err(|e| {
        PlanError::decode(
            crate::syntax::Pos::in_file(&spec.path),
            format!("invalid UTF-8: {}", e.utf8_error()),
        )
    })
}

fn load_dir(display: &str, abs: &Path, cfg: &LoadConfig) -> BuildUnit {
    let mut unit = BuildUnit::new(false, abs, display);
    unit.module_root = find_module_root(abs);

    let mut entries: Vec<PathBuf> = match std::fs::read_dir(abs) {
        Ok(rd) => rd.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(source) => {
            unit.fail(PlanError::Read {
                path: abs.to_path_buf(),
                source,
            });
            return unit;
        }
    };
    entries.sort();

    for path in entries.into_iter().filter(|p| p.is_file()) {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let shown = Path::new(display).join(name).to_string_lossy().into_owned();
        let spec = FileSpec::new(shown);
        if spec.encoding == Encoding::Cue {
            add_file(&mut unit, spec, cfg);
        } else if cfg.data_files {
            let wanted = match &cfg.file_filter {
                Some(re) => re.is_match(name),
                None => spec.encoding.is_known(),
            };
            if wanted {
                add_file(&mut unit, spec, cfg);
            }
        }
    }
    if unit.syntax.is_empty() && unit.orphaned.is_empty() && unit.err.is_none() {
        unit.fail(PlanError::flag(
            "args",
            format!("no CUE files in {}", display),
        ));
    }
    let dir = display;
    debug!(
        dir = dir,
        syntax = unit.syntax.len(),
        orphaned = unit.orphaned.len(),
        "loaded package directory"
    );
    unit
}
