//! `import`: turn data files into `.cue` files.
//!
//! Files are decoded and placed while the plan is assembled. Writing the
//! resulting files is independent per file and runs on scoped worker
//! threads that share one output registry.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Result};
use cueplan::encoding::{Encoding, Interpretation, Mode};
use cueplan::{
    assemble, format_file, load_units, write_atomic, CodecRegistry, ErrorList, File,
    OutputRegistry, PlanError,
};
use regex::Regex;
use tracing::{debug, info};

use super::InvocationConfig;
use crate::cli::PlanArgs;

const MODES: &[&str] = &[
    "auto",
    "json",
    "yaml",
    "toml",
    "text",
    "binary",
    "proto",
    "jsonschema",
    "openapi",
    "data",
];

const DEFAULT_FILTER: &str = r"\.(json|yaml|yml|toml|jsonl|ndjson|ldjson)$";

/// How the import mode changes file selection and decoding.
#[derive(Debug)]
struct ImportMode {
    filter: Regex,
    encoding: Option<Encoding>,
    interpretation: Option<Interpretation>,
}

impl ImportMode {
    fn new(mode: Option<&str>, ext: &[String], config_filter: Option<&str>) -> Result<Self> {
        let mut filter = match config_filter {
            Some(f) => f.to_string(),
            None => DEFAULT_FILTER.to_string(),
        };
        let mut encoding = None;
        let mut interpretation = None;
        match mode {
            None | Some("data") => {}
            Some("proto") => {
                filter = r"\.proto$".to_string();
                encoding = Some(Encoding::Protobuf);
            }
            Some("json") => filter = r"\.(json|jsonl|ndjson|ldjson)$".to_string(),
            Some("yaml") => filter = r"\.(yaml|yml)$".to_string(),
            Some("toml") => filter = r"\.toml$".to_string(),
            Some("text") => {
                filter = r"\.txt$".to_string();
                encoding = Some(Encoding::Text);
            }
            Some("binary") => {
                if ext.is_empty() {
                    bail!("use of --ext flag required in binary mode");
                }
                encoding = Some(Encoding::Binary);
            }
            Some("auto") => interpretation = Some(Interpretation::Auto),
            Some("jsonschema") => interpretation = Some(Interpretation::JsonSchema),
            Some("openapi") => interpretation = Some(Interpretation::OpenApi),
            Some(other) => bail!("unknown mode {:?}", other),
        }
        if !ext.is_empty() {
            let alts: Vec<String> = ext
                .iter()
                .map(|e| regex::escape(e.trim().trim_start_matches('.')))
                .collect();
            filter = format!(r"\.({})$", alts.join("|"));
        }
        let filter = Regex::new(&filter)
            .map_err(|e| PlanError::flag("ext", format!("invalid file filter {:?}: {}", filter, e)))?;
        Ok(Self {
            filter,
            encoding,
            interpretation,
        })
    }
}

/// The mode is an optional first argument naming one of [`MODES`].
fn split_mode(args: &[String]) -> (Option<&str>, &[String]) {
    match args.split_first() {
        Some((first, rest)) if MODES.contains(&first.as_str()) && !Path::new(first).exists() => {
            (Some(first.as_str()), rest)
        }
        _ => (None, args),
    }
}

#[derive(Debug)]
enum Outcome {
    Written(PathBuf),
    Skipped(PathBuf),
    Planned(PathBuf),
    Failed(PlanError),
}

pub fn cmd_import(
    args: &PlanArgs,
    dry_run: bool,
    ext: &[String],
    inv: &InvocationConfig,
) -> Result<ExitCode> {
    let (mode, rest) = split_mode(&args.args);
    let import = ImportMode::new(mode, ext, inv.settings.import.file_filter.as_deref())?;
    debug!(mode = mode.unwrap_or("default"), filter = %import.filter, "import mode");

    let load = inv.load_config(true, Some(import.filter.clone()));
    let mut units = load_units(rest, &load)?;
    if args.package.is_none() && units.len() > 1 {
        bail!("must specify package name with the -p flag");
    }
    for spec in units.iter_mut().flat_map(|u| u.orphaned.iter_mut()) {
        if let Some(enc) = &import.encoding {
            if !spec.encoding.is_known() {
                spec.encoding = enc.clone();
            }
        }
        if spec.interpretation.is_none() {
            spec.interpretation = import.interpretation;
        }
    }

    let flags = inv.plan_flags(args, true, Some(import.filter.clone()));
    let plan = assemble(
        units,
        &flags,
        inv.encoding_config(Mode::Input, args),
        CodecRegistry::default(),
    )?;
    let indent = plan.cfg.indent;
    let files = plan.imported;
    info!(files = files.len(), "import planned");

    let targets = destinations(&files, args.outfile.as_deref())?;
    if targets.iter().any(|t| t.is_none()) {
        let mut stdout = std::io::stdout().lock();
        for (file, target) in files.iter().zip(&targets) {
            if target.is_none() {
                stdout.write_all(format_file(file, indent).as_bytes())?;
            }
        }
        stdout.flush()?;
    }

    let jobs: Vec<(&File, PathBuf)> = files
        .iter()
        .zip(targets)
        .filter_map(|(f, t)| t.map(|t| (f, t)))
        .collect();
    let outputs = OutputRegistry::new(args.force);
    let outcomes = write_all(&jobs, &outputs, indent, dry_run);

    let mut errs = ErrorList::default();
    let mut skipped = false;
    for outcome in outcomes {
        match outcome {
            Outcome::Written(path) => debug!(path = %path.display(), "imported"),
            Outcome::Planned(path) => println!("importing into {}", path.display()),
            Outcome::Skipped(path) => {
                eprintln!("Skipping file {:?}: already exists.", path.display().to_string());
                skipped = true;
            }
            Outcome::Failed(err) => errs.push(err),
        }
    }
    if skipped {
        eprintln!("Use -f to override.");
    }
    errs.into_result()?;
    Ok(ExitCode::SUCCESS)
}

/// Where each imported file goes; `None` is standard output.
fn destinations(files: &[File], outfile: Option<&str>) -> Result<Vec<Option<PathBuf>>> {
    match outfile {
        Some("-") => Ok(files.iter().map(|_| None).collect()),
        Some(path) if files.len() > 1 => Err(PlanError::flag(
            "outfile",
            format!("cannot write {} files to a single output file {}", files.len(), path),
        )
        .into()),
        Some(path) => Ok(files.iter().map(|_| Some(PathBuf::from(path))).collect()),
        None => Ok(files
            .iter()
            .map(|f| (f.filename != "-").then(|| PathBuf::from(&f.filename)))
            .collect()),
    }
}

/// Write `jobs` on scoped workers. Outcomes come back in job order.
fn write_all(jobs: &[(&File, PathBuf)], outputs: &OutputRegistry, indent: usize, dry_run: bool) -> Vec<Outcome> {
    scatter(
        jobs,
        |(file, path)| write_one(file, path, outputs, indent, dry_run),
        |(_, path)| {
            Outcome::Failed(PlanError::Io(std::io::Error::other(format!(
                "import worker panicked before writing {}",
                path.display()
            ))))
        },
    )
}

/// Run `work` over `jobs` on scoped workers, one result per job in job
/// order. Jobs of a worker that panicked report `lost(job)`.
fn scatter<J, R, W, L>(jobs: &[J], work: W, lost: L) -> Vec<R>
where
    J: Sync,
    R: Send,
    W: Fn(&J) -> R + Sync,
    L: Fn(&J) -> R,
{
    if jobs.is_empty() {
        return Vec::new();
    }
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(jobs.len());
    let chunk = jobs.len().div_ceil(workers);
    let work = &work;
    std::thread::scope(|s| {
        let handles: Vec<_> = jobs
            .chunks(chunk)
            .map(|part| (part, s.spawn(move || part.iter().map(work).collect::<Vec<R>>())))
            .collect();
        handles
            .into_iter()
            .flat_map(|(part, handle)| match handle.join() {
                Ok(results) => results,
                Err(_) => part.iter().map(&lost).collect(),
            })
            .collect()
    })
}

fn write_one(file: &File, path: &Path, outputs: &OutputRegistry, indent: usize, dry_run: bool) -> Outcome {
    match outputs.try_claim(path) {
        Ok(true) => {}
        Ok(false) => return Outcome::Skipped(path.to_path_buf()),
        Err(err) => return Outcome::Failed(err),
    }
    if dry_run {
        return Outcome::Planned(path.to_path_buf());
    }
    match write_atomic(path, format_file(file, indent).as_bytes()) {
        Ok(()) => Outcome::Written(path.to_path_buf()),
        Err(err) => Outcome::Failed(err),
    }
}
