//! The shared driver of `export`, `def` and `eval`: assemble the plan,
//! iterate it and encode every value.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use cueplan::encoding::filetypes::parse_output;
use cueplan::encoding::{Encoding, Mode};
use cueplan::value::ValidateOptions;
use cueplan::{
    assemble, load_units, write_atomic, CodecRegistry, Encoder, ErrorList, OutputRegistry,
    PlanError,
};
use tracing::debug;

use super::InvocationConfig;
use crate::cli::PlanArgs;

/// What distinguishes the value-printing commands.
#[derive(Debug, Clone, Copy)]
pub struct ValuesCommand {
    pub name: &'static str,
    pub mode: Mode,
    /// Output encoding when neither `--out` nor the file name picks one.
    pub default_out: &'static str,
    /// Every regular field must be concrete.
    pub concrete: bool,
    /// Precede values with `// <id>` and `// <expr>` comments when there
    /// are several.
    pub headers: bool,
}

pub fn run(cmd: ValuesCommand, args: &PlanArgs, inv: &InvocationConfig) -> Result<ExitCode> {
    let out = parse_output(
        args.out.as_deref(),
        args.outfile.as_deref(),
        cmd.default_out,
        cmd.mode,
    )?;
    let all_errors = inv.all_errors(args);

    let units = load_units(&args.args, &inv.load_config(false, None))?;
    let flags = inv.plan_flags(args, false, None);
    let mut plan = assemble(
        units,
        &flags,
        inv.encoding_config(cmd.mode, args),
        CodecRegistry::default(),
    )?;

    let outputs = OutputRegistry::new(args.force);
    let dest = if out.is_stdio() {
        None
    } else {
        let path = PathBuf::from(&out.path);
        outputs.claim(&path)?;
        Some(path)
    };

    let several_instances = plan.instance_count() > 1;
    let several_exprs = plan.expression_count() > 1;
    let keep_syntax = cmd.mode != Mode::Export && out.encoding == Encoding::Cue;
    let opts = ValidateOptions {
        concrete: cmd.concrete,
        definitions: cmd.mode == Mode::Def,
    };

    let mut enc = Encoder::new(&out, &plan.cfg, Vec::new())?;
    let mut errs = ErrorList::default();
    let mut last_id: Option<String> = None;
    let mut it = plan.iter();
    debug!(command = cmd.name, "iterating build plan");

    while it.scan() {
        let Some(value) = it.value() else { break };

        let mut problems = value.errors(opts);
        if !problems.is_empty() {
            if !all_errors {
                problems.truncate(1);
            }
            for p in problems {
                errs.push(PlanError::Validation(p.in_file(it.id())));
            }
            if args.ignore {
                continue;
            }
            break;
        }

        if cmd.headers {
            if several_instances && last_id.as_deref() != Some(it.id()) {
                enc.comment(it.id())?;
                last_id = Some(it.id().to_string());
            }
            if several_exprs {
                if let Some(expr) = it.expr() {
                    enc.comment(expr)?;
                }
            }
        }

        let written = match it.file() {
            Some(file) if keep_syntax => enc.encode_file(file),
            _ => enc.encode(value),
        };
        if let Err(e) = written {
            errs.push(e.in_file(it.id()));
            break;
        }
    }
    if let Some(err) = it.take_err() {
        errs.push(err);
    }
    it.close();

    // Under --ignore the values that passed still go to standard output.
    let write_out = errs.is_empty() || (args.ignore && dest.is_none());
    if write_out {
        match enc.close() {
            Ok(bytes) => match &dest {
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&bytes)?;
                    stdout.flush()?;
                }
                Some(path) => write_atomic(path, &bytes)?,
            },
            Err(err) => errs.push(err),
        }
    } else {
        debug!(errors = errs.len(), "iteration failed; nothing written");
    }
    errs.into_result()?;
    Ok(ExitCode::SUCCESS)
}
