use std::process::ExitCode;

use anyhow::Result;
use cueplan::encoding::Mode;

use super::values::{self, ValuesCommand};
use super::InvocationConfig;
use crate::cli::PlanArgs;

/// `concrete` is `-c`: incomplete values become errors.
pub fn cmd_eval(args: &PlanArgs, concrete: bool, inv: &InvocationConfig) -> Result<ExitCode> {
    values::run(
        ValuesCommand {
            name: "eval",
            mode: Mode::Input,
            default_out: "cue",
            concrete,
            headers: true,
        },
        args,
        inv,
    )
}
