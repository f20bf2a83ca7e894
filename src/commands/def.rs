use std::process::ExitCode;

use anyhow::Result;
use cueplan::encoding::Mode;

use super::values::{self, ValuesCommand};
use super::InvocationConfig;
use crate::cli::PlanArgs;

pub fn cmd_def(args: &PlanArgs, inv: &InvocationConfig) -> Result<ExitCode> {
    values::run(
        ValuesCommand {
            name: "def",
            mode: Mode::Def,
            default_out: "cue",
            concrete: false,
            headers: false,
        },
        args,
        inv,
    )
}
