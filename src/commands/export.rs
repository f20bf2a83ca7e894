use std::process::ExitCode;

use anyhow::Result;
use cueplan::encoding::Mode;

use super::values::{self, ValuesCommand};
use super::InvocationConfig;
use crate::cli::PlanArgs;

pub fn cmd_export(args: &PlanArgs, inv: &InvocationConfig) -> Result<ExitCode> {
    values::run(
        ValuesCommand {
            name: "export",
            mode: Mode::Export,
            default_out: "json",
            concrete: true,
            headers: false,
        },
        args,
        inv,
    )
}
