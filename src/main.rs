//! cueplan CLI - evaluate, export and import configuration and data files
//!
//! Usage: cueplan <COMMAND>
//!
//! Commands:
//!   export  Output data in a standard format
//!   def     Print consolidated definitions
//!   eval    Evaluate and print a configuration
//!   import  Convert data files to CUE files
//!   fmt     Format CUE files

mod cli;
mod commands;
mod logging;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cueplan::PlanError;

use cli::{Cli, Commands};
use commands::fmt::FmtOptions;
use commands::InvocationConfig;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let inv = InvocationConfig::load()?;

    match &cli.command {
        Commands::Export { plan } => commands::export::cmd_export(plan, &inv),
        Commands::Def { plan } => commands::def::cmd_def(plan, &inv),
        Commands::Eval { plan, concrete } => commands::eval::cmd_eval(plan, *concrete, &inv),
        Commands::Import { plan, dry_run, ext } => {
            commands::import::cmd_import(plan, *dry_run, ext, &inv)
        }
        Commands::Fmt { files, check, diff } => commands::fmt::cmd_fmt(
            files,
            FmtOptions {
                check: *check,
                diff: *diff,
                indent: inv.settings.output.indent,
            },
        ),
    }
}

/// One `error:` line per reported error.
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<PlanError>() {
        Some(PlanError::Multiple(list)) => {
            for e in &list.0 {
                eprintln!("error: {}", e);
            }
        }
        _ => eprintln!("error: {:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn merge_flag_takes_an_optional_value() {
        let cli = Cli::try_parse_from(["cueplan", "export", "--merge=false", "a.json"]).unwrap();
        let Commands::Export { plan } = cli.command else {
            panic!("expected export");
        };
        assert!(!plan.merge);
        assert_eq!(plan.args, vec!["a.json"]);

        let cli = Cli::try_parse_from(["cueplan", "eval", "-e", "a", "-e", "b", "x.cue"]).unwrap();
        let Commands::Eval { plan, concrete } = cli.command else {
            panic!("expected eval");
        };
        assert!(plan.merge);
        assert!(!concrete);
        assert_eq!(plan.expressions, vec!["a", "b"]);
    }

    #[test]
    fn multiple_errors_are_listed() {
        let mut list = cueplan::ErrorList::default();
        list.push(PlanError::TwoFilePackages);
        list.push(PlanError::MultipleSchemas);
        let err = anyhow::Error::from(PlanError::Multiple(list));
        assert!(matches!(
            err.downcast_ref::<PlanError>(),
            Some(PlanError::Multiple(l)) if l.len() == 2
        ));
    }
}
