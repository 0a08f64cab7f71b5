//! FVM - Formal Verification Methodology driver
//!
//! The `fvm` command loads a verification program, then runs the formal
//! pipeline (lint through prove, plus the coverage post-steps of prove)
//! for every design configuration it declares.
//!
//! ## Exit codes
//!
//! - `0`: every step passed or was allowed to fail
//! - `3`: the program or a command-line value was rejected
//! - `4`: a tool failed
//! - `5`: a coverage goal was not met
//! - `6`: an error was logged during the run
//! - `7`: interrupted with Ctrl-C

mod program;

use anyhow::Result;
use clap::Parser;
use fvm_core::{init_tracing, Config, FailureClass, FvmError};
use fvm_runner::{render_plan, Driver, RunOptions, RunnerError, DEFAULT_OUTDIR};
use fvm_toolchain::{toolchain_by_name, toolchain_from_env, ToolchainError, TOOLCHAIN_ENV};
use program::Program;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(name = "fvm")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Formal Verification Methodology driver", long_about = None)]
struct Cli {
    /// Verification program (.toml, or .json)
    program: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Print the planned designs and steps without running anything
    #[arg(short, long)]
    list: bool,

    /// Output directory
    #[arg(short, long, default_value = DEFAULT_OUTDIR)]
    outdir: PathBuf,

    /// Only run this top-level
    #[arg(short, long)]
    design: Option<String>,

    /// Only run this step (and its post-steps)
    #[arg(short, long)]
    step: Option<String>,

    /// Keep going after a failing step
    #[arg(short = 'c', long = "continue")]
    continue_on_error: bool,

    /// Open each step's results in the tool GUI after the run
    #[arg(short, long)]
    gui: bool,

    /// Open the GUI on a previous run without running anything
    #[arg(long, conflicts_with_all = ["gui", "list"])]
    gui_no_run: bool,

    /// Toolchain to drive
    #[arg(long, env = TOOLCHAIN_ENV)]
    toolchain: Option<String>,
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            outdir: self.outdir.clone(),
            design: self.design.clone(),
            step: self.step.clone(),
            continue_on_error: self.continue_on_error,
            gui: self.gui,
            script_name: self.program.display().to_string(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    match run(cli).await {
        Ok(code) => ExitCode::from(exit_status(code)),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(exit_status(failure_code(&e)))
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let toolchain = match cli.toolchain.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => toolchain_by_name(name)?,
        _ => toolchain_from_env()?,
    };

    let mut config = Config::new(toolchain.catalog());
    let program = Program::load(&cli.program)?;
    program.apply(&mut config, program_dir(&cli.program))?;

    let driver = Driver::new(config, toolchain, cli.run_options());

    if cli.list {
        print!("{}", render_plan(&driver.plan()?));
        return Ok(0);
    }

    if cli.gui_no_run {
        let opened = driver.view_previous()?;
        info!(opened, "viewers started");
        return Ok(0);
    }

    let ctrl_c = driver.cancel_token().install_ctrl_c_handler();
    let results = driver.run().await;
    ctrl_c.abort();

    Ok(results?.exit_code)
}

fn program_dir(program: &Path) -> &Path {
    program.parent().unwrap_or_else(|| Path::new(""))
}

/// Exit code for an error that escaped the run.
///
/// Anything not classified is a rejected program, e.g. a file that does
/// not parse.
fn failure_code(e: &anyhow::Error) -> i32 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<RunnerError>() {
            return err.exit_code();
        }
        if let Some(err) = cause.downcast_ref::<ToolchainError>() {
            return err.class().exit_code();
        }
        if let Some(err) = cause.downcast_ref::<FvmError>() {
            return err.exit_code();
        }
    }
    FailureClass::BadValue.exit_code()
}

fn exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_map_to_run_options() {
        let cli = Cli::try_parse_from([
            "fvm",
            "demos/counter/counter.toml",
            "-o",
            "out",
            "-d",
            "counter",
            "-s",
            "prove",
            "--continue",
        ])
        .unwrap();
        let options = cli.run_options();
        assert_eq!(options.outdir, PathBuf::from("out"));
        assert_eq!(options.design.as_deref(), Some("counter"));
        assert_eq!(options.step.as_deref(), Some("prove"));
        assert!(options.continue_on_error);
        assert!(!options.gui);
        assert_eq!(options.script_name, "demos/counter/counter.toml");
        assert_eq!(program_dir(&cli.program), Path::new("demos/counter"));
    }

    #[test]
    fn test_outdir_defaults() {
        let cli = Cli::try_parse_from(["fvm", "counter.toml"]).unwrap();
        assert_eq!(cli.outdir, PathBuf::from(DEFAULT_OUTDIR));
        assert_eq!(program_dir(&cli.program), Path::new(""));
    }

    #[test]
    fn test_gui_no_run_conflicts_with_gui() {
        assert!(Cli::try_parse_from(["fvm", "p.toml", "--gui", "--gui-no-run"]).is_err());
    }

    #[test]
    fn test_failure_code_follows_error_class() {
        let err = anyhow::Error::new(FvmError::UnknownStep("synth".to_string()));
        assert_eq!(failure_code(&err), 3);

        let err = anyhow::anyhow!("garbled program");
        assert_eq!(failure_code(&err), 3);

        let err = anyhow::Error::new(RunnerError::io(
            "fvm_out",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        ));
        assert_eq!(failure_code(&err), 4);

        let err = anyhow::Error::new(RunnerError::from(FvmError::UnknownDesign("x".to_string())))
            .context("planning");
        assert_eq!(failure_code(&err), 3);
    }

    #[test]
    fn test_exit_status_fits_a_byte() {
        assert_eq!(exit_status(7), 7);
        assert_eq!(exit_status(-1), 1);
    }
}
