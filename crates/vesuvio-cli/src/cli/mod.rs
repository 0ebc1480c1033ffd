mod commands;
mod logging;

use clap::Parser;
use vesuvio_core::domain::ReductionError;

const PROGRAM_NAME: &str = "vesuvio-reduce";

pub fn run_from_env() -> i32 {
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let reduction_error = error.as_reduction_error();
            eprintln!("{}", reduction_error.diagnostic_line());
            eprintln!("{}", reduction_error.fatal_exit_line());
            reduction_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once(PROGRAM_NAME.to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            logging::init_tracing(cli.verbose);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "vesuvio-reduce",
    version,
    about = "Vesuvio foil-state period differencing"
)]
struct Cli {
    /// Log reduction stages (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Sum runs per foil state and write the differenced spectra
    Reduce(commands::ReduceArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Reduce(args) => commands::run_reduce_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Reduction(ReductionError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_reduction_error(&self) -> ReductionError {
        match self {
            Self::Usage(message) => {
                ReductionError::input_validation("INPUT.CLI_USAGE", message.trim_end())
            }
            Self::Reduction(error) => error.clone(),
            Self::Internal(error) => ReductionError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}

impl From<ReductionError> for CliError {
    fn from(error: ReductionError) -> Self {
        Self::Reduction(error)
    }
}

#[cfg(test)]
mod tests {
    use super::{CliError, run};

    #[test]
    fn help_exits_successfully() {
        assert!(matches!(run(["--help"]), Ok(0)));
        assert!(matches!(run(["reduce", "--help"]), Ok(0)));
    }

    #[test]
    fn missing_arguments_are_usage_errors() {
        let error = run(["reduce", "--runs", "2012"]).expect_err("spectra and beta are missing");
        assert!(matches!(error, CliError::Usage(_)));
        let reduction_error = error.as_reduction_error();
        assert_eq!(reduction_error.placeholder(), "INPUT.CLI_USAGE");
        assert_eq!(reduction_error.exit_code(), 2);
    }

    #[test]
    fn malformed_ranges_fail_before_any_file_access() {
        let error = run([
            "reduce",
            "--runs",
            "2012-",
            "--spectra",
            "10",
            "--beta",
            "0.5",
            "--data-dir",
            "/nonexistent",
            "--output",
            "/nonexistent/out.json",
        ])
        .expect_err("run range is malformed");
        assert_eq!(error.as_reduction_error().placeholder(), "INPUT.RANGE_PARSE");
    }
}
