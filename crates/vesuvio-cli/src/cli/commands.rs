use super::CliError;
use anyhow::Context;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use vesuvio_core::common::{ReductionConfig, load_reduction_config};
use vesuvio_core::domain::{DEFAULT_OUTPUT_NAME, ReductionError, ReductionRequest};
use vesuvio_core::reduction::VesuvioReduction;
use vesuvio_core::runs::{
    DEFAULT_RUN_EXTENSION, DEFAULT_RUN_PREFIX, DirectoryRunLocator, JsonRunLoader,
};
use vesuvio_core::serialization::write_workspace;

#[derive(clap::Args)]
pub(super) struct ReduceArgs {
    /// Run numbers as a range string, e.g. 2012-2020
    #[arg(long)]
    runs: String,

    /// Spectrum IDs as a range string, e.g. 3-134,135-198
    #[arg(long)]
    spectra: String,

    /// Thick-foil weight of the backward double difference
    #[arg(long, allow_hyphen_values = true)]
    beta: f64,

    /// Directory searched for run files (repeatable, searched in order)
    #[arg(long = "data-dir", value_name = "DIR", default_value = ".")]
    data_dirs: Vec<PathBuf>,

    /// Run file name prefix
    #[arg(long, default_value = DEFAULT_RUN_PREFIX)]
    prefix: String,

    /// Run file extension
    #[arg(long, default_value = DEFAULT_RUN_EXTENSION)]
    extension: String,

    /// JSON file overriding reduction windows and constants
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output path; `.json` writes JSON, anything else a text table
    #[arg(long)]
    output: PathBuf,

    /// Name of the output workspace
    #[arg(long, default_value = DEFAULT_OUTPUT_NAME)]
    output_name: String,
}

pub(super) fn run_reduce_command(args: ReduceArgs) -> Result<i32, CliError> {
    let request = ReductionRequest::parse(&args.runs, &args.spectra, args.beta)?
        .with_output_name(args.output_name);

    let config = match &args.config {
        Some(path) => load_reduction_config(path).map_err(ReductionError::from)?,
        None => ReductionConfig::default(),
    };

    let locator = DirectoryRunLocator::new(args.data_dirs)
        .with_prefix(args.prefix)
        .with_extension(args.extension);
    let reduction = VesuvioReduction::with_config(locator, JsonRunLoader, config);
    let output = reduction.execute(&request)?;

    if let Some(parent) = args
        .output
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        fs::create_dir_all(parent).with_context(|| {
            format!("failed to create output directory '{}'", parent.display())
        })?;
    }
    write_workspace(&args.output, &output)?;
    info!(path = %args.output.display(), "wrote output workspace");

    println!(
        "Reduced runs {} ({} spectra) into '{}': {}",
        request.runs,
        request.spectra.len(),
        output.name(),
        args.output.display()
    );
    Ok(0)
}
