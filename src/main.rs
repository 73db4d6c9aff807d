use clap::error::ErrorKind;
use clap::Parser;
use report_pipeline::{BatchPipeline, PipelineConfig};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: report-pipeline <batch_name>\nExample: report-pipeline may_2025";

#[derive(Parser)]
#[command(name = "report-pipeline")]
#[command(about = "Process a batch of CSV reports into parquet")]
#[command(version)]
struct Args {
    /// Name of the batch directory under the raw data root
    batch_name: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(_) => {
            println!("{}", USAGE);
            return ExitCode::from(1);
        }
    };

    let config = PipelineConfig::from_env();
    let pipeline = match BatchPipeline::new(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!(error = %e, "pipeline_setup_failed");
            return ExitCode::from(1);
        }
    };

    // Stage failures are already logged by the pipeline
    pipeline.run(&args.batch_name);
    ExitCode::SUCCESS
}
