//! Runs the native and Python pipelines on the same golden fixtures,
//! compares triage/analysis/policy outputs, and prints a JSON diff report.
//! Exit code 0 = all phases match, 1 = divergence detected, 2 = error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use finops_shadow::{NativeRunner, PythonRunner, compare};

#[derive(Debug, Parser)]
#[command(
    name = "finops-shadow-compare",
    about = "Compare native and Python pipeline outputs on golden fixtures"
)]
struct Args {
    /// Path to the golden fixtures directory
    #[arg(long)]
    fixtures_dir: PathBuf,

    /// Path to the Python interpreter
    #[arg(long, default_value = "python")]
    python_path: String,

    /// Service name for the synthesized anomaly
    #[arg(long, default_value = "EC2")]
    service: String,

    /// Delta dollars for the synthesized anomaly
    #[arg(long, default_value_t = 750.0)]
    delta: f64,

    /// Run only the native pipeline and print its output
    #[arg(long)]
    native_only: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // The report goes to stdout; logs stay on stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::new("info"))
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    tracing::info!(
        fixtures = %args.fixtures_dir.display(),
        service = %args.service,
        delta = args.delta,
        "running native pipeline"
    );
    let native = NativeRunner::new(&args.fixtures_dir);
    let native_json = match native.run(&args.service, args.delta).await {
        Ok(output) => output,
        Err(error) => {
            tracing::error!(%error, "native pipeline failed");
            return ExitCode::from(2);
        }
    };

    if args.native_only {
        println!("{native_json}");
        return ExitCode::SUCCESS;
    }

    tracing::info!(python = %args.python_path, "running python pipeline");
    let python = PythonRunner::new(&args.python_path, &args.fixtures_dir);
    let python_json = match python.run(&args.service, args.delta).await {
        Ok(output) => output,
        Err(error) => {
            tracing::error!(%error, "python pipeline failed");
            return ExitCode::from(2);
        }
    };

    let result = match compare(&native_json, &python_json) {
        Ok(result) => result,
        Err(error) => {
            tracing::error!(%error, "comparison failed");
            return ExitCode::from(2);
        }
    };

    match serde_json::to_string_pretty(&result) {
        Ok(report) => println!("{report}"),
        Err(error) => {
            tracing::error!(%error, "encode report failed");
            return ExitCode::from(2);
        }
    }

    if !result.all_match {
        tracing::warn!(summary = %result.summary, "divergence detected");
        return ExitCode::from(1);
    }

    tracing::info!("all phases match");
    ExitCode::SUCCESS
}
