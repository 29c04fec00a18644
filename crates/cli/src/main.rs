use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    finops_cli::run().await
}
