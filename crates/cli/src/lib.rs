pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "finops",
    about = "FinOps anomaly workflow CLI",
    long_about = "Trigger anomaly lifecycle workflows, inspect their state, and submit approval decisions.",
    after_help = "Examples:\n  finops trigger --tenant acme --service EC2 --delta 750\n  finops status --workflow-id finops-anomaly-acme-1a2b3c4d\n  finops approve --workflow-id finops-anomaly-acme-1a2b3c4d --by ops-engineer"
)]
pub struct Cli {
    /// Base URL of the finops API server
    #[arg(long, global = true, default_value = "http://localhost:8080")]
    api: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an anomaly lifecycle workflow for a tenant")]
    Trigger {
        #[arg(long, help = "Tenant ID (required)")]
        tenant: String,
        #[arg(long, help = "Cloud service name, e.g. EC2 (required)")]
        service: String,
        #[arg(long, help = "Daily dollar delta (required)")]
        delta: f64,
        #[arg(long, default_value = "123456789012", help = "Cloud account ID")]
        account: String,
        #[arg(long, default_value_t = 0.0, help = "Delta as a percentage of baseline")]
        delta_percent: f64,
        #[arg(long, default_value = "", help = "Analysis window start (YYYY-MM-DD)")]
        window_start: String,
        #[arg(long, default_value = "", help = "Analysis window end (YYYY-MM-DD)")]
        window_end: String,
    },
    #[command(about = "Show a workflow's current state and termination reason")]
    Status {
        #[arg(long, help = "Workflow ID (required)")]
        workflow_id: String,
    },
    #[command(about = "Approve a workflow waiting at the HIL gate")]
    Approve {
        #[arg(long, help = "Workflow ID (required)")]
        workflow_id: String,
        #[arg(long, help = "Approver identity (required)")]
        by: String,
        #[arg(long, default_value = "", help = "Optional approval note")]
        reason: String,
    },
    #[command(about = "Deny a workflow waiting at the HIL gate")]
    Deny {
        #[arg(long, help = "Workflow ID (required)")]
        workflow_id: String,
        #[arg(long, help = "Denier identity (required)")]
        by: String,
        #[arg(long, default_value = "", help = "Denial reason")]
        reason: String,
    },
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Trigger {
            tenant,
            service,
            delta,
            account,
            delta_percent,
            window_start,
            window_end,
        } => {
            commands::trigger::run(&cli.api, commands::trigger::TriggerArgs {
                tenant,
                service,
                delta,
                account,
                delta_percent,
                window_start,
                window_end,
            })
            .await
        }
        Command::Status { workflow_id } => commands::status::run(&cli.api, &workflow_id).await,
        Command::Approve { workflow_id, by, reason } => {
            commands::approval::run(&cli.api, &workflow_id, true, &by, &reason).await
        }
        Command::Deny { workflow_id, by, reason } => {
            commands::approval::run(&cli.api, &workflow_id, false, &by, &reason).await
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::Cli;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn trigger_parses_required_flags() {
        let cli = <Cli as clap::Parser>::try_parse_from([
            "finops", "trigger", "--tenant", "acme", "--service", "EC2", "--delta", "750",
        ])
        .expect("trigger should parse");
        assert_eq!(cli.api, "http://localhost:8080");
    }

    #[test]
    fn api_flag_is_global() {
        let cli = <Cli as clap::Parser>::try_parse_from([
            "finops",
            "status",
            "--workflow-id",
            "finops-anomaly-acme-1a2b3c4d",
            "--api",
            "http://finops.internal:9090",
        ])
        .expect("status should parse");
        assert_eq!(cli.api, "http://finops.internal:9090");
    }
}
