use serde_json::json;

use super::{CommandResult, send};

#[derive(Debug, Clone)]
pub struct TriggerArgs {
    pub tenant: String,
    pub service: String,
    pub delta: f64,
    pub account: String,
    pub delta_percent: f64,
    pub window_start: String,
    pub window_end: String,
}

pub async fn run(api: &str, args: TriggerArgs) -> CommandResult {
    if args.tenant.is_empty() || args.service.is_empty() {
        return CommandResult::failure("--tenant and --service are required");
    }

    let body = json!({
        "tenant_id": args.tenant,
        "service": args.service,
        "account_id": args.account,
        "delta_dollars": args.delta,
        "delta_percent": args.delta_percent,
        "window_start": args.window_start,
        "window_end": args.window_end,
    });

    let request = reqwest::Client::new()
        .post(format!("{api}/api/v1/workflows"))
        .json(&body);
    match send(request).await {
        Ok(response) => CommandResult::success(&response),
        Err(message) => CommandResult::failure(message),
    }
}
