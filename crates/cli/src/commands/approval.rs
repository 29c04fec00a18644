use serde_json::json;

use super::{CommandResult, send};

pub async fn run(
    api: &str,
    workflow_id: &str,
    approved: bool,
    by: &str,
    reason: &str,
) -> CommandResult {
    if workflow_id.is_empty() || by.is_empty() {
        return CommandResult::failure("--workflow-id and --by are required");
    }

    let verb = if approved { "approve" } else { "deny" };
    let request = reqwest::Client::new()
        .post(format!("{api}/api/v1/workflows/{workflow_id}/{verb}"))
        .json(&json!({ "by": by, "reason": reason }));
    match send(request).await {
        Ok(response) => CommandResult::success(&response),
        Err(message) => CommandResult::failure(message),
    }
}
