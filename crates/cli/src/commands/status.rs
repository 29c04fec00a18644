use serde_json::json;

use super::{CommandResult, send};

pub async fn run(api: &str, workflow_id: &str) -> CommandResult {
    if workflow_id.is_empty() {
        return CommandResult::failure("--workflow-id is required");
    }

    let request =
        reqwest::Client::new().get(format!("{api}/api/v1/workflows/{workflow_id}"));
    match send(request).await {
        Ok(response) => {
            let summary = json!({
                "workflow_id": workflow_id,
                "phase": response["state"]["current_phase"],
                "approval": response["state"]["approval"],
                "should_terminate": response["state"]["should_terminate"],
                "reason": response["reason"],
                "error": response["state"]["error"],
            });
            CommandResult::success(&summary)
        }
        Err(message) => CommandResult::failure(message),
    }
}
