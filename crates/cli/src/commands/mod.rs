pub mod approval;
pub mod status;
pub mod trigger;

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

impl CommandResult {
    pub fn success(payload: &Value) -> Self {
        let output = serde_json::to_string_pretty(payload)
            .unwrap_or_else(|_| payload.to_string());
        Self { exit_code: 0, output }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { exit_code: 1, output: format!("error: {}", message.into()) }
    }
}

/// Issues a request and decodes the JSON body, turning transport failures
/// and non-2xx statuses into readable errors.
pub(crate) async fn send(request: reqwest::RequestBuilder) -> Result<Value, String> {
    let response = request.send().await.map_err(|err| format!("request failed: {err}"))?;
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|err| format!("invalid response body: {err}"))?;

    if !status.is_success() {
        let detail = body
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());
        return Err(format!("{status}: {detail}"));
    }
    Ok(body)
}
