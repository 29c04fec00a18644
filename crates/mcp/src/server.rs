//! MCP server exposing FinOps workflow data as tools.
//!
//! Tools mirror the HTTP API's read and approval surface over the shared
//! [`WorkflowQuerier`] interface: list anomalies, fetch state and UI schema,
//! and submit approval decisions.

use std::sync::Arc;

use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::ToolCallContext, wrapper::Parameters},
    model::*,
    schemars::{self, JsonSchema},
    tool, tool_router,
};
use serde::Deserialize;
use tracing::{debug, warn};

use finops_core::uischema;
use finops_engine::activities::ApprovalResponse;
use finops_engine::querier::{ListOptions, WorkflowQuerier};

#[derive(Clone)]
pub struct FinOpsMcpServer {
    querier: Arc<dyn WorkflowQuerier>,
    tool_router: ToolRouter<Self>,
}

impl FinOpsMcpServer {
    pub fn new(querier: Arc<dyn WorkflowQuerier>) -> Self {
        Self { querier, tool_router: Self::tool_router() }
    }

    /// Run the server with stdio transport.
    pub async fn run_stdio(self) -> anyhow::Result<()> {
        use rmcp::service::serve_server;
        use tokio::io::{stdin, stdout};

        tracing::info!("starting MCP server with stdio transport");
        let service = serve_server(self, (stdin(), stdout())).await?;
        let _quit = service.waiting().await?;
        tracing::info!("MCP server shutdown complete");
        Ok(())
    }
}

impl ServerHandler for FinOpsMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "finops-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::default()
            },
            instructions: Some(
                "FinOps anomaly workflow tools. \
                 Tools: list_anomalies, get_anomaly_state, get_anomaly_ui, \
                 approve_actions, deny_actions"
                    .to_string(),
            ),
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let tool_call_context = ToolCallContext::new(self, request, context);
        self.tool_router.call(tool_call_context).await
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> Result<ListToolsResult, rmcp::ErrorData> {
        Ok(ListToolsResult { tools: self.tool_router.list_all(), next_cursor: None })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListAnomaliesInput {
    #[schemars(description = "Optional status filter: running|completed|failed")]
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WorkflowIdInput {
    #[schemars(description = "Workflow ID, e.g. finops-anomaly-acme-1a2b3c4d")]
    pub workflow_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ApprovalInput {
    #[schemars(description = "Workflow ID waiting at the HIL gate")]
    pub workflow_id: String,
    #[schemars(description = "Identity of the approver or denier")]
    pub by: String,
    #[serde(default)]
    pub reason: String,
}

fn pretty(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|err| {
        serde_json::json!({ "error": format!("encode result: {err}") }).to_string()
    })
}

fn error_text(message: impl std::fmt::Display) -> String {
    serde_json::json!({ "error": message.to_string() }).to_string()
}

#[tool_router]
impl FinOpsMcpServer {
    #[tool(description = "List recent anomaly workflows with status, service, and cost delta")]
    async fn list_anomalies(&self, Parameters(input): Parameters<ListAnomaliesInput>) -> String {
        debug!(status = %input.status, "list_anomalies called");

        let mut opts = ListOptions::anomaly_queue();
        opts.status_filter = input.status;
        match self.querier.list_workflows(opts).await {
            Ok(workflows) => pretty(&workflows),
            Err(error) => {
                warn!(%error, "list_anomalies failed");
                error_text(error)
            }
        }
    }

    #[tool(description = "Get full state and evidence for a specific anomaly workflow")]
    async fn get_anomaly_state(&self, Parameters(input): Parameters<WorkflowIdInput>) -> String {
        debug!(workflow_id = %input.workflow_id, "get_anomaly_state called");

        if input.workflow_id.is_empty() {
            return error_text("workflow_id is required");
        }
        match self.querier.get_workflow_state(&input.workflow_id).await {
            Ok(result) => pretty(&result),
            Err(error) => {
                warn!(%error, "get_anomaly_state failed");
                error_text(error)
            }
        }
    }

    #[tool(description = "Get UI schema (components + actions) for rendering an anomaly workflow")]
    async fn get_anomaly_ui(&self, Parameters(input): Parameters<WorkflowIdInput>) -> String {
        debug!(workflow_id = %input.workflow_id, "get_anomaly_ui called");

        if input.workflow_id.is_empty() {
            return error_text("workflow_id is required");
        }
        match self.querier.get_workflow_state(&input.workflow_id).await {
            Ok(result) => pretty(&uischema::build(&result.state)),
            Err(error) => {
                warn!(%error, "get_anomaly_ui failed");
                error_text(error)
            }
        }
    }

    #[tool(description = "Approve pending workflow actions")]
    async fn approve_actions(&self, Parameters(input): Parameters<ApprovalInput>) -> String {
        debug!(workflow_id = %input.workflow_id, by = %input.by, "approve_actions called");
        self.submit(input, true).await
    }

    #[tool(description = "Deny pending workflow actions")]
    async fn deny_actions(&self, Parameters(input): Parameters<ApprovalInput>) -> String {
        debug!(workflow_id = %input.workflow_id, by = %input.by, "deny_actions called");
        self.submit(input, false).await
    }
}

impl FinOpsMcpServer {
    async fn submit(&self, input: ApprovalInput, approved: bool) -> String {
        if input.workflow_id.is_empty() || input.by.is_empty() {
            return error_text("workflow_id and by are required");
        }

        let response = ApprovalResponse { approved, by: input.by, reason: input.reason };
        match self.querier.submit_approval(&input.workflow_id, response).await {
            Ok(result) => pretty(&serde_json::json!({ "result": result })),
            Err(error) => {
                warn!(%error, "approval submission failed");
                error_text(error)
            }
        }
    }
}
