use rmcp::model::{
    AnnotateAble, CallToolResult, Content, Implementation, ListResourcesResult, PaginatedRequestParam,
    ProtocolVersion, RawResource, Resource, ServerCapabilities, ServerInfo,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;

use rmcp::{
    Error as McpError, RoleServer, ServerHandler, model::*, schemars,
    service::RequestContext, tool,
};

use super::{DocsService, RefreshSource};
use crate::error::DocsError;

const STATUS_URI: &str = "docs://status";
const CONTEXT_PROMPT: &str = "docs_context";

#[derive(Clone)]
pub struct DocsServer {
    pub service: Arc<DocsService>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchDocsRequest {
    #[schemars(description = "the search query")]
    pub query: String,

    #[schemars(description = "maximum number of results to return (1-20, default 5)")]
    pub max_results: Option<usize>,

    #[schemars(description = "index a first batch of pages when the store is empty")]
    #[serde(default)]
    pub auto_refresh: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IntelligentAgentRequest {
    #[schemars(description = "the user's request or question")]
    pub user_request: String,

    #[schemars(description = "whether to include code validation guidance (default true)")]
    pub include_code_validation: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DetectIntentRequest {
    #[schemars(description = "the text to classify")]
    pub text: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ValidateCodeRequest {
    #[schemars(description = "the generated code to validate")]
    pub code: String,

    #[schemars(description = "the original user request, for extra context")]
    pub original_request: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RefreshDocsRequest {
    #[schemars(description = "maximum number of pages to fetch (defaults to the profile budget)")]
    pub max_pages: Option<usize>,

    #[schemars(description = "rebuild even when the store is already populated")]
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RefreshFromPathRequest {
    #[schemars(description = "a local file or directory of html, markdown or text documentation")]
    pub path: String,

    #[schemars(description = "rebuild even when the store is already populated (default true)")]
    pub force_refresh: Option<bool>,
}

/// Map a library error onto an MCP error carrying `{kind, message}`.
pub fn to_mcp_error(err: DocsError) -> McpError {
    let data = Some(json!({ "kind": err.kind(), "message": err.to_string() }));
    match err {
        DocsError::InvalidQuery { .. } => McpError::invalid_params(err.kind(), data),
        _ => McpError::internal_error(err.kind(), data),
    }
}

fn json_result(value: Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(value.to_string())]))
}

#[tool(tool_box)]
impl DocsServer {
    pub fn new(service: Arc<DocsService>) -> Self {
        Self { service }
    }

    fn create_resource_text(&self, uri: &str, name: &str) -> Resource {
        RawResource::new(uri, name.to_string()).no_annotation()
    }

    #[tool(description = "Semantic search over the indexed documentation")]
    async fn search_docs(
        &self,
        #[tool(aggr)] SearchDocsRequest { query, max_results, auto_refresh }: SearchDocsRequest,
    ) -> Result<CallToolResult, McpError> {
        let value = self
            .service
            .search_docs(&query, max_results, auto_refresh)
            .await
            .map_err(to_mcp_error)?;
        json_result(value)
    }

    #[tool(description = "Detect whether a request concerns this documentation domain and, if so, retrieve formatted documentation context for it")]
    async fn intelligent_agent(
        &self,
        #[tool(aggr)] IntelligentAgentRequest { user_request, include_code_validation }: IntelligentAgentRequest,
    ) -> Result<CallToolResult, McpError> {
        let value = self
            .service
            .intelligent_agent(&user_request, include_code_validation.unwrap_or(true))
            .await
            .map_err(to_mcp_error)?;
        json_result(value)
    }

    #[tool(description = "Classify text against the configured documentation domains")]
    async fn detect_intent(
        &self,
        #[tool(aggr)] DetectIntentRequest { text }: DetectIntentRequest,
    ) -> Result<CallToolResult, McpError> {
        let value = self.service.detect_intent(&text).await.map_err(to_mcp_error)?;
        json_result(value)
    }

    #[tool(description = "Check generated code for API names the documentation does not cover")]
    async fn validate_code(
        &self,
        #[tool(aggr)] ValidateCodeRequest { code, original_request }: ValidateCodeRequest,
    ) -> Result<CallToolResult, McpError> {
        let value = self
            .service
            .validate_code(&code, original_request.as_deref())
            .await
            .map_err(to_mcp_error)?;
        json_result(value)
    }

    #[tool(description = "Crawl the documentation site and rebuild the store")]
    async fn refresh_docs(
        &self,
        #[tool(aggr)] RefreshDocsRequest { max_pages, force_refresh }: RefreshDocsRequest,
    ) -> Result<CallToolResult, McpError> {
        let max_pages = max_pages.unwrap_or(self.service.profile().max_pages);
        let value = self
            .service
            .refresh(RefreshSource::Crawl { max_pages }, force_refresh)
            .await
            .map_err(to_mcp_error)?;
        json_result(value)
    }

    #[tool(description = "Rebuild the store from a local file or directory of documentation")]
    async fn refresh_docs_from_path(
        &self,
        #[tool(aggr)] RefreshFromPathRequest { path, force_refresh }: RefreshFromPathRequest,
    ) -> Result<CallToolResult, McpError> {
        let value = self
            .service
            .refresh(RefreshSource::Path(PathBuf::from(path)), force_refresh.unwrap_or(true))
            .await
            .map_err(to_mcp_error)?;
        json_result(value)
    }

    #[tool(description = "Report whether the documentation store is populated and ready")]
    async fn get_database_status(&self) -> Result<CallToolResult, McpError> {
        json_result(self.service.database_status().await)
    }

    #[tool(description = "Statistics about the indexed corpus")]
    async fn get_index_stats(&self) -> Result<CallToolResult, McpError> {
        let value = self.service.index_stats().await.map_err(to_mcp_error)?;
        json_result(value)
    }
}

#[tool(tool_box)]
impl ServerHandler for DocsServer {
    fn get_info(&self) -> ServerInfo {
        let label = &self.service.profile().label;
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_prompts()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(format!(
                "This server answers questions from the {label} documentation. Use 'intelligent_agent' to detect {label} requests and get formatted context, 'search_docs' for direct semantic search, 'validate_code' to check generated code, and 'refresh_docs' to (re)index the documentation."
            )),
        }
    }

    async fn list_resources(
        &self,
        _request: PaginatedRequestParam,
        _: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: vec![self.create_resource_text(STATUS_URI, "status")],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match uri.as_str() {
            STATUS_URI => {
                let status = self.service.database_status().await;
                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(status.to_string(), uri)],
                })
            }
            _ => Err(McpError::resource_not_found(
                "resource_not_found",
                Some(json!({
                    "uri": uri
                })),
            )),
        }
    }

    async fn list_prompts(
        &self,
        _request: PaginatedRequestParam,
        _: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        Ok(ListPromptsResult {
            next_cursor: None,
            prompts: vec![Prompt::new(
                CONTEXT_PROMPT,
                Some("Prefix a request with relevant documentation context when it concerns this domain"),
                Some(vec![PromptArgument {
                    name: "request".to_string(),
                    description: Some("The user's request".to_string()),
                    required: Some(true),
                }]),
            )],
        })
    }

    async fn get_prompt(
        &self,
        GetPromptRequestParam { name, arguments }: GetPromptRequestParam,
        _: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        match name.as_str() {
            CONTEXT_PROMPT => {
                let request = arguments
                    .as_ref()
                    .and_then(|args| args.get("request"))
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| McpError::invalid_params("missing argument: request", None))?;
                let prompt = self.service.context_prompt(request).await.map_err(to_mcp_error)?;
                Ok(GetPromptResult {
                    description: Some(format!("{} documentation context", self.service.profile().label)),
                    messages: vec![PromptMessage {
                        role: PromptMessageRole::User,
                        content: PromptMessageContent::text(prompt),
                    }],
                })
            }
            _ => Err(McpError::invalid_params("prompt not found", None)),
        }
    }

    async fn list_resource_templates(
        &self,
        _request: PaginatedRequestParam,
        _: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        Ok(ListResourceTemplatesResult {
            next_cursor: None,
            resource_templates: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_query_maps_to_invalid_params() {
        let err = to_mcp_error(DocsError::invalid_query("query text is empty"));
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        let data = err.data.unwrap();
        assert_eq!(data["kind"], "invalid_query");
    }

    #[test]
    fn other_errors_map_to_internal_error() {
        let err = to_mcp_error(DocsError::BuildFailed { attempted: 3 });
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
        assert_eq!(err.data.unwrap()["kind"], "build_failed");
    }
}
