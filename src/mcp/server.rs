//! MCP server exposing the resolver as tools.

use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use tokio::sync::RwLock;

use crate::backend::{create_backend, BackendResult, NewPullRequest};
use crate::config::Config;
use crate::engine::{CommandEngine, Session};
use crate::mcp::tools::{
    CloneWorkItemParams, CreatePullRequestParams, CreateWorkItemParams, FileContentParams,
    IdParams, ListParams, PullRequestCommentParams, RepositoryParams, ResolveParams,
    UpdateWorkItemParams, WorkItemListParams,
};
use crate::query::Resource;
use crate::render::{Payload, RenderedOutput};

fn tool_result(output: RenderedOutput) -> CallToolResult {
    let is_error = output.is_error();
    let content = vec![Content::text(output.into_string())];
    if is_error {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}

/// MCP server handler. Each instance owns one operator session.
#[derive(Clone)]
pub struct DevOpsServer {
    engine: Arc<CommandEngine>,
    session: Arc<RwLock<Session>>,
    tool_router: ToolRouter<Self>,
}

impl DevOpsServer {
    /// Create a server around a shared engine with a fresh session.
    pub fn new(engine: Arc<CommandEngine>) -> Self {
        Self::with_session(engine, Session::new())
    }

    pub fn with_session(engine: Arc<CommandEngine>, session: Session) -> Self {
        Self {
            engine,
            session: Arc::new(RwLock::new(session)),
            tool_router: Self::tool_router(),
        }
    }

    /// Create a server with the backend named in `config`.
    pub fn from_config(config: &Config) -> crate::error::Result<Self> {
        let backend = create_backend(&config.backend)?;
        Ok(Self::new(Arc::new(CommandEngine::from_config(
            backend, config,
        ))))
    }

    pub fn engine(&self) -> &Arc<CommandEngine> {
        &self.engine
    }

    async fn list(&self, resource: Resource, params: ListParams) -> CallToolResult {
        let session = self.session.read().await;
        let filter = params.filter.unwrap_or_default();
        tool_result(self.engine.list(&session, resource, &filter).await)
    }

    async fn render(&self, result: BackendResult<Payload>) -> CallToolResult {
        let session = self.session.read().await;
        tool_result(
            self.engine
                .render_result(&session, result.map_err(Into::into)),
        )
    }
}

#[tool_router]
impl DevOpsServer {
    /// Resolve a shorthand command or free-text request.
    #[tool(
        description = "Resolve a shorthand command (!repos, !items, !pipelines, !prs, !query, !item, !create_item, !update_item, !clone_item, !me, debug) or a free-text request in Spanish or English, such as 'bugs activos creados el mes pasado'."
    )]
    pub async fn resolve(
        &self,
        Parameters(params): Parameters<ResolveParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut session = self.session.write().await;
        let output = self
            .engine
            .resolve_and_respond(&mut session, &params.input)
            .await;
        Ok(tool_result(output))
    }

    #[tool(description = "List work items, optionally filtered by type, state, date phrase and title terms. A custom WIQL query_string replaces the built query; only the date phrase of the filter still applies.")]
    pub async fn list_work_items(
        &self,
        Parameters(params): Parameters<WorkItemListParams>,
    ) -> Result<CallToolResult, McpError> {
        let filter = params.filter.unwrap_or_default();
        match params.query_string.filter(|q| !q.trim().is_empty()) {
            Some(wiql) => {
                let session = self.session.read().await;
                Ok(tool_result(
                    self.engine.query_work_items(&session, &wiql, &filter).await,
                ))
            }
            None => Ok(self.list(Resource::WorkItems, ListParams { filter: Some(filter) }).await),
        }
    }

    #[tool(description = "Get a work item by id.")]
    pub async fn get_work_item(
        &self,
        Parameters(params): Parameters<IdParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.engine.backend().get_work_item(params.id).await;
        Ok(self.render(result).await)
    }

    #[tool(description = "Create a work item with a title and a type (Bug, Task, User Story, Feature, Epic).")]
    pub async fn create_work_item(
        &self,
        Parameters(params): Parameters<CreateWorkItemParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .engine
            .backend()
            .create_work_item(&params.title, &params.work_item_type)
            .await;
        Ok(self.render(result).await)
    }

    #[tool(description = "Set one field of a work item. The field may be a reference name or an alias such as estado, title or tags.")]
    pub async fn update_work_item(
        &self,
        Parameters(params): Parameters<UpdateWorkItemParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .engine
            .backend()
            .update_work_item(params.id, &params.field, &params.value)
            .await;
        Ok(self.render(result).await)
    }

    #[tool(description = "Copy a work item under a new title, linked to the original.")]
    pub async fn clone_work_item(
        &self,
        Parameters(params): Parameters<CloneWorkItemParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .engine
            .backend()
            .clone_work_item(params.id, &params.new_title)
            .await;
        Ok(self.render(result).await)
    }

    #[tool(description = "List the projects of the organization.")]
    pub async fn list_projects(&self) -> Result<CallToolResult, McpError> {
        let result = self.engine.backend().list_projects().await;
        Ok(self.render(result).await)
    }

    #[tool(description = "List repositories, optionally filtered by creation date phrase and name terms.")]
    pub async fn list_repositories(
        &self,
        Parameters(params): Parameters<ListParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.list(Resource::Repositories, params).await)
    }

    #[tool(description = "Get a repository by id or name, with its branches.")]
    pub async fn get_repository(
        &self,
        Parameters(params): Parameters<RepositoryParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.engine.backend().get_repository(&params.repository).await;
        Ok(self.render(result).await)
    }

    #[tool(description = "Get a file's content, or list a folder, on a branch of a repository (default branch: main).")]
    pub async fn get_file_content(
        &self,
        Parameters(params): Parameters<FileContentParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .engine
            .backend()
            .get_file_content(&params.repository, &params.path, &params.branch)
            .await;
        Ok(self.render(result).await)
    }

    #[tool(description = "List pipelines, optionally filtered by latest run date phrase and name terms.")]
    pub async fn list_pipelines(
        &self,
        Parameters(params): Parameters<ListParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.list(Resource::Pipelines, params).await)
    }

    #[tool(description = "List pull requests. Active by default; 'cerrados' or 'closed' lists completed ones.")]
    pub async fn list_pull_requests(
        &self,
        Parameters(params): Parameters<ListParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.list(Resource::PullRequests, params).await)
    }

    #[tool(description = "Get a pull request by id.")]
    pub async fn get_pull_request(
        &self,
        Parameters(params): Parameters<IdParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.engine.backend().get_pull_request(params.id).await;
        Ok(self.render(result).await)
    }

    #[tool(description = "Open a pull request from a source branch into a target branch.")]
    pub async fn create_pull_request(
        &self,
        Parameters(params): Parameters<CreatePullRequestParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = NewPullRequest {
            repository: params.repository,
            source_branch: params.source_branch,
            target_branch: params.target_branch,
            title: params.title,
            description: params.description,
        };
        let result = self.engine.backend().create_pull_request(&request).await;
        Ok(self.render(result).await)
    }

    #[tool(description = "Comment on a pull request. Give thread_id to reply in an existing thread; omit it to open a new one.")]
    pub async fn add_pull_request_comment(
        &self,
        Parameters(params): Parameters<PullRequestCommentParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .engine
            .backend()
            .add_pull_request_comment(
                &params.repository,
                params.pull_request_id,
                &params.comment,
                params.thread_id,
            )
            .await;
        Ok(self.render(result).await)
    }

    #[tool(description = "Show the identity the server authenticates as.")]
    pub async fn get_me(&self) -> Result<CallToolResult, McpError> {
        let result = self.engine.backend().current_user().await;
        Ok(self.render(result).await)
    }

    #[tool(description = "Toggle debug mode, which echoes the resolved intent and filter before each result.")]
    pub async fn toggle_debug(&self) -> Result<CallToolResult, McpError> {
        let on = self.session.write().await.toggle_debug();
        tracing::info!(debug = on, "Debug mode toggled");
        Ok(CallToolResult::success(vec![Content::text(format!(
            "Debug mode {}",
            if on { "on" } else { "off" }
        ))]))
    }
}

#[tool_handler]
impl ServerHandler for DevOpsServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Azure DevOps command resolver. \
                 Use 'resolve' with a shorthand command or a free-text request in Spanish or English; \
                 date phrases such as 'abril de 2025' or 'el mes pasado' become created-date filters. \
                 The list_*, get_*, create_*, update/clone and add_pull_request_comment tools call the backend directly."
                    .to_string(),
            ),
        }
    }
}
