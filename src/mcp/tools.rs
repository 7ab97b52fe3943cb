//! Parameters of the MCP tools.

use rmcp::schemars;
use serde::{Deserialize, Serialize};

// Parameters for resolve tool
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ResolveParams {
    /// A shorthand command such as `!items bugs` or a free-text request such
    /// as "bugs creados en abril de 2025"
    pub input: String,
}

// Parameters for the listing tools
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ListParams {
    /// Free-text filter: entity type, state, date phrase and search terms
    #[serde(default)]
    pub filter: Option<String>,
}

// Parameters for list_work_items tool
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WorkItemListParams {
    /// Free-text filter: entity type, state, date phrase and search terms
    #[serde(default)]
    pub filter: Option<String>,
    /// Custom WIQL query. When set it replaces the built query and only the
    /// date phrase of `filter` still applies
    #[serde(default)]
    pub query_string: Option<String>,
}

// Parameters for get_work_item and get_pull_request tools
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct IdParams {
    /// Numeric id
    pub id: i64,
}

// Parameters for create_work_item tool
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CreateWorkItemParams {
    pub title: String,
    /// Work item type, e.g. Bug, Task, User Story
    pub work_item_type: String,
}

// Parameters for update_work_item tool
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct UpdateWorkItemParams {
    pub id: i64,
    /// Field reference name (System.State) or alias (estado, title, tags)
    pub field: String,
    pub value: String,
}

// Parameters for clone_work_item tool
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CloneWorkItemParams {
    /// Id of the work item to copy
    pub id: i64,
    pub new_title: String,
}

// Parameters for get_repository tool
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RepositoryParams {
    /// Repository id or name
    pub repository: String,
}

fn default_branch() -> String {
    "main".to_string()
}

// Parameters for get_file_content tool
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FileContentParams {
    /// Repository id or name
    pub repository: String,
    /// File or folder path inside the repository
    pub path: String,
    /// Branch name (default: main)
    #[serde(default = "default_branch")]
    pub branch: String,
}

// Parameters for create_pull_request tool
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CreatePullRequestParams {
    /// Repository id or name
    pub repository: String,
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

// Parameters for add_pull_request_comment tool
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PullRequestCommentParams {
    /// Repository id or name
    pub repository: String,
    pub pull_request_id: i64,
    pub comment: String,
    /// Thread to reply in; omit to open a new thread
    #[serde(default)]
    pub thread_id: Option<i64>,
}
