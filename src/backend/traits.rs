//! Backend trait definitions.

use async_trait::async_trait;

use super::model::NewPullRequest;
use crate::error::BackendError;
use crate::query::FilterSpec;
use crate::render::Payload;

/// Result type for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// A project-management service the engine dispatches to.
///
/// Every call yields a [`Payload`] for the formatter. Failures are returned
/// as [`BackendError`] and rendered by the caller.
#[async_trait]
pub trait DevOpsBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Work items matching a filter, newest first.
    async fn list_work_items(&self, filter: &FilterSpec) -> BackendResult<Payload>;

    /// Work items selected by a caller-written WIQL query.
    ///
    /// Only the created-date range of `filter` applies, to the fetched items.
    async fn query_work_items(&self, wiql: &str, filter: &FilterSpec) -> BackendResult<Payload>;

    async fn get_work_item(&self, id: i64) -> BackendResult<Payload>;

    async fn create_work_item(&self, title: &str, work_item_type: &str) -> BackendResult<Payload>;

    /// Set one field. `field` may be a reference name or a short alias.
    async fn update_work_item(&self, id: i64, field: &str, value: &str) -> BackendResult<Payload>;

    /// Create a copy of `id` under a new title, linked to the original.
    async fn clone_work_item(&self, id: i64, new_title: &str) -> BackendResult<Payload>;

    async fn list_projects(&self) -> BackendResult<Payload>;

    async fn list_repositories(&self, filter: &FilterSpec) -> BackendResult<Payload>;

    /// One repository, by id or name, with its branches.
    async fn get_repository(&self, repository: &str) -> BackendResult<Payload>;

    /// A file's text, or a one-level listing when `path` is a folder.
    async fn get_file_content(
        &self,
        repository: &str,
        path: &str,
        branch: &str,
    ) -> BackendResult<Payload>;

    async fn list_pipelines(&self, filter: &FilterSpec) -> BackendResult<Payload>;

    async fn list_pull_requests(&self, filter: &FilterSpec) -> BackendResult<Payload>;

    async fn get_pull_request(&self, id: i64) -> BackendResult<Payload>;

    async fn create_pull_request(&self, request: &NewPullRequest) -> BackendResult<Payload>;

    /// Comment on a pull request. `thread_id` replies in an existing thread;
    /// `None` opens a new one.
    async fn add_pull_request_comment(
        &self,
        repository: &str,
        pull_request_id: i64,
        comment: &str,
        thread_id: Option<i64>,
    ) -> BackendResult<Payload>;

    /// The identity the backend authenticates as.
    async fn current_user(&self) -> BackendResult<Payload>;
}
