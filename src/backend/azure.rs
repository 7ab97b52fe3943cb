//! Azure DevOps REST backend.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};

use super::model::{self, NewPullRequest, FIELD_CREATED, FIELD_TITLE, FIELD_TYPE};
use super::traits::{BackendResult, DevOpsBackend};
use super::wiql::build_wiql;
use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::query::{EntityHint, FilterSpec};
use crate::render::Payload;

const JSON_PATCH: &str = "application/json-patch+json";

/// Client for one Azure DevOps organization and project.
pub struct AzureDevOpsBackend {
    client: Client,
    organization: String,
    project: String,
    api_version: String,
    batch_size: usize,
    auth_header: String,
}

impl AzureDevOpsBackend {
    /// Create a backend from configuration.
    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        if config.organization.trim().is_empty() {
            return Err(BackendError::NotConfigured(
                "backend.organization (or AZDO_ORG) is required".to_string(),
            ));
        }
        if config.project.trim().is_empty() {
            return Err(BackendError::NotConfigured(
                "backend.project (or AZDO_PROJECT) is required".to_string(),
            ));
        }
        let pat = config.pat.as_deref().filter(|p| !p.is_empty()).ok_or_else(|| {
            BackendError::NotConfigured("backend.pat (or AZDO_PAT) is required".to_string())
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            organization: config.organization.trim_end_matches('/').to_string(),
            project: config.project.clone(),
            api_version: config.api_version.clone(),
            batch_size: config.batch_size.max(1),
            auth_header: basic_auth(pat),
        })
    }

    fn project_url(&self, path: &str) -> String {
        format!("{}/{}/_apis/{}", self.organization, self.project, path)
    }

    fn org_url(&self, path: &str) -> String {
        format!("{}/_apis/{}", self.organization, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(AUTHORIZATION, &self.auth_header)
            .query(&[("api-version", self.api_version.as_str())])
    }

    /// Send a request and check the status. 404 maps to `NotFound(what)`.
    async fn checked(&self, request: RequestBuilder, what: &str) -> BackendResult<Response> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or(body);
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    /// Send a request and decode the JSON body.
    async fn send(&self, request: RequestBuilder, what: &str) -> BackendResult<Value> {
        self.checked(request, what)
            .await?
            .json::<Value>()
            .await
            .map_err(|e| BackendError::Decode(format!("{what}: {e}")))
    }

    async fn get(&self, url: &str, what: &str) -> BackendResult<Value> {
        self.send(self.request(Method::GET, url), what).await
    }

    /// The `value` array of a list response.
    fn values(mut body: Value, what: &str) -> BackendResult<Vec<Value>> {
        match body.get_mut("value").map(Value::take) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(BackendError::Decode(format!("{what}: missing 'value' array"))),
        }
    }

    async fn fetch_work_item(&self, id: i64) -> BackendResult<Value> {
        let url = self.project_url(&format!("wit/workitems/{id}"));
        self.send(
            self.request(Method::GET, &url).query(&[("$expand", "all")]),
            &format!("work item {id}"),
        )
        .await
    }

    async fn patch_work_item(&self, method: Method, path: &str, ops: &[Value]) -> BackendResult<Value> {
        let url = self.project_url(path);
        let request = self
            .request(method, &url)
            .header(CONTENT_TYPE, JSON_PATCH)
            .json(ops);
        self.send(request, path).await
    }

    /// Work item details for `ids`, fetched in batches.
    async fn work_item_details(&self, ids: &[i64]) -> BackendResult<Vec<Value>> {
        let mut details = Vec::with_capacity(ids.len());
        for batch in ids.chunks(self.batch_size) {
            let joined = batch
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let url = self.project_url("wit/workitems");
            let body = self
                .send(
                    self.request(Method::GET, &url).query(&[("ids", joined.as_str())]),
                    "work items",
                )
                .await?;
            details.extend(Self::values(body, "work items")?);
        }
        Ok(details)
    }

    /// Run a WIQL query and fetch the details of the items it selects.
    async fn run_wiql(&self, wiql: &str) -> BackendResult<Vec<Value>> {
        tracing::debug!(%wiql, "Running WIQL query");
        let url = self.project_url("wit/wiql");
        let body = self
            .send(
                self.request(Method::POST, &url).json(&json!({ "query": wiql })),
                "wiql",
            )
            .await?;

        let ids: Vec<i64> = body
            .get("workItems")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|wi| wi.get("id").and_then(Value::as_i64))
                    .collect()
            })
            .unwrap_or_default();

        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.work_item_details(&ids).await
    }

    fn repository_url(&self, repository: &str, path: &str) -> String {
        let base = self.project_url(&format!("git/repositories/{repository}"));
        if path.is_empty() {
            base
        } else {
            format!("{base}/{path}")
        }
    }

    /// A request against the items API for `path` on `branch`.
    fn item_request(&self, repository: &str, path: &str, branch: &str) -> RequestBuilder {
        self.request(Method::GET, &self.repository_url(repository, "items"))
            .query(&[
                ("path", path),
                ("versionDescriptor.version", model::branch_name(branch)),
                ("versionDescriptor.versionType", "branch"),
            ])
    }

    /// Attach each pipeline's most recent run as `latestRun`.
    async fn with_latest_runs(&self, pipelines: Vec<Value>) -> Vec<Value> {
        let mut detailed = Vec::with_capacity(pipelines.len());
        for mut pipeline in pipelines {
            if let Some(id) = pipeline.get("id").and_then(Value::as_i64) {
                let url = self.project_url(&format!("pipelines/{id}/runs"));
                match self.get(&url, "pipeline runs").await {
                    Ok(body) => {
                        if let (Some(run), Some(obj)) =
                            (body.pointer("/value/0").cloned(), pipeline.as_object_mut())
                        {
                            obj.insert("latestRun".to_string(), run);
                        }
                    }
                    Err(e) => tracing::warn!(pipeline = id, error = %e, "Failed to fetch runs"),
                }
            }
            detailed.push(pipeline);
        }
        detailed
    }
}

#[async_trait]
impl DevOpsBackend for AzureDevOpsBackend {
    fn name(&self) -> &str {
        "azure"
    }

    async fn list_work_items(&self, filter: &FilterSpec) -> BackendResult<Payload> {
        let wiql = build_wiql(&self.project, filter);
        let details = self.run_wiql(&wiql).await?;
        tracing::info!(count = details.len(), "Listed work items");
        Ok(Payload::Structured(Value::Array(
            details.iter().map(model::work_item_summary).collect(),
        )))
    }

    async fn query_work_items(&self, wiql: &str, filter: &FilterSpec) -> BackendResult<Payload> {
        let mut details = self.run_wiql(wiql).await?;
        model::retain_in_range(
            &mut details,
            &format!("/fields/{FIELD_CREATED}"),
            filter.date_range.as_ref(),
        );
        tracing::info!(count = details.len(), "Queried work items");
        Ok(Payload::Structured(Value::Array(
            details.iter().map(model::work_item_summary).collect(),
        )))
    }

    async fn get_work_item(&self, id: i64) -> BackendResult<Payload> {
        let item = self.fetch_work_item(id).await?;
        Ok(Payload::Structured(model::work_item_detail(&item)))
    }

    async fn create_work_item(&self, title: &str, work_item_type: &str) -> BackendResult<Payload> {
        let title = Value::from(title);
        let ops = model::field_patch([(FIELD_TITLE, &title)]);
        let created = self
            .patch_work_item(Method::POST, &format!("wit/workitems/${work_item_type}"), &ops)
            .await?;
        tracing::info!(id = ?created.get("id"), work_item_type, "Created work item");
        Ok(Payload::Structured(model::work_item_summary(&created)))
    }

    async fn update_work_item(&self, id: i64, field: &str, value: &str) -> BackendResult<Payload> {
        let reference = model::field_reference(field);
        let value = Value::from(value);
        let ops = model::field_patch([(reference.as_str(), &value)]);
        let updated = self
            .patch_work_item(Method::PATCH, &format!("wit/workitems/{id}"), &ops)
            .await
            .map_err(|e| match e {
                BackendError::NotFound(_) => BackendError::NotFound(format!("work item {id}")),
                other => other,
            })?;
        tracing::info!(id, field = %reference, "Updated work item");
        Ok(Payload::Structured(model::work_item_detail(&updated)))
    }

    async fn clone_work_item(&self, id: i64, new_title: &str) -> BackendResult<Payload> {
        let source = self.fetch_work_item(id).await?;
        let work_item_type = source
            .pointer(&format!("/fields/{FIELD_TYPE}"))
            .and_then(Value::as_str)
            .ok_or_else(|| BackendError::Decode(format!("work item {id} has no type")))?
            .to_string();

        let title = Value::from(new_title);
        let mut fields: Vec<(&str, &Value)> = vec![(FIELD_TITLE, &title)];
        for name in model::CLONED_FIELDS {
            if let Some(value) = source.get("fields").and_then(|f| f.get(*name)) {
                fields.push((*name, value));
            }
        }
        let mut ops = model::field_patch(fields);
        if let Some(url) = source.get("url").and_then(Value::as_str) {
            ops.push(json!({
                "op": "add",
                "path": "/relations/-",
                "value": { "rel": "System.LinkTypes.Related", "url": url },
            }));
        }

        let created = self
            .patch_work_item(Method::POST, &format!("wit/workitems/${work_item_type}"), &ops)
            .await?;
        tracing::info!(source = id, id = ?created.get("id"), "Cloned work item");
        Ok(Payload::Structured(model::work_item_summary(&created)))
    }

    async fn list_projects(&self) -> BackendResult<Payload> {
        let body = self.get(&self.org_url("projects"), "projects").await?;
        let projects = Self::values(body, "projects")?;
        tracing::info!(count = projects.len(), "Listed projects");
        Ok(Payload::Structured(Value::Array(
            projects.iter().map(model::project_summary).collect(),
        )))
    }

    async fn list_repositories(&self, filter: &FilterSpec) -> BackendResult<Payload> {
        let body = self.get(&self.project_url("git/repositories"), "repositories").await?;
        let mut repos = Self::values(body, "repositories")?;
        model::retain_in_range(&mut repos, "/createdDate", filter.date_range.as_ref());
        model::retain_matching_terms(&mut repos, "/name", filter);
        tracing::info!(count = repos.len(), "Listed repositories");
        Ok(Payload::Structured(Value::Array(
            repos.iter().map(model::repository_summary).collect(),
        )))
    }

    async fn get_repository(&self, repository: &str) -> BackendResult<Payload> {
        let what = format!("repository {repository}");
        let repo = self.get(&self.repository_url(repository, ""), &what).await?;

        let refs_request = self
            .request(Method::GET, &self.repository_url(repository, "refs"))
            .query(&[("filter", "heads/")]);
        let refs = Self::values(self.send(refs_request, &what).await?, "refs")?;

        let stats_url = self.repository_url(repository, "stats/branches");
        let stats = match self.get(&stats_url, "branch stats").await {
            Ok(body) => Self::values(body, "branch stats").unwrap_or_default(),
            Err(e) => {
                tracing::warn!(repository, error = %e, "Failed to fetch branch stats");
                Vec::new()
            }
        };
        Ok(Payload::Structured(model::repository_detail(&repo, &refs, &stats)))
    }

    async fn get_file_content(
        &self,
        repository: &str,
        path: &str,
        branch: &str,
    ) -> BackendResult<Payload> {
        let what = format!("{path} on {} in {repository}", model::branch_name(branch));
        let meta = self
            .send(
                self.item_request(repository, path, branch)
                    .query(&[("$format", "json")]),
                &what,
            )
            .await?;

        if meta.get("isFolder").and_then(Value::as_bool) == Some(true) {
            let listing = self
                .send(
                    self.item_request(repository, path, branch)
                        .query(&[("recursionLevel", "OneLevel"), ("$format", "json")]),
                    &what,
                )
                .await?;
            let items = Self::values(listing, "items")?;
            let folder = meta.get("path").and_then(Value::as_str).unwrap_or(path);
            return Ok(Payload::Structured(model::folder_listing(folder, &items)));
        }

        let content = self
            .checked(
                self.item_request(repository, path, branch)
                    .query(&[("download", "true")]),
                &what,
            )
            .await?
            .text()
            .await?;
        tracing::info!(repository, path, bytes = content.len(), "Fetched file");
        Ok(Payload::Text(content))
    }

    async fn list_pipelines(&self, filter: &FilterSpec) -> BackendResult<Payload> {
        let body = self.get(&self.project_url("pipelines"), "pipelines").await?;
        let mut pipelines = Self::values(body, "pipelines")?;
        if filter.date_range.is_some() {
            pipelines = self.with_latest_runs(pipelines).await;
        }
        model::retain_in_range(
            &mut pipelines,
            "/latestRun/createdDate",
            filter.date_range.as_ref(),
        );
        model::retain_matching_terms(&mut pipelines, "/name", filter);
        tracing::info!(count = pipelines.len(), "Listed pipelines");
        Ok(Payload::Structured(Value::Array(
            pipelines.iter().map(model::pipeline_summary).collect(),
        )))
    }

    async fn list_pull_requests(&self, filter: &FilterSpec) -> BackendResult<Payload> {
        let status = match filter.entity_hint {
            Some(EntityHint::Closed) => "completed",
            _ => "active",
        };
        let url = self.project_url("git/pullrequests");
        let body = self
            .send(
                self.request(Method::GET, &url)
                    .query(&[("searchCriteria.status", status)]),
                "pull requests",
            )
            .await?;
        let mut prs = Self::values(body, "pull requests")?;
        model::retain_in_range(&mut prs, "/creationDate", filter.date_range.as_ref());
        model::retain_matching_terms(&mut prs, "/title", filter);
        tracing::info!(count = prs.len(), status, "Listed pull requests");
        Ok(Payload::Structured(Value::Array(
            prs.iter().map(model::pull_request_summary).collect(),
        )))
    }

    async fn get_pull_request(&self, id: i64) -> BackendResult<Payload> {
        let url = self.project_url(&format!("git/pullrequests/{id}"));
        let pr = self.get(&url, &format!("pull request {id}")).await?;
        Ok(Payload::Structured(model::pull_request_detail(&pr)))
    }

    async fn create_pull_request(&self, request: &NewPullRequest) -> BackendResult<Payload> {
        request.check_branches().map_err(|message| BackendError::Api {
            status: 400,
            message,
        })?;
        let url = self.repository_url(&request.repository, "pullrequests");
        let body = json!({
            "sourceRefName": model::branch_ref(&request.source_branch),
            "targetRefName": model::branch_ref(&request.target_branch),
            "title": request.title,
            "description": request.description,
        });
        let created = self
            .send(
                self.request(Method::POST, &url).json(&body),
                &format!("repository {}", request.repository),
            )
            .await?;
        tracing::info!(id = ?created.get("pullRequestId"), "Created pull request");
        Ok(Payload::Structured(model::pull_request_detail(&created)))
    }

    async fn add_pull_request_comment(
        &self,
        repository: &str,
        pull_request_id: i64,
        comment: &str,
        thread_id: Option<i64>,
    ) -> BackendResult<Payload> {
        let threads = format!("pullRequests/{pull_request_id}/threads");
        let (url, body) = match thread_id {
            Some(thread) => (
                self.repository_url(repository, &format!("{threads}/{thread}/comments")),
                json!({ "content": comment, "commentType": 1 }),
            ),
            None => (
                self.repository_url(repository, &threads),
                json!({
                    "comments": [{ "parentCommentId": 0, "content": comment, "commentType": 1 }],
                    "status": 1,
                }),
            ),
        };
        let what = match thread_id {
            Some(thread) => format!("thread {thread} of pull request {pull_request_id}"),
            None => format!("pull request {pull_request_id}"),
        };
        let response = self
            .send(self.request(Method::POST, &url).json(&body), &what)
            .await?;
        tracing::info!(pull_request_id, ?thread_id, "Added pull request comment");
        Ok(Payload::Structured(model::comment_summary(
            &response,
            pull_request_id,
            thread_id,
        )))
    }

    async fn current_user(&self) -> BackendResult<Payload> {
        let body = self.get(&self.org_url("connectionData"), "connection data").await?;
        Ok(Payload::Structured(model::user_summary(&body)))
    }
}

/// `Authorization` header value for a personal access token.
fn basic_auth(pat: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!(":{pat}")))
}
