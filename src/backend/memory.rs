//! In-process backend holding Azure DevOps shaped records.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use super::model::{self, NewPullRequest, FIELD_CREATED, FIELD_STATE, FIELD_TITLE, FIELD_TYPE};
use super::traits::{BackendResult, DevOpsBackend};
use super::wiql;
use crate::error::BackendError;
use crate::query::{EntityHint, FilterSpec};
use crate::render::Payload;

/// Work item types the store accepts, in canonical spelling.
const WORK_ITEM_TYPES: &[&str] = &["Epic", "Feature", "User Story", "Task", "Bug", "Issue"];

#[derive(Debug, Default)]
struct Store {
    projects: Vec<Value>,
    work_items: Vec<Value>,
    repositories: Vec<Value>,
    /// `{repository, branch, path, content}` records, paths rooted at `/`.
    files: Vec<Value>,
    pipelines: Vec<Value>,
    pull_requests: Vec<Value>,
    user: Value,
    next_id: i64,
}

impl Store {
    fn work_item(&self, id: i64) -> BackendResult<&Value> {
        self.work_items
            .iter()
            .find(|wi| wi.get("id").and_then(Value::as_i64) == Some(id))
            .ok_or_else(|| BackendError::NotFound(format!("work item {id}")))
    }

    fn insert_work_item(&mut self, fields: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id;
        let item = json!({
            "id": id,
            "rev": 1,
            "fields": fields,
            "url": format!("memory://workitems/{id}"),
        });
        self.work_items.push(item.clone());
        item
    }

    /// A repository by id or name, ignoring case.
    fn repository(&self, key: &str) -> BackendResult<&Value> {
        self.repositories
            .iter()
            .find(|r| {
                ["/id", "/name"].iter().any(|p| {
                    r.pointer(p)
                        .and_then(Value::as_str)
                        .is_some_and(|v| v.eq_ignore_ascii_case(key))
                })
            })
            .ok_or_else(|| BackendError::NotFound(format!("repository {key}")))
    }

    fn user_name(&self) -> String {
        self.user
            .pointer("/authenticatedUser/providerDisplayName")
            .and_then(Value::as_str)
            .unwrap_or("Local User")
            .to_string()
    }

    /// Files of `repository` on `branch`.
    fn files_on<'a>(&'a self, repository: &'a str, branch: &'a str) -> impl Iterator<Item = &'a Value> {
        self.files.iter().filter(move |f| {
            f.get("repository").and_then(Value::as_str) == Some(repository)
                && f.get("branch").and_then(Value::as_str) == Some(branch)
        })
    }
}

/// Backend serving an in-memory store.
pub struct MemoryBackend {
    store: RwLock<Store>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// An empty store. Ids start at 1.
    pub fn new() -> Self {
        Self {
            store: RwLock::new(Store {
                user: json!({ "authenticatedUser": { "id": "local", "providerDisplayName": "Local User" } }),
                ..Default::default()
            }),
        }
    }

    /// A store with a small sample project.
    pub fn seeded() -> Self {
        let work_items = vec![
            raw_work_item(101, "Login falla con SSO", "Bug", "Active", "2025-04-03T09:12:00Z", Some("Ana Ruiz")),
            raw_work_item(102, "Portal de clientes", "Epic", "New", "2025-01-15T10:00:00Z", None),
            raw_work_item(103, "Exportar informes a PDF", "User Story", "Active", "2025-02-20T16:30:00Z", Some("Luis Gómez")),
            raw_work_item(104, "Configurar pipeline de release", "Task", "Closed", "2024-11-05T08:45:00Z", Some("Ana Ruiz")),
            raw_work_item(105, "Timeout en API de pagos", "Bug", "Closed", "2025-04-21T13:05:00Z", None),
            raw_work_item(106, "Migrar login a OAuth", "Task", "New", "2025-05-02T11:20:00Z", Some("Luis Gómez")),
        ];
        let repositories = vec![
            json!({"id": "r-portal", "name": "portal-web", "defaultBranch": "refs/heads/main", "size": 48213, "createdDate": "2024-09-10T12:00:00Z", "webUrl": "memory://repos/portal-web"}),
            json!({"id": "r-api", "name": "payments-api", "defaultBranch": "refs/heads/main", "size": 120554, "createdDate": "2025-03-01T12:00:00Z", "webUrl": "memory://repos/payments-api"}),
            json!({"id": "r-infra", "name": "infra", "defaultBranch": "refs/heads/master", "size": 9120, "webUrl": "memory://repos/infra"}),
        ];
        let pipelines = vec![
            json!({"id": 1, "name": "portal-ci", "folder": "\\", "latestRun": {"name": "20250410.1", "state": "completed", "result": "succeeded", "createdDate": "2025-04-10T07:00:00Z"}}),
            json!({"id": 2, "name": "payments-release", "folder": "\\release", "latestRun": {"name": "20241201.3", "state": "completed", "result": "failed", "createdDate": "2024-12-01T18:30:00Z"}}),
        ];
        let pull_requests = vec![
            json!({"pullRequestId": 7, "title": "Fix SSO login redirect", "status": "active", "repository": {"name": "portal-web"}, "createdBy": {"displayName": "Ana Ruiz"}, "creationDate": "2025-04-04T10:00:00Z", "sourceRefName": "refs/heads/fix/sso", "targetRefName": "refs/heads/main", "description": "Corrige el redirect tras SSO."}),
            json!({"pullRequestId": 8, "title": "Retry payments timeout", "status": "completed", "repository": {"name": "payments-api"}, "createdBy": {"displayName": "Luis Gómez"}, "creationDate": "2025-04-22T15:00:00Z", "sourceRefName": "refs/heads/feature/retry", "targetRefName": "refs/heads/main"}),
        ];

        let projects = vec![
            json!({"id": "p-fabrikam", "name": "Fabrikam", "description": "Portal y pagos", "state": "wellFormed", "visibility": "private", "lastUpdateTime": "2025-04-30T09:00:00Z"}),
            json!({"id": "p-tooling", "name": "Tooling", "state": "wellFormed", "visibility": "private", "lastUpdateTime": "2024-10-02T14:00:00Z"}),
        ];
        let files = vec![
            file("portal-web", "main", "/README.md", "# portal-web\n\nPortal de clientes.\n"),
            file("portal-web", "main", "/src/app.ts", "export const app = 'portal';\n"),
            file("portal-web", "main", "/src/login/sso.ts", "export const redirect = '/home';\n"),
            file("portal-web", "fix/sso", "/src/login/sso.ts", "export const redirect = '/callback';\n"),
            file("payments-api", "main", "/README.md", "# payments-api\n"),
        ];

        let next_id = work_items.len() as i64 + 100;
        Self {
            store: RwLock::new(Store {
                projects,
                work_items,
                repositories,
                files,
                pipelines,
                pull_requests,
                user: json!({
                    "authenticatedUser": {
                        "id": "8c1f-local",
                        "providerDisplayName": "Ana Ruiz",
                        "properties": { "Account": { "$value": "ana.ruiz@example.com" } }
                    }
                }),
                next_id,
            }),
        }
    }
}

/// Build a work item record the way the REST API returns it.
fn raw_work_item(
    id: i64,
    title: &str,
    kind: &str,
    state: &str,
    created: &str,
    assigned: Option<&str>,
) -> Value {
    let mut fields = json!({
        FIELD_TITLE: title,
        FIELD_TYPE: kind,
        FIELD_STATE: state,
        FIELD_CREATED: created,
        "System.AreaPath": "Fabrikam",
        "System.IterationPath": "Fabrikam\\Sprint 12",
    });
    if let (Some(name), Some(map)) = (assigned, fields.as_object_mut()) {
        map.insert(
            "System.AssignedTo".to_string(),
            json!({ "displayName": name }),
        );
    }
    json!({ "id": id, "rev": 1, "fields": fields, "url": format!("memory://workitems/{id}") })
}

fn file(repository: &str, branch: &str, path: &str, content: &str) -> Value {
    json!({ "repository": repository, "branch": branch, "path": path, "content": content })
}

/// `path` with a single leading slash and no trailing one.
fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim().trim_matches('/'))
}

fn canonical_type(kind: &str) -> BackendResult<&'static str> {
    WORK_ITEM_TYPES
        .iter()
        .find(|t| t.eq_ignore_ascii_case(kind.trim()))
        .copied()
        .ok_or_else(|| BackendError::Api {
            status: 400,
            message: format!("Work item type '{kind}' does not exist"),
        })
}

fn field_str<'a>(item: &'a Value, name: &str) -> Option<&'a str> {
    item.get("fields")?.get(name)?.as_str()
}

#[async_trait]
impl DevOpsBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_work_items(&self, filter: &FilterSpec) -> BackendResult<Payload> {
        let store = self.store.read().await;
        let mut items: Vec<Value> = store
            .work_items
            .iter()
            .filter(|wi| {
                filter
                    .work_item_type()
                    .map_or(true, |t| field_str(wi, FIELD_TYPE) == Some(t))
                    && filter
                        .state()
                        .map_or(true, |s| field_str(wi, FIELD_STATE) == Some(s))
            })
            .cloned()
            .collect();
        model::retain_in_range(
            &mut items,
            &format!("/fields/{FIELD_CREATED}"),
            filter.date_range.as_ref(),
        );
        model::retain_matching_terms(&mut items, &format!("/fields/{FIELD_TITLE}"), filter);
        items.sort_by(|a, b| {
            field_str(b, FIELD_CREATED).cmp(&field_str(a, FIELD_CREATED))
        });
        Ok(Payload::Structured(Value::Array(
            items.iter().map(model::work_item_summary).collect(),
        )))
    }

    async fn query_work_items(&self, query: &str, filter: &FilterSpec) -> BackendResult<Payload> {
        let clauses = wiql::clauses(query).ok_or_else(|| BackendError::Api {
            status: 400,
            message: "Expected a WIQL SELECT statement".to_string(),
        })?;
        let store = self.store.read().await;
        let mut items: Vec<Value> = store
            .work_items
            .iter()
            .filter(|wi| {
                clauses
                    .iter()
                    .filter(|c| !c.field.eq_ignore_ascii_case("System.TeamProject"))
                    .all(|c| {
                        let actual = match c.field.as_str() {
                            "System.Id" => wi.get("id").map(Value::to_string),
                            name => field_str(wi, name).map(String::from),
                        };
                        actual.is_some_and(|a| c.matches(&a))
                    })
            })
            .cloned()
            .collect();
        model::retain_in_range(
            &mut items,
            &format!("/fields/{FIELD_CREATED}"),
            filter.date_range.as_ref(),
        );
        items.sort_by(|a, b| field_str(b, FIELD_CREATED).cmp(&field_str(a, FIELD_CREATED)));
        Ok(Payload::Structured(Value::Array(
            items.iter().map(model::work_item_summary).collect(),
        )))
    }

    async fn get_work_item(&self, id: i64) -> BackendResult<Payload> {
        let store = self.store.read().await;
        Ok(Payload::Structured(model::work_item_detail(store.work_item(id)?)))
    }

    async fn create_work_item(&self, title: &str, work_item_type: &str) -> BackendResult<Payload> {
        let kind = canonical_type(work_item_type)?;
        let mut store = self.store.write().await;
        let created = store.insert_work_item(json!({
            FIELD_TITLE: title,
            FIELD_TYPE: kind,
            FIELD_STATE: "New",
            FIELD_CREATED: Utc::now().to_rfc3339(),
        }));
        tracing::info!(id = ?created.get("id"), work_item_type = kind, "Created work item");
        Ok(Payload::Structured(model::work_item_summary(&created)))
    }

    async fn update_work_item(&self, id: i64, field: &str, value: &str) -> BackendResult<Payload> {
        let reference = model::field_reference(field);
        let mut store = self.store.write().await;
        let item = store
            .work_items
            .iter_mut()
            .find(|wi| wi.get("id").and_then(Value::as_i64) == Some(id))
            .ok_or_else(|| BackendError::NotFound(format!("work item {id}")))?;
        if let Some(fields) = item.get_mut("fields").and_then(Value::as_object_mut) {
            fields.insert(reference.clone(), Value::from(value));
        }
        if let Some(rev) = item.get("rev").and_then(Value::as_i64) {
            item["rev"] = Value::from(rev + 1);
        }
        tracing::info!(id, field = %reference, "Updated work item");
        Ok(Payload::Structured(model::work_item_detail(item)))
    }

    async fn clone_work_item(&self, id: i64, new_title: &str) -> BackendResult<Payload> {
        let mut store = self.store.write().await;
        let source = store.work_item(id)?.clone();

        let mut fields = serde_json::Map::new();
        fields.insert(FIELD_TITLE.to_string(), Value::from(new_title));
        for name in [FIELD_TYPE].iter().chain(model::CLONED_FIELDS) {
            if let Some(value) = source.get("fields").and_then(|f| f.get(*name)) {
                fields.insert(name.to_string(), value.clone());
            }
        }
        fields.insert(FIELD_STATE.to_string(), Value::from("New"));
        fields.insert(FIELD_CREATED.to_string(), Value::from(Utc::now().to_rfc3339()));

        let created = store.insert_work_item(Value::Object(fields));
        tracing::info!(source = id, id = ?created.get("id"), "Cloned work item");
        Ok(Payload::Structured(model::work_item_summary(&created)))
    }

    async fn list_projects(&self) -> BackendResult<Payload> {
        let store = self.store.read().await;
        Ok(Payload::Structured(Value::Array(
            store.projects.iter().map(model::project_summary).collect(),
        )))
    }

    async fn list_repositories(&self, filter: &FilterSpec) -> BackendResult<Payload> {
        let mut repos = self.store.read().await.repositories.clone();
        model::retain_in_range(&mut repos, "/createdDate", filter.date_range.as_ref());
        model::retain_matching_terms(&mut repos, "/name", filter);
        Ok(Payload::Structured(Value::Array(
            repos.iter().map(model::repository_summary).collect(),
        )))
    }

    async fn get_repository(&self, repository: &str) -> BackendResult<Payload> {
        let store = self.store.read().await;
        let repo = store.repository(repository)?;
        let name = repo.get("name").and_then(Value::as_str).unwrap_or_default();

        let mut branches: Vec<&str> = Vec::new();
        let default = repo.get("defaultBranch").and_then(Value::as_str);
        let file_branches = store
            .files
            .iter()
            .filter(|f| f.get("repository").and_then(Value::as_str) == Some(name))
            .filter_map(|f| f.get("branch").and_then(Value::as_str));
        for branch in default.map(model::branch_name).into_iter().chain(file_branches) {
            if !branches.contains(&branch) {
                branches.push(branch);
            }
        }
        let refs: Vec<Value> = branches
            .iter()
            .map(|b| json!({ "name": model::branch_ref(b) }))
            .collect();
        Ok(Payload::Structured(model::repository_detail(repo, &refs, &[])))
    }

    async fn get_file_content(
        &self,
        repository: &str,
        path: &str,
        branch: &str,
    ) -> BackendResult<Payload> {
        let store = self.store.read().await;
        let name = store
            .repository(repository)?
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let branch = model::branch_name(branch);
        let path = normalize_path(path);

        if let Some(found) = store
            .files_on(name, branch)
            .find(|f| f.get("path").and_then(Value::as_str) == Some(path.as_str()))
        {
            let content = found.get("content").and_then(Value::as_str).unwrap_or_default();
            return Ok(Payload::Text(content.to_string()));
        }

        let prefix = if path == "/" { path.clone() } else { format!("{path}/") };
        let mut entries: Vec<Value> = Vec::new();
        for f in store.files_on(name, branch) {
            let Some(rest) = f
                .get("path")
                .and_then(Value::as_str)
                .and_then(|p| p.strip_prefix(prefix.as_str()))
            else {
                continue;
            };
            let (child, is_folder) = match rest.split_once('/') {
                Some((dir, _)) => (dir, true),
                None => (rest, false),
            };
            let entry = json!({ "path": format!("{prefix}{child}"), "isFolder": is_folder });
            if !entries.contains(&entry) {
                entries.push(entry);
            }
        }
        if entries.is_empty() {
            return Err(BackendError::NotFound(format!(
                "{path} on {branch} in {repository}"
            )));
        }
        Ok(Payload::Structured(model::folder_listing(&path, &entries)))
    }

    async fn list_pipelines(&self, filter: &FilterSpec) -> BackendResult<Payload> {
        let mut pipelines = self.store.read().await.pipelines.clone();
        model::retain_in_range(
            &mut pipelines,
            "/latestRun/createdDate",
            filter.date_range.as_ref(),
        );
        model::retain_matching_terms(&mut pipelines, "/name", filter);
        Ok(Payload::Structured(Value::Array(
            pipelines.iter().map(model::pipeline_summary).collect(),
        )))
    }

    async fn list_pull_requests(&self, filter: &FilterSpec) -> BackendResult<Payload> {
        let status = match filter.entity_hint {
            Some(EntityHint::Closed) => "completed",
            _ => "active",
        };
        let mut prs: Vec<Value> = self
            .store
            .read()
            .await
            .pull_requests
            .iter()
            .filter(|pr| pr.get("status").and_then(Value::as_str) == Some(status))
            .cloned()
            .collect();
        model::retain_in_range(&mut prs, "/creationDate", filter.date_range.as_ref());
        model::retain_matching_terms(&mut prs, "/title", filter);
        Ok(Payload::Structured(Value::Array(
            prs.iter().map(model::pull_request_summary).collect(),
        )))
    }

    async fn get_pull_request(&self, id: i64) -> BackendResult<Payload> {
        let store = self.store.read().await;
        let pr = store
            .pull_requests
            .iter()
            .find(|pr| pr.get("pullRequestId").and_then(Value::as_i64) == Some(id))
            .ok_or_else(|| BackendError::NotFound(format!("pull request {id}")))?;
        Ok(Payload::Structured(model::pull_request_detail(pr)))
    }

    async fn create_pull_request(&self, request: &NewPullRequest) -> BackendResult<Payload> {
        request.check_branches().map_err(|message| BackendError::Api {
            status: 400,
            message,
        })?;
        let mut store = self.store.write().await;
        let repo = store.repository(&request.repository)?;
        let repository = json!({ "id": repo.get("id"), "name": repo.get("name") });

        let id = store
            .pull_requests
            .iter()
            .filter_map(|pr| pr.get("pullRequestId").and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1;
        let created = json!({
            "pullRequestId": id,
            "title": request.title,
            "description": request.description,
            "status": "active",
            "repository": repository,
            "createdBy": { "displayName": store.user_name() },
            "creationDate": Utc::now().to_rfc3339(),
            "sourceRefName": model::branch_ref(&request.source_branch),
            "targetRefName": model::branch_ref(&request.target_branch),
            "threads": [],
        });
        store.pull_requests.push(created.clone());
        tracing::info!(id, repository = %request.repository, "Created pull request");
        Ok(Payload::Structured(model::pull_request_detail(&created)))
    }

    async fn add_pull_request_comment(
        &self,
        repository: &str,
        pull_request_id: i64,
        comment: &str,
        thread_id: Option<i64>,
    ) -> BackendResult<Payload> {
        let mut store = self.store.write().await;
        let repo_name = store
            .repository(repository)?
            .get("name")
            .and_then(Value::as_str)
            .map(String::from);
        let author = json!({ "displayName": store.user_name() });

        let pr = store
            .pull_requests
            .iter_mut()
            .find(|pr| {
                pr.get("pullRequestId").and_then(Value::as_i64) == Some(pull_request_id)
                    && pr.pointer("/repository/name").and_then(Value::as_str) == repo_name.as_deref()
            })
            .ok_or_else(|| BackendError::NotFound(format!("pull request {pull_request_id}")))?;
        if !pr.get("threads").is_some_and(Value::is_array) {
            pr["threads"] = json!([]);
        }
        let Some(threads) = pr.get_mut("threads").and_then(Value::as_array_mut) else {
            return Err(BackendError::Decode("pull request threads".to_string()));
        };

        let response = match thread_id {
            None => {
                let thread = json!({
                    "id": threads.len() as i64 + 1,
                    "status": "active",
                    "comments": [{ "id": 1, "content": comment, "author": author }],
                });
                threads.push(thread.clone());
                thread
            }
            Some(tid) => {
                let comments = threads
                    .iter_mut()
                    .find(|t| t.get("id").and_then(Value::as_i64) == Some(tid))
                    .and_then(|t| t.get_mut("comments"))
                    .and_then(Value::as_array_mut)
                    .ok_or_else(|| {
                        BackendError::NotFound(format!(
                            "thread {tid} of pull request {pull_request_id}"
                        ))
                    })?;
                let reply = json!({
                    "id": comments.len() as i64 + 1,
                    "content": comment,
                    "author": author,
                });
                comments.push(reply.clone());
                reply
            }
        };
        tracing::info!(pull_request_id, ?thread_id, "Added pull request comment");
        Ok(Payload::Structured(model::comment_summary(
            &response,
            pull_request_id,
            thread_id,
        )))
    }

    async fn current_user(&self) -> BackendResult<Payload> {
        let store = self.store.read().await;
        Ok(Payload::Structured(model::user_summary(&store.user)))
    }
}
