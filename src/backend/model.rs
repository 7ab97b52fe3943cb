//! Shapes shared by the backends.
//!
//! Backends receive Azure DevOps REST shaped JSON and hand the formatter a
//! trimmed summary with stable key order.

use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use crate::query::FilterSpec;
use crate::temporal::DateRange;

pub const FIELD_TITLE: &str = "System.Title";
pub const FIELD_TYPE: &str = "System.WorkItemType";
pub const FIELD_STATE: &str = "System.State";
pub const FIELD_CREATED: &str = "System.CreatedDate";

/// Fields copied from the source item when cloning.
pub const CLONED_FIELDS: &[&str] = &[
    "System.Description",
    "System.AreaPath",
    "System.IterationPath",
    "System.Tags",
    "Microsoft.VSTS.Common.Priority",
];

/// Map a user-facing field name to its reference name.
///
/// Reference names such as `System.State` pass through unchanged.
pub fn field_reference(field: &str) -> String {
    match field.to_lowercase().as_str() {
        "title" | "titulo" | "título" => FIELD_TITLE.to_string(),
        "state" | "estado" => FIELD_STATE.to_string(),
        "assigned" | "assignedto" | "asignado" => "System.AssignedTo".to_string(),
        "description" | "descripcion" | "descripción" => "System.Description".to_string(),
        "tags" | "etiquetas" => "System.Tags".to_string(),
        "priority" | "prioridad" => "Microsoft.VSTS.Common.Priority".to_string(),
        "area" => "System.AreaPath".to_string(),
        "iteration" | "iteracion" | "iteración" | "sprint" => "System.IterationPath".to_string(),
        _ => field.to_string(),
    }
}

/// A JSON-patch document setting each field.
pub fn field_patch<'a>(fields: impl IntoIterator<Item = (&'a str, &'a Value)>) -> Vec<Value> {
    fields
        .into_iter()
        .map(|(name, value)| {
            json!({
                "op": "add",
                "path": format!("/fields/{name}"),
                "value": value,
            })
        })
        .collect()
}

/// A pull request to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    /// Repository id or name
    pub repository: String,
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    pub description: String,
}

impl NewPullRequest {
    /// Fails when both branches resolve to the same ref.
    pub fn check_branches(&self) -> Result<(), String> {
        if branch_ref(&self.source_branch) == branch_ref(&self.target_branch) {
            return Err(format!(
                "source and target branch are both '{}'",
                branch_name(&self.source_branch)
            ));
        }
        Ok(())
    }
}

/// Full ref of a branch. `main` becomes `refs/heads/main`; refs pass through.
pub fn branch_ref(branch: &str) -> String {
    let branch = branch.trim();
    if branch.starts_with("refs/") {
        branch.to_string()
    } else {
        format!("refs/heads/{branch}")
    }
}

/// Short name of a branch ref.
pub fn branch_name(reference: &str) -> &str {
    reference.trim().trim_start_matches("refs/heads/")
}

// ============================================================================
// Dates and filtering
// ============================================================================

/// Calendar date of a timestamp such as `2025-04-03T10:15:00.123Z`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()
}

/// Date found at a JSON pointer, if any.
pub fn date_at(value: &Value, pointer: &str) -> Option<NaiveDate> {
    value.pointer(pointer).and_then(Value::as_str).and_then(parse_date)
}

/// Keep items dated inside `range`. Items without a date are dropped.
pub fn retain_in_range(items: &mut Vec<Value>, pointer: &str, range: Option<&DateRange>) {
    if let Some(range) = range {
        items.retain(|item| date_at(item, pointer).is_some_and(|d| range.contains(d)));
    }
}

/// Keep items whose text at `pointer` contains every raw term, ignoring case.
pub fn retain_matching_terms(items: &mut Vec<Value>, pointer: &str, filter: &FilterSpec) {
    if filter.raw_terms.is_empty() {
        return;
    }
    let terms: Vec<String> = filter.raw_terms.iter().map(|t| t.to_lowercase()).collect();
    items.retain(|item| {
        let text = item
            .pointer(pointer)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        terms.iter().all(|t| text.contains(t.as_str()))
    });
}

// ============================================================================
// Summaries
// ============================================================================

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

fn insert_opt(map: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(v) = value.filter(|v| !v.is_null()) {
        map.insert(key.to_string(), v);
    }
}

fn date_string(value: &Value, pointer: &str) -> Option<Value> {
    date_at(value, pointer).map(|d| Value::String(d.to_string()))
}

/// Display name of an identity field, which may be an object or a string.
fn identity(value: Option<&Value>) -> Option<Value> {
    match value? {
        Value::Object(obj) => obj.get("displayName").cloned(),
        Value::String(s) => Some(Value::String(s.clone())),
        _ => None,
    }
}

fn field<'a>(item: &'a Value, name: &str) -> Option<&'a Value> {
    item.get("fields")?.get(name)
}

/// One line per work item in listings.
pub fn work_item_summary(item: &Value) -> Value {
    let mut map = Map::new();
    insert_opt(&mut map, "id", item.get("id").cloned());
    insert_opt(&mut map, "title", field(item, FIELD_TITLE).cloned());
    insert_opt(&mut map, "type", field(item, FIELD_TYPE).cloned());
    insert_opt(&mut map, "state", field(item, FIELD_STATE).cloned());
    insert_opt(&mut map, "assigned_to", identity(field(item, "System.AssignedTo")));
    insert_opt(
        &mut map,
        "created",
        date_string(item, &format!("/fields/{FIELD_CREATED}")),
    );
    Value::Object(map)
}

/// Full view of a single work item.
pub fn work_item_detail(item: &Value) -> Value {
    let mut detail = work_item_summary(item);
    if let Value::Object(map) = &mut detail {
        insert_opt(map, "area", field(item, "System.AreaPath").cloned());
        insert_opt(map, "iteration", field(item, "System.IterationPath").cloned());
        insert_opt(map, "tags", field(item, "System.Tags").cloned());
        insert_opt(
            map,
            "priority",
            field(item, "Microsoft.VSTS.Common.Priority").cloned(),
        );
        insert_opt(map, "changed", date_string(item, "/fields/System.ChangedDate"));
        insert_opt(map, "description", field(item, "System.Description").cloned());
        insert_opt(
            map,
            "url",
            str_at(item, "/_links/html/href")
                .or_else(|| str_at(item, "/url"))
                .map(Value::from),
        );
    }
    detail
}

pub fn repository_summary(repo: &Value) -> Value {
    let mut map = Map::new();
    insert_opt(&mut map, "id", repo.get("id").cloned());
    insert_opt(&mut map, "name", repo.get("name").cloned());
    insert_opt(
        &mut map,
        "default_branch",
        str_at(repo, "/defaultBranch")
            .map(|b| Value::from(b.trim_start_matches("refs/heads/"))),
    );
    insert_opt(&mut map, "size", repo.get("size").cloned());
    insert_opt(&mut map, "created", date_string(repo, "/createdDate"));
    insert_opt(&mut map, "url", repo.get("webUrl").cloned());
    Value::Object(map)
}

pub fn pipeline_summary(pipeline: &Value) -> Value {
    let mut map = Map::new();
    insert_opt(&mut map, "id", pipeline.get("id").cloned());
    insert_opt(&mut map, "name", pipeline.get("name").cloned());
    insert_opt(&mut map, "folder", pipeline.get("folder").cloned());
    if let Some(run) = pipeline.get("latestRun") {
        let mut latest = Map::new();
        insert_opt(&mut latest, "name", run.get("name").cloned());
        insert_opt(&mut latest, "state", run.get("state").cloned());
        insert_opt(&mut latest, "result", run.get("result").cloned());
        insert_opt(&mut latest, "created", date_string(run, "/createdDate"));
        map.insert("latest_run".to_string(), Value::Object(latest));
    }
    Value::Object(map)
}

pub fn pull_request_summary(pr: &Value) -> Value {
    let branch = |pointer: &str| {
        str_at(pr, pointer).map(|b| Value::from(b.trim_start_matches("refs/heads/")))
    };
    let mut map = Map::new();
    insert_opt(&mut map, "id", pr.get("pullRequestId").cloned());
    insert_opt(&mut map, "title", pr.get("title").cloned());
    insert_opt(&mut map, "status", pr.get("status").cloned());
    insert_opt(&mut map, "repository", pr.pointer("/repository/name").cloned());
    insert_opt(&mut map, "author", identity(pr.get("createdBy")));
    insert_opt(&mut map, "created", date_string(pr, "/creationDate"));
    insert_opt(&mut map, "source", branch("/sourceRefName"));
    insert_opt(&mut map, "target", branch("/targetRefName"));
    Value::Object(map)
}

pub fn pull_request_detail(pr: &Value) -> Value {
    let mut detail = pull_request_summary(pr);
    if let Value::Object(map) = &mut detail {
        insert_opt(map, "description", pr.get("description").cloned());
        insert_opt(map, "merge_status", pr.get("mergeStatus").cloned());
        if let Some(reviewers) = pr.get("reviewers").and_then(Value::as_array) {
            let names: Vec<Value> = reviewers
                .iter()
                .filter_map(|r| r.get("displayName").cloned())
                .collect();
            map.insert("reviewers".to_string(), Value::Array(names));
        }
    }
    detail
}

pub fn project_summary(project: &Value) -> Value {
    let mut map = Map::new();
    insert_opt(&mut map, "id", project.get("id").cloned());
    insert_opt(&mut map, "name", project.get("name").cloned());
    insert_opt(&mut map, "state", project.get("state").cloned());
    insert_opt(&mut map, "visibility", project.get("visibility").cloned());
    insert_opt(&mut map, "last_update", date_string(project, "/lastUpdateTime"));
    insert_opt(&mut map, "description", project.get("description").cloned());
    Value::Object(map)
}

/// A repository with its branches and, when known, per-branch statistics.
pub fn repository_detail(repo: &Value, refs: &[Value], stats: &[Value]) -> Value {
    let mut detail = repository_summary(repo);
    if let Value::Object(map) = &mut detail {
        insert_opt(map, "remote_url", repo.get("remoteUrl").cloned());
        let branches: Vec<Value> = refs
            .iter()
            .filter_map(|r| str_at(r, "/name"))
            .map(|name| Value::from(branch_name(name)))
            .collect();
        map.insert("branches".to_string(), Value::Array(branches));
        if !stats.is_empty() {
            let stats = stats
                .iter()
                .map(|stat| {
                    let mut entry = Map::new();
                    insert_opt(
                        &mut entry,
                        "name",
                        str_at(stat, "/name").map(|n| Value::from(branch_name(n))),
                    );
                    insert_opt(&mut entry, "ahead", stat.get("aheadCount").cloned());
                    insert_opt(&mut entry, "behind", stat.get("behindCount").cloned());
                    Value::Object(entry)
                })
                .collect();
            map.insert("branch_stats".to_string(), Value::Array(stats));
        }
    }
    detail
}

/// One line per entry of a folder, `DIR` or `FILE` with its path.
///
/// The folder itself, which the items API lists first, is skipped.
pub fn folder_listing(folder: &str, items: &[Value]) -> Value {
    let entries = items
        .iter()
        .filter(|item| str_at(item, "/path") != Some(folder))
        .map(|item| {
            let kind = if item.get("isFolder").and_then(Value::as_bool) == Some(true) {
                "DIR"
            } else {
                "FILE"
            };
            json!({ "type": kind, "path": item.get("path").cloned().unwrap_or(Value::Null) })
        })
        .collect();
    Value::Array(entries)
}

/// Confirmation of a posted comment.
///
/// Without `thread_id` the response is the new thread and the comment is its
/// first entry; with it the response is the comment itself.
pub fn comment_summary(response: &Value, pull_request_id: i64, thread_id: Option<i64>) -> Value {
    let (thread, comment) = match thread_id {
        Some(id) => (Some(Value::from(id)), response),
        None => (
            response.get("id").cloned(),
            response.pointer("/comments/0").unwrap_or(&Value::Null),
        ),
    };
    let mut map = Map::new();
    map.insert("pull_request".to_string(), Value::from(pull_request_id));
    insert_opt(&mut map, "thread", thread);
    insert_opt(&mut map, "comment", comment.get("id").cloned());
    insert_opt(&mut map, "author", identity(comment.get("author")));
    insert_opt(&mut map, "content", comment.get("content").cloned());
    Value::Object(map)
}

/// The `authenticatedUser` block of a connection data response.
pub fn user_summary(connection: &Value) -> Value {
    let user = connection.get("authenticatedUser").unwrap_or(connection);
    let mut map = Map::new();
    insert_opt(&mut map, "id", user.get("id").cloned());
    insert_opt(
        &mut map,
        "name",
        user.get("providerDisplayName")
            .or_else(|| user.get("displayName"))
            .cloned(),
    );
    insert_opt(
        &mut map,
        "account",
        user.pointer("/properties/Account/$value").cloned(),
    );
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Resource;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_field_reference() {
        assert_eq!(field_reference("Estado"), "System.State");
        assert_eq!(field_reference("título"), "System.Title");
        assert_eq!(field_reference("Custom.Field"), "Custom.Field");
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2025-04-03T10:15:00.123Z"), Some(ymd(2025, 4, 3)));
        assert_eq!(parse_date("2025"), None);
    }

    #[test]
    fn test_retain_in_range_drops_undated() {
        let mut items = vec![
            json!({"name": "a", "createdDate": "2025-04-03T00:00:00Z"}),
            json!({"name": "b", "createdDate": "2024-01-01T00:00:00Z"}),
            json!({"name": "c"}),
        ];
        let range = DateRange::year(2025).unwrap();
        retain_in_range(&mut items, "/createdDate", Some(&range));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "a");
    }

    #[test]
    fn test_retain_matching_terms() {
        let mut items = vec![json!({"name": "Portal-Web"}), json!({"name": "api"})];
        let filter = FilterSpec::new(Resource::Repositories).with_term("portal");
        retain_matching_terms(&mut items, "/name", &filter);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_work_item_summary_order() {
        let raw = json!({
            "id": 42,
            "fields": {
                "System.State": "New",
                "System.Title": "Error en login",
                "System.WorkItemType": "Bug",
                "System.AssignedTo": {"displayName": "Ana"},
                "System.CreatedDate": "2025-04-03T10:00:00Z"
            }
        });
        let summary = work_item_summary(&raw);
        let keys: Vec<&String> = summary.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["id", "title", "type", "state", "assigned_to", "created"]);
        assert_eq!(summary["created"], "2025-04-03");
    }

    #[test]
    fn test_pull_request_summary_strips_refs() {
        let raw = json!({
            "pullRequestId": 7,
            "title": "Fix login",
            "sourceRefName": "refs/heads/fix/login",
            "targetRefName": "refs/heads/main"
        });
        let summary = pull_request_summary(&raw);
        assert_eq!(summary["source"], "fix/login");
        assert_eq!(summary["target"], "main");
    }

    #[test]
    fn test_branch_refs() {
        assert_eq!(branch_ref("main"), "refs/heads/main");
        assert_eq!(branch_ref("refs/heads/fix/sso"), "refs/heads/fix/sso");
        assert_eq!(branch_name("refs/heads/fix/sso"), "fix/sso");

        let pr = NewPullRequest {
            repository: "portal-web".to_string(),
            source_branch: "main".to_string(),
            target_branch: "refs/heads/main".to_string(),
            title: "x".to_string(),
            description: String::new(),
        };
        assert!(pr.check_branches().is_err());
    }

    #[test]
    fn test_repository_detail_lists_branches() {
        let repo = json!({"id": "r1", "name": "portal-web", "defaultBranch": "refs/heads/main"});
        let refs = [json!({"name": "refs/heads/main"}), json!({"name": "refs/heads/dev"})];
        let detail = repository_detail(&repo, &refs, &[]);
        assert_eq!(detail["branches"], json!(["main", "dev"]));
        assert!(detail.get("branch_stats").is_none());

        let stats = [json!({"name": "dev", "aheadCount": 3, "behindCount": 1})];
        let detail = repository_detail(&repo, &refs, &stats);
        assert_eq!(detail["branch_stats"][0]["ahead"], 3);
    }

    #[test]
    fn test_folder_listing_skips_folder_itself() {
        let items = [
            json!({"path": "/src", "isFolder": true}),
            json!({"path": "/src/lib.rs"}),
            json!({"path": "/src/bin", "isFolder": true}),
        ];
        let listing = folder_listing("/src", &items);
        assert_eq!(
            listing,
            json!([
                {"type": "FILE", "path": "/src/lib.rs"},
                {"type": "DIR", "path": "/src/bin"}
            ])
        );
    }

    #[test]
    fn test_comment_summary_thread_and_reply() {
        let thread = json!({"id": 5, "comments": [{"id": 1, "content": "LGTM"}]});
        let summary = comment_summary(&thread, 7, None);
        assert_eq!(summary, json!({"pull_request": 7, "thread": 5, "comment": 1, "content": "LGTM"}));

        let reply = json!({"id": 2, "content": "Hecho", "author": {"displayName": "Ana"}});
        let summary = comment_summary(&reply, 7, Some(5));
        assert_eq!(summary["thread"], 5);
        assert_eq!(summary["comment"], 2);
        assert_eq!(summary["author"], "Ana");
    }
}
