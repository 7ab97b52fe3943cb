//! End-to-end resolution through the engine.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;

use devops_resolver::backend::{BackendResult, DevOpsBackend, NewPullRequest};
use devops_resolver::config::InvalidDatePolicy;
use devops_resolver::query::{Command, Intent, ShorthandCommand};
use devops_resolver::{
    BackendError, CommandEngine, FilterSpec, IntentClassifier, MemoryBackend, Payload, Session,
};

/// Backend that records calls and answers with canned payloads.
#[derive(Default)]
struct StubBackend {
    calls: Mutex<Vec<String>>,
    filters: Mutex<Vec<FilterSpec>>,
    text_reply: Option<String>,
}

impl StubBackend {
    fn with_text_reply(text: &str) -> Self {
        Self {
            text_reply: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn list(&self, name: &str, filter: &FilterSpec) -> BackendResult<Payload> {
        self.record(name.to_string());
        self.filters.lock().unwrap().push(filter.clone());
        match &self.text_reply {
            Some(text) => Ok(Payload::text(text.clone())),
            None => Ok(Payload::Structured(json!([]))),
        }
    }
}

#[async_trait]
impl DevOpsBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    async fn list_work_items(&self, filter: &FilterSpec) -> BackendResult<Payload> {
        self.list("list_work_items", filter)
    }

    async fn query_work_items(&self, wiql: &str, filter: &FilterSpec) -> BackendResult<Payload> {
        self.record(format!("query_work_items {wiql}"));
        self.filters.lock().unwrap().push(filter.clone());
        Ok(Payload::Structured(json!([])))
    }

    async fn get_work_item(&self, id: i64) -> BackendResult<Payload> {
        self.record(format!("get_work_item {id}"));
        Err(BackendError::NotFound(format!("work item {id}")))
    }

    async fn create_work_item(&self, title: &str, work_item_type: &str) -> BackendResult<Payload> {
        self.record(format!("create_work_item {title}|{work_item_type}"));
        Ok(Payload::Structured(json!({"id": 42, "title": "Error en login"})))
    }

    async fn update_work_item(&self, id: i64, field: &str, value: &str) -> BackendResult<Payload> {
        self.record(format!("update_work_item {id}|{field}|{value}"));
        Err(BackendError::Api {
            status: 400,
            message: "TF401320: Rule error for field State".to_string(),
        })
    }

    async fn clone_work_item(&self, id: i64, new_title: &str) -> BackendResult<Payload> {
        self.record(format!("clone_work_item {id}|{new_title}"));
        Ok(Payload::Structured(json!({"id": id + 1, "title": new_title})))
    }

    async fn list_projects(&self) -> BackendResult<Payload> {
        self.record("list_projects".to_string());
        Ok(Payload::Structured(json!([{"name": "Fabrikam"}])))
    }

    async fn list_repositories(&self, filter: &FilterSpec) -> BackendResult<Payload> {
        self.list("list_repositories", filter)
    }

    async fn get_repository(&self, repository: &str) -> BackendResult<Payload> {
        self.record(format!("get_repository {repository}"));
        Ok(Payload::Structured(json!({"name": repository})))
    }

    async fn get_file_content(
        &self,
        repository: &str,
        path: &str,
        branch: &str,
    ) -> BackendResult<Payload> {
        self.record(format!("get_file_content {repository}|{path}|{branch}"));
        Ok(Payload::text("hola"))
    }

    async fn list_pipelines(&self, filter: &FilterSpec) -> BackendResult<Payload> {
        self.list("list_pipelines", filter)
    }

    async fn list_pull_requests(&self, filter: &FilterSpec) -> BackendResult<Payload> {
        self.list("list_pull_requests", filter)
    }

    async fn get_pull_request(&self, id: i64) -> BackendResult<Payload> {
        self.record(format!("get_pull_request {id}"));
        Ok(Payload::Structured(json!({"id": id, "title": "Fix"})))
    }

    async fn create_pull_request(&self, request: &NewPullRequest) -> BackendResult<Payload> {
        self.record(format!("create_pull_request {}", request.title));
        Ok(Payload::Structured(json!({"id": 1, "title": request.title})))
    }

    async fn add_pull_request_comment(
        &self,
        repository: &str,
        pull_request_id: i64,
        comment: &str,
        thread_id: Option<i64>,
    ) -> BackendResult<Payload> {
        self.record(format!(
            "add_pull_request_comment {repository}|{pull_request_id}|{comment}|{thread_id:?}"
        ));
        Ok(Payload::Structured(json!({"pull_request": pull_request_id})))
    }

    async fn current_user(&self) -> BackendResult<Payload> {
        self.record("current_user".to_string());
        Ok(Payload::text("Ana Ruiz <ana.ruiz@example.com>"))
    }
}

fn session() -> Session {
    Session::new().with_reference_date(NaiveDate::from_ymd_opt(2025, 3, 31).unwrap())
}

#[tokio::test]
async fn test_create_item_end_to_end() {
    let line = r#"!create_item "Error en login" "Bug""#;

    let intent = IntentClassifier::new().classify(line).unwrap();
    assert_eq!(
        intent,
        Intent::Shorthand(ShorthandCommand::new(
            Command::CreateItem,
            vec!["Error en login".to_string(), "Bug".to_string()]
        ))
    );

    let stub = Arc::new(StubBackend::default());
    let engine = CommandEngine::new(stub.clone());
    let out = engine.resolve_and_respond(&mut session(), line).await;

    assert!(!out.is_error());
    assert_eq!(out.as_str(), "id: 42\ntitle: Error en login");
    assert_eq!(stub.calls(), vec!["create_work_item Error en login|Bug"]);
}

#[tokio::test]
async fn test_backend_errors_render_and_loop_continues() {
    let stub = Arc::new(StubBackend::default());
    let engine = CommandEngine::new(stub.clone());
    let mut session = session();

    let out = engine
        .resolve_and_respond(&mut session, r#"!update_item 7 State "Closed""#)
        .await;
    assert!(out.is_error());
    assert!(out.as_str().contains("TF401320: Rule error for field State"));

    let out = engine
        .resolve_and_respond(&mut session, r#"!clone_item 7 "Copia""#)
        .await;
    assert!(!out.is_error());
    assert_eq!(out.as_str(), "id: 8\ntitle: Copia");
}

#[tokio::test]
async fn test_free_text_filter_reaches_backend() {
    let stub = Arc::new(StubBackend::default());
    let engine = CommandEngine::new(stub.clone());

    let out = engine
        .resolve_and_respond(&mut session(), "pipelines activos en 2025")
        .await;
    assert_eq!(out.as_str(), "(empty)");

    let filters = stub.filters.lock().unwrap().clone();
    assert_eq!(stub.calls(), vec!["list_pipelines"]);
    let range = filters[0].date_range.unwrap();
    assert_eq!(range.start, NaiveDate::from_ymd_opt(2025, 1, 1));
    assert_eq!(range.end, NaiveDate::from_ymd_opt(2026, 1, 1));
    assert_eq!(filters[0].state(), Some("Active"));
}

#[tokio::test]
async fn test_last_month_at_end_of_march_is_february() {
    let stub = Arc::new(StubBackend::default());
    let engine = CommandEngine::new(stub.clone());

    engine
        .resolve_and_respond(&mut session(), "bugs creados el mes pasado")
        .await;

    let filters = stub.filters.lock().unwrap().clone();
    let range = filters[0].date_range.unwrap();
    assert_eq!(range.start, NaiveDate::from_ymd_opt(2025, 2, 1));
    assert_eq!(range.end, NaiveDate::from_ymd_opt(2025, 3, 1));
    assert_eq!(filters[0].work_item_type(), Some("Bug"));
    assert!(filters[0].raw_terms.is_empty());
}

#[tokio::test]
async fn test_id_lookups_route_by_kind() {
    let stub = Arc::new(StubBackend::default());
    let engine = CommandEngine::new(stub.clone());
    let mut session = session();

    let out = engine
        .resolve_and_respond(&mut session, "Dame información sobre el item 21101")
        .await;
    assert_eq!(out.as_str(), "[error] Backend error: Not found: work item 21101");

    engine
        .resolve_and_respond(&mut session, "muéstrame el pull request 77")
        .await;
    assert_eq!(
        stub.calls(),
        vec!["get_work_item 21101", "get_pull_request 77"]
    );
}

#[tokio::test]
async fn test_text_payload_is_decoded_or_wrapped() {
    let json_text = StubBackend::with_text_reply(r#"{"count": 1, "value": [{"id": 5}]}"#);
    let engine = CommandEngine::new(Arc::new(json_text));
    let out = engine.resolve_and_respond(&mut session(), "!repos").await;
    assert_eq!(out.as_str(), "count: 1\nvalue:\n  1. id: 5");

    let broken = StubBackend::with_text_reply(r#"{"count": 1,"#);
    let engine = CommandEngine::new(Arc::new(broken));
    let mut debug_session = session();
    debug_session.debug = true;
    let out = engine.resolve_and_respond(&mut debug_session, "!repos").await;
    assert!(!out.is_error());
    assert!(out.as_str().contains(r#"{"count": 1,"#));
    assert!(out.as_str().contains("[debug] decode ambiguity"));
}

#[tokio::test]
async fn test_rendering_is_idempotent() {
    let engine = CommandEngine::new(Arc::new(MemoryBackend::seeded()));
    let mut first = session();
    let mut second = session();
    let a = engine.resolve_and_respond(&mut first, "!items").await;
    let b = engine.resolve_and_respond(&mut second, "!items").await;
    assert_eq!(a, b);
    assert!(a.as_str().starts_with("1. id: 106"));
}

#[tokio::test]
async fn test_year_bounds() {
    let engine = CommandEngine::new(Arc::new(StubBackend::default()));
    let mut session = session();

    for phrase in ["bugs de abril de 1899", "bugs de abril de 3000"] {
        let out = engine.resolve_and_respond(&mut session, phrase).await;
        assert!(out.is_error(), "{phrase} should be rejected");
    }
    for phrase in ["bugs de abril de 1900", "bugs de abril de 2999"] {
        let out = engine.resolve_and_respond(&mut session, phrase).await;
        assert!(!out.is_error(), "{phrase} should be accepted");
    }
}

#[tokio::test]
async fn test_ignore_policy_drops_bad_date() {
    let stub = Arc::new(StubBackend::default());
    let engine =
        CommandEngine::new(stub.clone()).with_invalid_date_policy(InvalidDatePolicy::Ignore);

    let out = engine
        .resolve_and_respond(&mut session(), "tareas login de abril de 3000")
        .await;
    assert!(!out.is_error());

    let filters = stub.filters.lock().unwrap().clone();
    assert!(filters[0].date_range.is_none());
    assert_eq!(filters[0].raw_terms, vec!["login"]);
}

#[tokio::test]
async fn test_memory_backend_round_trip() {
    let engine = CommandEngine::new(Arc::new(MemoryBackend::new()));
    let mut session = session();

    let out = engine
        .resolve_and_respond(&mut session, r#"!crear "Revisar pipeline" Task"#)
        .await;
    assert!(out.as_str().starts_with("id: 1\ntitle: Revisar pipeline\ntype: Task"));

    let out = engine
        .resolve_and_respond(&mut session, r#"!actualizar 1 estado "Active""#)
        .await;
    assert!(out.as_str().contains("state: Active"));

    let out = engine.resolve_and_respond(&mut session, "!item 1").await;
    assert!(out.as_str().contains("state: Active"));
}

#[tokio::test]
async fn test_plain_numbers_are_not_dates() {
    let stub = Arc::new(StubBackend::default());
    let engine = CommandEngine::new(stub.clone());
    let mut session = session();

    for line in ["bugs del sprint 1234", "!repos 1000", "tareas con 5000 puntos"] {
        let out = engine.resolve_and_respond(&mut session, line).await;
        assert!(!out.is_error(), "{line}: {}", out.as_str());
    }

    let filters = stub.filters.lock().unwrap().clone();
    assert_eq!(filters.len(), 3);
    assert!(filters.iter().all(|f| f.date_range.is_none()));
    assert_eq!(filters[1].raw_terms, vec!["1000"]);
    assert_eq!(
        stub.calls(),
        vec!["list_work_items", "list_repositories", "list_work_items"]
    );
}

#[tokio::test]
async fn test_anchored_out_of_window_year_is_rejected() {
    let stub = Arc::new(StubBackend::default());
    let engine = CommandEngine::new(stub.clone());

    let out = engine
        .resolve_and_respond(&mut session(), "bugs cerrados desde 1234")
        .await;
    assert!(out.is_error());
    assert!(stub.calls().is_empty());
}

#[tokio::test]
async fn test_custom_wiql_gets_date_range() {
    let stub = Arc::new(StubBackend::default());
    let engine = CommandEngine::new(stub.clone());

    let wiql = "SELECT [System.Id] FROM WorkItems";
    engine.query_work_items(&session(), wiql, "en 2025").await;

    assert_eq!(stub.calls(), vec![format!("query_work_items {wiql}")]);
    let range = stub.filters.lock().unwrap()[0].date_range.unwrap();
    assert_eq!(range.start, NaiveDate::from_ymd_opt(2025, 1, 1));
}
