//! Tests for the MCP server tools.

use std::sync::Arc;

use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::ServerHandler;

use devops_resolver::config::{BackendKind, Config};
use devops_resolver::mcp::{
    CreatePullRequestParams, CreateWorkItemParams, DevOpsServer, FileContentParams, IdParams,
    ListParams, PullRequestCommentParams, RepositoryParams, ResolveParams, WorkItemListParams,
};
use devops_resolver::{CommandEngine, MemoryBackend};

fn test_server() -> DevOpsServer {
    DevOpsServer::new(Arc::new(CommandEngine::new(Arc::new(MemoryBackend::seeded()))))
}

fn text(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .filter_map(|c| c.as_text())
        .map(|t| t.text.clone())
        .collect::<Vec<_>>()
        .join("\n")
}

fn list(filter: &str) -> Parameters<ListParams> {
    Parameters(ListParams {
        filter: Some(filter.to_string()),
    })
}

#[tokio::test]
async fn test_server_from_offline_config() {
    let mut config = Config::default();
    config.backend.kind = BackendKind::Memory;
    let server = DevOpsServer::from_config(&config).unwrap();
    assert_eq!(server.engine().backend().name(), "memory");
}

#[tokio::test]
async fn test_server_info() {
    let info = test_server().get_info();
    assert!(!info.server_info.name.is_empty(), "Server should have a name");
    assert!(info
        .instructions
        .as_deref()
        .is_some_and(|i| i.contains("resolve")));
}

#[tokio::test]
async fn test_resolve_tool() {
    let server = test_server();
    let result = server
        .resolve(Parameters(ResolveParams {
            input: "cerrados en abril de 2025".to_string(),
        }))
        .await
        .unwrap();
    let out = text(&result);
    assert!(out.contains("Timeout en API de pagos"));
    assert!(!out.contains("Login falla con SSO"));
    assert_ne!(result.is_error, Some(true));
}

#[tokio::test]
async fn test_errors_are_flagged() {
    let server = test_server();
    let result = server
        .get_work_item(Parameters(IdParams { id: 4242 }))
        .await
        .unwrap();
    assert_eq!(result.is_error, Some(true));
    assert!(text(&result).starts_with("[error]"));

    let result = server
        .resolve(Parameters(ResolveParams {
            input: "!update_item abc estado Active".to_string(),
        }))
        .await
        .unwrap();
    assert_eq!(result.is_error, Some(true));
    assert!(text(&result).contains("is not a numeric id"));
}

#[tokio::test]
async fn test_list_tools() {
    let server = test_server();

    let repos = text(&server.list_repositories(list("portal")).await.unwrap());
    assert!(repos.contains("portal-web"));
    assert!(!repos.contains("payments-api"));

    let prs = text(&server.list_pull_requests(list("")).await.unwrap());
    assert!(prs.contains("Fix SSO login redirect"));

    let pipelines = text(&server.list_pipelines(list("en 2024")).await.unwrap());
    assert!(pipelines.contains("payments-release"));
    assert!(!pipelines.contains("portal-ci"));

    let items = text(
        &server
            .list_work_items(Parameters(WorkItemListParams::default()))
            .await
            .unwrap(),
    );
    assert!(items.starts_with("1. id: 106"));
}

#[tokio::test]
async fn test_create_then_get_pull_request_and_me() {
    let server = test_server();
    let created = text(
        &server
            .create_work_item(Parameters(CreateWorkItemParams {
                title: "Error en login".to_string(),
                work_item_type: "Bug".to_string(),
            }))
            .await
            .unwrap(),
    );
    assert!(created.contains("title: Error en login"));

    let pr = text(&server.get_pull_request(Parameters(IdParams { id: 7 })).await.unwrap());
    assert!(pr.contains("description: Corrige el redirect tras SSO."));

    let me = text(&server.get_me().await.unwrap());
    assert!(me.contains("name: Ana Ruiz"));
}

#[tokio::test]
async fn test_toggle_debug_affects_resolve() {
    let server = test_server();
    let toggled = text(&server.toggle_debug().await.unwrap());
    assert_eq!(toggled, "Debug mode on");

    let out = text(
        &server
            .resolve(Parameters(ResolveParams {
                input: "!me".to_string(),
            }))
            .await
            .unwrap(),
    );
    assert!(out.starts_with("[debug] intent:"));
}

#[tokio::test]
async fn test_list_work_items_with_custom_wiql() {
    let server = test_server();
    let result = server
        .list_work_items(Parameters(WorkItemListParams {
            filter: Some("en abril de 2025".to_string()),
            query_string: Some(
                "SELECT [System.Id] FROM WorkItems WHERE [System.WorkItemType] = 'Bug'".to_string(),
            ),
        }))
        .await
        .unwrap();
    let out = text(&result);
    assert_eq!(out.matches("type: Bug").count(), 2);
    assert!(out.contains("Timeout en API de pagos"));

    let result = server
        .list_work_items(Parameters(WorkItemListParams {
            filter: None,
            query_string: Some("DELETE FROM WorkItems".to_string()),
        }))
        .await
        .unwrap();
    assert_eq!(result.is_error, Some(true));
}

#[tokio::test]
async fn test_projects_repository_and_files() {
    let server = test_server();

    let projects = text(&server.list_projects().await.unwrap());
    assert!(projects.contains("name: Fabrikam"));
    assert!(projects.contains("name: Tooling"));

    let repo = text(
        &server
            .get_repository(Parameters(RepositoryParams {
                repository: "portal-web".to_string(),
            }))
            .await
            .unwrap(),
    );
    assert!(repo.contains("fix/sso"));

    let folder = text(
        &server
            .get_file_content(Parameters(FileContentParams {
                repository: "portal-web".to_string(),
                path: "/src".to_string(),
                branch: "main".to_string(),
            }))
            .await
            .unwrap(),
    );
    assert!(folder.contains("/src/app.ts"));
    assert!(folder.contains("/src/login"));

    let file = text(
        &server
            .get_file_content(Parameters(FileContentParams {
                repository: "portal-web".to_string(),
                path: "/src/login/sso.ts".to_string(),
                branch: "fix/sso".to_string(),
            }))
            .await
            .unwrap(),
    );
    assert_eq!(file, "export const redirect = '/callback';\n");

    let missing = server
        .get_file_content(Parameters(FileContentParams {
            repository: "portal-web".to_string(),
            path: "/src/login/sso.ts".to_string(),
            branch: "develop".to_string(),
        }))
        .await
        .unwrap();
    assert_eq!(missing.is_error, Some(true));
}

#[tokio::test]
async fn test_create_pull_request_then_comment() {
    let server = test_server();
    let created = text(
        &server
            .create_pull_request(Parameters(CreatePullRequestParams {
                repository: "portal-web".to_string(),
                source_branch: "fix/sso".to_string(),
                target_branch: "main".to_string(),
                title: "Callback tras SSO".to_string(),
                description: String::new(),
            }))
            .await
            .unwrap(),
    );
    assert!(created.contains("id: 9"));
    assert!(created.contains("title: Callback tras SSO"));

    let comment = |comment: &str, thread_id: Option<i64>| PullRequestCommentParams {
        repository: "portal-web".to_string(),
        pull_request_id: 9,
        comment: comment.to_string(),
        thread_id,
    };
    let opened = text(
        &server
            .add_pull_request_comment(Parameters(comment("Revisado", None)))
            .await
            .unwrap(),
    );
    assert!(opened.contains("thread: 1"));
    let reply = text(
        &server
            .add_pull_request_comment(Parameters(comment("Gracias", Some(1))))
            .await
            .unwrap(),
    );
    assert!(reply.contains("comment: 2"));

    let same_branch = server
        .create_pull_request(Parameters(CreatePullRequestParams {
            repository: "portal-web".to_string(),
            source_branch: "main".to_string(),
            target_branch: "main".to_string(),
            title: "Nada".to_string(),
            description: String::new(),
        }))
        .await
        .unwrap();
    assert_eq!(same_branch.is_error, Some(true));
}
