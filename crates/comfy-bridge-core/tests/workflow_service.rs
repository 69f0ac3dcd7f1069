//! Registry persistence and named runs through `ComfyService`.

use std::time::Duration;

use comfy_bridge_core::models::{RunWorkflowRequest, UpsertWorkflowInput, WorkflowFormat};
use comfy_bridge_core::runs::{RunOutcome, RunStatus};
use comfy_bridge_core::store::{WorkflowListing, WorkflowRegistry};
use comfy_bridge_core::{ComfyConfig, ComfyService};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn txt2img() -> Value {
    json!({
        "3": { "class_type": "KSampler", "inputs": { "seed": 1, "steps": 20 } },
        "6": { "class_type": "CLIPTextEncode", "inputs": { "text": "placeholder" } }
    })
}

fn enabled_service(base_url: &str, registry: &std::path::Path) -> ComfyService {
    let mut config = ComfyConfig::default()
        .with_base_url(base_url)
        .with_workflows_file(registry);
    config.enabled = true;
    ComfyService::new(config).with_poll_interval(Duration::from_millis(20))
}

#[tokio::test]
async fn test_upsert_preserves_created_at_and_refreshes_updated_at() {
    let dir = tempfile::tempdir().unwrap();
    let registry = WorkflowRegistry::new(dir.path().join("COMFY_WORKFLOWS.json"));

    let mut input = UpsertWorkflowInput::new("  txt2img  ", txt2img());
    input.description = Some("first".into());
    let first = registry.upsert(input).await.unwrap();
    assert_eq!(first.name, "txt2img");
    assert_eq!(first.format, WorkflowFormat::Api);

    tokio::time::sleep(Duration::from_millis(5)).await;

    let mut input = UpsertWorkflowInput::new("txt2img", txt2img());
    input.description = Some("second".into());
    let second = registry.upsert(input).await.unwrap();

    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at > first.updated_at);
    assert_eq!(second.description, "second");

    let fetched = registry.get("txt2img").await.unwrap().unwrap();
    assert_eq!(fetched, second);
    assert_eq!(registry.list_entries().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_graph_format_inferred_on_upsert() {
    let dir = tempfile::tempdir().unwrap();
    let registry = WorkflowRegistry::new(dir.path().join("w.json"));

    let entry = registry
        .upsert(UpsertWorkflowInput::new("graph", json!({ "nodes": [], "links": [] })))
        .await
        .unwrap();
    assert_eq!(entry.format, WorkflowFormat::Workflow);

    // An explicit format wins over detection.
    let mut input = UpsertWorkflowInput::new("forced", json!({ "nodes": [], "links": [] }));
    input.format = Some(WorkflowFormat::Api);
    assert_eq!(registry.upsert(input).await.unwrap().format, WorkflowFormat::Api);
}

#[tokio::test]
async fn test_summaries_omit_definition() {
    let dir = tempfile::tempdir().unwrap();
    let registry = WorkflowRegistry::new(dir.path().join("w.json"));
    registry
        .upsert(UpsertWorkflowInput::new("txt2img", txt2img()))
        .await
        .unwrap();

    let listing = registry.list(false).await.unwrap();
    let value = serde_json::to_value(&listing).unwrap();
    assert!(matches!(listing, WorkflowListing::Summaries(_)));
    assert_eq!(value[0]["name"], "txt2img");
    assert!(value[0].get("workflow").is_none());

    let value = serde_json::to_value(registry.list(true).await.unwrap()).unwrap();
    assert_eq!(value[0]["workflow"], txt2img());
}

#[tokio::test]
async fn test_delete_reports_removed_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("w.json");
    let registry = WorkflowRegistry::new(&path);
    registry
        .upsert(UpsertWorkflowInput::new("a", txt2img()))
        .await
        .unwrap();
    registry
        .upsert(UpsertWorkflowInput::new("b", txt2img()))
        .await
        .unwrap();

    let outcome = registry.delete("a").await.unwrap();
    assert!(outcome.deleted);
    assert_eq!(outcome.workflow.unwrap().name, "a");

    let outcome = registry.delete("a").await.unwrap();
    assert!(!outcome.deleted);
    assert!(outcome.workflow.is_none());

    let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk.as_array().unwrap().len(), 1);
    assert_eq!(on_disk[0]["name"], "b");

    // No temp files are left next to the registry.
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_invalid_upsert_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let registry = WorkflowRegistry::new(dir.path().join("w.json"));

    let err = registry
        .upsert(UpsertWorkflowInput::new("   ", json!([1, 2])))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "COMFY_INVALID_REQUEST");
    let details = err.details().unwrap();
    let paths: Vec<_> = details
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["path"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(paths, vec!["name", "workflow"]);
    assert!(registry.list_entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_named_run_merges_stored_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "prompt_id": "p-9" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let service = enabled_service(&server.uri(), &dir.path().join("w.json"));

    let mut input = UpsertWorkflowInput::new("txt2img", txt2img());
    input.defaults = Some(
        json!({ "6.inputs.text": "a cat", "3.inputs.seed": 7 })
            .as_object()
            .unwrap()
            .clone(),
    );
    service.upsert_workflow(input).await.unwrap();

    let request = RunWorkflowRequest {
        inputs: Some(json!({ "6.inputs.text": "a dog" }).as_object().unwrap().clone()),
        wait: false,
        ..RunWorkflowRequest::named("txt2img")
    };
    let outcome = service
        .run_workflow(request, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.run_id(), "p-9");
    assert_eq!(outcome.status(), RunStatus::Pending);
    assert!(matches!(outcome, RunOutcome::Queued(_)));

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["prompt"]["6"]["inputs"]["text"], "a dog");
    assert_eq!(body["prompt"]["3"]["inputs"]["seed"], 7);
    assert_eq!(body["prompt"]["3"]["inputs"]["steps"], 20);

    // The stored definition is untouched by the run.
    let stored = service.get_workflow("txt2img").await.unwrap();
    assert_eq!(stored.workflow, txt2img());
}

#[tokio::test]
async fn test_inline_run_and_status_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "prompt_id": "inline-1" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/history/inline-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "inline-1": {
                "status": { "status_str": "success", "completed": true },
                "outputs": {
                    "9": { "gifs": [{ "filename": "clip.mp4", "subfolder": "v", "type": "output", "format": "video/h264-mp4" }] }
                }
            }
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let service = enabled_service(&server.uri(), &dir.path().join("w.json"));

    let outcome = service
        .run_workflow(RunWorkflowRequest::inline(txt2img()), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.status(), RunStatus::Completed);

    let report = service.get_run_status("  inline-1 ").await.unwrap();
    assert_eq!(report.run_id, "inline-1");
    assert_eq!(report.artifacts[0].media_type, "gifs");
    assert_eq!(report.artifacts[0].format.as_deref(), Some("video/h264-mp4"));
    assert_eq!(
        report.artifacts[0].view_url,
        format!("{}/view?filename=clip.mp4&subfolder=v&type=output", server.uri())
    );

    // Registry file is created only by registry operations.
    assert!(!dir.path().join("w.json").exists());
}

#[tokio::test]
async fn test_run_request_validation() {
    let dir = tempfile::tempdir().unwrap();
    let service = enabled_service("http://127.0.0.1:9", &dir.path().join("w.json"));

    let request = RunWorkflowRequest {
        timeout_ms: Some(10),
        ..RunWorkflowRequest::default()
    };
    let err = service
        .run_workflow(request, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "COMFY_INVALID_REQUEST");
    assert_eq!(err.status(), Some(400));

    let err = service.get_run_status("   ").await.unwrap_err();
    assert_eq!(err.code(), "COMFY_INVALID_REQUEST");
}
