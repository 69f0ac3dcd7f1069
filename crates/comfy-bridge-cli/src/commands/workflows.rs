//! `comfy-bridge workflows` - manage the named workflow registry.

use comfy_bridge_core::models::{UpsertWorkflowInput, WorkflowFormat};

use super::{
    build_service, describe, parse_object_arg, print_serialized, read_json_file, GlobalOptions,
};

pub async fn list(opts: &GlobalOptions, include_workflow: bool) -> Result<(), String> {
    let service = build_service(opts);
    let listing = service
        .list_workflows(include_workflow)
        .await
        .map_err(describe)?;
    print_serialized(&listing)
}

pub async fn get(opts: &GlobalOptions, name: &str) -> Result<(), String> {
    let service = build_service(opts);
    let entry = service.get_workflow(name).await.map_err(describe)?;
    print_serialized(&entry)
}

pub async fn upsert(
    opts: &GlobalOptions,
    name: &str,
    file: &str,
    format: Option<&str>,
    description: Option<String>,
    defaults: Option<&str>,
) -> Result<(), String> {
    let workflow = read_json_file(file)?;
    let format = format
        .map(str::parse::<WorkflowFormat>)
        .transpose()
        .map_err(describe)?;

    let input = UpsertWorkflowInput {
        format,
        description,
        defaults: parse_object_arg("defaults", defaults)?,
        ..UpsertWorkflowInput::new(name, workflow)
    };

    let service = build_service(opts);
    let entry = service.upsert_workflow(input).await.map_err(describe)?;
    print_serialized(&entry)
}

pub async fn delete(opts: &GlobalOptions, name: &str) -> Result<(), String> {
    let service = build_service(opts);
    let outcome = service.delete_workflow(name).await.map_err(describe)?;
    print_serialized(&outcome)?;
    if outcome.deleted {
        Ok(())
    } else {
        Err(format!("Workflow \"{}\" not found", name))
    }
}
