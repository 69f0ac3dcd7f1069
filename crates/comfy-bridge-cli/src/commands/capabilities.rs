//! `comfy-bridge capabilities` and `comfy-bridge verify`.

use serde_json::json;

use super::{build_service, describe, print_json, print_serialized, GlobalOptions};

/// Print the effective integration settings (no secrets).
pub fn show(opts: &GlobalOptions) -> Result<(), String> {
    let service = build_service(opts);
    let mut value = serde_json::to_value(service.capabilities())
        .map_err(|e| format!("Failed to encode output: {}", e))?;
    value["workflows_file"] = json!(service.registry().path().display().to_string());
    print_json(&value);
    Ok(())
}

/// Check that the remote service answers.
pub async fn verify(opts: &GlobalOptions) -> Result<(), String> {
    let service = build_service(opts);
    let body = service.verify_connection().await.map_err(describe)?;
    print_serialized(&json!({
        "ok": true,
        "base_url": service.capabilities().base_url,
        "response": body,
    }))
}
