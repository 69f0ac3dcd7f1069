//! `comfy-bridge tools` - inspect and invoke the agent-facing tools.

use std::sync::Arc;

use comfy_bridge_core::tools::ComfyTools;
use tokio_util::sync::CancellationToken;

use super::{build_service, print_serialized, GlobalOptions};

/// Print the tool definitions. Empty while the integration is disabled.
pub fn list(opts: &GlobalOptions) -> Result<(), String> {
    let tools = ComfyTools::new(Arc::new(build_service(opts)));
    print_serialized(&tools.definitions())
}

/// Invoke one tool with raw JSON arguments and print its result.
pub async fn call(opts: &GlobalOptions, name: &str, args: &str) -> Result<(), String> {
    let args: serde_json::Value =
        serde_json::from_str(args).map_err(|e| format!("--args is not valid JSON: {}", e))?;
    let tools = ComfyTools::new(Arc::new(build_service(opts)));

    let result = tools.call(name, args, &CancellationToken::new()).await;
    print_serialized(&result)?;
    if result.success {
        Ok(())
    } else {
        Err(result.error.unwrap_or_else(|| format!("Tool {} failed", name)))
    }
}
