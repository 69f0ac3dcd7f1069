//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and goes through
//! the comfy-bridge-core `ComfyService`.

pub mod capabilities;
pub mod run;
pub mod status;
pub mod tools;
pub mod workflows;

use std::path::Path;

use comfy_bridge_core::{ComfyConfig, ComfyError, ComfyService};
use serde::Serialize;
use serde_json::{Map, Value};

/// Overrides given on the command line (or via their env fallbacks).
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub registry: Option<String>,
    pub base_url: Option<String>,
}

/// Build a service from the environment plus command-line overrides.
pub fn build_service(opts: &GlobalOptions) -> ComfyService {
    let mut config = ComfyConfig::from_env();
    if let Some(ref url) = opts.base_url {
        config = config.with_base_url(url);
    }
    if let Some(ref path) = opts.registry {
        config = config.with_workflows_file(path);
    }
    ComfyService::new(config)
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

pub fn print_serialized<T: Serialize>(value: &T) -> Result<(), String> {
    let value = serde_json::to_value(value).map_err(|e| format!("Failed to encode output: {}", e))?;
    print_json(&value);
    Ok(())
}

/// Render a core error as a one-line CLI message.
pub fn describe(err: ComfyError) -> String {
    match err.details() {
        Some(details) => format!("{} [{}] {}", err, err.code(), details),
        None => format!("{} [{}]", err, err.code()),
    }
}

/// Parse an optional `--flag '{"k": v}'` argument into a JSON object.
pub fn parse_object_arg(flag: &str, raw: Option<&str>) -> Result<Option<Map<String, Value>>, String> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(_) => Err(format!("--{} must be a JSON object", flag)),
        Err(e) => Err(format!("--{} is not valid JSON: {}", flag, e)),
    }
}

pub fn read_json_file(path: &str) -> Result<Value, String> {
    let content = std::fs::read_to_string(Path::new(path))
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse '{}': {}", path, e))
}

/// Load `.env.local` then `.env` from the working directory. Variables that
/// are already set keep their value.
pub fn load_dotenv() {
    for filename in &[".env.local", ".env"] {
        let path = Path::new(filename);
        if !path.exists() {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().trim_start_matches("export ").trim();
            let mut value = value.trim();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }
            if !key.is_empty() && std::env::var_os(key).is_none() {
                std::env::set_var(key, value);
            }
        }
        tracing::debug!("[CLI] Loaded environment from '{}'", filename);
    }
}
