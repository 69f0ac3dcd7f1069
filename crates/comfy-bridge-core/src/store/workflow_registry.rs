//! WorkflowRegistry - named workflow definitions kept in one JSON file.
//!
//! The file holds a JSON array of [`WorkflowEntry`] and is created with `[]`
//! on first access. Every mutation rewrites the whole document (temp file +
//! rename); concurrent writers race with last-write-wins. Writes replace or
//! remove one element by `name` and keep every other element as stored.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::fs;

use crate::error::ComfyError;
use crate::models::workflow::{DeleteOutcome, UpsertWorkflowInput, WorkflowEntry, WorkflowSummary};
use crate::workflow::detect_format;

/// Result of [`WorkflowRegistry::list`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WorkflowListing {
    Entries(Vec<WorkflowEntry>),
    Summaries(Vec<WorkflowSummary>),
}

impl WorkflowListing {
    pub fn len(&self) -> usize {
        match self {
            WorkflowListing::Entries(v) => v.len(),
            WorkflowListing::Summaries(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowRegistry {
    path: PathBuf,
}

impl WorkflowRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn list(&self, include_workflow: bool) -> Result<WorkflowListing, ComfyError> {
        if include_workflow {
            Ok(WorkflowListing::Entries(self.list_entries().await?))
        } else {
            Ok(WorkflowListing::Summaries(self.list_summaries().await?))
        }
    }

    pub async fn list_entries(&self) -> Result<Vec<WorkflowEntry>, ComfyError> {
        self.read_all().await
    }

    pub async fn list_summaries(&self) -> Result<Vec<WorkflowSummary>, ComfyError> {
        Ok(self.read_all().await?.iter().map(WorkflowSummary::from).collect())
    }

    /// Exact-name lookup. Absence is `Ok(None)`.
    pub async fn get(&self, name: &str) -> Result<Option<WorkflowEntry>, ComfyError> {
        Ok(self.read_all().await?.into_iter().find(|e| e.name == name))
    }

    /// Insert or replace an entry by (trimmed) name. `created_at` survives
    /// replacement; `updated_at` is always refreshed. Only the matching
    /// element of the stored array is touched.
    pub async fn upsert(&self, input: UpsertWorkflowInput) -> Result<WorkflowEntry, ComfyError> {
        input.validate()?;

        let mut items = self.read_raw().await?;
        let name = input.name.trim().to_string();
        let index = position_by_name(&items, &name);
        let now = Utc::now();

        let created_at = index
            .and_then(|i| self.decode_entry(items[i].clone()))
            .and_then(|previous| previous.created_at)
            .unwrap_or(now);

        let entry = WorkflowEntry {
            format: input.format.unwrap_or_else(|| detect_format(&input.workflow)),
            workflow: input.workflow,
            description: input.description.unwrap_or_default(),
            defaults: input.defaults.unwrap_or_default(),
            created_at: Some(created_at),
            updated_at: Some(now),
            name,
        };

        let value = serde_json::to_value(&entry)
            .map_err(|e| self.error(format!("failed to serialize entry: {}", e)))?;
        match index {
            Some(i) => items[i] = value,
            None => items.push(value),
        }

        self.write_all(&items).await?;
        tracing::info!(
            "[Registry] {} workflow '{}' ({})",
            if index.is_some() { "Updated" } else { "Added" },
            entry.name,
            entry.format.as_str()
        );
        Ok(entry)
    }

    /// Remove the element named `name`. Entries that cannot be decoded are
    /// still removable; `workflow` is then `None`.
    pub async fn delete(&self, name: &str) -> Result<DeleteOutcome, ComfyError> {
        let mut items = self.read_raw().await?;
        let Some(index) = position_by_name(&items, name) else {
            return Ok(DeleteOutcome {
                deleted: false,
                workflow: None,
            });
        };

        let removed = items.remove(index);
        self.write_all(&items).await?;
        tracing::info!("[Registry] Deleted workflow '{}'", name);
        Ok(DeleteOutcome {
            deleted: true,
            workflow: self.decode_entry(removed),
        })
    }

    async fn ensure_file(&self) -> Result<(), ComfyError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| self.error(format!("failed to create directory: {}", e)))?;
        }

        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            fs::write(&self.path, "[]\n")
                .await
                .map_err(|e| self.error(format!("failed to create registry: {}", e)))?;
        }
        Ok(())
    }

    /// Read every entry that decodes. Individual entries that cannot be
    /// decoded are skipped here but stay in the file.
    async fn read_all(&self) -> Result<Vec<WorkflowEntry>, ComfyError> {
        Ok(self
            .read_raw()
            .await?
            .into_iter()
            .filter_map(|item| self.decode_entry(item))
            .collect())
    }

    /// The stored array as raw JSON. An unparseable or non-array file reads
    /// as empty.
    async fn read_raw(&self) -> Result<Vec<Value>, ComfyError> {
        self.ensure_file().await?;

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.error(format!("failed to read registry: {}", e)))?;

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(items)) => Ok(items),
            Ok(_) => {
                tracing::warn!("[Registry] {} is not a JSON array; treating as empty", self.path.display());
                Ok(Vec::new())
            }
            Err(e) => {
                tracing::warn!("[Registry] Failed to parse {}: {}", self.path.display(), e);
                Ok(Vec::new())
            }
        }
    }

    fn decode_entry(&self, mut item: Value) -> Option<WorkflowEntry> {
        // Hand-written entries may omit the format.
        if let Value::Object(ref mut obj) = item {
            if !obj.contains_key("format") {
                let format = detect_format(obj.get("workflow").unwrap_or(&Value::Null));
                obj.insert("format".to_string(), Value::String(format.as_str().to_string()));
            }
        }

        match serde_json::from_value::<WorkflowEntry>(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("[Registry] Skipping malformed entry in {}: {}", self.path.display(), e);
                None
            }
        }
    }

    async fn write_all(&self, entries: &[Value]) -> Result<(), ComfyError> {
        self.ensure_file().await?;

        let mut content = serde_json::to_string_pretty(entries)
            .map_err(|e| self.error(format!("failed to serialize registry: {}", e)))?;
        content.push('\n');

        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("workflows.json");
        let tmp_path = self
            .path
            .with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        fs::write(&tmp_path, content)
            .await
            .map_err(|e| self.error(format!("failed to write registry: {}", e)))?;
        if let Err(e) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(self.error(format!("failed to replace registry: {}", e)));
        }
        Ok(())
    }

    fn error(&self, message: String) -> ComfyError {
        ComfyError::Registry {
            path: self.path.display().to_string(),
            message,
        }
    }
}

fn position_by_name(items: &[Value], name: &str) -> Option<usize> {
    items
        .iter()
        .position(|item| item.get("name").and_then(Value::as_str) == Some(name))
}

/// Layer stored defaults under caller inputs (caller wins).
pub fn merge_defaults(
    defaults: &Map<String, Value>,
    inputs: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut merged = defaults.clone();
    if let Some(inputs) = inputs {
        for (k, v) in inputs {
            merged.insert(k.clone(), v.clone());
        }
    }
    merged
}
