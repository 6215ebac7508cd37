//! Tool registry — cached remote tool catalog.
//!
//! Fetches the catalog once through a pooled session and caches it
//! process-wide; the cache is invalidated manually, never on a timer
//! (descriptors are immutable once published by the server). Also owns the
//! conversion from protocol descriptors to the model-facing function
//! schema.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::llm::types::ToolDefinition;

use super::pool::SessionPool;
use super::types::ToolDescriptor;

// ─── ToolRegistry ────────────────────────────────────────────────────────────

/// Caches the remote tool catalog and bridges it to the LLM schema.
pub struct ToolRegistry {
    pool: Arc<SessionPool>,
    cached: RwLock<Option<Arc<Vec<ToolDescriptor>>>>,
}

impl ToolRegistry {
    pub fn new(pool: Arc<SessionPool>) -> Self {
        Self {
            pool,
            cached: RwLock::new(None),
        }
    }

    /// The tool catalog, fetched on first use.
    ///
    /// A fetch that yields nothing is not cached, so a transient proxy
    /// outage does not pin an empty catalog until someone invalidates.
    pub async fn descriptors(&self) -> Arc<Vec<ToolDescriptor>> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            return Arc::clone(cached);
        }

        let mut guard = self.cached.write().await;
        // Another caller may have fetched while we waited for the lock.
        if let Some(cached) = guard.as_ref() {
            return Arc::clone(cached);
        }

        let tools = match self.pool.acquire().await {
            Ok(mut lease) => lease.list_tools().await,
            Err(e) => {
                tracing::warn!(error = %e, "could not acquire session for tools/list");
                Vec::new()
            }
        };

        let tools = Arc::new(tools);
        if tools.is_empty() {
            tracing::warn!("tool catalog fetch returned no tools, not caching");
        } else {
            tracing::info!(tool_count = tools.len(), "tool catalog cached");
            *guard = Some(Arc::clone(&tools));
        }
        tools
    }

    /// The catalog converted to the model's function-calling schema.
    pub async fn llm_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.descriptors()
            .await
            .iter()
            .map(to_llm_definition)
            .collect()
    }

    /// Drop the cached catalog; the next read re-fetches.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
        tracing::info!("tool catalog invalidated");
    }
}

/// Bridge one protocol descriptor to the model-facing schema.
fn to_llm_definition(tool: &ToolDescriptor) -> ToolDefinition {
    let input_schema = if tool.input_schema.is_object() {
        tool.input_schema.clone()
    } else {
        // The model endpoint rejects non-object schemas; an argument-less
        // tool still needs an empty object schema.
        serde_json::json!({"type": "object", "properties": {}})
    };
    ToolDefinition {
        name: tool.name.clone(),
        description: tool.description.clone(),
        input_schema,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_llm_definition_passes_schema_through() {
        let tool = ToolDescriptor {
            name: "flight_search".into(),
            description: "Search flights between two cities".into(),
            input_schema: json!({
                "type": "object",
                "properties": {"origin": {"type": "string"}},
                "required": ["origin"]
            }),
        };
        let def = to_llm_definition(&tool);
        assert_eq!(def.name, "flight_search");
        assert_eq!(def.input_schema["properties"]["origin"]["type"], "string");

        let wire = serde_json::to_value(&def).unwrap();
        assert!(wire.get("input_schema").is_some());
        assert!(wire.get("description").is_some());
    }

    #[test]
    fn test_to_llm_definition_defaults_missing_schema() {
        let tool = ToolDescriptor {
            name: "ping".into(),
            description: String::new(),
            input_schema: serde_json::Value::Null,
        };
        let def = to_llm_definition(&tool);
        assert_eq!(def.input_schema["type"], "object");
        assert!(def.input_schema["properties"].is_object());
    }
}
