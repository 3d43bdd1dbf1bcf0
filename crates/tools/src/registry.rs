//! Tool registry: name -> tool lookup, parameter validation, and the
//! tracked-execution path the orchestrator drives every tool call through
//! (`spec.md` §4.2).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chatcore_domain::error::{Error, ErrorCode, Result};
use chatcore_domain::tool::{ExecutionContext, ExecutionResult, ParameterType, ToolCategory, ToolDefinition};
use chatcore_domain::trace::TraceEvent;
use chatcore_sessions::SessionStore;
use serde_json::Value;

/// A tool is any object satisfying `{definition, execute}` — the external
/// boundary `spec.md` §6 calls out by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> Result<ExecutionResult>;
}

/// Holds the set of registered tools. Read-mostly after startup: writes
/// (registrations) are only permitted during initialization (`spec.md` §5).
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Registers a tool. Idempotent-by-name is explicitly *not* supported:
    /// a second registration under the same name is a programming error,
    /// not a silent overwrite (`spec.md` §4.2).
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name.clone();
        assert!(
            !self.tools.contains_key(&name),
            "tool '{name}' is already registered — a second registration under the same name is a programming error"
        );
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition().clone()).collect()
    }

    pub fn by_category(&self, category: ToolCategory) -> Vec<Arc<dyn Tool>> {
        self.tools
            .values()
            .filter(|t| t.definition().category == category)
            .cloned()
            .collect()
    }

    /// Validates `params` against the tool's declared schema, then
    /// delegates to its body. This is the only path the orchestrator uses
    /// to run a tool (`spec.md` §4.2): a call either fails validation
    /// without invoking the body, or invokes the body exactly once.
    ///
    /// When `ctx.session_id` is non-empty, records the call as a
    /// [`TraceEvent::ToolExecutionRecorded`] rather than a transcript
    /// message: the message sequence is spec-owned (§8 tool pairing —
    /// every assistant tool call is answered by exactly one `role=tool`
    /// message before the next assistant message), so an auditable trail
    /// of a call lives in the trace log and the answering tool message's
    /// own `execution` metadata, never as an extra message in between.
    pub async fn execute_tracked(
        &self,
        name: &str,
        params: Value,
        ctx: &ExecutionContext,
        _store: &SessionStore,
    ) -> Result<ExecutionResult> {
        let tool = self.get(name).ok_or_else(|| Error::tool_not_found(name))?;
        validate_params(tool.definition(), &params)?;

        let started = Instant::now();
        let result = match tool.execute(params, ctx).await {
            Ok(r) => r,
            Err(e) => ExecutionResult::failed(e.message, started.elapsed().as_millis() as u64)
                .with_metadata(serde_json::json!({ "code": e.code })),
        };

        if !ctx.session_id.is_empty() {
            TraceEvent::ToolExecutionRecorded {
                session_id: ctx.session_id.clone(),
                tool: name.to_string(),
                success: result.success,
                duration_ms: result.duration_ms,
            }
            .emit();
        }

        Ok(result)
    }
}

/// A parameter is "present" if its key exists in the input map. Absent
/// required parameters fail; present values are checked against the
/// declared primitive type; defaults are applied for absent optionals
/// (applied by the caller reading `ExecutionResult`, validation only
/// confirms shape here).
fn validate_params(def: &ToolDefinition, params: &Value) -> Result<()> {
    let obj = params.as_object();
    for p in &def.parameters {
        let present = obj.map(|o| o.contains_key(&p.name)).unwrap_or(false);
        if !present {
            if p.required {
                return Err(Error::tool_invalid_params(format!(
                    "missing required parameter '{}'",
                    p.name
                )));
            }
            continue;
        }
        let value = &obj.unwrap()[&p.name];
        if !type_matches(p.param_type, value) {
            return Err(Error::tool_invalid_params(format!(
                "parameter '{}' must be of type {:?}",
                p.name, p.param_type
            )));
        }
    }
    Ok(())
}

fn type_matches(t: ParameterType, v: &Value) -> bool {
    match t {
        ParameterType::String => v.is_string(),
        ParameterType::Number => v.is_number(),
        ParameterType::Boolean => v.is_boolean(),
        ParameterType::Array => v.is_array(),
        ParameterType::Object => v.is_object(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatcore_domain::tool::ToolParameter;

    struct EchoTool(ToolDefinition);

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> &ToolDefinition {
            &self.0
        }

        async fn execute(&self, params: Value, _ctx: &ExecutionContext) -> Result<ExecutionResult> {
            Ok(ExecutionResult::ok(params.to_string(), 0))
        }
    }

    fn echo_def() -> ToolDefinition {
        ToolDefinition::new(
            "echo",
            "echoes params back",
            ToolCategory::Management,
            vec![ToolParameter::required("text", ParameterType::String, "text to echo")],
        )
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_registration_panics() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool(echo_def())));
        registry.register(Arc::new(EchoTool(echo_def())));
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            session_id: String::new(),
            user_id: None,
            working_directory: ".".into(),
            timeout: std::time::Duration::from_secs(1),
            env: Default::default(),
        }
    }

    #[tokio::test]
    async fn missing_required_param_fails_without_invoking_body() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool(echo_def())));
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        let result = registry.execute_tracked("echo", serde_json::json!({}), &ctx(), &store).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn wrong_type_param_fails_validation() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool(echo_def())));
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        let result = registry
            .execute_tracked("echo", serde_json::json!({"text": 5}), &ctx(), &store)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn valid_params_invoke_body() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool(echo_def())));
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        let result = registry
            .execute_tracked("echo", serde_json::json!({"text": "hi"}), &ctx(), &store)
            .await
            .unwrap();
        assert!(result.success);
    }

    #[test]
    fn unknown_tool_not_found() {
        let registry = ToolRegistry::new();
        assert!(registry.get("ghost").is_none());
    }
}
