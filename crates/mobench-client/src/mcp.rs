//! Environment client with tool-call support.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::debug;

use mobench_core::{Action, EvaluationResult, Observation, Screenshot, TaskDescriptor};

use crate::env::Env;
use crate::error::ClientError;
use crate::tools::{ToolBackend, ToolClient};

/// Prefix marking an app-name entry as a tool grant rather than an app.
const TOOL_APP_PREFIX: &str = "MCP-";

/// An [`Env`] that resolves `mcp` actions against a tool server.
///
/// Non-tool actions pass through to the inner environment untouched. On task
/// init the tool set is narrowed to the tools the task grants: app names
/// prefixed `MCP-` name the allowed tools, and tasks without the `agent-mcp`
/// tag get no tools at all.
pub struct McpEnvClient<E: Env, B: ToolBackend> {
    inner: E,
    tools: ToolClient<B>,
}

impl<E: Env, B: ToolBackend> McpEnvClient<E, B> {
    /// Wrap an environment with a tool client.
    pub fn new(inner: E, tools: ToolClient<B>) -> Self {
        Self { inner, tools }
    }

    /// Narrow the tool set to what `descriptor` grants.
    async fn reset_tools(&mut self, descriptor: &TaskDescriptor) -> Result<(), ClientError> {
        if !descriptor.has_tag("agent-mcp") {
            self.tools.clear();
            return Ok(());
        }
        let allowed: BTreeSet<String> = descriptor
            .app_names
            .iter()
            .filter_map(|app| app.strip_prefix(TOOL_APP_PREFIX))
            .map(str::to_string)
            .collect();
        debug!(task = %descriptor.name, tools = allowed.len(), "Granting tools");
        self.tools
            .refresh(Some(&allowed))
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl<E: Env, B: ToolBackend> Env for McpEnvClient<E, B> {
    fn device(&self) -> &str {
        self.inner.device()
    }

    async fn bind(&self) -> Result<(), ClientError> {
        self.inner.bind().await
    }

    async fn health(&self) -> Result<bool, ClientError> {
        self.inner.health().await
    }

    async fn task_list(&self) -> Result<Vec<TaskDescriptor>, ClientError> {
        self.inner.task_list().await
    }

    async fn task_metadata(&self, task_name: &str) -> Result<TaskDescriptor, ClientError> {
        self.inner.task_metadata(task_name).await
    }

    async fn task_goal(&self, task_name: &str) -> Result<String, ClientError> {
        self.inner.task_goal(task_name).await
    }

    async fn task_init(&mut self, task_name: &str) -> Result<bool, ClientError> {
        let initialized = self.inner.task_init(task_name).await?;
        if initialized {
            let descriptor = self.inner.task_metadata(task_name).await?;
            self.reset_tools(&descriptor).await?;
        }
        Ok(initialized)
    }

    async fn task_eval(&mut self) -> Result<EvaluationResult, ClientError> {
        self.inner.task_eval().await
    }

    async fn task_tear_down(&mut self) -> Result<(), ClientError> {
        self.tools.clear();
        self.inner.task_tear_down().await
    }

    async fn execute_action(&mut self, action: &Action) -> Result<Observation, ClientError> {
        if let Action::Mcp {
            action_name,
            action_json,
        } = action
        {
            let result = self.tools.call(action_name, action_json.clone()).await;
            // The device was not touched; observe it as-is.
            let screenshot = self.inner.observe().await?;
            return Ok(Observation::from_screenshot(screenshot).with_tool_call(result));
        }
        self.inner.execute_action(action).await
    }

    async fn observe(&self) -> Result<Screenshot, ClientError> {
        self.inner.observe().await
    }

    async fn switch_suite_family(&mut self, target: &str) -> Result<bool, ClientError> {
        let switched = self.inner.switch_suite_family(target).await?;
        if switched {
            self.tools.clear();
        }
        Ok(switched)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::{json, Value};

    use crate::tools::{ToolError, ToolSpec};

    use super::*;

    struct FakeEnv {
        init_results: Vec<bool>,
        actions: Vec<String>,
    }

    impl FakeEnv {
        fn new() -> Self {
            Self {
                init_results: vec![true],
                actions: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Env for FakeEnv {
        fn device(&self) -> &str {
            "emulator-5554"
        }

        async fn bind(&self) -> Result<(), ClientError> {
            Ok(())
        }

        async fn health(&self) -> Result<bool, ClientError> {
            Ok(true)
        }

        async fn task_list(&self) -> Result<Vec<TaskDescriptor>, ClientError> {
            Ok(vec![])
        }

        async fn task_metadata(&self, task_name: &str) -> Result<TaskDescriptor, ClientError> {
            Ok(TaskDescriptor {
                name: task_name.to_string(),
                goal: "find a restaurant".to_string(),
                app_names: BTreeSet::from([
                    "Messages".to_string(),
                    "MCP-search_web".to_string(),
                ]),
                tags: BTreeSet::from(["agent-mcp".to_string()]),
                snapshot: None,
            })
        }

        async fn task_goal(&self, _task_name: &str) -> Result<String, ClientError> {
            Ok("find a restaurant".to_string())
        }

        async fn task_init(&mut self, _task_name: &str) -> Result<bool, ClientError> {
            Ok(self.init_results.pop().unwrap_or(true))
        }

        async fn task_eval(&mut self) -> Result<EvaluationResult, ClientError> {
            Ok(EvaluationResult::new(1.0, None))
        }

        async fn task_tear_down(&mut self) -> Result<(), ClientError> {
            Ok(())
        }

        async fn execute_action(&mut self, action: &Action) -> Result<Observation, ClientError> {
            self.actions.push(action.kind().to_string());
            Ok(Observation::from_screenshot(Screenshot::empty()))
        }

        async fn observe(&self) -> Result<Screenshot, ClientError> {
            Ok(Screenshot::empty())
        }

        async fn switch_suite_family(&mut self, _target: &str) -> Result<bool, ClientError> {
            Ok(true)
        }
    }

    struct FakeBackend;

    #[async_trait]
    impl ToolBackend for FakeBackend {
        async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError> {
            Ok(vec![
                ToolSpec {
                    name: "search_web".to_string(),
                    description: String::new(),
                },
                ToolSpec {
                    name: "book_table".to_string(),
                    description: String::new(),
                },
            ])
        }

        async fn call_tool(&self, name: &str, _arguments: Value) -> Result<Value, ToolError> {
            Ok(json!({ "tool": name }))
        }
    }

    #[tokio::test]
    async fn test_mcp_action_intercepted() {
        let mut client = McpEnvClient::new(FakeEnv::new(), ToolClient::new(FakeBackend));
        client.task_init("WebSearchRestaurantTask").await.unwrap();

        let observation = client
            .execute_action(&Action::Mcp {
                action_name: "search_web".to_string(),
                action_json: json!({ "q": "ramen" }),
            })
            .await
            .unwrap();
        assert!(!observation.tool_call.unwrap().is_failure());
        // The tool call never reached the inner environment.
        assert!(client.inner.actions.is_empty());
    }

    #[tokio::test]
    async fn test_ungranted_tool_fails_without_aborting() {
        let mut client = McpEnvClient::new(FakeEnv::new(), ToolClient::new(FakeBackend));
        client.task_init("WebSearchRestaurantTask").await.unwrap();

        // book_table exists on the server but the task only grants search_web.
        let observation = client
            .execute_action(&Action::Mcp {
                action_name: "book_table".to_string(),
                action_json: json!({}),
            })
            .await
            .unwrap();
        assert!(observation.tool_call.unwrap().is_failure());
    }

    #[tokio::test]
    async fn test_non_mcp_actions_pass_through() {
        let mut client = McpEnvClient::new(FakeEnv::new(), ToolClient::new(FakeBackend));
        client.task_init("WebSearchRestaurantTask").await.unwrap();

        client.execute_action(&Action::NavigateHome).await.unwrap();
        assert_eq!(client.inner.actions, vec!["navigate_home"]);
    }

    #[tokio::test]
    async fn test_teardown_clears_tool_grants() {
        let mut client = McpEnvClient::new(FakeEnv::new(), ToolClient::new(FakeBackend));
        client.task_init("WebSearchRestaurantTask").await.unwrap();
        client.task_tear_down().await.unwrap();

        let observation = client
            .execute_action(&Action::Mcp {
                action_name: "search_web".to_string(),
                action_json: json!({}),
            })
            .await
            .unwrap();
        assert!(observation.tool_call.unwrap().is_failure());
    }
}
