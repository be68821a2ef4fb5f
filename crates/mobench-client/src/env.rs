//! HTTP environment client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use mobench_core::{Action, EvaluationResult, Observation, Screenshot, TaskDescriptor};

use crate::error::ClientError;

/// Screenshot retries before giving up on an observation.
const SCREENSHOT_RETRIES: u32 = 3;

/// The environment surface the benchmark loop runs against.
#[async_trait]
pub trait Env: Send + Sync {
    /// Device this client is bound to.
    fn device(&self) -> &str;

    /// Bind the device and verify it answers.
    async fn bind(&self) -> Result<(), ClientError>;

    /// Whether every device behind the server answers.
    async fn health(&self) -> Result<bool, ClientError>;

    /// Task descriptors available in the current suite family.
    async fn task_list(&self) -> Result<Vec<TaskDescriptor>, ClientError>;

    /// Descriptor for one task.
    async fn task_metadata(&self, task_name: &str) -> Result<TaskDescriptor, ClientError>;

    /// Goal text for one task.
    async fn task_goal(&self, task_name: &str) -> Result<String, ClientError>;

    /// Initialize a task on the bound device. `Ok(false)` means the task
    /// declined to set up and nothing is active.
    async fn task_init(&mut self, task_name: &str) -> Result<bool, ClientError>;

    /// Evaluate the active task.
    async fn task_eval(&mut self) -> Result<EvaluationResult, ClientError>;

    /// Tear down the active task. Safe to call with none active.
    async fn task_tear_down(&mut self) -> Result<(), ClientError>;

    /// Execute one action and return the resulting observation.
    async fn execute_action(&mut self, action: &Action) -> Result<Observation, ClientError>;

    /// Capture the current screen.
    async fn observe(&self) -> Result<Screenshot, ClientError>;

    /// Switch the server's suite family. Returns whether it switched.
    async fn switch_suite_family(&mut self, target: &str) -> Result<bool, ClientError>;
}

/// HTTP client for the environment server.
pub struct EnvClient {
    http: reqwest::Client,
    base_url: String,
    device: String,
    /// Whether tasks tagged `agent-mcp` show up in `task_list`.
    mcp_enabled: bool,
    initialized: bool,
}

#[derive(Deserialize)]
struct ScreenshotResponse {
    screenshot: String,
}

#[derive(Deserialize)]
struct TaskInitResponse {
    initialized: bool,
}

#[derive(Deserialize)]
struct GoalResponse {
    goal: String,
}

#[derive(Deserialize)]
struct SwitchResponse {
    switched: bool,
}

#[derive(Deserialize)]
struct HealthResponse {
    ok: bool,
}

#[derive(Deserialize)]
struct ApiError {
    error: String,
}

impl EnvClient {
    /// Build a client for one device behind `base_url`.
    pub fn new(base_url: impl Into<String>, device: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            device: device.into(),
            mcp_enabled: false,
            initialized: false,
        })
    }

    /// Include `agent-mcp` tasks in listings.
    pub fn with_mcp_enabled(mut self, enabled: bool) -> Self {
        self.mcp_enabled = enabled;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ApiError>().await {
                Ok(body) => body.error,
                Err(_) => status.to_string(),
            };
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ClientError> {
        let response = self.http.post(self.url(path)).json(&body).send().await?;
        Self::decode(response).await
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let response = self.http.get(self.url(path)).query(query).send().await?;
        Self::decode(response).await
    }
}

#[async_trait]
impl Env for EnvClient {
    fn device(&self) -> &str {
        &self.device
    }

    async fn bind(&self) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .post("/init", json!({ "req_device": self.device }))
            .await?;
        Ok(())
    }

    async fn health(&self) -> Result<bool, ClientError> {
        let response: HealthResponse = self.get("/health", &[]).await?;
        Ok(response.ok)
    }

    async fn task_list(&self) -> Result<Vec<TaskDescriptor>, ClientError> {
        let descriptors: Vec<TaskDescriptor> = self.get("/task/list", &[]).await?;
        Ok(descriptors
            .into_iter()
            .filter(|d| self.mcp_enabled || !d.has_tag("agent-mcp"))
            .collect())
    }

    async fn task_metadata(&self, task_name: &str) -> Result<TaskDescriptor, ClientError> {
        self.get("/task/metadata", &[("task_name", task_name)]).await
    }

    async fn task_goal(&self, task_name: &str) -> Result<String, ClientError> {
        let response: GoalResponse = self.get("/task/goal", &[("task_name", task_name)]).await?;
        Ok(response.goal)
    }

    async fn task_init(&mut self, task_name: &str) -> Result<bool, ClientError> {
        let response: TaskInitResponse = self
            .post(
                "/task/init",
                json!({ "task_name": task_name, "req_device": self.device }),
            )
            .await?;
        self.initialized = response.initialized;
        debug!(task = %task_name, initialized = response.initialized, "Task init");
        Ok(response.initialized)
    }

    async fn task_eval(&mut self) -> Result<EvaluationResult, ClientError> {
        if !self.initialized {
            return Err(ClientError::NotInitialized);
        }
        self.post("/task/eval", json!({ "req_device": self.device }))
            .await
    }

    async fn task_tear_down(&mut self) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .post("/task/tear_down", json!({ "req_device": self.device }))
            .await?;
        self.initialized = false;
        Ok(())
    }

    async fn execute_action(&mut self, action: &Action) -> Result<Observation, ClientError> {
        self.post(
            "/step",
            json!({ "req_device": self.device, "action": action }),
        )
        .await
    }

    async fn observe(&self) -> Result<Screenshot, ClientError> {
        let mut last_error = None;
        for attempt in 0..SCREENSHOT_RETRIES {
            match self
                .get::<ScreenshotResponse>("/screenshot", &[("req_device", &self.device)])
                .await
            {
                Ok(response) => {
                    return Ok(Screenshot {
                        b64_png: response.screenshot,
                    })
                }
                Err(error) => {
                    warn!(attempt, error = %error, "Screenshot failed, retrying");
                    last_error = Some(error);
                    tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                }
            }
        }
        Err(last_error.unwrap_or(ClientError::Decode("screenshot unavailable".to_string())))
    }

    async fn switch_suite_family(&mut self, target: &str) -> Result<bool, ClientError> {
        let raw = self
            .http
            .post(self.url("/suite_family/switch"))
            .query(&[("target_family", target)])
            .send()
            .await?;
        let response: SwitchResponse = Self::decode(raw).await?;
        if response.switched {
            // Anything active before the switch is gone.
            self.initialized = false;
        }
        Ok(response.switched)
    }
}
