//! Single-episode driver.

use std::time::Duration;

use tracing::{debug, info, warn};

use mobench_client::{ClientError, Env};
use mobench_core::Observation;

use crate::agent::Agent;
use crate::report::TaskRecord;

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum actions per episode before forced evaluation.
    pub max_steps: u32,

    /// Health probes before an unresponsive environment is declared evicted.
    pub health_retry_budget: u32,

    /// Whether a task interrupted by eviction gets one more attempt on
    /// another environment.
    pub reschedule_on_eviction: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_steps: 15,
            health_retry_budget: 3,
            reschedule_on_eviction: true,
        }
    }
}

/// How one episode ended.
#[derive(Debug)]
pub enum EpisodeOutcome {
    /// The episode produced a record (pass, fail, or absorbed error).
    Completed(TaskRecord),

    /// The environment stopped answering; the task did not finish.
    Evicted,
}

/// Probe an environment after a transport failure. Returns true when it no
/// longer answers within the retry budget.
async fn is_evicted(env: &mut dyn Env, budget: u32) -> bool {
    let budget = budget.max(1);
    for attempt in 0..budget {
        if matches!(env.health().await, Ok(true)) {
            return false;
        }
        if attempt + 1 < budget {
            tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
        }
    }
    true
}

/// Run one task episode: init, step loop, evaluate, tear down.
///
/// Environment errors never propagate. A transport failure on a healthy
/// environment is absorbed into a zero-score record; one on a dead
/// environment becomes [`EpisodeOutcome::Evicted`] so the caller can
/// reschedule.
pub async fn run_single_task(
    env: &mut dyn Env,
    agent: &mut dyn Agent,
    task_name: &str,
    config: &RunnerConfig,
) -> EpisodeOutcome {
    let goal = match env.task_goal(task_name).await {
        Ok(goal) => goal,
        Err(error) => return absorb(env, task_name, 0, error, config).await,
    };
    agent.reset(&goal).await;
    info!(task = %task_name, device = %env.device(), "Episode started");

    match env.task_init(task_name).await {
        Ok(true) => {}
        Ok(false) => {
            let _ = env.task_tear_down().await;
            return EpisodeOutcome::Completed(TaskRecord::failed(
                task_name,
                "task setup declined",
            ));
        }
        Err(error) => {
            // The server may have stored the task before the call failed
            // (e.g. a client-side timeout); free the slot before returning.
            let _ = env.task_tear_down().await;
            return absorb(env, task_name, 0, error, config).await;
        }
    }

    let mut steps = 0u32;
    let mut failure: Option<String> = None;

    let mut observation = match env.observe().await {
        Ok(screenshot) => Observation::from_screenshot(screenshot),
        Err(error) => {
            let _ = env.task_tear_down().await;
            return absorb(env, task_name, steps, error, config).await;
        }
    };

    while steps < config.max_steps {
        let prediction = match agent.predict(&observation).await {
            Ok(prediction) => prediction,
            Err(error) => {
                failure = Some(format!("agent error: {error}"));
                break;
            }
        };
        debug!(
            step = steps + 1,
            action = prediction.action.kind(),
            rationale = %prediction.rationale,
            "Executing action"
        );

        let next = match env.execute_action(&prediction.action).await {
            Ok(observation) => observation,
            Err(error) => {
                if is_evicted(env, config.health_retry_budget).await {
                    warn!(task = %task_name, "Environment evicted mid-episode");
                    return EpisodeOutcome::Evicted;
                }
                failure = Some(format!("action failed: {error}"));
                steps += 1;
                break;
            }
        };
        steps += 1;

        if prediction.action.is_terminal() {
            break;
        }
        observation = next;
    }

    let record = match failure {
        Some(reason) => TaskRecord {
            task_name: task_name.to_string(),
            score: 0.0,
            reason: Some(reason),
            steps,
        },
        None => match env.task_eval().await {
            Ok(result) => TaskRecord {
                task_name: task_name.to_string(),
                score: result.score,
                reason: result.reason,
                steps,
            },
            Err(error) => TaskRecord {
                task_name: task_name.to_string(),
                score: 0.0,
                reason: Some(format!("evaluation failed: {error}")),
                steps,
            },
        },
    };

    // Best-effort: the record stands even if teardown fails.
    if let Err(error) = env.task_tear_down().await {
        warn!(task = %task_name, error = %error, "Teardown failed");
    }

    info!(
        task = %task_name,
        score = record.score,
        steps = record.steps,
        "Episode finished"
    );
    EpisodeOutcome::Completed(record)
}

async fn absorb(
    env: &mut dyn Env,
    task_name: &str,
    steps: u32,
    error: ClientError,
    config: &RunnerConfig,
) -> EpisodeOutcome {
    if is_evicted(env, config.health_retry_budget).await {
        warn!(task = %task_name, "Environment evicted");
        return EpisodeOutcome::Evicted;
    }
    EpisodeOutcome::Completed(TaskRecord {
        task_name: task_name.to_string(),
        score: 0.0,
        reason: Some(error.to_string()),
        steps,
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use mobench_core::{
        Action, EvaluationResult, Screenshot, TaskDescriptor, ToolCallResult,
    };

    use crate::agent::ReplayAgent;

    use super::*;

    /// Scripted environment for episode tests.
    struct FakeEnv {
        init_result: Result<bool, ()>,
        eval_score: f64,
        healthy: bool,
        executed: Vec<String>,
        eval_calls: u32,
        teardown_calls: u32,
    }

    impl FakeEnv {
        fn new() -> Self {
            Self {
                init_result: Ok(true),
                eval_score: 1.0,
                healthy: true,
                executed: Vec::new(),
                eval_calls: 0,
                teardown_calls: 0,
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
            Ok(self.healthy)
        }

        async fn task_list(&self) -> Result<Vec<TaskDescriptor>, ClientError> {
            Ok(vec![])
        }

        async fn task_metadata(&self, _task_name: &str) -> Result<TaskDescriptor, ClientError> {
            Err(ClientError::NotInitialized)
        }

        async fn task_goal(&self, _task_name: &str) -> Result<String, ClientError> {
            Ok("do the thing".to_string())
        }

        async fn task_init(&mut self, _task_name: &str) -> Result<bool, ClientError> {
            self.init_result.map_err(|_| ClientError::NotInitialized)
        }

        async fn task_eval(&mut self) -> Result<EvaluationResult, ClientError> {
            self.eval_calls += 1;
            Ok(EvaluationResult::new(self.eval_score, None))
        }

        async fn task_tear_down(&mut self) -> Result<(), ClientError> {
            self.teardown_calls += 1;
            Ok(())
        }

        async fn execute_action(&mut self, action: &Action) -> Result<Observation, ClientError> {
            self.executed.push(action.kind().to_string());
            let mut observation = Observation::from_screenshot(Screenshot::empty());
            if let Action::Mcp { action_name, .. } = action {
                observation = observation.with_tool_call(ToolCallResult::Failure {
                    name: action_name.clone(),
                    message: "unknown tool".to_string(),
                });
            }
            Ok(observation)
        }

        async fn observe(&self) -> Result<Screenshot, ClientError> {
            Ok(Screenshot::empty())
        }

        async fn switch_suite_family(&mut self, _target: &str) -> Result<bool, ClientError> {
            Ok(false)
        }
    }

    fn quick_config() -> RunnerConfig {
        RunnerConfig {
            max_steps: 15,
            health_retry_budget: 1,
            reschedule_on_eviction: true,
        }
    }

    #[tokio::test]
    async fn test_finished_terminates_episode() {
        let mut env = FakeEnv::new();
        let mut agent = ReplayAgent::from_actions(vec![
            Action::NavigateHome,
            Action::Click { x: 5, y: 5 },
            Action::Finished,
        ]);

        let outcome =
            run_single_task(&mut env, &mut agent, "SimpleMessageTask", &quick_config()).await;

        let record = match outcome {
            EpisodeOutcome::Completed(record) => record,
            EpisodeOutcome::Evicted => panic!("unexpected eviction"),
        };
        assert_eq!(record.steps, 3);
        assert!((record.score - 1.0).abs() < f64::EPSILON);
        assert_eq!(env.eval_calls, 1);
        assert_eq!(env.teardown_calls, 1);
    }

    #[tokio::test]
    async fn test_setup_decline_scores_zero_and_tears_down() {
        let mut env = FakeEnv::new();
        env.init_result = Ok(false);
        let mut agent = ReplayAgent::from_actions(vec![Action::Finished]);

        let outcome =
            run_single_task(&mut env, &mut agent, "SimpleMessageTask", &quick_config()).await;

        let record = match outcome {
            EpisodeOutcome::Completed(record) => record,
            EpisodeOutcome::Evicted => panic!("unexpected eviction"),
        };
        assert_eq!(record.score, 0.0);
        assert!(record.reason.unwrap().contains("setup"));
        assert_eq!(env.eval_calls, 0);
        assert_eq!(env.teardown_calls, 1);
        // No actions ran.
        assert!(env.executed.is_empty());
    }

    #[tokio::test]
    async fn test_failed_init_on_healthy_env_still_tears_down() {
        let mut env = FakeEnv::new();
        env.init_result = Err(());
        let mut agent = ReplayAgent::from_actions(vec![Action::Finished]);

        let outcome =
            run_single_task(&mut env, &mut agent, "SimpleMessageTask", &quick_config()).await;

        let record = match outcome {
            EpisodeOutcome::Completed(record) => record,
            EpisodeOutcome::Evicted => panic!("unexpected eviction"),
        };
        assert_eq!(record.score, 0.0);
        assert_eq!(env.eval_calls, 0);
        // The device slot may hold the task despite the failed call.
        assert_eq!(env.teardown_calls, 1);
    }

    #[tokio::test]
    async fn test_failed_tool_call_does_not_abort_episode() {
        let mut env = FakeEnv::new();
        let mut agent = ReplayAgent::from_actions(vec![
            Action::Mcp {
                action_name: "no_such_tool".to_string(),
                action_json: json!({}),
            },
            Action::NavigateHome,
            Action::Finished,
        ]);

        let outcome =
            run_single_task(&mut env, &mut agent, "WebSearchRestaurantTask", &quick_config())
                .await;

        let record = match outcome {
            EpisodeOutcome::Completed(record) => record,
            EpisodeOutcome::Evicted => panic!("unexpected eviction"),
        };
        assert_eq!(record.steps, 3);
        assert_eq!(env.executed, vec!["mcp", "navigate_home", "finished"]);
    }

    #[tokio::test]
    async fn test_max_steps_forces_evaluation() {
        let mut env = FakeEnv::new();
        env.eval_score = 0.0;
        // Agent never finishes.
        let mut agent =
            ReplayAgent::from_actions(vec![Action::NavigateHome; 50]);
        let config = RunnerConfig {
            max_steps: 4,
            ..quick_config()
        };

        let outcome = run_single_task(&mut env, &mut agent, "SimpleAlarmTask", &config).await;

        let record = match outcome {
            EpisodeOutcome::Completed(record) => record,
            EpisodeOutcome::Evicted => panic!("unexpected eviction"),
        };
        assert_eq!(record.steps, 4);
        assert_eq!(env.eval_calls, 1);
        assert_eq!(env.teardown_calls, 1);
    }
}
