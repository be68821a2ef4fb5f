//! Clock tasks.

use std::collections::BTreeSet;

use async_trait::async_trait;

use mobench_controller::DeviceController;
use mobench_core::EvaluationResult;

use crate::helpers::parse_content_rows;
use crate::task::{Task, TaskError};

/// Set an alarm for a specific time.
pub struct SimpleAlarmTask;

/// 7:00 AM as minutes since midnight, the clock app's storage format.
const EXPECTED_ALARM_MINUTES: i64 = 7 * 60;

#[async_trait]
impl Task for SimpleAlarmTask {
    fn name(&self) -> &'static str {
        "SimpleAlarmTask"
    }

    fn goal(&self) -> &'static str {
        "Set an alarm for 7:00 AM tomorrow"
    }

    fn app_names(&self) -> BTreeSet<String> {
        ["Clock".to_string()].into()
    }

    fn tags(&self) -> BTreeSet<String> {
        ["lang-en".to_string()].into()
    }

    async fn check_success(
        &self,
        controller: &dyn DeviceController,
    ) -> Result<EvaluationResult, TaskError> {
        let response = controller
            .shell(&[
                "content",
                "query",
                "--uri",
                "content://org.fossify.clock/alarms",
                "--projection",
                "timeInMinutes:isEnabled",
            ])
            .await?;

        if !response.success {
            return Err(TaskError::Verification(format!(
                "Alarm query rejected: {}",
                response.message.unwrap_or_default()
            )));
        }

        let found = parse_content_rows(&response.message.unwrap_or_default())
            .iter()
            .any(|row| {
                row.get("timeInMinutes")
                    .and_then(|v| v.parse::<i64>().ok())
                    == Some(EXPECTED_ALARM_MINUTES)
                    && row.get("isEnabled").map(String::as_str) == Some("1")
            });

        if found {
            Ok(EvaluationResult::success("Alarm set successfully"))
        } else {
            Ok(EvaluationResult::failure(
                "Alarm not set or task not completed",
            ))
        }
    }
}
