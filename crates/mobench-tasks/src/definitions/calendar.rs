//! Calendar tasks with simulated-user interaction.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tracing::info;

use mobench_controller::DeviceController;
use mobench_core::EvaluationResult;

use crate::helpers::{calendar_events, check_sms_sent, last_sent_email};
use crate::task::{Task, TaskError};

/// Receive a lunch invitation via SMS, reply, and schedule the event.
///
/// The goal text deliberately carries a wrong date; the correction arrives
/// only through `ask_user`, exercising the user-interaction path.
pub struct ScheduleLunchViaSmsTask {
    sender_phone: &'static str,
    sms_content: &'static str,
    expected_reply: &'static str,
}

impl ScheduleLunchViaSmsTask {
    pub fn new() -> Self {
        Self {
            sender_phone: "+15051234567",
            sms_content: "Hi! Would you like to join me for lunch tomorrow at 11 AM? \
                          It will be about an hour. Looking forward to it!",
            expected_reply: "OK",
        }
    }

    /// Expected event window: Oct 17 2025, 11:00-12:00 UTC.
    fn expected_window(&self) -> Result<(i64, i64), TaskError> {
        let window = Utc
            .with_ymd_and_hms(2025, 10, 17, 11, 0, 0)
            .single()
            .zip(Utc.with_ymd_and_hms(2025, 10, 17, 12, 0, 0).single())
            .ok_or_else(|| {
                TaskError::Verification("invalid expected event window".to_string())
            })?;
        Ok((window.0.timestamp(), window.1.timestamp()))
    }
}

impl Default for ScheduleLunchViaSmsTask {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Task for ScheduleLunchViaSmsTask {
    fn name(&self) -> &'static str {
        "ScheduleLunchViaSmsTask"
    }

    fn goal(&self) -> &'static str {
        "I've received a lunch invitation via text message; please reply \"OK\" and \
         schedule a lunch event ranging from 11 a.m. to 12 a.m. on Oct 16."
    }

    fn app_names(&self) -> BTreeSet<String> {
        ["Calendar".to_string(), "Messages".to_string()].into()
    }

    fn tags(&self) -> BTreeSet<String> {
        ["agent-user-interaction".to_string(), "lang-en".to_string()].into()
    }

    fn ask_user_reply(&self) -> Option<String> {
        Some(
            "I just gave the incorrect information by mistake, the time range should be \
             11 a.m. to 12 p.m. on Oct 17."
                .to_string(),
        )
    }

    async fn setup(&mut self, controller: &dyn DeviceController) -> Result<bool, TaskError> {
        info!(sender = %self.sender_phone, "Injecting lunch invitation SMS");
        let response = controller
            .shell(&[
                "am",
                "broadcast",
                "-a",
                "org.mobench.action.INJECT_SMS",
                "--es",
                "address",
                self.sender_phone,
                "--es",
                "body",
                self.sms_content,
            ])
            .await?;
        Ok(response.success)
    }

    async fn check_success(
        &self,
        controller: &dyn DeviceController,
    ) -> Result<EvaluationResult, TaskError> {
        if !check_sms_sent(controller, self.sender_phone, self.expected_reply).await? {
            return Ok(EvaluationResult::failure(format!(
                "SMS reply '{}' to {} not found",
                self.expected_reply, self.sender_phone
            )));
        }

        let events = calendar_events(controller).await?;
        let (start_ts, end_ts) = self.expected_window()?;
        let found = events
            .iter()
            .any(|event| event.start_ts == start_ts && event.end_ts == end_ts);

        if !found {
            return Ok(EvaluationResult::failure(format!(
                "Calendar event not found for Oct 17, 2025 11:00-12:00. \
                 Found {} total events.",
                events.len()
            )));
        }

        Ok(EvaluationResult::success("Success"))
    }
}

/// Check next week's schedule and email the meal companion about canceling.
pub struct CheckMealEventTask;

const CORRECT_RECIPIENT: &str = "sarah.martinez@greenfield.com";

#[async_trait]
impl Task for CheckMealEventTask {
    fn name(&self) -> &'static str {
        "CheckMealEventTask"
    }

    fn goal(&self) -> &'static str {
        "Check next week's schedule. If there is a meal with someone, email them to \
         ask if it can be canceled."
    }

    fn app_names(&self) -> BTreeSet<String> {
        [
            "Calendar".to_string(),
            "Mail".to_string(),
            "Contacts".to_string(),
        ]
        .into()
    }

    fn tags(&self) -> BTreeSet<String> {
        ["agent-user-interaction".to_string(), "lang-en".to_string()].into()
    }

    fn ask_user_reply(&self) -> Option<String> {
        Some(
            "The contact information for Sarah Martinez can be found in the Contacts app."
                .to_string(),
        )
    }

    async fn check_success(
        &self,
        controller: &dyn DeviceController,
    ) -> Result<EvaluationResult, TaskError> {
        let Some(email) = last_sent_email(controller).await? else {
            return Ok(EvaluationResult::failure("No email found"));
        };

        let to = email.to.to_lowercase();
        if to == CORRECT_RECIPIENT && !email.body.is_empty() {
            Ok(EvaluationResult::success("Success"))
        } else {
            Ok(EvaluationResult::failure(format!(
                "Email sent to wrong recipient: {to}, expected: {CORRECT_RECIPIENT}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use mobench_controller::ScriptedController;

    use super::*;

    #[tokio::test]
    async fn test_lunch_task_requires_reply_and_event() {
        let controller = ScriptedController::new("emulator-5554");
        let task = ScheduleLunchViaSmsTask::new();

        // No reply sent yet.
        let result = task.check_success(&controller).await.unwrap();
        assert!(result.reason.unwrap().contains("SMS reply"));

        controller
            .script_shell(
                "content query --uri content://sms/sent",
                "Row: 0 address=+15051234567, body=OK",
            )
            .await;
        // Reply present but no event.
        let result = task.check_success(&controller).await.unwrap();
        assert!(result.reason.unwrap().contains("Calendar event not found"));

        let (start_ts, end_ts) = task.expected_window().unwrap();
        controller
            .script_shell(
                "content query --uri content://com.android.calendar/events",
                format!(
                    "Row: 0 title=Lunch, dtstart={}, dtend={}",
                    start_ts * 1000,
                    end_ts * 1000
                ),
            )
            .await;
        assert!(task.check_success(&controller).await.unwrap().passed());
    }

    #[tokio::test]
    async fn test_lunch_setup_injects_sms() {
        let controller = ScriptedController::new("emulator-5554");
        let mut task = ScheduleLunchViaSmsTask::new();
        assert!(task.setup(&controller).await.unwrap());
        assert_eq!(controller.call_count("shell am broadcast").await, 1);
    }

    #[tokio::test]
    async fn test_meal_task_recipient_check() {
        let controller = ScriptedController::new("emulator-5554");
        let task = CheckMealEventTask;

        controller
            .script_shell(
                "content query --uri content://mail/sent",
                "Row: 0 to=wrong@person.com, body=Can we cancel?",
            )
            .await;
        let result = task.check_success(&controller).await.unwrap();
        assert!(result.reason.unwrap().contains("wrong recipient"));

        controller
            .script_shell(
                "content query --uri content://mail/sent",
                "Row: 0 to=Sarah.Martinez@greenfield.com, body=Can we cancel?",
            )
            .await;
        assert!(task.check_success(&controller).await.unwrap().passed());
    }

    #[test]
    fn test_ask_user_replies_present() {
        assert!(ScheduleLunchViaSmsTask::new().ask_user_reply().is_some());
        assert!(CheckMealEventTask.ask_user_reply().is_some());
    }
}
