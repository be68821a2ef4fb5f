//! Messaging tasks.

use std::collections::BTreeSet;

use async_trait::async_trait;

use mobench_controller::DeviceController;
use mobench_core::EvaluationResult;

use crate::helpers::check_sms_sent;
use crate::task::{Task, TaskError};

/// Send a text message to a contact.
pub struct SimpleMessageTask;

const MESSAGE_RECIPIENT: &str = "555-5678";
const MESSAGE_BODY: &str = "Hello World";

#[async_trait]
impl Task for SimpleMessageTask {
    fn name(&self) -> &'static str {
        "SimpleMessageTask"
    }

    fn goal(&self) -> &'static str {
        "Send a text message 'Hello World' to contact '555-5678'"
    }

    fn app_names(&self) -> BTreeSet<String> {
        ["Messages".to_string()].into()
    }

    fn tags(&self) -> BTreeSet<String> {
        ["lang-en".to_string()].into()
    }

    async fn check_success(
        &self,
        controller: &dyn DeviceController,
    ) -> Result<EvaluationResult, TaskError> {
        if check_sms_sent(controller, MESSAGE_RECIPIENT, MESSAGE_BODY).await? {
            Ok(EvaluationResult::success("Message sent successfully"))
        } else {
            Ok(EvaluationResult::failure(
                "Message not sent or task not completed",
            ))
        }
    }
}

/// Find a restaurant through the web-search tool and text it to a contact.
///
/// Tagged `agent-mcp`: the MCP client narrows its tool map to the servers
/// named by the `MCP-` app entries before this task starts.
pub struct WebSearchRestaurantTask;

#[async_trait]
impl Task for WebSearchRestaurantTask {
    fn name(&self) -> &'static str {
        "WebSearchRestaurantTask"
    }

    fn goal(&self) -> &'static str {
        "Search the web for a well-reviewed pizza restaurant nearby and text its name to '555-5678'"
    }

    fn app_names(&self) -> BTreeSet<String> {
        ["Messages".to_string(), "MCP-search".to_string()].into()
    }

    fn tags(&self) -> BTreeSet<String> {
        ["lang-en".to_string(), "agent-mcp".to_string()].into()
    }

    async fn check_success(
        &self,
        controller: &dyn DeviceController,
    ) -> Result<EvaluationResult, TaskError> {
        if check_sms_sent(controller, "555-5678", "").await? {
            Ok(EvaluationResult::success("Restaurant name sent"))
        } else {
            Ok(EvaluationResult::failure("No message sent to 555-5678"))
        }
    }
}
