//! Contacts tasks.

use std::collections::BTreeSet;

use async_trait::async_trait;

use mobench_controller::DeviceController;
use mobench_core::EvaluationResult;

use crate::helpers::parse_content_rows;
use crate::task::{Task, TaskError};

/// Add a new contact with a name and phone number.
pub struct SimpleContactTask;

const CONTACT_NAME: &str = "John Doe";
const CONTACT_PHONE: &str = "555-1234";

#[async_trait]
impl Task for SimpleContactTask {
    fn name(&self) -> &'static str {
        "SimpleContactTask"
    }

    fn goal(&self) -> &'static str {
        "Add a new contact named 'John Doe' with phone number '555-1234'"
    }

    fn app_names(&self) -> BTreeSet<String> {
        ["Contacts".to_string()].into()
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
                "content://com.android.contacts/data/phones",
                "--projection",
                "display_name:data1",
            ])
            .await?;

        if !response.success {
            return Err(TaskError::Verification(format!(
                "Contacts query rejected: {}",
                response.message.unwrap_or_default()
            )));
        }

        let wanted_digits: String = CONTACT_PHONE
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        let found = parse_content_rows(&response.message.unwrap_or_default())
            .iter()
            .any(|row| {
                let name = row.get("display_name").map(String::as_str).unwrap_or("");
                let number: String = row
                    .get("data1")
                    .map(String::as_str)
                    .unwrap_or("")
                    .chars()
                    .filter(char::is_ascii_digit)
                    .collect();
                name == CONTACT_NAME && number.ends_with(&wanted_digits)
            });

        if found {
            Ok(EvaluationResult::success("Contact created"))
        } else {
            Ok(EvaluationResult::failure(format!(
                "Contact '{CONTACT_NAME}' with number '{CONTACT_PHONE}' not found"
            )))
        }
    }
}
