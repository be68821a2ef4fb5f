//! App-state verification helpers.
//!
//! Verification logic reads device state through content-provider queries on
//! the controller shell. Parsers are pure so they can be tested without a
//! device.

use std::collections::HashMap;

use mobench_controller::DeviceController;

use crate::task::TaskError;

/// One calendar event row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub title: String,
    /// Event start, unix seconds (UTC).
    pub start_ts: i64,
    /// Event end, unix seconds (UTC).
    pub end_ts: i64,
}

/// One sent email row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub body: String,
}

/// Check whether an SMS with the given body was sent to the given number.
pub async fn check_sms_sent(
    controller: &dyn DeviceController,
    phone_number: &str,
    content: &str,
) -> Result<bool, TaskError> {
    let response = controller
        .shell(&[
            "content",
            "query",
            "--uri",
            "content://sms/sent",
            "--projection",
            "address:body",
        ])
        .await?;

    if !response.success {
        return Err(TaskError::Verification(format!(
            "SMS query rejected: {}",
            response.message.unwrap_or_default()
        )));
    }

    let wanted_digits = digits(phone_number);
    let found = parse_content_rows(&response.message.unwrap_or_default())
        .iter()
        .any(|row| {
            let address = row.get("address").map(String::as_str).unwrap_or("");
            let body = row.get("body").map(String::as_str).unwrap_or("");
            digits(address).ends_with(&wanted_digits) && body.contains(content)
        });
    Ok(found)
}

/// All calendar events on the device.
pub async fn calendar_events(
    controller: &dyn DeviceController,
) -> Result<Vec<CalendarEvent>, TaskError> {
    let response = controller
        .shell(&[
            "content",
            "query",
            "--uri",
            "content://com.android.calendar/events",
            "--projection",
            "title:dtstart:dtend",
        ])
        .await?;

    if !response.success {
        return Err(TaskError::Verification(format!(
            "Calendar query rejected: {}",
            response.message.unwrap_or_default()
        )));
    }

    let events = parse_content_rows(&response.message.unwrap_or_default())
        .iter()
        .filter_map(|row| {
            Some(CalendarEvent {
                title: row.get("title").cloned().unwrap_or_default(),
                // Providers store millis; normalize to seconds.
                start_ts: row.get("dtstart")?.parse::<i64>().ok()? / 1000,
                end_ts: row.get("dtend")?.parse::<i64>().ok()? / 1000,
            })
        })
        .collect();
    Ok(events)
}

/// Most recent sent email, if any.
pub async fn last_sent_email(
    controller: &dyn DeviceController,
) -> Result<Option<SentEmail>, TaskError> {
    let response = controller
        .shell(&[
            "content",
            "query",
            "--uri",
            "content://mail/sent",
            "--projection",
            "to:body",
        ])
        .await?;

    if !response.success {
        return Err(TaskError::Verification(format!(
            "Mail query rejected: {}",
            response.message.unwrap_or_default()
        )));
    }

    let email = parse_content_rows(&response.message.unwrap_or_default())
        .last()
        .map(|row| SentEmail {
            to: row.get("to").cloned().unwrap_or_default(),
            body: row.get("body").cloned().unwrap_or_default(),
        });
    Ok(email)
}

/// Parse `content query` output into key-value rows.
///
/// Each row line looks like `Row: 0 address=+15551234, body=Hello`.
/// Values containing `, ` are not round-trippable through this format;
/// benchmark fixtures avoid them.
pub fn parse_content_rows(output: &str) -> Vec<HashMap<String, String>> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let rest = line.strip_prefix("Row:")?;
            // Skip the row index.
            let (_, fields) = rest.trim_start().split_once(' ')?;
            let mut row = HashMap::new();
            for field in fields.split(", ") {
                if let Some((key, value)) = field.split_once('=') {
                    row.insert(key.trim().to_string(), value.to_string());
                }
            }
            Some(row)
        })
        .collect()
}

fn digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use mobench_controller::ScriptedController;

    use super::*;

    #[test]
    fn test_parse_content_rows() {
        let output = "Row: 0 address=+15555678, body=Hello World\nRow: 1 address=911, body=no\n";
        let rows = parse_content_rows(output);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["address"], "+15555678");
        assert_eq!(rows[0]["body"], "Hello World");
    }

    #[test]
    fn test_parse_ignores_non_row_lines() {
        let rows = parse_content_rows("No result found.\n");
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_check_sms_sent_matches_digits() {
        let controller = ScriptedController::new("emulator-5554");
        controller
            .script_shell(
                "content query --uri content://sms/sent",
                "Row: 0 address=+15555678, body=Hello World",
            )
            .await;

        assert!(check_sms_sent(&controller, "555-5678", "Hello World")
            .await
            .unwrap());
        assert!(!check_sms_sent(&controller, "555-0000", "Hello World")
            .await
            .unwrap());
        assert!(!check_sms_sent(&controller, "555-5678", "Goodbye")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_calendar_events_parse_millis() {
        let controller = ScriptedController::new("emulator-5554");
        controller
            .script_shell(
                "content query --uri content://com.android.calendar/events",
                "Row: 0 title=Lunch, dtstart=1760698800000, dtend=1760702400000",
            )
            .await;

        let events = calendar_events(&controller).await.unwrap();
        assert_eq!(
            events,
            vec![CalendarEvent {
                title: "Lunch".to_string(),
                start_ts: 1760698800,
                end_ts: 1760702400,
            }]
        );
    }

    #[tokio::test]
    async fn test_last_sent_email_empty() {
        let controller = ScriptedController::new("emulator-5554");
        assert_eq!(last_sent_email(&controller).await.unwrap(), None);
    }
}
