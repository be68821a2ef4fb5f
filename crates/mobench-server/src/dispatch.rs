//! Maps one agent action to controller calls.

use tracing::debug;

use mobench_controller::{CommandResponse, ControllerError, DeviceController};
use mobench_core::Action;

/// Device-side outcome of dispatching one action.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// Device response for the gesture/command itself.
    pub response: CommandResponse,

    /// Simulated user reply, populated only for `ask_user`.
    pub ask_user_response: Option<String>,
}

impl DispatchOutcome {
    fn from_response(response: CommandResponse) -> Self {
        Self {
            response,
            ask_user_response: None,
        }
    }
}

/// Execute one action against a controller.
///
/// `ask_user_reply` is the active task's simulated-user line, threaded in by
/// the service layer. `mcp` actions are rejected here: tool calls are
/// resolved on the client side and never reach the device.
pub async fn execute_action(
    controller: &dyn DeviceController,
    action: &Action,
    ask_user_reply: Option<String>,
    settle_delay: std::time::Duration,
) -> Result<DispatchOutcome, ControllerError> {
    debug!(kind = action.kind(), "Dispatching action");

    let outcome = match action {
        Action::Click { x, y } => DispatchOutcome::from_response(controller.tap(*x, *y).await?),
        Action::DoubleTap { x, y } => {
            DispatchOutcome::from_response(controller.double_tap(*x, *y).await?)
        }
        Action::LongPress { x, y, duration_ms } => {
            DispatchOutcome::from_response(controller.long_press(*x, *y, *duration_ms).await?)
        }
        Action::Swipe {
            start_x,
            start_y,
            end_x,
            end_y,
        } => DispatchOutcome::from_response(
            controller.swipe(*start_x, *start_y, *end_x, *end_y).await?,
        ),
        Action::Drag {
            start_x,
            start_y,
            end_x,
            end_y,
        } => DispatchOutcome::from_response(
            controller.drag(*start_x, *start_y, *end_x, *end_y).await?,
        ),
        Action::Scroll { direction } => {
            DispatchOutcome::from_response(controller.scroll(*direction).await?)
        }
        Action::InputText { text } => {
            DispatchOutcome::from_response(controller.input_text(text).await?)
        }
        Action::OpenApp { app_name } => {
            DispatchOutcome::from_response(controller.open_app(app_name).await?)
        }
        Action::NavigateBack => DispatchOutcome::from_response(controller.navigate_back().await?),
        Action::NavigateHome => DispatchOutcome::from_response(controller.navigate_home().await?),
        Action::KeyboardEnter => {
            DispatchOutcome::from_response(controller.keyboard_enter().await?)
        }
        Action::Wait => {
            tokio::time::sleep(settle_delay).await;
            DispatchOutcome::from_response(CommandResponse::ok())
        }
        Action::AskUser { text } => {
            debug!(question = %text, "Agent asked the simulated user");
            DispatchOutcome {
                response: CommandResponse::ok(),
                ask_user_response: Some(ask_user_reply.unwrap_or_default()),
            }
        }
        Action::Answer { text } => {
            controller.record_answer(text).await;
            DispatchOutcome::from_response(CommandResponse::ok())
        }
        Action::Mcp { action_name, .. } => DispatchOutcome::from_response(
            CommandResponse::rejected(format!(
                "mcp action '{action_name}' must be resolved by the tool client"
            )),
        ),
        Action::Finished => DispatchOutcome::from_response(CommandResponse::ok()),
    };

    Ok(outcome)
}
