//! Bundled task definitions and the per-family manifest.
//!
//! Registration is explicit: each suite family maps to a fixed list of task
//! constructors, validated by the registry at discovery time.

pub mod alarm;
pub mod calendar;
pub mod contacts;
pub mod messages;
pub mod settings;

use mobench_core::SuiteFamily;

use crate::registry::TaskCtor;

/// Task constructors bundled for a suite family.
pub fn manifest(family: SuiteFamily) -> Vec<TaskCtor> {
    match family {
        SuiteFamily::MobileWorld => vec![
            || Box::new(calendar::ScheduleLunchViaSmsTask::new()),
            || Box::new(calendar::CheckMealEventTask),
            || Box::new(messages::WebSearchRestaurantTask),
        ],
        SuiteFamily::AndroidWorld => vec![
            || Box::new(messages::SimpleMessageTask),
            || Box::new(alarm::SimpleAlarmTask),
            || Box::new(contacts::SimpleContactTask),
            || Box::new(settings::WifiEnableTask),
            || Box::new(settings::BrightnessTask),
        ],
    }
}
