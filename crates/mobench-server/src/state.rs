//! Shared application state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use mobench_controller::DeviceController;
use mobench_core::{ConfigError, SuiteFamily};
use mobench_tasks::{TaskInstance, TaskRegistry};

/// One registered environment: its controller and the task currently
/// occupying it, if any.
///
/// The slot mutex serializes everything that touches one device, which is
/// what makes the single-task-per-environment invariant hold.
pub struct DeviceSlot {
    /// Controller bound to this device.
    pub controller: Arc<dyn DeviceController>,

    /// The active task instance; `None` between tasks.
    pub active: Option<TaskInstance>,
}

/// Shared application state.
///
/// Lock order: `registry` before a slot mutex. Task initialization holds the
/// registry read guard for its full duration, so a suite-family switch
/// (which takes the write guard) is serialized against in-flight
/// discover/get-task/initialize calls.
pub struct AppState {
    /// Currently selected suite family.
    pub suite_family: RwLock<SuiteFamily>,

    /// Registry for the current suite family.
    pub registry: RwLock<TaskRegistry>,

    /// Registered devices, each behind its own mutex.
    pub devices: RwLock<HashMap<String, Arc<Mutex<DeviceSlot>>>>,

    /// Delay before post-action screenshots, letting the UI settle.
    pub settle_delay: Duration,
}

impl AppState {
    /// Build state for a suite family. Registry discovery failures are
    /// startup-fatal.
    pub fn new(family: SuiteFamily) -> Result<Arc<Self>, ConfigError> {
        let registry = TaskRegistry::discover(family)?;
        Ok(Arc::new(Self {
            suite_family: RwLock::new(family),
            registry: RwLock::new(registry),
            devices: RwLock::new(HashMap::new()),
            settle_delay: Duration::from_millis(1000),
        }))
    }

    /// Register a device controller under its device id.
    pub async fn register_device(&self, controller: Arc<dyn DeviceController>) {
        let device = controller.device_id().to_string();
        let slot = Arc::new(Mutex::new(DeviceSlot {
            controller,
            active: None,
        }));
        self.devices.write().await.insert(device, slot);
    }

    /// Look up a device slot.
    pub async fn slot(&self, device: &str) -> Option<Arc<Mutex<DeviceSlot>>> {
        self.devices.read().await.get(device).cloned()
    }

    /// Number of registered devices.
    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }
}
