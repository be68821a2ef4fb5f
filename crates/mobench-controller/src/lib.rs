//! Device controllers: the synchronous-facing action interface to one
//! emulated device, plus snapshot and health management.
//!
//! The [`DeviceController`] trait is the seam between the benchmark engine
//! and the device transport. [`AdbController`] drives a real emulator through
//! the `adb` binary; `ScriptedController` (behind the `mock` feature) serves
//! tests.

pub mod adb;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod traits;

pub use adb::AdbController;
pub use error::{CommandResponse, ControllerError};
#[cfg(any(test, feature = "mock"))]
pub use mock::ScriptedController;
pub use traits::DeviceController;
