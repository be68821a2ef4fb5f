//! Name-to-task resolution per suite family.
//!
//! Tasks register through an explicit manifest of constructors instead of a
//! filesystem scan; the registry validates everything into immutable
//! descriptors up front, all-or-nothing.

use std::collections::BTreeMap;

use tracing::info;

use mobench_core::{ConfigError, SuiteFamily, TaskDescriptor};

use crate::definitions;
use crate::lifecycle::TaskInstance;
use crate::task::Task;

/// Constructor for one task definition.
pub type TaskCtor = fn() -> Box<dyn Task>;

/// Immutable name-to-descriptor mapping for one suite family.
#[derive(Debug)]
pub struct TaskRegistry {
    family: SuiteFamily,
    tasks: BTreeMap<String, TaskCtor>,
    descriptors: BTreeMap<String, TaskDescriptor>,
}

impl TaskRegistry {
    /// Build the registry for a suite family from its bundled manifest.
    pub fn discover(family: SuiteFamily) -> Result<Self, ConfigError> {
        let registry = Self::from_ctors(family, definitions::manifest(family))?;
        info!(
            family = %family,
            tasks = registry.len(),
            "Task registry populated"
        );
        Ok(registry)
    }

    /// Build a registry from an explicit constructor list.
    ///
    /// Fails on a duplicate name; no partial mapping is installed on failure.
    pub fn from_ctors(family: SuiteFamily, ctors: Vec<TaskCtor>) -> Result<Self, ConfigError> {
        let mut tasks = BTreeMap::new();
        let mut descriptors = BTreeMap::new();

        for ctor in ctors {
            let descriptor = ctor().descriptor();
            let name = descriptor.name.clone();
            if tasks.insert(name.clone(), ctor).is_some() {
                return Err(ConfigError::DuplicateTaskName {
                    family: family.to_string(),
                    name,
                });
            }
            descriptors.insert(name, descriptor);
        }

        Ok(Self {
            family,
            tasks,
            descriptors,
        })
    }

    /// Suite family this registry serves.
    pub fn family(&self) -> SuiteFamily {
        self.family
    }

    /// Construct a fresh instance of a registered task.
    pub fn get_task(&self, name: &str) -> Option<TaskInstance> {
        self.tasks.get(name).map(|ctor| TaskInstance::new(ctor()))
    }

    /// Descriptor of a registered task.
    pub fn descriptor(&self, name: &str) -> Option<&TaskDescriptor> {
        self.descriptors.get(name)
    }

    /// Whether a task name is registered.
    pub fn has_task(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Registered names in lexicographic order.
    pub fn list_tasks(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    /// All descriptors in name order.
    pub fn descriptors(&self) -> impl Iterator<Item = &TaskDescriptor> {
        self.descriptors.values()
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
