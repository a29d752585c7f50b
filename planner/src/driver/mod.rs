pub mod cmd;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::debug;

use crate::error::DriverError;

pub use cmd::{CmdDriver, CmdFactory};

/// The callable behind a node. One driver belongs to exactly one node.
pub trait Driver: fmt::Debug + Send {
    /// Prepare the function before its first invocation.
    fn load(&mut self) -> Result<(), DriverError>;

    fn merge_args(&mut self, args: &BTreeMap<String, String>) -> Result<(), DriverError>;

    /// Call the function and return its named results.
    fn invoke(&mut self) -> Result<BTreeMap<String, String>, DriverError>;

    fn function_name(&self) -> &str;
}

/// Creates drivers of one kind, e.g. `cmd`.
pub trait DriverFactory: Send + Sync {
    fn kind(&self) -> &str;

    /// `None` when `path` cannot be served by this kind.
    fn create(&self, path: &str) -> Option<Box<dyn Driver>>;
}

/// Driver factories indexed by kind.
pub struct DriverRegistry {
    factories: HashMap<String, Box<dyn DriverFactory>>,
}

impl DriverRegistry {
    /// A registry with no kinds at all.
    pub fn empty() -> Self {
        DriverRegistry {
            factories: HashMap::new(),
        }
    }

    /// Add a factory, replacing any earlier one of the same kind.
    pub fn register(&mut self, factory: impl DriverFactory + 'static) -> &mut Self {
        debug!("Registered driver kind '{}'", factory.kind());
        self.factories
            .insert(factory.kind().to_string(), Box::new(factory));
        self
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Create a driver for a `<kind>:<path>` locator.
    pub fn create(&self, locator: &str) -> Option<Box<dyn Driver>> {
        let (kind, path) = locator.split_once(':')?;
        self.factories.get(kind)?.create(path)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        let mut registry = DriverRegistry::empty();
        registry.register(CmdFactory);
        registry
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_serves_cmd() {
        let registry = DriverRegistry::default();
        assert_eq!(registry.kinds(), vec!["cmd"]);
        let driver = registry.create("cmd:/usr/bin/sleep").unwrap();
        assert_eq!(driver.function_name(), "sleep");
    }

    #[test]
    fn unknown_kind_has_no_driver() {
        let registry = DriverRegistry::default();
        assert!(registry.create("go:/pkg/print").is_none());
        assert!(registry.create("nokind").is_none());
        assert!(DriverRegistry::empty().create("cmd:/bin/echo").is_none());
    }
}
