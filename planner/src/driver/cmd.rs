use std::collections::BTreeMap;

use log::debug;

use crate::driver::{Driver, DriverFactory};
use crate::error::DriverError;
use crate::location::base_name;

/// Driver for `cmd:<path>` functions. Invocation is not wired to a process
/// runner yet and returns no results.
#[derive(Debug)]
pub struct CmdDriver {
    path: String,
    function: String,
    args: BTreeMap<String, String>,
    loaded: bool,
}

impl CmdDriver {
    pub fn new(path: &str) -> Option<Self> {
        let function = base_name(path);
        if function.is_empty() {
            return None;
        }
        Some(CmdDriver {
            path: path.to_string(),
            function: function.to_string(),
            args: BTreeMap::new(),
            loaded: false,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn args(&self) -> &BTreeMap<String, String> {
        &self.args
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

impl Driver for CmdDriver {
    fn load(&mut self) -> Result<(), DriverError> {
        self.loaded = true;
        Ok(())
    }

    fn merge_args(&mut self, args: &BTreeMap<String, String>) -> Result<(), DriverError> {
        self.args
            .extend(args.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    fn invoke(&mut self) -> Result<BTreeMap<String, String>, DriverError> {
        if !self.loaded {
            return Err(DriverError::Invoke(format!("{} is not loaded", self.path)));
        }
        debug!("cmd {} {:?}", self.path, self.args);
        Ok(BTreeMap::new())
    }

    fn function_name(&self) -> &str {
        &self.function
    }
}

pub struct CmdFactory;

impl DriverFactory for CmdFactory {
    fn kind(&self) -> &str {
        "cmd"
    }

    fn create(&self, path: &str) -> Option<Box<dyn Driver>> {
        CmdDriver::new(path).map(|d| Box::new(d) as Box<dyn Driver>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_then_invoke() {
        let mut driver = CmdDriver::new("/usr/bin/sleep").unwrap();
        assert!(driver.invoke().is_err());

        driver.load().unwrap();
        let mut args = BTreeMap::new();
        args.insert("time".to_string(), "1s".to_string());
        driver.merge_args(&args).unwrap();
        args.insert("time".to_string(), "2s".to_string());
        driver.merge_args(&args).unwrap();

        assert_eq!(driver.args().get("time").map(String::as_str), Some("2s"));
        assert!(driver.invoke().unwrap().is_empty());
        assert_eq!(driver.path(), "/usr/bin/sleep");
        assert!(driver.is_loaded());
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(CmdDriver::new("").is_none());
        assert!(CmdFactory.create("/").is_none());
    }
}
