use std::fmt;

use crate::error::BuildError;

/// Where a loaded function lives: `<kind>:<path>`, known by the path's last segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub kind: String,
    pub path: String,
    pub name: String,
}

impl Location {
    /// Split a `load` locator at its first `:`.
    pub fn parse(locator: &str) -> Result<Self, BuildError> {
        let malformed = || BuildError::MalformedLocator(locator.to_string());
        let (kind, path) = locator.split_once(':').ok_or_else(malformed)?;
        let name = base_name(path);
        if kind.is_empty() || name.is_empty() {
            return Err(malformed());
        }
        Ok(Location {
            kind: kind.to_string(),
            path: path.to_string(),
            name: name.to_string(),
        })
    }

    /// The key drivers are created from.
    pub fn locator(&self) -> String {
        format!("{}:{}", self.kind, self.path)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.kind, self.path)
    }
}

/// Last `/`-separated segment of `path`, ignoring trailing slashes.
pub(crate) fn base_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_locators() {
        let loc = Location::parse("cmd:/usr/bin/sleep").unwrap();
        assert_eq!(loc.kind, "cmd");
        assert_eq!(loc.path, "/usr/bin/sleep");
        assert_eq!(loc.name, "sleep");
        assert_eq!(loc.locator(), "cmd:/usr/bin/sleep");

        assert_eq!(Location::parse("file:///root/action1").unwrap().name, "action1");
        let http = Location::parse("http://localhost:8080/action2").unwrap();
        assert_eq!(http.kind, "http");
        assert_eq!(http.path, "//localhost:8080/action2");
        assert_eq!(http.name, "action2");
        assert_eq!(Location::parse("go:print/").unwrap().name, "print");
    }

    #[test]
    fn malformed_locators() {
        for locator in ["action4", ":/bin/echo", "cmd:", "cmd:/"] {
            assert_eq!(
                Location::parse(locator),
                Err(BuildError::MalformedLocator(locator.to_string())),
                "{}",
                locator
            );
        }
    }
}
