use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use planner::{CompileError, DriverRegistry, RunQ};

const TEST_SUFFIX: &str = ".test.flowl";

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// If true, the test expects parsing to fail.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// Expected parse or build error: its message must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// Node names of every stage, each chain in link order.
    #[serde(default)]
    pub expect_stages: Option<Vec<Vec<String>>>,

    /// Resolved arguments of the first scheduled node with each name.
    #[serde(default)]
    pub expect_args: BTreeMap<String, BTreeMap<String, String>>,
}

/// Split a `.test.flowl` file into its TOML front matter and flowl source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let body = content
        .trim_start_matches('\u{feff}')
        .strip_prefix("---")
        .ok_or("front matter must open with ---")?
        .trim_start_matches(['\r', '\n']);
    let (front, rest) = body
        .split_once("\n---")
        .ok_or("front matter must close with ---")?;
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);
    let config = toml::from_str(front.trim_end_matches('\r'))
        .map_err(|e| format!("invalid front matter: {}", e))?;
    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    debug!("Running {}", path.display());
    let (description, outcome) = match std::fs::read_to_string(path) {
        Err(e) => (None, TestOutcome::Fail(format!("cannot read file: {}", e))),
        Ok(content) => match parse_test_file(&content) {
            Err(e) => (None, TestOutcome::Fail(format!("frontmatter error: {}", e))),
            Ok((config, source)) => {
                let outcome = match check(&config, source) {
                    Ok(()) => TestOutcome::Pass,
                    Err(reason) => TestOutcome::Fail(reason),
                };
                (config.description, outcome)
            }
        },
    };
    TestResult {
        path: path.to_path_buf(),
        description,
        outcome,
    }
}

/// Compile `source` and compare the result with the expectations.
fn check(config: &TestConfig, source: &str) -> Result<(), String> {
    let result = planner::compile(source, 0, &DriverRegistry::default());

    if config.expect_parse_error {
        return match result {
            Err(CompileError::Parse(_)) => Ok(()),
            Err(CompileError::Plan(e)) => {
                Err(format!("expected parse error, got build error: {}", e))
            }
            Ok(_) => Err("expected parse error, but parsing succeeded".into()),
        };
    }

    let q = match (&config.expect_error, result) {
        (Some(expected), Err(e)) => {
            let message = e.to_string();
            return if message.contains(expected.as_str()) {
                Ok(())
            } else {
                Err(format!(
                    "expected error containing \"{}\", got: {}",
                    expected, message
                ))
            };
        }
        (Some(expected), Ok(_)) => {
            return Err(format!(
                "expected error containing \"{}\", but compiling succeeded",
                expected
            ));
        }
        (None, Err(e)) => return Err(format!("unexpected error: {}", e)),
        (None, Ok(q)) => q,
    };

    if let Some(expected) = &config.expect_stages {
        let actual = stage_names(&q);
        if &actual != expected {
            return Err(format!(
                "stage mismatch\n  expected: {:?}\n  actual:   {:?}",
                expected, actual
            ));
        }
    }

    for (name, expected) in &config.expect_args {
        let Some((_, id, _)) = q.iter_nodes().find(|(_, _, node)| node.name() == name.as_str()) else {
            return Err(format!("no scheduled node named '{}'", name));
        };
        let actual = q
            .args(id)
            .map_err(|e| format!("args of '{}': {}", name, e))?;
        if &actual != expected {
            return Err(format!(
                "args mismatch for '{}'\n  expected: {:?}\n  actual:   {:?}",
                name, expected, actual
            ));
        }
    }

    Ok(())
}

fn stage_names(q: &RunQ) -> Vec<Vec<String>> {
    q.iter_stages()
        .map(|(_, chain)| chain.map(|(_, node)| node.name().to_string()).collect())
        .collect()
}

/// `.test.flowl` files under `root`, keyed by their directory relative to
/// `root` ("" for `root` itself), each list sorted.
fn discover(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut found: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for path in entries.flatten().map(|entry| entry.path()) {
            if path.is_dir() {
                pending.push(path);
            } else if is_test_file(&path) {
                found.entry(category_of(root, &dir)).or_default().push(path);
            }
        }
    }
    found.values_mut().for_each(|files| files.sort());
    found
}

fn is_test_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(TEST_SUFFIX))
}

fn category_of(root: &Path, dir: &Path) -> String {
    let Ok(rel) = dir.strip_prefix(root) else {
        return String::new();
    };
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("{} is a single test file", path.display());
        return;
    }
    let found = discover(path);
    if found.is_empty() {
        eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
        return;
    }
    eprintln!("categories in {}:", path.display());
    for (category, files) in &found {
        eprintln!("  {:<16} {} tests", category_label(category), files.len());
    }
}

/// Wrap `text` in an ANSI SGR code unless colours are off.
fn paint(text: &str, sgr: &str, no_color: bool) -> String {
    if no_color {
        text.to_string()
    } else {
        format!("\x1b[{}m{}\x1b[0m", sgr, text)
    }
}

fn label(result: &TestResult) -> &str {
    result.description.as_deref().unwrap_or_else(|| {
        result
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(TEST_SUFFIX))
            .unwrap_or("?")
    })
}

/// Run every `.test.flowl` file under `path`, or `path` itself when it is a
/// file. A non-empty `categories` restricts the run to those sub-directories.
/// Returns the process exit code.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let selected = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        let found = discover(path);
        if found.is_empty() {
            eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
            return 1;
        }
        select_categories(found, categories)
    };
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();
    for (category, files) in &selected {
        if !path.is_file() {
            eprintln!();
            eprintln!("{}", paint(category_label(category), "1", no_color));
        }
        for file in files {
            let result = run_single_test(file);
            let status = match result.outcome {
                TestOutcome::Pass => paint("PASS", "32", no_color),
                TestOutcome::Fail(_) => paint("FAIL", "31", no_color),
            };
            eprintln!("  {}  {}", status, label(&result));
            match result.outcome {
                TestOutcome::Pass => passed += 1,
                TestOutcome::Fail(_) => failures.push(result),
            }
        }
    }

    for failure in &failures {
        if let TestOutcome::Fail(reason) = &failure.outcome {
            eprintln!();
            eprintln!("  {} {}:", paint("failed", "31", no_color), failure.path.display());
            reason.lines().for_each(|line| eprintln!("    {}", line));
        }
    }

    let failed = failures.len();
    eprintln!();
    if failed == 0 {
        eprintln!("test result: {}. {} passed", paint("ok", "32", no_color), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed",
            paint("FAILED", "31", no_color),
            passed,
            failed
        );
        1
    }
}

/// The requested categories and everything nested below them, or `found`
/// unchanged when nothing was requested.
fn select_categories(
    found: BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<String, Vec<PathBuf>> {
    if requested.is_empty() {
        return found;
    }
    let wanted: Vec<&str> = requested.iter().map(|r| r.trim_matches('/')).collect();
    for req in &wanted {
        let known = found
            .keys()
            .any(|cat| cat == req || cat.starts_with(&format!("{}/", req)));
        if !known {
            let available: Vec<&str> = found.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                available.join(", ")
            );
        }
    }
    found
        .into_iter()
        .filter(|(cat, _)| {
            wanted
                .iter()
                .any(|req| cat == req || cat.starts_with(&format!("{}/", req)))
        })
        .collect()
}
