use std::fmt;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use flowl::{ParseError, ResolveError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Two `load`s share a function base name.
    DuplicateLoad(String),
    /// A `load` locator without a `<driver>:<path>` shape.
    MalformedLocator(String),
    FunctionNotLoaded(String),
    /// No driver factory for the locator's kind.
    DriverNotFound(String),
    /// `fn x = x`
    SelfReference(String),
    /// Two `fn` blocks configure the same node name.
    DuplicateNode(String),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::DuplicateLoad(name) => write!(f, "repeat to load function: {}", name),
            BuildError::MalformedLocator(locator) => {
                write!(f, "malformed locator '{}', expected '<driver>:<path>'", locator)
            }
            BuildError::FunctionNotLoaded(name) => write!(f, "function not loaded: {}", name),
            BuildError::DriverNotFound(locator) => write!(f, "driver not found: {}", locator),
            BuildError::SelfReference(name) => {
                write!(f, "node and function name are the same: {}", name)
            }
            BuildError::DuplicateNode(name) => write!(f, "repeat to configure node: {}", name),
        }
    }
}

impl std::error::Error for BuildError {}

/// A build error located at the block that caused it.
#[derive(Debug, Clone)]
pub struct PlanError {
    pub error: BuildError,
    pub span: Range<usize>,
    pub source_id: usize,
}

impl PlanError {
    pub fn new(error: BuildError, span: Range<usize>, source_id: usize) -> Self {
        PlanError {
            error,
            span,
            source_id,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        let diagnostic = Diagnostic::error()
            .with_message(self.error.to_string())
            .with_labels(vec![Label::primary(self.source_id, self.span.clone())]);
        match &self.error {
            BuildError::FunctionNotLoaded(name) => {
                diagnostic.with_notes(vec![format!("add a 'load <driver>:<path>/{}' line", name)])
            }
            BuildError::MalformedLocator(_) => {
                diagnostic.with_notes(vec!["for example 'load cmd:/usr/bin/sleep'".to_string()])
            }
            _ => diagnostic,
        }
    }
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for PlanError {}

/// Failures reported by a driver, or while preparing its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    Load(String),
    Args(String),
    Invoke(String),
    Resolve(ResolveError),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Load(msg) => write!(f, "load failed: {}", msg),
            DriverError::Args(msg) => write!(f, "invalid arguments: {}", msg),
            DriverError::Invoke(msg) => write!(f, "invoke failed: {}", msg),
            DriverError::Resolve(e) => write!(f, "cannot resolve arguments: {}", e),
        }
    }
}

impl std::error::Error for DriverError {}

impl From<ResolveError> for DriverError {
    fn from(e: ResolveError) -> Self {
        DriverError::Resolve(e)
    }
}

/// Either half of `compile` failing.
#[derive(Debug, Clone)]
pub enum CompileError {
    Parse(ParseError),
    Plan(PlanError),
}

impl CompileError {
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        match self {
            CompileError::Parse(e) => e.to_diagnostic(),
            CompileError::Plan(e) => e.to_diagnostic(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Parse(e) => e.fmt(f),
            CompileError::Plan(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<ParseError> for CompileError {
    fn from(e: ParseError) -> Self {
        CompileError::Parse(e)
    }
}

impl From<PlanError> for CompileError {
    fn from(e: PlanError) -> Self {
        CompileError::Plan(e)
    }
}
