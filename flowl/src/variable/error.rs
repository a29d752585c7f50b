use std::fmt;

/// Failure to produce a variable's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    UndefinedVariable(String),
    UndefinedField { base: String, field: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::UndefinedVariable(name) => write!(f, "undefined variable: {}", name),
            ResolveError::UndefinedField { base, field } => {
                write!(f, "undefined field variable: {}.{}", base, field)
            }
        }
    }
}

impl std::error::Error for ResolveError {}
