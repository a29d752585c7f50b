mod analyze;
mod automaton;
pub mod error;

pub use error::{ParseError, ParseErrorKind};

use log::debug;

use crate::ast::Ast;
use crate::parser::automaton::{Automaton, Line};

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the flowl source into a block tree with its variable graph.
    /// The first error aborts parsing.
    pub fn parse(&self) -> Result<Ast, ParseError> {
        let mut automaton = Automaton::new(self.file_id);
        let mut offset = 0;
        for (idx, raw) in self.source.split('\n').enumerate() {
            let leading = raw.len() - raw.trim_start().len();
            let line = Line {
                text: raw.trim(),
                number: idx + 1,
                offset: offset + leading,
            };
            automaton.feed(&line)?;
            offset += raw.len() + 1;
        }
        let mut ast = automaton.finish()?;
        analyze::bind(&mut ast)?;
        debug!("Parsed {} blocks", ast.len() - 1);
        Ok(ast)
    }
}

#[cfg(test)]
mod tests;
