pub mod ast;
pub mod block;
pub mod lexical;
pub mod parser;
pub mod statement;
pub mod token;
pub mod variable;

pub use ast::Ast;
pub use block::{Block, BlockId, BlockKind, Body};
pub use parser::{ParseError, ParseErrorKind, Parser};
pub use variable::ResolveError;

/// Parse flowl source text into its block tree.
pub fn parse(source: &str, file_id: usize) -> Result<Ast, ParseError> {
    Parser::new(source.to_string(), file_id).parse()
}
