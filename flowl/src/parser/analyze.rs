use log::debug;

use crate::ast::Ast;
use crate::block::BlockId;
use crate::parser::error::{ParseError, ParseErrorKind};
use crate::statement::Statement;
use crate::token::Token;
use crate::token::segment::{Reference, Segment};
use crate::variable::VarValue;

/// Second walk over the finished tree: bind tokens to their blocks, split
/// them into segments and build the variable graph.
pub(crate) fn bind(ast: &mut Ast) -> Result<(), ParseError> {
    let file_id = ast.source_id;
    for id in ast.walk() {
        let block = ast.block_mut(id);
        for token in block.header_tokens_mut() {
            prepare(token, id, file_id)?;
        }
        for token in block.body.tokens_mut() {
            prepare(token, id, file_id)?;
        }

        let vars: Vec<Statement> = block
            .body
            .statements()
            .iter()
            .filter(|s| s.is_var())
            .cloned()
            .collect();
        for stm in &vars {
            build_var(ast, id, stm, file_id)?;
        }
    }
    Ok(())
}

fn prepare(token: &mut Token, block: BlockId, file_id: usize) -> Result<(), ParseError> {
    token.set_block(block);
    let extracted = token.extract_vars().map(|_| ());
    if let Err(e) = extracted {
        let at = token.span.start + e.offset;
        return Err(ParseError::new(
            ParseErrorKind::InvalidReference,
            format!("{} in '{}'", e.message, token),
            token.line,
            at..at + 1,
            file_id,
        ));
    }
    token.validate().map_err(|message| {
        ParseError::new(
            ParseErrorKind::InvalidStatement,
            message,
            token.line,
            token.span.clone(),
            file_id,
        )
    })
}

fn build_var(
    ast: &mut Ast,
    block: BlockId,
    stm: &Statement,
    file_id: usize,
) -> Result<(), ParseError> {
    let Some(name) = stm.name() else {
        return Ok(());
    };
    let value = match stm.value() {
        None => VarValue::Cached(String::new()),
        Some(token) if !token.has_var() => VarValue::Cached(token.as_str().to_string()),
        Some(token) => {
            let segments = token.segments().to_vec();
            let deps = segments
                .iter()
                .filter_map(|seg| match seg {
                    Segment::Var(Reference { name, field: None }) => ast.lookup_var(block, name),
                    _ => None,
                })
                .collect();
            VarValue::Template { segments, deps }
        }
    };
    match ast.put_var(block, name.as_str(), value) {
        Ok(_) => {
            debug!("Variable '{}' defined in block #{}", name, block.index());
            Ok(())
        }
        Err(_) => Err(ParseError::new(
            ParseErrorKind::VariableRedefined,
            format!("variable redefined: {}", name),
            name.line,
            name.span.clone(),
            file_id,
        )),
    }
}
