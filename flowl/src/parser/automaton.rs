use log::{debug, trace};

use crate::ast::Ast;
use crate::block::{Block, BlockId, BlockKind, Body};
use crate::lexical::{CharClass, is_word_str};
use crate::parser::error::{ParseError, ParseErrorKind};
use crate::statement::{Statement, StatementKind};
use crate::token::{Token, TokenKind};

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Which block grammar is being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockPhase {
    Global,
    Keyword,
    LoadStarted,
    RunStarted,
    RunBodyStarted,
    RunBodyInside,
    FnStarted,
    FnBodyStarted,
    FnBodyInside,
    ArgsStarted,
    ArgsBodyStarted,
    ArgsBodyInside,
    VarStarted,
}

/// Progress through the header tokens of the current declaration line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenPhase {
    Unknown,
    WordStarted,
    KindDone,
    TargetStarted,
    TargetDone,
    /// Seen the `-` of `->`.
    Arrow,
    OperatorStarted,
    OperatorDone,
    TypeValueStarted,
    TypeValueDone,
}

/// The trimmed line currently fed to the automaton.
pub(crate) struct Line<'s> {
    pub text: &'s str,
    /// 1-based line number.
    pub number: usize,
    /// Byte offset of `text` in the source.
    pub offset: usize,
}

// ---------------------------------------------------------------------------
// Automaton
// ---------------------------------------------------------------------------

/// Two-level state machine building the block tree one character at a time.
pub(crate) struct Automaton {
    ast: Ast,
    phase: BlockPhase,
    state: TokenPhase,
    /// The block under construction.
    cursor: BlockId,
    /// Byte index in the line where the current word started.
    start: usize,
    /// The `var` statement being read.
    var: Option<Statement>,
}

impl Automaton {
    pub fn new(file_id: usize) -> Self {
        let ast = Ast::new(file_id);
        let cursor = ast.root();
        Automaton {
            ast,
            phase: BlockPhase::Global,
            state: TokenPhase::Unknown,
            cursor,
            start: 0,
            var: None,
        }
    }

    /// Feed one trimmed line, followed by the synthetic end-of-line.
    pub fn feed(&mut self, line: &Line<'_>) -> Result<(), ParseError> {
        if line.text.starts_with('#') {
            return Ok(());
        }
        for (i, c) in line.text.char_indices() {
            self.step(line, i, c)?;
        }
        self.step(line, line.text.len(), '\n')
    }

    pub fn finish(self) -> Result<Ast, ParseError> {
        if self.phase == BlockPhase::Global {
            return Ok(self.ast);
        }
        let block = self.ast.block(self.cursor);
        Err(ParseError::new(
            ParseErrorKind::UnexpectedEof,
            format!("unexpected end of input: unclosed '{}' block", block.header()),
            block.line,
            block.span.clone(),
            self.ast.source_id,
        )
        .with_note("close the block with a line containing only '}'"))
    }

    fn step(&mut self, line: &Line<'_>, i: usize, c: char) -> Result<(), ParseError> {
        let class = CharClass::of(c);
        match self.phase {
            BlockPhase::Global => match class {
                CharClass::Space | CharClass::Eol => Ok(()),
                CharClass::Word => {
                    self.start = i;
                    self.transfer(BlockPhase::Keyword);
                    Ok(())
                }
                _ => Err(self.invalid(line, i, c)),
            },
            BlockPhase::Keyword => self.keyword(line, i, c, class),
            BlockPhase::LoadStarted => self.load(line, i, c, class),
            BlockPhase::RunStarted => self.run(line, i, c, class),
            BlockPhase::FnStarted => self.func(line, i, c, class),
            BlockPhase::ArgsStarted => self.args(line, i, c, class),
            BlockPhase::VarStarted => self.var(line, i, c, class),
            BlockPhase::RunBodyStarted => {
                self.body_started(line, i, c, class, BlockPhase::RunBodyInside)
            }
            BlockPhase::FnBodyStarted => {
                self.body_started(line, i, c, class, BlockPhase::FnBodyInside)
            }
            BlockPhase::ArgsBodyStarted => {
                self.body_started(line, i, c, class, BlockPhase::ArgsBodyInside)
            }
            BlockPhase::RunBodyInside => {
                if class != CharClass::Eol {
                    return Ok(());
                }
                if line.text == "}" {
                    self.end_block(line);
                    Ok(())
                } else if line.text.is_empty() {
                    Ok(())
                } else {
                    self.append_run_line(line)
                }
            }
            BlockPhase::FnBodyInside => self.fn_body(line, i, c, class),
            BlockPhase::ArgsBodyInside => {
                if class != CharClass::Eol {
                    return Ok(());
                }
                if line.text == "}" {
                    self.close(line);
                    self.state = TokenPhase::Unknown;
                    self.transfer(BlockPhase::FnBodyInside);
                    Ok(())
                } else if line.text.is_empty() {
                    Ok(())
                } else {
                    self.append_pair(line, '=')
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Grammars
    // -----------------------------------------------------------------------

    fn keyword(&mut self, line: &Line<'_>, i: usize, c: char, class: CharClass) -> Result<(), ParseError> {
        match class {
            CharClass::Word => Ok(()),
            CharClass::Space | CharClass::LeftBracket => {
                let bracket = class == CharClass::LeftBracket;
                let word = &line.text[self.start..i];
                if word == "var" {
                    if bracket {
                        return Err(self.invalid(line, i, c));
                    }
                    self.var = Some(Statement::new(StatementKind::Var));
                    self.state = TokenPhase::KindDone;
                    self.transfer(BlockPhase::VarStarted);
                    return Ok(());
                }
                let kind = match BlockKind::from_keyword(word) {
                    Some(kind @ (BlockKind::Load | BlockKind::Fn | BlockKind::Run)) => kind,
                    _ => {
                        return Err(ParseError::new(
                            ParseErrorKind::UnknownBlock,
                            format!("invalid block define: {}", word),
                            line.number,
                            self.span(line, self.start, i),
                            self.ast.source_id,
                        ));
                    }
                };
                if bracket && kind != BlockKind::Run {
                    return Err(self.invalid(line, i, c));
                }
                self.open(kind, line, i);
                self.state = TokenPhase::KindDone;
                match kind {
                    BlockKind::Load => self.transfer(BlockPhase::LoadStarted),
                    BlockKind::Fn => self.transfer(BlockPhase::FnStarted),
                    _ if bracket => self.open_run_body(Body::list()),
                    _ => self.transfer(BlockPhase::RunStarted),
                }
                Ok(())
            }
            _ => Err(self.invalid(line, i, c)),
        }
    }

    /// `load <locator>`
    fn load(&mut self, line: &Line<'_>, i: usize, c: char, class: CharClass) -> Result<(), ParseError> {
        use CharClass::*;
        use TokenPhase::*;
        match (self.state, class) {
            (KindDone, Space) | (TargetStarted, Word) | (TargetDone, Space) => {}
            (KindDone, Word) => self.begin(i, TargetStarted),
            (TargetStarted, Space) => {
                self.set_target(line, i, TokenKind::LoadTarget);
                self.state = TargetDone;
            }
            (TargetStarted, Eol) => {
                self.set_target(line, i, TokenKind::LoadTarget);
                self.end_block(line);
            }
            (TargetDone, Eol) => self.end_block(line),
            _ => {
                return Err(self
                    .invalid(line, i, c)
                    .with_note("expected 'load <driver>:<path>'"));
            }
        }
        Ok(())
    }

    /// `run <name>`, `run <name> [-> <var>] {`, `run {`
    fn run(&mut self, line: &Line<'_>, i: usize, c: char, class: CharClass) -> Result<(), ParseError> {
        use CharClass::*;
        use TokenPhase::*;
        match (self.state, class) {
            (KindDone, Space)
            | (TargetStarted, Word)
            | (TargetDone, Space)
            | (OperatorDone, Space)
            | (TypeValueStarted, Word)
            | (TypeValueDone, Space) => {}
            (KindDone, Word) => self.begin(i, TargetStarted),
            (KindDone, LeftBracket) => self.open_run_body(Body::list()),
            (TargetStarted, LeftBracket) => {
                self.set_target(line, i, TokenKind::FunctionName);
                self.open_run_body(Body::map());
            }
            (TargetStarted, Space) => {
                self.set_target(line, i, TokenKind::FunctionName);
                self.state = TargetDone;
            }
            (TargetStarted, Eol) => {
                self.set_target(line, i, TokenKind::FunctionName);
                self.end_block(line);
            }
            (TargetDone, Eol) | (TypeValueDone, Eol) => self.end_block(line),
            (TargetDone, LeftBracket) | (TypeValueDone, LeftBracket) => {
                self.open_run_body(Body::map())
            }
            (TargetDone, Word) if c == '-' => self.begin(i, Arrow),
            (Arrow, Other) if c == '>' => {
                let token = Token::new(TokenKind::Operator, "->", line.number, self.span(line, self.start, i + 1));
                self.current_mut().operator = Some(token);
                self.state = OperatorDone;
            }
            (OperatorDone, Word) => self.begin(i, TypeValueStarted),
            (TypeValueStarted, Space) => {
                self.set_typevalue(line, i, TokenKind::VarName);
                self.state = TypeValueDone;
            }
            (TypeValueStarted, Eol) => {
                self.set_typevalue(line, i, TokenKind::VarName);
                self.end_block(line);
            }
            (TypeValueStarted, LeftBracket) => {
                self.set_typevalue(line, i, TokenKind::VarName);
                self.open_run_body(Body::map());
            }
            _ => return Err(self.invalid(line, i, c)),
        }
        Ok(())
    }

    /// `fn <name> = <function> {`
    fn func(&mut self, line: &Line<'_>, i: usize, c: char, class: CharClass) -> Result<(), ParseError> {
        use CharClass::*;
        use TokenPhase::*;
        match (self.state, class) {
            (KindDone, Space)
            | (TargetStarted, Word)
            | (TargetDone, Space)
            | (OperatorStarted, Space)
            | (TypeValueStarted, Word)
            | (TypeValueDone, Space) => {}
            (KindDone, Word) => self.begin(i, TargetStarted),
            (TargetStarted, Space) => {
                self.set_target(line, i, TokenKind::Word);
                self.state = TargetDone;
            }
            (TargetStarted, Eq) => {
                self.set_target(line, i, TokenKind::Word);
                self.set_eq(line, i);
                self.state = OperatorStarted;
            }
            (TargetDone, Eq) => {
                self.set_eq(line, i);
                self.state = OperatorStarted;
            }
            (OperatorStarted, Word) => self.begin(i, TypeValueStarted),
            (TypeValueStarted, Space) => {
                self.set_typevalue(line, i, TokenKind::FunctionName);
                self.state = TypeValueDone;
            }
            (TypeValueStarted, LeftBracket) => {
                self.set_typevalue(line, i, TokenKind::FunctionName);
                self.open_body(BlockPhase::FnBodyStarted);
            }
            (TypeValueDone, LeftBracket) => self.open_body(BlockPhase::FnBodyStarted),
            (TargetDone, _) => {
                return Err(self
                    .invalid(line, i, c)
                    .with_note("expected '=' after the node name"));
            }
            _ => {
                return Err(self
                    .invalid(line, i, c)
                    .with_note("expected 'fn <name> = <function> {'"));
            }
        }
        Ok(())
    }

    /// Lines between `fn ... {` and its `}`: only `args` blocks.
    fn fn_body(&mut self, line: &Line<'_>, i: usize, c: char, class: CharClass) -> Result<(), ParseError> {
        if self.state == TokenPhase::WordStarted {
            return match class {
                CharClass::Word => Ok(()),
                CharClass::Space | CharClass::Eq | CharClass::LeftBracket | CharClass::Eol => {
                    let word = &line.text[self.start..i];
                    if word != "args" {
                        return Err(ParseError::new(
                            ParseErrorKind::InvalidStatement,
                            format!("invalid statement in fn block: {}", line.text),
                            line.number,
                            self.span(line, 0, line.text.len()),
                            self.ast.source_id,
                        ));
                    }
                    self.open(BlockKind::Args, line, i);
                    self.current_mut().body = Body::map();
                    self.state = TokenPhase::KindDone;
                    self.transfer(BlockPhase::ArgsStarted);
                    self.args(line, i, c, class)
                }
                _ => Err(self.invalid(line, i, c)),
            };
        }
        match class {
            CharClass::Eol if line.text == "}" => self.end_block(line),
            CharClass::Space | CharClass::Eol => {}
            CharClass::Other if c == '}' && line.text == "}" => {}
            CharClass::Word => self.begin(i, TokenPhase::WordStarted),
            _ => return Err(self.invalid(line, i, c)),
        }
        Ok(())
    }

    /// `args {` or `args = {` inside a `fn` body.
    fn args(&mut self, line: &Line<'_>, i: usize, c: char, class: CharClass) -> Result<(), ParseError> {
        use CharClass::*;
        use TokenPhase::*;
        match (self.state, class) {
            (KindDone, Space) | (OperatorDone, Space) => {}
            (KindDone, Eq) => {
                self.set_eq(line, i);
                self.state = OperatorDone;
            }
            (KindDone, LeftBracket) | (OperatorDone, LeftBracket) => {
                self.open_body(BlockPhase::ArgsBodyStarted)
            }
            _ => {
                return Err(self
                    .invalid(line, i, c)
                    .with_note("expected 'args {'"));
            }
        }
        Ok(())
    }

    /// `var <name>` or `var <name> = <value>`
    fn var(&mut self, line: &Line<'_>, i: usize, c: char, class: CharClass) -> Result<(), ParseError> {
        use CharClass::*;
        use TokenPhase::*;
        match (self.state, class) {
            (KindDone, Space) | (TargetStarted, Word) | (TargetDone, Space) | (OperatorStarted, Space) => {}
            (KindDone, Word) => self.begin(i, TargetStarted),
            (TargetStarted, Space) => {
                self.push_var_token(line, i, TokenKind::VarName);
                self.state = TargetDone;
            }
            (TargetStarted, Eol) => {
                self.push_var_token(line, i, TokenKind::VarName);
                return self.finish_var(line);
            }
            (TargetStarted, Eq) => {
                self.push_var_token(line, i, TokenKind::VarName);
                self.state = OperatorStarted;
            }
            (TargetDone, Eq) => self.state = OperatorStarted,
            (TargetDone, Eol) => return self.finish_var(line),
            (OperatorStarted, Eol) => {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidStatement,
                    format!("missing value in var statement: {}", line.text),
                    line.number,
                    self.span(line, 0, line.text.len()),
                    self.ast.source_id,
                ));
            }
            (OperatorStarted, _) => self.begin(i, TypeValueStarted),
            (TypeValueStarted, Eol) => {
                self.push_var_token(line, i, TokenKind::Text);
                return self.finish_var(line);
            }
            (TypeValueStarted, _) => {}
            _ => return Err(self.invalid(line, i, c)),
        }
        Ok(())
    }

    /// Whitespace up to the end of the line that opened a body.
    fn body_started(
        &mut self,
        line: &Line<'_>,
        i: usize,
        c: char,
        class: CharClass,
        inside: BlockPhase,
    ) -> Result<(), ParseError> {
        match class {
            CharClass::Space => Ok(()),
            CharClass::Eol => {
                self.state = TokenPhase::Unknown;
                self.transfer(inside);
                Ok(())
            }
            _ => Err(self
                .invalid(line, i, c)
                .with_note("the body starts on the line after '{'")),
        }
    }

    // -----------------------------------------------------------------------
    // Body lines
    // -----------------------------------------------------------------------

    fn append_run_line(&mut self, line: &Line<'_>) -> Result<(), ParseError> {
        if matches!(self.current().body, Body::Map(_)) {
            return self.append_pair(line, ':');
        }
        let mut names = Vec::new();
        for (start, word) in words(line.text) {
            if !is_word_str(word) {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidStatement,
                    format!("invalid function name in run block: {}", word),
                    line.number,
                    self.span(line, start, start + word.len()),
                    self.ast.source_id,
                ));
            }
            names.push(Token::new(
                TokenKind::FunctionName,
                word,
                line.number,
                self.span(line, start, start + word.len()),
            ));
        }
        if let Body::List(list) = &mut self.current_mut().body {
            list.extend(names);
        }
        Ok(())
    }

    /// A `key<sep> value` line of a map body.
    fn append_pair(&mut self, line: &Line<'_>, sep: char) -> Result<(), ParseError> {
        let text = line.text;
        let Some(pos) = text.find(sep) else {
            return Err(ParseError::new(
                ParseErrorKind::InvalidStatement,
                format!("expected 'key{} value': {}", sep, text),
                line.number,
                self.span(line, 0, text.len()),
                self.ast.source_id,
            ));
        };
        let key = text[..pos].trim_end();
        if !is_word_str(key) {
            return Err(ParseError::new(
                ParseErrorKind::InvalidStatement,
                format!("invalid key '{}': {}", key, text),
                line.number,
                self.span(line, 0, pos),
                self.ast.source_id,
            ));
        }
        let after = pos + sep.len_utf8();
        let raw = &text[after..];
        let value_start = after + (raw.len() - raw.trim_start().len());
        let value = raw.trim();

        let key_token = Token::new(TokenKind::Word, key, line.number, self.span(line, 0, key.len()));
        let value_token = Token::new(
            TokenKind::Text,
            value,
            line.number,
            self.span(line, value_start, value_start + value.len()),
        );
        if !self.current_mut().body.insert_pair(key_token, value_token) {
            return Err(ParseError::new(
                ParseErrorKind::DuplicateKey,
                format!("duplicate key '{}' in '{}' block", key, self.current().header()),
                line.number,
                self.span(line, 0, key.len()),
                self.ast.source_id,
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Cursor and token helpers
    // -----------------------------------------------------------------------

    fn transfer(&mut self, phase: BlockPhase) {
        trace!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn begin(&mut self, i: usize, state: TokenPhase) {
        self.start = i;
        self.state = state;
    }

    fn current(&self) -> &Block {
        self.ast.block(self.cursor)
    }

    fn current_mut(&mut self) -> &mut Block {
        self.ast.block_mut(self.cursor)
    }

    /// Push a child block whose keyword spans `start..end` and move the cursor to it.
    fn open(&mut self, kind: BlockKind, line: &Line<'_>, end: usize) {
        let keyword = self.token(line, self.start, end, TokenKind::Keyword);
        let block = Block::new(kind, keyword, self.cursor, line.number);
        self.cursor = self.ast.push(block);
        debug!("Opened {:?} block #{} at line {}", kind, self.cursor.index(), line.number);
    }

    /// Pop the cursor back to the parent of the current block.
    fn close(&mut self, line: &Line<'_>) {
        let root = self.ast.root();
        let block = self.ast.block_mut(self.cursor);
        block.span.end = line.offset + line.text.len();
        let parent = block.parent.unwrap_or(root);
        debug!("Closed block '{}' at line {}", block.header(), line.number);
        self.cursor = parent;
    }

    fn end_block(&mut self, line: &Line<'_>) {
        self.close(line);
        self.state = TokenPhase::Unknown;
        self.transfer(BlockPhase::Global);
    }

    fn open_body(&mut self, phase: BlockPhase) {
        self.current_mut().braced = true;
        self.state = TokenPhase::Unknown;
        self.transfer(phase);
    }

    fn open_run_body(&mut self, body: Body) {
        self.current_mut().body = body;
        self.open_body(BlockPhase::RunBodyStarted);
    }

    fn set_target(&mut self, line: &Line<'_>, end: usize, kind: TokenKind) {
        let token = self.token(line, self.start, end, kind);
        self.current_mut().target = Some(token);
    }

    fn set_typevalue(&mut self, line: &Line<'_>, end: usize, kind: TokenKind) {
        let token = self.token(line, self.start, end, kind);
        self.current_mut().typevalue = Some(token);
    }

    fn set_eq(&mut self, line: &Line<'_>, i: usize) {
        let token = Token::new(TokenKind::Operator, "=", line.number, self.span(line, i, i + 1));
        self.current_mut().operator = Some(token);
    }

    fn push_var_token(&mut self, line: &Line<'_>, end: usize, kind: TokenKind) {
        let token = self.token(line, self.start, end, kind);
        if let Some(stm) = self.var.as_mut() {
            stm.append(token);
        }
    }

    /// Append the finished `var` statement to the block under the cursor.
    fn finish_var(&mut self, line: &Line<'_>) -> Result<(), ParseError> {
        let stm = self.var.take().unwrap_or_else(|| Statement::new(StatementKind::Var));
        let span = self.span(line, 0, line.text.len());
        let file_id = self.ast.source_id;
        match &mut self.current_mut().body {
            Body::Plain(stms) => stms.push(stm),
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidStatement,
                    format!("var statement not allowed here: {}", line.text),
                    line.number,
                    span,
                    file_id,
                ));
            }
        }
        self.state = TokenPhase::Unknown;
        self.transfer(BlockPhase::Global);
        Ok(())
    }

    fn token(&self, line: &Line<'_>, start: usize, end: usize, kind: TokenKind) -> Token {
        let text = line.text[start..end].trim_end();
        Token::new(kind, text, line.number, self.span(line, start, start + text.len()))
    }

    fn span(&self, line: &Line<'_>, start: usize, end: usize) -> std::ops::Range<usize> {
        line.offset + start..line.offset + end
    }

    fn invalid(&self, line: &Line<'_>, i: usize, c: char) -> ParseError {
        if c == '\n' {
            ParseError::new(
                ParseErrorKind::InvalidCharacter,
                format!("unexpected end of line: {}", line.text),
                line.number,
                self.span(line, i, i),
                self.ast.source_id,
            )
        } else {
            ParseError::new(
                ParseErrorKind::InvalidCharacter,
                format!("contain invalid character '{}': {}", c, line.text),
                line.number,
                self.span(line, i, i + c.len_utf8()),
                self.ast.source_id,
            )
        }
    }
}

/// Whitespace-separated words of `text` with their byte offsets.
fn words(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                out.push((s, &text[s..i]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push((s, &text[s..]));
    }
    out
}
