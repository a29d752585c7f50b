use crate::ast::Ast;
use crate::block::{Block, BlockId, BlockKind};
use crate::parser::{ParseError, ParseErrorKind, Parser};
use crate::token::TokenKind;
use crate::variable::ResolveError;

fn parse(source: &str) -> Ast {
    Parser::new(source.to_string(), 0)
        .parse()
        .expect("parse failed")
}

fn parse_err(source: &str) -> ParseError {
    match Parser::new(source.to_string(), 0).parse() {
        Ok(_) => panic!("expected a parse error for:\n{}", source),
        Err(e) => e,
    }
}

/// Every block except the root, in pre-order.
fn blocks(ast: &Ast) -> Vec<(BlockId, &Block)> {
    ast.walk()
        .into_iter()
        .skip(1)
        .map(|id| (id, ast.block(id)))
        .collect()
}

fn find(ast: &Ast, kind: BlockKind) -> BlockId {
    blocks(ast)
        .into_iter()
        .find(|(_, b)| b.kind == kind)
        .map(|(id, _)| id)
        .expect("block not found")
}

// ---------------------------------------------------------------------------
// Grammar
// ---------------------------------------------------------------------------

#[test]
fn load_blocks_with_loose_whitespace() {
    let ast = parse(
        "
load file:///root/action1
  load http://localhost:8080/action2

load https://github.com/path/action3

\tload \taction4
\t",
    );
    let targets: Vec<&str> = blocks(&ast).iter().map(|(_, b)| b.target_str()).collect();
    assert_eq!(
        targets,
        vec![
            "file:///root/action1",
            "http://localhost:8080/action2",
            "https://github.com/path/action3",
            "action4",
        ]
    );
    for (_, b) in blocks(&ast) {
        assert!(b.is_load());
        assert!(b.keyword.as_ref().unwrap().is_keyword());
        assert_eq!(b.target.as_ref().unwrap().kind, TokenKind::LoadTarget);
        assert_eq!(b.parent(), Some(ast.root()));
    }
}

#[test]
fn fn_block_with_args() {
    let ast = parse(
        "fn n1 = f1 {
    args {
        k = v
        url = http://host/$(name)
    }
}",
    );
    let fn_id = find(&ast, BlockKind::Fn);
    let fn_block = ast.block(fn_id);
    assert_eq!(fn_block.target_str(), "n1");
    assert_eq!(fn_block.operator.as_ref().unwrap().as_str(), "=");
    assert_eq!(fn_block.typevalue_str(), "f1");
    assert_eq!(fn_block.children().len(), 1);

    let args = ast.block(fn_block.children()[0]);
    assert!(args.is_args());
    assert_eq!(args.parent(), Some(fn_id));
    let pairs: Vec<(&str, &str)> = args.body.pairs().map(|(k, v)| (k, v.as_str())).collect();
    assert_eq!(pairs, vec![("k", "v"), ("url", "http://host/$(name)")]);
    let (_, url) = args.body.pairs().find(|(k, _)| *k == "url").unwrap();
    assert!(url.has_var());
}

#[test]
fn fn_header_without_spaces() {
    let ast = parse("fn n1=f1{\nargs={\nk=1\n}\n}");
    let fn_block = ast.block(find(&ast, BlockKind::Fn));
    assert_eq!(fn_block.header(), "fn n1 = f1 {");
    let args = ast.block(find(&ast, BlockKind::Args));
    assert_eq!(args.header(), "args = {");
}

#[test]
fn run_forms() {
    let ast = parse(
        "run sleep
run sleep {
    time: 1s
    url: http://host:80/x
}
run {
    a b
    c
}
run f1 -> out",
    );
    let runs: Vec<&Block> = blocks(&ast).into_iter().map(|(_, b)| b).collect();
    assert_eq!(runs.len(), 4);
    assert!(runs.iter().all(|b| b.is_run()));

    assert_eq!(runs[0].target_str(), "sleep");
    assert!(runs[0].body.is_empty());
    assert!(!runs[0].braced);

    let pairs: Vec<(&str, &str)> = runs[1].body.pairs().map(|(k, v)| (k, v.as_str())).collect();
    assert_eq!(pairs, vec![("time", "1s"), ("url", "http://host:80/x")]);

    assert!(runs[2].target.is_none());
    assert_eq!(runs[2].body.names(), vec!["a", "b", "c"]);

    assert_eq!(runs[3].target_str(), "f1");
    assert_eq!(runs[3].operator.as_ref().unwrap().as_str(), "->");
    assert_eq!(runs[3].typevalue_str(), "out");
}

#[test]
fn header_round_trip() {
    let lines = [
        "load cmd:/usr/bin/sleep",
        "fn n1 = f1 {",
        "args = {",
        "k = v",
        "}",
        "}",
        "fn n2 = f1 {",
        "args {",
        "}",
        "}",
        "run n1",
        "run n1 -> out",
        "run sleep {",
        "time: 1s",
        "}",
        "run {",
        "n1 n2",
        "}",
        "run sleep -> res {",
        "}",
    ];
    let ast = parse(&lines.join("\n"));
    let headers: Vec<String> = blocks(&ast).iter().map(|(_, b)| b.header()).collect();
    assert_eq!(
        headers,
        vec![
            "load cmd:/usr/bin/sleep",
            "fn n1 = f1 {",
            "args = {",
            "fn n2 = f1 {",
            "args {",
            "run n1",
            "run n1 -> out",
            "run sleep {",
            "run {",
            "run sleep -> res {",
        ]
    );
    for (_, b) in blocks(&ast) {
        assert!(lines.contains(&b.header().as_str()));
    }
}

#[test]
fn comment_lines_are_skipped() {
    let ast = parse("# a flow\nload cmd:/bin/echo\n  # run it\nrun echo\n");
    assert_eq!(blocks(&ast).len(), 2);
}

#[test]
fn tokens_are_bound_to_their_block() {
    let ast = parse("run f1 {\n  k: v\n}");
    let (id, run) = blocks(&ast)[0];
    assert!(run.header_tokens().all(|t| t.block() == Some(id)));
    assert!(run.body.pairs().all(|(_, v)| v.block() == Some(id)));
}

#[test]
fn spans_point_into_source() {
    let source = "load cmd:/usr/bin/sleep\n  run sleep";
    let ast = parse(source);
    let run = blocks(&ast)[1].1;
    let target = run.target.as_ref().unwrap();
    assert_eq!(&source[target.span.clone()], "sleep");
    assert_eq!(target.line, 2);
    assert_eq!(run.line, 2);
}

#[test]
fn display_dumps_indented_tree() {
    let ast = parse("var x = 1\nload cmd:/bin/a\nfn n = a {\nargs {\nk = v\n}\n}\nrun n {\nk: w\n}");
    assert_eq!(
        ast.to_string(),
        "var x = 1
load cmd:/bin/a
fn n = a {
  args {
    k = v
  }
}
run n {
  k: w
}
"
    );
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

#[test]
fn var_statements_live_in_root_scope() {
    let ast = parse("var x = 1\nvar y = $x\nvar z = $(y)-$x\nvar w");
    let root = ast.root();
    assert_eq!(ast.block(root).scope().len(), 4);
    assert_eq!(ast.resolve_var(root, "y").unwrap(), "1");
    assert_eq!(ast.resolve_var(root, "z").unwrap(), "1-1");
    assert_eq!(ast.resolve_var(root, "w").unwrap(), "");

    let x = ast.lookup_var(root, "x").unwrap();
    assert!(ast.var(x).value.is_cached());
    let z = ast.lookup_var(root, "z").unwrap();
    assert_eq!(ast.var(z).value.deps().len(), 2);
}

#[test]
fn var_value_keeps_inner_spaces() {
    let ast = parse("var greeting =   hello there  ");
    assert_eq!(ast.resolve_var(ast.root(), "greeting").unwrap(), "hello there");
}

#[test]
fn unresolved_reference_fails_on_resolution() {
    let ast = parse("var z = $x");
    assert_eq!(
        ast.resolve_var(ast.root(), "z"),
        Err(ResolveError::UndefinedVariable("x".to_string()))
    );
    assert_eq!(
        ast.resolve_var(ast.root(), "missing"),
        Err(ResolveError::UndefinedVariable("missing".to_string()))
    );
}

#[test]
fn forward_reference_stays_unresolved() {
    let ast = parse("var a = $b\nvar b = 2");
    assert!(ast.resolve_var(ast.root(), "a").is_err());
    assert_eq!(ast.resolve_var(ast.root(), "b").unwrap(), "2");
}

#[test]
fn lookup_walks_up_from_nested_blocks() {
    let ast = parse("var host = example.org\nfn n = f {\nargs {\nurl = http://$host/x\n}\n}");
    let args_id = find(&ast, BlockKind::Args);
    let (_, url) = ast.block(args_id).body.pairs().next().unwrap();
    assert_eq!(ast.expand(args_id, url).unwrap(), "http://example.org/x");
    assert_eq!(ast.defining_block(args_id, "host"), Some(ast.root()));
}

#[test]
fn field_variables() {
    let mut ast = parse("var out\nvar msg = got $(out.code)\nfn n = f {\nargs {\nk = rc=$(out.code)\n}\n}");
    let root = ast.root();
    let args_id = find(&ast, BlockKind::Args);
    let value = ast.block(args_id).body.pairs().next().unwrap().1.clone();
    assert_eq!(value.as_str(), "rc=$(out.code)");

    assert_eq!(
        ast.expand(args_id, &value),
        Err(ResolveError::UndefinedField {
            base: "out".to_string(),
            field: "code".to_string(),
        })
    );

    ast.create_field_var(root, "out", "code", "0");
    assert_eq!(ast.expand(args_id, &value).unwrap(), "rc=0");
    assert_eq!(ast.resolve_var(root, "msg").unwrap(), "got 0");
    assert_eq!(ast.lookup_field(args_id, "out", "code"), Some("0"));
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn bracket_where_word_required() {
    assert_eq!(parse_err("load {x}").kind, ParseErrorKind::InvalidCharacter);
    assert_eq!(parse_err("load{").kind, ParseErrorKind::InvalidCharacter);
    assert_eq!(parse_err("fn n1 = {").kind, ParseErrorKind::InvalidCharacter);
    assert_eq!(parse_err("var{").kind, ParseErrorKind::InvalidCharacter);
}

#[test]
fn fn_without_eq() {
    let err = parse_err("fn n1 f1 {\n}");
    assert_eq!(err.kind, ParseErrorKind::InvalidCharacter);
    assert_eq!(err.line, 1);
    assert!(err.message.contains("'f'"), "{}", err.message);
    assert!(err.message.contains("fn n1 f1 {"), "{}", err.message);
}

#[test]
fn error_span_locates_offending_character() {
    let err = parse_err("var a = 1\n  load{x");
    assert_eq!(err.line, 2);
    assert_eq!(err.span, 16..17);
}

#[test]
fn unknown_block() {
    let err = parse_err("set @action1");
    assert_eq!(err.kind, ParseErrorKind::UnknownBlock);
    assert!(err.message.contains("set"));
    assert_eq!(parse_err("args {").kind, ParseErrorKind::UnknownBlock);
}

#[test]
fn keyword_alone_on_a_line() {
    assert_eq!(parse_err("run").kind, ParseErrorKind::InvalidCharacter);
    assert_eq!(parse_err("load").kind, ParseErrorKind::InvalidCharacter);
}

#[test]
fn text_after_opening_bracket() {
    assert_eq!(parse_err("run f {k: v}").kind, ParseErrorKind::InvalidCharacter);
}

#[test]
fn unclosed_block() {
    let err = parse_err("fn n1 = f1 {\n  args {\n    k = v\n  }");
    assert_eq!(err.kind, ParseErrorKind::UnexpectedEof);
    assert_eq!(parse_err("run {\n a").kind, ParseErrorKind::UnexpectedEof);
}

#[test]
fn invalid_statement_in_fn_body() {
    let err = parse_err("fn n = f {\n  input k\n}");
    assert_eq!(err.kind, ParseErrorKind::InvalidStatement);
    assert_eq!(err.line, 2);
}

#[test]
fn map_lines_need_a_separator() {
    assert_eq!(parse_err("run f {\n  k v\n}").kind, ParseErrorKind::InvalidStatement);
    assert_eq!(
        parse_err("fn n = f {\nargs {\nk: v\n}\n}").kind,
        ParseErrorKind::InvalidStatement
    );
}

#[test]
fn duplicate_key() {
    let err = parse_err("fn n = f {\nargs {\nk = 1\nk = 2\n}\n}");
    assert_eq!(err.kind, ParseErrorKind::DuplicateKey);
    assert_eq!(err.line, 4);
}

#[test]
fn invalid_reference() {
    let err = parse_err("var x = cost $5");
    assert_eq!(err.kind, ParseErrorKind::InvalidReference);
    assert_eq!(parse_err("run f {\n  k: $(a b)\n}").kind, ParseErrorKind::InvalidReference);
}

#[test]
fn invalid_var_name() {
    assert_eq!(parse_err("var a-b = 1").kind, ParseErrorKind::InvalidStatement);
}

#[test]
fn var_without_value() {
    assert_eq!(parse_err("var a =").kind, ParseErrorKind::InvalidStatement);
}

#[test]
fn variable_redefined() {
    let err = parse_err("var x = 1\nvar x = 2");
    assert_eq!(err.kind, ParseErrorKind::VariableRedefined);
    assert_eq!(err.line, 2);
}

#[test]
fn diagnostic_carries_label() {
    let err = parse_err("fn n1 f1 {\n}").with_note("extra");
    let diagnostic = err.to_diagnostic();
    assert_eq!(diagnostic.labels.len(), 1);
    assert_eq!(diagnostic.notes.last().map(String::as_str), Some("extra"));
}
