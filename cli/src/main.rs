mod test_runner;

use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use env_logger::Builder;
use log::{LevelFilter, info};

use planner::{DriverRegistry, RunQ};

const SUBCOMMANDS: &[&str] = &["check", "ast", "plan", "test", "help"];

#[derive(Parser)]
#[command(name = "flowl", version, about = "flowl compiler front end")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log more (-v info, -vv debug, -vvv trace). RUST_LOG applies otherwise.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a flowl file and build its plan
    Check(FileArgs),

    /// Print the parsed block tree
    Ast(FileArgs),

    /// Print the execution plan stage by stage
    Plan(FileArgs),

    /// Run .test.flowl test files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct FileArgs {
    /// flowl source file
    file: String,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.flowl file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // `flowl file.flowl` works like `flowl check file.flowl`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args
        .iter()
        .skip(1)
        .position(|a| !a.starts_with('-'))
        .map(|i| i + 1)
    {
        if !SUBCOMMANDS.contains(&args[pos].as_str()) {
            args.insert(pos, "check".to_string());
        }
    }

    let cli = Cli::parse_from(&args);
    init_logging(cli.verbose);
    info!("'{}' version {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Check(file) => {
            let q = compile_or_exit(&file.file, cli.no_color);
            println!(
                "ok: {} ({} stages, {} nodes)",
                file.file,
                q.stage_count(),
                q.node_count()
            );
        }
        Command::Ast(file) => {
            let (files, file_id, source) = read_or_exit(&file.file);
            match flowl::parse(&source, file_id) {
                Ok(ast) => print!("{}", ast),
                Err(error) => {
                    emit(&files, &error.to_diagnostic(), cli.no_color);
                    process::exit(1);
                }
            }
        }
        Command::Plan(file) => {
            let q = compile_or_exit(&file.file, cli.no_color);
            print!("{}", render_plan(&q));
        }
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_logging(verbose: u8) {
    let mut builder = Builder::from_default_env();
    let level = match verbose {
        0 => None,
        1 => Some(LevelFilter::Info),
        2 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    };
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.init();
}

fn read_or_exit(file: &str) -> (SimpleFiles<String, String>, usize, String) {
    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", file, e);
            process::exit(1);
        }
    };
    let mut files = SimpleFiles::new();
    let file_id = files.add(file.to_string(), source.clone());
    (files, file_id, source)
}

/// Read, parse and plan `file`, reporting any error as a diagnostic and exiting.
fn compile_or_exit(file: &str, no_color: bool) -> RunQ {
    let (files, file_id, source) = read_or_exit(file);
    match planner::compile(&source, file_id, &DriverRegistry::default()) {
        Ok(q) => q,
        Err(error) => {
            emit(&files, &error.to_diagnostic(), no_color);
            process::exit(1);
        }
    }
}

fn emit(files: &SimpleFiles<String, String>, diagnostic: &Diagnostic<usize>, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, diagnostic);
}

/// One line per stage: `stage N: node->function | node->function`.
fn render_plan(q: &RunQ) -> String {
    let mut out = String::new();
    for loc in q.locations() {
        out.push_str(&format!("load {}\n", loc));
    }
    for (stage, chain) in q.iter_stages() {
        let nodes: Vec<String> = chain.map(|(_, node)| node.to_string()).collect();
        out.push_str(&format!("stage {}: {}\n", stage, nodes.join(" | ")));
    }
    out
}
