use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use tern_diagnostics::Diagnostics;
use tern_driver::{
    CompilationResult, CompileMode, CompileOptions, Diagnostic, ImplicitMemberCallPolicy, OutputFormat, compile,
};
use tern_lexer::{Lexer, TokenClass};
use tern_resolve::{LinkOptions, SymbolKind};

/// Tern to JavaScript compiler
#[derive(Debug, Parser)]
#[command(name = "tern", version, about)]
struct Cli {
    /// More log output (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile source files to JavaScript
    Build(BuildArgs),
    /// Show lexer output (tokens)
    Lex {
        file: PathBuf,
    },
    /// Show parser output (AST)
    Parse {
        file: PathBuf,
    },
    /// Show file order and namespace tables
    Resolve {
        files: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t)]
        mode: CompileMode,
    },
    /// Generate shell completions
    Completions {
        shell: Shell,
    },
}

#[derive(Debug, Args)]
struct BuildArgs {
    /// Source files (`.tn`)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    #[arg(long, value_enum, default_value_t)]
    mode: CompileMode,

    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Leave out namespace/using comments
    #[arg(long)]
    optimize: bool,

    /// Annotate statements with their source location
    #[arg(long)]
    debug: bool,

    #[arg(long, value_enum, default_value_t)]
    implicit_member_calls: ImplicitMemberCallPolicy,

    /// Write `<output>.map` next to the output
    #[arg(long, requires = "output")]
    source_map: bool,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the whole compilation result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = match (quiet, verbose) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::WARN,
        (false, 1) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    };

    let layer = tracing_subscriber::fmt::layer()
        .without_time()
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .with_filter(filter);

    Registry::default().with(layer).init();
}

fn run(command: Command) -> Result<bool> {
    match command {
        Command::Build(args) => run_build(args),
        Command::Lex { file } => run_lexer(&file),
        Command::Parse { file } => run_parser(&file),
        Command::Resolve { files, mode } => run_resolver(&files, mode),
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "tern", &mut io::stdout());
            Ok(true)
        }
    }
}

/// Read every file, keyed by its path as given
fn read_sources(files: &[PathBuf]) -> Result<BTreeMap<String, String>> {
    let mut sources = BTreeMap::new();
    for path in files {
        let source =
            fs::read_to_string(path).with_context(|| format!("failed to read '{}'", path.display()))?;
        sources.insert(path.display().to_string(), source);
    }
    Ok(sources)
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read '{}'", path.display()))
}

fn report(diagnostics: &[Diagnostic], sources: &BTreeMap<String, String>) {
    for diagnostic in diagnostics {
        let source = sources.get(&diagnostic.file).map(String::as_str);
        eprint!("{}", diagnostic.render(source));
    }
}

fn run_build(args: BuildArgs) -> Result<bool> {
    let sources = read_sources(&args.files)?;

    let out_file = args
        .output
        .as_ref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out.js".to_string());
    let options = CompileOptions {
        output_format: args.format,
        optimize: args.optimize,
        debug: args.debug,
        implicit_member_calls: args.implicit_member_calls,
        source_map: args.source_map,
        out_file,
    };

    let result = match compile(&sources, args.mode, &options) {
        Ok(result) => result,
        Err(err) => {
            let diagnostic = err.to_diagnostic();
            if args.json {
                let failed = CompilationResult {
                    success: false,
                    code: None,
                    diagnostics: vec![diagnostic],
                    source_map: None,
                };
                println!("{}", serde_json::to_string_pretty(&failed)?);
            } else {
                report(&[diagnostic], &sources);
            }
            return Ok(false);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(result.success);
    }

    report(&result.diagnostics, &sources);
    let Some(code) = &result.code else {
        let errors = result.errors().count();
        eprintln!("build failed with {} error{}", errors, if errors == 1 { "" } else { "s" });
        return Ok(false);
    };

    match &args.output {
        Some(path) => {
            let mut code = code.clone();
            if let Some(map) = &result.source_map {
                let map_path = map_path_for(path);
                let json = map.to_json().context("failed to serialize source map")?;
                fs::write(&map_path, json)
                    .with_context(|| format!("failed to write '{}'", map_path.display()))?;
                if let Some(name) = map_path.file_name() {
                    code.push_str(&format!("//# sourceMappingURL={}\n", name.to_string_lossy()));
                }
            }
            fs::write(path, code).with_context(|| format!("failed to write '{}'", path.display()))?;
            debug!(path = %path.display(), "wrote output");
        }
        None => print!("{}", code),
    }

    Ok(true)
}

fn map_path_for(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".map");
    PathBuf::from(name)
}

fn run_lexer(path: &Path) -> Result<bool> {
    let source = read_source(path)?;
    println!("=== Lexer Output for {} ===\n", path.display());

    let tokens = match Lexer::tokenize(&source) {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("Lexer error: {}", e);
            return Ok(false);
        }
    };

    println!("{:<10} {:<12} {:<12} {}", "POSITION", "SPAN", "CLASS", "VALUE");
    println!("{}", "-".repeat(60));

    for spanned in &tokens {
        let position = format!("{}:{}", spanned.span.line, spanned.span.column);
        let span = format!("{}..{}", spanned.span.start, spanned.span.end);
        println!("{:<10} {:<12} {:<12} {}", position, span, spanned.token.class(), spanned.token);
    }

    println!("\n=== Summary ===");
    println!("Total tokens: {}", tokens.len());
    for class in [
        TokenClass::Keyword,
        TokenClass::Identifier,
        TokenClass::Literal,
        TokenClass::Operator,
        TokenClass::Punctuation,
    ] {
        let count = tokens.iter().filter(|t| t.token.class() == class).count();
        println!("  {:<12} {}", format!("{}:", class), count);
    }

    Ok(true)
}

fn run_parser(path: &Path) -> Result<bool> {
    let source = read_source(path)?;
    println!("=== Parser Output for {} ===\n", path.display());

    let tokens = match Lexer::tokenize(&source) {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("Lexer error: {}", e);
            return Ok(false);
        }
    };

    match tern_parser::parse(tokens) {
        Ok(program) => {
            println!("{}", program.pretty_print());
            println!("=== Summary ===");
            println!("Statements: {}", program.stmts.len());
            Ok(true)
        }
        Err(e) => {
            let diagnostic =
                Diagnostic::error(e.message.clone()).with_location(path.display().to_string(), e.line(), e.column());
            eprint!("{}", diagnostic.render(Some(&source)));
            Ok(false)
        }
    }
}

fn run_resolver(files: &[PathBuf], mode: CompileMode) -> Result<bool> {
    let sources = read_sources(files)?;
    let mut diagnostics = Diagnostics::new();
    let options = LinkOptions {
        mode,
        ..LinkOptions::default()
    };

    let linked = match tern_resolve::link(&sources, &options, &mut diagnostics) {
        Ok(linked) => linked,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(false);
        }
    };

    println!("=== File Order ===");
    for (i, file) in linked.order.iter().enumerate() {
        println!("  {}. {}", i + 1, file);
    }

    println!("\n=== Namespaces ===");
    for (name, namespace) in linked.namespaces.iter() {
        let label = if name.is_empty() { "<root>" } else { name.as_str() };
        let main = match &namespace.main_file {
            Some(file) => format!(" (main in {})", file),
            None => String::new(),
        };
        println!("{}{}", label, main);
        for entry in namespace.symbols.values() {
            let kind = match entry.kind {
                SymbolKind::Variable => "let",
                SymbolKind::Function => "micro",
                SymbolKind::Class => "class",
                SymbolKind::Foreign => "foreign",
            };
            println!("  {:<8} {:<20} -> {}", kind, entry.name, entry.unique_name);
        }
    }

    println!("\n=== Imports ===");
    for file in &linked.order {
        let search = linked.usings.search_path(file);
        if !search.is_empty() {
            println!("  {}: {}", file, search.join(", "));
        }
    }

    let diagnostics = diagnostics.into_vec();
    report(&diagnostics, &sources);
    Ok(!diagnostics.iter().any(Diagnostic::is_error))
}
