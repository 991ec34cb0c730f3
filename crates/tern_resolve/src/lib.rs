//! Namespace resolution and dependency ordering
//!
//! This crate links independently parsed files into one program by:
//! 1. Lexing and parsing every file (parse errors become diagnostics)
//! 2. Ordering files so that namespace providers come before importers
//! 3. Registering declarations per namespace and assigning unique names
//! 4. Rewriting references to those unique names
//! 5. Emitting declarations before any executable statement

mod collect;
mod graph;
mod namespace;
mod resolve;

use std::collections::{BTreeMap, HashMap};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tern_ast::Program;
use tern_diagnostics::{Diagnostic, Diagnostics};
use tern_lexer::{FileId, LexError, Lexer};
use thiserror::Error;
use tracing::debug;

pub use graph::{DependencyGraph, TopoOrder};
pub use namespace::{Namespace, NamespaceTable, SymbolEntry, SymbolKind, UsingImport, UsingTable, mangle};

use collect::Collector;
use resolve::Rewriter;

/// Strictness of namespace rules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompileMode {
    /// Single ad hoc file; namespaces are optional
    Repl,
    /// Every file declares exactly one main namespace
    #[default]
    Standard,
}

/// What to do with a bare call that names a member of the enclosing class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImplicitMemberCallPolicy {
    #[default]
    Warn,
    Ignore,
    Error,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LinkOptions {
    pub mode: CompileMode,
    pub implicit_member_calls: ImplicitMemberCallPolicy,
}

/// Hard failure that aborts linking
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("{file}: {source}")]
    Lex {
        file: String,
        #[source]
        source: LexError,
    },
}

/// A successfully parsed source file
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub name: String,
    pub program: Program,
}

/// The integrated program and the tables it was resolved against
#[derive(Debug, Clone)]
pub struct LinkedProgram {
    pub program: Program,
    /// File names indexed by `FileId`
    pub files: Vec<String>,
    /// Files in dependency order
    pub order: Vec<String>,
    pub namespaces: NamespaceTable,
    pub usings: UsingTable,
}

impl LinkedProgram {
    pub fn file_name(&self, id: FileId) -> Option<&str> {
        self.files.get(id as usize).map(String::as_str)
    }
}

/// Lex and parse each file. `FileId`s follow the map's (sorted) key order.
/// Parse errors are reported and the file is skipped; lex errors abort.
pub fn parse_files(
    sources: &BTreeMap<String, String>,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<ParsedFile>, LinkError> {
    let mut parsed = Vec::with_capacity(sources.len());

    for (id, (name, source)) in sources.iter().enumerate() {
        let tokens = Lexer::tokenize_file(id as FileId, source).map_err(|source| LinkError::Lex {
            file: name.clone(),
            source,
        })?;

        match tern_parser::parse(tokens) {
            Ok(program) => {
                debug!(file = %name, statements = program.stmts.len(), "parsed");
                parsed.push(ParsedFile {
                    name: name.clone(),
                    program,
                });
            }
            Err(err) => diagnostics.error(name, err.line(), err.column(), err.message),
        }
    }

    Ok(parsed)
}

/// Link every source file into one program
pub fn link(
    sources: &BTreeMap<String, String>,
    options: &LinkOptions,
    diagnostics: &mut Diagnostics,
) -> Result<LinkedProgram, LinkError> {
    let parsed = parse_files(sources, diagnostics)?;

    let graph = DependencyGraph::build(&parsed);
    let TopoOrder { order, cycles } = graph.topo_order();
    debug!(?order, "dependency order");
    for cycle in cycles {
        diagnostics.push(
            Diagnostic::warning(format!("circular dependency: {}", cycle.join(" -> "))).with_file(&cycle[0]),
        );
    }

    let mut by_name: HashMap<String, ParsedFile> =
        parsed.into_iter().map(|file| (file.name.clone(), file)).collect();

    let mut collector = Collector::new(options.mode);
    for name in &order {
        if let Some(file) = by_name.remove(name) {
            collector.collect_file(file, diagnostics);
        }
    }

    let Collector {
        table,
        usings,
        buckets,
        ..
    } = collector;
    debug!(namespaces = table.len(), "collected declarations");

    let mut program = Program::default();
    for mut pending in buckets.into_ordered() {
        let search = usings.search_path(&pending.file);
        let mut rewriter = Rewriter::new(
            &table,
            &pending.file,
            &pending.namespace,
            search,
            options.implicit_member_calls,
            diagnostics,
        );
        rewriter.rewrite_top_level(&mut pending.stmt);
        program.stmts.push(pending.stmt);
    }

    Ok(LinkedProgram {
        program,
        files: sources.keys().cloned().collect(),
        order,
        namespaces: table,
        usings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_ast::StmtKind;

    fn sources(files: &[(&str, &str)]) -> BTreeMap<String, String> {
        files.iter().map(|(n, s)| (n.to_string(), s.to_string())).collect()
    }

    fn standard() -> LinkOptions {
        LinkOptions {
            mode: CompileMode::Standard,
            implicit_member_calls: ImplicitMemberCallPolicy::Warn,
        }
    }

    #[test]
    fn test_link_orders_providers_first() {
        let files = sources(&[
            ("a_main.tn", "namespace! app; using util; micro main() { helper() }"),
            ("z_util.tn", "namespace! util; micro helper() { return 1 }"),
        ]);
        let mut diags = Diagnostics::new();
        let linked = link(&files, &standard(), &mut diags).unwrap();

        assert!(!diags.has_errors(), "{:?}", diags);
        assert_eq!(linked.order, vec!["z_util.tn", "a_main.tn"]);

        let names: Vec<_> = linked
            .program
            .stmts
            .iter()
            .filter_map(|s| match &s.kind {
                StmtKind::Function(f) => f.unique_name.clone(),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["util_helper", "app_main"]);
    }

    #[test]
    fn test_parse_error_is_diagnostic_for_its_file() {
        let files = sources(&[("bad.tn", "namespace! bad; let = 1"), ("good.tn", "namespace! good;")]);
        let mut diags = Diagnostics::new();
        let linked = link(&files, &standard(), &mut diags).unwrap();

        assert_eq!(diags.errors().len(), 1);
        assert_eq!(diags.errors()[0].file, "bad.tn");
        assert_eq!(linked.order, vec!["good.tn"]);
        assert_eq!(linked.file_name(1), Some("good.tn"));
    }

    #[test]
    fn test_lex_error_aborts_with_file_name() {
        let files = sources(&[("a.tn", "let s = \"open")]);
        let mut diags = Diagnostics::new();
        let err = link(&files, &standard(), &mut diags).unwrap_err();
        let LinkError::Lex { file, source } = err;
        assert_eq!(file, "a.tn");
        assert!(matches!(source, LexError::UnterminatedString { .. }));
    }

    #[test]
    fn test_cycle_warns_without_failing() {
        let files = sources(&[
            ("a.tn", "namespace! a; using b; micro fa() { fb() }"),
            ("b.tn", "namespace! b; using a; micro fb() { fa() }"),
        ]);
        let mut diags = Diagnostics::new();
        let linked = link(&files, &standard(), &mut diags).unwrap();

        assert!(!diags.has_errors());
        assert_eq!(diags.warnings().len(), 1);
        assert!(diags.warnings()[0].message.contains("a.tn -> b.tn -> a.tn"));
        assert_eq!(linked.order, vec!["b.tn", "a.tn"]);
    }

    #[test]
    fn test_global_using_reaches_every_file() {
        let files = sources(&[
            ("a.tn", "namespace! app; micro main() { shout() }"),
            ("b.tn", "namespace! other; micro run() { shout() }"),
            ("std.tn", "namespace! std; using ::std; micro shout() {}"),
        ]);
        let mut diags = Diagnostics::new();
        let linked = link(&files, &standard(), &mut diags).unwrap();
        assert!(!diags.has_errors());

        // Two rewritten call sites plus the declaration itself
        let text = linked.program.pretty_print();
        assert_eq!(text.matches("std_shout").count(), 3);
    }
}
