//! Declaration collection: buckets statements and fills the namespace table

use tern_ast::*;
use tern_diagnostics::{Diagnostic, Diagnostics};
use tracing::trace;

use crate::namespace::{NamespaceTable, SymbolEntry, SymbolKind, UsingImport, UsingTable, mangle};
use crate::{CompileMode, ParsedFile};

/// A top-level statement waiting to be rewritten
#[derive(Debug, Clone)]
pub(crate) struct Pending {
    pub stmt: Stmt,
    pub file: String,
    /// Namespace active where the statement appeared
    pub namespace: String,
}

#[derive(Debug, Clone, Copy)]
enum Bucket {
    Imports,
    Variables,
    Functions,
    Classes,
    Bare,
}

#[derive(Debug, Default)]
pub(crate) struct Buckets {
    imports: Vec<Pending>,
    variables: Vec<Pending>,
    functions: Vec<Pending>,
    classes: Vec<Pending>,
    bare: Vec<Pending>,
}

impl Buckets {
    fn push(&mut self, bucket: Bucket, pending: Pending) {
        match bucket {
            Bucket::Imports => self.imports.push(pending),
            Bucket::Variables => self.variables.push(pending),
            Bucket::Functions => self.functions.push(pending),
            Bucket::Classes => self.classes.push(pending),
            Bucket::Bare => self.bare.push(pending),
        }
    }

    /// Declarations before any executable statement
    pub fn into_ordered(self) -> impl Iterator<Item = Pending> {
        self.imports
            .into_iter()
            .chain(self.variables)
            .chain(self.functions)
            .chain(self.classes)
            .chain(self.bare)
    }
}

pub(crate) struct Collector {
    mode: CompileMode,
    pub table: NamespaceTable,
    pub usings: UsingTable,
    pub buckets: Buckets,
}

impl Collector {
    pub fn new(mode: CompileMode) -> Self {
        Self {
            mode,
            table: NamespaceTable::new(),
            usings: UsingTable::new(),
            buckets: Buckets::default(),
        }
    }

    pub fn collect_file(&mut self, file: ParsedFile, diagnostics: &mut Diagnostics) {
        let ParsedFile { name: file, program } = file;
        let mut namespace = String::new();
        let mut declared = 0usize;
        let mut mains = 0usize;

        for mut stmt in program.stmts {
            let span = stmt.span;
            let bucket = match &mut stmt.kind {
                StmtKind::Namespace(ns) => {
                    namespace = ns.clean_name();
                    declared += 1;
                    self.table.declare(&namespace, &file);
                    if ns.is_main {
                        mains += 1;
                        let claimed = self.table.mark_main(&namespace, &file);
                        if let (Err(first), CompileMode::Standard) = (claimed, self.mode) {
                            diagnostics.error(
                                &file,
                                span.line,
                                span.column,
                                format!(
                                    "duplicate main namespace '{}' (already declared in '{}')",
                                    namespace, first
                                ),
                            );
                        }
                    }
                    trace!(file = %file, namespace = %namespace, "entered namespace");
                    Bucket::Imports
                }
                StmtKind::Using(using) => {
                    self.usings.record(
                        &file,
                        UsingImport {
                            target: using.target(),
                            is_global: using.is_global,
                            span,
                        },
                    );
                    Bucket::Imports
                }
                StmtKind::Foreign(f) => {
                    let unique = self.register(&namespace, &file, SymbolKind::Foreign, &f.name, diagnostics);
                    f.unique_name = Some(unique);
                    Bucket::Imports
                }
                StmtKind::Let(l) => {
                    let unique = self.register(&namespace, &file, SymbolKind::Variable, &l.name, diagnostics);
                    l.unique_name = Some(unique);
                    Bucket::Variables
                }
                StmtKind::Function(f) => {
                    let unique = self.register(&namespace, &file, SymbolKind::Function, &f.name, diagnostics);
                    f.unique_name = Some(unique);
                    Bucket::Functions
                }
                StmtKind::Class(c) => {
                    let unique = self.register(&namespace, &file, SymbolKind::Class, &c.name, diagnostics);
                    c.unique_name = Some(unique);
                    Bucket::Classes
                }
                _ => Bucket::Bare,
            };

            self.buckets.push(
                bucket,
                Pending {
                    stmt,
                    file: file.clone(),
                    namespace: namespace.clone(),
                },
            );
        }

        if self.mode == CompileMode::Standard {
            let problem = if declared == 0 {
                Some("file does not declare a namespace")
            } else if mains == 0 {
                Some("file does not declare a main namespace (mark one with '!')")
            } else if mains > 1 {
                Some("file declares more than one main namespace")
            } else {
                None
            };
            if let Some(message) = problem {
                diagnostics.push(Diagnostic::error(message).with_file(&file));
            }
        }
    }

    fn register(
        &mut self,
        namespace: &str,
        file: &str,
        kind: SymbolKind,
        name: &Ident,
        diagnostics: &mut Diagnostics,
    ) -> String {
        let unique_name = mangle(namespace, &name.name);
        let entry = SymbolEntry {
            kind,
            name: name.name.clone(),
            unique_name: unique_name.clone(),
            file: file.to_string(),
            span: name.span,
        };

        if let Some(previous) = self.table.define(namespace, entry) {
            diagnostics.warning(
                file,
                name.span.line,
                name.span.column,
                format!(
                    "{} '{}' redeclares {} from '{}'",
                    kind, name.name, previous.kind, previous.file
                ),
            );
        }

        trace!(namespace, name = %name.name, unique = %unique_name, %kind, "registered symbol");
        unique_name
    }
}
