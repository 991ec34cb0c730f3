//! Namespace and import tables shared by the collector and the rewriter

use indexmap::{IndexMap, IndexSet};
use tern_lexer::Span;

/// Kind of a namespace-level symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Class,
    Foreign,
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolKind::Variable => write!(f, "variable"),
            SymbolKind::Function => write!(f, "function"),
            SymbolKind::Class => write!(f, "class"),
            SymbolKind::Foreign => write!(f, "foreign function"),
        }
    }
}

/// A declaration registered under a namespace
#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub kind: SymbolKind,
    pub name: String,
    pub unique_name: String,
    /// File holding the declaration
    pub file: String,
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct Namespace {
    pub symbols: IndexMap<String, SymbolEntry>,
    /// Files that declared this namespace, in registration order
    pub files: IndexSet<String>,
    /// First file that marked this namespace as its main namespace
    pub main_file: Option<String>,
}

/// All namespaces of one compilation, keyed by clean path (`app::core`)
#[derive(Debug, Clone, Default)]
pub struct NamespaceTable {
    namespaces: IndexMap<String, Namespace>,
}

impl NamespaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `file` contributes to `name`, creating the namespace if needed
    pub fn declare(&mut self, name: &str, file: &str) -> &mut Namespace {
        let ns = self.namespaces.entry(name.to_string()).or_default();
        ns.files.insert(file.to_string());
        ns
    }

    /// Mark `name` as the main namespace of `file`.
    /// Fails with the first file if another file already claimed it.
    pub fn mark_main(&mut self, name: &str, file: &str) -> Result<(), String> {
        let ns = self.declare(name, file);
        match &ns.main_file {
            Some(first) => Err(first.clone()),
            None => {
                ns.main_file = Some(file.to_string());
                Ok(())
            }
        }
    }

    /// Register a symbol, returning the entry it replaced
    pub fn define(&mut self, namespace: &str, entry: SymbolEntry) -> Option<SymbolEntry> {
        let ns = self.namespaces.entry(namespace.to_string()).or_default();
        ns.files.insert(entry.file.clone());
        ns.symbols.insert(entry.name.clone(), entry)
    }

    pub fn get(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.get(name)
    }

    pub fn lookup(&self, namespace: &str, name: &str) -> Option<&SymbolEntry> {
        self.namespaces.get(namespace)?.symbols.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Namespace)> {
        self.namespaces.iter()
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

/// Globally unique name for `name` declared in `namespace`: `app::core` + `f` => `app_core_f`
pub fn mangle(namespace: &str, name: &str) -> String {
    let namespace = namespace.trim_end_matches('!');
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}_{}", namespace.replace("::", "_"), name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsingImport {
    pub target: String,
    pub is_global: bool,
    pub span: Span,
}

/// Imports per file, in declaration order
#[derive(Debug, Clone, Default)]
pub struct UsingTable {
    per_file: IndexMap<String, Vec<UsingImport>>,
}

impl UsingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, file: &str, import: UsingImport) {
        self.per_file.entry(file.to_string()).or_default().push(import);
    }

    pub fn imports(&self, file: &str) -> &[UsingImport] {
        self.per_file.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Targets of every global import of the compilation, first occurrence wins
    pub fn globals(&self) -> IndexSet<&str> {
        self.per_file
            .values()
            .flatten()
            .filter(|u| u.is_global)
            .map(|u| u.target.as_str())
            .collect()
    }

    /// Namespaces searched for unqualified names in `file`:
    /// the file's own imports first, then every global import
    pub fn search_path(&self, file: &str) -> Vec<String> {
        let mut path: IndexSet<String> = self
            .imports(file)
            .iter()
            .filter(|u| !u.is_global)
            .map(|u| u.target.clone())
            .collect();
        path.extend(self.globals().into_iter().map(str::to_string));
        path.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, namespace: &str, file: &str) -> SymbolEntry {
        SymbolEntry {
            kind: SymbolKind::Function,
            name: name.to_string(),
            unique_name: mangle(namespace, name),
            file: file.to_string(),
            span: Span::default(),
        }
    }

    #[test]
    fn test_mangle() {
        assert_eq!(mangle("", "f"), "f");
        assert_eq!(mangle("app", "f"), "app_f");
        assert_eq!(mangle("app::core", "f"), "app_core_f");
        assert_eq!(mangle("app!", "f"), "app_f");
    }

    #[test]
    fn test_second_main_claim_reports_first_file() {
        let mut table = NamespaceTable::new();
        assert!(table.mark_main("app", "a.tn").is_ok());
        assert_eq!(table.mark_main("app", "b.tn"), Err("a.tn".to_string()));
        let ns = table.get("app").unwrap();
        assert_eq!(ns.main_file.as_deref(), Some("a.tn"));
        assert_eq!(ns.files.len(), 2);
    }

    #[test]
    fn test_define_and_lookup() {
        let mut table = NamespaceTable::new();
        assert!(table.define("app", entry("f", "app", "a.tn")).is_none());
        assert!(table.define("app", entry("f", "app", "b.tn")).is_some());
        assert_eq!(table.lookup("app", "f").unwrap().file, "b.tn");
        assert!(table.lookup("app", "g").is_none());
        assert!(table.lookup("lib", "f").is_none());
    }

    #[test]
    fn test_search_path_puts_globals_last() {
        let mut usings = UsingTable::new();
        let import = |target: &str, is_global| UsingImport {
            target: target.to_string(),
            is_global,
            span: Span::default(),
        };
        usings.record("a.tn", import("std", true));
        usings.record("b.tn", import("lib", false));
        usings.record("b.tn", import("util", false));

        assert_eq!(usings.search_path("b.tn"), vec!["lib", "util", "std"]);
        assert_eq!(usings.search_path("a.tn"), vec!["std"]);
        assert_eq!(usings.search_path("c.tn"), vec!["std"]);
    }
}
