//! File dependency graph built from `namespace` and `using` declarations

use std::collections::HashSet;

use indexmap::IndexMap;
use tern_ast::StmtKind;
use tracing::trace;

use crate::ParsedFile;

/// Edges from each file to the files providing the namespaces it imports
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: IndexMap<String, Vec<String>>,
}

/// Result of the topological sort
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopoOrder {
    /// Every file, providers before importers
    pub order: Vec<String>,
    /// Each back edge found, as the path that closes the cycle: `a -> b -> a`
    pub cycles: Vec<Vec<String>>,
}

impl DependencyGraph {
    pub fn build(files: &[ParsedFile]) -> Self {
        // Namespace path -> first file declaring it
        let mut providers: IndexMap<String, &str> = IndexMap::new();
        for file in files {
            for stmt in &file.program.stmts {
                if let StmtKind::Namespace(ns) = &stmt.kind {
                    providers.entry(ns.clean_name()).or_insert(&file.name);
                }
            }
        }

        // `using ::x` makes every file an importer of `x`
        let mut globals: Vec<String> = Vec::new();
        for file in files {
            for stmt in &file.program.stmts {
                if let StmtKind::Using(using) = &stmt.kind {
                    let target = using.target();
                    if using.is_global && !globals.contains(&target) {
                        globals.push(target);
                    }
                }
            }
        }

        let mut edges = IndexMap::new();
        for file in files {
            let mut deps: Vec<String> = Vec::new();
            let own = file.program.stmts.iter().filter_map(|stmt| match &stmt.kind {
                StmtKind::Using(using) => Some(using.target()),
                _ => None,
            });
            for target in own.chain(globals.iter().cloned()) {
                let Some(&provider) = providers.get(&target) else {
                    continue;
                };
                if provider != file.name && !deps.iter().any(|d| d == provider) {
                    trace!(importer = %file.name, provider, "dependency edge");
                    deps.push(provider.to_string());
                }
            }
            edges.insert(file.name.clone(), deps);
        }

        Self { edges }
    }

    pub fn dependencies(&self, file: &str) -> &[String] {
        self.edges.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Depth-first topological order. Cycles do not stop the sort: the file
    /// closing a cycle is simply not revisited, and the cycle is reported.
    pub fn topo_order(&self) -> TopoOrder {
        let mut result = TopoOrder::default();
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for file in self.edges.keys() {
            if !visited.contains(file.as_str()) {
                self.visit(file, &mut visited, &mut stack, &mut result);
            }
        }

        result
    }

    fn visit<'a>(
        &'a self,
        file: &'a str,
        visited: &mut HashSet<&'a str>,
        stack: &mut Vec<&'a str>,
        result: &mut TopoOrder,
    ) {
        visited.insert(file);
        stack.push(file);

        for dep in self.dependencies(file) {
            if let Some(pos) = stack.iter().position(|f| *f == dep) {
                let mut cycle: Vec<String> = stack[pos..].iter().map(|f| f.to_string()).collect();
                cycle.push(dep.clone());
                result.cycles.push(cycle);
            } else if !visited.contains(dep.as_str()) {
                self.visit(dep, visited, stack, result);
            }
        }

        stack.pop();
        result.order.push(file.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_lexer::Lexer;

    fn file(name: &str, source: &str) -> ParsedFile {
        let tokens = Lexer::tokenize(source).unwrap();
        ParsedFile {
            name: name.to_string(),
            program: tern_parser::parse(tokens).unwrap(),
        }
    }

    #[test]
    fn test_provider_precedes_importer() {
        let files = vec![
            file("a.tn", "namespace! app; using lib;"),
            file("b.tn", "namespace! lib;"),
        ];
        let graph = DependencyGraph::build(&files);
        assert_eq!(graph.dependencies("a.tn"), ["b.tn".to_string()]);

        let topo = graph.topo_order();
        assert_eq!(topo.order, vec!["b.tn", "a.tn"]);
        assert!(topo.cycles.is_empty());
    }

    #[test]
    fn test_self_import_and_unknown_namespace_add_no_edges() {
        let files = vec![file("a.tn", "namespace! app; using app; using missing;")];
        let graph = DependencyGraph::build(&files);
        assert!(graph.dependencies("a.tn").is_empty());
    }

    #[test]
    fn test_cycle_is_reported_but_order_is_complete() {
        let files = vec![
            file("a.tn", "namespace! a; using b;"),
            file("b.tn", "namespace! b; using a;"),
        ];
        let topo = DependencyGraph::build(&files).topo_order();
        assert_eq!(topo.order, vec!["b.tn", "a.tn"]);
        assert_eq!(topo.cycles, vec![vec!["a.tn", "b.tn", "a.tn"]]);
    }

    #[test]
    fn test_global_import_provider_precedes_every_file() {
        let files = vec![
            file("app.tn", "namespace! app;"),
            file("other.tn", "namespace! other; using app;"),
            file("std.tn", "namespace! std; using ::std;"),
        ];
        let graph = DependencyGraph::build(&files);
        assert_eq!(graph.dependencies("app.tn"), ["std.tn".to_string()]);
        assert_eq!(graph.dependencies("other.tn"), ["app.tn".to_string(), "std.tn".to_string()]);
        assert!(graph.dependencies("std.tn").is_empty());

        let topo = graph.topo_order();
        assert_eq!(topo.order, vec!["std.tn", "app.tn", "other.tn"]);
        assert!(topo.cycles.is_empty());
    }

    #[test]
    fn test_diamond_visits_each_file_once() {
        let files = vec![
            file("a.tn", "namespace! a; using b; using c;"),
            file("b.tn", "namespace! b; using d;"),
            file("c.tn", "namespace! c; using d;"),
            file("d.tn", "namespace! d;"),
        ];
        let topo = DependencyGraph::build(&files).topo_order();
        assert_eq!(topo.order, vec!["d.tn", "b.tn", "c.tn", "a.tn"]);
    }
}
