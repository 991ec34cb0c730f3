//! Reference rewriting - replaces names of namespace symbols with their unique names

use std::collections::{HashMap, HashSet};

use tern_ast::*;
use tern_diagnostics::Diagnostics;
use tern_lexer::Span;
use tracing::trace;

use crate::ImplicitMemberCallPolicy;
use crate::namespace::NamespaceTable;

/// Lexical scope of locals; locals shadow namespace symbols
#[derive(Debug, Clone, Default)]
struct Scope {
    /// Names defined in this scope
    names: HashMap<String, Span>,
    /// Parent scope
    parent: Option<Box<Scope>>,
}

impl Scope {
    fn with_parent(parent: Scope) -> Self {
        Self {
            names: HashMap::new(),
            parent: Some(Box::new(parent)),
        }
    }

    fn define(&mut self, name: String, span: Span) {
        self.names.insert(name, span);
    }

    fn lookup(&self, name: &str) -> Option<Span> {
        if let Some(span) = self.names.get(name) {
            Some(*span)
        } else if let Some(parent) = &self.parent {
            parent.lookup(name)
        } else {
            None
        }
    }
}

/// Class whose members are being rewritten
struct ClassContext {
    name: String,
    members: HashSet<String>,
}

pub(crate) struct Rewriter<'a> {
    table: &'a NamespaceTable,
    file: &'a str,
    /// Namespace the statement was declared in
    namespace: &'a str,
    /// Imported namespaces, in lookup order
    search: Vec<String>,
    scope: Scope,
    class: Option<ClassContext>,
    policy: ImplicitMemberCallPolicy,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Rewriter<'a> {
    pub fn new(
        table: &'a NamespaceTable,
        file: &'a str,
        namespace: &'a str,
        search: Vec<String>,
        policy: ImplicitMemberCallPolicy,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            table,
            file,
            namespace,
            search,
            scope: Scope::default(),
            class: None,
            policy,
            diagnostics,
        }
    }

    fn push_scope(&mut self) {
        let old_scope = std::mem::take(&mut self.scope);
        self.scope = Scope::with_parent(old_scope);
    }

    fn pop_scope(&mut self) {
        if let Some(parent) = self.scope.parent.take() {
            self.scope = *parent;
        }
    }

    fn define_params(&mut self, params: &[Param]) {
        for param in params {
            self.scope.define(param.name.name.clone(), param.name.span);
        }
    }

    /// Unique name of an unqualified or `::`-qualified symbol reference.
    /// Locals, `self` and `Self` never resolve.
    fn resolve_name(&self, name: &str) -> Option<String> {
        if name == "self" || name == "Self" || self.scope.lookup(name).is_some() {
            return None;
        }

        if let Some((namespace, member)) = name.rsplit_once("::") {
            return self
                .table
                .lookup(namespace.trim_start_matches("::"), member)
                .map(|entry| entry.unique_name.clone());
        }

        std::iter::once(self.namespace)
            .chain(self.search.iter().map(String::as_str))
            .chain(std::iter::once(""))
            .find_map(|ns| self.table.lookup(ns, name))
            .map(|entry| entry.unique_name.clone())
    }

    // === Statements ===

    /// Rewrite a collected top-level statement. Its own declaration was
    /// already registered, so only the parts that reference other names change.
    pub fn rewrite_top_level(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::Namespace(_) | StmtKind::Using(_) | StmtKind::Foreign(_) => {}
            StmtKind::Let(l) => {
                if let Some(init) = &mut l.init {
                    self.rewrite_expr(init);
                }
            }
            StmtKind::Function(f) => self.rewrite_function(&f.params, &mut f.body),
            StmtKind::Class(c) => self.rewrite_class(c),
            _ => self.rewrite_stmt(stmt),
        }
    }

    fn rewrite_stmt(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::Namespace(_) | StmtKind::Using(_) | StmtKind::Foreign(_) => {}
            StmtKind::Let(l) => {
                if let Some(init) = &mut l.init {
                    self.rewrite_expr(init);
                }
                self.scope.define(l.name.name.clone(), l.name.span);
            }
            StmtKind::Function(f) => {
                // Named local function: visible to itself and the rest of the block
                self.scope.define(f.name.name.clone(), f.name.span);
                self.rewrite_function(&f.params, &mut f.body);
            }
            StmtKind::Class(c) => {
                self.scope.define(c.name.name.clone(), c.name.span);
                self.rewrite_class(c);
            }
            StmtKind::If(i) => self.rewrite_if(i),
            StmtKind::While(cond, body) | StmtKind::Until(cond, body) => {
                self.rewrite_expr(cond);
                self.rewrite_block(body);
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.rewrite_expr(value);
                }
            }
            StmtKind::Block(b) => self.rewrite_block(b),
            StmtKind::Expr(e) => self.rewrite_expr(e),
        }
    }

    fn rewrite_if(&mut self, stmt: &mut IfStmt) {
        self.rewrite_expr(&mut stmt.cond);
        self.rewrite_block(&mut stmt.then_block);
        match &mut stmt.else_branch {
            Some(ElseBranch::Block(b)) => self.rewrite_block(b),
            Some(ElseBranch::If(i)) => self.rewrite_if(i),
            None => {}
        }
    }

    fn rewrite_block(&mut self, block: &mut Block) {
        self.push_scope();
        for stmt in &mut block.stmts {
            self.rewrite_stmt(stmt);
        }
        self.pop_scope();
    }

    fn rewrite_function(&mut self, params: &[Param], body: &mut Block) {
        self.push_scope();
        self.define_params(params);
        self.rewrite_block(body);
        self.pop_scope();
    }

    fn rewrite_class(&mut self, class: &mut ClassDecl) {
        if let Some(extends) = &mut class.extends {
            self.rewrite_type(extends);
        }
        for ty in &mut class.implements {
            self.rewrite_type(ty);
        }

        let context = ClassContext {
            name: class.name.name.clone(),
            members: class
                .members
                .iter()
                .filter_map(|m| match m {
                    ClassMember::Method(m) => Some(m.name.name.clone()),
                    ClassMember::Field(f) => Some(f.name.name.clone()),
                    ClassMember::Constructor(_) => None,
                })
                .collect(),
        };
        let outer = self.class.replace(context);

        for member in &mut class.members {
            match member {
                ClassMember::Constructor(c) => {
                    // JavaScript constructors cannot be async
                    if c.body.contains_await() {
                        self.diagnostics.error(
                            self.file,
                            c.span.line,
                            c.span.column,
                            format!("constructor of '{}' cannot use 'await'", class.name.name),
                        );
                    }
                    self.rewrite_function(&c.params, &mut c.body);
                }
                ClassMember::Method(m) => {
                    if let Some(body) = &mut m.body {
                        self.rewrite_function(&m.params, body);
                    }
                }
                ClassMember::Field(f) => {
                    if let Some(init) = &mut f.init {
                        self.rewrite_expr(init);
                    }
                }
            }
        }

        self.class = outer;
    }

    /// Only named types that can exist at runtime are rewritten
    fn rewrite_type(&mut self, ty: &mut TypeExpr) {
        match &mut ty.kind {
            TypeKind::Named(name, args) => {
                if let Some(unique) = self.resolve_name(&name.name) {
                    name.name = unique;
                }
                for arg in args {
                    self.rewrite_type(arg);
                }
            }
            TypeKind::Binary(l, _, r) => {
                self.rewrite_type(l);
                self.rewrite_type(r);
            }
            TypeKind::Array(elem) => self.rewrite_type(elem),
            TypeKind::Unit => {}
        }
    }

    // === Expressions ===

    fn rewrite_expr(&mut self, expr: &mut Expr) {
        // `a::b::c` naming a namespace symbol collapses into one identifier
        if let ExprKind::StaticMember(..) = expr.kind {
            if let Some(unique) = static_path(expr).and_then(|path| self.resolve_name(&path)) {
                trace!(file = self.file, unique = %unique, "qualified reference");
                expr.kind = ExprKind::Ident(Ident::new(unique, expr.span));
                return;
            }
        }

        match &mut expr.kind {
            ExprKind::Number(_) | ExprKind::String(_) | ExprKind::Bool(_) => {}
            ExprKind::Ident(id) => {
                if let Some(unique) = self.resolve_name(&id.name) {
                    id.name = unique;
                }
            }
            ExprKind::Binary(l, _, r) | ExprKind::Assign(l, r) | ExprKind::Index(l, r) => {
                self.rewrite_expr(l);
                self.rewrite_expr(r);
            }
            ExprKind::Unary(_, operand) => self.rewrite_expr(operand),
            ExprKind::Is(operand, ty, _) | ExprKind::As(operand, ty, _) => {
                self.rewrite_expr(operand);
                self.rewrite_type(ty);
            }
            ExprKind::Call(callee, args, closure) => {
                if let ExprKind::Ident(id) = &callee.kind {
                    self.check_implicit_member_call(id);
                }
                self.rewrite_expr(callee);
                for arg in args {
                    self.rewrite_expr(arg);
                }
                if let Some(block) = closure {
                    self.rewrite_block(block);
                }
            }
            ExprKind::Field(receiver, _) | ExprKind::StaticMember(receiver, _) => {
                self.rewrite_expr(receiver)
            }
            ExprKind::Array(elements) => {
                for element in elements {
                    self.rewrite_expr(element);
                }
            }
            ExprKind::Object(fields) => {
                for field in fields {
                    self.rewrite_expr(&mut field.value);
                }
            }
            ExprKind::Lambda(params, body) => self.rewrite_function(params, body),
            ExprKind::New(class, args) => {
                if let Some(unique) = self.resolve_name(&class.name) {
                    class.name = unique;
                }
                for arg in args {
                    self.rewrite_expr(arg);
                }
            }
        }
    }

    /// A bare call inside a class body that names one of the class's own
    /// members rather than any known function
    fn check_implicit_member_call(&mut self, callee: &Ident) {
        let Some(class) = &self.class else {
            return;
        };
        if !class.members.contains(&callee.name)
            || self.scope.lookup(&callee.name).is_some()
            || self.resolve_name(&callee.name).is_some()
        {
            return;
        }

        let message = format!(
            "call to '{}' inside class '{}' refers to a class member; use 'self.{}' or 'Self::{}'",
            callee.name, class.name, callee.name, callee.name
        );
        let (line, column) = (callee.span.line, callee.span.column);
        match self.policy {
            ImplicitMemberCallPolicy::Ignore => {}
            ImplicitMemberCallPolicy::Warn => self.diagnostics.warning(self.file, line, column, message),
            ImplicitMemberCallPolicy::Error => self.diagnostics.error(self.file, line, column, message),
        }
    }
}

/// `a::b::c` as a single path string, if the chain is made of plain identifiers
fn static_path(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Ident(id) if id.name != "self" && id.name != "Self" => Some(id.name.clone()),
        ExprKind::StaticMember(receiver, member) => {
            static_path(receiver).map(|base| format!("{}::{}", base, member.name))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::{SymbolEntry, SymbolKind, mangle};
    use tern_lexer::Lexer;

    fn table() -> NamespaceTable {
        let mut table = NamespaceTable::new();
        for (ns, name, kind) in [
            ("app", "f", SymbolKind::Function),
            ("app", "Point", SymbolKind::Class),
            ("lib::math", "sqrt", SymbolKind::Function),
            ("", "log", SymbolKind::Foreign),
        ] {
            table.define(
                ns,
                SymbolEntry {
                    kind,
                    name: name.to_string(),
                    unique_name: mangle(ns, name),
                    file: "a.tn".to_string(),
                    span: Span::default(),
                },
            );
        }
        table
    }

    fn rewrite(source: &str, policy: ImplicitMemberCallPolicy) -> (Program, Diagnostics) {
        let mut program = tern_parser::parse(Lexer::tokenize(source).unwrap()).unwrap();
        let table = table();
        let mut diags = Diagnostics::new();
        let mut rewriter = Rewriter::new(&table, "a.tn", "app", vec!["lib::math".to_string()], policy, &mut diags);
        for stmt in &mut program.stmts {
            rewriter.rewrite_top_level(stmt);
        }
        (program, diags)
    }

    fn expr_text(program: &Program, index: usize) -> String {
        match &program.stmts[index].kind {
            StmtKind::Expr(e) => e.pretty_print(),
            other => panic!("expected expression, got {:?}", other),
        }
    }

    #[test]
    fn test_rewrites_current_namespace_imports_and_root() {
        let (program, _) = rewrite("f(1)\nsqrt(2)\nlog(3)\nconsole(4)", ImplicitMemberCallPolicy::Warn);
        assert_eq!(expr_text(&program, 0), "app_f(1)");
        assert_eq!(expr_text(&program, 1), "lib_math_sqrt(2)");
        assert_eq!(expr_text(&program, 2), "log(3)");
        assert_eq!(expr_text(&program, 3), "console(4)");
    }

    #[test]
    fn test_qualified_references_collapse() {
        let (program, _) = rewrite("lib::math::sqrt(2)\nnew app::Point(1)\nPoint::origin()", ImplicitMemberCallPolicy::Warn);
        assert_eq!(expr_text(&program, 0), "lib_math_sqrt(2)");
        assert_eq!(expr_text(&program, 1), "new app_Point(1)");
        assert_eq!(expr_text(&program, 2), "app_Point::origin()");
    }

    #[test]
    fn test_locals_shadow_symbols() {
        let source = "micro g(f) { return f(1) }\nmicro h() { let sqrt = 1; return sqrt + f(2) }";
        let (program, _) = rewrite(source, ImplicitMemberCallPolicy::Warn);
        let StmtKind::Function(g) = &program.stmts[0].kind else { panic!() };
        let StmtKind::Return(Some(v)) = &g.body.stmts[0].kind else { panic!() };
        assert_eq!(v.pretty_print(), "f(1)");
        let StmtKind::Function(h) = &program.stmts[1].kind else { panic!() };
        let StmtKind::Return(Some(v)) = &h.body.stmts[1].kind else { panic!() };
        assert_eq!(v.pretty_print(), "(sqrt + app_f(2))");
    }

    #[test]
    fn test_type_tests_and_extends_are_rewritten() {
        let (program, _) = rewrite("x is Point\nclass Circle extends Point {}", ImplicitMemberCallPolicy::Warn);
        assert_eq!(expr_text(&program, 0), "(x is app_Point)");
        let StmtKind::Class(c) = &program.stmts[1].kind else { panic!() };
        assert_eq!(c.extends.as_ref().unwrap().pretty_print(), "app_Point");
    }

    #[test]
    fn test_implicit_member_call_policy() {
        let source = "class C { helper(self) { return 1 } run(self) { return helper() } }";

        let (_, diags) = rewrite(source, ImplicitMemberCallPolicy::Warn);
        assert_eq!(diags.warnings().len(), 1);
        assert!(diags.warnings()[0].message.contains("self.helper"));

        let (_, diags) = rewrite(source, ImplicitMemberCallPolicy::Error);
        assert_eq!(diags.errors().len(), 1);

        let (_, diags) = rewrite(source, ImplicitMemberCallPolicy::Ignore);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_await_in_constructor_is_an_error() {
        let (_, diags) = rewrite("class C { constructor(x) { self.x = await x } }", ImplicitMemberCallPolicy::Warn);
        assert_eq!(diags.errors().len(), 1);
        assert!(diags.errors()[0].message.contains("constructor of 'C'"));

        let source = "class D { constructor() { self.load = micro () { await go() } } }";
        let (_, diags) = rewrite(source, ImplicitMemberCallPolicy::Warn);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_local_shadowing_a_member_is_not_reported() {
        let source = "class C { helper(self) { return 1 } run(self, helper) { return helper() } \
                      other(self) { let helper = self.helper; return helper() } }";
        let (_, diags) = rewrite(source, ImplicitMemberCallPolicy::Error);
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn test_member_call_matching_a_function_is_not_reported() {
        let source = "class C { f(self) { return f() } }";
        let (program, diags) = rewrite(source, ImplicitMemberCallPolicy::Warn);
        assert!(diags.is_empty());
        let StmtKind::Class(c) = &program.stmts[0].kind else { panic!() };
        let body = c.methods().next().unwrap().body.as_ref().unwrap();
        let StmtKind::Return(Some(v)) = &body.stmts[0].kind else { panic!() };
        assert_eq!(v.pretty_print(), "app_f()");
    }
}
