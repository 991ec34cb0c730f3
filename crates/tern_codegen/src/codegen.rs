//! JavaScript emission from the linked AST

use std::collections::HashSet;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tern_ast::*;
use tern_lexer::Span;
use tracing::debug;

use crate::source_map::{Mapping, SourceMap, SourceMapBuilder};

const INDENT: &str = "  ";

/// Shape of the emitted program
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain top-level statements
    #[default]
    Script,
    /// Script followed by an `export { ... }` list of every top-level declaration
    Module,
}

#[derive(Debug, Clone, Default)]
pub struct CodegenOptions {
    pub format: OutputFormat,
    /// Leave out namespace/using comments
    pub optimize: bool,
    /// Prefix every top-level statement with a `// file:line` comment
    pub debug: bool,
    /// Generated file name to record in a source map; `None` disables the map
    pub source_map: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Generated {
    pub code: String,
    pub source_map: Option<SourceMap>,
}

/// Code generator for JavaScript
pub struct Codegen {
    options: CodegenOptions,
    /// File names indexed by `FileId`
    files: Vec<String>,
    out: String,
    indent: usize,
    /// 0-based line of `out` the next write lands on
    line: u32,
    /// Nonzero while rendering into a detached buffer
    detached_depth: usize,
    mappings: SourceMapBuilder,
    /// Emitted names of enclosing classes, innermost last
    classes: Vec<String>,
    /// Emitted names of every class, singleton and trait in the program
    declared: HashSet<String>,
    exports: Vec<String>,
}

impl Codegen {
    pub fn new(options: CodegenOptions) -> Self {
        Self {
            options,
            files: Vec::new(),
            out: String::new(),
            indent: 0,
            line: 0,
            detached_depth: 0,
            mappings: SourceMapBuilder::new(),
            classes: Vec::new(),
            declared: HashSet::new(),
            exports: Vec::new(),
        }
    }

    /// Emit a program. `files` names the sources by `FileId` for debug
    /// comments and the source map.
    pub fn generate(mut self, program: &Program, files: &[String]) -> Generated {
        self.files = files.to_vec();
        collect_declared(&program.stmts, &mut self.declared);

        for stmt in &program.stmts {
            self.emit_top_level(stmt);
        }

        if self.options.format == OutputFormat::Module && !self.exports.is_empty() {
            let list = self.exports.join(", ");
            self.write_line(&format!("export {{ {} }};", list));
        }

        debug!(bytes = self.out.len(), lines = self.line, mappings = self.mappings.len(), "generated");

        let source_map = match self.options.source_map.take() {
            Some(file) => Some(std::mem::take(&mut self.mappings).build(&file, &self.files)),
            None => None,
        };

        Generated {
            code: self.out,
            source_map,
        }
    }

    // === Output ===

    fn write(&mut self, text: &str) {
        self.line += text.matches('\n').count() as u32;
        self.out.push_str(text);
    }

    fn write_line(&mut self, text: &str) {
        let line = format!("{}{}\n", self.indent_str(), text);
        self.write(&line);
    }

    fn indent_str(&self) -> String {
        INDENT.repeat(self.indent)
    }

    /// Record that the next line comes from `span`
    fn map(&mut self, span: Span) {
        if self.detached_depth > 0 || self.options.source_map.is_none() || span.line == 0 {
            return;
        }
        self.mappings.add(Mapping {
            generated_line: self.line,
            generated_column: (self.indent * INDENT.len()) as u32,
            source: span.file,
            original_line: span.line - 1,
            original_column: span.column.saturating_sub(1),
        });
    }

    /// Run `f` against an empty buffer and return what it wrote
    fn render_detached(&mut self, f: impl FnOnce(&mut Self)) -> String {
        let saved_out = std::mem::take(&mut self.out);
        let saved_line = self.line;
        self.detached_depth += 1;
        f(self);
        self.detached_depth -= 1;
        self.line = saved_line;
        std::mem::replace(&mut self.out, saved_out)
    }

    // === Statements ===

    fn is_inert(&self, stmt: &Stmt) -> bool {
        self.options.optimize && matches!(stmt.kind, StmtKind::Namespace(_) | StmtKind::Using(_))
    }

    fn emit_top_level(&mut self, stmt: &Stmt) {
        if self.is_inert(stmt) {
            return;
        }

        if self.options.debug {
            let file = self
                .files
                .get(stmt.span.file as usize)
                .map(String::as_str)
                .unwrap_or("<input>");
            let banner = format!("// {}:{}", file, stmt.span.line);
            self.write_line(&banner);
        }

        if let Some(name) = export_name(stmt) {
            if !self.exports.contains(&name) {
                self.exports.push(name);
            }
        }

        self.emit_stmt(stmt);
    }

    fn emit_stmt(&mut self, stmt: &Stmt) {
        if self.is_inert(stmt) {
            return;
        }
        self.map(stmt.span);

        match &stmt.kind {
            StmtKind::Namespace(ns) => self.write_line(&format!("// namespace {}", ns.key())),
            StmtKind::Using(u) => {
                let global = if u.is_global { "::" } else { "" };
                self.write_line(&format!("// using {}{}", global, u.target()));
            }
            StmtKind::Foreign(f) => {
                let name = f.unique_name.as_deref().unwrap_or(&f.name.name);
                if name == f.target {
                    self.write_line(&format!("// foreign {}", name));
                } else {
                    self.write_line(&format!("const {} = {};", name, f.target));
                }
            }
            StmtKind::Let(l) => {
                let name = l.unique_name.as_deref().unwrap_or(&l.name.name);
                match &l.init {
                    Some(init) => {
                        let value = self.expr(init);
                        self.write_line(&format!("let {} = {};", name, value));
                    }
                    None => self.write_line(&format!("let {};", name)),
                }
            }
            StmtKind::Function(f) => {
                let name = f.unique_name.as_deref().unwrap_or(&f.name.name);
                let prefix = if f.body.contains_await() { "async " } else { "" };
                self.write_line(&format!("{}function {}({}) {{", prefix, name, param_list(&f.params)));
                self.emit_body(&f.body);
                self.write_line("}");
            }
            StmtKind::Class(c) => self.emit_class(c),
            StmtKind::If(i) => self.emit_if(i),
            StmtKind::While(cond, body) => {
                let cond = self.condition(cond);
                self.write_line(&format!("while {} {{", cond));
                self.emit_body(body);
                self.write_line("}");
            }
            StmtKind::Until(cond, body) => {
                let cond = self.condition(cond);
                self.write_line(&format!("while (!{}) {{", cond));
                self.emit_body(body);
                self.write_line("}");
            }
            StmtKind::Return(value) => match value {
                Some(value) => {
                    let value = self.expr(value);
                    self.write_line(&format!("return {};", value));
                }
                None => self.write_line("return;"),
            },
            StmtKind::Block(b) => {
                self.write_line("{");
                self.emit_body(b);
                self.write_line("}");
            }
            StmtKind::Expr(e) => {
                let text = self.expr(e);
                // A leading `{` or `(...) =>` would not parse as an expression statement
                if matches!(e.kind, ExprKind::Object(_) | ExprKind::Lambda(..)) {
                    self.write_line(&format!("({});", text));
                } else {
                    self.write_line(&format!("{};", text));
                }
            }
        }
    }

    fn emit_body(&mut self, block: &Block) {
        self.indent += 1;
        for stmt in &block.stmts {
            self.emit_stmt(stmt);
        }
        self.indent -= 1;
    }

    fn emit_if(&mut self, stmt: &IfStmt) {
        let cond = self.condition(&stmt.cond);
        self.write_line(&format!("if {} {{", cond));
        self.emit_body(&stmt.then_block);

        let mut else_branch = &stmt.else_branch;
        loop {
            match else_branch {
                Some(ElseBranch::If(next)) => {
                    let cond = self.condition(&next.cond);
                    self.write_line(&format!("}} else if {} {{", cond));
                    self.emit_body(&next.then_block);
                    else_branch = &next.else_branch;
                }
                Some(ElseBranch::Block(b)) => {
                    self.write_line("} else {");
                    self.emit_body(b);
                    break;
                }
                None => break,
            }
        }

        self.write_line("}");
    }

    // === Classes ===

    fn emit_class(&mut self, class: &ClassDecl) {
        let name = class
            .unique_name
            .clone()
            .unwrap_or_else(|| class.name.name.clone());

        match class.kind {
            ClassKind::Singleton => self.emit_singleton(class, &name),
            ClassKind::Class | ClassKind::Trait => {
                self.emit_class_body(class, &name);
                self.emit_mixins(class, &name);
            }
        }
    }

    fn emit_class_body(&mut self, class: &ClassDecl, emitted_name: &str) {
        let extends = class
            .extends
            .as_ref()
            .and_then(|t| self.type_name(t))
            .map(|base| format!(" extends {}", base))
            .unwrap_or_default();
        self.write_line(&format!("class {}{} {{", emitted_name, extends));

        self.indent += 1;
        self.classes.push(emitted_name.to_string());
        self.emit_constructor(class);
        for method in class.methods() {
            self.emit_method(method);
        }
        self.classes.pop();
        self.indent -= 1;

        self.write_line("}");
    }

    /// Explicit constructor bodies run after the superclass call and field
    /// initializers; without one, a constructor exists only to run initializers.
    fn emit_constructor(&mut self, class: &ClassDecl) {
        let mut inits = Vec::new();
        for field in class.fields() {
            if let Some(value) = self.field_initializer(field) {
                inits.push(format!("this.{} = {};", field.name.name, value));
            }
        }
        let has_super = class.extends.is_some();

        match class.constructor() {
            Some(ctor) => {
                self.map(ctor.span);
                self.write_line(&format!("constructor({}) {{", param_list(&ctor.params)));
                self.indent += 1;
                if has_super {
                    self.write_line("super(...arguments);");
                }
                for init in &inits {
                    self.write_line(init);
                }
                for stmt in &ctor.body.stmts {
                    self.emit_stmt(stmt);
                }
                self.indent -= 1;
                self.write_line("}");
            }
            None if !inits.is_empty() => {
                if has_super {
                    self.write_line("constructor(...args) {");
                    self.indent += 1;
                    self.write_line("super(...args);");
                } else {
                    self.write_line("constructor() {");
                    self.indent += 1;
                }
                for init in &inits {
                    self.write_line(init);
                }
                self.indent -= 1;
                self.write_line("}");
            }
            None => {}
        }
    }

    fn field_initializer(&mut self, field: &Field) -> Option<String> {
        match (&field.init, field.is_default) {
            (Some(init), _) => Some(self.expr(init)),
            (None, true) => Some(default_value(field.ty.as_ref()).to_string()),
            (None, false) => None,
        }
    }

    fn emit_method(&mut self, method: &Method) {
        // Trait signatures have nothing to emit
        let Some(body) = &method.body else {
            return;
        };

        self.map(method.span);
        let (prefix, params) = if method.is_instance() {
            ("", &method.params[1..])
        } else {
            ("static ", &method.params[..])
        };
        let is_async = if body.contains_await() { "async " } else { "" };
        self.write_line(&format!(
            "{}{}{}({}) {{",
            prefix,
            is_async,
            method.name.name,
            param_list(params)
        ));
        self.emit_body(body);
        self.write_line("}");
    }

    /// Copy trait methods the class does not define onto its prototype.
    /// Names that match no declaration in the program are left out.
    fn emit_mixins(&mut self, class: &ClassDecl, emitted_name: &str) {
        let traits: Vec<String> = class
            .implements
            .iter()
            .filter_map(|t| self.type_name(t))
            .filter(|name| self.declared.contains(name))
            .collect();
        if traits.is_empty() {
            return;
        }

        self.write_line(&format!("for (const __trait of [{}]) {{", traits.join(", ")));
        self.indent += 1;
        self.write_line("for (const __key of Object.getOwnPropertyNames(__trait.prototype)) {");
        self.indent += 1;
        self.write_line(&format!("if (!(__key in {}.prototype)) {{", emitted_name));
        self.indent += 1;
        self.write_line(&format!(
            "Object.defineProperty({}.prototype, __key, Object.getOwnPropertyDescriptor(__trait.prototype, __key));",
            emitted_name
        ));
        self.indent -= 1;
        self.write_line("}");
        self.indent -= 1;
        self.write_line("}");
        self.indent -= 1;
        self.write_line("}");
    }

    /// `const Name = (() => { class __Name_Impl {...} ... })();` where `Name()`
    /// returns the one lazily created instance
    fn emit_singleton(&mut self, class: &ClassDecl, name: &str) {
        let backing = format!("__{}_Impl", name);

        self.write_line(&format!("const {} = (() => {{", name));
        self.indent += 1;
        self.emit_class_body(class, &backing);
        self.emit_mixins(class, &backing);
        self.write_line("let __instance = null;");
        self.write_line("return () => {");
        self.indent += 1;
        self.write_line("if (__instance === null) {");
        self.indent += 1;
        self.write_line(&format!("__instance = new {}();", backing));
        self.indent -= 1;
        self.write_line("}");
        self.write_line("return __instance;");
        self.indent -= 1;
        self.write_line("};");
        self.indent -= 1;
        self.write_line("})();");
    }

    // === Expressions ===

    /// Parenthesized condition for `if` / `while`
    fn condition(&mut self, cond: &Expr) -> String {
        let text = self.expr(cond);
        let wrapped = matches!(
            cond.kind,
            ExprKind::Binary(..) | ExprKind::Unary(..) | ExprKind::Assign(..) | ExprKind::Is(_, _, false)
        );
        if wrapped { text } else { format!("({})", text) }
    }

    fn expr(&mut self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Number(n) => n.clone(),
            ExprKind::String(s) => quote(s),
            ExprKind::Bool(b) => b.to_string(),
            ExprKind::Ident(id) => self.ident(&id.name),
            ExprKind::Binary(l, op, r) => {
                let l = self.expr(l);
                let r = self.expr(r);
                format!("({} {} {})", l, js_binop(*op), r)
            }
            ExprKind::Unary(op, operand) => {
                let operand = self.expr(operand);
                match op {
                    UnaryOp::Neg => format!("(-{})", operand),
                    UnaryOp::Not => format!("(!{})", operand),
                    UnaryOp::Await => format!("(await {})", operand),
                }
            }
            ExprKind::Assign(l, r) => {
                let l = self.expr(l);
                let r = self.expr(r);
                format!("({} = {})", l, r)
            }
            ExprKind::Is(operand, ty, optional) => {
                let subject = self.expr(operand);
                let test = self.type_test(&subject, ty);
                if *optional {
                    guarded(&test, "false", operand.contains_await())
                } else {
                    test
                }
            }
            ExprKind::As(operand, _, optional) => {
                let subject = self.expr(operand);
                if *optional {
                    guarded(&subject, "null", operand.contains_await())
                } else {
                    subject
                }
            }
            ExprKind::Call(callee, args, closure) => {
                let callee_text = self.receiver(callee);
                let mut parts: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
                if let Some(block) = closure {
                    parts.push(self.lambda(&[], block));
                }
                format!("{}({})", callee_text, parts.join(", "))
            }
            ExprKind::Field(receiver, member) | ExprKind::StaticMember(receiver, member) => {
                format!("{}.{}", self.receiver(receiver), member.name)
            }
            ExprKind::Index(receiver, index) => {
                let receiver = self.receiver(receiver);
                format!("{}[{}]", receiver, self.expr(index))
            }
            ExprKind::Array(elements) => {
                let elements: Vec<String> = elements.iter().map(|e| self.expr(e)).collect();
                format!("[{}]", elements.join(", "))
            }
            ExprKind::Object(fields) => {
                if fields.is_empty() {
                    return "{}".to_string();
                }
                let fields: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{}: {}", object_key(&f.key), self.expr(&f.value)))
                    .collect();
                format!("{{ {} }}", fields.join(", "))
            }
            ExprKind::Lambda(params, body) => self.lambda(params, body),
            ExprKind::New(class, args) => {
                let class = self.ident(&class.name);
                let args: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
                format!("new {}({})", class, args.join(", "))
            }
        }
    }

    /// Postfix receivers that need parentheses to stay one operand
    fn receiver(&mut self, expr: &Expr) -> String {
        let text = self.expr(expr);
        match expr.kind {
            ExprKind::Number(_) | ExprKind::Object(_) | ExprKind::Lambda(..) => format!("({})", text),
            _ => text,
        }
    }

    fn ident(&self, name: &str) -> String {
        match name {
            "self" => "this".to_string(),
            "Self" => self
                .classes
                .last()
                .cloned()
                .unwrap_or_else(|| "this.constructor".to_string()),
            // Qualified names that did not resolve fall back to property access
            _ => name.replace("::", "."),
        }
    }

    fn type_name(&self, ty: &TypeExpr) -> Option<String> {
        match &ty.kind {
            TypeKind::Named(name, _) => Some(self.ident(&name.name)),
            _ => None,
        }
    }

    fn type_test(&self, subject: &str, ty: &TypeExpr) -> String {
        match &ty.kind {
            TypeKind::Named(name, _) => match name.name.as_str() {
                "Number" => format!("(typeof {} === \"number\")", subject),
                "String" => format!("(typeof {} === \"string\")", subject),
                "Boolean" | "Bool" => format!("(typeof {} === \"boolean\")", subject),
                "Function" => format!("(typeof {} === \"function\")", subject),
                other => format!("({} instanceof {})", subject, self.ident(other)),
            },
            TypeKind::Array(_) => format!("(Array.isArray({}))", subject),
            TypeKind::Binary(l, op, r) => match op {
                TypeOp::Arrow => format!("(typeof {} === \"function\")", subject),
                TypeOp::Intersection => {
                    format!("({} && {})", self.type_test(subject, l), self.type_test(subject, r))
                }
                TypeOp::Union | TypeOp::Sum => {
                    format!("({} || {})", self.type_test(subject, l), self.type_test(subject, r))
                }
            },
            TypeKind::Unit => format!("({} === undefined)", subject),
        }
    }

    fn lambda(&mut self, params: &[Param], body: &Block) -> String {
        let prefix = if body.contains_await() { "async " } else { "" };
        let inner = self.render_detached(|g| g.emit_body(body));
        format!(
            "{}({}) => {{\n{}{}}}",
            prefix,
            param_list(params),
            inner,
            self.indent_str()
        )
    }
}

/// Generate with default options
pub fn generate(program: &Program) -> String {
    Codegen::new(CodegenOptions::default()).generate(program, &[]).code
}

/// Emitted names of class-like declarations, including ones nested in bodies
fn collect_declared(stmts: &[Stmt], names: &mut HashSet<String>) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Class(c) => {
                names.insert(c.unique_name.clone().unwrap_or_else(|| c.name.name.clone()));
                for method in c.methods() {
                    if let Some(body) = &method.body {
                        collect_declared(&body.stmts, names);
                    }
                }
            }
            StmtKind::Function(f) => collect_declared(&f.body.stmts, names),
            StmtKind::Block(b) | StmtKind::While(_, b) | StmtKind::Until(_, b) => collect_declared(&b.stmts, names),
            StmtKind::If(i) => {
                let mut branch = Some(i);
                while let Some(current) = branch {
                    collect_declared(&current.then_block.stmts, names);
                    branch = match &current.else_branch {
                        Some(ElseBranch::If(next)) => Some(next.as_ref()),
                        Some(ElseBranch::Block(b)) => {
                            collect_declared(&b.stmts, names);
                            None
                        }
                        None => None,
                    };
                }
            }
            _ => {}
        }
    }
}

fn export_name(stmt: &Stmt) -> Option<String> {
    match &stmt.kind {
        StmtKind::Let(l) => Some(l.unique_name.clone().unwrap_or_else(|| l.name.name.clone())),
        StmtKind::Function(f) => Some(f.unique_name.clone().unwrap_or_else(|| f.name.name.clone())),
        StmtKind::Class(c) => Some(c.unique_name.clone().unwrap_or_else(|| c.name.name.clone())),
        StmtKind::Foreign(f) => {
            let name = f.unique_name.clone().unwrap_or_else(|| f.name.name.clone());
            (name != f.target).then_some(name)
        }
        _ => None,
    }
}

fn js_binop(op: BinOp) -> String {
    match op {
        BinOp::Eq => "===".to_string(),
        BinOp::NotEq => "!==".to_string(),
        other => other.to_string(),
    }
}

fn param_list(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| p.name.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Initial value of a `default` field, by declared type
fn default_value(ty: Option<&TypeExpr>) -> &'static str {
    match ty.map(|t| &t.kind) {
        Some(TypeKind::Named(name, _)) => match name.name.as_str() {
            "Number" => "0",
            "String" => "\"\"",
            "Boolean" | "Bool" => "false",
            _ => "null",
        },
        Some(TypeKind::Array(_)) => "[]",
        _ => "null",
    }
}

/// Evaluate `expr`, yielding `fallback` if it throws. An awaiting operand
/// needs an async wrapper whose promise is awaited in place.
fn guarded(expr: &str, fallback: &str, is_async: bool) -> String {
    let body = format!("try {{ return {}; }} catch (_) {{ return {}; }}", expr, fallback);
    if is_async {
        format!("(await (async () => {{ {} }})())", body)
    } else {
        format!("(() => {{ {} }})()", body)
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn object_key(key: &str) -> String {
    let mut chars = key.chars();
    let is_ident = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if is_ident { key.to_string() } else { quote(key) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_lexer::Lexer;

    fn parse(source: &str) -> Program {
        tern_parser::parse(Lexer::tokenize(source).unwrap()).unwrap()
    }

    fn emit_js(source: &str) -> String {
        generate(&parse(source))
    }

    fn gen_with(source: &str, options: CodegenOptions) -> Generated {
        Codegen::new(options).generate(&parse(source), &["main.tn".to_string()])
    }

    #[test]
    fn test_fully_parenthesized_operators() {
        assert_eq!(emit_js("1 + 2 * 3"), "(1 + (2 * 3));\n");
        assert_eq!(emit_js("a = b = 1"), "(a = (b = 1));\n");
        assert_eq!(emit_js("-x == !y"), "((-x) === (!y));\n");
        assert_eq!(emit_js("a != b"), "(a !== b);\n");
    }

    #[test]
    fn test_string_escaping() {
        let code = emit_js("let s = \"say \\\"hi\\\"\\n\\tbye\\\\\"");
        assert_eq!(code, "let s = \"say \\\"hi\\\"\\n\\tbye\\\\\";\n");
        assert!(!code.trim_end().contains('\n'));
    }

    #[test]
    fn test_functions_and_control_flow() {
        let source = "micro f(a, b) { if a < b { return a } else if a == b { return 0 } else { return b } }";
        let expected = "\
function f(a, b) {
  if (a < b) {
    return a;
  } else if (a === b) {
    return 0;
  } else {
    return b;
  }
}
";
        assert_eq!(emit_js(source), expected);
    }

    #[test]
    fn test_until_negates_condition() {
        assert_eq!(emit_js("until done { tick() }"), "while (!(done)) {\n  tick();\n}\n");
        assert_eq!(emit_js("while i < 3 { i = i + 1 }"), "while (i < 3) {\n  (i = (i + 1));\n}\n");
    }

    #[test]
    fn test_trailing_closure_is_last_argument() {
        let code = emit_js("each(xs) { print(1) }");
        assert_eq!(code, "each(xs, () => {\n  print(1);\n});\n");
    }

    #[test]
    fn test_postfix_chain() {
        assert_eq!(emit_js("a.b[0](x)"), "a.b[0](x);\n");
        assert_eq!(emit_js("Math::max(1, 2)"), "Math.max(1, 2);\n");
    }

    #[test]
    fn test_collections_and_new() {
        assert_eq!(
            emit_js("let o = { a: [1, 2], \"b-c\": new Point(1) }"),
            "let o = { a: [1, 2], \"b-c\": new Point(1) };\n"
        );
        assert_eq!(emit_js("let e = {}"), "let e = {};\n");
    }

    #[test]
    fn test_type_tests_and_casts() {
        assert_eq!(emit_js("x is Point"), "(x instanceof Point);\n");
        assert_eq!(emit_js("x is Number"), "(typeof x === \"number\");\n");
        assert_eq!(emit_js("x is ([Number] | ())"), "((Array.isArray(x)) || (x === undefined));\n");
        assert_eq!(emit_js("let p = x as Point"), "let p = x;\n");

        let code = emit_js("let ok = x is? Point");
        assert!(code.contains("try { return (x instanceof Point); } catch (_) { return false; }"));
        let code = emit_js("let p = x as? Point");
        assert!(code.contains("try { return x; } catch (_) { return null; }"));
    }

    #[test]
    fn test_guarded_await_is_async() {
        let code = emit_js("micro f() { let ok = await g() is? Point }");
        assert!(code.starts_with("async function f() {"));
        assert!(code.contains(
            "let ok = (await (async () => { try { return ((await g()) instanceof Point); } catch (_) { return false; } })());"
        ));

        let code = emit_js("micro f() { let p = await g() as? Point }");
        assert!(code.contains("(await (async () => { try { return (await g()); } catch (_) { return null; } })())"));
    }

    #[test]
    fn test_static_and_instance_methods() {
        let source = "class Circle { area(self, scale) { return self.r * scale } micro unit() { return new Self(1) } }";
        let code = emit_js(source);
        assert!(code.contains("\n  area(scale) {\n    return (this.r * scale);\n  }\n"));
        assert!(code.contains("\n  static unit() {\n    return new Circle(1);\n  }\n"));
    }

    #[test]
    fn test_explicit_constructor_runs_after_super_and_fields() {
        let source = "class C extends B { label = \"c\"; count: Number default; constructor(x) { self.x = x } }";
        let expected = "\
class C extends B {
  constructor(x) {
    super(...arguments);
    this.label = \"c\";
    this.count = 0;
    (this.x = x);
  }
}
";
        assert_eq!(emit_js(source), expected);
    }

    #[test]
    fn test_synthetic_constructor_only_with_initializers() {
        let code = emit_js("class A { names: [String] default; title: String default; flag: Boolean default; other: Thing default; x: Number }");
        assert!(code.contains("  constructor() {\n"));
        assert!(code.contains("this.names = [];"));
        assert!(code.contains("this.title = \"\";"));
        assert!(code.contains("this.flag = false;"));
        assert!(code.contains("this.other = null;"));
        assert!(!code.contains("this.x"));

        let code = emit_js("class D extends A { y = 1 }");
        assert!(code.contains("constructor(...args) {\n    super(...args);\n    this.y = 1;\n"));

        assert_eq!(emit_js("class E { x: Number }"), "class E {\n}\n");
    }

    #[test]
    fn test_singleton_lazy_accessor() {
        let code = emit_js("singleton Config { debug = false; get(self) { return self.debug } }");
        let expected = "\
const Config = (() => {
  class __Config_Impl {
    constructor() {
      this.debug = false;
    }
    get() {
      return this.debug;
    }
  }
  let __instance = null;
  return () => {
    if (__instance === null) {
      __instance = new __Config_Impl();
    }
    return __instance;
  };
})();
";
        assert_eq!(code, expected);
    }

    #[test]
    fn test_trait_mixin_copies_missing_methods() {
        let code = emit_js("trait Named { name(self) -> String; greet(self) { return 1 } }\nclass P implements Named {}");
        assert!(code.contains("class Named {\n  greet() {"));
        assert!(code.contains("for (const __trait of [Named]) {"));
        assert!(code.contains("if (!(__key in P.prototype)) {"));
    }

    #[test]
    fn test_mixins_skip_undeclared_traits() {
        let code = emit_js("trait Named { greet(self) { return 1 } }\nclass P implements Named, Missing {}");
        assert!(code.contains("for (const __trait of [Named]) {"));
        assert!(!code.contains("Missing"));

        let code = emit_js("class Q implements Missing {}");
        assert_eq!(code, "class Q {\n}\n");
    }

    #[test]
    fn test_async_inference() {
        assert!(emit_js("micro f() { let x = await g() }").starts_with("async function f() {"));
        assert!(emit_js("micro f() { h(micro () { await g() }) }").starts_with("function f() {"));
        assert!(emit_js("let cb = micro () { await g() }").contains("let cb = async () => {"));
        assert!(emit_js("class A { run(self) { await go() } }").contains("  async run() {"));
    }

    #[test]
    fn test_namespace_comments_and_optimize() {
        let source = "namespace! app;\nusing ::std;\nlet x = 1";
        let code = emit_js(source);
        assert_eq!(code, "// namespace app!\n// using ::std\nlet x = 1;\n");

        let options = CodegenOptions {
            optimize: true,
            ..Default::default()
        };
        assert_eq!(gen_with(source, options).code, "let x = 1;\n");
    }

    #[test]
    fn test_foreign_binding() {
        assert_eq!(emit_js("@foreign(\"console.log\") micro log(msg)"), "const log = console.log;\n");
        assert_eq!(emit_js("@foreign micro fetch(url)"), "// foreign fetch\n");
    }

    #[test]
    fn test_debug_comments() {
        let options = CodegenOptions {
            debug: true,
            ..Default::default()
        };
        let code = gen_with("let x = 1\n\nprint(x)", options).code;
        assert_eq!(code, "// main.tn:1\nlet x = 1;\n// main.tn:3\nprint(x);\n");
    }

    #[test]
    fn test_module_exports_declarations() {
        let options = CodegenOptions {
            format: OutputFormat::Module,
            ..Default::default()
        };
        let code = gen_with("let x = 1\nmicro f() {}\nclass A {}\nprint(x)", options).code;
        assert!(code.ends_with("export { x, f, A };\n"));
    }

    #[test]
    fn test_source_map_records_statement_lines() {
        let options = CodegenOptions {
            source_map: Some("out.js".to_string()),
            ..Default::default()
        };
        let generated = gen_with("let x = 1\nmicro f() {\n  return x\n}", options);
        let map = generated.source_map.unwrap();
        assert_eq!(map.file, "out.js");
        assert_eq!(map.sources, vec!["main.tn"]);
        // line 0 <- 1:1, line 1 <- 2:1, line 2 col 2 <- 3:3
        assert_eq!(map.mappings, "AAAA;AACA;EACE");
    }

    #[test]
    fn test_lambda_statement_is_wrapped() {
        assert_eq!(emit_js("micro (x) { return x }"), "((x) => {\n  return x;\n});\n");
    }
}
