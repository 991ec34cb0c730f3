use tern_lexer::Span;

/// A parsed source file, or the integrated program produced by the resolver
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

/// Statements
#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// namespace! app::core;
    Namespace(NamespaceDecl),
    /// using app::core;
    Using(UsingDecl),
    /// @foreign("console.log") micro log(msg);
    Foreign(ForeignFnDecl),
    /// let x = 1;
    Let(LetStmt),
    /// micro name(params) { ... }
    Function(FnDecl),
    /// class / singleton / trait
    Class(ClassDecl),
    If(IfStmt),
    While(Expr, Block),
    Until(Expr, Block),
    Return(Option<Expr>),
    Block(Block),
    Expr(Expr),
}

/// Namespace declaration; `is_main` is set by the `!` marker
#[derive(Debug, Clone)]
pub struct NamespaceDecl {
    pub path: Vec<Ident>,
    pub is_main: bool,
}

impl NamespaceDecl {
    /// Path without the main marker: `app::core`
    pub fn clean_name(&self) -> String {
        join_path(&self.path)
    }

    /// Path as written in the namespace table: `app::core!` for main namespaces
    pub fn key(&self) -> String {
        if self.is_main {
            format!("{}!", self.clean_name())
        } else {
            self.clean_name()
        }
    }
}

/// Import of another namespace
#[derive(Debug, Clone)]
pub struct UsingDecl {
    pub path: Vec<Ident>,
    /// `using ::path;` applies to every file of the compilation
    pub is_global: bool,
}

impl UsingDecl {
    pub fn target(&self) -> String {
        join_path(&self.path)
    }
}

/// Binding of a target-language function: `@foreign("Math.sqrt") micro sqrt(x);`
#[derive(Debug, Clone)]
pub struct ForeignFnDecl {
    pub attribute: Ident,
    /// Target-language expression the binding refers to
    pub target: String,
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub unique_name: Option<String>,
}

/// Let binding
#[derive(Debug, Clone)]
pub struct LetStmt {
    pub name: Ident,
    pub ty: Option<TypeExpr>,
    pub init: Option<Expr>,
    pub unique_name: Option<String>,
}

/// Function declaration
#[derive(Debug, Clone)]
pub struct FnDecl {
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub effect: Option<TypeExpr>,
    pub body: Block,
    pub unique_name: Option<String>,
}

/// Function parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub name: Ident,
    pub ty: Option<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Singleton,
    Trait,
}

impl std::fmt::Display for ClassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassKind::Class => write!(f, "class"),
            ClassKind::Singleton => write!(f, "singleton"),
            ClassKind::Trait => write!(f, "trait"),
        }
    }
}

/// Class, singleton or trait declaration
#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub kind: ClassKind,
    pub name: Ident,
    pub extends: Option<TypeExpr>,
    pub implements: Vec<TypeExpr>,
    pub members: Vec<ClassMember>,
    pub unique_name: Option<String>,
}

impl ClassDecl {
    pub fn constructor(&self) -> Option<&Constructor> {
        self.members.iter().find_map(|m| match m {
            ClassMember::Constructor(c) => Some(c),
            _ => None,
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.members.iter().filter_map(|m| match m {
            ClassMember::Field(f) => Some(f),
            _ => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.members.iter().filter_map(|m| match m {
            ClassMember::Method(m) => Some(m),
            _ => None,
        })
    }

    /// Does the class declare a method or field with this name?
    pub fn has_member(&self, name: &str) -> bool {
        self.members.iter().any(|m| match m {
            ClassMember::Method(m) => m.name.name == name,
            ClassMember::Field(f) => f.name.name == name,
            ClassMember::Constructor(_) => false,
        })
    }
}

#[derive(Debug, Clone)]
pub enum ClassMember {
    Constructor(Constructor),
    Method(Method),
    Field(Field),
}

#[derive(Debug, Clone)]
pub struct Constructor {
    pub params: Vec<Param>,
    pub body: Block,
    pub span: Span,
}

/// Method; the body is absent for trait signatures
#[derive(Debug, Clone)]
pub struct Method {
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub effect: Option<TypeExpr>,
    pub body: Option<Block>,
    pub span: Span,
}

impl Method {
    /// Instance methods take `self` as their first parameter
    pub fn is_instance(&self) -> bool {
        self.params.first().is_some_and(|p| p.name.name == "self")
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: Ident,
    pub ty: Option<TypeExpr>,
    pub init: Option<Expr>,
    /// `name: Type default`
    pub is_default: bool,
    pub span: Span,
}

impl Field {
    pub fn has_initializer(&self) -> bool {
        self.init.is_some() || self.is_default
    }
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_block: Block,
    pub else_branch: Option<ElseBranch>,
}

/// Else branch - can be a block or another if
#[derive(Debug, Clone)]
pub enum ElseBranch {
    Block(Block),
    If(Box<IfStmt>),
}

/// A block of statements
#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// Expressions
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Number literal, kept as written: 42, 3.14
    Number(String),
    /// String literal (unescaped): "hello"
    String(String),
    /// Boolean literal: true, false
    Bool(bool),
    /// Identifier, including `self` and `Self`
    Ident(Ident),
    /// Binary operation: a + b
    Binary(Box<Expr>, BinOp, Box<Expr>),
    /// Unary operation: -x, !x, await x
    Unary(UnaryOp, Box<Expr>),
    /// Assignment: x = expr
    Assign(Box<Expr>, Box<Expr>),
    /// Type test: x is T, x is? T
    Is(Box<Expr>, TypeExpr, bool),
    /// Cast: x as T, x as? T
    As(Box<Expr>, TypeExpr, bool),
    /// Call with optional trailing closure: f(a) { ... }
    Call(Box<Expr>, Vec<Expr>, Option<Block>),
    /// Field access: foo.bar
    Field(Box<Expr>, Ident),
    /// Static member access: Foo::bar
    StaticMember(Box<Expr>, Ident),
    /// Index expression: arr[idx]
    Index(Box<Expr>, Box<Expr>),
    /// Array literal: [1, 2, 3]
    Array(Vec<Expr>),
    /// Object literal: { a: 1, "b": 2 }
    Object(Vec<ObjectField>),
    /// Anonymous function: micro (x) { ... }
    Lambda(Vec<Param>, Block),
    /// Instantiation: new app::Point(1, 2)
    New(Ident, Vec<Expr>),
}

#[derive(Debug, Clone)]
pub struct ObjectField {
    pub key: String,
    pub value: Expr,
    pub span: Span,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Logical
    Or,
    And,
    // Comparison
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    // Bitwise
    BitOr,
    BitAnd,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 2,
            BinOp::And => 3,
            BinOp::Eq | BinOp::NotEq => 4,
            BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq => 5,
            BinOp::BitOr | BinOp::BitAnd => 6,
            BinOp::Add | BinOp::Sub => 7,
            BinOp::Mul | BinOp::Div | BinOp::Mod => 8,
        }
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinOp::Or => write!(f, "||"),
            BinOp::And => write!(f, "&&"),
            BinOp::Eq => write!(f, "=="),
            BinOp::NotEq => write!(f, "!="),
            BinOp::Lt => write!(f, "<"),
            BinOp::Gt => write!(f, ">"),
            BinOp::LtEq => write!(f, "<="),
            BinOp::GtEq => write!(f, ">="),
            BinOp::BitOr => write!(f, "|"),
            BinOp::BitAnd => write!(f, "&"),
            BinOp::Add => write!(f, "+"),
            BinOp::Sub => write!(f, "-"),
            BinOp::Mul => write!(f, "*"),
            BinOp::Div => write!(f, "/"),
            BinOp::Mod => write!(f, "%"),
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,   // -
    Not,   // !
    Await, // await
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
            UnaryOp::Await => write!(f, "await "),
        }
    }
}

/// Type expressions
#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub kind: TypeKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    /// Named type, path segments joined by `::`: Number, app::Point, List<T>
    Named(Ident, Vec<TypeExpr>),
    /// Type operator: A -> B, A | B, A & B, A + B
    Binary(Box<TypeExpr>, TypeOp, Box<TypeExpr>),
    /// Array type: [T]
    Array(Box<TypeExpr>),
    /// Unit type: ()
    Unit,
}

/// Type-level operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOp {
    Arrow,
    Union,
    Intersection,
    Sum,
}

impl TypeOp {
    pub fn precedence(self) -> u8 {
        match self {
            TypeOp::Arrow => 1,
            TypeOp::Union => 2,
            TypeOp::Intersection => 3,
            TypeOp::Sum => 4,
        }
    }

    pub fn is_right_assoc(self) -> bool {
        matches!(self, TypeOp::Arrow)
    }
}

impl std::fmt::Display for TypeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeOp::Arrow => write!(f, "->"),
            TypeOp::Union => write!(f, "|"),
            TypeOp::Intersection => write!(f, "&"),
            TypeOp::Sum => write!(f, "+"),
        }
    }
}

/// Identifier with span
#[derive(Debug, Clone)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: String, span: Span) -> Self {
        Self { name, span }
    }
}

pub fn join_path(path: &[Ident]) -> String {
    path.iter()
        .map(|segment| segment.name.as_str())
        .collect::<Vec<_>>()
        .join("::")
}

// === Pretty Printing ===

impl Program {
    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        for stmt in &self.stmts {
            out.push_str(&stmt.pretty_print(0));
        }
        out
    }
}

fn params_str(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| match &p.ty {
            Some(ty) => format!("{}: {}", p.name.name, ty.pretty_print()),
            None => p.name.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn unique_str(unique: &Option<String>) -> String {
    unique
        .as_ref()
        .map(|u| format!(" => {}", u))
        .unwrap_or_default()
}

impl Stmt {
    pub fn pretty_print(&self, indent: usize) -> String {
        let ind = "  ".repeat(indent);
        match &self.kind {
            StmtKind::Namespace(ns) => format!("{}Namespace {}\n", ind, ns.key()),
            StmtKind::Using(u) => {
                let global = if u.is_global { "::" } else { "" };
                format!("{}Using {}{}\n", ind, global, u.target())
            }
            StmtKind::Foreign(f) => format!(
                "{}Foreign @{}(\"{}\") '{}'({}){}\n",
                ind,
                f.attribute.name,
                f.target,
                f.name.name,
                params_str(&f.params),
                unique_str(&f.unique_name)
            ),
            StmtKind::Let(l) => {
                let ty_str = l
                    .ty
                    .as_ref()
                    .map(|t| format!(": {}", t.pretty_print()))
                    .unwrap_or_default();
                let mut out = format!("{}Let {}{}{}", ind, l.name.name, ty_str, unique_str(&l.unique_name));
                if let Some(init) = &l.init {
                    out.push_str(" =\n");
                    out.push_str(&init.pretty_print_indented(indent + 1));
                } else {
                    out.push('\n');
                }
                out
            }
            StmtKind::Function(f) => {
                let ret = f
                    .return_type
                    .as_ref()
                    .map(|t| format!(" -> {}", t.pretty_print()))
                    .unwrap_or_default();
                let mut out = format!(
                    "{}FnDecl '{}'({}){}{}\n",
                    ind,
                    f.name.name,
                    params_str(&f.params),
                    ret,
                    unique_str(&f.unique_name)
                );
                out.push_str(&f.body.pretty_print(indent + 1));
                out
            }
            StmtKind::Class(c) => c.pretty_print(indent),
            StmtKind::If(i) => i.pretty_print(indent),
            StmtKind::While(cond, body) => {
                let mut out = format!("{}While {}\n", ind, cond.pretty_print());
                out.push_str(&body.pretty_print(indent + 1));
                out
            }
            StmtKind::Until(cond, body) => {
                let mut out = format!("{}Until {}\n", ind, cond.pretty_print());
                out.push_str(&body.pretty_print(indent + 1));
                out
            }
            StmtKind::Return(value) => match value {
                Some(v) => format!("{}Return {}\n", ind, v.pretty_print()),
                None => format!("{}Return\n", ind),
            },
            StmtKind::Block(b) => b.pretty_print(indent),
            StmtKind::Expr(e) => {
                let mut out = format!("{}ExprStmt\n", ind);
                out.push_str(&e.pretty_print_indented(indent + 1));
                out
            }
        }
    }
}

impl ClassDecl {
    pub fn pretty_print(&self, indent: usize) -> String {
        let ind = "  ".repeat(indent);
        let extends = self
            .extends
            .as_ref()
            .map(|t| format!(" extends {}", t.pretty_print()))
            .unwrap_or_default();
        let implements = if self.implements.is_empty() {
            String::new()
        } else {
            let names: Vec<_> = self.implements.iter().map(|t| t.pretty_print()).collect();
            format!(" implements {}", names.join(", "))
        };
        let mut out = format!(
            "{}{} '{}'{}{}{}\n",
            ind,
            self.kind,
            self.name.name,
            extends,
            implements,
            unique_str(&self.unique_name)
        );
        for member in &self.members {
            match member {
                ClassMember::Constructor(c) => {
                    out.push_str(&format!("{}  constructor({})\n", ind, params_str(&c.params)));
                    out.push_str(&c.body.pretty_print(indent + 2));
                }
                ClassMember::Method(m) => {
                    let kind = if m.is_instance() { "method" } else { "static" };
                    out.push_str(&format!("{}  {} {}({})\n", ind, kind, m.name.name, params_str(&m.params)));
                    match &m.body {
                        Some(body) => out.push_str(&body.pretty_print(indent + 2)),
                        None => out.push_str(&format!("{}    (signature only)\n", ind)),
                    }
                }
                ClassMember::Field(f) => {
                    let ty = f
                        .ty
                        .as_ref()
                        .map(|t| format!(": {}", t.pretty_print()))
                        .unwrap_or_default();
                    let init = match (&f.init, f.is_default) {
                        (Some(e), _) => format!(" = {}", e.pretty_print()),
                        (None, true) => " default".to_string(),
                        (None, false) => String::new(),
                    };
                    out.push_str(&format!("{}  field {}{}{}\n", ind, f.name.name, ty, init));
                }
            }
        }
        out
    }
}

impl IfStmt {
    pub fn pretty_print(&self, indent: usize) -> String {
        let ind = "  ".repeat(indent);
        let mut out = format!("{}If {}\n", ind, self.cond.pretty_print());
        out.push_str(&self.then_block.pretty_print(indent + 1));
        match &self.else_branch {
            Some(ElseBranch::Block(b)) => {
                out.push_str(&format!("{}Else\n", ind));
                out.push_str(&b.pretty_print(indent + 1));
            }
            Some(ElseBranch::If(i)) => {
                out.push_str(&format!("{}Else\n", ind));
                out.push_str(&i.pretty_print(indent + 1));
            }
            None => {}
        }
        out
    }
}

impl Block {
    pub fn pretty_print(&self, indent: usize) -> String {
        let ind = "  ".repeat(indent);
        let mut out = format!("{}Block\n", ind);
        for stmt in &self.stmts {
            out.push_str(&stmt.pretty_print(indent + 1));
        }
        out
    }
}

impl Expr {
    /// Pretty print with indentation for full AST display
    pub fn pretty_print_indented(&self, indent: usize) -> String {
        let ind = "  ".repeat(indent);
        match &self.kind {
            ExprKind::Binary(l, op, r) => {
                let mut out = format!("{}Binary({})\n", ind, op);
                out.push_str(&l.pretty_print_indented(indent + 1));
                out.push_str(&r.pretty_print_indented(indent + 1));
                out
            }
            ExprKind::Assign(lhs, rhs) => {
                let mut out = format!("{}Assign\n", ind);
                out.push_str(&lhs.pretty_print_indented(indent + 1));
                out.push_str(&rhs.pretty_print_indented(indent + 1));
                out
            }
            ExprKind::Call(callee, args, closure) => {
                let mut out = format!("{}Call\n", ind);
                out.push_str(&format!("{}callee:\n", "  ".repeat(indent + 1)));
                out.push_str(&callee.pretty_print_indented(indent + 2));
                if !args.is_empty() {
                    out.push_str(&format!("{}args:\n", "  ".repeat(indent + 1)));
                    for arg in args {
                        out.push_str(&arg.pretty_print_indented(indent + 2));
                    }
                }
                if let Some(block) = closure {
                    out.push_str(&format!("{}trailing:\n", "  ".repeat(indent + 1)));
                    out.push_str(&block.pretty_print(indent + 2));
                }
                out
            }
            ExprKind::Lambda(params, body) => {
                let mut out = format!("{}Lambda({})\n", ind, params_str(params));
                out.push_str(&body.pretty_print(indent + 1));
                out
            }
            _ => format!("{}{}\n", ind, self.pretty_print()),
        }
    }

    /// Compact pretty print (for inline display)
    pub fn pretty_print(&self) -> String {
        match &self.kind {
            ExprKind::Number(n) => n.clone(),
            ExprKind::String(s) => format!("{:?}", s),
            ExprKind::Bool(b) => format!("{}", b),
            ExprKind::Ident(id) => id.name.clone(),
            ExprKind::Binary(l, op, r) => format!("({} {} {})", l.pretty_print(), op, r.pretty_print()),
            ExprKind::Unary(op, e) => format!("({}{})", op, e.pretty_print()),
            ExprKind::Assign(lhs, rhs) => format!("({} = {})", lhs.pretty_print(), rhs.pretty_print()),
            ExprKind::Is(e, ty, optional) => {
                let q = if *optional { "?" } else { "" };
                format!("({} is{} {})", e.pretty_print(), q, ty.pretty_print())
            }
            ExprKind::As(e, ty, optional) => {
                let q = if *optional { "?" } else { "" };
                format!("({} as{} {})", e.pretty_print(), q, ty.pretty_print())
            }
            ExprKind::Call(callee, args, closure) => {
                let args_str = args.iter().map(|a| a.pretty_print()).collect::<Vec<_>>().join(", ");
                let trailing = if closure.is_some() { " { ... }" } else { "" };
                format!("{}({}){}", callee.pretty_print(), args_str, trailing)
            }
            ExprKind::Field(e, f) => format!("{}.{}", e.pretty_print(), f.name),
            ExprKind::StaticMember(e, m) => format!("{}::{}", e.pretty_print(), m.name),
            ExprKind::Index(e, idx) => format!("{}[{}]", e.pretty_print(), idx.pretty_print()),
            ExprKind::Array(elements) => {
                let elems = elements.iter().map(|e| e.pretty_print()).collect::<Vec<_>>().join(", ");
                format!("[{}]", elems)
            }
            ExprKind::Object(fields) => {
                let fields = fields
                    .iter()
                    .map(|f| format!("{}: {}", f.key, f.value.pretty_print()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{ {} }}", fields)
            }
            ExprKind::Lambda(params, _) => format!("micro ({}) {{ ... }}", params_str(params)),
            ExprKind::New(class, args) => {
                let args_str = args.iter().map(|a| a.pretty_print()).collect::<Vec<_>>().join(", ");
                format!("new {}({})", class.name, args_str)
            }
        }
    }
}

impl TypeExpr {
    pub fn pretty_print(&self) -> String {
        match &self.kind {
            TypeKind::Named(id, type_args) => {
                if type_args.is_empty() {
                    id.name.clone()
                } else {
                    let args_str = type_args.iter().map(|t| t.pretty_print()).collect::<Vec<_>>().join(", ");
                    format!("{}<{}>", id.name, args_str)
                }
            }
            TypeKind::Binary(l, op, r) => format!("({} {} {})", l.pretty_print(), op, r.pretty_print()),
            TypeKind::Array(elem) => format!("[{}]", elem.pretty_print()),
            TypeKind::Unit => "()".to_string(),
        }
    }
}

// === Await detection ===
// Nested functions, lambdas and trailing closures are separate functions, so
// an `await` inside them does not count for the enclosing body.

impl Block {
    pub fn contains_await(&self) -> bool {
        self.stmts.iter().any(Stmt::contains_await)
    }
}

impl Stmt {
    pub fn contains_await(&self) -> bool {
        match &self.kind {
            StmtKind::Let(l) => l.init.as_ref().is_some_and(Expr::contains_await),
            StmtKind::If(i) => i.contains_await(),
            StmtKind::While(cond, body) | StmtKind::Until(cond, body) => {
                cond.contains_await() || body.contains_await()
            }
            StmtKind::Return(value) => value.as_ref().is_some_and(Expr::contains_await),
            StmtKind::Block(b) => b.contains_await(),
            StmtKind::Expr(e) => e.contains_await(),
            StmtKind::Namespace(_)
            | StmtKind::Using(_)
            | StmtKind::Foreign(_)
            | StmtKind::Function(_)
            | StmtKind::Class(_) => false,
        }
    }
}

impl IfStmt {
    pub fn contains_await(&self) -> bool {
        self.cond.contains_await()
            || self.then_block.contains_await()
            || match &self.else_branch {
                Some(ElseBranch::Block(b)) => b.contains_await(),
                Some(ElseBranch::If(i)) => i.contains_await(),
                None => false,
            }
    }
}

impl Expr {
    pub fn contains_await(&self) -> bool {
        match &self.kind {
            ExprKind::Unary(UnaryOp::Await, _) => true,
            ExprKind::Number(_)
            | ExprKind::String(_)
            | ExprKind::Bool(_)
            | ExprKind::Ident(_)
            | ExprKind::Lambda(..) => false,
            ExprKind::Unary(_, e)
            | ExprKind::Is(e, _, _)
            | ExprKind::As(e, _, _)
            | ExprKind::Field(e, _)
            | ExprKind::StaticMember(e, _) => e.contains_await(),
            ExprKind::Binary(l, _, r) | ExprKind::Assign(l, r) | ExprKind::Index(l, r) => {
                l.contains_await() || r.contains_await()
            }
            ExprKind::Call(callee, args, _) => callee.contains_await() || args.iter().any(Expr::contains_await),
            ExprKind::Array(elements) | ExprKind::New(_, elements) => elements.iter().any(Expr::contains_await),
            ExprKind::Object(fields) => fields.iter().any(|f| f.value.contains_await()),
        }
    }
}
