use tern_ast::*;
use tern_lexer::{Span, SpannedToken, Token, TokenClass};
use thiserror::Error;

/// Binding power of assignment, the loosest value operator
const ASSIGN_PREC: u8 = 1;
/// Binding power of `is` / `as`
const TYPE_TEST_PREC: u8 = 5;
/// Minimum precedence that only admits a primary type
const TYPE_OPERAND_PREC: u8 = 5;

pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    /// Parsing an if/while/until condition: no trailing closures
    inline: bool,
    /// Parsing the type after `is` / `as`: `<` may still be a comparison
    type_operand: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at {}:{}", .span.line, .span.column)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn line(&self) -> u32 {
        self.span.line
    }

    pub fn column(&self) -> u32 {
        self.span.column
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a complete token stream into a program
pub fn parse(tokens: Vec<SpannedToken>) -> ParseResult<Program> {
    Parser::new(tokens).parse_program()
}

/// Value-level infix operators
#[derive(Debug, Clone, Copy)]
enum Infix {
    Assign,
    Is,
    As,
    Binary(BinOp),
}

impl Infix {
    fn precedence(self) -> u8 {
        match self {
            Infix::Assign => ASSIGN_PREC,
            Infix::Is | Infix::As => TYPE_TEST_PREC,
            Infix::Binary(op) => op.precedence(),
        }
    }
}

impl Parser {
    pub fn new(mut tokens: Vec<SpannedToken>) -> Self {
        if tokens.last().is_none_or(|t| t.token != Token::Eof) {
            let span = tokens.last().map(|t| t.span).unwrap_or_default();
            tokens.push(SpannedToken {
                token: Token::Eof,
                text: String::new(),
                span: Span { start: span.end, ..span },
            });
        }
        Self {
            tokens,
            pos: 0,
            inline: false,
            type_operand: false,
        }
    }

    // === Token Access ===

    fn current(&self) -> &SpannedToken {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.current().token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn peek_span(&self) -> Span {
        self.current().span
    }

    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)].span
    }

    fn advance(&mut self) -> &SpannedToken {
        let idx = self.pos.min(self.tokens.len() - 1);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        &self.tokens[idx]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> ParseResult<SpannedToken> {
        if self.check(&expected) {
            Ok(self.advance().clone())
        } else {
            self.error(format!("expected '{}', found '{}'", expected, self.peek()))
        }
    }

    fn error<T>(&self, message: String) -> ParseResult<T> {
        Err(ParseError {
            message,
            span: self.peek_span(),
        })
    }

    fn expect_ident(&mut self) -> ParseResult<Ident> {
        match self.peek().clone() {
            Token::Ident(name) => {
                let span = self.peek_span();
                self.advance();
                Ok(Ident::new(name, span))
            }
            _ => self.error(format!("expected identifier, found '{}'", self.peek())),
        }
    }

    /// Member names after `.` / `::` may also be keywords: `Self::new`
    fn expect_member_name(&mut self) -> ParseResult<Ident> {
        let tok = self.current().clone();
        if !matches!(tok.token, Token::Ident(_)) && tok.token.class() != TokenClass::Keyword {
            return self.error(format!("expected member name, found '{}'", tok.token));
        }
        self.advance();
        Ok(Ident::new(tok.text, tok.span))
    }

    /// Run `f` with inline (condition) mode switched on or off
    fn with_inline<T>(
        &mut self,
        inline: bool,
        f: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        let saved = std::mem::replace(&mut self.inline, inline);
        let result = f(self);
        self.inline = saved;
        result
    }

    /// Parse `item (, item)* close`; the opener has already been consumed
    fn parse_delimited<T>(
        &mut self,
        close: Token,
        mut item: impl FnMut(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<Vec<T>> {
        self.with_inline(false, |p| {
            let mut items = Vec::new();
            if !p.check(&close) {
                items.push(item(p)?);
                while p.eat(&Token::Comma) {
                    // Allow a trailing comma
                    if p.check(&close) {
                        break;
                    }
                    items.push(item(p)?);
                }
            }
            p.expect(close)?;
            Ok(items)
        })
    }

    // === Statements ===

    pub fn parse_program(&mut self) -> ParseResult<Program> {
        let mut stmts = Vec::new();

        while !self.is_at_end() {
            stmts.push(self.parse_stmt()?);
        }

        Ok(Program { stmts })
    }

    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        let start = self.peek_span();
        let kind = match self.peek() {
            Token::Namespace => self.parse_namespace()?,
            Token::Using => self.parse_using()?,
            Token::At => StmtKind::Foreign(self.parse_foreign()?),
            Token::Class | Token::Singleton | Token::Trait => StmtKind::Class(self.parse_class()?),
            Token::Let => StmtKind::Let(self.parse_let()?),
            Token::Micro if self.is_named_function() => StmtKind::Function(self.parse_fn_decl()?),
            Token::If => StmtKind::If(self.parse_if()?),
            Token::While => {
                self.advance();
                let cond = self.parse_condition()?;
                let body = self.parse_block()?;
                StmtKind::While(cond, body)
            }
            Token::Until => {
                self.advance();
                let cond = self.parse_condition()?;
                let body = self.parse_block()?;
                StmtKind::Until(cond, body)
            }
            Token::Return => {
                self.advance();
                if matches!(self.peek(), Token::Semi | Token::RBrace | Token::Eof) {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.parse_expr()?))
                }
            }
            Token::LBrace => StmtKind::Block(self.parse_block()?),
            _ => StmtKind::Expr(self.parse_expr()?),
        };

        // Consume optional semicolon
        self.eat(&Token::Semi);

        Ok(Stmt {
            kind,
            span: start.to(self.prev_span()),
        })
    }

    /// `micro name(` declares a function; any other `micro` starts a lambda
    fn is_named_function(&self) -> bool {
        matches!(self.peek_at(1), Token::Ident(_)) && matches!(self.peek_at(2), Token::LParen)
    }

    fn parse_path(&mut self) -> ParseResult<Vec<Ident>> {
        let mut path = vec![self.expect_ident()?];
        while self.check(&Token::ColonColon) && matches!(self.peek_at(1), Token::Ident(_)) {
            self.advance();
            path.push(self.expect_ident()?);
        }
        Ok(path)
    }

    fn parse_namespace(&mut self) -> ParseResult<StmtKind> {
        self.expect(Token::Namespace)?;
        let marked_before = self.eat(&Token::Bang);
        let path = self.parse_path()?;
        let marked_after = self.eat(&Token::Bang);
        Ok(StmtKind::Namespace(NamespaceDecl {
            path,
            is_main: marked_before || marked_after,
        }))
    }

    fn parse_using(&mut self) -> ParseResult<StmtKind> {
        self.expect(Token::Using)?;
        let is_global = self.eat(&Token::ColonColon);
        let path = self.parse_path()?;
        Ok(StmtKind::Using(UsingDecl { path, is_global }))
    }

    fn parse_foreign(&mut self) -> ParseResult<ForeignFnDecl> {
        self.expect(Token::At)?;
        let attribute = self.expect_ident()?;
        if attribute.name != "foreign" {
            return Err(ParseError {
                message: format!("unknown attribute '@{}'", attribute.name),
                span: attribute.span,
            });
        }

        let target = if self.eat(&Token::LParen) {
            let target = match self.peek().clone() {
                Token::String(s) => {
                    self.advance();
                    s
                }
                _ => {
                    return self.error(format!(
                        "expected string literal in '@{}', found '{}'",
                        attribute.name,
                        self.peek()
                    ));
                }
            };
            self.expect(Token::RParen)?;
            Some(target)
        } else {
            None
        };

        self.expect(Token::Micro)?;
        let name = self.expect_ident()?;
        self.expect(Token::LParen)?;
        let params = self.parse_params()?;
        let return_type = if self.eat(&Token::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        Ok(ForeignFnDecl {
            target: target.unwrap_or_else(|| name.name.clone()),
            attribute,
            name,
            params,
            return_type,
            unique_name: None,
        })
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        self.parse_delimited(Token::RParen, |p| p.parse_param())
    }

    fn parse_param(&mut self) -> ParseResult<Param> {
        let start = self.peek_span();
        let name = if self.check(&Token::SelfLower) {
            self.advance();
            Ident::new("self".to_string(), start)
        } else {
            self.expect_ident()?
        };

        let ty = if self.eat(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        Ok(Param {
            name,
            ty,
            span: start.to(self.prev_span()),
        })
    }

    fn parse_let(&mut self) -> ParseResult<LetStmt> {
        self.expect(Token::Let)?;
        let name = self.expect_ident()?;

        let ty = if self.eat(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let init = if self.eat(&Token::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(LetStmt {
            name,
            ty,
            init,
            unique_name: None,
        })
    }

    /// Optional `-> Return` and `! Effect` after a parameter list
    fn parse_signature_tail(&mut self) -> ParseResult<(Option<TypeExpr>, Option<TypeExpr>)> {
        let return_type = if self.eat(&Token::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let effect = if self.eat(&Token::Bang) {
            Some(self.parse_type()?)
        } else {
            None
        };
        Ok((return_type, effect))
    }

    fn parse_fn_decl(&mut self) -> ParseResult<FnDecl> {
        self.expect(Token::Micro)?;
        let name = self.expect_ident()?;
        self.expect(Token::LParen)?;
        let params = self.parse_params()?;
        let (return_type, effect) = self.parse_signature_tail()?;
        let body = self.parse_block()?;

        Ok(FnDecl {
            name,
            params,
            return_type,
            effect,
            body,
            unique_name: None,
        })
    }

    // === Classes ===

    /// Shared by class, singleton and trait; only the tag differs
    fn parse_class(&mut self) -> ParseResult<ClassDecl> {
        let kind = match self.peek() {
            Token::Class => ClassKind::Class,
            Token::Singleton => ClassKind::Singleton,
            Token::Trait => ClassKind::Trait,
            _ => return self.error(format!("expected class declaration, found '{}'", self.peek())),
        };
        self.advance();

        let name = self.expect_ident()?;

        let extends = if self.eat(&Token::Extends) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let mut implements = Vec::new();
        if self.eat(&Token::Implements) {
            implements.push(self.parse_type()?);
            while self.eat(&Token::Comma) {
                implements.push(self.parse_type()?);
            }
        }

        self.expect(Token::LBrace)?;
        let mut members = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            members.push(self.parse_member()?);
        }
        self.expect(Token::RBrace)?;

        Ok(ClassDecl {
            kind,
            name,
            extends,
            implements,
            members,
            unique_name: None,
        })
    }

    fn parse_member(&mut self) -> ParseResult<ClassMember> {
        let start = self.peek_span();
        match self.peek() {
            Token::Constructor => {
                self.advance();
                self.expect(Token::LParen)?;
                let params = self.parse_params()?;
                let body = self.parse_block()?;
                Ok(ClassMember::Constructor(Constructor {
                    params,
                    body,
                    span: start.to(self.prev_span()),
                }))
            }
            Token::Micro => {
                self.advance();
                self.parse_method(start).map(ClassMember::Method)
            }
            Token::Ident(_) => match self.peek_at(1) {
                Token::LParen => self.parse_method(start).map(ClassMember::Method),
                Token::Colon | Token::Eq | Token::Semi => self.parse_field(start).map(ClassMember::Field),
                other => {
                    let message = format!("expected '(', ':', '=' or ';' after member name, found '{}'", other);
                    self.advance();
                    self.error(message)
                }
            },
            _ => self.error(format!(
                "expected class member (constructor, method or field), found '{}'",
                self.peek()
            )),
        }
    }

    fn parse_method(&mut self, start: Span) -> ParseResult<Method> {
        let name = self.expect_ident()?;
        self.expect(Token::LParen)?;
        let params = self.parse_params()?;
        let (return_type, effect) = self.parse_signature_tail()?;

        // Body is optional (for trait method signatures)
        let body = if self.check(&Token::LBrace) {
            Some(self.parse_block()?)
        } else {
            self.eat(&Token::Semi);
            None
        };

        Ok(Method {
            name,
            params,
            return_type,
            effect,
            body,
            span: start.to(self.prev_span()),
        })
    }

    fn parse_field(&mut self, start: Span) -> ParseResult<Field> {
        let name = self.expect_ident()?;
        let ty = if self.eat(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let init = if self.eat(&Token::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let is_default = init.is_none() && self.eat(&Token::Default);
        self.eat(&Token::Semi);

        Ok(Field {
            name,
            ty,
            init,
            is_default,
            span: start.to(self.prev_span()),
        })
    }

    // === Control flow ===

    fn parse_condition(&mut self) -> ParseResult<Expr> {
        self.with_inline(true, |p| p.parse_expr())
    }

    fn parse_if(&mut self) -> ParseResult<IfStmt> {
        self.expect(Token::If)?;
        let cond = self.parse_condition()?;
        let then_block = self.parse_block()?;

        let else_branch = if self.eat(&Token::Else) {
            if self.check(&Token::If) {
                Some(ElseBranch::If(Box::new(self.parse_if()?)))
            } else {
                Some(ElseBranch::Block(self.parse_block()?))
            }
        } else {
            None
        };

        Ok(IfStmt {
            cond,
            then_block,
            else_branch,
        })
    }

    fn parse_block(&mut self) -> ParseResult<Block> {
        let start = self.peek_span();
        self.expect(Token::LBrace)?;

        let stmts = self.with_inline(false, |p| {
            let mut stmts = Vec::new();
            while !p.check(&Token::RBrace) && !p.is_at_end() {
                stmts.push(p.parse_stmt()?);
            }
            Ok(stmts)
        })?;

        let end = self.expect(Token::RBrace)?;
        Ok(Block {
            stmts,
            span: start.to(end.span),
        })
    }

    // === Expression Parsing (precedence climbing) ===

    pub fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_expr_bp(ASSIGN_PREC)
    }

    fn peek_infix(&self) -> Option<Infix> {
        let op = match self.peek() {
            Token::Eq => Infix::Assign,
            Token::Is => Infix::Is,
            Token::As => Infix::As,
            Token::OrOr => Infix::Binary(BinOp::Or),
            Token::AndAnd => Infix::Binary(BinOp::And),
            Token::EqEq => Infix::Binary(BinOp::Eq),
            Token::NotEq => Infix::Binary(BinOp::NotEq),
            Token::Lt => Infix::Binary(BinOp::Lt),
            Token::Gt => Infix::Binary(BinOp::Gt),
            Token::LtEq => Infix::Binary(BinOp::LtEq),
            Token::GtEq => Infix::Binary(BinOp::GtEq),
            Token::Pipe => Infix::Binary(BinOp::BitOr),
            Token::Amp => Infix::Binary(BinOp::BitAnd),
            Token::Plus => Infix::Binary(BinOp::Add),
            Token::Minus => Infix::Binary(BinOp::Sub),
            Token::Star => Infix::Binary(BinOp::Mul),
            Token::Slash => Infix::Binary(BinOp::Div),
            Token::Percent => Infix::Binary(BinOp::Mod),
            _ => return None,
        };
        Some(op)
    }

    fn parse_expr_bp(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;

        while let Some(op) = self.peek_infix() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }

            self.advance(); // consume operator
            left = match op {
                Infix::Is | Infix::As => {
                    let optional = self.eat(&Token::Question);
                    let ty = self.parse_type_operand()?;
                    let span = left.span.to(ty.span);
                    let kind = if matches!(op, Infix::Is) {
                        ExprKind::Is(Box::new(left), ty, optional)
                    } else {
                        ExprKind::As(Box::new(left), ty, optional)
                    };
                    Expr { kind, span }
                }
                Infix::Assign => {
                    if !is_assignable(&left) {
                        return Err(ParseError {
                            message: "invalid assignment target".to_string(),
                            span: left.span,
                        });
                    }
                    // Right-associative: same minimum precedence on the right
                    let right = self.parse_expr_bp(prec)?;
                    let span = left.span.to(right.span);
                    Expr {
                        kind: ExprKind::Assign(Box::new(left), Box::new(right)),
                        span,
                    }
                }
                Infix::Binary(bin) => {
                    let right = self.parse_expr_bp(prec + 1)?;
                    let span = left.span.to(right.span);
                    Expr {
                        kind: ExprKind::Binary(Box::new(left), bin, Box::new(right)),
                        span,
                    }
                }
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let start = self.peek_span();
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Bang => UnaryOp::Not,
            Token::Await => UnaryOp::Await,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        let span = start.to(operand.span);
        Ok(Expr {
            kind: ExprKind::Unary(op, Box::new(operand)),
            span,
        })
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek() {
                Token::LParen => {
                    self.advance();
                    let args = self.parse_delimited(Token::RParen, |p| p.parse_expr())?;
                    let closure = if !self.inline && self.check(&Token::LBrace) {
                        Some(self.parse_block()?)
                    } else {
                        None
                    };
                    let span = expr.span.to(self.prev_span());
                    expr = Expr {
                        kind: ExprKind::Call(Box::new(expr), args, closure),
                        span,
                    };
                }
                Token::Dot => {
                    self.advance();
                    let field = self.expect_member_name()?;
                    let span = expr.span.to(field.span);
                    expr = Expr {
                        kind: ExprKind::Field(Box::new(expr), field),
                        span,
                    };
                }
                Token::ColonColon => {
                    self.advance();
                    let member = self.expect_member_name()?;
                    let span = expr.span.to(member.span);
                    expr = Expr {
                        kind: ExprKind::StaticMember(Box::new(expr), member),
                        span,
                    };
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.with_inline(false, |p| p.parse_expr())?;
                    let end = self.expect(Token::RBracket)?;
                    let span = expr.span.to(end.span);
                    expr = Expr {
                        kind: ExprKind::Index(Box::new(expr), Box::new(index)),
                        span,
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let start = self.peek_span();

        let kind = match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                ExprKind::Number(n)
            }
            Token::String(s) => {
                self.advance();
                ExprKind::String(s)
            }
            Token::Bool(b) => {
                self.advance();
                ExprKind::Bool(b)
            }
            Token::Ident(name) => {
                self.advance();
                ExprKind::Ident(Ident::new(name, start))
            }
            Token::SelfLower => {
                self.advance();
                ExprKind::Ident(Ident::new("self".to_string(), start))
            }
            Token::SelfUpper => {
                self.advance();
                ExprKind::Ident(Ident::new("Self".to_string(), start))
            }
            Token::LParen => {
                self.advance();
                let inner = self.with_inline(false, |p| p.parse_expr())?;
                self.expect(Token::RParen)?;
                return Ok(inner);
            }
            Token::LBracket => {
                self.advance();
                ExprKind::Array(self.parse_delimited(Token::RBracket, |p| p.parse_expr())?)
            }
            Token::LBrace => {
                self.advance();
                ExprKind::Object(self.parse_delimited(Token::RBrace, |p| p.parse_object_field())?)
            }
            Token::Micro => {
                self.advance();
                self.expect(Token::LParen)?;
                let params = self.parse_params()?;
                self.parse_signature_tail()?;
                let body = self.parse_block()?;
                ExprKind::Lambda(params, body)
            }
            Token::New => {
                self.advance();
                let class = if self.check(&Token::SelfUpper) {
                    let span = self.advance().span;
                    Ident::new("Self".to_string(), span)
                } else {
                    let path = self.parse_path()?;
                    let span = path[0].span.to(path[path.len() - 1].span);
                    Ident::new(join_path(&path), span)
                };
                let args = if self.eat(&Token::LParen) {
                    self.parse_delimited(Token::RParen, |p| p.parse_expr())?
                } else {
                    Vec::new()
                };
                ExprKind::New(class, args)
            }
            _ => return self.error(format!("expected expression, found '{}'", self.peek())),
        };

        Ok(Expr {
            kind,
            span: start.to(self.prev_span()),
        })
    }

    fn parse_object_field(&mut self) -> ParseResult<ObjectField> {
        let start = self.peek_span();
        let key = match self.peek().clone() {
            Token::String(s) => {
                self.advance();
                s
            }
            _ => self.expect_member_name()?.name,
        };
        self.expect(Token::Colon)?;
        let value = self.parse_expr()?;
        Ok(ObjectField {
            key,
            span: start.to(value.span),
            value,
        })
    }

    // === Type Parsing (precedence climbing) ===

    pub fn parse_type(&mut self) -> ParseResult<TypeExpr> {
        self.parse_type_bp(1)
    }

    fn peek_type_op(&self) -> Option<TypeOp> {
        match self.peek() {
            Token::Arrow => Some(TypeOp::Arrow),
            Token::Pipe => Some(TypeOp::Union),
            Token::Amp => Some(TypeOp::Intersection),
            Token::Plus => Some(TypeOp::Sum),
            _ => None,
        }
    }

    /// Primary type after `is` / `as`
    fn parse_type_operand(&mut self) -> ParseResult<TypeExpr> {
        let saved = std::mem::replace(&mut self.type_operand, true);
        let result = self.parse_type_bp(TYPE_OPERAND_PREC);
        self.type_operand = saved;
        result
    }

    /// The `<` at the cursor has a matching `>` with only type tokens between
    fn type_args_follow(&self) -> bool {
        let mut depth = 0usize;
        let mut offset = 0;
        loop {
            match self.peek_at(offset) {
                Token::Lt => depth += 1,
                Token::Gt => {
                    depth -= 1;
                    if depth == 0 {
                        return true;
                    }
                }
                Token::Ident(_)
                | Token::SelfUpper
                | Token::ColonColon
                | Token::Comma
                | Token::LBracket
                | Token::RBracket
                | Token::LParen
                | Token::RParen
                | Token::Arrow
                | Token::Pipe
                | Token::Amp
                | Token::Plus => {}
                _ => return false,
            }
            offset += 1;
        }
    }

    fn parse_type_bp(&mut self, min_prec: u8) -> ParseResult<TypeExpr> {
        let mut left = self.parse_type_primary()?;

        while let Some(op) = self.peek_type_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }

            self.advance();
            let next_min = if op.is_right_assoc() { prec } else { prec + 1 };
            let right = self.parse_type_bp(next_min)?;
            let span = left.span.to(right.span);
            left = TypeExpr {
                kind: TypeKind::Binary(Box::new(left), op, Box::new(right)),
                span,
            };
        }

        Ok(left)
    }

    fn parse_type_primary(&mut self) -> ParseResult<TypeExpr> {
        let start = self.peek_span();

        match self.peek() {
            Token::Ident(_) => {
                let path = self.parse_path()?;
                let name = Ident::new(join_path(&path), start.to(self.prev_span()));
                let opens_args = self.check(&Token::Lt) && (!self.type_operand || self.type_args_follow());
                let type_args = if opens_args {
                    self.advance();
                    self.parse_delimited(Token::Gt, |p| p.parse_type())?
                } else {
                    Vec::new()
                };
                Ok(TypeExpr {
                    kind: TypeKind::Named(name, type_args),
                    span: start.to(self.prev_span()),
                })
            }
            Token::SelfUpper => {
                self.advance();
                Ok(TypeExpr {
                    kind: TypeKind::Named(Ident::new("Self".to_string(), start), Vec::new()),
                    span: start,
                })
            }
            Token::LBracket => {
                self.advance();
                let elem = self.parse_type()?;
                let end = self.expect(Token::RBracket)?;
                Ok(TypeExpr {
                    kind: TypeKind::Array(Box::new(elem)),
                    span: start.to(end.span),
                })
            }
            Token::LParen => {
                self.advance();
                if self.check(&Token::RParen) {
                    let end = self.advance().span;
                    return Ok(TypeExpr {
                        kind: TypeKind::Unit,
                        span: start.to(end),
                    });
                }
                let inner = self.parse_type()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            _ => self.error(format!("expected type, found '{}'", self.peek())),
        }
    }
}

fn is_assignable(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Ident(_) | ExprKind::Field(..) | ExprKind::Index(..) | ExprKind::StaticMember(..)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_lexer::Lexer;

    fn parse_ok(source: &str) -> Program {
        parse(Lexer::tokenize(source).unwrap()).unwrap()
    }

    fn parse_err(source: &str) -> ParseError {
        parse(Lexer::tokenize(source).unwrap()).unwrap_err()
    }

    fn expr_of(source: &str) -> Expr {
        let program = parse_ok(source);
        match &program.stmts[0].kind {
            StmtKind::Expr(e) => e.clone(),
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_fn() {
        let ast = parse_ok("micro main() { let x = 5 }");
        assert_eq!(ast.stmts.len(), 1);
        let StmtKind::Function(f) = &ast.stmts[0].kind else {
            panic!("expected function");
        };
        assert_eq!(f.name.name, "main");
        assert_eq!(f.body.stmts.len(), 1);
    }

    #[test]
    fn test_multiplication_binds_tighter() {
        assert_eq!(expr_of("1 + 2 * 3").pretty_print(), "(1 + (2 * 3))");
        assert_eq!(expr_of("1 * 2 + 3").pretty_print(), "((1 * 2) + 3)");
    }

    #[test]
    fn test_left_and_right_associativity() {
        assert_eq!(expr_of("a - b - c").pretty_print(), "((a - b) - c)");
        assert_eq!(expr_of("a = b = 1").pretty_print(), "(a = (b = 1))");
    }

    #[test]
    fn test_full_value_precedence_ladder() {
        let expr = expr_of("x = a || b && c == d < e | f + g * h");
        assert_eq!(
            expr.pretty_print(),
            "(x = (a || (b && (c == (d < (e | (f + (g * h))))))))"
        );
    }

    #[test]
    fn test_type_tests_and_casts() {
        let expr = expr_of("x is? Point && y as Shape == z");
        assert_eq!(expr.pretty_print(), "((x is? Point) && ((y as Shape) == z))");
        let ExprKind::Binary(left, BinOp::And, _) = &expr.kind else {
            panic!("expected &&");
        };
        assert!(matches!(left.kind, ExprKind::Is(_, _, true)));
    }

    #[test]
    fn test_type_test_followed_by_comparison() {
        assert_eq!(expr_of("a as Number < b").pretty_print(), "((a as Number) < b)");
        assert_eq!(expr_of("a is Box < b + 1").pretty_print(), "((a is Box) < (b + 1))");
        assert_eq!(
            expr_of("a is Map<String, [Number]> == c").pretty_print(),
            "((a is Map<String, [Number]>) == c)"
        );

        let program = parse_ok("let c = a as Number < b");
        let StmtKind::Let(l) = &program.stmts[0].kind else {
            panic!("expected let");
        };
        assert_eq!(l.init.as_ref().unwrap().pretty_print(), "((a as Number) < b)");
    }

    #[test]
    fn test_type_grammar_precedence() {
        let program = parse_ok("let f: A -> B -> C | D & E + F");
        let StmtKind::Let(l) = &program.stmts[0].kind else {
            panic!("expected let");
        };
        assert_eq!(
            l.ty.as_ref().unwrap().pretty_print(),
            "(A -> (B -> (C | (D & (E + F)))))"
        );
    }

    #[test]
    fn test_generic_and_array_types() {
        let program = parse_ok("let xs: Map<String, [Number]> | ()");
        let StmtKind::Let(l) = &program.stmts[0].kind else {
            panic!("expected let");
        };
        assert_eq!(l.ty.as_ref().unwrap().pretty_print(), "(Map<String, [Number]> | ())");
    }

    #[test]
    fn test_postfix_chain_with_trailing_closure() {
        let expr = expr_of("a.b[0](x) { y }");
        let ExprKind::Call(callee, args, closure) = &expr.kind else {
            panic!("expected call");
        };
        assert_eq!(callee.pretty_print(), "a.b[0]");
        assert_eq!(args.len(), 1);
        assert_eq!(closure.as_ref().unwrap().stmts.len(), 1);
    }

    #[test]
    fn test_no_trailing_closure_in_conditions() {
        let program = parse_ok("if ready(x) { go() } else { stop() }");
        let StmtKind::If(stmt) = &program.stmts[0].kind else {
            panic!("expected if");
        };
        assert!(matches!(stmt.cond.kind, ExprKind::Call(_, _, None)));
        assert_eq!(stmt.then_block.stmts.len(), 1);
        assert!(matches!(stmt.else_branch, Some(ElseBranch::Block(_))));

        let program = parse_ok("while (poll() { tick() }) { wait() }");
        let StmtKind::While(cond, _) = &program.stmts[0].kind else {
            panic!("expected while");
        };
        assert!(matches!(cond.kind, ExprKind::Call(_, _, Some(_))));
    }

    #[test]
    fn test_static_member_and_new() {
        let expr = expr_of("Self::create(new geo::Point(1, 2))");
        assert_eq!(expr.pretty_print(), "Self::create(new geo::Point(1, 2))");
    }

    #[test]
    fn test_named_function_versus_lambda() {
        let program = parse_ok("micro named(a) { return a }\nmicro (b) { return b }");
        assert!(matches!(program.stmts[0].kind, StmtKind::Function(_)));
        let StmtKind::Expr(e) = &program.stmts[1].kind else {
            panic!("expected expression statement");
        };
        assert!(matches!(e.kind, ExprKind::Lambda(..)));
    }

    #[test]
    fn test_namespace_and_using() {
        let program = parse_ok("namespace! app;\nnamespace lib::core!\nusing ::std::io;\nusing app");
        let StmtKind::Namespace(a) = &program.stmts[0].kind else { panic!() };
        assert!(a.is_main);
        assert_eq!(a.key(), "app!");
        let StmtKind::Namespace(b) = &program.stmts[1].kind else { panic!() };
        assert_eq!(b.key(), "lib::core!");
        let StmtKind::Using(u) = &program.stmts[2].kind else { panic!() };
        assert!(u.is_global);
        assert_eq!(u.target(), "std::io");
        let StmtKind::Using(u) = &program.stmts[3].kind else { panic!() };
        assert!(!u.is_global);
    }

    #[test]
    fn test_foreign_binding() {
        let program = parse_ok("@foreign(\"console.log\") micro log(msg: String);\n@foreign micro fetch(url)");
        let StmtKind::Foreign(f) = &program.stmts[0].kind else { panic!() };
        assert_eq!(f.target, "console.log");
        assert_eq!(f.name.name, "log");
        let StmtKind::Foreign(f) = &program.stmts[1].kind else { panic!() };
        assert_eq!(f.target, "fetch");

        let err = parse_err("@inline micro f()");
        assert!(err.message.contains("unknown attribute"));
    }

    #[test]
    fn test_class_members() {
        let source = r#"
            class Circle extends Shape implements Drawable, Named {
                radius: Number;
                label = "circle";
                count: Number default
                constructor(r) { self.radius = r }
                area(self) -> Number { return self.radius * self.radius }
                micro unit() { return new Circle(1) }
            }
        "#;
        let program = parse_ok(source);
        let StmtKind::Class(class) = &program.stmts[0].kind else { panic!() };
        assert_eq!(class.kind, ClassKind::Class);
        assert!(class.extends.is_some());
        assert_eq!(class.implements.len(), 2);
        assert_eq!(class.fields().count(), 3);
        assert!(class.constructor().is_some());

        let fields: Vec<_> = class.fields().collect();
        assert!(!fields[0].has_initializer());
        assert!(fields[1].init.is_some());
        assert!(fields[2].is_default);

        let methods: Vec<_> = class.methods().collect();
        assert!(methods[0].is_instance());
        assert!(!methods[1].is_instance());
        assert!(class.has_member("area"));
        assert!(class.has_member("label"));
    }

    #[test]
    fn test_singleton_and_trait_share_body_parser() {
        let program = parse_ok("singleton Config { debug = false }\ntrait Named { name(self) -> String; }");
        let StmtKind::Class(a) = &program.stmts[0].kind else { panic!() };
        assert_eq!(a.kind, ClassKind::Singleton);
        let StmtKind::Class(b) = &program.stmts[1].kind else { panic!() };
        assert_eq!(b.kind, ClassKind::Trait);
        assert!(b.methods().next().unwrap().body.is_none());
    }

    #[test]
    fn test_collections_and_return() {
        let program = parse_ok("micro f() { return [1, 2,]; }\nlet o = { a: 1, \"b\": [x] }\nmicro g() { return }");
        let StmtKind::Function(f) = &program.stmts[0].kind else { panic!() };
        let StmtKind::Return(Some(value)) = &f.body.stmts[0].kind else { panic!() };
        assert_eq!(value.pretty_print(), "[1, 2]");
        let StmtKind::Let(l) = &program.stmts[1].kind else { panic!() };
        assert_eq!(l.init.as_ref().unwrap().pretty_print(), "{ a: 1, b: [x] }");
        let StmtKind::Function(g) = &program.stmts[2].kind else { panic!() };
        assert!(matches!(g.body.stmts[0].kind, StmtKind::Return(None)));
    }

    #[test]
    fn test_until_and_unary() {
        let program = parse_ok("until done { n = -n; x = !await poll() }");
        let StmtKind::Until(cond, body) = &program.stmts[0].kind else { panic!() };
        assert_eq!(cond.pretty_print(), "done");
        assert_eq!(body.stmts.len(), 2);
    }

    #[test]
    fn test_parse_errors_carry_position() {
        let err = parse_err("let x = 1\nlet = 5");
        assert_eq!((err.line(), err.column()), (2, 5));
        assert!(err.message.contains("expected identifier"));

        let err = parse_err("f(1, 2");
        assert!(err.message.contains("expected ')'"));

        let err = parse_err("1 = 2");
        assert_eq!(err.message, "invalid assignment target");
    }

    #[test]
    fn test_first_error_stops_parsing() {
        let err = parse_err("let = 1\nlet = 2");
        assert_eq!(err.line(), 1);
    }
}
