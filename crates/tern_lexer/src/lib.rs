use logos::Logos;
use thiserror::Error;

/// Process escape sequences in a string literal
fn process_escape_sequences(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some('0') => result.push('\0'),
                Some(other) => {
                    // Unknown escape - keep as-is
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// Index of a source file within one compilation
pub type FileId = u32;

/// Span in source code: byte offsets plus the 1-based line/column of `start`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub file: FileId,
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(file: FileId, start: usize, end: usize, line: u32, column: u32) -> Self {
        Self { file, start, end, line, column }
    }

    /// Span running from the start of `self` to the end of `other`
    pub fn to(self, other: Span) -> Span {
        Span { end: other.end.max(self.start), ..self }
    }
}

/// Maps byte offsets to line/column pairs
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { starts }
    }

    /// 1-based line and column (in chars) of a byte offset
    pub fn locate(&self, source: &str, offset: usize) -> (u32, u32) {
        let offset = offset.min(source.len());
        let line = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line_start = self.starts[line];
        let column = source
            .get(line_start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - line_start);
        (line as u32 + 1, column as u32 + 1)
    }

    /// Byte offset of a 1-based line/column pair, clamped to the source
    pub fn offset(&self, source: &str, line: u32, column: u32) -> usize {
        let Some(&line_start) = self.starts.get(line.saturating_sub(1) as usize) else {
            return source.len();
        };
        source[line_start..]
            .char_indices()
            .take_while(|(_, c)| *c != '\n')
            .nth(column.saturating_sub(1) as usize)
            .map(|(i, _)| line_start + i)
            .unwrap_or_else(|| {
                source[line_start..]
                    .find('\n')
                    .map(|i| line_start + i)
                    .unwrap_or(source.len())
            })
    }
}

/// A token with its span and source text
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub text: String,
    pub span: Span,
}

impl SpannedToken {
    pub fn line(&self) -> u32 {
        self.span.line
    }

    pub fn column(&self) -> u32 {
        self.span.column
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")] // Skip whitespace
#[logos(skip r"//[^\n]*")] // Skip line comments
#[logos(skip r"#[^\n]*")] // Skip hash comments
pub enum Token {
    // === Keywords ===
    #[token("let")]
    Let,
    #[token("micro")]
    Micro,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("until")]
    Until,
    #[token("return")]
    Return,
    #[token("namespace")]
    Namespace,
    #[token("using")]
    Using,
    #[token("class")]
    Class,
    #[token("singleton")]
    Singleton,
    #[token("trait")]
    Trait,
    #[token("constructor")]
    Constructor,
    #[token("self")]
    SelfLower,
    #[token("Self")]
    SelfUpper,
    #[token("extends")]
    Extends,
    #[token("implements")]
    Implements,
    #[token("new")]
    New,
    #[token("default")]
    Default,
    #[token("await")]
    Await,
    #[token("is")]
    Is,
    #[token("as")]
    As,

    // === Literals ===
    #[token("true", |_| true)]
    #[token("false", |_| false)]
    Bool(bool),

    #[regex(r"[0-9][0-9_]*(\.[0-9][0-9_]*)?", |lex| lex.slice().replace('_', ""))]
    Number(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        process_escape_sequences(&s[1..s.len() - 1])
    })]
    String(String),

    // === Identifiers ===
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // === Operators ===
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=")]
    Eq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("?")]
    Question,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // === Punctuation ===
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("::")]
    ColonColon,
    #[token(";")]
    Semi,
    #[token(".")]
    Dot,
    #[token("->")]
    Arrow,
    #[token("@")]
    At,

    // === Special ===
    Eof,
}

/// Coarse token classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Keyword,
    Literal,
    Identifier,
    Operator,
    Punctuation,
    Eof,
}

impl Token {
    pub fn class(&self) -> TokenClass {
        match self {
            Token::Let | Token::Micro | Token::If | Token::Else | Token::While | Token::Until
            | Token::Return | Token::Namespace | Token::Using | Token::Class | Token::Singleton
            | Token::Trait | Token::Constructor | Token::SelfLower | Token::SelfUpper
            | Token::Extends | Token::Implements | Token::New | Token::Default | Token::Await
            | Token::Is | Token::As => TokenClass::Keyword,

            Token::Bool(_) | Token::Number(_) | Token::String(_) => TokenClass::Literal,

            Token::Ident(_) => TokenClass::Identifier,

            Token::Plus | Token::Minus | Token::Star | Token::Slash | Token::Percent
            | Token::Eq | Token::EqEq | Token::NotEq | Token::Lt | Token::Gt | Token::LtEq
            | Token::GtEq | Token::AndAnd | Token::OrOr | Token::Bang | Token::Amp
            | Token::Pipe | Token::Question => TokenClass::Operator,

            Token::LParen | Token::RParen | Token::LBrace | Token::RBrace | Token::LBracket
            | Token::RBracket | Token::Comma | Token::Colon | Token::ColonColon | Token::Semi
            | Token::Dot | Token::Arrow | Token::At => TokenClass::Punctuation,

            Token::Eof => TokenClass::Eof,
        }
    }
}

impl std::fmt::Display for TokenClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenClass::Keyword => write!(f, "KEYWORD"),
            TokenClass::Literal => write!(f, "LITERAL"),
            TokenClass::Identifier => write!(f, "IDENT"),
            TokenClass::Operator => write!(f, "OPERATOR"),
            TokenClass::Punctuation => write!(f, "PUNCTUATION"),
            TokenClass::Eof => write!(f, "EOF"),
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Let => write!(f, "let"),
            Token::Micro => write!(f, "micro"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::While => write!(f, "while"),
            Token::Until => write!(f, "until"),
            Token::Return => write!(f, "return"),
            Token::Namespace => write!(f, "namespace"),
            Token::Using => write!(f, "using"),
            Token::Class => write!(f, "class"),
            Token::Singleton => write!(f, "singleton"),
            Token::Trait => write!(f, "trait"),
            Token::Constructor => write!(f, "constructor"),
            Token::SelfLower => write!(f, "self"),
            Token::SelfUpper => write!(f, "Self"),
            Token::Extends => write!(f, "extends"),
            Token::Implements => write!(f, "implements"),
            Token::New => write!(f, "new"),
            Token::Default => write!(f, "default"),
            Token::Await => write!(f, "await"),
            Token::Is => write!(f, "is"),
            Token::As => write!(f, "as"),
            Token::Bool(b) => write!(f, "{}", b),
            Token::Number(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Eq => write!(f, "="),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::LtEq => write!(f, "<="),
            Token::GtEq => write!(f, ">="),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
            Token::Bang => write!(f, "!"),
            Token::Amp => write!(f, "&"),
            Token::Pipe => write!(f, "|"),
            Token::Question => write!(f, "?"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::ColonColon => write!(f, "::"),
            Token::Semi => write!(f, ";"),
            Token::Dot => write!(f, "."),
            Token::Arrow => write!(f, "->"),
            Token::At => write!(f, "@"),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// Lexer wrapper that produces SpannedTokens
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, Token>,
    file: FileId,
    lines: LineIndex,
    finished: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self::with_file(0, source)
    }

    pub fn with_file(file: FileId, source: &'src str) -> Self {
        Self {
            inner: Token::lexer(source),
            file,
            lines: LineIndex::new(source),
            finished: false,
        }
    }

    /// Tokenize the entire source into a Vec
    pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, LexError> {
        Self::tokenize_file(0, source)
    }

    /// Tokenize a source that belongs to `file` of a larger compilation
    pub fn tokenize_file(file: FileId, source: &str) -> Result<Vec<SpannedToken>, LexError> {
        let mut lexer = Lexer::with_file(file, source);
        let mut tokens = Vec::new();

        loop {
            let spanned = lexer.next_token()?;
            let is_eof = spanned.token == Token::Eof;
            tokens.push(spanned);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    fn span_at(&self, start: usize, end: usize) -> Span {
        let (line, column) = self.lines.locate(self.inner.source(), start);
        Span::new(self.file, start, end, line, column)
    }

    pub fn next_token(&mut self) -> Result<SpannedToken, LexError> {
        if self.finished {
            let len = self.inner.source().len();
            return Ok(SpannedToken {
                token: Token::Eof,
                text: String::new(),
                span: self.span_at(len, len),
            });
        }

        match self.inner.next() {
            Some(Ok(token)) => {
                let range = self.inner.span();
                Ok(SpannedToken {
                    token,
                    text: self.inner.slice().to_string(),
                    span: self.span_at(range.start, range.end),
                })
            }
            Some(Err(())) => {
                let range = self.inner.span();
                let span = self.span_at(range.start, range.end);
                let slice = self.inner.slice();
                if slice.starts_with('"') {
                    Err(LexError::UnterminatedString {
                        line: span.line,
                        column: span.column,
                        offset: span.start,
                    })
                } else {
                    Err(LexError::UnexpectedChar {
                        ch: slice.chars().next().unwrap_or('\0'),
                        line: span.line,
                        column: span.column,
                        offset: span.start,
                    })
                }
            }
            None => {
                self.finished = true;
                let len = self.inner.source().len();
                Ok(SpannedToken {
                    token: Token::Eof,
                    text: String::new(),
                    span: self.span_at(len, len),
                })
            }
        }
    }
}

/// Unrecoverable lexing failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated string literal at {line}:{column}")]
    UnterminatedString { line: u32, column: u32, offset: usize },
    #[error("unexpected character '{ch}' at {line}:{column}")]
    UnexpectedChar {
        ch: char,
        line: u32,
        column: u32,
        offset: usize,
    },
}

impl LexError {
    pub fn line(&self) -> u32 {
        match self {
            LexError::UnterminatedString { line, .. } | LexError::UnexpectedChar { line, .. } => *line,
        }
    }

    pub fn column(&self) -> u32 {
        match self {
            LexError::UnterminatedString { column, .. }
            | LexError::UnexpectedChar { column, .. } => *column,
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            LexError::UnterminatedString { offset, .. }
            | LexError::UnexpectedChar { offset, .. } => *offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        Lexer::tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_basic_tokens() {
        let source = "micro main() { let x = 5 }";
        let tokens = Lexer::tokenize(source).unwrap();

        assert!(matches!(tokens[0].token, Token::Micro));
        assert!(matches!(tokens[1].token, Token::Ident(ref s) if s == "main"));
        assert!(matches!(tokens[2].token, Token::LParen));
        assert!(matches!(tokens[3].token, Token::RParen));
        assert!(matches!(tokens[4].token, Token::LBrace));
        assert!(matches!(tokens[5].token, Token::Let));
        assert!(matches!(tokens[6].token, Token::Ident(ref s) if s == "x"));
        assert!(matches!(tokens[7].token, Token::Eq));
        assert!(matches!(tokens[8].token, Token::Number(ref n) if n == "5"));
        assert!(matches!(tokens[9].token, Token::RBrace));
        assert!(matches!(tokens[10].token, Token::Eof));
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            kinds("== != -> && || <= >= ::"),
            vec![
                Token::EqEq,
                Token::NotEq,
                Token::Arrow,
                Token::AndAnd,
                Token::OrOr,
                Token::LtEq,
                Token::GtEq,
                Token::ColonColon,
                Token::Eof,
            ]
        );
        assert_eq!(
            kinds("= ! - & | < > :"),
            vec![
                Token::Eq,
                Token::Bang,
                Token::Minus,
                Token::Amp,
                Token::Pipe,
                Token::Lt,
                Token::Gt,
                Token::Colon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let tokens = kinds("singleton Self self selfish is as await defaults true");
        assert_eq!(tokens[0], Token::Singleton);
        assert_eq!(tokens[1], Token::SelfUpper);
        assert_eq!(tokens[2], Token::SelfLower);
        assert_eq!(tokens[3], Token::Ident("selfish".to_string()));
        assert_eq!(tokens[4], Token::Is);
        assert_eq!(tokens[5], Token::As);
        assert_eq!(tokens[6], Token::Await);
        assert_eq!(tokens[7], Token::Ident("defaults".to_string()));
        assert_eq!(tokens[8], Token::Bool(true));
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = kinds("let a # trailing note\n// whole line\nlet b");
        assert_eq!(
            tokens,
            vec![
                Token::Let,
                Token::Ident("a".to_string()),
                Token::Let,
                Token::Ident("b".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_line_and_column_tracking() {
        let tokens = Lexer::tokenize("let a = 1\n  a = 2").unwrap();
        assert_eq!((tokens[0].line(), tokens[0].column()), (1, 1));
        assert_eq!((tokens[3].line(), tokens[3].column()), (1, 9));
        assert_eq!((tokens[4].line(), tokens[4].column()), (2, 3));
        let eof = tokens.last().unwrap();
        assert_eq!(eof.token, Token::Eof);
        assert_eq!((eof.line(), eof.column()), (2, 8));
    }

    #[test]
    fn test_exactly_one_eof() {
        let tokens = Lexer::tokenize("").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token, Token::Eof);
        let tokens = Lexer::tokenize("a b c").unwrap();
        assert_eq!(tokens.iter().filter(|t| t.token == Token::Eof).count(), 1);
    }

    #[test]
    fn test_string_escapes() {
        let tokens = kinds(r#""say \"hi\"\nbye""#);
        assert_eq!(tokens[0], Token::String("say \"hi\"\nbye".to_string()));
    }

    #[test]
    fn test_token_text() {
        let tokens = Lexer::tokenize("value 1_000").unwrap();
        assert_eq!(tokens[0].text, "value");
        assert_eq!(tokens[1].text, "1_000");
        assert_eq!(tokens[1].token, Token::Number("1000".to_string()));
    }

    #[test]
    fn test_unterminated_string_is_hard_error() {
        let err = Lexer::tokenize("let s = \"oops").unwrap_err();
        assert!(matches!(err, LexError::UnterminatedString { line: 1, column: 9, .. }));
    }

    #[test]
    fn test_unexpected_character_is_hard_error() {
        let err = Lexer::tokenize("let a = 1\nlet b = $").unwrap_err();
        assert_eq!(
            err,
            LexError::UnexpectedChar {
                ch: '$',
                line: 2,
                column: 9,
                offset: 18,
            }
        );
    }

    #[test]
    fn test_line_index_offset_roundtrip() {
        let source = "ab\ncdé\nf";
        let index = LineIndex::new(source);
        assert_eq!(index.locate(source, 4), (2, 2));
        assert_eq!(index.offset(source, 2, 2), 4);
        assert_eq!(index.offset(source, 3, 1), source.len() - 1);
    }

    #[test]
    fn test_token_classes() {
        assert_eq!(Token::Micro.class(), TokenClass::Keyword);
        assert_eq!(Token::Number("1".into()).class(), TokenClass::Literal);
        assert_eq!(Token::Ident("x".into()).class(), TokenClass::Identifier);
        assert_eq!(Token::NotEq.class(), TokenClass::Operator);
        assert_eq!(Token::ColonColon.class(), TokenClass::Punctuation);
    }
}
