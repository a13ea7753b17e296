//! Converts source text into a token stream.
//!
//! Tokenization never aborts on the first bad character: like the rest of
//! this pipeline, it keeps scanning and collects every [`LexError`] it finds
//! so a single run can report as many problems as possible. Column tracking
//! is synchronous with consumption (each consumed byte immediately advances
//! `line`/`column`), which is simpler than — and observably equivalent to —
//! lazily updating the column only after a token is fully emitted.

use copper_core::TranslationUnit;

use crate::token::{keyword_kind, Token, TokenKind};

/// A single lexical failure: an unterminated literal, an unterminated
/// comment, or a character the grammar has no token for.
#[derive(Debug, Clone)]
pub struct LexError {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
    /// Balance of `{`/`}` seen since the start of the current (possibly
    /// nested) interpolation, so `stringTemplate`'s recursive scan knows
    /// which `}` closes the interpolation rather than a nested block.
    braces_opened: usize,
    /// How many `${ ... }` interpolations are currently being scanned.
    interpolation_depth: usize,
}

/// Tokenizes `tu`'s source, returning every token (including a trailing
/// `Eof`) and every lexical error encountered along the way.
pub fn tokenize(tu: &TranslationUnit) -> (Vec<Token>, Vec<LexError>) {
    let mut lexer = Lexer {
        source: tu.source().as_bytes(),
        pos: 0,
        line: 1,
        column: 1,
        tokens: Vec::new(),
        errors: Vec::new(),
        braces_opened: 0,
        interpolation_depth: 0,
    };
    lexer.scan();
    lexer.tokens.push(Token::new(TokenKind::Eof, "", lexer.line, lexer.column));
    tracing::debug!(token_count = lexer.tokens.len(), error_count = lexer.errors.len(), "tokenized source");
    (lexer.tokens, lexer.errors)
}

impl<'a> Lexer<'a> {
    fn at_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn peek(&self) -> u8 {
        self.source.get(self.pos).copied().unwrap_or(0)
    }

    fn peek_next(&self) -> u8 {
        self.source.get(self.pos + 1).copied().unwrap_or(0)
    }

    fn advance(&mut self) -> u8 {
        let c = self.source[self.pos];
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn push(&mut self, kind: TokenKind, lexeme: impl Into<String>, line: u32, column: u32) {
        self.tokens.push(Token::new(kind, lexeme, line, column));
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(LexError { line: self.line, column: self.column, message: message.into() });
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), b' ' | b'\t' | b'\r' | b'\n') {
            self.advance();
        }
    }

    fn is_alpha(c: u8) -> bool {
        c.is_ascii_alphabetic() || c == b'_' || c == b'$'
    }

    fn is_digit(c: u8) -> bool {
        c.is_ascii_digit()
    }

    /// The core scan loop. Runs until end of input at the top level; a
    /// nested call (from template-string interpolation) returns as soon as
    /// it consumes the `}` that closes its own `${ ... }`.
    fn scan(&mut self) {
        // `braces_opened` tracks only brace balance within *this* scan
        // invocation (mirrors the reference's per-call local counter), so a
        // nested interpolation's braces never leak into the enclosing one.
        let saved_braces_opened = self.braces_opened;
        self.braces_opened = 0;

        while !self.at_eof() {
            self.skip_whitespace();
            if self.at_eof() {
                break;
            }

            let (line, column) = (self.line, self.column);
            let c = self.peek();

            if Self::is_digit(c) {
                self.scan_number(line, column);
                continue;
            }
            if Self::is_alpha(c) {
                self.scan_identifier(line, column);
                continue;
            }

            match c {
                b'%' => self.single(TokenKind::Modulo, "%"),
                b'(' => self.single(TokenKind::OpenParen, "("),
                b')' => self.single(TokenKind::CloseParen, ")"),
                b'[' => self.single(TokenKind::OpenSquareBracket, "["),
                b']' => self.single(TokenKind::CloseSquareBracket, "]"),
                b':' => self.single(TokenKind::Colon, ":"),
                b';' => self.single(TokenKind::Semicolon, ";"),
                b'.' => self.single(TokenKind::Dot, "."),
                b',' => self.single(TokenKind::Comma, ","),
                b'{' => {
                    self.braces_opened += 1;
                    self.single(TokenKind::OpenBrace, "{");
                }
                b'}' => {
                    self.advance();
                    self.push(TokenKind::CloseBrace, "}", line, column);
                    if self.interpolation_depth > 0 && self.braces_opened == 0 {
                        self.braces_opened = saved_braces_opened;
                        return;
                    }
                    self.braces_opened = self.braces_opened.saturating_sub(1);
                }
                b'+' => match self.peek_next() {
                    b'+' => self.double(TokenKind::PlusPlus, "++"),
                    b'=' => self.double(TokenKind::PlusAssignment, "+="),
                    _ => self.single(TokenKind::Plus, "+"),
                },
                b'-' => match self.peek_next() {
                    b'-' => self.double(TokenKind::MinusMinus, "--"),
                    b'=' => self.double(TokenKind::MinusAssignment, "-="),
                    _ => self.single(TokenKind::Minus, "-"),
                },
                b'=' => match self.peek_next() {
                    b'=' => self.double(TokenKind::Equ, "=="),
                    b'>' => self.double(TokenKind::Arrow, "=>"),
                    _ => self.single(TokenKind::Assignment, "="),
                },
                b'*' => match self.peek_next() {
                    b'=' => self.double(TokenKind::MultiplyAssignment, "*="),
                    b'*' => self.double(TokenKind::Exponent, "**"),
                    _ => self.single(TokenKind::Multiply, "*"),
                },
                b'>' => match self.peek_next() {
                    b'=' => self.double(TokenKind::Gre, ">="),
                    _ => self.single(TokenKind::Grt, ">"),
                },
                b'<' => match self.peek_next() {
                    b'=' => self.double(TokenKind::Lse, "<="),
                    _ => self.single(TokenKind::Lst, "<"),
                },
                b'!' => match self.peek_next() {
                    b'=' => self.double(TokenKind::Neq, "!="),
                    _ => self.single(TokenKind::Negation, "!"),
                },
                b'/' => match self.peek_next() {
                    b'=' => self.double(TokenKind::DivideAssignment, "/="),
                    b'/' => self.skip_line_comment(),
                    b'*' => self.skip_block_comment(line),
                    _ => self.single(TokenKind::Divide, "/"),
                },
                b'&' => {
                    if self.peek_next() == b'&' {
                        self.double(TokenKind::And, "&&");
                    } else {
                        self.advance();
                        self.error("Invalid or unexpected token: '&'");
                    }
                }
                b'|' => {
                    if self.peek_next() == b'|' {
                        self.double(TokenKind::Or, "||");
                    } else {
                        self.advance();
                        self.error("Invalid or unexpected token: '|'");
                    }
                }
                b'"' | b'\'' => self.scan_string(line, column),
                b'`' => self.scan_template(),
                other => {
                    self.advance();
                    self.error(format!("Invalid or unexpected token: '{}'", other as char));
                }
            }
        }

        self.braces_opened = saved_braces_opened;
    }

    fn single(&mut self, kind: TokenKind, lexeme: &str) {
        let (line, column) = (self.line, self.column);
        self.advance();
        self.push(kind, lexeme, line, column);
    }

    fn double(&mut self, kind: TokenKind, lexeme: &str) {
        let (line, column) = (self.line, self.column);
        self.advance();
        self.advance();
        self.push(kind, lexeme, line, column);
    }

    fn scan_number(&mut self, line: u32, column: u32) {
        let start = self.pos;
        while Self::is_digit(self.peek()) {
            self.advance();
        }
        if self.peek() == b'.' && Self::is_digit(self.peek_next()) {
            self.advance();
            while Self::is_digit(self.peek()) {
                self.advance();
            }
        }
        let lexeme = std::str::from_utf8(&self.source[start..self.pos]).unwrap().to_string();
        self.push(TokenKind::Number, lexeme, line, column);
    }

    fn scan_identifier(&mut self, line: u32, column: u32) {
        let start = self.pos;
        self.advance();
        while Self::is_alpha(self.peek()) || Self::is_digit(self.peek()) {
            self.advance();
        }
        let lexeme = std::str::from_utf8(&self.source[start..self.pos]).unwrap().to_string();
        let kind = keyword_kind(&lexeme).unwrap_or(TokenKind::Identifier);
        self.push(kind, lexeme, line, column);
    }

    fn scan_string(&mut self, line: u32, column: u32) {
        let quote = self.peek();
        self.advance();
        let start = self.pos;
        while !self.at_eof() && self.peek() != quote && self.peek() != b'\n' {
            self.advance();
        }
        if self.at_eof() || self.peek() == b'\n' {
            self.push(TokenKind::String, "", line, column);
            self.error("Unterminated string literal");
            return;
        }
        let lexeme = std::str::from_utf8(&self.source[start..self.pos]).unwrap().to_string();
        self.advance(); // closing quote
        self.push(TokenKind::String, lexeme, line, column);
    }

    fn skip_line_comment(&mut self) {
        while !self.at_eof() && self.peek() != b'\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self, opening_line: u32) {
        self.advance(); // '/'
        self.advance(); // '*'
        loop {
            if self.at_eof() {
                self.errors.push(LexError {
                    line: opening_line,
                    column: self.column,
                    message: "Unterminated multi-line comment".to_string(),
                });
                return;
            }
            if self.peek() == b'*' && self.peek_next() == b'/' {
                self.advance();
                self.advance();
                return;
            }
            self.advance();
        }
    }

    /// Scans a back-tick template string, lowering `${expr}` interpolations
    /// into alternating `STRING`/`PLUS`/expression-tokens/`PLUS` chunks so
    /// the parser can treat the whole thing as a chain of concatenations.
    fn scan_template(&mut self) {
        let (bt_line, bt_col) = (self.line, self.column);
        self.advance(); // consume opening `
        self.push(TokenKind::BackTick, "`", bt_line, bt_col);

        let mut start = self.pos;
        let (mut chunk_line, mut chunk_col) = (self.line, self.column);

        loop {
            if self.at_eof() {
                let lexeme = std::str::from_utf8(&self.source[start..self.pos]).unwrap().to_string();
                self.push(TokenKind::String, lexeme, chunk_line, chunk_col);
                self.error("Unterminated template string");
                return;
            }

            match self.peek() {
                b'$' if self.peek_next() == b'{' => {
                    let lexeme = std::str::from_utf8(&self.source[start..self.pos]).unwrap().to_string();
                    self.push(TokenKind::String, lexeme, chunk_line, chunk_col);
                    self.push(TokenKind::Plus, "+", self.line, self.column);

                    let (interp_line, interp_col) = (self.line, self.column);
                    self.advance();
                    self.advance();
                    self.push(TokenKind::InterpolationStart, "${", interp_line, interp_col);

                    self.interpolation_depth += 1;
                    self.scan();
                    self.interpolation_depth -= 1;

                    self.push(TokenKind::Plus, "+", self.line, self.column);
                    start = self.pos;
                    chunk_line = self.line;
                    chunk_col = self.column;
                }
                b'`' => {
                    let lexeme = std::str::from_utf8(&self.source[start..self.pos]).unwrap().to_string();
                    self.push(TokenKind::String, lexeme, chunk_line, chunk_col);
                    let (line, column) = (self.line, self.column);
                    self.advance();
                    self.push(TokenKind::BackTick, "`", line, column);
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let tu = TranslationUnit::new("test.cu", src);
        let (tokens, errors) = tokenize(&tu);
        assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_a_let_declaration() {
        use TokenKind::*;
        assert_eq!(kinds("let x = 1;"), vec![Let, Identifier, Assignment, Number, Semicolon, Eof]);
    }

    #[test]
    fn tokenizes_operators_by_maximal_munch() {
        use TokenKind::*;
        assert_eq!(kinds("a++ <= b"), vec![Identifier, PlusPlus, Lse, Identifier, Eof]);
    }

    #[test]
    fn skips_line_and_block_comments() {
        use TokenKind::*;
        assert_eq!(kinds("1 // comment\n/* block */ 2"), vec![Number, Number, Eof]);
    }

    #[test]
    fn template_string_lowers_to_concatenation_tokens() {
        use TokenKind::*;
        let tu = TranslationUnit::new("test.cu", "`hi ${name}!`");
        let (tokens, errors) = tokenize(&tu);
        assert!(errors.is_empty());
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BackTick, String, Plus, InterpolationStart, Identifier, CloseBrace, Plus,
                String, BackTick, Eof
            ]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let tu = TranslationUnit::new("test.cu", "\"abc");
        let (_, errors) = tokenize(&tu);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Unterminated string"));
    }

    #[test]
    fn unterminated_block_comment_reports_opening_line() {
        let tu = TranslationUnit::new("test.cu", "1;\n/* never closed");
        let (_, errors) = tokenize(&tu);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 2);
    }

    #[test]
    fn lone_ampersand_is_an_error() {
        let tu = TranslationUnit::new("test.cu", "a & b");
        let (_, errors) = tokenize(&tu);
        assert_eq!(errors.len(), 1);
    }
}
