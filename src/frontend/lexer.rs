use std::{collections::BTreeMap, str::Chars};

use itertools::{PeekNth, peek_nth};
use once_cell::sync::Lazy;
use strum::EnumString;

use crate::{SourceFile, error::LexError};

pub type Result<T> = std::result::Result<T, LexError>;

#[derive(Debug)]
pub struct Lexer<'source> {
    source: &'source SourceFile,
    position: usize,
    line_number: usize,
    chars: PeekNth<Chars<'source>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// 1-based line the token starts on
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /* Words */
    Keyword(Keyword), // fn
    Identifier,       // main

    /* Literals */
    BooleanLiteral, // true
    IntegerLiteral, // 1
    StringLiteral,  // "hello, world"
    VoidLiteral,    // void

    /* Delimiters */
    OpenParen,  // (
    CloseParen, // )
    OpenBrace,  // {
    CloseBrace, // }
    Comma,      // ,
    Colon,      // :

    /* Unary Ops */
    Bang, // !

    /* Unary + Binary Ops */
    Minus, // -

    /* Binary Ops */
    Plus,         // +
    Asterisk,     // *
    Divide,       // /
    Modulus,      // %
    LogicalAnd,   // && or &
    LogicalOr,    // || or |
    DoubleEquals, // ==
    LessThan,     // <
    GreaterThan,  // >

    /* Assignment */
    Equals, // =

    Eof,
}

impl TokenKind {
    pub fn is_logical_operator(&self) -> bool {
        matches!(self, Self::LogicalAnd | Self::LogicalOr)
    }

    pub fn is_comparison_operator(&self) -> bool {
        matches!(self, Self::DoubleEquals | Self::LessThan | Self::GreaterThan)
    }

    pub fn is_term_operator(&self) -> bool {
        matches!(self, Self::Plus | Self::Minus)
    }

    pub fn is_factor_operator(&self) -> bool {
        matches!(self, Self::Asterisk | Self::Divide | Self::Modulus)
    }

    pub fn is_unary_operator(&self) -> bool {
        matches!(self, Self::Bang | Self::Minus)
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Self::BooleanLiteral | Self::IntegerLiteral | Self::StringLiteral | Self::VoidLiteral
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Keyword {
    Fn,
    Let,
    Log,
    If,
    Else,
    While,
    Return,
}

/// Table of single char tokens (matched after longer sequences are checked for)
static SINGLE_TOKENS: Lazy<BTreeMap<char, TokenKind>> = Lazy::new(|| {
    BTreeMap::from([
        ('(', TokenKind::OpenParen),
        (')', TokenKind::CloseParen),
        ('{', TokenKind::OpenBrace),
        ('}', TokenKind::CloseBrace),
        (',', TokenKind::Comma),
        (':', TokenKind::Colon),
        ('!', TokenKind::Bang),
        ('-', TokenKind::Minus),
        ('+', TokenKind::Plus),
        ('*', TokenKind::Asterisk),
        ('/', TokenKind::Divide),
        ('%', TokenKind::Modulus),
        ('&', TokenKind::LogicalAnd),
        ('|', TokenKind::LogicalOr),
        ('<', TokenKind::LessThan),
        ('>', TokenKind::GreaterThan),
        ('=', TokenKind::Equals),
    ])
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source SourceFile) -> Self {
        Self {
            source,
            chars: peek_nth(source.contents.chars()),
            position: 0,
            line_number: 1,
        }
    }

    /// Lexes the whole source. The returned sequence always ends with a
    /// single [`TokenKind::Eof`].
    pub fn tokenize(source: &'source SourceFile) -> Result<Vec<Token>> {
        let mut lexer = Self::new(source);
        let mut tokens = Vec::new();

        loop {
            let token = lexer.next_token()?;
            tokens.push(token);

            if token.kind == TokenKind::Eof {
                return Ok(tokens);
            }
        }
    }

    fn peek_is(&mut self, n: usize, expected: char) -> bool {
        self.chars.peek_nth(n).is_some_and(|c| *c == expected)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;

        self.position += c.len_utf8();

        if c == '\n' {
            self.line_number += 1;
        }

        Some(c)
    }

    fn ignore_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.bump();
        }
    }

    // Comments are wrapped in `//` on both sides; an unclosed one runs to EOF
    fn ignore_comment(&mut self) {
        self.bump();
        self.bump();

        while self.chars.peek().is_some() {
            if self.peek_is(0, '/') && self.peek_is(1, '/') {
                self.bump();
                self.bump();
                return;
            }

            self.bump();
        }
    }

    fn read_string(&mut self) -> Result<Token> {
        let start_position = self.position;
        let start_line = self.line_number;

        // Opening quote
        self.bump();

        while let Some(c) = self.bump() {
            if c == '"' {
                return Ok(Token {
                    kind: TokenKind::StringLiteral,
                    span: self.new_span(start_position),
                    line: start_line,
                });
            }
        }

        Err(LexError::UnterminatedString { line: start_line })
    }

    // Keyword, identifier, boolean or void literal
    fn read_word(&mut self) -> Token {
        let start_position = self.position;
        let line = self.line_number;

        while self
            .chars
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_')
        {
            self.bump();
        }

        let span = self.new_span(start_position);
        let value = self.source.value_of_span(span);

        let kind = if let Ok(keyword) = value.parse() {
            TokenKind::Keyword(keyword)
        } else {
            match value {
                "true" | "false" => TokenKind::BooleanLiteral,
                "void" => TokenKind::VoidLiteral,
                _ => TokenKind::Identifier,
            }
        };

        Token { kind, span, line }
    }

    fn read_number(&mut self) -> Token {
        let start_position = self.position;
        let line = self.line_number;

        while self.chars.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }

        Token {
            kind: TokenKind::IntegerLiteral,
            span: self.new_span(start_position),
            line,
        }
    }

    fn read_sequence(&mut self, kind: TokenKind, length: usize) -> Token {
        let start_position = self.position;
        let line = self.line_number;

        for _ in 0..length {
            self.bump();
        }

        Token {
            kind,
            span: self.new_span(start_position),
            line,
        }
    }

    fn new_span(&self, start: usize) -> Span {
        Span {
            start,
            end: self.position,
        }
    }

    pub fn next_token(&mut self) -> Result<Token> {
        while let Some(c) = self.chars.peek().copied() {
            let token = match c {
                // Ignore whitespace
                c if c.is_ascii_whitespace() => {
                    self.ignore_whitespace();
                    continue;
                }
                // Ignore comments
                '/' if self.peek_is(1, '/') => {
                    self.ignore_comment();
                    continue;
                }

                '"' => self.read_string()?,

                n if n.is_ascii_digit() => self.read_number(),

                // Identifiers, keywords, and boolean/void literals
                a if a.is_ascii_alphabetic() || a == '_' => self.read_word(),

                // Double Equals (==)
                '=' if self.peek_is(1, '=') => self.read_sequence(TokenKind::DoubleEquals, 2),
                // Logical And (&&)
                '&' if self.peek_is(1, '&') => self.read_sequence(TokenKind::LogicalAnd, 2),
                // Logical Or (||)
                '|' if self.peek_is(1, '|') => self.read_sequence(TokenKind::LogicalOr, 2),

                s => match SINGLE_TOKENS.get(&s) {
                    Some(kind) => self.read_sequence(*kind, 1),
                    // Characters outside the language are dropped
                    None => {
                        self.bump();
                        continue;
                    }
                },
            };

            return Ok(token);
        }

        Ok(Token {
            kind: TokenKind::Eof,
            span: self.new_span(self.position),
            line: self.line_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let source = SourceFile::memory(input);

        Lexer::tokenize(&source)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn let_and_return() {
        use TokenKind::*;

        assert_eq!(
            kinds("let x = 5 return x"),
            [
                Keyword(super::Keyword::Let),
                Identifier,
                Equals,
                IntegerLiteral,
                Keyword(super::Keyword::Return),
                Identifier,
                Eof,
            ]
        );
    }

    #[test]
    fn single_and_double_operators() {
        use TokenKind::*;

        assert_eq!(
            kinds("a == b = c & d && e | f || g"),
            [
                Identifier,
                DoubleEquals,
                Identifier,
                Equals,
                Identifier,
                LogicalAnd,
                Identifier,
                LogicalAnd,
                Identifier,
                LogicalOr,
                Identifier,
                LogicalOr,
                Identifier,
                Eof,
            ]
        );
    }

    #[test]
    fn literal_words() {
        use TokenKind::*;

        assert_eq!(
            kinds("true false void fn_name _x1"),
            [
                BooleanLiteral,
                BooleanLiteral,
                VoidLiteral,
                Identifier,
                Identifier,
                Eof,
            ]
        );
    }

    #[test]
    fn comments_are_wrapped() {
        use TokenKind::*;

        assert_eq!(kinds("1 // ignored 2 // 3"), [IntegerLiteral, IntegerLiteral, Eof]);
        assert_eq!(kinds("1 // runs to the end 2"), [IntegerLiteral, Eof]);
    }

    #[test]
    fn unknown_characters_are_skipped() {
        use TokenKind::*;

        assert_eq!(kinds("1 @ # 2"), [IntegerLiteral, IntegerLiteral, Eof]);
    }

    #[test]
    fn lines_are_tracked() {
        let source = SourceFile::memory(indoc! {"
            let a = 1
            // multi
            line //
            log a
        "});

        let tokens = Lexer::tokenize(&source).unwrap();
        let lines = tokens.iter().map(|token| token.line).collect::<Vec<_>>();

        assert_eq!(lines, [1, 1, 1, 1, 4, 4, 5]);
    }

    #[test]
    fn spans_reproduce_lexemes() {
        let input = "fn add: a, b { return a+b } let s = \"hi there\" log add(1,22)";
        let source = SourceFile::memory(input);

        let tokens = Lexer::tokenize(&source).unwrap();
        let lexemes = tokens
            .iter()
            .filter(|token| token.kind != TokenKind::Eof)
            .map(|token| source.value_of_span(token.span))
            .collect::<Vec<_>>();

        assert_eq!(
            lexemes,
            [
                "fn", "add", ":", "a", ",", "b", "{", "return", "a", "+", "b", "}", "let", "s",
                "=", "\"hi there\"", "log", "add", "(", "1", ",", "22", ")",
            ]
        );
    }

    #[test]
    fn unterminated_string() {
        let source = SourceFile::memory("let s = 1\nlog \"oops");

        assert_eq!(
            Lexer::tokenize(&source),
            Err(LexError::UnterminatedString { line: 2 })
        );
    }
}
