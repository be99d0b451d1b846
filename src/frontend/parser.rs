use hashbrown::HashMap;

use super::{
    ast::{
        BinaryOperatorKind, Literal, LiteralKind, Node, NodeKind, Parameter, UnaryOperatorKind,
        UntypedNode, UntypedProgram,
    },
    intern::InternedSymbol,
};
use crate::{
    error::ParseError,
    frontend::{
        SourceFile,
        lexer::{Keyword, Span, Token, TokenKind},
    },
};

pub type Result<T> = std::result::Result<T, ParseError>;

const MISSING_EOF: Token = Token {
    kind: TokenKind::Eof,
    span: Span { start: 0, end: 0 },
    line: 1,
};

/// Symbols defined by the generated entry point and the preamble
const RESERVED_FUNCTION_NAMES: [&str; 5] = ["main", "printf", "printi32", "printi1", "printptr"];

/// Two-phase recursive descent parser. The first phase records the arity of
/// every function so that the second phase can tell calls apart from plain
/// identifiers regardless of declaration order.
#[derive(Debug)]
pub struct Parser<'source> {
    source: &'source SourceFile,
    tokens: &'source [Token],
    position: usize,
    functions: HashMap<InternedSymbol, usize>,
}

impl<'source> Parser<'source> {
    pub fn parse_program(
        source: &'source SourceFile,
        tokens: &'source [Token],
    ) -> Result<UntypedProgram> {
        let mut parser = Self {
            source,
            tokens,
            position: 0,
            functions: HashMap::new(),
        };

        parser.scan_declarations()?;
        parser.position = 0;

        let mut functions = Vec::new();

        while parser.peek().kind == TokenKind::Keyword(Keyword::Fn) {
            functions.push(parser.parse_function_definition()?);
        }

        let mut statements = Vec::new();

        while parser.peek().kind != TokenKind::Eof {
            statements.push(parser.parse_statement()?);
        }

        Ok(UntypedProgram {
            functions,
            entry: Node::new(NodeKind::Block(statements), 1),
        })
    }

    fn peek_nth(&self, n: usize) -> Token {
        self.tokens
            .get(self.position + n)
            .or(self.tokens.last())
            .copied()
            .unwrap_or(MISSING_EOF)
    }

    fn peek(&self) -> Token {
        self.peek_nth(0)
    }

    fn next(&mut self) -> Token {
        let token = self.peek();

        if token.kind != TokenKind::Eof {
            self.position += 1;
        }

        token
    }

    fn lexeme(&self, token: Token) -> String {
        self.source.value_of_span(token.span).to_owned()
    }

    fn unexpected(&self, token: Token, expected: &'static str) -> ParseError {
        if token.kind == TokenKind::Eof {
            ParseError::UnexpectedEof {
                line: token.line,
                expected,
            }
        } else {
            ParseError::Expected {
                line: token.line,
                expected,
                found: self.lexeme(token),
            }
        }
    }

    fn expect_next_to_be(&mut self, kind: TokenKind, expected: &'static str) -> Result<Token> {
        let token = self.next();

        if token.kind != kind {
            return Err(self.unexpected(token, expected));
        }

        Ok(token)
    }

    fn parse_identifier(&mut self, expected: &'static str) -> Result<InternedSymbol> {
        let token = self.expect_next_to_be(TokenKind::Identifier, expected)?;

        Ok(InternedSymbol::new(self.source.value_of_span(token.span)))
    }

    fn scan_declarations(&mut self) -> Result<()> {
        while self.peek().kind == TokenKind::Keyword(Keyword::Fn) {
            self.next();

            let line = self.peek().line;
            let name = self.parse_identifier("function name")?;

            if RESERVED_FUNCTION_NAMES.contains(&name.value()) {
                return Err(ParseError::ReservedFunctionName { line, name });
            }

            self.expect_next_to_be(TokenKind::Colon, "`:`")?;
            let parameters = self.parse_parameter_list()?;

            self.functions.insert(name, parameters.len());

            // Skip the body, it is only built in the second phase
            while !matches!(
                self.peek().kind,
                TokenKind::Keyword(Keyword::Fn) | TokenKind::Eof
            ) {
                self.next();
            }
        }

        Ok(())
    }

    /// a, b, c
    fn parse_parameter_list(&mut self) -> Result<Vec<InternedSymbol>> {
        let mut parameters = Vec::new();

        while self.peek().kind == TokenKind::Identifier {
            parameters.push(self.parse_identifier("parameter name")?);

            if self.peek().kind != TokenKind::Comma {
                break;
            }

            self.next();
        }

        Ok(parameters)
    }

    /// fn name: a, b <statement>
    fn parse_function_definition(&mut self) -> Result<UntypedNode> {
        let fn_keyword = self.expect_next_to_be(TokenKind::Keyword(Keyword::Fn), "`fn`")?;

        let name = self.parse_identifier("function name")?;
        self.expect_next_to_be(TokenKind::Colon, "`:`")?;
        let parameters = self
            .parse_parameter_list()?
            .into_iter()
            .map(|name| Parameter { name, ty: () })
            .collect();

        let body = self.parse_statement()?;
        let body = match body.kind {
            NodeKind::Block(_) => body,
            _ => {
                let line = body.line;
                Node::new(NodeKind::Block(vec![body]), line)
            }
        };

        Ok(Node::new(
            NodeKind::Function {
                name,
                parameters,
                body: Box::new(body),
            },
            fn_keyword.line,
        ))
    }

    fn parse_statement(&mut self) -> Result<UntypedNode> {
        let token = self.next();
        let line = token.line;

        let kind = match token.kind {
            TokenKind::OpenBrace => {
                let mut statements = Vec::new();

                while !matches!(self.peek().kind, TokenKind::CloseBrace | TokenKind::Eof) {
                    statements.push(self.parse_statement()?);
                }

                self.expect_next_to_be(TokenKind::CloseBrace, "`}`")?;

                NodeKind::Block(statements)
            }
            TokenKind::Keyword(Keyword::Let) => {
                let name = self.parse_identifier("variable name")?;
                self.expect_next_to_be(TokenKind::Equals, "`=`")?;

                NodeKind::Assign {
                    name,
                    value: Box::new(self.parse_expression()?),
                    is_declaration: true,
                }
            }
            TokenKind::Keyword(Keyword::Log) => NodeKind::Log(Box::new(self.parse_expression()?)),
            TokenKind::Keyword(Keyword::Return) => {
                NodeKind::Return(Box::new(self.parse_expression()?))
            }
            TokenKind::Keyword(Keyword::If) => NodeKind::If {
                condition: Box::new(self.parse_expression()?),
                body: Box::new(self.parse_statement()?),
            },
            TokenKind::Keyword(Keyword::While) => NodeKind::While {
                condition: Box::new(self.parse_expression()?),
                body: Box::new(self.parse_statement()?),
            },
            TokenKind::Identifier => {
                let name = InternedSymbol::new(self.source.value_of_span(token.span));

                if self.peek().kind == TokenKind::Equals {
                    self.next();

                    NodeKind::Assign {
                        name,
                        value: Box::new(self.parse_expression()?),
                        is_declaration: false,
                    }
                } else if let Some(arity) = self.functions.get(&name).copied() {
                    self.parse_function_call(name, arity)?
                } else {
                    return Err(ParseError::UndeclaredStatement { line, name });
                }
            }
            TokenKind::Eof => {
                return Err(ParseError::UnexpectedEof {
                    line,
                    expected: "statement",
                });
            }
            _ => {
                return Err(ParseError::UnexpectedToken {
                    line,
                    found: self.lexeme(token),
                });
            }
        };

        Ok(Node::new(kind, line))
    }

    /// Arguments follow the name either bare (`add 1, 2`) or wrapped in
    /// parentheses (`add(1, 2)`). With two or more parameters the wrapped
    /// form is only taken when a `,` follows the first argument inside the
    /// parentheses, so `add (1 + 2) * 3, 4` still reads as bare. A single
    /// argument is always bare: `inc (1 + 2) * 3` passes `9`.
    fn parse_function_call(&mut self, name: InternedSymbol, arity: usize) -> Result<NodeKind<()>> {
        if self.peek().kind == TokenKind::OpenParen {
            match arity {
                0 if self.peek_nth(1).kind == TokenKind::CloseParen => {
                    self.next();
                    self.next();

                    return Ok(NodeKind::Call {
                        name,
                        arguments: Vec::new(),
                    });
                }
                0 | 1 => {}
                _ => {
                    let start = self.position;
                    self.next();

                    let first = self.parse_expression()?;

                    if self.peek().kind == TokenKind::Comma {
                        let mut arguments = Vec::with_capacity(arity);
                        arguments.push(first);
                        self.parse_remaining_arguments(&mut arguments, arity)?;
                        self.expect_next_to_be(TokenKind::CloseParen, "`)`")?;

                        return Ok(NodeKind::Call { name, arguments });
                    }

                    self.position = start;
                }
            }
        }

        let mut arguments = Vec::with_capacity(arity);

        if arity > 0 {
            arguments.push(self.parse_expression()?);
            self.parse_remaining_arguments(&mut arguments, arity)?;
        }

        Ok(NodeKind::Call { name, arguments })
    }

    fn parse_remaining_arguments(
        &mut self,
        arguments: &mut Vec<UntypedNode>,
        arity: usize,
    ) -> Result<()> {
        while arguments.len() < arity {
            self.expect_next_to_be(TokenKind::Comma, "`,` between arguments")?;
            arguments.push(self.parse_expression()?);
        }

        Ok(())
    }

    fn parse_expression(&mut self) -> Result<UntypedNode> {
        self.parse_logical_expression()
    }

    fn binary(operator: BinaryOperatorKind, lhs: UntypedNode, rhs: UntypedNode) -> UntypedNode {
        let line = lhs.line;

        Node::new(
            NodeKind::Binary {
                operator,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            line,
        )
    }

    fn parse_logical_expression(&mut self) -> Result<UntypedNode> {
        let mut expression = self.parse_comparison_expression()?;

        while self.peek().kind.is_logical_operator() {
            let operator = match self.next().kind {
                TokenKind::LogicalAnd => BinaryOperatorKind::LogicalAnd,
                _ => BinaryOperatorKind::LogicalOr,
            };
            let rhs = self.parse_comparison_expression()?;

            expression = Self::binary(operator, expression, rhs);
        }

        Ok(expression)
    }

    fn parse_comparison_expression(&mut self) -> Result<UntypedNode> {
        let mut expression = self.parse_term_expression()?;

        while self.peek().kind.is_comparison_operator() {
            let operator = match self.next().kind {
                TokenKind::DoubleEquals => BinaryOperatorKind::Equals,
                TokenKind::LessThan => BinaryOperatorKind::LessThan,
                _ => BinaryOperatorKind::GreaterThan,
            };
            let rhs = self.parse_term_expression()?;

            expression = Self::binary(operator, expression, rhs);
        }

        Ok(expression)
    }

    fn parse_term_expression(&mut self) -> Result<UntypedNode> {
        let mut expression = self.parse_factor_expression()?;

        while self.peek().kind.is_term_operator() {
            let operator = match self.next().kind {
                TokenKind::Plus => BinaryOperatorKind::Add,
                _ => BinaryOperatorKind::Subtract,
            };
            let rhs = self.parse_factor_expression()?;

            expression = Self::binary(operator, expression, rhs);
        }

        Ok(expression)
    }

    fn parse_factor_expression(&mut self) -> Result<UntypedNode> {
        let mut expression = self.parse_unary_expression()?;

        while self.peek().kind.is_factor_operator() {
            let operator = match self.next().kind {
                TokenKind::Asterisk => BinaryOperatorKind::Multiply,
                TokenKind::Divide => BinaryOperatorKind::Divide,
                _ => BinaryOperatorKind::Modulus,
            };
            let rhs = self.parse_unary_expression()?;

            expression = Self::binary(operator, expression, rhs);
        }

        Ok(expression)
    }

    fn parse_unary_expression(&mut self) -> Result<UntypedNode> {
        if !self.peek().kind.is_unary_operator() {
            return self.parse_atomic_expression();
        }

        let token = self.next();
        let operator = match token.kind {
            TokenKind::Bang => UnaryOperatorKind::Not,
            _ => UnaryOperatorKind::Negate,
        };
        let operand = self.parse_unary_expression()?;

        Ok(Node::new(
            NodeKind::Unary {
                operator,
                operand: Box::new(operand),
            },
            token.line,
        ))
    }

    fn parse_atomic_expression(&mut self) -> Result<UntypedNode> {
        let token = self.next();

        let kind = match token.kind {
            TokenKind::OpenParen => {
                let expression = self.parse_expression()?;
                self.expect_next_to_be(TokenKind::CloseParen, "`)`")?;

                return Ok(expression);
            }
            kind if kind.is_literal() => NodeKind::Literal(self.parse_literal(token)?),
            TokenKind::Identifier => {
                let name = InternedSymbol::new(self.source.value_of_span(token.span));

                match self.functions.get(&name).copied() {
                    Some(arity) => self.parse_function_call(name, arity)?,
                    None => NodeKind::Ident(name),
                }
            }
            _ => return Err(self.unexpected(token, "expression")),
        };

        Ok(Node::new(kind, token.line))
    }

    fn parse_literal(&self, token: Token) -> Result<Literal> {
        let text = self.source.value_of_span(token.span);

        let (kind, value) = match token.kind {
            TokenKind::IntegerLiteral => {
                if text.parse::<i32>().is_err() {
                    return Err(ParseError::IntegerOutOfRange {
                        line: token.line,
                        literal: text.to_owned(),
                    });
                }

                (LiteralKind::Integer, text)
            }
            TokenKind::BooleanLiteral => (LiteralKind::Boolean, text),
            TokenKind::StringLiteral => (LiteralKind::String, &text[1..text.len() - 1]),
            _ => (LiteralKind::Void, text),
        };

        Ok(Literal {
            kind,
            value: InternedSymbol::new(value),
        })
    }
}
