//! Syntax tree shared by every stage after parsing. Nodes are generic over
//! their type annotation: the parser produces `Node<()>` and the type
//! environment rebuilds the same shape as `Node<ValueType>`.

use strum::Display;

use super::intern::InternedSymbol;
use crate::middle::ty::ValueType;

pub type UntypedNode = Node<()>;
pub type TypedNode = Node<ValueType>;

pub type UntypedProgram = Program<()>;
pub type TypedProgram = Program<ValueType>;

#[derive(Debug, Clone, PartialEq)]
pub struct Program<T> {
    /// Function declarations, in source order
    pub functions: Vec<Node<T>>,
    /// The trailing top-level statements, always a [`NodeKind::Block`]
    pub entry: Node<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node<T> {
    pub kind: NodeKind<T>,
    /// Line of the token that introduced the node
    pub line: usize,
    pub ty: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind<T> {
    Literal(Literal),
    Block(Vec<Node<T>>),
    Function {
        name: InternedSymbol,
        parameters: Vec<Parameter<T>>,
        body: Box<Node<T>>,
    },
    If {
        condition: Box<Node<T>>,
        body: Box<Node<T>>,
    },
    While {
        condition: Box<Node<T>>,
        body: Box<Node<T>>,
    },
    Call {
        name: InternedSymbol,
        arguments: Vec<Node<T>>,
    },
    Log(Box<Node<T>>),
    Return(Box<Node<T>>),
    Assign {
        name: InternedSymbol,
        value: Box<Node<T>>,
        is_declaration: bool,
    },
    Ident(InternedSymbol),
    Binary {
        operator: BinaryOperatorKind,
        lhs: Box<Node<T>>,
        rhs: Box<Node<T>>,
    },
    Unary {
        operator: UnaryOperatorKind,
        operand: Box<Node<T>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameter<T> {
    pub name: InternedSymbol,
    pub ty: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Literal {
    pub kind: LiteralKind,
    /// Source text of the literal. String literals exclude their quotes.
    pub value: InternedSymbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Integer,
    String,
    Boolean,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BinaryOperatorKind {
    #[strum(to_string = "+")]
    Add,
    #[strum(to_string = "-")]
    Subtract,
    #[strum(to_string = "*")]
    Multiply,
    #[strum(to_string = "/")]
    Divide,
    #[strum(to_string = "%")]
    Modulus,
    #[strum(to_string = "&&")]
    LogicalAnd,
    #[strum(to_string = "||")]
    LogicalOr,
    #[strum(to_string = "==")]
    Equals,
    #[strum(to_string = "<")]
    LessThan,
    #[strum(to_string = ">")]
    GreaterThan,
}

impl BinaryOperatorKind {
    pub fn is_logical(&self) -> bool {
        matches!(self, Self::LogicalAnd | Self::LogicalOr)
    }

    pub fn is_ordering(&self) -> bool {
        matches!(self, Self::LessThan | Self::GreaterThan)
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulus
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UnaryOperatorKind {
    #[strum(to_string = "!")]
    Not,
    #[strum(to_string = "-")]
    Negate,
}

impl UntypedNode {
    pub fn new(kind: NodeKind<()>, line: usize) -> Self {
        Self { kind, line, ty: () }
    }
}

impl<T> Node<T> {
    /// Whether every path through this statement ends in a `return`
    pub fn always_returns(&self) -> bool {
        match &self.kind {
            NodeKind::Return(_) => true,
            NodeKind::Block(statements) => statements.last().is_some_and(Node::always_returns),
            _ => false,
        }
    }
}
