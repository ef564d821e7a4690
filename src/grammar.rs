//! The abstract syntax tree produced by the parser.
//!
//! ```text
//! Lisp
//!     Stmnt => If | Let | Macro | Function
//!            | Expr => Const | Ident | Call | BinOp | Vector
//! ```

use crate::source::Position;
use std::fmt;

/// A numeric literal. Integers stay integers until an operation promotes them.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            // Debug keeps the trailing ".0" so floats stay recognisable
            Number::Float(n) => write!(f, "{:?}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub pos: Position,
}

impl Node {
    pub fn new(kind: NodeKind, pos: Position) -> Self {
        Node { kind, pos }
    }

    pub fn new_const(value: Number, pos: Position) -> Self {
        Node::new(NodeKind::Const(value), pos)
    }

    pub fn new_ident(name: impl Into<String>, pos: Position) -> Self {
        Node::new(NodeKind::Ident(name.into()), pos)
    }

    pub fn is_statement(&self) -> bool {
        self.kind.is_statement()
    }

    pub fn is_expression(&self) -> bool {
        self.kind.is_expression()
    }

    /// Returns the identifier name if this node is a bare identifier.
    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Ident(name) => Some(name),
            _ => None,
        }
    }
}

/// The closed set of AST variants. Nodes are never mutated once the parser builds them.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // Expressions
    Const(Number),
    Ident(String),
    Call {
        callee: Box<Node>,
        args: Vec<Node>,
    },
    BinOp {
        op: Box<Node>,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// A parenthesized group without a head identifier.
    Vector(Vec<Node>),

    // Statements
    If {
        clause: Box<Node>,
        action: Box<Node>,
        orelse: Option<Box<Node>>,
    },
    Let {
        target: String,
        body: Box<Node>,
    },
    Function {
        params: Vec<String>,
        body: Vec<Node>,
    },
    Macro {
        name: String,
        definition: Box<Node>,
    },
}

impl NodeKind {
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::If { .. }
                | NodeKind::Let { .. }
                | NodeKind::Function { .. }
                | NodeKind::Macro { .. }
        )
    }

    pub fn is_expression(&self) -> bool {
        !self.is_statement()
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Const(_) => "Const",
            NodeKind::Ident(_) => "Ident",
            NodeKind::Call { .. } => "Call",
            NodeKind::BinOp { .. } => "BinOp",
            NodeKind::Vector(_) => "Vector",
            NodeKind::If { .. } => "If",
            NodeKind::Let { .. } => "Let",
            NodeKind::Function { .. } => "Function",
            NodeKind::Macro { .. } => "Macro",
        }
    }
}

fn write_nodes(f: &mut fmt::Formatter<'_>, nodes: &[Node]) -> fmt::Result {
    write!(f, "[")?;
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", node)?;
    }
    write!(f, "]")
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Const(n) => write!(f, "Const({})", n),
            NodeKind::Ident(name) => write!(f, "Ident({:?})", name),
            NodeKind::Call { callee, args } => {
                write!(f, "Call({}, ", callee)?;
                write_nodes(f, args)?;
                write!(f, ")")
            }
            NodeKind::BinOp { op, left, right } => {
                write!(f, "BinOp({}, {}, {})", op, left, right)
            }
            NodeKind::Vector(items) => {
                write!(f, "Vector(")?;
                write_nodes(f, items)?;
                write!(f, ")")
            }
            NodeKind::If {
                clause,
                action,
                orelse,
            } => match orelse {
                Some(orelse) => write!(f, "If({}, {}, {})", clause, action, orelse),
                None => write!(f, "If({}, {}, None)", clause, action),
            },
            NodeKind::Let { target, body } => write!(f, "Let(Ident({:?}), {})", target, body),
            NodeKind::Function { params, body } => {
                write!(f, "Function([")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "Ident({:?})", param)?;
                }
                write!(f, "], ")?;
                write_nodes(f, body)?;
                write!(f, ")")
            }
            NodeKind::Macro { name, definition } => {
                write!(f, "Macro(Ident({:?}), {})", name, definition)
            }
        }
    }
}
