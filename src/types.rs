use crate::environment::Environment;
use crate::evaluator::EvalResult;
use crate::grammar::{Node, Number};
use crate::source::Position;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A runtime value produced by evaluation.
#[derive(Debug, Clone)]
pub enum Value {
    /// The absence of a value, e.g. a missing else branch or a `let`.
    Nil,
    Number(Number),
    Bool(bool),
    /// An ordered sequence of values. Passed as a call's only argument it is
    /// spread positionally.
    Tuple(Vec<Value>),
    Procedure(Rc<Procedure>),
    Primitive(Primitive),
}

impl Value {
    pub fn int(i: i64) -> Self {
        Value::Number(Number::Int(i))
    }

    pub fn float(f: f64) -> Self {
        Value::Number(Number::Float(f))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Number(Number::Int(_)) => "int",
            Value::Number(Number::Float(_)) => "float",
            Value::Bool(_) => "bool",
            Value::Tuple(_) => "tuple",
            Value::Procedure(_) => "procedure",
            Value::Primitive(_) => "primitive",
        }
    }

    /// Zero, nil, false and the empty tuple are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Number(n) => !n.is_zero(),
            Value::Bool(b) => *b,
            Value::Tuple(items) => !items.is_empty(),
            Value::Procedure(_) | Value::Primitive(_) => true,
        }
    }

    /// Numeric view of the value. Booleans count as 0 and 1.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            _ => None,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            (Value::Primitive(a), Value::Primitive(b)) => a.name == b.name,
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(Number::Int(x)), Some(Number::Int(y))) => x == y,
                (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                // A one element tuple keeps its trailing comma
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Procedure(procedure) => {
                write!(f, "#<procedure ({})>", procedure.params.join(" "))
            }
            Value::Primitive(primitive) => write!(f, "#<primitive:{}>", primitive.name),
        }
    }
}

pub type PrimitiveFunc = fn(Vec<Value>, Position) -> EvalResult;

/// A callable supplied by the host.
#[derive(Clone)]
pub struct Primitive {
    pub name: String,
    pub func: PrimitiveFunc,
}

impl Primitive {
    pub fn new(name: impl Into<String>, func: PrimitiveFunc) -> Self {
        Primitive {
            name: name.into(),
            func,
        }
    }
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Primitive({})", self.name)
    }
}

/// A user-defined function. The closure is shared with the frame chain that
/// was live where the function literal was evaluated, not copied.
pub struct Procedure {
    pub params: Vec<String>,
    pub body: Vec<Node>,
    pub closure: Rc<RefCell<Environment>>,
}

// The closure is left out, it can reach back to this procedure.
impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("params", &self.params)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::int(0).is_truthy());
        assert!(!Value::float(0.0).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Tuple(vec![]).is_truthy());
        assert!(Value::int(-1).is_truthy());
        assert!(Value::Tuple(vec![Value::Nil]).is_truthy());
    }

    #[test]
    fn test_numeric_equality_crosses_types() {
        assert_eq!(Value::int(1), Value::float(1.0));
        assert_eq!(Value::Bool(true), Value::int(1));
        assert_ne!(Value::int(1), Value::Nil);
        assert_eq!(
            Value::Tuple(vec![Value::int(1), Value::float(2.0)]),
            Value::Tuple(vec![Value::float(1.0), Value::int(2)])
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::int(25).to_string(), "25");
        assert_eq!(Value::float(2.5).to_string(), "2.5");
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(
            Value::Tuple(vec![Value::int(1), Value::Bool(true)]).to_string(),
            "(1, true)"
        );
        assert_eq!(Value::Tuple(vec![Value::int(1)]).to_string(), "(1,)");
    }
}
